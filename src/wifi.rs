pub mod wifi {
    use crate::app::app::AccessPoint;
    use crate::settings::settings::AccessPointSettings;
    use embedded_svc::wifi::{AccessPointConfiguration, AuthMethod, Configuration};
    use esp_idf_hal::modem::Modem;
    use esp_idf_svc::eventloop::EspEventLoop;
    use esp_idf_svc::eventloop::System;
    use esp_idf_svc::ipv4::{
        Configuration as IpConfiguration, Mask, RouterConfiguration, Subnet,
    };
    use esp_idf_svc::mdns::EspMdns;
    use esp_idf_svc::netif::{EspNetif, NetifConfiguration, NetifStack};
    use esp_idf_svc::nvs::{EspNvsPartition, NvsDefault};
    use esp_idf_svc::sys::{esp, esp_wifi_ap_get_sta_list, wifi_sta_list_t};
    use esp_idf_svc::wifi::{BlockingWifi, EspWifi, WifiDriver};
    use std::net::Ipv4Addr;

    use log::info;

    pub struct Wifi<'a> {
        wifi: BlockingWifi<EspWifi<'a>>,
        #[allow(dead_code)]
        mdns: EspMdns,
        settings: AccessPointSettings,
    }

    impl<'a> Wifi<'a> {
        pub fn new(
            modem: Modem,
            sys_loop: &EspEventLoop<System>,
            nvs: &EspNvsPartition<NvsDefault>,
            settings: &AccessPointSettings,
            http_port: u16,
        ) -> anyhow::Result<Self> {
            let driver = WifiDriver::new(modem, sys_loop.clone(), Some(nvs.to_owned()))?;

            // Fixed address for the device, DHCP for the clients
            let ap_netif = EspNetif::new_with_conf(&NetifConfiguration {
                ip_configuration: Some(IpConfiguration::Router(RouterConfiguration {
                    subnet: Subnet {
                        gateway: settings.address,
                        mask: Mask(settings.netmask_bits),
                    },
                    dhcp_enabled: true,
                    dns: None,
                    secondary_dns: None,
                })),
                ..NetifConfiguration::wifi_default_router()
            })?;

            let wifi = BlockingWifi::wrap(
                EspWifi::wrap_all(driver, EspNetif::new(NetifStack::Sta)?, ap_netif)?,
                sys_loop.clone(),
            )?;

            let mut mdns = EspMdns::take()?;
            mdns.set_hostname(&settings.hostname)?;
            mdns.set_instance_name("Encoder ESP32")?;
            mdns.add_service(None, "_http", "_tcp", http_port, &[("", "")])?;
            mdns.set_service_instance_name("_http", "_tcp", "Encoder ESP32")?;

            Ok(Wifi {
                wifi,
                mdns,
                settings: settings.clone(),
            })
        }

        pub fn start_ap(&mut self) -> anyhow::Result<()> {
            let ssid = self.settings.ssid.as_str();
            let password = self.settings.password.as_str();
            let auth_method = if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPA2Personal
            };

            let wifi_configuration: Configuration =
                Configuration::AccessPoint(AccessPointConfiguration {
                    ssid: ssid
                        .try_into()
                        .map_err(|_| anyhow::anyhow!("SSID too long: {}", ssid))?,
                    password: password
                        .try_into()
                        .map_err(|_| anyhow::anyhow!("Password too long"))?,
                    auth_method,
                    channel: self.settings.channel,
                    ..Default::default()
                });

            self.wifi.set_configuration(&wifi_configuration)?;
            self.wifi.start()?;
            self.wifi.wait_netif_up()?;

            info!(
                "Wifi started, ssid {}, AP address {}, available on {}",
                ssid,
                self.ip_addr()?,
                format!("{}.local", self.settings.hostname)
            );

            Ok(())
        }
    }

    impl<'a> AccessPoint for Wifi<'a> {
        fn station_count(&self) -> anyhow::Result<usize> {
            let mut list = wifi_sta_list_t::default();
            esp!(unsafe { esp_wifi_ap_get_sta_list(&mut list) })?;

            Ok(list.num as usize)
        }

        fn ip_addr(&self) -> anyhow::Result<Ipv4Addr> {
            Ok(self.wifi.wifi().ap_netif().get_ip_info()?.ip)
        }
    }
}
