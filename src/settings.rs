pub mod settings {
    use config::{Config, File, FileFormat};
    use serde::Deserialize;
    use std::net::Ipv4Addr;

    static DEFAULT_SETTINGS: &str = include_str!("settings.toml");

    // Limits imposed by the wifi driver and the PCNT filter register
    const MAX_SSID_LEN: usize = 32;
    const MIN_PSK_LEN: usize = 8;
    const MAX_PSK_LEN: usize = 64;
    const MAX_FILTER_CYCLES: u16 = 1023;

    #[derive(Clone, Debug, Deserialize, PartialEq)]
    pub struct AccessPointSettings {
        pub ssid: String,
        pub password: String,
        pub address: Ipv4Addr,
        pub gateway: Ipv4Addr,
        pub netmask_bits: u8,
        pub channel: u8,
        pub hostname: String,
    }

    #[derive(Clone, Debug, Deserialize, PartialEq)]
    pub struct HttpSettings {
        pub port: u16,
    }

    #[derive(Clone, Debug, Deserialize, PartialEq)]
    pub struct UdpSettings {
        pub port: u16,
        pub target: Ipv4Addr,
        pub broadcast: Ipv4Addr,
        pub start_in_broadcast: bool,
    }

    #[derive(Clone, Debug, Deserialize, PartialEq)]
    pub struct EncoderSettings {
        pub circumference_cm: f64,
        pub pulses_per_revolution: u32,
        pub sample_interval_ms: u64,
        pub filter_cycles: u16,
    }

    #[derive(Clone, Debug, Deserialize, PartialEq)]
    pub struct AppSettings {
        pub access_point: AccessPointSettings,
        pub http: HttpSettings,
        pub udp: UdpSettings,
        pub encoder: EncoderSettings,
    }

    impl AppSettings {
        /// Settings compiled into the firmware.
        pub fn load() -> anyhow::Result<Self> {
            Self::build(None)
        }

        /// Defaults with `overrides` (TOML) layered on top.
        pub fn load_with(overrides: &str) -> anyhow::Result<Self> {
            Self::build(Some(overrides))
        }

        fn build(overrides: Option<&str>) -> anyhow::Result<Self> {
            let mut builder =
                Config::builder().add_source(File::from_str(DEFAULT_SETTINGS, FileFormat::Toml));
            if let Some(overrides) = overrides {
                builder = builder.add_source(File::from_str(overrides, FileFormat::Toml));
            }

            let settings = builder.build()?.try_deserialize::<AppSettings>()?;
            settings.validate()?;

            Ok(settings)
        }

        pub fn validate(&self) -> anyhow::Result<()> {
            let ap = &self.access_point;
            if ap.ssid.is_empty() || ap.ssid.len() > MAX_SSID_LEN {
                anyhow::bail!("SSID must be 1 to {} bytes long", MAX_SSID_LEN);
            }
            if !ap.password.is_empty()
                && !(MIN_PSK_LEN..=MAX_PSK_LEN).contains(&ap.password.len())
            {
                anyhow::bail!(
                    "Password must be empty or {} to {} bytes long",
                    MIN_PSK_LEN,
                    MAX_PSK_LEN
                );
            }
            // The device routes for its own network
            if ap.gateway != ap.address {
                anyhow::bail!(
                    "Gateway {} must be the access point address {}",
                    ap.gateway,
                    ap.address
                );
            }
            if !(1..=32).contains(&ap.netmask_bits) {
                anyhow::bail!("Invalid netmask length: /{}", ap.netmask_bits);
            }

            let enc = &self.encoder;
            if enc.pulses_per_revolution == 0 {
                anyhow::bail!("pulses_per_revolution must be positive");
            }
            if enc.sample_interval_ms == 0 {
                anyhow::bail!("sample_interval_ms must be positive");
            }
            if enc.filter_cycles > MAX_FILTER_CYCLES {
                anyhow::bail!(
                    "filter_cycles {} exceeds the PCNT limit of {}",
                    enc.filter_cycles,
                    MAX_FILTER_CYCLES
                );
            }

            Ok(())
        }
    }

}
