#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use log::info;

    use esp_idf_svc::hal::{delay::FreeRtos, peripherals::Peripherals};
    use esp_idf_svc::log::EspLogger;
    use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs::EspDefaultNvsPartition};

    use encoderap::app::app::App;
    use encoderap::encoder::encoder::Encoder;
    use encoderap::server::server::Server;
    use encoderap::settings::settings::AppSettings;
    use encoderap::sys::sys::BootClock;
    use encoderap::udp::udp::UdpPusher;
    use encoderap::wifi::wifi::Wifi;

    // Let the RTOS run its own tasks between loop passes
    const LOOP_DELAY_MS: u32 = 10;

    let clock = BootClock::new();

    // It is necessary to call this function once. Otherwise some patches to the runtime
    // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
    esp_idf_svc::sys::link_patches();

    // Bind the log crate to the ESP Logging facilities
    EspLogger::initialize_default();

    let settings = AppSettings::load().context("loading settings")?;

    // Setup ESP-type stuff
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // Encoder channels A and B on GPIO18 and GPIO19
    let encoder = Encoder::new(
        peripherals.pcnt0,
        peripherals.pins.gpio18,
        peripherals.pins.gpio19,
        settings.encoder.filter_cycles,
    )
    .context("attaching encoder")?;

    let mut wifi = Wifi::new(
        peripherals.modem,
        &sys_loop,
        &nvs,
        &settings.access_point,
        settings.http.port,
    )
    .context("creating wifi")?;
    wifi.start_ap().context("starting access point")?;

    let pusher = UdpPusher::bind(&settings.udp).context("binding UDP socket")?;

    let mut app = App::new(encoder, wifi, pusher, clock, &settings.encoder);

    let mut server = Server::new(settings.http.port);
    server.add_data_channel(&mut app);
    server.start().context("starting HTTP server")?;

    info!("=== System ready ===");
    info!(
        "Join {} and browse to http://{}",
        settings.access_point.ssid, settings.access_point.address
    );
    info!(
        "UDP broadcast: {}:{}",
        settings.udp.broadcast, settings.udp.port
    );
    info!("UDP unicast: {}:{}", settings.udp.target, settings.udp.port);
    info!("Initial UDP mode: {}", app.udp_mode().label());
    info!(
        "Pushing readings every {} ms",
        settings.encoder.sample_interval_ms
    );

    loop {
        app.poll();
        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("encoderap runs on an ESP-IDF target, build with --target xtensa-esp32-espidf")
}
