//! Prints the encoder datagrams pushed by the device.
//!
//! Join the device's access point, then:
//!
//! ```bash
//! RUST_LOG=debug udp_receiver --port 8888
//! ```

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    use anyhow::Context;
    use clap::Parser;
    use log::{error, info, warn};
    use std::io::ErrorKind;
    use std::net::{Ipv4Addr, UdpSocket};
    use std::time::{Duration, Instant};

    use encoderap::receiver::receiver::{decode, format_line, RateMeter, RATE_WINDOW};

    #[derive(Parser, Debug)]
    #[command(name = "udp_receiver")]
    #[command(about = "Listen for encoder datagrams")]
    struct Args {
        /// Address to listen on
        #[arg(short, long, default_value = "0.0.0.0")]
        bind: Ipv4Addr,

        /// UDP port the device pushes to
        #[arg(short, long, default_value_t = 8888)]
        port: u16,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let socket = UdpSocket::bind((args.bind, args.port))
        .with_context(|| format!("binding {}:{}", args.bind, args.port))?;
    // Wake up regularly even when the device is silent
    socket.set_read_timeout(Some(Duration::from_secs(1)))?;
    info!("Listening for encoder data on {}", socket.local_addr()?);

    let mut rate = RateMeter::new(RATE_WINDOW, Instant::now());
    let mut buf = [0u8; 1024];
    loop {
        let (len, from) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) => {
                error!("Receive failed: {}", e);
                return Err(e.into());
            }
        };

        if let Some(per_sec) = rate.record(Instant::now()) {
            info!("Packet rate: {:.1} packets/s", per_sec);
        }

        match decode(&buf[..len]) {
            Ok(packet) => info!("{}", format_line(from, &packet)),
            Err(e) => warn!("Bad datagram from {}: {}", from, e),
        }
    }
}

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    anyhow::bail!("udp_receiver runs on the host")
}
