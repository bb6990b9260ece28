pub mod udp {
    use crate::reading::reading::Reading;
    use crate::settings::settings::UdpSettings;
    use log::{debug, error, warn};
    use serde::Serialize;
    use std::io;
    use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum UdpMode {
        Unicast,
        Broadcast,
    }

    impl UdpMode {
        /// Label shown by the web page and returned by `/udp_toggle`.
        pub fn label(&self) -> &'static str {
            match self {
                UdpMode::Unicast => "IP ESPECÍFICO",
                UdpMode::Broadcast => "BROADCAST",
            }
        }

        pub fn toggled(&self) -> Self {
            match self {
                UdpMode::Unicast => UdpMode::Broadcast,
                UdpMode::Broadcast => UdpMode::Unicast,
            }
        }
    }

    #[derive(Debug, Serialize, PartialEq)]
    pub struct ModeReport {
        pub mode: &'static str,
        pub target: String,
    }

    #[derive(Debug, PartialEq, Eq)]
    pub enum PushOutcome {
        Sent { bytes: usize },
        NoStations,
        Failed,
    }

    /// Anything a datagram can be written to.
    pub trait DatagramSink {
        fn send_datagram(&self, payload: &[u8], dest: SocketAddrV4) -> io::Result<usize>;
    }

    impl DatagramSink for UdpSocket {
        fn send_datagram(&self, payload: &[u8], dest: SocketAddrV4) -> io::Result<usize> {
            self.send_to(payload, dest)
        }
    }

    pub struct UdpPusher<S> {
        socket: S,
        port: u16,
        target: Ipv4Addr,
        broadcast: Ipv4Addr,
        mode: UdpMode,
    }

    impl UdpPusher<UdpSocket> {
        /// Bind an ephemeral socket allowed to send to the broadcast address.
        pub fn bind(settings: &UdpSettings) -> anyhow::Result<Self> {
            let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
            socket.set_broadcast(true)?;

            Ok(Self::new(socket, settings))
        }
    }

    impl<S: DatagramSink> UdpPusher<S> {
        pub fn new(socket: S, settings: &UdpSettings) -> Self {
            let mode = if settings.start_in_broadcast {
                UdpMode::Broadcast
            } else {
                UdpMode::Unicast
            };

            UdpPusher {
                socket,
                port: settings.port,
                target: settings.target,
                broadcast: settings.broadcast,
                mode,
            }
        }

        pub fn mode(&self) -> UdpMode {
            self.mode
        }

        pub fn port(&self) -> u16 {
            self.port
        }

        /// Address datagrams currently go to.
        pub fn target(&self) -> Ipv4Addr {
            match self.mode {
                UdpMode::Unicast => self.target,
                UdpMode::Broadcast => self.broadcast,
            }
        }

        pub fn toggle(&mut self) -> UdpMode {
            self.mode = self.mode.toggled();
            self.mode
        }

        pub fn report(&self) -> ModeReport {
            ModeReport {
                mode: self.mode.label(),
                target: self.target().to_string(),
            }
        }

        /// Send one reading. Never fails: problems are logged and the
        /// datagram is dropped.
        pub fn push(&self, reading: &Reading, timestamp_ms: u64, stations: usize) -> PushOutcome {
            let payload = reading.to_udp_json(timestamp_ms);

            if stations == 0 {
                warn!("No stations attached to the access point, UDP push skipped");
                return PushOutcome::NoStations;
            }

            let dest = SocketAddrV4::new(self.target(), self.port);
            match self.socket.send_datagram(payload.as_bytes(), dest) {
                Ok(bytes) => {
                    debug!("UDP {} sent to {}: {}", self.mode.label(), dest, payload);
                    PushOutcome::Sent { bytes }
                }
                Err(e) => {
                    error!("UDP {} send to {} failed: {}", self.mode.label(), dest, e);
                    PushOutcome::Failed
                }
            }
        }

        #[cfg(test)]
        pub(crate) fn socket(&self) -> &S {
            &self.socket
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::reading::reading::Scale;
        use std::cell::RefCell;
        use std::time::Duration;

        fn settings(port: u16, target: Ipv4Addr) -> UdpSettings {
            UdpSettings {
                port,
                target,
                broadcast: Ipv4Addr::new(192, 168, 4, 255),
                start_in_broadcast: false,
            }
        }

        #[derive(Default)]
        struct Recorder {
            sent: RefCell<Vec<(String, SocketAddrV4)>>,
            fail: bool,
        }

        impl DatagramSink for Recorder {
            fn send_datagram(&self, payload: &[u8], dest: SocketAddrV4) -> io::Result<usize> {
                if self.fail {
                    return Err(io::Error::new(io::ErrorKind::Other, "no route"));
                }
                self.sent
                    .borrow_mut()
                    .push((String::from_utf8(payload.to_vec()).unwrap(), dest));
                Ok(payload.len())
            }
        }

        #[test]
        fn starts_unicast_and_toggle_pair_restores_target() {
            let mut pusher = UdpPusher::new(
                Recorder::default(),
                &settings(8888, Ipv4Addr::new(192, 168, 4, 2)),
            );
            assert_eq!(pusher.mode(), UdpMode::Unicast);
            let original = pusher.report();

            assert_eq!(pusher.toggle(), UdpMode::Broadcast);
            assert_eq!(pusher.target(), Ipv4Addr::new(192, 168, 4, 255));
            assert_eq!(
                pusher.report(),
                ModeReport {
                    mode: "BROADCAST",
                    target: "192.168.4.255".to_string()
                }
            );

            pusher.toggle();
            assert_eq!(pusher.report(), original);
            assert_eq!(original.mode, "IP ESPECÍFICO");
            assert_eq!(original.target, "192.168.4.2");
        }

        #[test]
        fn can_start_in_broadcast() {
            let mut s = settings(8888, Ipv4Addr::new(192, 168, 4, 2));
            s.start_in_broadcast = true;
            let pusher = UdpPusher::new(Recorder::default(), &s);

            assert_eq!(pusher.mode(), UdpMode::Broadcast);
        }

        #[test]
        fn report_serializes_like_the_web_page_expects() {
            let pusher = UdpPusher::new(
                Recorder::default(),
                &settings(8888, Ipv4Addr::new(192, 168, 4, 2)),
            );
            let json = serde_json::to_string(&pusher.report()).unwrap();

            assert_eq!(json, r#"{"mode":"IP ESPECÍFICO","target":"192.168.4.2"}"#);
        }

        #[test]
        fn no_stations_skips_send_and_keeps_mode() {
            let pusher = UdpPusher::new(
                Recorder::default(),
                &settings(8888, Ipv4Addr::new(192, 168, 4, 2)),
            );
            let reading = Scale::new(20.0, 4000).read(200);

            assert_eq!(pusher.push(&reading, 10, 0), PushOutcome::NoStations);
            assert!(pusher.socket().sent.borrow().is_empty());
            assert_eq!(pusher.mode(), UdpMode::Unicast);
        }

        #[test]
        fn sends_to_the_selected_destination() {
            let mut pusher = UdpPusher::new(
                Recorder::default(),
                &settings(8888, Ipv4Addr::new(192, 168, 4, 2)),
            );
            let reading = Scale::new(20.0, 4000).read(200);

            pusher.push(&reading, 1, 1);
            pusher.toggle();
            pusher.push(&reading, 2, 1);

            let sent = pusher.socket().sent.borrow();
            assert_eq!(sent[0].1, SocketAddrV4::new(Ipv4Addr::new(192, 168, 4, 2), 8888));
            assert_eq!(sent[1].1, SocketAddrV4::new(Ipv4Addr::new(192, 168, 4, 255), 8888));
            assert_eq!(
                sent[1].0,
                r#"{"encoder":{"pulses":200,"distance":1.00,"timestamp":2}}"#
            );
        }

        #[test]
        fn send_failure_is_reported_not_raised() {
            let pusher = UdpPusher::new(
                Recorder {
                    fail: true,
                    ..Default::default()
                },
                &settings(8888, Ipv4Addr::new(192, 168, 4, 2)),
            );
            let reading = Scale::new(20.0, 4000).read(5);

            assert_eq!(pusher.push(&reading, 0, 2), PushOutcome::Failed);
        }

        #[test]
        fn datagram_reaches_a_loopback_listener() {
            let listener = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            listener
                .set_read_timeout(Some(Duration::from_secs(2)))
                .unwrap();
            let port = listener.local_addr().unwrap().port();

            let pusher = UdpPusher::bind(&settings(port, Ipv4Addr::LOCALHOST)).unwrap();
            let reading = Scale::new(20.0, 4000).read(-400);
            let outcome = pusher.push(&reading, 42, 1);

            let mut buf = [0u8; 256];
            let (len, _) = listener.recv_from(&mut buf).unwrap();
            let body = std::str::from_utf8(&buf[..len]).unwrap();

            assert_eq!(outcome, PushOutcome::Sent { bytes: len });
            assert_eq!(
                body,
                r#"{"encoder":{"pulses":-400,"distance":-2.00,"timestamp":42}}"#
            );
        }
    }
}
