pub mod receiver {
    use serde::Deserialize;
    use std::net::SocketAddr;
    use std::time::{Duration, Instant};
    use thiserror::Error;

    // How often the packet rate is reported
    pub const RATE_WINDOW: Duration = Duration::from_secs(5);

    /// One encoder sample as pushed by the device.
    #[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
    pub struct EncoderPacket {
        pub pulses: i64,
        pub distance: f64,
        pub timestamp: u64,
    }

    #[derive(Deserialize)]
    struct Datagram {
        encoder: EncoderPacket,
    }

    #[derive(Debug, Error)]
    pub enum DecodeError {
        #[error("not JSON: {source} (data: {raw})")]
        NotJson {
            raw: String,
            source: serde_json::Error,
        },
        #[error("unexpected JSON layout: {source} (json: {json})")]
        BadShape {
            json: serde_json::Value,
            source: serde_json::Error,
        },
    }

    pub fn decode(data: &[u8]) -> Result<EncoderPacket, DecodeError> {
        let json: serde_json::Value =
            serde_json::from_slice(data).map_err(|source| DecodeError::NotJson {
                raw: String::from_utf8_lossy(data).into_owned(),
                source,
            })?;

        match serde_json::from_value::<Datagram>(json.clone()) {
            Ok(datagram) => Ok(datagram.encoder),
            Err(source) => Err(DecodeError::BadShape { json, source }),
        }
    }

    pub fn format_line(from: SocketAddr, packet: &EncoderPacket) -> String {
        format!(
            "{} | Encoder: {:6} pulses | Distance: {:6.2} cm | Timestamp: {:8} ms",
            from, packet.pulses, packet.distance, packet.timestamp
        )
    }

    /// Packets per second, averaged over fixed windows.
    pub struct RateMeter {
        window: Duration,
        window_start: Instant,
        count: u32,
    }

    impl RateMeter {
        pub fn new(window: Duration, now: Instant) -> Self {
            RateMeter {
                window,
                window_start: now,
                count: 0,
            }
        }

        /// Count one packet. Once a full window has passed, returns the rate
        /// and starts a new window.
        pub fn record(&mut self, now: Instant) -> Option<f32> {
            self.count += 1;
            if now.duration_since(self.window_start) < self.window {
                return None;
            }

            let rate = self.count as f32 / self.window.as_secs_f32();
            self.count = 0;
            self.window_start = now;
            Some(rate)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::reading::reading::Scale;

        fn from() -> SocketAddr {
            "192.168.4.1:49152".parse().unwrap()
        }

        #[test]
        fn decodes_what_the_device_sends() {
            let body = Scale::new(20.0, 4000).read(200).to_udp_json(5123);
            let packet = decode(body.as_bytes()).unwrap();

            assert_eq!(packet.pulses, 200);
            assert_eq!(packet.distance, 1.0);
            assert_eq!(packet.timestamp, 5123);
        }

        #[test]
        fn negative_counts_decode() {
            let packet =
                decode(br#"{"encoder":{"pulses":-1000,"distance":-5.00,"timestamp":0}}"#).unwrap();
            assert_eq!(packet.pulses, -1000);
            assert_eq!(packet.distance, -5.0);
        }

        #[test]
        fn garbage_is_not_json() {
            let err = decode(b"hello \xff").unwrap_err();
            assert!(matches!(err, DecodeError::NotJson { .. }));
            assert!(err.to_string().contains("hello"));
        }

        #[test]
        fn missing_encoder_key_is_bad_shape() {
            let err = decode(br#"{"distance":1.00,"pulses":200}"#).unwrap_err();
            let DecodeError::BadShape { json, .. } = &err else {
                panic!("wrong error: {err}");
            };
            assert_eq!(json["pulses"], 200);
            assert!(err.to_string().contains("encoder"));
        }

        #[test]
        fn missing_field_is_bad_shape() {
            let err = decode(br#"{"encoder":{"pulses":1,"distance":0.01}}"#).unwrap_err();
            assert!(matches!(err, DecodeError::BadShape { .. }));
            assert!(err.to_string().contains("timestamp"));
        }

        #[test]
        fn line_pads_columns() {
            let packet = EncoderPacket {
                pulses: 200,
                distance: 1.0,
                timestamp: 5123,
            };
            assert_eq!(
                format_line(from(), &packet),
                "192.168.4.1:49152 | Encoder:    200 pulses | Distance:   1.00 cm | Timestamp:     5123 ms"
            );
        }

        #[test]
        fn rate_is_reported_once_per_window() {
            let start = Instant::now();
            let mut meter = RateMeter::new(RATE_WINDOW, start);

            // 10 Hz for just under one window
            for i in 1..50 {
                assert_eq!(meter.record(start + Duration::from_millis(i * 100)), None);
            }
            assert_eq!(meter.record(start + RATE_WINDOW), Some(10.0));

            // Next window starts empty
            assert_eq!(meter.record(start + RATE_WINDOW + Duration::from_secs(1)), None);
            assert_eq!(meter.record(start + RATE_WINDOW * 2), Some(0.4));
        }

        #[test]
        fn late_packet_closes_the_window() {
            let start = Instant::now();
            let mut meter = RateMeter::new(RATE_WINDOW, start);

            assert_eq!(meter.record(start + Duration::from_secs(30)), Some(0.2));
        }
    }
}
