pub mod reading {
    use crate::settings::settings::EncoderSettings;

    /// Source of the signed pulse count.
    pub trait PulseCounter {
        fn pulses(&self) -> anyhow::Result<i32>;
        fn reset(&mut self) -> anyhow::Result<()>;
    }

    /// Linear conversion from encoder pulses to centimetres travelled.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct Scale {
        circumference_cm: f64,
        pulses_per_revolution: f64,
    }

    impl Scale {
        pub fn new(circumference_cm: f64, pulses_per_revolution: u32) -> Self {
            Scale {
                circumference_cm,
                pulses_per_revolution: pulses_per_revolution as f64,
            }
        }

        // Multiply before dividing: any i32 times the circumference is still
        // exact in f64, so only the final division rounds.
        pub fn distance(&self, pulses: i32) -> f64 {
            pulses as f64 * self.circumference_cm / self.pulses_per_revolution
        }

        pub fn read(&self, pulses: i32) -> Reading {
            Reading {
                pulses,
                distance: self.distance(pulses),
            }
        }
    }

    impl From<&EncoderSettings> for Scale {
        fn from(settings: &EncoderSettings) -> Self {
            Scale::new(settings.circumference_cm, settings.pulses_per_revolution)
        }
    }

    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct Reading {
        pub pulses: i32,
        pub distance: f64,
    }

    impl Reading {
        // Distance always goes out with two decimals, so the JSON is written
        // by hand instead of through serde_json's float formatting.

        /// Body of `GET /data`.
        pub fn to_http_json(&self) -> String {
            format!(
                r#"{{"distance":{:.2},"pulses":{}}}"#,
                self.distance, self.pulses
            )
        }

        /// Datagram pushed to UDP listeners.
        pub fn to_udp_json(&self, timestamp_ms: u64) -> String {
            format!(
                r#"{{"encoder":{{"pulses":{},"distance":{:.2},"timestamp":{}}}}}"#,
                self.pulses, self.distance, timestamp_ms
            )
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        fn wheel() -> Scale {
            Scale::new(20.0, 4000)
        }

        #[test]
        fn one_pulse_is_five_hundredths_of_a_mm() {
            assert_eq!(wheel().distance(1), 0.005);
            assert_eq!(wheel().distance(-1), -0.005);
        }

        #[test]
        fn distance_matches_exact_decimal() {
            let scale = wheel();
            for (pulses, expected) in [
                (0, "0.00"),
                (2, "0.01"),
                (200, "1.00"),
                (123_456, "617.28"),
                (100_000_002, "500000.01"),
                (123_456_788, "617283.94"),
                (2_000_000_002, "10000000.01"),
                (i32::MAX - 1, "10737418.23"),
                (-100_000_002, "-500000.01"),
            ] {
                assert_eq!(format!("{:.2}", scale.distance(pulses)), expected, "{pulses}");
            }
        }

        #[test]
        fn large_counts_keep_the_cents_in_json() {
            assert_eq!(
                wheel().read(100_000_002).to_http_json(),
                r#"{"distance":500000.01,"pulses":100000002}"#
            );
            assert_eq!(
                wheel().read(2_000_000_002).to_udp_json(7),
                r#"{"encoder":{"pulses":2000000002,"distance":10000000.01,"timestamp":7}}"#
            );
        }

        #[test]
        fn full_revolution_is_one_circumference() {
            assert_eq!(format!("{:.2}", wheel().distance(4000)), "20.00");
            assert_eq!(format!("{:.2}", wheel().distance(-4000)), "-20.00");
        }

        #[test]
        fn http_json_has_two_decimals() {
            assert_eq!(
                wheel().read(200).to_http_json(),
                r#"{"distance":1.00,"pulses":200}"#
            );
            assert_eq!(
                wheel().read(0).to_http_json(),
                r#"{"distance":0.00,"pulses":0}"#
            );
            assert_eq!(
                wheel().read(-1000).to_http_json(),
                r#"{"distance":-5.00,"pulses":-1000}"#
            );
        }

        #[test]
        fn http_json_parses_with_both_keys() {
            let body = wheel().read(1234).to_http_json();
            let value: serde_json::Value = serde_json::from_str(&body).unwrap();

            assert_eq!(value["pulses"], 1234);
            assert!((value["distance"].as_f64().unwrap() - 6.17).abs() < 1e-9);
        }

        #[test]
        fn udp_json_nests_under_encoder() {
            let body = wheel().read(200).to_udp_json(5123);
            assert_eq!(
                body,
                r#"{"encoder":{"pulses":200,"distance":1.00,"timestamp":5123}}"#
            );

            let value: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(value["encoder"]["timestamp"], 5123);
        }
    }
}
