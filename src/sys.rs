pub mod sys {
    use std::time::Instant;

    /// Monotonic milliseconds since boot.
    pub trait Clock {
        fn now_ms(&self) -> u64;
    }

    pub struct BootClock {
        boot: Instant,
    }

    impl BootClock {
        // Taken as the first thing in main, so it tracks time since boot
        pub fn new() -> Self {
            BootClock {
                boot: Instant::now(),
            }
        }
    }

    impl Default for BootClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for BootClock {
        fn now_ms(&self) -> u64 {
            self.boot.elapsed().as_millis() as u64
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::time::Duration;

        #[test]
        fn boot_clock_is_monotonic() {
            let clock = BootClock::new();
            let first = clock.now_ms();
            std::thread::sleep(Duration::from_millis(5));
            let second = clock.now_ms();

            assert!(second >= first + 5);
        }
    }
}
