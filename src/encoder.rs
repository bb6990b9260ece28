pub mod encoder {
    //! Quadrature decoding on a PCNT unit.
    //!
    //! Both channels count both edges, giving four counts per encoder cycle.
    //! The hardware counter is 16 bits wide; each time it hits a limit the
    //! unit resets to zero and the limit is folded into a software total.

    use crate::reading::reading::PulseCounter;
    use esp_idf_hal::gpio::{AnyInputPin, InputPin};
    use esp_idf_hal::pcnt::*;
    use esp_idf_hal::peripheral::Peripheral;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    const LOW_LIMIT: i16 = -10000;
    const HIGH_LIMIT: i16 = 10000;

    pub struct Encoder<'d> {
        unit: PcntDriver<'d>,
        overflow: Arc<AtomicI32>,
    }

    impl<'d> Encoder<'d> {
        pub fn new<PCNT: Pcnt>(
            pcnt: impl Peripheral<P = PCNT> + 'd,
            pin_a: impl Peripheral<P = impl InputPin> + 'd,
            pin_b: impl Peripheral<P = impl InputPin> + 'd,
            filter_cycles: u16,
        ) -> anyhow::Result<Self> {
            let mut unit = PcntDriver::new(
                pcnt,
                Some(pin_a),
                Some(pin_b),
                Option::<AnyInputPin>::None,
                Option::<AnyInputPin>::None,
            )?;

            // A edges, direction from B
            unit.channel_config(
                PcntChannel::Channel0,
                PinIndex::Pin0,
                PinIndex::Pin1,
                &PcntChannelConfig {
                    lctrl_mode: PcntControlMode::Reverse,
                    hctrl_mode: PcntControlMode::Keep,
                    pos_mode: PcntCountMode::Decrement,
                    neg_mode: PcntCountMode::Increment,
                    counter_h_lim: HIGH_LIMIT,
                    counter_l_lim: LOW_LIMIT,
                },
            )?;
            // B edges, direction from A
            unit.channel_config(
                PcntChannel::Channel1,
                PinIndex::Pin1,
                PinIndex::Pin0,
                &PcntChannelConfig {
                    lctrl_mode: PcntControlMode::Reverse,
                    hctrl_mode: PcntControlMode::Keep,
                    pos_mode: PcntCountMode::Increment,
                    neg_mode: PcntCountMode::Decrement,
                    counter_h_lim: HIGH_LIMIT,
                    counter_l_lim: LOW_LIMIT,
                },
            )?;

            unit.set_filter_value(filter_cycles)?;
            unit.filter_enable()?;

            let overflow = Arc::new(AtomicI32::new(0));
            // SAFETY: the callback only touches an atomic it owns a clone of
            unsafe {
                let overflow = overflow.clone();
                unit.subscribe(move |status| {
                    let status = PcntEventType::from_repr_truncated(status);
                    if status.contains(PcntEvent::HighLimit) {
                        overflow.fetch_add(HIGH_LIMIT as i32, Ordering::SeqCst);
                    }
                    if status.contains(PcntEvent::LowLimit) {
                        overflow.fetch_add(LOW_LIMIT as i32, Ordering::SeqCst);
                    }
                })?;
            }
            unit.event_enable(PcntEvent::HighLimit)?;
            unit.event_enable(PcntEvent::LowLimit)?;

            unit.counter_pause()?;
            unit.counter_clear()?;
            unit.counter_resume()?;

            Ok(Self { unit, overflow })
        }

        pub fn get_value(&self) -> anyhow::Result<i32> {
            let value = self.overflow.load(Ordering::SeqCst) + self.unit.get_counter_value()? as i32;
            Ok(value)
        }

        pub fn clear(&mut self) -> anyhow::Result<()> {
            self.unit.counter_pause()?;
            self.unit.counter_clear()?;
            self.overflow.store(0, Ordering::SeqCst);
            self.unit.counter_resume()?;

            Ok(())
        }
    }

    impl<'d> PulseCounter for Encoder<'d> {
        fn pulses(&self) -> anyhow::Result<i32> {
            self.get_value()
        }

        fn reset(&mut self) -> anyhow::Result<()> {
            self.clear()
        }
    }
}
