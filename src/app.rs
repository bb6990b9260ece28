pub mod app {
    use crate::reading::reading::{PulseCounter, Reading, Scale};
    use crate::server::server::{index, HttpReply, Route, ServableData, ServableDataReq};
    use crate::settings::settings::EncoderSettings;
    use crate::sys::sys::Clock;
    use crate::udp::udp::{DatagramSink, PushOutcome, UdpMode, UdpPusher};
    use log::{error, info, warn};
    use std::net::Ipv4Addr;
    use std::sync::mpsc;
    use std::time::Instant;

    /// What the loop needs to know about the hosted wifi network.
    pub trait AccessPoint {
        fn station_count(&self) -> anyhow::Result<usize>;
        fn ip_addr(&self) -> anyhow::Result<Ipv4Addr>;
    }

    /// Owns all device state. HTTP tasks reach it only through the request
    /// channel, so every mutation happens on the loop's thread.
    pub struct App<C, A, S, K> {
        counter: C,
        ap: A,
        pusher: UdpPusher<S>,
        clock: K,
        scale: Scale,
        interval_ms: u64,
        last_fire: u64,
        server_channel: Option<mpsc::Receiver<ServableDataReq>>,
    }

    impl<C, A, S, K> App<C, A, S, K>
    where
        C: PulseCounter,
        A: AccessPoint,
        S: DatagramSink,
        K: Clock,
    {
        pub fn new(
            counter: C,
            ap: A,
            pusher: UdpPusher<S>,
            clock: K,
            settings: &EncoderSettings,
        ) -> Self {
            App {
                counter,
                ap,
                pusher,
                clock,
                scale: Scale::from(settings),
                interval_ms: settings.sample_interval_ms,
                last_fire: 0,
                server_channel: None,
            }
        }

        pub fn reading(&self) -> anyhow::Result<Reading> {
            Ok(self.scale.read(self.counter.pulses()?))
        }

        pub fn udp_mode(&self) -> UdpMode {
            self.pusher.mode()
        }

        pub fn udp_target(&self) -> Ipv4Addr {
            self.pusher.target()
        }

        /// One pass of the main loop: answer a pending HTTP request, then run
        /// the periodic sample if it is due.
        pub fn poll(&mut self) {
            self.handle_server_req();
            self.tick();
        }

        /// Sample and push when at least one interval has passed since the
        /// last fire. The next interval starts after the push, so overruns add
        /// up instead of being caught up. Returns whether it fired.
        pub fn tick(&mut self) -> bool {
            if self.clock.now_ms().saturating_sub(self.last_fire) < self.interval_ms {
                return false;
            }

            match self.reading() {
                Ok(reading) => {
                    info!("{:.2} cm ({} pulses)", reading.distance, reading.pulses);
                    self.push(&reading);
                }
                Err(e) => error!("Failed to read encoder: {:?}", e),
            }

            self.last_fire = self.clock.now_ms();
            true
        }

        fn push(&self, reading: &Reading) -> PushOutcome {
            match self.ap.station_count() {
                Ok(stations) => self.pusher.push(reading, self.clock.now_ms(), stations),
                Err(e) => {
                    error!("Couldn't query attached stations: {:?}", e);
                    PushOutcome::Failed
                }
            }
        }

        fn push_now(&self) -> anyhow::Result<PushOutcome> {
            let reading = self.reading()?;
            Ok(self.push(&reading))
        }

        /// Produce the reply for `route`. Failures turn into a 500.
        pub fn handle(&mut self, route: Route) -> HttpReply {
            match self.respond(route) {
                Ok(reply) => reply,
                Err(e) => {
                    error!("{} failed: {:?}", route.path(), e);
                    HttpReply {
                        status: 500,
                        ..HttpReply::text("Internal error")
                    }
                }
            }
        }

        fn respond(&mut self, route: Route) -> anyhow::Result<HttpReply> {
            let reply = match route {
                Route::Index => index(),
                Route::Data => HttpReply::json(self.reading()?.to_http_json()).no_cache(),
                Route::Reset => {
                    self.counter.reset()?;
                    info!("Encoder reset");
                    HttpReply::text("Encoder reset")
                }
                Route::UdpToggle => {
                    self.pusher.toggle();
                    let report = self.pusher.report();
                    info!("UDP mode switched to {} - {}", report.mode, report.target);
                    HttpReply::json(serde_json::to_string(&report)?)
                }
                Route::UdpTest => {
                    info!("=== UDP test ===");
                    match self.ap.station_count() {
                        Ok(n) => info!("Stations attached: {}", n),
                        Err(e) => warn!("Stations attached: unknown ({:?})", e),
                    }
                    match self.ap.ip_addr() {
                        Ok(ip) => info!("AP address: {}", ip),
                        Err(e) => warn!("AP address: unknown ({:?})", e),
                    }
                    info!(
                        "UDP mode: {} - {}:{}",
                        self.pusher.mode().label(),
                        self.pusher.target(),
                        self.pusher.port()
                    );

                    let outcome = self.push_now()?;
                    info!("UDP test result: {:?}", outcome);
                    HttpReply::text("UDP test sent, check the serial log")
                }
            };

            Ok(reply)
        }
    }

    impl<C, A, S, K> ServableData for App<C, A, S, K>
    where
        C: PulseCounter,
        A: AccessPoint,
        S: DatagramSink,
        K: Clock,
    {
        fn get_channel(&mut self) -> mpsc::Sender<ServableDataReq> {
            let (tx, rx) = mpsc::channel::<ServableDataReq>();
            self.server_channel = Some(rx);
            tx
        }

        fn handle_server_req(&mut self) -> bool {
            let Some(req) = self
                .server_channel
                .as_ref()
                .and_then(|channel| channel.try_recv().ok())
            else {
                return false;
            };

            if req.is_expired(Instant::now()) {
                warn!("Dropped {}, client already timed out", req.route.path());
                return true;
            }

            let reply = self.handle(req.route);
            if req.reply.send(reply).is_err() {
                // HTTP task gave up waiting
                warn!("Reply to {} dropped", req.route.path());
            }

            true
        }
    }

}
