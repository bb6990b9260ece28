pub mod server {
    use log::warn;
    use std::sync::mpsc;
    use std::sync::mpsc::Sender;
    use std::time::{Duration, Instant};

    static INDEX_HTML: &str = include_str!("index.html");

    // How long an HTTP task waits for the main loop to answer
    pub const REPLY_TIMEOUT: Duration = Duration::from_millis(1000);

    const NO_CACHE_HEADERS: &[(&str, &str)] = &[
        ("Cache-Control", "no-cache, no-store, must-revalidate"),
        ("Pragma", "no-cache"),
        ("Expires", "0"),
        ("Access-Control-Allow-Origin", "*"),
    ];

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Route {
        Index,
        Data,
        Reset,
        UdpToggle,
        UdpTest,
    }

    impl Route {
        pub const ALL: [Route; 5] = [
            Route::Index,
            Route::Data,
            Route::Reset,
            Route::UdpToggle,
            Route::UdpTest,
        ];

        pub fn path(&self) -> &'static str {
            match self {
                Route::Index => "/",
                Route::Data => "/data",
                Route::Reset => "/reset",
                Route::UdpToggle => "/udp_toggle",
                Route::UdpTest => "/udp_test",
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct HttpReply {
        pub status: u16,
        pub content_type: &'static str,
        pub headers: &'static [(&'static str, &'static str)],
        pub body: String,
    }

    impl HttpReply {
        pub fn html(body: &str) -> Self {
            HttpReply {
                status: 200,
                content_type: "text/html; charset=utf-8",
                headers: &[],
                body: body.to_owned(),
            }
        }

        pub fn json(body: String) -> Self {
            HttpReply {
                status: 200,
                content_type: "application/json",
                headers: &[],
                body,
            }
        }

        pub fn text(body: &str) -> Self {
            HttpReply {
                status: 200,
                content_type: "text/plain; charset=utf-8",
                headers: &[],
                body: body.to_owned(),
            }
        }

        pub fn unavailable() -> Self {
            HttpReply {
                status: 503,
                ..HttpReply::text("Device busy, try again")
            }
        }

        pub fn no_cache(self) -> Self {
            HttpReply {
                headers: NO_CACHE_HEADERS,
                ..self
            }
        }

        /// Header list ready to hand to the HTTP connection.
        pub fn header_list(&self) -> Vec<(&'static str, &'static str)> {
            let mut headers = vec![("Content-Type", self.content_type)];
            headers.extend_from_slice(self.headers);
            headers
        }
    }

    pub fn index() -> HttpReply {
        HttpReply::html(INDEX_HTML)
    }

    /// A request forwarded from an HTTP task to the owner of the device state.
    /// Past `deadline` the client has already been answered 503, so the
    /// request must not run.
    #[derive(Debug)]
    pub struct ServableDataReq {
        pub route: Route,
        pub reply: Sender<HttpReply>,
        pub deadline: Instant,
    }

    impl ServableDataReq {
        pub fn is_expired(&self, now: Instant) -> bool {
            now >= self.deadline
        }
    }

    pub trait ServableData {
        fn get_channel(&mut self) -> Sender<ServableDataReq>;
        /// Answer at most one pending request. Returns whether one was handled.
        fn handle_server_req(&mut self) -> bool;
    }

    /// Forward `route` over `channel` and block until it is answered or
    /// `timeout` elapses.
    pub fn request(channel: &Sender<ServableDataReq>, route: Route, timeout: Duration) -> HttpReply {
        let (tx, rx) = mpsc::channel::<HttpReply>();
        let req = ServableDataReq {
            route,
            reply: tx,
            deadline: Instant::now() + timeout,
        };
        if channel.send(req).is_err() {
            warn!("No handler listening for {}", route.path());
            return HttpReply::unavailable();
        }

        match rx.recv_timeout(timeout) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("No reply for {}: {}", route.path(), e);
                HttpReply::unavailable()
            }
        }
    }

    #[cfg(target_os = "espidf")]
    pub use self::esp::Server;

    #[cfg(target_os = "espidf")]
    mod esp {
        use super::{index, request, Route, ServableData, ServableDataReq, REPLY_TIMEOUT};
        use embedded_svc::{http::Method, io::Write};
        use esp_idf_svc::http::server::EspHttpServer;
        use log::info;
        use std::sync::mpsc::Sender;

        const STACK_SIZE: usize = 10240;

        pub struct Server<'a> {
            // Handlers stay registered while this is held
            #[allow(dead_code)]
            server: Option<EspHttpServer<'a>>,
            data_channel: Option<Sender<ServableDataReq>>,
            port: u16,
        }

        impl<'a> Server<'a> {
            pub fn new(port: u16) -> Self {
                Server {
                    server: None,
                    data_channel: None,
                    port,
                }
            }

            pub fn add_data_channel(&mut self, obj: &mut impl ServableData) {
                self.data_channel = Some(obj.get_channel())
            }

            // Start server listeners
            pub fn start(&mut self) -> anyhow::Result<()> {
                let Some(data_channel) = self.data_channel.clone() else {
                    anyhow::bail!("HTTP server started without a data channel");
                };

                let server_configuration = esp_idf_svc::http::server::Configuration {
                    http_port: self.port,
                    stack_size: STACK_SIZE,
                    ..Default::default()
                };

                let mut server = EspHttpServer::new(&server_configuration)?;

                for route in Route::ALL {
                    let channel = data_channel.clone();
                    server.fn_handler::<anyhow::Error, _>(route.path(), Method::Get, move |req| {
                        let reply = match route {
                            // Static page, no device state involved
                            Route::Index => index(),
                            _ => request(&channel, route, REPLY_TIMEOUT),
                        };

                        req.into_response(reply.status, None, &reply.header_list())?
                            .write_all(reply.body.as_bytes())?;

                        Ok(())
                    })?;
                }

                info!("HTTP server listening on port {}", self.port);
                self.server = Some(server);

                Ok(())
            }
        }
    }

}
