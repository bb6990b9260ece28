pub mod app;
pub mod reading;
pub mod server;
pub mod settings;
pub mod sys;
pub mod udp;

#[cfg(target_os = "espidf")]
pub mod encoder;
#[cfg(target_os = "espidf")]
pub mod wifi;

#[cfg(not(target_os = "espidf"))]
pub mod receiver;
