//! Proximity-driven display brightness controller.
//!
//! A multi-zone time-of-flight sensor decides whether someone is standing in
//! front of the display; the backlight fades up when they arrive and back
//! down once they leave. Ambient light and climate sensors are optional and
//! can be published to Home Assistant over MQTT.

pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod fade;
pub mod presence;
pub mod sensors;
pub mod telemetry;

pub use config::Config;
pub use controller::{Controller, Sources};
pub use error::{ControllerError, Result};

/// Initialise `env_logger` with `default_level` unless `RUST_LOG` says otherwise.
pub fn init_logger(default_level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}
