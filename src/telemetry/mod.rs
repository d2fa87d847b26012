//! Fire-and-forget publishing of sensor readings.

pub mod mqtt;

pub use mqtt::{MqttTelemetry, TopicScheme};

use std::fmt;

/// A single telemetry reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl TelemetryValue {
    /// Wire payload: integers as-is, floats with two decimals, booleans as `ON`/`OFF`.
    pub fn payload(&self) -> String {
        self.to_string()
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, TelemetryValue::Bool(_))
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryValue::Integer(v) => write!(f, "{}", v),
            TelemetryValue::Float(v) => write!(f, "{:.2}", v),
            TelemetryValue::Bool(true) => f.write_str("ON"),
            TelemetryValue::Bool(false) => f.write_str("OFF"),
        }
    }
}

impl From<bool> for TelemetryValue {
    fn from(value: bool) -> Self {
        TelemetryValue::Bool(value)
    }
}

impl From<u32> for TelemetryValue {
    fn from(value: u32) -> Self {
        TelemetryValue::Integer(i64::from(value))
    }
}

impl From<u16> for TelemetryValue {
    fn from(value: u16) -> Self {
        TelemetryValue::Integer(i64::from(value))
    }
}

impl From<u8> for TelemetryValue {
    fn from(value: u8) -> Self {
        TelemetryValue::Integer(i64::from(value))
    }
}

impl From<f32> for TelemetryValue {
    fn from(value: f32) -> Self {
        TelemetryValue::Float(f64::from(value))
    }
}

impl From<f64> for TelemetryValue {
    fn from(value: f64) -> Self {
        TelemetryValue::Float(value)
    }
}

/// Sink for named readings. Publishing never blocks and never fails the caller.
pub trait TelemetryPublisher: Send + Sync {
    fn publish(&self, name: &str, value: TelemetryValue);
}

impl<T: TelemetryPublisher + ?Sized> TelemetryPublisher for std::sync::Arc<T> {
    fn publish(&self, name: &str, value: TelemetryValue) {
        (**self).publish(name, value)
    }
}

/// Publisher used when telemetry is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTelemetry;

impl TelemetryPublisher for NoTelemetry {
    fn publish(&self, _name: &str, _value: TelemetryValue) {}
}
