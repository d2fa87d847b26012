use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum ControllerError {
    #[error("Range sample unavailable: {0}")]
    SampleUnavailable(String),

    #[error("Failed to write brightness {level}: {reason}")]
    SinkWrite { level: u32, reason: String },

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("No backlight control found: {0}")]
    BacklightNotFound(String),

    #[error("Invalid range frame: {0}")]
    InvalidFrame(String),

    #[error("Sensor read failed: {0}")]
    SensorRead(String),

    #[error(transparent)]
    Mqtt(#[from] rumqttc::ClientError),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
