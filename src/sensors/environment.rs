//! Environmental readings (BME680-family) through the Linux IIO subsystem.
//!
//! The bme680 IIO driver reports temperature in milli-degrees Celsius,
//! humidity in milli-percent, pressure in kPa and gas resistance in ohms.

use super::EnvironmentSource;
use crate::error::{ControllerError, Result};
use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use strum::Display;

/// One environmental measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentReading {
    pub temperature_c: f32,
    pub humidity_percent: f32,
    pub pressure_hpa: f32,
    /// Heater-stable gas resistance, when gas sensing is available.
    pub gas_resistance_ohms: Option<f32>,
}

impl EnvironmentReading {
    pub fn air_quality(&self) -> Option<AirQuality> {
        self.gas_resistance_ohms.map(AirQuality::from_gas_resistance)
    }
}

/// Rough 0-100 air quality score derived from gas resistance (higher is better).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AirQuality {
    pub score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AirQualityBand {
    Excellent,
    Good,
    Moderate,
    Poor,
    VeryPoor,
}

impl AirQuality {
    pub fn from_gas_resistance(ohms: f32) -> Self {
        let g = f64::from(ohms.max(0.0));
        let score = if g > 200_000.0 {
            90.0 + ((g - 200_000.0) / 50_000.0).min(10.0)
        } else if g > 100_000.0 {
            70.0 + (g - 100_000.0) / 5_000.0
        } else if g > 50_000.0 {
            40.0 + (g - 50_000.0) / 2_500.0
        } else if g > 10_000.0 {
            10.0 + (g - 10_000.0) / 1_334.0
        } else {
            g / 1_000.0
        };
        Self {
            score: score.clamp(0.0, 100.0) as u8,
        }
    }

    pub fn band(&self) -> AirQualityBand {
        match self.score {
            90.. => AirQualityBand::Excellent,
            70..=89 => AirQualityBand::Good,
            40..=69 => AirQualityBand::Moderate,
            10..=39 => AirQualityBand::Poor,
            _ => AirQualityBand::VeryPoor,
        }
    }
}

/// Environment sensor backed by an IIO device directory.
#[derive(Debug)]
pub struct IioEnvironmentSensor {
    device_dir: PathBuf,
}

impl IioEnvironmentSensor {
    pub fn open(device_dir: impl Into<PathBuf>) -> Result<Self> {
        let device_dir = device_dir.into();
        if !device_dir.join("in_temp_input").exists() {
            return Err(ControllerError::SensorRead(format!(
                "{} has no temperature attribute",
                device_dir.display()
            )));
        }
        info!("[Env] Using {}", device_dir.display());
        Ok(Self { device_dir })
    }

    /// Find the first IIO device exposing relative humidity.
    pub fn discover() -> Result<Self> {
        glob::glob("/sys/bus/iio/devices/iio:device*/in_humidityrelative_input")
            .ok()
            .and_then(|paths| paths.flatten().next())
            .and_then(|path| path.parent().map(Path::to_path_buf))
            .ok_or_else(|| {
                ControllerError::SensorRead("no IIO environment sensor found".to_string())
            })
            .and_then(Self::open)
    }

    async fn attribute(&self, name: &str) -> Result<f64> {
        let path = self.device_dir.join(name);
        let text = tokio::fs::read_to_string(&path).await?;
        text.trim().parse().map_err(|_| {
            ControllerError::SensorRead(format!(
                "{}: unexpected value {:?}",
                path.display(),
                text.trim()
            ))
        })
    }
}

#[async_trait]
impl EnvironmentSource for IioEnvironmentSensor {
    async fn read(&mut self) -> Result<EnvironmentReading> {
        let temperature = self.attribute("in_temp_input").await? / 1000.0;
        let humidity = self.attribute("in_humidityrelative_input").await? / 1000.0;
        let pressure_kpa = self.attribute("in_pressure_input").await?;
        let gas = match self.attribute("in_resistance_input").await {
            Ok(ohms) => Some(ohms as f32),
            Err(e) => {
                debug!("[Env] No gas reading: {}", e);
                None
            }
        };

        Ok(EnvironmentReading {
            temperature_c: temperature as f32,
            humidity_percent: humidity as f32,
            pressure_hpa: (pressure_kpa * 10.0) as f32,
            gas_resistance_ohms: gas,
        })
    }
}
