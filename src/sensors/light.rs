//! Ambient light readings through the Linux IIO subsystem.
//!
//! Light sensors such as the LTR-559 expose lux as
//! `/sys/bus/iio/devices/iio:deviceN/in_illuminance_input` (or `_raw` on
//! drivers without scaling).

use super::LightSource;
use crate::error::{ControllerError, Result};
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};

const DISCOVERY_PATTERNS: &[&str] = &[
    "/sys/bus/iio/devices/iio:device*/in_illuminance_input",
    "/sys/bus/iio/devices/iio:device*/in_illuminance_raw",
];

/// One ambient light measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightReading {
    pub lux: f32,
}

/// Light sensor backed by an IIO illuminance attribute.
#[derive(Debug)]
pub struct IioLightSensor {
    path: PathBuf,
}

impl IioLightSensor {
    /// Use the illuminance attribute inside an IIO device directory.
    pub fn open(device_dir: impl AsRef<Path>) -> Result<Self> {
        let dir = device_dir.as_ref();
        let path = ["in_illuminance_input", "in_illuminance_raw"]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .ok_or_else(|| {
                ControllerError::SensorRead(format!(
                    "{} has no illuminance attribute",
                    dir.display()
                ))
            })?;
        info!("[Light] Using {}", path.display());
        Ok(Self { path })
    }

    /// Find the first IIO device reporting illuminance.
    pub fn discover() -> Result<Self> {
        DISCOVERY_PATTERNS
            .iter()
            .find_map(|pattern| glob::glob(pattern).ok()?.flatten().next())
            .and_then(|path| path.parent().map(Path::to_path_buf))
            .ok_or_else(|| ControllerError::SensorRead("no IIO light sensor found".to_string()))
            .and_then(Self::open)
    }
}

#[async_trait]
impl LightSource for IioLightSensor {
    async fn read_lux(&mut self) -> Result<LightReading> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let lux: f32 = text.trim().parse().map_err(|_| {
            ControllerError::SensorRead(format!(
                "{}: unexpected value {:?}",
                self.path.display(),
                text.trim()
            ))
        })?;
        Ok(LightReading { lux })
    }
}
