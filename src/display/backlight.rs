//! Linux sysfs backlight control.
//!
//! Brightness is a decimal integer in `/sys/class/backlight/<dev>/brightness`,
//! with the hardware maximum next to it in `max_brightness`.

use super::BrightnessSink;
use crate::error::{ControllerError, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Used when `max_brightness` cannot be read.
const DEFAULT_MAX_BRIGHTNESS: u32 = 255;

/// Patterns tried when the configured one matches nothing.
const FALLBACK_PATTERNS: &[&str] = &[
    "/sys/class/backlight/*/brightness",
    "/sys/class/backlight/rpi_backlight/brightness",
    "/sys/class/backlight/11-0045/brightness",
    "/sys/class/backlight/10-0045/brightness",
];

/// Backlight driven through a sysfs `brightness` file.
#[derive(Debug)]
pub struct SysfsBacklight {
    brightness_path: PathBuf,
    max_brightness: u32,
}

impl SysfsBacklight {
    /// Find a backlight matching `pattern`, falling back to well-known device paths.
    pub fn discover(pattern: &str) -> Result<Self> {
        let path = std::iter::once(pattern)
            .chain(FALLBACK_PATTERNS.iter().copied())
            .find_map(first_match)
            .ok_or_else(|| {
                ControllerError::BacklightNotFound(format!(
                    "nothing matches {pattern}; check `ls /sys/class/backlight/`"
                ))
            })?;
        Self::open(path)
    }

    /// Use a specific `brightness` file.
    pub fn open(brightness_path: impl Into<PathBuf>) -> Result<Self> {
        let brightness_path = brightness_path.into();
        if !brightness_path.exists() {
            return Err(ControllerError::BacklightNotFound(
                brightness_path.display().to_string(),
            ));
        }

        let max_path = brightness_path.with_file_name("max_brightness");
        let max_brightness = match read_u32(&max_path) {
            Ok(max) => max,
            Err(e) => {
                warn!(
                    "[Display] Cannot read {}: {}, assuming {}",
                    max_path.display(),
                    e,
                    DEFAULT_MAX_BRIGHTNESS
                );
                DEFAULT_MAX_BRIGHTNESS
            }
        };

        info!(
            "[Display] Backlight {} (max brightness {})",
            brightness_path.display(),
            max_brightness
        );

        Ok(Self {
            brightness_path,
            max_brightness,
        })
    }

    pub fn path(&self) -> &Path {
        &self.brightness_path
    }

    /// Read the level currently applied by the driver.
    pub fn read_level(&self) -> Result<u32> {
        read_u32(&self.brightness_path)
    }
}

impl BrightnessSink for SysfsBacklight {
    fn write(&mut self, level: u32) -> Result<()> {
        let level = level.min(self.max_brightness);
        fs::write(&self.brightness_path, level.to_string()).map_err(|e| {
            ControllerError::SinkWrite {
                level,
                reason: e.to_string(),
            }
        })?;
        debug!("[Display] brightness = {}", level);
        Ok(())
    }

    fn max_brightness(&self) -> u32 {
        self.max_brightness
    }

    fn current_level(&self) -> Option<u32> {
        self.read_level().ok()
    }
}

fn first_match(pattern: &str) -> Option<PathBuf> {
    glob::glob(pattern).ok()?.flatten().next()
}

fn read_u32(path: &Path) -> Result<u32> {
    let text = fs::read_to_string(path)?;
    text.trim().parse().map_err(|e| {
        ControllerError::SensorRead(format!("{}: {:?} is not a number ({e})", path.display(), text.trim()))
    })
}
