use crate::display::{AdaptiveBrightness, LevelBounds};
use crate::error::{ControllerError, Result};
use crate::fade::Easing;
use crate::presence::{PresenceConfig, Resolution};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Load environment variables from .env file with robust parsing.
/// Handles values with spaces without requiring quotes.
pub fn load_dotenv() {
    load_dotenv_from(Path::new(".env"));
}

/// Same as [`load_dotenv`] for an explicit file.
pub fn load_dotenv_from(env_path: &Path) {
    let content = match fs::read_to_string(env_path) {
        Ok(c) => c,
        Err(_) => return,
    };

    for line in content.lines() {
        let line = line.trim();

        // Skip empty lines and comments
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            let mut value = value.trim();

            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = &value[1..value.len() - 1];
            }

            // Real environment wins over the file
            if std::env::var(key).is_err() {
                // SAFETY: We're single-threaded at this point (called before any async runtime)
                unsafe { std::env::set_var(key, value) };
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub detection: PresenceConfig,
    pub display: DisplayConfig,
    pub system: SystemConfig,
    pub range_sensor: RangeSensorConfig,
    pub light_sensor: LightSensorConfig,
    pub environment: EnvironmentConfig,
    pub mqtt: MqttConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub fade_in_duration_s: f64,
    pub fade_out_duration_s: f64,
    pub fade_steps: u32,
    pub fade_easing: Easing,
    pub min_brightness: u32,
    pub max_brightness: u32,
    /// Glob pattern for the sysfs brightness file.
    pub brightness_path: String,
    pub adaptive_brightness_enabled: bool,
    pub adaptive_floor: u32,
    pub light_threshold_low: f32,
    pub light_threshold_high: f32,
    pub adaptive_fade_duration_s: f64,
    pub shutdown_fade_duration_s: f64,
    /// Fade to `min_brightness` when the controller starts.
    pub startup_fade_duration_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfig {
    pub poll_interval_s: f64,
    pub log_level: String,
    /// Presence polls between status log lines.
    pub status_every: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeSensorConfig {
    pub resolution: Resolution,
    /// FIFO or file with JSON frames, `-` for stdin. Simulated when unset.
    pub frames_path: Option<String>,
    pub stale_after_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightSensorConfig {
    pub enabled: bool,
    /// IIO device directory. Discovered when unset.
    pub iio_path: Option<String>,
    pub update_interval_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub enabled: bool,
    /// IIO device directory. Discovered when unset.
    pub iio_path: Option<String>,
    pub update_interval_s: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub enabled: bool,
    pub broker_host: String,
    pub broker_port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
    pub discovery_prefix: String,
    pub device_id: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detection: PresenceConfig::default(),
            display: DisplayConfig {
                fade_in_duration_s: 2.0,
                fade_out_duration_s: 3.0,
                fade_steps: 120,
                fade_easing: Easing::EaseInOut,
                min_brightness: 0,
                max_brightness: 255,
                brightness_path: "/sys/class/backlight/*/brightness".to_string(),
                adaptive_brightness_enabled: true,
                adaptive_floor: 20,
                light_threshold_low: 10.0,
                light_threshold_high: 500.0,
                adaptive_fade_duration_s: 1.0,
                shutdown_fade_duration_s: 1.0,
                startup_fade_duration_s: 0.5,
            },
            system: SystemConfig {
                poll_interval_s: 0.1,
                log_level: "info".to_string(),
                status_every: 50,
            },
            range_sensor: RangeSensorConfig {
                resolution: Resolution::Grid8x8,
                frames_path: None,
                stale_after_s: 1.0,
            },
            light_sensor: LightSensorConfig {
                enabled: true,
                iio_path: None,
                update_interval_s: 2.0,
            },
            environment: EnvironmentConfig {
                enabled: true,
                iio_path: None,
                update_interval_s: 2.0,
            },
            mqtt: MqttConfig {
                enabled: false,
                broker_host: "localhost".to_string(),
                broker_port: 1883,
                client_id: "proximity-display".to_string(),
                username: None,
                password: None,
                topic_prefix: "homedash".to_string(),
                discovery_prefix: "homeassistant".to_string(),
                device_id: "homedash_sensor".to_string(),
            },
        }
    }
}

/// Parse `key` from the environment if it is set.
///
/// A set but unparsable value is a configuration error rather than silently ignored.
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ControllerError::ConfigInvalid(format!("{key}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn env_bool(key: &str) -> Result<Option<bool>> {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(ControllerError::ConfigInvalid(format!(
                "{key}={raw:?}: expected true or false"
            ))),
        },
        Err(_) => Ok(None),
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

macro_rules! override_from_env {
    ($target:expr, $parse:ident, $key:literal) => {
        if let Some(value) = $parse($key)? {
            $target = value;
        }
    };
}

impl Config {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Detection
        override_from_env!(config.detection.threshold_mm, env_parse, "THRESHOLD_MM");
        override_from_env!(config.detection.min_zones, env_parse, "MIN_ZONES");
        override_from_env!(config.detection.consecutive_required, env_parse, "CONSECUTIVE_REQUIRED");
        override_from_env!(config.detection.absence_required, env_parse, "ABSENCE_REQUIRED");

        // Display
        let display = &mut config.display;
        override_from_env!(display.fade_in_duration_s, env_parse, "FADE_IN_DURATION_S");
        override_from_env!(display.fade_out_duration_s, env_parse, "FADE_OUT_DURATION_S");
        override_from_env!(display.fade_steps, env_parse, "FADE_STEPS");
        override_from_env!(display.fade_easing, env_parse, "FADE_EASING");
        override_from_env!(display.min_brightness, env_parse, "MIN_BRIGHTNESS");
        override_from_env!(display.max_brightness, env_parse, "MAX_BRIGHTNESS");
        if let Some(path) = env_string("BRIGHTNESS_PATH") {
            display.brightness_path = path;
        }
        override_from_env!(display.adaptive_brightness_enabled, env_bool, "ADAPTIVE_BRIGHTNESS");
        override_from_env!(display.adaptive_floor, env_parse, "ADAPTIVE_FLOOR");
        override_from_env!(display.light_threshold_low, env_parse, "LIGHT_THRESHOLD_LOW");
        override_from_env!(display.light_threshold_high, env_parse, "LIGHT_THRESHOLD_HIGH");
        override_from_env!(display.adaptive_fade_duration_s, env_parse, "ADAPTIVE_FADE_DURATION_S");
        override_from_env!(display.shutdown_fade_duration_s, env_parse, "SHUTDOWN_FADE_DURATION_S");
        override_from_env!(display.startup_fade_duration_s, env_parse, "STARTUP_FADE_DURATION_S");

        // System
        override_from_env!(config.system.poll_interval_s, env_parse, "POLL_INTERVAL_S");
        if let Some(level) = env_string("LOG_LEVEL") {
            config.system.log_level = level;
        }
        override_from_env!(config.system.status_every, env_parse, "STATUS_EVERY");

        // Range sensor
        if let Some(zones) = env_parse::<u16>("RANGE_RESOLUTION")? {
            config.range_sensor.resolution =
                Resolution::try_from(zones).map_err(ControllerError::ConfigInvalid)?;
        }
        if let Some(path) = env_string("RANGE_FRAMES_PATH") {
            config.range_sensor.frames_path = Some(path);
        }
        override_from_env!(config.range_sensor.stale_after_s, env_parse, "RANGE_STALE_AFTER_S");

        // Light sensor
        override_from_env!(config.light_sensor.enabled, env_bool, "LIGHT_SENSOR_ENABLED");
        if let Some(path) = env_string("LIGHT_SENSOR_IIO_PATH") {
            config.light_sensor.iio_path = Some(path);
        }
        override_from_env!(config.light_sensor.update_interval_s, env_parse, "LIGHT_SENSOR_UPDATE_INTERVAL_S");

        // Environment sensor
        override_from_env!(config.environment.enabled, env_bool, "ENV_SENSOR_ENABLED");
        if let Some(path) = env_string("ENV_SENSOR_IIO_PATH") {
            config.environment.iio_path = Some(path);
        }
        override_from_env!(config.environment.update_interval_s, env_parse, "ENV_SENSOR_UPDATE_INTERVAL_S");

        // MQTT configuration
        override_from_env!(config.mqtt.enabled, env_bool, "MQTT_ENABLED");
        if let Some(host) = env_string("MQTT_BROKER_HOST") {
            config.mqtt.broker_host = host;
        }
        override_from_env!(config.mqtt.broker_port, env_parse, "MQTT_BROKER_PORT");
        if let Some(client_id) = env_string("MQTT_CLIENT_ID") {
            config.mqtt.client_id = client_id;
        }
        if let Some(username) = env_string("MQTT_USERNAME") {
            config.mqtt.username = Some(username);
        }
        if let Some(password) = env_string("MQTT_PASSWORD") {
            config.mqtt.password = Some(password);
        }
        if let Some(prefix) = env_string("MQTT_TOPIC_PREFIX") {
            config.mqtt.topic_prefix = prefix;
        }
        if let Some(prefix) = env_string("MQTT_DISCOVERY_PREFIX") {
            config.mqtt.discovery_prefix = prefix;
        }
        if let Some(device_id) = env_string("MQTT_DEVICE_ID") {
            config.mqtt.device_id = device_id;
        }

        Ok(config)
    }

    /// Check cross-field constraints. Every problem is reported in one error.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        let detection = &self.detection;
        let display = &self.display;

        if display.min_brightness > display.max_brightness {
            problems.push(format!(
                "min_brightness ({}) is above max_brightness ({})",
                display.min_brightness, display.max_brightness
            ));
        }
        if display.max_brightness == 0 {
            problems.push("max_brightness must be positive".to_string());
        }
        if display.adaptive_floor > display.max_brightness {
            problems.push(format!(
                "adaptive_floor ({}) is above max_brightness ({})",
                display.adaptive_floor, display.max_brightness
            ));
        }
        if detection.threshold_mm == 0 {
            problems.push("threshold_mm must be positive".to_string());
        }
        let zone_count = self.range_sensor.resolution.zone_count();
        if detection.min_zones == 0 || detection.min_zones > zone_count {
            problems.push(format!(
                "min_zones ({}) must be between 1 and {}",
                detection.min_zones, zone_count
            ));
        }
        if detection.consecutive_required == 0 {
            problems.push("consecutive_required must be at least 1".to_string());
        }
        if detection.absence_required == 0 {
            problems.push("absence_required must be at least 1".to_string());
        }
        if display.fade_steps == 0 {
            problems.push("fade_steps must be at least 1".to_string());
        }
        if !(display.light_threshold_low < display.light_threshold_high) {
            problems.push(format!(
                "light_threshold_low ({}) must be below light_threshold_high ({})",
                display.light_threshold_low, display.light_threshold_high
            ));
        }

        for (name, seconds) in [
            ("fade_in_duration_s", display.fade_in_duration_s),
            ("fade_out_duration_s", display.fade_out_duration_s),
            ("adaptive_fade_duration_s", display.adaptive_fade_duration_s),
            ("shutdown_fade_duration_s", display.shutdown_fade_duration_s),
            ("startup_fade_duration_s", display.startup_fade_duration_s),
        ] {
            if Duration::try_from_secs_f64(seconds).is_err() {
                problems.push(format!("{name} must be a non-negative number of seconds"));
            }
        }
        for (name, seconds) in [
            ("poll_interval_s", self.system.poll_interval_s),
            ("range_stale_after_s", self.range_sensor.stale_after_s),
            ("light_sensor.update_interval_s", self.light_sensor.update_interval_s),
            ("environment.update_interval_s", self.environment.update_interval_s),
        ] {
            // Sub-nanosecond values round to zero, which tokio intervals reject
            match Duration::try_from_secs_f64(seconds) {
                Ok(period) if !period.is_zero() => {}
                _ => problems.push(format!("{name} must be a positive number of seconds")),
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ControllerError::ConfigInvalid(problems.join("; ")))
        }
    }

    pub fn level_bounds(&self) -> LevelBounds {
        LevelBounds::new(self.display.min_brightness, self.display.max_brightness)
    }

    pub fn adaptive_brightness(&self) -> AdaptiveBrightness {
        AdaptiveBrightness {
            enabled: self.display.adaptive_brightness_enabled,
            floor: self.display.adaptive_floor,
            threshold_low: self.display.light_threshold_low,
            threshold_high: self.display.light_threshold_high,
            bounds: self.level_bounds(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs_f64(self.system.poll_interval_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio_test::{assert_err, assert_ok};

    // Environment variables are process-wide; serialize tests touching them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<T>(vars: &[(&str, &str)], f: impl FnOnce() -> T) -> T {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for (key, value) in vars {
            unsafe { std::env::set_var(key, value) };
        }
        let result = f();
        for (key, _) in vars {
            unsafe { std::env::remove_var(key) };
        }
        result
    }

    #[test]
    fn test_defaults_are_valid() {
        assert_ok!(Config::default().validate());
    }

    #[test]
    fn test_env_overrides() {
        let config = with_env(
            &[
                ("THRESHOLD_MM", "550"),
                ("MIN_ZONES", "6"),
                ("FADE_EASING", "quintic"),
                ("FADE_STEPS", "600"),
                ("ADAPTIVE_BRIGHTNESS", "off"),
                ("RANGE_RESOLUTION", "16"),
                ("MQTT_ENABLED", "true"),
                ("MQTT_BROKER_PORT", "8883"),
            ],
            Config::from_env,
        );
        let config = assert_ok!(config);
        assert_eq!(config.detection.threshold_mm, 550);
        assert_eq!(config.detection.min_zones, 6);
        assert_eq!(config.display.fade_easing, Easing::Quintic);
        assert_eq!(config.display.fade_steps, 600);
        assert!(!config.display.adaptive_brightness_enabled);
        assert_eq!(config.range_sensor.resolution, Resolution::Grid4x4);
        assert!(config.mqtt.enabled);
        assert_eq!(config.mqtt.broker_port, 8883);
    }

    #[test]
    fn test_unparsable_env_is_invalid() {
        let result = with_env(&[("FADE_EASING", "bounce")], Config::from_env);
        let err = assert_err!(result);
        assert!(matches!(err, ControllerError::ConfigInvalid(ref msg) if msg.contains("FADE_EASING")));

        let result = with_env(&[("RANGE_RESOLUTION", "32")], Config::from_env);
        assert_err!(result);
    }

    #[test]
    fn test_min_above_max_is_invalid() {
        let mut config = Config::default();
        config.display.min_brightness = 200;
        config.display.max_brightness = 100;
        let err = assert_err!(config.validate());
        assert!(err.to_string().contains("min_brightness"));
    }

    #[test]
    fn test_all_problems_reported_together() {
        let mut config = Config::default();
        config.detection.consecutive_required = 0;
        config.detection.min_zones = 65;
        config.system.poll_interval_s = 0.0;
        config.display.fade_out_duration_s = f64::NAN;
        let message = assert_err!(config.validate()).to_string();
        assert!(message.contains("consecutive_required"));
        assert!(message.contains("min_zones"));
        assert!(message.contains("poll_interval_s"));
        assert!(message.contains("fade_out_duration_s"));
    }

    #[test]
    fn test_durations_outside_duration_range_are_invalid() {
        let mut config = Config::default();
        config.system.poll_interval_s = 1e-10;
        config.light_sensor.update_interval_s = 1e-12;
        config.environment.update_interval_s = f64::INFINITY;
        config.display.fade_in_duration_s = 1e20;
        config.display.startup_fade_duration_s = -0.5;
        let message = assert_err!(config.validate()).to_string();
        assert!(message.contains("poll_interval_s"));
        assert!(message.contains("light_sensor.update_interval_s"));
        assert!(message.contains("environment.update_interval_s"));
        assert!(message.contains("fade_in_duration_s"));
        assert!(message.contains("startup_fade_duration_s"));
        assert!(!message.contains("fade_out_duration_s"));

        let mut config = Config::default();
        config.system.poll_interval_s = 1e-9;
        config.display.fade_in_duration_s = 0.0;
        assert_ok!(config.validate());
    }

    #[test]
    fn test_load_dotenv_keeps_existing_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "# comment\nPDC_TEST_FROM_FILE = \"spaced value\"\nPDC_TEST_EXISTING=file\n",
        )
        .unwrap();

        with_env(&[("PDC_TEST_EXISTING", "env")], || {
            load_dotenv_from(&path);
            assert_eq!(std::env::var("PDC_TEST_FROM_FILE").unwrap(), "spaced value");
            assert_eq!(std::env::var("PDC_TEST_EXISTING").unwrap(), "env");
        });
        unsafe { std::env::remove_var("PDC_TEST_FROM_FILE") };
    }
}
