//! Proximity display controller.
//!
//! Usage:
//!   proximity-display [--simulate] [--frames <PATH|->] [--no-mqtt]
//!
//! Configuration comes from the environment (and `.env`); see `check-config`.

use clap::Parser;
use log::{error, info, warn};
use proximity_display::config::{self, Config};
use proximity_display::display::{BrightnessSink, SysfsBacklight};
use proximity_display::fade::FadeEngine;
use proximity_display::sensors::{
    EnvironmentSource, FrameStreamSource, IioEnvironmentSensor, IioLightSensor, LightSource,
    RangeSource, SimulatedEnvironmentSensor, SimulatedLightSensor, SimulatedRangeSource,
};
use proximity_display::telemetry::{MqttTelemetry, NoTelemetry, TelemetryPublisher};
use proximity_display::{Controller, Sources};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::signal::unix::{SignalKind, signal as unix_signal};

#[derive(Parser, Debug)]
#[command(name = "proximity-display")]
#[command(about = "Fade a display backlight in and out as people approach")]
struct Args {
    /// Use simulated sensors instead of hardware
    #[arg(long)]
    simulate: bool,

    /// Read range frames from this FIFO or file (`-` for stdin)
    #[arg(long, env = "RANGE_FRAMES_PATH")]
    frames: Option<String>,

    /// Do not publish telemetry even when MQTT is enabled
    #[arg(long)]
    no_mqtt: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file before anything else
    config::load_dotenv();
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    proximity_display::init_logger(&log_level);

    let args = Args::parse();

    let mut config = match Config::from_env().and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(frames) = args.frames {
        config.range_sensor.frames_path = Some(frames);
    }

    info!("Starting proximity display controller");
    info!(
        "  Detection: {} mm, {} zones, {} hits / {} misses",
        config.detection.threshold_mm,
        config.detection.min_zones,
        config.detection.consecutive_required,
        config.detection.absence_required
    );
    info!(
        "  Fades: in {:.1}s, out {:.1}s, {} steps, {}",
        config.display.fade_in_duration_s,
        config.display.fade_out_duration_s,
        config.display.fade_steps,
        config.display.fade_easing
    );

    let backlight = match SysfsBacklight::discover(&config.display.brightness_path) {
        Ok(backlight) => backlight,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let hardware_max = backlight.max_brightness();
    if config.display.max_brightness > hardware_max {
        warn!(
            "[Display] max_brightness {} exceeds hardware maximum {}, using {}",
            config.display.max_brightness, hardware_max, hardware_max
        );
        config.display.max_brightness = hardware_max;
        config.display.min_brightness = config.display.min_brightness.min(hardware_max);
    }
    let fade = FadeEngine::new(backlight, config.level_bounds());

    let sources = match open_sources(&config, args.simulate).await {
        Ok(sources) => sources,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mqtt = (config.mqtt.enabled && !args.no_mqtt)
        .then(|| Arc::new(MqttTelemetry::start(&config.mqtt)));
    let telemetry: Arc<dyn TelemetryPublisher> = match &mqtt {
        Some(mqtt) => mqtt.clone(),
        None => Arc::new(NoTelemetry),
    };

    let controller = Controller::start(config, fade, sources, telemetry);
    info!("Proximity display controller is running (Ctrl+C or SIGTERM to exit)");

    wait_for_shutdown().await;
    controller.shutdown().await;

    if let Some(mqtt) = mqtt.and_then(Arc::into_inner) {
        mqtt.shutdown().await;
    }

    info!("Proximity display controller stopped");
    ExitCode::SUCCESS
}

/// Block until SIGINT or SIGTERM arrives.
async fn wait_for_shutdown() {
    let mut terminate = match unix_signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to listen for SIGTERM: {}", e);
            match signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal"),
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
            return;
        }
    };

    tokio::select! {
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        },
        _ = terminate.recv() => info!("Received SIGTERM"),
    }
}

/// Pick hardware or simulated sensors. Missing optional sensors fall back to simulation.
async fn open_sources(config: &Config, simulate: bool) -> proximity_display::Result<Sources> {
    let resolution = config.range_sensor.resolution;

    let range: Box<dyn RangeSource> = match (&config.range_sensor.frames_path, simulate) {
        (Some(path), false) => Box::new(
            FrameStreamSource::open(
                path,
                resolution,
                Duration::from_secs_f64(config.range_sensor.stale_after_s),
            )
            .await?,
        ),
        (None, false) => {
            warn!("[Range] No frame source configured (RANGE_FRAMES_PATH), simulating");
            Box::new(SimulatedRangeSource::new(resolution))
        }
        (_, true) => Box::new(SimulatedRangeSource::new(resolution)),
    };

    let light: Option<Box<dyn LightSource>> = if !config.light_sensor.enabled {
        None
    } else if simulate {
        let sensor: Box<dyn LightSource> = Box::new(SimulatedLightSensor::new(150.0));
        Some(sensor)
    } else {
        let sensor = match &config.light_sensor.iio_path {
            Some(path) => IioLightSensor::open(path),
            None => IioLightSensor::discover(),
        };
        let sensor: Box<dyn LightSource> = match sensor {
            Ok(sensor) => Box::new(sensor),
            Err(e) => {
                warn!("[Light] {}, simulating", e);
                Box::new(SimulatedLightSensor::new(150.0))
            }
        };
        Some(sensor)
    };

    let environment: Option<Box<dyn EnvironmentSource>> = if !config.environment.enabled {
        None
    } else if simulate {
        let sensor: Box<dyn EnvironmentSource> = Box::new(SimulatedEnvironmentSensor::new());
        Some(sensor)
    } else {
        let sensor = match &config.environment.iio_path {
            Some(path) => IioEnvironmentSensor::open(path),
            None => IioEnvironmentSensor::discover(),
        };
        let sensor: Box<dyn EnvironmentSource> = match sensor {
            Ok(sensor) => Box::new(sensor),
            Err(e) => {
                warn!("[Env] {}, simulating", e);
                Box::new(SimulatedEnvironmentSensor::new())
            }
        };
        Some(sensor)
    };

    Ok(Sources {
        range,
        light,
        environment,
    })
}
