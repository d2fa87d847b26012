//! Print the effective configuration and check it for problems.
//!
//! Usage:
//!   cargo run --bin check-config
//!   cargo run --bin check-config -- --json

use clap::Parser;
use log::error;
use proximity_display::config::{self, Config};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "check-config")]
#[command(about = "Load and validate the proximity display configuration")]
struct Cli {
    /// Print the configuration as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    // Load .env file before anything else
    config::load_dotenv();
    proximity_display::init_logger("warn");

    let cli = Cli::parse();

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    // Never echo secrets
    if config.mqtt.password.is_some() {
        config.mqtt.password = Some("********".to_string());
    }

    if cli.json {
        match serde_json::to_string_pretty(&config) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        }
    } else {
        print_summary(&config);
    }

    match config.validate() {
        Ok(()) => {
            if !cli.json {
                println!("\nConfiguration is valid.");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_summary(config: &Config) {
    let detection = &config.detection;
    let display = &config.display;

    println!("Detection");
    println!("  threshold:        {} mm", detection.threshold_mm);
    println!("  min zones:        {}", detection.min_zones);
    println!(
        "  enter / leave:    {} / {} polls",
        detection.consecutive_required, detection.absence_required
    );
    println!(
        "  poll interval:    {:.3}s ({} zones)",
        config.system.poll_interval_s,
        config.range_sensor.resolution.zone_count()
    );
    println!(
        "  frames:           {}",
        config.range_sensor.frames_path.as_deref().unwrap_or("simulated")
    );

    println!("Display");
    println!("  backlight:        {}", display.brightness_path);
    println!(
        "  brightness:       {}..={}",
        display.min_brightness, display.max_brightness
    );
    println!(
        "  fade in / out:    {:.1}s / {:.1}s, {} steps, {}",
        display.fade_in_duration_s,
        display.fade_out_duration_s,
        display.fade_steps,
        display.fade_easing
    );
    if display.adaptive_brightness_enabled {
        println!(
            "  adaptive:         floor {} between {} and {} lux",
            display.adaptive_floor, display.light_threshold_low, display.light_threshold_high
        );
    } else {
        println!("  adaptive:         off");
    }

    println!("Telemetry");
    if config.mqtt.enabled {
        println!(
            "  mqtt:             {}:{} as {} under {}/",
            config.mqtt.broker_host,
            config.mqtt.broker_port,
            config.mqtt.client_id,
            config.mqtt.topic_prefix
        );
    } else {
        println!("  mqtt:             off");
    }
}
