//! Run fades on the real backlight.
//!
//! Usage:
//!   cargo run --bin fade-test -- 255
//!   cargo run --bin fade-test -- 255 --duration 10 --interrupt-after 2 --interrupt-target 0
//!
//! The second form starts a slow fade and preempts it part way through,
//! which is what happens when someone walks away mid fade-in.

use clap::Parser;
use log::{error, info};
use proximity_display::config::{self, Config};
use proximity_display::display::{BrightnessSink, LevelBounds, SysfsBacklight};
use proximity_display::fade::{Easing, FadeEngine};
use std::process::ExitCode;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "fade-test")]
#[command(about = "Fade the display backlight to a level")]
struct Cli {
    /// Target brightness level
    target: u32,

    /// Fade duration in seconds
    #[arg(long, default_value = "2", value_parser = parse_seconds)]
    duration: Duration,

    /// Number of steps
    #[arg(long, default_value_t = 120)]
    steps: u32,

    /// Easing curve (linear, ease_in_out, quintic)
    #[arg(long, default_value_t = Easing::EaseInOut)]
    easing: Easing,

    /// Backlight brightness file or glob (defaults to BRIGHTNESS_PATH)
    #[arg(long)]
    backlight: Option<String>,

    /// Start a second fade this many seconds into the first
    #[arg(long, requires = "interrupt_target", value_parser = parse_seconds)]
    interrupt_after: Option<Duration>,

    /// Target of the interrupting fade
    #[arg(long, requires = "interrupt_after")]
    interrupt_target: Option<u32>,
}

fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value.parse().map_err(|e| format!("{}", e))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("{}", e))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file before anything else
    config::load_dotenv();
    proximity_display::init_logger("info");

    let cli = Cli::parse();

    let pattern = match cli.backlight {
        Some(pattern) => pattern,
        None => match Config::from_env() {
            Ok(config) => config.display.brightness_path,
            Err(e) => {
                error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
    };

    let backlight = match SysfsBacklight::discover(&pattern) {
        Ok(backlight) => backlight,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Backlight {} (max {})",
        backlight.path().display(),
        backlight.max_brightness()
    );

    let bounds = LevelBounds::new(0, backlight.max_brightness());
    let engine = FadeEngine::new(backlight, bounds);
    let duration = cli.duration;

    let started = Instant::now();
    let first = engine.request_fade(cli.target, duration, cli.steps, cli.easing);

    let last = match (cli.interrupt_after, cli.interrupt_target) {
        (Some(after), Some(target)) => {
            tokio::time::sleep(after).await;
            info!(
                "Interrupting at level {} after {:.2}s",
                engine.current_level(),
                started.elapsed().as_secs_f64()
            );
            let second = engine.request_fade(target, duration, cli.steps, cli.easing);
            info!("First fade: {:?}", first.wait().await);
            second
        }
        _ => first,
    };

    let outcome = last.wait().await;
    info!(
        "{:?} at level {} after {:.2}s",
        outcome,
        engine.current_level(),
        started.elapsed().as_secs_f64()
    );
    ExitCode::SUCCESS
}
