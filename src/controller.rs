//! Ties sensors, presence detection and the fade engine together.
//!
//! On start the display fades to its minimum, then three independent tasks
//! run until shutdown:
//! - presence: polls the range sensor and turns presence transitions into fades,
//! - light: tracks ambient light and retargets the wake brightness,
//! - environment: publishes climate readings.

use crate::config::Config;
use crate::display::{AdaptiveBrightness, BrightnessSink};
use crate::fade::{FadeEngine, FadeOutcome};
use crate::presence::{PresenceDetector, PresenceEvent, RangeSample};
use crate::sensors::{EnvironmentSource, LightSource, RangeSource};
use crate::telemetry::{TelemetryPublisher, TelemetryValue};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Sensor inputs handed to [`Controller::start`].
pub struct Sources {
    pub range: Box<dyn RangeSource>,
    pub light: Option<Box<dyn LightSource>>,
    pub environment: Option<Box<dyn EnvironmentSource>>,
}

struct Context<S> {
    config: Config,
    fade: FadeEngine<S>,
    adaptive: AdaptiveBrightness,
    telemetry: Arc<dyn TelemetryPublisher>,
    present: AtomicBool,
    lux: Mutex<Option<f32>>,
    /// Level the display was last asked to wake to.
    wake_level: AtomicU32,
}

impl<S: BrightnessSink> Context<S> {
    fn publish(&self, name: &str, value: impl Into<TelemetryValue>) {
        self.telemetry.publish(name, value.into());
    }

    fn request_level(&self, target: u32, duration_s: f64) {
        let display = &self.config.display;
        self.fade.request_fade(
            target,
            Duration::from_secs_f64(duration_s),
            display.fade_steps,
            display.fade_easing,
        );
        let bounds = self.fade.bounds();
        self.publish("display_brightness", bounds.percent(bounds.clamp(target)));
    }

    fn on_presence(&self, event: PresenceEvent) {
        self.present.store(event.present, Ordering::SeqCst);

        if event.present {
            let lux = *self.lux.lock();
            let target = self.adaptive.level_for(lux);
            self.wake_level.store(target, Ordering::SeqCst);
            info!(
                "[Presence] Visitor detected ({} close zones, nearest {} mm), waking display to {}",
                event.hit_zones,
                event.nearest_mm.map_or("-".to_string(), |d| d.to_string()),
                target
            );
            self.request_level(target, self.config.display.fade_in_duration_s);
        } else {
            info!("[Presence] Area clear, dimming display");
            self.request_level(
                self.fade.bounds().min,
                self.config.display.fade_out_duration_s,
            );
        }

        self.publish("proximity", event.present);
        if let Some(distance) = event.nearest_mm {
            self.publish("distance", distance);
        }
    }

    fn on_lux(&self, lux: f32) {
        *self.lux.lock() = Some(lux);
        self.publish("lux", lux);

        if !self.adaptive.enabled || !self.present.load(Ordering::SeqCst) {
            return;
        }
        let target = self.adaptive.level_for(Some(lux));
        if self.wake_level.swap(target, Ordering::SeqCst) != target {
            debug!("[Light] Adjusting brightness to {} for {:.1} lux", target, lux);
            self.request_level(target, self.config.display.adaptive_fade_duration_s);
        }
    }

    fn log_status(&self, frame: u64, sample: Option<&RangeSample>) {
        let threshold = self.config.detection.threshold_mm;
        let (valid, close) = sample.map_or((0, 0), |s| (s.valid_zones(), s.zones_within(threshold)));
        let lux = self
            .lux
            .lock()
            .map_or("-".to_string(), |lux| format!("{:.1}", lux));
        info!(
            "[Presence] Frame {}: {} valid zones, {} within {} mm, present={}, brightness={}, lux={}",
            frame,
            valid,
            close,
            threshold,
            self.present.load(Ordering::SeqCst),
            self.fade.current_level(),
            lux
        );
    }
}

/// Running orchestrator. Call [`Controller::shutdown`] to stop it.
pub struct Controller<S> {
    context: Arc<Context<S>>,
    stop: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<S: BrightnessSink> Controller<S> {
    /// Spawn the sensor tasks. Must be called from within a tokio runtime.
    pub fn start(
        config: Config,
        fade: FadeEngine<S>,
        sources: Sources,
        telemetry: Arc<dyn TelemetryPublisher>,
    ) -> Self {
        let adaptive = AdaptiveBrightness {
            bounds: fade.bounds(),
            ..config.adaptive_brightness()
        };
        let context = Arc::new(Context {
            wake_level: AtomicU32::new(fade.bounds().max),
            config,
            fade,
            adaptive,
            telemetry,
            present: AtomicBool::new(false),
            lux: Mutex::new(None),
        });
        let stop = CancellationToken::new();

        // Blank the display before anything can wake it
        let display = &context.config.display;
        let min = context.fade.bounds().min;
        info!(
            "[Controller] Dimming display from {} to {}",
            context.fade.current_level(),
            min
        );
        context.fade.request_fade(
            min,
            Duration::from_secs_f64(display.startup_fade_duration_s),
            display.fade_steps,
            display.fade_easing,
        );

        let mut tasks = vec![tokio::spawn(presence_loop(
            context.clone(),
            sources.range,
            stop.clone(),
        ))];
        if let Some(light) = sources.light {
            tasks.push(tokio::spawn(light_loop(context.clone(), light, stop.clone())));
        }
        if let Some(environment) = sources.environment {
            tasks.push(tokio::spawn(environment_loop(
                context.clone(),
                environment,
                stop.clone(),
            )));
        }

        info!("[Controller] Started {} sensor tasks", tasks.len());
        Self {
            context,
            stop,
            tasks,
        }
    }

    pub fn is_present(&self) -> bool {
        self.context.present.load(Ordering::SeqCst)
    }

    pub fn fade(&self) -> &FadeEngine<S> {
        &self.context.fade
    }

    /// Last ambient light reading.
    pub fn lux(&self) -> Option<f32> {
        *self.context.lux.lock()
    }

    /// Stop all tasks, then fade the display down and wait for it.
    pub async fn shutdown(self) -> FadeOutcome {
        info!("[Controller] Shutting down");
        self.stop.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("[Controller] Task ended abnormally: {}", e);
            }
        }

        let fade = &self.context.fade;
        let display = &self.context.config.display;
        fade.cancel();
        let outcome = fade
            .request_fade(
                fade.bounds().min,
                Duration::from_secs_f64(display.shutdown_fade_duration_s),
                display.fade_steps,
                display.fade_easing,
            )
            .wait()
            .await;
        info!("[Controller] Display at {}", fade.current_level());
        outcome
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn presence_loop<S: BrightnessSink>(
    context: Arc<Context<S>>,
    mut range: Box<dyn RangeSource>,
    stop: CancellationToken,
) {
    let mut detector = PresenceDetector::new(context.config.detection.clone());
    let mut interval = ticker(context.config.poll_interval());
    let status_every = u64::from(context.config.system.status_every);
    let mut frame: u64 = 0;

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {}
        }
        frame += 1;

        let (event, sample) = match range.poll().await {
            Ok(sample) => (detector.evaluate(&sample), Some(sample)),
            Err(e) => {
                debug!("[Presence] {}", e);
                (detector.evaluate_unavailable(), None)
            }
        };

        if let Some(event) = event {
            context.on_presence(event);
        }
        if status_every > 0 && frame % status_every == 0 {
            context.log_status(frame, sample.as_ref());
        }
    }

    debug!("[Presence] Stopped after {} frames", frame);
}

async fn light_loop<S: BrightnessSink>(
    context: Arc<Context<S>>,
    mut light: Box<dyn LightSource>,
    stop: CancellationToken,
) {
    let mut interval = ticker(Duration::from_secs_f64(
        context.config.light_sensor.update_interval_s,
    ));

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {}
        }
        match light.read_lux().await {
            Ok(reading) => context.on_lux(reading.lux),
            Err(e) => warn!("[Light] {}", e),
        }
    }
}

async fn environment_loop<S: BrightnessSink>(
    context: Arc<Context<S>>,
    mut environment: Box<dyn EnvironmentSource>,
    stop: CancellationToken,
) {
    let mut interval = ticker(Duration::from_secs_f64(
        context.config.environment.update_interval_s,
    ));

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {}
        }
        let reading = match environment.read().await {
            Ok(reading) => reading,
            Err(e) => {
                warn!("[Env] {}", e);
                continue;
            }
        };

        debug!(
            "[Env] {:.1}°C {:.1}% {:.1} hPa",
            reading.temperature_c, reading.humidity_percent, reading.pressure_hpa
        );
        context.publish("temperature", reading.temperature_c);
        context.publish("humidity", reading.humidity_percent);
        context.publish("pressure", reading.pressure_hpa);
        if let Some(gas) = reading.gas_resistance_ohms {
            context.publish("gas_resistance", gas);
        }
        if let Some(quality) = reading.air_quality() {
            debug!("[Env] Air quality {} ({})", quality.score, quality.band());
            context.publish("air_quality", quality.score);
        }
    }
}
