//! Cancellable brightness fades.
//!
//! Each fade runs as its own tokio task. Starting a fade bumps a generation
//! counter; a running fade compares its captured generation against the live
//! one before every step and stops writing as soon as it has been superseded.
//! The generation check and the sink write share one short critical section,
//! so a stale fade can never slip a write in after a newer fade has started.

use super::easing::Easing;
use crate::display::{BrightnessSink, LevelBounds};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Fastest step rate a fade will run at.
pub const MAX_STEP_RATE_HZ: u32 = 600;

/// One brightness animation from `from_level` to `to_level`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeRequest {
    pub from_level: u32,
    pub to_level: u32,
    pub duration: Duration,
    pub steps: u32,
    pub easing: Easing,
}

impl FadeRequest {
    /// Cap the step rate at [`MAX_STEP_RATE_HZ`] by dropping steps.
    ///
    /// A zero duration becomes a single immediate write.
    pub fn limited(mut self) -> Self {
        if self.duration.is_zero() {
            self.steps = 0;
        } else if self.steps > 0 {
            let min_interval = Duration::from_secs(1) / MAX_STEP_RATE_HZ;
            if self.duration / self.steps < min_interval {
                let steps = (self.duration.as_secs_f64() * f64::from(MAX_STEP_RATE_HZ)) as u32;
                self.steps = steps.max(1);
            }
        }
        self
    }

    /// Wait between two consecutive steps.
    pub fn step_interval(&self) -> Duration {
        if self.steps == 0 {
            Duration::ZERO
        } else {
            self.duration / self.steps
        }
    }

    /// Level for step `step` of `0..=steps`. The last step is exactly `to_level`.
    pub fn level_at(&self, step: u32) -> u32 {
        if step >= self.steps {
            return self.to_level;
        }
        let t = f64::from(step) / f64::from(self.steps);
        let from = f64::from(self.from_level);
        let to = f64::from(self.to_level);
        let level = from + (to - from) * self.easing.apply(t);
        level.round().max(0.0) as u32
    }

    /// True when the fade has nothing to animate.
    pub fn is_instant(&self) -> bool {
        self.steps == 0 || self.from_level == self.to_level
    }
}

/// How a fade's step sequence ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutcome {
    /// Every step ran and the target was written.
    Completed,
    /// A newer fade (or a cancel) took over part way through.
    Superseded,
    /// The fade task panicked or was aborted.
    Aborted,
}

/// Engine state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeState {
    /// Last level successfully written to the sink.
    pub current_level: u32,
    /// Whether the live generation is still stepping.
    pub active: bool,
    /// Live generation token.
    pub generation: u64,
}

/// Handle to a spawned fade.
///
/// Dropping the handle does not stop the fade.
pub struct FadeHandle {
    generation: u64,
    request: FadeRequest,
    task: JoinHandle<FadeOutcome>,
}

impl FadeHandle {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn request(&self) -> &FadeRequest {
        &self.request
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the step sequence to end.
    pub async fn wait(self) -> FadeOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("[Fade] Generation {} task failed: {}", self.generation, e);
                FadeOutcome::Aborted
            }
        }
    }
}

enum StepWrite {
    Written,
    Failed,
    Stale,
}

struct Shared<S> {
    sink: Mutex<S>,
    bounds: LevelBounds,
    generation: AtomicU64,
    current_level: AtomicU32,
    active: AtomicBool,
}

impl<S: BrightnessSink> Shared<S> {
    fn is_live(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn write_step(&self, generation: u64, level: u32) -> StepWrite {
        let mut sink = self.sink.lock();
        if !self.is_live(generation) {
            return StepWrite::Stale;
        }
        match sink.write(level) {
            Ok(()) => {
                self.current_level.store(level, Ordering::SeqCst);
                StepWrite::Written
            }
            Err(e) => {
                warn!("[Fade] {}", e);
                StepWrite::Failed
            }
        }
    }

    fn finish(&self, generation: u64) -> FadeOutcome {
        let _sink = self.sink.lock();
        if !self.is_live(generation) {
            return FadeOutcome::Superseded;
        }
        self.active.store(false, Ordering::SeqCst);
        debug!(
            "[Fade] Generation {} complete at {}",
            generation,
            self.current_level.load(Ordering::SeqCst)
        );
        FadeOutcome::Completed
    }

    async fn run(self: Arc<Self>, generation: u64, request: FadeRequest) -> FadeOutcome {
        if request.is_instant() {
            return match self.write_step(generation, request.to_level) {
                StepWrite::Stale => FadeOutcome::Superseded,
                StepWrite::Written | StepWrite::Failed => self.finish(generation),
            };
        }

        let interval = request.step_interval();
        let mut last_written = request.from_level;

        for step in 0..=request.steps {
            let level = self.bounds.clamp(request.level_at(step));
            let final_step = step == request.steps;

            if final_step || level != last_written {
                match self.write_step(generation, level) {
                    StepWrite::Written => last_written = level,
                    StepWrite::Failed => {}
                    StepWrite::Stale => {
                        debug!("[Fade] Generation {} superseded at step {}", generation, step);
                        return FadeOutcome::Superseded;
                    }
                }
            } else if !self.is_live(generation) {
                debug!("[Fade] Generation {} superseded at step {}", generation, step);
                return FadeOutcome::Superseded;
            }

            if !final_step {
                tokio::time::sleep(interval).await;
            }
        }

        self.finish(generation)
    }
}

/// Animates one brightness output. Cheap to clone; clones share the same output.
pub struct FadeEngine<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for FadeEngine<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<S: BrightnessSink> FadeEngine<S> {
    /// Wrap `sink`. The starting level is read back from the sink when possible.
    pub fn new(sink: S, bounds: LevelBounds) -> Self {
        let initial = sink.current_level().unwrap_or(bounds.min);
        Self {
            shared: Arc::new(Shared {
                sink: Mutex::new(sink),
                bounds,
                generation: AtomicU64::new(0),
                current_level: AtomicU32::new(initial),
                active: AtomicBool::new(false),
            }),
        }
    }

    pub fn bounds(&self) -> LevelBounds {
        self.shared.bounds
    }

    /// Last level actually written, not the target of a running fade.
    pub fn current_level(&self) -> u32 {
        self.shared.current_level.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> FadeState {
        FadeState {
            current_level: self.current_level(),
            active: self.shared.active.load(Ordering::SeqCst),
            generation: self.shared.generation.load(Ordering::SeqCst),
        }
    }

    /// Start a fade towards `target_level`, superseding any running fade.
    ///
    /// Returns immediately. Must be called from within a tokio runtime.
    pub fn request_fade(
        &self,
        target_level: u32,
        duration: Duration,
        steps: u32,
        easing: Easing,
    ) -> FadeHandle {
        let (generation, from_level) = {
            let _sink = self.shared.sink.lock();
            let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            self.shared.active.store(true, Ordering::SeqCst);
            (generation, self.shared.current_level.load(Ordering::SeqCst))
        };

        let request = FadeRequest {
            from_level,
            to_level: self.shared.bounds.clamp(target_level),
            duration,
            steps,
            easing,
        }
        .limited();

        info!(
            "[Fade] {} -> {} over {:.1}s ({} steps, {:.1}ms/step, {})",
            request.from_level,
            request.to_level,
            request.duration.as_secs_f64(),
            request.steps,
            request.step_interval().as_secs_f64() * 1000.0,
            request.easing
        );

        let shared = self.shared.clone();
        let task = tokio::spawn(shared.run(generation, request));

        FadeHandle {
            generation,
            request,
            task,
        }
    }

    /// Stop any running fade where it is. Returns the new generation.
    pub fn cancel(&self) -> u64 {
        let _sink = self.shared.sink.lock();
        self.shared.active.store(false, Ordering::SeqCst);
        self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}
