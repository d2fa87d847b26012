//! Eased, cancellable brightness animation.

pub mod easing;
pub mod engine;

pub use easing::Easing;
pub use engine::{FadeEngine, FadeHandle, FadeOutcome, FadeRequest, FadeState, MAX_STEP_RATE_HZ};
