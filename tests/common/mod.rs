//! In-memory fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use proximity_display::display::BrightnessSink;
use proximity_display::presence::{RangeSample, Resolution};
use proximity_display::sensors::{LightReading, LightSource, RangeSource};
use proximity_display::telemetry::{TelemetryPublisher, TelemetryValue};
use proximity_display::{ControllerError, Result};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::time::Instant;

/// One successful write.
#[derive(Debug, Clone, Copy)]
pub struct Write {
    pub level: u32,
    pub at: Instant,
}

/// Sink that records every successful write with its (tokio) timestamp.
#[derive(Clone, Default)]
pub struct RecordingSink {
    writes: Arc<Mutex<Vec<Write>>>,
    attempts: Arc<Mutex<Vec<u32>>>,
    failing: Arc<Mutex<HashSet<u32>>>,
    initial: Option<u32>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sink that reports `level` as the hardware's starting brightness.
    pub fn with_level(level: u32) -> Self {
        Self {
            initial: Some(level),
            ..Self::default()
        }
    }

    /// Writes of `level` fail.
    pub fn fail_on(&self, level: u32) {
        self.failing.lock().insert(level);
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.lock().clone()
    }

    pub fn levels(&self) -> Vec<u32> {
        self.writes.lock().iter().map(|w| w.level).collect()
    }

    pub fn attempts(&self) -> Vec<u32> {
        self.attempts.lock().clone()
    }

    pub fn last_level(&self) -> Option<u32> {
        self.writes.lock().last().map(|w| w.level)
    }
}

impl BrightnessSink for RecordingSink {
    fn write(&mut self, level: u32) -> Result<()> {
        self.attempts.lock().push(level);
        if self.failing.lock().contains(&level) {
            return Err(ControllerError::SinkWrite {
                level,
                reason: "injected failure".to_string(),
            });
        }
        self.writes.lock().push(Write {
            level,
            at: Instant::now(),
        });
        Ok(())
    }

    fn max_brightness(&self) -> u32 {
        255
    }

    fn current_level(&self) -> Option<u32> {
        self.initial
    }
}

pub fn near_sample(resolution: Resolution) -> RangeSample {
    RangeSample::from_millimeters(resolution, &vec![300; resolution.zone_count()])
}

pub fn far_sample(resolution: Resolution) -> RangeSample {
    RangeSample::from_millimeters(resolution, &vec![2000; resolution.zone_count()])
}

/// Range source that replays a script and then repeats its fallback forever.
pub struct ScriptedRange {
    script: VecDeque<Option<RangeSample>>,
    fallback: Option<RangeSample>,
}

impl ScriptedRange {
    /// `None` entries poll as unavailable.
    pub fn new(script: Vec<Option<RangeSample>>, fallback: Option<RangeSample>) -> Self {
        Self {
            script: script.into(),
            fallback,
        }
    }
}

#[async_trait]
impl RangeSource for ScriptedRange {
    async fn poll(&mut self) -> Result<RangeSample> {
        let next = match self.script.pop_front() {
            Some(entry) => entry,
            None => self.fallback.clone(),
        };
        next.ok_or_else(|| ControllerError::SampleUnavailable("scripted gap".to_string()))
    }
}

/// Light sensor reporting a fixed, adjustable lux value.
#[derive(Clone)]
pub struct FixedLight {
    lux: Arc<Mutex<f32>>,
}

impl FixedLight {
    pub fn new(lux: f32) -> Self {
        Self {
            lux: Arc::new(Mutex::new(lux)),
        }
    }

    pub fn set(&self, lux: f32) {
        *self.lux.lock() = lux;
    }
}

#[async_trait]
impl LightSource for FixedLight {
    async fn read_lux(&mut self) -> Result<LightReading> {
        Ok(LightReading {
            lux: *self.lux.lock(),
        })
    }
}

/// Telemetry publisher that keeps everything it is given.
#[derive(Default)]
pub struct RecordingTelemetry {
    published: Mutex<Vec<(String, TelemetryValue)>>,
}

impl RecordingTelemetry {
    pub fn values(&self, name: &str) -> Vec<TelemetryValue> {
        self.published
            .lock()
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| *v)
            .collect()
    }
}

impl TelemetryPublisher for RecordingTelemetry {
    fn publish(&self, name: &str, value: TelemetryValue) {
        self.published.lock().push((name.to_string(), value));
    }
}
