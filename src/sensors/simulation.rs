//! Simulated sensors for bench runs without hardware.
//!
//! The range simulation alternates between a visitor standing in front of the
//! display and an empty room, with measurement noise, invalid zones and the
//! occasional dropped frame.

use super::{EnvironmentReading, EnvironmentSource, LightReading, LightSource, RangeSource};
use crate::error::{ControllerError, Result};
use crate::presence::{RangeSample, Resolution};
use async_trait::async_trait;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Probability that a poll yields no frame at all.
const DROPOUT_PROBABILITY: f64 = 0.02;
/// Probability that a background zone has no valid target.
const INVALID_ZONE_PROBABILITY: f64 = 0.1;

/// Range source that plays a visitor coming and going.
pub struct SimulatedRangeSource {
    resolution: Resolution,
    rng: StdRng,
    present_frames: u32,
    absent_frames: u32,
    frame: u32,
}

impl SimulatedRangeSource {
    pub fn new(resolution: Resolution) -> Self {
        Self::from_rng(resolution, StdRng::from_entropy())
    }

    /// Deterministic simulation for tests.
    pub fn with_seed(resolution: Resolution, seed: u64) -> Self {
        Self::from_rng(resolution, StdRng::seed_from_u64(seed))
    }

    fn from_rng(resolution: Resolution, rng: StdRng) -> Self {
        info!("[Sim] Simulating a {}-zone range sensor", resolution.zone_count());
        Self {
            resolution,
            rng,
            present_frames: 100,
            absent_frames: 150,
            frame: 0,
        }
    }

    /// Length of the visitor and empty-room phases, in polls.
    pub fn with_phases(mut self, present_frames: u32, absent_frames: u32) -> Self {
        self.present_frames = present_frames.max(1);
        self.absent_frames = absent_frames.max(1);
        self
    }

    /// Whether the visitor is in front of the sensor for frame number `frame`.
    fn visitor_at(&self, frame: u32) -> bool {
        frame % (self.present_frames + self.absent_frames) < self.present_frames
    }

    fn is_center_zone(&self, index: usize) -> bool {
        let side = match self.resolution {
            Resolution::Grid4x4 => 4,
            Resolution::Grid8x8 => 8,
        };
        let (row, col) = (index / side, index % side);
        let center = side / 4..side - side / 4;
        center.contains(&row) && center.contains(&col)
    }

    fn next_sample(&mut self, visitor: bool) -> RangeSample {
        let count = self.resolution.zone_count();
        let mut zones = Vec::with_capacity(count);
        for index in 0..count {
            let zone = if visitor && self.is_center_zone(index) {
                Some(self.rng.gen_range(240u16..=360))
            } else if self.rng.gen_bool(INVALID_ZONE_PROBABILITY) {
                None
            } else {
                Some(self.rng.gen_range(1200..=3600))
            };
            zones.push(zone);
        }
        RangeSample::new(self.resolution, zones)
    }
}

#[async_trait]
impl RangeSource for SimulatedRangeSource {
    async fn poll(&mut self) -> Result<RangeSample> {
        let visitor = self.visitor_at(self.frame);
        self.frame = self.frame.wrapping_add(1);

        if self.rng.gen_bool(DROPOUT_PROBABILITY) {
            return Err(ControllerError::SampleUnavailable(
                "simulated dropout".to_string(),
            ));
        }
        Ok(self.next_sample(visitor))
    }
}

/// Light level drifting slowly around a base value.
pub struct SimulatedLightSensor {
    rng: StdRng,
    lux: f32,
}

impl SimulatedLightSensor {
    pub fn new(base_lux: f32) -> Self {
        Self {
            rng: StdRng::from_entropy(),
            lux: base_lux.max(0.0),
        }
    }
}

#[async_trait]
impl LightSource for SimulatedLightSensor {
    async fn read_lux(&mut self) -> Result<LightReading> {
        let drift: f32 = self.rng.gen_range(-15.0..=15.0);
        self.lux = (self.lux + drift).clamp(0.0, 1000.0);
        Ok(LightReading { lux: self.lux })
    }
}

/// Indoor climate with small fluctuations.
pub struct SimulatedEnvironmentSensor {
    rng: StdRng,
}

impl SimulatedEnvironmentSensor {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for SimulatedEnvironmentSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnvironmentSource for SimulatedEnvironmentSensor {
    async fn read(&mut self) -> Result<EnvironmentReading> {
        Ok(EnvironmentReading {
            temperature_c: 21.5 + self.rng.gen_range(-0.3f32..=0.3),
            humidity_percent: 45.0 + self.rng.gen_range(-2.0f32..=2.0),
            pressure_hpa: 1013.0 + self.rng.gen_range(-1.5f32..=1.5),
            gas_resistance_ohms: Some(150_000.0 + self.rng.gen_range(-20_000.0f32..=20_000.0)),
        })
    }
}
