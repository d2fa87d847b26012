//! Sensor capabilities consumed by the controller.
//!
//! Each sensor is an async trait so the controller can be driven by real
//! hardware adapters, recorded frames, or the simulations in [`simulation`].

pub mod environment;
pub mod light;
pub mod range;
pub mod simulation;

pub use environment::{AirQuality, AirQualityBand, EnvironmentReading, IioEnvironmentSensor};
pub use light::{IioLightSensor, LightReading};
pub use range::FrameStreamSource;
pub use simulation::{SimulatedEnvironmentSensor, SimulatedLightSensor, SimulatedRangeSource};

use crate::error::Result;
use crate::presence::RangeSample;
use async_trait::async_trait;

/// Multi-zone distance sensor.
#[async_trait]
pub trait RangeSource: Send {
    /// Fetch the latest grid. An error means no usable sample this poll.
    async fn poll(&mut self) -> Result<RangeSample>;
}

/// Ambient light sensor.
#[async_trait]
pub trait LightSource: Send {
    async fn read_lux(&mut self) -> Result<LightReading>;
}

/// Temperature / humidity / pressure / gas sensor.
#[async_trait]
pub trait EnvironmentSource: Send {
    async fn read(&mut self) -> Result<EnvironmentReading>;
}

#[async_trait]
impl<T: RangeSource + ?Sized> RangeSource for Box<T> {
    async fn poll(&mut self) -> Result<RangeSample> {
        (**self).poll().await
    }
}

#[async_trait]
impl<T: LightSource + ?Sized> LightSource for Box<T> {
    async fn read_lux(&mut self) -> Result<LightReading> {
        (**self).read_lux().await
    }
}

#[async_trait]
impl<T: EnvironmentSource + ?Sized> EnvironmentSource for Box<T> {
    async fn read(&mut self) -> Result<EnvironmentReading> {
        (**self).read().await
    }
}
