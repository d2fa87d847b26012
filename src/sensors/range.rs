//! Range frames pushed by an external sensor driver.
//!
//! The ToF driver runs as its own process and writes one JSON frame per line
//! to a FIFO (or to our stdin). A frame is either a bare array of raw
//! millimetre values or an object with a `distance_mm` array:
//!
//! ```text
//! [1830, 1795, 0, 412, ...]
//! {"distance_mm": [1830, 1795, 0, 412, ...]}
//! ```

use super::RangeSource;
use crate::error::{ControllerError, Result};
use crate::presence::{RangeSample, Resolution};
use async_trait::async_trait;
use log::{info, warn};
use serde::Deserialize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

#[derive(Deserialize)]
#[serde(untagged)]
enum WireFrame {
    Bare(Vec<i64>),
    Tagged { distance_mm: Vec<i64> },
}

/// Parse one line of driver output into a sample.
pub fn parse_frame(line: &str, resolution: Resolution) -> Result<RangeSample> {
    let frame: WireFrame = serde_json::from_str(line)
        .map_err(|e| ControllerError::InvalidFrame(e.to_string()))?;
    let raw = match frame {
        WireFrame::Bare(raw) | WireFrame::Tagged { distance_mm: raw } => raw,
    };
    if raw.is_empty() {
        return Err(ControllerError::InvalidFrame("frame has no zones".to_string()));
    }
    let raw: Vec<u16> = raw
        .into_iter()
        .map(|d| u16::try_from(d).unwrap_or(0))
        .collect();
    Ok(RangeSample::from_millimeters(resolution, &raw))
}

#[derive(Clone)]
struct Frame {
    sample: RangeSample,
    received: Instant,
}

/// [`RangeSource`] fed by a line-oriented frame stream.
pub struct FrameStreamSource {
    frames: watch::Receiver<Option<Frame>>,
    stale_after: Duration,
    reader: JoinHandle<()>,
}

impl FrameStreamSource {
    /// Start reading frames from `input` in a background task.
    pub fn spawn<R>(input: R, resolution: Resolution, stale_after: Duration) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, frames) = watch::channel(None);
        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(input).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match parse_frame(line, resolution) {
                            Ok(sample) => {
                                let frame = Frame {
                                    sample,
                                    received: Instant::now(),
                                };
                                if tx.send(Some(frame)).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("[Range] Dropping frame: {}", e),
                        }
                    }
                    Ok(None) => {
                        info!("[Range] Frame stream closed");
                        break;
                    }
                    Err(e) => {
                        warn!("[Range] Frame stream read error: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            frames,
            stale_after,
            reader,
        }
    }

    /// Read frames from a FIFO or file, or from stdin when `path` is `-`.
    pub async fn open(path: &str, resolution: Resolution, stale_after: Duration) -> Result<Self> {
        if path == "-" {
            info!("[Range] Reading frames from stdin");
            return Ok(Self::spawn(tokio::io::stdin(), resolution, stale_after));
        }
        let file = tokio::fs::File::open(path).await?;
        info!("[Range] Reading frames from {}", path);
        Ok(Self::spawn(file, resolution, stale_after))
    }
}

impl Drop for FrameStreamSource {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl RangeSource for FrameStreamSource {
    async fn poll(&mut self) -> Result<RangeSample> {
        let latest = self.frames.borrow().clone();
        match latest {
            Some(frame) if frame.received.elapsed() <= self.stale_after => Ok(frame.sample),
            Some(frame) => Err(ControllerError::SampleUnavailable(format!(
                "last frame is {:.1}s old",
                frame.received.elapsed().as_secs_f64()
            ))),
            None => Err(ControllerError::SampleUnavailable(
                "no frame received yet".to_string(),
            )),
        }
    }
}
