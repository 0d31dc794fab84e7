//! Core value types passed between the moshing stages.
//!
//! [`Quality`] and [`Threshold`] are unit-interval knobs validated at
//! construction. [`VideoTime`] ties an encoder-reported timestamp to the frame
//! index it falls on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::timecode::Timecode;
use crate::{Error, Result};

/// Highest (worst) value of the encoder's quantizer scale.
pub const MAX_QUANTIZER: u32 = 31;

fn check_unit_interval(name: &'static str, value: f64) -> Result<f64> {
    // NaN fails both comparisons, so test for containment rather than exclusion.
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(Error::out_of_unit_range(name, value))
    }
}

/// Encoding quality, from 0.0 (lowest) to 1.0 (highest).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Quality(f64);

impl Quality {
    /// Highest possible quality.
    pub const BEST: Quality = Quality(1.0);

    /// Validate and wrap a quality value.
    pub fn new(value: f64) -> Result<Self> {
        check_unit_interval("quality", value).map(Self)
    }

    /// The raw quality value.
    pub fn value(self) -> f64 {
        self.0
    }

    /// Map onto the encoder's inverted `0..=31` quantizer scale, where 0 is best.
    ///
    /// Halves round away from zero, so 0.5 maps to 16.
    pub fn quantizer(self) -> u32 {
        (f64::from(MAX_QUANTIZER) * (1.0 - self.0)).round() as u32
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::BEST
    }
}

impl TryFrom<f64> for Quality {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Quality> for f64 {
    fn from(q: Quality) -> f64 {
        q.0
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scene-change similarity threshold between 0.0 and 1.0.
///
/// Lower values report more scene changes.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Threshold(f64);

impl Threshold {
    /// Validate and wrap a threshold value.
    pub fn new(value: f64) -> Result<Self> {
        check_unit_interval("scene detection threshold", value).map(Self)
    }

    /// The raw threshold value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(0.3)
    }
}

impl TryFrom<f64> for Threshold {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Threshold> for f64 {
    fn from(t: Threshold) -> f64 {
        t.0
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A point in a video stream, resolved to the frame it falls on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoTime {
    /// Elapsed time from the start of the stream.
    #[serde(with = "duration_secs_f64")]
    pub time: Duration,
    /// Zero-based frame index.
    pub frame: u64,
    /// Frame rate the index was computed with.
    pub fps: f64,
    timecode: String,
}

impl VideoTime {
    /// Resolve `time` against a stream running at `fps` frames per second.
    pub fn new(time: Duration, fps: f64) -> Self {
        let tc = Timecode::from_duration(time, fps);
        Self {
            time,
            frame: tc.frame(),
            fps,
            timecode: tc.to_string(),
        }
    }

    /// Human-readable `HH:MM:SS:FF` timecode of this point.
    pub fn timecode(&self) -> &str {
        &self.timecode
    }
}

impl fmt::Display for VideoTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (frame {})", self.timecode, self.frame)
    }
}

/// Serde helper to serialize `Duration` as fractional seconds.
mod duration_secs_f64 {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}
