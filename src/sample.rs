//! Sample values and the interleaved stereo buffer handed back to the host.
//!
//! Every value written into a [`SampleBuffer`] goes through the hard clipper
//! in [`clamp_sample`]: anything outside [-1, 1] is pinned to the nearest
//! bound, everything inside passes through untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GeneratorError;

/// One value returned by a track's sample callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleValue {
    /// Duplicated into both channels.
    Mono(f64),
    Stereo(f64, f64),
}

/// Hard clip to the closed range [-1, 1]. NaN is left alone.
pub fn clamp_sample(x: f64) -> f64 {
    if x > 1.0 {
        1.0
    } else if x < -1.0 {
        -1.0
    } else {
        x
    }
}

impl SampleValue {
    /// Clip each component independently.
    pub fn clamped(self) -> Self {
        match self {
            SampleValue::Mono(s) => SampleValue::Mono(clamp_sample(s)),
            SampleValue::Stereo(l, r) => SampleValue::Stereo(clamp_sample(l), clamp_sample(r)),
        }
    }

    /// `(left, right)` as written into the buffer.
    pub fn channels(self) -> (f64, f64) {
        match self {
            SampleValue::Mono(s) => (s, s),
            SampleValue::Stereo(l, r) => (l, r),
        }
    }
}

impl From<f64> for SampleValue {
    fn from(s: f64) -> Self {
        SampleValue::Mono(s)
    }
}

impl From<(f64, f64)> for SampleValue {
    fn from((l, r): (f64, f64)) -> Self {
        SampleValue::Stereo(l, r)
    }
}

impl From<[f64; 2]> for SampleValue {
    fn from([l, r]: [f64; 2]) -> Self {
        SampleValue::Stereo(l, r)
    }
}

/// What a dynamically typed callback handed back, before shape checking.
#[derive(Debug, Clone, PartialEq)]
pub enum RawSample {
    Number(f64),
    /// An array-like value: its length and its first two entries, each
    /// `None` when not numeric.
    Sequence { len: usize, head: [Option<f64>; 2] },
    /// Anything else (null, boolean, string, plain object, ...), described.
    Other(String),
}

impl RawSample {
    /// Number → mono; sequence of exactly two numbers → stereo.
    pub fn classify(self) -> Result<SampleValue, GeneratorError> {
        let found = match self {
            RawSample::Number(s) => return Ok(SampleValue::Mono(s)),
            RawSample::Sequence { len: 2, head: [Some(l), Some(r)] } => {
                return Ok(SampleValue::Stereo(l, r));
            }
            RawSample::Sequence { len: 2, head } => format!("pair with non-numeric entries {head:?}"),
            RawSample::Sequence { len, .. } => format!("array of length {len}"),
            RawSample::Other(description) => description,
        };
        Err(GeneratorError::InvalidSampleShape { index: 0, found })
    }
}

impl TryFrom<&Value> for SampleValue {
    type Error = GeneratorError;

    /// Accepts a number or an array of exactly two numbers.
    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let raw = match value {
            Value::Number(n) => match n.as_f64() {
                Some(s) => RawSample::Number(s),
                None => RawSample::Other(value.to_string()),
            },
            Value::Array(items) => RawSample::Sequence {
                len: items.len(),
                head: [
                    items.first().and_then(Value::as_f64),
                    items.get(1).and_then(Value::as_f64),
                ],
            },
            other => RawSample::Other(other.to_string()),
        };
        raw.classify()
    }
}

/// Interleaved stereo frame: `[L0, R0, L1, R1, ...]`, always `2 × frames` long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleBuffer {
    samples: Vec<f64>,
}

impl SampleBuffer {
    /// A silent buffer holding `frames` samples per channel.
    pub fn with_frames(frames: usize) -> Self {
        SampleBuffer {
            samples: vec![0.0; frames * 2],
        }
    }

    /// Like [`SampleBuffer::with_frames`], but reports an oversized or
    /// unallocatable buffer instead of aborting.
    pub fn try_with_frames(frames: usize) -> Result<Self, GeneratorError> {
        let too_big = || {
            GeneratorError::InvalidRequest(format!("cannot allocate a buffer of {frames} frames"))
        };
        let len = frames.checked_mul(2).ok_or_else(too_big)?;
        let mut samples = Vec::new();
        samples.try_reserve_exact(len).map_err(|_| too_big())?;
        samples.resize(len, 0.0);
        Ok(SampleBuffer { samples })
    }

    /// Clip `value` and store it at frame `index`. Mono is written to both slots.
    ///
    /// Out-of-range indices are ignored.
    pub fn write_frame(&mut self, index: usize, value: SampleValue) {
        let (l, r) = value.clamped().channels();
        if let Some(frame) = self.samples.get_mut(index * 2..index * 2 + 2) {
            frame[0] = l;
            frame[1] = r;
        }
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    pub fn left(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().step_by(2).copied()
    }

    pub fn right(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().skip(1).step_by(2).copied()
    }

    /// Hand the raw samples over to the host.
    pub fn into_vec(self) -> Vec<f64> {
        self.samples
    }
}
