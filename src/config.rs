//! Service configuration — default sample rate and buffer size.

use serde::{Deserialize, Serialize};

use crate::error::{GeneratorError, Result};

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
/// Samples per channel in one buffer.
pub const DEFAULT_CHANNEL_BUFFER_SIZE: usize = 2048;
/// Largest buffer a host may ask for, in samples per channel (~23.8 s at 44.1 kHz).
pub const MAX_CHANNEL_BUFFER_SIZE: usize = 1 << 20;

/// Defaults used when a request leaves a parameter out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    pub sample_rate: u32,
    pub channel_buffer_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channel_buffer_size: DEFAULT_CHANNEL_BUFFER_SIZE,
        }
    }
}

impl ServiceConfig {
    /// Parse a (possibly partial) JSON object; missing keys take the defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: ServiceConfig = serde_json::from_str(json)
            .map_err(|e| GeneratorError::InvalidRequest(format!("bad config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(GeneratorError::InvalidRequest("sample rate must be positive".into()));
        }
        if self.channel_buffer_size == 0 {
            return Err(GeneratorError::InvalidRequest(
                "channel buffer size must be positive".into(),
            ));
        }
        if self.channel_buffer_size > MAX_CHANNEL_BUFFER_SIZE {
            return Err(GeneratorError::InvalidRequest(format!(
                "channel buffer size {} exceeds the maximum of {MAX_CHANNEL_BUFFER_SIZE}",
                self.channel_buffer_size
            )));
        }
        Ok(())
    }
}
