//! Host ↔ worker messages.
//!
//! The canonical request is a named-field object:
//!
//! ```json
//! {"command": "generate", "sampleRate": 48000, "channelBufferSize": 1024}
//! ```
//!
//! Hosts that still speak the positional array form are accepted through
//! [`Request::from_legacy`]. The arity decides what the numbers mean:
//!
//! | message                                        | meaning            |
//! |------------------------------------------------|--------------------|
//! | `["generate"]`                                 | all defaults       |
//! | `["generate", sampleRate]`                     | rate override      |
//! | `["generate", channelBufferSize, sampleRate]`  | both overrides     |

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::config::ServiceConfig;
use crate::error::{GeneratorError, Result};
use crate::sample::SampleBuffer;

/// Parameters of one "generate" command. Absent fields fall back to the
/// service configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_whole")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_whole")]
    pub channel_buffer_size: Option<usize>,
}

impl GenerationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    pub fn with_channel_buffer_size(mut self, frames: usize) -> Self {
        self.channel_buffer_size = Some(frames);
        self
    }

    /// Apply this request's overrides on top of `defaults`.
    pub fn resolve(&self, defaults: &ServiceConfig) -> Result<ServiceConfig> {
        let resolved = ServiceConfig {
            sample_rate: self.sample_rate.unwrap_or(defaults.sample_rate),
            channel_buffer_size: self.channel_buffer_size.unwrap_or(defaults.channel_buffer_size),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

/// An inbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Request {
    Generate(GenerationRequest),
    /// Any command this worker does not understand.
    #[serde(other)]
    Ignored,
}

impl Request {
    /// A "generate" with every parameter defaulted.
    pub fn generate() -> Self {
        Request::Generate(GenerationRequest::default())
    }

    /// Decode either the canonical object or the legacy positional array.
    pub fn decode(message: &Value) -> Result<Self> {
        match message {
            Value::Object(fields) => {
                if fields.get("command").and_then(Value::as_str) != Some("generate") {
                    return Ok(Request::Ignored);
                }
                Ok(Request::Generate(GenerationRequest {
                    sample_rate: whole_number(fields.get("sampleRate"), "sampleRate")?,
                    channel_buffer_size: whole_number(
                        fields.get("channelBufferSize"),
                        "channelBufferSize",
                    )?,
                }))
            }
            Value::Array(_) => Self::from_legacy(message),
            // A bare value has no "generate" tag to match.
            _ => Ok(Request::Ignored),
        }
    }

    /// Decode the positional `["generate", ...]` form.
    pub fn from_legacy(message: &Value) -> Result<Self> {
        let Value::Array(items) = message else {
            return Err(GeneratorError::InvalidRequest(format!(
                "expected a positional array message, got {message}"
            )));
        };
        if items.first().and_then(Value::as_str) != Some("generate") {
            return Ok(Request::Ignored);
        }
        let request = match &items[1..] {
            [] => GenerationRequest::default(),
            [rate] => GenerationRequest {
                sample_rate: whole_number(Some(rate), "sampleRate")?,
                channel_buffer_size: None,
            },
            [frames, rate, ..] => GenerationRequest {
                sample_rate: whole_number(Some(rate), "sampleRate")?,
                channel_buffer_size: whole_number(Some(frames), "channelBufferSize")?,
            },
        };
        Ok(Request::Generate(request))
    }
}

/// Read an optional whole number. Integral floats (as JS hands them over) are
/// accepted; `null` counts as absent.
fn whole_number<T: TryFrom<u64>>(value: Option<&Value>, name: &str) -> Result<Option<T>> {
    let raw = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(v) => v,
    };
    let whole = raw.as_u64().or_else(|| {
        raw.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    });
    whole
        .and_then(|n| T::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| GeneratorError::InvalidRequest(format!("{name} must be a whole number, got {raw}")))
}

/// Serde side of [`whole_number`], so typed and [`Request::decode`] parsing
/// agree on integral floats.
fn lenient_whole<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    whole_number(raw.as_ref(), "parameter").map_err(serde::de::Error::custom)
}

/// An outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Response {
    Buffer { samples: SampleBuffer },
    Log { message: String },
}

impl Response {
    /// Positional form: `["buffer", [...]]` or `["log", "..."]`.
    pub fn to_legacy(&self) -> Value {
        match self {
            Response::Buffer { samples } => json!(["buffer", samples]),
            Response::Log { message } => json!(["log", message]),
        }
    }

    pub fn into_buffer(self) -> Option<SampleBuffer> {
        match self {
            Response::Buffer { samples } => Some(samples),
            Response::Log { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_object() {
        let req = Request::decode(&json!({"command": "generate", "sampleRate": 48000})).unwrap();
        assert_eq!(req, Request::Generate(GenerationRequest::new().with_sample_rate(48000)));

        let typed: Request =
            serde_json::from_str(r#"{"command":"generate","channelBufferSize":5}"#).unwrap();
        assert_eq!(typed, Request::Generate(GenerationRequest::new().with_channel_buffer_size(5)));
    }

    #[test]
    fn unknown_commands_are_ignored() {
        assert_eq!(Request::decode(&json!({"command": "stop"})).unwrap(), Request::Ignored);
        assert_eq!(Request::decode(&json!(["stop", 1])).unwrap(), Request::Ignored);
        assert_eq!(Request::decode(&json!([])).unwrap(), Request::Ignored);
        let typed: Request = serde_json::from_str(r#"{"command":"stop"}"#).unwrap();
        assert_eq!(typed, Request::Ignored);
    }

    #[test]
    fn legacy_arity() {
        assert_eq!(Request::from_legacy(&json!(["generate"])).unwrap(), Request::generate());
        assert_eq!(
            Request::from_legacy(&json!(["generate", 48000])).unwrap(),
            Request::Generate(GenerationRequest::new().with_sample_rate(48000))
        );
        assert_eq!(
            Request::from_legacy(&json!(["generate", 512, 22050.0])).unwrap(),
            Request::Generate(
                GenerationRequest::new().with_channel_buffer_size(512).with_sample_rate(22050)
            )
        );
        assert_eq!(
            Request::from_legacy(&json!(["generate", null, 22050])).unwrap(),
            Request::Generate(GenerationRequest::new().with_sample_rate(22050))
        );
    }

    #[test]
    fn rejects_non_integral_parameters() {
        assert!(Request::decode(&json!(["generate", 44100.5])).is_err());
        assert!(Request::decode(&json!(["generate", "fast"])).is_err());
        assert!(Request::decode(&json!({"command": "generate", "sampleRate": -1})).is_err());
    }

    #[test]
    fn bare_values_are_ignored() {
        assert_eq!(Request::decode(&json!("generate")).unwrap(), Request::Ignored);
        assert_eq!(Request::decode(&json!(42)).unwrap(), Request::Ignored);
        assert_eq!(Request::decode(&json!(null)).unwrap(), Request::Ignored);
        assert!(Request::from_legacy(&json!("generate")).is_err());
    }

    #[test]
    fn typed_and_decoded_agree_on_integral_floats() {
        let text = r#"{"command":"generate","sampleRate":44100.0,"channelBufferSize":512}"#;
        let typed: Request = serde_json::from_str(text).unwrap();
        let decoded = Request::decode(&serde_json::from_str::<Value>(text).unwrap()).unwrap();
        let expected = Request::Generate(
            GenerationRequest::new().with_sample_rate(44100).with_channel_buffer_size(512),
        );
        assert_eq!(typed, expected);
        assert_eq!(decoded, expected);

        let fractional = r#"{"command":"generate","sampleRate":44100.5}"#;
        assert!(serde_json::from_str::<Request>(fractional).is_err());
        assert!(Request::decode(&serde_json::from_str::<Value>(fractional).unwrap()).is_err());
    }

    #[test]
    fn resolve_prefers_request_values() {
        let defaults = ServiceConfig::default();
        let r = GenerationRequest::new().with_channel_buffer_size(4).resolve(&defaults).unwrap();
        assert_eq!(r.channel_buffer_size, 4);
        assert_eq!(r.sample_rate, 44100);
        assert!(GenerationRequest::new().with_sample_rate(0).resolve(&defaults).is_err());
    }

    #[test]
    fn legacy_responses() {
        let mut samples = SampleBuffer::with_frames(1);
        samples.write_frame(0, (0.5, -0.5).into());
        assert_eq!(Response::Buffer { samples }.to_legacy(), json!(["buffer", [0.5, -0.5]]));
        assert_eq!(
            Response::Log { message: "hi".into() }.to_legacy(),
            json!(["log", "hi"])
        );
    }

    #[test]
    fn tagged_response_json() {
        let v = serde_json::to_value(Response::Log { message: "x".into() }).unwrap();
        assert_eq!(v, json!({"type": "log", "message": "x"}));
    }
}
