pub mod cancel;
pub mod config;
pub mod error;
mod js;
pub mod protocol;
#[cfg(feature = "wav")]
pub mod renderer;
pub mod sample;
pub mod service;
pub mod track;
#[cfg(feature = "runtime")]
pub mod worker;

pub use crate::config::ServiceConfig;
pub use crate::error::{GeneratorError, Result};
pub use crate::protocol::{GenerationRequest, Request, Response};
pub use crate::sample::{SampleBuffer, SampleValue};
pub use crate::service::{GenerationCursor, GenerationService};
pub use crate::track::{Fallible, SampleSource, TimeObserver, Track};

use js_sys::{Array, Float64Array, Function};
use wasm_bindgen::prelude::*;

use crate::js::{JsSampleSource, JsTimer};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the sample_worker version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: a generation service driven by JS track code.
///
/// The worker script constructs one of these with whatever entry points the
/// track defined, then forwards every inbound message to `handle` and posts
/// back whatever it returns.
#[wasm_bindgen]
pub struct WorkerService {
    inner: GenerationService,
}

#[wasm_bindgen]
impl WorkerService {
    /// `timer` may be any object with a `setTime(t)` method, or `undefined`.
    /// `config` may be `undefined` or `{sampleRate?, channelBufferSize?}`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        build_sample: Option<Function>,
        build_track: Option<Function>,
        timer: JsValue,
        config: JsValue,
    ) -> std::result::Result<WorkerService, JsValue> {
        let config = if config.is_undefined() || config.is_null() {
            ServiceConfig::default()
        } else {
            let config: ServiceConfig = serde_wasm_bindgen::from_value(config)?;
            config.validate().map_err(|e| JsValue::from_str(&format!("{e}")))?;
            config
        };

        let mut track = Track::new();
        if let Some(func) = build_sample {
            track = track.with_sample_source(JsSampleSource::Ready(func));
        }
        if let Some(init) = build_track {
            track = track.with_initializer(move || JsSampleSource::from_initializer(&init));
        }
        if let Some(timer) = JsTimer::from_object(timer) {
            track = track.with_time_observer(timer);
        }

        Ok(WorkerService {
            inner: GenerationService::with_config(track, config),
        })
    }

    /// Handle one message (`["generate", ...]` or `{command: "generate", ...}`).
    ///
    /// Returns `["buffer", Float64Array]`, `["log", string]`, or `undefined`
    /// for commands the worker ignores. Failures are thrown as strings.
    pub fn handle(&mut self, message: JsValue) -> std::result::Result<JsValue, JsValue> {
        let message: serde_json::Value = serde_wasm_bindgen::from_value(message)?;
        let response = self
            .inner
            .handle_message(&message)
            .map_err(|e| JsValue::from_str(&format!("{e}")))?;
        Ok(match response {
            Some(Response::Buffer { samples }) => {
                let samples = Float64Array::from(samples.into_vec().as_slice());
                Array::of2(&JsValue::from_str("buffer"), &samples).into()
            }
            Some(Response::Log { message }) => {
                Array::of2(&JsValue::from_str("log"), &JsValue::from_str(&message)).into()
            }
            None => JsValue::UNDEFINED,
        })
    }

    /// Samples generated so far.
    #[wasm_bindgen(getter)]
    pub fn cursor(&self) -> f64 {
        self.inner.cursor().position() as f64
    }
}
