//! Adapters from JS track code to the Rust track traits.

use js_sys::{Array, Float32Array, Float64Array, Function, Reflect};
use wasm_bindgen::{JsCast, JsValue};

use crate::error::{GeneratorError, Result};
use crate::sample::{RawSample, SampleValue};
use crate::track::{SampleSource, TimeObserver};

/// A JS `buildSample(time)` function, or the reason there isn't one.
pub(crate) enum JsSampleSource {
    Ready(Function),
    Broken(String),
}

impl JsSampleSource {
    /// Run a `buildTrack()` initializer and adopt its sample function.
    ///
    /// Initializers either return `buildSample(time)` or install it as a
    /// global; the global is looked up only after the initializer has run.
    pub(crate) fn from_initializer(build_track: &Function) -> Self {
        let returned = match build_track.call0(&JsValue::NULL) {
            Ok(value) => value,
            Err(e) => return JsSampleSource::Broken(format!("buildTrack() threw: {}", describe(&e))),
        };
        if let Ok(func) = returned.dyn_into::<Function>() {
            return JsSampleSource::Ready(func);
        }
        match Reflect::get(&js_sys::global(), &JsValue::from_str("buildSample"))
            .ok()
            .and_then(|v| v.dyn_into::<Function>().ok())
        {
            Some(func) => JsSampleSource::Ready(func),
            None => JsSampleSource::Broken(
                "buildTrack() neither returned nor defined a buildSample(time) function".into(),
            ),
        }
    }
}

impl SampleSource for JsSampleSource {
    fn build_sample(&mut self, time: f64) -> Result<SampleValue> {
        match self {
            JsSampleSource::Ready(func) => {
                let value = func
                    .call1(&JsValue::NULL, &JsValue::from_f64(time))
                    .map_err(|e| GeneratorError::Callback(describe(&e)))?;
                sample_from_js(&value)
            }
            JsSampleSource::Broken(reason) => Err(GeneratorError::Callback(reason.clone())),
        }
    }
}

/// A global timer object exposing `setTime(t)`.
pub(crate) struct JsTimer {
    target: JsValue,
    set_time: Function,
}

impl JsTimer {
    /// `None` when `target` is not an object with a callable `setTime`.
    pub(crate) fn from_object(target: JsValue) -> Option<Self> {
        if !target.is_object() {
            return None;
        }
        let set_time = Reflect::get(&target, &JsValue::from_str("setTime"))
            .ok()?
            .dyn_into::<Function>()
            .ok()?;
        Some(JsTimer { target, set_time })
    }
}

impl TimeObserver for JsTimer {
    fn set_time(&mut self, time: f64) {
        if let Err(e) = self.set_time.call1(&self.target, &JsValue::from_f64(time)) {
            log::warn!("timer.setTime threw: {}", describe(&e));
        }
    }
}

/// Number → mono, two-element array (or typed array) of numbers → stereo.
pub(crate) fn sample_from_js(value: &JsValue) -> Result<SampleValue> {
    raw_sample(value).classify()
}

fn raw_sample(value: &JsValue) -> RawSample {
    if let Some(s) = value.as_f64() {
        return RawSample::Number(s);
    }
    if Array::is_array(value) {
        let items = Array::from(value);
        return RawSample::Sequence {
            len: items.length() as usize,
            head: [items.get(0).as_f64(), items.get(1).as_f64()],
        };
    }
    if let Some(typed) = value.dyn_ref::<Float64Array>() {
        let len = typed.length();
        return RawSample::Sequence {
            len: len as usize,
            head: [
                (len > 0).then(|| typed.get_index(0)),
                (len > 1).then(|| typed.get_index(1)),
            ],
        };
    }
    if let Some(typed) = value.dyn_ref::<Float32Array>() {
        let len = typed.length();
        return RawSample::Sequence {
            len: len as usize,
            head: [
                (len > 0).then(|| typed.get_index(0) as f64),
                (len > 1).then(|| typed.get_index(1) as f64),
            ],
        };
    }
    RawSample::Other(describe(value))
}

fn describe(value: &JsValue) -> String {
    value.as_string().unwrap_or_else(|| format!("{value:?}"))
}
