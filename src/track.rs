//! Track registration — the user code a service calls into.
//!
//! A track supplies its sample-producing entry point up front. Older tracks
//! that only provide an initializer (`buildTrack`) get it run once, lazily,
//! right before the first buffer is generated; whatever source it returns is
//! used from then on.

use crate::error::Result;
use crate::sample::SampleValue;

/// Produces one sample for the given absolute time in seconds.
pub trait SampleSource {
    fn build_sample(&mut self, time: f64) -> Result<SampleValue>;
}

impl<F, S> SampleSource for F
where
    F: FnMut(f64) -> S,
    S: Into<SampleValue>,
{
    fn build_sample(&mut self, time: f64) -> Result<SampleValue> {
        Ok(self(time).into())
    }
}

/// Adapts a callback that can fail, e.g. one returning dynamically typed values.
pub struct Fallible<F>(pub F);

impl<F> SampleSource for Fallible<F>
where
    F: FnMut(f64) -> Result<SampleValue>,
{
    fn build_sample(&mut self, time: f64) -> Result<SampleValue> {
        (self.0)(time)
    }
}

/// Told the current time before every sample callback.
pub trait TimeObserver {
    fn set_time(&mut self, time: f64);
}

impl<F> TimeObserver for F
where
    F: FnMut(f64),
{
    fn set_time(&mut self, time: f64) {
        self(time)
    }
}

type Initializer = Box<dyn FnOnce() -> Box<dyn SampleSource>>;

/// The registered entry points of one track.
#[derive(Default)]
pub struct Track {
    source: Option<Box<dyn SampleSource>>,
    initializer: Option<Initializer>,
    observer: Option<Box<dyn TimeObserver>>,
}

impl Track {
    pub fn new() -> Self {
        Self::default()
    }

    /// A track built around a single sample callback.
    pub fn from_source(source: impl SampleSource + 'static) -> Self {
        Self::new().with_sample_source(source)
    }

    pub fn with_sample_source(mut self, source: impl SampleSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Register a one-shot initializer that yields the sample source.
    ///
    /// Only consulted when no sample source was registered directly.
    pub fn with_initializer<F, S>(mut self, init: F) -> Self
    where
        F: FnOnce() -> S + 'static,
        S: SampleSource + 'static,
    {
        self.initializer = Some(Box::new(move || Box::new(init()) as Box<dyn SampleSource>));
        self
    }

    pub fn with_time_observer(mut self, observer: impl TimeObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Can this track produce samples at all?
    pub fn has_entry_point(&self) -> bool {
        self.source.is_some() || self.initializer.is_some()
    }

    /// Resolve the sample source, running the initializer if that is the only
    /// entry point. Returns `false` when the track has none.
    pub(crate) fn prepare(&mut self) -> bool {
        if self.source.is_none() {
            if let Some(init) = self.initializer.take() {
                log::debug!("running track initializer");
                self.source = Some(init());
            }
        }
        self.source.is_some()
    }

    /// Notify the observer, then ask the source for the sample at `time`.
    ///
    /// Callers must have called [`Track::prepare`] first.
    pub(crate) fn sample_at(&mut self, time: f64) -> Result<SampleValue> {
        if let Some(observer) = self.observer.as_mut() {
            observer.set_time(time);
        }
        match self.source.as_mut() {
            Some(source) => source.build_sample(time),
            None => Err(crate::error::GeneratorError::MissingEntryPoint),
        }
    }
}
