//! Generation Service — turns one "generate" request into one buffer.
//!
//! The service owns its cursor (the running count of samples produced) and
//! the registered [`Track`]. Every request runs to completion before
//! `handle` returns: for each frame it computes the absolute time from the
//! cursor, asks the track for a sample, advances the cursor, clips and
//! writes the frame. Nothing else is shared, so two services never see each
//! other's time.

use serde_json::Value;

use crate::cancel::CancelToken;
use crate::config::ServiceConfig;
use crate::error::{GeneratorError, Result};
use crate::protocol::{GenerationRequest, Request, Response};
use crate::sample::SampleBuffer;
use crate::track::Track;

/// Running count of samples generated since the service started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationCursor(u64);

impl GenerationCursor {
    pub fn position(&self) -> u64 {
        self.0
    }

    /// Absolute time in seconds of the next sample at `sample_rate`.
    pub fn time_at(&self, sample_rate: u32) -> f64 {
        self.0 as f64 / sample_rate as f64
    }

    fn advance(&mut self) {
        self.0 += 1;
    }
}

pub struct GenerationService {
    track: Track,
    config: ServiceConfig,
    cursor: GenerationCursor,
    cancel: CancelToken,
}

impl GenerationService {
    pub fn new(track: Track) -> Self {
        Self::with_config(track, ServiceConfig::default())
    }

    pub fn with_config(track: Track, config: ServiceConfig) -> Self {
        if !track.has_entry_point() {
            log::warn!("track registered without a sample source or initializer");
        }
        GenerationService {
            track,
            config,
            cursor: GenerationCursor::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn cursor(&self) -> GenerationCursor {
        self.cursor
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Handle to cancel the request currently being generated.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Process one inbound command.
    ///
    /// Returns `Ok(None)` for commands this worker ignores and a `Log`
    /// response when the track has no entry point. Shape errors, callback
    /// failures and cancellation fail the request; the service stays usable.
    ///
    /// Cancellation comes from [`GenerationService::cancel_token`]; a cancel
    /// issued while idle is discarded.
    pub fn handle(&mut self, request: Request) -> Result<Option<Response>> {
        self.cancel.take();
        let cancel = self.cancel.clone();
        self.handle_cancellable(request, &cancel)
    }

    /// Like [`GenerationService::handle`], but cancelled through a token that
    /// belongs to this one request. A token tripped before the request starts
    /// fails it without producing any sample.
    pub fn handle_cancellable(
        &mut self,
        request: Request,
        cancel: &CancelToken,
    ) -> Result<Option<Response>> {
        let params = match request {
            Request::Generate(params) => params,
            Request::Ignored => {
                log::trace!("ignoring non-generate command");
                return Ok(None);
            }
        };
        match self.run(&params, cancel) {
            Ok(samples) => Ok(Some(Response::Buffer { samples })),
            Err(GeneratorError::MissingEntryPoint) => {
                let message = GeneratorError::MissingEntryPoint.to_string();
                log::warn!("{message}");
                Ok(Some(Response::Log { message }))
            }
            Err(e) => Err(e),
        }
    }

    /// Decode a raw message (canonical object or legacy array) and handle it.
    pub fn handle_message(&mut self, message: &Value) -> Result<Option<Response>> {
        let request = Request::decode(message)?;
        self.handle(request)
    }

    /// Generate one buffer. A missing entry point is reported as an error here.
    pub fn generate(&mut self, params: &GenerationRequest) -> Result<SampleBuffer> {
        self.cancel.take();
        let cancel = self.cancel.clone();
        self.run(params, &cancel)
    }

    fn run(&mut self, params: &GenerationRequest, cancel: &CancelToken) -> Result<SampleBuffer> {
        let resolved = params.resolve(&self.config)?;
        if !self.track.prepare() {
            return Err(GeneratorError::MissingEntryPoint);
        }
        if cancel.take() {
            log::warn!("generation cancelled before it started");
            return Err(GeneratorError::Cancelled { generated: 0 });
        }

        let frames = resolved.channel_buffer_size;
        let mut buffer = SampleBuffer::try_with_frames(frames)?;
        for i in 0..frames {
            let time = self.cursor.time_at(resolved.sample_rate);
            let sample = self.track.sample_at(time);
            self.cursor.advance();
            let sample = sample.map_err(|e| {
                let e = e.at_frame(i);
                log::error!("{e}");
                e
            })?;
            if cancel.take() {
                log::warn!("generation cancelled after {} of {frames} frames", i + 1);
                return Err(GeneratorError::Cancelled { generated: i + 1 });
            }
            buffer.write_frame(i, sample);
        }

        log::debug!(
            "generated {frames} frames at {} Hz, cursor now {}",
            resolved.sample_rate,
            self.cursor.position()
        );
        Ok(buffer)
    }
}
