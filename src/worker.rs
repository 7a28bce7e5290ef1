//! Threaded worker — a service living on its own blocking thread.
//!
//! The host talks to it through a [`WorkerHandle`]. Requests are queued on an
//! inbox and processed strictly one at a time, so two "generate" requests
//! never interleave against the same cursor. Every request carries its own
//! cancel token, so a deadline that expires while the request is still queued
//! cancels that request when it reaches the front, and never another one.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::cancel::CancelToken;
use crate::error::{GeneratorError, Result};
use crate::protocol::{Request, Response};
use crate::service::GenerationService;

const INBOX_CAPACITY: usize = 16;

struct Job {
    request: Request,
    cancel: CancelToken,
    reply: oneshot::Sender<Result<Option<Response>>>,
}

/// Host-side handle to a running worker.
pub struct WorkerHandle {
    inbox: mpsc::Sender<Job>,
    thread: JoinHandle<()>,
}

/// Start a worker. The service is built on the worker thread by `factory`,
/// so tracks holding non-`Send` state are fine.
///
/// Must be called from within a tokio runtime.
pub fn spawn_worker<F>(factory: F) -> WorkerHandle
where
    F: FnOnce() -> GenerationService + Send + 'static,
{
    let (inbox, mut jobs) = mpsc::channel::<Job>(INBOX_CAPACITY);

    let thread = tokio::task::spawn_blocking(move || {
        let mut service = factory();
        while let Some(Job { request, cancel, reply }) = jobs.blocking_recv() {
            let outcome = service.handle_cancellable(request, &cancel);
            if reply.send(outcome).is_err() {
                log::debug!("requester dropped before the reply was ready");
            }
        }
        log::debug!(
            "worker inbox closed at cursor {}",
            service.cursor().position()
        );
    });

    WorkerHandle { inbox, thread }
}

impl WorkerHandle {
    /// Queue a request and wait for its reply.
    pub async fn request(&self, request: Request) -> Result<Option<Response>> {
        self.request_cancellable(request, CancelToken::new()).await
    }

    /// Queue a request that the caller can cancel through `cancel`, whether it
    /// is still queued or already generating.
    pub async fn request_cancellable(
        &self,
        request: Request,
        cancel: CancelToken,
    ) -> Result<Option<Response>> {
        let reply = self.enqueue(request, cancel).await?;
        reply.await.map_err(|_| GeneratorError::WorkerGone)?
    }

    /// Like [`WorkerHandle::request`], but cancel the request if no reply
    /// arrives within `deadline`. The cancelled reply is still awaited, so the
    /// request is finished with when this returns.
    pub async fn request_with_deadline(
        &self,
        request: Request,
        deadline: Duration,
    ) -> Result<Option<Response>> {
        let cancel = CancelToken::new();
        let mut reply = self.enqueue(request, cancel.clone()).await?;
        match tokio::time::timeout(deadline, &mut reply).await {
            Ok(outcome) => outcome.map_err(|_| GeneratorError::WorkerGone)?,
            Err(_) => {
                log::warn!("request exceeded its {deadline:?} deadline, cancelling");
                cancel.cancel();
                reply.await.map_err(|_| GeneratorError::WorkerGone)?
            }
        }
    }

    /// Close the inbox and wait for queued requests to drain.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.inbox);
        self.thread.await.map_err(|e| {
            log::error!("worker thread failed: {e}");
            GeneratorError::WorkerGone
        })
    }

    async fn enqueue(
        &self,
        request: Request,
        cancel: CancelToken,
    ) -> Result<oneshot::Receiver<Result<Option<Response>>>> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(Job { request, cancel, reply })
            .await
            .map_err(|_| GeneratorError::WorkerGone)?;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::GenerationRequest;
    use crate::track::Track;
    use std::sync::{Arc, Mutex};

    fn frames(n: usize) -> Request {
        Request::Generate(GenerationRequest::new().with_sample_rate(1000).with_channel_buffer_size(n))
    }

    #[tokio::test]
    async fn serves_buffers_in_order() {
        let times = Arc::new(Mutex::new(Vec::new()));
        let sink = times.clone();
        let worker = spawn_worker(move || {
            GenerationService::new(Track::from_source(move |t: f64| {
                sink.lock().unwrap().push(t);
                0.5
            }))
        });

        let (a, b, c) = tokio::join!(
            worker.request(frames(5)),
            worker.request(frames(5)),
            worker.request(frames(5))
        );
        for resp in [a, b, c] {
            let buf = resp.unwrap().unwrap().into_buffer().unwrap();
            assert_eq!(buf.as_slice(), &[0.5; 10]);
        }
        worker.shutdown().await.unwrap();

        let times = times.lock().unwrap();
        assert_eq!(times.len(), 15);
        for (i, t) in times.iter().enumerate() {
            assert_eq!(*t, i as f64 / 1000.0);
        }
    }

    #[tokio::test]
    async fn missing_entry_point_replies_with_log() {
        let worker = spawn_worker(|| GenerationService::new(Track::new()));
        let resp = worker.request(Request::generate()).await.unwrap();
        assert!(matches!(resp, Some(Response::Log { .. })));
        assert_eq!(worker.request(Request::Ignored).await.unwrap(), None);
        worker.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn deadline_cancels_slow_track() {
        let worker = spawn_worker(|| {
            GenerationService::new(Track::from_source(|_t: f64| {
                std::thread::sleep(Duration::from_millis(1));
                0.0
            }))
        });

        let outcome = worker
            .request_with_deadline(frames(10_000), Duration::from_millis(20))
            .await;
        match outcome {
            Err(GeneratorError::Cancelled { generated }) => assert!(generated < 10_000),
            other => panic!("expected cancellation, got {other:?}"),
        }

        // The worker is still serving.
        let resp = worker.request(frames(2)).await.unwrap().unwrap();
        assert_eq!(resp.into_buffer().unwrap().len(), 4);
        worker.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn deadline_expiring_while_queued_still_cancels() {
        let worker = spawn_worker(|| {
            std::thread::sleep(Duration::from_millis(100));
            GenerationService::new(Track::from_source(|_t: f64| {
                std::thread::sleep(Duration::from_millis(1));
                0.0
            }))
        });

        let started = std::time::Instant::now();
        let outcome = worker
            .request_with_deadline(frames(2000), Duration::from_millis(20))
            .await;
        match outcome {
            Err(GeneratorError::Cancelled { generated }) => assert!(generated < 2000),
            other => panic!("expected cancellation, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_millis(1500));
        worker.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn cancelling_one_request_spares_the_next() {
        let worker = spawn_worker(|| GenerationService::new(Track::from_source(|_t: f64| 0.25)));
        let doomed = CancelToken::new();
        doomed.cancel();
        let (first, second) = tokio::join!(
            worker.request_cancellable(frames(3), doomed),
            worker.request(frames(3))
        );
        assert!(matches!(first, Err(GeneratorError::Cancelled { generated: 0 })));
        assert_eq!(second.unwrap().unwrap().into_buffer().unwrap().as_slice(), &[0.25; 6]);
        worker.shutdown().await.unwrap();
    }
}
