//! Bounded background queue for lifecycle capture.
//!
//! Hooks enqueue a [`CaptureJob`] and return immediately. A fixed pool of
//! workers drains the queue, each job bounded by a timeout. A full queue
//! rejects new work instead of growing, and [`CaptureQueue::shutdown`] stops
//! intake and waits for queued jobs to finish.
//!
//! Capture is best-effort: failures never reach the hook caller. They are
//! logged, counted, and kept in a bounded failure log for inspection.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dop_ledger::LifecycleEvent;
use dop_types::{DigitalObject, EventContext};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{CaptureError, CaptureResult};
use crate::lifecycle::{CaptureOutcome, EventCapture};

/// Queue sizing and time budget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Jobs that may wait for a worker.
    pub capacity: usize,
    pub workers: usize,
    /// Upper bound on one job, polling included.
    pub job_timeout_ms: u64,
    /// Number of most recent failures retained.
    pub failure_log_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            workers: 4,
            job_timeout_ms: 60_000,
            failure_log_capacity: 256,
        }
    }
}

/// A lifecycle event awaiting capture.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureJob {
    Create {
        object: DigitalObject,
        context: EventContext,
    },
    Update {
        original: DigitalObject,
        modified: DigitalObject,
        context: EventContext,
    },
    Delete {
        object: DigitalObject,
        context: EventContext,
        requested_at: DateTime<Utc>,
    },
}

impl CaptureJob {
    pub fn event(&self) -> LifecycleEvent {
        match self {
            Self::Create { .. } => LifecycleEvent::Insert,
            Self::Update { .. } => LifecycleEvent::Update,
            Self::Delete { .. } => LifecycleEvent::Delete,
        }
    }

    /// Best-known id of the affected entity (empty before creation).
    pub fn entity_id(&self) -> String {
        let (object, context) = match self {
            Self::Create { object, context } | Self::Delete { object, context, .. } => {
                (object, context)
            }
            Self::Update {
                modified, context, ..
            } => (modified, context),
        };
        object
            .id
            .clone()
            .or_else(|| context.object_id.clone())
            .unwrap_or_default()
    }

    /// Run the capture this job describes.
    pub async fn execute(&self, capture: &EventCapture) -> CaptureResult<CaptureOutcome> {
        match self {
            Self::Create { object, context } => capture.capture_create(object, context).await,
            Self::Update {
                original,
                modified,
                context,
            } => capture.capture_update(original, modified, context).await,
            Self::Delete {
                object,
                context,
                requested_at,
            } => capture.capture_delete(object, context, *requested_at).await,
        }
    }
}

/// Snapshot of queue counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CaptureStats {
    pub submitted: u64,
    pub recorded: u64,
    pub skipped: u64,
    pub failed: u64,
    pub timed_out: u64,
}

impl CaptureStats {
    /// Jobs that have finished, whatever their outcome.
    pub fn completed(&self) -> u64 {
        self.recorded + self.skipped + self.failed + self.timed_out
    }
}

/// A capture job that ended in an error or a timeout.
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureFailure {
    pub event: LifecycleEvent,
    pub entity_id: String,
    pub error: CaptureError,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    recorded: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    timed_out: AtomicU64,
}

struct Shared {
    capture: Arc<EventCapture>,
    counters: Counters,
    failures: Mutex<VecDeque<CaptureFailure>>,
    failure_capacity: usize,
    job_timeout: Duration,
    /// Signalled after every finished job.
    idle: Notify,
}

type JobReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<CaptureJob>>>;

/// Bounded worker pool running lifecycle capture in the background.
pub struct CaptureQueue {
    sender: Mutex<Option<mpsc::Sender<CaptureJob>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shared: Arc<Shared>,
}

impl CaptureQueue {
    /// Spawn the worker pool. Must be called from within a tokio runtime.
    pub fn start(capture: Arc<EventCapture>, config: QueueConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));
        let receiver: JobReceiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let shared = Arc::new(Shared {
            capture,
            counters: Counters::default(),
            failures: Mutex::new(VecDeque::new()),
            failure_capacity: config.failure_log_capacity,
            job_timeout: Duration::from_millis(config.job_timeout_ms),
            idle: Notify::new(),
        });

        let workers = (0..config.workers.max(1))
            .map(|worker| {
                let shared = shared.clone();
                let receiver = receiver.clone();
                tokio::spawn(async move { shared.work(worker, receiver).await })
            })
            .collect();
        debug!(
            capacity = config.capacity,
            workers = config.workers.max(1),
            "capture queue started"
        );

        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            shared,
        }
    }

    /// Enqueue a job without waiting.
    ///
    /// Fails with [`CaptureError::QueueFull`] when every slot is taken and
    /// [`CaptureError::QueueClosed`] after shutdown.
    pub fn submit(&self, job: CaptureJob) -> CaptureResult<()> {
        let guard = self.sender.lock().expect("lock poisoned");
        let Some(sender) = guard.as_ref() else {
            return Err(CaptureError::QueueClosed);
        };
        match sender.try_send(job) {
            Ok(()) => {
                self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(job)) => {
                warn!(
                    event = %job.event(),
                    entity_id = %job.entity_id(),
                    "capture queue full, event dropped"
                );
                Err(CaptureError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(CaptureError::QueueClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().expect("lock poisoned").is_none()
    }

    pub fn stats(&self) -> CaptureStats {
        let c = &self.shared.counters;
        CaptureStats {
            submitted: c.submitted.load(Ordering::Relaxed),
            recorded: c.recorded.load(Ordering::Relaxed),
            skipped: c.skipped.load(Ordering::Relaxed),
            failed: c.failed.load(Ordering::Relaxed),
            timed_out: c.timed_out.load(Ordering::Relaxed),
        }
    }

    /// Most recent failures, oldest first.
    pub fn failures(&self) -> Vec<CaptureFailure> {
        let failures = self.shared.failures.lock().expect("lock poisoned");
        failures.iter().cloned().collect()
    }

    /// Wait until every job submitted so far has finished, without closing
    /// the queue.
    pub async fn drain(&self) {
        loop {
            let finished = self.shared.idle.notified();
            let stats = self.stats();
            if stats.completed() >= stats.submitted {
                return;
            }
            finished.await;
        }
    }

    /// Stop accepting jobs and wait for queued and running ones to finish.
    pub async fn shutdown(&self) {
        self.sender.lock().expect("lock poisoned").take();
        let workers = std::mem::take(&mut *self.workers.lock().expect("lock poisoned"));
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "capture worker terminated abnormally");
            }
        }
        let stats = self.stats();
        info!(
            submitted = stats.submitted,
            recorded = stats.recorded,
            skipped = stats.skipped,
            failed = stats.failed,
            timed_out = stats.timed_out,
            "capture queue drained"
        );
    }
}

impl Shared {
    async fn work(&self, worker: usize, receiver: JobReceiver) {
        loop {
            let job = receiver.lock().await.recv().await;
            let Some(job) = job else { break };
            self.process(job).await;
        }
        debug!(worker, "capture worker stopped");
    }

    async fn process(&self, job: CaptureJob) {
        let event = job.event();
        let entity_id = job.entity_id();
        match tokio::time::timeout(self.job_timeout, job.execute(&self.capture)).await {
            Ok(Ok(CaptureOutcome::Recorded(_))) => {
                self.counters.recorded.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Ok(CaptureOutcome::Skipped(_))) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                error!(event = %event, entity_id = %entity_id, error = %e, "lifecycle capture failed");
                self.remember(event, entity_id, e);
            }
            Err(_) => {
                self.counters.timed_out.fetch_add(1, Ordering::Relaxed);
                error!(
                    event = %event,
                    entity_id = %entity_id,
                    timeout = ?self.job_timeout,
                    "lifecycle capture timed out"
                );
                self.remember(event, entity_id, CaptureError::Timeout(self.job_timeout));
            }
        }
        self.idle.notify_waiters();
    }

    fn remember(&self, event: LifecycleEvent, entity_id: String, error: CaptureError) {
        if self.failure_capacity == 0 {
            return;
        }
        let mut failures = self.failures.lock().expect("lock poisoned");
        while failures.len() >= self.failure_capacity {
            failures.pop_front();
        }
        failures.push_back(CaptureFailure {
            event,
            entity_id,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureConfig;
    use crate::poll::Backoff;
    use crate::testing::{content, Fixture};
    use dop_types::{Clock, SystemClock};
    use serde_json::json;

    fn create_job(fx: &Fixture, label: &str) -> CaptureJob {
        let object = DigitalObject::new("Specimen", content(json!({ "label": label })));
        fx.entities.create_as(&object, "alice");
        CaptureJob::Create {
            object,
            context: EventContext::for_user("alice"),
        }
    }

    fn queue(fx: &Fixture, config: QueueConfig) -> CaptureQueue {
        CaptureQueue::start(Arc::new(fx.capture(CaptureConfig::default())), config)
    }

    #[tokio::test]
    async fn drains_every_job_on_shutdown() {
        let fx = Fixture::new();
        let queue = queue(&fx, QueueConfig::default());

        queue.submit(create_job(&fx, "one")).unwrap();
        queue.submit(create_job(&fx, "two")).unwrap();
        let kept = fx
            .entities
            .create_as(&DigitalObject::new("Specimen", content(json!({"label": "kept"}))), "alice");
        queue
            .submit(CaptureJob::Delete {
                object: kept,
                context: EventContext::for_user("alice"),
                requested_at: fx.clock.now(),
            })
            .unwrap();

        queue.shutdown().await;
        let stats = queue.stats();
        assert_eq!(
            stats,
            CaptureStats {
                submitted: 3,
                recorded: 2,
                skipped: 1,
                failed: 0,
                timed_out: 0,
            }
        );
        assert_eq!(stats.completed(), 3);
        assert_eq!(fx.records().len(), 2);
        assert!(queue.failures().is_empty());
    }

    #[tokio::test]
    async fn drain_waits_without_closing() {
        let fx = Fixture::new();
        let queue = queue(&fx, QueueConfig::default());

        queue.submit(create_job(&fx, "one")).unwrap();
        queue.drain().await;
        assert_eq!(queue.stats().recorded, 1);
        assert!(!queue.is_closed());

        queue.submit(create_job(&fx, "two")).unwrap();
        queue.drain().await;
        assert_eq!(queue.stats().recorded, 2);
        queue.shutdown().await;
    }

    #[tokio::test]
    async fn full_queue_rejects_work() {
        let fx = Fixture::new();
        let queue = queue(
            &fx,
            QueueConfig {
                capacity: 1,
                workers: 1,
                ..QueueConfig::default()
            },
        );

        // Workers only run once this task yields, so the single slot stays taken.
        queue.submit(create_job(&fx, "one")).unwrap();
        let err = queue.submit(create_job(&fx, "two")).unwrap_err();
        assert_eq!(err, CaptureError::QueueFull);

        queue.shutdown().await;
        assert_eq!(queue.stats().submitted, 1);
        assert_eq!(queue.stats().recorded, 1);
    }

    #[tokio::test]
    async fn closed_after_shutdown() {
        let fx = Fixture::new();
        let queue = queue(&fx, QueueConfig::default());
        queue.shutdown().await;
        assert!(queue.is_closed());
        let err = queue.submit(create_job(&fx, "late")).unwrap_err();
        assert_eq!(err, CaptureError::QueueClosed);
    }

    #[tokio::test]
    async fn failures_are_logged_and_bounded() {
        let fx = Fixture::new();
        let queue = queue(
            &fx,
            QueueConfig {
                failure_log_capacity: 2,
                ..QueueConfig::default()
            },
        );
        let jobs: Vec<CaptureJob> = ["a", "b", "c"].iter().map(|l| create_job(&fx, l)).collect();
        fx.entities.set_failing(true);
        for job in jobs {
            queue.submit(job).unwrap();
        }

        queue.shutdown().await;
        assert_eq!(queue.stats().failed, 3);
        let failures = queue.failures();
        assert_eq!(failures.len(), 2);
        for failure in failures {
            assert_eq!(failure.event, LifecycleEvent::Insert);
            assert_eq!(failure.error, CaptureError::RemoteStore("store unavailable".into()));
        }
        assert!(fx.records().is_empty());
    }

    #[tokio::test]
    async fn slow_jobs_time_out() {
        let fx = Fixture::new();
        let config = CaptureConfig {
            visibility: Backoff::once_after(Duration::from_secs(3_600)),
            ..CaptureConfig::default()
        };
        let capture = EventCapture::new(
            fx.entities.clone(),
            fx.provenance.clone(),
            Arc::new(SystemClock),
            config,
        );
        let queue = CaptureQueue::start(
            Arc::new(capture),
            QueueConfig {
                job_timeout_ms: 20,
                ..QueueConfig::default()
            },
        );

        queue.submit(create_job(&fx, "slow")).unwrap();
        queue.shutdown().await;

        assert_eq!(queue.stats().timed_out, 1);
        let failures = queue.failures();
        assert_eq!(failures[0].error, CaptureError::Timeout(Duration::from_millis(20)));
        assert!(fx.records().is_empty());
    }

    #[test]
    fn job_entity_id_falls_back_to_context() {
        let job = CaptureJob::Delete {
            object: DigitalObject::new("Specimen", Default::default()),
            context: EventContext::for_user("alice").with_object("entity/1"),
            requested_at: Utc::now(),
        };
        assert_eq!(job.entity_id(), "entity/1");
        assert_eq!(job.event(), LifecycleEvent::Delete);
    }
}
