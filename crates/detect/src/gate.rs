//! Single-flight admission control for the detector.
//!
//! The gate is a one-permit [`tokio::sync::Semaphore`]. Permits are handed
//! out in FIFO order, so users are served in the order their requests reached
//! the gate. A [`GatePermit`] releases the gate when dropped, which covers
//! early returns, detector errors and panics alike.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

use {
    tokio::sync::{Semaphore, SemaphorePermit},
    tracing::{debug, warn},
};

use crate::{DetectionJob, DetectionResult, Detector, Error, Result};

/// Capacity-1 gate shared by every session for the process lifetime.
#[derive(Debug)]
pub struct AdmissionGate {
    permits: Semaphore,
    waiting: AtomicUsize,
}

/// Proof of admission. The gate reopens when this is dropped.
#[derive(Debug)]
pub struct GatePermit<'a> {
    _permit: SemaphorePermit<'a>,
    admitted_at: Instant,
    waited: Duration,
}

impl GatePermit<'_> {
    /// Time spent queueing before admission.
    #[must_use]
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Time since admission.
    #[must_use]
    pub fn held(&self) -> Duration {
        self.admitted_at.elapsed()
    }
}

/// Keeps the waiter count right even when an `acquire` future is dropped
/// before it is admitted.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AdmissionGate {
    #[must_use]
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(1),
            waiting: AtomicUsize::new(0),
        }
    }

    /// Wait until the gate is free and take it.
    pub async fn acquire(&self) -> Result<GatePermit<'_>> {
        let queued_at = Instant::now();
        let permit = {
            let _waiting = WaitingGuard::enter(&self.waiting);
            self.permits.acquire().await.map_err(|_| Error::GateClosed)?
        };
        Ok(GatePermit {
            _permit: permit,
            admitted_at: Instant::now(),
            waited: queued_at.elapsed(),
        })
    }

    /// Take the gate only if nobody holds it right now.
    #[must_use]
    pub fn try_acquire(&self) -> Option<GatePermit<'_>> {
        self.permits.try_acquire().ok().map(|permit| GatePermit {
            _permit: permit,
            admitted_at: Instant::now(),
            waited: Duration::ZERO,
        })
    }

    /// Whether a detection currently holds the gate.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }

    /// Number of callers queued in [`AdmissionGate::acquire`].
    #[must_use]
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// The detector as seen by the rest of the system: every call goes through
/// the shared gate.
#[derive(Clone)]
pub struct GatedDetector {
    detector: Arc<dyn Detector>,
    gate: Arc<AdmissionGate>,
}

impl GatedDetector {
    #[must_use]
    pub fn new(detector: Arc<dyn Detector>, gate: Arc<AdmissionGate>) -> Self {
        Self { detector, gate }
    }

    #[must_use]
    pub fn gate(&self) -> &Arc<AdmissionGate> {
        &self.gate
    }

    /// Run one detection once admitted. The gate is released before the
    /// result (or error) is handed back.
    pub async fn process(&self, job: &DetectionJob) -> Result<DetectionResult> {
        let queued = self.gate.waiting();
        let permit = self.gate.acquire().await?;
        debug!(
            detector = self.detector.id(),
            source = %job.source_path.display(),
            queued,
            waited_ms = permit.waited().as_millis() as u64,
            "admission gate acquired"
        );

        let result = self.detector.process(job).await;
        let held = permit.held();
        drop(permit);

        match &result {
            Ok(detection) => debug!(
                detector = self.detector.id(),
                boxes = detection.boxes.len(),
                held_ms = held.as_millis() as u64,
                "admission gate released"
            ),
            Err(e) => warn!(
                detector = self.detector.id(),
                source = %job.source_path.display(),
                held_ms = held.as_millis() as u64,
                error = %e,
                "detection failed, admission gate released"
            ),
        }
        result
    }
}
