//! Periodic resync scheduler
//!
//! Runs a reconciliation pass for every configured certificate request on a
//! fixed interval. Passes within one sweep run concurrently, bounded by a
//! semaphore; a failed pass is logged and retried on the next sweep.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use certsync_common::CertificateRequest;

use crate::reconcile::{ReconcileOutcome, Reconciler};

/// Default resync interval (5 minutes)
const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Minimum resync interval
const MIN_RESYNC_INTERVAL: Duration = Duration::from_secs(1);

/// Default number of passes allowed to run at once
const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Tally of one sweep over all requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub unchanged: usize,
    pub issued: usize,
    pub concurrently_issued: usize,
    pub failed: usize,
}

impl SyncSummary {
    pub fn total(&self) -> usize {
        self.unchanged + self.issued + self.concurrently_issued + self.failed
    }

    fn record(&mut self, outcome: &ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Unchanged => self.unchanged += 1,
            ReconcileOutcome::Issued { .. } => self.issued += 1,
            ReconcileOutcome::ConcurrentlyIssued { .. } => self.concurrently_issued += 1,
        }
    }
}

/// Background resync scheduler
pub struct ResyncScheduler {
    reconciler: Reconciler,
    requests: Arc<Vec<CertificateRequest>>,
    resync_interval: Duration,
    max_concurrent: usize,
}

impl ResyncScheduler {
    pub fn new(reconciler: Reconciler, requests: Vec<CertificateRequest>) -> Self {
        Self {
            reconciler,
            requests: Arc::new(requests),
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    /// Set the resync interval
    ///
    /// The interval is clamped to a minimum of 1 second.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.resync_interval = interval.max(MIN_RESYNC_INTERVAL);
        self
    }

    /// Set how many passes may run at once (at least 1)
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn requests(&self) -> &[CertificateRequest] {
        &self.requests
    }

    /// Run the resync loop
    ///
    /// The first sweep starts immediately. This runs until the task is
    /// dropped.
    pub async fn run(self) {
        info!(
            requests = self.requests.len(),
            resync_interval_secs = self.resync_interval.as_secs(),
            max_concurrent = self.max_concurrent,
            "Starting resync scheduler"
        );

        let mut ticker = interval(self.resync_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            debug!("Running scheduled resync");
            self.run_once().await;
        }
    }

    /// Reconcile every request once and wait for all passes to finish
    pub async fn run_once(&self) -> SyncSummary {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut passes = JoinSet::new();

        for index in 0..self.requests.len() {
            let reconciler = self.reconciler.clone();
            let requests = Arc::clone(&self.requests);
            let semaphore = Arc::clone(&semaphore);

            passes.spawn(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                reconciler.reconcile(&requests[index]).await
            });
        }

        let mut summary = SyncSummary::default();
        while let Some(joined) = passes.join_next().await {
            match joined {
                Ok(Ok(outcome)) => summary.record(&outcome),
                // Already reported by the reconciler's diagnostics
                Ok(Err(_)) => summary.failed += 1,
                Err(e) => {
                    error!(error = %e, "Reconciliation task panicked or was cancelled");
                    summary.failed += 1;
                }
            }
        }

        info!(
            unchanged = summary.unchanged,
            issued = summary.issued,
            concurrently_issued = summary.concurrently_issued,
            failed = summary.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Resync complete"
        );

        summary
    }
}

impl fmt::Debug for ResyncScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResyncScheduler")
            .field("requests", &self.requests.len())
            .field("resync_interval", &self.resync_interval)
            .field("max_concurrent", &self.max_concurrent)
            .finish()
    }
}
