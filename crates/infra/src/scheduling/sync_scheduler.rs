//! Interval-driven runner for [`SyncService`] passes.
//!
//! One background task owns the loop, so passes never overlap. The loop
//! wakes on the configured interval or on [`SyncScheduler::trigger_now`],
//! and every pass runs under a timeout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use timekeep_infra::scheduling::{SyncScheduler, SyncSchedulerConfig};
//! use timekeep_infra::sync::SyncService;
//!
//! # async fn example(service: Arc<SyncService>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncSchedulerConfig::from_sync_config(service.config());
//! let mut scheduler = SyncScheduler::new(service, config);
//!
//! scheduler.start()?;
//! scheduler.trigger_now();
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use timekeep_domain::{SyncConfig, SyncReport};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};
use crate::sync::SyncService;

/// Configuration for the sync scheduler
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Time between passes
    pub interval: Duration,
    /// Upper bound for a single pass
    pub cycle_timeout: Duration,
    /// How long `stop` waits for the loop to exit
    pub join_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self::from_sync_config(&SyncConfig::default())
    }
}

impl SyncSchedulerConfig {
    pub fn from_sync_config(config: &SyncConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_seconds),
            cycle_timeout: Duration::from_secs(config.cycle_timeout_seconds),
            join_timeout: Duration::from_secs(5),
        }
    }
}

type LastReport = Arc<Mutex<Option<SyncReport>>>;

/// Sync scheduler with explicit lifecycle management
pub struct SyncScheduler {
    service: Arc<SyncService>,
    config: SyncSchedulerConfig,
    cancellation_token: CancellationToken,
    trigger: Arc<Notify>,
    task_handle: Option<JoinHandle<()>>,
    last_report: LastReport,
}

impl SyncScheduler {
    pub fn new(service: Arc<SyncService>, config: SyncSchedulerConfig) -> Self {
        Self {
            service,
            config,
            cancellation_token: CancellationToken::new(),
            trigger: Arc::new(Notify::new()),
            task_handle: None,
            last_report: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn the background loop.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] when the loop is active.
    #[instrument(skip(self))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(interval_secs = self.config.interval.as_secs(), "Starting sync scheduler");

        // Fresh token so the scheduler can restart after stop
        self.cancellation_token = CancellationToken::new();

        let service = Arc::clone(&self.service);
        let trigger = Arc::clone(&self.trigger);
        let last_report = Arc::clone(&self.last_report);
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();

        self.task_handle = Some(tokio::spawn(async move {
            Self::sync_loop(service, trigger, last_report, config, cancel).await;
        }));

        Ok(())
    }

    /// Cancel the loop and wait for it to finish.
    ///
    /// A pass in flight finishes its current store write; the pending push
    /// is abandoned and retried on the next start.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRunning`] when nothing was started,
    /// [`SchedulerError::Timeout`] when the loop does not exit within the
    /// join timeout, or [`SchedulerError::TaskPanicked`] when it panicked.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(SchedulerError::NotRunning);
        };

        info!("Stopping sync scheduler");
        self.cancellation_token.cancel();

        let join_timeout = self.config.join_timeout;
        match tokio::time::timeout(join_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "Sync scheduler task panicked");
                return Err(SchedulerError::TaskPanicked(e.to_string()));
            }
            Err(_) => {
                warn!("Sync scheduler task did not complete within timeout");
                return Err(SchedulerError::Timeout { seconds: join_timeout.as_secs() });
            }
        }

        info!("Sync scheduler stopped");
        Ok(())
    }

    /// True while the background loop is alive
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Run a pass now instead of waiting for the interval.
    ///
    /// A trigger while a pass is running starts another pass right after it.
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    /// Report of the most recent completed pass
    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.lock().await.clone()
    }

    async fn sync_loop(
        service: Arc<SyncService>,
        trigger: Arc<Notify>,
        last_report: LastReport,
        config: SyncSchedulerConfig,
        cancel: CancellationToken,
    ) {
        // A pass abandoned by an earlier stop may have left entries claimed
        Self::recover(&service).await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Sync loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(config.interval) => {}
                _ = trigger.notified() => {
                    debug!("Sync pass triggered");
                }
            }

            let started = Instant::now();
            let pass = tokio::time::timeout(config.cycle_timeout, service.run_once());

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Sync loop cancelled during a pass");
                    break;
                }
                result = pass => match result {
                    Ok(Ok(report)) => {
                        debug!(
                            elapsed_ms = started.elapsed().as_millis(),
                            pushed = report.total_pushed(),
                            "Sync pass finished"
                        );
                        *last_report.lock().await = Some(report);
                    }
                    Ok(Err(e)) => {
                        error!(error = ?e, "Sync pass failed");
                    }
                    Err(_) => {
                        warn!(
                            timeout_secs = config.cycle_timeout.as_secs(),
                            "Sync pass timed out"
                        );
                        Self::recover(&service).await;
                    }
                },
            }
        }
    }

    async fn recover(service: &SyncService) {
        match service.recover_stale().await {
            Ok(0) => {}
            Ok(recovered) => debug!(recovered, "Released audit entries left in PROCESSING"),
            Err(e) => warn!(error = ?e, "Failed to release audit entries left in PROCESSING"),
        }
    }
}

/// Ensure the loop is cancelled when the scheduler is dropped
impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("SyncScheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
