//! One sync pass over the local store.
//!
//! Record families are drained in a fixed order: timers, intervals,
//! keyboard/mouse activity, screenshots, then the audit queue. Within a
//! family rows go out in ascending id order; the first failed push leaves
//! that row retryable and defers the rest of the family to the next pass.
//!
//! Push failures never escape a pass. Local store failures abort it: every
//! write is its own transaction, so the next pass starts from a consistent
//! state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use timekeep_core::{
    AuditQueueService, IntervalDao, KbMouseActivityDao, RecordDao, ScreenshotDao, TimerDao,
};
use timekeep_domain::{
    EntityKind, IntervalRecord, KbMouseActivityPatch, RecordFilter, RemoteAck, ScreenshotPatch,
    SyncConfig, SyncReport, TimerPatch, TypeReport,
};
use tracing::{debug, info, instrument, warn};

use super::errors::SyncError;
use super::pusher::RemotePusher;

/// Stores a sync pass reads from and writes back to.
#[derive(Clone)]
pub struct SyncSources {
    pub timers: Arc<dyn TimerDao>,
    pub intervals: Arc<dyn IntervalDao>,
    pub activities: Arc<dyn KbMouseActivityDao>,
    pub screenshots: Arc<dyn ScreenshotDao>,
    pub audit_queue: Arc<AuditQueueService>,
}

/// Pushes unsynced local rows to the remote and records the outcome.
pub struct SyncService {
    sources: SyncSources,
    pusher: Arc<dyn RemotePusher>,
    config: SyncConfig,
    network_available: AtomicBool,
    recovered: AtomicBool,
}

impl SyncService {
    pub fn new(sources: SyncSources, pusher: Arc<dyn RemotePusher>, config: SyncConfig) -> Self {
        Self {
            sources,
            pusher,
            config,
            network_available: AtomicBool::new(true),
            recovered: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Whether the last push reached the remote
    pub fn network_available(&self) -> bool {
        self.network_available.load(Ordering::SeqCst)
    }

    /// Run one pass over every record family.
    ///
    /// The first pass also returns audit queue entries stranded in
    /// PROCESSING to the retry pool.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Database`] when the local store fails. Push
    /// failures are reported in the [`SyncReport`] instead.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<SyncReport, SyncError> {
        self.recover_once().await?;

        let mut report = SyncReport::default();

        match self.config.employee_id.as_deref() {
            Some(employee_id) => {
                self.sync_timers(employee_id, &mut report.timers).await?;
                self.sync_intervals(employee_id, &mut report.intervals).await?;
                self.sync_activities(employee_id, &mut report.activities).await?;
                self.sync_screenshots(employee_id, &mut report.screenshots).await?;
            }
            None => debug!("No employee scope configured; skipping record tables"),
        }

        self.sync_audit_queue(&mut report.audit_queue).await?;

        let dead_letters = self.sources.audit_queue.dead_letters().await?;
        if !dead_letters.is_empty() {
            warn!(
                count = dead_letters.len(),
                max_attempts = self.sources.audit_queue.max_attempts(),
                "Audit queue holds entries that will not be retried"
            );
        }
        report.dead_letters = dead_letters.len();
        report.network_available = self.network_available();

        info!(
            pushed = report.total_pushed(),
            failed = report.total_failed(),
            dead_letters = report.dead_letters,
            "Sync pass completed"
        );

        Ok(report)
    }

    /// Return audit entries stranded in PROCESSING to the retry pool.
    ///
    /// Must not run while a pass of this service is in flight.
    pub async fn recover_stale(&self) -> Result<usize, SyncError> {
        let recovered = self.sources.audit_queue.recover_stale().await?;
        self.recovered.store(true, Ordering::SeqCst);
        Ok(recovered)
    }

    async fn recover_once(&self) -> Result<(), SyncError> {
        if self.recovered.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.recover_stale().await.map(|_| ())
    }

    async fn sync_timers(&self, employee_id: &str, stats: &mut TypeReport) -> Result<(), SyncError> {
        let timers = self.take_batch(self.sources.timers.find_all_no_synced(employee_id).await?);

        for (index, timer) in timers.iter().enumerate() {
            let Some(id) = timer.id else { continue };
            let key = idempotency_key(EntityKind::Timer, id);

            match self.push(EntityKind::Timer, &encode(EntityKind::Timer, timer)?, &key).await {
                Ok(ack) => {
                    let patch = TimerPatch { timelog_id: ack.remote_id, ..TimerPatch::synced() };
                    self.sources.timers.update(id, &patch).await?;
                    stats.pushed += 1;
                }
                Err(err) => {
                    defer_rest(EntityKind::Timer, id, &err, stats, timers.len() - index - 1);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Intervals go out as one batch and are marked by their start window.
    async fn sync_intervals(
        &self,
        employee_id: &str,
        stats: &mut TypeReport,
    ) -> Result<(), SyncError> {
        let mut pending = self.sources.intervals.find_all_no_synced(employee_id).await?;
        pending.retain(|interval| interval.id.is_some());
        let head = &pending[..pending.len().min(self.config.batch_size)];

        let (Some(start), Some(end)) = (
            head.iter().map(|interval| interval.start_at).min(),
            head.iter().map(|interval| interval.start_at).max(),
        ) else {
            return Ok(());
        };

        // Everything inside the window is marked, so everything inside it is pushed.
        pending.retain(|interval| interval.start_at >= start && interval.start_at <= end);

        let Some(key) = interval_batch_key(&pending) else {
            return Ok(());
        };

        match self.push(EntityKind::Interval, &encode(EntityKind::Interval, &pending)?, &key).await {
            Ok(_) => {
                let marked =
                    self.sources.intervals.synced_for_employee(employee_id, start, end).await?;
                if marked != pending.len() {
                    warn!(
                        pushed = pending.len(),
                        marked,
                        "Interval window changed between read and mark"
                    );
                }
                stats.pushed += pending.len();
            }
            Err(err) => {
                warn!(
                    key = %key,
                    count = pending.len(),
                    error = ?err,
                    "Interval batch push failed"
                );
                stats.failed += pending.len();
            }
        }

        Ok(())
    }

    async fn sync_activities(
        &self,
        employee_id: &str,
        stats: &mut TypeReport,
    ) -> Result<(), SyncError> {
        let kind = EntityKind::KbMouseActivity;
        let activities =
            self.take_batch(self.sources.activities.find_all_no_synced(employee_id).await?);

        for (index, activity) in activities.iter().enumerate() {
            let Some(id) = activity.id else { continue };
            let key = idempotency_key(kind, id);

            match self.push(kind, &encode(kind, activity)?, &key).await {
                Ok(ack) => {
                    let remote_id = ack.remote_id.unwrap_or_else(|| key.clone());
                    self.sources
                        .activities
                        .update(id, &KbMouseActivityPatch::acknowledged(remote_id))
                        .await?;
                    stats.pushed += 1;

                    if self.config.prune_synced_activities {
                        self.prune_activity(id).await?;
                    }
                }
                Err(err) => {
                    defer_rest(kind, id, &err, stats, activities.len() - index - 1);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Screenshots wait for their activity to carry a remote id.
    async fn sync_screenshots(
        &self,
        employee_id: &str,
        stats: &mut TypeReport,
    ) -> Result<(), SyncError> {
        let kind = EntityKind::Screenshot;
        let screenshots =
            self.take_batch(self.sources.screenshots.find_all_no_synced(employee_id).await?);

        for (index, screenshot) in screenshots.iter().enumerate() {
            let Some(id) = screenshot.id else { continue };

            let parent = match self.sources.activities.find_one_by_id(screenshot.activity_id).await
            {
                Ok(parent) => parent,
                Err(err) => {
                    warn!(
                        entry_id = id,
                        activity_id = screenshot.activity_id,
                        error = ?err,
                        "Could not read parent activity; skipping screenshot this pass"
                    );
                    stats.deferred += 1;
                    continue;
                }
            };

            let Some(activity_remote_id) = parent.and_then(|activity| activity.remote_id) else {
                debug!(
                    entry_id = id,
                    activity_id = screenshot.activity_id,
                    "Parent activity not synced yet; deferring screenshots"
                );
                stats.deferred += screenshots.len() - index;
                break;
            };

            let mut payload = encode(kind, screenshot)?;
            if let Value::Object(fields) = &mut payload {
                fields.insert("activityRemoteId".to_string(), Value::String(activity_remote_id));
            }

            match self.push(kind, &payload, &idempotency_key(kind, id)).await {
                Ok(_) => {
                    self.sources.screenshots.update(id, &ScreenshotPatch::synced()).await?;
                    stats.pushed += 1;

                    if self.config.prune_synced_activities {
                        self.prune_activity(screenshot.activity_id).await?;
                    }
                }
                Err(err) => {
                    defer_rest(kind, id, &err, stats, screenshots.len() - index - 1);
                    break;
                }
            }
        }

        Ok(())
    }

    async fn sync_audit_queue(&self, stats: &mut TypeReport) -> Result<(), SyncError> {
        let audit_queue = &self.sources.audit_queue;
        let due = audit_queue.due(self.config.batch_size).await?;

        for (index, entry) in due.iter().enumerate() {
            let claim = audit_queue.claim(entry).await?;

            match self.push(EntityKind::AuditQueue, claim.payload(), claim.queue_id()).await {
                Ok(_) => {
                    audit_queue.complete(claim).await?;
                    stats.pushed += 1;
                }
                Err(err) => {
                    warn!(
                        queue_id = %claim.queue_id(),
                        attempts = claim.entry().attempts,
                        error = ?err,
                        "Audit queue push failed; deferring the rest of the queue"
                    );
                    audit_queue.fail(claim, &truncate_reason(&err.to_string())).await?;
                    stats.failed += 1;
                    stats.deferred += due.len() - index - 1;
                    break;
                }
            }
        }

        Ok(())
    }

    /// Delete an acknowledged activity once none of its screenshots are
    /// waiting to be pushed.
    async fn prune_activity(&self, activity_id: i64) -> Result<(), SyncError> {
        let screenshots = self.sources.screenshots.find_by_activity(activity_id).await?;
        if screenshots.iter().any(|screenshot| !screenshot.synced) {
            return Ok(());
        }

        self.sources.activities.delete(&RecordFilter::by_id(activity_id)).await?;
        debug!(activity_id, "Pruned synced activity");
        Ok(())
    }

    async fn push(
        &self,
        kind: EntityKind,
        payload: &Value,
        idempotency_key: &str,
    ) -> Result<RemoteAck, SyncError> {
        let timeout = Duration::from_secs(self.config.push_timeout_seconds);
        let result = tokio::time::timeout(timeout, self.pusher.push(kind, payload, idempotency_key))
            .await
            .unwrap_or_else(|_| Err(SyncError::Timeout(timeout)));

        match &result {
            Ok(_) => self.set_network_available(true),
            Err(err) if err.is_connectivity() => self.set_network_available(false),
            Err(_) => {}
        }

        result
    }

    fn set_network_available(&self, available: bool) {
        let previous = self.network_available.swap(available, Ordering::SeqCst);
        if previous == available {
            return;
        }

        if available {
            info!("Remote reachable again");
        } else {
            warn!("Remote unreachable; local rows stay queued");
        }
    }

    fn take_batch<T>(&self, mut rows: Vec<T>) -> Vec<T> {
        rows.truncate(self.config.batch_size);
        rows
    }
}

fn idempotency_key(kind: EntityKind, id: i64) -> String {
    format!("{kind}-{id}")
}

/// `interval-{first_id}-{last_id}`, or nothing when an end of the batch has no id.
fn interval_batch_key(batch: &[IntervalRecord]) -> Option<String> {
    let first_id = batch.first()?.id?;
    let last_id = batch.last()?.id?;
    Some(format!("{}-{first_id}-{last_id}", EntityKind::Interval))
}

fn encode<T: Serialize + ?Sized>(kind: EntityKind, value: &T) -> Result<Value, SyncError> {
    serde_json::to_value(value)
        .map_err(|e| SyncError::Client(format!("Failed to encode {kind} payload: {e}")))
}

fn defer_rest(kind: EntityKind, id: i64, err: &SyncError, stats: &mut TypeReport, rest: usize) {
    warn!(
        kind = %kind,
        entry_id = id,
        deferred = rest,
        retryable = err.should_retry(),
        error = ?err,
        "Push failed; deferring the rest of this record type"
    );
    stats.failed += 1;
    stats.deferred += rest;
}

fn truncate_reason(reason: &str) -> String {
    const MAX_LEN: usize = 256;
    if reason.len() <= MAX_LEN {
        return reason.to_string();
    }

    let mut truncated = reason.chars().take(MAX_LEN.saturating_sub(3)).collect::<String>();
    truncated.push_str("...");
    truncated
}
