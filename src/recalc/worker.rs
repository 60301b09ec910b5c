//! Background processing of recalculation triggers.
//!
//! Callers enqueue triggers and return immediately. A single worker task
//! applies them in arrival order, retries failures with exponential backoff,
//! and coalesces monthly rollups: touched months are collected and flushed
//! once the queue has been quiet for the debounce period, or once the oldest
//! has waited the maximum delay.
//!
//! [`run_finalize_schedule`] drives the end-of-day pass at a fixed local time.

use chrono::{Local, NaiveDateTime, NaiveTime};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::RecalcSettings;
use crate::error::{EngineError, EngineResult};

use super::service::{MonthRef, RecalcOutcome, Recalculator};
use super::trigger::RecalcTrigger;

/// A trigger with its delivery attempt count.
#[derive(Debug, Clone)]
struct RecalcJob {
    trigger: RecalcTrigger,
    attempt: u32,
}

/// Handle for enqueueing triggers.
///
/// The worker stops once every handle is dropped and the queue is drained;
/// pending rollups are flushed first.
#[derive(Debug, Clone)]
pub struct RecalcQueue {
    sender: mpsc::Sender<RecalcJob>,
}

impl RecalcQueue {
    /// Starts the worker on the current runtime.
    pub fn spawn(recalculator: Arc<Recalculator>, settings: RecalcSettings) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let worker = Worker {
            recalculator,
            retry: sender.downgrade(),
            pending: BTreeSet::new(),
            pending_since: None,
            settings,
        };
        let handle = tokio::spawn(worker.run(receiver));
        (Self { sender }, handle)
    }

    /// Enqueues a trigger, waiting for queue capacity.
    pub async fn enqueue(&self, trigger: RecalcTrigger) -> EngineResult<()> {
        debug!(trigger = trigger.kind(), "Trigger enqueued");
        self.sender
            .send(RecalcJob {
                trigger,
                attempt: 1,
            })
            .await
            .map_err(|_| EngineError::QueueClosed)
    }
}

/// Delay before retry number `attempt` (the first retry is attempt 2).
pub fn backoff_delay(settings: &RecalcSettings, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(2).min(16);
    let delay = settings
        .initial_backoff_ms
        .saturating_mul(1u64 << exponent)
        .min(settings.max_backoff_ms);
    Duration::from_millis(delay)
}

/// The first moment strictly after `now` at which the daily pass runs.
pub fn next_finalize_run(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        return today;
    }
    match now.date().succ_opt() {
        Some(tomorrow) => tomorrow.and_time(at),
        None => today,
    }
}

/// Runs `finalize_day` for the previous date every day at `at` local time.
///
/// Never returns; abort the task to stop it.
pub async fn run_finalize_schedule(recalculator: Arc<Recalculator>, at: NaiveTime) {
    loop {
        let now = Local::now().naive_local();
        let next = next_finalize_run(now, at);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        info!(next_run = %next, "Finalize pass scheduled");
        tokio::time::sleep(wait).await;

        let Some(date) = next.date().pred_opt() else {
            continue;
        };
        match recalculator.finalize_day(date).await {
            Ok(report) => info!(
                date = %report.date,
                finalized = report.finalized,
                failed = report.failed.len(),
                "Scheduled finalize completed"
            ),
            Err(err) => error!(date = %date, error = %err, "Scheduled finalize failed"),
        }
    }
}

struct Worker {
    recalculator: Arc<Recalculator>,
    retry: mpsc::WeakSender<RecalcJob>,
    pending: BTreeSet<MonthRef>,
    /// When the oldest pending rollup was queued.
    pending_since: Option<Instant>,
    settings: RecalcSettings,
}

impl Worker {
    async fn run(mut self, mut receiver: mpsc::Receiver<RecalcJob>) {
        let debounce = Duration::from_millis(self.settings.rollup_debounce_ms);
        let max_delay = Duration::from_millis(self.settings.rollup_max_delay_ms);
        info!("Recalculation worker started");

        loop {
            let next = if self.pending.is_empty() {
                receiver.recv().await
            } else {
                let waited = self.pending_since.map(|since| since.elapsed()).unwrap_or_default();
                let remaining = max_delay.saturating_sub(waited);
                if remaining.is_zero() {
                    self.flush_rollups().await;
                    continue;
                }
                match tokio::time::timeout(debounce.min(remaining), receiver.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        self.flush_rollups().await;
                        continue;
                    }
                }
            };

            match next {
                Some(job) => self.process(job).await,
                None => break,
            }
        }

        self.flush_rollups().await;
        info!("Recalculation worker stopped");
    }

    fn queue_rollups(&mut self, months: impl IntoIterator<Item = MonthRef>) {
        self.pending.extend(months);
        if !self.pending.is_empty() && self.pending_since.is_none() {
            self.pending_since = Some(Instant::now());
        }
    }

    async fn process(&mut self, job: RecalcJob) {
        let recalculator = Arc::clone(&self.recalculator);
        let trigger = job.trigger.clone();
        let (outcome, result) = tokio::task::spawn_blocking(move || {
            let mut outcome = RecalcOutcome::default();
            let result = recalculator.apply_trigger_into(&trigger, &mut outcome);
            (outcome, result)
        })
        .await
        .unwrap_or_else(|e| {
            (
                RecalcOutcome::default(),
                Err(EngineError::CalculationError {
                    message: format!("recalculation task failed: {}", e),
                }),
            )
        });

        // Entries rewritten before a failure still need their months rolled up.
        self.queue_rollups(outcome.touched_months);

        match result {
            Ok(()) => {}
            Err(err) if job.attempt < self.settings.max_attempts => {
                let attempt = job.attempt + 1;
                let delay = backoff_delay(&self.settings, attempt);
                warn!(
                    trigger = job.trigger.kind(),
                    attempt = job.attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %err,
                    "Recalculation failed, retrying"
                );
                self.schedule_retry(
                    RecalcJob {
                        trigger: job.trigger,
                        attempt,
                    },
                    delay,
                );
            }
            Err(err) => {
                error!(
                    trigger = job.trigger.kind(),
                    attempts = job.attempt,
                    error = %err,
                    "Recalculation dropped after final attempt"
                );
            }
        }
    }

    fn schedule_retry(&self, job: RecalcJob, delay: Duration) {
        let retry = self.retry.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Once every handle is gone the worker is shutting down.
            match retry.upgrade() {
                Some(sender) => {
                    if sender.send(job).await.is_err() {
                        warn!("Retry dropped: queue closed");
                    }
                }
                None => warn!(trigger = job.trigger.kind(), "Retry dropped: queue closed"),
            }
        });
    }

    async fn flush_rollups(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let months: Vec<MonthRef> = std::mem::take(&mut self.pending).into_iter().collect();
        self.pending_since = None;
        let count = months.len();
        let recalculator = Arc::clone(&self.recalculator);

        let failed = tokio::task::spawn_blocking(move || {
            let mut failed = Vec::new();
            for (employee_id, month) in months {
                if let Err(err) = recalculator.rollup_month(&employee_id, month) {
                    warn!(employee_id = %employee_id, month = %month, error = %err, "Rollup failed");
                    failed.push((employee_id, month));
                }
            }
            failed
        })
        .await
        .unwrap_or_default();

        debug!(months = count, failed = failed.len(), "Rollups flushed");
        // Failed rollups are retried on the next flush.
        self.queue_rollups(failed);
    }
}
