//! Cron-driven cleanup scheduler.
//!
//! One tokio loop per cadence sleeps until the cadence's next cron occurrence
//! and then runs its tasks in order. Every run, scheduled or manual, goes
//! through [`CleanupScheduler::run_task`], which serializes runs, keeps the
//! per-task counters and broadcasts lifecycle events.

use chrono::{DateTime, Utc};
use croner::Cron;
use kinora_core::models::{
    CleanupEvent, CleanupReport, CleanupTaskType, SchedulerStatus, TaskRunStats,
};
use kinora_core::{AppError, Clock, CronCadenceConfig};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::task::CleanupTask;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A parsed cron expression and the tasks it triggers.
struct Cadence {
    name: String,
    expression: String,
    cron: Cron,
    tasks: Vec<CleanupTaskType>,
}

#[derive(Default)]
struct SchedulerState {
    /// Present while running; cancelling it stops every cadence loop
    shutdown: Option<CancellationToken>,
    stats: BTreeMap<CleanupTaskType, TaskRunStats>,
    /// Next fire time per cadence index
    next_fire: HashMap<usize, DateTime<Utc>>,
}

pub struct CleanupScheduler {
    tasks: HashMap<CleanupTaskType, Arc<dyn CleanupTask>>,
    cadences: Vec<Cadence>,
    clock: Arc<dyn Clock>,
    state: Mutex<SchedulerState>,
    run_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<CleanupEvent>,
}

impl CleanupScheduler {
    /// Build a stopped scheduler. Fails if a cron expression does not parse.
    pub fn new(
        tasks: Vec<Arc<dyn CleanupTask>>,
        cadences: &[CronCadenceConfig],
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let tasks: HashMap<CleanupTaskType, Arc<dyn CleanupTask>> = tasks
            .into_iter()
            .map(|task| (task.task_type(), task))
            .collect();

        let cadences = cadences
            .iter()
            .map(|config| {
                let cron = config.expression.parse::<Cron>().map_err(|e| {
                    AppError::InvalidInput(format!(
                        "Invalid cron expression '{}' for {} cadence: {}",
                        config.expression, config.name, e
                    ))
                })?;
                Ok(Cadence {
                    name: config.name.clone(),
                    expression: config.expression.clone(),
                    cron,
                    tasks: config.tasks.clone(),
                })
            })
            .collect::<Result<Vec<_>, AppError>>()?;

        let stats = tasks
            .keys()
            .map(|task_type| (*task_type, TaskRunStats::default()))
            .collect();

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            tasks,
            cadences,
            clock,
            state: Mutex::new(SchedulerState {
                stats,
                ..Default::default()
            }),
            run_lock: tokio::sync::Mutex::new(()),
            events,
        })
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_running(&self) -> bool {
        self.state().shutdown.is_some()
    }

    /// Spawn one loop per cadence. Calling it while running only logs.
    pub fn start(self: &Arc<Self>) {
        let token = {
            let mut state = self.state();
            if state.shutdown.is_some() {
                tracing::warn!("Cleanup scheduler already running");
                return;
            }
            let token = CancellationToken::new();
            state.shutdown = Some(token.clone());
            token
        };

        for index in 0..self.cadences.len() {
            let scheduler = Arc::clone(self);
            let token = token.clone();
            tokio::spawn(async move {
                scheduler.run_cadence(index, token).await;
            });
        }

        tracing::info!(
            cadences = self.cadences.len(),
            tasks = self.tasks.len(),
            "Cleanup scheduler started"
        );
    }

    /// Cancel every cadence loop. A run already in progress finishes.
    pub fn stop(&self) {
        let mut state = self.state();
        match state.shutdown.take() {
            Some(token) => {
                token.cancel();
                state.next_fire.clear();
                tracing::info!("Cleanup scheduler stopped");
            }
            None => tracing::warn!("Cleanup scheduler is not running"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CleanupEvent> {
        self.events.subscribe()
    }

    /// Run one task now, outside its cadence.
    #[tracing::instrument(skip(self))]
    pub async fn execute_task_manually(
        &self,
        task_type: CleanupTaskType,
    ) -> Result<CleanupReport, AppError> {
        if !self.is_running() {
            return Err(AppError::Conflict(
                "Cleanup scheduler is not running".to_string(),
            ));
        }
        self.run_task(task_type).await
    }

    pub fn get_status(&self) -> SchedulerStatus {
        let state = self.state();
        let mut status = SchedulerStatus {
            is_running: state.shutdown.is_some(),
            last_run_times: BTreeMap::new(),
            next_run_times: BTreeMap::new(),
            total_runs: BTreeMap::new(),
            success_rates: BTreeMap::new(),
        };

        for (task_type, stats) in &state.stats {
            status.last_run_times.insert(*task_type, stats.last_run_time);
            status
                .next_run_times
                .insert(*task_type, Self::next_run_for(&self.cadences, &state, *task_type));
            status.total_runs.insert(*task_type, stats.total_runs);
            status.success_rates.insert(*task_type, stats.success_rate());
        }

        status
    }

    /// Earliest pending fire time across the cadences that include `task_type`.
    fn next_run_for(
        cadences: &[Cadence],
        state: &SchedulerState,
        task_type: CleanupTaskType,
    ) -> Option<DateTime<Utc>> {
        cadences
            .iter()
            .enumerate()
            .filter(|(_, cadence)| cadence.tasks.contains(&task_type))
            .filter_map(|(index, _)| state.next_fire.get(&index).copied())
            .min()
    }

    async fn run_cadence(&self, index: usize, shutdown: CancellationToken) {
        let cadence = &self.cadences[index];
        let mut last_fired: Option<DateTime<Utc>> = None;

        loop {
            let now = self.clock.now();
            // Never fire the same occurrence twice if the timer wakes early
            let from = last_fired.map_or(now, |fired| fired.max(now));
            let next = match cadence.cron.find_next_occurrence(&from, false) {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        cadence = %cadence.name,
                        expression = %cadence.expression,
                        "Failed to compute next cleanup run, cadence disabled"
                    );
                    return;
                }
            };

            {
                let mut state = self.state();
                if shutdown.is_cancelled() {
                    return;
                }
                state.next_fire.insert(index, next);
            }

            tracing::debug!(cadence = %cadence.name, next_run = %next, "Cleanup cadence scheduled");

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(wait) => {}
            }

            last_fired = Some(next);
            tracing::info!(cadence = %cadence.name, tasks = cadence.tasks.len(), "Running cleanup cadence");

            for task_type in &cadence.tasks {
                if shutdown.is_cancelled() {
                    return;
                }
                // Failures are logged and broadcast inside run_task
                let _ = self.run_task(*task_type).await;
            }
        }
    }

    /// Single path for every run: serialize, count, run, report.
    async fn run_task(&self, task_type: CleanupTaskType) -> Result<CleanupReport, AppError> {
        let task = self.tasks.get(&task_type).cloned().ok_or_else(|| {
            AppError::NotFound(format!("No cleanup task registered for {}", task_type))
        })?;

        let _guard = self.run_lock.lock().await;

        let started_at = self.clock.now();
        {
            let mut state = self.state();
            let stats = state.stats.entry(task_type).or_default();
            stats.total_runs += 1;
            stats.last_run_time = Some(started_at);
        }
        let _ = self.events.send(CleanupEvent::TaskStarted {
            task_type,
            at: started_at,
        });

        let timer = std::time::Instant::now();
        match task.run().await {
            Ok(mut report) => {
                report.duration_ms = timer.elapsed().as_millis() as u64;
                {
                    let mut state = self.state();
                    state.stats.entry(task_type).or_default().success_count += 1;
                }
                tracing::info!(
                    cleanup.task = %task_type,
                    detected = report.detected,
                    cleaned = report.cleaned,
                    failed = report.failed,
                    skipped = report.skipped,
                    duration_ms = report.duration_ms,
                    "Cleanup task completed"
                );
                let _ = self.events.send(CleanupEvent::TaskCompleted {
                    task_type,
                    report: report.clone(),
                });
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    cleanup.task = %task_type,
                    error = %e.detailed_message(),
                    "Cleanup task failed"
                );
                let _ = self.events.send(CleanupEvent::TaskFailed {
                    task_type,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

impl Drop for CleanupScheduler {
    fn drop(&mut self) {
        if let Some(token) = self.state().shutdown.take() {
            token.cancel();
        }
    }
}
