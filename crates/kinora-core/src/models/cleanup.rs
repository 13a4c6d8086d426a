//! Cleanup scheduler models: task types, run reports, statistics and events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::AppError;

/// Independently schedulable maintenance jobs.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CleanupTaskType {
    OrphanFiles,
    ExpiredTransactions,
    IncompleteUploads,
    TempFiles,
}

impl CleanupTaskType {
    pub const ALL: [CleanupTaskType; 4] = [
        CleanupTaskType::OrphanFiles,
        CleanupTaskType::ExpiredTransactions,
        CleanupTaskType::IncompleteUploads,
        CleanupTaskType::TempFiles,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupTaskType::OrphanFiles => "orphan_files",
            CleanupTaskType::ExpiredTransactions => "expired_transactions",
            CleanupTaskType::IncompleteUploads => "incomplete_uploads",
            CleanupTaskType::TempFiles => "temp_files",
        }
    }
}

impl fmt::Display for CleanupTaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleanupTaskType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "orphan_files" => Ok(CleanupTaskType::OrphanFiles),
            "expired_transactions" => Ok(CleanupTaskType::ExpiredTransactions),
            "incomplete_uploads" => Ok(CleanupTaskType::IncompleteUploads),
            "temp_files" => Ok(CleanupTaskType::TempFiles),
            other => Err(AppError::InvalidInput(format!(
                "Invalid task type: {}. Must be one of: orphan_files, expired_transactions, incomplete_uploads, temp_files",
                other
            ))),
        }
    }
}

/// Outcome of a single task run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct CleanupReport {
    pub task_type: CleanupTaskType,
    /// Items found by the detect phase
    pub detected: u64,
    /// Items removed (or marked) by the cleanup phase
    pub cleaned: u64,
    /// Items whose cleanup failed; recorded, not fatal
    pub failed: u64,
    /// Detected items deliberately left alone this run
    pub skipped: u64,
    pub duration_ms: u64,
}

impl CleanupReport {
    pub fn empty(task_type: CleanupTaskType) -> Self {
        Self {
            task_type,
            detected: 0,
            cleaned: 0,
            failed: 0,
            skipped: 0,
            duration_ms: 0,
        }
    }
}

/// Per-task run counters kept by the scheduler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskRunStats {
    pub last_run_time: Option<DateTime<Utc>>,
    pub total_runs: u64,
    pub success_count: u64,
}

impl TaskRunStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_runs as f64
        }
    }
}

/// Read-only view returned by `CleanupScheduler::get_status`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SchedulerStatus {
    pub is_running: bool,
    #[schema(value_type = Object)]
    pub last_run_times: BTreeMap<CleanupTaskType, Option<DateTime<Utc>>>,
    #[schema(value_type = Object)]
    pub next_run_times: BTreeMap<CleanupTaskType, Option<DateTime<Utc>>>,
    #[schema(value_type = Object)]
    pub total_runs: BTreeMap<CleanupTaskType, u64>,
    /// Fraction of successful runs (0.0-1.0); 0.0 before the first run
    #[schema(value_type = Object)]
    pub success_rates: BTreeMap<CleanupTaskType, f64>,
}

/// Lifecycle events broadcast by the scheduler.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CleanupEvent {
    TaskStarted {
        task_type: CleanupTaskType,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_type: CleanupTaskType,
        report: CleanupReport,
    },
    TaskFailed {
        task_type: CleanupTaskType,
        error: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_parse_and_display() {
        for task in CleanupTaskType::ALL {
            let parsed: CleanupTaskType = task.as_str().parse().unwrap();
            assert_eq!(parsed, task);
        }
        assert!(matches!(
            "vacuum".parse::<CleanupTaskType>(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_task_type_serializes_snake_case() {
        let json = serde_json::to_string(&CleanupTaskType::ExpiredTransactions).unwrap();
        assert_eq!(json, "\"expired_transactions\"");
    }

    #[test]
    fn test_success_rate() {
        let stats = TaskRunStats {
            total_runs: 4,
            success_count: 3,
            ..Default::default()
        };
        assert!((stats.success_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(TaskRunStats::default().success_rate(), 0.0);
    }
}
