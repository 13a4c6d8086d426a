use async_trait::async_trait;
use kinora_core::models::{CleanupReport, CleanupTaskType};
use kinora_core::AppError;

/// A named maintenance job the scheduler can run on a cadence or on demand.
///
/// `run` returns an error only when the detect phase fails; per-item cleanup
/// failures are counted in the report.
#[async_trait]
pub trait CleanupTask: Send + Sync {
    fn task_type(&self) -> CleanupTaskType;

    async fn run(&self) -> Result<CleanupReport, AppError>;
}
