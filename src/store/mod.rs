pub mod directory;
#[cfg(test)]
pub mod memory;
pub mod mysql;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::error::AttendanceError;
use crate::model::attendance::AttendanceRecord;
use crate::model::finalizer_run::{FinalizerRun, FinalizerScope};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("attendance record already exists: employee_id={employee_id}, date={date}")]
    Duplicate { employee_id: u64, date: NaiveDate },

    #[error("version conflict on attendance record {record_id}: expected version {expected}")]
    VersionConflict { record_id: u64, expected: u32 },

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt attendance data: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Database(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AttendanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { .. } => AttendanceError::Conflict(
                "Attendance already opened for today, retry the punch".to_string(),
            ),
            StoreError::VersionConflict { .. } => AttendanceError::Conflict(
                "Attendance record changed concurrently, retry the punch".to_string(),
            ),
            other => AttendanceError::System(other.to_string()),
        }
    }
}

/// Durable home of attendance records, keyed by (employee_id, date).
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find(&self, employee_id: u64, date: NaiveDate) -> StoreResult<Option<AttendanceRecord>>;

    /// Create-if-absent. A second record for the same day fails with `Duplicate`.
    async fn insert(&self, record: &AttendanceRecord) -> StoreResult<AttendanceRecord>;

    /// Persists mutations, guarded by `record.version`. New timeline entries are
    /// appended; stored ones are never rewritten.
    async fn update(&self, record: &AttendanceRecord) -> StoreResult<AttendanceRecord>;

    /// Late-flagged days in `[from, before)`.
    async fn count_late_entries(
        &self,
        employee_id: u64,
        from: NaiveDate,
        before: NaiveDate,
    ) -> StoreResult<u32>;

    async fn start_finalizer_run(&self, run: &FinalizerRun) -> StoreResult<()>;

    async fn complete_finalizer_run(&self, run: &FinalizerRun) -> StoreResult<()>;

    async fn finalizer_run_completed(
        &self,
        date: NaiveDate,
        scope: FinalizerScope,
    ) -> StoreResult<bool>;
}
