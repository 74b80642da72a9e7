use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::MySqlPool;

use crate::model::leave_request::{LeaveRequest, LeaveStatus};
use crate::store::{StoreError, StoreResult};

#[async_trait]
pub trait LeaveOracle: Send + Sync {
    /// Approved, uncancelled leave covering `date`, if any.
    async fn active_approved_leave(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<LeaveRequest>>;
}

#[derive(sqlx::FromRow)]
struct LeaveRow {
    id: u64,
    employee_id: u64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    leave_type: String,
    status: String,
}

pub struct MySqlLeaveOracle {
    pool: MySqlPool,
}

impl MySqlLeaveOracle {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaveOracle for MySqlLeaveOracle {
    async fn active_approved_leave(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<LeaveRequest>> {
        let row = sqlx::query_as::<_, LeaveRow>(
            r#"
            SELECT id, employee_id, start_date, end_date, leave_type, status
            FROM leave_requests
            WHERE employee_id = ?
            AND start_date <= ?
            AND end_date >= ?
            AND status IN (?, ?)
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(date)
        .bind(LeaveStatus::ManagerApproved.to_string())
        .bind(LeaveStatus::HrApproved.to_string())
        .fetch_optional(&self.pool)
        .await?;

        let leave = row
            .map(|row| {
                let status = row.status.parse().map_err(|_| {
                    StoreError::Corrupt(format!("unexpected leave status '{}'", row.status))
                })?;
                Ok::<_, StoreError>(LeaveRequest {
                    id: row.id,
                    employee_id: row.employee_id,
                    start_date: row.start_date,
                    end_date: row.end_date,
                    leave_type: row.leave_type,
                    status,
                })
            })
            .transpose()?;

        Ok(leave.filter(|leave| leave.is_active_on(date)))
    }
}
