use async_trait::async_trait;
use sqlx::MySqlPool;

use crate::model::employee::EmployeeShift;
use crate::store::StoreResult;

/// Employee directory as seen by attendance: who is active and on which shift.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn active_employees(&self) -> StoreResult<Vec<EmployeeShift>>;

    async fn shift_type(&self, employee_id: u64) -> StoreResult<Option<String>>;
}

pub struct MySqlEmployeeDirectory {
    pool: MySqlPool,
}

impl MySqlEmployeeDirectory {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmployeeDirectory for MySqlEmployeeDirectory {
    async fn active_employees(&self) -> StoreResult<Vec<EmployeeShift>> {
        let employees = sqlx::query_as::<_, EmployeeShift>(
            r#"
            SELECT id AS employee_id, shift_type
            FROM employees
            WHERE status = 'active'
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(employees)
    }

    async fn shift_type(&self, employee_id: u64) -> StoreResult<Option<String>> {
        let shift: Option<Option<String>> =
            sqlx::query_scalar("SELECT shift_type FROM employees WHERE id = ?")
                .bind(employee_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(shift.flatten())
    }
}
