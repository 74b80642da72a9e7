use serde::{Deserialize, Serialize};

/// Row of the employee directory the attendance engine consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EmployeeShift {
    pub employee_id: u64,
    pub shift_type: Option<String>,
}
