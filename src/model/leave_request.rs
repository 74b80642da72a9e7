use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
pub enum LeaveStatus {
    Pending,
    #[strum(serialize = "Manager Approved")]
    #[serde(rename = "Manager Approved")]
    ManagerApproved,
    #[strum(serialize = "HR Approved")]
    #[serde(rename = "HR Approved")]
    HrApproved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn is_approved(self) -> bool {
        matches!(self, LeaveStatus::ManagerApproved | LeaveStatus::HrApproved)
    }
}

/// Leave application as owned by the leave module; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRequest {
    pub id: u64,
    pub employee_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub leave_type: String,
    pub status: LeaveStatus,
}

impl LeaveRequest {
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.status.is_approved() && self.start_date <= date && date <= self.end_date
    }
}
