use chrono::{NaiveDate, NaiveDateTime};
use derive_more::Display as DisplayMore;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::model::shift::ShiftProfile;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum PunchType {
    In,
    Out,
    BreakStart,
    BreakEnd,
    LunchStart,
    LunchEnd,
}

impl PunchType {
    /// In, BreakEnd and LunchEnd put the employee (back) to work.
    pub fn resumes_work(self) -> bool {
        matches!(self, PunchType::In | PunchType::BreakEnd | PunchType::LunchEnd)
    }

    pub fn pauses_work(self) -> bool {
        !self.resumes_work()
    }

    /// Session opened once this punch is applied.
    pub fn opens(self) -> Option<SessionType> {
        match self {
            PunchType::In | PunchType::BreakEnd | PunchType::LunchEnd => Some(SessionType::Work),
            PunchType::BreakStart => Some(SessionType::Break),
            PunchType::LunchStart => Some(SessionType::Lunch),
            PunchType::Out => None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum AttendanceStatus {
    Present,
    Absent,
    #[strum(serialize = "Half-Day")]
    #[serde(rename = "Half-Day")]
    HalfDay,
    #[strum(serialize = "On Leave")]
    #[serde(rename = "On Leave")]
    OnLeave,
    Holiday,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum AttendanceType {
    Office,
    Site,
    Remote,
}

impl AttendanceType {
    pub fn is_geofenced(self) -> bool {
        matches!(self, AttendanceType::Office | AttendanceType::Site)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum WorkType {
    Regular,
    #[strum(serialize = "Holiday Work")]
    #[serde(rename = "Holiday Work")]
    HolidayWork,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum VerificationMethod {
    Geofence,
    Manual,
    System,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum SessionType {
    Work,
    Break,
    Lunch,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum PenaltyType {
    #[strum(serialize = "Late Deduction")]
    #[serde(rename = "Late Deduction")]
    LateDeduction,
    #[strum(serialize = "No Pay")]
    #[serde(rename = "No Pay")]
    NoPay,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum CompOffApproval {
    #[strum(serialize = "Auto-Approved")]
    #[serde(rename = "Auto-Approved")]
    AutoApproved,
    Rejected,
}

/// Reason codes the engine writes. Operator text never goes here; it stays on
/// the timeline entry that carried it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, DisplayMore)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum SystemRemark {
    #[display(fmt = "Work on Approved Leave ({})", leave_type)]
    WorkOnApprovedLeave { leave_type: String },
    #[display(fmt = "Work on Approved Leave ({}) | Regularization Required", leave_type)]
    LeaveRegularizationRequired { leave_type: String },
    #[display(fmt = "Holiday Work ({})", reason)]
    HolidayWork { reason: String },
    #[display(fmt = "Late Entry #{}", occurrence)]
    LateEntry { occurrence: u32 },
    #[display(fmt = "Late Entry #{} | HR Regularization Required", occurrence)]
    LateRegularizationRequired { occurrence: u32 },
    #[display(fmt = "Late Penalty (#{})", occurrence)]
    LatePenalty { occurrence: u32 },
    #[display(fmt = "Insufficient Hours (< {} hrs)", min_hours)]
    InsufficientHours { min_hours: f64 },
    #[display(fmt = "Comp-Off Earned ({} day)", credit)]
    CompOffEarned { credit: f64 },
    #[display(fmt = "Comp-Off Not Eligible (< {} hrs)", min_hours)]
    CompOffNotEligible { min_hours: f64 },
    #[display(fmt = "On Leave ({})", leave_type)]
    OnLeave { leave_type: String },
    #[display(fmt = "{}", reason)]
    NonWorkingDay { reason: String },
    #[display(fmt = "No Punch Recorded")]
    NoPunchRecorded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeviceInfo {
    pub device_id: Option<String>,
    pub platform: Option<String>,
    pub app_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TimelineEntry {
    pub punch_type: PunchType,
    pub at: NaiveDateTime,
    pub location: Option<GeoPoint>,
    /// Distance from the site, present when the geofence was checked.
    pub distance_meters: Option<f64>,
    pub verification: VerificationMethod,
    pub device: Option<DeviceInfo>,
    pub user_remark: Option<String>,
    pub system_generated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Session {
    pub session_type: SessionType,
    pub start: NaiveDateTime,
    pub end: Option<NaiveDateTime>,
    pub duration_minutes: Option<i64>,
}

impl Session {
    pub fn open(session_type: SessionType, start: NaiveDateTime) -> Self {
        Self {
            session_type,
            start,
            end: None,
            duration_minutes: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceSummary {
    pub net_work_hours: f64,
    pub total_break_minutes: i64,
    pub overtime_hours: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct AttendanceFlags {
    pub is_late_entry: bool,
    pub is_early_exit: bool,
    pub is_auto_checkout: bool,
    pub has_dispute: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct Penalty {
    pub is_applied: bool,
    pub penalty_type: Option<PenaltyType>,
    pub deduction_amount: f64,
}

impl Penalty {
    pub fn applied(penalty_type: PenaltyType, deduction_amount: f64) -> Self {
        Self {
            is_applied: true,
            penalty_type: Some(penalty_type),
            deduction_amount,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct CompOffReward {
    pub is_eligible: bool,
    pub comp_off_credit: f64,
    pub approval_status: Option<CompOffApproval>,
}

/// One employee's attendance for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    /// Assigned by the store on insert.
    pub id: Option<u64>,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub shift: ShiftProfile,
    /// Taken from the first punch; absent on days opened by the finalizer.
    pub attendance_type: Option<AttendanceType>,
    pub work_type: WorkType,
    /// Leave that was approved for this day when the record was opened.
    pub leave_type: Option<String>,
    pub timeline: Vec<TimelineEntry>,
    pub sessions: Vec<Session>,
    pub summary: AttendanceSummary,
    pub status: AttendanceStatus,
    pub system_remark: Option<SystemRemark>,
    pub flags: AttendanceFlags,
    pub penalty: Penalty,
    pub rewards: CompOffReward,
    pub finalized_at: Option<NaiveDateTime>,
    pub version: u32,
}

impl AttendanceRecord {
    pub fn new(
        employee_id: u64,
        date: NaiveDate,
        shift: ShiftProfile,
        attendance_type: Option<AttendanceType>,
        status: AttendanceStatus,
    ) -> Self {
        Self {
            id: None,
            employee_id,
            date,
            shift,
            attendance_type,
            work_type: WorkType::Regular,
            leave_type: None,
            timeline: Vec::new(),
            sessions: Vec::new(),
            summary: AttendanceSummary::default(),
            status,
            system_remark: None,
            flags: AttendanceFlags::default(),
            penalty: Penalty::default(),
            rewards: CompOffReward::default(),
            finalized_at: None,
            version: 0,
        }
    }

    pub fn last_punch(&self) -> Option<&TimelineEntry> {
        self.timeline.last()
    }

    pub fn punch_count(&self, punch_type: PunchType) -> usize {
        self.timeline
            .iter()
            .filter(|entry| entry.punch_type == punch_type)
            .count()
    }

    pub fn is_checked_out(&self) -> bool {
        self.last_punch()
            .is_some_and(|entry| entry.punch_type == PunchType::Out)
    }

    pub fn is_holiday_work(&self) -> bool {
        self.work_type == WorkType::HolidayWork
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized_at.is_some()
    }
}
