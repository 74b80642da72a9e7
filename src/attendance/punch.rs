//! Punch state machine: which punch may follow which, and how the first punch
//! of the day seeds a record.
//!
//! States are implicit in the last timeline entry:
//! `NoRecord -> Working -> (OnBreak | OnLunch) -> Working -> ... -> Closed`.

use chrono::{NaiveDate, NaiveDateTime};

use crate::attendance::calendar::WorkingDay;
use crate::attendance::session_tracker;
use crate::error::AttendanceError;
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, AttendanceType, PunchType, SystemRemark, TimelineEntry,
    WorkType,
};
use crate::model::leave_request::LeaveRequest;
use crate::model::shift::ShiftProfile;

pub const MAX_LUNCHES_PER_DAY: usize = 1;
pub const MAX_BREAKS_PER_DAY: usize = 2;

/// What the oracles said about the day when its record is opened.
#[derive(Debug, Clone)]
pub struct DayContext {
    pub leave: Option<LeaveRequest>,
    pub working_day: WorkingDay,
}

/// Sequence checks, in the order they are reported.
pub fn validate(
    existing: Option<&AttendanceRecord>,
    punch: PunchType,
    at: NaiveDateTime,
) -> Result<(), AttendanceError> {
    let Some(record) = existing else {
        if punch == PunchType::In {
            return Ok(());
        }
        return Err(AttendanceError::NotFound(
            "No attendance record for today, must check in first".to_string(),
        ));
    };

    if record.is_finalized() {
        return Err(AttendanceError::validation(
            "Attendance for this day is already finalized",
        ));
    }

    match punch {
        PunchType::LunchStart if record.punch_count(PunchType::LunchStart) >= MAX_LUNCHES_PER_DAY => {
            return Err(AttendanceError::validation(format!(
                "Lunch limit exceeded ({MAX_LUNCHES_PER_DAY} per day)"
            )));
        }
        PunchType::BreakStart if record.punch_count(PunchType::BreakStart) >= MAX_BREAKS_PER_DAY => {
            return Err(AttendanceError::validation(format!(
                "Break limit exceeded ({MAX_BREAKS_PER_DAY} per day)"
            )));
        }
        _ => {}
    }

    let Some(last) = record.last_punch() else {
        return Ok(());
    };

    if last.punch_type.resumes_work() && punch.resumes_work() {
        return Err(AttendanceError::validation(format!(
            "Already working, {punch} rejected"
        )));
    }
    if last.punch_type.pauses_work() && punch.pauses_work() {
        return Err(AttendanceError::validation(format!(
            "Not currently working, {punch} rejected"
        )));
    }

    if at < last.at {
        return Err(AttendanceError::validation(format!(
            "Punch time {at} is earlier than the last punch at {}",
            last.at
        )));
    }

    match punch {
        PunchType::BreakEnd if last.punch_type != PunchType::BreakStart => Err(
            AttendanceError::validation("BreakEnd without a preceding BreakStart"),
        ),
        PunchType::LunchEnd if last.punch_type != PunchType::LunchStart => Err(
            AttendanceError::validation("LunchEnd without a preceding LunchStart"),
        ),
        _ => Ok(()),
    }
}

/// Seeds the record for the first punch of `date`, most specific rule first.
/// Lateness is measured from the shift starting on `date`, which for a night
/// shift may be the calendar day before `at`. `prior_late_days` only matters
/// when the punch turns out late.
pub fn open_on_first_punch(
    employee_id: u64,
    date: NaiveDate,
    shift: ShiftProfile,
    attendance_type: AttendanceType,
    day: &DayContext,
    prior_late_days: u32,
    at: NaiveDateTime,
) -> AttendanceRecord {
    let late = at > shift.late_after(date);
    let mut record = AttendanceRecord::new(
        employee_id,
        date,
        shift,
        Some(attendance_type),
        AttendanceStatus::Present,
    );

    if let Some(leave) = &day.leave {
        record.status = AttendanceStatus::Absent;
        record.leave_type = Some(leave.leave_type.clone());
        record.system_remark = Some(SystemRemark::WorkOnApprovedLeave {
            leave_type: leave.leave_type.clone(),
        });
    } else if !day.working_day.is_working {
        record.status = AttendanceStatus::Holiday;
        record.work_type = WorkType::HolidayWork;
        record.system_remark = Some(SystemRemark::HolidayWork {
            reason: day.working_day.reason.clone(),
        });
    } else if late {
        record.status = AttendanceStatus::Absent;
        record.flags.is_late_entry = true;
        record.system_remark = Some(SystemRemark::LateEntry {
            occurrence: prior_late_days + 1,
        });
    }

    record
}

/// Appends `entry` to the timeline and moves the sessions along.
pub fn apply(record: &mut AttendanceRecord, entry: TimelineEntry) -> Result<(), AttendanceError> {
    session_tracker::track(record, entry.punch_type, entry.at)?;
    record.timeline.push(entry);
    Ok(())
}
