use chrono::NaiveDateTime;

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceRecord, AttendanceSummary, PunchType, Session, SessionType};

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Whole minutes between two instants, rounded half away from zero.
pub fn duration_minutes(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    ((end - start).num_milliseconds() as f64 / 60_000.0).round() as i64
}

/// Closes the open session, if any, and returns its type.
pub fn close_open_session(
    sessions: &mut [Session],
    at: NaiveDateTime,
) -> Result<Option<SessionType>, AttendanceError> {
    let mut open = sessions.iter_mut().filter(|s| s.is_open());
    let Some(session) = open.next() else {
        return Ok(None);
    };
    if open.next().is_some() {
        return Err(AttendanceError::System(
            "attendance record has more than one open session".to_string(),
        ));
    }

    session.end = Some(at);
    session.duration_minutes = Some(duration_minutes(session.start, at));
    Ok(Some(session.session_type))
}

pub fn summarize(sessions: &[Session], scheduled_hours: f64) -> AttendanceSummary {
    let closed_minutes = |kind: fn(SessionType) -> bool| -> i64 {
        sessions
            .iter()
            .filter(|s| kind(s.session_type))
            .filter_map(|s| s.duration_minutes)
            .sum()
    };

    let work_minutes = closed_minutes(|t| t == SessionType::Work);
    let break_minutes = closed_minutes(|t| matches!(t, SessionType::Break | SessionType::Lunch));
    let net_work_hours = round2(work_minutes as f64 / 60.0);

    AttendanceSummary {
        net_work_hours,
        total_break_minutes: break_minutes,
        overtime_hours: round2((net_work_hours - scheduled_hours).max(0.0)),
    }
}

/// Moves the record's sessions along for `punch` at `at` and refreshes the summary.
pub fn track(
    record: &mut AttendanceRecord,
    punch: PunchType,
    at: NaiveDateTime,
) -> Result<(), AttendanceError> {
    close_open_session(&mut record.sessions, at)?;
    if let Some(session_type) = punch.opens() {
        record.sessions.push(Session::open(session_type, at));
    }
    record.summary = summarize(&record.sessions, record.shift.scheduled_hours(record.date));
    Ok(())
}
