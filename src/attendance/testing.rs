//! Shared fixtures: March 2026 with Holi on Wednesday the 4th.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::attendance::calendar::HolidayCalendar;
use crate::attendance::service::{AttendanceService, PunchCommand, ServiceSettings};
use crate::attendance::shift_registry::ShiftRegistry;
use crate::model::attendance::{AttendanceType, PunchType};
use crate::model::holiday::{HolidayEntry, HolidayType};
use crate::store::memory::{MemoryDirectory, MemoryLeaves, MemoryStore};

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub leaves: Arc<MemoryLeaves>,
    pub directory: Arc<MemoryDirectory>,
    pub service: AttendanceService,
}

pub fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
}

pub fn at(d: u32, hour: u32, minute: u32) -> NaiveDateTime {
    day(d).and_hms_opt(hour, minute, 0).unwrap()
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let leaves = Arc::new(MemoryLeaves::default());
    let directory = Arc::new(MemoryDirectory::default());
    let calendar = HolidayCalendar::new([HolidayEntry {
        date: day(4),
        name: "Holi".into(),
        holiday_type: HolidayType::National,
    }]);

    let service = AttendanceService::new(
        store.clone(),
        leaves.clone(),
        directory.clone(),
        Arc::new(calendar),
        Arc::new(ShiftRegistry::builtin()),
        ServiceSettings::default(),
    );

    Harness {
        store,
        leaves,
        directory,
        service,
    }
}

/// Office punch without coordinates; shift comes from the directory.
pub fn punch_cmd(employee_id: u64, punch_type: PunchType, at: NaiveDateTime) -> PunchCommand {
    PunchCommand {
        employee_id,
        punch_type,
        at,
        location: None,
        site: None,
        attendance_type: AttendanceType::Office,
        shift_type: None,
        device: None,
        remark: None,
    }
}
