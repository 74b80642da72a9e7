use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use tokio::sync::OwnedMutexGuard;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::attendance::calendar::HolidayCalendar;
use crate::attendance::geofence::{self, GeofenceCheck, DEFAULT_RADIUS_METERS};
use crate::attendance::leave_oracle::LeaveOracle;
use crate::attendance::locks::RecordLocks;
use crate::attendance::punch::{self, DayContext};
use crate::attendance::shift_registry::ShiftRegistry;
use crate::attendance::status_resolver::resolve_checkout;
use crate::error::AttendanceError;
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, AttendanceType, DeviceInfo, GeoPoint, PunchType,
    TimelineEntry, VerificationMethod,
};
use crate::model::shift::ShiftProfile;
use crate::store::directory::EmployeeDirectory;
use crate::store::{AttendanceStore, StoreResult};

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Upper bound for every store call and for waiting on a record lock.
    pub store_timeout: Duration,
    pub geofence_radius_meters: f64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            store_timeout: Duration::from_millis(5000),
            geofence_radius_meters: DEFAULT_RADIUS_METERS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PunchCommand {
    pub employee_id: u64,
    pub punch_type: PunchType,
    pub at: NaiveDateTime,
    pub location: Option<GeoPoint>,
    pub site: Option<GeoPoint>,
    pub attendance_type: AttendanceType,
    /// Overrides the directory's shift for a newly opened day.
    pub shift_type: Option<String>,
    pub device: Option<DeviceInfo>,
    pub remark: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PunchReceipt {
    pub punch_type: PunchType,
    pub timestamp: NaiveDateTime,
    pub work_date: NaiveDate,
    pub net_work_hours: f64,
    pub status: AttendanceStatus,
    pub is_late: bool,
}

/// Online punch path. Cheap to clone; every collaborator sits behind an `Arc`.
#[derive(Clone)]
pub struct AttendanceService {
    pub(crate) store: Arc<dyn AttendanceStore>,
    pub(crate) leaves: Arc<dyn LeaveOracle>,
    pub(crate) directory: Arc<dyn EmployeeDirectory>,
    pub(crate) calendar: Arc<HolidayCalendar>,
    pub(crate) shifts: Arc<ShiftRegistry>,
    pub(crate) locks: RecordLocks,
    pub(crate) settings: ServiceSettings,
}

impl AttendanceService {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        leaves: Arc<dyn LeaveOracle>,
        directory: Arc<dyn EmployeeDirectory>,
        calendar: Arc<HolidayCalendar>,
        shifts: Arc<ShiftRegistry>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            store,
            leaves,
            directory,
            calendar,
            shifts,
            locks: RecordLocks::new(),
            settings,
        }
    }

    pub async fn punch(&self, cmd: PunchCommand) -> Result<PunchReceipt, AttendanceError> {
        let date = self.working_date(&cmd).await?;
        let _guard = self.lock(cmd.employee_id, date).await?;

        let existing = self
            .bounded("loading attendance record", self.store.find(cmd.employee_id, date))
            .await?;
        punch::validate(existing.as_ref(), cmd.punch_type, cmd.at)?;

        let check = self.locate(&cmd)?;
        let entry = TimelineEntry {
            punch_type: cmd.punch_type,
            at: cmd.at,
            location: cmd.location.clone(),
            distance_meters: check.distance_meters,
            verification: check.verification,
            device: cmd.device.clone(),
            user_remark: cmd.remark.clone(),
            system_generated: false,
        };

        let saved = match existing {
            None => {
                let record = self.open_record(&cmd, date, entry).await?;
                self.bounded("creating attendance record", self.store.insert(&record))
                    .await?
            }
            Some(mut record) => {
                punch::apply(&mut record, entry)?;
                if cmd.punch_type == PunchType::Out {
                    let prior_late_days = self.prior_late_days(&record).await?;
                    resolve_checkout(&mut record, prior_late_days, cmd.at);
                }
                self.bounded("saving attendance record", self.store.update(&record))
                    .await?
            }
        };

        info!(
            employee_id = cmd.employee_id,
            date = %date,
            punch_type = %cmd.punch_type,
            status = %saved.status,
            net_work_hours = saved.summary.net_work_hours,
            "Punch recorded"
        );

        Ok(PunchReceipt {
            punch_type: cmd.punch_type,
            timestamp: cmd.at,
            work_date: date,
            net_work_hours: saved.summary.net_work_hours,
            status: saved.status,
            is_late: saved.flags.is_late_entry,
        })
    }

    pub async fn record(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<AttendanceRecord, AttendanceError> {
        self.bounded("loading attendance record", self.store.find(employee_id, date))
            .await?
            .ok_or_else(|| {
                AttendanceError::NotFound(format!(
                    "No attendance record for employee {employee_id} on {date}"
                ))
            })
    }

    /// Today, unless the punch belongs to a night shift that started yesterday.
    async fn working_date(&self, cmd: &PunchCommand) -> Result<NaiveDate, AttendanceError> {
        let today = cmd.at.date();
        let Some(yesterday) = today.pred_opt() else {
            return Ok(today);
        };
        if cmd.punch_type == PunchType::In {
            return self.check_in_date(cmd, today, yesterday).await;
        }

        let todays = self
            .bounded("loading attendance record", self.store.find(cmd.employee_id, today))
            .await?;
        if todays.is_some() {
            return Ok(today);
        }

        let overnight = self
            .bounded("loading attendance record", self.store.find(cmd.employee_id, yesterday))
            .await?
            .is_some_and(|r| r.shift.is_night_shift && !r.is_checked_out() && !r.is_finalized());
        Ok(if overnight { yesterday } else { today })
    }

    /// An In before last night's shift has ended, with nothing opened today, is a
    /// late arrival for yesterday's night shift.
    async fn check_in_date(
        &self,
        cmd: &PunchCommand,
        today: NaiveDate,
        yesterday: NaiveDate,
    ) -> Result<NaiveDate, AttendanceError> {
        let shift = self.shift_for(cmd).await?;
        if !shift.is_night_shift || cmd.at >= shift.ends_on(yesterday) {
            return Ok(today);
        }

        let todays = self
            .bounded("loading attendance record", self.store.find(cmd.employee_id, today))
            .await?;
        Ok(if todays.is_some() { today } else { yesterday })
    }

    async fn shift_for(&self, cmd: &PunchCommand) -> Result<ShiftProfile, AttendanceError> {
        let shift_type = match &cmd.shift_type {
            Some(name) => Some(name.clone()),
            None => {
                self.bounded("loading employee shift", self.directory.shift_type(cmd.employee_id))
                    .await?
            }
        };
        Ok(self.shifts.resolve(shift_type.as_deref()).clone())
    }

    async fn open_record(
        &self,
        cmd: &PunchCommand,
        date: NaiveDate,
        entry: TimelineEntry,
    ) -> Result<AttendanceRecord, AttendanceError> {
        let shift = self.shift_for(cmd).await?;

        let day = self.day_context(cmd.employee_id, date).await?;
        let prior_late_days = if cmd.at > shift.late_after(date) {
            self.late_count_before(cmd.employee_id, date).await?
        } else {
            0
        };

        let mut record = punch::open_on_first_punch(
            cmd.employee_id,
            date,
            shift,
            cmd.attendance_type,
            &day,
            prior_late_days,
            cmd.at,
        );
        punch::apply(&mut record, entry)?;
        Ok(record)
    }

    fn locate(&self, cmd: &PunchCommand) -> Result<GeofenceCheck, AttendanceError> {
        match &cmd.location {
            Some(reported) => geofence::verify(
                cmd.attendance_type,
                reported,
                cmd.site.as_ref(),
                self.settings.geofence_radius_meters,
            ),
            None if cmd.site.is_some() && cmd.attendance_type.is_geofenced() => Err(
                AttendanceError::validation("Coordinates are required for Office and Site punches"),
            ),
            None => Ok(GeofenceCheck {
                verification: VerificationMethod::Manual,
                distance_meters: None,
            }),
        }
    }

    pub(crate) async fn day_context(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<DayContext, AttendanceError> {
        let leave = self
            .bounded(
                "checking approved leave",
                self.leaves.active_approved_leave(employee_id, date),
            )
            .await?;
        Ok(DayContext {
            leave,
            working_day: self.calendar.is_working_day(date),
        })
    }

    pub(crate) async fn prior_late_days(
        &self,
        record: &AttendanceRecord,
    ) -> Result<u32, AttendanceError> {
        if !record.flags.is_late_entry {
            return Ok(0);
        }
        self.late_count_before(record.employee_id, record.date).await
    }

    /// Late-flagged days earlier in the same calendar month.
    async fn late_count_before(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<u32, AttendanceError> {
        let month_start = date.with_day(1).unwrap_or(date);
        self.bounded(
            "counting late entries",
            self.store.count_late_entries(employee_id, month_start, date),
        )
        .await
    }

    pub(crate) async fn lock(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> Result<OwnedMutexGuard<()>, AttendanceError> {
        timeout(self.settings.store_timeout, self.locks.acquire(employee_id, date))
            .await
            .map_err(|_| {
                warn!(employee_id, date = %date, "Timed out waiting for attendance record lock");
                AttendanceError::System(format!(
                    "attendance record for employee {employee_id} on {date} is busy"
                ))
            })
    }

    pub(crate) async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> Result<T, AttendanceError> {
        match timeout(self.settings.store_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                warn!(operation, "Store call timed out");
                Err(AttendanceError::System(format!(
                    "{operation} timed out after {} ms",
                    self.settings.store_timeout.as_millis()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::testing::{at, day, harness, punch_cmd, Harness};
    use crate::model::attendance::{PenaltyType, SystemRemark, WorkType};
    use crate::model::leave_request::{LeaveRequest, LeaveStatus};

    async fn punches(h: &Harness, employee_id: u64, steps: &[(PunchType, NaiveDateTime)]) {
        for (punch_type, when) in steps {
            h.service
                .punch(punch_cmd(employee_id, *punch_type, *when))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn scenario_a_in_within_grace_is_present() {
        let h = harness();
        let receipt = h
            .service
            .punch(punch_cmd(1, PunchType::In, at(2, 9, 10)))
            .await
            .unwrap();

        assert_eq!(receipt.status, AttendanceStatus::Present);
        assert!(!receipt.is_late);
        assert_eq!(receipt.net_work_hours, 0.0);

        let record = h.store.get(1, day(2)).unwrap();
        assert_eq!(record.shift.name, "General");
        assert_eq!(record.timeline.len(), 1);
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn scenario_b_first_late_day_needs_regularization() {
        let h = harness();
        let receipt = h
            .service
            .punch(punch_cmd(1, PunchType::In, at(2, 9, 45)))
            .await
            .unwrap();
        assert_eq!(receipt.status, AttendanceStatus::Absent);
        assert!(receipt.is_late);
        assert_eq!(
            h.store.get(1, day(2)).unwrap().system_remark,
            Some(SystemRemark::LateEntry { occurrence: 1 })
        );

        let out = h
            .service
            .punch(punch_cmd(1, PunchType::Out, at(2, 17, 45)))
            .await
            .unwrap();
        assert_eq!(out.net_work_hours, 8.0);
        assert_eq!(out.status, AttendanceStatus::Absent);

        let record = h.store.get(1, day(2)).unwrap();
        assert!(
            record
                .system_remark
                .unwrap()
                .to_string()
                .contains("HR Regularization Required")
        );
        assert!(record.flags.is_early_exit);
    }

    #[tokio::test]
    async fn scenario_c_fourth_late_day_is_half_day() {
        let h = harness();
        for d in [2, 3, 5] {
            punches(&h, 1, &[(PunchType::In, at(d, 9, 40)), (PunchType::Out, at(d, 18, 0))]).await;
        }

        punches(&h, 1, &[(PunchType::In, at(6, 9, 30)), (PunchType::Out, at(6, 17, 30))]).await;

        let record = h.store.get(1, day(6)).unwrap();
        assert_eq!(record.status, AttendanceStatus::HalfDay);
        assert_eq!(record.summary.net_work_hours, 8.0);
        assert_eq!(
            record.penalty,
            crate::model::attendance::Penalty::applied(PenaltyType::LateDeduction, 0.5)
        );
        assert_eq!(record.system_remark.unwrap().to_string(), "Late Penalty (#4)");
    }

    #[tokio::test]
    async fn scenario_d_work_on_approved_leave() {
        let h = harness();
        h.leaves.add(LeaveRequest {
            id: 11,
            employee_id: 1,
            start_date: day(2),
            end_date: day(3),
            leave_type: "Casual".into(),
            status: LeaveStatus::ManagerApproved,
        });

        punches(&h, 1, &[(PunchType::In, at(3, 10, 0)), (PunchType::Out, at(3, 16, 0))]).await;

        let record = h.store.get(1, day(3)).unwrap();
        assert_eq!(record.status, AttendanceStatus::Absent);
        assert!(!record.flags.is_late_entry);
        assert!(
            record
                .system_remark
                .unwrap()
                .to_string()
                .contains("Work on Approved Leave")
        );
    }

    #[tokio::test]
    async fn scenario_e_sunday_work_earns_half_comp_off() {
        let h = harness();
        punches(&h, 1, &[(PunchType::In, at(8, 10, 0)), (PunchType::Out, at(8, 15, 0))]).await;

        let record = h.store.get(1, day(8)).unwrap();
        assert_eq!(record.status, AttendanceStatus::Holiday);
        assert_eq!(record.work_type, WorkType::HolidayWork);
        assert_eq!(record.rewards.comp_off_credit, 0.5);
        assert_eq!(
            record.rewards.approval_status,
            Some(crate::model::attendance::CompOffApproval::AutoApproved)
        );
    }

    #[tokio::test]
    async fn full_day_with_break_and_lunch() {
        let h = harness();
        punches(
            &h,
            1,
            &[
                (PunchType::In, at(2, 9, 0)),
                (PunchType::BreakStart, at(2, 11, 0)),
                (PunchType::BreakEnd, at(2, 11, 15)),
                (PunchType::LunchStart, at(2, 13, 0)),
                (PunchType::LunchEnd, at(2, 13, 45)),
                (PunchType::Out, at(2, 18, 20)),
            ],
        )
        .await;

        let record = h.store.get(1, day(2)).unwrap();
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.summary.net_work_hours, 8.33);
        assert_eq!(record.summary.total_break_minutes, 60);
        assert!(!record.flags.is_early_exit);
        assert_eq!(record.version, 6);
        assert!(
            record
                .timeline
                .windows(2)
                .all(|pair| pair[0].at <= pair[1].at)
        );
    }

    #[tokio::test]
    async fn break_without_check_in_is_not_found() {
        let h = harness();
        let err = h
            .service
            .punch(punch_cmd(1, PunchType::BreakStart, at(2, 10, 0)))
            .await
            .unwrap_err();

        assert!(matches!(err, AttendanceError::NotFound(_)));
        assert_eq!(h.store.record_count(), 0);
    }

    #[tokio::test]
    async fn office_punch_far_from_site_is_rejected_with_distance() {
        let h = harness();
        let mut cmd = punch_cmd(1, PunchType::In, at(2, 9, 0));
        cmd.site = Some(GeoPoint {
            latitude: 23.8103,
            longitude: 90.4125,
        });
        cmd.location = Some(GeoPoint {
            latitude: 23.8300,
            longitude: 90.4125,
        });

        let err = h.service.punch(cmd.clone()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::Location { .. }));
        assert_eq!(h.store.record_count(), 0);

        cmd.location = Some(GeoPoint {
            latitude: 23.8105,
            longitude: 90.4126,
        });
        h.service.punch(cmd).await.unwrap();
        let entry = &h.store.get(1, day(2)).unwrap().timeline[0];
        assert_eq!(entry.verification, VerificationMethod::Geofence);
        assert!(entry.distance_meters.is_some());
    }

    #[tokio::test]
    async fn concurrent_check_ins_leave_one_record() {
        let h = harness();
        h.store.set_delay(Duration::from_millis(10));

        let (first, second) = tokio::join!(
            h.service.punch(punch_cmd(1, PunchType::In, at(2, 9, 0))),
            h.service.punch(punch_cmd(1, PunchType::In, at(2, 9, 0))),
        );

        assert_eq!([&first, &second].iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(h.store.record_count(), 1);
        assert_eq!(h.store.get(1, day(2)).unwrap().timeline.len(), 1);
    }

    #[tokio::test]
    async fn separate_instances_surface_a_conflict_instead_of_losing_a_punch() {
        let h = harness();
        h.service
            .punch(punch_cmd(1, PunchType::In, at(2, 9, 0)))
            .await
            .unwrap();
        h.store.set_delay(Duration::from_millis(10));

        // Same store, independent lock tables: two service processes.
        let other = AttendanceService {
            locks: RecordLocks::new(),
            ..h.service.clone()
        };
        let (first, second) = tokio::join!(
            h.service.punch(punch_cmd(1, PunchType::BreakStart, at(2, 10, 0))),
            other.punch(punch_cmd(1, PunchType::BreakStart, at(2, 10, 0))),
        );

        let conflicts = [&first, &second]
            .iter()
            .filter(|r| matches!(r, Err(AttendanceError::Conflict(_))))
            .count();
        assert_eq!(conflicts, 1);
        assert_eq!(h.store.get(1, day(2)).unwrap().timeline.len(), 2);
    }

    #[tokio::test]
    async fn slow_store_surfaces_system_error() {
        let h = harness_with_timeout(Duration::from_millis(20));
        h.store.set_delay(Duration::from_millis(200));

        let err = h
            .service
            .punch(punch_cmd(1, PunchType::In, at(2, 9, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AttendanceError::System(_)));
    }

    #[tokio::test]
    async fn night_shift_punches_continue_yesterdays_record() {
        let h = harness();
        h.directory.add(5, Some("Night"));

        h.service
            .punch(punch_cmd(5, PunchType::In, at(2, 22, 5)))
            .await
            .unwrap();
        let receipt = h
            .service
            .punch(punch_cmd(5, PunchType::Out, at(3, 6, 10)))
            .await
            .unwrap();

        assert_eq!(receipt.work_date, day(2));
        assert!(h.store.get(5, day(3)).is_none());
        let record = h.store.get(5, day(2)).unwrap();
        assert!(record.shift.is_night_shift);
        assert_eq!(record.summary.net_work_hours, 8.08);
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[tokio::test]
    async fn night_shift_arrival_after_midnight_is_late_for_the_shift_date() {
        let h = harness();
        h.directory.add(5, Some("Night"));

        let receipt = h
            .service
            .punch(punch_cmd(5, PunchType::In, at(3, 0, 30)))
            .await
            .unwrap();
        assert_eq!(receipt.work_date, day(2));
        assert!(receipt.is_late);
        assert_eq!(receipt.status, AttendanceStatus::Absent);

        let out = h
            .service
            .punch(punch_cmd(5, PunchType::Out, at(3, 6, 0)))
            .await
            .unwrap();
        assert_eq!(out.work_date, day(2));
        assert_eq!(out.net_work_hours, 5.5);

        let (_tx, cancel) = tokio::sync::watch::channel(false);
        let run = crate::attendance::finalizer::DailyFinalizer::new(h.service.clone(), 2)
            .run(
                day(2),
                crate::model::finalizer_run::FinalizerScope::NightShift,
                at(3, 10, 0),
                cancel,
            )
            .await
            .unwrap();
        assert_eq!(run.sealed, 1);
        assert_eq!(run.created, 0);

        assert!(h.store.get(5, day(3)).is_none());
        let record = h.store.get(5, day(2)).unwrap();
        assert!(record.flags.is_late_entry);
        assert_eq!(record.status, AttendanceStatus::Absent);
        assert_eq!(
            record.system_remark,
            Some(SystemRemark::LateRegularizationRequired { occurrence: 1 })
        );
        assert!(!record.penalty.is_applied);
        assert!(record.is_finalized());
    }

    #[tokio::test]
    async fn night_shift_check_in_after_the_shift_ended_opens_today() {
        let h = harness();
        h.directory.add(5, Some("Night"));

        let receipt = h
            .service
            .punch(punch_cmd(5, PunchType::In, at(3, 21, 55)))
            .await
            .unwrap();
        assert_eq!(receipt.work_date, day(3));
        assert!(!receipt.is_late);
        assert!(h.store.get(5, day(2)).is_none());
    }

    #[tokio::test]
    async fn re_entry_after_out_is_resolved_again_on_next_out() {
        let h = harness();
        punches(
            &h,
            1,
            &[
                (PunchType::In, at(2, 9, 0)),
                (PunchType::Out, at(2, 12, 0)),
            ],
        )
        .await;
        assert_eq!(h.store.get(1, day(2)).unwrap().status, AttendanceStatus::Absent);

        punches(
            &h,
            1,
            &[
                (PunchType::In, at(2, 13, 0)),
                (PunchType::Out, at(2, 18, 0)),
            ],
        )
        .await;
        let record = h.store.get(1, day(2)).unwrap();
        assert_eq!(record.summary.net_work_hours, 8.0);
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.system_remark, None);
    }

    fn harness_with_timeout(store_timeout: Duration) -> Harness {
        let mut h = harness();
        h.service.settings.store_timeout = store_timeout;
        h
    }
}
