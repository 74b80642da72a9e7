//! End-of-day reconciliation: every active employee ends the date with exactly
//! one finalized record.

use chrono::{Local, NaiveDate, NaiveDateTime};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::attendance::punch::{self, DayContext};
use crate::attendance::service::AttendanceService;
use crate::attendance::status_resolver::resolve_checkout;
use crate::error::AttendanceError;
use crate::model::attendance::{
    AttendanceRecord, AttendanceStatus, Penalty, PenaltyType, PunchType, SystemRemark,
    TimelineEntry, VerificationMethod,
};
use crate::model::employee::EmployeeShift;
use crate::model::finalizer_run::{FinalizerRun, FinalizerScope};
use crate::model::shift::ShiftProfile;

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// No punch all day; a terminal record was written.
    Created,
    AutoClosed,
    /// Closed online by Out; only marked final.
    Sealed,
    Skipped,
}

enum Outcome {
    Done(Reconciled),
    Failed,
    Cancelled,
}

impl AttendanceService {
    /// Brings one employee's `date` to a terminal state under the record lock.
    pub async fn reconcile_day(
        &self,
        employee: &EmployeeShift,
        date: NaiveDate,
        scope: FinalizerScope,
        now: NaiveDateTime,
    ) -> Result<Reconciled, AttendanceError> {
        let employee_id = employee.employee_id;
        let _guard = self.lock(employee_id, date).await?;

        let existing = self
            .bounded("loading attendance record", self.store.find(employee_id, date))
            .await?;

        match existing {
            Some(record) if record.is_finalized() || !scope.covers(record.shift.is_night_shift) => {
                Ok(Reconciled::Skipped)
            }
            Some(mut record) if record.is_checked_out() => {
                record.finalized_at = Some(now);
                self.bounded("sealing attendance record", self.store.update(&record))
                    .await?;
                Ok(Reconciled::Sealed)
            }
            Some(record) => {
                self.auto_close(record, now).await?;
                Ok(Reconciled::AutoClosed)
            }
            None => {
                let shift = self.shifts.resolve(employee.shift_type.as_deref());
                if !scope.covers(shift.is_night_shift) {
                    return Ok(Reconciled::Skipped);
                }
                let day = self.day_context(employee_id, date).await?;
                let record = open_missing_day(employee_id, date, shift.clone(), &day, now);
                self.bounded("creating attendance record", self.store.insert(&record))
                    .await?;
                Ok(Reconciled::Created)
            }
        }
    }

    async fn auto_close(
        &self,
        mut record: AttendanceRecord,
        now: NaiveDateTime,
    ) -> Result<(), AttendanceError> {
        let shift_end = record.shift.ends_on(record.date);
        let out_at = record
            .last_punch()
            .map_or(shift_end, |last| last.at.max(shift_end));

        punch::apply(
            &mut record,
            TimelineEntry {
                punch_type: PunchType::Out,
                at: out_at,
                location: None,
                distance_meters: None,
                verification: VerificationMethod::System,
                device: None,
                user_remark: None,
                system_generated: true,
            },
        )?;
        record.flags.is_auto_checkout = true;
        record.flags.has_dispute = true;

        let prior_late_days = self.prior_late_days(&record).await?;
        resolve_checkout(&mut record, prior_late_days, out_at);
        record.finalized_at = Some(now);

        self.bounded("auto-closing attendance record", self.store.update(&record))
            .await?;
        Ok(())
    }
}

/// Terminal record for a day nobody punched.
fn open_missing_day(
    employee_id: u64,
    date: NaiveDate,
    shift: ShiftProfile,
    day: &DayContext,
    now: NaiveDateTime,
) -> AttendanceRecord {
    let mut record = AttendanceRecord::new(employee_id, date, shift, None, AttendanceStatus::Absent);

    if let Some(leave) = &day.leave {
        record.status = AttendanceStatus::OnLeave;
        record.leave_type = Some(leave.leave_type.clone());
        record.system_remark = Some(SystemRemark::OnLeave {
            leave_type: leave.leave_type.clone(),
        });
    } else if !day.working_day.is_working {
        record.status = AttendanceStatus::Holiday;
        record.system_remark = Some(SystemRemark::NonWorkingDay {
            reason: day.working_day.reason.clone(),
        });
    } else {
        record.penalty = Penalty::applied(PenaltyType::NoPay, 1.0);
        record.system_remark = Some(SystemRemark::NoPunchRecorded);
    }

    record.finalized_at = Some(now);
    record
}

/// Fans reconciliation out over the active employees, `concurrency` at a time.
/// One employee failing is logged and counted; the pass carries on.
#[derive(Clone)]
pub struct DailyFinalizer {
    service: AttendanceService,
    concurrency: usize,
}

impl DailyFinalizer {
    pub fn new(service: AttendanceService, concurrency: usize) -> Self {
        Self {
            service,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn already_completed(
        &self,
        date: NaiveDate,
        scope: FinalizerScope,
    ) -> Result<bool, AttendanceError> {
        self.service
            .bounded(
                "checking finalizer runs",
                self.service.store.finalizer_run_completed(date, scope),
            )
            .await
    }

    /// `cancel` flipping to `true` stops the pass before the next employee.
    pub async fn run(
        &self,
        date: NaiveDate,
        scope: FinalizerScope,
        now: NaiveDateTime,
        cancel: watch::Receiver<bool>,
    ) -> Result<FinalizerRun, AttendanceError> {
        let mut run = FinalizerRun::start(date, scope, now);
        let service = &self.service;

        service
            .bounded("recording finalizer start", service.store.start_finalizer_run(&run))
            .await?;
        let employees = service
            .bounded("listing active employees", service.directory.active_employees())
            .await?;

        info!(
            run_id = %run.run_id,
            date = %date,
            scope = %scope,
            employees = employees.len(),
            "Finalizer run started"
        );

        let run_id = run.run_id.as_str();
        let outcomes: Vec<Outcome> = stream::iter(employees)
            .map(|employee| {
                let cancel = cancel.clone();
                async move {
                    if *cancel.borrow() {
                        return Outcome::Cancelled;
                    }
                    match service.reconcile_day(&employee, date, scope, now).await {
                        Ok(reconciled) => Outcome::Done(reconciled),
                        Err(e) => {
                            error!(
                                error = %e,
                                run_id,
                                employee_id = employee.employee_id,
                                date = %date,
                                "Failed to finalize attendance"
                            );
                            Outcome::Failed
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Done(Reconciled::Created) => run.created += 1,
                Outcome::Done(Reconciled::AutoClosed) => run.auto_closed += 1,
                Outcome::Done(Reconciled::Sealed) => run.sealed += 1,
                Outcome::Done(Reconciled::Skipped) => run.skipped += 1,
                Outcome::Failed => run.failed += 1,
                Outcome::Cancelled => run.cancelled = true,
            }
        }

        if run.failed == 0 && !run.cancelled {
            run.completed_at = Some(Local::now().naive_local());
        }
        service
            .bounded("recording finalizer result", service.store.complete_finalizer_run(&run))
            .await?;

        if run.cancelled {
            warn!(run_id = %run.run_id, date = %date, processed = run.processed(), "Finalizer run cancelled");
        }
        info!(
            run_id = %run.run_id,
            date = %date,
            scope = %scope,
            created = run.created,
            auto_closed = run.auto_closed,
            sealed = run.sealed,
            skipped = run.skipped,
            failed = run.failed,
            "Finalizer run finished"
        );

        Ok(run)
    }
}
