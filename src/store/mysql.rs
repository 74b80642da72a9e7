use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{MySql, MySqlPool, Transaction};
use tracing::debug;

use crate::model::attendance::{
    AttendanceFlags, AttendanceRecord, AttendanceSummary, CompOffReward, GeoPoint, Penalty,
    Session, TimelineEntry,
};
use crate::model::finalizer_run::{FinalizerRun, FinalizerScope};
use crate::store::{AttendanceStore, StoreError, StoreResult};

#[derive(sqlx::FromRow)]
struct RecordRow {
    id: u64,
    employee_id: u64,
    work_date: NaiveDate,
    shift_snapshot: String,
    attendance_type: Option<String>,
    work_type: String,
    leave_type: Option<String>,
    status: String,
    system_remark: Option<String>,
    net_work_hours: f64,
    total_break_minutes: i64,
    overtime_hours: f64,
    is_late_entry: bool,
    is_early_exit: bool,
    is_auto_checkout: bool,
    has_dispute: bool,
    penalty_applied: bool,
    penalty_type: Option<String>,
    deduction_amount: f64,
    comp_off_eligible: bool,
    comp_off_credit: f64,
    comp_off_approval: Option<String>,
    finalized_at: Option<NaiveDateTime>,
    version: u32,
}

#[derive(sqlx::FromRow)]
struct PunchRow {
    punch_type: String,
    punched_at: NaiveDateTime,
    latitude: Option<f64>,
    longitude: Option<f64>,
    distance_meters: Option<f64>,
    verification: String,
    device: Option<String>,
    user_remark: Option<String>,
    system_generated: bool,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_type: String,
    started_at: NaiveDateTime,
    ended_at: Option<NaiveDateTime>,
    duration_minutes: Option<i64>,
}

fn parse<T: FromStr>(column: &str, value: &str) -> StoreResult<T> {
    value
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("unexpected {column} value '{value}'")))
}

fn parse_opt<T: FromStr>(column: &str, value: Option<&str>) -> StoreResult<Option<T>> {
    value.map(|v| parse(column, v)).transpose()
}

fn to_json<T: serde::Serialize>(column: &str, value: &T) -> StoreResult<String> {
    serde_json::to_string(value)
        .map_err(|e| StoreError::Corrupt(format!("cannot encode {column}: {e}")))
}

fn from_json<T: serde::de::DeserializeOwned>(column: &str, value: &str) -> StoreResult<T> {
    serde_json::from_str(value)
        .map_err(|e| StoreError::Corrupt(format!("cannot decode {column}: {e}")))
}

impl PunchRow {
    fn into_entry(self) -> StoreResult<TimelineEntry> {
        let location = match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        };
        Ok(TimelineEntry {
            punch_type: parse("punch_type", &self.punch_type)?,
            at: self.punched_at,
            location,
            distance_meters: self.distance_meters,
            verification: parse("verification", &self.verification)?,
            device: self
                .device
                .as_deref()
                .map(|d| from_json("device", d))
                .transpose()?,
            user_remark: self.user_remark,
            system_generated: self.system_generated,
        })
    }
}

impl SessionRow {
    fn into_session(self) -> StoreResult<Session> {
        Ok(Session {
            session_type: parse("session_type", &self.session_type)?,
            start: self.started_at,
            end: self.ended_at,
            duration_minutes: self.duration_minutes,
        })
    }
}

impl RecordRow {
    fn into_record(
        self,
        timeline: Vec<TimelineEntry>,
        sessions: Vec<Session>,
    ) -> StoreResult<AttendanceRecord> {
        Ok(AttendanceRecord {
            id: Some(self.id),
            employee_id: self.employee_id,
            date: self.work_date,
            shift: from_json("shift_snapshot", &self.shift_snapshot)?,
            attendance_type: parse_opt("attendance_type", self.attendance_type.as_deref())?,
            work_type: parse("work_type", &self.work_type)?,
            leave_type: self.leave_type,
            timeline,
            sessions,
            summary: AttendanceSummary {
                net_work_hours: self.net_work_hours,
                total_break_minutes: self.total_break_minutes,
                overtime_hours: self.overtime_hours,
            },
            status: parse("status", &self.status)?,
            system_remark: self
                .system_remark
                .as_deref()
                .map(|r| from_json("system_remark", r))
                .transpose()?,
            flags: AttendanceFlags {
                is_late_entry: self.is_late_entry,
                is_early_exit: self.is_early_exit,
                is_auto_checkout: self.is_auto_checkout,
                has_dispute: self.has_dispute,
            },
            penalty: Penalty {
                is_applied: self.penalty_applied,
                penalty_type: parse_opt("penalty_type", self.penalty_type.as_deref())?,
                deduction_amount: self.deduction_amount,
            },
            rewards: CompOffReward {
                is_eligible: self.comp_off_eligible,
                comp_off_credit: self.comp_off_credit,
                approval_status: parse_opt(
                    "comp_off_approval",
                    self.comp_off_approval.as_deref(),
                )?,
            },
            finalized_at: self.finalized_at,
            version: self.version,
        })
    }
}

/// Enum and JSON columns, encoded once for INSERT and UPDATE.
struct RecordColumns {
    shift_snapshot: String,
    attendance_type: Option<String>,
    work_type: String,
    status: String,
    system_remark: Option<String>,
}

impl RecordColumns {
    fn of(record: &AttendanceRecord) -> StoreResult<Self> {
        Ok(Self {
            shift_snapshot: to_json("shift_snapshot", &record.shift)?,
            attendance_type: record.attendance_type.map(|t| t.to_string()),
            work_type: record.work_type.to_string(),
            status: record.status.to_string(),
            system_remark: record
                .system_remark
                .as_ref()
                .map(|r| to_json("system_remark", r))
                .transpose()?,
        })
    }
}

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn insert_punches(
        tx: &mut Transaction<'_, MySql>,
        record_id: u64,
        entries: &[TimelineEntry],
        first_seq: usize,
    ) -> StoreResult<()> {
        for (offset, entry) in entries.iter().enumerate() {
            let device = entry
                .device
                .as_ref()
                .map(|d| to_json("device", d))
                .transpose()?;
            sqlx::query(
                r#"
                INSERT INTO attendance_punches
                    (record_id, seq, punch_type, punched_at, latitude, longitude,
                     distance_meters, verification, device, user_remark, system_generated)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(record_id)
            .bind((first_seq + offset) as u32)
            .bind(entry.punch_type.to_string())
            .bind(entry.at)
            .bind(entry.location.as_ref().map(|l| l.latitude))
            .bind(entry.location.as_ref().map(|l| l.longitude))
            .bind(entry.distance_meters)
            .bind(entry.verification.to_string())
            .bind(device)
            .bind(entry.user_remark.clone())
            .bind(entry.system_generated)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn replace_sessions(
        tx: &mut Transaction<'_, MySql>,
        record_id: u64,
        sessions: &[Session],
    ) -> StoreResult<()> {
        sqlx::query("DELETE FROM attendance_sessions WHERE record_id = ?")
            .bind(record_id)
            .execute(&mut **tx)
            .await?;

        for (seq, session) in sessions.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO attendance_sessions
                    (record_id, seq, session_type, started_at, ended_at, duration_minutes)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(record_id)
            .bind(seq as u32)
            .bind(session.session_type.to_string())
            .bind(session.start)
            .bind(session.end)
            .bind(session.duration_minutes)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn find(&self, employee_id: u64, date: NaiveDate) -> StoreResult<Option<AttendanceRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(
            r#"
            SELECT id, employee_id, work_date, shift_snapshot, attendance_type, work_type,
                   leave_type, status, system_remark, net_work_hours, total_break_minutes,
                   overtime_hours, is_late_entry, is_early_exit, is_auto_checkout, has_dispute,
                   penalty_applied, penalty_type, deduction_amount, comp_off_eligible,
                   comp_off_credit, comp_off_approval, finalized_at, version
            FROM attendance_records
            WHERE employee_id = ? AND work_date = ?
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let timeline = sqlx::query_as::<_, PunchRow>(
            r#"
            SELECT punch_type, punched_at, latitude, longitude, distance_meters,
                   verification, device, user_remark, system_generated
            FROM attendance_punches
            WHERE record_id = ?
            ORDER BY seq
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(PunchRow::into_entry)
        .collect::<StoreResult<Vec<_>>>()?;

        let sessions = sqlx::query_as::<_, SessionRow>(
            r#"
            SELECT session_type, started_at, ended_at, duration_minutes
            FROM attendance_sessions
            WHERE record_id = ?
            ORDER BY seq
            "#,
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(SessionRow::into_session)
        .collect::<StoreResult<Vec<_>>>()?;

        row.into_record(timeline, sessions).map(Some)
    }

    async fn insert(&self, record: &AttendanceRecord) -> StoreResult<AttendanceRecord> {
        let columns = RecordColumns::of(record)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records
                (employee_id, work_date, shift_snapshot, attendance_type, work_type, leave_type,
                 status, system_remark, net_work_hours, total_break_minutes, overtime_hours,
                 is_late_entry, is_early_exit, is_auto_checkout, has_dispute,
                 penalty_applied, penalty_type, deduction_amount,
                 comp_off_eligible, comp_off_credit, comp_off_approval, finalized_at, version)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1)
            "#,
        )
        .bind(record.employee_id)
        .bind(record.date)
        .bind(columns.shift_snapshot)
        .bind(columns.attendance_type)
        .bind(columns.work_type)
        .bind(record.leave_type.clone())
        .bind(columns.status)
        .bind(columns.system_remark)
        .bind(record.summary.net_work_hours)
        .bind(record.summary.total_break_minutes)
        .bind(record.summary.overtime_hours)
        .bind(record.flags.is_late_entry)
        .bind(record.flags.is_early_exit)
        .bind(record.flags.is_auto_checkout)
        .bind(record.flags.has_dispute)
        .bind(record.penalty.is_applied)
        .bind(record.penalty.penalty_type.map(|p| p.to_string()))
        .bind(record.penalty.deduction_amount)
        .bind(record.rewards.is_eligible)
        .bind(record.rewards.comp_off_credit)
        .bind(record.rewards.approval_status.map(|a| a.to_string()))
        .bind(record.finalized_at)
        .execute(&mut *tx)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(e) => {
                // unique (employee_id, work_date)
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.code().as_deref() == Some("23000") {
                        return Err(StoreError::Duplicate {
                            employee_id: record.employee_id,
                            date: record.date,
                        });
                    }
                }
                return Err(e.into());
            }
        };

        let record_id = result.last_insert_id();
        Self::insert_punches(&mut tx, record_id, &record.timeline, 0).await?;
        Self::replace_sessions(&mut tx, record_id, &record.sessions).await?;
        tx.commit().await?;

        debug!(record_id, employee_id = record.employee_id, date = %record.date, "Attendance record inserted");

        let mut stored = record.clone();
        stored.id = Some(record_id);
        stored.version = 1;
        Ok(stored)
    }

    async fn update(&self, record: &AttendanceRecord) -> StoreResult<AttendanceRecord> {
        let record_id = record
            .id
            .ok_or_else(|| StoreError::Corrupt("update of an unsaved attendance record".into()))?;
        let columns = RecordColumns::of(record)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE attendance_records
            SET status = ?, system_remark = ?, work_type = ?, leave_type = ?,
                net_work_hours = ?, total_break_minutes = ?, overtime_hours = ?,
                is_late_entry = ?, is_early_exit = ?, is_auto_checkout = ?, has_dispute = ?,
                penalty_applied = ?, penalty_type = ?, deduction_amount = ?,
                comp_off_eligible = ?, comp_off_credit = ?, comp_off_approval = ?,
                finalized_at = ?, version = version + 1, updated_at = NOW()
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(columns.status)
        .bind(columns.system_remark)
        .bind(columns.work_type)
        .bind(record.leave_type.clone())
        .bind(record.summary.net_work_hours)
        .bind(record.summary.total_break_minutes)
        .bind(record.summary.overtime_hours)
        .bind(record.flags.is_late_entry)
        .bind(record.flags.is_early_exit)
        .bind(record.flags.is_auto_checkout)
        .bind(record.flags.has_dispute)
        .bind(record.penalty.is_applied)
        .bind(record.penalty.penalty_type.map(|p| p.to_string()))
        .bind(record.penalty.deduction_amount)
        .bind(record.rewards.is_eligible)
        .bind(record.rewards.comp_off_credit)
        .bind(record.rewards.approval_status.map(|a| a.to_string()))
        .bind(record.finalized_at)
        .bind(record_id)
        .bind(record.version)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::VersionConflict {
                record_id,
                expected: record.version,
            });
        }

        let persisted: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM attendance_punches WHERE record_id = ?")
                .bind(record_id)
                .fetch_one(&mut *tx)
                .await?;
        let persisted = usize::try_from(persisted).unwrap_or_default();
        if persisted > record.timeline.len() {
            return Err(StoreError::Corrupt(format!(
                "record {record_id} holds {persisted} punches but update carries {}",
                record.timeline.len()
            )));
        }

        Self::insert_punches(&mut tx, record_id, &record.timeline[persisted..], persisted).await?;
        Self::replace_sessions(&mut tx, record_id, &record.sessions).await?;
        tx.commit().await?;

        let mut stored = record.clone();
        stored.version = record.version + 1;
        Ok(stored)
    }

    async fn count_late_entries(
        &self,
        employee_id: u64,
        from: NaiveDate,
        before: NaiveDate,
    ) -> StoreResult<u32> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM attendance_records
            WHERE employee_id = ?
            AND work_date >= ?
            AND work_date < ?
            AND is_late_entry = 1
            "#,
        )
        .bind(employee_id)
        .bind(from)
        .bind(before)
        .fetch_one(&self.pool)
        .await?;

        u32::try_from(count).map_err(|_| StoreError::Corrupt(format!("late count {count}")))
    }

    async fn start_finalizer_run(&self, run: &FinalizerRun) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO finalizer_runs (run_date, scope, run_id, started_at)
            VALUES (?, ?, ?, ?)
            ON DUPLICATE KEY UPDATE
                run_id = VALUES(run_id),
                started_at = VALUES(started_at),
                completed_at = NULL
            "#,
        )
        .bind(run.date)
        .bind(run.scope.to_string())
        .bind(&run.run_id)
        .bind(run.started_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_finalizer_run(&self, run: &FinalizerRun) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE finalizer_runs
            SET completed_at = ?, created = ?, auto_closed = ?, sealed = ?, skipped = ?, failed = ?
            WHERE run_date = ? AND scope = ? AND run_id = ?
            "#,
        )
        .bind(run.completed_at)
        .bind(run.created)
        .bind(run.auto_closed)
        .bind(run.sealed)
        .bind(run.skipped)
        .bind(run.failed)
        .bind(run.date)
        .bind(run.scope.to_string())
        .bind(&run.run_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finalizer_run_completed(
        &self,
        date: NaiveDate,
        scope: FinalizerScope,
    ) -> StoreResult<bool> {
        let completed_at: Option<Option<NaiveDateTime>> = sqlx::query_scalar(
            "SELECT completed_at FROM finalizer_runs WHERE run_date = ? AND scope = ?",
        )
        .bind(date)
        .bind(scope.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(matches!(completed_at, Some(Some(_))))
    }
}
