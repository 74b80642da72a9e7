//! In-memory stand-ins for the MySQL store, leave table and employee directory.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::attendance::leave_oracle::LeaveOracle;
use crate::model::attendance::AttendanceRecord;
use crate::model::employee::EmployeeShift;
use crate::model::finalizer_run::{FinalizerRun, FinalizerScope};
use crate::model::leave_request::LeaveRequest;
use crate::store::directory::EmployeeDirectory;
use crate::store::{AttendanceStore, StoreError, StoreResult};

#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<(u64, NaiveDate), AttendanceRecord>>,
    runs: Mutex<HashMap<(NaiveDate, FinalizerScope), FinalizerRun>>,
    next_id: Mutex<u64>,
    delay: Mutex<Option<Duration>>,
    failing: Mutex<HashSet<u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Reads and writes for this employee fail as unavailable.
    pub fn fail_for(&self, employee_id: u64) {
        self.failing.lock().unwrap().insert(employee_id);
    }

    pub fn get(&self, employee_id: u64, date: NaiveDate) -> Option<AttendanceRecord> {
        self.records.lock().unwrap().get(&(employee_id, date)).cloned()
    }

    /// Seeds a record directly, bypassing the delay and failure hooks.
    pub fn put(&self, mut record: AttendanceRecord) -> AttendanceRecord {
        record.id = Some(self.allocate_id());
        record.version = 1;
        self.records
            .lock()
            .unwrap()
            .insert((record.employee_id, record.date), record.clone());
        record
    }

    pub fn record_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn run(&self, date: NaiveDate, scope: FinalizerScope) -> Option<FinalizerRun> {
        self.runs.lock().unwrap().get(&(date, scope)).cloned()
    }

    fn allocate_id(&self) -> u64 {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        *next
    }

    async fn enter(&self, employee_id: Option<u64>) -> StoreResult<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match employee_id {
            Some(id) if self.failing.lock().unwrap().contains(&id) => Err(
                StoreError::Unavailable(format!("employee {id} partition offline")),
            ),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find(&self, employee_id: u64, date: NaiveDate) -> StoreResult<Option<AttendanceRecord>> {
        self.enter(Some(employee_id)).await?;
        Ok(self.get(employee_id, date))
    }

    async fn insert(&self, record: &AttendanceRecord) -> StoreResult<AttendanceRecord> {
        self.enter(Some(record.employee_id)).await?;
        let key = (record.employee_id, record.date);
        let mut records = self.records.lock().unwrap();
        if records.contains_key(&key) {
            return Err(StoreError::Duplicate {
                employee_id: record.employee_id,
                date: record.date,
            });
        }
        let mut saved = record.clone();
        saved.id = Some(self.allocate_id());
        saved.version = 1;
        records.insert(key, saved.clone());
        Ok(saved)
    }

    async fn update(&self, record: &AttendanceRecord) -> StoreResult<AttendanceRecord> {
        self.enter(Some(record.employee_id)).await?;
        let mut records = self.records.lock().unwrap();
        let stored = records
            .get_mut(&(record.employee_id, record.date))
            .ok_or_else(|| StoreError::Corrupt("update of a record that was never inserted".into()))?;
        if stored.version != record.version {
            return Err(StoreError::VersionConflict {
                record_id: stored.id.unwrap_or_default(),
                expected: record.version,
            });
        }
        if !record.timeline.starts_with(&stored.timeline) {
            return Err(StoreError::Corrupt("stored timeline entries were rewritten".into()));
        }

        let mut saved = record.clone();
        saved.version += 1;
        *stored = saved.clone();
        Ok(saved)
    }

    async fn count_late_entries(
        &self,
        employee_id: u64,
        from: NaiveDate,
        before: NaiveDate,
    ) -> StoreResult<u32> {
        self.enter(Some(employee_id)).await?;
        let count = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.employee_id == employee_id)
            .filter(|r| r.date >= from && r.date < before)
            .filter(|r| r.flags.is_late_entry)
            .count();
        Ok(count as u32)
    }

    async fn start_finalizer_run(&self, run: &FinalizerRun) -> StoreResult<()> {
        self.enter(None).await?;
        self.runs
            .lock()
            .unwrap()
            .insert((run.date, run.scope), run.clone());
        Ok(())
    }

    async fn complete_finalizer_run(&self, run: &FinalizerRun) -> StoreResult<()> {
        self.start_finalizer_run(run).await
    }

    async fn finalizer_run_completed(
        &self,
        date: NaiveDate,
        scope: FinalizerScope,
    ) -> StoreResult<bool> {
        self.enter(None).await?;
        Ok(self
            .run(date, scope)
            .is_some_and(|run| run.completed_at.is_some()))
    }
}

#[derive(Default)]
pub struct MemoryLeaves {
    leaves: Mutex<Vec<LeaveRequest>>,
}

impl MemoryLeaves {
    pub fn add(&self, leave: LeaveRequest) {
        self.leaves.lock().unwrap().push(leave);
    }
}

#[async_trait]
impl LeaveOracle for MemoryLeaves {
    async fn active_approved_leave(
        &self,
        employee_id: u64,
        date: NaiveDate,
    ) -> StoreResult<Option<LeaveRequest>> {
        Ok(self
            .leaves
            .lock()
            .unwrap()
            .iter()
            .find(|leave| leave.employee_id == employee_id && leave.is_active_on(date))
            .cloned())
    }
}

#[derive(Default)]
pub struct MemoryDirectory {
    employees: Mutex<Vec<EmployeeShift>>,
}

impl MemoryDirectory {
    pub fn add(&self, employee_id: u64, shift_type: Option<&str>) {
        self.employees.lock().unwrap().push(EmployeeShift {
            employee_id,
            shift_type: shift_type.map(str::to_string),
        });
    }
}

#[async_trait]
impl EmployeeDirectory for MemoryDirectory {
    async fn active_employees(&self) -> StoreResult<Vec<EmployeeShift>> {
        Ok(self.employees.lock().unwrap().clone())
    }

    async fn shift_type(&self, employee_id: u64) -> StoreResult<Option<String>> {
        Ok(self
            .employees
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.employee_id == employee_id)
            .and_then(|e| e.shift_type.clone()))
    }
}
