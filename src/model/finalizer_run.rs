use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Which shifts a finalizer pass is responsible for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
pub enum FinalizerScope {
    DayShift,
    NightShift,
}

impl FinalizerScope {
    pub fn covers(self, is_night_shift: bool) -> bool {
        match self {
            FinalizerScope::DayShift => !is_night_shift,
            FinalizerScope::NightShift => is_night_shift,
        }
    }
}

/// One pass of the finalizer, keyed by (date, scope).
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FinalizerRun {
    pub run_id: String,
    pub date: NaiveDate,
    pub scope: FinalizerScope,
    pub started_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub created: u32,
    pub auto_closed: u32,
    pub sealed: u32,
    pub skipped: u32,
    pub failed: u32,
    pub cancelled: bool,
}

impl FinalizerRun {
    pub fn start(date: NaiveDate, scope: FinalizerScope, started_at: NaiveDateTime) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            date,
            scope,
            started_at,
            completed_at: None,
            created: 0,
            auto_closed: 0,
            sealed: 0,
            skipped: 0,
            failed: 0,
            cancelled: false,
        }
    }

    pub fn processed(&self) -> u32 {
        self.created + self.auto_closed + self.sealed + self.skipped
    }
}
