use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};
use sqlx::MySqlPool;
use tracing::info;

use crate::model::holiday::HolidayEntry;
use crate::store::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDay {
    pub is_working: bool,
    pub reason: String,
}

impl WorkingDay {
    fn working() -> Self {
        Self {
            is_working: true,
            reason: "Working Day".to_string(),
        }
    }

    fn off(reason: impl Into<String>) -> Self {
        Self {
            is_working: false,
            reason: reason.into(),
        }
    }
}

/// Weekly-off pattern plus the company holiday table. Loaded once, read concurrently.
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    holidays: HashMap<NaiveDate, HolidayEntry>,
}

#[derive(sqlx::FromRow)]
struct HolidayRow {
    holiday_date: NaiveDate,
    name: String,
    holiday_type: String,
}

impl HolidayCalendar {
    pub fn new(entries: impl IntoIterator<Item = HolidayEntry>) -> Self {
        Self {
            holidays: entries.into_iter().map(|h| (h.date, h)).collect(),
        }
    }

    pub async fn load(pool: &MySqlPool) -> StoreResult<Self> {
        let rows = sqlx::query_as::<_, HolidayRow>(
            "SELECT holiday_date, name, holiday_type FROM holidays ORDER BY holiday_date",
        )
        .fetch_all(pool)
        .await?;

        let entries = rows
            .into_iter()
            .map(|row| {
                let holiday_type = row.holiday_type.parse().map_err(|_| {
                    StoreError::Corrupt(format!("unexpected holiday_type '{}'", row.holiday_type))
                })?;
                Ok(HolidayEntry {
                    date: row.holiday_date,
                    name: row.name,
                    holiday_type,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        info!(holidays = entries.len(), "Holiday calendar loaded");
        Ok(Self::new(entries))
    }

    pub fn is_working_day(&self, date: NaiveDate) -> WorkingDay {
        match date.weekday() {
            Weekday::Sun => return WorkingDay::off("Weekly Off"),
            Weekday::Sat => match saturday_of_month(date) {
                2 => return WorkingDay::off("2nd Saturday"),
                4 => return WorkingDay::off("4th Saturday"),
                _ => {}
            },
            _ => {}
        }

        match self.holidays.get(&date) {
            Some(holiday) => WorkingDay::off(holiday.name.clone()),
            None => WorkingDay::working(),
        }
    }
}

/// 1-based occurrence of this weekday within its month: ceil(day / 7).
fn saturday_of_month(date: NaiveDate) -> u32 {
    date.day().div_ceil(7)
}
