use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Named working-hours policy. Records keep a full copy of the profile that was
/// in force when they were opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "name": "General",
    "startTime": "09:00:00",
    "endTime": "18:00:00",
    "gracePeriodMinutes": 15,
    "minHalfDayHours": 4.0,
    "minFullDayHours": 7.0,
    "halfDayCutoff": "13:00:00",
    "isNightShift": false
}))]
pub struct ShiftProfile {
    pub name: String,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "18:00:00")]
    pub end_time: NaiveTime,
    pub grace_period_minutes: u32,
    pub min_half_day_hours: f64,
    pub min_full_day_hours: f64,
    #[schema(value_type = String, example = "13:00:00")]
    pub half_day_cutoff: NaiveTime,
    pub is_night_shift: bool,
}

impl ShiftProfile {
    pub fn starts_on(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.start_time)
    }

    /// End of the shift that starts on `date`; shifts crossing midnight end the next day.
    pub fn ends_on(&self, date: NaiveDate) -> NaiveDateTime {
        let end = date.and_time(self.end_time);
        if self.end_time <= self.start_time {
            end + Duration::days(1)
        } else {
            end
        }
    }

    /// Latest punch-in that still counts as on time.
    pub fn late_after(&self, date: NaiveDate) -> NaiveDateTime {
        self.starts_on(date) + Duration::minutes(i64::from(self.grace_period_minutes))
    }

    pub fn scheduled_hours(&self, date: NaiveDate) -> f64 {
        (self.ends_on(date) - self.starts_on(date)).num_minutes() as f64 / 60.0
    }
}
