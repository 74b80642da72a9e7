use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use tokio::sync::watch;
use tracing::{error, info};

use crate::attendance::finalizer::DailyFinalizer;
use crate::model::finalizer_run::FinalizerScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizerSchedule {
    /// Local time the day pass runs for the previous date.
    pub day_pass_at: NaiveTime,
    /// Local time the night pass runs for the previous date's night shifts.
    pub night_pass_at: NaiveTime,
}

impl FinalizerSchedule {
    fn pass_at(&self, scope: FinalizerScope) -> NaiveTime {
        match scope {
            FinalizerScope::DayShift => self.day_pass_at,
            FinalizerScope::NightShift => self.night_pass_at,
        }
    }
}

/// First instant strictly after `now` whose wall time is `at`.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Date a pass at `fired_at` finalizes.
fn target_date(fired_at: NaiveDateTime) -> NaiveDate {
    fired_at.date().pred_opt().unwrap_or(fired_at.date())
}

/// Spawns both passes. They stop when `shutdown` flips to `true`.
pub fn spawn(
    finalizer: DailyFinalizer,
    schedule: FinalizerSchedule,
    shutdown: watch::Receiver<bool>,
) {
    for scope in [FinalizerScope::DayShift, FinalizerScope::NightShift] {
        let finalizer = finalizer.clone();
        let shutdown = shutdown.clone();
        actix_web::rt::spawn(async move {
            run_pass(finalizer, scope, schedule.pass_at(scope), shutdown).await;
        });
    }
}

async fn run_pass(
    finalizer: DailyFinalizer,
    scope: FinalizerScope,
    at: NaiveTime,
    mut shutdown: watch::Receiver<bool>,
) {
    catch_up(&finalizer, scope, at, &shutdown).await;

    loop {
        let now = Local::now().naive_local();
        let next = next_run_after(now, at);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(scope = %scope, next_run = %next, "Finalizer pass scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                info!(scope = %scope, "Finalizer pass stopping");
                return;
            }
        }
        if *shutdown.borrow() {
            return;
        }

        let fired_at = Local::now().naive_local();
        fire(&finalizer, scope, target_date(fired_at), fired_at, &shutdown).await;
    }
}

/// Runs yesterday's pass at startup when its slot has gone by without a completed run.
async fn catch_up(
    finalizer: &DailyFinalizer,
    scope: FinalizerScope,
    at: NaiveTime,
    shutdown: &watch::Receiver<bool>,
) {
    let now = Local::now().naive_local();
    if now.time() < at {
        return;
    }
    let date = target_date(now);

    match finalizer.already_completed(date, scope).await {
        Ok(true) => {}
        Ok(false) => {
            info!(scope = %scope, date = %date, "Catching up missed finalizer pass");
            fire(finalizer, scope, date, now, shutdown).await;
        }
        Err(e) => error!(error = %e, scope = %scope, date = %date, "Failed to check finalizer runs"),
    }
}

async fn fire(
    finalizer: &DailyFinalizer,
    scope: FinalizerScope,
    date: NaiveDate,
    now: NaiveDateTime,
    shutdown: &watch::Receiver<bool>,
) {
    if let Err(e) = finalizer.run(date, scope, now, shutdown.clone()).await {
        error!(error = %e, scope = %scope, date = %date, "Finalizer pass failed");
    }
}
