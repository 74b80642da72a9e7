use actix_web::{HttpResponse, Responder, error::ErrorForbidden, web};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::attendance::finalizer::DailyFinalizer;
use crate::attendance::service::{AttendanceService, PunchCommand, PunchReceipt};
use crate::auth::auth::AuthUser;
use crate::error::AttendanceError;
use crate::model::attendance::{
    AttendanceFlags, AttendanceRecord, AttendanceStatus, AttendanceSummary, AttendanceType,
    CompOffReward, DeviceInfo, GeoPoint, Penalty, PunchType, Session, TimelineEntry, WorkType,
};
use crate::model::finalizer_run::{FinalizerRun, FinalizerScope};
use crate::model::shift::ShiftProfile;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PunchRequest {
    pub punch_type: PunchType,
    #[schema(example = 23.8103)]
    pub latitude: Option<f64>,
    #[schema(example = 90.4125)]
    pub longitude: Option<f64>,
    /// Coordinates of the office or site being punched at, when known.
    pub site_latitude: Option<f64>,
    pub site_longitude: Option<f64>,
    pub attendance_type: AttendanceType,
    #[schema(example = "General")]
    pub shift_type: Option<String>,
    pub device: Option<DeviceInfo>,
    pub remark: Option<String>,
}

fn point(
    latitude: Option<f64>,
    longitude: Option<f64>,
    what: &str,
) -> Result<Option<GeoPoint>, AttendanceError> {
    match (latitude, longitude) {
        (Some(latitude), Some(longitude)) => Ok(Some(GeoPoint {
            latitude,
            longitude,
        })),
        (None, None) => Ok(None),
        _ => Err(AttendanceError::validation(format!(
            "{what} latitude and longitude must be sent together"
        ))),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PunchResponse {
    pub punch_type: PunchType,
    #[schema(value_type = String, example = "2026-03-02T09:10:00")]
    pub timestamp: NaiveDateTime,
    #[schema(value_type = String, format = "date", example = "2026-03-02")]
    pub work_date: NaiveDate,
    pub net_work_hours: f64,
    pub status: AttendanceStatus,
    pub is_late: bool,
}

impl From<PunchReceipt> for PunchResponse {
    fn from(receipt: PunchReceipt) -> Self {
        Self {
            punch_type: receipt.punch_type,
            timestamp: receipt.timestamp,
            work_date: receipt.work_date,
            net_work_hours: receipt.net_work_hours,
            status: receipt.status,
            is_late: receipt.is_late,
        }
    }
}

/// Stored record as served to clients; the remark is rendered to text.
#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceView {
    pub employee_id: u64,
    #[schema(value_type = String, format = "date", example = "2026-03-02")]
    pub date: NaiveDate,
    pub shift: ShiftProfile,
    pub attendance_type: Option<AttendanceType>,
    pub work_type: WorkType,
    pub leave_type: Option<String>,
    pub status: AttendanceStatus,
    #[schema(example = "Late Entry #1 | HR Regularization Required")]
    pub system_remark: Option<String>,
    pub summary: AttendanceSummary,
    pub flags: AttendanceFlags,
    pub penalty: Penalty,
    pub rewards: CompOffReward,
    pub timeline: Vec<TimelineEntry>,
    pub sessions: Vec<Session>,
    #[schema(value_type = Option<String>)]
    pub finalized_at: Option<NaiveDateTime>,
}

impl From<AttendanceRecord> for AttendanceView {
    fn from(record: AttendanceRecord) -> Self {
        Self {
            employee_id: record.employee_id,
            date: record.date,
            shift: record.shift,
            attendance_type: record.attendance_type,
            work_type: record.work_type,
            leave_type: record.leave_type,
            status: record.status,
            system_remark: record.system_remark.map(|r| r.to_string()),
            summary: record.summary,
            flags: record.flags,
            penalty: record.penalty,
            rewards: record.rewards,
            timeline: record.timeline,
            sessions: record.sessions,
            finalized_at: record.finalized_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FinalizeRequest {
    #[schema(value_type = String, format = "date", example = "2026-03-02")]
    pub date: NaiveDate,
    pub scope: FinalizerScope,
}

/// Punch endpoint. The server clock stamps the punch.
#[utoipa::path(
    post,
    path = "/api/attendance/punch",
    request_body(
        content = PunchRequest,
        description = "Punch event",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Punch recorded", body = PunchResponse),
        (status = 400, description = "Bad punch sequence or daily limit exceeded", body = Object, example = json!({
            "message": "Lunch limit exceeded (1 per day)",
            "error": "validation"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "No employee profile"),
        (status = 404, description = "No record for today", body = Object, example = json!({
            "message": "No attendance record for today, must check in first",
            "error": "not_found"
        })),
        (status = 409, description = "Concurrent punch won the race"),
        (status = 422, description = "Outside the site geofence"),
        (status = 503, description = "Store unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn punch(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    body: web::Json<PunchRequest>,
) -> actix_web::Result<impl Responder> {
    let employee_id: u64 = auth
        .employee_id
        .ok_or_else(|| ErrorForbidden("No employee profile"))?;
    let body = body.into_inner();

    let cmd = PunchCommand {
        employee_id,
        punch_type: body.punch_type,
        at: Local::now().naive_local(),
        location: point(body.latitude, body.longitude, "Punch")?,
        site: point(body.site_latitude, body.site_longitude, "Site")?,
        attendance_type: body.attendance_type,
        shift_type: body.shift_type,
        device: body.device,
        remark: body.remark,
    };

    let receipt = service.punch(cmd).await.map_err(|e| {
        if matches!(e, AttendanceError::System(_)) {
            error!(error = %e, employee_id, punch_type = %body.punch_type, "Punch failed");
        }
        e
    })?;

    Ok(HttpResponse::Ok().json(PunchResponse::from(receipt)))
}

/// One employee's record for one day
#[utoipa::path(
    get,
    path = "/api/attendance/{employee_id}/{date}",
    params(
        ("employee_id" = u64, Path, description = "Employee whose day is requested"),
        ("date" = String, Path, description = "Calendar date, YYYY-MM-DD")
    ),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceView),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "No record for that day")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn get_record(
    auth: AuthUser,
    service: web::Data<AttendanceService>,
    path: web::Path<(u64, NaiveDate)>,
) -> actix_web::Result<impl Responder> {
    let (employee_id, date) = path.into_inner();
    auth.require_self_or_reviewer(employee_id)?;

    let record = service.record(employee_id, date).await?;
    Ok(HttpResponse::Ok().json(AttendanceView::from(record)))
}

/// Runs a finalizer pass for an arbitrary date and waits for it
#[utoipa::path(
    post,
    path = "/api/attendance/finalize",
    request_body(
        content = FinalizeRequest,
        description = "Date and pass to run",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Run summary", body = FinalizerRun),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin/System only"),
        (status = 503, description = "Store unavailable")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn finalize(
    auth: AuthUser,
    finalizer: web::Data<DailyFinalizer>,
    shutdown: web::Data<watch::Receiver<bool>>,
    body: web::Json<FinalizeRequest>,
) -> actix_web::Result<impl Responder> {
    auth.require_finalizer()?;
    let FinalizeRequest { date, scope } = body.into_inner();

    info!(user_id = auth.user_id, username = %auth.username, date = %date, scope = %scope, "Finalizer pass requested");
    let run = finalizer
        .run(date, scope, Local::now().naive_local(), shutdown.get_ref().clone())
        .await
        .map_err(|e| {
            error!(error = %e, date = %date, scope = %scope, "Finalizer pass failed");
            e
        })?;

    Ok(HttpResponse::Ok().json(run))
}
