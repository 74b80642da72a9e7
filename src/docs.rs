use crate::api::attendance::{AttendanceView, FinalizeRequest, PunchRequest, PunchResponse};
use crate::model::attendance::{
    AttendanceFlags, AttendanceStatus, AttendanceSummary, AttendanceType, CompOffApproval,
    CompOffReward, DeviceInfo, GeoPoint, Penalty, PenaltyType, PunchType, Session, SessionType,
    TimelineEntry, VerificationMethod, WorkType,
};
use crate::model::finalizer_run::{FinalizerRun, FinalizerScope};
use crate::model::shift::ShiftProfile;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Site Attendance API",
        version = "1.0.0",
        description = r#"
## Attendance & Time Tracking

Punch-based clock-in/out for office, site and remote staff of a construction ERP.

### Key Features
- **Punches**
  - In / Out with Break and Lunch sub-sessions, geofenced for office and site work
- **Daily status**
  - Shift-aware late entry, early exit, half-day and comp-off rules
- **Daily finalizer**
  - Closes forgotten check-outs and records absences with payroll penalty flags

### Security
All endpoints require a **JWT Bearer** access token issued by the identity service.
The finalizer endpoint is limited to **Admin** and **System** callers.
"#,
    ),
    paths(
        crate::api::attendance::punch,
        crate::api::attendance::get_record,
        crate::api::attendance::finalize
    ),
    components(
        schemas(
            PunchRequest,
            PunchResponse,
            AttendanceView,
            FinalizeRequest,
            FinalizerRun,
            FinalizerScope,
            ShiftProfile,
            PunchType,
            AttendanceStatus,
            AttendanceType,
            WorkType,
            VerificationMethod,
            SessionType,
            PenaltyType,
            CompOffApproval,
            GeoPoint,
            DeviceInfo,
            TimelineEntry,
            Session,
            AttendanceSummary,
            AttendanceFlags,
            Penalty,
            CompOffReward
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "Attendance", description = "Punches, daily records and finalizer runs"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
