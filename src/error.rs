use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Failure taxonomy shared by the punch path and the finalizer.
#[derive(Debug, Error)]
pub enum AttendanceError {
    /// Bad punch sequence or a daily cap was hit. Not retryable.
    #[error("{0}")]
    Validation(String),

    #[error("Location out of range: {distance_meters:.0} m from site (limit {limit_meters:.0} m)")]
    Location {
        distance_meters: f64,
        limit_meters: f64,
    },

    #[error("{0}")]
    NotFound(String),

    /// Lost a create or update race; the caller should retry against the stored record.
    #[error("{0}")]
    Conflict(String),

    #[error("System error: {0}")]
    System(String),
}

impl AttendanceError {
    pub fn validation(message: impl Into<String>) -> Self {
        AttendanceError::Validation(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AttendanceError::Validation(_) => "validation",
            AttendanceError::Location { .. } => "location",
            AttendanceError::NotFound(_) => "not_found",
            AttendanceError::Conflict(_) => "conflict",
            AttendanceError::System(_) => "system",
        }
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::Validation(_) => StatusCode::BAD_REQUEST,
            AttendanceError::Location { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::NotFound(_) => StatusCode::NOT_FOUND,
            AttendanceError::Conflict(_) => StatusCode::CONFLICT,
            AttendanceError::System(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "message": self.to_string(),
            "error": self.kind(),
        });
        if let AttendanceError::Location {
            distance_meters, ..
        } = self
        {
            body["distance_meters"] = json!(distance_meters.round());
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}
