use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceType, GeoPoint, VerificationMethod};

const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

pub const DEFAULT_RADIUS_METERS: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceCheck {
    pub verification: VerificationMethod,
    pub distance_meters: Option<f64>,
}

/// Great-circle distance (haversine).
pub fn distance_meters(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let (lat1, lat2) = (from.latitude.to_radians(), to.latitude.to_radians());
    let d_lat = lat2 - lat1;
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Office and Site punches with known site coordinates must land inside the radius.
pub fn verify(
    attendance_type: AttendanceType,
    reported: &GeoPoint,
    site: Option<&GeoPoint>,
    radius_meters: f64,
) -> Result<GeofenceCheck, AttendanceError> {
    let site = match site {
        Some(site) if attendance_type.is_geofenced() => site,
        _ => {
            return Ok(GeofenceCheck {
                verification: VerificationMethod::Manual,
                distance_meters: None,
            });
        }
    };

    let distance = distance_meters(reported, site);
    if distance > radius_meters {
        return Err(AttendanceError::Location {
            distance_meters: distance,
            limit_meters: radius_meters,
        });
    }

    Ok(GeofenceCheck {
        verification: VerificationMethod::Geofence,
        distance_meters: Some(distance),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(latitude: f64, longitude: f64) -> GeoPoint {
        GeoPoint {
            latitude,
            longitude,
        }
    }

    #[test]
    fn one_hundredth_degree_of_latitude_is_about_1112_meters() {
        let d = distance_meters(&point(23.81, 90.41), &point(23.82, 90.41));
        assert!((d - 1111.95).abs() < 1.0, "got {d}");
    }

    #[test]
    fn site_punch_inside_radius_is_geofence_verified() {
        let site = point(23.8103, 90.4125);
        let check = verify(
            AttendanceType::Site,
            &point(23.8110, 90.4125),
            Some(&site),
            DEFAULT_RADIUS_METERS,
        )
        .unwrap();

        assert_eq!(check.verification, VerificationMethod::Geofence);
        assert!(check.distance_meters.unwrap() < 100.0);
    }

    #[test]
    fn office_punch_outside_radius_reports_distance() {
        let site = point(23.8103, 90.4125);
        let err = verify(
            AttendanceType::Office,
            &point(23.8300, 90.4125),
            Some(&site),
            DEFAULT_RADIUS_METERS,
        )
        .unwrap_err();

        match err {
            AttendanceError::Location {
                distance_meters, ..
            } => assert!(distance_meters > 2000.0),
            other => panic!("expected location error, got {other:?}"),
        }
    }

    #[test]
    fn remote_or_unknown_site_is_manual() {
        let far = point(0.0, 0.0);
        let site = point(23.8103, 90.4125);

        let remote = verify(AttendanceType::Remote, &far, Some(&site), 1000.0).unwrap();
        let no_site = verify(AttendanceType::Site, &far, None, 1000.0).unwrap();

        assert_eq!(remote.verification, VerificationMethod::Manual);
        assert_eq!(no_site.verification, VerificationMethod::Manual);
        assert_eq!(no_site.distance_meters, None);
    }
}
