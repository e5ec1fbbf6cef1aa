//! Validated geographic coordinates and camera framing.
//!
//! Both types validate on construction and on deserialization, so any value
//! that exists satisfies its range invariants.

use serde::{Deserialize, Serialize};

/// Steepest pitch (degrees) a globe camera can tilt away from straight down.
pub const MAX_PITCH_DEG: f64 = 85.0;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeoError {
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("zoom {0} must be >= 0")]
    NegativeZoom(f64),
    #[error("pitch {0} outside [0, {MAX_PITCH_DEG}]")]
    PitchOutOfRange(f64),
    #[error("non-finite {0} value")]
    NonFinite(&'static str),
}

/// A point on the globe in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLatLng")]
pub struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawLatLng {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawLatLng> for LatLng {
    type Error = GeoError;

    fn try_from(raw: RawLatLng) -> Result<Self, Self::Error> {
        LatLng::new(raw.lat, raw.lng)
    }
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() {
            return Err(GeoError::NonFinite("latitude"));
        }
        if !lng.is_finite() {
            return Err(GeoError::NonFinite("longitude"));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::LatitudeOutOfRange(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(GeoError::LongitudeOutOfRange(lng));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lng)
    }
}

/// Camera framing used when flying to a location.
///
/// - `zoom`: map zoom level, `>= 0`.
/// - `pitch`: tilt in degrees away from nadir, `[0, MAX_PITCH_DEG]`.
/// - `bearing`: heading in degrees, normalized into `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCameraParams")]
pub struct CameraParams {
    zoom: f64,
    pitch: f64,
    bearing: f64,
}

#[derive(Deserialize)]
struct RawCameraParams {
    zoom: f64,
    #[serde(default)]
    pitch: f64,
    #[serde(default)]
    bearing: f64,
}

impl TryFrom<RawCameraParams> for CameraParams {
    type Error = GeoError;

    fn try_from(raw: RawCameraParams) -> Result<Self, Self::Error> {
        CameraParams::new(raw.zoom, raw.pitch, raw.bearing)
    }
}

impl CameraParams {
    pub fn new(zoom: f64, pitch: f64, bearing: f64) -> Result<Self, GeoError> {
        if !zoom.is_finite() {
            return Err(GeoError::NonFinite("zoom"));
        }
        if !pitch.is_finite() {
            return Err(GeoError::NonFinite("pitch"));
        }
        if !bearing.is_finite() {
            return Err(GeoError::NonFinite("bearing"));
        }
        if zoom < 0.0 {
            return Err(GeoError::NegativeZoom(zoom));
        }
        if !(0.0..=MAX_PITCH_DEG).contains(&pitch) {
            return Err(GeoError::PitchOutOfRange(pitch));
        }
        Ok(Self {
            zoom,
            pitch,
            bearing: bearing.rem_euclid(360.0),
        })
    }

    /// Straight-down framing at `zoom`.
    pub fn top_down(zoom: f64) -> Result<Self, GeoError> {
        Self::new(zoom, 0.0, 0.0)
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn bearing(&self) -> f64 {
        self.bearing
    }
}

#[cfg(test)]
mod tests {
    use super::{CameraParams, GeoError, LatLng};

    #[test]
    fn lat_lng_accepts_bounds() {
        assert!(LatLng::new(90.0, 180.0).is_ok());
        assert!(LatLng::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn lat_lng_rejects_out_of_range() {
        assert_eq!(
            LatLng::new(90.5, 0.0),
            Err(GeoError::LatitudeOutOfRange(90.5))
        );
        assert_eq!(
            LatLng::new(0.0, -180.1),
            Err(GeoError::LongitudeOutOfRange(-180.1))
        );
        assert_eq!(
            LatLng::new(f64::NAN, 0.0),
            Err(GeoError::NonFinite("latitude"))
        );
    }

    #[test]
    fn lat_lng_deserialize_validates() {
        let ok: LatLng = serde_json::from_str(r#"{"lat": 32.78, "lng": -96.8}"#).unwrap();
        assert_eq!(ok.lat(), 32.78);
        let bad = serde_json::from_str::<LatLng>(r#"{"lat": 132.0, "lng": 0.0}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn camera_params_normalize_bearing() {
        let c = CameraParams::new(12.0, 45.0, -90.0).unwrap();
        assert_eq!(c.bearing(), 270.0);
        let c = CameraParams::new(12.0, 45.0, 720.0).unwrap();
        assert_eq!(c.bearing(), 0.0);
    }

    #[test]
    fn camera_params_reject_negative_zoom_and_steep_pitch() {
        assert_eq!(
            CameraParams::new(-1.0, 0.0, 0.0),
            Err(GeoError::NegativeZoom(-1.0))
        );
        assert_eq!(
            CameraParams::new(3.0, 90.0, 0.0),
            Err(GeoError::PitchOutOfRange(90.0))
        );
    }

    #[test]
    fn camera_params_pitch_and_bearing_default_to_zero() {
        let c: CameraParams = serde_json::from_str(r#"{"zoom": 4}"#).unwrap();
        assert_eq!(c, CameraParams::top_down(4.0).unwrap());
    }
}
