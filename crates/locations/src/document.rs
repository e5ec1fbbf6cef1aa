use serde::{Deserialize, Serialize};

pub const DOCUMENT_VERSION: &str = "1.0";

/// Default marker lift above the globe surface, in globe radii.
pub const DEFAULT_ANCHOR_ALTITUDE: f64 = 0.05;

/// Default duration of the camera move that frames the initial view.
pub const DEFAULT_INITIAL_VIEW_MS: u64 = 2000;

/// On-disk shape of the static location configuration.
///
/// Numeric fields are kept raw here; [`crate::LocationRegistry`] validates each
/// entry so errors can name the offending location by index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationDocument {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_view: Option<RawView>,
    pub locations: Vec<RawLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawLocation {
    pub name: String,
    pub coordinates: RawCoordinates,
    #[serde(default)]
    pub description: String,
    pub camera_params: RawCameraParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_altitude: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RawCoordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RawCameraParams {
    pub zoom: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub bearing: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawView {
    pub coordinates: RawCoordinates,
    pub camera_params: RawCameraParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}
