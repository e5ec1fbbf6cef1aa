//! Capability boundary to the external 3D viewport engine.
//!
//! The engine is a black box: the navigator only needs to construct one
//! against a surface, attach controls and atmosphere, wait for its resources,
//! place markers with popups, and issue camera moves.

use std::time::Duration;

use async_trait::async_trait;
use foundation::math::Ecef;
use foundation::{CameraParams, LatLng};
use serde::{Deserialize, Serialize};

/// Engine-assigned marker identifier, unique within one engine instance.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarkerId(pub u64);

impl std::fmt::Display for MarkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "marker#{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Control {
    Navigation,
    Fullscreen,
    Scale,
}

/// Atmosphere and backdrop of the globe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnvironmentSettings {
    pub background_color: String,
    pub atmosphere_color: String,
    /// Atmosphere shell thickness, in globe radii.
    pub atmosphere_altitude: f64,
    pub imagery_url: String,
    pub star_intensity: f64,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            background_color: "rgba(5, 5, 35, 1)".to_string(),
            atmosphere_color: "rgba(65, 119, 134, 0.7)".to_string(),
            atmosphere_altitude: 0.15,
            imagery_url:
                "https://raw.githubusercontent.com/vasturiano/three-globe/master/example/img/earth-night.jpg"
                    .to_string(),
            star_intensity: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PopupContent {
    pub title: String,
    pub body: String,
}

/// Everything the engine needs to draw one location marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub position: LatLng,
    /// World-space anchor of the marker glyph.
    pub anchor: Ecef,
    pub color: String,
    pub popup: PopupContent,
}

/// A timed camera move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraCommand {
    pub center: LatLng,
    pub camera: CameraParams,
    pub duration: Duration,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    /// The imagery/tile service refused the credential.
    Unauthorized,
    /// The engine or its backend could not be reached; worth retrying.
    Unreachable,
}

impl std::fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineErrorKind::Unauthorized => f.write_str("unauthorized"),
            EngineErrorKind::Unreachable => f.write_str("unreachable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("viewport engine {kind}: {message}")]
pub struct EngineError {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::Unauthorized,
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            kind: EngineErrorKind::Unreachable,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == EngineErrorKind::Unauthorized
    }
}

/// Constructs engine instances bound to a credential and a render surface.
#[async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(
        &self,
        token: &str,
        surface: &str,
    ) -> Result<Box<dyn ViewportEngine>, EngineError>;
}

/// One live engine instance.
///
/// Only `wait_until_loaded` suspends; every other call is a synchronous
/// command against the running instance.
#[async_trait]
pub trait ViewportEngine: Send {
    fn add_control(&mut self, control: Control) -> Result<(), EngineError>;

    fn set_environment(&mut self, environment: &EnvironmentSettings) -> Result<(), EngineError>;

    /// Resolves once style and imagery resources are loaded.
    async fn wait_until_loaded(&mut self) -> Result<(), EngineError>;

    fn add_marker(&mut self, marker: &MarkerSpec) -> Result<MarkerId, EngineError>;

    fn set_popup(&mut self, marker: MarkerId, open: bool) -> Result<(), EngineError>;

    fn fly_to(&mut self, command: &CameraCommand) -> Result<(), EngineError>;

    /// Releases the instance. Must be safe to call more than once.
    fn teardown(&mut self);
}
