use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use foundation::{CameraParams, GeoError, LatLng};

use crate::document::{
    DEFAULT_ANCHOR_ALTITUDE, DEFAULT_INITIAL_VIEW_MS, DOCUMENT_VERSION, LocationDocument,
    RawCameraParams, RawCoordinates, RawLocation, RawView,
};

const BUILTIN_DOCUMENT: &str = include_str!("../data/locations.json");

/// A named point of interest with its camera framing. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: String,
    pub coordinates: LatLng,
    pub description: String,
    pub camera: CameraParams,
    /// Marker lift above the surface, in globe radii.
    pub anchor_altitude: f64,
}

/// Camera framing applied once when a viewport becomes ready.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialView {
    pub coordinates: LatLng,
    pub camera: CameraParams,
    pub duration: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed location document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported location document version {found:?} (expected {DOCUMENT_VERSION})")]
    UnsupportedVersion { found: String },
    #[error("location #{index} is invalid: {source}")]
    InvalidLocation {
        index: usize,
        #[source]
        source: GeoError,
    },
    #[error("location #{index} has an empty name")]
    EmptyName { index: usize },
    #[error("location name {name:?} appears more than once")]
    DuplicateName { name: String },
    #[error("initial view is invalid: {0}")]
    InvalidInitialView(#[source] GeoError),
}

/// Lookup of an index outside `0..count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("location index {index} out of range (count {count})")]
pub struct NotFound {
    pub index: i64,
    pub count: usize,
}

/// Ordered, immutable list of points of interest.
///
/// Cloning is cheap; every clone shares the same location list.
#[derive(Debug, Clone)]
pub struct LocationRegistry {
    locations: Arc<[Location]>,
    initial_view: Option<InitialView>,
}

impl LocationRegistry {
    /// The case-file locations embedded at build time.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_json(BUILTIN_DOCUMENT)
    }

    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let doc: LocationDocument = serde_json::from_str(raw)?;
        Self::from_document(doc)
    }

    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        let raw = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_document(doc: LocationDocument) -> Result<Self, RegistryError> {
        if doc.version != DOCUMENT_VERSION {
            return Err(RegistryError::UnsupportedVersion { found: doc.version });
        }

        let mut seen = BTreeSet::new();
        let mut locations = Vec::with_capacity(doc.locations.len());
        for (index, raw) in doc.locations.into_iter().enumerate() {
            let location = validate_location(index, raw)?;
            if !seen.insert(location.name.clone()) {
                return Err(RegistryError::DuplicateName {
                    name: location.name,
                });
            }
            locations.push(location);
        }

        let initial_view = doc
            .initial_view
            .map(validate_view)
            .transpose()
            .map_err(RegistryError::InvalidInitialView)?;

        Ok(Self {
            locations: locations.into(),
            initial_view,
        })
    }

    pub fn count(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Location, NotFound> {
        self.locations.get(index).ok_or(NotFound {
            index: i64::try_from(index).unwrap_or(i64::MAX),
            count: self.count(),
        })
    }

    /// Validates an untrusted index: valid iff `0 <= index < count()`.
    pub fn resolve(&self, index: i64) -> Result<usize, NotFound> {
        usize::try_from(index)
            .ok()
            .filter(|i| *i < self.count())
            .ok_or(NotFound {
                index,
                count: self.count(),
            })
    }

    pub fn all(&self) -> &[Location] {
        &self.locations
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.locations.iter().position(|l| l.name == name)
    }

    pub fn initial_view(&self) -> Option<InitialView> {
        self.initial_view
    }
}

fn lat_lng(raw: RawCoordinates) -> Result<LatLng, GeoError> {
    LatLng::new(raw.lat, raw.lng)
}

fn camera(raw: RawCameraParams) -> Result<CameraParams, GeoError> {
    CameraParams::new(raw.zoom, raw.pitch, raw.bearing)
}

fn validate_location(index: usize, raw: RawLocation) -> Result<Location, RegistryError> {
    let name = raw.name.trim().to_string();
    if name.is_empty() {
        return Err(RegistryError::EmptyName { index });
    }
    let invalid = |source| RegistryError::InvalidLocation { index, source };
    let anchor_altitude = raw.anchor_altitude.unwrap_or(DEFAULT_ANCHOR_ALTITUDE);
    if !anchor_altitude.is_finite() {
        return Err(invalid(GeoError::NonFinite("anchor altitude")));
    }
    Ok(Location {
        name,
        coordinates: lat_lng(raw.coordinates).map_err(invalid)?,
        description: raw.description,
        camera: camera(raw.camera_params).map_err(invalid)?,
        anchor_altitude: anchor_altitude.max(0.0),
    })
}

fn validate_view(raw: RawView) -> Result<InitialView, GeoError> {
    Ok(InitialView {
        coordinates: lat_lng(raw.coordinates)?,
        camera: camera(raw.camera_params)?,
        duration: Duration::from_millis(raw.duration_ms.unwrap_or(DEFAULT_INITIAL_VIEW_MS)),
    })
}
