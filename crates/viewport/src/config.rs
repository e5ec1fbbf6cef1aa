use std::path::Path;
use std::time::Duration;

use credentials::DEFAULT_CREDENTIAL_KEY;
use serde::{Deserialize, Serialize};

use crate::engine::{Control, EnvironmentSettings};

pub const DEFAULT_TRANSITION_MS: u64 = 1500;
pub const DEFAULT_LOAD_TIMEOUT_MS: u64 = 15_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read navigator config: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed navigator config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Navigator settings. Every field has a default, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigatorConfig {
    /// Render surface (container id) the engine attaches to.
    pub surface: String,
    /// Key the access token is persisted under.
    pub credential_key: String,
    pub transition_ms: u64,
    pub load_timeout_ms: u64,
    pub controls: Vec<Control>,
    pub environment: EnvironmentSettings,
    pub marker_color: String,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            surface: "poi-globe".to_string(),
            credential_key: DEFAULT_CREDENTIAL_KEY.to_string(),
            transition_ms: DEFAULT_TRANSITION_MS,
            load_timeout_ms: DEFAULT_LOAD_TIMEOUT_MS,
            controls: vec![Control::Navigation, Control::Fullscreen],
            environment: EnvironmentSettings::default(),
            marker_color: "#00ff8c".to_string(),
        }
    }
}

impl NavigatorConfig {
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Fly-to duration; a zero setting falls back to the default.
    pub fn transition_duration(&self) -> Duration {
        match self.transition_ms {
            0 => Duration::from_millis(DEFAULT_TRANSITION_MS),
            ms => Duration::from_millis(ms),
        }
    }

    pub fn load_timeout(&self) -> Duration {
        match self.load_timeout_ms {
            0 => Duration::from_millis(DEFAULT_LOAD_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NavigatorConfig;
    use crate::engine::Control;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(NavigatorConfig::from_json("{}").unwrap(), NavigatorConfig::default());
    }

    #[test]
    fn partial_document_overrides_fields() {
        let cfg = NavigatorConfig::from_json(
            r#"{"transitionMs": 2000, "controls": ["navigation", "scale"],
                "environment": {"atmosphereAltitude": 0.3}}"#,
        )
        .unwrap();
        assert_eq!(cfg.transition_duration(), Duration::from_millis(2000));
        assert_eq!(cfg.controls, vec![Control::Navigation, Control::Scale]);
        assert_eq!(cfg.environment.atmosphere_altitude, 0.3);
        assert_eq!(cfg.environment.background_color, "rgba(5, 5, 35, 1)");
    }

    #[test]
    fn zero_durations_fall_back_to_defaults() {
        let cfg = NavigatorConfig {
            transition_ms: 0,
            load_timeout_ms: 0,
            ..NavigatorConfig::default()
        };
        assert_eq!(cfg.transition_duration(), Duration::from_millis(1500));
        assert_eq!(cfg.load_timeout(), Duration::from_secs(15));
    }

    #[test]
    fn unknown_control_is_rejected() {
        assert!(NavigatorConfig::from_json(r#"{"controls": ["compass"]}"#).is_err());
    }
}
