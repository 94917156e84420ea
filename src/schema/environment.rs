//! World descriptions loaded from named JSON files.
//!
//! An environment is described independently of the physics backend: it
//! carries a gravity vector plus any additional properties, which are kept
//! opaquely so that backends can pick up what they understand.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use super::ConfigError;

fn default_gravity() -> [f64; 3] {
    [0.0, -9.81, 0.0]
}

/// Named world properties applied on every episode reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentProps {
    /// Gravity acceleration in m/s^2.
    #[serde(default = "default_gravity")]
    pub gravity: [f64; 3],
    /// Extra properties passed through to the backend untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for EnvironmentProps {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            extra: BTreeMap::new(),
        }
    }
}

impl EnvironmentProps {
    /// Earth-like world.
    pub fn earth() -> Self {
        Self::default()
    }

    pub fn moon() -> Self {
        Self::with_gravity([0.0, -1.62, 0.0])
    }

    pub fn mars() -> Self {
        Self::with_gravity([0.0, -3.72, 0.0])
    }

    pub fn with_gravity(gravity: [f64; 3]) -> Self {
        Self {
            gravity,
            extra: BTreeMap::new(),
        }
    }

    /// Look up one of the built-in presets (`default`, `moon`, `mars`).
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "default" | "earth" => Some(Self::earth()),
            "moon" => Some(Self::moon()),
            "mars" => Some(Self::mars()),
            _ => None,
        }
    }

    /// Load `<dir>/<name>.json`.
    pub fn load(dir: impl AsRef<Path>, name: &str) -> Result<Self, ConfigError> {
        let path = dir.as_ref().join(format!("{name}.json"));
        let contents = fs::read_to_string(&path).map_err(|source| {
            log::error!("Environment \"{}\" not found at {}", name, path.display());
            ConfigError::Io {
                name: name.to_string(),
                source,
            }
        })?;
        let props = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            name: name.to_string(),
            source,
        })?;
        log::debug!("Environment \"{}\" loaded", name);
        Ok(props)
    }

    /// Load from `dir` when the file exists, otherwise fall back to a preset.
    pub fn load_or_preset(dir: impl AsRef<Path>, name: &str) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        if dir.join(format!("{name}.json")).exists() {
            return Self::load(dir, name);
        }
        match Self::preset(name) {
            Some(props) => Ok(props),
            None => Self::load(dir, name),
        }
    }

    #[inline]
    pub fn gravity_vector(&self) -> Vector3<f64> {
        Vector3::from(self.gravity)
    }
}
