//! Session configuration
//!
//! Loaded from TOML, then overridden by the environment and CLI flags:
//!
//! ```toml
//! [backend]
//! base_url = "http://10.0.0.2:5001"
//! timeout_secs = 30
//!
//! [layout]
//! spacing = 180.0
//! ```

use crate::error::RangeError;
use range_backend::BackendSettings;
use range_model::Position;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable overriding the backend base URL
pub const ENV_BACKEND_URL: &str = "RANGE_BACKEND_URL";

/// Scenario names and references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Scenario loaded and saved by default
    pub default_name: String,
    /// Name the industrial overlay is saved under
    pub industrial_name: String,
    /// Base scenario the industrial overlay points at
    pub base_reference: String,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            default_name: "file".to_string(),
            industrial_name: "industrial_file".to_string(),
            base_reference: "scenario/scenario_file.json".to_string(),
        }
    }
}

/// Synthetic layout used when a source carries no positions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub origin_x: f64,
    pub origin_y: f64,
    /// Horizontal distance between consecutive instances
    pub spacing: f64,
    /// Offset of an industrial component from its base, on both axes
    pub industrial_offset: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin_x: 200.0,
            origin_y: 150.0,
            spacing: 200.0,
            industrial_offset: 120.0,
        }
    }
}

impl LayoutConfig {
    /// Position of the `index`-th instance on the single row
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn row_position(&self, index: usize) -> Position {
        Position::new(self.origin_x + index as f64 * self.spacing, self.origin_y)
    }
}

/// Streaming record format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Prefix that marks a record worth showing
    pub marker: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            marker: "data:".to_string(),
        }
    }
}

/// Complete session configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RangeConfig {
    pub backend: BackendSettings,
    pub scenario: ScenarioConfig,
    pub layout: LayoutConfig,
    pub stream: StreamConfig,
}

impl RangeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML; absent keys keep their defaults
    ///
    /// # Errors
    /// `RangeError::Config` on invalid TOML or values
    pub fn from_toml_str(text: &str) -> Result<Self, RangeError> {
        let config: Self =
            toml::from_str(text).map_err(|e| RangeError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// `RangeError::Config` if the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RangeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| RangeError::Config(format!("cannot read {}: {e}", path.display())))?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// With backend base URL
    #[inline]
    #[must_use]
    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend.base_url = url.into();
        self
    }

    /// With backend settings
    #[inline]
    #[must_use]
    pub fn with_backend(mut self, backend: BackendSettings) -> Self {
        self.backend = backend;
        self
    }

    /// With layout
    #[inline]
    #[must_use]
    pub fn with_layout(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// With record marker
    #[inline]
    #[must_use]
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.stream.marker = marker.into();
        self
    }

    /// Apply `RANGE_BACKEND_URL` if set and non-empty
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        match std::env::var(ENV_BACKEND_URL) {
            Ok(url) if !url.trim().is_empty() => self.with_backend_url(url.trim()),
            _ => self,
        }
    }

    /// Check values that would make the session unusable
    ///
    /// # Errors
    /// `RangeError::Config` naming the offending key
    pub fn validate(&self) -> Result<(), RangeError> {
        if self.backend.base_url.trim().is_empty() {
            return Err(RangeError::Config("backend.base_url is empty".to_string()));
        }
        if self.stream.marker.is_empty() {
            return Err(RangeError::Config("stream.marker is empty".to_string()));
        }
        if !self.layout.spacing.is_finite() || self.layout.spacing <= 0.0 {
            return Err(RangeError::Config("layout.spacing must be positive".to_string()));
        }
        if self.backend.timeout_secs == Some(0) {
            return Err(RangeError::Config("backend.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}
