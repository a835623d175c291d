//! Backend connection settings

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default backend address
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5001";

/// Route table, relative to the base URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Routes {
    /// Provisioned instance listing
    pub instances: String,
    /// Tool list of one instance, keyed by the `instance` query parameter
    pub tools: String,
    /// Full tool record persistence
    pub add_tool: String,
    pub uninstall_tool: String,
    /// Streaming install job
    pub install_all: String,
    /// `{name}` is replaced by the percent-encoded scenario name
    pub scenario: String,
    pub save_scenario: String,
    pub save_industrial: String,
    pub tool_configs: String,
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            instances: "/api/openstack/instances".to_string(),
            tools: "/api/get_tools_for_instance".to_string(),
            add_tool: "/api/add_tool_to_instance".to_string(),
            uninstall_tool: "/api/uninstall_tool_from_instance".to_string(),
            install_all: "/api/install_tools".to_string(),
            scenario: "/api/get_scenario/{name}".to_string(),
            save_scenario: "/api/create_scenario".to_string(),
            save_industrial: "/api/save_industrial_scenario".to_string(),
            tool_configs: "/api/read_tools_configs".to_string(),
        }
    }
}

impl Routes {
    /// Scenario route for a given name, encoded as a single path segment
    #[must_use]
    pub fn scenario_for(&self, name: &str) -> String {
        self.scenario.replace("{name}", &urlencoding::encode(name))
    }
}

/// How to reach the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    /// Scheme, host and port; routes are appended to it
    pub base_url: String,
    /// Timeout for each request/response route in whole seconds; unset means
    /// calls may wait indefinitely. The streaming install is never timed.
    pub timeout_secs: Option<u64>,
    /// Route table
    pub routes: Routes,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: None,
            routes: Routes::default(),
        }
    }
}

impl BackendSettings {
    /// Settings for a base URL with default routes
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// With a request timeout, rounded up to whole seconds
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self.timeout_secs = Some(secs.max(1));
        self
    }

    /// Request timeout; never shorter than one second
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(|secs| Duration::from_secs(secs.max(1)))
    }

    /// Absolute URL for a route
    #[must_use]
    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_without_double_slash() {
        let settings = BackendSettings::new("http://range.local/");
        assert_eq!(
            settings.url(&settings.routes.scenario_for("file")),
            "http://range.local/api/get_scenario/file"
        );
    }

    #[test]
    fn no_timeout_by_default() {
        assert!(BackendSettings::default().timeout().is_none());
    }

    #[test]
    fn sub_second_timeouts_round_up() {
        let settings = BackendSettings::default().with_timeout(Duration::from_millis(250));
        assert_eq!(settings.timeout(), Some(Duration::from_secs(1)));

        let settings = BackendSettings::default().with_timeout(Duration::from_millis(1500));
        assert_eq!(settings.timeout(), Some(Duration::from_secs(2)));

        let settings = BackendSettings::default().with_timeout(Duration::ZERO);
        assert_eq!(settings.timeout(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn zero_seconds_from_config_is_clamped() {
        let settings = BackendSettings {
            timeout_secs: Some(0),
            ..BackendSettings::default()
        };
        assert_eq!(settings.timeout(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn scenario_name_is_one_encoded_segment() {
        let routes = Routes::default();
        assert_eq!(
            routes.scenario_for("lab 2/ics?draft"),
            "/api/get_scenario/lab%202%2Fics%3Fdraft"
        );
        assert_eq!(routes.scenario_for("file"), "/api/get_scenario/file");
    }
}
