//! Scenario aggregate
//!
//! A scenario is always loaded and saved whole; there is no merge or delta form.

use crate::edge::Edge;
use crate::instance::Instance;
use serde::{Deserialize, Serialize};

/// Named aggregate of every instance and edge in an editing session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Reference to the scenario an industrial overlay was built on
    #[serde(default)]
    pub base_scenario: Option<String>,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Scenario {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// With contents
    #[must_use]
    pub fn with_contents(mut self, instances: Vec<Instance>, edges: Vec<Edge>) -> Self {
        self.instances = instances;
        self.edges = edges;
        self
    }

    /// With base scenario reference
    #[must_use]
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base_scenario = Some(base.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Industrial components in this scenario
    pub fn industrial(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter().filter(|i| i.is_industrial())
    }
}
