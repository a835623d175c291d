//! Instance records
//!
//! An `Instance` is a graph node: one provisioned virtual machine (or an
//! industrial component attached to one). The `tools` list is an optimistic
//! cache of what the backend has on record, never the authority.

use crate::error::ModelError;
use crate::ids::InstanceId;
use crate::role::{derive_role, Role};
use serde::{Deserialize, Serialize};

/// Displayed when an instance has no address at all
pub const UNKNOWN_IP: &str = "unknown";

/// Network addresses of an instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    /// Address on the private network
    pub ip_private: Option<String>,
    /// Floating (public) address
    pub ip_floating: Option<String>,
}

impl Network {
    /// Create from optional addresses; empty strings count as absent
    #[must_use]
    pub fn new(ip_private: Option<String>, ip_floating: Option<String>) -> Self {
        Self {
            ip_private: ip_private.filter(|ip| !ip.is_empty()),
            ip_floating: ip_floating.filter(|ip| !ip.is_empty()),
        }
    }

    /// Floating if present, else private, else `"unknown"`
    #[must_use]
    pub fn ip(&self) -> &str {
        self.ip_floating
            .as_deref()
            .or(self.ip_private.as_deref())
            .unwrap_or(UNKNOWN_IP)
    }
}

/// Provisioning details reported by the infrastructure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provisioning {
    /// Image name
    pub image: Option<String>,
    /// Flavor name
    pub flavor: Option<String>,
    /// Server status (ACTIVE, SHUTOFF, ...)
    pub status: Option<String>,
}

/// Layout coordinate; display only
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[inline]
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Shift by the same offset on both axes
    #[inline]
    #[must_use]
    pub fn offset(self, delta: f64) -> Self {
        Self::new(self.x + delta, self.y + delta)
    }
}

/// Graph node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: InstanceId,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub network: Network,
    #[serde(default)]
    pub provisioning: Provisioning,
    /// Tool names on record, in install order
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    pub position: Option<Position>,
    /// Base instance this industrial component is attached to
    #[serde(default)]
    pub linked_to: Option<InstanceId>,
}

impl Instance {
    /// Create an instance with an explicit role
    #[must_use]
    pub fn new(id: impl Into<InstanceId>, name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role,
            network: Network::default(),
            provisioning: Provisioning::default(),
            tools: Vec::new(),
            position: None,
            linked_to: None,
        }
    }

    /// Create an instance whose role is derived from its name
    #[must_use]
    pub fn from_name(id: impl Into<InstanceId>, name: impl Into<String>) -> Self {
        let name = name.into();
        let role = derive_role(&name);
        Self::new(id, name, role)
    }

    /// With network addresses
    #[must_use]
    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    /// With provisioning details
    #[must_use]
    pub fn with_provisioning(mut self, provisioning: Provisioning) -> Self {
        self.provisioning = provisioning;
        self
    }

    /// With layout position
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// With tool list (duplicates dropped, order kept)
    #[must_use]
    pub fn with_tools<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.clear();
        for tool in tools {
            self.add_tool(tool);
        }
        self
    }

    /// With base link
    #[must_use]
    pub fn with_link(mut self, base: InstanceId) -> Self {
        self.linked_to = Some(base);
        self
    }

    /// Derived display address
    #[inline]
    #[must_use]
    pub fn ip(&self) -> &str {
        self.network.ip()
    }

    /// Key used for backend lookups: the name, or the id if unnamed
    #[must_use]
    pub fn lookup_key(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }

    #[inline]
    #[must_use]
    pub fn is_base(&self) -> bool {
        self.role.is_base()
    }

    #[inline]
    #[must_use]
    pub fn is_industrial(&self) -> bool {
        self.role.is_industrial()
    }

    /// Check whether a tool is on record
    #[must_use]
    pub fn has_tool(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }

    /// Append a tool unless already present
    ///
    /// Returns `true` if the list changed.
    pub fn add_tool(&mut self, tool: impl Into<String>) -> bool {
        let tool = tool.into();
        if self.has_tool(&tool) {
            return false;
        }
        self.tools.push(tool);
        true
    }

    /// Remove every occurrence of a tool
    ///
    /// Returns `true` if the list changed.
    pub fn remove_tool(&mut self, tool: &str) -> bool {
        let before = self.tools.len();
        self.tools.retain(|t| t != tool);
        self.tools.len() != before
    }

    /// Identity and link rules
    ///
    /// # Errors
    /// - `MissingIdentity` when both id and name are empty
    /// - `MissingLink` for an industrial instance without `linked_to`
    /// - `UnexpectedLink` for a non-industrial instance with `linked_to`
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.id.is_empty() && self.name.is_empty() {
            return Err(ModelError::MissingIdentity);
        }
        match (&self.role, &self.linked_to) {
            (Role::Industrial(_), None) => Err(ModelError::MissingLink(self.id.to_string())),
            (role, Some(_)) if !role.is_industrial() => {
                Err(ModelError::UnexpectedLink(self.id.to_string()))
            }
            _ => Ok(()),
        }
    }
}
