//! Instance roles and name-based classification
//!
//! Instances listed by the infrastructure carry no structured role, so the
//! role is derived from the instance name. Classification lives behind the
//! `RoleClassifier` trait so a structured role from the backend can replace
//! the heuristic without touching callers.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire prefix for industrial roles (`industrial_plc`)
const INDUSTRIAL_PREFIX: &str = "industrial_";
/// Alternate prefix accepted on input (`industrial:plc`)
const INDUSTRIAL_ALT_PREFIX: &str = "industrial:";

/// Kind of an industrial component (`plc`, `hmi`, `scada`, ...)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndustrialKind(String);

impl IndustrialKind {
    /// Validate and wrap a kind
    ///
    /// # Errors
    /// `ModelError::InvalidIndustrialKind` if empty or not `[a-z0-9_-]`
    pub fn new(kind: impl Into<String>) -> Result<Self, ModelError> {
        let kind = kind.into().trim().to_lowercase();
        let valid = !kind.is_empty()
            && kind
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');

        if valid {
            Ok(Self(kind))
        } else {
            Err(ModelError::InvalidIndustrialKind(kind))
        }
    }

    /// Borrow the kind
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IndustrialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Security role of an instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Role {
    /// Monitoring host
    Monitor,
    /// Target host
    Victim,
    /// Attacker host
    Attack,
    /// Anything the classifier could not place
    Generic,
    /// Simulated industrial-control element attached to a base instance
    Industrial(IndustrialKind),
}

impl Role {
    /// Base roles anchor industrial components and are never deleted directly
    #[inline]
    #[must_use]
    pub fn is_base(&self) -> bool {
        matches!(self, Role::Monitor | Role::Victim | Role::Attack)
    }

    /// Industrial component role
    #[inline]
    #[must_use]
    pub fn is_industrial(&self) -> bool {
        matches!(self, Role::Industrial(_))
    }

    /// Industrial kind, if any
    #[must_use]
    pub fn industrial_kind(&self) -> Option<&IndustrialKind> {
        match self {
            Role::Industrial(kind) => Some(kind),
            _ => None,
        }
    }

    /// Wire representation
    #[must_use]
    pub fn as_wire(&self) -> String {
        match self {
            Role::Monitor => "monitor".to_string(),
            Role::Victim => "victim".to_string(),
            Role::Attack => "attack".to_string(),
            Role::Generic => "generic".to_string(),
            Role::Industrial(kind) => format!("{INDUSTRIAL_PREFIX}{kind}"),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_wire())
    }
}

impl FromStr for Role {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "monitor" => Ok(Role::Monitor),
            "victim" => Ok(Role::Victim),
            "attack" | "attacker" => Ok(Role::Attack),
            "generic" => Ok(Role::Generic),
            other => {
                let kind = other
                    .strip_prefix(INDUSTRIAL_PREFIX)
                    .or_else(|| other.strip_prefix(INDUSTRIAL_ALT_PREFIX))
                    .ok_or_else(|| ModelError::InvalidRole(s.to_string()))?;
                IndustrialKind::new(kind)
                    .map(Role::Industrial)
                    .map_err(|_| ModelError::InvalidRole(s.to_string()))
            }
        }
    }
}

impl TryFrom<String> for Role {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_wire()
    }
}

/// Maps an instance name to a role
///
/// Implementations must be total: every name maps to some role.
pub trait RoleClassifier: Send + Sync {
    /// Classify a name
    fn classify(&self, name: &str) -> Role;
}

/// Case-insensitive substring classifier
///
/// Priority order: monitor > attack > victim > generic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringClassifier;

impl SubstringClassifier {
    /// Keywords in priority order; first match wins
    const KEYWORDS: [(&'static str, Role); 3] = [
        ("monitor", Role::Monitor),
        ("attack", Role::Attack),
        ("victim", Role::Victim),
    ];
}

impl RoleClassifier for SubstringClassifier {
    fn classify(&self, name: &str) -> Role {
        let name = name.to_lowercase();
        Self::KEYWORDS
            .iter()
            .find(|(keyword, _)| name.contains(keyword))
            .map_or(Role::Generic, |(_, role)| role.clone())
    }
}

/// Derive a role from an instance name with the default classifier
#[must_use]
pub fn derive_role(name: &str) -> Role {
    SubstringClassifier.classify(name)
}
