//! Industrial component attachment
//!
//! An industrial component never exists without its base: the node and the
//! link edge to the base are built together and inserted together.

use crate::edge::Edge;
use crate::error::ModelError;
use crate::ids::InstanceId;
use crate::instance::{Instance, Position};
use crate::role::{IndustrialKind, Role};
use ulid::Ulid;

/// An industrial node together with its link edge
#[derive(Debug, Clone, PartialEq)]
pub struct IndustrialAttachment {
    /// The industrial component
    pub component: Instance,
    /// Edge `base -> component`
    pub link: Edge,
}

impl IndustrialAttachment {
    /// Build a component of `kind` attached to `base`
    ///
    /// The component is named after its kind in upper case and placed
    /// `offset` units right of and below its base.
    ///
    /// # Errors
    /// `ModelError::NotABase` if `base` is not monitor, victim or attack
    pub fn build(kind: IndustrialKind, base: &Instance, offset: f64) -> Result<Self, ModelError> {
        if !base.is_base() {
            return Err(ModelError::NotABase {
                id: base.id.to_string(),
                role: base.role.to_string(),
            });
        }

        let id = InstanceId::new(format!("{kind}_{}", Ulid::new().to_string().to_lowercase()));
        let position = base.position.unwrap_or_default().offset(offset);

        let component = Instance::new(id.clone(), kind.as_str().to_uppercase(), Role::Industrial(kind))
            .with_position(position)
            .with_link(base.id.clone());
        let link = Edge::between(base.id.clone(), id);

        Ok(Self { component, link })
    }

    /// Position the component was placed at
    #[must_use]
    pub fn position(&self) -> Position {
        self.component.position.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plc() -> IndustrialKind {
        IndustrialKind::new("plc").unwrap()
    }

    #[test]
    fn build_links_component_to_base() {
        let base = Instance::from_name("b1", "victim-1").with_position(Position::new(200.0, 150.0));
        let attachment = IndustrialAttachment::build(plc(), &base, 120.0).unwrap();

        assert_eq!(attachment.component.name, "PLC");
        assert_eq!(attachment.component.linked_to, Some(base.id.clone()));
        assert!(attachment.component.id.as_str().starts_with("plc_"));
        assert_eq!(attachment.link.source, base.id);
        assert_eq!(attachment.link.target, attachment.component.id);
        assert_eq!(attachment.position(), Position::new(320.0, 270.0));
        assert!(attachment.component.validate().is_ok());
    }

    #[test]
    fn build_rejects_non_base() {
        let generic = Instance::from_name("g1", "router");
        let result = IndustrialAttachment::build(plc(), &generic, 120.0);

        assert!(matches!(result, Err(ModelError::NotABase { .. })));
    }
}
