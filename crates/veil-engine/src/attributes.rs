//! Attribute replication filter
//!
//! Custom attributes on the target type and its members are copied onto the
//! generated counterparts, with two carve-outs: attributes on the fixed
//! exclusion list (markers the synthesis backend itself manages), and
//! attributes declared inheritable, which already reach the generated type
//! through normal inheritance and must not be duplicated.

use std::sync::Arc;

use veil_model::AttributeDef;

use crate::options::AttributePolicy;

/// Marker the backend stamps on every synthesized type.
pub const GENERATED_TYPE_MARKER: &str = "veil:generated";

/// Attributes meaningful only to the synthesis backend; never replicated.
pub const EXCLUDED_ATTRIBUTES: &[&str] = &[GENERATED_TYPE_MARKER];

/// Decides, per attribute, whether it is copied onto the generated element.
pub struct AttributeFilter {
    policy: Arc<dyn AttributePolicy>,
}

impl AttributeFilter {
    /// Create a filter using the host's replication policy.
    pub fn new(policy: Arc<dyn AttributePolicy>) -> Self {
        Self { policy }
    }

    /// Whether `attribute` should be copied onto the generated counterpart.
    pub fn should_replicate(&self, attribute: &AttributeDef) -> bool {
        if attribute.inherited {
            return false;
        }
        if EXCLUDED_ATTRIBUTES.contains(&attribute.name.as_str()) {
            return false;
        }
        !self.policy.exclude(attribute)
    }

    /// The replicable subset of `attributes`, preserving order.
    pub fn replicable(&self, attributes: &[AttributeDef]) -> Vec<AttributeDef> {
        attributes
            .iter()
            .filter(|a| self.should_replicate(a))
            .cloned()
            .collect()
    }
}
