//! Reflection model errors

use thiserror::Error;

use crate::ty::TypeId;

/// Errors raised by the type registry and closure walks
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModelError {
    /// Type id does not refer to a registered type
    #[error("unknown type: {0}")]
    UnknownType(TypeId),

    /// Type name registered twice
    #[error("type `{name}` is already registered")]
    DuplicateType {
        /// The colliding name
        name: String,
    },

    /// A class id appeared where an interface was required
    #[error("`{name}` is not an interface")]
    NotAnInterface {
        /// Name of the offending type
        name: String,
    },

    /// Interface-inheritance walk revisited a type still on the walk stack
    #[error("interface inheritance cycle through `{name}`")]
    InterfaceCycle {
        /// Name of the type closing the cycle
        name: String,
    },
}

/// Error raised by a native member body; propagated to proxy callers
/// unmodified.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{message}")]
pub struct NativeError {
    /// Failure description
    pub message: String,
}

impl NativeError {
    /// Create an error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
