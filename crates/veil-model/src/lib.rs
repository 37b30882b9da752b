//! Veil Reflection Model
//!
//! Runtime values and type descriptions consumed by the Veil proxy engine.
//! The host registers its types here; the engine reads members, constructors,
//! attributes, and interface closures back out when synthesizing proxy types.

#![warn(missing_docs)]

pub mod error;
pub mod registry;
pub mod ty;
pub mod value;

pub use error::{ModelError, NativeError};
pub use registry::TypeRegistry;
pub use ty::{
    AttributeDef, CtorDef, EventDef, MemberId, MethodDef, MethodToken, NativeBody, ParamDef,
    ParamMode, PropertyDef, TypeDef, TypeId, TypeKind, Visibility,
};
pub use value::{InstanceRef, Value};
