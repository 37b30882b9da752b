//! Dynamic runtime values
//!
//! Proxied calls move arguments and results around as [`Value`]s. Host
//! objects (proxy targets, mixin instances, event handlers) travel as
//! [`InstanceRef`]s: reference-identity handles around `Arc<dyn Any>`.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::ty::TypeId;

/// Global counter for generating unique instance IDs
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique instance ID
fn generate_instance_id() -> u64 {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A host object handle with reference identity.
///
/// Two `InstanceRef`s compare equal when they wrap the same underlying
/// object, regardless of how many times it was wrapped.
#[derive(Clone)]
pub struct InstanceRef {
    /// Unique instance ID (assigned on creation)
    id: u64,
    /// Registered type of the wrapped object
    type_id: TypeId,
    /// The wrapped host object
    inner: Arc<dyn Any + Send + Sync>,
}

impl InstanceRef {
    /// Wrap a host object, tagging it with its registered type.
    pub fn new(type_id: TypeId, inner: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            id: generate_instance_id(),
            type_id,
            inner,
        }
    }

    /// The unique instance ID.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The registered type of the wrapped object.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Borrow the wrapped object as a concrete type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Clone of the wrapped object handle.
    pub fn inner(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.inner)
    }
}

impl PartialEq for InstanceRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for InstanceRef {}

impl fmt::Debug for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRef")
            .field("id", &self.id)
            .field("type_id", &self.type_id)
            .finish()
    }
}

/// Dynamic runtime value moved through proxied calls.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Host object handle
    Instance(InstanceRef),
    /// Immutable list of values
    List(Arc<Vec<Value>>),
}

impl Value {
    /// Build a string value.
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    /// Wrap a host object as an instance value.
    pub fn instance(type_id: TypeId, inner: Arc<dyn Any + Send + Sync>) -> Self {
        Value::Instance(InstanceRef::new(type_id, inner))
    }

    /// Build a list value.
    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    /// Whether this is the null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Read as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Read as a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Read as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Read as an instance handle.
    pub fn as_instance(&self) -> Option<&InstanceRef> {
        match self {
            Value::Instance(i) => Some(i),
            _ => None,
        }
    }

    /// Read as a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Bool(true).as_bool(), Some(true));
        assert_eq!(Value::Int(42).as_int(), Some(42));
        assert_eq!(Value::Float(1.5).as_float(), Some(1.5));
        assert_eq!(Value::str("hi").as_str(), Some("hi"));
        assert_eq!(Value::Int(1).as_str(), None);
        assert_eq!(Value::Null.as_int(), None);
    }

    #[test]
    fn test_list_value() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(list.as_list().map(<[Value]>::len), Some(2));
    }

    #[test]
    fn test_instance_identity() {
        let shared: Arc<u32> = Arc::new(5);
        let a = Value::instance(TypeId(0), shared.clone());
        let b = a.clone();
        let rewrapped = Value::instance(TypeId(0), shared);
        let other = Value::instance(TypeId(0), Arc::new(5_u32));

        // Identity follows the wrapped object, not the wrapper
        assert_eq!(a, b);
        assert_eq!(a, rewrapped);
        assert_ne!(a, other);
    }

    #[test]
    fn test_instance_downcast() {
        let v = Value::instance(TypeId(3), Arc::new(String::from("payload")));
        let inst = v.as_instance().unwrap();

        assert_eq!(inst.type_id(), TypeId(3));
        assert_eq!(inst.downcast_ref::<String>().unwrap(), "payload");
        assert!(inst.downcast_ref::<u32>().is_none());
    }
}
