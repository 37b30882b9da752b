//! Type and member descriptions
//!
//! The host describes every proxyable type as a [`TypeDef`]: its members,
//! constructors, attributes, and implemented interfaces. Concrete members
//! carry a [`NativeBody`], the callable the proxy engine's terminal callback
//! invokes when no interceptor short-circuits.

use std::fmt;
use std::sync::Arc;

use crate::error::NativeError;
use crate::value::Value;

/// Identifier of a registered type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub usize);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

/// Type kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    /// Concrete or abstract class
    Class,
    /// Interface (no state, members may be abstract)
    Interface,
}

/// Member and type visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Visible everywhere
    Public,
    /// Visible to subtypes
    Protected,
    /// Visible inside the declaring assembly (host-gated for proxies)
    Internal,
    /// Visible only to the declaring type
    Private,
}

/// Passing mode of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    /// Passed by value
    In,
    /// Written by the callee, initial value ignored
    Out,
    /// Passed by reference, read and written
    InOut,
}

impl ParamMode {
    /// Whether the parameter is passed through an indirect cell.
    pub fn is_by_ref(self) -> bool {
        matches!(self, ParamMode::Out | ParamMode::InOut)
    }
}

/// One parameter of a method or constructor
#[derive(Debug, Clone)]
pub struct ParamDef {
    /// Parameter name
    pub name: String,
    /// Passing mode
    pub mode: ParamMode,
}

impl ParamDef {
    /// Create a by-value parameter.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: ParamMode::In,
        }
    }

    /// Create an output parameter.
    pub fn out(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: ParamMode::Out,
        }
    }

    /// Create a read-write by-reference parameter.
    pub fn in_out(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: ParamMode::InOut,
        }
    }
}

/// A custom attribute attached to a type or member.
#[derive(Debug, Clone)]
pub struct AttributeDef {
    /// Attribute name
    pub name: String,
    /// Whether the attribute flows to subtypes through normal inheritance
    pub inherited: bool,
    /// Opaque attribute payload
    pub payload: Value,
}

impl AttributeDef {
    /// Create a non-inheritable attribute with no payload.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inherited: false,
            payload: Value::Null,
        }
    }

    /// Mark the attribute as inheritable.
    pub fn inheritable(mut self) -> Self {
        self.inherited = true;
        self
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Callable implementation of a concrete member.
///
/// Invoked with the receiver (target or mixin instance), the mutable
/// argument array (by-reference parameters are written back through it),
/// and the runtime type arguments of a generic call.
#[derive(Clone)]
pub struct NativeBody(
    Arc<dyn Fn(&Value, &mut [Value], &[TypeId]) -> Result<Value, NativeError> + Send + Sync>,
);

impl NativeBody {
    /// Wrap a callable as a member body.
    pub fn new(
        f: impl Fn(&Value, &mut [Value], &[TypeId]) -> Result<Value, NativeError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self(Arc::new(f))
    }

    /// Invoke the body.
    pub fn invoke(
        &self,
        receiver: &Value,
        args: &mut [Value],
        type_args: &[TypeId],
    ) -> Result<Value, NativeError> {
        (self.0)(receiver, args, type_args)
    }
}

impl fmt::Debug for NativeBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeBody")
    }
}

/// Description of one method.
#[derive(Debug, Clone)]
pub struct MethodDef {
    /// Method name
    pub name: String,
    /// Parameters in declaration order
    pub params: Vec<ParamDef>,
    /// Whether the method produces a value
    pub has_return: bool,
    /// Generic parameter names (empty for non-generic methods)
    pub generic_params: Vec<String>,
    /// Member visibility
    pub visibility: Visibility,
    /// Whether the method has no implementation
    pub is_abstract: bool,
    /// Accessor-style member (property getter/setter, event add/remove)
    pub special_name: bool,
    /// Attributes declared on the method
    pub attributes: Vec<AttributeDef>,
    /// Implementation, present on concrete methods
    pub body: Option<NativeBody>,
}

impl MethodDef {
    /// Create a public, void, non-generic method with no parameters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            has_return: false,
            generic_params: Vec::new(),
            visibility: Visibility::Public,
            is_abstract: false,
            special_name: false,
            attributes: Vec::new(),
            body: None,
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, param: ParamDef) -> Self {
        self.params.push(param);
        self
    }

    /// Mark the method as value-returning.
    pub fn returns(mut self) -> Self {
        self.has_return = true;
        self
    }

    /// Declare generic parameters.
    pub fn generic(mut self, params: &[&str]) -> Self {
        self.generic_params = params.iter().map(|p| (*p).to_string()).collect();
        self
    }

    /// Set the visibility.
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Mark as abstract (no implementation).
    pub fn as_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Mark as an accessor-style member.
    pub fn special(mut self) -> Self {
        self.special_name = true;
        self
    }

    /// Attach an attribute.
    pub fn with_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Attach the implementation.
    pub fn with_body(
        mut self,
        f: impl Fn(&Value, &mut [Value], &[TypeId]) -> Result<Value, NativeError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.body = Some(NativeBody::new(f));
        self
    }

    /// Whether the method declares generic parameters.
    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Indices of by-reference parameters.
    pub fn by_ref_params(&self) -> Vec<usize> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.mode.is_by_ref())
            .map(|(i, _)| i)
            .collect()
    }
}

/// Description of one property: a name grouping accessor methods.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    /// Property name
    pub name: String,
    /// Index of the getter in the declaring type's method list
    pub getter: Option<usize>,
    /// Index of the setter in the declaring type's method list
    pub setter: Option<usize>,
    /// Attributes declared on the property
    pub attributes: Vec<AttributeDef>,
}

/// Description of one event: a name grouping subscribe accessors.
#[derive(Debug, Clone)]
pub struct EventDef {
    /// Event name
    pub name: String,
    /// Index of the add accessor in the declaring type's method list
    pub add: usize,
    /// Index of the remove accessor in the declaring type's method list
    pub remove: usize,
    /// Attributes declared on the event
    pub attributes: Vec<AttributeDef>,
}

/// Description of one constructor.
#[derive(Debug, Clone)]
pub struct CtorDef {
    /// Parameters in declaration order
    pub params: Vec<ParamDef>,
    /// Constructor visibility
    pub visibility: Visibility,
    /// Initialization logic run with the constructed instance as receiver
    pub body: Option<NativeBody>,
}

impl CtorDef {
    /// Create a public parameterless constructor with no body.
    pub fn public() -> Self {
        Self {
            params: Vec::new(),
            visibility: Visibility::Public,
            body: None,
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, param: ParamDef) -> Self {
        self.params.push(param);
        self
    }

    /// Set the visibility.
    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Attach the initialization body.
    pub fn with_body(
        mut self,
        f: impl Fn(&Value, &mut [Value], &[TypeId]) -> Result<Value, NativeError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.body = Some(NativeBody::new(f));
        self
    }
}

/// Description of one registered type.
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Type name
    pub name: String,
    /// Class or interface
    pub kind: TypeKind,
    /// Base class (classes only)
    pub base: Option<TypeId>,
    /// Directly implemented/extended interfaces
    pub interfaces: Vec<TypeId>,
    /// Generic parameter names; a type with unbound parameters is an open
    /// generic definition and cannot be proxied
    pub generic_params: Vec<String>,
    /// Type visibility
    pub visibility: Visibility,
    /// Declared methods
    pub methods: Vec<MethodDef>,
    /// Declared properties (accessors index into `methods`)
    pub properties: Vec<PropertyDef>,
    /// Declared events (accessors index into `methods`)
    pub events: Vec<EventDef>,
    /// Declared constructors (classes only)
    pub ctors: Vec<CtorDef>,
    /// Attributes declared on the type
    pub attributes: Vec<AttributeDef>,
}

impl TypeDef {
    fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base: None,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            visibility: Visibility::Public,
            methods: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            ctors: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Create a class definition.
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Class)
    }

    /// Create an interface definition.
    pub fn interface(name: impl Into<String>) -> Self {
        Self::new(name, TypeKind::Interface)
    }

    /// Set the base class.
    pub fn extends(mut self, base: TypeId) -> Self {
        self.base = Some(base);
        self
    }

    /// Add a directly implemented interface.
    pub fn implements(mut self, interface: TypeId) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Declare generic parameters.
    pub fn generic(mut self, params: &[&str]) -> Self {
        self.generic_params = params.iter().map(|p| (*p).to_string()).collect();
        self
    }

    /// Add a method.
    pub fn with_method(mut self, method: MethodDef) -> Self {
        self.methods.push(method);
        self
    }

    /// Add a property grouping previously added accessor methods.
    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Add an event grouping previously added accessor methods.
    pub fn with_event(mut self, event: EventDef) -> Self {
        self.events.push(event);
        self
    }

    /// Add a constructor.
    pub fn with_ctor(mut self, ctor: CtorDef) -> Self {
        self.ctors.push(ctor);
        self
    }

    /// Attach an attribute.
    pub fn with_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Whether this is an open generic definition.
    pub fn is_open_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// Whether this is an interface definition.
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Look up a method by index.
    pub fn method(&self, index: usize) -> Option<&MethodDef> {
        self.methods.get(index)
    }

    /// Find a method index by name and arity.
    pub fn find_method(&self, name: &str, arity: usize) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| m.name == name && m.params.len() == arity)
    }
}

/// Identity of a declared member within the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemberId {
    /// Declaring type
    pub type_id: TypeId,
    /// Index into the declaring type's method list
    pub index: usize,
}

impl MemberId {
    /// Create a member identity.
    pub fn new(type_id: TypeId, index: usize) -> Self {
        Self { type_id, index }
    }
}

/// Resolved identity token for a member, carrying any runtime type arguments
/// of a generic instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodToken {
    /// The declared member
    pub member: MemberId,
    /// Runtime type arguments (empty for non-generic members)
    pub type_args: Vec<TypeId>,
}

impl MethodToken {
    /// Token for a non-generic member.
    pub fn non_generic(member: MemberId) -> Self {
        Self {
            member,
            type_args: Vec::new(),
        }
    }

    /// Token for a concrete generic instantiation.
    pub fn with_args(member: MemberId, type_args: Vec<TypeId>) -> Self {
        Self { member, type_args }
    }

    /// Whether the token carries type arguments.
    pub fn is_generic(&self) -> bool {
        !self.type_args.is_empty()
    }
}
