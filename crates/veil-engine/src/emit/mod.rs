//! Code-emission backend boundary
//!
//! The generation algorithm never emits executable code directly. It
//! describes the synthesized type declaratively — fields, members with IR
//! bodies, constructors, invocation descriptors — and hands the description
//! to a [`TypeEmitter`]. A backend may realize it however it likes: the
//! default [`DynamicEmitter`] builds a dynamic-dispatch runtime class whose
//! bodies are interpreted; a compiling backend would lower the same IR
//! instead.

mod dynamic;
mod ir;

pub use dynamic::{DynamicEmitter, ProxyObject, RuntimeType};
pub use ir::{Body, Expr, NewInvocationExpr, Place, Stmt};

use std::sync::Arc;

use veil_model::{AttributeDef, MemberId, TypeId, Value, Visibility};

use crate::interceptor::Interceptor;
use crate::invocation::InvocationDescriptor;
use crate::{CallResult, GenResult};

/// Header of a type under construction.
#[derive(Debug, Clone)]
pub struct TypeDeclHeader {
    /// Name of the synthesized type
    pub name: String,
    /// The type the proxy nominally stands in for
    pub nominal: TypeId,
    /// Base class of the synthesized type, if any
    pub base: Option<TypeId>,
    /// Declared interfaces, in generation order
    pub interfaces: Vec<TypeId>,
    /// Attributes replicated from the target type
    pub attributes: Vec<AttributeDef>,
}

/// Visibility and attribute bits computed for a generated member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberAccess {
    /// Member visibility
    pub visibility: Visibility,
    /// Sealed against further overriding (explicit implementations)
    pub is_final: bool,
    /// Hidden by signature rather than by name
    pub hide_by_sig: bool,
    /// Introduces a new slot instead of overriding (explicit implementations)
    pub new_slot: bool,
    /// Accessor-style member
    pub special_name: bool,
}

impl MemberAccess {
    /// Access bits of an explicit interface implementation.
    pub fn explicit_implementation(special_name: bool) -> Self {
        Self {
            visibility: Visibility::Private,
            is_final: true,
            hide_by_sig: true,
            new_slot: true,
            special_name,
        }
    }

    /// Access bits mirroring the original member.
    pub fn mirroring(visibility: Visibility, special_name: bool) -> Self {
        Self {
            visibility,
            is_final: false,
            hide_by_sig: true,
            new_slot: false,
            special_name,
        }
    }
}

/// Binding of a generated member as an interface member's implementation.
#[derive(Debug, Clone)]
pub struct InterfaceBinding {
    /// The interface declaring the member
    pub interface: TypeId,
    /// The member's unqualified name on that interface
    pub member: String,
}

/// Complete declaration of one generated member.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    /// Emitted name; interface-qualified (`"Interface.Member"`) for explicit
    /// implementations
    pub name: String,
    /// Identity of the declared member this body dispatches
    pub declared: MemberId,
    /// Interfaces whose member this body implements
    pub bindings: Vec<InterfaceBinding>,
    /// Computed visibility/attribute bits
    pub access: MemberAccess,
    /// Declared parameter count
    pub param_count: usize,
    /// Number of generic type arguments the member takes
    pub generic_arity: usize,
    /// Attributes replicated from the original member
    pub attributes: Vec<AttributeDef>,
    /// The forwarding body
    pub body: Body,
}

/// Declaration of one generated constructor.
#[derive(Debug, Clone)]
pub struct CtorDecl {
    /// Total parameter count: proxy fields plus forwarded base parameters
    pub param_count: usize,
    /// Number of forwarded base-constructor parameters
    pub base_arity: usize,
    /// Whether this is the synthesized parameterless constructor
    pub parameterless: bool,
    /// The construction body
    pub body: Body,
}

/// Arguments for instantiating a synthesized type: the proxy-specific
/// fields in fixed order, then the forwarded base-constructor arguments.
#[derive(Default)]
pub struct CtorArgs {
    /// Interceptors stored into the interceptor field
    pub interceptors: Vec<Arc<dyn Interceptor>>,
    /// Backing target instance, for proxies that have one
    pub target: Option<Value>,
    /// Mixin instances in registration order
    pub mixins: Vec<Value>,
    /// Arguments forwarded to the mirrored base constructor
    pub base_args: Vec<Value>,
}

/// A live instance of a synthesized type.
pub trait ProxyInstance: Send + Sync + std::fmt::Debug {
    /// Name of the synthesized type.
    fn type_name(&self) -> &str;

    /// Identity of the synthesized type; equal for instances of the same
    /// generated type.
    fn type_unique_id(&self) -> u64;

    /// Whether the synthesized type declares `interface`.
    fn implements(&self, interface: TypeId) -> bool;

    /// Invoke a member by unqualified name. Explicit interface
    /// implementations are not reachable this way.
    fn invoke(&self, member: &str, args: &mut [Value], type_args: &[TypeId]) -> CallResult<Value>;

    /// Invoke a member through a specific interface's view; reaches explicit
    /// interface implementations.
    fn invoke_interface(
        &self,
        interface: TypeId,
        member: &str,
        args: &mut [Value],
        type_args: &[TypeId],
    ) -> CallResult<Value>;

    /// Read a property through its generated getter.
    fn get_property(&self, name: &str) -> CallResult<Value>;

    /// Write a property through its generated setter.
    fn set_property(&self, name: &str, value: Value) -> CallResult<()>;

    /// Subscribe a handler through the event's generated add accessor.
    fn add_handler(&self, event: &str, handler: Value) -> CallResult<()>;

    /// Unsubscribe a handler through the event's generated remove accessor.
    fn remove_handler(&self, event: &str, handler: Value) -> CallResult<()>;
}

/// Shared handle to a live proxy instance.
pub type ProxyHandle = Arc<dyn ProxyInstance>;

/// One synthesized, invocable type produced by a backend.
pub trait SynthesizedType: Send + Sync + std::fmt::Debug {
    /// Name of the synthesized type.
    fn name(&self) -> &str;

    /// Process-unique identity of this synthesized type.
    fn unique_id(&self) -> u64;

    /// Declared interfaces, in generation order.
    fn interfaces(&self) -> &[TypeId];

    /// Attributes on the synthesized type (replicated plus backend markers).
    fn attributes(&self) -> &[AttributeDef];

    /// Emitted member names, sorted for stable inspection.
    fn member_names(&self) -> Vec<String>;

    /// Whether a member exists under the given emitted name.
    fn has_member(&self, name: &str) -> bool;

    /// Number of invocation constructs attached to the type.
    fn descriptor_count(&self) -> usize;

    /// Index of the generated constructor forwarding `base_arity` arguments.
    fn find_ctor(&self, base_arity: usize) -> Option<usize>;

    /// Index of the synthesized parameterless constructor, if present.
    fn parameterless_ctor(&self) -> Option<usize>;

    /// Construct an instance through generated constructor `ctor`.
    fn instantiate(self: Arc<Self>, ctor: usize, args: CtorArgs) -> CallResult<ProxyHandle>;
}

/// Builder for one type under construction.
pub trait TypeAssembler: Send {
    /// Declare a field, returning its slot index.
    fn declare_field(&mut self, name: &str) -> usize;

    /// Attach an invocation descriptor, returning its table index.
    fn declare_descriptor(&mut self, descriptor: Arc<InvocationDescriptor>) -> usize;

    /// Declare a member with its forwarding body.
    fn declare_method(&mut self, decl: MethodDecl) -> GenResult<()>;

    /// Group previously declared accessors into a property.
    fn declare_property(
        &mut self,
        name: &str,
        getter: Option<String>,
        setter: Option<String>,
        attributes: Vec<AttributeDef>,
    ) -> GenResult<()>;

    /// Group previously declared accessors into an event.
    fn declare_event(
        &mut self,
        name: &str,
        add: String,
        remove: String,
        attributes: Vec<AttributeDef>,
    ) -> GenResult<()>;

    /// Declare a constructor.
    fn declare_constructor(&mut self, decl: CtorDecl) -> GenResult<()>;

    /// Finish construction, producing the invocable type.
    fn finalize(self: Box<Self>) -> GenResult<Arc<dyn SynthesizedType>>;
}

/// Opaque service turning type descriptions into invocable types.
pub trait TypeEmitter: Send + Sync {
    /// Open a new type under construction.
    fn declare_type(&self, header: TypeDeclHeader) -> Box<dyn TypeAssembler>;
}
