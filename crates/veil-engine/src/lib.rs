//! Veil Proxy Engine
//!
//! Synthesizes, at runtime, stand-in types that route every member call
//! through an ordered chain of interceptors before (optionally) forwarding
//! to a real backing implementation. The engine provides:
//! - Generation options, member-selection hooks, and the mixin registry
//! - A structural type cache (one synthesized type per distinct signature)
//! - The member contributor pipeline (target, extra interfaces, mixins)
//! - Invocation descriptors and the `proceed()` dispatch protocol
//! - Member and constructor implementers describing bodies in a small IR
//! - A swappable code-emission backend, with a dynamic-dispatch default
//!
//! The low-level emission backend is an opaque service behind the
//! [`emit::TypeEmitter`] boundary; the default backend realizes synthesized
//! types as interpreted runtime classes.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod attributes;
pub mod cache;
pub mod constructors;
pub mod contributor;
pub mod emit;
pub mod generator;
pub mod implementer;
pub mod interceptor;
pub mod invocation;
pub mod options;

pub use attributes::{AttributeFilter, EXCLUDED_ATTRIBUTES, GENERATED_TYPE_MARKER};
pub use cache::{CacheKey, TypeCache};
pub use contributor::{
    ContributorKind, ContributorRole, EventToGenerate, FieldLayout, MemberToGenerate,
    MixinFieldMap, PropertyToGenerate, ProxyKind, ProxyPlan,
};
pub use emit::{
    CtorArgs, DynamicEmitter, ProxyHandle, ProxyInstance, ProxyObject, RuntimeType,
    SynthesizedType, TypeEmitter,
};
pub use generator::{ProxyGenerator, ProxyRequest, TypeSynthesizer};
pub use interceptor::{Interceptor, InterceptorChain, InterceptorSelector, NoopInterceptor};
pub use invocation::{Invocation, InvocationDescriptor, InvocationShape, ProceedStep};
pub use options::{
    AllMembersHook, AttributePolicy, GenerationHook, MixinEntry, MixinRegistry, OptionsSlot,
    ProxyGenerationOptions, ReplicateAll, SealedInternals, VisibilityPolicy,
};

use veil_model::{ModelError, NativeError, TypeId};

/// Errors reported synchronously at generation time
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// A generic type definition was passed where a concrete type is required
    #[error("type `{name}` is an open generic definition; a closed type is required")]
    OpenGenericType {
        /// Name of the offending type
        name: String,
    },

    /// Two sources contribute the same interface
    #[error("interface `{interface}` is already implemented via {existing}; cannot add it via {attempted}")]
    InterfaceAlreadyImplemented {
        /// Name of the colliding interface
        interface: String,
        /// Source that first contributed the interface
        existing: contributor::ContributorRole,
        /// Source whose contribution collided
        attempted: contributor::ContributorRole,
    },

    /// The same mixin interface was registered twice
    #[error("mixin interface {interface} is registered more than once")]
    MixinCollision {
        /// The colliding interface
        interface: TypeId,
    },

    /// Generation options read before they were set
    #[error("generation options read before they were set")]
    OptionsNotSet,

    /// Generation options set twice
    #[error("generation options were already set")]
    OptionsAlreadySet,

    /// Target instance is not assignable to the proxied type
    #[error("target instance of type `{actual}` does not implement or extend `{expected}`")]
    TargetTypeMismatch {
        /// The proxied type
        expected: String,
        /// The instance's registered type
        actual: String,
    },

    /// No generated constructor matches the instantiation request
    #[error("no generated constructor with {arity} base argument(s) on `{type_name}`")]
    NoMatchingConstructor {
        /// Name of the synthesized type
        type_name: String,
        /// Requested base-argument count
        arity: usize,
    },

    /// Reflection model failure
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Code-emission backend failure; nothing is cached for the key
    #[error("emitter error: {0}")]
    Emitter(String),

    /// A synthesized constructor body failed during instantiation
    #[error("constructor execution failed: {0}")]
    Construction(#[source] CallError),
}

/// Errors raised while dispatching a proxied call
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// Member has no backing implementation and the chain did not
    /// short-circuit
    #[error("no backing target for `{member}`")]
    NoTarget {
        /// Name of the unbacked member
        member: String,
    },

    /// `proceed()` called again after the chain already completed
    #[error("proceed() called after the interceptor chain for `{member}` completed")]
    ProceedExhausted {
        /// Name of the member being dispatched
        member: String,
    },

    /// Member lookup failed on the proxy
    #[error("proxy type `{type_name}` has no member `{member}`")]
    MissingMember {
        /// Name of the synthesized type
        type_name: String,
        /// The missing member
        member: String,
    },

    /// Wrong number of call arguments
    #[error("`{member}` expects {expected} argument(s), got {actual}")]
    BadArity {
        /// Member being invoked
        member: String,
        /// Declared parameter count
        expected: usize,
        /// Supplied argument count
        actual: usize,
    },

    /// Wrong number of generic type arguments
    #[error("`{member}` expects {expected} type argument(s), got {actual}")]
    BadTypeArity {
        /// Member being invoked
        member: String,
        /// Declared generic arity
        expected: usize,
        /// Supplied type-argument count
        actual: usize,
    },

    /// Malformed generated body; indicates an engine or backend defect
    #[error("internal proxy dispatch error: {message}")]
    Internal {
        /// Failure description
        message: String,
    },

    /// Error raised by a target body or an interceptor; propagated unmodified
    #[error(transparent)]
    Native(#[from] NativeError),
}

impl CallError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        CallError::Internal {
            message: message.into(),
        }
    }
}

/// Generation result
pub type GenResult<T> = Result<T, GenerationError>;

/// Call-dispatch result
pub type CallResult<T> = Result<T, CallError>;
