//! Interceptor protocol
//!
//! An interceptor is one unit of cross-cutting behavior. The generated
//! forwarding body hands it an [`Invocation`]; the interceptor may mutate
//! arguments, call [`Invocation::proceed`] to advance the chain, replace the
//! return value after proceeding, or short-circuit by never proceeding.

use std::sync::Arc;

use veil_model::{MethodDef, TypeDef};

use crate::invocation::Invocation;
use crate::CallResult;

/// Ordered, shared interceptor list attached to a proxy instance.
pub type InterceptorChain = Arc<[Arc<dyn Interceptor>]>;

/// One unit of cross-cutting behavior.
pub trait Interceptor: Send + Sync {
    /// Handle one member call.
    ///
    /// Calling `invocation.proceed()` more than once per dispatch is the
    /// interceptor's responsibility; the chain reports it as an error.
    fn intercept(&self, invocation: &mut Invocation) -> CallResult<()>;
}

/// Passthrough interceptor that immediately proceeds.
///
/// The synthesized parameterless constructor seeds the interceptor field
/// with a single `NoopInterceptor` so instances constructed without explicit
/// interceptors remain safely callable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInterceptor;

impl Interceptor for NoopInterceptor {
    fn intercept(&self, invocation: &mut Invocation) -> CallResult<()> {
        invocation.proceed()
    }
}

/// Chooses which of the registered interceptors apply to a member.
///
/// Configuring a selector on the generation options switches every
/// invocation construct of the generated type to the selector shape; the
/// choice is made per backing member and cached on its descriptor.
pub trait InterceptorSelector: Send + Sync {
    /// Return the interceptors that should run for `method`, in order.
    fn select(
        &self,
        ty: &TypeDef,
        method: &MethodDef,
        all: &[Arc<dyn Interceptor>],
    ) -> Vec<Arc<dyn Interceptor>>;
}
