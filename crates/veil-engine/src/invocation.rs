//! Invocation descriptors and the `proceed()` protocol
//!
//! Every proxied member dispatches through an invocation: the per-call
//! context carrying the argument snapshot, member identity tokens, generic
//! type arguments, and the interceptor chain with an explicit cursor.
//! [`InvocationDescriptor`] is the per-member-definition side: one
//! descriptor exists per distinct backing member and genericity, owns the
//! cached backing token and the terminal callback, and acts as the
//! invocation constructor.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use veil_model::{MemberId, MethodToken, NativeBody, TypeId, TypeRegistry, Value};

use crate::interceptor::{Interceptor, InterceptorChain, InterceptorSelector};
use crate::{CallError, CallResult};

/// Parameter shape of the invocation constructor, fixed per generated type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationShape {
    /// Target, self, interceptor list, identity tokens, argument array
    Default,
    /// The default shape plus the interceptor selector and a writable slot
    /// caching which interceptors it chose
    WithSelector,
}

/// Terminal step of a backed member: the direct call to the backing member
/// on the backing target, with the invocation's argument snapshot.
pub struct TargetCallback {
    backing: MemberId,
    body: NativeBody,
}

impl TargetCallback {
    /// The backing member this callback invokes.
    pub fn backing(&self) -> MemberId {
        self.backing
    }

    /// Invoke the backing member.
    pub fn invoke(
        &self,
        target: &Value,
        args: &mut [Value],
        type_args: &[TypeId],
    ) -> CallResult<Value> {
        self.body
            .invoke(target, args, type_args)
            .map_err(CallError::from)
    }
}

/// Per-member-definition invocation construct.
///
/// Two generated members sharing the same backing member and genericity
/// share one descriptor. Non-generic identity tokens are resolved once when
/// the descriptor is built and reused across all calls; generic members get
/// a fresh token per concrete instantiation because the backing identity
/// depends on the instantiated type arguments.
pub struct InvocationDescriptor {
    registry: Arc<TypeRegistry>,
    member_name: String,
    /// Member consulted by the interceptor selector: the backing member, or
    /// the declared member when nothing backs it
    subject: MemberId,
    backing: Option<MemberId>,
    backing_token: Option<Arc<MethodToken>>,
    generic_arity: usize,
    shape: InvocationShape,
    selector: Option<Arc<dyn InterceptorSelector>>,
    selected: OnceCell<InterceptorChain>,
    callback: Option<TargetCallback>,
}

impl InvocationDescriptor {
    /// Build the descriptor for one backing member.
    pub fn new(
        registry: Arc<TypeRegistry>,
        member_name: String,
        subject: MemberId,
        backing: Option<MemberId>,
        generic_arity: usize,
        selector: Option<Arc<dyn InterceptorSelector>>,
    ) -> Self {
        let callback = backing.and_then(|member| {
            let body = registry.method(member)?.body.clone()?;
            Some(TargetCallback {
                backing: member,
                body,
            })
        });
        let backing_token = if generic_arity == 0 {
            backing.map(|member| Arc::new(MethodToken::non_generic(member)))
        } else {
            None
        };
        let shape = if selector.is_some() {
            InvocationShape::WithSelector
        } else {
            InvocationShape::Default
        };
        Self {
            registry,
            member_name,
            subject,
            backing,
            backing_token,
            generic_arity,
            shape,
            selector,
            selected: OnceCell::new(),
            callback,
        }
    }

    /// Name of the member this descriptor dispatches.
    pub fn member_name(&self) -> &str {
        &self.member_name
    }

    /// The backing member, if any.
    pub fn backing(&self) -> Option<MemberId> {
        self.backing
    }

    /// The constructor shape in effect for the generated type.
    pub fn shape(&self) -> InvocationShape {
        self.shape
    }

    /// Number of generic type arguments the member takes.
    pub fn generic_arity(&self) -> usize {
        self.generic_arity
    }

    /// Whether a terminal callback exists (backed member with a body).
    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    /// The invocation constructor: validates type arguments, resolves the
    /// identity tokens, applies the selector shape, and produces the
    /// per-call [`Invocation`].
    pub fn begin(
        self: &Arc<Self>,
        proxy: Value,
        target: Option<Value>,
        interceptors: InterceptorChain,
        declared_token: Arc<MethodToken>,
        args: Vec<Value>,
        type_args: Vec<TypeId>,
    ) -> CallResult<Invocation> {
        if type_args.len() != self.generic_arity {
            return Err(CallError::BadTypeArity {
                member: self.member_name.clone(),
                expected: self.generic_arity,
                actual: type_args.len(),
            });
        }
        let backing_token = if self.generic_arity == 0 {
            self.backing_token.clone()
        } else {
            self.backing
                .map(|member| Arc::new(MethodToken::with_args(member, type_args.clone())))
        };
        let chain = self.effective_chain(&interceptors)?;
        Ok(Invocation {
            descriptor: Arc::clone(self),
            proxy,
            target,
            chain,
            declared_token,
            backing_token,
            type_args,
            args,
            cursor: 0,
            return_value: Value::Null,
        })
    }

    fn effective_chain(&self, all: &InterceptorChain) -> CallResult<InterceptorChain> {
        match self.shape {
            InvocationShape::Default => Ok(all.clone()),
            InvocationShape::WithSelector => {
                let selector = self.selector.as_ref().ok_or_else(|| {
                    CallError::internal("selector shape without a configured selector")
                })?;
                self.selected
                    .get_or_try_init(|| {
                        let ty = self
                            .registry
                            .get(self.subject.type_id)
                            .ok_or_else(|| CallError::internal("unresolvable selector subject"))?;
                        let method = ty
                            .method(self.subject.index)
                            .ok_or_else(|| CallError::internal("unresolvable selector subject"))?;
                        Ok(selector.select(ty, method, all).into())
                    })
                    .cloned()
            }
        }
    }
}

/// Outcome of advancing the chain cursor by one step.
pub enum ProceedStep {
    /// Dispatch to the next interceptor
    Continue(Arc<dyn Interceptor>),
    /// Dispatch to the terminal callback
    Terminal,
    /// The chain already completed; a further `proceed()` is an error
    Exhausted,
}

/// Per-call context of one proxied member dispatch.
pub struct Invocation {
    descriptor: Arc<InvocationDescriptor>,
    proxy: Value,
    target: Option<Value>,
    chain: InterceptorChain,
    declared_token: Arc<MethodToken>,
    backing_token: Option<Arc<MethodToken>>,
    type_args: Vec<TypeId>,
    args: Vec<Value>,
    cursor: usize,
    return_value: Value,
}

impl std::fmt::Debug for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invocation")
            .field("member", &self.descriptor.member_name())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl Invocation {
    /// Name of the member being dispatched.
    pub fn member_name(&self) -> &str {
        self.descriptor.member_name()
    }

    /// The proxy instance the call entered through.
    pub fn proxy(&self) -> &Value {
        &self.proxy
    }

    /// The backing target, if the member has one.
    pub fn target(&self) -> Option<&Value> {
        self.target.as_ref()
    }

    /// Identity token of the declared member.
    pub fn declared_token(&self) -> &MethodToken {
        &self.declared_token
    }

    /// Identity token of the backing member, absent when nothing backs it.
    pub fn backing_token(&self) -> Option<&MethodToken> {
        self.backing_token.as_deref()
    }

    /// Runtime type arguments of a generic call.
    pub fn type_args(&self) -> &[TypeId] {
        &self.type_args
    }

    /// The argument snapshot.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Mutable access to the argument snapshot; writes to by-reference
    /// positions surface to the caller after the call returns.
    pub fn args_mut(&mut self) -> &mut [Value] {
        &mut self.args
    }

    /// One argument by position.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// Replace one argument.
    pub fn set_arg(&mut self, index: usize, value: Value) {
        if let Some(slot) = self.args.get_mut(index) {
            *slot = value;
        }
    }

    /// The current return value.
    pub fn return_value(&self) -> &Value {
        &self.return_value
    }

    /// Set the return value; a short-circuiting interceptor uses this
    /// instead of proceeding.
    pub fn set_return_value(&mut self, value: Value) {
        self.return_value = value;
    }

    /// Advance to the next interceptor, or to the terminal callback once
    /// the chain is exhausted. One call is one state transition.
    pub fn proceed(&mut self) -> CallResult<()> {
        match self.advance() {
            ProceedStep::Continue(interceptor) => interceptor.intercept(self),
            ProceedStep::Terminal => self.invoke_callback(),
            ProceedStep::Exhausted => Err(CallError::ProceedExhausted {
                member: self.member_name().to_string(),
            }),
        }
    }

    fn advance(&mut self) -> ProceedStep {
        if self.cursor < self.chain.len() {
            let next = Arc::clone(&self.chain[self.cursor]);
            self.cursor += 1;
            ProceedStep::Continue(next)
        } else if self.cursor == self.chain.len() {
            self.cursor += 1;
            ProceedStep::Terminal
        } else {
            ProceedStep::Exhausted
        }
    }

    fn invoke_callback(&mut self) -> CallResult<()> {
        match (&self.descriptor.callback, &self.target) {
            (Some(callback), Some(target)) => {
                let result = callback.invoke(target, &mut self.args, &self.type_args)?;
                self.return_value = result;
                Ok(())
            }
            _ => Err(CallError::NoTarget {
                member: self.descriptor.member_name().to_string(),
            }),
        }
    }
}
