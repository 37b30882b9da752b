//! Generation options and mixin registry
//!
//! A [`ProxyGenerationOptions`] value is immutable configuration for one
//! family of generated types: the member-selection hook, the optional
//! interceptor selector, the attribute replication policy, the host
//! visibility policy, and the ordered mixin map. Options contribute a
//! stable signature to the type-cache key so equal configurations share a
//! generated type.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use rustc_hash::FxHasher;

use veil_model::{AttributeDef, MethodDef, TypeDef, TypeId, Value};

use crate::interceptor::InterceptorSelector;
use crate::{GenResult, GenerationError};

/// Decides which members are routed through the interceptor chain.
pub trait GenerationHook: Send + Sync {
    /// Whether calls to `method` should be intercepted.
    fn should_intercept(&self, ty: &TypeDef, method: &MethodDef) -> bool;

    /// Notification for a member that cannot be proxied (visibility).
    fn non_proxyable_member(&self, _ty: &TypeDef, _member: &str) {}

    /// Called once member inspection for a type is complete.
    fn inspection_complete(&self) {}
}

/// Default hook: every proxiable member is intercepted.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllMembersHook;

impl GenerationHook for AllMembersHook {
    fn should_intercept(&self, _ty: &TypeDef, _method: &MethodDef) -> bool {
        true
    }
}

/// Host policy deciding whether internal members of a type may be proxied.
///
/// Replaces a same-assembly check: the host names the types whose internals
/// this generator is trusted to see.
pub trait VisibilityPolicy: Send + Sync {
    /// Whether internal members of `ty` are visible to generated types.
    fn internals_visible(&self, ty: &TypeDef) -> bool;
}

/// Default policy: internals are never visible.
#[derive(Debug, Default, Clone, Copy)]
pub struct SealedInternals;

impl VisibilityPolicy for SealedInternals {
    fn internals_visible(&self, _ty: &TypeDef) -> bool {
        false
    }
}

/// Host policy extending the attribute exclusion list.
pub trait AttributePolicy: Send + Sync {
    /// Whether `attribute` should be withheld from replication.
    fn exclude(&self, _attribute: &AttributeDef) -> bool {
        false
    }
}

/// Default policy: everything outside the fixed exclusion list replicates.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReplicateAll;

impl AttributePolicy for ReplicateAll {}

/// One mixin registration: an interface and the instance backing it.
#[derive(Debug, Clone)]
pub struct MixinEntry {
    /// Interface the mixin contributes to the generated type
    pub interface: TypeId,
    /// Instance that backs the interface's members
    pub instance: Value,
}

/// Ordered mixin interface -> instance map. Mixin interfaces are unique.
#[derive(Debug, Clone, Default)]
pub struct MixinRegistry {
    entries: Vec<MixinEntry>,
}

impl MixinRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mixin. Registering the same interface twice is a
    /// configuration error.
    pub fn add(&mut self, interface: TypeId, instance: Value) -> GenResult<()> {
        if self.entries.iter().any(|e| e.interface == interface) {
            return Err(GenerationError::MixinCollision { interface });
        }
        self.entries.push(MixinEntry {
            interface,
            instance,
        });
        Ok(())
    }

    /// Entries in registration order.
    pub fn entries(&self) -> &[MixinEntry] {
        &self.entries
    }

    /// Number of registered mixins.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no mixins are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mixin instances in registration order.
    pub fn instances(&self) -> Vec<Value> {
        self.entries.iter().map(|e| e.instance.clone()).collect()
    }

    fn hash_into(&self, hasher: &mut impl Hasher) {
        hasher.write_usize(self.entries.len());
        for entry in &self.entries {
            entry.interface.hash(hasher);
            // The instance's registered type shapes backing resolution, so
            // it is part of the generation signature; the instance itself
            // is a constructor argument and is not.
            if let Some(instance) = entry.instance.as_instance() {
                instance.type_id().hash(hasher);
            }
        }
    }
}

static DEFAULT_HOOK: Lazy<Arc<dyn GenerationHook>> = Lazy::new(|| Arc::new(AllMembersHook));
static DEFAULT_ATTRIBUTE_POLICY: Lazy<Arc<dyn AttributePolicy>> =
    Lazy::new(|| Arc::new(ReplicateAll));
static DEFAULT_VISIBILITY_POLICY: Lazy<Arc<dyn VisibilityPolicy>> =
    Lazy::new(|| Arc::new(SealedInternals));

/// Immutable configuration for one family of generated types.
#[derive(Clone)]
pub struct ProxyGenerationOptions {
    hook: Arc<dyn GenerationHook>,
    selector: Option<Arc<dyn InterceptorSelector>>,
    attribute_policy: Arc<dyn AttributePolicy>,
    visibility_policy: Arc<dyn VisibilityPolicy>,
    mixins: MixinRegistry,
}

impl std::fmt::Debug for ProxyGenerationOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyGenerationOptions")
            .field("has_selector", &self.selector.is_some())
            .field("mixins", &self.mixins)
            .finish_non_exhaustive()
    }
}

impl Default for ProxyGenerationOptions {
    fn default() -> Self {
        Self {
            hook: Arc::clone(&DEFAULT_HOOK),
            selector: None,
            attribute_policy: Arc::clone(&DEFAULT_ATTRIBUTE_POLICY),
            visibility_policy: Arc::clone(&DEFAULT_VISIBILITY_POLICY),
            mixins: MixinRegistry::new(),
        }
    }
}

impl ProxyGenerationOptions {
    /// Default options: all members intercepted, no selector, no mixins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the member-selection hook.
    pub fn with_hook(mut self, hook: Arc<dyn GenerationHook>) -> Self {
        self.hook = hook;
        self
    }

    /// Configure an interceptor selector. This switches every invocation
    /// construct of the generated type to the selector shape; the decision
    /// is whole-type, not per member or per call.
    pub fn with_selector(mut self, selector: Arc<dyn InterceptorSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Replace the attribute replication policy.
    pub fn with_attribute_policy(mut self, policy: Arc<dyn AttributePolicy>) -> Self {
        self.attribute_policy = policy;
        self
    }

    /// Replace the visibility policy.
    pub fn with_visibility_policy(mut self, policy: Arc<dyn VisibilityPolicy>) -> Self {
        self.visibility_policy = policy;
        self
    }

    /// Register a mixin contributing `interface`, backed by `instance`.
    pub fn with_mixin(mut self, interface: TypeId, instance: Value) -> GenResult<Self> {
        self.mixins.add(interface, instance)?;
        Ok(self)
    }

    /// The member-selection hook.
    pub fn hook(&self) -> &Arc<dyn GenerationHook> {
        &self.hook
    }

    /// The interceptor selector, if configured.
    pub fn selector(&self) -> Option<&Arc<dyn InterceptorSelector>> {
        self.selector.as_ref()
    }

    /// The attribute replication policy.
    pub fn attribute_policy(&self) -> &Arc<dyn AttributePolicy> {
        &self.attribute_policy
    }

    /// The visibility policy.
    pub fn visibility_policy(&self) -> &Arc<dyn VisibilityPolicy> {
        &self.visibility_policy
    }

    /// The mixin registry.
    pub fn mixins(&self) -> &MixinRegistry {
        &self.mixins
    }

    /// Stable signature of this configuration for the type-cache key.
    ///
    /// Hook, selector, and policies contribute by reference identity; the
    /// shared defaults therefore hash equal across independently obtained
    /// default option sets. Custom hooks must be reused (the same `Arc`) to
    /// share a cached type.
    pub fn signature(&self) -> u64 {
        let mut hasher = FxHasher::default();
        hasher.write_usize(Arc::as_ptr(&self.hook) as *const () as usize);
        match &self.selector {
            Some(selector) => {
                hasher.write_u8(1);
                hasher.write_usize(Arc::as_ptr(selector) as *const () as usize);
            }
            None => hasher.write_u8(0),
        }
        hasher.write_usize(Arc::as_ptr(&self.attribute_policy) as *const () as usize);
        hasher.write_usize(Arc::as_ptr(&self.visibility_policy) as *const () as usize);
        self.mixins.hash_into(&mut hasher);
        hasher.finish()
    }
}

/// Set-at-most-once holder for generation options.
///
/// Reading before set and setting twice are programming errors reported as
/// distinct conditions, never silently ignored.
#[derive(Default)]
pub struct OptionsSlot {
    cell: OnceCell<ProxyGenerationOptions>,
}

impl OptionsSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the options. Fails if they were already set.
    pub fn set(&self, options: ProxyGenerationOptions) -> GenResult<()> {
        self.cell
            .set(options)
            .map_err(|_| GenerationError::OptionsAlreadySet)
    }

    /// Read the options. Fails if they were never set.
    pub fn get(&self) -> GenResult<&ProxyGenerationOptions> {
        self.cell.get().ok_or(GenerationError::OptionsNotSet)
    }
}
