//! Structural type cache
//!
//! Maps a generation signature (target type, backing type, extra interfaces,
//! normalized options) to the synthesized type, guaranteeing at-most-one
//! synthesis per distinct signature even under concurrent callers.
//! Serialization is per key: concurrent identical requests block until the
//! first synthesis completes, while requests for different keys proceed
//! independently.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use veil_model::TypeId;

use crate::emit::SynthesizedType;
use crate::options::ProxyGenerationOptions;
use crate::GenResult;

/// Composite cache key. Equality is structural; extra-interface order does
/// not affect equality (ids are normalized), while the synthesized type's
/// declared interface order still follows generation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    target: TypeId,
    backing: Option<TypeId>,
    extra_interfaces: Vec<TypeId>,
    options_signature: u64,
}

impl CacheKey {
    /// Build the key for one generation request.
    ///
    /// `backing` is the type whose members terminal callbacks invoke (the
    /// target instance's registered type); it shapes the generated
    /// callbacks, so it is part of the signature.
    pub fn new(
        target: TypeId,
        backing: Option<TypeId>,
        extra_interfaces: &[TypeId],
        options: &ProxyGenerationOptions,
    ) -> Self {
        let mut extra_interfaces = extra_interfaces.to_vec();
        extra_interfaces.sort_unstable();
        Self {
            target,
            backing,
            extra_interfaces,
            options_signature: options.signature(),
        }
    }

    /// The proxied type.
    pub fn target(&self) -> TypeId {
        self.target
    }
}

type Slot = Arc<Mutex<Option<Arc<dyn SynthesizedType>>>>;

/// Process-scoped store of synthesized types, keyed structurally.
///
/// One cache belongs to one generator; tests instantiate independent caches
/// rather than sharing ambient global state.
#[derive(Default)]
pub struct TypeCache {
    entries: DashMap<CacheKey, Slot>,
}

impl TypeCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached type for `key`, synthesizing it with `factory` on
    /// first use.
    ///
    /// The factory runs at most once per key even under concurrent callers;
    /// a failing factory leaves nothing cached, so a later call retries.
    pub fn get_or_create(
        &self,
        key: &CacheKey,
        factory: impl FnOnce() -> GenResult<Arc<dyn SynthesizedType>>,
    ) -> GenResult<Arc<dyn SynthesizedType>> {
        let slot = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone();

        let mut guard = slot.lock();
        if let Some(ty) = guard.as_ref() {
            log::trace!("type cache hit for {:?}", key.target);
            return Ok(Arc::clone(ty));
        }
        log::debug!("type cache miss for {:?}; synthesizing", key.target);
        let ty = factory()?;
        *guard = Some(Arc::clone(&ty));
        Ok(ty)
    }

    /// Number of cached types.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().lock().is_some())
            .count()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached type.
    pub fn reset(&self) {
        self.entries.clear();
    }
}
