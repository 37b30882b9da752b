//! Top-level proxy generation
//!
//! A [`ProxyGenerator`] owns one registry, one emission backend, and one
//! type cache; it is passed explicitly wherever proxies are created rather
//! than living as ambient global state, so tests can instantiate
//! independent generators. A request reduces to a cache-key lookup; on a
//! miss the per-request [`TypeSynthesizer`] runs the contributor pipeline,
//! the member and constructor implementers, and attribute replication, then
//! finalizes the type through the backend.

use std::sync::Arc;

use veil_model::{TypeDef, TypeId, TypeKind, TypeRegistry, Value};

use crate::attributes::AttributeFilter;
use crate::cache::{CacheKey, TypeCache};
use crate::constructors;
use crate::contributor;
use crate::emit::{
    CtorArgs, DynamicEmitter, ProxyHandle, SynthesizedType, TypeDeclHeader, TypeEmitter,
};
use crate::implementer;
use crate::interceptor::Interceptor;
use crate::options::{OptionsSlot, ProxyGenerationOptions};
use crate::{GenResult, GenerationError};

/// One proxy creation request.
pub struct ProxyRequest {
    target_type: TypeId,
    target: Option<Value>,
    extra_interfaces: Vec<TypeId>,
    options: Option<ProxyGenerationOptions>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    base_args: Vec<Value>,
}

impl ProxyRequest {
    /// Request a proxy for `target_type` with no target, no extra
    /// interfaces, and default options.
    pub fn new(target_type: TypeId) -> Self {
        Self {
            target_type,
            target: None,
            extra_interfaces: Vec::new(),
            options: None,
            interceptors: Vec::new(),
            base_args: Vec::new(),
        }
    }

    /// Forward calls to `target` when no interceptor short-circuits.
    pub fn with_target(mut self, target: Value) -> Self {
        self.target = Some(target);
        self
    }

    /// Implement an additional interface on the generated type.
    pub fn with_extra_interface(mut self, interface: TypeId) -> Self {
        self.extra_interfaces.push(interface);
        self
    }

    /// Use non-default generation options.
    pub fn with_options(mut self, options: ProxyGenerationOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Append an interceptor to the chain.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Forward arguments to the mirrored base constructor.
    pub fn with_base_args(mut self, args: Vec<Value>) -> Self {
        self.base_args = args;
        self
    }
}

/// Process-scoped proxy generator: registry, backend, and type cache.
pub struct ProxyGenerator {
    registry: Arc<TypeRegistry>,
    emitter: Arc<dyn TypeEmitter>,
    cache: TypeCache,
}

impl ProxyGenerator {
    /// Create a generator over the given backend.
    pub fn new(registry: Arc<TypeRegistry>, emitter: Arc<dyn TypeEmitter>) -> Self {
        Self {
            registry,
            emitter,
            cache: TypeCache::new(),
        }
    }

    /// Create a generator using the dynamic (interpreted) backend.
    pub fn with_dynamic_backend(registry: Arc<TypeRegistry>) -> Self {
        let emitter = Arc::new(DynamicEmitter::new(Arc::clone(&registry)));
        Self::new(registry, emitter)
    }

    /// The reflection registry this generator reads.
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The type cache.
    pub fn cache(&self) -> &TypeCache {
        &self.cache
    }

    /// The type-generation step: return the synthesized proxy type for the
    /// request signature, reusing the cached type when one exists.
    pub fn proxy_type(
        &self,
        target_type: TypeId,
        target: Option<&Value>,
        extra_interfaces: &[TypeId],
        options: &ProxyGenerationOptions,
    ) -> GenResult<Arc<dyn SynthesizedType>> {
        let target_def = self.registry.resolve(target_type)?;
        if target_def.is_open_generic() {
            return Err(GenerationError::OpenGenericType {
                name: target_def.name.clone(),
            });
        }
        let backing_type = match target {
            Some(value) => Some(self.validate_target(target_type, target_def, value)?),
            None => None,
        };

        let key = CacheKey::new(target_type, backing_type, extra_interfaces, options);
        self.cache.get_or_create(&key, || {
            let synthesizer =
                TypeSynthesizer::new(Arc::clone(&self.registry), Arc::clone(&self.emitter));
            synthesizer.set_options(options.clone())?;
            synthesizer.run(target_type, backing_type, extra_interfaces)
        })
    }

    /// Create a proxy instance: synthesize (or reuse) the type, pick the
    /// constructor matching the base arguments, and instantiate it.
    pub fn create_proxy(&self, request: ProxyRequest) -> GenResult<ProxyHandle> {
        let options = request.options.unwrap_or_default();
        let ty = self.proxy_type(
            request.target_type,
            request.target.as_ref(),
            &request.extra_interfaces,
            &options,
        )?;
        let ctor = ty.find_ctor(request.base_args.len()).ok_or_else(|| {
            GenerationError::NoMatchingConstructor {
                type_name: ty.name().to_string(),
                arity: request.base_args.len(),
            }
        })?;
        let handle = ty
            .instantiate(
                ctor,
                CtorArgs {
                    interceptors: request.interceptors,
                    target: request.target,
                    mixins: options.mixins().instances(),
                    base_args: request.base_args,
                },
            )
            .map_err(GenerationError::Construction)?;
        log::debug!("created proxy instance of `{}`", handle.type_name());
        Ok(handle)
    }

    fn validate_target(
        &self,
        target_type: TypeId,
        target_def: &TypeDef,
        value: &Value,
    ) -> GenResult<TypeId> {
        let instance = value
            .as_instance()
            .ok_or_else(|| GenerationError::TargetTypeMismatch {
                expected: target_def.name.clone(),
                actual: "<non-instance value>".to_string(),
            })?;
        let actual = instance.type_id();
        let assignable = match target_def.kind {
            TypeKind::Class => self.registry.extends(actual, target_type),
            TypeKind::Interface => {
                actual == target_type || {
                    let roots = self.registry.class_interface_roots(actual)?;
                    self.registry.interface_closure(&roots)?.contains(&target_type)
                }
            }
        };
        if assignable {
            Ok(actual)
        } else {
            Err(GenerationError::TargetTypeMismatch {
                expected: target_def.name.clone(),
                actual: self.registry.name_of(actual),
            })
        }
    }
}

/// Per-request synthesizer. Options are set at most once and read
/// thereafter; violating either direction is a reported error.
pub struct TypeSynthesizer {
    registry: Arc<TypeRegistry>,
    emitter: Arc<dyn TypeEmitter>,
    options: OptionsSlot,
}

impl TypeSynthesizer {
    /// Create a synthesizer with unset options.
    pub fn new(registry: Arc<TypeRegistry>, emitter: Arc<dyn TypeEmitter>) -> Self {
        Self {
            registry,
            emitter,
            options: OptionsSlot::new(),
        }
    }

    /// Set the generation options. Fails when already set.
    pub fn set_options(&self, options: ProxyGenerationOptions) -> GenResult<()> {
        self.options.set(options)
    }

    /// Read the generation options. Fails when never set.
    pub fn options(&self) -> GenResult<&ProxyGenerationOptions> {
        self.options.get()
    }

    /// Synthesize the proxy type for one request.
    pub fn run(
        &self,
        target_type: TypeId,
        backing_type: Option<TypeId>,
        extra_interfaces: &[TypeId],
    ) -> GenResult<Arc<dyn SynthesizedType>> {
        let options = self.options.get()?;
        let target_def = self.registry.resolve(target_type)?;
        let plan = contributor::collect(
            &self.registry,
            target_type,
            backing_type,
            extra_interfaces,
            options,
        )?;
        let filter = AttributeFilter::new(Arc::clone(options.attribute_policy()));

        let mut assembler = self.emitter.declare_type(TypeDeclHeader {
            name: format!("{}$Proxy", target_def.name),
            nominal: target_type,
            base: plan.base,
            interfaces: plan.declared_interfaces.clone(),
            attributes: filter.replicable(&target_def.attributes),
        });
        for field in plan.layout.names() {
            assembler.declare_field(&field);
        }
        implementer::implement_members(
            &self.registry,
            options,
            &plan,
            &filter,
            assembler.as_mut(),
        )?;
        constructors::synthesize_ctors(&self.registry, options, &plan, assembler.as_mut())?;

        let ty = assembler.finalize()?;
        log::debug!(
            "synthesized `{}`: {} member(s), {} interface(s)",
            ty.name(),
            ty.member_names().len(),
            ty.interfaces().len()
        );
        Ok(ty)
    }
}
