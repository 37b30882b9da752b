//! Member contributor pipeline
//!
//! Discovers every method, property, and event the generated type must
//! override, from three kinds of sources: the target type (its class chain
//! and interface closure), each explicitly requested extra interface, and
//! each mixin. Every reachable interface lands in the interface map exactly
//! once — first writer wins, with the target's own interfaces taking
//! priority — and a mixin colliding with another non-target source is a
//! configuration error naming both.

use rustc_hash::{FxHashMap, FxHashSet};

use std::fmt;

use veil_model::{
    AttributeDef, MemberId, MethodDef, TypeDef, TypeId, TypeKind, TypeRegistry, Visibility,
};

use crate::options::ProxyGenerationOptions;
use crate::{GenResult, GenerationError};

/// Whether the generated type forwards to a live target instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// Calls forward to a backing target instance
    WithTarget,
    /// No target; unbacked members fail fast unless an interceptor
    /// short-circuits
    WithoutTarget,
}

/// The source backing one generated member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributorKind {
    /// The target instance
    Target,
    /// The mixin instance at the given registration index
    Mixin(usize),
    /// No instance; the member still gets a body routing to a fail-fast stub
    Unbacked,
}

/// Role of an interface's contributor, used in collision diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContributorRole {
    /// Contributed by the proxy target
    Target,
    /// Contributed by an explicitly requested additional interface
    ExtraInterface,
    /// Contributed by the named mixin
    Mixin(String),
}

impl fmt::Display for ContributorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContributorRole::Target => f.write_str("the proxy target"),
            ContributorRole::ExtraInterface => f.write_str("an explicitly requested interface"),
            ContributorRole::Mixin(name) => write!(f, "mixin `{name}`"),
        }
    }
}

/// One member the generated type must override.
#[derive(Debug, Clone)]
pub struct MemberToGenerate {
    /// The declared member (on the target class chain or an interface)
    pub declared: MemberId,
    /// The backing member the terminal callback invokes, if any
    pub backing: Option<MemberId>,
    /// Who backs the member at runtime
    pub contributor: ContributorKind,
    /// Standalone members are generated directly; accessor members are
    /// generated through their owning property or event
    pub standalone: bool,
}

/// A property to generate, grouping its surviving accessors.
#[derive(Debug, Clone)]
pub struct PropertyToGenerate {
    /// Property name
    pub name: String,
    /// Getter accessor, absent when missing or skipped by the hook
    pub getter: Option<MemberToGenerate>,
    /// Setter accessor, absent when missing or skipped by the hook
    pub setter: Option<MemberToGenerate>,
    /// Attributes replicated onto the generated property
    pub attributes: Vec<AttributeDef>,
}

/// An event to generate, grouping its subscribe accessors.
#[derive(Debug, Clone)]
pub struct EventToGenerate {
    /// Event name
    pub name: String,
    /// Add accessor
    pub add: MemberToGenerate,
    /// Remove accessor
    pub remove: MemberToGenerate,
    /// Attributes replicated onto the generated event
    pub attributes: Vec<AttributeDef>,
}

/// Field slots of the generated type: interceptors first, then the target
/// reference (when present), then one slot per mixin registration.
#[derive(Debug, Clone)]
pub struct FieldLayout {
    /// Slot of the interceptor chain
    pub interceptors: usize,
    /// Slot of the target reference, for proxies with a target
    pub target: Option<usize>,
    /// Slot per mixin registration, in registration order
    pub mixins: Vec<usize>,
}

impl FieldLayout {
    fn build(kind: ProxyKind, mixin_count: usize) -> Self {
        let target = match kind {
            ProxyKind::WithTarget => Some(1),
            ProxyKind::WithoutTarget => None,
        };
        let first_mixin = 1 + usize::from(target.is_some());
        Self {
            interceptors: 0,
            target,
            mixins: (0..mixin_count).map(|i| first_mixin + i).collect(),
        }
    }

    /// Total field count.
    pub fn count(&self) -> usize {
        1 + usize::from(self.target.is_some()) + self.mixins.len()
    }

    /// Field names in slot order.
    pub fn names(&self) -> Vec<String> {
        let mut names = vec!["interceptors".to_string()];
        if self.target.is_some() {
            names.push("target".to_string());
        }
        for i in 0..self.mixins.len() {
            names.push(format!("mixin_{i}"));
        }
        names
    }
}

/// Stable map from mixin interface to the field holding its instance.
pub type MixinFieldMap = FxHashMap<TypeId, usize>;

/// Everything the implementers need to generate one proxy type.
#[derive(Debug, Clone)]
pub struct ProxyPlan {
    /// The proxied type
    pub target_type: TypeId,
    /// Type whose members back terminal callbacks, absent without a target
    pub backing_type: Option<TypeId>,
    /// Whether a target instance backs the proxy
    pub kind: ProxyKind,
    /// Base class of the generated type (class targets only)
    pub base: Option<TypeId>,
    /// Interface closure in generation order
    pub declared_interfaces: Vec<TypeId>,
    /// Standalone methods to generate
    pub methods: Vec<MemberToGenerate>,
    /// Properties to generate
    pub properties: Vec<PropertyToGenerate>,
    /// Events to generate
    pub events: Vec<EventToGenerate>,
    /// Mixin interface to field slot
    pub mixin_fields: MixinFieldMap,
    /// Field slots of the generated type
    pub layout: FieldLayout,
}

#[derive(Clone)]
struct InterfaceSource {
    role: ContributorRole,
    mixin: Option<usize>,
}

/// Run the pipeline for one generation request.
pub fn collect(
    registry: &TypeRegistry,
    target_type: TypeId,
    backing_type: Option<TypeId>,
    extra_interfaces: &[TypeId],
    options: &ProxyGenerationOptions,
) -> GenResult<ProxyPlan> {
    let target_def = registry.resolve(target_type)?;
    if target_def.is_open_generic() {
        return Err(GenerationError::OpenGenericType {
            name: target_def.name.clone(),
        });
    }
    let kind = if backing_type.is_some() {
        ProxyKind::WithTarget
    } else {
        ProxyKind::WithoutTarget
    };

    let layout = FieldLayout::build(kind, options.mixins().len());
    let mut order: Vec<TypeId> = Vec::new();
    let mut sources: FxHashMap<TypeId, InterfaceSource> = FxHashMap::default();
    let mut mixin_fields: MixinFieldMap = FxHashMap::default();

    // Target interfaces claim their slots first
    let target_roots = match target_def.kind {
        TypeKind::Interface => vec![target_type],
        TypeKind::Class => registry.class_interface_roots(target_type)?,
    };
    for interface in registry.interface_closure(&target_roots)? {
        order.push(interface);
        sources.insert(
            interface,
            InterfaceSource {
                role: ContributorRole::Target,
                mixin: None,
            },
        );
    }

    // Explicitly requested interfaces; duplicates of target interfaces keep
    // the target backing
    for interface in registry.interface_closure(extra_interfaces)? {
        sources.entry(interface).or_insert_with(|| {
            order.push(interface);
            InterfaceSource {
                role: ContributorRole::ExtraInterface,
                mixin: None,
            }
        });
    }

    // Mixins; a collision with anything but the target is a configuration
    // error naming both sources
    for (index, entry) in options.mixins().entries().iter().enumerate() {
        let attempted = ContributorRole::Mixin(registry.name_of(entry.interface));
        for interface in registry.interface_closure(&[entry.interface])? {
            match sources.get(&interface) {
                None => {
                    order.push(interface);
                    sources.insert(
                        interface,
                        InterfaceSource {
                            role: attempted.clone(),
                            mixin: Some(index),
                        },
                    );
                    mixin_fields.insert(interface, layout.mixins[index]);
                }
                Some(existing) if existing.role == ContributorRole::Target => {}
                Some(existing) => {
                    return Err(GenerationError::InterfaceAlreadyImplemented {
                        interface: registry.name_of(interface),
                        existing: existing.role.clone(),
                        attempted,
                    });
                }
            }
        }
    }

    let backing_interfaces = match backing_type {
        Some(backing) => implemented_interfaces(registry, backing)?,
        None => FxHashSet::default(),
    };
    let mut mixin_backing = Vec::with_capacity(options.mixins().len());
    for entry in options.mixins().entries() {
        mixin_backing.push(match entry.instance.as_instance() {
            Some(instance) => {
                let mixin_type = instance.type_id();
                Some((mixin_type, implemented_interfaces(registry, mixin_type)?))
            }
            None => None,
        });
    }

    let mut collector = MemberCollector {
        registry,
        options,
        kind,
        backing_type,
        backing_interfaces,
        mixin_backing,
        processed: FxHashSet::default(),
        methods: Vec::new(),
        properties: Vec::new(),
        events: Vec::new(),
        seen_signatures: FxHashSet::default(),
        seen_properties: FxHashSet::default(),
        seen_events: FxHashSet::default(),
    };

    if target_def.kind == TypeKind::Class {
        collector.collect_from_class_chain(target_type)?;
    }
    for interface in &order {
        let source = sources
            .get(interface)
            .cloned()
            .unwrap_or_else(|| InterfaceSource {
                role: ContributorRole::Target,
                mixin: None,
            });
        collector.collect_from_interface(*interface, &source)?;
    }
    options.hook().inspection_complete();

    Ok(ProxyPlan {
        target_type,
        backing_type,
        kind,
        base: (target_def.kind == TypeKind::Class).then_some(target_type),
        declared_interfaces: order,
        methods: collector.methods,
        properties: collector.properties,
        events: collector.events,
        mixin_fields,
        layout,
    })
}

struct MemberCollector<'a> {
    registry: &'a TypeRegistry,
    options: &'a ProxyGenerationOptions,
    kind: ProxyKind,
    backing_type: Option<TypeId>,
    /// Interfaces the backing type actually implements; interface members
    /// only resolve a backing when their declaring interface is among them
    backing_interfaces: FxHashSet<TypeId>,
    mixin_backing: Vec<Option<(TypeId, FxHashSet<TypeId>)>>,
    /// Members already run through the hook; skipped members stay here so
    /// they are never re-processed
    processed: FxHashSet<MemberId>,
    methods: Vec<MemberToGenerate>,
    properties: Vec<PropertyToGenerate>,
    events: Vec<EventToGenerate>,
    seen_signatures: FxHashSet<(String, usize)>,
    seen_properties: FxHashSet<String>,
    seen_events: FxHashSet<String>,
}

impl MemberCollector<'_> {
    fn collect_from_class_chain(&mut self, start: TypeId) -> GenResult<()> {
        let mut current = Some(start);
        while let Some(class_id) = current {
            let def = self.registry.resolve(class_id)?;
            let accessors = accessor_indices(def);

            for property in &def.properties {
                if !self.seen_properties.insert(property.name.clone()) {
                    continue;
                }
                self.collect_property(def, class_id, property.name.clone(), property, None, None)?;
            }
            for event in &def.events {
                if !self.seen_events.insert(event.name.clone()) {
                    continue;
                }
                self.collect_event(def, class_id, event, None, None)?;
            }
            for (index, method) in def.methods.iter().enumerate() {
                if accessors.contains(&index) {
                    continue;
                }
                if !self
                    .seen_signatures
                    .insert((method.name.clone(), method.params.len()))
                {
                    // Overridden further down the chain
                    continue;
                }
                let declared = MemberId::new(class_id, index);
                if let Some(member) = self.member_for(def, declared, method, None, None, true)? {
                    self.methods.push(member);
                }
            }
            current = def.base;
        }
        Ok(())
    }

    fn collect_from_interface(
        &mut self,
        interface: TypeId,
        source: &InterfaceSource,
    ) -> GenResult<()> {
        let def = self.registry.resolve(interface)?;
        let accessors = accessor_indices(def);

        for property in &def.properties {
            if !self.seen_properties.insert(property.name.clone()) {
                continue;
            }
            self.collect_property(
                def,
                interface,
                property.name.clone(),
                property,
                source.mixin,
                Some(interface),
            )?;
        }
        for event in &def.events {
            if !self.seen_events.insert(event.name.clone()) {
                continue;
            }
            self.collect_event(def, interface, event, source.mixin, Some(interface))?;
        }
        for (index, method) in def.methods.iter().enumerate() {
            if accessors.contains(&index) {
                continue;
            }
            let declared = MemberId::new(interface, index);
            if let Some(member) =
                self.member_for(def, declared, method, source.mixin, Some(interface), true)?
            {
                self.methods.push(member);
            }
        }
        Ok(())
    }

    fn collect_property(
        &mut self,
        def: &TypeDef,
        declaring: TypeId,
        name: String,
        property: &veil_model::PropertyDef,
        mixin: Option<usize>,
        iface: Option<TypeId>,
    ) -> GenResult<()> {
        let getter = match property.getter {
            Some(index) => self.accessor_for(def, declaring, index, mixin, iface)?,
            None => None,
        };
        let setter = match property.setter {
            Some(index) => self.accessor_for(def, declaring, index, mixin, iface)?,
            None => None,
        };
        if getter.is_none() && setter.is_none() {
            return Ok(());
        }
        self.properties.push(PropertyToGenerate {
            name,
            getter,
            setter,
            attributes: property.attributes.clone(),
        });
        Ok(())
    }

    fn collect_event(
        &mut self,
        def: &TypeDef,
        declaring: TypeId,
        event: &veil_model::EventDef,
        mixin: Option<usize>,
        iface: Option<TypeId>,
    ) -> GenResult<()> {
        let add = self.accessor_for(def, declaring, event.add, mixin, iface)?;
        let remove = self.accessor_for(def, declaring, event.remove, mixin, iface)?;
        // An event needs both accessors; a hook skipping either drops it
        if let (Some(add), Some(remove)) = (add, remove) {
            self.events.push(EventToGenerate {
                name: event.name.clone(),
                add,
                remove,
                attributes: event.attributes.clone(),
            });
        }
        Ok(())
    }

    fn accessor_for(
        &mut self,
        def: &TypeDef,
        declaring: TypeId,
        index: usize,
        mixin: Option<usize>,
        iface: Option<TypeId>,
    ) -> GenResult<Option<MemberToGenerate>> {
        let Some(method) = def.method(index) else {
            return Ok(None);
        };
        self.seen_signatures
            .insert((method.name.clone(), method.params.len()));
        self.member_for(def, MemberId::new(declaring, index), method, mixin, iface, false)
    }

    fn member_for(
        &mut self,
        def: &TypeDef,
        declared: MemberId,
        method: &MethodDef,
        mixin: Option<usize>,
        iface: Option<TypeId>,
        standalone: bool,
    ) -> GenResult<Option<MemberToGenerate>> {
        if !self.processed.insert(declared) {
            return Ok(None);
        }
        match method.visibility {
            Visibility::Private => {
                self.options.hook().non_proxyable_member(def, &method.name);
                return Ok(None);
            }
            Visibility::Internal
                if !self.options.visibility_policy().internals_visible(def) =>
            {
                self.options.hook().non_proxyable_member(def, &method.name);
                return Ok(None);
            }
            _ => {}
        }
        if !self.options.hook().should_intercept(def, method) {
            return Ok(None);
        }
        let (contributor, backing) = self.backing_for(method, mixin, iface);
        Ok(Some(MemberToGenerate {
            declared,
            backing,
            contributor,
            standalone,
        }))
    }

    /// Resolve the backing member. Interface members only bind to a source
    /// that actually implements their declaring interface; a name match
    /// alone is not an implementation.
    fn backing_for(
        &self,
        method: &MethodDef,
        mixin: Option<usize>,
        iface: Option<TypeId>,
    ) -> (ContributorKind, Option<MemberId>) {
        match mixin {
            Some(index) => {
                let backing = self
                    .mixin_backing
                    .get(index)
                    .and_then(Option::as_ref)
                    .filter(|(_, implemented)| {
                        iface.map_or(true, |declaring| implemented.contains(&declaring))
                    })
                    .and_then(|(mixin_type, _)| {
                        self.concrete_member(*mixin_type, method)
                    });
                match backing {
                    Some(member) => (ContributorKind::Mixin(index), Some(member)),
                    None => (ContributorKind::Unbacked, None),
                }
            }
            None => match (self.kind, self.backing_type) {
                (ProxyKind::WithTarget, Some(backing_type)) => {
                    let implements_declaring = iface
                        .map_or(true, |declaring| self.backing_interfaces.contains(&declaring));
                    match implements_declaring
                        .then(|| self.concrete_member(backing_type, method))
                        .flatten()
                    {
                        Some(member) => (ContributorKind::Target, Some(member)),
                        None => (ContributorKind::Unbacked, None),
                    }
                }
                _ => (ContributorKind::Unbacked, None),
            },
        }
    }

    /// Find a body-bearing member matching `method` on a type's class chain.
    fn concrete_member(&self, start: TypeId, method: &MethodDef) -> Option<MemberId> {
        let member = find_on_chain(self.registry, start, &method.name, method.params.len())?;
        self.registry
            .method(member)
            .is_some_and(|m| m.body.is_some())
            .then_some(member)
    }
}

/// Every interface a type implements: the type itself when it is an
/// interface, otherwise the closure over its class chain's declarations.
fn implemented_interfaces(
    registry: &TypeRegistry,
    id: TypeId,
) -> GenResult<FxHashSet<TypeId>> {
    let def = registry.resolve(id)?;
    let roots = if def.is_interface() {
        vec![id]
    } else {
        registry.class_interface_roots(id)?
    };
    Ok(registry.interface_closure(&roots)?.into_iter().collect())
}

fn accessor_indices(def: &TypeDef) -> FxHashSet<usize> {
    let mut indices = FxHashSet::default();
    for property in &def.properties {
        if let Some(getter) = property.getter {
            indices.insert(getter);
        }
        if let Some(setter) = property.setter {
            indices.insert(setter);
        }
    }
    for event in &def.events {
        indices.insert(event.add);
        indices.insert(event.remove);
    }
    indices
}

fn find_on_chain(
    registry: &TypeRegistry,
    start: TypeId,
    name: &str,
    arity: usize,
) -> Option<MemberId> {
    let mut current = Some(start);
    while let Some(class_id) = current {
        let def = registry.get(class_id)?;
        if let Some(index) = def.find_method(name, arity) {
            return Some(MemberId::new(class_id, index));
        }
        current = def.base;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::GenerationHook;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use veil_model::{CtorDef, ParamDef, PropertyDef, Value};

    fn fixture() -> (TypeRegistry, TypeId, TypeId) {
        let mut registry = TypeRegistry::new();
        let greeter = registry
            .register(
                TypeDef::interface("IGreeter")
                    .with_method(MethodDef::new("greet").with_param(ParamDef::new("name")).returns()),
            )
            .unwrap();
        let service = registry
            .register(
                TypeDef::class("Service")
                    .implements(greeter)
                    .with_ctor(CtorDef::public())
                    .with_method(
                        MethodDef::new("greet")
                            .with_param(ParamDef::new("name"))
                            .returns()
                            .with_body(|_, args, _| Ok(args[0].clone())),
                    )
                    .with_method(
                        MethodDef::new("purge").visibility(Visibility::Private).with_body(
                            |_, _, _| Ok(Value::Null),
                        ),
                    ),
            )
            .unwrap();
        (registry, greeter, service)
    }

    #[test]
    fn test_target_interface_wins_over_duplicate_extra() {
        let (registry, greeter, service) = fixture();
        let options = ProxyGenerationOptions::default();

        let plan = collect(&registry, service, Some(service), &[greeter], &options).unwrap();

        // IGreeter appears once, contributed by the target
        assert_eq!(plan.declared_interfaces, vec![greeter]);
        // Class member `greet` plus the interface's `greet`, both backed
        let backed: Vec<_> = plan
            .methods
            .iter()
            .filter(|m| m.contributor == ContributorKind::Target)
            .collect();
        assert_eq!(backed.len(), 2);
        assert!(plan.methods.iter().all(|m| m.backing.is_some()
            || m.contributor == ContributorKind::Unbacked));
    }

    #[test]
    fn test_mixin_duplicating_extra_interface_fails() {
        let (mut registry, greeter, service) = fixture();
        let audit = registry
            .register(TypeDef::interface("IAudit").with_method(MethodDef::new("flush")))
            .unwrap();
        struct AuditImpl;
        let mixin_ty = registry
            .register(
                TypeDef::class("AuditImpl")
                    .implements(audit)
                    .with_method(MethodDef::new("flush").with_body(|_, _, _| Ok(Value::Null))),
            )
            .unwrap();

        let options = ProxyGenerationOptions::default()
            .with_mixin(audit, Value::instance(mixin_ty, Arc::new(AuditImpl)))
            .unwrap();

        let err = collect(&registry, service, Some(service), &[audit], &options).unwrap_err();
        match err {
            GenerationError::InterfaceAlreadyImplemented {
                interface,
                existing,
                attempted,
            } => {
                assert_eq!(interface, "IAudit");
                assert_eq!(existing, ContributorRole::ExtraInterface);
                assert_eq!(attempted, ContributorRole::Mixin("IAudit".to_string()));
            }
            other => panic!("unexpected error: {other}"),
        }

        // The same mixin with a disjoint interface set succeeds
        let plan = collect(&registry, service, Some(service), &[greeter], &options).unwrap();
        assert!(plan.declared_interfaces.contains(&audit));
        let mixed: Vec<_> = plan
            .methods
            .iter()
            .filter(|m| matches!(m.contributor, ContributorKind::Mixin(0)))
            .collect();
        assert_eq!(mixed.len(), 1);
        assert_eq!(plan.mixin_fields.get(&audit), Some(&2));
    }

    #[test]
    fn test_unimplemented_extra_interface_is_unbacked() {
        let (mut registry, _greeter, service) = fixture();
        let extra = registry
            .register(TypeDef::interface("IExtra").with_method(MethodDef::new("poke")))
            .unwrap();
        let options = ProxyGenerationOptions::default();

        let plan = collect(&registry, service, Some(service), &[extra], &options).unwrap();
        let poke = plan
            .methods
            .iter()
            .find(|m| m.declared.type_id == extra)
            .unwrap();
        assert_eq!(poke.contributor, ContributorKind::Unbacked);
        assert!(poke.backing.is_none());
    }

    #[test]
    fn test_hook_skip_excludes_member() {
        struct SkipGreet;
        impl GenerationHook for SkipGreet {
            fn should_intercept(&self, _ty: &TypeDef, method: &MethodDef) -> bool {
                method.name != "greet"
            }
        }
        let (registry, _greeter, service) = fixture();
        let options = ProxyGenerationOptions::default().with_hook(Arc::new(SkipGreet));

        let plan = collect(&registry, service, Some(service), &[], &options).unwrap();
        assert!(plan.methods.is_empty());
    }

    #[test]
    fn test_private_member_reported_non_proxyable() {
        struct NotifyHook {
            reported: Arc<Mutex<Vec<String>>>,
        }
        impl GenerationHook for NotifyHook {
            fn should_intercept(&self, _ty: &TypeDef, _method: &MethodDef) -> bool {
                true
            }
            fn non_proxyable_member(&self, _ty: &TypeDef, member: &str) {
                self.reported.lock().push(member.to_string());
            }
        }
        let (registry, _greeter, service) = fixture();
        let reported = Arc::new(Mutex::new(Vec::new()));
        let options = ProxyGenerationOptions::default().with_hook(Arc::new(NotifyHook {
            reported: reported.clone(),
        }));

        let plan = collect(&registry, service, Some(service), &[], &options).unwrap();
        assert!(plan.methods.iter().all(|m| {
            registry.method(m.declared).map(|d| d.name.clone()) != Some("purge".to_string())
        }));
        assert_eq!(*reported.lock(), vec!["purge".to_string()]);
    }

    #[test]
    fn test_property_accessors_not_standalone() {
        let mut registry = TypeRegistry::new();
        let iface = registry
            .register(
                TypeDef::interface("INamed")
                    .with_method(MethodDef::new("get_name").returns().special())
                    .with_method(
                        MethodDef::new("set_name")
                            .with_param(ParamDef::new("value"))
                            .special(),
                    )
                    .with_method(MethodDef::new("describe").returns())
                    .with_property(PropertyDef {
                        name: "name".to_string(),
                        getter: Some(0),
                        setter: Some(1),
                        attributes: Vec::new(),
                    }),
            )
            .unwrap();
        let options = ProxyGenerationOptions::default();

        let plan = collect(&registry, iface, None, &[], &options).unwrap();

        // Accessors ride on the property; only `describe` is standalone
        assert_eq!(plan.methods.len(), 1);
        assert_eq!(
            registry.method(plan.methods[0].declared).unwrap().name,
            "describe"
        );
        assert_eq!(plan.properties.len(), 1);
        let property = &plan.properties[0];
        assert_eq!(property.name, "name");
        assert!(property.getter.as_ref().is_some_and(|g| !g.standalone));
        assert!(property.setter.as_ref().is_some_and(|s| !s.standalone));
    }

    #[test]
    fn test_open_generic_target_rejected() {
        let mut registry = TypeRegistry::new();
        let open = registry
            .register(TypeDef::class("Box").generic(&["T"]))
            .unwrap();
        let err = collect(
            &registry,
            open,
            None,
            &[],
            &ProxyGenerationOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GenerationError::OpenGenericType { .. }));
    }
}
