//! Dynamic (interpreted) emission backend
//!
//! Realizes a synthesized type as a runtime class: a member table keyed by
//! emitted name, a constructor table, a field layout, the invocation
//! descriptor table, and the per-type cache of non-generic member tokens.
//! Instances are [`ProxyObject`]s; invoking a member interprets its IR body
//! on the caller's thread.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use veil_model::{AttributeDef, MemberId, MethodToken, TypeId, TypeRegistry, Value};

use crate::attributes::GENERATED_TYPE_MARKER;
use crate::interceptor::{Interceptor, InterceptorChain, NoopInterceptor};
use crate::invocation::{Invocation, InvocationDescriptor};
use crate::{CallError, CallResult, GenResult, GenerationError};

use super::ir::{Body, Expr, Place, Stmt};
use super::{
    CtorArgs, CtorDecl, MethodDecl, ProxyHandle, ProxyInstance, SynthesizedType, TypeAssembler,
    TypeDeclHeader, TypeEmitter,
};

static NEXT_TYPE_UNIQUE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_PROXY_ID: AtomicU64 = AtomicU64::new(1);

/// The default backend: interprets generated bodies over a runtime class.
pub struct DynamicEmitter {
    registry: Arc<TypeRegistry>,
}

impl DynamicEmitter {
    /// Create a backend over the given registry.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self { registry }
    }
}

impl TypeEmitter for DynamicEmitter {
    fn declare_type(&self, header: TypeDeclHeader) -> Box<dyn TypeAssembler> {
        Box::new(DynamicAssembler {
            registry: Arc::clone(&self.registry),
            header,
            fields: Vec::new(),
            descriptors: Vec::new(),
            methods: FxHashMap::default(),
            bindings: FxHashMap::default(),
            properties: FxHashMap::default(),
            events: FxHashMap::default(),
            ctors: Vec::new(),
            tokens: FxHashMap::default(),
        })
    }
}

#[derive(Debug, Clone)]
struct PropertySlots {
    getter: Option<String>,
    setter: Option<String>,
    #[allow(dead_code)]
    attributes: Vec<AttributeDef>,
}

#[derive(Debug, Clone)]
struct EventSlots {
    add: String,
    remove: String,
    #[allow(dead_code)]
    attributes: Vec<AttributeDef>,
}

struct DynamicAssembler {
    registry: Arc<TypeRegistry>,
    header: TypeDeclHeader,
    fields: Vec<String>,
    descriptors: Vec<Arc<InvocationDescriptor>>,
    methods: FxHashMap<String, MethodDecl>,
    bindings: FxHashMap<(TypeId, String), String>,
    properties: FxHashMap<String, PropertySlots>,
    events: FxHashMap<String, EventSlots>,
    ctors: Vec<CtorDecl>,
    tokens: FxHashMap<MemberId, Arc<MethodToken>>,
}

impl TypeAssembler for DynamicAssembler {
    fn declare_field(&mut self, name: &str) -> usize {
        self.fields.push(name.to_string());
        self.fields.len() - 1
    }

    fn declare_descriptor(&mut self, descriptor: Arc<InvocationDescriptor>) -> usize {
        self.descriptors.push(descriptor);
        self.descriptors.len() - 1
    }

    fn declare_method(&mut self, decl: MethodDecl) -> GenResult<()> {
        if self.methods.contains_key(&decl.name) {
            return Err(GenerationError::Emitter(format!(
                "duplicate member `{}` on `{}`",
                decl.name, self.header.name
            )));
        }
        if decl.generic_arity == 0 {
            self.tokens
                .entry(decl.declared)
                .or_insert_with(|| Arc::new(MethodToken::non_generic(decl.declared)));
        }
        for binding in &decl.bindings {
            self.bindings.insert(
                (binding.interface, binding.member.clone()),
                decl.name.clone(),
            );
        }
        self.methods.insert(decl.name.clone(), decl);
        Ok(())
    }

    fn declare_property(
        &mut self,
        name: &str,
        getter: Option<String>,
        setter: Option<String>,
        attributes: Vec<AttributeDef>,
    ) -> GenResult<()> {
        if self.properties.contains_key(name) {
            return Err(GenerationError::Emitter(format!(
                "duplicate property `{}` on `{}`",
                name, self.header.name
            )));
        }
        self.properties.insert(
            name.to_string(),
            PropertySlots {
                getter,
                setter,
                attributes,
            },
        );
        Ok(())
    }

    fn declare_event(
        &mut self,
        name: &str,
        add: String,
        remove: String,
        attributes: Vec<AttributeDef>,
    ) -> GenResult<()> {
        if self.events.contains_key(name) {
            return Err(GenerationError::Emitter(format!(
                "duplicate event `{}` on `{}`",
                name, self.header.name
            )));
        }
        self.events.insert(
            name.to_string(),
            EventSlots {
                add,
                remove,
                attributes,
            },
        );
        Ok(())
    }

    fn declare_constructor(&mut self, decl: CtorDecl) -> GenResult<()> {
        self.ctors.push(decl);
        Ok(())
    }

    fn finalize(self: Box<Self>) -> GenResult<Arc<dyn SynthesizedType>> {
        let mut attributes = self.header.attributes;
        attributes.push(AttributeDef::new(GENERATED_TYPE_MARKER));
        Ok(Arc::new(RuntimeType {
            name: self.header.name,
            unique_id: NEXT_TYPE_UNIQUE_ID.fetch_add(1, Ordering::Relaxed),
            nominal: self.header.nominal,
            base: self.header.base,
            interfaces: self.header.interfaces,
            attributes,
            fields: self.fields,
            methods: self.methods,
            bindings: self.bindings,
            properties: self.properties,
            events: self.events,
            ctors: self.ctors,
            descriptors: self.descriptors,
            tokens: self.tokens,
            registry: self.registry,
        }))
    }
}

/// A synthesized type realized as an interpreted runtime class.
pub struct RuntimeType {
    name: String,
    unique_id: u64,
    nominal: TypeId,
    base: Option<TypeId>,
    interfaces: Vec<TypeId>,
    attributes: Vec<AttributeDef>,
    fields: Vec<String>,
    methods: FxHashMap<String, MethodDecl>,
    bindings: FxHashMap<(TypeId, String), String>,
    properties: FxHashMap<String, PropertySlots>,
    events: FxHashMap<String, EventSlots>,
    ctors: Vec<CtorDecl>,
    descriptors: Vec<Arc<InvocationDescriptor>>,
    tokens: FxHashMap<MemberId, Arc<MethodToken>>,
    registry: Arc<TypeRegistry>,
}

impl RuntimeType {
    /// The base class of the synthesized type, if any.
    pub fn base(&self) -> Option<TypeId> {
        self.base
    }

    /// Declared field names, in slot order.
    pub fn field_names(&self) -> &[String] {
        &self.fields
    }

    fn ctor_member_name(&self) -> String {
        format!("{}(ctor)", self.name)
    }
}

impl std::fmt::Debug for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeType")
            .field("name", &self.name)
            .field("unique_id", &self.unique_id)
            .finish_non_exhaustive()
    }
}

impl SynthesizedType for RuntimeType {
    fn name(&self) -> &str {
        &self.name
    }

    fn unique_id(&self) -> u64 {
        self.unique_id
    }

    fn interfaces(&self) -> &[TypeId] {
        &self.interfaces
    }

    fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.methods.keys().cloned().collect();
        names.sort();
        names
    }

    fn has_member(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    fn descriptor_count(&self) -> usize {
        self.descriptors.len()
    }

    fn find_ctor(&self, base_arity: usize) -> Option<usize> {
        self.ctors
            .iter()
            .position(|c| !c.parameterless && c.base_arity == base_arity)
    }

    fn parameterless_ctor(&self) -> Option<usize> {
        self.ctors.iter().position(|c| c.parameterless)
    }

    fn instantiate(self: Arc<Self>, ctor: usize, args: CtorArgs) -> CallResult<ProxyHandle> {
        let decl = self
            .ctors
            .get(ctor)
            .ok_or_else(|| CallError::internal("constructor index out of range"))?
            .clone();

        let slots = if decl.parameterless {
            Vec::new()
        } else {
            let mut slots =
                Vec::with_capacity(1 + args.mixins.len() + args.base_args.len() + 1);
            slots.push(Slot::Interceptors(args.interceptors.into()));
            if let Some(target) = args.target {
                slots.push(Slot::Value(target));
            }
            for mixin in args.mixins {
                slots.push(Slot::Value(mixin));
            }
            for arg in args.base_args {
                slots.push(Slot::Value(arg));
            }
            slots
        };
        if slots.len() != decl.param_count {
            return Err(CallError::BadArity {
                member: self.ctor_member_name(),
                expected: decl.param_count,
                actual: slots.len(),
            });
        }

        let field_count = self.fields.len();
        let proxy = Arc::new_cyclic(|weak| ProxyObject {
            weak_self: weak.clone(),
            id: NEXT_PROXY_ID.fetch_add(1, Ordering::Relaxed),
            ty: Arc::clone(&self),
            fields: Mutex::new(vec![Slot::Empty; field_count]),
        });

        let this = proxy.this_value()?;
        let mut interp = Interp {
            ty: self.as_ref(),
            proxy: proxy.as_ref(),
            this,
            args: ArgStore::Ctor(slots),
            locals: locals_for(&decl.body),
            type_args: &[],
        };
        interp.run(&decl.body)?;
        Ok(proxy)
    }
}

/// Field slot of a proxy instance.
#[derive(Clone, Default)]
enum Slot {
    #[default]
    Empty,
    Value(Value),
    Interceptors(InterceptorChain),
}

/// A live instance of a dynamically realized synthesized type.
pub struct ProxyObject {
    weak_self: Weak<ProxyObject>,
    id: u64,
    ty: Arc<RuntimeType>,
    fields: Mutex<Vec<Slot>>,
}

impl ProxyObject {
    /// Process-unique instance id.
    pub fn id(&self) -> u64 {
        self.id
    }

    fn this_value(&self) -> CallResult<Value> {
        let arc = self
            .weak_self
            .upgrade()
            .ok_or_else(|| CallError::internal("proxy instance dropped during dispatch"))?;
        Ok(Value::instance(
            self.ty.nominal,
            arc as Arc<dyn Any + Send + Sync>,
        ))
    }

    fn invoke_emitted(
        &self,
        key: &str,
        args: &mut [Value],
        type_args: &[TypeId],
    ) -> CallResult<Value> {
        let decl = self.ty.methods.get(key).ok_or_else(|| CallError::MissingMember {
            type_name: self.ty.name.clone(),
            member: key.to_string(),
        })?;
        if args.len() != decl.param_count {
            return Err(CallError::BadArity {
                member: key.to_string(),
                expected: decl.param_count,
                actual: args.len(),
            });
        }
        if type_args.len() != decl.generic_arity {
            return Err(CallError::BadTypeArity {
                member: key.to_string(),
                expected: decl.generic_arity,
                actual: type_args.len(),
            });
        }
        let this = self.this_value()?;
        let mut interp = Interp {
            ty: self.ty.as_ref(),
            proxy: self,
            this,
            args: ArgStore::Call(args),
            locals: locals_for(&decl.body),
            type_args,
        };
        interp.run(&decl.body)
    }
}

impl std::fmt::Debug for ProxyObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyObject")
            .field("id", &self.id)
            .field("type_name", &self.ty.name)
            .finish()
    }
}

impl ProxyInstance for ProxyObject {
    fn type_name(&self) -> &str {
        &self.ty.name
    }

    fn type_unique_id(&self) -> u64 {
        self.ty.unique_id
    }

    fn implements(&self, interface: TypeId) -> bool {
        self.ty.interfaces.contains(&interface)
    }

    fn invoke(&self, member: &str, args: &mut [Value], type_args: &[TypeId]) -> CallResult<Value> {
        // Interface-qualified names are reachable only through an interface
        // view, never by plain lookup
        if member.contains('.') {
            return Err(CallError::MissingMember {
                type_name: self.ty.name.clone(),
                member: member.to_string(),
            });
        }
        self.invoke_emitted(member, args, type_args)
    }

    fn invoke_interface(
        &self,
        interface: TypeId,
        member: &str,
        args: &mut [Value],
        type_args: &[TypeId],
    ) -> CallResult<Value> {
        let key = self
            .ty
            .bindings
            .get(&(interface, member.to_string()))
            .ok_or_else(|| CallError::MissingMember {
                type_name: self.ty.name.clone(),
                member: member.to_string(),
            })?
            .clone();
        self.invoke_emitted(&key, args, type_args)
    }

    fn get_property(&self, name: &str) -> CallResult<Value> {
        let getter = self
            .ty
            .properties
            .get(name)
            .and_then(|p| p.getter.clone())
            .ok_or_else(|| CallError::MissingMember {
                type_name: self.ty.name.clone(),
                member: format!("get accessor of `{name}`"),
            })?;
        self.invoke_emitted(&getter, &mut [], &[])
    }

    fn set_property(&self, name: &str, value: Value) -> CallResult<()> {
        let setter = self
            .ty
            .properties
            .get(name)
            .and_then(|p| p.setter.clone())
            .ok_or_else(|| CallError::MissingMember {
                type_name: self.ty.name.clone(),
                member: format!("set accessor of `{name}`"),
            })?;
        let mut args = [value];
        self.invoke_emitted(&setter, &mut args, &[]).map(|_| ())
    }

    fn add_handler(&self, event: &str, handler: Value) -> CallResult<()> {
        let add = self
            .ty
            .events
            .get(event)
            .map(|e| e.add.clone())
            .ok_or_else(|| CallError::MissingMember {
                type_name: self.ty.name.clone(),
                member: format!("add accessor of `{event}`"),
            })?;
        let mut args = [handler];
        self.invoke_emitted(&add, &mut args, &[]).map(|_| ())
    }

    fn remove_handler(&self, event: &str, handler: Value) -> CallResult<()> {
        let remove = self
            .ty
            .events
            .get(event)
            .map(|e| e.remove.clone())
            .ok_or_else(|| CallError::MissingMember {
                type_name: self.ty.name.clone(),
                member: format!("remove accessor of `{event}`"),
            })?;
        let mut args = [handler];
        self.invoke_emitted(&remove, &mut args, &[]).map(|_| ())
    }
}

fn locals_for(body: &Body) -> Vec<Option<Invocation>> {
    std::iter::repeat_with(|| None).take(body.locals).collect()
}

/// Evaluated expression: a plain value, an interceptor chain, or a freshly
/// allocated invocation.
enum Out {
    Value(Value),
    Chain(InterceptorChain),
    Invocation(Invocation),
}

enum ArgStore<'a> {
    Call(&'a mut [Value]),
    Ctor(Vec<Slot>),
}

impl ArgStore<'_> {
    fn get(&self, index: usize) -> CallResult<Out> {
        match self {
            ArgStore::Call(args) => args
                .get(index)
                .map(|v| Out::Value(v.clone()))
                .ok_or_else(|| CallError::internal("argument index out of range")),
            ArgStore::Ctor(slots) => match slots.get(index) {
                Some(Slot::Value(v)) => Ok(Out::Value(v.clone())),
                Some(Slot::Interceptors(c)) => Ok(Out::Chain(c.clone())),
                Some(Slot::Empty) => Ok(Out::Value(Value::Null)),
                None => Err(CallError::internal("argument index out of range")),
            },
        }
    }

    fn set_value(&mut self, index: usize, value: Value) -> CallResult<()> {
        match self {
            ArgStore::Call(args) => {
                let slot = args
                    .get_mut(index)
                    .ok_or_else(|| CallError::internal("argument index out of range"))?;
                *slot = value;
                Ok(())
            }
            ArgStore::Ctor(_) => Err(CallError::internal(
                "constructor bodies cannot write argument cells",
            )),
        }
    }
}

/// Interpreter for one generated body.
struct Interp<'a> {
    ty: &'a RuntimeType,
    proxy: &'a ProxyObject,
    this: Value,
    args: ArgStore<'a>,
    locals: Vec<Option<Invocation>>,
    type_args: &'a [TypeId],
}

impl Interp<'_> {
    fn run(&mut self, body: &Body) -> CallResult<Value> {
        for stmt in &body.stmts {
            if let Some(result) = self.exec(stmt)? {
                return Ok(result);
            }
        }
        Ok(Value::Null)
    }

    fn exec(&mut self, stmt: &Stmt) -> CallResult<Option<Value>> {
        match stmt {
            Stmt::Assign { place, expr } => {
                let out = self.eval(expr)?;
                self.store(*place, out)?;
                Ok(None)
            }
            Stmt::Proceed { local } => {
                let invocation = self
                    .locals
                    .get_mut(*local)
                    .and_then(Option::as_mut)
                    .ok_or_else(|| CallError::internal("proceed on empty local"))?;
                invocation.proceed()?;
                Ok(None)
            }
            Stmt::CallBase { base, ctor, args } => {
                let mut argv = Vec::with_capacity(args.len());
                for arg in args {
                    argv.push(self.eval_value(arg)?);
                }
                let base_def = self
                    .ty
                    .registry
                    .get(*base)
                    .ok_or_else(|| CallError::internal("unknown base type"))?;
                let ctor_def = base_def
                    .ctors
                    .get(*ctor)
                    .ok_or_else(|| CallError::internal("unknown base constructor"))?;
                if let Some(body) = &ctor_def.body {
                    body.invoke(&self.this, &mut argv, &[])?;
                }
                Ok(None)
            }
            Stmt::Return { expr } => match expr {
                Some(expr) => Ok(Some(self.eval_value(expr)?)),
                None => Ok(Some(Value::Null)),
            },
        }
    }

    fn eval(&mut self, expr: &Expr) -> CallResult<Out> {
        match expr {
            Expr::Const(value) => Ok(Out::Value(value.clone())),
            Expr::This => Ok(Out::Value(self.this.clone())),
            Expr::Arg(index) | Expr::AddrOf(index) => self.args.get(*index),
            Expr::Field(index) => {
                let fields = self.proxy.fields.lock();
                match fields.get(*index) {
                    Some(Slot::Value(v)) => Ok(Out::Value(v.clone())),
                    Some(Slot::Interceptors(c)) => Ok(Out::Chain(c.clone())),
                    Some(Slot::Empty) => Ok(Out::Value(Value::Null)),
                    None => Err(CallError::internal("field index out of range")),
                }
            }
            Expr::ArgsOf(local) => {
                let invocation = self
                    .locals
                    .get(*local)
                    .and_then(Option::as_ref)
                    .ok_or_else(|| CallError::internal("argument snapshot of empty local"))?;
                Ok(Out::Value(Value::list(invocation.args().to_vec())))
            }
            Expr::ResultOf(local) => {
                let invocation = self
                    .locals
                    .get(*local)
                    .and_then(Option::as_ref)
                    .ok_or_else(|| CallError::internal("result of empty local"))?;
                Ok(Out::Value(invocation.return_value().clone()))
            }
            Expr::Element { of, index } => {
                let array = self.eval_value(of)?;
                let items = array
                    .as_list()
                    .ok_or_else(|| CallError::internal("element access on non-array"))?;
                items
                    .get(*index)
                    .cloned()
                    .map(Out::Value)
                    .ok_or_else(|| CallError::internal("element index out of range"))
            }
            Expr::NewArray(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval_value(item)?);
                }
                Ok(Out::Value(Value::list(values)))
            }
            Expr::Cast(inner) => Ok(Out::Value(self.eval_value(inner)?)),
            Expr::DefaultInterceptors => Ok(Out::Chain(Arc::from(vec![
                Arc::new(NoopInterceptor) as Arc<dyn Interceptor>
            ]))),
            Expr::NewInvocation(alloc) => {
                let descriptor = self
                    .ty
                    .descriptors
                    .get(alloc.descriptor)
                    .ok_or_else(|| CallError::internal("descriptor index out of range"))?
                    .clone();
                let proxy = self.eval_value(&alloc.proxy)?;
                let target = match self.eval_value(&alloc.target)? {
                    Value::Null => None,
                    value => Some(value),
                };
                let interceptors = match self.eval(&alloc.interceptors)? {
                    Out::Chain(chain) => chain,
                    _ => {
                        return Err(CallError::internal(
                            "interceptor field does not hold a chain",
                        ))
                    }
                };
                let mut arguments = Vec::with_capacity(alloc.arguments.len());
                for argument in &alloc.arguments {
                    arguments.push(self.eval_value(argument)?);
                }
                let declared_token = if descriptor.generic_arity() == 0 {
                    self.ty
                        .tokens
                        .get(&alloc.declared)
                        .cloned()
                        .ok_or_else(|| CallError::internal("missing cached member token"))?
                } else {
                    Arc::new(MethodToken::with_args(
                        alloc.declared,
                        self.type_args.to_vec(),
                    ))
                };
                let invocation = descriptor.begin(
                    proxy,
                    target,
                    interceptors,
                    declared_token,
                    arguments,
                    self.type_args.to_vec(),
                )?;
                Ok(Out::Invocation(invocation))
            }
        }
    }

    fn eval_value(&mut self, expr: &Expr) -> CallResult<Value> {
        match self.eval(expr)? {
            Out::Value(value) => Ok(value),
            _ => Err(CallError::internal("expected a plain value")),
        }
    }

    fn store(&mut self, place: Place, out: Out) -> CallResult<()> {
        match (place, out) {
            (Place::Local(index), Out::Invocation(invocation)) => {
                let slot = self
                    .locals
                    .get_mut(index)
                    .ok_or_else(|| CallError::internal("local index out of range"))?;
                *slot = Some(invocation);
                Ok(())
            }
            (Place::Local(_), _) => Err(CallError::internal("locals hold invocations only")),
            (Place::Field(index), out) => {
                let slot_value = match out {
                    Out::Value(value) => Slot::Value(value),
                    Out::Chain(chain) => Slot::Interceptors(chain),
                    Out::Invocation(_) => {
                        return Err(CallError::internal("fields cannot hold invocations"))
                    }
                };
                let mut fields = self.proxy.fields.lock();
                let slot = fields
                    .get_mut(index)
                    .ok_or_else(|| CallError::internal("field index out of range"))?;
                *slot = slot_value;
                Ok(())
            }
            (Place::Arg(index), Out::Value(value)) => self.args.set_value(index, value),
            (Place::Arg(_), _) => Err(CallError::internal("argument cells hold values only")),
        }
    }
}
