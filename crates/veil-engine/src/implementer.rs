//! Member implementer
//!
//! Turns the contributor pipeline's plan into declared members on the type
//! under construction. Members sharing a backing member share one generated
//! body (and one invocation descriptor); interface members whose plain name
//! is already claimed by a different backing become explicit interface
//! implementations, emitted private and final under the qualified
//! `"Interface.Member"` name and reachable only through that interface's
//! view.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use veil_model::{MemberId, MethodDef, ModelError, TypeRegistry, Value};

use crate::attributes::AttributeFilter;
use crate::contributor::{ContributorKind, MemberToGenerate, ProxyPlan};
use crate::emit::{
    Body, Expr, InterfaceBinding, MemberAccess, MethodDecl, NewInvocationExpr, Place, Stmt,
    TypeAssembler,
};
use crate::invocation::InvocationDescriptor;
use crate::options::ProxyGenerationOptions;
use crate::GenResult;

/// Declare every member of `plan` on the assembler.
pub fn implement_members(
    registry: &Arc<TypeRegistry>,
    options: &ProxyGenerationOptions,
    plan: &ProxyPlan,
    filter: &AttributeFilter,
    assembler: &mut dyn TypeAssembler,
) -> GenResult<()> {
    let mut implementer = MemberImplementer {
        registry,
        options,
        plan,
        filter,
        assembler: &mut *assembler,
        descriptors: FxHashMap::default(),
        by_backing: FxHashMap::default(),
        used_names: FxHashSet::default(),
        pending: Vec::new(),
    };

    for member in &plan.methods {
        implementer.add_member(member)?;
    }

    let mut properties = Vec::new();
    for property in &plan.properties {
        let getter = match &property.getter {
            Some(accessor) => Some(implementer.add_member(accessor)?),
            None => None,
        };
        let setter = match &property.setter {
            Some(accessor) => Some(implementer.add_member(accessor)?),
            None => None,
        };
        properties.push((property.name.clone(), getter, setter, &property.attributes));
    }

    let mut events = Vec::new();
    for event in &plan.events {
        let add = implementer.add_member(&event.add)?;
        let remove = implementer.add_member(&event.remove)?;
        events.push((event.name.clone(), add, remove, &event.attributes));
    }

    implementer.flush()?;

    for (name, getter, setter, attributes) in properties {
        assembler.declare_property(&name, getter, setter, filter.replicable(attributes))?;
    }
    for (name, add, remove, attributes) in events {
        assembler.declare_event(&name, add, remove, filter.replicable(attributes))?;
    }
    Ok(())
}

struct PendingMethod {
    name: String,
    declared: MemberId,
    bindings: Vec<InterfaceBinding>,
    access: MemberAccess,
    param_count: usize,
    generic_arity: usize,
    attributes: Vec<veil_model::AttributeDef>,
    descriptor: usize,
    member: MemberToGenerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DescriptorKey {
    /// Shared per distinct backing member and genericity
    Backed(MemberId, bool),
    /// Unbacked members keep a descriptor per declared member so failure
    /// diagnostics name the right member
    Unbacked(MemberId),
}

struct MemberImplementer<'a> {
    registry: &'a Arc<TypeRegistry>,
    options: &'a ProxyGenerationOptions,
    plan: &'a ProxyPlan,
    filter: &'a AttributeFilter,
    assembler: &'a mut dyn TypeAssembler,
    descriptors: FxHashMap<DescriptorKey, usize>,
    by_backing: FxHashMap<MemberId, usize>,
    used_names: FxHashSet<String>,
    pending: Vec<PendingMethod>,
}

impl MemberImplementer<'_> {
    /// Add one member, returning its emitted name. Members subsumed by an
    /// already-added member with the same backing only gain an interface
    /// binding.
    fn add_member(&mut self, member: &MemberToGenerate) -> GenResult<String> {
        let method = self.lookup(member.declared)?.clone();
        let declared_on_interface = self
            .registry
            .get(member.declared.type_id)
            .is_some_and(veil_model::TypeDef::is_interface);

        if let Some(backing) = member.backing {
            if let Some(&index) = self.by_backing.get(&backing) {
                let existing = &mut self.pending[index];
                if declared_on_interface {
                    existing.bindings.push(InterfaceBinding {
                        interface: member.declared.type_id,
                        member: method.name.clone(),
                    });
                }
                return Ok(existing.name.clone());
            }
        }

        let plain = method.name.clone();
        let (name, access) = if self.used_names.contains(&plain) {
            let qualified = format!(
                "{}.{}",
                self.registry.name_of(member.declared.type_id),
                plain
            );
            (
                qualified,
                MemberAccess::explicit_implementation(method.special_name),
            )
        } else {
            (
                plain.clone(),
                MemberAccess::mirroring(method.visibility, method.special_name),
            )
        };
        self.used_names.insert(name.clone());

        let bindings = if declared_on_interface {
            vec![InterfaceBinding {
                interface: member.declared.type_id,
                member: plain,
            }]
        } else {
            Vec::new()
        };

        let descriptor = self.descriptor_for(member, &method);
        let index = self.pending.len();
        self.pending.push(PendingMethod {
            name: name.clone(),
            declared: member.declared,
            bindings,
            access,
            param_count: method.params.len(),
            generic_arity: method.generic_params.len(),
            attributes: self.filter.replicable(&method.attributes),
            descriptor,
            member: member.clone(),
        });
        if let Some(backing) = member.backing {
            self.by_backing.insert(backing, index);
        }
        Ok(name)
    }

    /// Declare every pending member with its forwarding body.
    fn flush(&mut self) -> GenResult<()> {
        let pending = std::mem::take(&mut self.pending);
        for entry in pending {
            let method = self.lookup(entry.declared)?.clone();
            let body = self.forwarding_body(entry.descriptor, &entry.member, &method);
            self.assembler.declare_method(MethodDecl {
                name: entry.name,
                declared: entry.declared,
                bindings: entry.bindings,
                access: entry.access,
                param_count: entry.param_count,
                generic_arity: entry.generic_arity,
                attributes: entry.attributes,
                body,
            })?;
        }
        Ok(())
    }

    fn lookup(&self, member: MemberId) -> GenResult<&MethodDef> {
        self.registry
            .method(member)
            .ok_or_else(|| ModelError::UnknownType(member.type_id).into())
    }

    fn descriptor_for(&mut self, member: &MemberToGenerate, method: &MethodDef) -> usize {
        let key = match member.backing {
            Some(backing) => DescriptorKey::Backed(backing, method.is_generic()),
            None => DescriptorKey::Unbacked(member.declared),
        };
        if let Some(&index) = self.descriptors.get(&key) {
            return index;
        }
        let subject = member.backing.unwrap_or(member.declared);
        let name = member
            .backing
            .and_then(|backing| self.registry.method(backing))
            .map(|m| m.name.clone())
            .unwrap_or_else(|| method.name.clone());
        let descriptor = InvocationDescriptor::new(
            Arc::clone(self.registry),
            name,
            subject,
            member.backing,
            method.generic_params.len(),
            self.options.selector().cloned(),
        );
        let index = self.assembler.declare_descriptor(Arc::new(descriptor));
        self.descriptors.insert(key, index);
        index
    }

    /// The forwarding body: allocate the invocation, proceed, copy
    /// by-reference arguments back, convert and return the result.
    fn forwarding_body(
        &self,
        descriptor: usize,
        member: &MemberToGenerate,
        method: &MethodDef,
    ) -> Body {
        let target = match member.contributor {
            ContributorKind::Target => match self.plan.layout.target {
                Some(field) => Expr::Field(field),
                None => Expr::Const(Value::Null),
            },
            ContributorKind::Mixin(index) => match self.plan.layout.mixins.get(index) {
                Some(field) => Expr::Field(*field),
                None => Expr::Const(Value::Null),
            },
            ContributorKind::Unbacked => Expr::Const(Value::Null),
        };
        let arguments = method
            .params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                if param.mode.is_by_ref() {
                    Expr::AddrOf(index)
                } else {
                    Expr::Arg(index)
                }
            })
            .collect();

        let mut stmts = vec![
            Stmt::Assign {
                place: Place::Local(0),
                expr: Expr::NewInvocation(Box::new(NewInvocationExpr {
                    descriptor,
                    declared: member.declared,
                    proxy: Expr::This,
                    target,
                    interceptors: Expr::Field(self.plan.layout.interceptors),
                    arguments,
                })),
            },
            Stmt::Proceed { local: 0 },
        ];
        for index in method.by_ref_params() {
            stmts.push(Stmt::Assign {
                place: Place::Arg(index),
                expr: Expr::Element {
                    of: Box::new(Expr::ArgsOf(0)),
                    index,
                },
            });
        }
        stmts.push(Stmt::Return {
            expr: method
                .has_return
                .then(|| Expr::Cast(Box::new(Expr::ResultOf(0)))),
        });
        Body::new(1, stmts)
    }
}
