//! Constructor synthesizer
//!
//! Mirrors every accessible constructor of the base type: the generated
//! constructor takes the proxy-specific fields (interceptors, target, mixin
//! references, in fixed order) ahead of the forwarded base-constructor
//! parameters, assigns each field, then invokes the base constructor. When
//! the base type exposes an accessible default constructor, an additional
//! parameterless constructor is synthesized that seeds the interceptor
//! field with a single passthrough interceptor; its absence is not an
//! error, the parameterless constructor is simply skipped.

use veil_model::{TypeRegistry, Value};

use crate::contributor::ProxyPlan;
use crate::emit::{Body, CtorDecl, Expr, Place, Stmt, TypeAssembler};
use crate::options::ProxyGenerationOptions;
use crate::GenResult;

/// Declare every generated constructor of `plan` on the assembler.
pub fn synthesize_ctors(
    registry: &TypeRegistry,
    options: &ProxyGenerationOptions,
    plan: &ProxyPlan,
    assembler: &mut dyn TypeAssembler,
) -> GenResult<()> {
    let field_count = plan.layout.count();

    match plan.base {
        Some(base) => {
            let base_def = registry.resolve(base)?;
            let internals_visible = options.visibility_policy().internals_visible(base_def);

            for (ctor_index, ctor) in registry.accessible_ctors(base, internals_visible)? {
                let base_arity = ctor.params.len();
                let mut stmts = field_assignments(plan);
                stmts.push(Stmt::CallBase {
                    base,
                    ctor: ctor_index,
                    args: (0..base_arity)
                        .map(|i| Expr::Arg(field_count + i))
                        .collect(),
                });
                stmts.push(Stmt::Return { expr: None });
                assembler.declare_constructor(CtorDecl {
                    param_count: field_count + base_arity,
                    base_arity,
                    parameterless: false,
                    body: Body::new(0, stmts),
                })?;
            }

            if let Some(default_index) = registry.default_ctor(base, internals_visible)? {
                assembler.declare_constructor(parameterless_ctor(
                    plan,
                    Some((base, default_index)),
                ))?;
            }
        }
        None => {
            // Interface proxies have no base constructors to mirror; one
            // constructor threads the proxy fields, and a parameterless
            // constructor keeps default-constructibility
            let mut stmts = field_assignments(plan);
            stmts.push(Stmt::Return { expr: None });
            assembler.declare_constructor(CtorDecl {
                param_count: field_count,
                base_arity: 0,
                parameterless: false,
                body: Body::new(0, stmts),
            })?;
            assembler.declare_constructor(parameterless_ctor(plan, None))?;
        }
    }
    Ok(())
}

/// Assign each proxy field from its positional constructor argument.
fn field_assignments(plan: &ProxyPlan) -> Vec<Stmt> {
    (0..plan.layout.count())
        .map(|index| Stmt::Assign {
            place: Place::Field(index),
            expr: Expr::Arg(index),
        })
        .collect()
}

/// The parameterless constructor: a passthrough interceptor chain, null
/// remaining fields, and the base default constructor when one exists.
fn parameterless_ctor(plan: &ProxyPlan, base_default: Option<(veil_model::TypeId, usize)>) -> CtorDecl {
    let mut stmts = vec![Stmt::Assign {
        place: Place::Field(plan.layout.interceptors),
        expr: Expr::DefaultInterceptors,
    }];
    for index in 1..plan.layout.count() {
        stmts.push(Stmt::Assign {
            place: Place::Field(index),
            expr: Expr::Const(Value::Null),
        });
    }
    if let Some((base, ctor)) = base_default {
        stmts.push(Stmt::CallBase {
            base,
            ctor,
            args: Vec::new(),
        });
    }
    stmts.push(Stmt::Return { expr: None });
    CtorDecl {
        param_count: 0,
        base_arity: 0,
        parameterless: true,
        body: Body::new(0, stmts),
    }
}
