//! Integration tests for the runtime interception protocol
//!
//! Covers chain ordering, short-circuiting, by-reference round-trips,
//! generic dispatch, mixin routing, and property/event forwarding.

use std::sync::Arc;

use parking_lot::Mutex;

use veil_engine::{
    CallError, CallResult, Interceptor, Invocation, ProxyGenerationOptions, ProxyGenerator,
    ProxyHandle, ProxyRequest,
};
use veil_model::{
    CtorDef, EventDef, MethodDef, NativeError, ParamDef, PropertyDef, TypeDef, TypeId,
    TypeRegistry, Value,
};

// ============================================================================
// Fixtures
// ============================================================================

struct Calculator;

struct Fixture {
    registry: Arc<TypeRegistry>,
    icalc: TypeId,
    calculator: TypeId,
    int_marker: TypeId,
    text_marker: TypeId,
    observed_type_args: Arc<Mutex<Vec<Vec<TypeId>>>>,
}

fn fixture() -> Fixture {
    let mut registry = TypeRegistry::new();
    let int_marker = registry.register(TypeDef::class("Int32")).unwrap();
    let text_marker = registry.register(TypeDef::class("Text")).unwrap();

    let icalc = registry
        .register(
            TypeDef::interface("ICalculator")
                .with_method(
                    MethodDef::new("add")
                        .with_param(ParamDef::new("a"))
                        .with_param(ParamDef::new("b"))
                        .returns(),
                )
                .with_method(
                    MethodDef::new("try_recall")
                        .with_param(ParamDef::out("value"))
                        .returns(),
                )
                .with_method(
                    MethodDef::new("echo")
                        .with_param(ParamDef::new("value"))
                        .returns()
                        .generic(&["T"]),
                ),
        )
        .unwrap();

    let observed_type_args: Arc<Mutex<Vec<Vec<TypeId>>>> = Arc::new(Mutex::new(Vec::new()));
    let observed = observed_type_args.clone();
    let calculator = registry
        .register(
            TypeDef::class("Calculator")
                .implements(icalc)
                .with_ctor(CtorDef::public())
                .with_method(
                    MethodDef::new("add")
                        .with_param(ParamDef::new("a"))
                        .with_param(ParamDef::new("b"))
                        .returns()
                        .with_body(|recv, args, _| {
                            recv.as_instance()
                                .and_then(|i| i.downcast_ref::<Calculator>())
                                .ok_or_else(|| NativeError::new("receiver is not a Calculator"))?;
                            Ok(Value::Int(
                                args[0].as_int().unwrap_or(0) + args[1].as_int().unwrap_or(0),
                            ))
                        }),
                )
                .with_method(
                    MethodDef::new("try_recall")
                        .with_param(ParamDef::out("value"))
                        .returns()
                        .with_body(|_, args, _| {
                            args[0] = Value::Int(42);
                            Ok(Value::Bool(true))
                        }),
                )
                .with_method(
                    MethodDef::new("echo")
                        .with_param(ParamDef::new("value"))
                        .returns()
                        .generic(&["T"])
                        .with_body(move |_, args, type_args| {
                            observed.lock().push(type_args.to_vec());
                            Ok(args[0].clone())
                        }),
                ),
        )
        .unwrap();

    Fixture {
        registry: Arc::new(registry),
        icalc,
        calculator,
        int_marker,
        text_marker,
        observed_type_args,
    }
}

fn proxy_over_calculator(
    fixture: &Fixture,
    interceptors: Vec<Arc<dyn Interceptor>>,
) -> ProxyHandle {
    let generator = ProxyGenerator::with_dynamic_backend(fixture.registry.clone());
    let mut request = ProxyRequest::new(fixture.icalc)
        .with_target(Value::instance(fixture.calculator, Arc::new(Calculator)));
    for interceptor in interceptors {
        request = request.with_interceptor(interceptor);
    }
    generator.create_proxy(request).unwrap()
}

struct Tagging {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Interceptor for Tagging {
    fn intercept(&self, invocation: &mut Invocation) -> CallResult<()> {
        self.log.lock().push(format!("{}:enter", self.label));
        invocation.proceed()?;
        self.log.lock().push(format!("{}:exit", self.label));
        // Tag the result so the caller-side interceptor sees this mutation
        let tagged = match invocation.return_value() {
            Value::Str(text) => Some(Value::str(format!("{text}.{}", self.label))),
            Value::Int(n) => Some(Value::Int(n + 1)),
            _ => None,
        };
        if let Some(value) = tagged {
            invocation.set_return_value(value);
        }
        Ok(())
    }
}

// ============================================================================
// Ordering and short-circuiting
// ============================================================================

mod ordering {
    use super::*;

    #[test]
    fn test_interceptors_run_in_registration_order() {
        let fixture = fixture();
        let log = Arc::new(Mutex::new(Vec::new()));
        let proxy = proxy_over_calculator(
            &fixture,
            vec![
                Arc::new(Tagging {
                    label: "first",
                    log: log.clone(),
                }),
                Arc::new(Tagging {
                    label: "second",
                    log: log.clone(),
                }),
            ],
        );

        let mut args = [Value::Int(1), Value::Int(2)];
        let result = proxy.invoke("add", &mut args, &[]).unwrap();

        // first enters before second; exits unwind in reverse
        assert_eq!(
            *log.lock(),
            vec!["first:enter", "second:enter", "second:exit", "first:exit"]
        );
        // second's post-proceed increment is visible to first, whose own
        // increment lands last: 3 + 1 + 1
        assert_eq!(result, Value::Int(5));
    }

    #[test]
    fn test_short_circuit_skips_target_and_tail() {
        struct Deny;
        impl Interceptor for Deny {
            fn intercept(&self, invocation: &mut Invocation) -> CallResult<()> {
                invocation.set_return_value(Value::Int(-1));
                Ok(())
            }
        }

        let fixture = fixture();
        let log = Arc::new(Mutex::new(Vec::new()));
        let proxy = proxy_over_calculator(
            &fixture,
            vec![
                Arc::new(Deny),
                Arc::new(Tagging {
                    label: "tail",
                    log: log.clone(),
                }),
            ],
        );

        let mut args = [Value::Int(1), Value::Int(2)];
        let result = proxy.invoke("add", &mut args, &[]).unwrap();

        assert_eq!(result, Value::Int(-1));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_target_errors_propagate_unmodified() {
        let mut registry = TypeRegistry::new();
        let iface = registry
            .register(TypeDef::interface("IFailing").with_method(MethodDef::new("run").returns()))
            .unwrap();
        struct Failing;
        let failing = registry
            .register(
                TypeDef::class("Failing")
                    .implements(iface)
                    .with_ctor(CtorDef::public())
                    .with_method(
                        MethodDef::new("run")
                            .returns()
                            .with_body(|_, _, _| Err(NativeError::new("boom"))),
                    ),
            )
            .unwrap();
        let registry = Arc::new(registry);
        let generator = ProxyGenerator::with_dynamic_backend(registry);
        let proxy = generator
            .create_proxy(
                ProxyRequest::new(iface)
                    .with_target(Value::instance(failing, Arc::new(Failing))),
            )
            .unwrap();

        let err = proxy.invoke("run", &mut [], &[]).unwrap_err();
        match err {
            CallError::Native(native) => assert_eq!(native.message, "boom"),
            other => panic!("expected the target error, got {other}"),
        }
    }
}

// ============================================================================
// By-reference round-trips
// ============================================================================

mod by_ref {
    use super::*;

    #[test]
    fn test_out_parameter_written_by_target_reaches_caller() {
        let fixture = fixture();
        let proxy = proxy_over_calculator(&fixture, Vec::new());

        let mut args = [Value::Null];
        let result = proxy.invoke("try_recall", &mut args, &[]).unwrap();

        assert_eq!(result, Value::Bool(true));
        assert_eq!(args[0], Value::Int(42));
    }

    #[test]
    fn test_out_parameter_written_by_interceptor_reaches_caller() {
        struct FakeRecall;
        impl Interceptor for FakeRecall {
            fn intercept(&self, invocation: &mut Invocation) -> CallResult<()> {
                // Never proceeds: the target must not overwrite this
                invocation.set_arg(0, Value::Int(7));
                invocation.set_return_value(Value::Bool(false));
                Ok(())
            }
        }

        let fixture = fixture();
        let proxy = proxy_over_calculator(&fixture, vec![Arc::new(FakeRecall)]);

        let mut args = [Value::Null];
        let result = proxy.invoke("try_recall", &mut args, &[]).unwrap();

        assert_eq!(result, Value::Bool(false));
        assert_eq!(args[0], Value::Int(7));
    }

    #[test]
    fn test_argument_mutation_before_proceed_reaches_target() {
        struct DoubleFirst;
        impl Interceptor for DoubleFirst {
            fn intercept(&self, invocation: &mut Invocation) -> CallResult<()> {
                let first = invocation.arg(0).and_then(Value::as_int).unwrap_or(0);
                invocation.set_arg(0, Value::Int(first * 2));
                invocation.proceed()
            }
        }

        let fixture = fixture();
        let proxy = proxy_over_calculator(&fixture, vec![Arc::new(DoubleFirst)]);

        let mut args = [Value::Int(10), Value::Int(1)];
        let result = proxy.invoke("add", &mut args, &[]).unwrap();
        assert_eq!(result, Value::Int(21));
    }
}

// ============================================================================
// Generic dispatch
// ============================================================================

mod generics {
    use super::*;

    #[test]
    fn test_type_arguments_reach_target_per_instantiation() {
        let fixture = fixture();
        let proxy = proxy_over_calculator(&fixture, Vec::new());

        let mut args = [Value::Int(5)];
        let a = proxy
            .invoke("echo", &mut args, &[fixture.int_marker])
            .unwrap();
        let mut args = [Value::str("five")];
        let b = proxy
            .invoke("echo", &mut args, &[fixture.text_marker])
            .unwrap();

        assert_eq!(a, Value::Int(5));
        assert_eq!(b.as_str(), Some("five"));
        assert_eq!(
            *fixture.observed_type_args.lock(),
            vec![vec![fixture.int_marker], vec![fixture.text_marker]]
        );
    }

    #[test]
    fn test_instantiations_do_not_corrupt_each_other() {
        struct TokenWatcher {
            seen: Arc<Mutex<Vec<Vec<TypeId>>>>,
        }
        impl Interceptor for TokenWatcher {
            fn intercept(&self, invocation: &mut Invocation) -> CallResult<()> {
                self.seen
                    .lock()
                    .push(invocation.declared_token().type_args.clone());
                invocation.proceed()
            }
        }

        let fixture = fixture();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let proxy = proxy_over_calculator(
            &fixture,
            vec![Arc::new(TokenWatcher { seen: seen.clone() })],
        );

        // Interleave the two instantiations on the same proxy instance
        for round in 0..2 {
            let mut args = [Value::Int(round)];
            proxy
                .invoke("echo", &mut args, &[fixture.int_marker])
                .unwrap();
            let mut args = [Value::str("x")];
            proxy
                .invoke("echo", &mut args, &[fixture.text_marker])
                .unwrap();
        }

        assert_eq!(
            *seen.lock(),
            vec![
                vec![fixture.int_marker],
                vec![fixture.text_marker],
                vec![fixture.int_marker],
                vec![fixture.text_marker],
            ]
        );
    }

    #[test]
    fn test_wrong_type_arity_rejected() {
        let fixture = fixture();
        let proxy = proxy_over_calculator(&fixture, Vec::new());

        let mut args = [Value::Int(5)];
        let err = proxy.invoke("echo", &mut args, &[]).unwrap_err();
        assert!(matches!(err, CallError::BadTypeArity { .. }));
    }
}

// ============================================================================
// Mixins, properties, and events
// ============================================================================

mod members {
    use super::*;

    #[test]
    fn test_mixin_member_routed_to_mixin_instance() {
        struct AuditLog {
            entries: Mutex<Vec<String>>,
        }

        let mut registry = TypeRegistry::new();
        let iaudit = registry
            .register(
                TypeDef::interface("IAudit")
                    .with_method(MethodDef::new("record").with_param(ParamDef::new("entry"))),
            )
            .unwrap();
        let audit_impl = registry
            .register(
                TypeDef::class("AuditLog").implements(iaudit).with_method(
                    MethodDef::new("record")
                        .with_param(ParamDef::new("entry"))
                        .with_body(|recv, args, _| {
                            let log = recv
                                .as_instance()
                                .and_then(|i| i.downcast_ref::<AuditLog>())
                                .ok_or_else(|| NativeError::new("receiver is not an AuditLog"))?;
                            log.entries
                                .lock()
                                .push(args[0].as_str().unwrap_or("?").to_string());
                            Ok(Value::Null)
                        }),
                ),
            )
            .unwrap();
        let igreeter = registry
            .register(TypeDef::interface("IGreeter").with_method(MethodDef::new("greet")))
            .unwrap();

        let audit = Arc::new(AuditLog {
            entries: Mutex::new(Vec::new()),
        });
        let registry = Arc::new(registry);
        let options = ProxyGenerationOptions::default()
            .with_mixin(iaudit, Value::instance(audit_impl, audit.clone()))
            .unwrap();
        let generator = ProxyGenerator::with_dynamic_backend(registry);

        let proxy = generator
            .create_proxy(ProxyRequest::new(igreeter).with_options(options))
            .unwrap();
        assert!(proxy.implements(iaudit));

        let mut args = [Value::str("created")];
        proxy.invoke("record", &mut args, &[]).unwrap();
        assert_eq!(*audit.entries.lock(), vec!["created".to_string()]);
    }

    #[test]
    fn test_property_accessors_forward() {
        struct Profile {
            name: Mutex<String>,
        }

        let mut registry = TypeRegistry::new();
        let inamed = registry
            .register(
                TypeDef::interface("INamed")
                    .with_method(MethodDef::new("get_name").returns().special())
                    .with_method(
                        MethodDef::new("set_name")
                            .with_param(ParamDef::new("value"))
                            .special(),
                    )
                    .with_property(PropertyDef {
                        name: "name".to_string(),
                        getter: Some(0),
                        setter: Some(1),
                        attributes: Vec::new(),
                    }),
            )
            .unwrap();
        let profile = registry
            .register(
                TypeDef::class("Profile")
                    .implements(inamed)
                    .with_ctor(CtorDef::public())
                    .with_method(MethodDef::new("get_name").returns().special().with_body(
                        |recv, _, _| {
                            let profile = recv
                                .as_instance()
                                .and_then(|i| i.downcast_ref::<Profile>())
                                .ok_or_else(|| NativeError::new("receiver is not a Profile"))?;
                            Ok(Value::str(profile.name.lock().clone()))
                        },
                    ))
                    .with_method(
                        MethodDef::new("set_name")
                            .with_param(ParamDef::new("value"))
                            .special()
                            .with_body(|recv, args, _| {
                                let profile = recv
                                    .as_instance()
                                    .and_then(|i| i.downcast_ref::<Profile>())
                                    .ok_or_else(|| {
                                        NativeError::new("receiver is not a Profile")
                                    })?;
                                *profile.name.lock() =
                                    args[0].as_str().unwrap_or_default().to_string();
                                Ok(Value::Null)
                            }),
                    ),
            )
            .unwrap();

        let registry = Arc::new(registry);
        let generator = ProxyGenerator::with_dynamic_backend(registry);
        let instance = Arc::new(Profile {
            name: Mutex::new("anon".to_string()),
        });
        let proxy = generator
            .create_proxy(
                ProxyRequest::new(inamed).with_target(Value::instance(profile, instance)),
            )
            .unwrap();

        assert_eq!(proxy.get_property("name").unwrap().as_str(), Some("anon"));
        proxy.set_property("name", Value::str("ada")).unwrap();
        assert_eq!(proxy.get_property("name").unwrap().as_str(), Some("ada"));
    }

    #[test]
    fn test_event_accessors_forward() {
        struct Button {
            handlers: Mutex<Vec<Value>>,
        }

        let mut registry = TypeRegistry::new();
        let iclickable = registry
            .register(
                TypeDef::interface("IClickable")
                    .with_method(
                        MethodDef::new("add_clicked")
                            .with_param(ParamDef::new("handler"))
                            .special(),
                    )
                    .with_method(
                        MethodDef::new("remove_clicked")
                            .with_param(ParamDef::new("handler"))
                            .special(),
                    )
                    .with_event(EventDef {
                        name: "clicked".to_string(),
                        add: 0,
                        remove: 1,
                        attributes: Vec::new(),
                    }),
            )
            .unwrap();
        let button = registry
            .register(
                TypeDef::class("Button")
                    .implements(iclickable)
                    .with_ctor(CtorDef::public())
                    .with_method(
                        MethodDef::new("add_clicked")
                            .with_param(ParamDef::new("handler"))
                            .special()
                            .with_body(|recv, args, _| {
                                let button = recv
                                    .as_instance()
                                    .and_then(|i| i.downcast_ref::<Button>())
                                    .ok_or_else(|| NativeError::new("receiver is not a Button"))?;
                                button.handlers.lock().push(args[0].clone());
                                Ok(Value::Null)
                            }),
                    )
                    .with_method(
                        MethodDef::new("remove_clicked")
                            .with_param(ParamDef::new("handler"))
                            .special()
                            .with_body(|recv, args, _| {
                                let button = recv
                                    .as_instance()
                                    .and_then(|i| i.downcast_ref::<Button>())
                                    .ok_or_else(|| NativeError::new("receiver is not a Button"))?;
                                button.handlers.lock().retain(|h| h != &args[0]);
                                Ok(Value::Null)
                            }),
                    ),
            )
            .unwrap();

        let registry = Arc::new(registry);
        let generator = ProxyGenerator::with_dynamic_backend(registry);
        let instance = Arc::new(Button {
            handlers: Mutex::new(Vec::new()),
        });
        let proxy = generator
            .create_proxy(
                ProxyRequest::new(iclickable)
                    .with_target(Value::instance(button, instance.clone())),
            )
            .unwrap();

        struct Handler;
        let handler = Value::instance(iclickable, Arc::new(Handler));
        proxy.add_handler("clicked", handler.clone()).unwrap();
        assert_eq!(instance.handlers.lock().len(), 1);
        proxy.remove_handler("clicked", handler).unwrap();
        assert!(instance.handlers.lock().is_empty());
    }

    #[test]
    fn test_unbacked_member_fails_fast_without_short_circuit() {
        let mut registry = TypeRegistry::new();
        let iface = registry
            .register(TypeDef::interface("IOrphan").with_method(MethodDef::new("run")))
            .unwrap();
        let registry = Arc::new(registry);
        let generator = ProxyGenerator::with_dynamic_backend(registry);

        // No target at all: the terminal step is a descriptive failure
        let proxy = generator.create_proxy(ProxyRequest::new(iface)).unwrap();
        let err = proxy.invoke("run", &mut [], &[]).unwrap_err();
        match err {
            CallError::NoTarget { member } => assert_eq!(member, "run"),
            other => panic!("expected NoTarget, got {other}"),
        }

        // A short-circuiting interceptor keeps the member usable
        struct Stub;
        impl Interceptor for Stub {
            fn intercept(&self, invocation: &mut Invocation) -> CallResult<()> {
                invocation.set_return_value(Value::Int(0));
                Ok(())
            }
        }
        let proxy = generator
            .create_proxy(ProxyRequest::new(iface).with_interceptor(Arc::new(Stub)))
            .unwrap();
        assert!(proxy.invoke("run", &mut [], &[]).is_ok());
    }
}
