//! End-to-end scenarios for the coupling engine.
//!
//! Each test builds a small model from scratch: register contracts,
//! seed the namespace, step the coordinator, assert on the namespace.

use std::sync::{Arc, Mutex};

use conflux_runtime::{
    Contract, Error, GraphConfigurationError, NotFoundError, ParameterError, RegisterOptions,
    TypeSpec, Value,
};
use conflux_tests::{ModelHarness, affine};
use indexmap::IndexMap;

/// One contract `f(x, y=1) -> z = x + y`. Registration seeds x (unset,
/// required), y (default 1), z (unset); one step computes z.
#[test]
fn test_single_contract_step() {
    let f = Contract::builder("f")
        .input_typed("x", TypeSpec::Float)
        .default_typed("y", TypeSpec::Float, Value::Float(1.0))
        .output("z")
        .build(|args| {
            Ok(Value::Float(
                args.float("x").unwrap_or(0.0) + args.float("y").unwrap_or(0.0),
            ))
        })
        .unwrap();

    let mut harness = ModelHarness::new();
    harness.register(f);

    assert!(harness.is_unset("x"));
    assert_eq!(harness.float("y"), 1.0);
    assert!(harness.is_unset("z"));
    assert_eq!(harness.coordinator().required_inputs(), vec!["x"]);

    harness.set_float("x", 2.0).run_step();
    assert_eq!(harness.float("z"), 3.0);
    assert_eq!(harness.float("y"), 1.0);
}

/// Two contracts coupled only through the namespace:
/// `f(x, y=1) -> z`, then `g(z) -> w = z * 2`.
#[test]
fn test_contracts_couple_through_namespace() {
    let f = Contract::builder("f")
        .input_typed("x", TypeSpec::Float)
        .default_typed("y", TypeSpec::Float, Value::Float(1.0))
        .output("z")
        .build(|args| {
            Ok(Value::Float(
                args.float("x").unwrap_or(0.0) + args.float("y").unwrap_or(0.0),
            ))
        })
        .unwrap();

    let mut harness = ModelHarness::new();
    harness
        .register(f)
        .register(affine("g", "z", "w", 2.0, 0.0))
        .set_float("x", 2.0)
        .run_step();

    assert_eq!(harness.float("z"), 3.0);
    assert_eq!(harness.float("w"), 6.0);
}

/// A contract writing into a constant parameter aborts the step; the
/// constant keeps its value.
#[test]
fn test_constant_output_aborts_step() {
    let mut harness = ModelHarness::new();
    harness.register(affine("producer", "x", "k", 1.0, 0.0));
    harness
        .coordinator_mut()
        .set_value_opts("k", Value::Float(5.0), true, false)
        .unwrap();
    harness.set_float("x", 9.0);

    let err = harness.coordinator_mut().run_step().unwrap_err();
    assert!(matches!(
        err,
        Error::Parameter(ParameterError::OverwriteConstant { .. })
    ));
    assert_eq!(harness.float("k"), 5.0);
}

/// A generator contract registered with dynamic expansion: `gen(x)`
/// produces a contract into its output "inner"; the synthesized
/// passthrough contract executes the generated `inner() -> y = x + 1`
/// in the same step.
#[test]
fn test_dynamic_expansion_executes_generated_contract() {
    let generator = Contract::builder("gen")
        .input_typed("x", TypeSpec::Float)
        .output("inner")
        .returns(TypeSpec::Contract)
        .build(|args| {
            let x = args.float("x").unwrap_or(0.0);
            let inner = Contract::builder("inner")
                .output("y")
                .build(move |_| Ok(Value::Float(x + 1.0)))?;
            Ok(Value::Contract(inner))
        })
        .unwrap();

    let mut harness = ModelHarness::new();
    harness.register_expanding(generator);

    assert_eq!(harness.coordinator().call_order(), ["gen", "inner"]);
    assert!(harness.coordinator().contracts()["inner"].is_dynamic());

    harness.set_float("x", 1.0).run_step();
    assert_eq!(harness.float("y"), 2.0);

    // x unchanged: regeneration reproduces the same result.
    harness.run_step();
    assert_eq!(harness.float("y"), 2.0);

    harness.set_float("x", 10.0).run_step();
    assert_eq!(harness.float("y"), 11.0);
}

/// Renaming `h(x, y=1) -> z` with `{a: x}` changes the required input
/// to "a" while invocation behaves exactly as before.
#[test]
fn test_renamed_contract_behaves_identically() {
    let build_h = || {
        Contract::builder("h")
            .input_typed("x", TypeSpec::Float)
            .default_typed("y", TypeSpec::Float, Value::Float(1.0))
            .output("z")
            .build(|args| {
                Ok(Value::Float(
                    args.float("x").unwrap_or(0.0) + args.float("y").unwrap_or(0.0),
                ))
            })
            .unwrap()
    };

    let mut renamed = build_h();
    renamed
        .rename(IndexMap::from([("a".to_string(), "x".to_string())]))
        .unwrap();
    assert_eq!(renamed.required_inputs(), vec!["a"]);

    let mut plain = ModelHarness::new();
    plain.register(build_h()).set_float("x", 5.0).run_step();

    let mut aliased = ModelHarness::new();
    aliased.register(renamed).set_float("a", 5.0).run_step();

    assert_eq!(plain.float("z"), aliased.float("z"));
    assert_eq!(aliased.float("z"), 6.0);
}

/// A required input with no value aborts the step, naming the input,
/// before any contract executes.
#[test]
fn test_unset_required_input_aborts_step() {
    let invoked = Arc::new(Mutex::new(false));
    let flag = invoked.clone();
    let k = Contract::builder("k")
        .input("x")
        .output("y")
        .build(move |args| {
            *flag.lock().unwrap() = true;
            Ok(args.get("x").cloned().unwrap_or_default())
        })
        .unwrap();

    let mut harness = ModelHarness::new();
    harness.register(k);

    let err = harness.coordinator_mut().run_step().unwrap_err();
    match err {
        Error::Parameter(ParameterError::MissingRequired { names }) => {
            assert_eq!(names, vec!["x"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!*invoked.lock().unwrap());
}

/// Re-registering a contract preserves existing parameter values unless
/// defaults are explicitly overwritten.
#[test]
fn test_reregistration_preserves_values() {
    let build = || {
        Contract::builder("f")
            .default_typed("rate", TypeSpec::Float, Value::Float(1.0))
            .output("out")
            .build(|args| Ok(Value::Float(args.float("rate").unwrap_or(0.0))))
            .unwrap()
    };

    let mut harness = ModelHarness::new();
    harness.register(build()).set_float("rate", 42.0);
    harness.register(build());
    assert_eq!(harness.float("rate"), 42.0);

    harness
        .coordinator_mut()
        .register_with(
            build(),
            RegisterOptions {
                overwrite_defaults: true,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(harness.float("rate"), 1.0);
}

/// Output names scanned from source text must agree across every return
/// point.
#[test]
fn test_inconsistent_return_names_rejected() {
    let err = Contract::builder("f")
        .input("x")
        .source("def f(x):\n    if x:\n        return a\n    return b\n")
        .build(|_| Ok(Value::Unset))
        .unwrap_err();
    assert!(matches!(err, Error::ContractDefinition(_)));

    let ok = Contract::builder("f")
        .input("x")
        .source("def f(x):\n    if x:\n        return a\n    return a\n")
        .build(|_| Ok(Value::Unset))
        .unwrap();
    assert_eq!(ok.outputs(), ["a"]);
}

/// Validators and listeners ride along on namespace writes driven by
/// stepping.
#[test]
fn test_validator_and_listener_through_stepping() {
    let mut harness = ModelHarness::new();
    harness.coordinator_mut().add_parameter_with(
        "temperature",
        Value::Float(100.0),
        false,
        Some(Arc::new(|v| v.as_float().is_some_and(|t| t > 0.0))),
    );
    harness.register(affine("heat", "temperature", "temperature", 1.0, 50.0));

    let seen: Arc<Mutex<Vec<f64>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    {
        let param = harness
            .coordinator_mut()
            .parameter_mut("temperature")
            .unwrap();
        param.add_listener(Arc::new(move |_, value| {
            if let Some(t) = value.as_float() {
                sink.lock().unwrap().push(t);
            }
        }));
    }

    // The validator holds for stepped writes and rejects bad manual ones.
    let err = harness
        .coordinator_mut()
        .set_value("temperature", Value::Float(-40.0))
        .unwrap_err();
    assert!(matches!(err, Error::Parameter(ParameterError::Rejected { .. })));

    harness.run_steps(2);
    assert_eq!(harness.float("temperature"), 200.0);
    assert_eq!(*seen.lock().unwrap(), vec![150.0, 200.0]);
}

/// Initialization runs once before the first step; finalization runs on
/// demand and pins its outputs as constants.
#[test]
fn test_initialize_and_finalize_phases() {
    let mut harness = ModelHarness::new();
    harness.register(affine("heat", "temperature", "temperature", 1.0, 1.0));

    let warmup = Contract::builder("warmup")
        .default_typed("temperature", TypeSpec::Float, Value::Float(0.0))
        .output("temperature")
        .build(|args| Ok(Value::Float(args.float("temperature").unwrap_or(0.0) + 10.0)))
        .unwrap();
    let report = Contract::builder("report")
        .input_typed("temperature", TypeSpec::Float)
        .output("final_temperature")
        .build(|args| Ok(Value::Float(args.float("temperature").unwrap_or(0.0))))
        .unwrap();

    harness.coordinator_mut().add_initialization(warmup);
    harness.coordinator_mut().add_finalization(report);
    harness.set_float("temperature", 0.0);

    harness.run_steps(3);
    // 10 from one-shot initialization, +1 per step.
    assert_eq!(harness.float("temperature"), 13.0);

    harness.coordinator_mut().finalize().unwrap();
    assert_eq!(harness.float("final_temperature"), 13.0);
    assert!(harness.coordinator().parameters()["final_temperature"].is_constant());
}

/// Removing a contract keeps the parameters it introduced.
#[test]
fn test_unregister_keeps_namespace() {
    let mut harness = ModelHarness::new();
    harness
        .register(affine("double", "x", "twice", 2.0, 0.0))
        .set_float("x", 4.0)
        .run_step();
    assert_eq!(harness.float("twice"), 8.0);

    harness.coordinator_mut().unregister("double").unwrap();
    assert!(matches!(
        harness.coordinator_mut().call("double").unwrap_err(),
        Error::NotFound(NotFoundError::Contract(_))
    ));
    assert_eq!(harness.float("twice"), 8.0);
}

/// Dynamic expansion demands a contract-producing declared return type.
#[test]
fn test_expansion_rejects_plain_return_type() {
    let contract = Contract::builder("gen")
        .output("made")
        .returns(TypeSpec::List(Box::new(TypeSpec::Float)))
        .build(|_| Ok(Value::Unset))
        .unwrap();

    let mut harness = ModelHarness::new();
    let err = harness
        .coordinator_mut()
        .register_with(
            contract,
            RegisterOptions {
                expand_dynamic: true,
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::GraphConfiguration(GraphConfigurationError::NotContractProducing { .. })
    ));
}
