//! Integration test harness for conflux.
//!
//! Wraps a [`Coordinator`] with panicking convenience accessors so the
//! end-to-end scenarios read as: build contracts, set values, step,
//! assert on the namespace.

use conflux_runtime::{Contract, Coordinator, RegisterOptions, TypeSpec, Value};

/// Install a test-friendly tracing subscriber. Safe to call from every
/// test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .try_init();
}

/// Coordinator wrapper for end-to-end scenarios.
///
/// # Panics
///
/// Every method panics on engine errors; scenarios exercising failure
/// paths go through [`coordinator_mut`](Self::coordinator_mut) instead.
#[derive(Default)]
pub struct ModelHarness {
    coordinator: Coordinator,
}

impl ModelHarness {
    pub fn new() -> Self {
        init_tracing();
        Self::default()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut Coordinator {
        &mut self.coordinator
    }

    pub fn register(&mut self, contract: Contract) -> &mut Self {
        let name = contract.name().to_string();
        self.coordinator
            .register(contract)
            .unwrap_or_else(|e| panic!("registering {name} failed: {e}"));
        self
    }

    /// Register with dynamic expansion of contract-producing outputs.
    pub fn register_expanding(&mut self, contract: Contract) -> &mut Self {
        let name = contract.name().to_string();
        self.coordinator
            .register_with(
                contract,
                RegisterOptions {
                    expand_dynamic: true,
                    ..Default::default()
                },
            )
            .unwrap_or_else(|e| panic!("registering {name} failed: {e}"));
        self
    }

    pub fn set(&mut self, name: &str, value: Value) -> &mut Self {
        self.coordinator
            .set_value(name, value)
            .unwrap_or_else(|e| panic!("setting {name} failed: {e}"));
        self
    }

    pub fn set_float(&mut self, name: &str, value: f64) -> &mut Self {
        self.set(name, Value::Float(value))
    }

    pub fn run_step(&mut self) -> &mut Self {
        self.coordinator
            .run_step()
            .unwrap_or_else(|e| panic!("step failed: {e}"));
        self
    }

    pub fn run_steps(&mut self, steps: usize) -> &mut Self {
        self.coordinator
            .run_steps(steps)
            .unwrap_or_else(|e| panic!("stepping failed: {e}"));
        self
    }

    pub fn value(&self, name: &str) -> Value {
        self.coordinator
            .get_value(name)
            .unwrap_or_else(|e| panic!("reading {name} failed: {e}"))
            .clone()
    }

    pub fn float(&self, name: &str) -> f64 {
        self.value(name)
            .as_float()
            .unwrap_or_else(|| panic!("{name} holds no numeric value"))
    }

    pub fn is_unset(&self, name: &str) -> bool {
        self.value(name).is_unset()
    }
}

/// `name(input, ...) -> output = input * scale + offset`, the workhorse
/// contract of the scenarios.
pub fn affine(name: &str, input: &str, output: &str, scale: f64, offset: f64) -> Contract {
    let input_name = input.to_string();
    Contract::builder(name)
        .input_typed(input, TypeSpec::Float)
        .output(output)
        .build(move |args| {
            let x = args.float(&input_name).unwrap_or(0.0);
            Ok(Value::Float(x * scale + offset))
        })
        .unwrap_or_else(|e| panic!("building {name} failed: {e}"))
}
