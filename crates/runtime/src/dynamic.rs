//! Dynamic contracts
//!
//! A dynamic contract binds a generator in place of a fixed callable. The
//! generator is re-run on demand and must produce a fresh [`Contract`],
//! which is swapped in atomically; the visible shape always mirrors the
//! most recently generated contract and is empty before the first update.

use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::contract::{Contract, InputSpec};
use crate::error::{GraphConfigurationError, NotFoundError, Result};
use crate::param::Namespace;
use crate::types::{CallArgs, CallableFn, Value};

/// How a dynamic contract obtains its next inner contract.
pub enum Generator {
    /// A callable invoked with the stored generator arguments. Must
    /// return [`Value::Contract`].
    Callable(CallableFn),
    /// Reads the named parameter's current value out of the owning
    /// coordinator's namespace. Synthesized by dynamic expansion for
    /// contract-producing outputs.
    Passthrough { parameter: String },
}

/// A contract regenerated by a generator between invocations.
pub struct DynamicContract {
    name: String,
    generator: Generator,
    /// Arguments handed to a callable generator on every update.
    args: CallArgs,
    current: Option<Contract>,
    previous: Option<Contract>,
}

impl DynamicContract {
    pub fn new(name: impl Into<String>, generator: Generator) -> Self {
        Self {
            name: name.into(),
            generator,
            args: CallArgs::default(),
            current: None,
            previous: None,
        }
    }

    /// Arguments passed to a callable generator on each update.
    pub fn with_generator_args(mut self, args: CallArgs) -> Self {
        self.args = args;
        self
    }

    pub fn set_generator_args(&mut self, args: CallArgs) {
        self.args = args;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The most recently generated contract, if any.
    pub fn current(&self) -> Option<&Contract> {
        self.current.as_ref()
    }

    /// The contract replaced by the last update, if any.
    pub fn previous(&self) -> Option<&Contract> {
        self.previous.as_ref()
    }

    pub fn is_generated(&self) -> bool {
        self.current.is_some()
    }

    /// Inputs of the current contract; empty while ungenerated.
    pub fn inputs(&self) -> IndexMap<String, InputSpec> {
        self.current
            .as_ref()
            .map(|c| c.inputs().clone())
            .unwrap_or_default()
    }

    /// Outputs of the current contract; empty while ungenerated.
    pub fn outputs(&self) -> Vec<String> {
        self.current
            .as_ref()
            .map(|c| c.outputs().to_vec())
            .unwrap_or_default()
    }

    pub fn required_inputs(&self) -> Vec<String> {
        self.current
            .as_ref()
            .map(Contract::required_inputs)
            .unwrap_or_default()
    }

    pub fn all_referenced_names(&self) -> Vec<String> {
        self.current
            .as_ref()
            .map(Contract::all_referenced_names)
            .unwrap_or_default()
    }

    /// Re-run the generator and swap in the freshly produced contract.
    pub fn update(&mut self, namespace: &Namespace) -> Result<()> {
        let produced = match &self.generator {
            Generator::Callable(generate) => generate(&self.args)?,
            Generator::Passthrough { parameter } => namespace
                .get(parameter)
                .ok_or_else(|| NotFoundError::Parameter(parameter.clone()))?
                .value()
                .clone(),
        };

        let Value::Contract(contract) = produced else {
            return Err(GraphConfigurationError::GeneratorNotContract {
                name: self.name.clone(),
            }
            .into());
        };

        debug!(dynamic = %self.name, inner = %contract.name(), "dynamic contract regenerated");
        self.previous = self.current.take();
        self.current = Some(contract);
        Ok(())
    }

    /// Regenerate, then invoke the fresh contract.
    pub fn invoke(&mut self, args: &CallArgs, namespace: &Namespace) -> Result<Value> {
        self.update(namespace)?;
        self.invoke_without_update(args)
    }

    /// Invoke the currently bound contract without regenerating.
    pub fn invoke_without_update(&self, args: &CallArgs) -> Result<Value> {
        let Some(contract) = &self.current else {
            return Err(GraphConfigurationError::NotGenerated {
                name: self.name.clone(),
            }
            .into());
        };
        contract.invoke(args)
    }
}

// Generator holds closures, so Debug is written by hand.
impl fmt::Debug for DynamicContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicContract")
            .field("name", &self.name)
            .field("generated", &self.current.is_some())
            .finish()
    }
}
