//! Coordinator
//!
//! Owns the shared namespace of [`Parameter`] cells and the registry of
//! contracts, and drives execution: one step invokes every registered
//! contract in call order, feeding each from the namespace and
//! distributing its outputs back. Registration keeps the namespace
//! consistent with every name a contract references.

use indexmap::IndexMap;
use tracing::{debug, info, instrument, trace};

use crate::contract::{Contract, InputSpec};
use crate::dynamic::{DynamicContract, Generator};
use crate::error::{
    GraphConfigurationError, NotFoundError, ParameterError, Result,
};
use crate::param::{Namespace, Parameter, Validator};
use crate::types::{CallArgs, TypeSpec, Value};
use crate::typing;

/// A registered contract: fixed or regenerated between invocations.
#[derive(Debug)]
pub enum Registered {
    Static(Contract),
    Dynamic(DynamicContract),
}

impl Registered {
    pub fn name(&self) -> &str {
        match self {
            Registered::Static(c) => c.name(),
            Registered::Dynamic(d) => d.name(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Registered::Dynamic(_))
    }

    /// Visible inputs. Empty for an ungenerated dynamic contract.
    pub fn inputs(&self) -> IndexMap<String, InputSpec> {
        match self {
            Registered::Static(c) => c.inputs().clone(),
            Registered::Dynamic(d) => d.inputs(),
        }
    }

    /// Visible outputs. Empty for an ungenerated dynamic contract.
    pub fn outputs(&self) -> Vec<String> {
        match self {
            Registered::Static(c) => c.outputs().to_vec(),
            Registered::Dynamic(d) => d.outputs(),
        }
    }

    pub fn required_inputs(&self) -> Vec<String> {
        match self {
            Registered::Static(c) => c.required_inputs(),
            Registered::Dynamic(d) => d.required_inputs(),
        }
    }

    pub fn all_referenced_names(&self) -> Vec<String> {
        match self {
            Registered::Static(c) => c.all_referenced_names(),
            Registered::Dynamic(d) => d.all_referenced_names(),
        }
    }
}

/// Knobs for [`Coordinator::register_with`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterOptions {
    /// Write the contract's defaults over parameters that already exist.
    pub overwrite_defaults: bool,
    /// Synthesize a passthrough dynamic contract for every
    /// contract-producing output. Requires a declared return type.
    pub expand_dynamic: bool,
}

/// How distribution treats output names without a parameter, and how it
/// writes into existing cells.
#[derive(Clone, Copy)]
enum OutputPolicy {
    /// Unknown names get ordinary parameters; unset cells are replaced
    /// outright; constants fail.
    Step,
    /// Initialization: unknown names are added silently as ordinary
    /// parameters and never become required state.
    Initialize,
    /// Finalization: unknown names are added as constants.
    Finalize,
}

/// Namespace owner and execution driver.
#[derive(Debug, Default)]
pub struct Coordinator {
    contracts: IndexMap<String, Registered>,
    call_order: Vec<String>,
    parameters: Namespace,
    initialization: Vec<Contract>,
    finalization: Vec<Contract>,
    has_initialized: bool,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameters(&self) -> &Namespace {
        &self.parameters
    }

    pub fn contracts(&self) -> &IndexMap<String, Registered> {
        &self.contracts
    }

    /// Invocation order for [`run_step`](Self::run_step). Always exactly
    /// the set of registered names.
    pub fn call_order(&self) -> &[String] {
        &self.call_order
    }

    // ---- registration -------------------------------------------------

    pub fn register(&mut self, contract: Contract) -> Result<()> {
        self.register_with(contract, RegisterOptions::default())
    }

    pub fn register_all(&mut self, contracts: impl IntoIterator<Item = Contract>) -> Result<()> {
        for contract in contracts {
            self.register(contract)?;
        }
        Ok(())
    }

    /// Register a contract, seeding a parameter for every name it
    /// references: inputs from their defaults (`Unset` for required),
    /// outputs as `Unset`. A re-registered name keeps its call-order
    /// slot.
    pub fn register_with(&mut self, contract: Contract, opts: RegisterOptions) -> Result<()> {
        let expansion = if opts.expand_dynamic {
            Some(Self::expansion_targets(&contract)?)
        } else {
            None
        };

        let name = contract.name().to_string();
        debug!(contract = %name, dynamic_expansion = opts.expand_dynamic, "registering contract");

        for (input, spec) in contract.inputs() {
            match self.parameters.get_mut(input) {
                None => {
                    self.parameters
                        .insert(input.clone(), spec.default_value().clone());
                }
                Some(param) if opts.overwrite_defaults && !spec.is_required() => {
                    param.set(spec.default_value().value().clone())?;
                }
                Some(_) => {}
            }
        }
        for output in contract.outputs() {
            self.parameters
                .entry(output.clone())
                .or_insert_with(|| Parameter::new(output.clone(), Value::Unset));
        }

        self.contracts.insert(name.clone(), Registered::Static(contract));
        self.slot(&name);

        if let Some(targets) = expansion {
            for target in targets {
                if self.contracts.contains_key(&target) {
                    continue;
                }
                debug!(contract = %name, produced = %target, "synthesizing passthrough dynamic contract");
                let dynamic = DynamicContract::new(
                    target.clone(),
                    Generator::Passthrough {
                        parameter: target.clone(),
                    },
                );
                self.register_dynamic(dynamic);
            }
        }

        Ok(())
    }

    /// Register a dynamic contract, seeding parameters for whatever shape
    /// it currently exposes.
    pub fn register_dynamic(&mut self, dynamic: DynamicContract) {
        let name = dynamic.name().to_string();
        debug!(contract = %name, generated = dynamic.is_generated(), "registering dynamic contract");

        for (input, spec) in dynamic.inputs() {
            self.parameters
                .entry(input)
                .or_insert_with(|| spec.default_value().clone());
        }
        for output in dynamic.outputs() {
            self.parameters
                .entry(output.clone())
                .or_insert_with(|| Parameter::new(output, Value::Unset));
        }

        self.contracts.insert(name.clone(), Registered::Dynamic(dynamic));
        self.slot(&name);
    }

    /// Remove a contract. Its parameters stay behind.
    pub fn unregister(&mut self, name: &str) -> Result<()> {
        if self.contracts.shift_remove(name).is_none() {
            return Err(NotFoundError::Contract(name.to_string()).into());
        }
        self.call_order.retain(|n| n != name);
        debug!(contract = %name, "unregistered");
        Ok(())
    }

    /// Per-output declared types of a contract flagged for expansion.
    /// Every output position must produce a contract.
    fn expansion_targets(contract: &Contract) -> Result<Vec<String>> {
        let Some(return_type) = contract.return_type() else {
            return Err(GraphConfigurationError::MissingReturnType {
                name: contract.name().to_string(),
            }
            .into());
        };

        let outputs = contract.outputs();
        let per_output: Vec<(&String, TypeSpec)> = match return_type {
            TypeSpec::Tuple(items) if items.len() == outputs.len() => {
                outputs.iter().zip(items.iter().cloned()).collect()
            }
            other => outputs.iter().map(|o| (o, other.clone())).collect(),
        };

        for (output, declared) in &per_output {
            if !typing::produces_contract(declared) {
                return Err(GraphConfigurationError::NotContractProducing {
                    name: contract.name().to_string(),
                    output: (*output).clone(),
                    declared: declared.clone(),
                }
                .into());
            }
        }

        Ok(outputs.to_vec())
    }

    fn slot(&mut self, name: &str) {
        if !self.call_order.iter().any(|n| n == name) {
            self.call_order.push(name.to_string());
        }
    }

    // ---- parameters ---------------------------------------------------

    pub fn add_parameter(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        self.parameters
            .insert(name.clone(), Parameter::new(name, value));
    }

    pub fn add_parameter_with(
        &mut self,
        name: impl Into<String>,
        value: Value,
        constant: bool,
        validator: Option<Validator>,
    ) {
        let name = name.into();
        let mut param = Parameter::new(name.clone(), value);
        if let Some(validator) = validator {
            param = param.with_validator(validator);
        }
        param.set_constant(constant);
        self.parameters.insert(name, param);
    }

    /// Write a parameter in place, keeping its validator and listeners.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        self.set_value_opts(name, value, false, false)
    }

    /// Write a parameter in place, then apply the constant flag. A forced
    /// write bypasses the constant check but never the validator.
    pub fn set_value_opts(
        &mut self,
        name: &str,
        value: Value,
        constant: bool,
        force: bool,
    ) -> Result<()> {
        let param = self
            .parameters
            .get_mut(name)
            .ok_or_else(|| NotFoundError::Parameter(name.to_string()))?;
        if force {
            param.set_forced(value)?;
        } else {
            param.set(value)?;
        }
        param.set_constant(constant);
        Ok(())
    }

    pub fn get_value(&self, name: &str) -> Result<&Value> {
        self.parameters
            .get(name)
            .map(Parameter::value)
            .ok_or_else(|| NotFoundError::Parameter(name.to_string()).into())
    }

    pub fn parameter_mut(&mut self, name: &str) -> Result<&mut Parameter> {
        self.parameters
            .get_mut(name)
            .ok_or_else(|| NotFoundError::Parameter(name.to_string()).into())
    }

    // ---- ordering -----------------------------------------------------

    /// Replace the call order. Must be exactly a permutation of the
    /// registered names.
    pub fn reorder(&mut self, order: Vec<String>) -> Result<()> {
        if order.len() != self.contracts.len() {
            return Err(GraphConfigurationError::OrderSize {
                expected: self.contracts.len(),
                actual: order.len(),
            }
            .into());
        }
        for (i, name) in order.iter().enumerate() {
            if !self.contracts.contains_key(name) {
                return Err(GraphConfigurationError::OrderUnknownName {
                    name: name.clone(),
                }
                .into());
            }
            if order[..i].contains(name) {
                return Err(GraphConfigurationError::OrderDuplicateName {
                    name: name.clone(),
                }
                .into());
            }
        }
        debug!(order = ?order, "call order replaced");
        self.call_order = order;
        Ok(())
    }

    // ---- introspection ------------------------------------------------

    /// Default-less inputs across all contracts, minus every name some
    /// contract produces as an output.
    pub fn required_inputs(&self) -> Vec<String> {
        let produced: Vec<String> = self
            .contracts
            .values()
            .flat_map(Registered::outputs)
            .collect();

        let mut required = Vec::new();
        for registered in self.contracts.values() {
            for name in registered.required_inputs() {
                if !produced.contains(&name) && !required.contains(&name) {
                    required.push(name);
                }
            }
        }
        required
    }

    /// Required inputs whose parameter is still unset.
    pub fn unset_required(&self) -> Vec<String> {
        self.required_inputs()
            .into_iter()
            .filter(|name| {
                self.parameters
                    .get(name)
                    .is_none_or(Parameter::is_unset)
            })
            .collect()
    }

    // ---- execution ----------------------------------------------------

    /// Advance the model by one step: initialize if never initialized,
    /// verify every required input is set, then invoke every contract in
    /// call order, distributing outputs into the namespace after each.
    /// Fails fast; parameters already written this step keep their
    /// values.
    #[instrument(skip(self))]
    pub fn run_step(&mut self) -> Result<()> {
        self.initialize()?;

        let unset = self.unset_required();
        if !unset.is_empty() {
            return Err(ParameterError::MissingRequired { names: unset }.into());
        }

        let order = self.call_order.clone();
        for name in order {
            trace!(contract = %name, "stepping");
            self.invoke_registered(&name)?;
        }
        Ok(())
    }

    pub fn run_steps(&mut self, steps: usize) -> Result<()> {
        for _ in 0..steps {
            self.run_step()?;
        }
        Ok(())
    }

    /// Invoke a single registered contract by name, distributing its
    /// outputs, and return the raw invocation result.
    pub fn call(&mut self, name: &str) -> Result<Value> {
        if !self.contracts.contains_key(name) {
            return Err(NotFoundError::Contract(name.to_string()).into());
        }
        self.invoke_registered(name)
    }

    /// Invoke an arbitrary contract against this namespace, with the same
    /// gather and distribution rules as [`call`](Self::call).
    pub fn call_contract(&mut self, contract: &Contract) -> Result<Value> {
        let args = Self::gather(&self.parameters, contract.inputs(), false);
        let result = contract.invoke(&args)?;
        let outputs = contract.outputs().to_vec();
        self.distribute(contract.name(), &outputs, result.clone(), OutputPolicy::Step)?;
        Ok(result)
    }

    fn invoke_registered(&mut self, name: &str) -> Result<Value> {
        // A dynamic contract regenerates first; names its fresh shape
        // references may be new to the namespace.
        let mut discovered: Vec<Parameter> = Vec::new();
        if let Some(Registered::Dynamic(dynamic)) = self.contracts.get_mut(name) {
            dynamic.update(&self.parameters)?;
            for (input, spec) in dynamic.inputs() {
                if !self.parameters.contains_key(&input) {
                    discovered.push(spec.default_value().clone());
                }
            }
            for output in dynamic.outputs() {
                if !self.parameters.contains_key(&output) {
                    discovered.push(Parameter::new(output, Value::Unset));
                }
            }
        }
        for param in discovered {
            trace!(contract = %name, parameter = %param.name(), "seeding discovered parameter");
            self.parameters.insert(param.name().to_string(), param);
        }

        let registered = self
            .contracts
            .get(name)
            .ok_or_else(|| NotFoundError::Contract(name.to_string()))?;
        let inputs = registered.inputs();
        let outputs = registered.outputs();
        let args = Self::gather(&self.parameters, &inputs, false);

        let result = match registered {
            Registered::Static(contract) => contract.invoke(&args)?,
            Registered::Dynamic(dynamic) => dynamic.invoke_without_update(&args)?,
        };

        self.distribute(name, &outputs, result.clone(), OutputPolicy::Step)?;
        Ok(result)
    }

    /// Run the initialization contracts once. Gated: re-entry is a no-op
    /// after the first success.
    pub fn initialize(&mut self) -> Result<()> {
        if self.has_initialized {
            return Ok(());
        }
        if !self.initialization.is_empty() {
            info!(contracts = self.initialization.len(), "running initialization");
        }
        let contracts = self.initialization.clone();
        for contract in &contracts {
            let args = Self::gather(&self.parameters, contract.inputs(), true);
            let result = contract.invoke(&args)?;
            let outputs = contract.outputs().to_vec();
            self.distribute(contract.name(), &outputs, result, OutputPolicy::Initialize)?;
        }
        self.has_initialized = true;
        Ok(())
    }

    /// Run the finalization contracts. Callable any number of times.
    /// Outputs for unknown names become constant parameters.
    pub fn finalize(&mut self) -> Result<()> {
        if !self.finalization.is_empty() {
            info!(contracts = self.finalization.len(), "running finalization");
        }
        let contracts = self.finalization.clone();
        for contract in &contracts {
            let args = Self::gather(&self.parameters, contract.inputs(), true);
            let result = contract.invoke(&args)?;
            let outputs = contract.outputs().to_vec();
            self.distribute(contract.name(), &outputs, result, OutputPolicy::Finalize)?;
        }
        Ok(())
    }

    pub fn add_initialization(&mut self, contract: Contract) {
        self.initialization.push(contract);
    }

    pub fn add_finalization(&mut self, contract: Contract) {
        self.finalization.push(contract);
    }

    /// Collect current values for a contract's inputs: positional-only
    /// values positionally, the rest by name. With `fall_back`, an unset
    /// or absent parameter yields the input's own default instead.
    fn gather(
        parameters: &Namespace,
        inputs: &IndexMap<String, InputSpec>,
        fall_back: bool,
    ) -> CallArgs {
        let mut args = CallArgs::new();
        for (name, spec) in inputs {
            let value = match parameters.get(name) {
                Some(param) if !(fall_back && param.is_unset()) => param.value().clone(),
                _ if fall_back => spec.default_value().value().clone(),
                _ => Value::Unset,
            };
            if spec.is_positional_only() {
                args.positional.push(value);
            } else {
                args.named.insert(name.clone(), value);
            }
        }
        args
    }

    /// Distribute one invocation result across declared outputs. A single
    /// name receives the whole result; multiple names positionally unpack
    /// a list. No declared outputs discards the result.
    fn distribute(
        &mut self,
        source: &str,
        outputs: &[String],
        result: Value,
        policy: OutputPolicy,
    ) -> Result<()> {
        match outputs {
            [] => Ok(()),
            [single] => self.write_output(source, single, result, policy),
            many => {
                let values = match result {
                    Value::List(items) if items.len() == many.len() => items,
                    Value::List(items) => {
                        return Err(GraphConfigurationError::OutputArity {
                            name: source.to_string(),
                            expected: many.len(),
                            actual: items.len(),
                        }
                        .into());
                    }
                    _ => {
                        return Err(GraphConfigurationError::OutputArity {
                            name: source.to_string(),
                            expected: many.len(),
                            actual: 1,
                        }
                        .into());
                    }
                };
                for (name, value) in many.iter().zip(values) {
                    self.write_output(source, name, value, policy)?;
                }
                Ok(())
            }
        }
    }

    fn write_output(
        &mut self,
        source: &str,
        name: &str,
        value: Value,
        policy: OutputPolicy,
    ) -> Result<()> {
        let Some(param) = self.parameters.get_mut(name) else {
            let param = match policy {
                OutputPolicy::Finalize => Parameter::constant(name, value),
                OutputPolicy::Step | OutputPolicy::Initialize => Parameter::new(name, value),
            };
            self.parameters.insert(name.to_string(), param);
            return Ok(());
        };

        if param.is_constant() {
            return Err(ParameterError::OverwriteConstant {
                contract: source.to_string(),
                name: name.to_string(),
            }
            .into());
        }

        if param.is_unset() {
            // First value a cell ever receives replaces it outright,
            // adopting the value's type.
            *param = Parameter::new(name, value);
            return Ok(());
        }

        param.set(value)?;
        Ok(())
    }
}
