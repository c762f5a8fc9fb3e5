//! Contracts
//!
//! A contract wraps one callable together with a structural description
//! of its named inputs (with defaults) and named outputs. The shape is
//! declared explicitly through [`ContractBuilder`], taken from another
//! contract (forwarding wrappers), or extracted from the callable's
//! defining text as a compatibility shim.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::{ContractDefinitionError, ParameterError, Result};
use crate::extract::{self, is_identifier};
use crate::param::Parameter;
use crate::types::{CallArgs, CallableFn, TypeSpec, Value};

/// One declared input of a contract.
#[derive(Debug, Clone)]
pub struct InputSpec {
    ty: TypeSpec,
    /// Default value cell. Holds `Unset` for a required input.
    default: Parameter,
    positional_only: bool,
}

impl InputSpec {
    pub fn ty(&self) -> &TypeSpec {
        &self.ty
    }

    pub fn default_value(&self) -> &Parameter {
        &self.default
    }

    pub fn is_required(&self) -> bool {
        self.default.is_unset()
    }

    pub fn is_positional_only(&self) -> bool {
        self.positional_only
    }
}

/// Structural description of one callable: its named inputs, named
/// outputs, declared types, and the wrapped callable itself.
///
/// Equality is name equality, not identity of the wrapped callable.
#[derive(Clone)]
pub struct Contract {
    name: String,
    callable: CallableFn,
    inputs: IndexMap<String, InputSpec>,
    outputs: Vec<String>,
    return_type: Option<TypeSpec>,
    /// External name -> internal (callable-side) name.
    rename: IndexMap<String, String>,
    typecheck: bool,
    auto_wrap: bool,
    scan_warnings: Vec<String>,
}

impl Contract {
    pub fn builder(name: impl Into<String>) -> ContractBuilder {
        ContractBuilder::new(name)
    }

    /// A zero-input contract that always produces `value`. Used by
    /// auto-wrap to promote plain invocation results.
    pub fn constant(name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        Self {
            name,
            callable: Arc::new(move |_| Ok(value.clone())),
            inputs: IndexMap::new(),
            outputs: Vec::new(),
            return_type: None,
            rename: IndexMap::new(),
            typecheck: false,
            auto_wrap: false,
            scan_warnings: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared inputs in order, under their current (possibly renamed)
    /// external names.
    pub fn inputs(&self) -> &IndexMap<String, InputSpec> {
        &self.inputs
    }

    /// Declared output names in order. Possibly empty.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn return_type(&self) -> Option<&TypeSpec> {
        self.return_type.as_ref()
    }

    /// Declared type per input name.
    pub fn declared_types(&self) -> IndexMap<String, TypeSpec> {
        self.inputs
            .iter()
            .map(|(name, spec)| (name.clone(), spec.ty.clone()))
            .collect()
    }

    /// Inputs with no default value, in declaration order.
    pub fn required_inputs(&self) -> Vec<String> {
        self.inputs
            .iter()
            .filter(|(_, spec)| spec.is_required())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Positional-only input names, in declaration order.
    pub fn positional_only(&self) -> Vec<String> {
        self.inputs
            .iter()
            .filter(|(_, spec)| spec.positional_only)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Every input and output name, deduplicated, inputs first.
    pub fn all_referenced_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inputs.keys().cloned().collect();
        for output in &self.outputs {
            if !names.contains(output) {
                names.push(output.clone());
            }
        }
        names
    }

    /// The active rename map (external -> internal). Empty when the
    /// contract is unrenamed.
    pub fn rename_map(&self) -> &IndexMap<String, String> {
        &self.rename
    }

    /// Warnings recorded while scanning the callable's source text.
    pub fn scan_warnings(&self) -> &[String] {
        &self.scan_warnings
    }

    /// Invoke the wrapped callable.
    ///
    /// Supplied names are filtered to declared inputs (extras silently
    /// dropped) and translated through the rename map back to the names
    /// the callable knows. With typechecking on, each value whose
    /// declared type is not `Any` must pass the instance check.
    pub fn invoke(&self, args: &CallArgs) -> Result<Value> {
        let mut named = IndexMap::new();

        for (name, value) in &args.named {
            let Some(spec) = self.inputs.get(name) else {
                trace!(contract = %self.name, input = %name, "dropping undeclared argument");
                continue;
            };

            // Unset is "no value yet", not a value of the wrong type.
            if self.typecheck
                && spec.ty != TypeSpec::Any
                && !value.is_unset()
                && !value.conforms_to(&spec.ty)
            {
                return Err(ParameterError::TypeMismatch {
                    contract: self.name.clone(),
                    input: name.clone(),
                    expected: spec.ty.clone(),
                    actual: value.type_spec(),
                }
                .into());
            }

            let internal = self.rename.get(name).unwrap_or(name);
            named.insert(internal.clone(), value.clone());
        }

        let filtered = CallArgs {
            positional: args.positional.clone(),
            named,
        };

        let result = (self.callable)(&filtered)?;

        if self.auto_wrap && !matches!(result, Value::Contract(_)) {
            debug!(contract = %self.name, "auto-wrapping invocation result");
            return Ok(Value::Contract(Contract::constant(
                self.name.clone(),
                result,
            )));
        }

        Ok(result)
    }

    /// Apply a rename map from external to internal names.
    ///
    /// Any rename applied earlier is undone first, so the map always
    /// reads against the original shape. External names must be
    /// identifier-shaped and collide with nothing; every internal name
    /// must exist among inputs or outputs. On success inputs, outputs,
    /// and default cells are rewritten under the external names,
    /// preserving order.
    pub fn rename(
        &mut self,
        map: IndexMap<String, String>,
    ) -> Result<(), ContractDefinitionError> {
        self.restore_original();

        for (external, internal) in &map {
            if !is_identifier(external) {
                return Err(ContractDefinitionError::RenameInvalidName {
                    external: external.clone(),
                });
            }
            if self.inputs.contains_key(external) || self.outputs.contains(external) {
                return Err(ContractDefinitionError::RenameCollision {
                    name: self.name.clone(),
                    external: external.clone(),
                });
            }
            if !self.inputs.contains_key(internal) && !self.outputs.contains(internal) {
                return Err(ContractDefinitionError::RenameUnknownName {
                    name: self.name.clone(),
                    internal: internal.clone(),
                });
            }
        }

        // internal -> external, for rewriting keys.
        let reverse: IndexMap<&String, &String> = map.iter().map(|(e, i)| (i, e)).collect();

        self.inputs = std::mem::take(&mut self.inputs)
            .into_iter()
            .map(|(name, spec)| match reverse.get(&name) {
                Some(external) => {
                    let spec = InputSpec {
                        default: spec.default.renamed((*external).clone()),
                        ..spec
                    };
                    ((*external).clone(), spec)
                }
                None => (name, spec),
            })
            .collect();

        for output in &mut self.outputs {
            if let Some(external) = reverse.get(output) {
                *output = (*external).clone();
            }
        }

        debug!(contract = %self.name, map = ?map, "rename applied");
        self.rename = map;
        Ok(())
    }

    /// Undo the active rename, restoring the original shape.
    fn restore_original(&mut self) {
        if self.rename.is_empty() {
            return;
        }

        let rename = std::mem::take(&mut self.rename);

        self.inputs = std::mem::take(&mut self.inputs)
            .into_iter()
            .map(|(name, spec)| match rename.get(&name) {
                Some(internal) => {
                    let spec = InputSpec {
                        default: spec.default.renamed(internal.clone()),
                        ..spec
                    };
                    (internal.clone(), spec)
                }
                None => (name, spec),
            })
            .collect();

        for output in &mut self.outputs {
            if let Some(internal) = rename.get(output) {
                *output = internal.clone();
            }
        }
    }

    /// The inputs as they were before any rename.
    pub fn original_inputs(&self) -> IndexMap<String, InputSpec> {
        self.inputs
            .iter()
            .map(|(name, spec)| {
                let internal = self.rename.get(name).unwrap_or(name);
                (internal.clone(), spec.clone())
            })
            .collect()
    }

    /// The output names as they were before any rename.
    pub fn original_outputs(&self) -> Vec<String> {
        self.outputs
            .iter()
            .map(|output| self.rename.get(output).unwrap_or(output).clone())
            .collect()
    }

    /// Required inputs under their original names.
    pub fn original_required_inputs(&self) -> Vec<String> {
        self.original_inputs()
            .iter()
            .filter(|(_, spec)| spec.is_required())
            .map(|(name, _)| name.clone())
            .collect()
    }
}

impl PartialEq for Contract {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("name", &self.name)
            .field("inputs", &self.inputs.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs)
            .finish()
    }
}

/// Builder for [`Contract`].
pub struct ContractBuilder {
    name: String,
    inputs: Vec<(String, InputSpec)>,
    outputs: Option<Vec<String>>,
    return_type: Option<TypeSpec>,
    source: Option<String>,
    typecheck: bool,
    auto_wrap: bool,
}

impl ContractBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: None,
            return_type: None,
            source: None,
            typecheck: true,
            auto_wrap: false,
        }
    }

    /// A required input with no declared type.
    pub fn input(self, name: impl Into<String>) -> Self {
        self.input_typed(name, TypeSpec::Any)
    }

    /// A required input with a declared type.
    pub fn input_typed(mut self, name: impl Into<String>, ty: TypeSpec) -> Self {
        let name = name.into();
        let default = Parameter::new(name.clone(), Value::Unset);
        self.inputs.push((
            name,
            InputSpec {
                ty,
                default,
                positional_only: false,
            },
        ));
        self
    }

    /// An input with a default value and no declared type.
    pub fn default(self, name: impl Into<String>, value: Value) -> Self {
        self.default_typed(name, TypeSpec::Any, value)
    }

    /// An input with a default value and a declared type.
    pub fn default_typed(mut self, name: impl Into<String>, ty: TypeSpec, value: Value) -> Self {
        let name = name.into();
        let default = Parameter::new(name.clone(), value);
        self.inputs.push((
            name,
            InputSpec {
                ty,
                default,
                positional_only: false,
            },
        ));
        self
    }

    /// A required input passed positionally rather than by name.
    pub fn positional_only(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        let default = Parameter::new(name.clone(), Value::Unset);
        self.inputs.push((
            name,
            InputSpec {
                ty: TypeSpec::Any,
                default,
                positional_only: true,
            },
        ));
        self
    }

    pub fn output(mut self, name: impl Into<String>) -> Self {
        self.outputs.get_or_insert_with(Vec::new).push(name.into());
        self
    }

    pub fn outputs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs
            .get_or_insert_with(Vec::new)
            .extend(names.into_iter().map(Into::into));
        self
    }

    /// Declared return type, consulted by dynamic expansion.
    pub fn returns(mut self, ty: TypeSpec) -> Self {
        self.return_type = Some(ty);
        self
    }

    /// The callable's defining text. When no outputs are declared
    /// explicitly, output names are extracted from it.
    pub fn source(mut self, text: impl Into<String>) -> Self {
        self.source = Some(text.into());
        self
    }

    /// Copy the resolved shape of another contract.
    ///
    /// Models a thin forwarding wrapper: analysis uses the inner
    /// contract's shape while invocation calls the callable supplied to
    /// `build`. Chains resolve transitively because the copied shape is
    /// already resolved.
    pub fn shape_from(mut self, inner: &Contract) -> Self {
        self.inputs = inner
            .original_inputs()
            .into_iter()
            .collect();
        self.outputs = Some(inner.original_outputs());
        self.return_type = inner.return_type.clone();
        self
    }

    pub fn typecheck(mut self, typecheck: bool) -> Self {
        self.typecheck = typecheck;
        self
    }

    /// Wrap any non-contract invocation result into a fresh constant
    /// contract. Supports callables that manufacture other callables.
    pub fn auto_wrap(mut self, auto_wrap: bool) -> Self {
        self.auto_wrap = auto_wrap;
        self
    }

    /// Validate the declared shape and wrap the callable.
    pub fn build<F>(self, callable: F) -> Result<Contract>
    where
        F: Fn(&CallArgs) -> Result<Value> + Send + Sync + 'static,
    {
        let mut inputs: IndexMap<String, InputSpec> = IndexMap::new();

        for (name, spec) in self.inputs {
            if name.is_empty() {
                return Err(ContractDefinitionError::UnnamedInput {
                    name: self.name.clone(),
                }
                .into());
            }
            if !is_identifier(&name) {
                return Err(ContractDefinitionError::InvalidInputName {
                    name: self.name.clone(),
                    input: name,
                }
                .into());
            }
            if inputs.contains_key(&name) {
                return Err(ContractDefinitionError::DuplicateInput {
                    name: self.name.clone(),
                    input: name,
                }
                .into());
            }
            inputs.insert(name, spec);
        }

        let mut scan_warnings = Vec::new();
        let outputs = match self.outputs {
            Some(outputs) => outputs,
            None => match &self.source {
                Some(source) => {
                    let scan = extract::scan_outputs(&self.name, source)?;
                    scan_warnings = scan.warnings;
                    scan.outputs
                }
                None => Vec::new(),
            },
        };

        let mut seen: Vec<&String> = Vec::new();
        for output in &outputs {
            if !is_identifier(output) {
                return Err(ContractDefinitionError::InvalidOutputName {
                    name: self.name.clone(),
                    output: output.clone(),
                }
                .into());
            }
            if seen.contains(&output) {
                return Err(ContractDefinitionError::DuplicateOutput {
                    name: self.name.clone(),
                    output: output.clone(),
                }
                .into());
            }
            seen.push(output);
        }

        debug!(
            contract = %self.name,
            inputs = inputs.len(),
            outputs = outputs.len(),
            "contract built"
        );

        Ok(Contract {
            name: self.name,
            callable: Arc::new(callable),
            inputs,
            outputs,
            return_type: self.return_type,
            rename: IndexMap::new(),
            typecheck: self.typecheck,
            auto_wrap: self.auto_wrap,
            scan_warnings,
        })
    }
}
