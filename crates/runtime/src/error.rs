//! Engine errors
//!
//! Failures cross the API boundary as four distinguishable kinds so
//! callers can branch on cause rather than on failure text. All are
//! raised synchronously at the point of violation; nothing is retried or
//! suppressed internally.

use thiserror::Error;

use crate::types::{TypeSpec, Value};

/// Engine result type
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error, transparent over the four failure kinds.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    ContractDefinition(#[from] ContractDefinitionError),

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    GraphConfiguration(#[from] GraphConfigurationError),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),
}

/// A contract's declared shape is invalid.
#[derive(Debug, Error)]
pub enum ContractDefinitionError {
    #[error("ambiguous outputs for {name}: return statements produce differing name sets {sets:?}")]
    AmbiguousOutputs { name: String, sets: Vec<Vec<String>> },

    #[error("contract {name} has an unnamed positional input, which is not supported")]
    UnnamedInput { name: String },

    #[error("input {input:?} of contract {name} is not a valid identifier")]
    InvalidInputName { name: String, input: String },

    #[error("duplicate input {input:?} in contract {name}")]
    DuplicateInput { name: String, input: String },

    #[error("output {output:?} of contract {name} is not a valid identifier")]
    InvalidOutputName { name: String, output: String },

    #[error("duplicate output {output:?} in contract {name}")]
    DuplicateOutput { name: String, output: String },

    #[error("rename {external:?} is not a valid identifier")]
    RenameInvalidName { external: String },

    #[error("rename {external:?} collides with an existing name in contract {name}")]
    RenameCollision { name: String, external: String },

    #[error("rename source {internal:?} is not an input or output of contract {name}")]
    RenameUnknownName { name: String, internal: String },
}

/// A parameter's storage rules were violated.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("parameter {name} is constant and cannot be written")]
    Constant { name: String },

    #[error("validator rejected value for parameter {name}: {value:?}")]
    Rejected { name: String, value: Value },

    #[error("type mismatch for input {input} of {contract}: expected {expected:?}, got {actual:?}")]
    TypeMismatch {
        contract: String,
        input: String,
        expected: TypeSpec,
        actual: TypeSpec,
    },

    #[error("missing values for required inputs: {names:?}")]
    MissingRequired { names: Vec<String> },

    #[error("contract {contract} attempted to overwrite constant parameter {name}")]
    OverwriteConstant { contract: String, name: String },
}

/// The coordinator's contract graph is misconfigured.
#[derive(Debug, Error)]
pub enum GraphConfigurationError {
    #[error("call order must contain exactly {expected} names, got {actual}")]
    OrderSize { expected: usize, actual: usize },

    #[error("unknown contract in call order: {name}")]
    OrderUnknownName { name: String },

    #[error("duplicate contract in call order: {name}")]
    OrderDuplicateName { name: String },

    #[error("contract {name} cannot expand: no declared return type")]
    MissingReturnType { name: String },

    #[error("contract {name} cannot expand: declared type {declared:?} for output {output} does not produce a contract")]
    NotContractProducing {
        name: String,
        output: String,
        declared: TypeSpec,
    },

    #[error("generator for {name} returned a value that is not a contract")]
    GeneratorNotContract { name: String },

    #[error("contract {name} produced {actual} outputs, expected {expected}")]
    OutputArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("dynamic contract {name} has not been generated yet")]
    NotGenerated { name: String },
}

/// Lookup by an unknown name.
#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("no contract named {0}")]
    Contract(String),

    #[error("no parameter named {0}")]
    Parameter(String),
}
