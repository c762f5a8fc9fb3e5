//! Conflux runtime
//!
//! Composes independently authored computational steps ("callables") into
//! one executable model by matching their named inputs and outputs, so
//! steps need no knowledge of one another.
//!
//! A [`Contract`] describes a callable's named inputs (with defaults) and
//! named outputs. The [`Coordinator`] owns a shared namespace of named
//! [`Parameter`] cells and drives deterministic, ordered execution of
//! contracts, propagating outputs back into the namespace after every
//! step.

pub mod contract;
pub mod coordinator;
pub mod dynamic;
pub mod error;
pub mod extract;
pub mod param;
pub mod types;
pub mod typing;

pub use contract::{Contract, ContractBuilder, InputSpec};
pub use coordinator::{Coordinator, RegisterOptions, Registered};
pub use dynamic::{DynamicContract, Generator};
pub use error::{
    ContractDefinitionError, Error, GraphConfigurationError, NotFoundError, ParameterError, Result,
};
pub use param::{Listener, Namespace, Parameter, Validator};
pub use types::{CallArgs, CallableFn, TypeSpec, Value};
