//! Named value cells
//!
//! A `Parameter` stores one named value with optional immutability and an
//! optional validation predicate. Every successful write re-records the
//! value's type and notifies listeners in registration order,
//! synchronously, before the write returns. Construction never fires
//! listeners.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{trace, warn};

use crate::error::ParameterError;
use crate::types::{TypeSpec, Value};

/// Predicate invoked on every candidate value before it is stored.
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Callback fired after a successful write, with the parameter's name and
/// the just-written value. Listeners get no mutable access, so a listener
/// cannot re-enter the write path of the cell that triggered it.
pub type Listener = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Ordered namespace of parameters, keyed by name.
pub type Namespace = IndexMap<String, Parameter>;

/// A named value cell.
#[derive(Clone)]
pub struct Parameter {
    name: String,
    value: Value,
    constant: bool,
    validator: Option<Validator>,
    listeners: Vec<Listener>,
    value_type: TypeSpec,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        let value_type = value.type_spec();
        Self {
            name: name.into(),
            value,
            constant: false,
            validator: None,
            listeners: Vec::new(),
            value_type,
        }
    }

    /// A cell that rejects every unforced write.
    pub fn constant(name: impl Into<String>, value: Value) -> Self {
        let mut param = Self::new(name, value);
        param.constant = true;
        param
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The recorded type of the last written value.
    pub fn value_type(&self) -> &TypeSpec {
        &self.value_type
    }

    pub fn is_unset(&self) -> bool {
        self.value.is_unset()
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn set_constant(&mut self, constant: bool) {
        self.constant = constant;
    }

    /// Write a new value. Fails if the cell is constant or the validator
    /// rejects the candidate; the stored value is unchanged on failure.
    pub fn set(&mut self, value: Value) -> Result<(), ParameterError> {
        self.write(value, false)
    }

    /// Write a new value, bypassing the constant check. The validator
    /// still applies.
    pub fn set_forced(&mut self, value: Value) -> Result<(), ParameterError> {
        self.write(value, true)
    }

    fn write(&mut self, value: Value, force: bool) -> Result<(), ParameterError> {
        if self.constant && !force {
            return Err(ParameterError::Constant {
                name: self.name.clone(),
            });
        }

        if let Some(validator) = &self.validator
            && !validator(&value)
        {
            return Err(ParameterError::Rejected {
                name: self.name.clone(),
                value,
            });
        }

        self.value_type = value.type_spec();
        self.value = value;
        trace!(parameter = %self.name, value = ?self.value, "parameter written");

        for listener in &self.listeners {
            listener(&self.name, &self.value);
        }

        Ok(())
    }

    /// Register a listener. A listener already registered (by identity)
    /// is ignored with a warning.
    pub fn add_listener(&mut self, listener: Listener) {
        if self.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            warn!(parameter = %self.name, "listener already registered, ignoring");
            return;
        }
        self.listeners.push(listener);
    }

    /// Remove a listener by identity.
    pub fn remove_listener(&mut self, listener: &Listener) {
        self.listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Clone this cell under a new name, preserving value, flags,
    /// validator, and listeners. Used by contract renaming.
    pub(crate) fn renamed(&self, name: impl Into<String>) -> Self {
        let mut param = self.clone();
        param.name = name.into();
        param
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("constant", &self.constant)
            .field("value_type", &self.value_type)
            .finish()
    }
}

impl PartialEq for Parameter {
    /// Compares name, value, constancy, and recorded type. Validators and
    /// listeners are identity-based and excluded.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.value == other.value
            && self.constant == other.constant
            && self.value_type == other.value_type
    }
}
