//! Core value and type model
//!
//! `Value` is the domain value shared through the coordinator's namespace.
//! `TypeSpec` is the declared-type lattice used for input typechecking and
//! for detecting contract-producing return types.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::contract::Contract;
use crate::error::Result;

/// Signature shared by every wrapped callable.
///
/// Positional-only inputs arrive in `CallArgs::positional`, everything
/// else by name.
pub type CallableFn = Arc<dyn Fn(&CallArgs) -> Result<Value> + Send + Sync>;

/// A domain value held by a parameter or produced by a contract.
///
/// `Unset` is the "never assigned" marker: a unit variant, so every
/// instance compares equal to every other instance and to nothing else.
/// `Contract` lets invocation results and namespace cells carry
/// first-class contracts.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Unset,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Contract(Contract),
}

impl Value {
    pub fn is_unset(&self) -> bool {
        matches!(self, Value::Unset)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric access. Ints widen to floats.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_contract(&self) -> Option<&Contract> {
        match self {
            Value::Contract(c) => Some(c),
            _ => None,
        }
    }

    /// The runtime type of this value, as recorded by parameters on every
    /// successful write.
    pub fn type_spec(&self) -> TypeSpec {
        match self {
            Value::Unset => TypeSpec::Any,
            Value::Bool(_) => TypeSpec::Bool,
            Value::Int(_) => TypeSpec::Int,
            Value::Float(_) => TypeSpec::Float,
            Value::Str(_) => TypeSpec::Str,
            Value::List(_) => TypeSpec::List(Box::new(TypeSpec::Any)),
            Value::Map(_) => TypeSpec::Map,
            Value::Contract(_) => TypeSpec::Contract,
        }
    }

    /// Instance check against a declared type.
    pub fn conforms_to(&self, spec: &TypeSpec) -> bool {
        match spec {
            TypeSpec::Any => true,
            TypeSpec::Bool => matches!(self, Value::Bool(_)),
            TypeSpec::Int => matches!(self, Value::Int(_)),
            // Ints are accepted anywhere a float is declared.
            TypeSpec::Float => matches!(self, Value::Float(_) | Value::Int(_)),
            TypeSpec::Str => matches!(self, Value::Str(_)),
            TypeSpec::Map => matches!(self, Value::Map(_)),
            TypeSpec::Contract => matches!(self, Value::Contract(_)),
            TypeSpec::List(inner) => match self {
                Value::List(items) => items.iter().all(|v| v.conforms_to(inner)),
                _ => false,
            },
            TypeSpec::Tuple(specs) => match self {
                Value::List(items) => {
                    items.len() == specs.len()
                        && items.iter().zip(specs).all(|(v, s)| v.conforms_to(s))
                }
                _ => false,
            },
        }
    }
}

/// A declared type annotation for an input or return position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    /// No annotation; accepts everything.
    Any,
    Bool,
    Int,
    Float,
    Str,
    List(Box<TypeSpec>),
    Map,
    /// One type per position of a multi-value return.
    Tuple(Vec<TypeSpec>),
    /// A contract-producing position.
    Contract,
}

/// Arguments for one contract invocation.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    /// Values for positional-only inputs, in declaration order.
    pub positional: Vec<Value>,
    /// Named arguments. Names not declared by the contract are dropped.
    pub named: IndexMap<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.insert(name.into(), value);
        self
    }

    pub fn with_positional(mut self, value: Value) -> Self {
        self.positional.push(value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.get(name)
    }

    /// Convenience numeric accessor for callables.
    pub fn float(&self, name: &str) -> Option<f64> {
        self.named.get(name).and_then(Value::as_float)
    }
}
