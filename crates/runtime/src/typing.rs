//! Type-introspection service
//!
//! Pure helpers over declared type annotations. The coordinator uses
//! these to decide whether an output position produces a contract when
//! expanding dynamic contracts.

use crate::types::TypeSpec;

/// Decompose a declared type into the elementary types nested within it.
///
/// Container types (`Tuple`, `List`) recurse into their arguments; leaf
/// types return themselves.
pub fn decompose(spec: &TypeSpec) -> Vec<TypeSpec> {
    match spec {
        TypeSpec::List(inner) => decompose(inner),
        TypeSpec::Tuple(items) => items.iter().flat_map(decompose).collect(),
        leaf => vec![leaf.clone()],
    }
}

/// True when the decomposition of `spec` contains a contract type.
pub fn produces_contract(spec: &TypeSpec) -> bool {
    decompose(spec).contains(&TypeSpec::Contract)
}
