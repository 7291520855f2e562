//! Canonical textual encoding of declarations.
//!
//! Mangled names are the keys shared by the symbol table and the IR
//! generator's instantiation cache, so they must be a pure function of the
//! declaration's name, receiver type, generic arguments, and parameter types.

use crate::types::Type;

fn join_types(types: &[Type]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `Name` or `Name<Arg1, Arg2>` for generic instantiations.
pub fn mangle_type(name: &str, generic_args: &[Type]) -> String {
    if generic_args.is_empty() {
        name.to_string()
    } else {
        format!("{}<{}>", name, join_types(generic_args))
    }
}

/// `name(params)`, `Recv.name(params)`, or `Recv.name<Args>(params)`.
pub fn mangle_function(
    receiver: Option<&str>,
    receiver_generic_args: &[Type],
    name: &str,
    generic_args: &[Type],
    param_types: &[Type],
) -> String {
    let mut result = String::new();
    if let Some(receiver) = receiver {
        result.push_str(&mangle_type(receiver, receiver_generic_args));
        result.push('.');
    }
    result.push_str(name);
    if !generic_args.is_empty() {
        result.push('<');
        result.push_str(&join_types(generic_args));
        result.push('>');
    }
    result.push('(');
    result.push_str(&join_types(param_types));
    result.push(')');
    result
}

/// The unqualified member lookup key: `Recv.name`.
pub fn mangle_member(receiver: &str, name: &str) -> String {
    format!("{receiver}.{name}")
}

/// `Recv.deinit`, with the receiver's generic args when instantiated.
pub fn mangle_deinit(receiver: &str, receiver_generic_args: &[Type]) -> String {
    format!("{}.deinit", mangle_type(receiver, receiver_generic_args))
}
