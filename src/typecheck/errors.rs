//! Type-check diagnostics.
//!
//! The checker reports structured `TypeCheckErrorKind`s; spans are attached at
//! the reporting site with `.at(span)`. Semantic errors terminate the
//! compilation unit immediately.

use thiserror::Error;

use crate::diag::{Span, SpannedError};
use crate::types::Type;

#[derive(Debug, Clone, Error)]
pub enum TypeCheckErrorKind {
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("'{0}' is not a variable")]
    NotAVariable(String),

    #[error("'{0}' is not a function")]
    NotAFunction(String),

    #[error("use of moved value '{name}'{hint}", hint = type_hint(.ty))]
    UseAfterMove { name: String, ty: Option<Type> },

    #[error("integer literal is too large")]
    IntLiteralTooLarge,

    #[error("{0} is out of range for type '{1}'")]
    LiteralOutOfRange(i128, Type),

    #[error("empty array literals are not allowed")]
    EmptyArrayLiteral,

    #[error("mixed element types in array literal (expected '{0}', found '{1}')")]
    ArrayElementTypeMismatch(Type, Type),

    #[error("invalid operand type '{0}' to logical not")]
    LogicalNotOperandNotBool(Type),

    #[error(
        "cannot dereference possibly-null pointer of type '{0}' (unwrap the value with '!' to access the pointer anyway)"
    )]
    DerefOptionalPointer(Type),

    #[error("cannot dereference non-pointer type '{0}'")]
    DerefNonPointer(Type),

    #[error("invalid operands '{lhs}' and '{rhs}' to '{op}'{hint}", hint = null_hint(.null_operand))]
    InvalidBinaryOperands {
        lhs: Type,
        rhs: Type,
        op: String,
        /// The non-optional side of a null comparison, reported as a hint.
        null_operand: Option<Type>,
    },

    #[error("illegal cast from '{0}' to '{1}'")]
    IllegalCast(Type, Type),

    #[error("no member named '{0}' in '{1}'")]
    NoSuchMember(String, Type),

    #[error("cannot access member through value of optional type '{0}' which may be null")]
    MemberOfOptional(Type),

    #[error("type '{0}' has no method '{1}'")]
    NoSuchMethod(Type, String),

    #[error("'{0}' doesn't provide a subscript operator")]
    InvalidSubscriptTarget(Type),

    #[error("illegal subscript index type '{0}', expected 'int'")]
    SubscriptIndexNotInt(Type),

    #[error("accessing array out-of-bounds with index {0}, array size is {1}")]
    SubscriptOutOfBounds(i128, u64),

    #[error("cannot unwrap non-optional type '{0}'")]
    UnwrapNonOptional(Type),

    #[error("expected single argument to converting initializer")]
    ConversionArgCount,

    #[error("expected no generic arguments to converting initializer")]
    ConversionGenericArgs,

    #[error("expected unnamed argument to converting initializer")]
    ConversionNamedArg,

    #[error("cannot call member function through value of optional type '{0}' which may be null")]
    CallOnOptionalReceiver(Type),

    #[error(
        "too few arguments to '{0}', expected {prefix}{1}",
        prefix = if *.2 { "at least " } else { "" }
    )]
    TooFewArguments(String, usize, bool),

    #[error("too many arguments to '{0}', expected {1}")]
    TooManyArguments(String, usize),

    #[error("invalid argument name '{0}' for parameter '{1}'")]
    InvalidArgumentName(String, String),

    #[error("invalid argument #{0} type '{1}' to '{2}', expected '{3}'")]
    InvalidArgumentType(usize, Type, String, Type),

    #[error("too few generic arguments to '{0}', expected {1}")]
    TooFewGenericArguments(String, usize),

    #[error("too many generic arguments to '{0}', expected {1}")]
    TooManyGenericArguments(String, usize),

    #[error("can't infer generic parameters without function arguments")]
    CannotInferGenericArgs,

    #[error(
        "couldn't infer generic parameter '{param}' of '{function}' because of conflicting argument types '{first}' and '{second}'"
    )]
    ConflictingGenericArgs {
        param: String,
        function: String,
        first: Type,
        second: Type,
    },

    #[error("type '{0}' doesn't implement interface '{1}'")]
    InterfaceNotImplemented(Type, String),

    #[error(
        "no matching {what} '{name}' with argument list of type '({arg_types})'",
        what = if *.is_init_call { "initializer for" } else { "function for call to" }
    )]
    NoMatchingOverload {
        name: String,
        arg_types: String,
        is_init_call: bool,
    },

    #[error("ambiguous reference to '{0}'")]
    AmbiguousOverload(String),

    #[error("cannot call mutating method '{0}' on immutable receiver of type '{1}'")]
    MutatingMethodOnImmutable(String, Type),

    #[error("condition must be a boolean, found '{0}'")]
    CondNotBool(Type),

    #[error("switch case type '{0}' doesn't match switched value type '{1}'")]
    SwitchCaseTypeMismatch(Type, Type),

    #[error("'for' requires an iterable range, found '{0}'")]
    NonIterableRange(Type),

    #[error("return value missing, expected '{0}'")]
    ReturnValueMissing(Type),

    #[error("unexpected return value in function returning 'void'")]
    ReturnValueUnexpected,

    #[error("return type mismatch: expected '{0}', found '{1}'")]
    ReturnTypeMismatch(Type, Type),

    #[error("cannot assign to immutable value of type '{0}'")]
    AssignToImmutable(Type),

    #[error("invalid assignment target")]
    InvalidAssignmentTarget,

    #[error("assignment type mismatch: cannot assign '{1}' to '{0}'{hint}", hint = null_hint(.2))]
    AssignTypeMismatch(Type, Type, Option<Type>),

    #[error("cannot increment non-integer type '{0}'")]
    IncrementNonInteger(Type),

    #[error("cannot decrement non-integer type '{0}'")]
    DecrementNonInteger(Type),

    #[error("variable '{0}' has no type annotation and no initializer")]
    VarMissingType(String),

    #[error("variable initializer type mismatch: declared '{0}', found '{1}'")]
    VarInitTypeMismatch(Type, Type),

    #[error("anonymous function calls are not supported yet")]
    AnonymousCallUnsupported,
}

fn type_hint(ty: &Option<Type>) -> String {
    match ty {
        Some(ty) => format!(" of type '{ty}'"),
        None => String::new(),
    }
}

fn null_hint(ty: &Option<Type>) -> String {
    match ty {
        Some(ty) => format!(" (non-optional type '{ty}' cannot be null)"),
        None => String::new(),
    }
}

pub type TypeCheckError = SpannedError<TypeCheckErrorKind>;

impl TypeCheckErrorKind {
    pub fn at(self, span: Span) -> TypeCheckError {
        TypeCheckError::new(self, span)
    }
}
