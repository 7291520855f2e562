//! Code-generation diagnostics. Unimplemented constructs are well-typed but
//! deliberately unsupported by lowering; they halt compilation with an
//! explicit message.

use thiserror::Error;

use crate::diag::{Span, SpannedError};
use crate::types::Type;

#[derive(Debug, Clone, Error)]
pub enum IrGenErrorKind {
    #[error("IR generation doesn't support {0} yet")]
    Unimplemented(&'static str),

    #[error("'for'-loops over non-range iterables are not supported yet")]
    NonRangeForLoop,

    #[error("'for'-loops over non-integer ranges are not supported yet")]
    NonIntegerRange,

    #[error("conversion from '{0}' to '{1}' not supported")]
    UnsupportedConversion(Type, Type),

    #[error("switch case value must be a compile-time integer constant")]
    NonConstantSwitchCase,

    #[error("deinitialization of by-value parameters is not implemented yet")]
    ByValueDeinitParam,

    #[error("cannot lower type '{0}'")]
    UnloweredType(Type),
}

pub type IrGenError = SpannedError<IrGenErrorKind>;

impl IrGenErrorKind {
    pub fn at(self, span: Span) -> IrGenError {
        IrGenError::new(self, span)
    }
}
