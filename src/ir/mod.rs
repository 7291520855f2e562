//! SSA-with-basic-blocks IR and the builder the code generator targets.
//!
//! The model covers what the lowering needs from a backend: typed values,
//! block-structured functions, memory ops, sign-aware integer arithmetic,
//! float arithmetic, compares, casts, calls, phis, and a verifier.

mod builder;
mod format;
mod model;
mod verify;

pub use builder::IrBuilder;
pub use format::{format_function, format_module};
pub use model::{
    Block, BlockId, CastKind, FCmpCond, Function, FuncId, GepIndex, ICmpCond, Instruction,
    InstKind, IntBinOp, IrType, Module, Terminator, ValueId,
};
pub use verify::{verify_function, verify_module, VerifyIrError, VerifyIrErrorKind};
