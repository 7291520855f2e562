//! IR verifier. A verification failure is a code-generator bug, not a user
//! error; the generator runs it after every lowered function.

use std::collections::HashSet;

use thiserror::Error;

use crate::diag::{Span, SpannedError};
use crate::ir::model::{BlockId, Function, GepIndex, InstKind, Module, Terminator, ValueId};

#[derive(Debug, Clone, Error)]
pub enum VerifyIrErrorKind {
    #[error("IR verification failed: block bb{1} of '{0}' has no terminator")]
    MissingTerminator(String, u32),

    #[error("IR verification failed: use of undefined value %v{1} in '{0}'")]
    UndefinedValue(String, u32),

    #[error("IR verification failed: branch to missing block bb{1} in '{0}'")]
    BadBranchTarget(String, u32),

    #[error("IR verification failed: phi in '{0}' has incoming edge from non-predecessor bb{1}")]
    PhiIncomingNotPredecessor(String, u32),

    #[error("IR verification failed: call in '{0}' passes {1} args, callee '{2}' takes {3}")]
    CallArity(String, usize, String, usize),
}

pub type VerifyIrError = SpannedError<VerifyIrErrorKind>;

impl VerifyIrErrorKind {
    fn at_nowhere(self) -> VerifyIrError {
        VerifyIrError::new(self, Span::default())
    }
}

pub fn verify_module(module: &Module) -> Result<(), VerifyIrError> {
    for func in &module.funcs {
        if !func.is_empty() {
            verify_function(module, func)?;
        }
    }
    Ok(())
}

pub fn verify_function(module: &Module, func: &Function) -> Result<(), VerifyIrError> {
    let name = &func.name;

    // Every value referenced must have a defining site (a parameter or an
    // instruction result somewhere in the function).
    let mut defined: HashSet<ValueId> = func.param_values().collect();
    for block in &func.blocks {
        for inst in &block.insts {
            if let Some(result) = inst.result {
                defined.insert(result);
            }
        }
    }

    let check_value = |value: ValueId| -> Result<(), VerifyIrError> {
        if defined.contains(&value) {
            Ok(())
        } else {
            Err(VerifyIrErrorKind::UndefinedValue(name.clone(), value.0).at_nowhere())
        }
    };
    let check_block = |block: BlockId| -> Result<(), VerifyIrError> {
        if block.index() < func.blocks.len() {
            Ok(())
        } else {
            Err(VerifyIrErrorKind::BadBranchTarget(name.clone(), block.0).at_nowhere())
        }
    };

    // Predecessor sets for phi checking.
    let mut preds: Vec<HashSet<BlockId>> = vec![HashSet::new(); func.blocks.len()];
    for (index, block) in func.blocks.iter().enumerate() {
        let from = BlockId(index as u32);
        match &block.term {
            Some(Terminator::Br { target }) => {
                check_block(*target)?;
                preds[target.index()].insert(from);
            }
            Some(Terminator::CondBr {
                then_bb, else_bb, ..
            }) => {
                check_block(*then_bb)?;
                check_block(*else_bb)?;
                preds[then_bb.index()].insert(from);
                preds[else_bb.index()].insert(from);
            }
            Some(Terminator::Switch { cases, default, .. }) => {
                check_block(*default)?;
                preds[default.index()].insert(from);
                for (_, target) in cases {
                    check_block(*target)?;
                    preds[target.index()].insert(from);
                }
            }
            Some(Terminator::Ret { .. }) | Some(Terminator::Unreachable) => {}
            None => {
                return Err(
                    VerifyIrErrorKind::MissingTerminator(name.clone(), index as u32).at_nowhere()
                );
            }
        }
    }

    for (index, block) in func.blocks.iter().enumerate() {
        for inst in &block.insts {
            for_each_use(&inst.kind, &mut |value| check_value(value))?;

            match &inst.kind {
                InstKind::Phi { incomings, .. } => {
                    for (incoming_block, _) in incomings {
                        if !preds[index].contains(incoming_block) {
                            return Err(VerifyIrErrorKind::PhiIncomingNotPredecessor(
                                name.clone(),
                                incoming_block.0,
                            )
                            .at_nowhere());
                        }
                    }
                }
                InstKind::Call { callee, args } => {
                    let callee_func = module.func(*callee);
                    let arity_ok = if callee_func.variadic {
                        args.len() >= callee_func.param_types.len()
                    } else {
                        args.len() == callee_func.param_types.len()
                    };
                    if !arity_ok {
                        return Err(VerifyIrErrorKind::CallArity(
                            name.clone(),
                            args.len(),
                            callee_func.name.clone(),
                            callee_func.param_types.len(),
                        )
                        .at_nowhere());
                    }
                }
                _ => {}
            }
        }

        match &block.term {
            Some(Terminator::CondBr { cond, .. }) => check_value(*cond)?,
            Some(Terminator::Switch { value, .. }) => check_value(*value)?,
            Some(Terminator::Ret { value: Some(value) }) => check_value(*value)?,
            _ => {}
        }
    }

    Ok(())
}

fn for_each_use(
    kind: &InstKind,
    f: &mut impl FnMut(ValueId) -> Result<(), VerifyIrError>,
) -> Result<(), VerifyIrError> {
    match kind {
        InstKind::IntConst { .. }
        | InstKind::FloatConst { .. }
        | InstKind::NullConst { .. }
        | InstKind::UndefConst { .. }
        | InstKind::GlobalString { .. }
        | InstKind::GlobalAddr { .. }
        | InstKind::SizeOf { .. }
        | InstKind::Alloca { .. } => Ok(()),
        InstKind::BinOp { lhs, rhs, .. }
        | InstKind::ICmp { lhs, rhs, .. }
        | InstKind::FCmp { lhs, rhs, .. } => {
            f(*lhs)?;
            f(*rhs)
        }
        InstKind::Neg { value }
        | InstKind::FNeg { value }
        | InstKind::Not { value }
        | InstKind::Load { ptr: value }
        | InstKind::ExtractValue { base: value, .. }
        | InstKind::Cast { value, .. } => f(*value),
        InstKind::Store { ptr, value } => {
            f(*ptr)?;
            f(*value)
        }
        InstKind::Gep { base, indices } => {
            f(*base)?;
            for index in indices {
                if let GepIndex::Value(value) = index {
                    f(*value)?;
                }
            }
            Ok(())
        }
        InstKind::InsertValue { base, value, .. } => {
            f(*base)?;
            f(*value)
        }
        InstKind::Phi { incomings, .. } => {
            for (_, value) in incomings {
                f(*value)?;
            }
            Ok(())
        }
        InstKind::Call { args, .. } => {
            for arg in args {
                f(*arg)?;
            }
            Ok(())
        }
    }
}
