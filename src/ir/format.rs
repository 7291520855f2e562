//! Textual rendering of IR functions, used by tests and dumps.

use crate::ir::model::{Function, GepIndex, InstKind, Instruction, Module, Terminator, ValueId};

fn value(v: ValueId) -> String {
    format!("%v{}", v.0)
}

fn values(list: &[ValueId]) -> String {
    list.iter().map(|v| value(*v)).collect::<Vec<_>>().join(", ")
}

pub fn format_module(module: &Module) -> String {
    let mut out = String::new();
    for func in &module.funcs {
        if func.is_empty() {
            continue;
        }
        out.push_str(&format_function(module, func));
        out.push('\n');
    }
    out
}

pub fn format_function(module: &Module, func: &Function) -> String {
    let mut out = String::new();
    let params: Vec<String> = func
        .param_types
        .iter()
        .enumerate()
        .map(|(i, ty)| format!("%v{i}: {ty}"))
        .collect();
    out.push_str(&format!(
        "fn {}({}) -> {} {{\n",
        func.name,
        params.join(", "),
        func.ret_ty
    ));

    for (block_index, block) in func.blocks.iter().enumerate() {
        out.push_str(&format!("  bb{block_index}:\n"));
        for inst in &block.insts {
            out.push_str(&format!("    {}\n", format_inst(module, func, inst)));
        }
        match &block.term {
            Some(term) => out.push_str(&format!("    {}\n", format_term(term))),
            None => out.push_str("    <no terminator>\n"),
        }
    }
    out.push_str("}\n");
    out
}

fn format_inst(module: &Module, func: &Function, inst: &Instruction) -> String {
    let rhs = match &inst.kind {
        InstKind::IntConst { ty, value } => format!("const {value}:{ty}"),
        InstKind::FloatConst { ty, value } => format!("fconst {value}:{ty}"),
        InstKind::NullConst { ty } => format!("null:{ty}"),
        InstKind::UndefConst { ty } => format!("undef:{ty}"),
        InstKind::GlobalString { data } => format!("string {data:?}"),
        InstKind::GlobalAddr { name } => format!("global @{name}"),
        InstKind::SizeOf { ty } => format!("sizeof {ty}"),
        InstKind::BinOp { op, lhs, rhs } => {
            format!("{} {}, {}", op.mnemonic(), value(*lhs), value(*rhs))
        }
        InstKind::Neg { value: v } => format!("neg {}", value(*v)),
        InstKind::FNeg { value: v } => format!("fneg {}", value(*v)),
        InstKind::Not { value: v } => format!("not {}", value(*v)),
        InstKind::ICmp { cond, lhs, rhs } => {
            format!("icmp {} {}, {}", cond.mnemonic(), value(*lhs), value(*rhs))
        }
        InstKind::FCmp { cond, lhs, rhs } => {
            format!("fcmp {} {}, {}", cond.mnemonic(), value(*lhs), value(*rhs))
        }
        InstKind::Alloca { ty, name } => {
            if name.is_empty() {
                format!("alloca {ty}")
            } else {
                format!("alloca {ty} ; {name}")
            }
        }
        InstKind::Load { ptr } => format!("load {}", value(*ptr)),
        InstKind::Store { ptr, value: v } => {
            return format!("store {}, {}", value(*v), value(*ptr));
        }
        InstKind::Gep { base, indices } => {
            let parts: Vec<String> = indices
                .iter()
                .map(|index| match index {
                    GepIndex::Const(c) => c.to_string(),
                    GepIndex::Value(v) => value(*v),
                })
                .collect();
            format!("gep {}, [{}]", value(*base), parts.join(", "))
        }
        InstKind::ExtractValue { base, index } => {
            format!("extractvalue {}, {}", value(*base), index)
        }
        InstKind::InsertValue { base, value: v, index } => {
            format!("insertvalue {}, {}, {}", value(*base), value(*v), index)
        }
        InstKind::Cast { kind, value: v, ty } => {
            format!("{} {} to {}", kind.mnemonic(), value(*v), ty)
        }
        InstKind::Phi { incomings, .. } => {
            let parts: Vec<String> = incomings
                .iter()
                .map(|(block, v)| format!("[bb{}, {}]", block.0, value(*v)))
                .collect();
            format!("phi {}", parts.join(", "))
        }
        // Function names are full mangles, so they are quoted like LLVM
        // symbols to keep the argument list unambiguous.
        InstKind::Call { callee, args } => {
            format!("call @\"{}\"({})", module.func(*callee).name, values(args))
        }
    };

    match inst.result {
        Some(result) => format!("{}: {} = {}", value(result), func.value_type(result), rhs),
        None => rhs,
    }
}

fn format_term(term: &Terminator) -> String {
    match term {
        Terminator::Br { target } => format!("br bb{}", target.0),
        Terminator::CondBr {
            cond,
            then_bb,
            else_bb,
        } => format!("condbr {}, bb{}, bb{}", value(*cond), then_bb.0, else_bb.0),
        Terminator::Switch {
            value: v,
            cases,
            default,
        } => {
            let parts: Vec<String> = cases
                .iter()
                .map(|(case, block)| format!("{case} -> bb{}", block.0))
                .collect();
            format!(
                "switch {}, [{}], default bb{}",
                value(*v),
                parts.join(", "),
                default.0
            )
        }
        Terminator::Ret { value: Some(v) } => format!("ret {}", value(*v)),
        Terminator::Ret { value: None } => "ret void".to_string(),
        Terminator::Unreachable => "unreachable".to_string(),
    }
}
