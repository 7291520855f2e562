use std::fmt;

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueId(pub u32);

impl ValueId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub u32);

impl FuncId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A backend type. Named aggregates live in the module's struct table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IrType {
    Void,
    /// 1, 8, 16, 32, or 64 bits.
    Int(u8),
    /// 32, 64, or 80 bits.
    Float(u8),
    Ptr(Box<IrType>),
    Array { elem: Box<IrType>, len: u64 },
    Struct(String),
    Fn { params: Vec<IrType>, ret: Box<IrType> },
}

impl IrType {
    pub fn ptr_to(self) -> IrType {
        IrType::Ptr(Box::new(self))
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, IrType::Ptr(_))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, IrType::Void)
    }

    pub fn is_float(&self) -> bool {
        matches!(self, IrType::Float(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, IrType::Int(_))
    }

    pub fn pointee(&self) -> &IrType {
        match self {
            IrType::Ptr(elem) => elem,
            _ => panic!("pointee of non-pointer IR type {self}"),
        }
    }

    pub fn int_bits(&self) -> u8 {
        match self {
            IrType::Int(bits) => *bits,
            _ => panic!("bit width of non-integer IR type {self}"),
        }
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IrType::Void => write!(f, "void"),
            IrType::Int(bits) => write!(f, "i{bits}"),
            IrType::Float(bits) => write!(f, "f{bits}"),
            IrType::Ptr(elem) => write!(f, "{elem}*"),
            IrType::Array { elem, len } => write!(f, "[{len} x {elem}]"),
            IrType::Struct(name) => write!(f, "%{name}"),
            IrType::Fn { params, ret } => {
                let parts: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "fn({}) -> {}", parts.join(", "), ret)
            }
        }
    }
}

/// Integer and float binary operations; sign-sensitive ops come in explicit
/// signed/unsigned variants, float ops are separate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntBinOp {
    Add,
    Sub,
    Mul,
    SDiv,
    UDiv,
    SRem,
    URem,
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,
    And,
    Or,
    Xor,
    Shl,
    AShr,
    LShr,
}

impl IntBinOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            IntBinOp::Add => "add",
            IntBinOp::Sub => "sub",
            IntBinOp::Mul => "mul",
            IntBinOp::SDiv => "sdiv",
            IntBinOp::UDiv => "udiv",
            IntBinOp::SRem => "srem",
            IntBinOp::URem => "urem",
            IntBinOp::FAdd => "fadd",
            IntBinOp::FSub => "fsub",
            IntBinOp::FMul => "fmul",
            IntBinOp::FDiv => "fdiv",
            IntBinOp::FRem => "frem",
            IntBinOp::And => "and",
            IntBinOp::Or => "or",
            IntBinOp::Xor => "xor",
            IntBinOp::Shl => "shl",
            IntBinOp::AShr => "ashr",
            IntBinOp::LShr => "lshr",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ICmpCond {
    Eq,
    Ne,
    Slt,
    Sle,
    Sgt,
    Sge,
    Ult,
    Ule,
    Ugt,
    Uge,
}

impl ICmpCond {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ICmpCond::Eq => "eq",
            ICmpCond::Ne => "ne",
            ICmpCond::Slt => "slt",
            ICmpCond::Sle => "sle",
            ICmpCond::Sgt => "sgt",
            ICmpCond::Sge => "sge",
            ICmpCond::Ult => "ult",
            ICmpCond::Ule => "ule",
            ICmpCond::Ugt => "ugt",
            ICmpCond::Uge => "uge",
        }
    }
}

/// Ordered float compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FCmpCond {
    Oeq,
    One,
    Olt,
    Ole,
    Ogt,
    Oge,
}

impl FCmpCond {
    pub fn mnemonic(self) -> &'static str {
        match self {
            FCmpCond::Oeq => "oeq",
            FCmpCond::One => "one",
            FCmpCond::Olt => "olt",
            FCmpCond::Ole => "ole",
            FCmpCond::Ogt => "ogt",
            FCmpCond::Oge => "oge",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    SExt,
    ZExt,
    Trunc,
    SiToFp,
    UiToFp,
    FpToSi,
    FpToUi,
    FpCast,
    Bitcast,
}

impl CastKind {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CastKind::SExt => "sext",
            CastKind::ZExt => "zext",
            CastKind::Trunc => "trunc",
            CastKind::SiToFp => "sitofp",
            CastKind::UiToFp => "uitofp",
            CastKind::FpToSi => "fptosi",
            CastKind::FpToUi => "fptoui",
            CastKind::FpCast => "fpcast",
            CastKind::Bitcast => "bitcast",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GepIndex {
    Const(i64),
    Value(ValueId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    IntConst {
        ty: IrType,
        value: i128,
    },
    FloatConst {
        ty: IrType,
        value: f64,
    },
    NullConst {
        ty: IrType,
    },
    /// The starting point for building an aggregate with `insert_value`.
    UndefConst {
        ty: IrType,
    },
    /// Address of an interned C string; yields `i8*`.
    GlobalString {
        data: String,
    },
    /// Address of a module-level global; yields a pointer to its type.
    GlobalAddr {
        name: String,
    },
    SizeOf {
        ty: IrType,
    },
    BinOp {
        op: IntBinOp,
        lhs: ValueId,
        rhs: ValueId,
    },
    Neg {
        value: ValueId,
    },
    FNeg {
        value: ValueId,
    },
    Not {
        value: ValueId,
    },
    ICmp {
        cond: ICmpCond,
        lhs: ValueId,
        rhs: ValueId,
    },
    FCmp {
        cond: FCmpCond,
        lhs: ValueId,
        rhs: ValueId,
    },
    Alloca {
        ty: IrType,
        name: String,
    },
    Load {
        ptr: ValueId,
    },
    Store {
        ptr: ValueId,
        value: ValueId,
    },
    Gep {
        base: ValueId,
        indices: Vec<GepIndex>,
    },
    ExtractValue {
        base: ValueId,
        index: u32,
    },
    InsertValue {
        base: ValueId,
        value: ValueId,
        index: u32,
    },
    Cast {
        kind: CastKind,
        value: ValueId,
        ty: IrType,
    },
    Phi {
        ty: IrType,
        incomings: Vec<(BlockId, ValueId)>,
    },
    Call {
        callee: FuncId,
        args: Vec<ValueId>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub result: Option<ValueId>,
    pub kind: InstKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Terminator {
    Br {
        target: BlockId,
    },
    CondBr {
        cond: ValueId,
        then_bb: BlockId,
        else_bb: BlockId,
    },
    Switch {
        value: ValueId,
        cases: Vec<(i128, BlockId)>,
        default: BlockId,
    },
    Ret {
        value: Option<ValueId>,
    },
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub insts: Vec<Instruction>,
    pub term: Option<Terminator>,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub param_types: Vec<IrType>,
    pub param_names: Vec<String>,
    pub ret_ty: IrType,
    pub variadic: bool,
    pub blocks: Vec<Block>,
    /// Type of every SSA value; parameters occupy the first ids.
    pub value_types: Vec<IrType>,
}

impl Function {
    /// A function with no blocks is a declaration (or an instantiation whose
    /// body has not been lowered yet).
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn param_values(&self) -> impl Iterator<Item = ValueId> {
        (0..self.param_types.len() as u32).map(ValueId)
    }

    pub fn is_param(&self, value: ValueId) -> bool {
        value.index() < self.param_types.len()
    }

    pub fn value_type(&self, value: ValueId) -> &IrType {
        &self.value_types[value.index()]
    }
}

/// A whole compiled module: functions, named aggregate layouts, and interned
/// global strings.
#[derive(Debug, Default)]
pub struct Module {
    pub funcs: Vec<Function>,
    func_ids: IndexMap<String, FuncId>,
    pub structs: IndexMap<String, Vec<IrType>>,
    pub globals: IndexMap<String, IrType>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        param_types: Vec<IrType>,
        param_names: Vec<String>,
        ret_ty: IrType,
    ) -> FuncId {
        let name = name.into();
        let id = FuncId(self.funcs.len() as u32);
        self.func_ids.insert(name.clone(), id);
        let value_types = param_types.clone();
        self.funcs.push(Function {
            name,
            param_types,
            param_names,
            ret_ty,
            variadic: false,
            blocks: Vec::new(),
            value_types,
        });
        id
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.funcs[id.index()]
    }

    pub fn func_by_name(&self, name: &str) -> Option<FuncId> {
        self.func_ids.get(name).copied()
    }

    pub fn add_struct(&mut self, name: impl Into<String>, fields: Vec<IrType>) {
        self.structs.insert(name.into(), fields);
    }

    pub fn add_global(&mut self, name: impl Into<String>, ty: IrType) {
        self.globals.insert(name.into(), ty);
    }

    pub fn struct_fields(&self, name: &str) -> Option<&[IrType]> {
        self.structs.get(name).map(Vec::as_slice)
    }
}
