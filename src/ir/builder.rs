use crate::ir::model::{
    Block, BlockId, CastKind, FCmpCond, FuncId, GepIndex, ICmpCond, InstKind, Instruction,
    IntBinOp, IrType, Module, Terminator, ValueId,
};

/// Builds functions instruction by instruction against a positional
/// insertion point, LLVM-builder style. One insertion point is active at a
/// time; it may move between functions mid-lowering (on-demand
/// instantiation does this).
#[derive(Debug, Default)]
pub struct IrBuilder {
    pub module: Module,
    insert_point: Option<(FuncId, BlockId)>,
}

impl IrBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    // Positioning

    pub fn create_block(&mut self, func: FuncId) -> BlockId {
        let blocks = &mut self.module.func_mut(func).blocks;
        blocks.push(Block::default());
        BlockId(blocks.len() as u32 - 1)
    }

    pub fn position_at_end(&mut self, func: FuncId, block: BlockId) {
        self.insert_point = Some((func, block));
    }

    pub fn insert_point(&self) -> Option<(FuncId, BlockId)> {
        self.insert_point
    }

    pub fn clear_insert_point(&mut self) {
        self.insert_point = None;
    }

    pub fn current_func(&self) -> FuncId {
        self.insert_point.expect("no active insertion point").0
    }

    pub fn has_terminator(&self) -> bool {
        let (func, block) = self.insert_point.expect("no active insertion point");
        self.module.func(func).blocks[block.index()].term.is_some()
    }

    pub fn value_type(&self, value: ValueId) -> &IrType {
        self.module.func(self.current_func()).value_type(value)
    }

    pub fn is_param(&self, value: ValueId) -> bool {
        self.module.func(self.current_func()).is_param(value)
    }

    // Instruction emission

    fn emit(&mut self, kind: InstKind, result_ty: Option<IrType>) -> Option<ValueId> {
        let (func_id, block) = self.insert_point.expect("no active insertion point");
        let func = self.module.func_mut(func_id);
        let result = result_ty.map(|ty| {
            let id = ValueId(func.value_types.len() as u32);
            func.value_types.push(ty);
            id
        });
        func.blocks[block.index()]
            .insts
            .push(Instruction { result, kind });
        result
    }

    fn emit_value(&mut self, kind: InstKind, result_ty: IrType) -> ValueId {
        self.emit(kind, Some(result_ty)).unwrap()
    }

    pub fn int_const(&mut self, ty: IrType, value: i128) -> ValueId {
        self.emit_value(InstKind::IntConst { ty: ty.clone(), value }, ty)
    }

    pub fn bool_const(&mut self, value: bool) -> ValueId {
        self.int_const(IrType::Int(1), value as i128)
    }

    pub fn float_const(&mut self, ty: IrType, value: f64) -> ValueId {
        self.emit_value(InstKind::FloatConst { ty: ty.clone(), value }, ty)
    }

    pub fn null_const(&mut self, ty: IrType) -> ValueId {
        self.emit_value(InstKind::NullConst { ty: ty.clone() }, ty)
    }

    pub fn undef(&mut self, ty: IrType) -> ValueId {
        self.emit_value(InstKind::UndefConst { ty: ty.clone() }, ty)
    }

    pub fn global_string(&mut self, data: impl Into<String>) -> ValueId {
        self.emit_value(
            InstKind::GlobalString { data: data.into() },
            IrType::Int(8).ptr_to(),
        )
    }

    pub fn size_of(&mut self, ty: IrType) -> ValueId {
        self.emit_value(InstKind::SizeOf { ty }, IrType::Int(64))
    }

    pub fn global_addr(&mut self, name: impl Into<String>) -> ValueId {
        let name = name.into();
        let ty = self
            .module
            .globals
            .get(&name)
            .unwrap_or_else(|| panic!("unknown global {name}"))
            .clone();
        self.emit_value(InstKind::GlobalAddr { name }, ty.ptr_to())
    }

    pub fn bin_op(&mut self, op: IntBinOp, lhs: ValueId, rhs: ValueId) -> ValueId {
        let ty = self.value_type(lhs).clone();
        self.emit_value(InstKind::BinOp { op, lhs, rhs }, ty)
    }

    pub fn neg(&mut self, value: ValueId) -> ValueId {
        let ty = self.value_type(value).clone();
        self.emit_value(InstKind::Neg { value }, ty)
    }

    pub fn fneg(&mut self, value: ValueId) -> ValueId {
        let ty = self.value_type(value).clone();
        self.emit_value(InstKind::FNeg { value }, ty)
    }

    pub fn not(&mut self, value: ValueId) -> ValueId {
        let ty = self.value_type(value).clone();
        self.emit_value(InstKind::Not { value }, ty)
    }

    pub fn icmp(&mut self, cond: ICmpCond, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit_value(InstKind::ICmp { cond, lhs, rhs }, IrType::Int(1))
    }

    pub fn fcmp(&mut self, cond: FCmpCond, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.emit_value(InstKind::FCmp { cond, lhs, rhs }, IrType::Int(1))
    }

    /// Creates an alloca grouped at the top of the current function's entry
    /// block, after any existing allocas, preserving declaration order.
    pub fn entry_alloca(&mut self, ty: IrType, name: impl Into<String>) -> ValueId {
        let (func_id, _) = self.insert_point.expect("no active insertion point");
        let func = self.module.func_mut(func_id);
        let result = ValueId(func.value_types.len() as u32);
        func.value_types.push(ty.clone().ptr_to());

        let entry = &mut func.blocks[0];
        let slot = entry
            .insts
            .iter()
            .position(|inst| !matches!(inst.kind, InstKind::Alloca { .. }))
            .unwrap_or(entry.insts.len());
        entry.insts.insert(
            slot,
            Instruction {
                result: Some(result),
                kind: InstKind::Alloca {
                    ty,
                    name: name.into(),
                },
            },
        );
        result
    }

    pub fn load(&mut self, ptr: ValueId) -> ValueId {
        let ty = self.value_type(ptr).pointee().clone();
        self.emit_value(InstKind::Load { ptr }, ty)
    }

    pub fn store(&mut self, value: ValueId, ptr: ValueId) {
        self.emit(InstKind::Store { ptr, value }, None);
    }

    pub fn gep(&mut self, base: ValueId, indices: Vec<GepIndex>) -> ValueId {
        let result_ty = self.gep_result_type(base, &indices);
        self.emit_value(InstKind::Gep { base, indices }, result_ty)
    }

    fn gep_result_type(&self, base: ValueId, indices: &[GepIndex]) -> IrType {
        let mut ty = self.value_type(base).pointee().clone();
        for index in &indices[1..] {
            ty = match ty {
                IrType::Array { elem, .. } => *elem,
                IrType::Struct(name) => {
                    let GepIndex::Const(field) = index else {
                        panic!("dynamic index into struct {name}");
                    };
                    self.module
                        .struct_fields(&name)
                        .unwrap_or_else(|| panic!("unknown struct {name}"))[*field as usize]
                        .clone()
                }
                other => panic!("cannot index into {other}"),
            };
        }
        ty.ptr_to()
    }

    pub fn extract_value(&mut self, base: ValueId, index: u32) -> ValueId {
        let ty = self.aggregate_field_type(base, index);
        self.emit_value(InstKind::ExtractValue { base, index }, ty)
    }

    pub fn insert_value(&mut self, base: ValueId, value: ValueId, index: u32) -> ValueId {
        let ty = self.value_type(base).clone();
        self.emit_value(InstKind::InsertValue { base, value, index }, ty)
    }

    fn aggregate_field_type(&self, base: ValueId, index: u32) -> IrType {
        match self.value_type(base) {
            IrType::Struct(name) => self
                .module
                .struct_fields(name)
                .unwrap_or_else(|| panic!("unknown struct {name}"))[index as usize]
                .clone(),
            IrType::Array { elem, .. } => elem.as_ref().clone(),
            other => panic!("cannot extract from {other}"),
        }
    }

    pub fn cast(&mut self, kind: CastKind, value: ValueId, ty: IrType) -> ValueId {
        self.emit_value(InstKind::Cast { kind, value, ty: ty.clone() }, ty)
    }

    /// Sign-aware integer resize: extends or truncates to the target width.
    pub fn int_cast(&mut self, value: ValueId, ty: IrType, signed: bool) -> ValueId {
        let from_bits = self.value_type(value).int_bits();
        let to_bits = ty.int_bits();
        if from_bits == to_bits {
            return value;
        }
        let kind = if from_bits > to_bits {
            CastKind::Trunc
        } else if signed {
            CastKind::SExt
        } else {
            CastKind::ZExt
        };
        self.cast(kind, value, ty)
    }

    pub fn phi(&mut self, ty: IrType, incomings: Vec<(BlockId, ValueId)>) -> ValueId {
        self.emit_value(InstKind::Phi { ty: ty.clone(), incomings }, ty)
    }

    pub fn call(&mut self, callee: FuncId, args: Vec<ValueId>) -> Option<ValueId> {
        let ret_ty = self.module.func(callee).ret_ty.clone();
        let result_ty = if ret_ty.is_void() { None } else { Some(ret_ty) };
        self.emit(InstKind::Call { callee, args }, result_ty)
    }

    // Terminators

    fn set_term(&mut self, term: Terminator) {
        let (func, block) = self.insert_point.expect("no active insertion point");
        let block = &mut self.module.func_mut(func).blocks[block.index()];
        debug_assert!(block.term.is_none(), "block already terminated");
        block.term = Some(term);
    }

    pub fn br(&mut self, target: BlockId) {
        self.set_term(Terminator::Br { target });
    }

    pub fn cond_br(&mut self, cond: ValueId, then_bb: BlockId, else_bb: BlockId) {
        self.set_term(Terminator::CondBr {
            cond,
            then_bb,
            else_bb,
        });
    }

    pub fn switch(&mut self, value: ValueId, cases: Vec<(i128, BlockId)>, default: BlockId) {
        self.set_term(Terminator::Switch {
            value,
            cases,
            default,
        });
    }

    pub fn ret(&mut self, value: Option<ValueId>) {
        self.set_term(Terminator::Ret { value });
    }

    pub fn unreachable(&mut self) {
        self.set_term(Terminator::Unreachable);
    }
}
