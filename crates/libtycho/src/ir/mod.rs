//! The linear intermediate representation.
//!
//! Instructions are register-oriented over an infinite virtual register file;
//! control flow is structured with labels and jumps. The textual form printed
//! by [`Instr`]'s `Display` is the contract with the downstream bytecode
//! encoder, so emission order and formatting are deterministic.

use crate::types::{BasicTy, CastStep, Ty};

pub mod cfg;
pub mod expr;
pub mod lower;
pub mod regalloc;
pub mod stack;
pub mod stmt;

pub use cfg::CfgGraph;
pub use lower::{lower_package, FunctionIr, FunctionLowering, IrModule};
pub use regalloc::{allocate, RegAllocation, RegSlot};
pub use stack::{compute_stack_layout, StackLayout};

/// A virtual register.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Reg(pub u32);

impl std::fmt::Display for Reg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// Storage types carried in instruction mnemonics.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IrType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Pointer-shaped: arrays, strings, classes, interfaces, structs,
    /// functions, closures, coroutines, nullables
    Ptr,
}

impl IrType {
    pub fn from_ty(ty: &Ty) -> IrType {
        match ty.as_basic() {
            Some(BasicTy::I8) => IrType::I8,
            Some(BasicTy::U8) | Some(BasicTy::Bool) | Some(BasicTy::Char) => IrType::U8,
            Some(BasicTy::I16) => IrType::I16,
            Some(BasicTy::U16) => IrType::U16,
            Some(BasicTy::I32) => IrType::I32,
            Some(BasicTy::U32) => IrType::U32,
            Some(BasicTy::I64) => IrType::I64,
            Some(BasicTy::U64) => IrType::U64,
            Some(BasicTy::F32) => IrType::F32,
            Some(BasicTy::F64) => IrType::F64,
            _ => IrType::Ptr,
        }
    }

    pub fn from_basic(basic: BasicTy) -> IrType {
        Self::from_ty(&Ty::Basic(basic))
    }

    pub fn name(&self) -> &'static str {
        match self {
            IrType::I8 => "i8",
            IrType::U8 => "u8",
            IrType::I16 => "i16",
            IrType::U16 => "u16",
            IrType::I32 => "i32",
            IrType::U32 => "u32",
            IrType::I64 => "i64",
            IrType::U64 => "u64",
            IrType::F32 => "f32",
            IrType::F64 => "f64",
            IrType::Ptr => "ptr",
        }
    }

    pub fn byte_size(&self) -> usize {
        match self {
            IrType::I8 | IrType::U8 => 1,
            IrType::I16 | IrType::U16 => 2,
            IrType::I32 | IrType::U32 | IrType::F32 => 4,
            IrType::I64 | IrType::U64 | IrType::F64 | IrType::Ptr => 8,
        }
    }
}

/// Where a temporary load addresses its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Global(String),
    Local(String),
    Arg(String),
    Func(String),
    /// Closure environment, addressed by the captured symbol's uid
    Env(String),
    /// Another register; this is the register-to-register move
    Reg(Reg),
}

impl Slot {
    fn keyword(&self) -> &'static str {
        match self {
            Slot::Global(_) => "global",
            Slot::Local(_) => "local",
            Slot::Arg(_) => "arg",
            Slot::Func(_) => "func",
            Slot::Env(_) | Slot::Reg(_) => "reg",
        }
    }

    fn operand(&self) -> String {
        match self {
            Slot::Global(uid) | Slot::Local(uid) | Slot::Arg(uid) | Slot::Func(uid) | Slot::Env(uid) => uid.clone(),
            Slot::Reg(reg) => reg.to_string(),
        }
    }
}

/// An immediate constant.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstVal {
    Int(i64),
    Float(f64),
    /// Interned string payload, referenced by the constant segment
    Str(String),
}

impl std::fmt::Display for ConstVal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConstVal::Int(value) => write!(f, "{value}"),
            ConstVal::Float(value) => write!(f, "{value:?}"),
            ConstVal::Str(value) => write!(f, "{value:?}"),
        }
    }
}

/// Comparison codes used by `j_cmp_*`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CmpOp {
    pub fn code(&self) -> u8 {
        match self {
            CmpOp::Eq => 0,
            CmpOp::Ne => 1,
            CmpOp::Gt => 2,
            CmpOp::Ge => 3,
            CmpOp::Lt => 4,
            CmpOp::Le => 5,
        }
    }

    pub fn from_operator(op: crate::ast::BinaryOperator) -> Option<CmpOp> {
        use crate::ast::BinaryOperator::*;
        Some(match op {
            Eq => CmpOp::Eq,
            NotEq => CmpOp::Ne,
            Greater => CmpOp::Gt,
            GreaterEq => CmpOp::Ge,
            Less => CmpOp::Lt,
            LessEq => CmpOp::Le,
            _ => return None,
        })
    }
}

/// Arithmetic and bitwise operation mnemonics.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinIrOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
}

impl BinIrOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            BinIrOp::Add => "add",
            BinIrOp::Sub => "sub",
            BinIrOp::Mul => "mul",
            BinIrOp::Div => "div",
            BinIrOp::Mod => "mod",
            BinIrOp::BAnd => "band",
            BinIrOp::BOr => "bor",
            BinIrOp::BXor => "bxor",
            BinIrOp::Shl => "shl",
            BinIrOp::Shr => "shr",
        }
    }

    pub fn from_operator(op: crate::ast::BinaryOperator) -> Option<BinIrOp> {
        use crate::ast::BinaryOperator::*;
        Some(match op {
            Add => BinIrOp::Add,
            Sub => BinIrOp::Sub,
            Mul => BinIrOp::Mul,
            Div => BinIrOp::Div,
            Mod => BinIrOp::Mod,
            BitAnd => BinIrOp::BAnd,
            BitOr => BinIrOp::BOr,
            BitXor => BinIrOp::BXor,
            Shl => BinIrOp::Shl,
            Shr => BinIrOp::Shr,
            _ => return None,
        })
    }
}

/// Unary operation mnemonics.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnIrOp {
    Neg,
    Not,
    BNot,
}

impl UnIrOp {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            UnIrOp::Neg => "neg",
            UnIrOp::Not => "not",
            UnIrOp::BNot => "bnot",
        }
    }
}

/// One IR instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Label { name: String },
    Jump { target: String },
    JumpCmp { ty: IrType, a: Reg, b: Reg, op: CmpOp, target: String },
    JumpEqNull { size: usize, reg: Reg, target: String },

    Const { ty: IrType, dst: Reg, value: ConstVal },
    /// `tmp_<t> dst [global|local|arg|func|reg] uid`
    Load { ty: IrType, dst: Reg, slot: Slot },
    /// `tmp_<t> uid reg src` for locals and arguments
    StoreLocal { ty: IrType, uid: String, src: Reg },
    /// `global_<t> uid src`
    StoreGlobal { ty: IrType, uid: String, src: Reg },

    Binary { ty: IrType, op: BinIrOp, dst: Reg, a: Reg, b: Reg },
    Unary { ty: IrType, op: UnIrOp, dst: Reg, a: Reg },
    Cast { step: CastStep, dst: Reg, src: Reg },

    SAlloc { dst: Reg, fields: usize, total_size: usize },
    SRegField { dst: Reg, index: usize, offset: usize },
    SLoadF { ty: IrType, dst: Reg, object: Reg, index: usize },
    SStoreF { ty: IrType, object: Reg, index: usize, src: Reg },

    CAlloc { dst: Reg, methods: usize, data_size: usize, class_id: u32 },
    CRegField { dst: Reg, index: usize, offset: usize },
    CStoreM { dst: Reg, index: usize, function_uid: String },
    CLoadM { dst: Reg, index: usize, object: Reg },
    CLoadF { ty: IrType, dst: Reg, object: Reg, index: usize },
    CStoreF { ty: IrType, object: Reg, index: usize, src: Reg },

    IIsC { dst: Reg, interface: Reg, class_id: u32 },
    IHasM { method_id: usize, interface: Reg, fail: String },

    AAlloc { dst: Reg, count: usize, element_size: usize },
    AExtend { array: Reg, new_count: Reg },
    ALen { dst: Reg, array: Reg },
    ASlice { dst: Reg, array: Reg, start: Reg, end: Reg },
    ALoadF { ty: IrType, dst: Reg, index: Reg, array: Reg },
    AStoreF { ty: IrType, array: Reg, index: Reg, src: Reg },

    FnAlloc,
    FnSetReg { ty: IrType, slot: usize, src: Reg },
    Call { dst: Reg, target_uid: String },
    CallPtr { dst: Reg, function: Reg },

    Push { ty: IrType, src: Reg },
    Pop { ty: IrType, dst: Reg },
    CallFfi { dst: Reg, ffi_id: u32, method_id: usize },

    ClosureAlloc { dst: Reg, captures: usize, function_uid: String },
    ClosurePushEnv { ty: IrType, closure: Reg, src: Reg },
    ClosureCall { dst: Reg, closure: Reg },
    ClosureBackup,

    CoroutineAlloc { dst: Reg, function_uid: String },
    CoroutineFnAlloc { coroutine: Reg },
    CoroutineCall { dst: Reg, coroutine: Reg },
    CoroutineYield { src: Option<Reg> },
    CoroutineRet { src: Option<Reg> },
    CoroutineFinish,

    Ret { ty: IrType, src: Reg },
    RetVoid,

    SrcMapPush { file: String, line: usize, column: usize, function: String },
    SrcMapPop,

    SpillStore { slot: usize, src: Reg },
    SpillLoad { dst: Reg, slot: usize },
}

impl std::fmt::Display for Instr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instr::Label { name } => write!(f, "label {name}"),
            Instr::Jump { target } => write!(f, "j {target}"),
            Instr::JumpCmp { ty, a, b, op, target } => {
                write!(f, "j_cmp_{} {a} {b} {} {target}", ty.name(), op.code())
            }
            Instr::JumpEqNull { size, reg, target } => write!(f, "j_eq_null_{size} {reg} {target}"),
            Instr::Const { ty, dst, value } => write!(f, "const_{} {dst} {value}", ty.name()),
            Instr::Load { ty, dst, slot } => {
                write!(f, "tmp_{} {dst} {} {}", ty.name(), slot.keyword(), slot.operand())
            }
            Instr::StoreLocal { ty, uid, src } => write!(f, "tmp_{} {uid} reg {src}", ty.name()),
            Instr::StoreGlobal { ty, uid, src } => write!(f, "global_{} {uid} {src}", ty.name()),
            Instr::Binary { ty, op, dst, a, b } => {
                write!(f, "{}_{} {dst} {a} {b}", op.mnemonic(), ty.name())
            }
            Instr::Unary { ty, op, dst, a } => write!(f, "{}_{} {dst} {a}", op.mnemonic(), ty.name()),
            Instr::Cast { step, dst, src } => {
                write!(f, "{} {dst} {src} {} {}", step.op.mnemonic(), step.from.name(), step.to.name())
            }
            Instr::SAlloc { dst, fields, total_size } => write!(f, "s_alloc {dst} {fields} {total_size}"),
            Instr::SRegField { dst, index, offset } => write!(f, "s_reg_field {dst} {index} {offset}"),
            Instr::SLoadF { ty, dst, object, index } => {
                write!(f, "s_loadf_{} {dst} {object} {index}", ty.name())
            }
            Instr::SStoreF { ty, object, index, src } => {
                write!(f, "s_storef_{} {object} {index} {src}", ty.name())
            }
            Instr::CAlloc { dst, methods, data_size, class_id } => {
                write!(f, "c_alloc {dst} {methods} {data_size} {class_id}")
            }
            Instr::CRegField { dst, index, offset } => write!(f, "c_reg_field {dst} {index} {offset}"),
            Instr::CStoreM { dst, index, function_uid } => write!(f, "c_store_m {dst} {index} {function_uid}"),
            Instr::CLoadM { dst, index, object } => write!(f, "c_load_m {dst} {index} {object}"),
            Instr::CLoadF { ty, dst, object, index } => {
                write!(f, "c_loadf_{} {dst} {object} {index}", ty.name())
            }
            Instr::CStoreF { ty, object, index, src } => {
                write!(f, "c_storef_{} {object} {index} {src}", ty.name())
            }
            Instr::IIsC { dst, interface, class_id } => write!(f, "i_is_c {dst} {interface} {class_id}"),
            Instr::IHasM { method_id, interface, fail } => write!(f, "i_has_m {method_id} {interface} {fail}"),
            Instr::AAlloc { dst, count, element_size } => write!(f, "a_alloc {dst} {count} {element_size}"),
            Instr::AExtend { array, new_count } => write!(f, "a_extend {array} {new_count}"),
            Instr::ALen { dst, array } => write!(f, "a_len {dst} {array}"),
            Instr::ASlice { dst, array, start, end } => write!(f, "a_slice {dst} {array} {start} {end}"),
            Instr::ALoadF { ty, dst, index, array } => {
                write!(f, "a_loadf_{} {dst} {index} {array}", ty.name())
            }
            Instr::AStoreF { ty, array, index, src } => {
                write!(f, "a_storef_{} {array} {index} {src}", ty.name())
            }
            Instr::FnAlloc => f.write_str("fn_alloc"),
            Instr::FnSetReg { ty, slot, src } => write!(f, "fn_set_reg_{} {slot} {src}", ty.name()),
            Instr::Call { dst, target_uid } => write!(f, "call {dst} {target_uid}"),
            Instr::CallPtr { dst, function } => write!(f, "call_ptr {dst} {function}"),
            Instr::Push { ty, src } => write!(f, "push_{} {src}", ty.name()),
            Instr::Pop { ty, dst } => write!(f, "pop_{} {dst}", ty.name()),
            Instr::CallFfi { dst, ffi_id, method_id } => write!(f, "call_ffi {dst} {ffi_id} {method_id}"),
            Instr::ClosureAlloc { dst, captures, function_uid } => {
                write!(f, "closure_alloc {dst} {captures} {function_uid}")
            }
            Instr::ClosurePushEnv { ty, closure, src } => {
                write!(f, "closure_push_env_{} {closure} {src}", ty.name())
            }
            Instr::ClosureCall { dst, closure } => write!(f, "closure_call {dst} {closure}"),
            Instr::ClosureBackup => f.write_str("closure_backup"),
            Instr::CoroutineAlloc { dst, function_uid } => write!(f, "coroutine_alloc {dst} {function_uid}"),
            Instr::CoroutineFnAlloc { coroutine } => write!(f, "coroutine_fn_alloc {coroutine}"),
            Instr::CoroutineCall { dst, coroutine } => write!(f, "coroutine_call {dst} {coroutine}"),
            Instr::CoroutineYield { src: Some(src) } => write!(f, "coroutine_yield {src}"),
            Instr::CoroutineYield { src: None } => f.write_str("coroutine_yield"),
            Instr::CoroutineRet { src: Some(src) } => write!(f, "coroutine_ret {src}"),
            Instr::CoroutineRet { src: None } => f.write_str("coroutine_ret"),
            Instr::CoroutineFinish => f.write_str("coroutine_finish"),
            Instr::Ret { ty, src } => write!(f, "ret_{} {src}", ty.name()),
            Instr::RetVoid => f.write_str("ret_void"),
            Instr::SrcMapPush { file, line, column, function } => {
                write!(f, "srcmap_push_loc {file} {line} {column} {function}")
            }
            Instr::SrcMapPop => f.write_str("srcmap_pop_loc"),
            Instr::SpillStore { slot, src } => write!(f, "spill_store {slot} {src}"),
            Instr::SpillLoad { dst, slot } => write!(f, "spill_load {dst} {slot}"),
        }
    }
}

impl Instr {
    /// The register this instruction defines, if any.
    pub fn def(&self) -> Option<Reg> {
        match self {
            Instr::Const { dst, .. }
            | Instr::Load { dst, .. }
            | Instr::Binary { dst, .. }
            | Instr::Unary { dst, .. }
            | Instr::Cast { dst, .. }
            | Instr::SAlloc { dst, .. }
            | Instr::SLoadF { dst, .. }
            | Instr::CAlloc { dst, .. }
            | Instr::CLoadM { dst, .. }
            | Instr::CLoadF { dst, .. }
            | Instr::IIsC { dst, .. }
            | Instr::AAlloc { dst, .. }
            | Instr::ALen { dst, .. }
            | Instr::ASlice { dst, .. }
            | Instr::ALoadF { dst, .. }
            | Instr::Call { dst, .. }
            | Instr::CallPtr { dst, .. }
            | Instr::Pop { dst, .. }
            | Instr::CallFfi { dst, .. }
            | Instr::ClosureAlloc { dst, .. }
            | Instr::ClosureCall { dst, .. }
            | Instr::CoroutineAlloc { dst, .. }
            | Instr::CoroutineCall { dst, .. }
            | Instr::SpillLoad { dst, .. } => Some(*dst),
            _ => None,
        }
    }

    /// Appends the registers this instruction reads.
    pub fn uses(&self, out: &mut Vec<Reg>) {
        match self {
            Instr::JumpCmp { a, b, .. } => out.extend([*a, *b]),
            Instr::JumpEqNull { reg, .. } => out.push(*reg),
            Instr::Load { slot: Slot::Reg(src), .. } => out.push(*src),
            Instr::StoreLocal { src, .. } | Instr::StoreGlobal { src, .. } => out.push(*src),
            Instr::Binary { a, b, .. } => out.extend([*a, *b]),
            Instr::Unary { a, .. } => out.push(*a),
            Instr::Cast { src, .. } => out.push(*src),
            Instr::SRegField { dst, .. } | Instr::CRegField { dst, .. } | Instr::CStoreM { dst, .. } => out.push(*dst),
            Instr::SLoadF { object, .. } | Instr::CLoadF { object, .. } => out.push(*object),
            Instr::SStoreF { object, src, .. } | Instr::CStoreF { object, src, .. } => out.extend([*object, *src]),
            Instr::CLoadM { object, .. } => out.push(*object),
            Instr::IIsC { interface, .. } | Instr::IHasM { interface, .. } => out.push(*interface),
            Instr::AExtend { array, new_count } => out.extend([*array, *new_count]),
            Instr::ALen { array, .. } => out.push(*array),
            Instr::ASlice { array, start, end, .. } => out.extend([*array, *start, *end]),
            Instr::ALoadF { index, array, .. } => out.extend([*index, *array]),
            Instr::AStoreF { array, index, src, .. } => out.extend([*array, *index, *src]),
            Instr::FnSetReg { src, .. } | Instr::Push { src, .. } => out.push(*src),
            Instr::CallPtr { function, .. } => out.push(*function),
            Instr::ClosurePushEnv { closure, src, .. } => out.extend([*closure, *src]),
            Instr::ClosureCall { closure, .. } => out.push(*closure),
            Instr::CoroutineFnAlloc { coroutine } | Instr::CoroutineCall { coroutine, .. } => out.push(*coroutine),
            Instr::CoroutineYield { src: Some(src) } | Instr::CoroutineRet { src: Some(src) } => out.push(*src),
            Instr::Ret { src, .. } => out.push(*src),
            Instr::SpillStore { src, .. } => out.push(*src),
            _ => {}
        }
    }

    /// Rewrites every register through a mapping. Used by allocation.
    pub fn map_regs(&mut self, map: &mut impl FnMut(Reg) -> Reg) {
        macro_rules! remap {
            ($($reg:expr),*) => {{ $(*$reg = map(*$reg);)* }};
        }
        match self {
            Instr::JumpCmp { a, b, .. } => remap!(a, b),
            Instr::JumpEqNull { reg, .. } => remap!(reg),
            Instr::Load { dst, slot, .. } => {
                remap!(dst);
                if let Slot::Reg(src) = slot {
                    remap!(src);
                }
            }
            Instr::Const { dst, .. } => remap!(dst),
            Instr::StoreLocal { src, .. } | Instr::StoreGlobal { src, .. } => remap!(src),
            Instr::Binary { dst, a, b, .. } => remap!(dst, a, b),
            Instr::Unary { dst, a, .. } => remap!(dst, a),
            Instr::Cast { dst, src, .. } => remap!(dst, src),
            Instr::SAlloc { dst, .. } | Instr::SRegField { dst, .. } => remap!(dst),
            Instr::SLoadF { dst, object, .. } => remap!(dst, object),
            Instr::SStoreF { object, src, .. } => remap!(object, src),
            Instr::CAlloc { dst, .. } | Instr::CRegField { dst, .. } | Instr::CStoreM { dst, .. } => remap!(dst),
            Instr::CLoadM { dst, object, .. } | Instr::CLoadF { dst, object, .. } => remap!(dst, object),
            Instr::CStoreF { object, src, .. } => remap!(object, src),
            Instr::IIsC { dst, interface, .. } => remap!(dst, interface),
            Instr::IHasM { interface, .. } => remap!(interface),
            Instr::AAlloc { dst, .. } => remap!(dst),
            Instr::AExtend { array, new_count } => remap!(array, new_count),
            Instr::ALen { dst, array } => remap!(dst, array),
            Instr::ASlice { dst, array, start, end } => remap!(dst, array, start, end),
            Instr::ALoadF { dst, index, array, .. } => remap!(dst, index, array),
            Instr::AStoreF { array, index, src, .. } => remap!(array, index, src),
            Instr::FnSetReg { src, .. } => remap!(src),
            Instr::Call { dst, .. } => remap!(dst),
            Instr::CallPtr { dst, function } => remap!(dst, function),
            Instr::Push { src, .. } => remap!(src),
            Instr::Pop { dst, .. } => remap!(dst),
            Instr::CallFfi { dst, .. } => remap!(dst),
            Instr::ClosureAlloc { dst, .. } => remap!(dst),
            Instr::ClosurePushEnv { closure, src, .. } => remap!(closure, src),
            Instr::ClosureCall { dst, closure } => remap!(dst, closure),
            Instr::CoroutineAlloc { dst, .. } => remap!(dst),
            Instr::CoroutineFnAlloc { coroutine } => remap!(coroutine),
            Instr::CoroutineCall { dst, coroutine } => remap!(dst, coroutine),
            Instr::CoroutineYield { src: Some(src) } | Instr::CoroutineRet { src: Some(src) } => remap!(src),
            Instr::Ret { src, .. } => remap!(src),
            Instr::SpillStore { src, .. } => remap!(src),
            Instr::SpillLoad { dst, .. } => remap!(dst),
            _ => {}
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self, Instr::Label { .. })
    }

    /// Unconditional control transfer away from the next instruction.
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            Instr::Jump { .. } | Instr::Ret { .. } | Instr::RetVoid | Instr::CoroutineFinish
        )
    }

    /// The label this instruction may transfer to.
    pub fn jump_target(&self) -> Option<&str> {
        match self {
            Instr::Jump { target } | Instr::JumpCmp { target, .. } | Instr::JumpEqNull { target, .. } => Some(target),
            Instr::IHasM { fail, .. } => Some(fail),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_encoder_contract() {
        assert_eq!(
            Instr::Binary { ty: IrType::I32, op: BinIrOp::Add, dst: Reg(2), a: Reg(0), b: Reg(1) }.to_string(),
            "add_i32 r2 r0 r1"
        );
        assert_eq!(Instr::Ret { ty: IrType::I32, src: Reg(2) }.to_string(), "ret_i32 r2");
        assert_eq!(
            Instr::JumpCmp { ty: IrType::U8, a: Reg(0), b: Reg(1), op: CmpOp::Eq, target: "3_0".into() }.to_string(),
            "j_cmp_u8 r0 r1 0 3_0"
        );
        assert_eq!(
            Instr::Load { ty: IrType::I64, dst: Reg(4), slot: Slot::Local("1_x_0".into()) }.to_string(),
            "tmp_i64 r4 local 1_x_0"
        );
        assert_eq!(
            Instr::StoreLocal { ty: IrType::I64, uid: "1_x_0".into(), src: Reg(4) }.to_string(),
            "tmp_i64 1_x_0 reg r4"
        );
        assert_eq!(Instr::SRegField { dst: Reg(1), index: 1, offset: 2 }.to_string(), "s_reg_field r1 1 2");
    }

    #[test]
    fn cmp_codes_are_stable() {
        assert_eq!(CmpOp::Eq.code(), 0);
        assert_eq!(CmpOp::Ne.code(), 1);
        assert_eq!(CmpOp::Gt.code(), 2);
        assert_eq!(CmpOp::Ge.code(), 3);
        assert_eq!(CmpOp::Lt.code(), 4);
        assert_eq!(CmpOp::Le.code(), 5);
    }

    #[test]
    fn defs_and_uses() {
        let instr = Instr::Binary { ty: IrType::I32, op: BinIrOp::Add, dst: Reg(2), a: Reg(0), b: Reg(1) };
        assert_eq!(instr.def(), Some(Reg(2)));
        let mut uses = Vec::new();
        instr.uses(&mut uses);
        assert_eq!(uses, vec![Reg(0), Reg(1)]);

        let store = Instr::SStoreF { ty: IrType::U16, object: Reg(5), index: 0, src: Reg(6) };
        assert_eq!(store.def(), None);
        let mut uses = Vec::new();
        store.uses(&mut uses);
        assert_eq!(uses, vec![Reg(5), Reg(6)]);
    }
}
