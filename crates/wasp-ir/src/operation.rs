//! The closed set of IR operations.
//!
//! Every opcode is a variant of [`Operation`] carrying its immutable payload.
//! Arity, attributes and context requirements are derived from the variant, so
//! an instruction's operand counts can always be checked against its operation.

use crate::types::{WasmLiteral, WasmSignature, WasmValueType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Set of contexts an instruction position can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Context(u8);

impl Context {
    pub const EMPTY: Context = Context(0);
    pub const JAVASCRIPT: Context = Context(1 << 0);
    /// Inside a JavaScript function body
    pub const SUBROUTINE: Context = Context(1 << 1);
    /// Inside a JavaScript loop body
    pub const LOOP: Context = Context(1 << 2);
    pub const WASM_MODULE: Context = Context(1 << 3);
    pub const WASM_FUNCTION: Context = Context(1 << 4);

    pub fn contains(self, other: Context) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: Context) -> Context {
        Context(self.0 | other.0)
    }

    pub fn is_javascript(self) -> bool {
        self.contains(Context::JAVASCRIPT)
    }

    pub fn is_wasm_module(self) -> bool {
        self.contains(Context::WASM_MODULE)
    }

    pub fn is_wasm_function(self) -> bool {
        self.contains(Context::WASM_FUNCTION)
    }
}

impl std::ops::BitOr for Context {
    type Output = Context;

    fn bitor(self, rhs: Context) -> Context {
        self.union(rhs)
    }
}

/// Operation attribute flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Attributes(u8);

impl Attributes {
    pub const NONE: Attributes = Attributes(0);
    /// No side effects; the output depends only on the payload and inputs
    pub const PURE: Attributes = Attributes(1 << 0);
    pub const IS_CALL: Attributes = Attributes(1 << 1);
    pub const IS_BLOCK_START: Attributes = Attributes(1 << 2);
    pub const IS_BLOCK_END: Attributes = Attributes(1 << 3);
    /// Unconditional control transfer; the rest of the enclosing scope is dead
    pub const IS_JUMP: Attributes = Attributes(1 << 4);
    /// Lifted inside a try/catch
    pub const IS_GUARDED: Attributes = Attributes(1 << 5);

    pub fn contains(self, other: Attributes) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for Attributes {
    type Output = Attributes;

    fn bitor(self, rhs: Attributes) -> Attributes {
        Attributes(self.0 | rhs.0)
    }
}

/// Kinds of blocks, used to match block starts with block ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    PlainFunction,
    If,
    RepeatLoop,
    TryCatch,
    WasmModule,
    WasmFunction,
    WasmBlock,
    WasmLoop,
    WasmIf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    Xor,
    LShift,
    RShift,
    UnRShift,
    Exp,
    LogicAnd,
    LogicOr,
}

impl BinaryOperator {
    pub const ALL: [BinaryOperator; 14] = [
        BinaryOperator::Add,
        BinaryOperator::Sub,
        BinaryOperator::Mul,
        BinaryOperator::Div,
        BinaryOperator::Mod,
        BinaryOperator::BitAnd,
        BinaryOperator::BitOr,
        BinaryOperator::Xor,
        BinaryOperator::LShift,
        BinaryOperator::RShift,
        BinaryOperator::UnRShift,
        BinaryOperator::Exp,
        BinaryOperator::LogicAnd,
        BinaryOperator::LogicOr,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Mod => "%",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::Xor => "^",
            BinaryOperator::LShift => "<<",
            BinaryOperator::RShift => ">>",
            BinaryOperator::UnRShift => ">>>",
            BinaryOperator::Exp => "**",
            BinaryOperator::LogicAnd => "&&",
            BinaryOperator::LogicOr => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOperator {
    Minus,
    Plus,
    LogicalNot,
    BitwiseNot,
}

impl UnaryOperator {
    pub const ALL: [UnaryOperator; 4] = [
        UnaryOperator::Minus,
        UnaryOperator::Plus,
        UnaryOperator::LogicalNot,
        UnaryOperator::BitwiseNot,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            UnaryOperator::Minus => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::LogicalNot => "!",
            UnaryOperator::BitwiseNot => "~",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Equal,
    StrictEqual,
    NotEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
}

impl Comparator {
    pub const ALL: [Comparator; 8] = [
        Comparator::Equal,
        Comparator::StrictEqual,
        Comparator::NotEqual,
        Comparator::StrictNotEqual,
        Comparator::LessThan,
        Comparator::LessThanOrEqual,
        Comparator::GreaterThan,
        Comparator::GreaterThanOrEqual,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Comparator::Equal => "==",
            Comparator::StrictEqual => "===",
            Comparator::NotEqual => "!=",
            Comparator::StrictNotEqual => "!==",
            Comparator::LessThan => "<",
            Comparator::LessThanOrEqual => "<=",
            Comparator::GreaterThan => ">",
            Comparator::GreaterThanOrEqual => ">=",
        }
    }
}

/// Operand width of a Wasm numeric instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumWidth {
    Bits32,
    Bits64,
}

impl NumWidth {
    pub fn int_type(&self) -> WasmValueType {
        match self {
            NumWidth::Bits32 => WasmValueType::I32,
            NumWidth::Bits64 => WasmValueType::I64,
        }
    }

    pub fn float_type(&self) -> WasmValueType {
        match self {
            NumWidth::Bits32 => WasmValueType::F32,
            NumWidth::Bits64 => WasmValueType::F64,
        }
    }

    pub fn of_int(ty: WasmValueType) -> Option<NumWidth> {
        match ty {
            WasmValueType::I32 => Some(NumWidth::Bits32),
            WasmValueType::I64 => Some(NumWidth::Bits64),
            _ => None,
        }
    }

    pub fn of_float(ty: WasmValueType) -> Option<NumWidth> {
        match ty {
            WasmValueType::F32 => Some(NumWidth::Bits32),
            WasmValueType::F64 => Some(NumWidth::Bits64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntBinaryOp {
    Add,
    Sub,
    Mul,
    DivS,
    DivU,
    RemS,
    RemU,
    And,
    Or,
    Xor,
    Shl,
    ShrS,
    ShrU,
    Rotl,
    Rotr,
}

impl IntBinaryOp {
    pub const ALL: [IntBinaryOp; 15] = [
        IntBinaryOp::Add,
        IntBinaryOp::Sub,
        IntBinaryOp::Mul,
        IntBinaryOp::DivS,
        IntBinaryOp::DivU,
        IntBinaryOp::RemS,
        IntBinaryOp::RemU,
        IntBinaryOp::And,
        IntBinaryOp::Or,
        IntBinaryOp::Xor,
        IntBinaryOp::Shl,
        IntBinaryOp::ShrS,
        IntBinaryOp::ShrU,
        IntBinaryOp::Rotl,
        IntBinaryOp::Rotr,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntUnaryOp {
    Clz,
    Ctz,
    Popcnt,
}

impl IntUnaryOp {
    pub const ALL: [IntUnaryOp; 3] = [IntUnaryOp::Clz, IntUnaryOp::Ctz, IntUnaryOp::Popcnt];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntCompareOp {
    Eq,
    Ne,
    LtS,
    LtU,
    GtS,
    GtU,
    LeS,
    LeU,
    GeS,
    GeU,
}

impl IntCompareOp {
    pub const ALL: [IntCompareOp; 10] = [
        IntCompareOp::Eq,
        IntCompareOp::Ne,
        IntCompareOp::LtS,
        IntCompareOp::LtU,
        IntCompareOp::GtS,
        IntCompareOp::GtU,
        IntCompareOp::LeS,
        IntCompareOp::LeU,
        IntCompareOp::GeS,
        IntCompareOp::GeU,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatBinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    Copysign,
}

impl FloatBinaryOp {
    pub const ALL: [FloatBinaryOp; 7] = [
        FloatBinaryOp::Add,
        FloatBinaryOp::Sub,
        FloatBinaryOp::Mul,
        FloatBinaryOp::Div,
        FloatBinaryOp::Min,
        FloatBinaryOp::Max,
        FloatBinaryOp::Copysign,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatUnaryOp {
    Abs,
    Neg,
    Ceil,
    Floor,
    Trunc,
    Nearest,
    Sqrt,
}

impl FloatUnaryOp {
    pub const ALL: [FloatUnaryOp; 7] = [
        FloatUnaryOp::Abs,
        FloatUnaryOp::Neg,
        FloatUnaryOp::Ceil,
        FloatUnaryOp::Floor,
        FloatUnaryOp::Trunc,
        FloatUnaryOp::Nearest,
        FloatUnaryOp::Sqrt,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatCompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl FloatCompareOp {
    pub const ALL: [FloatCompareOp; 6] = [
        FloatCompareOp::Eq,
        FloatCompareOp::Ne,
        FloatCompareOp::Lt,
        FloatCompareOp::Gt,
        FloatCompareOp::Le,
        FloatCompareOp::Ge,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    // JavaScript values
    LoadInteger { value: i64 },
    LoadBigInt { value: i64 },
    LoadFloat { value: f64 },
    LoadString { value: String },
    LoadBoolean { value: bool },
    LoadUndefined,
    LoadNull,
    LoadRegExp { pattern: String, flags: String },
    LoadBuiltin { name: String },
    CreateObject { property_names: Vec<String> },
    CreateArray { size: usize },

    // JavaScript objects
    GetProperty { name: String },
    SetProperty { name: String },
    DeleteProperty { name: String },
    GetElement { index: i64 },
    SetElement { index: i64 },
    GetComputedProperty,
    SetComputedProperty,

    // JavaScript calls and operators
    CallFunction { num_args: usize, guarded: bool },
    CallMethod { method: String, num_args: usize, guarded: bool },
    Construct { num_args: usize, guarded: bool },
    BinaryOperation { op: BinaryOperator },
    UnaryOperation { op: UnaryOperator },
    Compare { op: Comparator },
    Reassign,

    // JavaScript control flow
    BeginPlainFunction { num_parameters: usize },
    EndPlainFunction,
    Return { has_value: bool },
    BeginIf,
    BeginElse,
    EndIf,
    BeginRepeatLoop { iterations: u32 },
    EndRepeatLoop,
    LoopBreak,
    LoopContinue,
    BeginTry,
    BeginCatch,
    EndTryCatch,
    ThrowException,

    // WebAssembly from JavaScript
    CreateWasmGlobal { value: WasmLiteral, mutable: bool },
    CreateWasmMemory { minimum: u32, maximum: Option<u32>, shared: bool },
    CreateWasmTable { element: WasmValueType, minimum: u32, maximum: Option<u32> },
    BeginWasmModule,
    /// Outputs the compiled module and the exports of an instance created with the declared imports
    EndWasmModule,
    InstantiateWasm { num_imports: usize },
    GetWasmExport { export_name: String },
    GetWasmMemory { memory_index: u32 },
    WriteWasmMemory { offset: u64, bytes: Vec<u8> },
    GetWasmGlobal { global_name: String },

    // Wasm module body
    WasmDefineGlobal { value: WasmLiteral, mutable: bool },
    WasmImportGlobal,
    WasmDefineTable { element: WasmValueType, minimum: u32, maximum: Option<u32> },
    WasmImportTable,
    WasmDefineMemory { minimum: u32, maximum: Option<u32> },
    WasmImportMemory,
    WasmImportFunction { signature: WasmSignature },
    BeginWasmFunction { signature: WasmSignature },
    EndWasmFunction { signature: WasmSignature },

    // Wasm function body
    WasmConst { value: WasmLiteral },
    WasmIntBinary { width: NumWidth, op: IntBinaryOp },
    WasmIntUnary { width: NumWidth, op: IntUnaryOp },
    WasmIntEqz { width: NumWidth },
    WasmIntCompare { width: NumWidth, op: IntCompareOp },
    WasmFloatBinary { width: NumWidth, op: FloatBinaryOp },
    WasmFloatUnary { width: NumWidth, op: FloatUnaryOp },
    WasmFloatCompare { width: NumWidth, op: FloatCompareOp },
    WasmLoadGlobal,
    WasmStoreGlobal,
    WasmTableGet,
    WasmTableSet,
    WasmMemoryLoad { ty: WasmValueType, offset: u64 },
    WasmMemoryStore { ty: WasmValueType, offset: u64 },
    WasmCallFunction { signature: WasmSignature },
    WasmReassign,
    WasmReturn { has_value: bool },
    WasmBeginBlock,
    WasmEndBlock,
    WasmBeginLoop,
    WasmEndLoop,
    WasmBeginIf,
    WasmBeginElse,
    WasmEndIf,
    WasmBranch,
    WasmBranchIf,
    WasmUnreachable,
}

impl Operation {
    pub fn num_inputs(&self) -> usize {
        use Operation::*;
        match self {
            LoadInteger { .. } | LoadBigInt { .. } | LoadFloat { .. } | LoadString { .. }
            | LoadBoolean { .. } | LoadUndefined | LoadNull | LoadRegExp { .. }
            | LoadBuiltin { .. } => 0,
            CreateObject { property_names } => property_names.len(),
            CreateArray { size } => *size,
            GetProperty { .. } | DeleteProperty { .. } | GetElement { .. } => 1,
            SetProperty { .. } | SetElement { .. } | GetComputedProperty => 2,
            SetComputedProperty => 3,
            CallFunction { num_args, .. } | CallMethod { num_args, .. } | Construct { num_args, .. } => {
                1 + num_args
            }
            BinaryOperation { .. } | Compare { .. } | Reassign => 2,
            UnaryOperation { .. } => 1,
            BeginPlainFunction { .. } | EndPlainFunction => 0,
            Return { has_value } => *has_value as usize,
            BeginIf => 1,
            BeginElse | EndIf | BeginRepeatLoop { .. } | EndRepeatLoop | LoopBreak | LoopContinue
            | BeginTry | BeginCatch | EndTryCatch => 0,
            ThrowException => 1,
            CreateWasmGlobal { .. } | CreateWasmMemory { .. } | CreateWasmTable { .. }
            | BeginWasmModule | EndWasmModule => 0,
            InstantiateWasm { num_imports } => 1 + num_imports,
            GetWasmExport { .. } | GetWasmMemory { .. } | WriteWasmMemory { .. }
            | GetWasmGlobal { .. } => 1,
            WasmDefineGlobal { .. } | WasmDefineTable { .. } | WasmDefineMemory { .. } => 0,
            WasmImportGlobal | WasmImportTable | WasmImportMemory | WasmImportFunction { .. } => 1,
            BeginWasmFunction { .. } => 0,
            EndWasmFunction { signature } => signature.results.len(),
            WasmConst { .. } => 0,
            WasmIntBinary { .. } | WasmIntCompare { .. } | WasmFloatBinary { .. }
            | WasmFloatCompare { .. } => 2,
            WasmIntUnary { .. } | WasmIntEqz { .. } | WasmFloatUnary { .. } => 1,
            WasmLoadGlobal => 1,
            WasmStoreGlobal | WasmTableGet => 2,
            WasmTableSet => 3,
            WasmMemoryLoad { .. } => 2,
            WasmMemoryStore { .. } => 3,
            WasmCallFunction { signature } => 1 + signature.params.len(),
            WasmReassign => 2,
            WasmReturn { has_value } => *has_value as usize,
            WasmBeginBlock | WasmEndBlock | WasmBeginLoop | WasmEndLoop => 0,
            WasmBeginIf => 1,
            WasmBeginElse | WasmEndIf => 0,
            WasmBranch => 1,
            WasmBranchIf => 2,
            WasmUnreachable => 0,
        }
    }

    pub fn num_outputs(&self) -> usize {
        use Operation::*;
        match self {
            SetProperty { .. } | SetElement { .. } | SetComputedProperty | Reassign
            | EndPlainFunction | Return { .. } | BeginIf | BeginElse | EndIf
            | BeginRepeatLoop { .. } | EndRepeatLoop | LoopBreak | LoopContinue | BeginTry
            | BeginCatch | EndTryCatch | ThrowException | BeginWasmModule
            | WriteWasmMemory { .. } | BeginWasmFunction { .. } | WasmStoreGlobal
            | WasmTableSet | WasmMemoryStore { .. } | WasmReassign | WasmReturn { .. }
            | WasmBeginBlock | WasmEndBlock | WasmBeginLoop | WasmEndLoop | WasmBeginIf
            | WasmBeginElse | WasmEndIf | WasmBranch | WasmBranchIf | WasmUnreachable => 0,
            EndWasmModule => 2,
            WasmCallFunction { signature } => signature.results.len(),
            _ => 1,
        }
    }

    pub fn num_inner_outputs(&self) -> usize {
        use Operation::*;
        match self {
            BeginPlainFunction { num_parameters } => *num_parameters,
            BeginRepeatLoop { .. } | BeginCatch => 1,
            BeginWasmFunction { signature } => signature.params.len(),
            WasmBeginBlock | WasmBeginLoop | WasmBeginIf | WasmBeginElse => 1,
            _ => 0,
        }
    }

    pub fn attributes(&self) -> Attributes {
        use Operation::*;
        match self {
            LoadInteger { .. } | LoadBigInt { .. } | LoadFloat { .. } | LoadString { .. }
            | LoadBoolean { .. } | LoadUndefined | LoadNull | LoadBuiltin { .. }
            | WasmConst { .. } => Attributes::PURE,
            CallFunction { guarded, .. } | CallMethod { guarded, .. } | Construct { guarded, .. } => {
                if *guarded {
                    Attributes::IS_CALL | Attributes::IS_GUARDED
                } else {
                    Attributes::IS_CALL
                }
            }
            // Instantiation can throw and runs the start function
            InstantiateWasm { .. } => Attributes::IS_CALL | Attributes::IS_GUARDED,
            WriteWasmMemory { .. } => Attributes::IS_GUARDED,
            WasmCallFunction { .. } => Attributes::IS_CALL,
            BeginPlainFunction { .. } | BeginIf | BeginRepeatLoop { .. } | BeginTry
            | BeginWasmModule | BeginWasmFunction { .. } | WasmBeginBlock | WasmBeginLoop
            | WasmBeginIf => Attributes::IS_BLOCK_START,
            BeginElse | BeginCatch | WasmBeginElse => {
                Attributes::IS_BLOCK_START | Attributes::IS_BLOCK_END
            }
            EndPlainFunction | EndIf | EndRepeatLoop | EndTryCatch | EndWasmModule
            | EndWasmFunction { .. } | WasmEndBlock | WasmEndLoop | WasmEndIf => {
                Attributes::IS_BLOCK_END
            }
            Return { .. } | ThrowException | LoopBreak | LoopContinue | WasmReturn { .. }
            | WasmBranch | WasmUnreachable => Attributes::IS_JUMP,
            _ => Attributes::NONE,
        }
    }

    pub fn is_block_start(&self) -> bool {
        self.attributes().contains(Attributes::IS_BLOCK_START)
    }

    pub fn is_block_end(&self) -> bool {
        self.attributes().contains(Attributes::IS_BLOCK_END)
    }

    pub fn is_jump(&self) -> bool {
        self.attributes().contains(Attributes::IS_JUMP)
    }

    pub fn is_guarded(&self) -> bool {
        self.attributes().contains(Attributes::IS_GUARDED)
    }

    /// The kind of block this operation opens, closes or continues
    pub fn block_kind(&self) -> Option<BlockKind> {
        use Operation::*;
        match self {
            BeginPlainFunction { .. } | EndPlainFunction => Some(BlockKind::PlainFunction),
            BeginIf | BeginElse | EndIf => Some(BlockKind::If),
            BeginRepeatLoop { .. } | EndRepeatLoop => Some(BlockKind::RepeatLoop),
            BeginTry | BeginCatch | EndTryCatch => Some(BlockKind::TryCatch),
            BeginWasmModule | EndWasmModule => Some(BlockKind::WasmModule),
            BeginWasmFunction { .. } | EndWasmFunction { .. } => Some(BlockKind::WasmFunction),
            WasmBeginBlock | WasmEndBlock => Some(BlockKind::WasmBlock),
            WasmBeginLoop | WasmEndLoop => Some(BlockKind::WasmLoop),
            WasmBeginIf | WasmBeginElse | WasmEndIf => Some(BlockKind::WasmIf),
            _ => None,
        }
    }

    /// Context the current position must provide for this operation
    pub fn required_context(&self) -> Context {
        use Operation::*;
        match self {
            Return { .. } => Context::SUBROUTINE,
            LoopBreak | LoopContinue => Context::LOOP,
            // Intermediate and closing block markers are checked against their opener
            BeginElse | EndIf | EndRepeatLoop | EndPlainFunction | BeginCatch | EndTryCatch => {
                Context::EMPTY
            }
            EndWasmModule => Context::WASM_MODULE,
            WasmDefineGlobal { .. } | WasmImportGlobal | WasmDefineTable { .. } | WasmImportTable
            | WasmDefineMemory { .. } | WasmImportMemory | WasmImportFunction { .. }
            | BeginWasmFunction { .. } => Context::WASM_MODULE,
            EndWasmFunction { .. } | WasmConst { .. } | WasmIntBinary { .. } | WasmIntUnary { .. }
            | WasmIntEqz { .. } | WasmIntCompare { .. } | WasmFloatBinary { .. }
            | WasmFloatUnary { .. } | WasmFloatCompare { .. } | WasmLoadGlobal
            | WasmStoreGlobal | WasmTableGet | WasmTableSet | WasmMemoryLoad { .. }
            | WasmMemoryStore { .. } | WasmCallFunction { .. } | WasmReassign
            | WasmReturn { .. } | WasmBeginBlock | WasmEndBlock | WasmBeginLoop | WasmEndLoop
            | WasmBeginIf | WasmBeginElse | WasmEndIf | WasmBranch | WasmBranchIf
            | WasmUnreachable => Context::WASM_FUNCTION,
            _ => Context::JAVASCRIPT,
        }
    }

    /// Context inside the block this operation opens
    pub fn inner_context(&self, outer: Context) -> Context {
        use Operation::*;
        match self {
            BeginPlainFunction { .. } => Context::JAVASCRIPT | Context::SUBROUTINE,
            BeginRepeatLoop { .. } => outer | Context::LOOP,
            BeginWasmModule => Context::WASM_MODULE,
            BeginWasmFunction { .. } | WasmBeginBlock | WasmBeginLoop | WasmBeginIf
            | WasmBeginElse => Context::WASM_FUNCTION,
            _ => outer,
        }
    }

    pub fn name(&self) -> &'static str {
        use Operation::*;
        match self {
            LoadInteger { .. } => "LoadInteger",
            LoadBigInt { .. } => "LoadBigInt",
            LoadFloat { .. } => "LoadFloat",
            LoadString { .. } => "LoadString",
            LoadBoolean { .. } => "LoadBoolean",
            LoadUndefined => "LoadUndefined",
            LoadNull => "LoadNull",
            LoadRegExp { .. } => "LoadRegExp",
            LoadBuiltin { .. } => "LoadBuiltin",
            CreateObject { .. } => "CreateObject",
            CreateArray { .. } => "CreateArray",
            GetProperty { .. } => "GetProperty",
            SetProperty { .. } => "SetProperty",
            DeleteProperty { .. } => "DeleteProperty",
            GetElement { .. } => "GetElement",
            SetElement { .. } => "SetElement",
            GetComputedProperty => "GetComputedProperty",
            SetComputedProperty => "SetComputedProperty",
            CallFunction { .. } => "CallFunction",
            CallMethod { .. } => "CallMethod",
            Construct { .. } => "Construct",
            BinaryOperation { .. } => "BinaryOperation",
            UnaryOperation { .. } => "UnaryOperation",
            Compare { .. } => "Compare",
            Reassign => "Reassign",
            BeginPlainFunction { .. } => "BeginPlainFunction",
            EndPlainFunction => "EndPlainFunction",
            Return { .. } => "Return",
            BeginIf => "BeginIf",
            BeginElse => "BeginElse",
            EndIf => "EndIf",
            BeginRepeatLoop { .. } => "BeginRepeatLoop",
            EndRepeatLoop => "EndRepeatLoop",
            LoopBreak => "LoopBreak",
            LoopContinue => "LoopContinue",
            BeginTry => "BeginTry",
            BeginCatch => "BeginCatch",
            EndTryCatch => "EndTryCatch",
            ThrowException => "ThrowException",
            CreateWasmGlobal { .. } => "CreateWasmGlobal",
            CreateWasmMemory { .. } => "CreateWasmMemory",
            CreateWasmTable { .. } => "CreateWasmTable",
            BeginWasmModule => "BeginWasmModule",
            EndWasmModule => "EndWasmModule",
            InstantiateWasm { .. } => "InstantiateWasm",
            GetWasmExport { .. } => "GetWasmExport",
            GetWasmMemory { .. } => "GetWasmMemory",
            WriteWasmMemory { .. } => "WriteWasmMemory",
            GetWasmGlobal { .. } => "GetWasmGlobal",
            WasmDefineGlobal { .. } => "WasmDefineGlobal",
            WasmImportGlobal => "WasmImportGlobal",
            WasmDefineTable { .. } => "WasmDefineTable",
            WasmImportTable => "WasmImportTable",
            WasmDefineMemory { .. } => "WasmDefineMemory",
            WasmImportMemory => "WasmImportMemory",
            WasmImportFunction { .. } => "WasmImportFunction",
            BeginWasmFunction { .. } => "BeginWasmFunction",
            EndWasmFunction { .. } => "EndWasmFunction",
            WasmConst { .. } => "WasmConst",
            WasmIntBinary { .. } => "WasmIntBinary",
            WasmIntUnary { .. } => "WasmIntUnary",
            WasmIntEqz { .. } => "WasmIntEqz",
            WasmIntCompare { .. } => "WasmIntCompare",
            WasmFloatBinary { .. } => "WasmFloatBinary",
            WasmFloatUnary { .. } => "WasmFloatUnary",
            WasmFloatCompare { .. } => "WasmFloatCompare",
            WasmLoadGlobal => "WasmLoadGlobal",
            WasmStoreGlobal => "WasmStoreGlobal",
            WasmTableGet => "WasmTableGet",
            WasmTableSet => "WasmTableSet",
            WasmMemoryLoad { .. } => "WasmMemoryLoad",
            WasmMemoryStore { .. } => "WasmMemoryStore",
            WasmCallFunction { .. } => "WasmCallFunction",
            WasmReassign => "WasmReassign",
            WasmReturn { .. } => "WasmReturn",
            WasmBeginBlock => "WasmBeginBlock",
            WasmEndBlock => "WasmEndBlock",
            WasmBeginLoop => "WasmBeginLoop",
            WasmEndLoop => "WasmEndLoop",
            WasmBeginIf => "WasmBeginIf",
            WasmBeginElse => "WasmBeginElse",
            WasmEndIf => "WasmEndIf",
            WasmBranch => "WasmBranch",
            WasmBranchIf => "WasmBranchIf",
            WasmUnreachable => "WasmUnreachable",
        }
    }

    /// True for the operations that deal with WebAssembly from JavaScript code
    pub fn is_js_wasm_access(&self) -> bool {
        matches!(
            self,
            Operation::InstantiateWasm { .. }
                | Operation::GetWasmExport { .. }
                | Operation::GetWasmMemory { .. }
                | Operation::WriteWasmMemory { .. }
                | Operation::GetWasmGlobal { .. }
        )
    }
}

/// Payload rendering used by the textual IR form
impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Operation::*;
        let name = self.name();
        match self {
            LoadInteger { value } | LoadBigInt { value } => write!(f, "{} '{}'", name, value),
            LoadFloat { value } => write!(f, "{} '{}'", name, value),
            LoadString { value } => write!(f, "{} {:?}", name, value),
            LoadBoolean { value } => write!(f, "{} '{}'", name, value),
            LoadRegExp { pattern, flags } => write!(f, "{} '/{}/{}'", name, pattern, flags),
            LoadBuiltin { name: builtin } => write!(f, "{} '{}'", name, builtin),
            CreateObject { property_names } => write!(f, "{} [{}]", name, property_names.join(", ")),
            GetProperty { name: prop } | SetProperty { name: prop } | DeleteProperty { name: prop } => {
                write!(f, "{} '{}'", name, prop)
            }
            GetElement { index } | SetElement { index } => write!(f, "{} '{}'", name, index),
            CallFunction { guarded: true, .. } | Construct { guarded: true, .. } => {
                write!(f, "{} (guarded)", name)
            }
            CallMethod { method, guarded, .. } => {
                write!(f, "{} '{}'{}", name, method, if *guarded { " (guarded)" } else { "" })
            }
            BinaryOperation { op } => write!(f, "{} '{}'", name, op.token()),
            UnaryOperation { op } => write!(f, "{} '{}'", name, op.token()),
            Compare { op } => write!(f, "{} '{}'", name, op.token()),
            BeginRepeatLoop { iterations } => write!(f, "{} '{}'", name, iterations),
            CreateWasmGlobal { value, mutable } | WasmDefineGlobal { value, mutable } => {
                write!(f, "{} {}{}", name, value, if *mutable { " mutable" } else { "" })
            }
            CreateWasmMemory { minimum, maximum, shared } => write!(
                f,
                "{} [{}, {:?}]{}",
                name,
                minimum,
                maximum,
                if *shared { " shared" } else { "" }
            ),
            CreateWasmTable { element, minimum, maximum }
            | WasmDefineTable { element, minimum, maximum } => {
                write!(f, "{} {} [{}, {:?}]", name, element, minimum, maximum)
            }
            WasmDefineMemory { minimum, maximum } => write!(f, "{} [{}, {:?}]", name, minimum, maximum),
            GetWasmExport { export_name } => write!(f, "{} '{}'", name, export_name),
            GetWasmMemory { memory_index } => write!(f, "{} '{}'", name, memory_index),
            WriteWasmMemory { offset, bytes } => write!(f, "{} +{} {:?}", name, offset, bytes),
            GetWasmGlobal { global_name } => write!(f, "{} '{}'", name, global_name),
            WasmImportFunction { signature }
            | BeginWasmFunction { signature }
            | EndWasmFunction { signature }
            | WasmCallFunction { signature } => write!(f, "{} {}", name, signature),
            WasmConst { value } => write!(f, "{} {}", name, value),
            WasmIntBinary { width, op } => write!(f, "{} {:?} {:?}", name, width, op),
            WasmIntUnary { width, op } => write!(f, "{} {:?} {:?}", name, width, op),
            WasmIntEqz { width } => write!(f, "{} {:?}", name, width),
            WasmIntCompare { width, op } => write!(f, "{} {:?} {:?}", name, width, op),
            WasmFloatBinary { width, op } => write!(f, "{} {:?} {:?}", name, width, op),
            WasmFloatUnary { width, op } => write!(f, "{} {:?} {:?}", name, width, op),
            WasmFloatCompare { width, op } => write!(f, "{} {:?} {:?}", name, width, op),
            WasmMemoryLoad { ty, offset } | WasmMemoryStore { ty, offset } => {
                write!(f, "{} {} +{}", name, ty, offset)
            }
            _ => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_arity() {
        let call = Operation::CallFunction { num_args: 3, guarded: false };
        assert_eq!(call.num_inputs(), 4);
        assert_eq!(call.num_outputs(), 1);

        let sig = WasmSignature::new(vec![WasmValueType::I32, WasmValueType::I64], vec![WasmValueType::I32]);
        let begin = Operation::BeginWasmFunction { signature: sig.clone() };
        assert_eq!(begin.num_inner_outputs(), 2);
        assert_eq!(Operation::EndWasmFunction { signature: sig.clone() }.num_inputs(), 1);
        assert_eq!(Operation::WasmCallFunction { signature: sig }.num_inputs(), 3);

        assert_eq!(Operation::InstantiateWasm { num_imports: 2 }.num_inputs(), 3);
        assert_eq!(Operation::EndWasmModule.num_outputs(), 2);
    }

    #[test]
    fn test_jumps_and_blocks() {
        assert!(Operation::WasmBranch.is_jump());
        assert!(!Operation::WasmBranchIf.is_jump());
        assert!(Operation::BeginElse.is_block_start());
        assert!(Operation::BeginElse.is_block_end());
        assert_eq!(Operation::WasmBeginElse.block_kind(), Some(BlockKind::WasmIf));
    }

    #[test]
    fn test_contexts() {
        let loop_ctx = Operation::BeginRepeatLoop { iterations: 10 }.inner_context(Context::JAVASCRIPT);
        assert!(loop_ctx.contains(Context::LOOP));
        assert!(loop_ctx.contains(Operation::LoopBreak.required_context()));

        let fn_ctx = Operation::BeginPlainFunction { num_parameters: 0 }.inner_context(loop_ctx);
        assert!(!fn_ctx.contains(Context::LOOP));
        assert!(fn_ctx.contains(Context::SUBROUTINE));

        let module_ctx = Operation::BeginWasmModule.inner_context(Context::JAVASCRIPT);
        assert!(!module_ctx.is_javascript());
        assert!(module_ctx.contains(Operation::WasmImportGlobal.required_context()));
    }

    #[test]
    fn test_instantiate_attributes() {
        let attrs = Operation::InstantiateWasm { num_imports: 0 }.attributes();
        assert!(!attrs.contains(Attributes::PURE));
        assert!(attrs.contains(Attributes::IS_CALL));
        assert!(attrs.contains(Attributes::IS_GUARDED));
    }
}
