//! Changes of operation payloads: literals, operators and names.
//!
//! A replacement operation keeps the input and output arity of the original
//! and is only used when the typer assigns its outputs the same types.

use super::Mutator;
use crate::builder::ProgramBuilder;
use rand::seq::SliceRandom;
use rand::Rng;
use wasp_ir::{
    BinaryOperator, Comparator, DeadCodeAnalyzer, FloatBinaryOp, FloatCompareOp, FloatUnaryOp, ILType,
    Instruction, IntBinaryOp, IntCompareOp, IntUnaryOp, Operation, Program, UnaryOperator, Variable,
};

const LOOP_ITERATIONS: [u32; 6] = [1, 2, 5, 10, 25, 100];
const MAX_MEMORY_OFFSET: u64 = 16;

pub struct OperationMutator {
    analyzer: DeadCodeAnalyzer,
}

impl OperationMutator {
    pub fn new() -> Self {
        Self {
            analyzer: DeadCodeAnalyzer::new(),
        }
    }

    fn has_payload(operation: &Operation) -> bool {
        use Operation::*;
        matches!(
            operation,
            LoadInteger { .. }
                | LoadBigInt { .. }
                | LoadFloat { .. }
                | LoadString { .. }
                | LoadBoolean { .. }
                | LoadRegExp { .. }
                | LoadBuiltin { .. }
                | CreateObject { .. }
                | GetProperty { .. }
                | SetProperty { .. }
                | DeleteProperty { .. }
                | GetElement { .. }
                | SetElement { .. }
                | CallFunction { .. }
                | CallMethod { .. }
                | BinaryOperation { .. }
                | UnaryOperation { .. }
                | Compare { .. }
                | BeginRepeatLoop { .. }
                | CreateWasmGlobal { .. }
                | WasmDefineGlobal { .. }
                | WasmConst { .. }
                | WasmIntBinary { .. }
                | WasmIntUnary { .. }
                | WasmIntCompare { .. }
                | WasmFloatBinary { .. }
                | WasmFloatUnary { .. }
                | WasmFloatCompare { .. }
                | WasmMemoryLoad { .. }
                | WasmMemoryStore { .. }
        )
    }

    /// A variant of `operation` with a new payload, `None` when there is nothing to change
    fn mutated(operation: &Operation, inputs: &[Variable], b: &mut ProgramBuilder) -> Option<Operation> {
        use Operation::*;
        let mutated = match operation {
            LoadInteger { .. } => LoadInteger { value: b.random_integer() },
            LoadBigInt { .. } => LoadBigInt { value: b.random_integer() },
            LoadFloat { .. } => LoadFloat { value: b.random_float() },
            LoadString { .. } => LoadString { value: b.random_string() },
            LoadBoolean { value } => LoadBoolean { value: !value },
            LoadRegExp { pattern, flags } => {
                let env = b.fuzz_context().environment.clone();
                if b.rng().gen_bool(0.5) {
                    let pattern = env.regexp_patterns.choose(b.rng()).cloned()?;
                    LoadRegExp { pattern, flags: flags.clone() }
                } else {
                    let flags = env.regexp_flags.choose(b.rng()).cloned()?;
                    LoadRegExp { pattern: pattern.clone(), flags }
                }
            }
            LoadBuiltin { .. } => LoadBuiltin { name: b.random_builtin() },
            CreateObject { property_names } => {
                let replacement = b.random_property_name();
                if property_names.is_empty() || property_names.contains(&replacement) {
                    return None;
                }
                let mut property_names = property_names.clone();
                let slot = b.rng().gen_range(0..property_names.len());
                property_names[slot] = replacement;
                CreateObject { property_names }
            }
            GetProperty { .. } => GetProperty { name: b.random_property_name() },
            SetProperty { .. } => SetProperty { name: b.random_property_name() },
            DeleteProperty { .. } => DeleteProperty { name: b.random_property_name() },
            GetElement { .. } => GetElement { index: random_index(b) },
            SetElement { .. } => SetElement { index: random_index(b) },
            CallFunction { num_args, guarded } => CallFunction {
                num_args: *num_args,
                guarded: !guarded,
            },
            CallMethod { num_args, guarded, .. } => {
                let object = *inputs.first()?;
                CallMethod {
                    method: b.random_method_name(object),
                    num_args: *num_args,
                    guarded: *guarded,
                }
            }
            BinaryOperation { .. } => {
                let op = *BinaryOperator::ALL.choose(b.rng())?;
                let bigint = inputs.iter().any(|v| b.type_of(*v) == ILType::BigInt);
                if bigint && op == BinaryOperator::UnRShift {
                    return None;
                }
                BinaryOperation { op }
            }
            UnaryOperation { .. } => {
                let op = *UnaryOperator::ALL.choose(b.rng())?;
                let bigint = inputs.iter().any(|v| b.type_of(*v) == ILType::BigInt);
                if bigint && op == UnaryOperator::Plus {
                    return None;
                }
                UnaryOperation { op }
            }
            Compare { .. } => Compare {
                op: *Comparator::ALL.choose(b.rng())?,
            },
            BeginRepeatLoop { .. } => BeginRepeatLoop {
                iterations: *LOOP_ITERATIONS.choose(b.rng())?,
            },
            CreateWasmGlobal { value, mutable } => CreateWasmGlobal {
                value: b.random_wasm_literal(value.value_type()),
                mutable: *mutable,
            },
            WasmDefineGlobal { value, mutable } => WasmDefineGlobal {
                value: b.random_wasm_literal(value.value_type()),
                mutable: *mutable,
            },
            WasmConst { value } => WasmConst {
                value: b.random_wasm_literal(value.value_type()),
            },
            WasmIntBinary { width, .. } => WasmIntBinary {
                width: *width,
                op: *IntBinaryOp::ALL.choose(b.rng())?,
            },
            WasmIntUnary { width, .. } => WasmIntUnary {
                width: *width,
                op: *IntUnaryOp::ALL.choose(b.rng())?,
            },
            WasmIntCompare { width, .. } => WasmIntCompare {
                width: *width,
                op: *IntCompareOp::ALL.choose(b.rng())?,
            },
            WasmFloatBinary { width, .. } => WasmFloatBinary {
                width: *width,
                op: *FloatBinaryOp::ALL.choose(b.rng())?,
            },
            WasmFloatUnary { width, .. } => WasmFloatUnary {
                width: *width,
                op: *FloatUnaryOp::ALL.choose(b.rng())?,
            },
            WasmFloatCompare { width, .. } => WasmFloatCompare {
                width: *width,
                op: *FloatCompareOp::ALL.choose(b.rng())?,
            },
            WasmMemoryLoad { ty, .. } => WasmMemoryLoad {
                ty: *ty,
                offset: b.rng().gen_range(0..=MAX_MEMORY_OFFSET),
            },
            WasmMemoryStore { ty, .. } => WasmMemoryStore {
                ty: *ty,
                offset: b.rng().gen_range(0..=MAX_MEMORY_OFFSET),
            },
            // Payloads that shape arity, entity types or control flow stay as they are
            LoadUndefined | LoadNull | CreateArray { .. } | GetComputedProperty | SetComputedProperty
            | Construct { .. } | Reassign | BeginPlainFunction { .. } | EndPlainFunction | Return { .. }
            | BeginIf | BeginElse | EndIf | EndRepeatLoop | LoopBreak | LoopContinue | BeginTry
            | BeginCatch | EndTryCatch | ThrowException | CreateWasmMemory { .. }
            | CreateWasmTable { .. } | BeginWasmModule | EndWasmModule | InstantiateWasm { .. }
            | GetWasmExport { .. } | GetWasmMemory { .. } | WriteWasmMemory { .. }
            | GetWasmGlobal { .. } | WasmImportGlobal | WasmDefineTable { .. } | WasmImportTable
            | WasmDefineMemory { .. } | WasmImportMemory | WasmImportFunction { .. }
            | BeginWasmFunction { .. } | EndWasmFunction { .. } | WasmIntEqz { .. } | WasmLoadGlobal
            | WasmStoreGlobal | WasmTableGet | WasmTableSet | WasmCallFunction { .. } | WasmReassign
            | WasmReturn { .. } | WasmBeginBlock | WasmEndBlock | WasmBeginLoop | WasmEndLoop
            | WasmBeginIf | WasmBeginElse | WasmEndIf | WasmBranch | WasmBranchIf
            | WasmUnreachable => return None,
        };
        Some(mutated)
    }
}

fn random_index(b: &mut ProgramBuilder) -> i64 {
    if b.rng().gen_bool(0.8) {
        b.rng().gen_range(0..16)
    } else {
        b.random_integer()
    }
}

impl Default for OperationMutator {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutator for OperationMutator {
    fn name(&self) -> &'static str {
        "OperationMutator"
    }

    fn begin_mutation(&mut self, _program: &Program) {
        self.analyzer.reset();
    }

    fn can_mutate(&mut self, inst: &Instruction) -> bool {
        self.analyzer.analyze(inst);
        !self.analyzer.is_currently_dead() && Self::has_payload(&inst.operation)
    }

    fn mutate(&mut self, inst: &Instruction, b: &mut ProgramBuilder) {
        let inputs = b.adopted_inputs(inst);
        let replacement = Self::mutated(&inst.operation, &inputs, b).filter(|operation| {
            b.infer_output_types(operation, &inputs) == b.infer_output_types(&inst.operation, &inputs)
        });
        match replacement {
            Some(operation) => b.adopt_as(inst, operation, inputs),
            None => b.adopt_as(inst, inst.operation.clone(), inputs),
        }
    }
}
