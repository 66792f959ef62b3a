//! Generators for Wasm function bodies.

use crate::builder::ProgramBuilder;
use crate::generator::{CodeGenerator, InputContract};
use rand::seq::SliceRandom;
use rand::Rng;
use wasp_ir::{
    Context, EntityType, FloatBinaryOp, FloatCompareOp, FloatUnaryOp, ILType, IntBinaryOp,
    IntCompareOp, IntUnaryOp, NumWidth, Variable, WasmLiteral, WasmValueType,
};

const PAGE_SIZE: u64 = 65536;

pub fn generators() -> Vec<(CodeGenerator, u32)> {
    let function = Context::WASM_FUNCTION;
    let label = InputContract::Required(ILType::is_label);
    vec![
        (CodeGenerator::new("WasmConstGenerator", function, constant), 10),
        (CodeGenerator::new("WasmIntBinaryGenerator", function, int_binary), 20),
        (CodeGenerator::new("WasmIntUnaryGenerator", function, int_unary), 5),
        (CodeGenerator::new("WasmIntEqzGenerator", function, int_eqz), 3),
        (CodeGenerator::new("WasmIntCompareGenerator", function, int_compare), 8),
        (CodeGenerator::new("WasmFloatBinaryGenerator", function, float_binary), 10),
        (CodeGenerator::new("WasmFloatUnaryGenerator", function, float_unary), 5),
        (CodeGenerator::new("WasmFloatCompareGenerator", function, float_compare), 5),
        (
            CodeGenerator::new("WasmGlobalLoadGenerator", function, global_load)
                .with_input(InputContract::Required(is_global)),
            8,
        ),
        (
            CodeGenerator::new("WasmGlobalStoreGenerator", function, global_store)
                .with_input(InputContract::Required(is_mutable_global)),
            8,
        ),
        (
            CodeGenerator::new("WasmTableGetGenerator", function, table_get)
                .with_input(InputContract::Required(is_table)),
            3,
        ),
        (
            CodeGenerator::new("WasmTableSetGenerator", function, table_set)
                .with_input(InputContract::Required(is_table)),
            3,
        ),
        (
            CodeGenerator::new("WasmMemoryLoadGenerator", function, memory_load)
                .with_input(InputContract::Required(is_memory)),
            10,
        ),
        (
            CodeGenerator::new("WasmMemoryStoreGenerator", function, memory_store)
                .with_input(InputContract::Required(is_memory)),
            10,
        ),
        (
            CodeGenerator::new("WasmCallGenerator", function, call)
                .with_input(InputContract::Required(is_function)),
            10,
        ),
        (
            CodeGenerator::new("WasmReassignGenerator", function, reassign)
                .with_input(InputContract::Required(ILType::is_any_wasm_value)),
            5,
        ),
        (CodeGenerator::new("WasmBlockGenerator", function, block).recursive(), 5),
        (CodeGenerator::new("WasmLoopGenerator", function, counted_loop).recursive(), 5),
        (CodeGenerator::new("WasmIfGenerator", function, if_else).recursive(), 5),
        (CodeGenerator::new("WasmBranchGenerator", function, branch).with_input(label), 2),
        (CodeGenerator::new("WasmBranchIfGenerator", function, branch_if).with_input(label), 3),
        (CodeGenerator::new("WasmReturnGenerator", function, return_value), 2),
        (CodeGenerator::new("WasmUnreachableGenerator", function, unreachable), 1),
    ]
}

fn is_global(ty: &ILType) -> bool {
    matches!(ty, ILType::WasmEntity(EntityType::Global { .. }))
}

fn is_mutable_global(ty: &ILType) -> bool {
    matches!(ty, ILType::WasmEntity(EntityType::Global { mutable: true, .. }))
}

fn is_table(ty: &ILType) -> bool {
    matches!(ty, ILType::WasmEntity(EntityType::Table { .. }))
}

fn is_memory(ty: &ILType) -> bool {
    matches!(ty, ILType::WasmEntity(EntityType::Memory { .. }))
}

fn is_function(ty: &ILType) -> bool {
    matches!(ty, ILType::WasmEntity(EntityType::Function(_)))
}

fn random_width(b: &mut ProgramBuilder) -> NumWidth {
    if b.rng().gen_bool(0.5) {
        NumWidth::Bits32
    } else {
        NumWidth::Bits64
    }
}

fn pick<T: Copy>(b: &mut ProgramBuilder, options: &[T], fallback: T) -> T {
    options.choose(b.rng()).copied().unwrap_or(fallback)
}

fn constant(b: &mut ProgramBuilder, _: &[Variable]) {
    let ty = b.random_numeric_type();
    let value = b.random_wasm_literal(ty);
    b.wasm_const(value);
}

fn int_binary(b: &mut ProgramBuilder, _: &[Variable]) {
    let width = random_width(b);
    let op = pick(b, &IntBinaryOp::ALL, IntBinaryOp::Add);
    let lhs = b.wasm_value_of(width.int_type());
    let rhs = b.wasm_value_of(width.int_type());
    b.wasm_int_binary(width, op, lhs, rhs);
}

fn int_unary(b: &mut ProgramBuilder, _: &[Variable]) {
    let width = random_width(b);
    let op = pick(b, &IntUnaryOp::ALL, IntUnaryOp::Clz);
    let input = b.wasm_value_of(width.int_type());
    b.wasm_int_unary(width, op, input);
}

fn int_eqz(b: &mut ProgramBuilder, _: &[Variable]) {
    let width = random_width(b);
    let input = b.wasm_value_of(width.int_type());
    b.wasm_int_eqz(width, input);
}

fn int_compare(b: &mut ProgramBuilder, _: &[Variable]) {
    let width = random_width(b);
    let op = pick(b, &IntCompareOp::ALL, IntCompareOp::Eq);
    let lhs = b.wasm_value_of(width.int_type());
    let rhs = b.wasm_value_of(width.int_type());
    b.wasm_int_compare(width, op, lhs, rhs);
}

fn float_binary(b: &mut ProgramBuilder, _: &[Variable]) {
    let width = random_width(b);
    let op = pick(b, &FloatBinaryOp::ALL, FloatBinaryOp::Add);
    let lhs = b.wasm_value_of(width.float_type());
    let rhs = b.wasm_value_of(width.float_type());
    b.wasm_float_binary(width, op, lhs, rhs);
}

fn float_unary(b: &mut ProgramBuilder, _: &[Variable]) {
    let width = random_width(b);
    let op = pick(b, &FloatUnaryOp::ALL, FloatUnaryOp::Neg);
    let input = b.wasm_value_of(width.float_type());
    b.wasm_float_unary(width, op, input);
}

fn float_compare(b: &mut ProgramBuilder, _: &[Variable]) {
    let width = random_width(b);
    let op = pick(b, &FloatCompareOp::ALL, FloatCompareOp::Eq);
    let lhs = b.wasm_value_of(width.float_type());
    let rhs = b.wasm_value_of(width.float_type());
    b.wasm_float_compare(width, op, lhs, rhs);
}

fn global_load(b: &mut ProgramBuilder, inputs: &[Variable]) {
    b.wasm_load_global(inputs[0]);
}

fn global_store(b: &mut ProgramBuilder, inputs: &[Variable]) {
    if let ILType::WasmEntity(EntityType::Global { ty, .. }) = b.type_of(inputs[0]) {
        let value = b.wasm_value_of(ty);
        b.wasm_store_global(inputs[0], value);
    }
}

/// An i32 index that is usually below `bound`
fn index_below(b: &mut ProgramBuilder, bound: u64) -> Variable {
    if b.rng().gen_bool(0.9) {
        let index = b.rng().gen_range(0..bound.max(1)).min(i32::MAX as u64) as i32;
        b.wasm_const(WasmLiteral::I32(index))
    } else {
        b.wasm_value_of(WasmValueType::I32)
    }
}

fn table_get(b: &mut ProgramBuilder, inputs: &[Variable]) {
    if let ILType::WasmEntity(EntityType::Table { minimum, .. }) = b.type_of(inputs[0]) {
        let index = index_below(b, minimum as u64);
        b.wasm_table_get(inputs[0], index);
    }
}

fn table_set(b: &mut ProgramBuilder, inputs: &[Variable]) {
    if let ILType::WasmEntity(EntityType::Table { element, minimum, .. }) = b.type_of(inputs[0]) {
        let index = index_below(b, minimum as u64);
        let value = b.wasm_value_of(element);
        b.wasm_table_set(inputs[0], index, value);
    }
}

/// Address and static offset for an access of `ty`, mostly within the initial pages
fn memory_operands(b: &mut ProgramBuilder, memory: Variable, ty: WasmValueType) -> (Variable, u64) {
    let pages = match b.type_of(memory) {
        ILType::WasmEntity(EntityType::Memory { minimum, .. }) => minimum as u64,
        _ => 0,
    };
    let offset = if b.rng().gen_bool(0.8) { 0 } else { b.rng().gen_range(0..=16) };
    let limit = (pages * PAGE_SIZE).saturating_sub(offset + ty.byte_width() as u64);
    let address = index_below(b, limit);
    (address, offset)
}

fn memory_load(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let ty = b.random_numeric_type();
    let (address, offset) = memory_operands(b, inputs[0], ty);
    b.wasm_memory_load(inputs[0], address, ty, offset);
}

fn memory_store(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let ty = b.random_numeric_type();
    let (address, offset) = memory_operands(b, inputs[0], ty);
    let value = b.wasm_value_of(ty);
    b.wasm_memory_store(inputs[0], address, value, ty, offset);
}

fn call(b: &mut ProgramBuilder, inputs: &[Variable]) {
    if let ILType::WasmEntity(EntityType::Function(signature)) = b.type_of(inputs[0]) {
        let args = signature.params.iter().map(|ty| b.wasm_value_of(*ty)).collect();
        b.wasm_call_function(inputs[0], args);
    }
}

fn reassign(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let target = inputs[0];
    let ty = b.type_of(target);
    if let Some(value) = b.random_variable_matching(|t| *t == ty) {
        if value != target {
            b.wasm_reassign(target, value);
        }
    }
}

fn block(b: &mut ProgramBuilder, _: &[Variable]) {
    b.wasm_build_block(|b, _| b.build_recursive());
}

fn counted_loop(b: &mut ProgramBuilder, _: &[Variable]) {
    b.wasm_build_counted_loop(|b| b.build_recursive());
}

fn if_else(b: &mut ProgramBuilder, _: &[Variable]) {
    let condition = b.wasm_value_of(WasmValueType::I32);
    if b.rng().gen_bool(0.5) {
        b.wasm_build_if_else(condition, |b, _| b.build_recursive(), |b, _| b.build_recursive());
    } else {
        b.wasm_build_if(condition, |b, _| b.build_recursive());
    }
}

fn branch(b: &mut ProgramBuilder, inputs: &[Variable]) {
    b.wasm_branch(inputs[0]);
}

fn branch_if(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let condition = b.wasm_value_of(WasmValueType::I32);
    b.wasm_branch_if(inputs[0], condition);
}

fn return_value(b: &mut ProgramBuilder, _: &[Variable]) {
    let result = b.scopes().current_wasm_function().and_then(|signature| signature.result());
    let value = result.map(|ty| b.wasm_value_of(ty));
    b.wasm_return(value);
}

fn unreachable(b: &mut ProgramBuilder, _: &[Variable]) {
    b.wasm_unreachable();
}
