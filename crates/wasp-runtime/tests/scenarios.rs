//! End-to-end scenarios: build a program, encode its module, run it.

use std::sync::Arc;
use wasp_core::{ExecutionOutcome, FuzzConfig, LiftingOptions, RuntimeConfig, TrapKind, WasmValue};
use wasp_gen::{FuzzContext, ProgramBuilder};
use wasp_ir::{
    IntBinaryOp, NumWidth, Program, Variable, WasmLiteral, WasmSignature, WasmValueType,
};
use wasp_lift::JavaScriptLifter;
use wasp_runtime::Runtime;

fn builder() -> ProgramBuilder {
    ProgramBuilder::new(Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap()), 42)
}

fn runtime() -> Runtime {
    Runtime::new(RuntimeConfig::default()).unwrap()
}

/// A program with one module exporting one function `() -> result`
fn single_function(result: WasmValueType, body: impl FnOnce(&mut ProgramBuilder) -> Variable) -> Program {
    let mut b = builder();
    b.build_wasm_module(|b| {
        b.build_wasm_function(WasmSignature::new(vec![], vec![result]), |b, _| Some(body(b)));
    });
    b.finalize().unwrap()
}

fn run_single(program: &Program) -> ExecutionOutcome {
    let mut instance = runtime().instantiate(program, 0).unwrap();
    instance.invoke("function0", &[]).unwrap()
}

#[test]
fn test_constant_function_returns_42() {
    let program = single_function(WasmValueType::I32, |b| b.wasm_const(WasmLiteral::I32(42)));
    let instance = runtime().instantiate(&program, 0).unwrap();
    let exports = instance.function_exports();
    assert_eq!(exports.len(), 1);
    assert_eq!(exports[0].0, "function0");

    assert_eq!(run_single(&program).to_js_string(), "42");
}

#[test]
fn test_i64_arithmetic() {
    let program = single_function(WasmValueType::I64, |b| {
        let one = b.wasm_const(WasmLiteral::I64(1));
        b.wasm_int_binary(NumWidth::Bits64, IntBinaryOp::Add, one, one)
    });
    assert_eq!(run_single(&program).to_js_string(), "2");

    let program = single_function(WasmValueType::I64, |b| {
        let value = b.wasm_const(WasmLiteral::I64(-3));
        let shift = b.wasm_const(WasmLiteral::I64(1));
        b.wasm_int_binary(NumWidth::Bits64, IntBinaryOp::ShrU, value, shift)
    });
    assert_eq!(run_single(&program).to_js_string(), "9223372036854775806");
}

#[test]
fn test_division_by_zero_traps_at_both_widths() {
    for (width, zero, one) in [
        (NumWidth::Bits32, WasmLiteral::I32(0), WasmLiteral::I32(1)),
        (NumWidth::Bits64, WasmLiteral::I64(0), WasmLiteral::I64(1)),
    ] {
        for op in [IntBinaryOp::DivS, IntBinaryOp::DivU, IntBinaryOp::RemS, IntBinaryOp::RemU] {
            let program = single_function(width.int_type(), |b| {
                let lhs = b.wasm_const(one);
                let rhs = b.wasm_const(zero);
                b.wasm_int_binary(width, op, lhs, rhs)
            });
            assert_eq!(
                run_single(&program),
                ExecutionOutcome::Trapped(TrapKind::IntegerDivisionByZero)
            );
        }
    }
}

#[test]
fn test_signed_overflow_traps() {
    let program = single_function(WasmValueType::I32, |b| {
        let min = b.wasm_const(WasmLiteral::I32(i32::MIN));
        let minus_one = b.wasm_const(WasmLiteral::I32(-1));
        b.wasm_int_binary(NumWidth::Bits32, IntBinaryOp::DivS, min, minus_one)
    });
    assert_eq!(run_single(&program), ExecutionOutcome::Trapped(TrapKind::IntegerOverflow));
}

#[test]
fn test_imported_global_comes_first() {
    let mut b = builder();
    let global = b.create_wasm_global(WasmLiteral::I32(7), false);
    b.build_wasm_module(|b| {
        b.wasm_import_global(global);
        b.wasm_define_global(WasmLiteral::I64(9), false);
    });
    let program = b.finalize().unwrap();

    let mut instance = runtime().instantiate(&program, 0).unwrap();
    let names: Vec<&str> = instance.signature().exports.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["global0", "global1"]);
    assert_eq!(instance.global_value("global0").unwrap(), WasmValue::I32(7));
    assert_eq!(instance.global_value("global1").unwrap(), WasmValue::I64(9));
}

#[test]
fn test_endless_loop_runs_out_of_fuel() {
    let mut b = builder();
    b.build_wasm_module(|b| {
        b.build_wasm_function(WasmSignature::new(vec![], vec![]), |b, _| {
            b.wasm_build_loop(|b, label| b.wasm_branch(label));
            None
        });
    });
    let program = b.finalize().unwrap();
    assert_eq!(run_single(&program), ExecutionOutcome::Trapped(TrapKind::OutOfFuel));
}

#[test]
fn test_counted_loop_terminates() {
    let program = single_function(WasmValueType::I32, |b| {
        let total = b.wasm_const(WasmLiteral::I32(0));
        b.wasm_build_counted_loop(|b| {
            let step = b.wasm_const(WasmLiteral::I32(3));
            let next = b.wasm_int_binary(NumWidth::Bits32, IntBinaryOp::Add, total, step);
            b.wasm_reassign(total, next);
        });
        total
    });
    assert_eq!(run_single(&program).to_js_string(), "30");
}

#[test]
fn test_function_imports_are_stubbed() {
    let mut b = builder();
    let js_function = b.build_plain_function(0, |_, _| {});
    let signature = WasmSignature::new(vec![], vec![WasmValueType::I32]);
    b.build_wasm_module(|b| {
        let imported = b.wasm_import_function(js_function, signature.clone());
        b.build_wasm_function(signature.clone(), |b, _| b.wasm_call_function(imported, vec![]).first().copied());
    });
    let program = b.finalize().unwrap();

    let mut instance = runtime().instantiate(&program, 0).unwrap();
    let outcome = instance.invoke("function1", &[]).unwrap();
    assert_eq!(outcome.to_js_string(), "0");
    assert_eq!(instance.host_calls(), vec!["import0".to_string()]);
}

#[test]
fn test_imported_memory_is_shared_with_the_module() {
    let mut b = builder();
    let memory = b.create_wasm_memory(1, Some(1), false);
    b.build_wasm_module(|b| {
        let memory = b.wasm_import_memory(memory);
        b.build_wasm_function(WasmSignature::new(vec![], vec![WasmValueType::I32]), |b, _| {
            let address = b.wasm_const(WasmLiteral::I32(8));
            let value = b.wasm_const(WasmLiteral::I32(1234));
            b.wasm_memory_store(memory, address, value, WasmValueType::I32, 4);
            Some(b.wasm_memory_load(memory, address, WasmValueType::I32, 4))
        });
    });
    let program = b.finalize().unwrap();
    assert_eq!(run_single(&program).to_js_string(), "1234");
}

#[test]
fn test_out_of_bounds_load_traps() {
    let mut b = builder();
    b.build_wasm_module(|b| {
        let memory = b.wasm_define_memory(1, Some(1));
        b.build_wasm_function(WasmSignature::new(vec![], vec![WasmValueType::I64]), |b, _| {
            let address = b.wasm_const(WasmLiteral::I32(65_535));
            Some(b.wasm_memory_load(memory, address, WasmValueType::I64, 0))
        });
    });
    let program = b.finalize().unwrap();
    assert_eq!(run_single(&program), ExecutionOutcome::Trapped(TrapKind::MemoryOutOfBounds));
}

#[test]
fn test_branch_out_of_nested_blocks() {
    let program = single_function(WasmValueType::I32, |b| {
        let result = b.wasm_const(WasmLiteral::I32(1));
        b.wasm_build_block(|b, outer| {
            b.wasm_build_block(|b, _inner| {
                b.wasm_branch(outer);
            });
            let two = b.wasm_const(WasmLiteral::I32(2));
            b.wasm_reassign(result, two);
        });
        result
    });
    assert_eq!(run_single(&program).to_js_string(), "1");
}

#[test]
fn test_serialized_program_behaves_identically() {
    let program = single_function(WasmValueType::I32, |b| {
        let x = b.wasm_const(WasmLiteral::I32(-5));
        let y = b.wasm_const(WasmLiteral::I32(3));
        b.wasm_int_binary(NumWidth::Bits32, IntBinaryOp::RemS, x, y)
    });
    let restored = Program::from_bytes(&program.to_bytes().unwrap()).unwrap();

    let lifter = JavaScriptLifter::new(LiftingOptions::default());
    assert_eq!(lifter.lift(&restored).unwrap(), lifter.lift(&program).unwrap());
    assert_eq!(run_single(&restored), run_single(&program));
    assert_eq!(run_single(&program).to_js_string(), "-2");
}

#[test]
fn test_generated_programs_run_deterministically() {
    let runtime = runtime();
    for seed in 0..10 {
        let mut b = ProgramBuilder::new(Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap()), seed);
        b.build_prefix();
        b.build_random_wasm_module();
        let Ok(program) = b.finalize() else {
            continue;
        };
        let first = runtime.execute_program(&program);
        let second = runtime.execute_program(&program);
        match (first, second) {
            (Ok(a), Ok(b)) => assert_eq!(a, b),
            (Err(_), Err(_)) => {}
            (a, b) => panic!("runs disagree: {:?} vs {:?}", a.is_ok(), b.is_ok()),
        }
    }
}
