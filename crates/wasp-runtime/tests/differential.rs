//! Differential check of the reference numeric model against wasmtime.

use proptest::prelude::*;
use std::sync::Arc;
use wasp_core::{ExecutionOutcome, FuzzConfig, RuntimeConfig, WasmValue};
use wasp_gen::{FuzzContext, ProgramBuilder};
use wasp_ir::{
    numeric, FloatBinaryOp, FloatUnaryOp, IntBinaryOp, IntCompareOp, IntUnaryOp, NumWidth, Program, Variable,
    WasmLiteral, WasmSignature, WasmValueType,
};
use wasp_runtime::Runtime;

fn program(result: WasmValueType, body: impl FnOnce(&mut ProgramBuilder) -> Variable) -> Program {
    let mut b = ProgramBuilder::new(Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap()), 0);
    b.build_wasm_module(|b| {
        b.build_wasm_function(WasmSignature::new(vec![], vec![result]), |b, _| Some(body(b)));
    });
    b.finalize().unwrap()
}

fn run(program: &Program) -> ExecutionOutcome {
    let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
    let mut instance = runtime.instantiate(program, 0).unwrap();
    instance.invoke("function0", &[]).unwrap()
}

fn int_literal(width: NumWidth, bits: u64) -> WasmLiteral {
    match width {
        NumWidth::Bits32 => WasmLiteral::I32(bits as u32 as i32),
        NumWidth::Bits64 => WasmLiteral::I64(bits as i64),
    }
}

fn int_value(width: NumWidth, bits: u64) -> WasmValue {
    match width {
        NumWidth::Bits32 => WasmValue::I32(bits as u32 as i32),
        NumWidth::Bits64 => WasmValue::I64(bits as i64),
    }
}

fn float_literal(width: NumWidth, value: f64) -> WasmLiteral {
    match width {
        NumWidth::Bits32 => WasmLiteral::F32(value as f32),
        NumWidth::Bits64 => WasmLiteral::F64(value),
    }
}

/// Equal results, where any NaN equals any other NaN
fn same_float(outcome: &ExecutionOutcome, width: NumWidth, expected: f64) -> bool {
    match (outcome, width) {
        (ExecutionOutcome::Returned(values), NumWidth::Bits32) => match values.as_slice() {
            [WasmValue::F32(bits)] => {
                let actual = f32::from_bits(*bits);
                let expected = expected as f32;
                (actual.is_nan() && expected.is_nan()) || actual.to_bits() == expected.to_bits()
            }
            _ => false,
        },
        (ExecutionOutcome::Returned(values), NumWidth::Bits64) => match values.as_slice() {
            [WasmValue::F64(bits)] => {
                let actual = f64::from_bits(*bits);
                (actual.is_nan() && expected.is_nan()) || actual.to_bits() == expected.to_bits()
            }
            _ => false,
        },
        _ => false,
    }
}

fn width() -> impl Strategy<Value = NumWidth> {
    prop_oneof![Just(NumWidth::Bits32), Just(NumWidth::Bits64)]
}

/// Edge values are far more interesting than uniformly random ones
fn int_bits() -> impl Strategy<Value = u64> {
    prop_oneof![
        prop::sample::select(vec![0u64, 1, 2, 31, 32, 63, 64, u64::MAX, 0x8000_0000, 0xffff_ffff, 1 << 63]),
        any::<u64>(),
    ]
}

fn float_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        prop::sample::select(vec![0.0, -0.0, 0.5, -1.5, 2.5, f64::INFINITY, f64::NEG_INFINITY, f64::NAN]),
        -1.0e6f64..1.0e6,
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_int_binary_matches(
        width in width(),
        op in prop::sample::select(IntBinaryOp::ALL.to_vec()),
        lhs in int_bits(),
        rhs in int_bits(),
    ) {
        let program = program(width.int_type(), |b| {
            let x = b.wasm_const(int_literal(width, lhs));
            let y = b.wasm_const(int_literal(width, rhs));
            b.wasm_int_binary(width, op, x, y)
        });
        let expected = match numeric::int_binary(width, op, lhs, rhs) {
            Ok(bits) => ExecutionOutcome::Returned(vec![int_value(width, bits)]),
            Err(trap) => ExecutionOutcome::Trapped(trap),
        };
        prop_assert_eq!(run(&program), expected);
    }

    #[test]
    fn prop_int_unary_matches(
        width in width(),
        op in prop::sample::select(IntUnaryOp::ALL.to_vec()),
        value in int_bits(),
    ) {
        let program = program(width.int_type(), |b| {
            let x = b.wasm_const(int_literal(width, value));
            b.wasm_int_unary(width, op, x)
        });
        let expected = int_value(width, numeric::int_unary(width, op, value));
        prop_assert_eq!(run(&program), ExecutionOutcome::Returned(vec![expected]));
    }

    #[test]
    fn prop_int_compare_matches(
        width in width(),
        op in prop::sample::select(IntCompareOp::ALL.to_vec()),
        lhs in int_bits(),
        rhs in int_bits(),
    ) {
        let program = program(WasmValueType::I32, |b| {
            let x = b.wasm_const(int_literal(width, lhs));
            let y = b.wasm_const(int_literal(width, rhs));
            b.wasm_int_compare(width, op, x, y)
        });
        let expected = numeric::int_compare(width, op, lhs, rhs) as i32;
        prop_assert_eq!(run(&program), ExecutionOutcome::Returned(vec![WasmValue::I32(expected)]));
    }

    #[test]
    fn prop_float_binary_matches(
        width in width(),
        op in prop::sample::select(FloatBinaryOp::ALL.to_vec()),
        lhs in float_value(),
        rhs in float_value(),
    ) {
        let program = program(width.float_type(), |b| {
            let x = b.wasm_const(float_literal(width, lhs));
            let y = b.wasm_const(float_literal(width, rhs));
            b.wasm_float_binary(width, op, x, y)
        });
        let expected = numeric::float_binary(width, op, lhs, rhs);
        prop_assert!(same_float(&run(&program), width, expected));
    }

    #[test]
    fn prop_float_unary_matches(
        width in width(),
        op in prop::sample::select(FloatUnaryOp::ALL.to_vec()),
        value in float_value(),
    ) {
        let program = program(width.float_type(), |b| {
            let x = b.wasm_const(float_literal(width, value));
            b.wasm_float_unary(width, op, x)
        });
        let expected = numeric::float_unary(width, op, value);
        prop_assert!(same_float(&run(&program), width, expected));
    }
}
