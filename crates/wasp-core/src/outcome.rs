//! Execution outcomes of WebAssembly exports. Traps are data, not errors.

use crate::number::js_number_to_string;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrapKind {
    IntegerDivisionByZero,
    IntegerOverflow,
    MemoryOutOfBounds,
    TableOutOfBounds,
    Unreachable,
    BadConversionToInteger,
    StackOverflow,
    IndirectCallToNull,
    OutOfFuel,
    Other,
}

/// A value produced by a WebAssembly export
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WasmValue {
    I32(i32),
    I64(i64),
    /// Raw bits, so NaN payloads survive
    F32(u32),
    F64(u64),
    Ref { is_null: bool },
}

/// Renders like JavaScript's `String(v)` on the value a JS caller would observe.
/// i64 values cross the boundary as BigInt.
impl fmt::Display for WasmValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WasmValue::I32(v) => write!(f, "{}", v),
            WasmValue::I64(v) => write!(f, "{}", v),
            WasmValue::F32(bits) => write!(f, "{}", js_number_to_string(f32::from_bits(*bits) as f64)),
            WasmValue::F64(bits) => write!(f, "{}", js_number_to_string(f64::from_bits(*bits))),
            WasmValue::Ref { is_null: true } => write!(f, "null"),
            WasmValue::Ref { is_null: false } => write!(f, "[object WebAssembly.Reference]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    Returned(Vec<WasmValue>),
    Trapped(TrapKind),
}

impl ExecutionOutcome {
    pub fn is_trap(&self) -> bool {
        matches!(self, ExecutionOutcome::Trapped(_))
    }

    /// Text a JavaScript caller printing the result would see
    pub fn to_js_string(&self) -> String {
        match self {
            ExecutionOutcome::Returned(values) => match values.as_slice() {
                [] => "undefined".to_string(),
                [single] => single.to_string(),
                many => many.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(","),
            },
            ExecutionOutcome::Trapped(kind) => format!("RuntimeError: {:?}", kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_value_rendering() {
        assert_eq!(WasmValue::I32(42).to_string(), "42");
        assert_eq!(WasmValue::I64(-1).to_string(), "-1");
        assert_eq!(WasmValue::F64((-0.0f64).to_bits()).to_string(), "0");
        assert_eq!(WasmValue::F32(f32::NAN.to_bits()).to_string(), "NaN");
        assert_eq!(WasmValue::Ref { is_null: true }.to_string(), "null");
    }

    #[test]
    fn test_outcome_text() {
        let returned = ExecutionOutcome::Returned(vec![WasmValue::I32(42)]);
        assert_eq!(returned.to_js_string(), "42");
        assert!(!returned.is_trap());

        let empty = ExecutionOutcome::Returned(vec![]);
        assert_eq!(empty.to_js_string(), "undefined");

        let trapped = ExecutionOutcome::Trapped(TrapKind::IntegerDivisionByZero);
        assert!(trapped.is_trap());
    }

    proptest! {
        #[test]
        fn prop_float_bits_survive_json(bits in any::<u64>()) {
            let value = WasmValue::F64(bits);
            let restored: WasmValue = serde_json::from_str(&serde_json::to_string(&value).unwrap()).unwrap();
            prop_assert_eq!(restored, value);
        }

        #[test]
        fn prop_f32_renders_as_its_widened_double(bits in any::<u32>()) {
            let widened = f32::from_bits(bits) as f64;
            prop_assert_eq!(WasmValue::F32(bits).to_string(), WasmValue::F64(widened.to_bits()).to_string());
        }
    }
}
