//! Conversions between IR value types and wasmtime values.

use wasmtime::{Val, ValType};
use wasp_core::{Error, Result, WasmValue};
use wasp_ir::{WasmLiteral, WasmValueType};

pub fn val_type(ty: WasmValueType) -> ValType {
    match ty {
        WasmValueType::I32 => ValType::I32,
        WasmValueType::I64 => ValType::I64,
        WasmValueType::F32 => ValType::F32,
        WasmValueType::F64 => ValType::F64,
        WasmValueType::ExternRef => ValType::EXTERNREF,
        WasmValueType::FuncRef => ValType::FUNCREF,
    }
}

pub fn literal_to_val(value: &WasmLiteral) -> Val {
    match value {
        WasmLiteral::I32(v) => Val::I32(*v),
        WasmLiteral::I64(v) => Val::I64(*v),
        WasmLiteral::F32(v) => Val::F32(v.to_bits()),
        WasmLiteral::F64(v) => Val::F64(v.to_bits()),
        WasmLiteral::NullRef(WasmValueType::ExternRef) => Val::ExternRef(None),
        WasmLiteral::NullRef(_) => Val::FuncRef(None),
    }
}

pub fn zero_val(ty: WasmValueType) -> Val {
    literal_to_val(&WasmLiteral::zero(ty))
}

pub fn value_to_val(value: &WasmValue) -> Val {
    match value {
        WasmValue::I32(v) => Val::I32(*v),
        WasmValue::I64(v) => Val::I64(*v),
        WasmValue::F32(bits) => Val::F32(*bits),
        WasmValue::F64(bits) => Val::F64(*bits),
        WasmValue::Ref { .. } => Val::ExternRef(None),
    }
}

pub fn val_to_value(val: &Val) -> Result<WasmValue> {
    match val {
        Val::I32(v) => Ok(WasmValue::I32(*v)),
        Val::I64(v) => Ok(WasmValue::I64(*v)),
        Val::F32(bits) => Ok(WasmValue::F32(*bits)),
        Val::F64(bits) => Ok(WasmValue::F64(*bits)),
        Val::FuncRef(func) => Ok(WasmValue::Ref { is_null: func.is_none() }),
        Val::ExternRef(reference) => Ok(WasmValue::Ref {
            is_null: reference.is_none(),
        }),
        other => Err(Error::Wasm(format!("unsupported result value {:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_bits_are_kept() {
        let nan = WasmLiteral::F32(f32::from_bits(0x7fc0_0001));
        match literal_to_val(&nan) {
            Val::F32(bits) => assert_eq!(bits, 0x7fc0_0001),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_zero_values() {
        assert!(matches!(zero_val(WasmValueType::I64), Val::I64(0)));
        assert!(matches!(zero_val(WasmValueType::FuncRef), Val::FuncRef(None)));
        assert_eq!(
            val_to_value(&zero_val(WasmValueType::ExternRef)).unwrap(),
            WasmValue::Ref { is_null: true }
        );
    }
}
