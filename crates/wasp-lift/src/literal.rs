//! JavaScript source forms of literal values.

use wasp_core::{js_number_to_string, Result};
use wasp_ir::WasmLiteral;

pub fn integer(value: i64) -> String {
    value.to_string()
}

pub fn bigint(value: i64) -> String {
    format!("{}n", value)
}

/// Unlike `toString`, keeps the sign of negative zero
pub fn float(value: f64) -> String {
    if value == 0.0 && value.is_sign_negative() {
        "-0".to_string()
    } else {
        js_number_to_string(value)
    }
}

/// Double-quoted string literal; JSON escaping is valid JavaScript
pub fn string(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub fn regexp(pattern: &str, flags: &str) -> String {
    format!("/{}/{}", pattern, flags)
}

/// Value of a Wasm literal as seen from JavaScript: i64 becomes a BigInt, references are null
pub fn wasm_value(value: &WasmLiteral) -> String {
    match value {
        WasmLiteral::I32(v) => v.to_string(),
        WasmLiteral::I64(v) => bigint(*v),
        WasmLiteral::F32(v) => float(*v as f64),
        WasmLiteral::F64(v) => float(*v),
        WasmLiteral::NullRef(_) => "null".to_string(),
    }
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' || first == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    }
}

/// `object.name`, or `object["name"]` when the name is not an identifier
pub fn member(object: &str, name: &str) -> Result<String> {
    if is_identifier(name) {
        Ok(format!("{}.{}", object, name))
    } else {
        Ok(format!("{}[{}]", object, string(name)?))
    }
}

/// Key of an object literal property
pub fn property_key(name: &str) -> Result<String> {
    if is_identifier(name) {
        Ok(name.to_string())
    } else {
        string(name)
    }
}

pub fn byte_array(bytes: &[u8]) -> String {
    let items: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers() {
        assert_eq!(integer(-7), "-7");
        assert_eq!(bigint(-7), "-7n");
        assert_eq!(float(-0.0), "-0");
        assert_eq!(float(0.0), "0");
        assert_eq!(float(1.5), "1.5");
        assert_eq!(float(f64::NAN), "NaN");
        assert_eq!(float(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(float(1e21), "1e+21");
    }

    #[test]
    fn test_strings_are_escaped() {
        assert_eq!(string("a\"b").unwrap(), r#""a\"b""#);
        assert_eq!(string("line\nbreak").unwrap(), r#""line\nbreak""#);
    }

    #[test]
    fn test_member_access() {
        assert_eq!(member("v1", "length").unwrap(), "v1.length");
        assert_eq!(member("v1", "$x_1").unwrap(), "v1.$x_1");
        assert_eq!(member("v1", "1abc").unwrap(), r#"v1["1abc"]"#);
        assert_eq!(member("v1", "a-b").unwrap(), r#"v1["a-b"]"#);
        assert_eq!(property_key("").unwrap(), r#""""#);
    }

    #[test]
    fn test_wasm_values() {
        assert_eq!(wasm_value(&WasmLiteral::I32(-1)), "-1");
        assert_eq!(wasm_value(&WasmLiteral::I64(5)), "5n");
        assert_eq!(wasm_value(&WasmLiteral::F32(0.5)), "0.5");
        assert_eq!(wasm_value(&WasmLiteral::NullRef(wasp_ir::WasmValueType::ExternRef)), "null");
    }

    #[test]
    fn test_byte_array() {
        assert_eq!(byte_array(&[0, 97, 255]), "[0, 97, 255]");
        assert_eq!(byte_array(&[]), "[]");
    }
}
