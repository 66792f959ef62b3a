//! Catalog of JavaScript builtins and name pools used during generation.

use crate::types::ILType;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct Environment {
    builtins: BTreeMap<String, ILType>,
    /// group name -> method names callable on objects of that group
    group_methods: BTreeMap<String, Vec<String>>,
    pub property_names: Vec<String>,
    pub method_names: Vec<String>,
    pub interesting_integers: Vec<i64>,
    pub interesting_floats: Vec<f64>,
    pub interesting_strings: Vec<String>,
    pub regexp_patterns: Vec<String>,
    pub regexp_flags: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Environment {
    /// The default catalog: a generic ECMAScript engine with the WebAssembly JS API
    pub fn javascript() -> Self {
        let mut builtins = BTreeMap::new();
        for name in [
            "Object", "Array", "Function", "Map", "Set", "WeakMap", "Promise", "Proxy", "RegExp",
            "Date", "Error", "ArrayBuffer", "DataView", "Uint8Array", "Int32Array",
            "Float64Array", "BigInt64Array",
        ] {
            builtins.insert(name.to_string(), ILType::Function { parameters: 1 });
        }
        for name in ["Number", "String", "Boolean", "BigInt", "Symbol", "parseInt", "parseFloat"] {
            builtins.insert(name.to_string(), ILType::Function { parameters: 1 });
        }
        for group in ["Math", "JSON", "Reflect", "Atomics", "WebAssembly"] {
            builtins.insert(group.to_string(), ILType::object_of(group));
        }
        builtins.insert("globalThis".to_string(), ILType::object());
        builtins.insert("NaN".to_string(), ILType::Float);
        builtins.insert("Infinity".to_string(), ILType::Float);

        let mut group_methods = BTreeMap::new();
        group_methods.insert(
            "Math".to_string(),
            strings(&[
                "abs", "ceil", "floor", "max", "min", "round", "sqrt", "sign", "trunc", "pow",
                "clz32", "fround", "imul", "log", "exp", "sin", "cos", "atan2", "hypot",
            ]),
        );
        group_methods.insert("JSON".to_string(), strings(&["parse", "stringify"]));
        group_methods.insert(
            "Reflect".to_string(),
            strings(&["ownKeys", "getPrototypeOf", "has", "get", "set", "defineProperty"]),
        );
        group_methods.insert(
            "Atomics".to_string(),
            strings(&["add", "load", "store", "exchange", "compareExchange", "notify"]),
        );
        group_methods.insert(
            "WebAssembly".to_string(),
            strings(&["validate", "compile", "instantiate"]),
        );

        Self {
            builtins,
            group_methods,
            property_names: strings(&[
                "a", "b", "c", "d", "e", "x", "y", "length", "value", "buffer", "byteLength",
                "prototype", "constructor", "__proto__", "toString", "valueOf", "exports",
            ]),
            method_names: strings(&[
                "toString", "valueOf", "hasOwnProperty", "push", "pop", "shift", "slice",
                "splice", "join", "map", "filter", "indexOf", "reverse", "sort", "concat", "fill",
                "at", "keys", "set", "get", "grow",
            ]),
            interesting_integers: vec![
                0, 1, -1, 2, 3, 7, 16, 64, 255, 256, 1024, 4096, 65535, 65536, 2147483647,
                -2147483648, 4294967295, 4294967296, 9007199254740991, -9007199254740991,
            ],
            interesting_floats: vec![
                0.0, -0.0, 0.5, 1.5, -1.5, 3.14, 1e-300, 1e300, 2.220446049250313e-16,
                f64::MAX, f64::MIN_POSITIVE, f64::NAN, f64::INFINITY, f64::NEG_INFINITY,
            ],
            interesting_strings: strings(&[
                "", "foo", "bar", "length", "0", "-1", "NaN", "valueOf", "\u{0}", "a\nb",
                "{\"a\":1,\"b\":[1,2]}", "[1,2,3]",
            ]),
            regexp_patterns: strings(&["a+", "(a|b)*c", "\\d{2,4}", "[^x]", "^$", "(?<n>.)\\k<n>", "\\bfoo"]),
            regexp_flags: strings(&["", "g", "i", "m", "gi", "u", "y", "s"]),
        }
    }

    /// Declare an extra builtin, replacing any builtin of the same name
    pub fn with_builtin(mut self, name: impl Into<String>, ty: ILType) -> Self {
        self.builtins.insert(name.into(), ty);
        self
    }

    pub fn builtin_type(&self, name: &str) -> Option<&ILType> {
        self.builtins.get(name)
    }

    pub fn builtin_names(&self) -> impl Iterator<Item = &str> {
        self.builtins.keys().map(|k| k.as_str())
    }

    /// Methods known for objects of a group
    pub fn methods_of(&self, group: &str) -> &[String] {
        self.group_methods
            .get(group)
            .map(|methods| methods.as_slice())
            .unwrap_or(&[])
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::javascript()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let env = Environment::javascript();
        assert_eq!(env.builtin_type("Math"), Some(&ILType::object_of("Math")));
        assert!(env.methods_of("Math").iter().any(|m| m == "imul"));
        assert!(env.methods_of("Nope").is_empty());
        assert!(env.builtin_names().any(|n| n == "WebAssembly"));
    }
}
