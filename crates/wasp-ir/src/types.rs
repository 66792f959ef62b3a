//! Type model for IR variables.

use serde::{Deserialize, Serialize};
use std::fmt;

/// WebAssembly value types usable in generated modules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasmValueType {
    I32,
    I64,
    F32,
    F64,
    ExternRef,
    FuncRef,
}

impl WasmValueType {
    pub const NUMERIC: [WasmValueType; 4] = [
        WasmValueType::I32,
        WasmValueType::I64,
        WasmValueType::F32,
        WasmValueType::F64,
    ];

    pub const REFERENCE: [WasmValueType; 2] = [WasmValueType::ExternRef, WasmValueType::FuncRef];

    pub fn is_numeric(&self) -> bool {
        !self.is_reference()
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, WasmValueType::ExternRef | WasmValueType::FuncRef)
    }

    /// Byte width of a memory access for this type
    pub fn byte_width(&self) -> u32 {
        match self {
            WasmValueType::I32 | WasmValueType::F32 => 4,
            WasmValueType::I64 | WasmValueType::F64 => 8,
            WasmValueType::ExternRef | WasmValueType::FuncRef => 0,
        }
    }

    /// Name used by the JavaScript WebAssembly API descriptors
    pub fn js_api_name(&self) -> &'static str {
        match self {
            WasmValueType::I32 => "i32",
            WasmValueType::I64 => "i64",
            WasmValueType::F32 => "f32",
            WasmValueType::F64 => "f64",
            WasmValueType::ExternRef => "externref",
            WasmValueType::FuncRef => "anyfunc",
        }
    }
}

impl fmt::Display for WasmValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WasmValueType::I32 => "i32",
            WasmValueType::I64 => "i64",
            WasmValueType::F32 => "f32",
            WasmValueType::F64 => "f64",
            WasmValueType::ExternRef => "externref",
            WasmValueType::FuncRef => "funcref",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WasmSignature {
    pub params: Vec<WasmValueType>,
    pub results: Vec<WasmValueType>,
}

impl WasmSignature {
    pub fn new(params: Vec<WasmValueType>, results: Vec<WasmValueType>) -> Self {
        Self { params, results }
    }

    pub fn result(&self) -> Option<WasmValueType> {
        self.results.first().copied()
    }
}

impl fmt::Display for WasmSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |types: &[WasmValueType]| {
            types.iter().map(|t| t.to_string()).collect::<Vec<_>>().join(", ")
        };
        write!(f, "[{}] => [{}]", join(&self.params), join(&self.results))
    }
}

/// Literal payload of a Wasm constant or global initializer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WasmLiteral {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    NullRef(WasmValueType),
}

impl WasmLiteral {
    pub fn value_type(&self) -> WasmValueType {
        match self {
            WasmLiteral::I32(_) => WasmValueType::I32,
            WasmLiteral::I64(_) => WasmValueType::I64,
            WasmLiteral::F32(_) => WasmValueType::F32,
            WasmLiteral::F64(_) => WasmValueType::F64,
            WasmLiteral::NullRef(ty) => *ty,
        }
    }

    pub fn zero(ty: WasmValueType) -> Self {
        match ty {
            WasmValueType::I32 => WasmLiteral::I32(0),
            WasmValueType::I64 => WasmLiteral::I64(0),
            WasmValueType::F32 => WasmLiteral::F32(0.0),
            WasmValueType::F64 => WasmLiteral::F64(0.0),
            WasmValueType::ExternRef | WasmValueType::FuncRef => WasmLiteral::NullRef(ty),
        }
    }
}

impl fmt::Display for WasmLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WasmLiteral::I32(v) => write!(f, "i32 {}", v),
            WasmLiteral::I64(v) => write!(f, "i64 {}", v),
            WasmLiteral::F32(v) => write!(f, "f32 {}", v),
            WasmLiteral::F64(v) => write!(f, "f64 {}", v),
            WasmLiteral::NullRef(ty) => write!(f, "{} null", ty),
        }
    }
}

/// Type of a module entity: either defined in a module or a JS object importable into one
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Function(WasmSignature),
    Global { ty: WasmValueType, mutable: bool },
    Table { element: WasmValueType, minimum: u32, maximum: Option<u32> },
    Memory { minimum: u32, maximum: Option<u32>, shared: bool },
}

impl EntityType {
    pub fn category(&self) -> EntityCategory {
        match self {
            EntityType::Function(_) => EntityCategory::Function,
            EntityType::Global { .. } => EntityCategory::Global,
            EntityType::Table { .. } => EntityCategory::Table,
            EntityType::Memory { .. } => EntityCategory::Memory,
        }
    }
}

/// Index spaces of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityCategory {
    Function,
    Global,
    Table,
    Memory,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 4] = [
        EntityCategory::Function,
        EntityCategory::Global,
        EntityCategory::Table,
        EntityCategory::Memory,
    ];

    /// Prefix of export names in this category
    pub fn export_prefix(&self) -> &'static str {
        match self {
            EntityCategory::Function => "function",
            EntityCategory::Global => "global",
            EntityCategory::Table => "table",
            EntityCategory::Memory => "memory",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            EntityCategory::Function => 0,
            EntityCategory::Global => 1,
            EntityCategory::Table => 2,
            EntityCategory::Memory => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WasmExport {
    pub name: String,
    pub entity: EntityType,
}

/// Import requirements and exports of a compiled module
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ModuleSignature {
    pub imports: Vec<EntityType>,
    pub exports: Vec<WasmExport>,
}

impl ModuleSignature {
    pub fn export(&self, name: &str) -> Option<&WasmExport> {
        self.exports.iter().find(|e| e.name == name)
    }
}

/// Static type of an IR variable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ILType {
    Anything,
    Undefined,
    Null,
    Integer,
    Float,
    BigInt,
    Boolean,
    String,
    RegExp,
    Object { group: Option<String> },
    Array,
    Function { parameters: usize },
    /// A `WebAssembly.Global`, `.Memory` or `.Table` created from JavaScript
    WasmObject(EntityType),
    /// A compiled `WebAssembly.Module`
    WasmModule(ModuleSignature),
    /// The `exports` object of an instance
    WasmExports(ModuleSignature),
    /// An entity inside a module body
    WasmEntity(EntityType),
    /// A value inside a Wasm function body
    Wasm(WasmValueType),
    Label,
}

impl ILType {
    pub fn object() -> Self {
        ILType::Object { group: None }
    }

    pub fn object_of(group: &str) -> Self {
        ILType::Object { group: Some(group.to_string()) }
    }

    /// True for values that exist on the JavaScript side of a program
    pub fn is_js_value(&self) -> bool {
        !matches!(self, ILType::WasmEntity(_) | ILType::Wasm(_) | ILType::Label)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, ILType::Integer | ILType::Float)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, ILType::Function { .. })
    }

    pub fn is_object_like(&self) -> bool {
        matches!(
            self,
            ILType::Object { .. }
                | ILType::Array
                | ILType::Function { .. }
                | ILType::RegExp
                | ILType::WasmObject(_)
                | ILType::WasmModule(_)
                | ILType::WasmExports(_)
        )
    }

    pub fn is_wasm_module(&self) -> bool {
        matches!(self, ILType::WasmModule(_))
    }

    pub fn is_wasm_exports(&self) -> bool {
        matches!(self, ILType::WasmExports(_))
    }

    pub fn is_js_wasm_global(&self) -> bool {
        matches!(self, ILType::WasmObject(EntityType::Global { .. }))
    }

    pub fn is_js_wasm_memory(&self) -> bool {
        matches!(self, ILType::WasmObject(EntityType::Memory { .. }))
    }

    pub fn is_js_wasm_table(&self) -> bool {
        matches!(self, ILType::WasmObject(EntityType::Table { .. }))
    }

    pub fn is_wasm_value(&self, ty: WasmValueType) -> bool {
        matches!(self, ILType::Wasm(t) if *t == ty)
    }

    pub fn is_any_wasm_value(&self) -> bool {
        matches!(self, ILType::Wasm(_))
    }

    pub fn is_numeric_wasm_value(&self) -> bool {
        matches!(self, ILType::Wasm(t) if t.is_numeric())
    }

    pub fn is_label(&self) -> bool {
        matches!(self, ILType::Label)
    }

    pub fn entity(&self) -> Option<&EntityType> {
        match self {
            ILType::WasmEntity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn wasm_value_type(&self) -> Option<WasmValueType> {
        match self {
            ILType::Wasm(ty) => Some(*ty),
            _ => None,
        }
    }

    pub fn module_signature(&self) -> Option<&ModuleSignature> {
        match self {
            ILType::WasmModule(sig) | ILType::WasmExports(sig) => Some(sig),
            _ => None,
        }
    }
}

impl fmt::Display for ILType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ILType::Object { group: Some(group) } => write!(f, ".object({})", group),
            ILType::Function { parameters } => write!(f, ".function({})", parameters),
            ILType::Wasm(ty) => write!(f, ".wasm({})", ty),
            other => write!(f, "{:?}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_visibility() {
        assert!(ILType::Integer.is_js_value());
        assert!(ILType::WasmObject(EntityType::Memory { minimum: 1, maximum: None, shared: false })
            .is_js_value());
        assert!(!ILType::Wasm(WasmValueType::I32).is_js_value());
        assert!(!ILType::Label.is_js_value());
    }

    #[test]
    fn test_literal_types() {
        assert_eq!(WasmLiteral::I64(3).value_type(), WasmValueType::I64);
        assert_eq!(
            WasmLiteral::zero(WasmValueType::FuncRef),
            WasmLiteral::NullRef(WasmValueType::FuncRef)
        );
    }

    #[test]
    fn test_signature_display() {
        let sig = WasmSignature::new(vec![WasmValueType::I32, WasmValueType::F64], vec![WasmValueType::I64]);
        assert_eq!(sig.to_string(), "[i32, f64] => [i64]");
    }
}
