//! Generators for the top level of a Wasm module body.

use crate::builder::ProgramBuilder;
use crate::generator::{CodeGenerator, InputContract};
use rand::seq::SliceRandom;
use rand::Rng;
use wasp_ir::{Context, EntityCategory, ILType, Variable, WasmLiteral, WasmValueType};

/// Memories a generated module may define or import
const MAX_MEMORIES: usize = 2;

pub fn generators() -> Vec<(CodeGenerator, u32)> {
    let module = Context::WASM_MODULE;
    vec![
        (CodeGenerator::new("WasmDefineGlobalGenerator", module, define_global), 10),
        (
            CodeGenerator::new("WasmImportGlobalGenerator", module, import_global)
                .with_input(InputContract::Required(ILType::is_js_wasm_global)),
            10,
        ),
        (CodeGenerator::new("WasmDefineTableGenerator", module, define_table), 5),
        (
            CodeGenerator::new("WasmImportTableGenerator", module, import_table)
                .with_input(InputContract::Required(ILType::is_js_wasm_table)),
            5,
        ),
        (CodeGenerator::new("WasmDefineMemoryGenerator", module, define_memory), 8),
        (
            CodeGenerator::new("WasmImportMemoryGenerator", module, import_memory)
                .with_input(InputContract::Required(ILType::is_js_wasm_memory)),
            5,
        ),
        (
            CodeGenerator::new("WasmImportFunctionGenerator", module, import_function)
                .with_input(InputContract::Required(ILType::is_callable)),
            5,
        ),
        (CodeGenerator::new("WasmFunctionGenerator", module, function).recursive(), 30),
    ]
}

fn define_global(b: &mut ProgramBuilder, _: &[Variable]) {
    let value = if b.rng().gen_bool(0.1) {
        let ty = *WasmValueType::REFERENCE.choose(b.rng()).unwrap_or(&WasmValueType::FuncRef);
        WasmLiteral::NullRef(ty)
    } else {
        let ty = b.random_numeric_type();
        b.random_wasm_literal(ty)
    };
    let mutable = b.rng().gen_bool(0.5);
    b.wasm_define_global(value, mutable);
}

fn import_global(b: &mut ProgramBuilder, inputs: &[Variable]) {
    if b.can_import(EntityCategory::Global) {
        b.wasm_import_global(inputs[0]);
    }
}

fn define_table(b: &mut ProgramBuilder, _: &[Variable]) {
    let element = *WasmValueType::REFERENCE.choose(b.rng()).unwrap_or(&WasmValueType::FuncRef);
    let minimum = b.rng().gen_range(0..=10);
    let maximum = if b.rng().gen_bool(0.5) {
        Some(minimum + b.rng().gen_range(0..=10))
    } else {
        None
    };
    b.wasm_define_table(element, minimum, maximum);
}

fn import_table(b: &mut ProgramBuilder, inputs: &[Variable]) {
    if b.can_import(EntityCategory::Table) {
        b.wasm_import_table(inputs[0]);
    }
}

fn define_memory(b: &mut ProgramBuilder, _: &[Variable]) {
    if b.module_entity_count(EntityCategory::Memory) >= MAX_MEMORIES {
        return;
    }
    let minimum = b.rng().gen_range(0..=2);
    let maximum = if b.rng().gen_bool(0.5) {
        Some(minimum + b.rng().gen_range(0..=4))
    } else {
        None
    };
    b.wasm_define_memory(minimum, maximum);
}

fn import_memory(b: &mut ProgramBuilder, inputs: &[Variable]) {
    if b.can_import(EntityCategory::Memory) && b.module_entity_count(EntityCategory::Memory) < MAX_MEMORIES {
        b.wasm_import_memory(inputs[0]);
    }
}

fn import_function(b: &mut ProgramBuilder, inputs: &[Variable]) {
    if b.can_import(EntityCategory::Function) {
        let signature = b.random_wasm_signature();
        b.wasm_import_function(inputs[0], signature);
    }
}

fn function(b: &mut ProgramBuilder, _: &[Variable]) {
    b.build_random_wasm_function();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FuzzContext;
    use std::sync::Arc;
    use wasp_core::FuzzConfig;

    #[test]
    fn test_memory_definitions_are_capped() {
        let fuzz = Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap());
        let mut b = ProgramBuilder::new(fuzz, 42);
        b.build_wasm_module(|b| {
            for _ in 0..5 {
                define_memory(b, &[]);
            }
            assert_eq!(b.module_entity_count(EntityCategory::Memory), MAX_MEMORIES);
        });
        assert!(b.finalize().is_ok());
    }

    #[test]
    fn test_late_import_is_skipped() {
        let fuzz = Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap());
        let mut b = ProgramBuilder::new(fuzz, 42);
        let global = b.create_wasm_global(WasmLiteral::F64(1.5), false);
        b.build_wasm_module(|b| {
            define_global(b, &[]);
            import_global(b, &[global]);
            assert_eq!(b.module_entity_count(EntityCategory::Global), 1);
        });
        assert!(b.finalize().is_ok());
    }
}
