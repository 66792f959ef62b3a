//! Generators that use WebAssembly from JavaScript code.

use crate::builder::ProgramBuilder;
use crate::generator::{CodeGenerator, InputContract};
use rand::seq::SliceRandom;
use rand::Rng;
use wasp_ir::{
    BinaryOperator, Comparator, Context, EntityCategory, EntityType, ILType, ModuleSignature,
    Variable, WasmValueType,
};

/// A module exporting `add`, which adds two v128 parameters with `i32x4.add`
const SIMD_MODULE: [u8; 43] = [
    0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00, // header
    0x01, 0x07, 0x01, 0x60, 0x02, 0x7b, 0x7b, 0x01, 0x7b, // type: (v128, v128) -> v128
    0x03, 0x02, 0x01, 0x00, // function
    0x07, 0x07, 0x01, 0x03, b'a', b'd', b'd', 0x00, 0x00, // export "add"
    0x0a, 0x0b, 0x01, 0x09, 0x00, 0x20, 0x00, 0x20, 0x01, 0xfd, 0xae, 0x01, 0x0b, // code
];

pub fn generators() -> Vec<(CodeGenerator, u32)> {
    let js = Context::JAVASCRIPT;
    vec![
        (CodeGenerator::new("WasmGenerator", js, wasm_module).recursive(), 50),
        (
            CodeGenerator::new("WasmInstantiateGenerator", js, instantiate)
                .with_input(InputContract::Required(ILType::is_wasm_module)),
            30,
        ),
        (
            CodeGenerator::new("WasmExportCallGenerator", js, export_call)
                .with_input(InputContract::Required(ILType::is_wasm_exports)),
            40,
        ),
        (
            CodeGenerator::new("WasmMemoryOperationsGenerator", js, memory_operations)
                .with_input(InputContract::Required(ILType::is_wasm_exports)),
            40,
        ),
        (
            CodeGenerator::new("WasmGlobalGenerator", js, global)
                .with_input(InputContract::Preferred(ILType::is_wasm_exports)),
            40,
        ),
        (
            CodeGenerator::new("WasmMemoryGenerator", js, memory)
                .with_input(InputContract::Preferred(ILType::is_js_wasm_memory)),
            40,
        ),
        (CodeGenerator::new("WasmTableGenerator", js, table), 40),
        (CodeGenerator::new("WasmMemoryBoundaryTest", js, memory_boundary_test), 30),
        (CodeGenerator::new("WasmConcurrentAccessTest", js, concurrent_access_test), 25),
        (CodeGenerator::new("WasmMemoryFuzzer", js, memory_fuzzer), 45),
        (CodeGenerator::new("WasmSIMDFuzzer", js, simd_fuzzer), 45),
        (CodeGenerator::new("RandomWasmBytesGenerator", js, random_bytes), 40),
    ]
}

fn signature_of(b: &ProgramBuilder, var: Variable) -> ModuleSignature {
    b.type_of(var).module_signature().cloned().unwrap_or_default()
}

fn random_bytes_up_to(b: &mut ProgramBuilder, max: usize) -> Vec<u8> {
    let count = b.rng().gen_range(1..=max);
    (0..count).map(|_| b.rng().gen()).collect()
}

/// A JavaScript value suitable as a Wasm argument of type `ty`
pub(crate) fn js_argument_for(b: &mut ProgramBuilder, ty: WasmValueType) -> Variable {
    match ty {
        WasmValueType::I64 => match b.random_variable_of_type(&ILType::BigInt) {
            Some(var) if b.rng().gen_bool(0.5) => var,
            _ => {
                let value = b.random_integer();
                b.load_bigint(value)
            }
        },
        WasmValueType::I32 | WasmValueType::F32 | WasmValueType::F64 => {
            match b.random_variable_matching(ILType::is_number) {
                Some(var) if b.rng().gen_bool(0.5) => var,
                _ => {
                    let value = b.random_integer();
                    b.load_integer(value)
                }
            }
        }
        WasmValueType::ExternRef | WasmValueType::FuncRef => b.load_null(),
    }
}

/// Call every so often one of the functions exported by `exports`
fn call_random_export(b: &mut ProgramBuilder, exports: Variable) {
    let signature = signature_of(b, exports);
    let functions: Vec<_> = signature
        .exports
        .iter()
        .filter_map(|export| match &export.entity {
            EntityType::Function(sig) => Some((export.name.clone(), sig.clone())),
            _ => None,
        })
        .collect();
    let Some((name, sig)) = functions.choose(b.rng()).cloned() else {
        return;
    };
    let function = b.get_wasm_export(exports, &name);
    let args = sig.params.iter().map(|ty| js_argument_for(b, *ty)).collect();
    b.call_function(function, args, true);
}

fn wasm_module(b: &mut ProgramBuilder, _: &[Variable]) {
    let (_, exports) = b.build_random_wasm_module();
    call_random_export(b, exports);
}

/// JavaScript values matching the import requirements of a module, in import order
pub(crate) fn imports_for(b: &mut ProgramBuilder, signature: &ModuleSignature) -> Vec<Variable> {
    signature
        .imports
        .iter()
        .map(|entity| {
            let wanted = entity.clone();
            let existing = match entity.category() {
                EntityCategory::Function => b.random_variable_matching(ILType::is_callable),
                _ => b.random_variable_matching(|t| matches!(t, ILType::WasmObject(e) if *e == wanted)),
            };
            existing.unwrap_or_else(|| b.random_js_value())
        })
        .collect()
}

fn instantiate(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let module = inputs[0];
    let signature = signature_of(b, module);
    let imports = imports_for(b, &signature);
    let exports = b.instantiate_wasm(module, imports);
    if signature.exports.iter().any(|e| e.entity.category() == EntityCategory::Memory) {
        let memory = b.get_wasm_memory(exports, 0);
        let offset = b.rng().gen_range(0..=1024);
        let bytes = random_bytes_up_to(b, 32);
        b.write_wasm_memory(memory, offset, bytes);
    }
    call_random_export(b, exports);
}

fn export_call(b: &mut ProgramBuilder, inputs: &[Variable]) {
    call_random_export(b, inputs[0]);
}

fn memory_operations(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let exports = inputs[0];
    let count = signature_of(b, exports)
        .exports
        .iter()
        .filter(|e| e.entity.category() == EntityCategory::Memory)
        .count() as u32;
    let index = b.rng().gen_range(0..=count);
    let memory = b.get_wasm_memory(exports, index);
    for _ in 0..b.rng().gen_range(1..=3) {
        let offset = b.rng().gen_range(0..=1024);
        let bytes = random_bytes_up_to(b, 32);
        b.write_wasm_memory(memory, offset, bytes);
    }
}

fn global(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let source = inputs.first().copied();
    let globals: Vec<(String, WasmValueType)> = source
        .map(|exports| signature_of(b, exports))
        .unwrap_or_default()
        .exports
        .iter()
        .filter_map(|export| match export.entity {
            EntityType::Global { ty, .. } if ty.is_numeric() => Some((export.name.clone(), ty)),
            _ => None,
        })
        .collect();

    match (source, globals.choose(b.rng()).cloned()) {
        (Some(exports), Some((name, ty))) => {
            let value = b.get_wasm_global(exports, &name);
            let operand = if ty == WasmValueType::I64 {
                b.load_bigint(42)
            } else {
                b.load_integer(42)
            };
            let op = *[BinaryOperator::Add, BinaryOperator::Mul, BinaryOperator::Sub]
                .choose(b.rng())
                .unwrap_or(&BinaryOperator::Add);
            b.binary(value, operand, op);
        }
        _ => {
            let ty = b.random_numeric_type();
            let value = b.random_wasm_literal(ty);
            let mutable = b.rng().gen_bool(0.5);
            b.create_wasm_global(value, mutable);
        }
    }
}

fn memory(b: &mut ProgramBuilder, inputs: &[Variable]) {
    match inputs.first() {
        Some(memory) if b.type_of(*memory).is_js_wasm_memory() => {
            let offset = b.rng().gen_range(0..=1024);
            let bytes = random_bytes_up_to(b, 32);
            b.write_wasm_memory(*memory, offset, bytes);
        }
        _ => {
            let minimum = b.rng().gen_range(0..=2);
            let shared = b.rng().gen_bool(0.2);
            let maximum = if shared || b.rng().gen_bool(0.5) {
                Some(minimum + b.rng().gen_range(0..=4))
            } else {
                None
            };
            b.create_wasm_memory(minimum, maximum, shared);
        }
    }
}

fn table(b: &mut ProgramBuilder, _: &[Variable]) {
    let element = *WasmValueType::REFERENCE
        .choose(b.rng())
        .unwrap_or(&WasmValueType::FuncRef);
    let minimum = b.rng().gen_range(0..=10);
    let maximum = if b.rng().gen_bool(0.5) {
        Some(minimum + b.rng().gen_range(0..=10))
    } else {
        None
    };
    let table = b.create_wasm_table(element, minimum, maximum);
    let delta = b.load_integer(1);
    b.call_method(table, "grow", vec![delta], true);
}

/// `new WebAssembly.Memory(descriptor)` followed by an Int32Array view of its buffer
fn memory_with_view(b: &mut ProgramBuilder, properties: &[(&str, Variable)]) -> Variable {
    let webassembly = b.load_builtin("WebAssembly");
    let constructor = b.get_property(webassembly, "Memory");
    let descriptor = b.create_object(properties);
    let memory = b.construct(constructor, vec![descriptor], false);
    let int32_array = b.load_builtin("Int32Array");
    let buffer = b.get_property(memory, "buffer");
    b.construct(int32_array, vec![buffer], false)
}

fn memory_boundary_test(b: &mut ProgramBuilder, _: &[Variable]) {
    b.build_try_catch(
        |b| {
            let initial = b.load_integer(1);
            let view = memory_with_view(b, &[("initial", initial)]);
            let index = b.load_integer(16383);
            let value = b.load_integer(42);
            b.set_computed_property(view, index, value);
            let past_end = b.load_integer(16384);
            b.get_computed_property(view, past_end);
        },
        |b, _| {
            b.load_undefined();
        },
    );
}

fn concurrent_access_test(b: &mut ProgramBuilder, _: &[Variable]) {
    b.build_try_catch(
        |b| {
            let initial = b.load_integer(1);
            let maximum = b.load_integer(2);
            let shared = b.load_boolean(true);
            let view = memory_with_view(b, &[("initial", initial), ("maximum", maximum), ("shared", shared)]);
            let atomics = b.load_builtin("Atomics");
            let index = b.load_integer(0);
            let value = b.load_integer(42);
            b.call_method(atomics, "store", vec![view, index, value], false);
            b.call_method(atomics, "add", vec![view, index, value], false);
        },
        |b, _| {
            b.load_undefined();
        },
    );
}

fn memory_fuzzer(b: &mut ProgramBuilder, _: &[Variable]) {
    b.build_try_catch(
        |b| {
            let initial = b.load_integer(1);
            let maximum = b.load_integer(2);
            let shared = b.load_boolean(false);
            let view = memory_with_view(b, &[("initial", initial), ("maximum", maximum), ("shared", shared)]);
            let offset = b.rng().gen_range(0..=10);
            let offset = b.load_integer(offset);
            let limit = b.load_integer(10);
            let in_range = b.compare(offset, limit, Comparator::LessThan);
            b.build_if_else(
                in_range,
                |b| {
                    let value = b.load_integer(42);
                    b.set_computed_property(view, offset, value);
                },
                |b| {
                    b.load_undefined();
                },
            );
        },
        |b, _| {
            b.load_undefined();
        },
    );
}

fn simd_fuzzer(b: &mut ProgramBuilder, _: &[Variable]) {
    b.build_try_catch(
        |b| {
            let webassembly = b.load_builtin("WebAssembly");
            let bytes: Vec<Variable> = SIMD_MODULE
                .iter()
                .map(|byte| b.load_integer(*byte as i64))
                .collect();
            let array = b.create_array(bytes);
            let uint8_array = b.load_builtin("Uint8Array");
            let buffer = b.construct(uint8_array, vec![array], false);
            let valid = b.call_method(webassembly, "validate", vec![buffer], false);
            b.build_if(valid, |b| {
                let module_constructor = b.get_property(webassembly, "Module");
                let module = b.construct(module_constructor, vec![buffer], false);
                let instance_constructor = b.get_property(webassembly, "Instance");
                let instance = b.construct(instance_constructor, vec![module], false);
                let exports = b.get_property(instance, "exports");
                let add = b.get_property(exports, "add");
                let one = b.load_integer(1);
                let two = b.load_integer(2);
                b.call_function(add, vec![one, two], true);
            });
        },
        |b, _| {
            b.load_undefined();
        },
    );
}

fn random_bytes(b: &mut ProgramBuilder, _: &[Variable]) {
    let mut bytes = vec![0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
    bytes.extend(random_bytes_up_to(b, 24));
    let elements = bytes.into_iter().map(|byte| b.load_integer(byte as i64)).collect();
    let array = b.create_array(elements);
    let uint8_array = b.load_builtin("Uint8Array");
    let buffer = b.construct(uint8_array, vec![array], false);
    let webassembly = b.load_builtin("WebAssembly");
    b.call_method(webassembly, "validate", vec![buffer], false);
}
