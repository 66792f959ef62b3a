//! Program templates: named scenarios that give generated programs a shape.
//!
//! A template drives the builder directly and may temporarily replace the
//! active generator set with [`ProgramBuilder::with_generators`]. Every
//! template leaves all blocks closed, so its program finalizes cleanly.

use crate::builder::ProgramBuilder;
use crate::generator::{CodeGenerator, InputContract};
use crate::generators::{imports_for, js_argument_for};
use crate::weighted::WeightedList;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use wasp_core::WeightTable;
use wasp_ir::{
    BinaryOperator, Comparator, Context, EntityCategory, EntityType, ILType, IntBinaryOp, NumWidth,
    Variable, WasmLiteral, WasmSignature, WasmValueType,
};

const SMALL_BLOCK: usize = 5;
const JIT_ITERATIONS: u32 = 100;

pub type TemplateBody = fn(&mut ProgramBuilder);

#[derive(Clone)]
pub struct ProgramTemplate {
    pub name: &'static str,
    body: TemplateBody,
}

impl ProgramTemplate {
    pub fn new(name: &'static str, body: TemplateBody) -> Self {
        Self { name, body }
    }

    pub fn run(&self, builder: &mut ProgramBuilder) {
        (self.body)(builder)
    }
}

impl fmt::Debug for ProgramTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProgramTemplate").field(&self.name).finish()
    }
}

pub fn all_templates() -> Vec<(ProgramTemplate, u32)> {
    vec![
        (ProgramTemplate::new("Codegen100", codegen_100), 2),
        (ProgramTemplate::new("Codegen50", codegen_50), 2),
        (ProgramTemplate::new("JIT1Function", jit_1_function), 3),
        (ProgramTemplate::new("JIT2Functions", jit_2_functions), 3),
        (ProgramTemplate::new("JITTrickyFunction", jit_tricky_function), 2),
        (ProgramTemplate::new("JSONFuzzer", json_fuzzer), 1),
        (ProgramTemplate::new("WasmFuzzer", wasm_fuzzer), 5),
        (ProgramTemplate::new("ComplexWasmFuzzer", complex_wasm_fuzzer), 5),
        (ProgramTemplate::new("WasmMemoryTest", wasm_memory_test), 5),
        (ProgramTemplate::new("WasmGlobalTest", wasm_global_test), 5),
        (ProgramTemplate::new("WasmFunctionTest", wasm_function_test), 5),
        (ProgramTemplate::new("WasmTableTest", wasm_table_test), 5),
        (ProgramTemplate::new("WasmImportTest", wasm_import_test), 5),
        (ProgramTemplate::new("WasmMemoryFuzzer", wasm_memory_fuzzer), 5),
        (ProgramTemplate::new("WasmImportExportFuzzer", wasm_import_export_fuzzer), 5),
        (ProgramTemplate::new("ComplexWasmTest", complex_wasm_test), 5),
        (ProgramTemplate::new("MapTransitionFuzzer", map_transition_fuzzer), 3),
        (ProgramTemplate::new("ValueSerializerFuzzer", value_serializer_fuzzer), 3),
        (ProgramTemplate::new("RegExpFuzzer", regexp_fuzzer), 3),
    ]
}

pub fn default_weights() -> WeightTable {
    let defaults: Vec<(&str, u32)> = all_templates()
        .iter()
        .map(|(template, weight)| (template.name, *weight))
        .collect();
    WeightTable::new("template", &defaults)
}

// JavaScript templates

fn codegen_100(b: &mut ProgramBuilder) {
    b.build_prefix();
    b.build(100);
}

fn codegen_50(b: &mut ProgramBuilder) {
    b.build_prefix();
    b.build(50);
}

/// A function whose body is generated code and which returns a random value
fn build_generated_function(b: &mut ProgramBuilder, body_size: usize) -> Variable {
    let num_parameters = b.random_parameter_count().max(1);
    b.build_plain_function(num_parameters, |b, _| {
        b.build(body_size);
        let value = b.random_js_value();
        b.do_return(Some(value));
    })
}

fn call_in_loop(b: &mut ProgramBuilder, function: Variable) {
    b.build_repeat_loop(JIT_ITERATIONS, |b, _| {
        let args = b.random_arguments(function);
        b.call_function(function, args, false);
    });
}

fn call_once(b: &mut ProgramBuilder, function: Variable) {
    let args = b.random_arguments(function);
    b.call_function(function, args, false);
}

fn jit_1_function(b: &mut ProgramBuilder) {
    b.build_prefix();
    b.build(SMALL_BLOCK);
    let f = build_generated_function(b, 30);
    b.build(SMALL_BLOCK);
    call_in_loop(b, f);
    b.build(SMALL_BLOCK);
    call_once(b, f);
    call_in_loop(b, f);
    b.build(SMALL_BLOCK);
    call_once(b, f);
}

fn jit_2_functions(b: &mut ProgramBuilder) {
    b.build_prefix();
    b.build(SMALL_BLOCK);
    let f1 = build_generated_function(b, 20);
    let f2 = build_generated_function(b, 20);
    b.build(SMALL_BLOCK);
    call_in_loop(b, f1);
    call_in_loop(b, f2);
    b.build(SMALL_BLOCK);
    call_once(b, f2);
    call_once(b, f1);
    call_in_loop(b, f1);
    call_in_loop(b, f2);
    b.build(SMALL_BLOCK);
    call_once(b, f1);
    call_once(b, f2);
}

/// Generated code guarded by a condition that holds in only some iterations
fn build_code_for_some_iterations(b: &mut ProgramBuilder, iteration: Variable) {
    let condition = if b.rng().gen_bool(0.5) {
        let selected = if b.rng().gen_bool(0.5) {
            b.rng().gen_range(JIT_ITERATIONS - 10..JIT_ITERATIONS)
        } else {
            b.rng().gen_range(0..JIT_ITERATIONS)
        };
        let selected = b.load_integer(selected as i64);
        b.compare(iteration, selected, Comparator::Equal)
    } else {
        let modulus = *[2, 5, 10, 25].choose(b.rng()).unwrap_or(&2);
        let modulus = b.load_integer(modulus);
        let remainder = b.binary(iteration, modulus, BinaryOperator::Mod);
        let zero = b.load_integer(0);
        b.compare(remainder, zero, Comparator::Equal)
    };
    b.hide(condition);
    b.build_if(condition, |b| b.build(SMALL_BLOCK));
}

fn jit_tricky_function(b: &mut ProgramBuilder) {
    b.build_prefix();
    b.build(SMALL_BLOCK);

    let extra_parameters = b.random_parameter_count();
    let f = b.build_plain_function(extra_parameters + 1, |b, params| {
        let iteration = params[0];
        b.build(SMALL_BLOCK);
        build_code_for_some_iterations(b, iteration);
        b.build(20);
        let value = b.random_js_value();
        b.do_return(Some(value));
    });
    b.build(SMALL_BLOCK);

    let call_with_iteration = |b: &mut ProgramBuilder, iteration: Variable| {
        build_code_for_some_iterations(b, iteration);
        let mut args = vec![iteration];
        args.extend((0..extra_parameters).map(|_| b.random_js_value()));
        b.call_function(f, args, false);
    };
    b.build_repeat_loop(2, |b, _| {
        b.build_repeat_loop(JIT_ITERATIONS, |b, i| call_with_iteration(b, i));
    });
    b.build_repeat_loop(JIT_ITERATIONS, |b, i| call_with_iteration(b, i));
}

fn json_fuzzer(b: &mut ProgramBuilder) {
    b.build_prefix();
    b.build(25);

    let json = b.load_builtin("JSON");
    let count = b.rng().gen_range(1..=5);
    let mut payloads: Vec<Variable> = (0..count)
        .map(|_| {
            let value = b.random_js_value();
            b.call_method(json, "stringify", vec![value], false)
        })
        .collect();

    // Flips one character of a JSON string
    let mutate_json = b.build_plain_function(1, |b, params| {
        let text = params[0];
        let random_index = b.build_plain_function(1, |b, params| {
            let math = b.load_builtin("Math");
            let fraction = b.rng().gen_range(0.0..1.0);
            let fraction = b.load_float(fraction);
            let scaled = b.binary(fraction, params[0], BinaryOperator::Mul);
            let index = b.call_method(math, "floor", vec![scaled], false);
            b.do_return(Some(index));
        });
        let string = b.load_builtin("String");
        let length = b.get_property(text, "length");
        let index = b.call_function(random_index, vec![length], false);
        let zero = b.load_integer(0);
        let prefix = b.call_method(text, "substring", vec![zero, index], false);
        let one = b.load_integer(1);
        let after = b.binary(index, one, BinaryOperator::Add);
        let suffix = b.call_method(text, "substring", vec![after], false);
        let code = b.call_method(text, "charCodeAt", vec![index], false);
        let mask = b.rng().gen_range(1..128);
        let mask = b.load_integer(mask);
        let flipped = b.binary(code, mask, BinaryOperator::Xor);
        let character = b.call_method(string, "fromCharCode", vec![flipped], false);
        let head = b.binary(prefix, character, BinaryOperator::Add);
        let mutated = b.binary(head, suffix, BinaryOperator::Add);
        b.do_return(Some(mutated));
    });

    for payload in payloads.iter_mut() {
        if b.rng().gen_bool(0.25) {
            *payload = b.call_function(mutate_json, vec![*payload], true);
        }
    }
    for _ in 0..payloads.len() * 2 {
        let payload = *payloads.choose(b.rng()).unwrap_or(&json);
        b.call_method(json, "parse", vec![payload], true);
    }
    b.build(25);
}

// MapTransitionFuzzer: a small set of objects and property names, many loads and stores

const MAP_PROPERTIES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn is_plain_object(ty: &ILType) -> bool {
    *ty == ILType::object()
}

fn random_map_properties(b: &mut ProgramBuilder) -> Vec<(&'static str, Variable)> {
    let mut properties = vec![("a", b.random_js_value())];
    for _ in 0..3 {
        let name = *MAP_PROPERTIES.choose(b.rng()).unwrap_or(&"a");
        if properties.iter().all(|(known, _)| *known != name) {
            let value = b.random_js_value();
            properties.push((name, value));
        }
    }
    properties
}

fn primitive_value(b: &mut ProgramBuilder, _: &[Variable]) {
    match b.rng().gen_range(0..3) {
        0 => {
            let value = b.random_integer();
            b.load_integer(value);
        }
        1 => {
            let value = b.random_float();
            b.load_float(value);
        }
        _ => {
            let value = b.random_string();
            b.load_string(&value);
        }
    }
}

fn create_map_object(b: &mut ProgramBuilder, _: &[Variable]) {
    let properties = random_map_properties(b);
    b.create_object(&properties);
}

fn object_maker(b: &mut ProgramBuilder, _: &[Variable]) {
    let num_parameters = b.random_parameter_count();
    let maker = b.build_plain_function(num_parameters, |b, _| {
        let properties = random_map_properties(b);
        let object = b.create_object(&properties);
        b.do_return(Some(object));
    });
    for _ in 0..b.rng().gen_range(1..=3) {
        call_once(b, maker);
    }
}

fn map_property_load(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let name = *MAP_PROPERTIES.choose(b.rng()).unwrap_or(&"a");
    b.get_property(inputs[0], name);
}

fn map_property_store(b: &mut ProgramBuilder, inputs: &[Variable]) {
    for _ in 0..b.rng().gen_range(1..=3) {
        let name = *MAP_PROPERTIES.choose(b.rng()).unwrap_or(&"a");
        let value = b.random_js_value();
        b.set_property(inputs[0], name, value);
    }
}

fn map_function_definition(b: &mut ProgramBuilder, _: &[Variable]) {
    let num_parameters = b.random_parameter_count();
    let f = b.build_plain_function(num_parameters, |b, _| {
        b.build_recursive();
        let value = b.random_js_value();
        b.do_return(Some(value));
    });
    for _ in 0..3 {
        call_once(b, f);
    }
}

fn map_function_call(b: &mut ProgramBuilder, inputs: &[Variable]) {
    call_once(b, inputs[0]);
}

fn map_function_jit_call(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let function = inputs[0];
    let args = b.random_arguments(function);
    b.build_repeat_loop(JIT_ITERATIONS, |b, _| {
        b.call_function(function, args, false);
    });
}

fn map_transition_fuzzer(b: &mut ProgramBuilder) {
    let js = Context::JAVASCRIPT;
    let object = InputContract::Required(is_plain_object);
    let function = InputContract::Required(ILType::is_callable);
    let generators = Arc::new(WeightedList::from_items(vec![
        (CodeGenerator::new("PrimitiveValue", js, primitive_value), 2),
        (CodeGenerator::new("CreateObject", js, create_map_object), 1),
        (CodeGenerator::new("ObjectMaker", js, object_maker), 1),
        (CodeGenerator::new("PropertyStore", js, map_property_store).with_input(object), 10),
        (CodeGenerator::new("PropertyLoad", js, map_property_load).with_input(object), 10),
        (CodeGenerator::new("FunctionDefinition", js, map_function_definition).recursive(), 2),
        (CodeGenerator::new("FunctionCall", js, map_function_call).with_input(function), 3),
        (CodeGenerator::new("FunctionJitCall", js, map_function_jit_call).with_input(function), 2),
    ]));
    b.with_generators(generators, |b| {
        for _ in 0..b.config().prefix_size {
            create_map_object(b, &[]);
        }
        b.build(100);
    });
    b.build(10);
}

fn value_serializer_fuzzer(b: &mut ProgramBuilder) {
    b.build_prefix();
    b.build(50);

    let value = b.random_js_value();
    let index = b.rng().gen_range(0..100);
    let flip = b.rng().gen_bool(0.5);
    let bit = 1i64 << b.rng().gen_range(0..8);
    let replacement = b.rng().gen_range(0..256);
    b.build_try_catch(
        |b| {
            let global = b.load_builtin("globalThis");
            let d8 = b.get_property(global, "d8");
            let serializer = b.get_property(d8, "serializer");
            let content = b.call_method(serializer, "serialize", vec![value], false);
            let uint8_array = b.load_builtin("Uint8Array");
            let bytes = b.construct(uint8_array, vec![content], false);
            let new_byte = if flip {
                let bit = b.load_integer(bit);
                let old = b.get_element(bytes, index);
                b.binary(old, bit, BinaryOperator::Xor)
            } else {
                b.load_integer(replacement)
            };
            b.set_element(bytes, index, new_byte);
            b.call_method(serializer, "deserialize", vec![content], false);
        },
        |b, _| {
            b.load_undefined();
        },
    );
    b.build(10);
}

const TWO_BYTE_SUBJECT: &str = "f\u{1F4A9}ba\u{2603}";
const LAST_INDICES: [&str; 18] = [
    "undefined", "-1", "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "50", "4294967296",
    "2147483647", "2147483648", "NaN", "Not a Number",
];
const REPLACEMENTS: [&str; 3] = ["X", "$1$2$3", "$$$&$`$'$1"];

fn regexp_fuzzer(b: &mut ProgramBuilder) {
    let f = b.build_plain_function(0, |b, _| {
        let env = Arc::clone(&b.fuzz_context().environment);
        let pattern = env.regexp_patterns.choose(b.rng()).cloned().unwrap_or_default();
        let flags = env.regexp_flags.choose(b.rng()).cloned().unwrap_or_default();
        let regexp = b.load_regexp(&pattern, &flags);
        let last_index = *LAST_INDICES.choose(b.rng()).unwrap_or(&"0");
        let last_index = b.load_string(last_index);
        b.set_property(regexp, "lastIndex", last_index);

        let subject = if b.rng().gen_bool(0.1) {
            b.load_string(TWO_BYTE_SUBJECT)
        } else {
            let subject = b.random_string();
            b.load_string(&subject)
        };
        let result = b.load_null();
        b.build_try_catch(
            |b| {
                let outcome = match b.rng().gen_range(0..4) {
                    0 => b.call_method(regexp, "exec", vec![subject], false),
                    1 => b.call_method(subject, "match", vec![regexp], false),
                    2 => {
                        let replacement = if b.rng().gen_bool(0.5) {
                            b.random_string()
                        } else {
                            REPLACEMENTS.choose(b.rng()).unwrap_or(&"X").to_string()
                        };
                        let replacement = b.load_string(&replacement);
                        b.call_method(subject, "replace", vec![regexp, replacement], false)
                    }
                    _ => b.call_method(subject, "search", vec![regexp], false),
                };
                b.reassign(result, outcome);
            },
            |b, _| {
                b.load_undefined();
            },
        );
        b.do_return(Some(result));
    });
    b.call_function(f, vec![], false);
    b.build(SMALL_BLOCK);
}

// WebAssembly templates. All of them generate under the WebAssembly generator set.

fn with_wasm_generators(b: &mut ProgramBuilder, body: impl FnOnce(&mut ProgramBuilder)) {
    let wasm = Arc::clone(&b.fuzz_context().wasm_generators);
    b.with_generators(wasm, body);
}

/// Names and signatures of the functions exported by `exports`
fn exported_functions(b: &ProgramBuilder, exports: Variable) -> Vec<(String, WasmSignature)> {
    b.type_of(exports)
        .module_signature()
        .map(|signature| {
            signature
                .exports
                .iter()
                .filter_map(|export| match &export.entity {
                    EntityType::Function(sig) => Some((export.name.clone(), sig.clone())),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn call_export(b: &mut ProgramBuilder, exports: Variable, name: &str, signature: &WasmSignature) -> Variable {
    let function = b.get_wasm_export(exports, name);
    let args = signature.params.iter().map(|ty| js_argument_for(b, *ty)).collect();
    b.call_function(function, args, true)
}

fn call_every_export(b: &mut ProgramBuilder, exports: Variable) {
    for (name, signature) in exported_functions(b, exports) {
        call_export(b, exports, &name, &signature);
    }
}

fn write_random_bytes(b: &mut ProgramBuilder, memory: Variable, offsets: std::ops::RangeInclusive<u64>, max_len: usize) {
    let offset = b.rng().gen_range(offsets);
    let len = b.rng().gen_range(1..=max_len);
    let bytes = (0..len).map(|_| b.rng().gen()).collect();
    b.write_wasm_memory(memory, offset, bytes);
}

/// A function of `signature` whose body is generated code
fn build_generated_wasm_function(b: &mut ProgramBuilder, signature: WasmSignature, body_size: usize) -> Variable {
    let result = signature.result();
    b.build_wasm_function(signature, |b, _| {
        b.build(body_size);
        result.map(|ty| b.wasm_value_of(ty))
    })
}

fn wasm_fuzzer(b: &mut ProgramBuilder) {
    b.build_prefix();
    with_wasm_generators(b, |b| {
        let (_, exports) = b.build_random_wasm_module();
        let memory = b.get_wasm_memory(exports, 0);
        for _ in 0..5 {
            write_random_bytes(b, memory, 0..=1023, 32);
        }
        call_every_export(b, exports);
        let globals: Vec<String> = b
            .type_of(exports)
            .module_signature()
            .map(|s| {
                s.exports
                    .iter()
                    .filter(|e| e.entity.category() == EntityCategory::Global)
                    .map(|e| e.name.clone())
                    .collect()
            })
            .unwrap_or_default();
        if let Some(name) = globals.choose(b.rng()).cloned() {
            let global = b.get_wasm_global(exports, &name);
            let operand = b.load_integer(42);
            b.binary(global, operand, BinaryOperator::Add);
        }
    });
}

fn complex_wasm_fuzzer(b: &mut ProgramBuilder) {
    b.build_prefix();
    with_wasm_generators(b, |b| {
        let memory = b.create_wasm_memory(1, Some(4), false);
        let table = b.create_wasm_table(WasmValueType::FuncRef, 10, None);
        let global = b.create_wasm_global(WasmLiteral::I32(1), true);
        let callback = b.build_plain_function(2, |b, params| {
            b.build_recursive();
            b.do_return(Some(params[0]));
        });

        let (module, _) = b.build_wasm_module(|b| {
            b.wasm_import_function(callback, WasmSignature::new(vec![WasmValueType::I32; 2], vec![WasmValueType::I32]));
            b.wasm_import_global(global);
            b.wasm_import_table(table);
            b.wasm_import_memory(memory);
            b.build(20);
            let signature = b.random_wasm_signature();
            build_generated_wasm_function(b, signature, 20);
        });
        let signature = b.type_of(module).module_signature().cloned().unwrap_or_default();
        let imports = imports_for(b, &signature);
        let exports = b.instantiate_wasm(module, imports);
        let exported_memory = b.get_wasm_memory(exports, 0);
        for (start, end) in [(0, 128), (256, 384), (512, 640), (768, 896)] {
            write_random_bytes(b, exported_memory, start..=end, 64);
            if b.rng().gen_bool(0.5) {
                call_every_export(b, exports);
            }
        }

        let edge_cases: [(i64, i64); 3] = [(42, 7), (0, 0), (i64::MAX, i64::MIN)];
        for (name, signature) in exported_functions(b, exports) {
            let (lhs, rhs) = *edge_cases.choose(b.rng()).unwrap_or(&(0, 0));
            let function = b.get_wasm_export(exports, &name);
            let args = signature
                .params
                .iter()
                .enumerate()
                .map(|(i, ty)| {
                    let value = if i % 2 == 0 { lhs } else { rhs };
                    match ty {
                        WasmValueType::I64 => b.load_bigint(value),
                        _ => b.load_integer(value),
                    }
                })
                .collect();
            b.call_function(function, args, true);
        }

        let flag = b.get_wasm_global(exports, "global0");
        let one = b.load_integer(1);
        let condition = b.compare(flag, one, Comparator::Equal);
        b.build_if_else(condition, |b| call_every_export(b, exports), |b| b.build(SMALL_BLOCK));

        b.build_repeat_loop(10, |b, _| {
            call_every_export(b, exports);
            let byte = b.rng().gen();
            b.write_wasm_memory(exported_memory, 8, vec![byte]);
        });
    });
}

fn wasm_memory_test(b: &mut ProgramBuilder) {
    b.build_prefix();
    with_wasm_generators(b, |b| {
        let (_, exports) = b.build_wasm_module(|b| {
            let memory = b.wasm_define_memory(1, Some(2));
            let signature = WasmSignature::new(vec![WasmValueType::I32], vec![WasmValueType::I32]);
            b.build_wasm_function(signature, |b, params| {
                let value = b.wasm_memory_load(memory, params[0], WasmValueType::I32, 0);
                let one = b.wasm_const(WasmLiteral::I32(1));
                let next = b.wasm_int_binary(NumWidth::Bits32, IntBinaryOp::Add, value, one);
                b.wasm_memory_store(memory, params[0], next, WasmValueType::I32, 0);
                b.build(10);
                Some(next)
            });
        });
        let memory = b.get_wasm_memory(exports, 0);
        for _ in 0..3 {
            write_random_bytes(b, memory, 0..=65532, 4);
        }
        b.build_repeat_loop(JIT_ITERATIONS, |b, i| {
            let function = b.get_wasm_export(exports, "function0");
            b.call_function(function, vec![i], true);
        });
        b.build(SMALL_BLOCK);
    });
}

fn wasm_global_test(b: &mut ProgramBuilder) {
    b.build_prefix();
    with_wasm_generators(b, |b| {
        let ty = b.random_numeric_type();
        let initial = b.random_wasm_literal(ty);
        let imported = b.create_wasm_global(initial, true);
        let (_, exports) = b.build_wasm_module(|b| {
            let global = b.wasm_import_global(imported);
            let literal = b.random_wasm_literal(ty);
            let mutable = b.rng().gen_bool(0.5);
            b.wasm_define_global(literal, mutable);
            b.build_wasm_function(WasmSignature::new(vec![], vec![ty]), |b, _| {
                let value = b.wasm_load_global(global);
                b.build(10);
                let stored = b.wasm_value_of(ty);
                b.wasm_store_global(global, stored);
                Some(value)
            });
        });
        call_every_export(b, exports);
        for name in ["global0", "global1"] {
            let value = b.get_wasm_global(exports, name);
            let operand = if ty == WasmValueType::I64 {
                b.load_bigint(2)
            } else {
                b.load_integer(2)
            };
            b.binary(value, operand, BinaryOperator::Mul);
        }
        b.get_property(imported, "value");
    });
}

fn wasm_function_test(b: &mut ProgramBuilder) {
    b.build_prefix();
    with_wasm_generators(b, |b| {
        let (_, exports) = b.build_wasm_module(|b| {
            for _ in 0..b.rng().gen_range(2..=4) {
                let signature = b.random_wasm_signature();
                build_generated_wasm_function(b, signature, 15);
            }
        });
        for (name, signature) in exported_functions(b, exports) {
            b.build_repeat_loop(JIT_ITERATIONS, |b, _| {
                call_export(b, exports, &name, &signature);
            });
        }
    });
}

fn wasm_table_test(b: &mut ProgramBuilder) {
    b.build_prefix();
    with_wasm_generators(b, |b| {
        let element = *WasmValueType::REFERENCE.choose(b.rng()).unwrap_or(&WasmValueType::FuncRef);
        let table = b.create_wasm_table(element, 4, Some(16));
        let (_, exports) = b.build_wasm_module(|b| {
            let imported = b.wasm_import_table(table);
            b.wasm_define_table(element, 2, None);
            b.build_wasm_function(WasmSignature::new(vec![WasmValueType::I32], vec![]), |b, params| {
                let entry = b.wasm_table_get(imported, params[0]);
                let index = b.wasm_const(WasmLiteral::I32(0));
                b.wasm_table_set(imported, index, entry);
                b.build(10);
                None
            });
        });
        call_every_export(b, exports);
        let delta = b.load_integer(2);
        b.call_method(table, "grow", vec![delta], true);
        let length = b.get_property(table, "length");
        b.call_method(table, "get", vec![length], true);
    });
}

fn wasm_import_test(b: &mut ProgramBuilder) {
    b.build_prefix();
    with_wasm_generators(b, |b| {
        let num_parameters = b.random_parameter_count();
        let callback = b.build_plain_function(num_parameters, |b, _| {
            b.build(SMALL_BLOCK);
            let value = b.random_js_value();
            b.do_return(Some(value));
        });
        let (module, exports) = b.build_wasm_module(|b| {
            let signature = b.random_wasm_signature();
            let import = b.wasm_import_function(callback, signature.clone());
            let outer = b.random_wasm_signature();
            b.build_wasm_function(outer.clone(), |b, _| {
                let args = signature.params.iter().map(|ty| b.wasm_value_of(*ty)).collect();
                b.wasm_call_function(import, args);
                b.build(10);
                outer.result().map(|ty| b.wasm_value_of(ty))
            });
        });
        call_every_export(b, exports);
        let replacement = b.build_plain_function(0, |b, _| {
            let value = b.random_js_value();
            b.do_return(Some(value));
        });
        let second = b.instantiate_wasm(module, vec![replacement]);
        call_every_export(b, second);
    });
}

fn wasm_memory_fuzzer(b: &mut ProgramBuilder) {
    b.build_prefix();
    with_wasm_generators(b, |b| {
        let shared = b.rng().gen_bool(0.3);
        let imported = b.create_wasm_memory(1, Some(2), shared);
        let (_, exports) = b.build_wasm_module(|b| {
            b.wasm_import_memory(imported);
            b.wasm_define_memory(1, None);
            b.build(20);
            let signature = b.random_wasm_signature();
            build_generated_wasm_function(b, signature, 20);
        });
        for index in 0..2 {
            let memory = b.get_wasm_memory(exports, index);
            for offset in [0, 65532, 65535, 65536] {
                let byte = b.rng().gen();
                b.write_wasm_memory(memory, offset, vec![byte]);
            }
        }
        b.build_repeat_loop(10, |b, _| call_every_export(b, exports));
        let delta = b.load_integer(1);
        b.call_method(imported, "grow", vec![delta], true);
        call_every_export(b, exports);
    });
}

fn wasm_import_export_fuzzer(b: &mut ProgramBuilder) {
    b.build_prefix();
    with_wasm_generators(b, |b| {
        let global = b.create_wasm_global(WasmLiteral::I64(0), true);
        let (module, first) = b.build_wasm_module(|b| {
            let imported = b.wasm_import_global(global);
            b.build_wasm_function(WasmSignature::new(vec![WasmValueType::I64], vec![WasmValueType::I64]), |b, params| {
                let current = b.wasm_load_global(imported);
                let sum = b.wasm_int_binary(NumWidth::Bits64, IntBinaryOp::Add, current, params[0]);
                b.wasm_store_global(imported, sum);
                b.build(10);
                Some(sum)
            });
        });
        let other = b.create_wasm_global(WasmLiteral::I64(1 << 40), true);
        let second = b.instantiate_wasm(module, vec![other]);
        for exports in [first, second] {
            call_every_export(b, exports);
        }
        let export = b.get_wasm_export(first, "function0");
        let (_, relay) = b.build_wasm_module(|b| {
            let import = b.wasm_import_function(
                export,
                WasmSignature::new(vec![WasmValueType::I64], vec![WasmValueType::I64]),
            );
            b.build_wasm_function(WasmSignature::new(vec![], vec![WasmValueType::I64]), |b, _| {
                let arg = b.wasm_const(WasmLiteral::I64(3));
                b.wasm_call_function(import, vec![arg]).first().copied()
            });
        });
        call_every_export(b, relay);
        b.get_property(global, "value");
    });
}

fn complex_wasm_test(b: &mut ProgramBuilder) {
    b.build_prefix();
    with_wasm_generators(b, |b| b.build(60));
    b.build(SMALL_BLOCK);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FuzzContext;
    use wasp_core::FuzzConfig;

    fn context() -> Arc<FuzzContext> {
        Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap())
    }

    #[test]
    fn test_every_template_produces_valid_programs() {
        let fuzz = context();
        for (template, _) in all_templates() {
            for seed in 0..5 {
                let mut b = ProgramBuilder::new(Arc::clone(&fuzz), seed);
                template.run(&mut b);
                let result = b.finalize();
                assert!(result.is_ok(), "{} (seed {}): {:?}", template.name, seed, result.err());
            }
        }
    }

    #[test]
    fn test_templates_restore_generator_set() {
        let fuzz = context();
        let mut b = ProgramBuilder::new(Arc::clone(&fuzz), 1);
        for (template, _) in all_templates() {
            template.run(&mut b);
            assert!(Arc::ptr_eq(b.active_generators(), &fuzz.generators), "{}", template.name);
            b.reset();
        }
    }

    #[test]
    fn test_wasm_templates_embed_modules() {
        let fuzz = context();
        let names = ["WasmFuzzer", "WasmMemoryTest", "WasmGlobalTest", "WasmImportTest"];
        for (template, _) in all_templates().into_iter().filter(|(t, _)| names.contains(&t.name)) {
            let mut b = ProgramBuilder::new(Arc::clone(&fuzz), 3);
            template.run(&mut b);
            let program = b.finalize().unwrap();
            assert!(
                program.iter().any(|inst| inst.operation == wasp_ir::Operation::BeginWasmModule),
                "{}",
                template.name
            );
        }
    }

    #[test]
    fn test_default_template_weights() {
        let table = default_weights();
        assert_eq!(table.len(), 19);
        assert_eq!(table.weight("JSONFuzzer"), Some(1));
        assert_eq!(table.weight("ComplexWasmTest"), Some(5));
    }
}
