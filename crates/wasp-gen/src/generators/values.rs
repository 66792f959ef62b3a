//! Value generators: create fresh JavaScript values without needing inputs.

use crate::builder::ProgramBuilder;
use crate::generator::CodeGenerator;
use rand::seq::SliceRandom;
use rand::Rng;
use wasp_ir::{Context, Variable};

const TYPED_ARRAYS: [&str; 4] = ["Uint8Array", "Int32Array", "Float64Array", "BigInt64Array"];

pub fn generators() -> Vec<(CodeGenerator, u32)> {
    let js = Context::JAVASCRIPT;
    vec![
        (CodeGenerator::new("IntegerGenerator", js, integer), 20),
        (CodeGenerator::new("BigIntGenerator", js, bigint), 10),
        (CodeGenerator::new("FloatGenerator", js, float), 10),
        (CodeGenerator::new("StringGenerator", js, string), 10),
        (CodeGenerator::new("BooleanGenerator", js, boolean), 2),
        (CodeGenerator::new("UndefinedGenerator", js, undefined), 1),
        (CodeGenerator::new("NullGenerator", js, null), 1),
        (CodeGenerator::new("RegExpGenerator", js, regexp), 5),
        (CodeGenerator::new("BuiltinGenerator", js, builtin), 10),
        (CodeGenerator::new("ObjectLiteralGenerator", js, object_literal), 10),
        (CodeGenerator::new("ArrayGenerator", js, array), 10),
        (CodeGenerator::new("IntArrayGenerator", js, int_array), 10),
        (CodeGenerator::new("FloatArrayGenerator", js, float_array), 10),
        (CodeGenerator::new("TypedArrayGenerator", js, typed_array), 20),
        (CodeGenerator::new("TrivialFunctionGenerator", js, trivial_function), 10),
    ]
}

fn integer(b: &mut ProgramBuilder, _: &[Variable]) {
    let value = b.random_integer();
    b.load_integer(value);
}

fn bigint(b: &mut ProgramBuilder, _: &[Variable]) {
    let value = b.random_integer();
    b.load_bigint(value);
}

fn float(b: &mut ProgramBuilder, _: &[Variable]) {
    let value = b.random_float();
    b.load_float(value);
}

fn string(b: &mut ProgramBuilder, _: &[Variable]) {
    let value = b.random_string();
    b.load_string(&value);
}

fn boolean(b: &mut ProgramBuilder, _: &[Variable]) {
    let value = b.rng().gen_bool(0.5);
    b.load_boolean(value);
}

fn undefined(b: &mut ProgramBuilder, _: &[Variable]) {
    b.load_undefined();
}

fn null(b: &mut ProgramBuilder, _: &[Variable]) {
    b.load_null();
}

fn regexp(b: &mut ProgramBuilder, _: &[Variable]) {
    let env = b.fuzz_context().environment.clone();
    let pattern = env.regexp_patterns.choose(b.rng()).cloned().unwrap_or_default();
    let flags = env.regexp_flags.choose(b.rng()).cloned().unwrap_or_default();
    b.load_regexp(&pattern, &flags);
}

fn builtin(b: &mut ProgramBuilder, _: &[Variable]) {
    let name = b.random_builtin();
    b.load_builtin(&name);
}

fn object_literal(b: &mut ProgramBuilder, _: &[Variable]) {
    let count = b.rng().gen_range(0..=3);
    let mut names: Vec<String> = Vec::with_capacity(count);
    for _ in 0..count {
        let name = b.random_property_name();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    let values: Vec<Variable> = names.iter().map(|_| b.random_js_value()).collect();
    let properties: Vec<(&str, Variable)> = names
        .iter()
        .map(|n| n.as_str())
        .zip(values)
        .collect();
    b.create_object(&properties);
}

fn array(b: &mut ProgramBuilder, _: &[Variable]) {
    let size = b.rng().gen_range(0..=4);
    let elements = (0..size).map(|_| b.random_js_value()).collect();
    b.create_array(elements);
}

fn int_array(b: &mut ProgramBuilder, _: &[Variable]) {
    let size = b.rng().gen_range(1..=6);
    let elements = (0..size)
        .map(|_| {
            let value = b.random_integer();
            b.load_integer(value)
        })
        .collect();
    b.create_array(elements);
}

fn float_array(b: &mut ProgramBuilder, _: &[Variable]) {
    let size = b.rng().gen_range(1..=6);
    let elements = (0..size)
        .map(|_| {
            let value = b.random_float();
            b.load_float(value)
        })
        .collect();
    b.create_array(elements);
}

fn typed_array(b: &mut ProgramBuilder, _: &[Variable]) {
    let name = TYPED_ARRAYS.choose(b.rng()).copied().unwrap_or("Uint8Array");
    let constructor = b.load_builtin(name);
    let length = b.rng().gen_range(0..=64);
    let length = b.load_integer(length);
    b.construct(constructor, vec![length], false);
}

fn trivial_function(b: &mut ProgramBuilder, _: &[Variable]) {
    b.build_plain_function(0, |b, _| {
        let value = b.random_js_value();
        b.do_return(Some(value));
    });
}
