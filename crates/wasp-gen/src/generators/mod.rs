//! The built-in code generators and their default weights.

mod js;
mod values;
mod wasm;
mod wasm_function;
mod wasm_module;

use crate::generator::{CodeGenerator, GeneratorSet};
use crate::weighted::WeightedList;
use wasp_core::WeightTable;

pub(crate) use wasm::{imports_for, js_argument_for};

/// Generators that create fresh values without inputs
pub fn value_generators() -> Vec<(CodeGenerator, u32)> {
    values::generators()
}

/// Everything needed to build WebAssembly: values, the JavaScript side, module bodies and function bodies
pub fn wasm_generators() -> Vec<(CodeGenerator, u32)> {
    let mut all = values::generators();
    all.extend(wasm::generators());
    all.extend(wasm_module::generators());
    all.extend(wasm_function::generators());
    all
}

pub fn all_generators() -> Vec<(CodeGenerator, u32)> {
    let mut all = values::generators();
    all.extend(js::generators());
    all.extend(wasm::generators());
    all.extend(wasm_module::generators());
    all.extend(wasm_function::generators());
    all
}

/// Default weight of every built-in generator, keyed by name
pub fn default_weights() -> WeightTable {
    let defaults: Vec<(&str, u32)> = all_generators()
        .iter()
        .map(|(generator, weight)| (generator.name, *weight))
        .collect();
    WeightTable::new("generator", &defaults)
}

/// A generator set with weights taken from `weights`
pub fn weighted_set(generators: Vec<(CodeGenerator, u32)>, weights: &WeightTable) -> GeneratorSet {
    WeightedList::from_items(generators).reweighted(weights, |generator| generator.name)
}
