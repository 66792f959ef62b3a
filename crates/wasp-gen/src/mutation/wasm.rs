//! Mutations of the JavaScript operations that drive WebAssembly instances.

use super::Mutator;
use crate::builder::ProgramBuilder;
use rand::seq::SliceRandom;
use rand::Rng;
use wasp_ir::{DeadCodeAnalyzer, Instruction, Operation, Program};

const EXPORT_NAMES: [&str; 9] = ["memory", "table", "global", "func", "main", "start", "add", "sub", "mul"];
const GLOBAL_NAMES: [&str; 7] = ["g0", "g1", "g2", "global0", "global1", "value", "result"];
const MAX_IMPORTS: usize = 3;
const MAX_MEMORY_INDEX: u32 = 3;
const MAX_WRITE_OFFSET: u64 = 1024;
const MAX_WRITE_LENGTH: usize = 16;

/// Rewrites instantiation, export lookups and memory writes
pub struct WasmMutator {
    analyzer: DeadCodeAnalyzer,
}

impl WasmMutator {
    pub fn new() -> Self {
        Self {
            analyzer: DeadCodeAnalyzer::new(),
        }
    }

    /// A name from the pool, or sometimes a real export of the given category
    fn export_name(b: &mut ProgramBuilder, exports: wasp_ir::Variable, pool: &[&str], prefix: &str) -> String {
        if b.rng().gen_bool(0.5) {
            let ty = b.type_of(exports);
            let known: Vec<String> = ty
                .module_signature()
                .map(|sig| {
                    sig.exports
                        .iter()
                        .filter(|export| export.name.starts_with(prefix))
                        .map(|export| export.name.clone())
                        .collect()
                })
                .unwrap_or_default();
            if let Some(name) = known.choose(b.rng()) {
                return name.clone();
            }
        }
        pool.choose(b.rng()).map(|name| name.to_string()).unwrap_or_default()
    }
}

impl Default for WasmMutator {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutator for WasmMutator {
    fn name(&self) -> &'static str {
        "WasmMutator"
    }

    fn begin_mutation(&mut self, _program: &Program) {
        self.analyzer.reset();
    }

    fn can_mutate(&mut self, inst: &Instruction) -> bool {
        self.analyzer.analyze(inst);
        !self.analyzer.is_currently_dead()
            && matches!(
                inst.operation,
                Operation::InstantiateWasm { .. }
                    | Operation::GetWasmExport { .. }
                    | Operation::GetWasmMemory { .. }
                    | Operation::WriteWasmMemory { .. }
                    | Operation::GetWasmGlobal { .. }
            )
    }

    fn mutate(&mut self, inst: &Instruction, b: &mut ProgramBuilder) {
        let inputs = b.adopted_inputs(inst);
        let Some(&target) = inputs.first() else {
            b.adopt(inst);
            return;
        };

        let (operation, inputs) = match &inst.operation {
            Operation::InstantiateWasm { .. } => {
                let wanted = b.rng().gen_range(0..=MAX_IMPORTS);
                let mut inputs = vec![target];
                for _ in 0..wanted {
                    if let Some(import) = b.random_variable() {
                        inputs.push(import);
                    }
                }
                let num_imports = inputs.len() - 1;
                (Operation::InstantiateWasm { num_imports }, inputs)
            }
            Operation::GetWasmExport { .. } => {
                let export_name = Self::export_name(b, target, &EXPORT_NAMES, "");
                (Operation::GetWasmExport { export_name }, inputs)
            }
            Operation::GetWasmMemory { .. } => {
                let memory_index = b.rng().gen_range(0..=MAX_MEMORY_INDEX);
                (Operation::GetWasmMemory { memory_index }, inputs)
            }
            Operation::WriteWasmMemory { .. } => {
                let offset = b.rng().gen_range(0..=MAX_WRITE_OFFSET);
                let length = b.rng().gen_range(1..=MAX_WRITE_LENGTH);
                let bytes = (0..length).map(|_| b.rng().gen()).collect();
                (Operation::WriteWasmMemory { offset, bytes }, inputs)
            }
            Operation::GetWasmGlobal { .. } => {
                let global_name = Self::export_name(b, target, &GLOBAL_NAMES, "global");
                (Operation::GetWasmGlobal { global_name }, inputs)
            }
            _ => (inst.operation.clone(), inputs),
        };
        b.adopt_as(inst, operation, inputs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FuzzContext;
    use std::sync::Arc;
    use wasp_core::FuzzConfig;
    use wasp_ir::{WasmLiteral, WasmSignature, WasmValueType};

    fn builder(seed: u64) -> ProgramBuilder {
        ProgramBuilder::new(Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap()), seed)
    }

    fn instance_program() -> Program {
        let mut b = builder(42);
        let (_, exports) = b.build_wasm_module(|b| {
            b.wasm_define_memory(1, None);
            b.wasm_define_global(WasmLiteral::I32(3), true);
            b.build_wasm_function(WasmSignature::new(vec![], vec![WasmValueType::I32]), |b, _| {
                Some(b.wasm_const(WasmLiteral::I32(42)))
            });
        });
        let memory = b.get_wasm_memory(exports, 0);
        b.write_wasm_memory(memory, 0, vec![1, 2, 3]);
        b.get_wasm_global(exports, "global1");
        b.get_wasm_export(exports, "function2");
        b.finalize().unwrap()
    }

    #[test]
    fn test_accepts_only_wasm_driving_operations() {
        let program = instance_program();
        let mut mutator = WasmMutator::new();
        mutator.begin_mutation(&program);
        let accepted: Vec<&str> = program
            .iter()
            .filter(|inst| mutator.can_mutate(inst))
            .map(|inst| inst.operation.name())
            .collect();
        assert_eq!(
            accepted,
            vec!["GetWasmMemory", "WriteWasmMemory", "GetWasmGlobal", "GetWasmExport"]
        );
    }

    #[test]
    fn test_memory_write_stays_in_range() {
        let program = instance_program();
        let mut mutator = WasmMutator::new();
        for seed in 0..20 {
            let mut b = builder(seed);
            b.begin_adoption();
            for inst in program.iter() {
                if let Operation::WriteWasmMemory { .. } = inst.operation {
                    mutator.mutate(inst, &mut b);
                } else {
                    b.adopt(inst);
                }
            }
            let mutant = b.finalize().unwrap();
            let write = mutant
                .iter()
                .find_map(|inst| match &inst.operation {
                    Operation::WriteWasmMemory { offset, bytes } => Some((*offset, bytes.len())),
                    _ => None,
                })
                .unwrap();
            assert!(write.0 <= MAX_WRITE_OFFSET);
            assert!((1..=MAX_WRITE_LENGTH).contains(&write.1));
        }
    }

    #[test]
    fn test_instantiation_uses_existing_variables() {
        let mut b = builder(3);
        b.load_integer(1);
        b.load_string("x");
        let (module, _) = b.build_wasm_module(|_| {});
        b.instantiate_wasm(module, vec![]);
        let program = b.finalize().unwrap();

        let mut mutator = WasmMutator::new();
        for seed in 0..10 {
            let mut b = builder(seed);
            b.begin_adoption();
            for inst in program.iter() {
                if let Operation::InstantiateWasm { .. } = inst.operation {
                    mutator.mutate(inst, &mut b);
                } else {
                    b.adopt(inst);
                }
            }
            let mutant = b.finalize().unwrap();
            assert_eq!(mutant.len(), program.len());
            let last = &mutant.instructions[mutant.len() - 1];
            match last.operation {
                Operation::InstantiateWasm { num_imports } => assert!(num_imports <= MAX_IMPORTS),
                _ => panic!("expected instantiation, got {}", last),
            }
        }
    }
}
