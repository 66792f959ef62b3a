//! Rewiring of data flow: one input is replaced by another visible variable of the same type.

use super::Mutator;
use crate::builder::ProgramBuilder;
use rand::seq::SliceRandom;
use wasp_ir::{DeadCodeAnalyzer, Instruction, Operation, Program};

pub struct InputMutator {
    analyzer: DeadCodeAnalyzer,
}

impl InputMutator {
    pub fn new() -> Self {
        Self {
            analyzer: DeadCodeAnalyzer::new(),
        }
    }
}

impl Default for InputMutator {
    fn default() -> Self {
        Self::new()
    }
}

impl Mutator for InputMutator {
    fn name(&self) -> &'static str {
        "InputMutator"
    }

    fn begin_mutation(&mut self, _program: &Program) {
        self.analyzer.reset();
    }

    fn can_mutate(&mut self, inst: &Instruction) -> bool {
        self.analyzer.analyze(inst);
        // Reassignment targets keep their identity
        !self.analyzer.is_currently_dead()
            && !inst.inputs.is_empty()
            && !matches!(inst.operation, Operation::Reassign | Operation::WasmReassign)
    }

    fn mutate(&mut self, inst: &Instruction, b: &mut ProgramBuilder) {
        let mut inputs = b.adopted_inputs(inst);
        let slots: Vec<usize> = (0..inputs.len())
            .filter(|slot| !b.type_of(inputs[*slot]).is_label())
            .collect();

        if let Some(&slot) = slots.choose(b.rng()) {
            let ty = b.type_of(inputs[slot]);
            if let Some(replacement) = b.random_variable_matching(|candidate| *candidate == ty) {
                inputs[slot] = replacement;
            }
        }
        b.adopt_as(inst, inst.operation.clone(), inputs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FuzzContext;
    use std::sync::Arc;
    use wasp_core::FuzzConfig;
    use wasp_ir::{BinaryOperator, WasmLiteral, WasmSignature, WasmValueType};

    fn builder(seed: u64) -> ProgramBuilder {
        ProgramBuilder::new(Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap()), seed)
    }

    fn mutate_all(program: &Program, seed: u64) -> Program {
        let mut mutator = InputMutator::new();
        mutator.begin_mutation(program);
        let mut b = builder(seed);
        b.begin_adoption();
        for inst in program.iter() {
            if mutator.can_mutate(inst) {
                mutator.mutate(inst, &mut b);
            } else {
                b.adopt(inst);
            }
        }
        b.finalize().unwrap()
    }

    #[test]
    fn test_replacement_has_same_type() {
        let mut b = builder(1);
        let s = b.load_string("a");
        let i = b.load_integer(1);
        let j = b.load_integer(2);
        b.binary(i, j, BinaryOperator::Add);
        b.get_property(s, "length");
        let program = b.finalize().unwrap();

        for seed in 0..20 {
            let mutant = mutate_all(&program, seed);
            let add = &mutant.instructions[3];
            for input in &add.inputs {
                assert!(matches!(
                    mutant.definition_of(*input).map(|d| &d.operation),
                    Some(Operation::LoadInteger { .. })
                ));
            }
            assert_eq!(mutant.instructions[4].inputs, vec![wasp_ir::Variable(0)]);
        }
    }

    #[test]
    fn test_labels_and_reassignments_are_kept() {
        let mut b = builder(2);
        b.build_wasm_module(|b| {
            b.build_wasm_function(WasmSignature::new(vec![], vec![]), |b, _| {
                let x = b.wasm_const(WasmLiteral::I32(1));
                let y = b.wasm_const(WasmLiteral::I32(2));
                b.wasm_reassign(x, y);
                b.wasm_build_block(|b, label| {
                    b.wasm_branch_if(label, x);
                });
                None
            });
        });
        let program = b.finalize().unwrap();
        let reassign = program.iter().position(|i| i.operation == Operation::WasmReassign).unwrap();
        let branch = program.iter().position(|i| i.operation == Operation::WasmBranchIf).unwrap();

        for seed in 0..20 {
            let mutant = mutate_all(&program, seed);
            assert_eq!(mutant.instructions[reassign].inputs, program.instructions[reassign].inputs);
            assert_eq!(mutant.instructions[branch].inputs[0], program.instructions[branch].inputs[0]);
            let label = mutant.instructions[branch - 1].inner_outputs[0];
            assert_eq!(mutant.instructions[branch].inputs[0], label);
        }
    }

    #[test]
    fn test_no_candidate_keeps_input() {
        let mut b = builder(3);
        let f = b.load_float(1.5);
        b.unary(wasp_ir::UnaryOperator::Minus, f);
        let program = b.finalize().unwrap();
        let mutant = mutate_all(&program, 3);
        assert_eq!(mutant, program);
    }
}
