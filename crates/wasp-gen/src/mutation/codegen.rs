//! Insertion of freshly generated code after an existing instruction.

use super::Mutator;
use crate::builder::ProgramBuilder;
use wasp_ir::{DeadCodeAnalyzer, Instruction, Program};

pub struct CodeGenMutator {
    analyzer: DeadCodeAnalyzer,
    budget: usize,
}

impl CodeGenMutator {
    pub fn new(budget: usize) -> Self {
        Self {
            analyzer: DeadCodeAnalyzer::new(),
            budget,
        }
    }
}

impl Mutator for CodeGenMutator {
    fn name(&self) -> &'static str {
        "CodeGenMutator"
    }

    fn begin_mutation(&mut self, _program: &Program) {
        self.analyzer.reset();
    }

    fn can_mutate(&mut self, inst: &Instruction) -> bool {
        self.analyzer.analyze(inst);
        // Code after a jump would be unreachable
        !self.analyzer.is_currently_dead() && !inst.operation.is_jump()
    }

    fn mutate(&mut self, inst: &Instruction, b: &mut ProgramBuilder) {
        b.adopt(inst);
        b.build(self.budget);
    }
}
