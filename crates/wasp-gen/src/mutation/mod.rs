//! Mutation of existing programs.
//!
//! A mutation pass rebuilds a program instruction by instruction through a
//! [`ProgramBuilder`]: chosen instructions are handed to a [`Mutator`], all
//! others are adopted unchanged. The rebuilt program is validated by
//! `finalize`; invalid results are discarded and another attempt is made.

mod codegen;
mod input;
mod operation;
mod wasm;

pub use codegen::CodeGenMutator;
pub use input::InputMutator;
pub use operation::OperationMutator;
pub use wasm::WasmMutator;

use crate::builder::ProgramBuilder;
use crate::context::FuzzContext;
use crate::weighted::WeightedList;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, trace};
use wasp_core::{Error, MutationConfig, Result, WeightTable};
use wasp_ir::{Instruction, Operation, Program, Variable};

pub trait Mutator: Send {
    fn name(&self) -> &'static str;

    /// Reset per-program state before scanning `program`
    fn begin_mutation(&mut self, program: &Program);

    /// Called once for every instruction, in program order
    fn can_mutate(&mut self, inst: &Instruction) -> bool;

    /// Emit a replacement for `inst`, or adopt it unchanged when there is nothing to change
    fn mutate(&mut self, inst: &Instruction, builder: &mut ProgramBuilder);
}

pub fn all_mutators(budget: usize) -> Vec<(Box<dyn Mutator>, u32)> {
    vec![
        (Box::new(WasmMutator::new()), 3),
        (Box::new(OperationMutator::new()), 2),
        (Box::new(InputMutator::new()), 2),
        (Box::new(CodeGenMutator::new(budget)), 1),
    ]
}

pub fn default_weights() -> WeightTable {
    let defaults: Vec<(&str, u32)> = all_mutators(0)
        .iter()
        .map(|(mutator, weight)| (mutator.name(), *weight))
        .collect();
    WeightTable::new("mutator", &defaults)
}

pub struct MutationEngine {
    mutators: WeightedList<Box<dyn Mutator>>,
    config: MutationConfig,
}

impl MutationEngine {
    pub fn new(fuzz: &FuzzContext) -> Self {
        let config = fuzz.config.mutation.clone();
        let mutators = WeightedList::from_items(all_mutators(config.codegen_budget))
            .reweighted(&fuzz.mutator_weights, |mutator| mutator.name());
        Self { mutators, config }
    }

    /// Produce a valid mutant of `program`. Each attempt draws a mutator by weight.
    pub fn mutate(&mut self, program: &Program, builder: &mut ProgramBuilder) -> Result<Program> {
        let frozen = loop_control(program);

        for attempt in 1..=self.config.max_attempts {
            let index = self
                .mutators
                .choose_index_where(builder.rng(), |_, _| true)
                .ok_or_else(|| Error::Config("every mutator has weight 0".to_string()))?;
            let Some(mutator) = self.mutators.get_mut(index) else {
                continue;
            };
            let name = mutator.name();

            match apply(
                mutator.as_mut(),
                program,
                &frozen,
                builder,
                self.config.max_simultaneous_mutations,
            ) {
                Some(Ok(mutant)) => {
                    trace!("{} succeeded on attempt {}", name, attempt);
                    return Ok(mutant);
                }
                Some(Err(e)) => debug!("{} produced an invalid program: {}", name, e),
                None => trace!("{} found nothing to mutate", name),
            }
        }

        Err(Error::InvalidState(format!(
            "no valid mutant after {} attempts",
            self.config.max_attempts
        )))
    }
}

/// One rebuild of `program` with up to `max_mutations` instructions handed to `mutator`.
/// `None` when the mutator accepts no instruction.
fn apply(
    mutator: &mut dyn Mutator,
    program: &Program,
    frozen: &HashSet<usize>,
    builder: &mut ProgramBuilder,
    max_mutations: usize,
) -> Option<Result<Program>> {
    mutator.begin_mutation(program);
    let candidates: Vec<usize> = program
        .iter()
        .enumerate()
        .filter_map(|(idx, inst)| {
            let accepted = mutator.can_mutate(inst);
            (accepted && !frozen.contains(&idx)).then_some(idx)
        })
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let count = builder.rng().gen_range(1..=max_mutations.clamp(1, candidates.len()));
    let chosen: HashSet<usize> = candidates
        .choose_multiple(builder.rng(), count)
        .copied()
        .collect();

    builder.reset();
    builder.begin_adoption();
    for (idx, inst) in program.iter().enumerate() {
        if chosen.contains(&idx) {
            mutator.mutate(inst, builder);
        } else {
            builder.adopt(inst);
        }
        if frozen.contains(&idx) {
            for var in inst.all_outputs() {
                if let Some(renamed) = builder.map(var) {
                    builder.hide(renamed);
                }
            }
        }
    }
    Some(builder.finalize())
}

/// Instructions steering Wasm loops: loop labels, reassigned variables, everything
/// reading them, and the definitions of their operands. They are never mutated and
/// their outputs stay hidden from generated code, so every loop keeps terminating.
fn loop_control(program: &Program) -> HashSet<usize> {
    let mut steering: HashSet<Variable> = HashSet::new();
    for inst in program.iter() {
        match inst.operation {
            Operation::WasmBeginLoop => steering.extend(inst.inner_outputs.iter().copied()),
            Operation::WasmReassign => steering.extend(inst.input(0)),
            _ => {}
        }
    }

    let mut frozen: HashSet<usize> = program
        .iter()
        .enumerate()
        .filter(|(_, inst)| {
            inst.inputs
                .iter()
                .copied()
                .chain(inst.all_outputs())
                .any(|v| steering.contains(&v))
        })
        .map(|(idx, _)| idx)
        .collect();

    let operands: HashSet<Variable> = frozen
        .iter()
        .flat_map(|idx| program.instructions[*idx].inputs.iter().copied())
        .collect();
    for (idx, inst) in program.iter().enumerate() {
        if inst.outputs.iter().any(|v| operands.contains(v)) {
            frozen.insert(idx);
        }
    }
    frozen
}
