//! Code generators: small weighted routines that append instructions to a builder.

use crate::builder::ProgramBuilder;
use crate::weighted::WeightedList;
use std::fmt;
use wasp_ir::{Context, ILType, Variable};

pub type GeneratorBody = fn(&mut ProgramBuilder, &[Variable]);
pub type TypePredicate = fn(&ILType) -> bool;

/// What a generator needs bound before it runs
#[derive(Clone, Copy)]
pub enum InputContract {
    None,
    /// Any visible JavaScript value
    One,
    /// A visible variable satisfying the predicate; the generator is skipped otherwise
    Required(TypePredicate),
    /// A matching variable if one exists, otherwise any JavaScript value
    Preferred(TypePredicate),
}

#[derive(Clone)]
pub struct CodeGenerator {
    pub name: &'static str,
    pub inputs: InputContract,
    pub context: Context,
    /// Calls back into the builder to generate nested code
    pub recursive: bool,
    body: GeneratorBody,
}

impl CodeGenerator {
    pub fn new(name: &'static str, context: Context, body: GeneratorBody) -> Self {
        Self {
            name,
            inputs: InputContract::None,
            context,
            recursive: false,
            body,
        }
    }

    pub fn with_input(mut self, contract: InputContract) -> Self {
        self.inputs = contract;
        self
    }

    pub fn recursive(mut self) -> Self {
        self.recursive = true;
        self
    }

    pub fn run(&self, builder: &mut ProgramBuilder, inputs: &[Variable]) {
        (self.body)(builder, inputs)
    }
}

impl fmt::Debug for CodeGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeGenerator")
            .field("name", &self.name)
            .field("context", &self.context)
            .field("recursive", &self.recursive)
            .finish()
    }
}

pub type GeneratorSet = WeightedList<CodeGenerator>;
