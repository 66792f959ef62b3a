//! Probabilistic construction and mutation of programs.
//!
//! This crate provides:
//! - The program builder and the weighted code generators it draws from
//! - Program templates that direct the overall shape of a program
//! - Mutators that rewrite existing programs while keeping them valid

pub mod builder;
pub mod context;
pub mod generator;
pub mod generators;
pub mod mutation;
pub mod templates;
pub mod weighted;

pub use builder::ProgramBuilder;
pub use context::FuzzContext;
pub use generator::{CodeGenerator, GeneratorSet, InputContract};
pub use mutation::{MutationEngine, Mutator};
pub use templates::ProgramTemplate;
pub use weighted::WeightedList;
