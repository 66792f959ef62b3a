//! Intermediate representation for generated JavaScript and WebAssembly programs.
//!
//! A program is a flat list of instructions; blocks are delimited by
//! begin/end operations. The IR is designed to be:
//! - Mutation-friendly: every operation declares its arity and context
//! - Typed: a typer assigns a static type to every variable
//! - Serializable: programs round-trip through bincode exactly

pub mod dead_code;
pub mod environment;
pub mod instruction;
pub mod module_layout;
pub mod numeric;
pub mod operation;
pub mod program;
pub mod scope;
pub mod typer;
pub mod types;
pub mod validation;

pub use dead_code::DeadCodeAnalyzer;
pub use environment::Environment;
pub use instruction::{Instruction, Variable};
pub use module_layout::{ModuleEntity, ModuleLayout};
pub use operation::*;
pub use program::Program;
pub use scope::ScopeTracker;
pub use typer::Typer;
pub use types::*;
pub use validation::{check_arity, input_types_ok, validate_program};
