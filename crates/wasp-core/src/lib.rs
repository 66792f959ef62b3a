//! Core types and utilities shared by the Wasp program generator.

pub mod config;
pub mod error;
pub mod number;
pub mod outcome;
pub mod weights;

pub use config::*;
pub use error::{Error, Result};
pub use number::js_number_to_string;
pub use outcome::{ExecutionOutcome, TrapKind, WasmValue};
pub use weights::WeightTable;
