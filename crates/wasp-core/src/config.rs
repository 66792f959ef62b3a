//! Configuration types for program generation and fuzzing sessions.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Program builder limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Maximum nesting of recursive generators before only leaf generators are eligible
    pub max_recursion_depth: usize,
    /// Number of value generators run by `build_prefix`
    pub prefix_size: usize,
    /// Upper bound on the instruction budget handed to a recursive build
    pub recursive_budget: usize,
    /// Consecutive generator draws that append nothing before `build` gives up
    pub max_consecutive_failures: usize,
    /// Maximum number of parameters for generated functions and signatures
    pub max_parameters: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 3,
            prefix_size: 5,
            recursive_budget: 8,
            max_consecutive_failures: 10,
            max_parameters: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Upper bound on instructions changed in one mutation pass
    pub max_simultaneous_mutations: usize,
    /// Attempts before a mutation round gives up on producing a valid program
    pub max_attempts: usize,
    /// Instruction budget of the code generation mutator
    pub codegen_budget: usize,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            max_simultaneous_mutations: 3,
            max_attempts: 10,
            codegen_budget: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LiftingOptions {
    /// Emit the textual IR of every instruction as a `//` comment
    pub include_comments: bool,
}

/// Limits for the in-process WebAssembly runner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Fuel granted to every export invocation
    pub max_fuel: u64,
    /// Maximum wasm stack size in bytes
    pub max_wasm_stack: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_fuel: 100_000,
            max_wasm_stack: 512 * 1024,
        }
    }
}

/// Fuzzing session parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Programs generated per worker
    pub iterations: u64,
    /// Instruction budget per generated program
    pub instructions: usize,
    /// Mutation passes applied to each generated program
    pub mutation_rounds: usize,
    /// Attempts to obtain a program that embeds WebAssembly
    pub module_generation_attempts: usize,
    /// Base seed; workers derive their own seed from it
    pub seed: u64,
    /// Directory receiving lifted programs
    pub output_dir: String,
    /// Store every program instead of only those that trapped
    pub store_all: bool,
    /// Run embedded modules in the in-process runner
    pub execute_modules: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            iterations: 100,
            instructions: 120,
            mutation_rounds: 5,
            module_generation_attempts: 50,
            seed: 0,
            output_dir: "./wasp-out".to_string(),
            store_all: false,
            execute_modules: true,
        }
    }
}

/// Per-name weight overrides applied on top of the built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightOverrides {
    pub generators: BTreeMap<String, u32>,
    pub templates: BTreeMap<String, u32>,
    pub mutators: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FuzzConfig {
    pub builder: BuilderConfig,
    pub mutation: MutationConfig,
    pub lifting: LiftingOptions,
    pub runtime: RuntimeConfig,
    pub session: SessionConfig,
    pub weights: WeightOverrides,
}

impl FuzzConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: FuzzConfig = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loaded configuration from {}", path.as_ref().display());
        Self::from_json_str(&text)
    }

    fn check(&self) -> Result<()> {
        if self.session.workers == 0 {
            return Err(Error::Config("session.workers must be at least 1".to_string()));
        }
        if self.mutation.max_simultaneous_mutations == 0 {
            return Err(Error::Config(
                "mutation.max_simultaneous_mutations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
