//! In-process WebAssembly runner for the modules embedded in programs.
//!
//! This crate provides:
//! - Reconstruction of a module's imports from the program that defines it
//! - Fuel-bounded invocation of exported functions
//! - Trap classification; traps are outcomes, not errors

pub mod host_functions;
pub mod instance;
pub mod values;

pub use host_functions::{HostImport, HostImports, HostState};
pub use instance::ModuleInstance;

use std::sync::Arc;
use tracing::{debug, instrument};
use wasmtime::*;
use wasp_core::{Error, ExecutionOutcome, Result, RuntimeConfig};
use wasp_ir::{Environment, Program};
use wasp_lift::{encode_modules, EncodedModule};

/// Outcome of one exported function of one embedded module
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOutcome {
    pub module: usize,
    pub export: String,
    pub outcome: ExecutionOutcome,
}

/// The WASM runtime manager
pub struct Runtime {
    engine: Engine,
    config: RuntimeConfig,
    environment: Arc<Environment>,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_environment(config, Arc::new(Environment::javascript()))
    }

    /// Runtime typing module imports against a session's environment
    pub fn with_environment(config: RuntimeConfig, environment: Arc<Environment>) -> Result<Self> {
        let mut wasm_config = Config::new();
        wasm_config.consume_fuel(true);
        wasm_config.max_wasm_stack(config.max_wasm_stack);
        wasm_config.wasm_threads(true);

        let engine = Engine::new(&wasm_config)
            .map_err(|e| Error::Wasm(format!("Failed to create engine: {}", e)))?;

        Ok(Self {
            engine,
            config,
            environment,
        })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Instantiate the `index`-th module of a program, in program order
    pub fn instantiate(&self, program: &Program, index: usize) -> Result<ModuleInstance> {
        let modules = encode_modules(program, &self.environment)?;
        let module = modules
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("module {} of {}", index, modules.len())))?;
        self.instantiate_encoded(program, module)
    }

    pub fn instantiate_encoded(&self, program: &Program, module: &EncodedModule) -> Result<ModuleInstance> {
        let imports = HostImports::from_program(program, module)?;
        ModuleInstance::new(
            &self.engine,
            &module.bytes,
            module.signature.clone(),
            &imports,
            self.config.clone(),
        )
    }

    /// Invoke every exported function of every module with zero arguments
    #[instrument(skip_all, fields(instructions = program.len()))]
    pub fn execute_program(&self, program: &Program) -> Result<Vec<ExportOutcome>> {
        let mut outcomes = Vec::new();
        for (index, module) in encode_modules(program, &self.environment)?.iter().enumerate() {
            let mut instance = self.instantiate_encoded(program, module)?;
            for (export, signature) in instance.function_exports() {
                let outcome = instance.invoke_with_defaults(&export, &signature)?;
                outcomes.push(ExportOutcome {
                    module: index,
                    export,
                    outcome,
                });
            }
        }
        debug!("Executed {} exports", outcomes.len());
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_runtime() {
        let runtime = Runtime::new(RuntimeConfig::default());
        assert!(runtime.is_ok());
    }

    #[test]
    fn test_program_without_modules() {
        let runtime = Runtime::new(RuntimeConfig::default()).unwrap();
        let program = Program::new();
        assert!(runtime.execute_program(&program).unwrap().is_empty());
        assert!(matches!(runtime.instantiate(&program, 0), Err(Error::NotFound(_))));
    }
}
