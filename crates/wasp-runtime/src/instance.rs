//! Module instance management.

use crate::host_functions::{HostImports, HostState};
use crate::values::{val_to_value, value_to_val, zero_val};
use tracing::debug;
use wasmtime::*;
use wasp_core::{Error, ExecutionOutcome, Result, RuntimeConfig, TrapKind, WasmValue};
use wasp_ir::{EntityType, ModuleSignature, WasmSignature};

/// An instantiated embedded module
pub struct ModuleInstance {
    store: Store<HostState>,
    instance: Instance,
    signature: ModuleSignature,
    config: RuntimeConfig,
}

impl ModuleInstance {
    pub fn new(
        engine: &Engine,
        wasm_bytes: &[u8],
        signature: ModuleSignature,
        host_imports: &HostImports,
        config: RuntimeConfig,
    ) -> Result<Self> {
        let module = Module::new(engine, wasm_bytes)
            .map_err(|e| Error::Wasm(format!("Failed to compile module: {}", e)))?;

        let mut store = Store::new(engine, HostState::default());
        let mut linker = Linker::new(engine);
        host_imports
            .add_to_linker(&mut store, &mut linker)
            .map_err(|e| Error::Wasm(format!("Failed to define imports: {}", e)))?;

        store
            .set_fuel(config.max_fuel)
            .map_err(|e| Error::Wasm(format!("Failed to set fuel: {}", e)))?;

        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(|e| Error::Wasm(format!("Failed to instantiate: {}", e)))?;

        Ok(Self {
            store,
            instance,
            signature,
            config,
        })
    }

    pub fn signature(&self) -> &ModuleSignature {
        &self.signature
    }

    /// Names of the exported functions with their signatures, in export order
    pub fn function_exports(&self) -> Vec<(String, WasmSignature)> {
        self.signature
            .exports
            .iter()
            .filter_map(|export| match &export.entity {
                EntityType::Function(signature) => Some((export.name.clone(), signature.clone())),
                _ => None,
            })
            .collect()
    }

    /// Call an exported function. Traps are returned as outcomes.
    pub fn invoke(&mut self, name: &str, args: &[WasmValue]) -> Result<ExecutionOutcome> {
        self.store
            .set_fuel(self.config.max_fuel)
            .map_err(|e| Error::Wasm(format!("Failed to set fuel: {}", e)))?;

        let func = self
            .instance
            .get_func(&mut self.store, name)
            .ok_or_else(|| Error::NotFound(format!("function export {}", name)))?;
        let params: Vec<Val> = args.iter().map(value_to_val).collect();
        let mut results = vec![Val::I32(0); func.ty(&self.store).results().len()];

        match func.call(&mut self.store, &params, &mut results) {
            Ok(()) => {
                let values = results.iter().map(val_to_value).collect::<Result<Vec<_>>>()?;
                debug!("{} returned after {} fuel", name, self.fuel_consumed());
                Ok(ExecutionOutcome::Returned(values))
            }
            Err(e) => match e.downcast_ref::<Trap>() {
                Some(trap) => {
                    debug!("{} trapped: {}", name, trap);
                    Ok(ExecutionOutcome::Trapped(trap_kind(*trap)))
                }
                None => Err(Error::Wasm(format!("Call to {} failed: {}", name, e))),
            },
        }
    }

    /// Call an exported function with zero arguments of its parameter types
    pub fn invoke_with_defaults(&mut self, name: &str, signature: &WasmSignature) -> Result<ExecutionOutcome> {
        let args = signature
            .params
            .iter()
            .map(|ty| val_to_value(&zero_val(*ty)))
            .collect::<Result<Vec<_>>>()?;
        self.invoke(name, &args)
    }

    /// Current value of an exported global
    pub fn global_value(&mut self, name: &str) -> Result<WasmValue> {
        let global = self
            .instance
            .get_global(&mut self.store, name)
            .ok_or_else(|| Error::NotFound(format!("global export {}", name)))?;
        val_to_value(&global.get(&mut self.store))
    }

    /// Fuel consumed by the last invocation
    pub fn fuel_consumed(&self) -> u64 {
        self.config.max_fuel - self.store.get_fuel().unwrap_or(0)
    }

    /// Import names of host function stubs called so far
    pub fn host_calls(&self) -> Vec<String> {
        self.store.data().calls.lock().clone()
    }
}

pub fn trap_kind(trap: Trap) -> TrapKind {
    match trap {
        Trap::IntegerDivisionByZero => TrapKind::IntegerDivisionByZero,
        Trap::IntegerOverflow => TrapKind::IntegerOverflow,
        Trap::MemoryOutOfBounds | Trap::HeapMisaligned => TrapKind::MemoryOutOfBounds,
        Trap::TableOutOfBounds => TrapKind::TableOutOfBounds,
        Trap::UnreachableCodeReached => TrapKind::Unreachable,
        Trap::BadConversionToInteger => TrapKind::BadConversionToInteger,
        Trap::StackOverflow => TrapKind::StackOverflow,
        Trap::IndirectCallToNull => TrapKind::IndirectCallToNull,
        Trap::OutOfFuel => TrapKind::OutOfFuel,
        _ => TrapKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trap_classification() {
        assert_eq!(trap_kind(Trap::IntegerDivisionByZero), TrapKind::IntegerDivisionByZero);
        assert_eq!(trap_kind(Trap::HeapMisaligned), TrapKind::MemoryOutOfBounds);
        assert_eq!(trap_kind(Trap::OutOfFuel), TrapKind::OutOfFuel);
        assert_eq!(trap_kind(Trap::BadSignature), TrapKind::Other);
    }
}
