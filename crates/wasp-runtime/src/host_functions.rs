//! Host-side values for the imports of an embedded module.
//!
//! A module imports the JavaScript objects listed at its definition. Globals,
//! memories and tables are rebuilt from the instructions that created them;
//! JavaScript functions are replaced by stubs that record the call and
//! return zero values.

use crate::values::{literal_to_val, val_type, zero_val};
use parking_lot::Mutex;
use std::sync::Arc;
use wasmtime::*;
use wasp_core::{Error, Result};
use wasp_ir::{EntityType, Operation, Program, WasmLiteral, WasmSignature, WasmValueType};
use wasp_lift::wasm::{import_name, EncodedModule, IMPORT_MODULE};

/// Store data of an instance
#[derive(Debug, Clone, Default)]
pub struct HostState {
    /// Import names of the function stubs in call order
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl HostState {
    pub fn record_call(&self, name: &str) {
        self.calls.lock().push(name.to_string());
    }
}

/// The value supplied for one import
#[derive(Debug, Clone, PartialEq)]
pub enum HostImport {
    Global { value: WasmLiteral, mutable: bool },
    Memory { minimum: u32, maximum: Option<u32>, shared: bool },
    Table { element: WasmValueType, minimum: u32, maximum: Option<u32> },
    Function(WasmSignature),
}

#[derive(Debug, Clone, Default)]
pub struct HostImports {
    pub imports: Vec<HostImport>,
}

impl HostImports {
    /// Imports of `module`, in import section order
    pub fn from_program(program: &Program, module: &EncodedModule) -> Result<Self> {
        let mut imports = Vec::with_capacity(module.import_sources.len());
        for (source, entity) in module.import_sources.iter().zip(&module.signature.imports) {
            let creation = program.definition_of(*source).map(|inst| &inst.operation);
            let import = match (entity, creation) {
                (EntityType::Function(signature), _) => HostImport::Function(signature.clone()),
                (EntityType::Global { .. }, Some(Operation::CreateWasmGlobal { value, mutable })) => {
                    HostImport::Global {
                        value: *value,
                        mutable: *mutable,
                    }
                }
                (EntityType::Memory { .. }, Some(Operation::CreateWasmMemory { minimum, maximum, shared })) => {
                    HostImport::Memory {
                        minimum: *minimum,
                        maximum: *maximum,
                        shared: *shared,
                    }
                }
                (EntityType::Table { .. }, Some(Operation::CreateWasmTable { element, minimum, maximum })) => {
                    HostImport::Table {
                        element: *element,
                        minimum: *minimum,
                        maximum: *maximum,
                    }
                }
                _ => {
                    return Err(Error::NotFound(format!(
                        "no host value can supply the import {} from {}",
                        imports.len(),
                        source
                    )))
                }
            };
            imports.push(import);
        }
        Ok(Self { imports })
    }

    /// Define every import in the linker under `imports.import{N}`
    pub fn add_to_linker(
        &self,
        store: &mut Store<HostState>,
        linker: &mut Linker<HostState>,
    ) -> std::result::Result<(), anyhow::Error> {
        let engine = store.engine().clone();
        for (index, import) in self.imports.iter().enumerate() {
            let name = import_name(index);
            match import {
                HostImport::Global { value, mutable } => {
                    let mutability = if *mutable { Mutability::Var } else { Mutability::Const };
                    let ty = GlobalType::new(val_type(value.value_type()), mutability);
                    let global = Global::new(&mut *store, ty, literal_to_val(value))?;
                    linker.define(&*store, IMPORT_MODULE, &name, global)?;
                }
                HostImport::Memory { minimum, maximum, shared: true } => {
                    let ty = MemoryType::shared(*minimum, maximum.unwrap_or(*minimum));
                    let memory = SharedMemory::new(&engine, ty)?;
                    linker.define(&*store, IMPORT_MODULE, &name, memory)?;
                }
                HostImport::Memory { minimum, maximum, shared: false } => {
                    let memory = Memory::new(&mut *store, MemoryType::new(*minimum, *maximum))?;
                    linker.define(&*store, IMPORT_MODULE, &name, memory)?;
                }
                HostImport::Table { element, minimum, maximum } => {
                    let (ref_type, init) = match element {
                        WasmValueType::ExternRef => (RefType::EXTERNREF, Ref::Extern(None)),
                        _ => (RefType::FUNCREF, Ref::Func(None)),
                    };
                    let table = Table::new(&mut *store, TableType::new(ref_type, *minimum, *maximum), init)?;
                    linker.define(&*store, IMPORT_MODULE, &name, table)?;
                }
                HostImport::Function(signature) => {
                    let ty = FuncType::new(
                        &engine,
                        signature.params.iter().map(|t| val_type(*t)),
                        signature.results.iter().map(|t| val_type(*t)),
                    );
                    let zeros: Vec<Val> = signature.results.iter().map(|t| zero_val(*t)).collect();
                    let stub_name = name.clone();
                    linker.func_new(IMPORT_MODULE, &name, ty, move |caller, _params, results| {
                        caller.data().record_call(&stub_name);
                        for (slot, zero) in results.iter_mut().zip(&zeros) {
                            *slot = zero.clone();
                        }
                        Ok(())
                    })?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasp_core::FuzzConfig;
    use wasp_gen::{FuzzContext, ProgramBuilder};
    use wasp_lift::encode_modules;

    #[test]
    fn test_imports_follow_creation() {
        let mut b = ProgramBuilder::new(Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap()), 42);
        let table = b.create_wasm_table(WasmValueType::ExternRef, 2, Some(8));
        let global = b.create_wasm_global(WasmLiteral::F64(2.5), false);
        let function = b.load_builtin("Math");
        let signature = WasmSignature::new(vec![WasmValueType::I32], vec![]);
        b.build_wasm_module(|b| {
            b.wasm_import_table(table);
            b.wasm_import_global(global);
            b.wasm_import_function(function, signature.clone());
        });
        let program = b.finalize().unwrap();
        let module = &encode_modules(&program, &Arc::new(wasp_ir::Environment::javascript())).unwrap()[0];

        let imports = HostImports::from_program(&program, module).unwrap();
        assert_eq!(
            imports.imports,
            vec![
                HostImport::Table {
                    element: WasmValueType::ExternRef,
                    minimum: 2,
                    maximum: Some(8)
                },
                HostImport::Global {
                    value: WasmLiteral::F64(2.5),
                    mutable: false
                },
                HostImport::Function(signature),
            ]
        );
    }

    #[test]
    fn test_calls_are_recorded() {
        let state = HostState::default();
        let observer = state.clone();
        state.record_call("import0");
        assert_eq!(*observer.calls.lock(), vec!["import0".to_string()]);
    }
}
