//! WebAssembly instruction helpers, on both sides of the JS/Wasm boundary.

use super::ProgramBuilder;
use rand::seq::SliceRandom;
use rand::Rng;
use wasp_ir::{
    EntityCategory, EntityType, FloatBinaryOp, FloatCompareOp, FloatUnaryOp, ILType, IntBinaryOp,
    IntCompareOp, IntUnaryOp, NumWidth, Operation, Variable, WasmLiteral, WasmSignature,
    WasmValueType,
};

/// Iterations of generated Wasm loops
const WASM_LOOP_ITERATIONS: i32 = 10;

impl ProgramBuilder {
    // JavaScript side

    pub fn create_wasm_global(&mut self, value: WasmLiteral, mutable: bool) -> Variable {
        self.emit_value(Operation::CreateWasmGlobal { value, mutable }, vec![])
    }

    pub fn create_wasm_memory(&mut self, minimum: u32, maximum: Option<u32>, shared: bool) -> Variable {
        self.emit_value(Operation::CreateWasmMemory { minimum, maximum, shared }, vec![])
    }

    pub fn create_wasm_table(
        &mut self,
        element: WasmValueType,
        minimum: u32,
        maximum: Option<u32>,
    ) -> Variable {
        self.emit_value(Operation::CreateWasmTable { element, minimum, maximum }, vec![])
    }

    /// Define a module. Returns the compiled module and the exports of its first instance.
    pub fn build_wasm_module(&mut self, body: impl FnOnce(&mut Self)) -> (Variable, Variable) {
        self.emit(Operation::BeginWasmModule, vec![]);
        body(self);
        let end = self.emit(Operation::EndWasmModule, vec![]);
        (end.outputs[0], end.outputs[1])
    }

    pub fn instantiate_wasm(&mut self, module: Variable, imports: Vec<Variable>) -> Variable {
        let mut inputs = vec![module];
        let num_imports = imports.len();
        inputs.extend(imports);
        self.emit_value(Operation::InstantiateWasm { num_imports }, inputs)
    }

    pub fn get_wasm_export(&mut self, exports: Variable, name: &str) -> Variable {
        self.emit_value(
            Operation::GetWasmExport {
                export_name: name.to_string(),
            },
            vec![exports],
        )
    }

    pub fn get_wasm_memory(&mut self, exports: Variable, memory_index: u32) -> Variable {
        self.emit_value(Operation::GetWasmMemory { memory_index }, vec![exports])
    }

    pub fn write_wasm_memory(&mut self, memory: Variable, offset: u64, bytes: Vec<u8>) {
        self.emit(Operation::WriteWasmMemory { offset, bytes }, vec![memory]);
    }

    pub fn get_wasm_global(&mut self, exports: Variable, name: &str) -> Variable {
        self.emit_value(
            Operation::GetWasmGlobal {
                global_name: name.to_string(),
            },
            vec![exports],
        )
    }

    // Module body

    pub fn wasm_define_global(&mut self, value: WasmLiteral, mutable: bool) -> Variable {
        self.emit_value(Operation::WasmDefineGlobal { value, mutable }, vec![])
    }

    pub fn wasm_import_global(&mut self, source: Variable) -> Variable {
        self.emit_value(Operation::WasmImportGlobal, vec![source])
    }

    pub fn wasm_define_table(
        &mut self,
        element: WasmValueType,
        minimum: u32,
        maximum: Option<u32>,
    ) -> Variable {
        self.emit_value(Operation::WasmDefineTable { element, minimum, maximum }, vec![])
    }

    pub fn wasm_import_table(&mut self, source: Variable) -> Variable {
        self.emit_value(Operation::WasmImportTable, vec![source])
    }

    pub fn wasm_define_memory(&mut self, minimum: u32, maximum: Option<u32>) -> Variable {
        self.emit_value(Operation::WasmDefineMemory { minimum, maximum }, vec![])
    }

    pub fn wasm_import_memory(&mut self, source: Variable) -> Variable {
        self.emit_value(Operation::WasmImportMemory, vec![source])
    }

    pub fn wasm_import_function(&mut self, source: Variable, signature: WasmSignature) -> Variable {
        self.emit_value(Operation::WasmImportFunction { signature }, vec![source])
    }

    /// Whether an import of this category may still be declared in the current module
    pub fn can_import(&self, category: EntityCategory) -> bool {
        self.typer
            .current_module()
            .map(|module| module.can_import(category))
            .unwrap_or(false)
    }

    /// Number of entities of a category in the module being defined
    pub fn module_entity_count(&self, category: EntityCategory) -> usize {
        self.typer
            .current_module()
            .map(|module| module.count(category))
            .unwrap_or(0)
    }

    /// Define a function. `body` receives the parameters and may return the result value;
    /// a missing or mistyped result is replaced by a value of the result type.
    pub fn build_wasm_function(
        &mut self,
        signature: WasmSignature,
        body: impl FnOnce(&mut Self, &[Variable]) -> Option<Variable>,
    ) -> Variable {
        let begin = self.emit(
            Operation::BeginWasmFunction {
                signature: signature.clone(),
            },
            vec![],
        );
        let returned = body(self, &begin.inner_outputs);
        let results = match signature.result() {
            Some(ty) => {
                let fits = returned.filter(|v| {
                    self.scopes.is_visible(*v) && self.type_of(*v).is_wasm_value(ty)
                });
                vec![fits.unwrap_or_else(|| self.wasm_value_of(ty))]
            }
            None => Vec::new(),
        };
        self.emit_value(Operation::EndWasmFunction { signature }, results)
    }

    // Function body

    pub fn wasm_const(&mut self, value: WasmLiteral) -> Variable {
        self.emit_value(Operation::WasmConst { value }, vec![])
    }

    pub fn wasm_int_binary(&mut self, width: NumWidth, op: IntBinaryOp, lhs: Variable, rhs: Variable) -> Variable {
        self.emit_value(Operation::WasmIntBinary { width, op }, vec![lhs, rhs])
    }

    pub fn wasm_int_unary(&mut self, width: NumWidth, op: IntUnaryOp, input: Variable) -> Variable {
        self.emit_value(Operation::WasmIntUnary { width, op }, vec![input])
    }

    pub fn wasm_int_eqz(&mut self, width: NumWidth, input: Variable) -> Variable {
        self.emit_value(Operation::WasmIntEqz { width }, vec![input])
    }

    pub fn wasm_int_compare(&mut self, width: NumWidth, op: IntCompareOp, lhs: Variable, rhs: Variable) -> Variable {
        self.emit_value(Operation::WasmIntCompare { width, op }, vec![lhs, rhs])
    }

    pub fn wasm_float_binary(
        &mut self,
        width: NumWidth,
        op: FloatBinaryOp,
        lhs: Variable,
        rhs: Variable,
    ) -> Variable {
        self.emit_value(Operation::WasmFloatBinary { width, op }, vec![lhs, rhs])
    }

    pub fn wasm_float_unary(&mut self, width: NumWidth, op: FloatUnaryOp, input: Variable) -> Variable {
        self.emit_value(Operation::WasmFloatUnary { width, op }, vec![input])
    }

    pub fn wasm_float_compare(
        &mut self,
        width: NumWidth,
        op: FloatCompareOp,
        lhs: Variable,
        rhs: Variable,
    ) -> Variable {
        self.emit_value(Operation::WasmFloatCompare { width, op }, vec![lhs, rhs])
    }

    pub fn wasm_load_global(&mut self, global: Variable) -> Variable {
        self.emit_value(Operation::WasmLoadGlobal, vec![global])
    }

    pub fn wasm_store_global(&mut self, global: Variable, value: Variable) {
        self.emit(Operation::WasmStoreGlobal, vec![global, value]);
    }

    pub fn wasm_table_get(&mut self, table: Variable, index: Variable) -> Variable {
        self.emit_value(Operation::WasmTableGet, vec![table, index])
    }

    pub fn wasm_table_set(&mut self, table: Variable, index: Variable, value: Variable) {
        self.emit(Operation::WasmTableSet, vec![table, index, value]);
    }

    pub fn wasm_memory_load(&mut self, memory: Variable, address: Variable, ty: WasmValueType, offset: u64) -> Variable {
        self.emit_value(Operation::WasmMemoryLoad { ty, offset }, vec![memory, address])
    }

    pub fn wasm_memory_store(
        &mut self,
        memory: Variable,
        address: Variable,
        value: Variable,
        ty: WasmValueType,
        offset: u64,
    ) {
        self.emit(Operation::WasmMemoryStore { ty, offset }, vec![memory, address, value]);
    }

    /// Call a module function; returns its results
    pub fn wasm_call_function(&mut self, function: Variable, args: Vec<Variable>) -> Vec<Variable> {
        let signature = match self.type_of(function) {
            ILType::WasmEntity(EntityType::Function(signature)) => signature,
            _ => WasmSignature::default(),
        };
        let mut inputs = vec![function];
        inputs.extend(args);
        self.emit(Operation::WasmCallFunction { signature }, inputs).outputs
    }

    pub fn wasm_reassign(&mut self, target: Variable, value: Variable) {
        self.emit(Operation::WasmReassign, vec![target, value]);
    }

    pub fn wasm_return(&mut self, value: Option<Variable>) {
        match value {
            Some(value) => self.emit(Operation::WasmReturn { has_value: true }, vec![value]),
            None => self.emit(Operation::WasmReturn { has_value: false }, vec![]),
        };
    }

    /// `block`; `body` receives the label, a branch to which exits the block
    pub fn wasm_build_block(&mut self, body: impl FnOnce(&mut Self, Variable)) {
        let begin = self.emit(Operation::WasmBeginBlock, vec![]);
        body(self, begin.inner_outputs[0]);
        self.emit(Operation::WasmEndBlock, vec![]);
    }

    /// `loop`; `body` receives the label, a branch to which restarts the loop
    pub fn wasm_build_loop(&mut self, body: impl FnOnce(&mut Self, Variable)) {
        let begin = self.emit(Operation::WasmBeginLoop, vec![]);
        body(self, begin.inner_outputs[0]);
        self.emit(Operation::WasmEndLoop, vec![]);
    }

    pub fn wasm_build_if(&mut self, condition: Variable, body: impl FnOnce(&mut Self, Variable)) {
        let begin = self.emit(Operation::WasmBeginIf, vec![condition]);
        body(self, begin.inner_outputs[0]);
        self.emit(Operation::WasmEndIf, vec![]);
    }

    pub fn wasm_build_if_else(
        &mut self,
        condition: Variable,
        then_body: impl FnOnce(&mut Self, Variable),
        else_body: impl FnOnce(&mut Self, Variable),
    ) {
        let begin = self.emit(Operation::WasmBeginIf, vec![condition]);
        then_body(self, begin.inner_outputs[0]);
        let otherwise = self.emit(Operation::WasmBeginElse, vec![]);
        else_body(self, otherwise.inner_outputs[0]);
        self.emit(Operation::WasmEndIf, vec![]);
    }

    pub fn wasm_branch(&mut self, label: Variable) {
        self.emit(Operation::WasmBranch, vec![label]);
    }

    pub fn wasm_branch_if(&mut self, label: Variable, condition: Variable) {
        self.emit(Operation::WasmBranchIf, vec![label, condition]);
    }

    pub fn wasm_unreachable(&mut self) {
        self.emit(Operation::WasmUnreachable, vec![]);
    }

    /// A loop that runs `body` a fixed number of times. Counter and label are hidden
    /// so that generated code cannot turn it into an endless loop.
    pub fn wasm_build_counted_loop(&mut self, body: impl FnOnce(&mut Self)) {
        let counter = self.wasm_const(WasmLiteral::I32(WASM_LOOP_ITERATIONS));
        self.hide(counter);
        self.wasm_build_loop(|b, label| {
            b.hide(label);
            body(b);
            let one = b.wasm_const(WasmLiteral::I32(1));
            let next = b.wasm_int_binary(NumWidth::Bits32, IntBinaryOp::Sub, counter, one);
            b.wasm_reassign(counter, next);
            b.wasm_branch_if(label, next);
        });
    }

    // Random Wasm values

    pub fn random_numeric_type(&mut self) -> WasmValueType {
        *WasmValueType::NUMERIC
            .choose(&mut self.rng)
            .unwrap_or(&WasmValueType::I32)
    }

    pub fn random_wasm_literal(&mut self, ty: WasmValueType) -> WasmLiteral {
        let special = self.rng.gen_bool(0.25);
        match ty {
            WasmValueType::I32 => WasmLiteral::I32(if special {
                *[0, 1, -1, i32::MIN, i32::MAX, 0xffff, 0x10000]
                    .choose(&mut self.rng)
                    .unwrap_or(&0)
            } else {
                self.rng.gen_range(-1024..1024)
            }),
            WasmValueType::I64 => WasmLiteral::I64(if special {
                *[0, 1, -1, i64::MIN, i64::MAX, 0xffff_ffff, 0x1_0000_0000]
                    .choose(&mut self.rng)
                    .unwrap_or(&0)
            } else {
                self.rng.gen_range(-1024..1024)
            }),
            WasmValueType::F32 => WasmLiteral::F32(if special {
                *[0.0, -0.0, 1.0, f32::MAX, f32::MIN_POSITIVE, f32::INFINITY, f32::NAN]
                    .choose(&mut self.rng)
                    .unwrap_or(&0.0)
            } else {
                self.rng.gen_range(-1000.0..1000.0)
            }),
            WasmValueType::F64 => WasmLiteral::F64(if special {
                *[0.0, -0.0, 1.0, f64::MAX, f64::MIN_POSITIVE, f64::NEG_INFINITY, f64::NAN]
                    .choose(&mut self.rng)
                    .unwrap_or(&0.0)
            } else {
                self.rng.gen_range(-1000.0..1000.0)
            }),
            WasmValueType::ExternRef | WasmValueType::FuncRef => WasmLiteral::NullRef(ty),
        }
    }

    /// A numeric signature with up to `max_parameters` parameters and at most one result
    pub fn random_wasm_signature(&mut self) -> WasmSignature {
        let num_params = self.random_parameter_count();
        let params = (0..num_params).map(|_| self.random_numeric_type()).collect();
        let results = if self.rng.gen_bool(0.8) {
            vec![self.random_numeric_type()]
        } else {
            Vec::new()
        };
        WasmSignature::new(params, results)
    }

    /// A visible Wasm value of type `ty`, emitting a constant when there is none
    pub fn wasm_value_of(&mut self, ty: WasmValueType) -> Variable {
        if self.rng.gen_bool(0.8) {
            if let Some(var) = self.random_variable_of_type(&ILType::Wasm(ty)) {
                return var;
            }
        }
        let literal = self.random_wasm_literal(ty);
        self.wasm_const(literal)
    }

    /// A module importing some visible JavaScript-side entities and defining random content
    pub fn build_random_wasm_module(&mut self) -> (Variable, Variable) {
        self.build_wasm_module(|b| {
            b.import_random_entities();
            b.build_recursive();
            if b.module_entity_count(EntityCategory::Function) == 0 {
                b.build_random_wasm_function();
            }
        })
    }

    fn import_random_entities(&mut self) {
        let imports: [(EntityCategory, fn(&ILType) -> bool); 3] = [
            (EntityCategory::Global, ILType::is_js_wasm_global),
            (EntityCategory::Memory, ILType::is_js_wasm_memory),
            (EntityCategory::Table, ILType::is_js_wasm_table),
        ];
        for (category, predicate) in imports {
            if !self.can_import(category) || !self.rng.gen_bool(0.5) {
                continue;
            }
            if let Some(source) = self.random_variable_matching(predicate) {
                match category {
                    EntityCategory::Global => self.wasm_import_global(source),
                    EntityCategory::Memory => self.wasm_import_memory(source),
                    _ => self.wasm_import_table(source),
                };
            }
        }
        if self.can_import(EntityCategory::Function) && self.rng.gen_bool(0.3) {
            if let Some(source) = self.random_variable_matching(ILType::is_callable) {
                let signature = self.random_wasm_signature();
                self.wasm_import_function(source, signature);
            }
        }
    }

    /// A function with a random signature and a randomly generated body
    pub fn build_random_wasm_function(&mut self) -> Variable {
        let signature = self.random_wasm_signature();
        let result = signature.result();
        self.build_wasm_function(signature, |b, _params| {
            b.build_recursive();
            result.map(|ty| b.wasm_value_of(ty))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FuzzContext;
    use std::sync::Arc;
    use wasp_core::{Error, FuzzConfig};
    use wasp_ir::{Program, Typer};

    fn builder(seed: u64) -> ProgramBuilder {
        ProgramBuilder::new(Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap()), seed)
    }

    fn exports_of(program: &Program, exports: Variable) -> wasp_ir::ModuleSignature {
        let mut typer = Typer::new(Arc::new(wasp_ir::Environment::javascript()));
        for inst in program.iter() {
            typer.analyze(inst);
        }
        typer.type_of(exports).module_signature().cloned().unwrap()
    }

    #[test]
    fn test_function_returning_constant() {
        let mut b = builder(1);
        let sig = WasmSignature::new(vec![], vec![WasmValueType::I32]);
        let (_, exports) = b.build_wasm_module(|b| {
            b.build_wasm_function(sig, |b, _| Some(b.wasm_const(WasmLiteral::I32(42))));
        });
        let program = b.finalize().unwrap();
        let signature = exports_of(&program, exports);
        assert_eq!(signature.exports.len(), 1);
        assert_eq!(signature.exports[0].name, "function0");
    }

    #[test]
    fn test_mistyped_result_is_replaced() {
        let mut b = builder(2);
        let sig = WasmSignature::new(vec![WasmValueType::F64], vec![WasmValueType::I64]);
        b.build_wasm_module(|b| {
            b.build_wasm_function(sig, |_, params| Some(params[0]));
        });
        assert!(b.finalize().is_ok());
    }

    #[test]
    fn test_import_after_definition_fails_finalize() {
        let mut b = builder(3);
        let global = b.create_wasm_global(WasmLiteral::I32(1), true);
        b.build_wasm_module(|b| {
            b.wasm_define_global(WasmLiteral::I32(2), false);
            assert!(!b.can_import(EntityCategory::Global));
            b.wasm_import_global(global);
        });
        assert!(matches!(b.finalize(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_import_then_define_names() {
        let mut b = builder(4);
        let global = b.create_wasm_global(WasmLiteral::I32(1), true);
        let (_, exports) = b.build_wasm_module(|b| {
            b.wasm_import_global(global);
            b.wasm_define_global(WasmLiteral::I64(7), true);
        });
        let program = b.finalize().unwrap();
        let signature = exports_of(&program, exports);
        let names: Vec<&str> = signature.exports.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["global0", "global1"]);
        assert_eq!(
            signature.exports[1].entity,
            EntityType::Global { ty: WasmValueType::I64, mutable: true }
        );
    }

    #[test]
    fn test_counted_loop_hides_its_state() {
        let mut b = builder(5);
        let sig = WasmSignature::default();
        b.build_wasm_module(|b| {
            b.build_wasm_function(sig, |b, _| {
                b.wasm_build_counted_loop(|b| {
                    assert!(b.random_variable_matching(ILType::is_label).is_none());
                    assert!(b.random_variable_of_type(&ILType::Wasm(WasmValueType::I32)).is_none());
                });
                None
            });
        });
        assert!(b.finalize().is_ok());
    }

    #[test]
    fn test_random_modules_are_valid() {
        for seed in 0..30 {
            let mut b = builder(seed);
            b.build_prefix();
            b.build_random_wasm_module();
            b.finalize().unwrap();
        }
    }
}
