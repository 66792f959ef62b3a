//! Static type inference over instructions, one instruction at a time.

use crate::environment::Environment;
use crate::instruction::{Instruction, Variable};
use crate::module_layout::ModuleLayout;
use crate::operation::{BinaryOperator, NumWidth, Operation, UnaryOperator};
use crate::types::{EntityType, ILType, ModuleSignature, WasmValueType};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Typer {
    environment: Arc<Environment>,
    types: HashMap<Variable, ILType>,
    modules: Vec<ModuleLayout>,
}

impl Typer {
    pub fn new(environment: Arc<Environment>) -> Self {
        Self {
            environment,
            types: HashMap::new(),
            modules: Vec::new(),
        }
    }

    pub fn reset(&mut self) {
        self.types.clear();
        self.modules.clear();
    }

    pub fn type_of(&self, var: Variable) -> ILType {
        self.types.get(&var).cloned().unwrap_or(ILType::Anything)
    }

    pub fn knows(&self, var: Variable) -> bool {
        self.types.contains_key(&var)
    }

    /// Layout of the innermost module being defined
    pub fn current_module(&self) -> Option<&ModuleLayout> {
        self.modules.last()
    }

    /// Record the types of everything `inst` defines. Must be called in program order.
    pub fn analyze(&mut self, inst: &Instruction) {
        if let Operation::EndWasmModule = inst.operation {
            let signature = self
                .modules
                .pop()
                .map(|layout| layout.signature())
                .unwrap_or_default();
            if let [module, exports] = inst.outputs.as_slice() {
                self.types.insert(*module, ILType::WasmModule(signature.clone()));
                self.types.insert(*exports, ILType::WasmExports(signature));
            }
            return;
        }

        let output_types = self.infer_output_types(&inst.operation, &inst.inputs);
        for (var, ty) in inst.outputs.iter().zip(output_types) {
            self.types.insert(*var, ty);
        }
        for (var, ty) in inst.inner_outputs.iter().zip(self.inner_output_types(&inst.operation)) {
            self.types.insert(*var, ty);
        }

        self.track_module_entities(inst);
    }

    fn track_module_entities(&mut self, inst: &Instruction) {
        if let Operation::BeginWasmModule = inst.operation {
            self.modules.push(ModuleLayout::new());
            return;
        }
        let Some(output) = inst.output() else {
            return;
        };
        let entity = match self.type_of(output) {
            ILType::WasmEntity(entity) => entity,
            _ => return,
        };
        let Some(layout) = self.modules.last_mut() else {
            return;
        };
        match (&inst.operation, inst.input(0)) {
            (
                Operation::WasmImportGlobal
                | Operation::WasmImportTable
                | Operation::WasmImportMemory
                | Operation::WasmImportFunction { .. },
                Some(source),
            ) => layout.import(output, entity, source),
            (
                Operation::WasmDefineGlobal { .. }
                | Operation::WasmDefineTable { .. }
                | Operation::WasmDefineMemory { .. }
                | Operation::EndWasmFunction { .. },
                _,
            ) => layout.define(output, entity),
            _ => {}
        }
    }

    fn imported_entity(&self, source: Option<Variable>, fallback: EntityType) -> ILType {
        match source.map(|v| self.type_of(v)) {
            Some(ILType::WasmObject(entity)) if entity.category() == fallback.category() => {
                ILType::WasmEntity(entity)
            }
            _ => ILType::WasmEntity(fallback),
        }
    }

    /// Types the operation's outputs would get with these inputs, without recording anything
    pub fn infer_output_types(&self, operation: &Operation, inputs: &[Variable]) -> Vec<ILType> {
        use Operation::*;
        let input_type = |i: usize| inputs.get(i).map(|v| self.type_of(*v)).unwrap_or(ILType::Anything);

        let single = match operation {
            LoadInteger { .. } => ILType::Integer,
            LoadBigInt { .. } => ILType::BigInt,
            LoadFloat { .. } => ILType::Float,
            LoadString { .. } => ILType::String,
            LoadBoolean { .. } => ILType::Boolean,
            LoadUndefined => ILType::Undefined,
            LoadNull => ILType::Null,
            LoadRegExp { .. } => ILType::RegExp,
            LoadBuiltin { name } => self
                .environment
                .builtin_type(name)
                .cloned()
                .unwrap_or(ILType::Anything),
            CreateObject { .. } => ILType::object(),
            CreateArray { .. } => ILType::Array,
            DeleteProperty { .. } | Compare { .. } => ILType::Boolean,
            Construct { guarded: false, .. } => ILType::object(),
            BinaryOperation { op } => binary_result(*op, &input_type(0), &input_type(1)),
            UnaryOperation { op } => unary_result(*op, &input_type(0)),
            BeginPlainFunction { num_parameters } => ILType::Function { parameters: *num_parameters },
            CreateWasmGlobal { value, mutable } => ILType::WasmObject(EntityType::Global {
                ty: value.value_type(),
                mutable: *mutable,
            }),
            CreateWasmMemory { minimum, maximum, shared } => ILType::WasmObject(EntityType::Memory {
                minimum: *minimum,
                maximum: *maximum,
                shared: *shared,
            }),
            CreateWasmTable { element, minimum, maximum } => ILType::WasmObject(EntityType::Table {
                element: *element,
                minimum: *minimum,
                maximum: *maximum,
            }),
            InstantiateWasm { .. } => match input_type(0) {
                ILType::WasmModule(signature) => ILType::WasmExports(signature),
                _ => ILType::Anything,
            },
            WasmDefineGlobal { value, mutable } => ILType::WasmEntity(EntityType::Global {
                ty: value.value_type(),
                mutable: *mutable,
            }),
            WasmDefineTable { element, minimum, maximum } => ILType::WasmEntity(EntityType::Table {
                element: *element,
                minimum: *minimum,
                maximum: *maximum,
            }),
            WasmDefineMemory { minimum, maximum } => ILType::WasmEntity(EntityType::Memory {
                minimum: *minimum,
                maximum: *maximum,
                shared: false,
            }),
            WasmImportGlobal => self.imported_entity(
                inputs.first().copied(),
                EntityType::Global { ty: WasmValueType::I32, mutable: false },
            ),
            WasmImportTable => self.imported_entity(
                inputs.first().copied(),
                EntityType::Table { element: WasmValueType::FuncRef, minimum: 0, maximum: None },
            ),
            WasmImportMemory => self.imported_entity(
                inputs.first().copied(),
                EntityType::Memory { minimum: 0, maximum: None, shared: false },
            ),
            WasmImportFunction { signature } | EndWasmFunction { signature } => {
                ILType::WasmEntity(EntityType::Function(signature.clone()))
            }
            WasmConst { value } => ILType::Wasm(value.value_type()),
            WasmIntBinary { width, .. } | WasmIntUnary { width, .. } => ILType::Wasm(width.int_type()),
            WasmIntEqz { .. } | WasmIntCompare { .. } | WasmFloatCompare { .. } => {
                ILType::Wasm(WasmValueType::I32)
            }
            WasmFloatBinary { width, .. } | WasmFloatUnary { width, .. } => {
                ILType::Wasm(width.float_type())
            }
            WasmLoadGlobal => match input_type(0) {
                ILType::WasmEntity(EntityType::Global { ty, .. }) => ILType::Wasm(ty),
                _ => ILType::Anything,
            },
            WasmTableGet => match input_type(0) {
                ILType::WasmEntity(EntityType::Table { element, .. }) => ILType::Wasm(element),
                _ => ILType::Anything,
            },
            WasmMemoryLoad { ty, .. } => ILType::Wasm(*ty),
            WasmCallFunction { signature } => {
                return signature.results.iter().map(|r| ILType::Wasm(*r)).collect();
            }
            EndWasmModule => {
                let signature = ModuleSignature::default();
                return vec![ILType::WasmModule(signature.clone()), ILType::WasmExports(signature)];
            }
            _ => ILType::Anything,
        };

        vec![single; operation.num_outputs()]
    }

    fn inner_output_types(&self, operation: &Operation) -> Vec<ILType> {
        use Operation::*;
        match operation {
            BeginPlainFunction { num_parameters } => vec![ILType::Anything; *num_parameters],
            BeginRepeatLoop { .. } => vec![ILType::Integer],
            BeginCatch => vec![ILType::Anything],
            BeginWasmFunction { signature } => signature.params.iter().map(|p| ILType::Wasm(*p)).collect(),
            WasmBeginBlock | WasmBeginLoop | WasmBeginIf | WasmBeginElse => vec![ILType::Label],
            _ => Vec::new(),
        }
    }
}

fn binary_result(op: BinaryOperator, lhs: &ILType, rhs: &ILType) -> ILType {
    match op {
        BinaryOperator::LogicAnd | BinaryOperator::LogicOr => ILType::Anything,
        _ if *lhs == ILType::BigInt && *rhs == ILType::BigInt => ILType::BigInt,
        _ if lhs.is_number() && rhs.is_number() => ILType::Float,
        _ => ILType::Anything,
    }
}

fn unary_result(op: UnaryOperator, input: &ILType) -> ILType {
    match op {
        UnaryOperator::LogicalNot => ILType::Boolean,
        UnaryOperator::Minus | UnaryOperator::BitwiseNot if *input == ILType::BigInt => ILType::BigInt,
        _ if input.is_number() => ILType::Float,
        _ => ILType::Anything,
    }
}

/// Integer width of a typed Wasm value, if it is an integer
pub fn int_width_of(ty: &ILType) -> Option<NumWidth> {
    ty.wasm_value_type().and_then(NumWidth::of_int)
}

/// Float width of a typed Wasm value, if it is a float
pub fn float_width_of(ty: &ILType) -> Option<NumWidth> {
    ty.wasm_value_type().and_then(NumWidth::of_float)
}
