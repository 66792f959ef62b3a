//! Lowering of Wasm module bodies to binary modules.
//!
//! Every Wasm value variable of a function becomes a local; an instruction
//! reads its operands with `local.get` and stores its result with
//! `local.set`, so the operand stack is empty between instructions. Labels
//! resolve against the stack of open blocks into relative branch depths.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;
use wasm_encoder::Instruction as WI;
use wasm_encoder::{
    BlockType, CodeSection, ConstExpr, ExportKind, ExportSection, FunctionSection, GlobalSection,
    GlobalType, ImportSection, MemArg, MemorySection, MemoryType, Module, RefType, TableSection,
    TableType, TypeSection, ValType,
};
use wasp_core::{Error, Result};
use wasp_ir::{
    check_arity, EntityCategory, EntityType, Environment, FloatBinaryOp, FloatCompareOp, FloatUnaryOp,
    Instruction, IntBinaryOp, IntCompareOp, IntUnaryOp, ModuleLayout, ModuleSignature, NumWidth, Operation,
    Program, Typer, Variable, WasmLiteral, WasmSignature, WasmValueType,
};

/// Module name of every import
pub const IMPORT_MODULE: &str = "imports";

/// Field name of the import at `index` in the import section
pub fn import_name(index: usize) -> String {
    format!("import{}", index)
}

/// A module of a program in binary form
#[derive(Debug, Clone)]
pub struct EncodedModule {
    /// Position of the `BeginWasmModule` instruction
    pub begin: usize,
    /// Position of the `EndWasmModule` instruction
    pub end: usize,
    pub bytes: Vec<u8>,
    /// JavaScript values supplying the imports, in import section order
    pub import_sources: Vec<Variable>,
    pub signature: ModuleSignature,
}

/// Encode every module of the program, in program order. Imported entity
/// types come from the builtins of `environment`.
pub fn encode_modules(program: &Program, environment: &Arc<Environment>) -> Result<Vec<EncodedModule>> {
    let mut typer = Typer::new(Arc::clone(environment));
    let mut spans: Vec<(usize, usize, ModuleLayout)> = Vec::new();
    let mut open = None;

    for (idx, inst) in program.iter().enumerate() {
        check_arity(inst)?;
        match inst.operation {
            Operation::BeginWasmModule => open = Some(idx),
            Operation::EndWasmModule => {
                let begin = open
                    .take()
                    .ok_or_else(|| Error::Lifting(format!("module end at {} has no begin", idx)))?;
                let layout = typer.current_module().cloned().unwrap_or_default();
                spans.push((begin, idx, layout));
            }
            _ => {}
        }
        typer.analyze(inst);
    }

    spans
        .into_iter()
        .map(|(begin, end, layout)| {
            let encoder = WasmModuleEncoder::new(&typer, &layout);
            let bytes = encoder.encode(&program.instructions[begin + 1..end])?;
            trace!("Encoded module at {} into {} bytes", begin, bytes.len());
            Ok(EncodedModule {
                begin,
                end,
                bytes,
                import_sources: layout.imports().filter_map(|e| e.import_source).collect(),
                signature: layout.signature(),
            })
        })
        .collect()
}

pub struct WasmModuleEncoder<'a> {
    typer: &'a Typer,
    layout: &'a ModuleLayout,
}

impl<'a> WasmModuleEncoder<'a> {
    /// `typer` must have analyzed the whole program; `layout` is the module's final layout
    pub fn new(typer: &'a Typer, layout: &'a ModuleLayout) -> Self {
        Self { typer, layout }
    }

    /// Encode the instructions strictly between `BeginWasmModule` and `EndWasmModule`
    pub fn encode(&self, body: &[Instruction]) -> Result<Vec<u8>> {
        let mut module = Module::new();

        // Type section: one type per distinct function signature
        let mut signatures: Vec<&WasmSignature> = Vec::new();
        for entity in self.layout.entities() {
            if let EntityType::Function(signature) = &entity.entity {
                if !signatures.contains(&signature) {
                    signatures.push(signature);
                }
            }
        }
        let type_index = |signature: &WasmSignature| -> Result<u32> {
            signatures
                .iter()
                .position(|s| *s == signature)
                .map(|i| i as u32)
                .ok_or_else(|| Error::Lifting(format!("no type for signature {}", signature)))
        };
        let mut types = TypeSection::new();
        for signature in &signatures {
            types.function(
                signature.params.iter().map(|t| val_type(*t)),
                signature.results.iter().map(|t| val_type(*t)),
            );
        }
        if !types.is_empty() {
            module.section(&types);
        }

        // Import section: everything a JavaScript value supplies
        let mut imports = ImportSection::new();
        for (index, entity) in self.layout.imports().enumerate() {
            let ty = match &entity.entity {
                EntityType::Function(signature) => wasm_encoder::EntityType::Function(type_index(signature)?),
                EntityType::Global { ty, mutable } => wasm_encoder::EntityType::Global(global_type(*ty, *mutable)),
                EntityType::Table { element, minimum, maximum } => {
                    wasm_encoder::EntityType::Table(table_type(*element, *minimum, *maximum))
                }
                EntityType::Memory { minimum, maximum, shared } => {
                    wasm_encoder::EntityType::Memory(memory_type(*minimum, *maximum, *shared))
                }
            };
            imports.import(IMPORT_MODULE, &import_name(index), ty);
        }
        if !imports.is_empty() {
            module.section(&imports);
        }

        // Function section
        let mut functions = FunctionSection::new();
        for entity in self.layout.definitions(EntityCategory::Function) {
            if let EntityType::Function(signature) = &entity.entity {
                functions.function(type_index(signature)?);
            }
        }
        if !functions.is_empty() {
            module.section(&functions);
        }

        // Table section
        let mut tables = TableSection::new();
        for entity in self.layout.definitions(EntityCategory::Table) {
            if let EntityType::Table { element, minimum, maximum } = &entity.entity {
                tables.table(table_type(*element, *minimum, *maximum));
            }
        }
        if !tables.is_empty() {
            module.section(&tables);
        }

        // Memory section
        let mut memories = MemorySection::new();
        for entity in self.layout.definitions(EntityCategory::Memory) {
            if let EntityType::Memory { minimum, maximum, shared } = &entity.entity {
                memories.memory(memory_type(*minimum, *maximum, *shared));
            }
        }
        if !memories.is_empty() {
            module.section(&memories);
        }

        // Global section: initial values come from the defining instructions
        let initializers: HashMap<Variable, WasmLiteral> = body
            .iter()
            .filter_map(|inst| match (&inst.operation, inst.output()) {
                (Operation::WasmDefineGlobal { value, .. }, Some(output)) => Some((output, *value)),
                _ => None,
            })
            .collect();
        let mut globals = GlobalSection::new();
        for entity in self.layout.definitions(EntityCategory::Global) {
            if let EntityType::Global { ty, mutable } = &entity.entity {
                let value = initializers
                    .get(&entity.var)
                    .copied()
                    .unwrap_or_else(|| WasmLiteral::zero(*ty));
                globals.global(global_type(*ty, *mutable), &const_expr(value));
            }
        }
        if !globals.is_empty() {
            module.section(&globals);
        }

        // Export section: every entity under its category name
        let mut exports = ExportSection::new();
        for entity in self.layout.entities() {
            let (Some(name), Some(index)) = (self.layout.export_name(entity.var), self.layout.index_of(entity.var))
            else {
                continue;
            };
            let kind = match entity.entity.category() {
                EntityCategory::Function => ExportKind::Func,
                EntityCategory::Global => ExportKind::Global,
                EntityCategory::Table => ExportKind::Table,
                EntityCategory::Memory => ExportKind::Memory,
            };
            exports.export(&name, kind, index);
        }
        if !exports.is_empty() {
            module.section(&exports);
        }

        // Code section: bodies in definition order
        let mut code = CodeSection::new();
        let mut position = 0;
        while position < body.len() {
            let inst = &body[position];
            if let Operation::BeginWasmFunction { .. } = inst.operation {
                let length = body[position..]
                    .iter()
                    .position(|i| matches!(i.operation, Operation::EndWasmFunction { .. }))
                    .ok_or_else(|| Error::Lifting("Wasm function is never closed".to_string()))?;
                let function = self.encode_function(&body[position..=position + length])?;
                code.function(&function);
                position += length;
            }
            position += 1;
        }
        if !code.is_empty() {
            module.section(&code);
        }

        Ok(module.finish())
    }

    /// `instructions` runs from `BeginWasmFunction` to `EndWasmFunction`, inclusive
    fn encode_function(&self, instructions: &[Instruction]) -> Result<wasm_encoder::Function> {
        let (Some(begin), Some(end)) = (instructions.first(), instructions.last()) else {
            return Err(Error::Lifting("empty Wasm function".to_string()));
        };

        let mut encoder = FunctionEncoder::new(self.typer, self.layout, &begin.inner_outputs);
        for inst in &instructions[1..instructions.len() - 1] {
            encoder.instruction(inst)?;
        }
        for result in &end.inputs {
            encoder.get(*result)?;
        }
        encoder.code.push(WI::End);

        let mut function = wasm_encoder::Function::new(encoder.local_types.iter().map(|t| (1, *t)));
        for instruction in &encoder.code {
            function.instruction(instruction);
        }
        Ok(function)
    }
}

struct FunctionEncoder<'a> {
    typer: &'a Typer,
    layout: &'a ModuleLayout,
    locals: HashMap<Variable, u32>,
    num_params: u32,
    /// Types of the non-parameter locals
    local_types: Vec<ValType>,
    /// Labels of the open blocks, innermost last
    labels: Vec<Variable>,
    code: Vec<WI<'static>>,
}

impl<'a> FunctionEncoder<'a> {
    fn new(typer: &'a Typer, layout: &'a ModuleLayout, params: &[Variable]) -> Self {
        let locals = params
            .iter()
            .enumerate()
            .map(|(i, var)| (*var, i as u32))
            .collect();
        Self {
            typer,
            layout,
            locals,
            num_params: params.len() as u32,
            local_types: Vec::new(),
            labels: Vec::new(),
            code: Vec::new(),
        }
    }

    fn get(&mut self, var: Variable) -> Result<()> {
        let index = self
            .locals
            .get(&var)
            .copied()
            .ok_or_else(|| Error::Lifting(format!("{} is not a local of this function", var)))?;
        self.code.push(WI::LocalGet(index));
        Ok(())
    }

    fn load_operands(&mut self, operands: &[Variable]) -> Result<()> {
        for operand in operands {
            self.get(*operand)?;
        }
        Ok(())
    }

    /// Allocate a local for a newly defined variable and pop the stack top into it
    fn set(&mut self, var: Variable) -> Result<()> {
        let ty = self
            .typer
            .type_of(var)
            .wasm_value_type()
            .ok_or_else(|| Error::Lifting(format!("{} has no Wasm value type", var)))?;
        let index = self.num_params + self.local_types.len() as u32;
        self.local_types.push(val_type(ty));
        self.locals.insert(var, index);
        self.code.push(WI::LocalSet(index));
        Ok(())
    }

    fn set_output(&mut self, inst: &Instruction) -> Result<()> {
        let output = inst
            .output()
            .ok_or_else(|| Error::Lifting(format!("{} has no output", inst.operation.name())))?;
        self.set(output)
    }

    fn entity(&self, var: Variable) -> Result<u32> {
        self.layout
            .index_of(var)
            .ok_or_else(|| Error::Lifting(format!("{} is not an entity of this module", var)))
    }

    /// Relative branch depth of `label` within the open blocks
    fn depth(&self, label: Variable) -> Result<u32> {
        self.labels
            .iter()
            .rev()
            .position(|l| *l == label)
            .map(|d| d as u32)
            .ok_or_else(|| Error::Lifting(format!("branch to {} which is not an open label", label)))
    }

    fn open(&mut self, inst: &Instruction, instruction: WI<'static>) -> Result<()> {
        let label = inst
            .inner_outputs
            .first()
            .copied()
            .ok_or_else(|| Error::Lifting(format!("{} has no label", inst.operation.name())))?;
        self.code.push(instruction);
        self.labels.push(label);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.labels
            .pop()
            .ok_or_else(|| Error::Lifting("block end without an open block".to_string()))?;
        self.code.push(WI::End);
        Ok(())
    }

    fn instruction(&mut self, inst: &Instruction) -> Result<()> {
        use Operation::*;
        match &inst.operation {
            WasmConst { value } => {
                self.code.push(const_instruction(*value));
                self.set_output(inst)?;
            }
            WasmIntBinary { width, op } => {
                self.load_operands(&inst.inputs)?;
                self.code.push(int_binary(*width, *op));
                self.set_output(inst)?;
            }
            WasmIntUnary { width, op } => {
                self.load_operands(&inst.inputs)?;
                self.code.push(int_unary(*width, *op));
                self.set_output(inst)?;
            }
            WasmIntEqz { width } => {
                self.load_operands(&inst.inputs)?;
                self.code.push(match width {
                    NumWidth::Bits32 => WI::I32Eqz,
                    NumWidth::Bits64 => WI::I64Eqz,
                });
                self.set_output(inst)?;
            }
            WasmIntCompare { width, op } => {
                self.load_operands(&inst.inputs)?;
                self.code.push(int_compare(*width, *op));
                self.set_output(inst)?;
            }
            WasmFloatBinary { width, op } => {
                self.load_operands(&inst.inputs)?;
                self.code.push(float_binary(*width, *op));
                self.set_output(inst)?;
            }
            WasmFloatUnary { width, op } => {
                self.load_operands(&inst.inputs)?;
                self.code.push(float_unary(*width, *op));
                self.set_output(inst)?;
            }
            WasmFloatCompare { width, op } => {
                self.load_operands(&inst.inputs)?;
                self.code.push(float_compare(*width, *op));
                self.set_output(inst)?;
            }
            WasmLoadGlobal => {
                let global = self.entity(inst.inputs[0])?;
                self.code.push(WI::GlobalGet(global));
                self.set_output(inst)?;
            }
            WasmStoreGlobal => {
                let global = self.entity(inst.inputs[0])?;
                self.get(inst.inputs[1])?;
                self.code.push(WI::GlobalSet(global));
            }
            WasmTableGet => {
                let table = self.entity(inst.inputs[0])?;
                self.get(inst.inputs[1])?;
                self.code.push(WI::TableGet(table));
                self.set_output(inst)?;
            }
            WasmTableSet => {
                let table = self.entity(inst.inputs[0])?;
                self.load_operands(&inst.inputs[1..])?;
                self.code.push(WI::TableSet(table));
            }
            WasmMemoryLoad { ty, offset } => {
                let memarg = mem_arg(*ty, *offset, self.entity(inst.inputs[0])?);
                self.get(inst.inputs[1])?;
                self.code.push(match ty {
                    WasmValueType::I32 => WI::I32Load(memarg),
                    WasmValueType::I64 => WI::I64Load(memarg),
                    WasmValueType::F32 => WI::F32Load(memarg),
                    WasmValueType::F64 => WI::F64Load(memarg),
                    WasmValueType::ExternRef | WasmValueType::FuncRef => {
                        return Err(Error::Lifting(format!("memory load of {}", ty)));
                    }
                });
                self.set_output(inst)?;
            }
            WasmMemoryStore { ty, offset } => {
                let memarg = mem_arg(*ty, *offset, self.entity(inst.inputs[0])?);
                self.load_operands(&inst.inputs[1..])?;
                self.code.push(match ty {
                    WasmValueType::I32 => WI::I32Store(memarg),
                    WasmValueType::I64 => WI::I64Store(memarg),
                    WasmValueType::F32 => WI::F32Store(memarg),
                    WasmValueType::F64 => WI::F64Store(memarg),
                    WasmValueType::ExternRef | WasmValueType::FuncRef => {
                        return Err(Error::Lifting(format!("memory store of {}", ty)));
                    }
                });
            }
            WasmCallFunction { .. } => {
                let callee = self.entity(inst.inputs[0])?;
                self.load_operands(&inst.inputs[1..])?;
                self.code.push(WI::Call(callee));
                for output in inst.outputs.iter().rev() {
                    self.set(*output)?;
                }
            }
            WasmReassign => {
                self.get(inst.inputs[1])?;
                let target = self
                    .locals
                    .get(&inst.inputs[0])
                    .copied()
                    .ok_or_else(|| Error::Lifting(format!("{} is not a local of this function", inst.inputs[0])))?;
                self.code.push(WI::LocalSet(target));
            }
            WasmReturn { .. } => {
                self.load_operands(&inst.inputs)?;
                self.code.push(WI::Return);
            }
            WasmBeginBlock => self.open(inst, WI::Block(BlockType::Empty))?,
            WasmBeginLoop => self.open(inst, WI::Loop(BlockType::Empty))?,
            WasmBeginIf => {
                self.get(inst.inputs[0])?;
                self.open(inst, WI::If(BlockType::Empty))?;
            }
            WasmBeginElse => {
                self.labels
                    .pop()
                    .ok_or_else(|| Error::Lifting("else without an open if".to_string()))?;
                self.open(inst, WI::Else)?;
            }
            WasmEndBlock | WasmEndLoop | WasmEndIf => self.close()?,
            WasmBranch => {
                let depth = self.depth(inst.inputs[0])?;
                self.code.push(WI::Br(depth));
            }
            WasmBranchIf => {
                let depth = self.depth(inst.inputs[0])?;
                self.get(inst.inputs[1])?;
                self.code.push(WI::BrIf(depth));
            }
            WasmUnreachable => self.code.push(WI::Unreachable),
            other => {
                return Err(Error::Lifting(format!(
                    "{} cannot appear in a Wasm function body",
                    other.name()
                )))
            }
        }
        Ok(())
    }
}

pub fn val_type(ty: WasmValueType) -> ValType {
    match ty {
        WasmValueType::I32 => ValType::I32,
        WasmValueType::I64 => ValType::I64,
        WasmValueType::F32 => ValType::F32,
        WasmValueType::F64 => ValType::F64,
        WasmValueType::ExternRef | WasmValueType::FuncRef => ValType::Ref(ref_type(ty)),
    }
}

fn ref_type(ty: WasmValueType) -> RefType {
    match ty {
        WasmValueType::ExternRef => RefType::EXTERNREF,
        _ => RefType::FUNCREF,
    }
}

fn global_type(ty: WasmValueType, mutable: bool) -> GlobalType {
    GlobalType {
        val_type: val_type(ty),
        mutable,
    }
}

fn table_type(element: WasmValueType, minimum: u32, maximum: Option<u32>) -> TableType {
    TableType {
        element_type: ref_type(element),
        minimum,
        maximum,
    }
}

fn memory_type(minimum: u32, maximum: Option<u32>, shared: bool) -> MemoryType {
    MemoryType {
        minimum: minimum as u64,
        maximum: maximum.map(|m| m as u64),
        memory64: false,
        shared,
    }
}

fn mem_arg(ty: WasmValueType, offset: u64, memory_index: u32) -> MemArg {
    MemArg {
        offset,
        align: ty.byte_width().trailing_zeros(),
        memory_index,
    }
}

fn const_expr(value: WasmLiteral) -> ConstExpr {
    match value {
        WasmLiteral::I32(v) => ConstExpr::i32_const(v),
        WasmLiteral::I64(v) => ConstExpr::i64_const(v),
        WasmLiteral::F32(v) => ConstExpr::f32_const(v),
        WasmLiteral::F64(v) => ConstExpr::f64_const(v),
        WasmLiteral::NullRef(ty) => ConstExpr::ref_null(ref_type(ty).heap_type),
    }
}

fn const_instruction(value: WasmLiteral) -> WI<'static> {
    match value {
        WasmLiteral::I32(v) => WI::I32Const(v),
        WasmLiteral::I64(v) => WI::I64Const(v),
        WasmLiteral::F32(v) => WI::F32Const(v),
        WasmLiteral::F64(v) => WI::F64Const(v),
        WasmLiteral::NullRef(ty) => WI::RefNull(ref_type(ty).heap_type),
    }
}

fn int_binary(width: NumWidth, op: IntBinaryOp) -> WI<'static> {
    use IntBinaryOp::*;
    match (width, op) {
        (NumWidth::Bits32, Add) => WI::I32Add,
        (NumWidth::Bits32, Sub) => WI::I32Sub,
        (NumWidth::Bits32, Mul) => WI::I32Mul,
        (NumWidth::Bits32, DivS) => WI::I32DivS,
        (NumWidth::Bits32, DivU) => WI::I32DivU,
        (NumWidth::Bits32, RemS) => WI::I32RemS,
        (NumWidth::Bits32, RemU) => WI::I32RemU,
        (NumWidth::Bits32, And) => WI::I32And,
        (NumWidth::Bits32, Or) => WI::I32Or,
        (NumWidth::Bits32, Xor) => WI::I32Xor,
        (NumWidth::Bits32, Shl) => WI::I32Shl,
        (NumWidth::Bits32, ShrS) => WI::I32ShrS,
        (NumWidth::Bits32, ShrU) => WI::I32ShrU,
        (NumWidth::Bits32, Rotl) => WI::I32Rotl,
        (NumWidth::Bits32, Rotr) => WI::I32Rotr,
        (NumWidth::Bits64, Add) => WI::I64Add,
        (NumWidth::Bits64, Sub) => WI::I64Sub,
        (NumWidth::Bits64, Mul) => WI::I64Mul,
        (NumWidth::Bits64, DivS) => WI::I64DivS,
        (NumWidth::Bits64, DivU) => WI::I64DivU,
        (NumWidth::Bits64, RemS) => WI::I64RemS,
        (NumWidth::Bits64, RemU) => WI::I64RemU,
        (NumWidth::Bits64, And) => WI::I64And,
        (NumWidth::Bits64, Or) => WI::I64Or,
        (NumWidth::Bits64, Xor) => WI::I64Xor,
        (NumWidth::Bits64, Shl) => WI::I64Shl,
        (NumWidth::Bits64, ShrS) => WI::I64ShrS,
        (NumWidth::Bits64, ShrU) => WI::I64ShrU,
        (NumWidth::Bits64, Rotl) => WI::I64Rotl,
        (NumWidth::Bits64, Rotr) => WI::I64Rotr,
    }
}

fn int_unary(width: NumWidth, op: IntUnaryOp) -> WI<'static> {
    match (width, op) {
        (NumWidth::Bits32, IntUnaryOp::Clz) => WI::I32Clz,
        (NumWidth::Bits32, IntUnaryOp::Ctz) => WI::I32Ctz,
        (NumWidth::Bits32, IntUnaryOp::Popcnt) => WI::I32Popcnt,
        (NumWidth::Bits64, IntUnaryOp::Clz) => WI::I64Clz,
        (NumWidth::Bits64, IntUnaryOp::Ctz) => WI::I64Ctz,
        (NumWidth::Bits64, IntUnaryOp::Popcnt) => WI::I64Popcnt,
    }
}

fn int_compare(width: NumWidth, op: IntCompareOp) -> WI<'static> {
    use IntCompareOp::*;
    match (width, op) {
        (NumWidth::Bits32, Eq) => WI::I32Eq,
        (NumWidth::Bits32, Ne) => WI::I32Ne,
        (NumWidth::Bits32, LtS) => WI::I32LtS,
        (NumWidth::Bits32, LtU) => WI::I32LtU,
        (NumWidth::Bits32, GtS) => WI::I32GtS,
        (NumWidth::Bits32, GtU) => WI::I32GtU,
        (NumWidth::Bits32, LeS) => WI::I32LeS,
        (NumWidth::Bits32, LeU) => WI::I32LeU,
        (NumWidth::Bits32, GeS) => WI::I32GeS,
        (NumWidth::Bits32, GeU) => WI::I32GeU,
        (NumWidth::Bits64, Eq) => WI::I64Eq,
        (NumWidth::Bits64, Ne) => WI::I64Ne,
        (NumWidth::Bits64, LtS) => WI::I64LtS,
        (NumWidth::Bits64, LtU) => WI::I64LtU,
        (NumWidth::Bits64, GtS) => WI::I64GtS,
        (NumWidth::Bits64, GtU) => WI::I64GtU,
        (NumWidth::Bits64, LeS) => WI::I64LeS,
        (NumWidth::Bits64, LeU) => WI::I64LeU,
        (NumWidth::Bits64, GeS) => WI::I64GeS,
        (NumWidth::Bits64, GeU) => WI::I64GeU,
    }
}

fn float_binary(width: NumWidth, op: FloatBinaryOp) -> WI<'static> {
    use FloatBinaryOp::*;
    match (width, op) {
        (NumWidth::Bits32, Add) => WI::F32Add,
        (NumWidth::Bits32, Sub) => WI::F32Sub,
        (NumWidth::Bits32, Mul) => WI::F32Mul,
        (NumWidth::Bits32, Div) => WI::F32Div,
        (NumWidth::Bits32, Min) => WI::F32Min,
        (NumWidth::Bits32, Max) => WI::F32Max,
        (NumWidth::Bits32, Copysign) => WI::F32Copysign,
        (NumWidth::Bits64, Add) => WI::F64Add,
        (NumWidth::Bits64, Sub) => WI::F64Sub,
        (NumWidth::Bits64, Mul) => WI::F64Mul,
        (NumWidth::Bits64, Div) => WI::F64Div,
        (NumWidth::Bits64, Min) => WI::F64Min,
        (NumWidth::Bits64, Max) => WI::F64Max,
        (NumWidth::Bits64, Copysign) => WI::F64Copysign,
    }
}

fn float_unary(width: NumWidth, op: FloatUnaryOp) -> WI<'static> {
    use FloatUnaryOp::*;
    match (width, op) {
        (NumWidth::Bits32, Abs) => WI::F32Abs,
        (NumWidth::Bits32, Neg) => WI::F32Neg,
        (NumWidth::Bits32, Ceil) => WI::F32Ceil,
        (NumWidth::Bits32, Floor) => WI::F32Floor,
        (NumWidth::Bits32, Trunc) => WI::F32Trunc,
        (NumWidth::Bits32, Nearest) => WI::F32Nearest,
        (NumWidth::Bits32, Sqrt) => WI::F32Sqrt,
        (NumWidth::Bits64, Abs) => WI::F64Abs,
        (NumWidth::Bits64, Neg) => WI::F64Neg,
        (NumWidth::Bits64, Ceil) => WI::F64Ceil,
        (NumWidth::Bits64, Floor) => WI::F64Floor,
        (NumWidth::Bits64, Trunc) => WI::F64Trunc,
        (NumWidth::Bits64, Nearest) => WI::F64Nearest,
        (NumWidth::Bits64, Sqrt) => WI::F64Sqrt,
    }
}

fn float_compare(width: NumWidth, op: FloatCompareOp) -> WI<'static> {
    use FloatCompareOp::*;
    match (width, op) {
        (NumWidth::Bits32, Eq) => WI::F32Eq,
        (NumWidth::Bits32, Ne) => WI::F32Ne,
        (NumWidth::Bits32, Lt) => WI::F32Lt,
        (NumWidth::Bits32, Gt) => WI::F32Gt,
        (NumWidth::Bits32, Le) => WI::F32Le,
        (NumWidth::Bits32, Ge) => WI::F32Ge,
        (NumWidth::Bits64, Eq) => WI::F64Eq,
        (NumWidth::Bits64, Ne) => WI::F64Ne,
        (NumWidth::Bits64, Lt) => WI::F64Lt,
        (NumWidth::Bits64, Gt) => WI::F64Gt,
        (NumWidth::Bits64, Le) => WI::F64Le,
        (NumWidth::Bits64, Ge) => WI::F64Ge,
    }
}
