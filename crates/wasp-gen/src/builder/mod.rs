//! Incremental, validity-preserving program construction.
//!
//! The builder keeps the scope tracker and typer in lock step with the
//! instructions it appends, so generators can ask for visible variables of a
//! given type at any point. Random generation draws code generators from the
//! active generator set, which templates may swap for the duration of a call
//! to [`ProgramBuilder::with_generators`].

mod js;
mod wasm;

use crate::context::FuzzContext;
use crate::generator::{CodeGenerator, GeneratorSet, InputContract};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};
use wasp_core::{BuilderConfig, Error, Result};
use wasp_ir::{
    input_types_ok, validate_program, Context, Environment, ILType, Instruction, Operation,
    Program, ScopeTracker, Typer, Variable,
};

pub struct ProgramBuilder {
    fuzz: Arc<FuzzContext>,
    rng: ChaCha8Rng,
    instructions: Vec<Instruction>,
    next_var: u32,
    scopes: ScopeTracker,
    typer: Typer,
    hidden: HashSet<Variable>,
    /// Generator set used by `build`
    generators: Arc<GeneratorSet>,
    recursion_depth: usize,
    /// First structural problem seen while appending; reported by `finalize`
    structural_error: Option<String>,
    /// Variable renaming for instructions adopted from another program
    var_map: HashMap<Variable, Variable>,
}

impl ProgramBuilder {
    pub fn new(fuzz: Arc<FuzzContext>, seed: u64) -> Self {
        let typer = Typer::new(Arc::clone(&fuzz.environment));
        let generators = Arc::clone(&fuzz.generators);
        Self {
            fuzz,
            rng: ChaCha8Rng::seed_from_u64(seed),
            instructions: Vec::new(),
            next_var: 0,
            scopes: ScopeTracker::new(),
            typer,
            hidden: HashSet::new(),
            generators,
            recursion_depth: 0,
            structural_error: None,
            var_map: HashMap::new(),
        }
    }

    /// Drop the program under construction. The random state is kept.
    pub fn reset(&mut self) {
        self.instructions.clear();
        self.next_var = 0;
        self.scopes = ScopeTracker::new();
        self.typer.reset();
        self.hidden.clear();
        self.generators = Arc::clone(&self.fuzz.generators);
        self.recursion_depth = 0;
        self.structural_error = None;
        self.var_map.clear();
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    pub fn fuzz_context(&self) -> &Arc<FuzzContext> {
        &self.fuzz
    }

    pub fn environment(&self) -> &Environment {
        &self.fuzz.environment
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.fuzz.config.builder
    }

    /// Context of the current insertion point
    pub fn context(&self) -> Context {
        self.scopes.context()
    }

    pub fn scopes(&self) -> &ScopeTracker {
        &self.scopes
    }

    pub fn typer(&self) -> &Typer {
        &self.typer
    }

    pub fn type_of(&self, var: Variable) -> ILType {
        self.typer.type_of(var)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn recursion_depth(&self) -> usize {
        self.recursion_depth
    }

    fn fresh(&mut self) -> Variable {
        let var = Variable(self.next_var);
        self.next_var += 1;
        var
    }

    /// Append `operation` with fresh outputs. Returns the appended instruction.
    pub fn emit(&mut self, operation: Operation, inputs: Vec<Variable>) -> Instruction {
        let outputs = (0..operation.num_outputs()).map(|_| self.fresh()).collect();
        let inner_outputs = (0..operation.num_inner_outputs()).map(|_| self.fresh()).collect();
        let inst = Instruction::new(operation, inputs, outputs, inner_outputs);
        self.append(inst.clone());
        inst
    }

    /// Append an operation with exactly one output and return it
    pub(crate) fn emit_value(&mut self, operation: Operation, inputs: Vec<Variable>) -> Variable {
        debug_assert_eq!(operation.num_outputs(), 1);
        let output = self.fresh();
        let inst = Instruction::new(operation, inputs, vec![output], Vec::new());
        self.append(inst);
        output
    }

    /// Append an instruction whose variables are already allocated
    pub fn append(&mut self, inst: Instruction) {
        if self.structural_error.is_none() {
            if let Err(problem) = self.check(&inst) {
                debug!("Structural problem at instruction {}: {}", self.instructions.len(), problem);
                self.structural_error = Some(format!("{} ({})", problem, inst));
            }
        }
        for var in inst.all_outputs() {
            if var.0 >= self.next_var {
                self.next_var = var.0 + 1;
            }
        }
        self.scopes.apply(&inst);
        self.typer.analyze(&inst);
        self.instructions.push(inst);
    }

    fn check(&self, inst: &Instruction) -> std::result::Result<(), String> {
        if !inst.has_consistent_arity() {
            return Err("operand counts do not match the operation".to_string());
        }
        if let Some(input) = inst.inputs.iter().find(|v| !self.scopes.is_visible(**v)) {
            return Err(format!("{} is not visible", input));
        }
        self.scopes.check(inst)?;
        let input_types: Vec<ILType> = inst.inputs.iter().map(|v| self.typer.type_of(*v)).collect();
        if !input_types_ok(&inst.operation, &input_types, self.scopes.current_wasm_function()) {
            return Err("input types do not fit the operation".to_string());
        }
        if let Operation::EndWasmModule = inst.operation {
            if let Some(category) = self.typer.current_module().and_then(|m| m.ordering_violation()) {
                return Err(format!("{:?} import declared after a definition", category));
            }
        }
        Ok(())
    }

    // Variable queries. Hidden variables are never returned.

    pub fn hide(&mut self, var: Variable) {
        self.hidden.insert(var);
    }

    pub fn unhide(&mut self, var: Variable) {
        self.hidden.remove(&var);
    }

    pub fn is_hidden(&self, var: Variable) -> bool {
        self.hidden.contains(&var)
    }

    pub fn visible_variables(&self) -> Vec<Variable> {
        self.scopes
            .visible_variables()
            .filter(|v| !self.hidden.contains(v))
            .collect()
    }

    pub fn has_variable_matching(&self, predicate: impl Fn(&ILType) -> bool) -> bool {
        self.scopes
            .visible_variables()
            .any(|v| !self.hidden.contains(&v) && predicate(&self.typer.type_of(v)))
    }

    pub fn random_variable_matching(&mut self, predicate: impl Fn(&ILType) -> bool) -> Option<Variable> {
        let candidates: Vec<Variable> = self
            .scopes
            .visible_variables()
            .filter(|v| !self.hidden.contains(v) && predicate(&self.typer.type_of(*v)))
            .collect();
        candidates.choose(&mut self.rng).copied()
    }

    /// A visible JavaScript value
    pub fn random_variable(&mut self) -> Option<Variable> {
        self.random_variable_matching(ILType::is_js_value)
    }

    pub fn random_variable_of_type(&mut self, ty: &ILType) -> Option<Variable> {
        self.random_variable_matching(|t| t == ty)
    }

    /// A visible JavaScript value, creating a number when none exists
    pub fn random_js_value(&mut self) -> Variable {
        match self.random_variable() {
            Some(var) => var,
            None => {
                let value = self.random_integer();
                self.load_integer(value)
            }
        }
    }

    // Random generation

    /// Append roughly `budget` instructions drawn from the active generator set
    pub fn build(&mut self, budget: usize) {
        let mut remaining = budget;
        let mut failures = 0;
        while remaining > 0 {
            let before = self.instructions.len();
            let ran = self.run_random_generator();
            let appended = self.instructions.len() - before;
            if !ran || appended == 0 {
                failures += 1;
                if failures >= self.config().max_consecutive_failures {
                    trace!("Giving up after {} fruitless generator draws", failures);
                    break;
                }
                continue;
            }
            failures = 0;
            remaining = remaining.saturating_sub(appended);
        }
    }

    /// Build nested code from within a generator body
    pub fn build_recursive(&mut self) {
        let max_budget = self.config().recursive_budget.max(1);
        let budget = self.rng.gen_range(1..=max_budget);
        self.recursion_depth += 1;
        self.build(budget);
        self.recursion_depth -= 1;
    }

    /// Create a few values so that later generators find inputs
    pub fn build_prefix(&mut self) {
        let values = Arc::clone(&self.fuzz.value_generators);
        let size = self.config().prefix_size;
        self.with_generators(values, |b| b.build(size));
    }

    /// Run `body` with `generators` as the active set, restoring the previous set afterwards
    pub fn with_generators<T>(
        &mut self,
        generators: Arc<GeneratorSet>,
        body: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let saved = std::mem::replace(&mut self.generators, generators);
        let result = body(self);
        self.generators = saved;
        result
    }

    pub fn active_generators(&self) -> &Arc<GeneratorSet> {
        &self.generators
    }

    fn can_satisfy(&self, contract: InputContract) -> bool {
        match contract {
            InputContract::None | InputContract::Preferred(_) => true,
            InputContract::One => self.has_variable_matching(ILType::is_js_value),
            InputContract::Required(predicate) => self.has_variable_matching(predicate),
        }
    }

    fn bind_inputs(&mut self, contract: InputContract) -> Option<Vec<Variable>> {
        match contract {
            InputContract::None => Some(Vec::new()),
            InputContract::One => self.random_variable().map(|v| vec![v]),
            InputContract::Required(predicate) => self.random_variable_matching(predicate).map(|v| vec![v]),
            InputContract::Preferred(predicate) => self
                .random_variable_matching(predicate)
                .or_else(|| self.random_variable())
                .map(|v| vec![v]),
        }
    }

    /// Draw one eligible generator and run it. Returns false when nothing was eligible.
    pub fn run_random_generator(&mut self) -> bool {
        let context = self.context();
        let leaf_only = self.recursion_depth >= self.config().max_recursion_depth;
        let generators = Arc::clone(&self.generators);
        let eligible: Vec<bool> = generators
            .iter()
            .map(|(generator, _)| {
                context.contains(generator.context)
                    && !(leaf_only && generator.recursive)
                    && self.can_satisfy(generator.inputs)
            })
            .collect();
        let Some(index) = generators.choose_index_where(&mut self.rng, |idx, _| eligible[idx]) else {
            return false;
        };
        let Some(generator) = generators.get(index) else {
            return false;
        };
        self.run_generator(generator)
    }

    /// Bind inputs for `generator` and run it
    pub fn run_generator(&mut self, generator: &CodeGenerator) -> bool {
        let Some(inputs) = self.bind_inputs(generator.inputs) else {
            return false;
        };
        trace!("Running {} at depth {}", generator.name, self.recursion_depth);
        generator.run(self, &inputs);
        true
    }

    // Adoption of instructions from another program

    /// Start adopting instructions of a new source program
    pub fn begin_adoption(&mut self) {
        self.var_map.clear();
    }

    /// The variable an adopted source variable was renamed to
    pub fn map(&self, var: Variable) -> Option<Variable> {
        self.var_map.get(&var).copied()
    }

    fn map_inputs(&mut self, inst: &Instruction) -> Vec<Variable> {
        let mut mapped = Vec::with_capacity(inst.inputs.len());
        for input in &inst.inputs {
            match self.var_map.get(input) {
                Some(var) => mapped.push(*var),
                None => {
                    if self.structural_error.is_none() {
                        self.structural_error = Some(format!("adopted input {} was never defined", input));
                    }
                    mapped.push(*input);
                }
            }
        }
        mapped
    }

    /// Re-emit `inst` unchanged apart from variable renaming
    pub fn adopt(&mut self, inst: &Instruction) {
        let inputs = self.map_inputs(inst);
        self.adopt_as(inst, inst.operation.clone(), inputs);
    }

    /// Re-emit `inst` with a replacement operation and inputs (already renamed).
    /// The operation must have the same output arity as the original.
    pub fn adopt_as(&mut self, inst: &Instruction, operation: Operation, inputs: Vec<Variable>) {
        let emitted = self.emit(operation, inputs);
        for (old, new) in inst.outputs.iter().zip(&emitted.outputs) {
            self.var_map.insert(*old, *new);
        }
        for (old, new) in inst.inner_outputs.iter().zip(&emitted.inner_outputs) {
            self.var_map.insert(*old, *new);
        }
    }

    /// Renamed inputs of a source instruction
    pub fn adopted_inputs(&mut self, inst: &Instruction) -> Vec<Variable> {
        self.map_inputs(inst)
    }

    /// Types the outputs of `operation` would have with these inputs
    pub fn infer_output_types(&self, operation: &Operation, inputs: &[Variable]) -> Vec<ILType> {
        self.typer.infer_output_types(operation, inputs)
    }

    /// Finish the program. The builder is reset afterwards.
    pub fn finalize(&mut self) -> Result<Program> {
        let problem = self.structural_error.take();
        let open_blocks = self.scopes.depth();
        let program = Program::with_instructions(std::mem::take(&mut self.instructions));
        self.reset();

        if let Some(problem) = problem {
            return Err(Error::Validation(problem));
        }
        if open_blocks != 0 {
            return Err(Error::Validation(format!("{} block(s) left open", open_blocks)));
        }
        validate_program(&program, &self.fuzz.environment)?;
        debug!("Finalized program with {} instructions", program.len());
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasp_core::FuzzConfig;
    use wasp_ir::{EntityType, WasmValueType};

    fn builder(seed: u64) -> ProgramBuilder {
        let fuzz = Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap());
        ProgramBuilder::new(fuzz, seed)
    }

    #[test]
    fn test_build_produces_valid_programs() {
        for seed in 0..20 {
            let mut b = builder(seed);
            b.build_prefix();
            b.build(40);
            let program = b.finalize().unwrap();
            assert!(!program.is_empty());
        }
    }

    #[test]
    fn test_same_seed_same_program() {
        let mut a = builder(7);
        let mut b = builder(7);
        a.build_prefix();
        a.build(30);
        b.build_prefix();
        b.build(30);
        assert_eq!(a.finalize().unwrap(), b.finalize().unwrap());
    }

    #[test]
    fn test_hidden_variables_are_not_returned() {
        let mut b = builder(1);
        let v = b.load_integer(3);
        b.hide(v);
        assert!(b.random_variable().is_none());
        b.unhide(v);
        assert_eq!(b.random_variable(), Some(v));
    }

    #[test]
    fn test_open_block_fails_finalize() {
        let mut b = builder(1);
        let cond = b.load_boolean(true);
        b.emit(Operation::BeginIf, vec![cond]);
        assert!(matches!(b.finalize(), Err(Error::Validation(_))));
        // The builder is usable again
        b.load_null();
        assert!(b.finalize().is_ok());
    }

    #[test]
    fn test_finalize_uses_the_session_environment() {
        let environment = Environment::javascript().with_builtin(
            "sharedCounter",
            ILType::WasmObject(EntityType::Global { ty: WasmValueType::I32, mutable: true }),
        );
        let fuzz = Arc::new(FuzzContext::with_environment(FuzzConfig::default(), environment).unwrap());
        let mut b = ProgramBuilder::new(fuzz, 1);
        let counter = b.load_builtin("sharedCounter");
        b.emit(Operation::BeginWasmModule, vec![]);
        b.wasm_import_global(counter);
        b.emit(Operation::EndWasmModule, vec![]);
        assert!(b.finalize().is_ok());
    }

    #[test]
    fn test_with_generators_restores_active_set() {
        let mut b = builder(3);
        let original = Arc::clone(b.active_generators());
        let values = Arc::clone(&b.fuzz_context().value_generators);
        b.with_generators(Arc::clone(&values), |inner| {
            assert!(Arc::ptr_eq(inner.active_generators(), &values));
            inner.build(3);
        });
        assert!(Arc::ptr_eq(b.active_generators(), &original));
    }

    #[test]
    fn test_adopt_renames_variables() {
        let mut source = builder(5);
        let a = source.load_integer(1);
        let c = source.load_integer(2);
        source.binary(a, c, wasp_ir::BinaryOperator::Add);
        let program = source.finalize().unwrap();

        let mut b = builder(5);
        b.load_string("shift");
        b.begin_adoption();
        for inst in program.iter() {
            b.adopt(inst);
        }
        let adopted = b.finalize().unwrap();
        assert_eq!(adopted.len(), 4);
        assert_eq!(adopted.instructions[3].inputs, vec![Variable(1), Variable(2)]);
    }
}
