//! JavaScript instruction helpers and random JavaScript literals.

use super::ProgramBuilder;
use rand::seq::SliceRandom;
use rand::Rng;
use wasp_ir::{BinaryOperator, Comparator, ILType, Operation, UnaryOperator, Variable};

impl ProgramBuilder {
    pub fn load_integer(&mut self, value: i64) -> Variable {
        self.emit_value(Operation::LoadInteger { value }, vec![])
    }

    pub fn load_bigint(&mut self, value: i64) -> Variable {
        self.emit_value(Operation::LoadBigInt { value }, vec![])
    }

    pub fn load_float(&mut self, value: f64) -> Variable {
        self.emit_value(Operation::LoadFloat { value }, vec![])
    }

    pub fn load_string(&mut self, value: &str) -> Variable {
        self.emit_value(Operation::LoadString { value: value.to_string() }, vec![])
    }

    pub fn load_boolean(&mut self, value: bool) -> Variable {
        self.emit_value(Operation::LoadBoolean { value }, vec![])
    }

    pub fn load_undefined(&mut self) -> Variable {
        self.emit_value(Operation::LoadUndefined, vec![])
    }

    pub fn load_null(&mut self) -> Variable {
        self.emit_value(Operation::LoadNull, vec![])
    }

    pub fn load_regexp(&mut self, pattern: &str, flags: &str) -> Variable {
        self.emit_value(
            Operation::LoadRegExp {
                pattern: pattern.to_string(),
                flags: flags.to_string(),
            },
            vec![],
        )
    }

    pub fn load_builtin(&mut self, name: &str) -> Variable {
        self.emit_value(Operation::LoadBuiltin { name: name.to_string() }, vec![])
    }

    /// Object literal with one property per `(name, value)` pair
    pub fn create_object(&mut self, properties: &[(&str, Variable)]) -> Variable {
        let property_names = properties.iter().map(|(name, _)| name.to_string()).collect();
        let values = properties.iter().map(|(_, value)| *value).collect();
        self.emit_value(Operation::CreateObject { property_names }, values)
    }

    pub fn create_array(&mut self, elements: Vec<Variable>) -> Variable {
        self.emit_value(Operation::CreateArray { size: elements.len() }, elements)
    }

    pub fn get_property(&mut self, object: Variable, name: &str) -> Variable {
        self.emit_value(Operation::GetProperty { name: name.to_string() }, vec![object])
    }

    pub fn set_property(&mut self, object: Variable, name: &str, value: Variable) {
        self.emit(Operation::SetProperty { name: name.to_string() }, vec![object, value]);
    }

    pub fn delete_property(&mut self, object: Variable, name: &str) -> Variable {
        self.emit_value(Operation::DeleteProperty { name: name.to_string() }, vec![object])
    }

    pub fn get_element(&mut self, array: Variable, index: i64) -> Variable {
        self.emit_value(Operation::GetElement { index }, vec![array])
    }

    pub fn set_element(&mut self, array: Variable, index: i64, value: Variable) {
        self.emit(Operation::SetElement { index }, vec![array, value]);
    }

    pub fn get_computed_property(&mut self, object: Variable, key: Variable) -> Variable {
        self.emit_value(Operation::GetComputedProperty, vec![object, key])
    }

    pub fn set_computed_property(&mut self, object: Variable, key: Variable, value: Variable) {
        self.emit(Operation::SetComputedProperty, vec![object, key, value]);
    }

    pub fn call_function(&mut self, function: Variable, args: Vec<Variable>, guarded: bool) -> Variable {
        let mut inputs = vec![function];
        let num_args = args.len();
        inputs.extend(args);
        self.emit_value(Operation::CallFunction { num_args, guarded }, inputs)
    }

    pub fn call_method(
        &mut self,
        object: Variable,
        method: &str,
        args: Vec<Variable>,
        guarded: bool,
    ) -> Variable {
        let mut inputs = vec![object];
        let num_args = args.len();
        inputs.extend(args);
        self.emit_value(
            Operation::CallMethod {
                method: method.to_string(),
                num_args,
                guarded,
            },
            inputs,
        )
    }

    pub fn construct(&mut self, constructor: Variable, args: Vec<Variable>, guarded: bool) -> Variable {
        let mut inputs = vec![constructor];
        let num_args = args.len();
        inputs.extend(args);
        self.emit_value(Operation::Construct { num_args, guarded }, inputs)
    }

    pub fn binary(&mut self, lhs: Variable, rhs: Variable, op: BinaryOperator) -> Variable {
        self.emit_value(Operation::BinaryOperation { op }, vec![lhs, rhs])
    }

    pub fn unary(&mut self, op: UnaryOperator, input: Variable) -> Variable {
        self.emit_value(Operation::UnaryOperation { op }, vec![input])
    }

    pub fn compare(&mut self, lhs: Variable, rhs: Variable, op: Comparator) -> Variable {
        self.emit_value(Operation::Compare { op }, vec![lhs, rhs])
    }

    pub fn reassign(&mut self, target: Variable, value: Variable) {
        self.emit(Operation::Reassign, vec![target, value]);
    }

    pub fn do_return(&mut self, value: Option<Variable>) {
        match value {
            Some(value) => self.emit(Operation::Return { has_value: true }, vec![value]),
            None => self.emit(Operation::Return { has_value: false }, vec![]),
        };
    }

    pub fn throw_exception(&mut self, value: Variable) {
        self.emit(Operation::ThrowException, vec![value]);
    }

    pub fn loop_break(&mut self) {
        self.emit(Operation::LoopBreak, vec![]);
    }

    pub fn loop_continue(&mut self) {
        self.emit(Operation::LoopContinue, vec![]);
    }

    // Blocks

    /// Define a function; `body` receives the parameters
    pub fn build_plain_function(
        &mut self,
        num_parameters: usize,
        body: impl FnOnce(&mut Self, &[Variable]),
    ) -> Variable {
        let begin = self.emit(Operation::BeginPlainFunction { num_parameters }, vec![]);
        body(self, &begin.inner_outputs);
        self.emit(Operation::EndPlainFunction, vec![]);
        begin.outputs[0]
    }

    pub fn build_if(&mut self, condition: Variable, body: impl FnOnce(&mut Self)) {
        self.emit(Operation::BeginIf, vec![condition]);
        body(self);
        self.emit(Operation::EndIf, vec![]);
    }

    pub fn build_if_else(
        &mut self,
        condition: Variable,
        then_body: impl FnOnce(&mut Self),
        else_body: impl FnOnce(&mut Self),
    ) {
        self.emit(Operation::BeginIf, vec![condition]);
        then_body(self);
        self.emit(Operation::BeginElse, vec![]);
        else_body(self);
        self.emit(Operation::EndIf, vec![]);
    }

    /// Counting loop; `body` receives the counter
    pub fn build_repeat_loop(&mut self, iterations: u32, body: impl FnOnce(&mut Self, Variable)) {
        let begin = self.emit(Operation::BeginRepeatLoop { iterations }, vec![]);
        body(self, begin.inner_outputs[0]);
        self.emit(Operation::EndRepeatLoop, vec![]);
    }

    /// try/catch; `catch_body` receives the exception
    pub fn build_try_catch(
        &mut self,
        try_body: impl FnOnce(&mut Self),
        catch_body: impl FnOnce(&mut Self, Variable),
    ) {
        self.emit(Operation::BeginTry, vec![]);
        try_body(self);
        let catch = self.emit(Operation::BeginCatch, vec![]);
        catch_body(self, catch.inner_outputs[0]);
        self.emit(Operation::EndTryCatch, vec![]);
    }

    // Random JavaScript values

    pub fn random_integer(&mut self) -> i64 {
        if self.rng.gen_bool(0.5) {
            let pool = &self.fuzz.environment.interesting_integers;
            if let Some(value) = pool.choose(&mut self.rng) {
                return *value;
            }
        }
        self.rng.gen_range(-0x1_0000..0x1_0000)
    }

    pub fn random_float(&mut self) -> f64 {
        if self.rng.gen_bool(0.5) {
            let pool = &self.fuzz.environment.interesting_floats;
            if let Some(value) = pool.choose(&mut self.rng) {
                return *value;
            }
        }
        self.rng.gen_range(-1_000_000.0..1_000_000.0)
    }

    pub fn random_string(&mut self) -> String {
        let env = &self.fuzz.environment;
        let pool = if self.rng.gen_bool(0.5) {
            &env.interesting_strings
        } else {
            &env.property_names
        };
        pool.choose(&mut self.rng).cloned().unwrap_or_default()
    }

    pub fn random_property_name(&mut self) -> String {
        self.fuzz
            .environment
            .property_names
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "a".to_string())
    }

    /// A method name, preferring methods known for the object's group
    pub fn random_method_name(&mut self, object: Variable) -> String {
        if let ILType::Object { group: Some(group) } = self.type_of(object) {
            let known = self.fuzz.environment.methods_of(&group);
            if let Some(method) = known.choose(&mut self.rng) {
                return method.clone();
            }
        }
        self.fuzz
            .environment
            .method_names
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "toString".to_string())
    }

    pub fn random_builtin(&mut self) -> String {
        let names: Vec<&str> = self.fuzz.environment.builtin_names().collect();
        names
            .choose(&mut self.rng)
            .map(|name| name.to_string())
            .unwrap_or_else(|| "Object".to_string())
    }

    pub fn random_parameter_count(&mut self) -> usize {
        let max = self.config().max_parameters;
        self.rng.gen_range(0..=max)
    }

    /// Arguments for calling `function`, one per known parameter
    pub fn random_arguments(&mut self, function: Variable) -> Vec<Variable> {
        let count = match self.type_of(function) {
            ILType::Function { parameters } => parameters,
            _ => self.random_parameter_count(),
        };
        (0..count).map(|_| self.random_js_value()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::FuzzContext;
    use std::sync::Arc;
    use wasp_core::FuzzConfig;

    fn builder() -> ProgramBuilder {
        ProgramBuilder::new(Arc::new(FuzzContext::new(FuzzConfig::default()).unwrap()), 42)
    }

    #[test]
    fn test_blocks_are_balanced() {
        let mut b = builder();
        let f = b.build_plain_function(2, |b, params| {
            assert_eq!(params.len(), 2);
            let sum = b.binary(params[0], params[1], BinaryOperator::Add);
            b.do_return(Some(sum));
        });
        b.build_repeat_loop(10, |b, i| {
            let args = vec![i, i];
            b.call_function(f, args, false);
            b.loop_break();
        });
        b.build_try_catch(
            |b| {
                let x = b.load_integer(1);
                b.throw_exception(x);
            },
            |b, e| {
                b.get_property(e, "message");
            },
        );
        let program = b.finalize().unwrap();
        assert_eq!(program.len(), 14);
    }

    #[test]
    fn test_return_outside_function_is_rejected() {
        let mut b = builder();
        b.do_return(None);
        assert!(b.finalize().is_err());
    }

    #[test]
    fn test_function_parameters_leave_scope() {
        let mut b = builder();
        let mut param = None;
        b.build_plain_function(1, |_, params| param = Some(params[0]));
        let param = param.unwrap();
        assert!(!b.scopes().is_visible(param));
        assert_eq!(b.type_of(Variable(0)), ILType::Function { parameters: 1 });
    }

    #[test]
    fn test_random_arguments_follow_parameter_count() {
        let mut b = builder();
        let f = b.build_plain_function(3, |_, _| {});
        assert_eq!(b.random_arguments(f).len(), 3);
    }
}
