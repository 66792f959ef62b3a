//! Generators for JavaScript operations and control flow.

use crate::builder::ProgramBuilder;
use crate::generator::{CodeGenerator, InputContract};
use rand::seq::SliceRandom;
use rand::Rng;
use wasp_ir::{BinaryOperator, Comparator, Context, ILType, UnaryOperator, Variable};

const API_GROUPS: [&str; 4] = ["Math", "JSON", "Reflect", "Atomics"];

pub fn generators() -> Vec<(CodeGenerator, u32)> {
    let js = Context::JAVASCRIPT;
    let object_like = InputContract::Preferred(ILType::is_object_like);
    vec![
        (CodeGenerator::new("PropertyRetrievalGenerator", js, property_retrieval).with_input(object_like), 30),
        (CodeGenerator::new("PropertyAssignmentGenerator", js, property_assignment).with_input(object_like), 30),
        (CodeGenerator::new("PropertyRemovalGenerator", js, property_removal).with_input(object_like), 5),
        (
            CodeGenerator::new("ElementRetrievalGenerator", js, element_retrieval)
                .with_input(InputContract::Preferred(is_array)),
            20,
        ),
        (
            CodeGenerator::new("ElementAssignmentGenerator", js, element_assignment)
                .with_input(InputContract::Preferred(is_array)),
            20,
        ),
        (
            CodeGenerator::new("ComputedPropertyRetrievalGenerator", js, computed_retrieval).with_input(object_like),
            20,
        ),
        (
            CodeGenerator::new("ComputedPropertyAssignmentGenerator", js, computed_assignment).with_input(object_like),
            20,
        ),
        (CodeGenerator::new("MethodCallGenerator", js, method_call).with_input(object_like), 20),
        (
            CodeGenerator::new("FunctionCallGenerator", js, function_call)
                .with_input(InputContract::Required(ILType::is_callable)),
            20,
        ),
        (
            CodeGenerator::new("ConstructorCallGenerator", js, constructor_call)
                .with_input(InputContract::Required(ILType::is_callable)),
            10,
        ),
        (CodeGenerator::new("ApiMethodCallGenerator", js, api_method_call), 15),
        (CodeGenerator::new("BinaryOperationGenerator", js, binary_operation).with_input(InputContract::One), 30),
        (CodeGenerator::new("UnaryOperationGenerator", js, unary_operation).with_input(InputContract::One), 10),
        (CodeGenerator::new("ComparisonGenerator", js, comparison).with_input(InputContract::One), 10),
        (CodeGenerator::new("NumberComputationGenerator", js, number_computation), 40),
        (CodeGenerator::new("ReassignmentGenerator", js, reassignment).with_input(InputContract::One), 10),
        (CodeGenerator::new("PlainFunctionGenerator", js, plain_function).recursive(), 15),
        (
            CodeGenerator::new("IfElseGenerator", js, if_else)
                .with_input(InputContract::Preferred(is_boolean))
                .recursive(),
            10,
        ),
        (CodeGenerator::new("RepeatLoopGenerator", js, repeat_loop).recursive(), 10),
        (CodeGenerator::new("TryCatchGenerator", js, try_catch).recursive(), 5),
        (
            CodeGenerator::new("ReturnGenerator", js | Context::SUBROUTINE, return_value),
            3,
        ),
        (CodeGenerator::new("LoopBreakGenerator", js | Context::LOOP, loop_break), 2),
        (CodeGenerator::new("LoopContinueGenerator", js | Context::LOOP, loop_continue), 2),
        (CodeGenerator::new("ThrowGenerator", js, throw).with_input(InputContract::One), 1),
    ]
}

fn is_array(ty: &ILType) -> bool {
    *ty == ILType::Array
}

fn is_boolean(ty: &ILType) -> bool {
    *ty == ILType::Boolean
}

fn property_retrieval(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let name = b.random_property_name();
    b.get_property(inputs[0], &name);
}

fn property_assignment(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let name = b.random_property_name();
    let value = b.random_js_value();
    b.set_property(inputs[0], &name, value);
}

fn property_removal(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let name = b.random_property_name();
    b.delete_property(inputs[0], &name);
}

fn random_index(b: &mut ProgramBuilder) -> i64 {
    if b.rng().gen_bool(0.9) {
        b.rng().gen_range(0..16)
    } else {
        b.random_integer()
    }
}

fn element_retrieval(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let index = random_index(b);
    b.get_element(inputs[0], index);
}

fn element_assignment(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let index = random_index(b);
    let value = b.random_js_value();
    b.set_element(inputs[0], index, value);
}

fn computed_retrieval(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let key = b.random_js_value();
    b.get_computed_property(inputs[0], key);
}

fn computed_assignment(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let key = b.random_js_value();
    let value = b.random_js_value();
    b.set_computed_property(inputs[0], key, value);
}

fn method_call(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let object = inputs[0];
    let method = b.random_method_name(object);
    let count = b.random_parameter_count();
    let args = (0..count).map(|_| b.random_js_value()).collect();
    b.call_method(object, &method, args, true);
}

fn function_call(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let function = inputs[0];
    let args = b.random_arguments(function);
    let guarded = b.rng().gen_bool(0.5);
    b.call_function(function, args, guarded);
}

fn constructor_call(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let constructor = inputs[0];
    let args = b.random_arguments(constructor);
    b.construct(constructor, args, true);
}

fn api_method_call(b: &mut ProgramBuilder, _: &[Variable]) {
    let group = API_GROUPS.choose(b.rng()).copied().unwrap_or("Math");
    let object = b.load_builtin(group);
    let method = b.random_method_name(object);
    let count = b.rng().gen_range(1..=2);
    let args = (0..count).map(|_| b.random_js_value()).collect();
    b.call_method(object, &method, args, group != "Math");
}

/// A right operand that does not mix BigInt with other primitives
fn operand_for(b: &mut ProgramBuilder, lhs: Variable) -> Variable {
    if b.type_of(lhs) == ILType::BigInt {
        match b.random_variable_of_type(&ILType::BigInt) {
            Some(rhs) => rhs,
            None => {
                let value = b.random_integer();
                b.load_bigint(value)
            }
        }
    } else {
        match b.random_variable_matching(|t| t.is_js_value() && *t != ILType::BigInt) {
            Some(rhs) => rhs,
            None => {
                let value = b.random_integer();
                b.load_integer(value)
            }
        }
    }
}

fn binary_operation(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let lhs = inputs[0];
    let rhs = operand_for(b, lhs);
    let op = *BinaryOperator::ALL.choose(b.rng()).unwrap_or(&BinaryOperator::Add);
    let op = if op == BinaryOperator::UnRShift && b.type_of(lhs) == ILType::BigInt {
        BinaryOperator::RShift
    } else {
        op
    };
    b.binary(lhs, rhs, op);
}

fn unary_operation(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let input = inputs[0];
    let op = *UnaryOperator::ALL.choose(b.rng()).unwrap_or(&UnaryOperator::LogicalNot);
    let op = if op == UnaryOperator::Plus && b.type_of(input) == ILType::BigInt {
        UnaryOperator::Minus
    } else {
        op
    };
    b.unary(op, input);
}

fn comparison(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let rhs = operand_for(b, inputs[0]);
    let op = *Comparator::ALL.choose(b.rng()).unwrap_or(&Comparator::Equal);
    b.compare(inputs[0], rhs, op);
}

fn number_value(b: &mut ProgramBuilder) -> Variable {
    match b.random_variable_matching(ILType::is_number) {
        Some(var) if b.rng().gen_bool(0.7) => var,
        _ => {
            if b.rng().gen_bool(0.5) {
                let value = b.random_integer();
                b.load_integer(value)
            } else {
                let value = b.random_float();
                b.load_float(value)
            }
        }
    }
}

fn number_computation(b: &mut ProgramBuilder, _: &[Variable]) {
    let mut value = number_value(b);
    for _ in 0..b.rng().gen_range(1..=4) {
        let rhs = number_value(b);
        let op = *BinaryOperator::ALL[..12].choose(b.rng()).unwrap_or(&BinaryOperator::Add);
        value = b.binary(value, rhs, op);
    }
    if b.rng().gen_bool(0.3) {
        let math = b.load_builtin("Math");
        let method = b.random_method_name(math);
        b.call_method(math, &method, vec![value], false);
    }
}

/// Reassign a variable with a value of the same static type
fn reassignment(b: &mut ProgramBuilder, inputs: &[Variable]) {
    let target = inputs[0];
    let ty = b.type_of(target);
    if let Some(value) = b.random_variable_matching(|t| *t == ty) {
        if value != target {
            b.reassign(target, value);
        }
    }
}

fn plain_function(b: &mut ProgramBuilder, _: &[Variable]) {
    let num_parameters = b.random_parameter_count();
    b.build_plain_function(num_parameters, |b, _| {
        b.build_recursive();
        let value = b.random_js_value();
        b.do_return(Some(value));
    });
}

fn if_else(b: &mut ProgramBuilder, inputs: &[Variable]) {
    if b.rng().gen_bool(0.5) {
        b.build_if_else(inputs[0], |b| b.build_recursive(), |b| b.build_recursive());
    } else {
        b.build_if(inputs[0], |b| b.build_recursive());
    }
}

fn repeat_loop(b: &mut ProgramBuilder, _: &[Variable]) {
    let iterations = *[1u32, 2, 5, 10, 25, 100].choose(b.rng()).unwrap_or(&10);
    b.build_repeat_loop(iterations, |b, _| b.build_recursive());
}

fn try_catch(b: &mut ProgramBuilder, _: &[Variable]) {
    b.build_try_catch(|b| b.build_recursive(), |b, _| b.build_recursive());
}

fn return_value(b: &mut ProgramBuilder, _: &[Variable]) {
    let value = b.random_js_value();
    b.do_return(Some(value));
}

fn loop_break(b: &mut ProgramBuilder, _: &[Variable]) {
    b.loop_break();
}

fn loop_continue(b: &mut ProgramBuilder, _: &[Variable]) {
    b.loop_continue();
}

fn throw(b: &mut ProgramBuilder, inputs: &[Variable]) {
    b.throw_exception(inputs[0]);
}
