//! Structural validation of IR programs.

use crate::environment::Environment;
use crate::instruction::Instruction;
use crate::operation::Operation;
use crate::program::Program;
use crate::scope::ScopeTracker;
use crate::typer::{float_width_of, int_width_of, Typer};
use crate::types::{EntityType, ILType, WasmSignature, WasmValueType};
use std::sync::Arc;
use tracing::trace;
use wasp_core::{Error, Result};

/// Validate that a program is well-formed, typing builtins against `environment`
pub fn validate_program(program: &Program, environment: &Arc<Environment>) -> Result<()> {
    let mut scopes = ScopeTracker::new();
    let mut typer = Typer::new(Arc::clone(environment));
    let mut next_fresh = 0u32;

    for (idx, inst) in program.instructions.iter().enumerate() {
        let fail = |msg: String| Error::Validation(format!("instruction {} ({}): {}", idx, inst, msg));

        if !inst.has_consistent_arity() {
            return Err(fail("operand counts do not match the operation".to_string()));
        }

        for input in &inst.inputs {
            if !scopes.is_visible(*input) {
                return Err(fail(format!("{} is not visible here", input)));
            }
        }

        scopes.check(inst).map_err(fail)?;

        let input_types: Vec<ILType> = inst.inputs.iter().map(|v| typer.type_of(*v)).collect();
        if !input_types_ok(&inst.operation, &input_types, scopes.current_wasm_function()) {
            return Err(fail("input types do not fit the operation".to_string()));
        }

        for output in inst.all_outputs() {
            if output.0 < next_fresh {
                return Err(fail(format!("{} is not a fresh variable", output)));
            }
            next_fresh = output.0 + 1;
        }

        if let Operation::EndWasmModule = inst.operation {
            if let Some(category) = typer.current_module().and_then(|m| m.ordering_violation()) {
                return Err(fail(format!(
                    "{:?} import declared after a {:?} definition",
                    category, category
                )));
            }
        }

        scopes.apply(inst);
        typer.analyze(inst);
    }

    if scopes.depth() != 0 {
        return Err(Error::Validation(format!(
            "{} block(s) left open at end of program",
            scopes.depth()
        )));
    }

    trace!("Validated {} instructions", program.len());
    Ok(())
}

fn wasm(ty: &ILType, expected: WasmValueType) -> bool {
    ty.is_wasm_value(expected)
}

/// Whether inputs of these types are acceptable for the operation.
/// `function` is the signature of the enclosing Wasm function, if any.
pub fn input_types_ok(op: &Operation, inputs: &[ILType], function: Option<&WasmSignature>) -> bool {
    use Operation::*;
    let i32_ty = WasmValueType::I32;
    match op {
        WasmIntBinary { width, .. } | WasmIntCompare { width, .. } => inputs
            .iter()
            .all(|t| int_width_of(t) == Some(*width)),
        WasmIntUnary { width, .. } | WasmIntEqz { width } => {
            inputs.iter().all(|t| int_width_of(t) == Some(*width))
        }
        WasmFloatBinary { width, .. } | WasmFloatCompare { width, .. } | WasmFloatUnary { width, .. } => {
            inputs.iter().all(|t| float_width_of(t) == Some(*width))
        }
        WasmLoadGlobal => matches!(inputs, [ILType::WasmEntity(EntityType::Global { .. })]),
        WasmStoreGlobal => match inputs {
            [ILType::WasmEntity(EntityType::Global { ty, mutable: true }), value] => wasm(value, *ty),
            _ => false,
        },
        WasmTableGet => match inputs {
            [ILType::WasmEntity(EntityType::Table { .. }), index] => wasm(index, i32_ty),
            _ => false,
        },
        WasmTableSet => match inputs {
            [ILType::WasmEntity(EntityType::Table { element, .. }), index, value] => {
                wasm(index, i32_ty) && wasm(value, *element)
            }
            _ => false,
        },
        WasmMemoryLoad { ty, .. } => match inputs {
            [ILType::WasmEntity(EntityType::Memory { .. }), address] => {
                ty.is_numeric() && wasm(address, i32_ty)
            }
            _ => false,
        },
        WasmMemoryStore { ty, .. } => match inputs {
            [ILType::WasmEntity(EntityType::Memory { .. }), address, value] => {
                ty.is_numeric() && wasm(address, i32_ty) && wasm(value, *ty)
            }
            _ => false,
        },
        WasmCallFunction { signature } => match inputs.split_first() {
            Some((ILType::WasmEntity(EntityType::Function(callee)), args)) => {
                callee == signature
                    && args.len() == signature.params.len()
                    && args.iter().zip(&signature.params).all(|(a, p)| wasm(a, *p))
            }
            _ => false,
        },
        WasmReassign => match inputs {
            [target, value] => target.is_any_wasm_value() && target == value,
            _ => false,
        },
        WasmReturn { has_value } => match function {
            Some(signature) => match (signature.result(), inputs) {
                (Some(result), [value]) => *has_value && wasm(value, result),
                (None, []) => !has_value,
                _ => false,
            },
            None => false,
        },
        EndWasmFunction { signature } => inputs
            .iter()
            .zip(&signature.results)
            .all(|(value, result)| wasm(value, *result)),
        WasmBeginIf => matches!(inputs, [c] if wasm(c, i32_ty)),
        WasmBranch => matches!(inputs, [ILType::Label]),
        WasmBranchIf => matches!(inputs, [ILType::Label, c] if wasm(c, i32_ty)),
        WasmImportGlobal => matches!(inputs, [t] if t.is_js_wasm_global()),
        WasmImportTable => matches!(inputs, [t] if t.is_js_wasm_table()),
        WasmImportMemory => matches!(inputs, [t] if t.is_js_wasm_memory()),
        _ => inputs.iter().all(|t| t.is_js_value()),
    }
}

/// Validate a single instruction's operand counts; used by the lifters
pub fn check_arity(inst: &Instruction) -> Result<()> {
    if inst.has_consistent_arity() {
        Ok(())
    } else {
        Err(Error::Lifting(format!(
            "{} expects {}/{}/{} operands, instruction has {}/{}/{}",
            inst.operation.name(),
            inst.operation.num_inputs(),
            inst.operation.num_outputs(),
            inst.operation.num_inner_outputs(),
            inst.inputs.len(),
            inst.outputs.len(),
            inst.inner_outputs.len()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Variable;
    use crate::types::WasmLiteral;

    fn inst(op: Operation, inputs: &[u32], outputs: &[u32], inner: &[u32]) -> Instruction {
        Instruction::new(
            op,
            inputs.iter().map(|n| Variable(*n)).collect(),
            outputs.iter().map(|n| Variable(*n)).collect(),
            inner.iter().map(|n| Variable(*n)).collect(),
        )
    }

    fn javascript() -> Arc<Environment> {
        Arc::new(Environment::javascript())
    }

    fn global_object(n: u32) -> Instruction {
        inst(
            Operation::CreateWasmGlobal { value: WasmLiteral::I32(1), mutable: false },
            &[],
            &[n],
            &[],
        )
    }

    #[test]
    fn test_validate_empty_program() {
        assert!(validate_program(&Program::new(), &javascript()).is_ok());
    }

    #[test]
    fn test_validate_valid_module() {
        let sig = WasmSignature::new(vec![], vec![WasmValueType::I32]);
        let program = Program::with_instructions(vec![
            global_object(0),
            inst(Operation::BeginWasmModule, &[], &[], &[]),
            inst(Operation::WasmImportGlobal, &[0], &[1], &[]),
            inst(Operation::WasmDefineGlobal { value: WasmLiteral::I64(2), mutable: true }, &[], &[2], &[]),
            inst(Operation::BeginWasmFunction { signature: sig.clone() }, &[], &[], &[]),
            inst(Operation::WasmConst { value: WasmLiteral::I32(42) }, &[], &[3], &[]),
            inst(Operation::EndWasmFunction { signature: sig }, &[3], &[4], &[]),
            inst(Operation::EndWasmModule, &[], &[5, 6], &[]),
        ]);
        validate_program(&program, &javascript()).unwrap();
    }

    #[test]
    fn test_import_after_definition_is_rejected() {
        let program = Program::with_instructions(vec![
            global_object(0),
            inst(Operation::BeginWasmModule, &[], &[], &[]),
            inst(Operation::WasmDefineGlobal { value: WasmLiteral::I32(2), mutable: true }, &[], &[1], &[]),
            inst(Operation::WasmImportGlobal, &[0], &[2], &[]),
            inst(Operation::EndWasmModule, &[], &[3, 4], &[]),
        ]);
        let err = validate_program(&program, &javascript()).unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg.contains("Global import")));
    }

    #[test]
    fn test_invisible_label_rejected() {
        let sig = WasmSignature::default();
        let program = Program::with_instructions(vec![
            inst(Operation::BeginWasmModule, &[], &[], &[]),
            inst(Operation::BeginWasmFunction { signature: sig.clone() }, &[], &[], &[]),
            inst(Operation::WasmBeginBlock, &[], &[], &[0]),
            inst(Operation::WasmEndBlock, &[], &[], &[]),
            inst(Operation::WasmBranch, &[0], &[], &[]),
            inst(Operation::EndWasmFunction { signature: sig }, &[], &[1], &[]),
            inst(Operation::EndWasmModule, &[], &[2, 3], &[]),
        ]);
        assert!(validate_program(&program, &javascript()).is_err());
    }

    #[test]
    fn test_unbalanced_and_reused_variables() {
        let open = Program::with_instructions(vec![
            inst(Operation::LoadBoolean { value: true }, &[], &[0], &[]),
            inst(Operation::BeginIf, &[0], &[], &[]),
        ]);
        assert!(validate_program(&open, &javascript()).is_err());

        let reused = Program::with_instructions(vec![
            inst(Operation::LoadNull, &[], &[0], &[]),
            inst(Operation::LoadNull, &[], &[0], &[]),
        ]);
        assert!(validate_program(&reused, &javascript()).is_err());
    }

    #[test]
    fn test_wasm_type_mismatch_rejected() {
        let sig = WasmSignature::default();
        let program = Program::with_instructions(vec![
            inst(Operation::BeginWasmModule, &[], &[], &[]),
            inst(Operation::BeginWasmFunction { signature: sig.clone() }, &[], &[], &[]),
            inst(Operation::WasmConst { value: WasmLiteral::I32(1) }, &[], &[0], &[]),
            inst(Operation::WasmConst { value: WasmLiteral::I64(1) }, &[], &[1], &[]),
            inst(
                Operation::WasmIntBinary {
                    width: crate::operation::NumWidth::Bits32,
                    op: crate::operation::IntBinaryOp::Add,
                },
                &[0, 1],
                &[2],
                &[],
            ),
            inst(Operation::EndWasmFunction { signature: sig }, &[], &[3], &[]),
            inst(Operation::EndWasmModule, &[], &[4, 5], &[]),
        ]);
        assert!(validate_program(&program, &javascript()).is_err());
    }

    #[test]
    fn test_builtins_are_typed_by_the_given_environment() {
        let program = Program::with_instructions(vec![
            inst(Operation::LoadBuiltin { name: "sharedCounter".into() }, &[], &[0], &[]),
            inst(Operation::BeginWasmModule, &[], &[], &[]),
            inst(Operation::WasmImportGlobal, &[0], &[1], &[]),
            inst(Operation::EndWasmModule, &[], &[2, 3], &[]),
        ]);

        let custom = Arc::new(Environment::javascript().with_builtin(
            "sharedCounter",
            ILType::WasmObject(EntityType::Global { ty: WasmValueType::I32, mutable: true }),
        ));
        validate_program(&program, &custom).unwrap();
        assert!(validate_program(&program, &javascript()).is_err());
    }
}
