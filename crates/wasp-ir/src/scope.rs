//! Scope, context and block-structure tracking shared by the builder and the validator.

use crate::instruction::{Instruction, Variable};
use crate::operation::{BlockKind, Context, Operation};
use crate::types::WasmSignature;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct OpenBlock {
    pub kind: BlockKind,
    /// An else or catch part has been entered
    pub switched: bool,
    /// Signature of the Wasm function this block opened
    pub signature: Option<WasmSignature>,
}

#[derive(Debug, Clone)]
pub struct ScopeTracker {
    scopes: Vec<Vec<Variable>>,
    visible: HashSet<Variable>,
    contexts: Vec<Context>,
    blocks: Vec<OpenBlock>,
}

impl ScopeTracker {
    pub fn new() -> Self {
        Self {
            scopes: vec![Vec::new()],
            visible: HashSet::new(),
            contexts: vec![Context::JAVASCRIPT],
            blocks: Vec::new(),
        }
    }

    pub fn context(&self) -> Context {
        self.contexts.last().copied().unwrap_or(Context::JAVASCRIPT)
    }

    pub fn is_visible(&self, var: Variable) -> bool {
        self.visible.contains(&var)
    }

    /// Visible variables, outermost scope first
    pub fn visible_variables(&self) -> impl Iterator<Item = Variable> + '_ {
        self.scopes.iter().flatten().copied()
    }

    /// Variables defined in the innermost scope
    pub fn innermost_variables(&self) -> &[Variable] {
        self.scopes.last().map(|s| s.as_slice()).unwrap_or(&[])
    }

    pub fn open_blocks(&self) -> &[OpenBlock] {
        &self.blocks
    }

    pub fn depth(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_inside(&self, kind: BlockKind) -> bool {
        self.blocks.iter().any(|b| b.kind == kind)
    }

    /// Signature of the Wasm function the current position belongs to
    pub fn current_wasm_function(&self) -> Option<&WasmSignature> {
        self.blocks
            .iter()
            .rev()
            .find(|b| b.kind == BlockKind::WasmFunction)
            .and_then(|b| b.signature.as_ref())
    }

    /// Checks block nesting and context requirements of `inst` at the current position
    pub fn check(&self, inst: &Instruction) -> Result<(), String> {
        let op = &inst.operation;

        if op.is_block_end() {
            let open = self
                .blocks
                .last()
                .ok_or_else(|| format!("{} without an open block", op.name()))?;
            if Some(open.kind) != op.block_kind() {
                return Err(format!("{} closes a {:?} block", op.name(), open.kind));
            }
            match op {
                Operation::BeginElse | Operation::WasmBeginElse | Operation::BeginCatch
                    if open.switched =>
                {
                    return Err(format!("second {} in one block", op.name()));
                }
                Operation::EndTryCatch if !open.switched => {
                    return Err("try block without catch".to_string());
                }
                _ => {}
            }
        }

        let required = op.required_context();
        if !self.context().contains(required) {
            return Err(format!(
                "{} requires context {:?} but position has {:?}",
                op.name(),
                required,
                self.context()
            ));
        }
        Ok(())
    }

    /// Update scopes for `inst`. The instruction must have passed [`ScopeTracker::check`].
    pub fn apply(&mut self, inst: &Instruction) {
        let op = &inst.operation;
        let mut carried: Option<OpenBlock> = None;

        if op.is_block_end() {
            if let Some(scope) = self.scopes.pop() {
                for var in scope {
                    self.visible.remove(&var);
                }
            }
            if self.contexts.len() > 1 {
                self.contexts.pop();
            }
            carried = self.blocks.pop();
        }

        for var in &inst.outputs {
            self.declare(*var);
        }

        if op.is_block_start() {
            let inner_context = op.inner_context(self.context());
            self.contexts.push(inner_context);
            self.scopes.push(Vec::new());
            for var in &inst.inner_outputs {
                self.declare(*var);
            }
            let block = match carried {
                Some(mut previous) => {
                    previous.switched = true;
                    previous
                }
                None => OpenBlock {
                    kind: op.block_kind().unwrap_or(BlockKind::If),
                    switched: false,
                    signature: match op {
                        Operation::BeginWasmFunction { signature } => Some(signature.clone()),
                        _ => None,
                    },
                },
            };
            self.blocks.push(block);
        }
    }

    fn declare(&mut self, var: Variable) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(var);
        }
        self.visible.insert(var);
    }
}

impl Default for ScopeTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inst(op: Operation, inputs: &[u32], outputs: &[u32], inner: &[u32]) -> Instruction {
        Instruction::new(
            op,
            inputs.iter().map(|n| Variable(*n)).collect(),
            outputs.iter().map(|n| Variable(*n)).collect(),
            inner.iter().map(|n| Variable(*n)).collect(),
        )
    }

    #[test]
    fn test_inner_outputs_leave_scope() {
        let mut scopes = ScopeTracker::new();
        for i in [
            inst(Operation::BeginPlainFunction { num_parameters: 1 }, &[], &[0], &[1]),
            inst(Operation::LoadNull, &[], &[2], &[]),
        ] {
            scopes.check(&i).unwrap();
            scopes.apply(&i);
        }
        assert!(scopes.is_visible(Variable(1)));
        assert!(scopes.context().contains(Context::SUBROUTINE));

        let end = inst(Operation::EndPlainFunction, &[], &[], &[]);
        scopes.check(&end).unwrap();
        scopes.apply(&end);
        assert!(scopes.is_visible(Variable(0)));
        assert!(!scopes.is_visible(Variable(1)));
        assert!(!scopes.is_visible(Variable(2)));
        assert_eq!(scopes.depth(), 0);
    }

    #[test]
    fn test_mismatched_end_rejected() {
        let mut scopes = ScopeTracker::new();
        let begin = inst(Operation::BeginRepeatLoop { iterations: 2 }, &[], &[], &[0]);
        scopes.check(&begin).unwrap();
        scopes.apply(&begin);
        assert!(scopes.check(&inst(Operation::EndIf, &[], &[], &[])).is_err());
        assert!(scopes.check(&inst(Operation::LoopBreak, &[], &[], &[])).is_ok());
    }

    #[test]
    fn test_wasm_context_rules() {
        let scopes = ScopeTracker::new();
        assert!(scopes.check(&inst(Operation::WasmDefineMemory { minimum: 1, maximum: None }, &[], &[0], &[])).is_err());
        assert!(scopes.check(&inst(Operation::Return { has_value: false }, &[], &[], &[])).is_err());
    }
}
