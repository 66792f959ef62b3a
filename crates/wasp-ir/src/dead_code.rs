//! Single-pass detection of code following an unconditional control transfer.

use crate::instruction::Instruction;

/// Tracks, per open scope, whether execution can reach the current position.
///
/// Call [`DeadCodeAnalyzer::analyze`] once for every instruction, in program
/// order; [`DeadCodeAnalyzer::is_currently_dead`] then answers for the
/// instruction just analyzed.
#[derive(Debug, Clone)]
pub struct DeadCodeAnalyzer {
    /// Dead flag of each open scope, innermost last
    scopes: Vec<bool>,
    current_dead: bool,
}

impl DeadCodeAnalyzer {
    pub fn new() -> Self {
        Self {
            scopes: vec![false],
            current_dead: false,
        }
    }

    pub fn reset(&mut self) {
        self.scopes.clear();
        self.scopes.push(false);
        self.current_dead = false;
    }

    pub fn analyze(&mut self, inst: &Instruction) {
        let op = &inst.operation;

        if op.is_block_end() {
            // Closing (or switching) a block: the closer lives or dies with the enclosing scope
            if self.scopes.len() > 1 {
                self.scopes.pop();
            }
        }

        let enclosing_dead = self.scopes.last().copied().unwrap_or(false);
        self.current_dead = enclosing_dead;

        if op.is_block_start() {
            // The new scope inherits the parent's state; an else or catch body
            // becomes live again whenever its parent is live
            self.scopes.push(enclosing_dead);
        }

        if op.is_jump() && !enclosing_dead {
            if let Some(top) = self.scopes.last_mut() {
                *top = true;
            }
        }
    }

    /// Whether the most recently analyzed instruction is unreachable
    pub fn is_currently_dead(&self) -> bool {
        self.current_dead
    }

    pub fn depth(&self) -> usize {
        self.scopes.len() - 1
    }
}

impl Default for DeadCodeAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::Variable;
    use crate::operation::Operation;
    use crate::types::{WasmLiteral, WasmSignature};

    fn inst(op: Operation, inputs: &[u32]) -> Instruction {
        let inputs: Vec<Variable> = inputs.iter().map(|n| Variable(*n)).collect();
        Instruction::new(op, inputs, vec![], vec![])
    }

    fn dead_flags(program: &[Instruction]) -> Vec<bool> {
        let mut analyzer = DeadCodeAnalyzer::new();
        program
            .iter()
            .map(|i| {
                analyzer.analyze(i);
                analyzer.is_currently_dead()
            })
            .collect()
    }

    #[test]
    fn test_code_after_return_is_dead() {
        let program = vec![
            inst(Operation::BeginPlainFunction { num_parameters: 0 }, &[]),
            inst(Operation::Return { has_value: false }, &[]),
            inst(Operation::LoadUndefined, &[]),
            inst(Operation::EndPlainFunction, &[]),
            inst(Operation::LoadNull, &[]),
        ];
        assert_eq!(dead_flags(&program), vec![false, false, true, false, false]);
    }

    #[test]
    fn test_else_is_live_again() {
        let program = vec![
            inst(Operation::BeginIf, &[0]),
            inst(Operation::ThrowException, &[0]),
            inst(Operation::LoadNull, &[]),
            inst(Operation::BeginElse, &[]),
            inst(Operation::LoadNull, &[]),
            inst(Operation::EndIf, &[]),
        ];
        assert_eq!(dead_flags(&program), vec![false, false, true, false, false, false]);
    }

    #[test]
    fn test_nested_wasm_branch_to_outer_label() {
        let sig = WasmSignature::default();
        let program = vec![
            inst(Operation::BeginWasmModule, &[]),
            inst(Operation::BeginWasmFunction { signature: sig.clone() }, &[]),
            inst(Operation::WasmBeginBlock, &[]),
            inst(Operation::WasmBeginBlock, &[]),
            inst(Operation::WasmBranch, &[2]),
            inst(Operation::WasmConst { value: WasmLiteral::I32(1) }, &[]),
            inst(Operation::WasmEndBlock, &[]),
            inst(Operation::WasmConst { value: WasmLiteral::I32(2) }, &[]),
            inst(Operation::WasmEndBlock, &[]),
            inst(Operation::EndWasmFunction { signature: sig }, &[]),
            inst(Operation::EndWasmModule, &[]),
        ];
        let flags = dead_flags(&program);
        assert!(!flags[4], "the branch itself is live");
        assert!(flags[5], "code after the branch in the inner block is dead");
        assert!(!flags[6]);
        assert!(!flags[7]);
        assert!(flags.iter().filter(|d| **d).count() == 1);
    }

    #[test]
    fn test_dead_parent_keeps_children_dead() {
        let program = vec![
            inst(Operation::BeginRepeatLoop { iterations: 3 }, &[]),
            inst(Operation::LoopBreak, &[]),
            inst(Operation::BeginIf, &[0]),
            inst(Operation::LoadNull, &[]),
            inst(Operation::BeginElse, &[]),
            inst(Operation::LoadNull, &[]),
            inst(Operation::EndIf, &[]),
            inst(Operation::EndRepeatLoop, &[]),
        ];
        assert_eq!(
            dead_flags(&program),
            vec![false, false, true, true, true, true, true, false]
        );
    }
}
