//! Instructions: one operation bound to its variables.

use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A program variable. Numbers increase monotonically and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable(pub u32);

impl Variable {
    pub fn number(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub operation: Operation,
    pub inputs: Vec<Variable>,
    pub outputs: Vec<Variable>,
    pub inner_outputs: Vec<Variable>,
}

impl Instruction {
    pub fn new(
        operation: Operation,
        inputs: Vec<Variable>,
        outputs: Vec<Variable>,
        inner_outputs: Vec<Variable>,
    ) -> Self {
        Self {
            operation,
            inputs,
            outputs,
            inner_outputs,
        }
    }

    /// True when operand counts match the operation's declared arity
    pub fn has_consistent_arity(&self) -> bool {
        self.inputs.len() == self.operation.num_inputs()
            && self.outputs.len() == self.operation.num_outputs()
            && self.inner_outputs.len() == self.operation.num_inner_outputs()
    }

    pub fn output(&self) -> Option<Variable> {
        self.outputs.first().copied()
    }

    pub fn input(&self, index: usize) -> Option<Variable> {
        self.inputs.get(index).copied()
    }

    pub fn all_outputs(&self) -> impl Iterator<Item = Variable> + '_ {
        self.outputs.iter().chain(self.inner_outputs.iter()).copied()
    }

    pub fn is_block_start(&self) -> bool {
        self.operation.is_block_start()
    }

    pub fn is_block_end(&self) -> bool {
        self.operation.is_block_end()
    }
}

fn join(vars: &[Variable]) -> String {
    vars.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.outputs.is_empty() {
            write!(f, "{} <- ", join(&self.outputs))?;
        }
        write!(f, "{}", self.operation)?;
        if !self.inputs.is_empty() {
            write!(f, " {}", join(&self.inputs))?;
        }
        if !self.inner_outputs.is_empty() {
            write!(f, " -> {}", join(&self.inner_outputs))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_check() {
        let good = Instruction::new(
            Operation::BinaryOperation { op: crate::operation::BinaryOperator::Add },
            vec![Variable(0), Variable(1)],
            vec![Variable(2)],
            vec![],
        );
        assert!(good.has_consistent_arity());

        let bad = Instruction::new(Operation::LoadInteger { value: 1 }, vec![Variable(0)], vec![Variable(1)], vec![]);
        assert!(!bad.has_consistent_arity());
    }

    #[test]
    fn test_textual_form() {
        let inst = Instruction::new(Operation::LoadInteger { value: 42 }, vec![], vec![Variable(0)], vec![]);
        assert_eq!(inst.to_string(), "v0 <- LoadInteger '42'");

        let loop_start = Instruction::new(
            Operation::BeginRepeatLoop { iterations: 100 },
            vec![],
            vec![],
            vec![Variable(3)],
        );
        assert_eq!(loop_start.to_string(), "BeginRepeatLoop '100' -> v3");
    }
}
