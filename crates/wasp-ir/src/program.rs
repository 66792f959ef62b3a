//! Programs: finalized, ordered instruction sequences.

use crate::instruction::{Instruction, Variable};
use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::fmt;
use wasp_core::{Error, Result};

pub const PROGRAM_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub instructions: Vec<Instruction>,
    pub version: u32,
}

impl Program {
    pub fn new() -> Self {
        Self {
            instructions: Vec::new(),
            version: PROGRAM_FORMAT_VERSION,
        }
    }

    pub fn with_instructions(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions,
            version: PROGRAM_FORMAT_VERSION,
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Smallest variable number not used by this program
    pub fn next_variable(&self) -> u32 {
        self.instructions
            .iter()
            .flat_map(|inst| inst.all_outputs())
            .map(|v| v.0 + 1)
            .max()
            .unwrap_or(0)
    }

    /// The instruction that defines `var`, if any
    pub fn definition_of(&self, var: Variable) -> Option<&Instruction> {
        self.instructions
            .iter()
            .find(|inst| inst.all_outputs().any(|v| v == var))
    }

    pub fn contains_wasm(&self) -> bool {
        self.instructions
            .iter()
            .any(|inst| matches!(inst.operation, Operation::BeginWasmModule))
    }

    pub fn num_wasm_modules(&self) -> usize {
        self.instructions
            .iter()
            .filter(|inst| matches!(inst.operation, Operation::BeginWasmModule))
            .count()
    }

    /// Serialize to bytes using bincode
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let program: Program = bincode::deserialize(bytes)?;
        if program.version != PROGRAM_FORMAT_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported program version {}",
                program.version
            )));
        }
        Ok(program)
    }

    /// JSON form for inspection. Non-finite float payloads do not survive it; use bytes for storage.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0usize;
        for inst in &self.instructions {
            if inst.is_block_end() {
                depth = depth.saturating_sub(1);
            }
            writeln!(f, "{}{}", "    ".repeat(depth), inst)?;
            if inst.is_block_start() {
                depth += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Program {
        Program::with_instructions(vec![
            Instruction::new(Operation::LoadInteger { value: 7 }, vec![], vec![Variable(0)], vec![]),
            Instruction::new(Operation::BeginIf, vec![Variable(0)], vec![], vec![]),
            Instruction::new(Operation::LoadFloat { value: f64::NAN }, vec![], vec![Variable(1)], vec![]),
            Instruction::new(Operation::EndIf, vec![], vec![], vec![]),
        ])
    }

    #[test]
    fn test_bytes_roundtrip() {
        let program = sample();
        let bytes = program.to_bytes().unwrap();
        let back = Program::from_bytes(&bytes).unwrap();
        assert_eq!(back.len(), 4);
        match &back.instructions[2].operation {
            Operation::LoadFloat { value } => assert!(value.is_nan()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(back.next_variable(), 2);
    }

    #[test]
    fn test_rejects_garbage_bytes() {
        assert!(Program::from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_display_indents_blocks() {
        let text = sample().to_string();
        assert!(text.contains("\n    v1 <- LoadFloat"));
        assert!(text.ends_with("EndIf\n"));
    }
}
