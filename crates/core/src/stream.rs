//! Ordered, index-addressable instruction sequence for one method body.
//!
//! A stream is constructed fully formed by the host's interception layer,
//! mutated in place by exactly one patch session through a cursor, and then
//! handed back. Label-to-position lookups are recomputed on demand rather
//! than cached, so they are always correct after a structural edit.

use crate::instruction::{Instruction, Label, Operand};
use crate::result::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// Ordered sequence of instructions representing one method body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionStream {
    instructions: Vec<Instruction>,
}

impl InstructionStream {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn into_vec(self) -> Vec<Instruction> {
        self.instructions
    }

    /// Position of the unique instruction carrying `label`, if any.
    ///
    /// Returns `None` both for a dangling label and for a duplicated one;
    /// [`InstructionStream::validate_labels`] distinguishes the two.
    pub fn resolve_label(&self, label: Label) -> Option<usize> {
        let mut found = None;
        for (index, instruction) in self.instructions.iter().enumerate() {
            if instruction.labels.contains(&label) {
                if found.is_some() {
                    return None;
                }
                found = Some(index);
            }
        }
        found
    }

    /// Checks that every label referenced by a branch operand resolves to
    /// exactly one instruction. A dangling or duplicated label means some
    /// branch elsewhere now jumps to an undefined location, the corruption
    /// class the whole editing discipline exists to prevent.
    pub fn validate_labels(&self) -> Result<()> {
        for instruction in &self.instructions {
            let Operand::Target(label) = instruction.operand else {
                continue;
            };
            let count = self
                .instructions
                .iter()
                .filter(|candidate| candidate.labels.contains(&label))
                .count();
            match count {
                1 => {}
                0 => return Err(Error::DanglingLabel(label)),
                _ => return Err(Error::DuplicateLabel { label, count }),
            }
        }
        Ok(())
    }
}

impl From<Vec<Instruction>> for InstructionStream {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

impl Index<usize> for InstructionStream {
    type Output = Instruction;

    fn index(&self, index: usize) -> &Instruction {
        &self.instructions[index]
    }
}

impl<'a> IntoIterator for &'a InstructionStream {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

impl fmt::Display for InstructionStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "{index:04}  {instruction}")?;
        }
        Ok(())
    }
}
