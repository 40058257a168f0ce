//! Structural pattern matching over instruction streams.
//!
//! A [`Pattern`] describes what a contiguous slice should look like as a
//! fixed-arity sequence of per-instruction predicates; [`find_first_match`]
//! scans forward and returns the leftmost position where the whole pattern
//! matches. Matching by shape instead of fixed offset is what keeps a patch
//! working when unrelated instruction counts shift elsewhere in the method.

use crate::instruction::{Instruction, Opcode, Operand};
use crate::stream::InstructionStream;
use serde::{Deserialize, Serialize};

/// Predicate over an instruction's operand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OperandShape {
    /// Don't care.
    Any,
    /// Operand must be structurally equal to this one.
    Exact(Operand),
    /// Any branch target, regardless of which label.
    AnyTarget,
    /// Any external symbol reference, regardless of which method.
    AnySymbol,
}

impl OperandShape {
    fn matches(&self, operand: &Operand) -> bool {
        match self {
            OperandShape::Any => true,
            OperandShape::Exact(expected) => operand == expected,
            OperandShape::AnyTarget => matches!(operand, Operand::Target(_)),
            OperandShape::AnySymbol => matches!(operand, Operand::Symbol(_)),
        }
    }
}

/// Predicate over one instruction: an exact opcode plus an operand shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstructionMatch {
    /// Opcode the instruction must carry.
    pub op: Opcode,
    /// Shape its operand must satisfy.
    pub operand: OperandShape,
}

impl InstructionMatch {
    /// Matches the opcode with a don't-care operand.
    pub fn opcode(op: Opcode) -> Self {
        Self {
            op,
            operand: OperandShape::Any,
        }
    }

    /// Matches the opcode with a structurally equal operand.
    pub fn exact(op: Opcode, operand: Operand) -> Self {
        Self {
            op,
            operand: OperandShape::Exact(operand),
        }
    }

    /// Matches the opcode with any operand of the given shape.
    pub fn shaped(op: Opcode, operand: OperandShape) -> Self {
        Self { op, operand }
    }

    /// Pure predicate: opcode equality plus operand-shape match. Incoming
    /// labels are deliberately ignored; they describe who jumps here, not
    /// what this instruction is.
    pub fn matches(&self, instruction: &Instruction) -> bool {
        self.op == instruction.op && self.operand.matches(&instruction.operand)
    }
}

/// Ordered, fixed-length sequence of instruction predicates.
///
/// There is no wildcarding for length: a pattern of arity `k` only ever
/// matches exactly `k` contiguous instructions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    matchers: Vec<InstructionMatch>,
}

impl Pattern {
    pub fn new(matchers: Vec<InstructionMatch>) -> Self {
        Self { matchers }
    }

    pub fn len(&self) -> usize {
        self.matchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }

    /// Tests whether the pattern matches the slice starting at `position`.
    /// False when the remaining stream is shorter than the pattern, and for
    /// the degenerate empty pattern.
    pub fn matches_at(&self, stream: &InstructionStream, position: usize) -> bool {
        if self.matchers.is_empty() || position + self.matchers.len() > stream.len() {
            return false;
        }
        self.matchers
            .iter()
            .zip(stream.instructions()[position..].iter())
            .all(|(matcher, instruction)| matcher.matches(instruction))
    }
}

impl From<Vec<InstructionMatch>> for Pattern {
    fn from(matchers: Vec<InstructionMatch>) -> Self {
        Self::new(matchers)
    }
}

/// Scans forward from `from` and returns the position of the leftmost
/// contiguous match of `pattern`, or `None` if the pattern does not occur
/// before the stream ends.
///
/// O(n·k) worst case over stream length n and pattern arity k; streams are
/// single-method bodies and matching runs once at load time, never in a hot
/// path.
pub fn find_first_match(
    stream: &InstructionStream,
    pattern: &Pattern,
    from: usize,
) -> Option<usize> {
    if pattern.is_empty() {
        return None;
    }
    let last = stream.len().checked_sub(pattern.len())?;
    (from..=last).find(|&position| pattern.matches_at(stream, position))
}
