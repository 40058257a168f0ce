pub mod cursor;
pub mod instruction;
pub mod matcher;
pub mod result;
pub mod stream;

pub use cursor::StreamCursor;
pub use instruction::{Instruction, Label, Opcode, Operand, SymbolRef};
pub use matcher::{InstructionMatch, OperandShape, Pattern, find_first_match};
pub use result::{Error, Result};
pub use stream::InstructionStream;

/// Returns true if the opcode transfers control to a labelled instruction.
///
/// Branching opcodes are the only ones whose operand may carry a label
/// reference, and therefore the only ones label validation has to chase.
#[inline]
pub fn is_branch_opcode(opcode: Opcode) -> bool {
    matches!(
        opcode,
        Opcode::Branch
            | Opcode::BranchIfTrue
            | Opcode::BranchIfFalse
            | Opcode::BranchEqual
            | Opcode::BranchLess
    )
}

/// Returns true if the opcode ends the method body's execution.
#[inline]
pub fn is_terminal_opcode(opcode: Opcode) -> bool {
    matches!(opcode, Opcode::Return)
}
