//! Core results and error types.
//!
//! Every variant here is a defect in a patch specification or an integrity
//! violation in an edited stream, never environmental drift: anchor
//! mismatches are recoverable and live in the patch layer, not here.

use crate::instruction::Label;
use thiserror::Error;

/// Core error type encompassing all stream and editor defects.
#[derive(Debug, Error)]
pub enum Error {
    /// Cursor arithmetic walked past the end of the stream.
    #[error("cursor out of range: position {pos} + {count} exceeds stream length {len}")]
    CursorOutOfRange {
        /// Cursor position when the operation was attempted.
        pos: usize,
        /// Number of instructions the operation tried to cover.
        count: usize,
        /// Stream length at that moment.
        len: usize,
    },

    /// A branch operand references a label no instruction carries.
    #[error("label {0} does not resolve to any instruction")]
    DanglingLabel(Label),

    /// A label is attached to more than one instruction.
    #[error("label {label} resolves to {count} instructions")]
    DuplicateLabel {
        /// The duplicated label.
        label: Label,
        /// How many instructions carry it.
        count: usize,
    },

    /// Captured labels could not be re-homed because the cursor sits at the
    /// end of the stream with no instruction to attach them to.
    #[error("{count} detached labels left with no instruction to anchor them")]
    UnanchoredLabels {
        /// Number of labels left dangling.
        count: usize,
    },
}

/// Core result type.
pub type Result<T> = std::result::Result<T, Error>;
