//! Mutable cursor editor over an owned instruction stream.
//!
//! A [`StreamCursor`] consumes its stream on construction, so exactly one
//! editor ever holds write access to one stream for the duration of one
//! patch session, and [`StreamCursor::materialize`] consumes the cursor, so
//! a session produces its final stream exactly once. All bounds failures are
//! defects in the caller's arithmetic, surfaced as
//! [`Error::CursorOutOfRange`] rather than silently clamped.

use crate::instruction::{Instruction, Label};
use crate::result::{Error, Result};
use crate::stream::InstructionStream;
use std::collections::BTreeSet;

/// Exclusive editing session over one instruction stream.
#[derive(Debug)]
pub struct StreamCursor {
    instructions: Vec<Instruction>,
    pos: usize,
    removed: usize,
    inserted: usize,
}

impl StreamCursor {
    /// Opens an editing session, taking ownership of the stream.
    pub fn new(stream: InstructionStream) -> Self {
        Self {
            instructions: stream.into_vec(),
            pos: 0,
            removed: 0,
            inserted: 0,
        }
    }

    /// Current cursor position; always `0 <= pos <= len`.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Instructions removed so far in this session.
    pub fn removed(&self) -> usize {
        self.removed
    }

    /// Instructions inserted so far in this session.
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Moves the cursor forward by `count` instructions.
    pub fn advance(&mut self, count: usize) -> Result<()> {
        if self.pos + count > self.instructions.len() {
            return Err(Error::CursorOutOfRange {
                pos: self.pos,
                count,
                len: self.instructions.len(),
            });
        }
        self.pos += count;
        Ok(())
    }

    /// Deletes `count` instructions starting at the cursor and returns the
    /// incoming labels detached from the first removed instruction.
    ///
    /// Re-attaching those labels is the caller's responsibility; dropping
    /// them would turn every branch that targeted the removed block into a
    /// jump to an undefined location. Labels found deeper inside the removed
    /// range are not captured; they are logged and left to post-edit
    /// validation to flag as dangling.
    pub fn remove_range(&mut self, count: usize) -> Result<BTreeSet<Label>> {
        if self.pos + count > self.instructions.len() {
            return Err(Error::CursorOutOfRange {
                pos: self.pos,
                count,
                len: self.instructions.len(),
            });
        }

        let mut detached = BTreeSet::new();
        for (offset, instruction) in self.instructions[self.pos..self.pos + count]
            .iter()
            .enumerate()
        {
            if offset == 0 {
                detached = instruction.labels.clone();
            } else if !instruction.labels.is_empty() {
                tracing::warn!(
                    position = self.pos + offset,
                    labels = %instruction
                        .labels
                        .iter()
                        .map(|label| label.to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                    "removing interior instruction that still carries incoming labels"
                );
            }
        }

        self.instructions.drain(self.pos..self.pos + count);
        self.removed += count;
        Ok(detached)
    }

    /// Splices `instructions` in at the cursor. The cursor stays at the
    /// start of the inserted block.
    pub fn insert(&mut self, instructions: Vec<Instruction>) {
        self.inserted += instructions.len();
        self.instructions
            .splice(self.pos..self.pos, instructions);
    }

    /// Attaches previously detached labels to the instruction currently at
    /// the cursor. Called directly after [`StreamCursor::insert`], that is
    /// the first inserted instruction; with an empty replacement it falls
    /// through to the instruction that followed the removed range.
    pub fn rehome_labels(&mut self, labels: BTreeSet<Label>) -> Result<()> {
        if labels.is_empty() {
            return Ok(());
        }
        match self.instructions.get_mut(self.pos) {
            Some(instruction) => {
                instruction.labels.extend(labels);
                Ok(())
            }
            None => Err(Error::UnanchoredLabels {
                count: labels.len(),
            }),
        }
    }

    /// Produces the final stream reflecting all edits, ending the session.
    pub fn materialize(self) -> InstructionStream {
        InstructionStream::new(self.instructions)
    }
}
