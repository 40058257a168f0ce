//! The calling convention between spliced-in instructions and external
//! detour logic.
//!
//! A replacement block must load the same locals the removed block depended
//! on, in the order the external function expects, invoke that function by
//! reference, and leave no residual stack imbalance relative to the block it
//! replaces. The external function performs the removed block's entire side
//! effect at run time and returns control to the instruction following the
//! window.

use graft_core::{Instruction, SymbolRef};
use serde::{Deserialize, Serialize};

/// Local slots captured for the detour: an opaque reference to the subject
/// and an integer dosage/quantity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedLocals {
    /// Slot holding the subject reference.
    pub subject: u8,
    /// Slot holding the dosage/quantity integer.
    pub quantity: u8,
}

impl CapturedLocals {
    pub fn new(subject: u8, quantity: u8) -> Self {
        Self { subject, quantity }
    }
}

/// Builds the instructions spliced in place of a removed window.
pub trait ReplacementBuilder: Send + Sync {
    fn build(&self, locals: &CapturedLocals) -> Vec<Instruction>;
}

/// Blanket impl so plain closures and fns can serve as builders.
impl<F> ReplacementBuilder for F
where
    F: Fn(&CapturedLocals) -> Vec<Instruction> + Send + Sync,
{
    fn build(&self, locals: &CapturedLocals) -> Vec<Instruction> {
        self(locals)
    }
}

/// Canonical replacement: load the subject, load the quantity, call the
/// detour. With a two-argument void detour the block is stack-neutral, which
/// is what a removed block with net-zero stack effect requires.
#[derive(Debug, Clone)]
pub struct DetourCall {
    symbol: SymbolRef,
}

impl DetourCall {
    pub fn new(symbol: SymbolRef) -> Self {
        Self { symbol }
    }

    pub fn symbol(&self) -> &SymbolRef {
        &self.symbol
    }
}

impl ReplacementBuilder for DetourCall {
    fn build(&self, locals: &CapturedLocals) -> Vec<Instruction> {
        let block = vec![
            Instruction::load_local(locals.subject),
            Instruction::load_local(locals.quantity),
            Instruction::call(self.symbol.clone()),
        ];

        let effect = net_stack_effect(&block);
        if effect != 0 {
            tracing::warn!(
                symbol = %self.symbol,
                effect,
                "detour call block is not stack-neutral; check the detour signature"
            );
        }
        block
    }
}

/// Net stack delta of executing a straight-line block. Approximate for
/// blocks containing branches, since only one side of each branch runs.
pub fn net_stack_effect(block: &[Instruction]) -> i64 {
    block.iter().map(Instruction::stack_effect).sum()
}
