//! The instruction and operand value model the patch engine reasons about.
//!
//! An [`Instruction`] is an immutable value once constructed: an operation
//! tag, a tagged-union operand, and the set of labels other instructions'
//! branch operands use to target it. Equality is structural throughout;
//! matching never depends on identity or on position in a stream.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Enumerated operation tag for one instruction.
///
/// Data-carrying variants (`LoadLocal(1)`) fold the slot index into the tag,
/// so two loads of different locals are structurally distinct opcodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Opcode {
    Nop,
    /// Load argument slot `n` onto the stack.
    LoadArg(u8),
    /// Load local slot `n` onto the stack.
    LoadLocal(u8),
    /// Pop the stack into local slot `n`.
    StoreLocal(u8),
    /// Push an integer constant (operand: `Operand::Int`).
    PushInt,
    /// Push a string constant (operand: `Operand::Str`).
    PushStr,
    /// Push a null reference.
    PushNull,
    Dup,
    Pop,
    /// Static call (operand: `Operand::Symbol`).
    Call,
    /// Virtual call through the receiver on the stack (operand: `Operand::Symbol`).
    CallVirtual,
    /// Unconditional branch (operand: `Operand::Target`).
    Branch,
    BranchIfTrue,
    BranchIfFalse,
    /// Compare-and-branch: pops two values, branches on equality.
    BranchEqual,
    /// Compare-and-branch: pops two values, branches on less-than.
    BranchLess,
    Return,
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opcode::Nop => write!(f, "nop"),
            Opcode::LoadArg(n) => write!(f, "ldarg.{n}"),
            Opcode::LoadLocal(n) => write!(f, "ldloc.{n}"),
            Opcode::StoreLocal(n) => write!(f, "stloc.{n}"),
            Opcode::PushInt => write!(f, "ldc.i4"),
            Opcode::PushStr => write!(f, "ldstr"),
            Opcode::PushNull => write!(f, "ldnull"),
            Opcode::Dup => write!(f, "dup"),
            Opcode::Pop => write!(f, "pop"),
            Opcode::Call => write!(f, "call"),
            Opcode::CallVirtual => write!(f, "callvirt"),
            Opcode::Branch => write!(f, "br"),
            Opcode::BranchIfTrue => write!(f, "brtrue"),
            Opcode::BranchIfFalse => write!(f, "brfalse"),
            Opcode::BranchEqual => write!(f, "beq"),
            Opcode::BranchLess => write!(f, "blt"),
            Opcode::Return => write!(f, "ret"),
        }
    }
}

/// Reference to an externally defined method invoked by `call`/`callvirt`.
///
/// `arity` counts every stack slot the call consumes, receiver included for
/// virtual calls, so a call's net stack effect is computable without any
/// knowledge of the callee beyond its signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRef {
    /// Owning type of the referenced method.
    pub owner: String,
    /// Method name.
    pub name: String,
    /// Number of stack slots consumed by the call.
    pub arity: u8,
    /// Whether the call pushes a result.
    pub returns_value: bool,
}

impl SymbolRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        arity: u8,
        returns_value: bool,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            arity,
            returns_value,
        }
    }
}

impl fmt::Display for SymbolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner, self.name)
    }
}

/// Named jump target. Instructions carry the set of labels that point at
/// them; branch operands reference positions only through labels, never by
/// fixed offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// Tagged-union operand attached to an instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    None,
    Int(i64),
    Str(String),
    Symbol(SymbolRef),
    Target(Label),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Int(v) => write!(f, "{v}"),
            Operand::Str(s) => write!(f, "{s:?}"),
            Operand::Symbol(sym) => write!(f, "{sym}"),
            Operand::Target(label) => write!(f, "{label}"),
        }
    }
}

/// One unit of an instruction stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Operation tag.
    pub op: Opcode,
    /// Operand, `Operand::None` for opcodes that take none.
    pub operand: Operand,
    /// Labels through which branches elsewhere target this instruction.
    pub labels: BTreeSet<Label>,
}

impl Instruction {
    pub fn new(op: Opcode) -> Self {
        Self {
            op,
            operand: Operand::None,
            labels: BTreeSet::new(),
        }
    }

    pub fn with_operand(op: Opcode, operand: Operand) -> Self {
        Self {
            op,
            operand,
            labels: BTreeSet::new(),
        }
    }

    /// Attaches an incoming label, builder-style.
    pub fn labelled(mut self, label: Label) -> Self {
        self.labels.insert(label);
        self
    }

    pub fn load_arg(slot: u8) -> Self {
        Self::new(Opcode::LoadArg(slot))
    }

    pub fn load_local(slot: u8) -> Self {
        Self::new(Opcode::LoadLocal(slot))
    }

    pub fn store_local(slot: u8) -> Self {
        Self::new(Opcode::StoreLocal(slot))
    }

    pub fn push_int(value: i64) -> Self {
        Self::with_operand(Opcode::PushInt, Operand::Int(value))
    }

    pub fn push_str(value: impl Into<String>) -> Self {
        Self::with_operand(Opcode::PushStr, Operand::Str(value.into()))
    }

    pub fn call(symbol: SymbolRef) -> Self {
        Self::with_operand(Opcode::Call, Operand::Symbol(symbol))
    }

    pub fn call_virtual(symbol: SymbolRef) -> Self {
        Self::with_operand(Opcode::CallVirtual, Operand::Symbol(symbol))
    }

    pub fn branch(target: Label) -> Self {
        Self::with_operand(Opcode::Branch, Operand::Target(target))
    }

    pub fn branch_if_true(target: Label) -> Self {
        Self::with_operand(Opcode::BranchIfTrue, Operand::Target(target))
    }

    pub fn branch_if_false(target: Label) -> Self {
        Self::with_operand(Opcode::BranchIfFalse, Operand::Target(target))
    }

    /// Net stack delta of executing this instruction: pushes minus pops.
    ///
    /// Calls derive their delta from the symbol's signature. Branches pop
    /// their condition operands; the taken/not-taken distinction does not
    /// affect the delta.
    pub fn stack_effect(&self) -> i64 {
        match self.op {
            Opcode::Nop | Opcode::Branch | Opcode::Return => 0,
            Opcode::LoadArg(_)
            | Opcode::LoadLocal(_)
            | Opcode::PushInt
            | Opcode::PushStr
            | Opcode::PushNull
            | Opcode::Dup => 1,
            Opcode::StoreLocal(_) | Opcode::Pop => -1,
            Opcode::BranchIfTrue | Opcode::BranchIfFalse => -1,
            Opcode::BranchEqual | Opcode::BranchLess => -2,
            Opcode::Call | Opcode::CallVirtual => match &self.operand {
                Operand::Symbol(sym) => {
                    i64::from(sym.returns_value) - i64::from(sym.arity)
                }
                // A call without a symbol operand is malformed; treat it as
                // neutral so accounting stays total.
                _ => 0,
            },
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.labels {
            write!(f, "{label}: ")?;
        }
        if self.operand == Operand::None {
            write!(f, "{}", self.op)
        } else {
            write!(f, "{:<10} {}", self.op.to_string(), self.operand)
        }
    }
}
