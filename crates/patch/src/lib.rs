//! Patch orchestration over pre-assembled instruction streams.
//!
//! A patch locates its window inside a method body by structural pattern
//! matching, excises it through a cursor session, and splices in a call that
//! redirects execution into externally supplied detour logic. The governing
//! policy is fail open: when the expected pattern is absent because the
//! underlying method changed, the patch aborts, logs which anchor failed,
//! and hands the original stream back untouched. Only specification defects
//! (wrong cursor arithmetic, label corruption) surface as hard errors.

pub mod detour;
pub mod inline;
pub mod installer;
pub mod report;
pub mod snapshot;
pub mod window;

pub use detour::{CapturedLocals, DetourCall, ReplacementBuilder};
pub use inline::InlinePatch;
pub use installer::PatchSet;
pub use report::PatchReport;
pub use window::WindowPatch;

use graft_core::InstructionStream;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Patch error type. Every variant is a defect to fix before shipping, not
/// environmental drift; recoverable anchor mismatches are reported through
/// [`AbortReason`] instead.
#[derive(Debug, Error)]
pub enum Error {
    /// Stream or editor defect from the core layer.
    #[error(transparent)]
    Core(#[from] graft_core::Error),

    /// The installer was asked to run a patch it has already applied.
    #[error("patch '{0}' was already applied in this process")]
    AlreadyApplied(String),
}

/// Patch result type.
pub type Result<T> = std::result::Result<T, Error>;

/// States a patch session moves through. `Applied` and `Aborted` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchState {
    Searching,
    WindowFound,
    Applying,
    Applied,
    Aborted,
}

impl fmt::Display for PatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PatchState::Searching => "searching",
            PatchState::WindowFound => "window-found",
            PatchState::Applying => "applying",
            PatchState::Applied => "applied",
            PatchState::Aborted => "aborted",
        };
        f.write_str(name)
    }
}

/// Which window boundary an anchor locates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    Start,
    Stop,
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Start => f.write_str("start"),
            Anchor::Stop => f.write_str("stop"),
        }
    }
}

/// Why a patch aborted. Aborts are recovered locally: the original stream is
/// returned unchanged and the enclosing feature silently does not activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    /// The named anchor pattern does not occur in the stream; the method
    /// drifted under the patch.
    AnchorNotFound(Anchor),
    /// Both anchors matched but the stop position is not strictly after the
    /// start, so the patterns now overlap or have reordered.
    InvertedWindow,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::AnchorNotFound(anchor) => {
                write!(f, "{anchor} anchor not found")
            }
            AbortReason::InvertedWindow => f.write_str("inverted or overlapping anchors"),
        }
    }
}

/// One declared patch for one target method, applied once at load.
pub trait MethodPatch: Send + Sync {
    /// Patch name for logging and identification.
    fn name(&self) -> &str;

    /// Identifier of the method whose stream this patch rewrites.
    fn target(&self) -> &str;

    /// Runs the patch over the stream. `Ok` carries either the mutated
    /// stream (state `Applied`) or the original stream untouched (state
    /// `Aborted`); `Err` means the patch specification itself is defective.
    fn apply(&self, stream: InstructionStream) -> Result<(InstructionStream, PatchReport)>;
}
