//! Registry of declared patches and the exactly-once application guard.
//!
//! The engine itself does not guarantee idempotency; re-running a patch
//! over an already patched stream is undefined. The installer owns that
//! guarantee: each registered patch runs at most once per process, and a
//! second attempt is a hard error rather than a silent re-application.

use crate::report::{self, PatchReport};
use crate::snapshot;
use crate::{Error, MethodPatch, Result};
use graft_core::InstructionStream;
use std::collections::HashSet;

/// Static table of declared patches, keyed by target method.
#[derive(Default)]
pub struct PatchSet {
    patches: Vec<Box<dyn MethodPatch>>,
    applied: HashSet<String>,
    reports: Vec<PatchReport>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a patch. Declared once per target method, compile-time
    /// known; nothing here is runtime-configurable.
    pub fn register(&mut self, patch: Box<dyn MethodPatch>) {
        self.patches.push(patch);
    }

    /// Runs the patch registered for `target` over the stream handed in by
    /// the interception layer and returns the stream to install back:
    /// mutated on success, untouched on abort or when no patch is
    /// registered for the target.
    ///
    /// The once-only slot is claimed before the session runs. A session
    /// that fails with a defect still counts as this process's attempt; a
    /// wrong patch specification would fail identically on retry, and the
    /// input stream is consumed by the failed session either way.
    pub fn apply_to(&mut self, target: &str, stream: InstructionStream) -> Result<InstructionStream> {
        let Some(patch) = self
            .patches
            .iter()
            .find(|patch| patch.target() == target)
        else {
            tracing::debug!(method = target, "no patch registered for method, stream passed through");
            return Ok(stream);
        };

        if !self.applied.insert(patch.name().to_string()) {
            return Err(Error::AlreadyApplied(patch.name().to_string()));
        }

        let verify = snapshot::current().map_or(true, |settings| settings.verify_after_patch);
        let (result, report) = patch.apply(stream)?;
        if verify {
            result.validate_labels().map_err(Error::Core)?;
        }
        self.reports.push(report);
        self.log_summary();
        Ok(result)
    }

    /// Emits the aggregate summary at info level when the settings snapshot
    /// enables `log_reports`. Returns whether anything was emitted.
    pub fn log_summary(&self) -> bool {
        let enabled = snapshot::current().is_some_and(|settings| settings.log_reports);
        if enabled {
            tracing::info!(summary = %self.summary(), "patch report summary");
        }
        enabled
    }

    /// Reports collected so far, one per completed session.
    pub fn reports(&self) -> &[PatchReport] {
        &self.reports
    }

    /// Aggregate JSON summary of all completed sessions.
    pub fn summary(&self) -> serde_json::Value {
        report::summarize(&self.reports)
    }
}
