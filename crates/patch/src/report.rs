//! Per-patch outcome reports and the aggregate summary.

use crate::{AbortReason, PatchState};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Outcome of one patch session over one method's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchReport {
    /// Patch name.
    pub name: String,
    /// Target method identifier.
    pub target: String,
    /// Terminal session state.
    pub state: PatchState,
    /// Why the session aborted, if it did.
    pub abort: Option<AbortReason>,
    /// Matched window `[start, stop)` positions, once located.
    pub window: Option<(usize, usize)>,
    /// Instructions removed.
    pub removed: usize,
    /// Instructions inserted.
    pub inserted: usize,
    /// Stream length before the session.
    pub len_before: usize,
    /// Stream length after the session.
    pub len_after: usize,
}

impl PatchReport {
    /// Report for a session that aborted before editing anything.
    pub fn aborted(name: &str, target: &str, reason: AbortReason, len: usize) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            state: PatchState::Aborted,
            abort: Some(reason),
            window: None,
            removed: 0,
            inserted: 0,
            len_before: len,
            len_after: len,
        }
    }

    /// Report for a successfully applied session.
    pub fn applied(
        name: &str,
        target: &str,
        window: (usize, usize),
        removed: usize,
        inserted: usize,
        len_before: usize,
        len_after: usize,
    ) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            state: PatchState::Applied,
            abort: None,
            window: Some(window),
            removed,
            inserted,
            len_before,
            len_after,
        }
    }
}

/// Aggregate summary of a batch of patch sessions.
pub fn summarize(reports: &[PatchReport]) -> serde_json::Value {
    let applied = reports
        .iter()
        .filter(|report| report.state == PatchState::Applied)
        .count();
    let aborted = reports.len() - applied;

    json!({
        "patches": reports.len(),
        "applied": applied,
        "aborted": aborted,
        "instructions_removed": reports.iter().map(|r| r.removed).sum::<usize>(),
        "instructions_inserted": reports.iter().map(|r| r.inserted).sum::<usize>(),
        "reports": reports,
    })
}
