//! Process-scoped settings snapshot.
//!
//! The snapshot is explicitly initialized at load and torn down on unload;
//! collaborators detect changed settings by comparing a freshly captured
//! value against the snapshot by structural equality, never by identity.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Settings governing patch-session behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Run label validation over the stream returned by each session.
    pub verify_after_patch: bool,
    /// Emit the aggregate report summary after each completed session.
    pub log_reports: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            verify_after_patch: true,
            log_reports: false,
        }
    }
}

static CURRENT: Mutex<Option<Settings>> = Mutex::new(None);

/// Installs the process-wide snapshot. Replaces any previous value.
pub fn init(settings: Settings) {
    *CURRENT.lock().expect("settings snapshot lock poisoned") = Some(settings);
}

/// Clears the snapshot.
pub fn teardown() {
    *CURRENT.lock().expect("settings snapshot lock poisoned") = None;
}

/// Copy of the current snapshot, `None` when never initialized or torn down.
pub fn current() -> Option<Settings> {
    CURRENT
        .lock()
        .expect("settings snapshot lock poisoned")
        .clone()
}

/// True when `fresh` differs structurally from the snapshot. An
/// uninitialized snapshot counts as changed, so the first capture always
/// triggers whatever refresh the caller gates on this.
pub fn changed(fresh: &Settings) -> bool {
    current().as_ref() != Some(fresh)
}
