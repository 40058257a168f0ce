//! Two-anchor "replace the middle" patch orchestration.
//!
//! A [`WindowPatch`] locates a start anchor and a stop anchor by independent
//! forward scans, preserves the first matched instruction, removes the rest
//! of the window `(start, stop)`, and splices in the replacement block with
//! the removed block's incoming labels re-homed onto its first instruction.
//! Any branch that used to target the start of the removed block therefore
//! targets the start of the replacement block afterwards.

use crate::detour::{CapturedLocals, ReplacementBuilder, net_stack_effect};
use crate::report::PatchReport;
use crate::{AbortReason, Anchor, PatchState, Result};
use graft_core::{InstructionStream, Pattern, StreamCursor, find_first_match};

/// Session bookkeeping shared by the patch orchestrators: holds the current
/// state and logs every transition.
#[derive(Debug)]
pub(crate) struct PatchSession<'a> {
    name: &'a str,
    state: PatchState,
}

impl<'a> PatchSession<'a> {
    pub(crate) fn new(name: &'a str) -> Self {
        tracing::debug!(patch = name, state = %PatchState::Searching, "patch session opened");
        Self {
            name,
            state: PatchState::Searching,
        }
    }

    pub(crate) fn transition(&mut self, next: PatchState) {
        tracing::debug!(patch = self.name, from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    /// Terminal abort: logs at error severity so a maintainer can tell which
    /// anchor drifted, then parks the session in `Aborted`.
    pub(crate) fn abort(&mut self, target: &str, reason: AbortReason) {
        tracing::error!(patch = self.name, method = target, %reason, "patch aborted, stream left unchanged");
        self.transition(PatchState::Aborted);
    }
}

/// Declarative specification of a two-anchor window patch for one method.
pub struct WindowPatch {
    name: String,
    target: String,
    start: Pattern,
    stop: Pattern,
    locals: CapturedLocals,
    builder: Box<dyn ReplacementBuilder>,
}

impl WindowPatch {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        start: Pattern,
        stop: Pattern,
        locals: CapturedLocals,
        builder: impl ReplacementBuilder + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            start,
            stop,
            locals,
            builder: Box::new(builder),
        }
    }

    /// Locates both anchors, or aborts. The stop anchor is scanned from
    /// position 0 as well, so a stop pattern that drifted before the start is
    /// reported as an inverted window rather than as a missing anchor.
    fn locate_window(
        &self,
        stream: &InstructionStream,
        session: &mut PatchSession<'_>,
    ) -> std::result::Result<(usize, usize), AbortReason> {
        let Some(start) = find_first_match(stream, &self.start, 0) else {
            return Err(AbortReason::AnchorNotFound(Anchor::Start));
        };
        let Some(stop) = find_first_match(stream, &self.stop, 0) else {
            return Err(AbortReason::AnchorNotFound(Anchor::Stop));
        };
        if stop <= start {
            return Err(AbortReason::InvertedWindow);
        }
        tracing::debug!(
            patch = %self.name,
            start,
            stop,
            "window located"
        );
        session.transition(PatchState::WindowFound);
        Ok((start, stop))
    }
}

impl crate::MethodPatch for WindowPatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn apply(&self, stream: InstructionStream) -> Result<(InstructionStream, PatchReport)> {
        let len_before = stream.len();
        let mut session = PatchSession::new(&self.name);

        let (start, stop) = match self.locate_window(&stream, &mut session) {
            Ok(window) => window,
            Err(reason) => {
                session.abort(&self.target, reason);
                return Ok((
                    stream,
                    PatchReport::aborted(&self.name, &self.target, reason, len_before),
                ));
            }
        };

        // The first matched instruction is preserved; only the remainder of
        // the window is replaced.
        let remove_count = stop - start - 1;
        session.transition(PatchState::Applying);

        let removed_effect =
            net_stack_effect(&stream.instructions()[start + 1..stop]);

        let mut cursor = StreamCursor::new(stream);
        cursor.advance(start + 1)?;
        let detached = cursor.remove_range(remove_count)?;

        let replacement = self.builder.build(&self.locals);
        let inserted_count = replacement.len();
        let inserted_effect = net_stack_effect(&replacement);
        if inserted_effect != removed_effect {
            tracing::debug!(
                patch = %self.name,
                removed_effect,
                inserted_effect,
                "stack effect of replacement differs from removed window (approximate for branchy windows)"
            );
        }

        cursor.insert(replacement);
        cursor.rehome_labels(detached)?;

        let patched = cursor.materialize();
        debug_assert_eq!(patched.len(), len_before - remove_count + inserted_count);
        patched.validate_labels()?;
        session.transition(PatchState::Applied);

        tracing::info!(
            patch = %self.name,
            method = %self.target,
            removed = remove_count,
            inserted = inserted_count,
            "patch applied"
        );

        let report = PatchReport::applied(
            &self.name,
            &self.target,
            (start, stop),
            remove_count,
            inserted_count,
            len_before,
            patched.len(),
        );
        Ok((patched, report))
    }
}
