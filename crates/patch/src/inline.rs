//! Single-anchor "replace the match itself" patch orchestration.
//!
//! Where a window patch brackets a region between two anchors, an
//! [`InlinePatch`] removes exactly the instructions its anchor matched and
//! splices the replacement into their place. Used when the whole doomed
//! block is stable enough to describe as one pattern.

use crate::detour::{CapturedLocals, ReplacementBuilder};
use crate::report::PatchReport;
use crate::window::PatchSession;
use crate::{AbortReason, Anchor, PatchState, Result};
use graft_core::{InstructionStream, Pattern, StreamCursor, find_first_match};

/// Declarative specification of a single-anchor inline patch for one method.
pub struct InlinePatch {
    name: String,
    target: String,
    anchor: Pattern,
    locals: CapturedLocals,
    builder: Box<dyn ReplacementBuilder>,
}

impl InlinePatch {
    pub fn new(
        name: impl Into<String>,
        target: impl Into<String>,
        anchor: Pattern,
        locals: CapturedLocals,
        builder: impl ReplacementBuilder + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            anchor,
            locals,
            builder: Box::new(builder),
        }
    }
}

impl crate::MethodPatch for InlinePatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn apply(&self, stream: InstructionStream) -> Result<(InstructionStream, PatchReport)> {
        let len_before = stream.len();
        let mut session = PatchSession::new(&self.name);

        let Some(position) = find_first_match(&stream, &self.anchor, 0) else {
            let reason = AbortReason::AnchorNotFound(Anchor::Start);
            session.abort(&self.target, reason);
            return Ok((
                stream,
                PatchReport::aborted(&self.name, &self.target, reason, len_before),
            ));
        };
        let remove_count = self.anchor.len();
        tracing::debug!(patch = %self.name, position, remove_count, "anchor located");
        session.transition(PatchState::WindowFound);
        session.transition(PatchState::Applying);

        let mut cursor = StreamCursor::new(stream);
        cursor.advance(position)?;
        let detached = cursor.remove_range(remove_count)?;

        let replacement = self.builder.build(&self.locals);
        let inserted_count = replacement.len();
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
            (position, position + remove_count),
            remove_count,
            inserted_count,
            len_before,
            patched.len(),
        );
        Ok((patched, report))
    }
}
