//! Two-anchor window patch scenarios: label preservation, fail-open aborts,
//! ordering rejection, and the count invariant.

use graft_core::{
    Instruction, InstructionMatch, InstructionStream, Label, Opcode, Operand, Pattern, SymbolRef,
};
use graft_patch::{
    AbortReason, Anchor, CapturedLocals, DetourCall, MethodPatch, PatchState, WindowPatch,
};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .without_time()
        .try_init()
        .ok();
}

/// `[A, B, C(L1), D, E(br L1)]`, where the label rides on the first instruction
/// of the doomed window, and every branch targeting it must land on the
/// replacement block afterwards.
fn five_instruction_stream() -> InstructionStream {
    InstructionStream::new(vec![
        Instruction::new(Opcode::Nop),                    // A
        Instruction::load_local(1),                       // B (start anchor)
        Instruction::new(Opcode::Pop).labelled(Label(1)), // C (window interior)
        Instruction::load_local(2),                       // D (stop anchor)
        Instruction::branch(Label(1)),                    // E
    ])
}

fn replacement_builder(_: &CapturedLocals) -> Vec<Instruction> {
    vec![Instruction::push_int(7), Instruction::new(Opcode::Pop)] // X, Y
}

fn window_patch(start: Pattern, stop: Pattern) -> WindowPatch {
    WindowPatch::new(
        "test-window",
        "Applicator::fire_event",
        start,
        stop,
        CapturedLocals::new(1, 0),
        replacement_builder,
    )
}

#[test]
fn replaces_window_interior_and_rehomes_labels() {
    init_tracing();
    let patch = window_patch(
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(1))]),
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(2))]),
    );

    let (patched, report) = patch.apply(five_instruction_stream()).unwrap();

    // S' = [A, B, X(L1), Y, D, E(br L1)]
    assert_eq!(patched.len(), 6);
    assert_eq!(patched[0].op, Opcode::Nop);
    assert_eq!(patched[1].op, Opcode::LoadLocal(1));
    assert_eq!(patched[2].op, Opcode::PushInt);
    assert!(patched[2].labels.contains(&Label(1)));
    assert_eq!(patched[3].op, Opcode::Pop);
    assert_eq!(patched[4].op, Opcode::LoadLocal(2));
    assert_eq!(patched[5].operand, Operand::Target(Label(1)));

    // The branch still resolves, now to the replacement block's head.
    assert_eq!(patched.resolve_label(Label(1)), Some(2));
    patched.validate_labels().unwrap();

    assert_eq!(report.state, PatchState::Applied);
    assert_eq!(report.window, Some((1, 3)));
    assert_eq!(report.removed, 1);
    assert_eq!(report.inserted, 2);
    assert_eq!(report.len_after, report.len_before - 1 + 2);
}

#[test]
fn labels_on_preserved_start_anchor_stay_put() {
    let stream = InstructionStream::new(vec![
        Instruction::new(Opcode::Nop),
        Instruction::load_local(1).labelled(Label(9)),
        Instruction::new(Opcode::Pop),
        Instruction::load_local(2),
        Instruction::branch(Label(9)),
    ]);
    let patch = window_patch(
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(1))]),
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(2))]),
    );

    let (patched, _) = patch.apply(stream).unwrap();

    // The start anchor instruction is preserved, labels included.
    assert_eq!(patched.resolve_label(Label(9)), Some(1));
    patched.validate_labels().unwrap();
}

#[test]
fn missing_start_anchor_is_a_noop_with_report() {
    init_tracing();
    let original = five_instruction_stream();
    let patch = window_patch(
        Pattern::new(vec![InstructionMatch::opcode(Opcode::Return)]), // absent
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(2))]),
    );

    let (returned, report) = patch.apply(five_instruction_stream()).unwrap();

    assert_eq!(returned, original);
    assert_eq!(report.state, PatchState::Aborted);
    assert_eq!(report.abort, Some(AbortReason::AnchorNotFound(Anchor::Start)));
    // Branch resolution is untouched by the aborted session.
    assert_eq!(returned.resolve_label(Label(1)), Some(2));
}

#[test]
fn missing_stop_anchor_aborts_distinctly() {
    let patch = window_patch(
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(1))]),
        Pattern::new(vec![InstructionMatch::opcode(Opcode::Return)]), // absent
    );

    let (returned, report) = patch.apply(five_instruction_stream()).unwrap();

    assert_eq!(returned, five_instruction_stream());
    assert_eq!(report.abort, Some(AbortReason::AnchorNotFound(Anchor::Stop)));
}

#[test]
fn inverted_anchors_abort_without_corruption() {
    // Start matches at 3, stop at 1.
    let patch = window_patch(
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(2))]),
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(1))]),
    );

    let (returned, report) = patch.apply(five_instruction_stream()).unwrap();

    assert_eq!(returned, five_instruction_stream());
    assert_eq!(report.state, PatchState::Aborted);
    assert_eq!(report.abort, Some(AbortReason::InvertedWindow));
}

#[test]
fn overlapping_anchors_at_same_position_abort() {
    let patch = window_patch(
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(1))]),
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(1))]),
    );

    let (_, report) = patch.apply(five_instruction_stream()).unwrap();
    assert_eq!(report.abort, Some(AbortReason::InvertedWindow));
}

#[test]
fn interior_label_left_dangling_surfaces_as_defect() {
    // A branch from outside targets the second removed instruction; nothing
    // re-homes that label, so the session must fail loudly, not corrupt.
    let stream = InstructionStream::new(vec![
        Instruction::load_local(1),                       // start anchor
        Instruction::new(Opcode::Pop),                    // removed
        Instruction::new(Opcode::Dup).labelled(Label(5)), // removed, still targeted
        Instruction::load_local(2),                       // stop anchor
        Instruction::branch(Label(5)),
    ]);
    let patch = window_patch(
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(1))]),
        Pattern::new(vec![InstructionMatch::opcode(Opcode::LoadLocal(2))]),
    );

    let err = patch.apply(stream).unwrap_err();
    assert!(matches!(
        err,
        graft_patch::Error::Core(graft_core::Error::DanglingLabel(Label(5)))
    ));
}

#[test]
fn detour_call_window_patch_matches_injector_shape() {
    init_tracing();
    // Method body fragment: a 50-in-100 chance branch guarded by a call,
    // later a virtual flag check. The window between them gets replaced by
    // a detour call.
    let chance = SymbolRef::new("Extensions", "in100", 1, true);
    let is_player = SymbolRef::new("GameObject", "is_player", 1, true);
    let stream = InstructionStream::new(vec![
        Instruction::store_local(0), // dosage
        Instruction::push_int(50),
        Instruction::call(chance.clone()),
        Instruction::branch_if_false(Label(2)),
        Instruction::push_str("mutant branch"), // doomed inline logic
        Instruction::new(Opcode::Pop),
        Instruction::load_local(1).labelled(Label(2)),
        Instruction::call_virtual(is_player.clone()),
        Instruction::branch_if_false(Label(3)),
        Instruction::new(Opcode::Return).labelled(Label(3)),
    ]);

    let start = Pattern::new(vec![
        InstructionMatch::exact(Opcode::PushInt, Operand::Int(50)),
        InstructionMatch::exact(Opcode::Call, Operand::Symbol(chance)),
        InstructionMatch::opcode(Opcode::BranchIfFalse),
    ]);
    let stop = Pattern::new(vec![
        InstructionMatch::opcode(Opcode::LoadLocal(1)),
        InstructionMatch::exact(Opcode::CallVirtual, Operand::Symbol(is_player)),
        InstructionMatch::opcode(Opcode::BranchIfFalse),
    ]);
    let patch = WindowPatch::new(
        "nectar-detour",
        "Applicator::fire_event",
        start,
        stop,
        CapturedLocals::new(1, 0),
        DetourCall::new(SymbolRef::new("Injector", "detour", 2, false)),
    );

    let (patched, report) = patch.apply(stream).unwrap();

    assert_eq!(report.state, PatchState::Applied);
    assert_eq!(report.window, Some((1, 6)));
    // Window interior past the preserved first match:
    // [call, brfalse, ldstr, pop]: 4 removed, 3 inserted.
    assert_eq!(report.removed, 4);
    assert_eq!(report.inserted, 3);
    assert_eq!(patched.len(), 10 - 4 + 3);

    // Replacement block: ldloc.1, ldloc.0, call detour, right after the
    // preserved first matched instruction.
    assert_eq!(patched[2].op, Opcode::LoadLocal(1));
    assert_eq!(patched[3].op, Opcode::LoadLocal(0));
    assert_eq!(patched[4].op, Opcode::Call);
    patched.validate_labels().unwrap();
}
