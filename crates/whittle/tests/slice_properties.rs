//! Universal invariants of the slicer, checked on concrete runs.

mod common;

use common::{assign_iid, enter_target, name_iid, session};
use pretty_assertions::assert_eq;
use whittle::{ExecutionTracer, SliceConfig, SliceError, Slicer, SourceModule, TraceEvent, replay};

fn read(iid: u32) -> TraceEvent {
    TraceEvent::Read { iid }
}

fn write(iid: u32, value_type: &str) -> TraceEvent {
    TraceEvent::Write {
        iid,
        value_type: value_type.to_owned(),
    }
}

const SOURCE: &str = "def slice_me():\n    x = 10\n    y = 20\n    z = x + y  # slicing criterion\n";

/// Trace for [`SOURCE`] that reads only the listed names on the criterion line.
fn trace_reading(slicer: &Slicer, criterion_reads: &[&str]) -> Vec<TraceEvent> {
    let m = slicer.module();
    let mut events = vec![
        enter_target(m),
        read(assign_iid(m, 2)),
        write(assign_iid(m, 2), "int"),
        read(assign_iid(m, 3)),
        write(assign_iid(m, 3), "int"),
    ];
    for name in criterion_reads {
        events.push(read(name_iid(m, 4, name)));
    }
    events.push(write(assign_iid(m, 4), "int"));
    events
}

// =============================================================================
// 1+2. Subset and criterion retention
// =============================================================================

/// The keep-set stays within the target body plus the criterion line, and
/// always contains the criterion line.
#[test]
fn keep_set_is_a_subset_of_the_body_and_retains_the_criterion() {
    let mut slicer = session(SOURCE);
    let events = trace_reading(&slicer, &["x"]);
    replay(&events, &mut slicer).unwrap();
    let outcome = slicer.finish().unwrap();
    let body = slicer.body_span().unwrap();
    assert!(
        outcome
            .keep
            .iter()
            .all(|&line| (line >= body.start && line <= body.end) || line == outcome.criterion_line)
    );
    assert!(outcome.keep.contains(&outcome.criterion_line));
}

// =============================================================================
// 3. Idempotence
// =============================================================================

/// Slicing an already-sliced program with a matching trace reproduces it
/// byte for byte.
#[test]
fn slicing_a_slice_is_idempotent() {
    let mut slicer = session(SOURCE);
    let events = trace_reading(&slicer, &["x"]);
    replay(&events, &mut slicer).unwrap();
    let first = slicer.finish().unwrap();
    assert_eq!(first.code, "def slice_me():\n    x = 10\n    z = x + y  # slicing criterion\n");

    // re-run on the sliced program (line numbers have shifted)
    let mut second_slicer = session(&first.code);
    let m = second_slicer.module();
    let events = vec![
        enter_target(m),
        read(assign_iid(m, 2)),
        write(assign_iid(m, 2), "int"),
        read(name_iid(m, 3, "x")),
        read(name_iid(m, 3, "y")),
        write(assign_iid(m, 3), "int"),
    ];
    replay(&events, &mut second_slicer).unwrap();
    let second = second_slicer.finish().unwrap();
    assert_eq!(second.code, first.code);
}

// =============================================================================
// 4. Monotonicity under reads
// =============================================================================

/// Adding a read to a kept line can only grow the keep-set.
#[test]
fn adding_a_read_never_shrinks_the_keep_set() {
    let mut base = session(SOURCE);
    let events = trace_reading(&base, &["x"]);
    replay(&events, &mut base).unwrap();
    let base_keep = base.finish().unwrap().keep;

    let mut extended = session(SOURCE);
    let events = trace_reading(&extended, &["x", "y"]);
    replay(&events, &mut extended).unwrap();
    let extended_keep = extended.finish().unwrap().keep;

    assert!(base_keep.iter().all(|line| extended_keep.contains(line)));
    assert_eq!(extended_keep, vec![2, 3, 4]);
}

// =============================================================================
// 5. Syntactic validity
// =============================================================================

/// The rewritten program parses under the same grammar, even when branches
/// are emptied.
#[test]
fn rewritten_programs_parse() {
    let source = "def slice_me():\n    a = 1\n    if a > 0:\n        b = 2\n    else:\n        b = 3\n    c = b  # slicing criterion\n";
    let mut slicer = session(source);
    let m = slicer.module();
    let if3 = common::if_iid(m, 3);
    let events = vec![
        enter_target(m),
        read(assign_iid(m, 2)),
        write(assign_iid(m, 2), "int"),
        read(name_iid(m, 3, "a")),
        TraceEvent::EnterIf { iid: if3, value: false },
        read(assign_iid(m, 6)),
        write(assign_iid(m, 6), "int"),
        TraceEvent::ExitIf { iid: if3 },
        read(name_iid(m, 7, "b")),
        write(assign_iid(m, 7), "int"),
    ];
    replay(&events, &mut slicer).unwrap();
    let outcome = slicer.finish().unwrap();
    assert!(
        SourceModule::parse(outcome.code.clone(), "sliced.py").is_ok(),
        "sliced output should parse:\n{}",
        outcome.code
    );
}

// =============================================================================
// 6. Outside untouched
// =============================================================================

/// Lines outside the target function appear verbatim in the output.
#[test]
fn lines_outside_the_target_function_are_preserved() {
    let source = "import math\n\ndef slice_me():\n    x = 1\n    y = 2\n    r = x  # slicing criterion\n\nslice_me()\n";
    let mut slicer = session(source);
    let m = slicer.module();
    let events = vec![
        enter_target(m),
        read(assign_iid(m, 4)),
        write(assign_iid(m, 4), "int"),
        read(assign_iid(m, 5)),
        write(assign_iid(m, 5), "int"),
        read(name_iid(m, 6, "x")),
        write(assign_iid(m, 6), "int"),
    ];
    replay(&events, &mut slicer).unwrap();
    let outcome = slicer.finish().unwrap();
    assert_eq!(
        outcome.code,
        "import math\n\ndef slice_me():\n    x = 1\n    r = x  # slicing criterion\n\nslice_me()\n"
    );
}

// =============================================================================
// Emission
// =============================================================================

/// Inputs with the original extension get a sliced sibling file on
/// end-of-execution; other inputs produce no file.
#[test]
fn end_execution_emits_the_sliced_file_for_orig_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("program.py.orig");
    std::fs::write(&source_path, SOURCE).unwrap();

    let module = SourceModule::parse(SOURCE, &source_path).unwrap();
    let mut slicer = Slicer::new(module, SliceConfig::default());
    let mut events = trace_reading(&slicer, &["x"]);
    events.push(TraceEvent::EndExecution);
    replay(&events, &mut slicer).unwrap();

    let outcome = slicer.outcome().expect("end of execution should produce an outcome");
    let sliced_path = dir.path().join("sliced.py");
    assert_eq!(outcome.output_path.as_deref(), Some(sliced_path.as_path()));
    let written = std::fs::read_to_string(&sliced_path).unwrap();
    assert_eq!(written, outcome.code);
}

#[test]
fn end_execution_writes_nothing_for_other_extensions() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("program.py");
    std::fs::write(&source_path, SOURCE).unwrap();

    let module = SourceModule::parse(SOURCE, &source_path).unwrap();
    let mut slicer = Slicer::new(module, SliceConfig::default());
    let mut events = trace_reading(&slicer, &["x"]);
    events.push(TraceEvent::EndExecution);
    replay(&events, &mut slicer).unwrap();

    assert_eq!(slicer.outcome().unwrap().output_path, None);
    assert!(!dir.path().join("sliced.py").exists());
}

// =============================================================================
// Fatal errors
// =============================================================================

/// A write through an untracked receiver aborts the replay.
#[test]
fn unknown_receivers_abort_the_run() {
    let source = "def slice_me():\n    xs[0] = 1  # slicing criterion\n";
    let mut slicer = session(source);
    let m = slicer.module();
    let events = vec![enter_target(m), write(assign_iid(m, 2), "int")];
    let err = replay(&events, &mut slicer).unwrap_err();
    assert!(matches!(err, SliceError::UnknownVariable { name, line: 2 } if name == "xs"));
}

/// A run that never reaches the target function produces no output.
#[test]
fn end_execution_without_the_target_fails() {
    let mut slicer = session(SOURCE);
    let err = slicer.on_end_execution().unwrap_err();
    assert!(matches!(err, SliceError::TargetNotEntered { .. }));
    assert!(slicer.outcome().is_none());
}
