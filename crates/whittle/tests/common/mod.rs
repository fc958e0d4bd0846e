//! Shared helpers for driving a slicing session from hand-built traces.
//!
//! The instrumentation runtime is external to this crate, so tests stand in
//! for it: they look up instruction ids in the session's registry and emit
//! the event sequence an instrumented run would produce.
#![allow(dead_code)]

use whittle::{Iid, NodeSummary, SliceConfig, Slicer, SourceModule, TraceEvent};

pub fn session(source: &str) -> Slicer {
    Slicer::from_source(source, "program.py", SliceConfig::default()).expect("source should parse")
}

pub fn find_iid(module: &SourceModule, line: u32, pred: impl Fn(&NodeSummary) -> bool) -> Iid {
    module
        .nodes()
        .iter()
        .position(|node| node.location.start_line == line && pred(&node.summary))
        .map(|i| i as Iid)
        .unwrap_or_else(|| panic!("no registered node matches on line {line}"))
}

pub fn def_iid(module: &SourceModule, name: &str) -> Iid {
    module
        .nodes()
        .iter()
        .position(|node| matches!(&node.summary, NodeSummary::FunctionDef { name: n, .. } if n == name))
        .map(|i| i as Iid)
        .unwrap_or_else(|| panic!("no function definition named {name}"))
}

pub fn name_iid(module: &SourceModule, line: u32, id: &str) -> Iid {
    find_iid(module, line, |summary| {
        matches!(summary, NodeSummary::Name { id: n } if n == id)
    })
}

pub fn assign_iid(module: &SourceModule, line: u32) -> Iid {
    find_iid(module, line, |summary| matches!(summary, NodeSummary::Assign { .. }))
}

pub fn aug_iid(module: &SourceModule, line: u32) -> Iid {
    find_iid(module, line, |summary| matches!(summary, NodeSummary::AugAssign { .. }))
}

pub fn attribute_iid(module: &SourceModule, line: u32, attr: &str) -> Iid {
    find_iid(module, line, |summary| {
        matches!(summary, NodeSummary::Attribute { attr: Some(a), .. } if a == attr)
    })
}

pub fn subscript_iid(module: &SourceModule, line: u32) -> Iid {
    find_iid(module, line, |summary| matches!(summary, NodeSummary::Subscript { .. }))
}

pub fn if_iid(module: &SourceModule, line: u32) -> Iid {
    find_iid(module, line, |summary| matches!(summary, NodeSummary::If))
}

/// The gate-opening event for the target function.
pub fn enter_target(module: &SourceModule) -> TraceEvent {
    TraceEvent::FunctionEnter {
        iid: def_iid(module, "slice_me"),
        name: "slice_me".to_owned(),
        is_lambda: false,
    }
}
