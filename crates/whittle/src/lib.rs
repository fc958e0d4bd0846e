#![doc = include_str!("../../../README.md")]

mod config;
mod control;
mod defs;
mod deps;
mod engine;
mod error;
mod hooks;
mod location;
mod report;
mod rewrite;
mod syntax;

pub use crate::{
    config::SliceConfig,
    engine::{BodySpan, SliceOutcome, Slicer},
    error::SliceError,
    hooks::{ExecutionTracer, TraceEvent, replay},
    location::{Iid, Location},
    report::{LineReportRow, SliceReport, VariableReportRow},
    rewrite::negate_odd_ifs,
    syntax::{LhsShape, NodeSummary, RegisteredNode, SourceModule},
};
