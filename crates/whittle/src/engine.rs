use std::{fs, path::PathBuf};

use crate::{
    config::SliceConfig,
    control::ControlStack,
    defs::{AttributeRecord, DefTable, ElementRecord},
    deps::DependenceGraph,
    error::SliceError,
    hooks::ExecutionTracer,
    location::{Iid, Location},
    report::SliceReport,
    rewrite,
    syntax::{LhsShape, NodeSummary, SourceModule},
};

/// Runtime type tag the instrumentation uses for bound methods.
const BOUND_METHOD_TAG: &str = "method";

/// Line interval of the target function body (both bounds inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodySpan {
    pub start: u32,
    pub end: u32,
}

/// Result of a completed slicing run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SliceOutcome {
    /// Sorted keep-set: every line retained within the target function body,
    /// plus the criterion line.
    pub keep: Vec<u32>,
    /// Line carrying the criterion comment.
    pub criterion_line: u32,
    /// The rewritten program.
    pub code: String,
    /// Where the rewritten program was (or would be) written; `None` for
    /// inputs without the original extension.
    pub output_path: Option<PathBuf>,
}

/// One dynamic slicing session.
///
/// Owns the parsed module, the definition table, the dependence graph and
/// the control-flow stack; nothing is shared between sessions, so any number
/// of slicers can run in one process. Drive it through the
/// [`ExecutionTracer`] hooks (live or via [`replay`](crate::replay)); after
/// `on_end_execution` the result is available from [`Slicer::outcome`].
///
/// Tracking is gated: hooks are ignored until the target function is
/// entered, and from then on only hooks whose location falls inside the
/// target's body interval update state.
#[derive(Debug)]
pub struct Slicer {
    module: SourceModule,
    config: SliceConfig,
    defs: DefTable,
    lines: DependenceGraph,
    control: ControlStack,
    body: Option<BodySpan>,
    outcome: Option<SliceOutcome>,
}

impl Slicer {
    #[must_use]
    pub fn new(module: SourceModule, config: SliceConfig) -> Self {
        Self {
            module,
            config,
            defs: DefTable::new(),
            lines: DependenceGraph::new(),
            control: ControlStack::new(),
            body: None,
            outcome: None,
        }
    }

    /// Parses `source` and creates a session with the given configuration.
    pub fn from_source(
        source: impl Into<String>,
        path: impl Into<PathBuf>,
        config: SliceConfig,
    ) -> Result<Self, SliceError> {
        Ok(Self::new(SourceModule::parse(source, path)?, config))
    }

    #[must_use]
    pub fn module(&self) -> &SourceModule {
        &self.module
    }

    #[must_use]
    pub fn config(&self) -> &SliceConfig {
        &self.config
    }

    /// Body interval of the target function, once the gate has opened.
    #[must_use]
    pub fn body_span(&self) -> Option<BodySpan> {
        self.body
    }

    /// Result of the run, available after `on_end_execution`.
    #[must_use]
    pub fn outcome(&self) -> Option<&SliceOutcome> {
        self.outcome.as_ref()
    }

    /// Snapshot of the tracked state, for diagnostics.
    #[must_use]
    pub fn report(&self) -> SliceReport {
        SliceReport::build(
            &self.defs,
            &self.lines,
            self.body.map(|body| (body.start, body.end)),
            self.outcome.as_ref().map(|outcome| outcome.keep.as_slice()),
        )
    }

    /// Computes the keep-set and the rewritten program without touching the
    /// filesystem.
    ///
    /// Fails if the target function was never entered or the criterion
    /// comment is missing.
    pub fn finish(&mut self) -> Result<SliceOutcome, SliceError> {
        let body = self.body.ok_or_else(|| SliceError::TargetNotEntered {
            target: self.config.target_function.clone(),
        })?;
        let criterion_line =
            self.module
                .criterion_line(&self.config.criterion_marker)
                .ok_or_else(|| SliceError::CriterionNotFound {
                    marker: self.config.criterion_marker.clone(),
                })?;
        let keep = self.lines.solve(criterion_line);
        let code = rewrite::remove_unkept_lines(&self.module, &keep, body.start, body.end);
        Ok(SliceOutcome {
            keep,
            criterion_line,
            code,
            output_path: self.output_path(),
        })
    }

    /// Resolves the hook location, applying the activation gate: `None`
    /// while the gate is closed or when the location falls outside the
    /// target body interval.
    fn scoped_location(&self, iid: Iid) -> Result<Option<Location>, SliceError> {
        let Some(body) = self.body else {
            return Ok(None);
        };
        let location = self.module.location(iid).ok_or(SliceError::UnknownIid(iid))?;
        if location.start_line < body.start || location.start_line > body.end {
            return Ok(None);
        }
        Ok(Some(location))
    }

    fn summary(&self, iid: Iid) -> Option<NodeSummary> {
        self.module.node(iid).map(|node| node.summary.clone())
    }

    fn output_path(&self) -> Option<PathBuf> {
        let path = self.module.path();
        let matches = path
            .extension()
            .is_some_and(|ext| ext == self.config.original_extension.as_str());
        if matches {
            Some(path.with_file_name(&self.config.sliced_file_name))
        } else {
            None
        }
    }

    /// Full reassignment of a bare name, plus alias establishment when the
    /// right-hand side was a single bare name of mutable type.
    fn write_bare(
        &mut self,
        name: &str,
        rhs_name: Option<&str>,
        line: u32,
        value_type: &str,
    ) -> Result<(), SliceError> {
        self.defs.reassign(name, line, Some(value_type));
        if let Some(rhs) = rhs_name {
            if !self.config.is_immutable(value_type) {
                if !self.defs.contains(rhs) {
                    return Err(SliceError::UnknownVariable {
                        name: rhs.to_owned(),
                        line,
                    });
                }
                self.defs.alias(name, rhs);
            }
        }
        Ok(())
    }

    /// Write through a normalized subscript key: records the element
    /// definition, advances the receiver, and depends on the receiver's
    /// prior definition (plus the index variable, if the key is one).
    fn write_element(&mut self, receiver: &str, key: &str, line: u32) -> Result<(), SliceError> {
        let mut deps: Vec<u32> = self.control.header_lines().collect();
        let Some(record) = self.defs.get_mut(receiver) else {
            return Err(SliceError::UnknownVariable {
                name: receiver.to_owned(),
                line,
            });
        };
        record.elements.insert(key.to_owned(), ElementRecord::new(line));
        deps.push(record.active_def);
        record.advance(line);
        if let Some(key_record) = self.defs.get(key) {
            deps.push(key_record.active_def);
        }
        self.lines.record(line, deps);
        Ok(())
    }

    /// Attribute write: records the attribute definition on the receiver and
    /// every aliased peer. The receiver's own definition does not advance.
    fn write_attribute(&mut self, receiver: &str, attr: &str, line: u32) -> Result<(), SliceError> {
        let Some(record) = self.defs.get(receiver) else {
            return Err(SliceError::UnknownVariable {
                name: receiver.to_owned(),
                line,
            });
        };
        let active = record.active_def;
        let peers = record.aliases.clone();
        for peer in &peers {
            if let Some(peer_record) = self.defs.get_mut(peer) {
                peer_record.attributes.insert(attr.to_owned(), AttributeRecord::new(line));
            }
        }
        if let Some(record) = self.defs.get_mut(receiver) {
            record.attributes.insert(attr.to_owned(), AttributeRecord::new(line));
        }
        let mut deps: Vec<u32> = self.control.header_lines().collect();
        deps.push(active);
        self.lines.record(line, deps);
        Ok(())
    }

    /// Augmented write to a bare name: depends on the definition preceding
    /// the current one, or on itself when the name was never defined.
    fn augmented_bare(&mut self, name: &str, line: u32) {
        let mut deps: Vec<u32> = self.control.header_lines().collect();
        if let Some(record) = self.defs.get_mut(name) {
            if let Some(previous) = record.previous_def {
                deps.push(previous);
            }
            record.advance(line);
        } else {
            self.defs.insert_new(name, line, None);
            // self-dependence keeps the initial definition in the slice
            deps.push(line);
        }
        self.lines.record(line, deps);
    }

    fn enter_scope(&mut self, iid: Iid) -> Result<(), SliceError> {
        let Some(location) = self.scoped_location(iid)? else {
            return Ok(());
        };
        self.control.push(iid, location.start_line);
        Ok(())
    }

    fn exit_scope(&mut self, iid: Iid) -> Result<(), SliceError> {
        if self.scoped_location(iid)?.is_none() {
            return Ok(());
        }
        self.control.pop_through(iid);
        Ok(())
    }
}

impl ExecutionTracer for Slicer {
    fn on_function_enter(&mut self, iid: Iid, name: &str, _is_lambda: bool) -> Result<(), SliceError> {
        if name != self.config.target_function {
            return Ok(());
        }
        let location = self.module.location(iid).ok_or(SliceError::UnknownIid(iid))?;
        self.body = Some(BodySpan {
            start: location.start_line + 1,
            end: location.end_line,
        });
        Ok(())
    }

    fn on_read(&mut self, iid: Iid) -> Result<(), SliceError> {
        let Some(location) = self.scoped_location(iid)? else {
            return Ok(());
        };
        let line = location.start_line;
        let names = self.module.read_variables(iid);
        let attribute = self.module.receiver_attribute(iid);
        let mut deps: Vec<u32> = self.control.header_lines().collect();
        for name in &names {
            if let Some(record) = self.defs.get(name) {
                deps.push(record.active_def);
                if attribute.is_none() {
                    // a bare-name read conservatively depends on the
                    // variable's entire current content
                    deps.extend(record.elements.values().map(|element| element.active_def));
                    deps.extend(record.attributes.values().map(|attr| attr.active_def));
                }
            }
        }
        self.lines.record(line, deps);
        Ok(())
    }

    fn on_write(&mut self, iid: Iid, value_type: &str) -> Result<(), SliceError> {
        let Some(location) = self.scoped_location(iid)? else {
            return Ok(());
        };
        let line = location.start_line;
        let Some(NodeSummary::Assign { lhs, rhs_name, .. }) = self.summary(iid) else {
            return Ok(());
        };
        match lhs {
            LhsShape::Bare { name } => self.write_bare(&name, rhs_name.as_deref(), line, value_type)?,
            LhsShape::Element {
                receiver,
                key: Some(key),
            } => self.write_element(&receiver, &key, line)?,
            // an unnormalizable key degrades to a whole-variable update
            LhsShape::Element { receiver, key: None } => self.write_bare(&receiver, None, line, value_type)?,
            LhsShape::Attribute { receiver, attr } => {
                if receiver != self.config.self_name {
                    self.write_attribute(&receiver, &attr, line)?;
                }
            }
            LhsShape::Opaque => {}
        }
        Ok(())
    }

    fn on_augmented_write(&mut self, iid: Iid, _op: &str) -> Result<(), SliceError> {
        let Some(location) = self.scoped_location(iid)? else {
            return Ok(());
        };
        let line = location.start_line;
        let Some(NodeSummary::AugAssign { lhs }) = self.summary(iid) else {
            return Ok(());
        };
        match lhs {
            LhsShape::Bare { name } => self.augmented_bare(&name, line),
            LhsShape::Element {
                receiver,
                key: Some(key),
            } => self.write_element(&receiver, &key, line)?,
            LhsShape::Element { receiver, key: None } => self.augmented_bare(&receiver, line),
            LhsShape::Attribute { receiver, attr } => {
                if receiver != self.config.self_name {
                    self.write_attribute(&receiver, &attr, line)?;
                }
            }
            LhsShape::Opaque => {}
        }
        Ok(())
    }

    fn on_attribute_read(&mut self, iid: Iid, _attr: &str, value_type: &str) -> Result<(), SliceError> {
        let Some(location) = self.scoped_location(iid)? else {
            return Ok(());
        };
        let line = location.start_line;
        let Some(NodeSummary::Attribute {
            receiver: Some(receiver),
            attr: Some(attr),
        }) = self.summary(iid)
        else {
            return Ok(());
        };
        if !self.defs.contains(&receiver) {
            return Err(SliceError::UnknownVariable { name: receiver, line });
        }
        if self.config.is_collection_mutator(&attr) || value_type == BOUND_METHOD_TAG {
            // the receiver and every aliased peer count as redefined here
            let peers = self.defs.get(&receiver).map(|r| r.aliases.clone()).unwrap_or_default();
            if let Some(record) = self.defs.get_mut(&receiver) {
                record.advance(line);
            }
            for peer in &peers {
                if let Some(record) = self.defs.get_mut(peer) {
                    record.advance(line);
                }
            }
        }
        let mut deps: Vec<u32> = self.control.header_lines().collect();
        if let Some(record) = self.defs.get(&receiver) {
            deps.push(record.active_def);
            if let Some(attr_record) = record.attributes.get(&attr) {
                deps.push(attr_record.active_def);
            }
            // the peers' prior history must survive into the slice
            for peer in &record.aliases {
                if let Some(previous) = self.defs.get(peer).and_then(|p| p.previous_def) {
                    deps.push(previous);
                }
            }
        }
        self.lines.record(line, deps);
        Ok(())
    }

    fn on_subscript_read(&mut self, iid: Iid, key: &str) -> Result<(), SliceError> {
        let Some(location) = self.scoped_location(iid)? else {
            return Ok(());
        };
        let line = location.start_line;
        let Some(NodeSummary::Subscript {
            receiver: Some(receiver),
            ..
        }) = self.summary(iid)
        else {
            return Ok(());
        };
        let Some(record) = self.defs.get(&receiver) else {
            return Err(SliceError::UnknownVariable { name: receiver, line });
        };
        let mut deps: Vec<u32> = self.control.header_lines().collect();
        match record.elements.get(key) {
            Some(element) => deps.push(element.active_def),
            None => deps.push(record.active_def),
        }
        self.lines.record(line, deps);
        Ok(())
    }

    fn on_enter_if(&mut self, iid: Iid, _value: bool) -> Result<(), SliceError> {
        self.enter_scope(iid)
    }

    fn on_exit_if(&mut self, iid: Iid) -> Result<(), SliceError> {
        self.exit_scope(iid)
    }

    fn on_enter_for(&mut self, iid: Iid) -> Result<(), SliceError> {
        self.enter_scope(iid)
    }

    fn on_exit_for(&mut self, iid: Iid) -> Result<(), SliceError> {
        self.exit_scope(iid)
    }

    fn on_enter_while(&mut self, iid: Iid, _value: bool) -> Result<(), SliceError> {
        self.enter_scope(iid)
    }

    fn on_exit_while(&mut self, iid: Iid) -> Result<(), SliceError> {
        self.exit_scope(iid)
    }

    /// Solves the slice, rewrites the source, and emits the sliced file for
    /// inputs carrying the original extension.
    fn on_end_execution(&mut self) -> Result<(), SliceError> {
        let outcome = self.finish()?;
        if let Some(path) = &outcome.output_path {
            fs::write(path, &outcome.code)?;
        }
        self.outcome = Some(outcome);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SourceModule;

    fn slicer(source: &str) -> Slicer {
        let module = SourceModule::parse(source, "test.py").expect("source should parse");
        Slicer::new(module, SliceConfig::default())
    }

    fn iid_where(slicer: &Slicer, line: u32, pred: impl Fn(&NodeSummary) -> bool) -> Iid {
        slicer
            .module()
            .nodes()
            .iter()
            .position(|node| node.location.start_line == line && pred(&node.summary))
            .map(|i| i as Iid)
            .expect("expected a registered node")
    }

    const SOURCE: &str = "def slice_me():\n    x = 10\n    y = x\n";

    #[test]
    fn hooks_before_the_gate_are_ignored() {
        let mut s = slicer(SOURCE);
        let write = iid_where(&s, 2, |n| matches!(n, NodeSummary::Assign { .. }));
        s.on_write(write, "int").unwrap();
        assert!(s.defs.is_empty());
        assert!(s.lines.is_empty());
    }

    #[test]
    fn function_enter_opens_the_gate_with_the_body_interval() {
        let mut s = slicer(SOURCE);
        let def = iid_where(&s, 1, |n| matches!(n, NodeSummary::FunctionDef { .. }));
        s.on_function_enter(def, "other", false).unwrap();
        assert_eq!(s.body_span(), None);
        s.on_function_enter(def, "slice_me", false).unwrap();
        assert_eq!(s.body_span(), Some(BodySpan { start: 2, end: 3 }));
    }

    #[test]
    fn hooks_outside_the_body_interval_are_ignored() {
        let source = "def slice_me():\n    x = 10\n\nz = 1\n";
        let mut s = slicer(source);
        let def = iid_where(&s, 1, |n| matches!(n, NodeSummary::FunctionDef { .. }));
        s.on_function_enter(def, "slice_me", false).unwrap();
        let outside = iid_where(&s, 4, |n| matches!(n, NodeSummary::Assign { .. }));
        s.on_write(outside, "int").unwrap();
        assert!(s.defs.is_empty());
    }

    #[test]
    fn writes_to_unknown_subscript_receivers_are_fatal() {
        let source = "def slice_me():\n    xs[0] = 1\n";
        let mut s = slicer(source);
        let def = iid_where(&s, 1, |n| matches!(n, NodeSummary::FunctionDef { .. }));
        s.on_function_enter(def, "slice_me", false).unwrap();
        let write = iid_where(&s, 2, |n| matches!(n, NodeSummary::Assign { .. }));
        let err = s.on_write(write, "int").unwrap_err();
        assert!(matches!(err, SliceError::UnknownVariable { name, line: 2 } if name == "xs"));
    }

    #[test]
    fn writes_through_the_implicit_receiver_are_ignored() {
        let source = "def slice_me():\n    self.total = 1\n";
        let mut s = slicer(source);
        let def = iid_where(&s, 1, |n| matches!(n, NodeSummary::FunctionDef { .. }));
        s.on_function_enter(def, "slice_me", false).unwrap();
        let write = iid_where(&s, 2, |n| matches!(n, NodeSummary::Assign { .. }));
        s.on_write(write, "int").unwrap();
        assert!(s.defs.is_empty());
    }

    #[test]
    fn finish_without_entering_the_target_fails() {
        let mut s = slicer(SOURCE);
        let err = s.finish().unwrap_err();
        assert!(matches!(err, SliceError::TargetNotEntered { .. }));
    }

    #[test]
    fn finish_without_a_criterion_comment_fails() {
        let mut s = slicer(SOURCE);
        let def = iid_where(&s, 1, |n| matches!(n, NodeSummary::FunctionDef { .. }));
        s.on_function_enter(def, "slice_me", false).unwrap();
        let err = s.finish().unwrap_err();
        assert!(matches!(err, SliceError::CriterionNotFound { .. }));
    }

    #[test]
    fn output_path_requires_the_original_extension() {
        let module = SourceModule::parse(SOURCE, "/tmp/program.py.orig").unwrap();
        let s = Slicer::new(module, SliceConfig::default());
        assert_eq!(s.output_path(), Some(PathBuf::from("/tmp/sliced.py")));

        let module = SourceModule::parse(SOURCE, "/tmp/program.py").unwrap();
        let s = Slicer::new(module, SliceConfig::default());
        assert_eq!(s.output_path(), None);
    }
}
