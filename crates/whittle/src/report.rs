use std::fmt;

use crate::{defs::DefTable, deps::DependenceGraph};

/// Diagnostic snapshot of a slicing session.
///
/// Replaces ad-hoc debug printing: callers format it with `Display` (the CLI
/// does so under `--verbose`) or serialize it as JSON.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SliceReport {
    /// Target body interval, if the gate opened.
    pub body_interval: Option<(u32, u32)>,
    /// Tracked variables, sorted by name.
    pub variables: Vec<VariableReportRow>,
    /// Per-line dependencies, sorted by line.
    pub lines: Vec<LineReportRow>,
    /// Sorted keep-set, once the slice has been solved.
    pub keep: Option<Vec<u32>>,
}

/// One tracked variable in the report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VariableReportRow {
    pub name: String,
    pub active_def: u32,
    pub previous_def: Option<u32>,
    pub type_tag: Option<String>,
    pub elements: Vec<(String, u32)>,
    pub attributes: Vec<(String, u32)>,
    pub aliases: Vec<String>,
}

/// One recorded line in the report.
#[derive(Debug, Clone, serde::Serialize)]
pub struct LineReportRow {
    pub line: u32,
    pub dependencies: Vec<u32>,
}

impl SliceReport {
    pub(crate) fn build(
        defs: &DefTable,
        graph: &DependenceGraph,
        body_interval: Option<(u32, u32)>,
        keep: Option<&[u32]>,
    ) -> Self {
        let mut variables: Vec<VariableReportRow> = defs
            .iter()
            .map(|(name, record)| VariableReportRow {
                name: name.to_owned(),
                active_def: record.active_def,
                previous_def: record.previous_def,
                type_tag: record.type_tag.clone(),
                elements: record
                    .elements
                    .iter()
                    .map(|(key, element)| (key.clone(), element.active_def))
                    .collect(),
                attributes: record
                    .attributes
                    .iter()
                    .map(|(attr, attribute)| (attr.clone(), attribute.active_def))
                    .collect(),
                aliases: record.aliases.clone(),
            })
            .collect();
        variables.sort_by(|a, b| a.name.cmp(&b.name));

        let mut lines: Vec<LineReportRow> = graph
            .iter()
            .map(|(line, record)| {
                let mut dependencies: Vec<u32> = record.dependencies.iter().copied().collect();
                dependencies.sort_unstable();
                LineReportRow { line, dependencies }
            })
            .collect();
        lines.sort_by_key(|row| row.line);

        Self {
            body_interval,
            variables,
            lines,
            keep: keep.map(<[u32]>::to_vec),
        }
    }
}

impl fmt::Display for SliceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Slice Report ===")?;
        match self.body_interval {
            Some((start, end)) => writeln!(f, "target body:    lines {start}-{end}")?,
            None => writeln!(f, "target body:    never entered")?,
        }
        writeln!(f, "--- Tracked Variables ---")?;
        for row in &self.variables {
            write!(f, "  {:<12} active={}", row.name, row.active_def)?;
            if let Some(previous) = row.previous_def {
                write!(f, " previous={previous}")?;
            }
            if let Some(tag) = &row.type_tag {
                write!(f, " type={tag}")?;
            }
            if !row.elements.is_empty() {
                write!(f, " elements={:?}", row.elements)?;
            }
            if !row.attributes.is_empty() {
                write!(f, " attributes={:?}", row.attributes)?;
            }
            if !row.aliases.is_empty() {
                write!(f, " aliases={:?}", row.aliases)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "--- Line Dependencies ---")?;
        for row in &self.lines {
            writeln!(f, "  {:>4} <- {:?}", row.line, row.dependencies)?;
        }
        if let Some(keep) = &self.keep {
            writeln!(f, "keep set:       {keep:?}")?;
        }
        Ok(())
    }
}
