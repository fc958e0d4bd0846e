use std::path::{Path, PathBuf};

use ruff_python_ast::{
    self as ast, Expr, Number, Stmt, UnaryOp,
    visitor::{self, Visitor},
};
use ruff_python_ast::token::TokenKind;
use ruff_python_parser::{parse_expression, parse_module};
use ruff_text_size::{Ranged, TextRange};

use crate::{
    error::SliceError,
    location::{Iid, Location},
};

/// Position of each line end in the source, used to convert byte offsets to
/// line number and column.
#[derive(Debug)]
struct LineIndex {
    line_ends: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut line_ends = vec![];
        for (i, c) in source.char_indices() {
            if c == '\n' {
                line_ends.push(i);
            }
        }
        Self { line_ends }
    }

    /// Returns the 0-based line number and the byte offset of that line's start.
    fn index_to_position(&self, index: usize) -> (usize, usize) {
        let mut line_start = 0;
        for (line_no, line_end) in self.line_ends.iter().enumerate() {
            if index <= *line_end {
                return (line_no, line_start);
            }
            line_start = *line_end + 1;
        }
        // Content after the last newline (file without trailing newline)
        (self.line_ends.len(), line_start)
    }

    fn convert_range(&self, range: TextRange) -> Location {
        let start = range.start().to_usize();
        let (start_line, start_line_start) = self.index_to_position(start);
        let end = range.end().to_usize();
        let (end_line, end_line_start) = self.index_to_position(end);
        Location::new(
            u32::try_from(start_line).expect("line number exceeds u32") + 1,
            u32::try_from(start - start_line_start).expect("column exceeds u32"),
            u32::try_from(end_line).expect("line number exceeds u32") + 1,
            u32::try_from(end - end_line_start).expect("column exceeds u32"),
        )
    }

    /// Byte span of a 1-based line, excluding its terminating newline.
    fn line_span(&self, line: u32, source_len: usize) -> Option<(usize, usize)> {
        let line = line.checked_sub(1)? as usize;
        if line > self.line_ends.len() {
            return None;
        }
        let start = if line == 0 { 0 } else { self.line_ends[line - 1] + 1 };
        let end = self.line_ends.get(line).copied().unwrap_or(source_len);
        Some((start, end))
    }
}

/// Shape of an assignment target, extracted once at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LhsShape {
    /// `x = e`
    Bare { name: String },
    /// `x[i] = e`; `key` is the normalized index, `None` when the index
    /// cannot be normalized (the write then degrades to a whole-variable
    /// update).
    Element { receiver: String, key: Option<String> },
    /// `x.a = e`
    Attribute { receiver: String, attr: String },
    /// A target the tracker does not model (tuple unpacking, chained
    /// attributes, subscripts of non-name receivers, ...).
    Opaque,
}

/// Compact summary of a registered node, standing in for repeated AST
/// queries at hook time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSummary {
    /// A bare name expression, in either load or store context.
    Name { id: String },
    /// An attribute expression. Fields are `None` unless the receiver and
    /// attribute are simple names.
    Attribute {
        receiver: Option<String>,
        attr: Option<String>,
    },
    /// A subscript expression; `key` is the normalized index, if any.
    Subscript {
        receiver: Option<String>,
        key: Option<String>,
    },
    /// An assignment statement. `targets` lists every bare-name target,
    /// `lhs` is the shape of the first target, and `rhs_name` is set when
    /// the right-hand side is a single bare name (alias candidate).
    Assign {
        targets: Vec<String>,
        lhs: LhsShape,
        rhs_name: Option<String>,
    },
    /// An augmented assignment statement.
    AugAssign { lhs: LhsShape },
    /// An `if`/`elif` header.
    If,
    /// A `for` header.
    For,
    /// A `while` header.
    While,
    /// A function definition and its body line interval.
    FunctionDef {
        name: String,
        body_start: u32,
        body_end: u32,
    },
}

/// One entry of the iid registry.
#[derive(Debug, Clone)]
pub struct RegisteredNode {
    pub location: Location,
    pub summary: NodeSummary,
}

/// Parsed source module: the facade between the slicing engine and the ruff
/// parser.
///
/// Built once per session. Assigns instruction ids to the nodes the
/// instrumentation runtime reports on and answers all syntactic queries the
/// hook handlers need: iid positions, read-variable extraction, assignment
/// target shapes, subscript-key normalization, attribute-read disambiguation
/// and the criterion comment scan.
///
/// # Instruction id numbering
///
/// Statements are registered before the expressions they contain;
/// expression operands are registered before their parent expression. The
/// second rule is load-bearing: the receiver name of an attribute access is
/// always immediately followed by the attribute expression itself, which is
/// what [`SourceModule::receiver_attribute`] keys on.
#[derive(Debug)]
pub struct SourceModule {
    path: PathBuf,
    source: String,
    index: LineIndex,
    module: ast::ModModule,
    /// All comments in source order, as (1-based line, text including `#`).
    comments: Vec<(u32, String)>,
    nodes: Vec<RegisteredNode>,
}

impl SourceModule {
    /// Parses `source` and builds the iid registry.
    pub fn parse(source: impl Into<String>, path: impl Into<PathBuf>) -> Result<Self, SliceError> {
        let source = source.into();
        let index = LineIndex::new(&source);
        let parsed = parse_module(&source).map_err(|e| SliceError::Syntax {
            message: e.to_string(),
            location: index.convert_range(e.range()),
        })?;

        let comments = parsed
            .tokens()
            .iter()
            .filter(|token| token.kind() == TokenKind::Comment)
            .map(|token| {
                let range = token.range();
                let location = index.convert_range(range);
                let text = source[range.start().to_usize()..range.end().to_usize()].to_owned();
                (location.start_line, text)
            })
            .collect();

        let module = parsed.into_syntax();
        let mut builder = RegistryBuilder {
            source: &source,
            index: &index,
            nodes: Vec::new(),
        };
        for stmt in &module.body {
            builder.visit_stmt(stmt);
        }
        let nodes = builder.nodes;

        Ok(Self {
            path: path.into(),
            source,
            index,
            module,
            comments,
            nodes,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn module(&self) -> &ast::ModModule {
        &self.module
    }

    /// The full iid registry, in numbering order.
    #[must_use]
    pub fn nodes(&self) -> &[RegisteredNode] {
        &self.nodes
    }

    #[must_use]
    pub fn node(&self, iid: Iid) -> Option<&RegisteredNode> {
        self.nodes.get(iid as usize)
    }

    /// Resolves an instruction id to its source position.
    #[must_use]
    pub fn location(&self, iid: Iid) -> Option<Location> {
        self.nodes.get(iid as usize).map(|node| node.location)
    }

    pub(crate) fn location_of(&self, range: TextRange) -> Location {
        self.index.convert_range(range)
    }

    /// Text of a 1-based source line, without its newline.
    #[must_use]
    pub fn line_text(&self, line: u32) -> Option<&str> {
        let (start, end) = self.index.line_span(line, self.source.len())?;
        self.source.get(start..end)
    }

    /// Line of the first comment whose text contains `marker`.
    #[must_use]
    pub fn criterion_line(&self, marker: &str) -> Option<u32> {
        self.comments
            .iter()
            .find(|(_, text)| text.contains(marker))
            .map(|(line, _)| *line)
    }

    /// Variable names textually referenced by the node at `iid`.
    ///
    /// Name nodes reference themselves; assignment statements reference
    /// their bare-name targets (the runtime reports a read at the statement
    /// iid when the right-hand side contains no readable name).
    #[must_use]
    pub fn read_variables(&self, iid: Iid) -> Vec<String> {
        match self.node(iid).map(|node| &node.summary) {
            Some(NodeSummary::Name { id }) => vec![id.clone()],
            Some(NodeSummary::Assign { targets, .. }) => targets.clone(),
            Some(NodeSummary::AugAssign {
                lhs: LhsShape::Bare { name },
            }) => vec![name.clone()],
            _ => vec![],
        }
    }

    /// Decides whether the read at `iid` is the receiver of an adjacent
    /// attribute access, returning the `(receiver, attribute)` pair if so.
    ///
    /// A receiver read and its enclosing attribute share a start position,
    /// and the attribute extends at least as far; when the geometry matches,
    /// the attribute name is recovered by re-parsing the covered slice of
    /// the source line.
    #[must_use]
    pub fn receiver_attribute(&self, iid: Iid) -> Option<(String, String)> {
        let current = self.location(iid)?;
        let next = self.location(iid + 1)?;
        if current.start_line != next.start_line
            || current.start_column != next.start_column
            || current.end_column > next.end_column
        {
            return None;
        }
        let line = self.line_text(current.start_line)?;
        let snippet = line.get(next.start_column as usize..next.end_column as usize)?;
        let expr = parse_expression(snippet).ok()?.into_syntax().body;
        if let Expr::Attribute(attr) = expr.as_ref() {
            if let Expr::Name(receiver) = attr.value.as_ref() {
                return Some((receiver.id.to_string(), attr.attr.to_string()));
            }
        }
        None
    }
}

/// Builds the iid registry in a single pass over the parsed module.
struct RegistryBuilder<'a> {
    source: &'a str,
    index: &'a LineIndex,
    nodes: Vec<RegisteredNode>,
}

impl RegistryBuilder<'_> {
    fn push(&mut self, range: TextRange, summary: NodeSummary) {
        self.nodes.push(RegisteredNode {
            location: self.index.convert_range(range),
            summary,
        });
    }
}

impl<'a> Visitor<'a> for RegistryBuilder<'_> {
    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        match stmt {
            Stmt::Assign(assign) => {
                self.push(assign.range(), assign_summary(self.source, assign));
            }
            Stmt::AugAssign(aug) => {
                self.push(
                    aug.range(),
                    NodeSummary::AugAssign {
                        lhs: lhs_shape(self.source, &aug.target),
                    },
                );
            }
            Stmt::If(stmt_if) => {
                self.push(stmt_if.range(), NodeSummary::If);
                // elif headers carry their own condition and control scope
                for clause in &stmt_if.elif_else_clauses {
                    if clause.test.is_some() {
                        self.push(clause.range(), NodeSummary::If);
                    }
                }
            }
            Stmt::For(stmt_for) => {
                self.push(stmt_for.range(), NodeSummary::For);
            }
            Stmt::While(stmt_while) => {
                self.push(stmt_while.range(), NodeSummary::While);
            }
            Stmt::FunctionDef(def) => {
                let location = self.index.convert_range(def.range());
                self.push(
                    def.range(),
                    NodeSummary::FunctionDef {
                        name: def.name.to_string(),
                        body_start: location.start_line + 1,
                        body_end: location.end_line,
                    },
                );
            }
            _ => {}
        }
        visitor::walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        // Postorder: operands first, so a receiver name is immediately
        // followed by its enclosing attribute or subscript.
        visitor::walk_expr(self, expr);
        match expr {
            Expr::Name(name) => {
                self.push(
                    name.range(),
                    NodeSummary::Name {
                        id: name.id.to_string(),
                    },
                );
            }
            Expr::Attribute(attr) => {
                self.push(
                    attr.range(),
                    NodeSummary::Attribute {
                        receiver: name_of(&attr.value),
                        attr: Some(attr.attr.to_string()),
                    },
                );
            }
            Expr::Subscript(sub) => {
                self.push(
                    sub.range(),
                    NodeSummary::Subscript {
                        receiver: name_of(&sub.value),
                        key: normalize_key(self.source, &sub.slice),
                    },
                );
            }
            _ => {}
        }
    }
}

fn name_of(expr: &Expr) -> Option<String> {
    if let Expr::Name(name) = expr {
        Some(name.id.to_string())
    } else {
        None
    }
}

fn assign_summary(source: &str, assign: &ast::StmtAssign) -> NodeSummary {
    let targets = assign.targets.iter().filter_map(name_of).collect();
    let lhs = assign
        .targets
        .first()
        .map_or(LhsShape::Opaque, |target| lhs_shape(source, target));
    let rhs_name = if matches!(lhs, LhsShape::Bare { .. }) {
        name_of(&assign.value)
    } else {
        None
    };
    NodeSummary::Assign { targets, lhs, rhs_name }
}

fn lhs_shape(source: &str, target: &Expr) -> LhsShape {
    match target {
        Expr::Name(name) => LhsShape::Bare {
            name: name.id.to_string(),
        },
        Expr::Attribute(attr) => match attr.value.as_ref() {
            Expr::Name(receiver) => LhsShape::Attribute {
                receiver: receiver.id.to_string(),
                attr: attr.attr.to_string(),
            },
            _ => LhsShape::Opaque,
        },
        Expr::Subscript(sub) => match sub.value.as_ref() {
            Expr::Name(receiver) => LhsShape::Element {
                receiver: receiver.id.to_string(),
                key: normalize_key(source, &sub.slice),
            },
            _ => LhsShape::Opaque,
        },
        _ => LhsShape::Opaque,
    }
}

/// Normalizes a subscript index to its textual form.
///
/// Integer literals keep their literal text, bare names normalize to the
/// name itself, and the specific form `-1` is recognized through its unary
/// minus. Anything else is an unknown key.
fn normalize_key(source: &str, slice: &Expr) -> Option<String> {
    match slice {
        Expr::NumberLiteral(literal) if matches!(literal.value, Number::Int(_)) => {
            let range = literal.range();
            Some(source[range.start().to_usize()..range.end().to_usize()].to_owned())
        }
        Expr::Name(name) => Some(name.id.to_string()),
        Expr::UnaryOp(unary) if unary.op == UnaryOp::USub => match unary.operand.as_ref() {
            Expr::NumberLiteral(literal) if matches!(literal.value, Number::Int(_)) => {
                let range = literal.range();
                let text = &source[range.start().to_usize()..range.end().to_usize()];
                if text == "1" { Some("-1".to_owned()) } else { None }
            }
            _ => None,
        },
        _ => None,
    }
}
