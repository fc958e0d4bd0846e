use ahash::AHashSet;
use ruff_python_ast::{self as ast, ElifElseClause, Stmt};
use ruff_text_size::{Ranged, TextRange};

use crate::{error::SliceError, location::Location, syntax::SourceModule};

/// Rewrites the module, deleting every deletable statement inside the target
/// body interval whose start line is not in the keep-set.
///
/// Deletable constructs are loops, conditionals (including `elif`/`else`
/// clauses) and simple statements; `with`, `try` and nested definitions are
/// never deleted themselves, but the statements inside them are processed.
/// Deletion happens at line granularity, so comments on deleted lines
/// disappear with their statement and everything outside the interval is
/// emitted verbatim.
pub(crate) fn remove_unkept_lines(module: &SourceModule, keep: &[u32], body_start: u32, body_end: u32) -> String {
    let line_count = module.source().split('\n').count();
    let mut rewriter = Rewriter {
        module,
        keep: keep.iter().copied().collect(),
        body_start,
        body_end,
        removed: vec![false; line_count + 2],
        inserts: Vec::new(),
    };
    rewriter.visit_body(&module.module().body);
    rewriter.emit()
}

struct Rewriter<'a> {
    module: &'a SourceModule,
    keep: AHashSet<u32>,
    body_start: u32,
    body_end: u32,
    /// 1-based line → deleted.
    removed: Vec<bool>,
    /// `pass` statements inserted where a kept compound lost its whole body,
    /// as (line the body started on, replacement text).
    inserts: Vec<(u32, String)>,
}

impl Rewriter<'_> {
    fn loc(&self, node: &impl Ranged) -> Location {
        self.module.location_of(node.range())
    }

    fn in_interval(&self, line: u32) -> bool {
        line >= self.body_start && line <= self.body_end
    }

    fn mark(&mut self, start: u32, end: u32) {
        for line in start..=end {
            if let Some(slot) = self.removed.get_mut(line as usize) {
                *slot = true;
            }
        }
    }

    fn is_removed(&self, line: u32) -> bool {
        self.removed.get(line as usize).copied().unwrap_or(false)
    }

    /// Processes one statement list. When every statement of a non-empty
    /// body ends up deleted, a `pass` with the body's indentation is
    /// inserted so the enclosing compound stays parseable.
    fn visit_body(&mut self, stmts: &[Stmt]) {
        let mut all_removed = !stmts.is_empty();
        let mut first_location = None;
        for stmt in stmts {
            let location = self.loc(stmt);
            if first_location.is_none() {
                first_location = Some(location);
            }
            if !self.visit_stmt(stmt, location) {
                all_removed = false;
            }
        }
        if all_removed {
            if let Some(location) = first_location {
                let indent = self
                    .module
                    .line_text(location.start_line)
                    .and_then(|text| text.get(..location.start_column as usize))
                    .unwrap_or_default();
                self.inserts.push((location.start_line, format!("{indent}pass")));
            }
        }
    }

    /// Returns true when the statement was deleted.
    fn visit_stmt(&mut self, stmt: &Stmt, location: Location) -> bool {
        if deletable(stmt) && self.in_interval(location.start_line) && !self.keep.contains(&location.start_line) {
            self.mark(location.start_line, location.end_line);
            return true;
        }
        match stmt {
            Stmt::If(stmt_if) => {
                self.visit_body(&stmt_if.body);
                for clause in &stmt_if.elif_else_clauses {
                    self.visit_clause(clause);
                }
            }
            Stmt::While(stmt_while) => {
                self.visit_body(&stmt_while.body);
                self.visit_loop_else(&stmt_while.body, &stmt_while.orelse);
            }
            Stmt::For(stmt_for) => {
                self.visit_body(&stmt_for.body);
                self.visit_loop_else(&stmt_for.body, &stmt_for.orelse);
            }
            Stmt::FunctionDef(def) => self.visit_body(&def.body),
            Stmt::ClassDef(def) => self.visit_body(&def.body),
            Stmt::With(stmt_with) => self.visit_body(&stmt_with.body),
            Stmt::Try(stmt_try) => {
                self.visit_body(&stmt_try.body);
                for handler in &stmt_try.handlers {
                    let ast::ExceptHandler::ExceptHandler(handler) = handler;
                    self.visit_body(&handler.body);
                }
                if !stmt_try.orelse.is_empty() {
                    self.visit_body(&stmt_try.orelse);
                }
                if !stmt_try.finalbody.is_empty() {
                    self.visit_body(&stmt_try.finalbody);
                }
            }
            Stmt::Match(stmt_match) => {
                for case in &stmt_match.cases {
                    self.visit_body(&case.body);
                }
            }
            _ => {}
        }
        false
    }

    /// `elif` clauses behave like conditional headers; bare `else` clauses
    /// are dropped only when none of the lines they span are kept, so a
    /// partially-relevant `else` preserves its containing `if`.
    fn visit_clause(&mut self, clause: &ElifElseClause) {
        let location = self.loc(clause);
        if self.in_interval(location.start_line) {
            if clause.test.is_some() {
                if !self.keep.contains(&location.start_line) {
                    self.mark(location.start_line, location.end_line);
                    return;
                }
            } else {
                let any_kept = (location.start_line..=location.end_line).any(|line| self.keep.contains(&line));
                if !any_kept {
                    self.mark(location.start_line, location.end_line);
                    return;
                }
            }
        }
        self.visit_body(&clause.body);
    }

    /// `for`/`while` `else` blocks have no node of their own; the `else:`
    /// header line is located lexically between the loop body and the first
    /// clause statement.
    fn visit_loop_else(&mut self, body: &[Stmt], orelse: &[Stmt]) {
        let (Some(first), Some(last)) = (orelse.first(), orelse.last()) else {
            return;
        };
        let first_location = self.loc(first);
        let last_location = self.loc(last);
        if !self.in_interval(first_location.start_line) {
            self.visit_body(orelse);
            return;
        }
        let any_kept = (first_location.start_line..=last_location.end_line).any(|line| self.keep.contains(&line));
        if any_kept {
            self.visit_body(orelse);
            return;
        }
        let after_body = body.last().map_or(first_location.start_line, |stmt| self.loc(stmt).end_line + 1);
        let else_line = (after_body..first_location.start_line)
            .find(|&line| {
                self.module
                    .line_text(line)
                    .is_some_and(|text| text.trim_start().starts_with("else"))
            })
            .unwrap_or(first_location.start_line);
        self.mark(else_line, last_location.end_line);
    }

    fn emit(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for (idx, text) in self.module.source().split('\n').enumerate() {
            let line = u32::try_from(idx).expect("line number exceeds u32") + 1;
            for (at, insert) in &self.inserts {
                if *at == line {
                    lines.push(insert.clone());
                }
            }
            if !self.is_removed(line) {
                lines.push(text.to_owned());
            }
        }
        lines.join("\n")
    }
}

fn deletable(stmt: &Stmt) -> bool {
    matches!(
        stmt,
        Stmt::If(_)
            | Stmt::For(_)
            | Stmt::While(_)
            | Stmt::Assign(_)
            | Stmt::AugAssign(_)
            | Stmt::AnnAssign(_)
            | Stmt::TypeAlias(_)
            | Stmt::Expr(_)
            | Stmt::Return(_)
            | Stmt::Pass(_)
            | Stmt::Break(_)
            | Stmt::Continue(_)
            | Stmt::Delete(_)
            | Stmt::Assert(_)
            | Stmt::Raise(_)
            | Stmt::Import(_)
            | Stmt::ImportFrom(_)
            | Stmt::Global(_)
            | Stmt::Nonlocal(_)
    )
}

/// Negates the test of every `if`/`elif` whose header starts on an odd line,
/// wrapping it as `not (...)`.
///
/// Companion transformation used to perturb control flow in slicing
/// experiments; it leaves the rest of the source byte-for-byte intact.
pub fn negate_odd_ifs(source: &str) -> Result<String, SliceError> {
    let module = SourceModule::parse(source, "input.py")?;
    let mut tests = Vec::new();
    collect_if_tests(&module, &module.module().body, &mut tests);
    // apply edits back-to-front so earlier offsets stay valid
    tests.sort_by_key(|range| std::cmp::Reverse(range.start()));
    let mut out = source.to_owned();
    for range in tests {
        out.insert_str(range.end().to_usize(), ")");
        out.insert_str(range.start().to_usize(), "not (");
    }
    Ok(out)
}

fn collect_if_tests(module: &SourceModule, stmts: &[Stmt], out: &mut Vec<TextRange>) {
    let odd = |range: TextRange| module.location_of(range).start_line % 2 == 1;
    for stmt in stmts {
        match stmt {
            Stmt::If(stmt_if) => {
                if odd(stmt_if.range()) {
                    out.push(stmt_if.test.range());
                }
                collect_if_tests(module, &stmt_if.body, out);
                for clause in &stmt_if.elif_else_clauses {
                    if let Some(test) = &clause.test {
                        if odd(clause.range()) {
                            out.push(test.range());
                        }
                    }
                    collect_if_tests(module, &clause.body, out);
                }
            }
            Stmt::While(stmt_while) => {
                collect_if_tests(module, &stmt_while.body, out);
                collect_if_tests(module, &stmt_while.orelse, out);
            }
            Stmt::For(stmt_for) => {
                collect_if_tests(module, &stmt_for.body, out);
                collect_if_tests(module, &stmt_for.orelse, out);
            }
            Stmt::FunctionDef(def) => collect_if_tests(module, &def.body, out),
            Stmt::ClassDef(def) => collect_if_tests(module, &def.body, out),
            Stmt::With(stmt_with) => collect_if_tests(module, &stmt_with.body, out),
            Stmt::Try(stmt_try) => {
                collect_if_tests(module, &stmt_try.body, out);
                for handler in &stmt_try.handlers {
                    let ast::ExceptHandler::ExceptHandler(handler) = handler;
                    collect_if_tests(module, &handler.body, out);
                }
                collect_if_tests(module, &stmt_try.orelse, out);
                collect_if_tests(module, &stmt_try.finalbody, out);
            }
            Stmt::Match(stmt_match) => {
                for case in &stmt_match.cases {
                    collect_if_tests(module, &case.body, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn rewrite(source: &str, keep: &[u32], body_start: u32, body_end: u32) -> String {
        let module = SourceModule::parse(source, "test.py").expect("source should parse");
        remove_unkept_lines(&module, keep, body_start, body_end)
    }

    #[test]
    fn drops_unkept_simple_statements_with_their_comments() {
        let source = "def slice_me():\n    x = 10\n    y = 20  # irrelevant\n    z = x + 1  # slicing criterion\n";
        let out = rewrite(source, &[2, 4], 2, 4);
        assert_eq!(
            out,
            "def slice_me():\n    x = 10\n    z = x + 1  # slicing criterion\n"
        );
    }

    #[test]
    fn statements_outside_the_interval_are_untouched() {
        let source = "a = 1\ndef slice_me():\n    x = 10\nb = 2\n";
        let out = rewrite(source, &[], 3, 3);
        assert_eq!(out, "a = 1\ndef slice_me():\n    pass\nb = 2\n");
    }

    #[test]
    fn unkept_else_clause_is_removed() {
        let source = "def slice_me():\n    a = 1\n    if a > 0:\n        b = 2\n    else:\n        b = 3\n    c = b  # slicing criterion\n";
        let out = rewrite(source, &[2, 3, 4, 7], 2, 7);
        assert_eq!(
            out,
            "def slice_me():\n    a = 1\n    if a > 0:\n        b = 2\n    c = b  # slicing criterion\n"
        );
    }

    #[test]
    fn else_clause_with_a_kept_line_survives_and_empty_branch_gets_a_pass() {
        let source = "def slice_me():\n    a = 1\n    if a > 0:\n        b = 2\n    else:\n        b = 3\n    c = b  # slicing criterion\n";
        let out = rewrite(source, &[2, 3, 6, 7], 2, 7);
        assert_eq!(
            out,
            "def slice_me():\n    a = 1\n    if a > 0:\n        pass\n    else:\n        b = 3\n    c = b  # slicing criterion\n"
        );
    }

    #[test]
    fn unkept_conditional_is_removed_whole() {
        let source = "def slice_me():\n    x = 1\n    if x > 0:\n        y = 2\n    else:\n        y = 3\n    r = x  # slicing criterion\n";
        let out = rewrite(source, &[2, 7], 2, 7);
        assert_eq!(out, "def slice_me():\n    x = 1\n    r = x  # slicing criterion\n");
    }

    #[test]
    fn unkept_loop_else_is_removed() {
        let source = "def slice_me():\n    t = 0\n    for i in [1]:\n        t += i\n    else:\n        u = 9\n    r = t  # slicing criterion\n";
        let out = rewrite(source, &[2, 3, 4, 7], 2, 7);
        assert_eq!(
            out,
            "def slice_me():\n    t = 0\n    for i in [1]:\n        t += i\n    r = t  # slicing criterion\n"
        );
    }

    #[test]
    fn nested_function_bodies_are_processed_but_the_def_survives() {
        let source = "def slice_me():\n    def helper():\n        t = 1\n        return t\n    r = 1  # slicing criterion\n";
        let out = rewrite(source, &[5], 2, 5);
        // the inner def is not deletable; its irrelevant statements are
        assert_eq!(
            out,
            "def slice_me():\n    def helper():\n        pass\n    r = 1  # slicing criterion\n"
        );
    }

    #[test]
    fn multi_line_statements_are_deleted_whole() {
        let source = "def slice_me():\n    x = 1\n    y = [\n        1,\n        2,\n    ]\n    r = x  # slicing criterion\n";
        let out = rewrite(source, &[2, 7], 2, 7);
        assert_eq!(out, "def slice_me():\n    x = 1\n    r = x  # slicing criterion\n");
    }

    #[test]
    fn negate_odd_ifs_wraps_only_odd_headers() {
        let source = "if a > 0:\n    x = 1\n\nif b:\n    y = 2\n";
        let out = negate_odd_ifs(source).unwrap();
        // line 1 is odd and gets wrapped, line 4 is even and stays put
        assert_eq!(out, "if not (a > 0):\n    x = 1\n\nif b:\n    y = 2\n");
    }

    #[test]
    fn negate_odd_ifs_covers_elif_headers() {
        let source = "if a:\n    pass\nelif b:\n    pass\n";
        let out = negate_odd_ifs(source).unwrap();
        // both headers start on odd lines
        assert_eq!(out, "if not (a):\n    pass\nelif not (b):\n    pass\n");
    }
}
