use std::fmt;

/// Opaque instruction id issued by the syntax facade.
///
/// Every registered node of the parsed module gets one; the instrumentation
/// runtime passes it back with each callback so the engine can recover the
/// node's source position and shape.
pub type Iid = u32;

/// Source position of a registered node.
///
/// Lines are 1-based, columns are 0-based byte offsets within their line.
/// Ranges are half-open in the column direction: `end_column` points one past
/// the last byte of the node on `end_line`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Location {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Location {
    #[must_use]
    pub const fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Whether the node starts and ends on the same source line.
    #[must_use]
    pub fn is_single_line(&self) -> bool {
        self.start_line == self.end_line
    }
}

/// Custom Debug implementation to keep dumps of the iid registry readable.
impl fmt::Debug for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}
