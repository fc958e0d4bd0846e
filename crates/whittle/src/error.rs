use std::{fmt, io};

use crate::location::{Iid, Location};

/// Error type for a slicing session, separating failures by pipeline stage.
///
/// Keeping parse/tracking/output failures distinct lets callers handle user
/// feedback and recovery policies accurately without string matching.
#[derive(Debug)]
pub enum SliceError {
    /// The source failed to parse under the Python grammar.
    Syntax { message: String, location: Location },
    /// A hook referenced a receiver variable with no definition record.
    ///
    /// This indicates instrumentation that fired out of order, or a binding
    /// established outside the target function (e.g. `global`). The run is
    /// aborted and no slice is produced.
    UnknownVariable { name: String, line: u32 },
    /// A hook carried an instruction id the facade never issued.
    UnknownIid(Iid),
    /// No comment in the module contains the criterion marker.
    CriterionNotFound { marker: String },
    /// Execution ended without ever entering the target function.
    TargetNotEntered { target: String },
    /// Writing the sliced file failed.
    Io(io::Error),
}

impl fmt::Display for SliceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { message, location } => {
                write!(f, "syntax error at {location:?}: {message}")
            }
            Self::UnknownVariable { name, line } => {
                write!(f, "line {line} references untracked variable '{name}'")
            }
            Self::UnknownIid(iid) => write!(f, "unknown instruction id {iid}"),
            Self::CriterionNotFound { marker } => {
                write!(f, "no comment containing '{marker}' found in the source")
            }
            Self::TargetNotEntered { target } => {
                write!(f, "execution ended without entering target function '{target}'")
            }
            Self::Io(error) => write!(f, "failed to write sliced file: {error}"),
        }
    }
}

impl std::error::Error for SliceError {}

impl From<io::Error> for SliceError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}
