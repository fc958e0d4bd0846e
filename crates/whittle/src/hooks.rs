//! Instrumentation callback surface.
//!
//! The slicer does not execute Python itself: an external instrumentation
//! runtime runs the program and reports events through the
//! [`ExecutionTracer`] trait. Hook invocations are serialized in program
//! execution order; each handler runs to completion before the next begins.
//!
//! Every hook carries the [`Iid`] of the node it fired on, using the
//! numbering of the session's [`SourceModule`](crate::SourceModule):
//!
//! - reads carry the iid of the innermost *registered* node, so an
//!   assignment whose right-hand side is a literal reports its read at the
//!   assignment's own iid;
//! - writes and augmented writes carry the assignment statement's iid;
//! - attribute and subscript reads carry the access expression's iid;
//! - scope hooks carry the `if`/`elif`/`for`/`while` header's iid, firing on
//!   every evaluation of the header condition and on scope completion.
//!
//! Runtimes that cannot call into the tracer directly can record
//! [`TraceEvent`]s (serde-serializable, e.g. as a JSON list) and feed them
//! through [`replay`].

use crate::{error::SliceError, location::Iid};

/// Trait for consumers of instrumentation callbacks.
///
/// All methods have default implementations that ignore the event, so
/// partial consumers only override the hooks they care about. Handlers
/// return `Err` only for fatal programmer-errors; the driver is expected to
/// abort the run on the first error.
pub trait ExecutionTracer {
    /// A function body was entered.
    fn on_function_enter(&mut self, _iid: Iid, _name: &str, _is_lambda: bool) -> Result<(), SliceError> {
        Ok(())
    }

    /// A variable or compound expression was read.
    fn on_read(&mut self, _iid: Iid) -> Result<(), SliceError> {
        Ok(())
    }

    /// A top-level assignment completed. `value_type` is the runtime type
    /// tag of the assigned value (e.g. `"list"`).
    fn on_write(&mut self, _iid: Iid, _value_type: &str) -> Result<(), SliceError> {
        Ok(())
    }

    /// An in-place update (`x op= e`) completed.
    fn on_augmented_write(&mut self, _iid: Iid, _op: &str) -> Result<(), SliceError> {
        Ok(())
    }

    /// An attribute was read from a receiver. `value_type` is the runtime
    /// type tag of the resulting value; `"method"` marks a bound method.
    fn on_attribute_read(&mut self, _iid: Iid, _attr: &str, _value_type: &str) -> Result<(), SliceError> {
        Ok(())
    }

    /// An indexed access was read. `key` is the runtime index rendered to
    /// text.
    fn on_subscript_read(&mut self, _iid: Iid, _key: &str) -> Result<(), SliceError> {
        Ok(())
    }

    /// An `if`/`elif` header condition was evaluated.
    fn on_enter_if(&mut self, _iid: Iid, _value: bool) -> Result<(), SliceError> {
        Ok(())
    }

    /// The conditional at `iid` completed.
    fn on_exit_if(&mut self, _iid: Iid) -> Result<(), SliceError> {
        Ok(())
    }

    /// A `for` loop started or advanced an iteration.
    fn on_enter_for(&mut self, _iid: Iid) -> Result<(), SliceError> {
        Ok(())
    }

    /// The `for` loop at `iid` completed.
    fn on_exit_for(&mut self, _iid: Iid) -> Result<(), SliceError> {
        Ok(())
    }

    /// A `while` header condition was evaluated.
    fn on_enter_while(&mut self, _iid: Iid, _value: bool) -> Result<(), SliceError> {
        Ok(())
    }

    /// The `while` loop at `iid` completed.
    fn on_exit_while(&mut self, _iid: Iid) -> Result<(), SliceError> {
        Ok(())
    }

    /// The instrumented program terminated.
    fn on_end_execution(&mut self) -> Result<(), SliceError> {
        Ok(())
    }
}

/// One recorded instrumentation callback.
///
/// The serialized form is a tagged object, so a JSON trace file is a plain
/// list like `[{"event": "read", "iid": 12}, ...]`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    FunctionEnter {
        iid: Iid,
        name: String,
        #[serde(default)]
        is_lambda: bool,
    },
    Read {
        iid: Iid,
    },
    Write {
        iid: Iid,
        value_type: String,
    },
    AugmentedWrite {
        iid: Iid,
        #[serde(default)]
        op: String,
    },
    AttributeRead {
        iid: Iid,
        attr: String,
        value_type: String,
    },
    SubscriptRead {
        iid: Iid,
        key: String,
    },
    EnterIf {
        iid: Iid,
        value: bool,
    },
    ExitIf {
        iid: Iid,
    },
    EnterFor {
        iid: Iid,
    },
    ExitFor {
        iid: Iid,
    },
    EnterWhile {
        iid: Iid,
        value: bool,
    },
    ExitWhile {
        iid: Iid,
    },
    EndExecution,
}

/// Feeds a recorded event stream to a tracer, stopping at the first error.
pub fn replay<T: ExecutionTracer>(events: &[TraceEvent], tracer: &mut T) -> Result<(), SliceError> {
    for event in events {
        match event {
            TraceEvent::FunctionEnter { iid, name, is_lambda } => {
                tracer.on_function_enter(*iid, name, *is_lambda)?;
            }
            TraceEvent::Read { iid } => tracer.on_read(*iid)?,
            TraceEvent::Write { iid, value_type } => tracer.on_write(*iid, value_type)?,
            TraceEvent::AugmentedWrite { iid, op } => tracer.on_augmented_write(*iid, op)?,
            TraceEvent::AttributeRead { iid, attr, value_type } => {
                tracer.on_attribute_read(*iid, attr, value_type)?;
            }
            TraceEvent::SubscriptRead { iid, key } => tracer.on_subscript_read(*iid, key)?,
            TraceEvent::EnterIf { iid, value } => tracer.on_enter_if(*iid, *value)?,
            TraceEvent::ExitIf { iid } => tracer.on_exit_if(*iid)?,
            TraceEvent::EnterFor { iid } => tracer.on_enter_for(*iid)?,
            TraceEvent::ExitFor { iid } => tracer.on_exit_for(*iid)?,
            TraceEvent::EnterWhile { iid, value } => tracer.on_enter_while(*iid, *value)?,
            TraceEvent::ExitWhile { iid } => tracer.on_exit_while(*iid)?,
            TraceEvent::EndExecution => tracer.on_end_execution()?,
        }
    }
    Ok(())
}
