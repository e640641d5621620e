//! Runtime faults and scan errors
//!
//! Two tiers, matching PLC semantics. A [`RuntimeFault`] is the "set a
//! flag, continue" case: division by zero, a call to an unknown
//! function, a loop guard trip. Faults accumulate on the scan report
//! and never stop execution. A [`ScanError`] is fatal for the scan:
//! the interpreter found its own state inconsistent, the scan aborts,
//! and the scan counter does not advance.

use rung_core::ast::Span;
use serde::Serialize;

/// Non-fatal runtime fault, reported but never thrown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeFault {
    pub message: String,
    pub span: Option<Span>,
}

impl RuntimeFault {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        RuntimeFault {
            message: message.into(),
            span,
        }
    }
}

impl std::fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.span {
            Some(span) => write!(f, "fault at {}: {}", span, self.message),
            None => write!(f, "fault: {}", self.message),
        }
    }
}

/// Fatal scan failure
#[derive(Debug)]
pub enum ScanError {
    /// The store holds an instance whose shape contradicts the declared
    /// type (e.g. a counter where the registry says timer)
    InconsistentState(String),
    /// `strict` mode promoted runtime faults to an error
    Faulted(Vec<RuntimeFault>),
}

impl std::fmt::Display for ScanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanError::InconsistentState(message) => {
                write!(f, "inconsistent interpreter state: {}", message)
            }
            ScanError::Faulted(faults) => {
                write!(f, "scan faulted ({} fault(s))", faults.len())?;
                for fault in faults {
                    write!(f, "\n  {}", fault)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ScanError {}
