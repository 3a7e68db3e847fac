//! Command implementations

pub mod diagnose;
pub mod remediate;

pub use diagnose::*;
pub use remediate::*;

use crate::error::KfError;

/// Process exit status of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Nothing blocking remains
    Success,
    /// Blocking findings remain, or remediation was only partly carried out
    Partial,
    /// The control plane could not be reached
    Unreachable,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Partial => 1,
            ExitStatus::Unreachable => 2,
        }
    }

    /// Exit status for a command that failed outright
    pub fn from_error(err: &KfError) -> Self {
        if err.is_fatal() {
            ExitStatus::Unreachable
        } else {
            ExitStatus::Partial
        }
    }
}
