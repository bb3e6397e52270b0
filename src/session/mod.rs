mod pending;
mod process;

pub use pending::{wait, Completer, Interrupt, Pending};
pub use process::ProcessSession;

use crate::error::SessionResult;
use std::time::Duration;

/// How a sentence is sent to the prover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// `false` for queries that must not become part of the proof script.
    pub in_script: bool,
    /// Handed to the session's transport; the engine itself never times out.
    pub timeout: Option<Duration>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            in_script: true,
            timeout: None,
        }
    }
}

/// Prover verdict on one dispatched sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub success: bool,
    pub message: String,
    /// Offsets into the dispatched (comment-stripped) text; `None` when the
    /// prover did not point at a specific location.
    pub error_range: Option<(usize, usize)>,
}

impl DispatchOutcome {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            error_range: None,
        }
    }

    pub fn rejected(message: impl Into<String>, error_range: Option<(usize, usize)>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error_range,
        }
    }

    /// Convert a wire-level range where `(-1, -1)` means "no location".
    pub fn range_from_raw(start: i64, end: i64) -> Option<(usize, usize)> {
        match (usize::try_from(start), usize::try_from(end)) {
            (Ok(start), Ok(end)) => Some((start, end)),
            _ => None,
        }
    }
}

/// Prover reply to a rewind request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewindOutcome {
    pub success: bool,
    /// Steps undone beyond the requested count.
    pub extra_steps: usize,
}

impl RewindOutcome {
    pub fn exact() -> Self {
        Self {
            success: true,
            extra_steps: 0,
        }
    }

    pub fn with_extra(extra_steps: usize) -> Self {
        Self {
            success: true,
            extra_steps,
        }
    }
}

/// An asynchronous prover session.
///
/// `dispatch` and `rewind` only start the work; the returned `Pending`
/// resolves once the prover has answered. `interrupt` asks the prover to
/// abandon whatever it is running, which still ends in a reply.
pub trait SessionAdapter {
    fn dispatch(
        &mut self,
        text: &str,
        options: &DispatchOptions,
    ) -> SessionResult<Pending<DispatchOutcome>>;

    fn rewind(&mut self, steps: usize) -> SessionResult<Pending<RewindOutcome>>;

    fn interrupt(&mut self) -> SessionResult<()>;

    /// Release the prover. Called once when the owning script is stopped.
    fn shutdown(&mut self) {}
}

impl<S: SessionAdapter + ?Sized> SessionAdapter for Box<S> {
    fn dispatch(
        &mut self,
        text: &str,
        options: &DispatchOptions,
    ) -> SessionResult<Pending<DispatchOutcome>> {
        (**self).dispatch(text, options)
    }

    fn rewind(&mut self, steps: usize) -> SessionResult<Pending<RewindOutcome>> {
        (**self).rewind(steps)
    }

    fn interrupt(&mut self) -> SessionResult<()> {
        (**self).interrupt()
    }

    fn shutdown(&mut self) {
        (**self).shutdown()
    }
}
