// Shared helpers for the integration tests.
#![allow(dead_code)]

use proof_stepper::error::{SessionError, SessionResult};
use proof_stepper::session::{Completer, Pending};
use proof_stepper::{
    DispatchOptions, DispatchOutcome, Document, DocumentId, RewindOutcome, ScriptMachine,
    ScriptOptions, SessionAdapter,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Everything the fake prover was asked to do.
#[derive(Debug, Default)]
pub struct ProverLog {
    pub sent: Vec<String>,
    pub queries: Vec<String>,
    pub rewinds: Vec<usize>,
    pub interrupts: usize,
}

/// Reject any sentence containing `needle`.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub needle: String,
    pub message: String,
    pub range: Option<(usize, usize)>,
}

/// A prover stand-in driven by simple rules.
///
/// Sentences containing `hang` never get a reply until interrupted, which
/// then answers with a rejection.
#[derive(Default)]
pub struct ScriptedSession {
    pub log: Arc<Mutex<ProverLog>>,
    rejections: Vec<Rejection>,
    extra_steps: usize,
    refuse_rewind: bool,
    broken: bool,
    hung: Option<Completer<DispatchOutcome>>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(mut self, needle: &str, message: &str, range: Option<(usize, usize)>) -> Self {
        self.rejections.push(Rejection {
            needle: needle.to_string(),
            message: message.to_string(),
            range,
        });
        self
    }

    /// Every rewind undoes this many more steps than asked.
    pub fn with_extra_steps(mut self, extra: usize) -> Self {
        self.extra_steps = extra;
        self
    }

    pub fn refusing_rewind(mut self) -> Self {
        self.refuse_rewind = true;
        self
    }

    /// Every request fails as if the prover process had died.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub fn log_handle(&self) -> Arc<Mutex<ProverLog>> {
        Arc::clone(&self.log)
    }
}

impl SessionAdapter for ScriptedSession {
    fn dispatch(
        &mut self,
        text: &str,
        options: &DispatchOptions,
    ) -> SessionResult<Pending<DispatchOutcome>> {
        if self.broken {
            return Err(SessionError::Disconnected);
        }
        {
            let mut log = self.log.lock().unwrap();
            if options.in_script {
                log.sent.push(text.to_string());
            } else {
                log.queries.push(text.to_string());
            }
        }

        if text.contains("hang") {
            let (completer, pending) = Pending::channel();
            self.hung = Some(completer);
            return Ok(pending);
        }

        let outcome = self
            .rejections
            .iter()
            .find(|rule| text.contains(&rule.needle))
            .map(|rule| DispatchOutcome::rejected(rule.message.clone(), rule.range))
            .unwrap_or_else(|| {
                if options.in_script {
                    DispatchOutcome::accepted("")
                } else {
                    DispatchOutcome::accepted(format!("answer to {}", text.trim()))
                }
            });
        Ok(Pending::ready(Ok(outcome)))
    }

    fn rewind(&mut self, steps: usize) -> SessionResult<Pending<RewindOutcome>> {
        if self.broken {
            return Err(SessionError::Disconnected);
        }
        self.log.lock().unwrap().rewinds.push(steps);
        let outcome = if self.refuse_rewind {
            RewindOutcome {
                success: false,
                extra_steps: 0,
            }
        } else {
            RewindOutcome::with_extra(self.extra_steps)
        };
        Ok(Pending::ready(Ok(outcome)))
    }

    fn interrupt(&mut self) -> SessionResult<()> {
        self.log.lock().unwrap().interrupts += 1;
        if let Some(completer) = self.hung.take() {
            completer.complete(Ok(DispatchOutcome::rejected("User interrupt.", None)));
        }
        Ok(())
    }
}

pub fn fast_options() -> ScriptOptions {
    ScriptOptions {
        timeout: None,
        poll_interval: Duration::from_millis(2),
    }
}

pub fn machine_with(session: ScriptedSession) -> ScriptMachine<ScriptedSession> {
    ScriptMachine::with_session(session, fast_options())
}

pub fn doc(text: &str) -> Document {
    Document::new(DocumentId::new("Test.v"), text)
}
