use super::ScriptStatus;
use crate::document::{Document, SyncCursor};
use crate::error::{SessionError, SessionResult};
use crate::parser::{error_span, read_sentence, strip_comments, Position, Sentence, Span};
use crate::session::{
    wait, DispatchOptions, DispatchOutcome, Interrupt, RewindOutcome, SessionAdapter,
};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Knobs passed down to every dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptOptions {
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// A sentence the prover rejected, located in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    pub span: Span,
    pub message: String,
}

/// What one step/toCursor/rewind call did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub accepted: usize,
    pub rewound: usize,
    pub messages: Vec<String>,
    pub failure: Option<DispatchFailure>,
}

/// Regions for the host to paint. All spans include their stop character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Highlights {
    pub checked: Option<Span>,
    pub pending: Option<Span>,
    pub error: Option<Span>,
}

pub type ProgressHook = Box<dyn FnMut(&Highlights) + Send>;

/// Tracks how much of one script document the prover has accepted.
pub struct ScriptMachine<S> {
    session: Option<S>,
    endpoints: Vec<Position>,
    send_queue: VecDeque<Sentence>,
    error_at: Option<Span>,
    saved_sync: Option<SyncCursor>,
    info_msg: String,
    interrupt: Interrupt,
    options: ScriptOptions,
    progress: Option<ProgressHook>,
}

impl<S: SessionAdapter> ScriptMachine<S> {
    pub fn new(options: ScriptOptions) -> Self {
        Self {
            session: None,
            endpoints: Vec::new(),
            send_queue: VecDeque::new(),
            error_at: None,
            saved_sync: None,
            info_msg: String::new(),
            interrupt: Interrupt::new(),
            options,
            progress: None,
        }
    }

    pub fn with_session(session: S, options: ScriptOptions) -> Self {
        let mut machine = Self::new(options);
        machine.session = Some(session);
        machine
    }

    /// Share an interrupt flag with whoever fields user cancellation.
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn set_progress_hook(&mut self, hook: ProgressHook) {
        self.progress = Some(hook);
    }

    /// Attach a fresh session, replacing (and shutting down) any current one.
    pub fn start(&mut self, session: S) {
        self.stop();
        self.session = Some(session);
        info!("prover session attached");
    }

    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.shutdown();
            info!("prover session stopped");
        }
        self.reset();
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&S> {
        self.session.as_ref()
    }

    pub fn interrupt_handle(&self) -> Interrupt {
        self.interrupt.clone()
    }

    pub fn status(&self) -> ScriptStatus {
        if !self.send_queue.is_empty() {
            ScriptStatus::Sending
        } else if self.error_at.is_some() {
            ScriptStatus::Error
        } else if self.endpoints.is_empty() {
            ScriptStatus::Idle
        } else {
            ScriptStatus::Synced
        }
    }

    pub fn endpoints(&self) -> &[Position] {
        &self.endpoints
    }

    pub fn pending(&self) -> impl Iterator<Item = &Sentence> {
        self.send_queue.iter()
    }

    /// Document revision the machine last synced against.
    pub fn sync_point(&self) -> Option<&SyncCursor> {
        self.saved_sync.as_ref()
    }

    pub fn error_region(&self) -> Option<Span> {
        self.error_at
    }

    /// Messages from the most recent dispatch run or query.
    pub fn info_message(&self) -> &str {
        &self.info_msg
    }

    /// End of the accepted region, or the document start.
    pub fn jump_to_end(&self) -> Position {
        self.endpoints.last().copied().unwrap_or_default()
    }

    /// Current regions without consuming the error.
    pub fn snapshot(&self) -> Highlights {
        let checked = self.endpoints.last().map(|end| {
            let stop = Position::new(end.line, end.column.saturating_sub(1));
            Span::new(Position::default(), stop)
        });
        let pending = self.send_queue.front().map(|next| {
            let start = self.jump_to_end().min(next.span.start);
            Span::new(start, next.span.stop)
        });
        Highlights {
            checked,
            pending,
            error: self.error_at,
        }
    }

    /// Current regions; the error region is handed over only once.
    pub fn take_highlights(&mut self) -> Highlights {
        let highlights = self.snapshot();
        self.error_at = None;
        highlights
    }

    /// Bring the machine in line with `doc`: a different document resets
    /// everything, an edit inside the accepted region rewinds past it.
    pub fn sync(&mut self, doc: &Document) -> SessionResult<()> {
        let current = doc.sync_cursor();
        let changed = self
            .saved_sync
            .as_ref()
            .filter(|saved| saved.same_document(&current))
            .map(|saved| doc.changed_since(saved));

        match changed {
            None => {
                if !self.endpoints.is_empty() {
                    debug!(document = %doc.id(), "document replaced, discarding accepted sentences");
                    self.rewind(self.endpoints.len())?;
                }
                self.reset();
            }
            Some(Some(at)) => {
                debug!(document = %doc.id(), line = at.line, column = at.column, "document edited");
                self.rewind_to(at)?;
            }
            Some(None) => {}
        }

        self.saved_sync = Some(current);
        Ok(())
    }

    /// Send the next sentence after the accepted region.
    pub fn step(&mut self, doc: &Document) -> SessionResult<StepReport> {
        self.sync(doc)?;

        let Some(sentence) = self.scan(doc, self.jump_to_end()) else {
            return Ok(StepReport::default());
        };
        self.send_queue.push_back(sentence);
        self.send_until_fail()
    }

    /// Rewind the last `steps` accepted sentences. Returns how many
    /// endpoints were discarded, which may exceed `steps` when the prover
    /// had to undo more to keep the proof structure intact.
    pub fn rewind(&mut self, steps: usize) -> SessionResult<usize> {
        let steps = steps.min(self.endpoints.len());
        if steps == 0 {
            return Ok(0);
        }

        let outcome = self.wait_rewind(steps)?;
        if !outcome.success {
            warn!(steps, "prover refused to rewind");
            return Ok(0);
        }

        let undone = (steps + outcome.extra_steps).min(self.endpoints.len());
        self.endpoints.truncate(self.endpoints.len() - undone);
        debug!(steps, extra = outcome.extra_steps, remaining = self.endpoints.len(), "rewound");
        Ok(undone)
    }

    /// Discard every accepted sentence whose endpoint is at or after `target`.
    pub fn rewind_to(&mut self, target: Position) -> SessionResult<usize> {
        let steps = self.endpoints.iter().filter(|&&end| end >= target).count();
        self.rewind(steps)
    }

    pub fn to_top(&mut self) -> SessionResult<usize> {
        self.rewind_to(Position::default())
    }

    /// Accept exactly the sentences that end at or before `cursor`.
    pub fn to_cursor(&mut self, doc: &Document, cursor: Position) -> SessionResult<StepReport> {
        self.sync(doc)?;

        if cursor < self.jump_to_end() {
            // Keep a sentence whose terminator sits under the cursor.
            let target = Position::new(cursor.line, cursor.column.saturating_add(2));
            let rewound = self.rewind_to(target)?;
            return Ok(StepReport {
                rewound,
                ..StepReport::default()
            });
        }

        let mut after = self.jump_to_end();
        while let Some(sentence) = self.scan(doc, after) {
            if sentence.span.stop > cursor {
                break;
            }
            after = sentence.span.stop.next_column();
            self.send_queue.push_back(sentence);
        }

        self.send_until_fail()
    }

    /// Run a command outside the script (e.g. `Check foo.`).
    pub fn query(&mut self, text: &str) -> SessionResult<DispatchOutcome> {
        let stripped = strip_comments(text);
        let options = DispatchOptions {
            in_script: false,
            timeout: self.options.timeout,
        };
        let outcome = self.wait_dispatch(&stripped.text, options)?;
        self.info_msg = outcome.message.clone();
        Ok(outcome)
    }

    /// Dispatch queued sentences in order until one is rejected.
    pub fn send_until_fail(&mut self) -> SessionResult<StepReport> {
        let mut report = StepReport::default();

        while !self.send_queue.is_empty() {
            self.error_at = None;
            self.report_progress();

            let Some(sentence) = self.send_queue.pop_front() else {
                break;
            };
            let stripped = strip_comments(&sentence.text);
            let options = DispatchOptions {
                in_script: true,
                timeout: self.options.timeout,
            };

            let outcome = match self.wait_dispatch(&stripped.text, options) {
                Ok(outcome) => outcome,
                Err(err) => {
                    self.send_queue.clear();
                    return Err(err);
                }
            };

            if outcome.success {
                self.endpoints.push(sentence.span.stop.next_column());
                report.accepted += 1;
            } else {
                self.send_queue.clear();
                let span = match outcome.error_range {
                    Some(range) => error_span(
                        sentence.span.start,
                        &sentence.text,
                        range,
                        &stripped.comments,
                    ),
                    None => sentence.span,
                };
                warn!(
                    line = span.start.line,
                    column = span.start.column,
                    message = %outcome.message,
                    "sentence rejected"
                );
                self.error_at = Some(span);
                report.failure = Some(DispatchFailure {
                    span,
                    message: outcome.message.clone(),
                });
            }
            report.messages.push(outcome.message);
        }

        self.info_msg = report
            .messages
            .iter()
            .filter(|msg| !msg.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(report)
    }

    fn scan(&self, doc: &Document, after: Position) -> Option<Sentence> {
        match read_sentence(doc.lines(), after) {
            Ok(sentence) => sentence,
            Err(err) => {
                debug!(document = %doc.id(), error = %err, "scanning stopped");
                None
            }
        }
    }

    fn report_progress(&mut self) {
        let highlights = self.snapshot();
        if let Some(hook) = self.progress.as_mut() {
            hook(&highlights);
        }
    }

    fn wait_dispatch(
        &mut self,
        text: &str,
        options: DispatchOptions,
    ) -> SessionResult<DispatchOutcome> {
        let session = self.session.as_mut().ok_or(SessionError::NotRunning)?;
        let pending = session.dispatch(text, &options)?;
        wait(session, pending, &self.interrupt, self.options.poll_interval)
    }

    fn wait_rewind(&mut self, steps: usize) -> SessionResult<RewindOutcome> {
        let session = self.session.as_mut().ok_or(SessionError::NotRunning)?;
        let pending = session.rewind(steps)?;
        wait(session, pending, &self.interrupt, self.options.poll_interval)
    }

    fn reset(&mut self) {
        self.endpoints.clear();
        self.send_queue.clear();
        self.error_at = None;
        self.saved_sync = None;
        self.info_msg.clear();
    }
}
