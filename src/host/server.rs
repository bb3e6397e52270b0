use super::protocol::{read_message, write_message, HostMessage, HostMessageContent};
use crate::document::{Document, DocumentId};
use crate::error::{HostError, SessionResult};
use crate::parser::Position;
use crate::script::{Highlights, Registry, ScriptMachine, ScriptOptions, StepReport};
use crate::session::{Interrupt, SessionAdapter};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, error, info, warn};

/// Starts a prover session for a newly opened document.
pub type Launcher<S> = Box<dyn FnMut() -> SessionResult<S>>;

type HandlerResult = Result<Option<Value>, HostError>;

/// Shared writer side of the connection. Cloned into progress hooks so
/// events can go out while a long dispatch run is still in progress.
pub struct Outbox<W> {
    out: Arc<Mutex<W>>,
    seq: Arc<AtomicU64>,
}

impl<W> Clone for Outbox<W> {
    fn clone(&self) -> Self {
        Self {
            out: Arc::clone(&self.out),
            seq: Arc::clone(&self.seq),
        }
    }
}

impl<W: Write> Outbox<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn send_response(
        &self,
        request_seq: u64,
        command: &str,
        success: bool,
        message: Option<String>,
        body: Option<Value>,
    ) {
        self.send(HostMessage {
            seq: self.next_seq(),
            msg_type: "response".to_string(),
            content: HostMessageContent::Response {
                request_seq,
                success,
                command: command.to_string(),
                message,
                body,
            },
        });
    }

    pub fn send_event(&self, event: &str, body: Option<Value>) {
        self.send(HostMessage {
            seq: self.next_seq(),
            msg_type: "event".to_string(),
            content: HostMessageContent::Event {
                event: event.to_string(),
                body,
            },
        });
    }

    fn send(&self, msg: HostMessage) {
        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(err) = write_message(&mut *out, &msg) {
            error!(error = %err, seq = msg.seq, "failed to write message");
        }
    }

    /// The underlying writer, for inspection once the server is done.
    pub fn into_inner(self) -> Option<W> {
        Arc::try_unwrap(self.out)
            .ok()
            .and_then(|out| out.into_inner().ok())
    }
}

/// Read framed requests on a dedicated thread.
///
/// `interrupt` requests raise the flag here, before being queued, so they
/// reach a dispatch that is still running on the server thread.
pub fn spawn_reader<R>(mut input: R, interrupt: Interrupt) -> io::Result<Receiver<HostMessage>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("host-reader".to_string())
        .spawn(move || loop {
            match read_message(&mut input) {
                Ok(Some(msg)) => {
                    if msg.command() == Some("interrupt") {
                        debug!("interrupt requested");
                        interrupt.raise();
                    }
                    if tx.send(msg).is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("host closed its input");
                    break;
                }
                Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                    warn!(error = %err, "skipping malformed message");
                }
                Err(err) => {
                    error!(error = %err, "host input failed");
                    break;
                }
            }
        })?;
    Ok(rx)
}

#[derive(Debug, Deserialize)]
struct DocumentArgs {
    document: DocumentId,
}

#[derive(Debug, Deserialize)]
struct OpenArgs {
    document: DocumentId,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ChangeArgs {
    document: DocumentId,
    text: String,
    start: Option<Position>,
    end: Option<Position>,
}

#[derive(Debug, Deserialize)]
struct RewindArgs {
    document: DocumentId,
    #[serde(default = "one")]
    steps: usize,
}

#[derive(Debug, Deserialize)]
struct CursorArgs {
    document: DocumentId,
    position: Position,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    document: DocumentId,
    text: String,
}

fn one() -> usize {
    1
}

fn parse_args<T: for<'de> Deserialize<'de>>(arguments: Option<Value>) -> Result<T, HostError> {
    serde_json::from_value(arguments.unwrap_or(Value::Null))
        .map_err(|err| HostError::BadArguments(err.to_string()))
}

fn report_body(report: &StepReport) -> Value {
    json!({
        "accepted": report.accepted,
        "rewound": report.rewound,
        "messages": report.messages,
        "failure": report.failure.as_ref().map(|f| json!({
            "span": f.span,
            "message": f.message,
        })),
    })
}

fn highlight_body(document: &DocumentId, highlights: &Highlights, message: &str, status: &str) -> Value {
    json!({
        "document": document,
        "checked": highlights.checked,
        "pending": highlights.pending,
        "error": highlights.error,
        "message": message,
        "status": status,
    })
}

pub struct HostServer<S, W> {
    outbox: Outbox<W>,
    registry: Registry<S>,
    documents: HashMap<DocumentId, Document>,
    launcher: Launcher<S>,
}

impl<S, W> HostServer<S, W>
where
    S: SessionAdapter,
    W: Write + Send + 'static,
{
    pub fn new(out: W, options: ScriptOptions, launcher: Launcher<S>) -> Self {
        Self {
            outbox: Outbox::new(out),
            registry: Registry::new(options),
            documents: HashMap::new(),
            launcher,
        }
    }

    pub fn interrupt_handle(&self) -> Interrupt {
        self.registry.interrupt_handle()
    }

    /// Serve requests until `disconnect` or the input ends.
    pub fn run(&mut self, requests: Receiver<HostMessage>) {
        for msg in requests {
            let HostMessageContent::Request { command, arguments } = msg.content else {
                debug!(seq = msg.seq, "ignoring non-request message");
                continue;
            };
            if !self.handle(msg.seq, &command, arguments) {
                break;
            }
        }
        self.registry.close_all();
        info!("host session finished");
    }

    /// Serve one request. Returns `false` once the host has disconnected.
    pub fn handle(&mut self, seq: u64, command: &str, arguments: Option<Value>) -> bool {
        debug!(seq, command, "request");

        let result = match command {
            "initialize" => Ok(Some(json!({
                "supportsInterrupt": true,
                "supportsQuery": true,
                "supportsIncrementalChange": true,
            }))),
            "open" => self.handle_open(arguments),
            "change" => self.handle_change(arguments),
            "step" => self.handle_step(arguments),
            "rewind" => self.handle_rewind(arguments),
            "toCursor" => self.handle_to_cursor(arguments),
            "toTop" => self.handle_to_top(arguments),
            "query" => self.handle_query(arguments),
            "jumpToEnd" => self.handle_jump_to_end(arguments),
            // The reader thread raised the flag on arrival. Everything queued
            // ahead of this request has finished, so a raise nobody consumed
            // is stale now.
            "interrupt" => {
                self.registry.interrupt_handle().clear();
                Ok(None)
            }
            "close" => self.handle_close(arguments),
            "disconnect" => {
                self.outbox.send_response(seq, command, true, None, None);
                return false;
            }
            _ => {
                warn!(command, "unhandled command");
                Err(HostError::BadArguments(format!("unknown command `{}`", command)))
            }
        };

        match result {
            Ok(body) => self.outbox.send_response(seq, command, true, None, body),
            Err(err) => {
                warn!(seq, command, error = %err, "request failed");
                self.outbox
                    .send_response(seq, command, false, Some(err.to_string()), None);
            }
        }

        if command == "initialize" {
            self.outbox.send_event("initialized", None);
        }
        true
    }

    fn handle_open(&mut self, arguments: Option<Value>) -> HandlerResult {
        let args: OpenArgs = parse_args(arguments)?;
        let document = Document::new(args.document.clone(), &args.text);
        self.documents.insert(args.document.clone(), document);

        let outbox = self.outbox.clone();
        let id = args.document.clone();
        let machine = self.registry.open(&args.document);
        if !machine.is_running() {
            let session = (self.launcher)()?;
            machine.start(session);
            machine.set_progress_hook(Box::new(move |highlights: &Highlights| {
                outbox.send_event("highlight", Some(highlight_body(&id, highlights, "", "sending")));
            }));
        }

        self.publish(&args.document);
        Ok(None)
    }

    fn handle_change(&mut self, arguments: Option<Value>) -> HandlerResult {
        let args: ChangeArgs = parse_args(arguments)?;
        let document = self.document_mut(&args.document)?;
        match (args.start, args.end) {
            (Some(start), Some(end)) => document.replace(start, end, &args.text),
            (None, None) => document.set_text(&args.text),
            _ => {
                return Err(HostError::BadArguments(
                    "`start` and `end` must be given together".to_string(),
                ))
            }
        }
        Ok(Some(json!({ "revision": document.revision() })))
    }

    fn handle_step(&mut self, arguments: Option<Value>) -> HandlerResult {
        let args: DocumentArgs = parse_args(arguments)?;
        let report = self.with_machine(&args.document, |machine, doc| machine.step(doc))?;
        Ok(Some(report_body(&report)))
    }

    fn handle_rewind(&mut self, arguments: Option<Value>) -> HandlerResult {
        let args: RewindArgs = parse_args(arguments)?;
        let steps = args.steps;
        let rewound = self.with_machine(&args.document, |machine, doc| {
            machine.sync(doc)?;
            machine.rewind(steps)
        })?;
        Ok(Some(json!({ "rewound": rewound })))
    }

    fn handle_to_cursor(&mut self, arguments: Option<Value>) -> HandlerResult {
        let args: CursorArgs = parse_args(arguments)?;
        let position = args.position;
        let report =
            self.with_machine(&args.document, |machine, doc| machine.to_cursor(doc, position))?;
        Ok(Some(report_body(&report)))
    }

    fn handle_to_top(&mut self, arguments: Option<Value>) -> HandlerResult {
        let args: DocumentArgs = parse_args(arguments)?;
        let rewound = self.with_machine(&args.document, |machine, doc| {
            machine.sync(doc)?;
            machine.to_top()
        })?;
        Ok(Some(json!({ "rewound": rewound })))
    }

    fn handle_query(&mut self, arguments: Option<Value>) -> HandlerResult {
        let args: QueryArgs = parse_args(arguments)?;
        let text = args.text;
        let outcome = self.with_machine(&args.document, |machine, _| machine.query(&text))?;
        Ok(Some(json!({
            "success": outcome.success,
            "message": outcome.message,
        })))
    }

    fn handle_jump_to_end(&mut self, arguments: Option<Value>) -> HandlerResult {
        let args: DocumentArgs = parse_args(arguments)?;
        let machine = self
            .registry
            .get(&args.document)
            .ok_or_else(|| HostError::UnknownDocument(args.document.to_string()))?;
        Ok(Some(json!({ "position": machine.jump_to_end() })))
    }

    fn handle_close(&mut self, arguments: Option<Value>) -> HandlerResult {
        let args: DocumentArgs = parse_args(arguments)?;
        self.documents.remove(&args.document);
        if !self.registry.close(&args.document) {
            return Err(HostError::UnknownDocument(args.document.to_string()));
        }
        Ok(None)
    }

    fn document_mut(&mut self, id: &DocumentId) -> Result<&mut Document, HostError> {
        self.documents
            .get_mut(id)
            .ok_or_else(|| HostError::UnknownDocument(id.to_string()))
    }

    /// Run `op` against the document's machine and publish the new state.
    /// A session failure stops that document's prover.
    fn with_machine<T, F>(&mut self, id: &DocumentId, op: F) -> Result<T, HostError>
    where
        F: FnOnce(&mut ScriptMachine<S>, &Document) -> SessionResult<T>,
    {
        let document = self
            .documents
            .get(id)
            .ok_or_else(|| HostError::UnknownDocument(id.to_string()))?;
        let machine = self
            .registry
            .get_mut(id)
            .ok_or_else(|| HostError::UnknownDocument(id.to_string()))?;

        let result = op(machine, document);
        if let Err(err) = &result {
            error!(document = %id, error = %err, "prover session failed, stopping it");
            machine.stop();
        }
        let synced = machine.sync_point().cloned();
        if let (Some(cursor), Some(document)) = (synced, self.documents.get_mut(id)) {
            document.forget_until(&cursor);
        }
        self.publish(id);
        Ok(result?)
    }

    fn publish(&mut self, id: &DocumentId) {
        if let Some(machine) = self.registry.get_mut(id) {
            let status = machine.status();
            let highlights = machine.take_highlights();
            let body = highlight_body(id, &highlights, machine.info_message(), status.as_str());
            self.outbox.send_event("highlight", Some(body));
        }
    }
}
