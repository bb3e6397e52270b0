use super::{DispatchOptions, DispatchOutcome, Pending, RewindOutcome, SessionAdapter};
use crate::error::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use tracing::{debug, warn};

/// One request line written to the prover bridge.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    Dispatch {
        id: u64,
        text: &'a str,
        in_script: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<u64>,
    },
    Rewind {
        id: u64,
        steps: usize,
    },
    Interrupt,
}

/// One reply line read from the prover bridge.
#[derive(Debug, Deserialize)]
struct BridgeReply {
    id: u64,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    error_range: Option<(i64, i64)>,
    #[serde(default)]
    extra_steps: usize,
    #[serde(default)]
    error: Option<String>,
}

type Replies = Arc<Mutex<Receiver<SessionResult<BridgeReply>>>>;

/// Prover reached through a child process speaking newline-delimited JSON.
pub struct ProcessSession {
    child: Child,
    stdin: ChildStdin,
    replies: Replies,
    next_id: u64,
}

impl ProcessSession {
    pub fn spawn(command: &[String]) -> SessionResult<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SessionError::failed("empty prover command"))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SessionError::Spawn {
                command: command.join(" "),
                source,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionError::failed("prover stdin is not piped"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionError::failed("prover stdout is not piped"))?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("prover-reader".to_string())
            .spawn(move || read_replies(BufReader::new(stdout), tx))?;

        debug!(command = %command.join(" "), pid = child.id(), "prover started");

        Ok(Self {
            child,
            stdin,
            replies: Arc::new(Mutex::new(rx)),
            next_id: 0,
        })
    }

    fn send(&mut self, request: &BridgeRequest<'_>) -> SessionResult<()> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.flush()?;
        Ok(())
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Pending reply for request `id`. Replies to older requests (answered
    /// after their waiter gave up) are skipped.
    fn reply_for<T, F>(&self, id: u64, decode: F) -> Pending<T>
    where
        T: Send + 'static,
        F: Fn(BridgeReply) -> SessionResult<T> + Send + 'static,
    {
        let replies = Arc::clone(&self.replies);
        Pending::from_poll(move |slice| {
            let rx = match replies.lock() {
                Ok(rx) => rx,
                Err(_) => return Some(Err(SessionError::failed("prover reply channel poisoned"))),
            };
            match rx.recv_timeout(slice) {
                Ok(Ok(mut reply)) if reply.id == id => Some(match reply.error.take() {
                    Some(message) => Err(SessionError::failed(message)),
                    None => decode(reply),
                }),
                Ok(Ok(reply)) => {
                    warn!(expected = id, got = reply.id, "discarding stale prover reply");
                    None
                }
                Ok(Err(err)) => Some(Err(err)),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(Err(SessionError::Disconnected)),
            }
        })
    }
}

impl SessionAdapter for ProcessSession {
    fn dispatch(
        &mut self,
        text: &str,
        options: &DispatchOptions,
    ) -> SessionResult<Pending<DispatchOutcome>> {
        let id = self.next_id();
        self.send(&BridgeRequest::Dispatch {
            id,
            text,
            in_script: options.in_script,
            timeout: options.timeout.map(|t| t.as_secs()),
        })?;

        Ok(self.reply_for(id, |reply| {
            let error_range = reply
                .error_range
                .and_then(|(start, end)| DispatchOutcome::range_from_raw(start, end));
            Ok(DispatchOutcome {
                success: reply.success,
                message: reply.message,
                error_range,
            })
        }))
    }

    fn rewind(&mut self, steps: usize) -> SessionResult<Pending<RewindOutcome>> {
        let id = self.next_id();
        self.send(&BridgeRequest::Rewind { id, steps })?;

        Ok(self.reply_for(id, |reply| {
            Ok(RewindOutcome {
                success: reply.success,
                extra_steps: reply.extra_steps,
            })
        }))
    }

    fn interrupt(&mut self) -> SessionResult<()> {
        self.send(&BridgeRequest::Interrupt)
    }

    fn shutdown(&mut self) {
        if let Err(err) = self.child.kill() {
            debug!(error = %err, "prover already exited");
        }
        let _ = self.child.wait();
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.shutdown();
        }
    }
}

fn read_replies(mut stdout: BufReader<ChildStdout>, tx: Sender<SessionResult<BridgeReply>>) {
    let mut line = String::new();
    loop {
        line.clear();
        match stdout.read_line(&mut line) {
            Ok(0) => {
                debug!("prover closed its output");
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let reply = serde_json::from_str::<BridgeReply>(trimmed)
                    .map_err(|err| SessionError::protocol(format!("{}: {}", err, trimmed)));
                if tx.send(reply).is_err() {
                    break;
                }
            }
            Err(err) => {
                let _ = tx.send(Err(SessionError::Io(err)));
                break;
            }
        }
    }
}
