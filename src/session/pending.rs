use super::SessionAdapter;
use crate::error::{SessionError, SessionResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

type PollFn<T> = Box<dyn FnMut(Duration) -> Option<SessionResult<T>> + Send>;

/// A reply the prover has not necessarily produced yet.
///
/// Polling waits at most the given slice and yields `None` while the
/// reply is still outstanding.
pub struct Pending<T> {
    poll: PollFn<T>,
}

impl<T: Send + 'static> Pending<T> {
    /// A reply that is already available.
    pub fn ready(result: SessionResult<T>) -> Self {
        let mut slot = Some(result);
        Self::from_poll(move |_| slot.take())
    }

    pub fn from_poll<F>(poll: F) -> Self
    where
        F: FnMut(Duration) -> Option<SessionResult<T>> + Send + 'static,
    {
        Self {
            poll: Box::new(poll),
        }
    }

    /// A reply delivered later through the returned `Completer`. Dropping
    /// the completer without completing reads as a disconnect.
    pub fn channel() -> (Completer<T>, Pending<T>) {
        let (tx, rx) = mpsc::channel();
        (Completer { tx }, Pending::from_receiver(rx))
    }

    pub fn from_receiver(rx: Receiver<SessionResult<T>>) -> Self {
        Self::from_poll(move |slice| match rx.recv_timeout(slice) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(SessionError::Disconnected)),
        })
    }

    pub fn poll(&mut self, slice: Duration) -> Option<SessionResult<T>> {
        (self.poll)(slice)
    }
}

pub struct Completer<T> {
    tx: Sender<SessionResult<T>>,
}

impl<T> Completer<T> {
    pub fn complete(self, result: SessionResult<T>) {
        // The waiting side may already have given up.
        let _ = self.tx.send(result);
    }
}

/// User request to cut the in-flight prover command short.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    /// Clear the flag, reporting whether it was set.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::SeqCst)
    }
}

/// Block until `pending` resolves, polling every `slice`.
///
/// A raised interrupt is forwarded to the session and then waiting carries
/// on: the session still owes a final reply for the interrupted command.
pub fn wait<S, T>(
    session: &mut S,
    mut pending: Pending<T>,
    interrupt: &Interrupt,
    slice: Duration,
) -> SessionResult<T>
where
    S: SessionAdapter + ?Sized,
    T: Send + 'static,
{
    loop {
        if let Some(result) = pending.poll(slice) {
            return result;
        }
        if interrupt.take() {
            debug!("forwarding interrupt to prover");
            session.interrupt()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DispatchOptions, DispatchOutcome, RewindOutcome};
    use std::thread;

    #[derive(Default)]
    struct CountingSession {
        interrupts: usize,
    }

    impl SessionAdapter for CountingSession {
        fn dispatch(
            &mut self,
            _text: &str,
            _options: &DispatchOptions,
        ) -> SessionResult<Pending<DispatchOutcome>> {
            Ok(Pending::ready(Ok(DispatchOutcome::accepted(""))))
        }

        fn rewind(&mut self, _steps: usize) -> SessionResult<Pending<RewindOutcome>> {
            Ok(Pending::ready(Ok(RewindOutcome::exact())))
        }

        fn interrupt(&mut self) -> SessionResult<()> {
            self.interrupts += 1;
            Ok(())
        }
    }

    #[test]
    fn test_ready_resolves_immediately() {
        let mut session = CountingSession::default();
        let pending = Pending::ready(Ok(7));
        let value = wait(&mut session, pending, &Interrupt::new(), Duration::from_millis(1));
        assert_eq!(value.unwrap(), 7);
    }

    #[test]
    fn test_dropped_completer_is_a_disconnect() {
        let mut session = CountingSession::default();
        let (completer, pending) = Pending::<u32>::channel();
        drop(completer);
        let result = wait(&mut session, pending, &Interrupt::new(), Duration::from_millis(1));
        assert!(matches!(result, Err(SessionError::Disconnected)));
    }

    #[test]
    fn test_interrupt_is_forwarded_and_wait_continues() {
        let mut session = CountingSession::default();
        let interrupt = Interrupt::new();
        let (completer, pending) = Pending::<&'static str>::channel();

        interrupt.raise();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            completer.complete(Ok("interrupted"));
        });

        let result = wait(&mut session, pending, &interrupt, Duration::from_millis(5));
        handle.join().unwrap();

        assert_eq!(result.unwrap(), "interrupted");
        assert_eq!(session.interrupts, 1);
        assert!(!interrupt.is_raised());
    }
}
