/// Where a script stands with respect to the prover
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStatus {
    /// Nothing accepted, nothing queued.
    Idle,
    /// Sentences are queued and being dispatched.
    Sending,
    /// Queue drained; zero or more sentences accepted.
    Synced,
    /// Queue cleared by a rejected sentence whose error is still unread.
    Error,
}

impl ScriptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptStatus::Idle => "idle",
            ScriptStatus::Sending => "sending",
            ScriptStatus::Synced => "synced",
            ScriptStatus::Error => "error",
        }
    }
}
