//! Incremental checking of proof scripts against an interactive prover.
//!
//! The parser splits a script into sentences, a [`script::ScriptMachine`]
//! feeds them to a prover one at a time through a [`session::SessionAdapter`]
//! and keeps track of how far the prover has accepted the document, and the
//! host module exposes all of it over a framed JSON protocol on stdio.

pub mod config;
pub mod document;
pub mod error;
pub mod host;
pub mod parser;
pub mod script;
pub mod session;

pub use config::Config;
pub use document::{Document, DocumentId};
pub use error::{ConfigError, HostError, ScanError, SessionError};
pub use parser::{Position, Sentence, Span};
pub use script::{ScriptMachine, ScriptOptions, ScriptStatus};
pub use session::{DispatchOptions, DispatchOutcome, RewindOutcome, SessionAdapter};
