mod machine;
mod registry;
mod state;

pub use machine::{
    DispatchFailure, Highlights, ProgressHook, ScriptMachine, ScriptOptions, StepReport,
};
pub use registry::Registry;
pub use state::ScriptStatus;
