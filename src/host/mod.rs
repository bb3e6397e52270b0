mod protocol;
mod server;

pub use protocol::{read_message, write_message, HostMessage, HostMessageContent};
pub use server::{spawn_reader, HostServer, Launcher, Outbox};

use crate::config::Config;
use crate::session::ProcessSession;
use std::error::Error;
use std::io;
use tracing::info;

/// Serve the host protocol on stdio, one prover bridge per open document.
pub fn run_host_mode(config: &Config) -> Result<(), Box<dyn Error>> {
    let command = config.prover_command()?;
    info!(prover = %command.join(" "), "host mode starting");

    let launcher: Launcher<ProcessSession> = Box::new(move || ProcessSession::spawn(&command));
    let mut server = HostServer::new(io::stdout(), config.script_options(), launcher);

    let requests = spawn_reader(io::BufReader::new(io::stdin()), server.interrupt_handle())?;
    server.run(requests);
    Ok(())
}
