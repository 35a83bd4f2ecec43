//! convoctl - CLI client for a conversation daemon
//!
//! Turns command-line arguments, piped input, and keyboard input into
//! outbound sends (messages, files) and account/conversation management
//! calls against a running convoctld instance. The process exit status is
//! the number of errors accumulated during the run.

use clap::Parser;

mod commands;
mod util;

use commands::Cli;

fn main() {
    let cli = Cli::parse();
    let code = commands::run(cli);
    std::process::exit(i32::from(code));
}
