//! CLI argument surface and action routing.
//!
//! Actions run in a fixed order: account management, then
//! conversation/get actions, then send, then listen. A failure inside one
//! group is logged and counted but never prevents later groups from
//! running; only argument-validation errors abort the whole run before any
//! action.

use std::io::IsTerminal;

use clap::Parser;
use tracing::{debug, error, info, warn};

use convoctl_core::controller::DaemonController;
use convoctl_core::format::FormatMode;
use convoctl_core::dispatch::SendPlan;
use convoctl_core::input::{self, FileArg};
use convoctl_core::{RunContext, Tally, logging};

use crate::util::output::OutputFormat;

mod account;
mod conversation;
mod listen;
mod send;

/// convoctl - CLI client for a conversation daemon
#[derive(Parser, Debug)]
#[command(
    name = "convoctl",
    version,
    about = "CLI client for a conversation daemon",
    long_about = "Send messages and files to conversations, and manage accounts, \
                  conversations, and members through a running convoctld daemon."
)]
pub struct Cli {
    /// Connect to and use the specified account id
    #[arg(short = 'a', long, value_name = "ACCOUNTID")]
    pub account: Option<String>,

    /// Target conversation ids for send and conversation actions
    #[arg(short = 'c', long = "conversations", num_args = 1.., value_name = "ID")]
    pub conversations: Vec<String>,

    /// Send one or more text messages. '-' reads the whole stdin pipe as
    /// one message, '_' streams the pipe line by line; '\-' and '\_' send
    /// the literal characters
    #[arg(short = 'm', long = "message", num_args = 1.., value_name = "TEXT")]
    pub message: Vec<String>,

    /// Send one or more files. '-' sends the stdin pipe as a file
    #[arg(short = 'f', long = "file", num_args = 1.., value_name = "FILE")]
    pub file: Vec<String>,

    /// Split every message on this separator before sending
    /// (escapes \t, \n, and \\ are decoded)
    #[arg(long, value_name = "SEPARATOR")]
    pub split: Option<String>,

    /// Wrap messages in a fenced code block
    #[arg(long)]
    pub code: bool,

    /// Convert messages from Markdown to HTML
    #[arg(long)]
    pub markdown: bool,

    /// Send messages as HTML, unchanged
    #[arg(long)]
    pub html: bool,

    /// Expand :shortcode: emoji tokens in messages
    #[arg(long)]
    pub emojize: bool,

    /// Create an account from ALIAS HOST USER PASS and print its id
    #[arg(long = "add-account", num_args = 4, value_names = ["ALIAS", "HOST", "USER", "PASS"])]
    pub add_account: Option<Vec<String>>,

    /// Remove one or more accounts by id
    #[arg(long = "remove-account", num_args = 1.., value_name = "ACCOUNTID")]
    pub remove_account: Vec<String>,

    /// List all enabled account ids
    #[arg(long = "get-enabled-accounts")]
    pub get_enabled_accounts: bool,

    /// Start a new conversation on the active account and print its id
    #[arg(long = "add-conversation")]
    pub add_conversation: bool,

    /// Remove the conversations named with --conversations
    #[arg(long = "remove-conversation")]
    pub remove_conversation: bool,

    /// List all conversations of the active account
    #[arg(long = "get-conversations")]
    pub get_conversations: bool,

    /// Add members by uri to the conversations named with --conversations
    #[arg(long = "add-conversation-member", num_args = 1.., value_name = "URI")]
    pub add_conversation_member: Vec<String>,

    /// Remove members by uri from the conversations named with --conversations
    #[arg(long = "remove-conversation-member", num_args = 1.., value_name = "URI")]
    pub remove_conversation_member: Vec<String>,

    /// List members of the conversations named with --conversations
    #[arg(long = "get-conversation-members")]
    pub get_conversation_members: bool,

    /// Listen for incoming messages (not yet implemented)
    #[arg(long)]
    pub listen: bool,

    /// Output format for get-class actions
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Print debug information (once: this program; twice: everything).
    /// Takes precedence over --log-level
    #[arg(short = 'd', long = "debug", action = clap::ArgAction::Count)]
    pub debug: u8,

    /// Set the log level(s): first value for this program, optional second
    /// for everything (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long = "log-level", num_args = 1..=2, value_name = "LEVEL")]
    pub log_level: Vec<String>,
}

/// Which action groups are active, derived once from the parsed arguments.
#[derive(Debug, Clone, Copy, Default)]
struct RunFlags {
    account_mgmt: bool,
    conversation: bool,
    get: bool,
    send: bool,
    listen: bool,
}

impl RunFlags {
    /// Derive the flags from the arguments. One strictly additive step:
    /// when no action at all was requested but stdin carries piped data
    /// (or target conversations were named), the send action is enabled so
    /// the pipe or a keyboard prompt can supply the message. A bare
    /// interactive invocation performs no action at all.
    fn derive(cli: &Cli, stdin_piped: bool) -> Self {
        let account_mgmt = cli.add_account.is_some()
            || !cli.remove_account.is_empty()
            || cli.get_enabled_accounts;
        let conversation = cli.add_conversation
            || cli.remove_conversation
            || !cli.add_conversation_member.is_empty()
            || !cli.remove_conversation_member.is_empty();
        let get = cli.get_conversations || cli.get_conversation_members;
        let mut send = !cli.message.is_empty() || !cli.file.is_empty();
        let listen = cli.listen;

        let no_action = !send && !account_mgmt && !conversation && !get && !listen;
        if no_action && (stdin_piped || !cli.conversations.is_empty()) {
            send = true;
        }

        Self {
            account_mgmt,
            conversation,
            get,
            send,
            listen,
        }
    }

    fn non_send_pending(&self) -> bool {
        self.account_mgmt || self.conversation || self.get || self.listen
    }
}

/// Execute the whole run. Returns the process exit code, which equals the
/// accumulated error count.
pub fn run(cli: Cli) -> u8 {
    let mut tally = Tally::new();

    let env_level = std::env::var("CONVOCTL_LOG").ok();
    let log_cfg = match logging::filter_directive(cli.debug, &cli.log_level, env_level.as_deref())
    {
        Ok(cfg) => cfg,
        Err(e) => {
            logging::init("info");
            error!("{e}");
            tally.error();
            info!("{}", tally.summary());
            return tally.exit_code();
        }
    };
    logging::init(&log_cfg.directive);
    if log_cfg.debug_overrode_level {
        warn!("W111: debug option -d overrode option --log-level");
        tally.warning();
    }

    let messages = input::tokenize_messages(&cli.message);
    let files = input::tokenize_files(&cli.file);

    // Argument validation: any failure here aborts with zero partial
    // effects, nothing has been sent.
    if let Err(e) = input::validate_stdin_claims(&messages, &files) {
        return abort_early(&e.to_string(), tally);
    }
    if let Err(msg) = check_files_readable(&files) {
        return abort_early(&msg, tally);
    }

    let flags = RunFlags::derive(&cli, !std::io::stdin().is_terminal());
    debug!(?flags, "run state derived from arguments");

    let ctrl = DaemonController::from_env();
    let mut ctx = RunContext::new(&ctrl, cli.account.clone());
    ctx.tally = tally;

    if flags.account_mgmt {
        account::execute(&cli, &mut ctx);
    }
    if flags.conversation || flags.get {
        conversation::execute(&cli, &mut ctx);
    }
    if flags.send {
        let plan = SendPlan {
            conversations: cli.conversations.clone(),
            files,
            messages,
            mode: FormatMode::from_flags(cli.code, cli.markdown, cli.html, cli.emojize),
            split: cli.split.as_deref().map(input::unescape_separator),
            other_action_pending: flags.non_send_pending(),
        };
        send::execute(&plan, &mut ctx);
    }
    if flags.listen {
        listen::execute(&mut ctx);
    }

    let tally = ctx.tally;
    if tally.errors() > 0 || tally.warnings() > 0 {
        info!("{}", tally.summary());
    }
    tally.exit_code()
}

fn abort_early(message: &str, mut tally: Tally) -> u8 {
    error!("{message}");
    error!(
        "early abort: to avoid partial execution no action has been \
         performed at all; nothing has been sent"
    );
    tally.error();
    info!("{}", tally.summary());
    tally.exit_code()
}

/// Verify every literal file argument is a readable file (E236). The
/// stdin marker is exempt; it has no path to check.
fn check_files_readable(files: &[FileArg]) -> Result<(), String> {
    let mut unreadable = Vec::new();
    for file in files {
        if let FileArg::Literal(path) = file {
            let readable = path.is_file() && std::fs::File::open(path).is_ok();
            if !readable {
                unreadable.push(format!("{path:?}"));
            }
        }
    }
    if unreadable.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "E236: these files from the command line were not found or are \
             not readable: {}",
            unreadable.join(", ")
        ))
    }
}
