//! The send dispatch engine.
//!
//! One send action walks a fixed sequence: resolve the account, send the
//! file arguments, send the message candidates, then (only when `_` was
//! given) stream the stdin pipe line by line until it closes. Per-item
//! failures are counted and logged with a stable code but never abort the
//! remaining items; only configuration and account errors abort the action,
//! and they do so before anything was sent.

use std::io::Write;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, error};

use crate::account::AccountError;
use crate::context::RunContext;
use crate::format::{self, FormatMode};
use crate::input::{self, FileArg, MessageArg, StdinSource};

/// Everything one send action needs, derived from the parsed arguments.
#[derive(Debug, Clone, Default)]
pub struct SendPlan {
    /// Target conversations, in declaration order. Must be non-empty.
    pub conversations: Vec<String>,
    /// File arguments, in declaration order.
    pub files: Vec<FileArg>,
    /// Message arguments, in declaration order.
    pub messages: Vec<MessageArg>,
    /// Effective format mode for message bodies.
    pub mode: FormatMode,
    /// Optional separator subdividing every message candidate.
    pub split: Option<String>,
    /// True when another action group besides send is active in this run.
    /// Suppresses the interactive keyboard fallback.
    pub other_action_pending: bool,
}

/// Errors that abort the whole send action. Everything else is per-item
/// and only counted.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(
        "E255: no conversations specified; nothing would be sent anywhere, \
         name at least one target with --conversations"
    )]
    NoTargets,

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("E219: i/o error while gathering input: {0}")]
    Input(#[from] std::io::Error),
}

/// Run one send action to completion.
///
/// The engine reaches its terminal state whether or not individual sends
/// failed; the caller inspects `ctx.tally` for the damage.
pub fn run_send(
    ctx: &mut RunContext<'_>,
    plan: &SendPlan,
    stdin: &mut dyn StdinSource,
) -> Result<(), SendError> {
    // Refused before any account resolution or network activity, to avoid
    // partial, confusing sends.
    if plan.conversations.is_empty() {
        return Err(SendError::NoTargets);
    }

    let account = ctx.account()?;
    debug!(account = %account, targets = plan.conversations.len(), "send action starting");

    send_files(ctx, &account, plan, stdin)?;

    let files_claim_stdin = plan
        .files
        .iter()
        .any(|f| matches!(f, FileArg::ReadPipeOnce));
    let resolved = input::resolve(
        &plan.messages,
        !plan.files.is_empty(),
        files_claim_stdin,
        plan.other_action_pending,
        plan.split.as_deref(),
        stdin,
        &mut ctx.tally,
    )?;

    for body in &resolved.candidates {
        send_one_message(ctx, &account, &plan.conversations, body, plan.mode);
    }

    if resolved.streaming {
        stream_pipe(ctx, &account, plan, stdin)?;
    }

    debug!("send action finished");
    Ok(())
}

/// Send every file argument to every target, in declaration order,
/// best-effort.
fn send_files(
    ctx: &mut RunContext<'_>,
    account: &str,
    plan: &SendPlan,
    stdin: &mut dyn StdinSource,
) -> Result<(), SendError> {
    for file in &plan.files {
        match file {
            FileArg::Literal(path) => {
                let abs = match std::fs::canonicalize(path) {
                    Ok(p) => p,
                    Err(e) => {
                        error!("E252: cannot resolve file {path:?}: {e}");
                        ctx.tally.error();
                        continue;
                    }
                };
                let display_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| abs.display().to_string());
                fan_out_file(ctx, account, &plan.conversations, &abs, &display_name);
            }
            FileArg::ReadPipeOnce => {
                let bytes = stdin.read_all()?;
                // The artifact lives exactly as long as this send attempt;
                // dropping the handle removes it on every path.
                let artifact = match spool_to_temp(&bytes) {
                    Ok(tmp) => tmp,
                    Err(e) => {
                        error!("E252: cannot spool piped data to a temporary file: {e}");
                        ctx.tally.error();
                        continue;
                    }
                };
                fan_out_file(ctx, account, &plan.conversations, artifact.path(), "piped-stdin");
            }
        }
    }
    Ok(())
}

fn spool_to_temp(bytes: &[u8]) -> std::io::Result<tempfile::NamedTempFile> {
    let mut tmp = tempfile::NamedTempFile::new()?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    Ok(tmp)
}

fn fan_out_file(
    ctx: &mut RunContext<'_>,
    account: &str,
    conversations: &[String],
    path: &Path,
    display_name: &str,
) {
    for conversation in conversations {
        match ctx.ctrl.send_file(account, conversation, path, display_name, "") {
            Ok(response) => {
                debug!(conversation = %conversation, %response, "file send requested");
            }
            Err(e) => {
                error!(
                    "E252: failed to send file '{display_name}' to conversation \
                     {conversation}: {e}; continuing with the remaining items"
                );
                ctx.tally.error();
            }
        }
    }
}

/// Format one candidate and fan it out to every target. Candidates that
/// are empty after trimming are silently dropped.
fn send_one_message(
    ctx: &mut RunContext<'_>,
    account: &str,
    conversations: &[String],
    body: &str,
    mode: FormatMode,
) {
    if body.trim().is_empty() {
        debug!("dropping message that is empty after trimming");
        return;
    }
    let formatted = format::format(body, mode);
    for conversation in conversations {
        match ctx.ctrl.send_message(account, conversation, &formatted, "", 0) {
            Ok(response) => {
                debug!(conversation = %conversation, %response, "message send requested");
            }
            Err(e) => {
                error!(
                    "E253: failed to send message to conversation {conversation}: {e}; \
                     continuing with the remaining items"
                );
                ctx.tally.error();
            }
        }
    }
}

/// Stream the stdin pipe line by line. Each line is dispatched as soon as
/// it arrives; the loop ends only when the pipe closes.
fn stream_pipe(
    ctx: &mut RunContext<'_>,
    account: &str,
    plan: &SendPlan,
    stdin: &mut dyn StdinSource,
) -> Result<(), SendError> {
    debug!("streaming stdin until the pipe closes");
    while let Some(raw) = stdin.read_line()? {
        let Some(line) = input::decode_pipe(raw, &mut ctx.tally) else {
            continue;
        };
        let line = line.trim_end_matches(['\n', '\r']).to_string();
        let pieces = match plan.split.as_deref() {
            Some(sep) => input::split_candidates(vec![line], sep),
            None => vec![line],
        };
        for piece in &pieces {
            send_one_message(ctx, account, &plan.conversations, piece, plan.mode);
        }
    }
    debug!("stdin pipe closed; streaming finished");
    Ok(())
}
