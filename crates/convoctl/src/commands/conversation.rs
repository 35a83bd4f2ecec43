//! Conversation management and get-class actions.
//!
//! Everything here needs the active account. If account resolution fails
//! the whole group is skipped with one counted error; the groups that
//! already ran keep their results and the later groups still run.

use anyhow::Result;
use tracing::error;

use convoctl_core::RunContext;

use crate::commands::Cli;
use crate::util::output::print_output;

/// Execute the conversation and get actions. Operations run in argument
/// order with mutations before reads; each failure is counted and the
/// remaining operations still run.
pub fn execute(cli: &Cli, ctx: &mut RunContext<'_>) {
    let account = match ctx.account() {
        Ok(account) => account,
        Err(e) => {
            error!("E214: account not set, skipping conversation and get actions: {e}");
            ctx.tally.error();
            return;
        }
    };

    if cli.add_conversation {
        if let Err(e) = add_conversation(cli, ctx, &account) {
            error!("E215: failed to start a conversation, continuing: {e}");
            ctx.tally.error();
        }
    }

    if cli.remove_conversation {
        remove_conversations(cli, ctx, &account);
    }

    if !cli.add_conversation_member.is_empty() {
        edit_members(cli, ctx, &account, &cli.add_conversation_member, MemberEdit::Add);
    }

    if !cli.remove_conversation_member.is_empty() {
        edit_members(
            cli,
            ctx,
            &account,
            &cli.remove_conversation_member,
            MemberEdit::Remove,
        );
    }

    if cli.get_conversations {
        if let Err(e) = list_conversations(cli, ctx, &account) {
            error!("E215: failed to list conversations: {e}");
            ctx.tally.error();
        }
    }

    if cli.get_conversation_members {
        list_members(cli, ctx, &account);
    }
}

/// True when the action needs `--conversations` targets and none were
/// given; counted as one error per action.
fn require_targets(cli: &Cli, ctx: &mut RunContext<'_>, action: &str) -> bool {
    if cli.conversations.is_empty() {
        error!("E217: {action} needs target conversations; name them with --conversations");
        ctx.tally.error();
        return false;
    }
    true
}

fn add_conversation(cli: &Cli, ctx: &mut RunContext<'_>, account: &str) -> Result<()> {
    let id = ctx.ctrl.start_conversation(account)?;
    print_output(
        cli.output,
        &id,
        &serde_json::json!({ "conversation": id, "account": account }),
    );
    Ok(())
}

fn remove_conversations(cli: &Cli, ctx: &mut RunContext<'_>, account: &str) {
    if !require_targets(cli, ctx, "--remove-conversation") {
        return;
    }
    for conversation in &cli.conversations {
        match ctx.ctrl.remove_conversation(account, conversation) {
            Ok(true) => print_output(
                cli.output,
                &format!("removed conversation {conversation}"),
                &serde_json::json!({ "removed_conversation": conversation }),
            ),
            Ok(false) => {
                error!("E215: daemon refused to remove conversation {conversation}, continuing");
                ctx.tally.error();
            }
            Err(e) => {
                error!("E215: failed to remove conversation {conversation}, continuing: {e}");
                ctx.tally.error();
            }
        }
    }
}

#[derive(Clone, Copy)]
enum MemberEdit {
    Add,
    Remove,
}

fn edit_members(
    cli: &Cli,
    ctx: &mut RunContext<'_>,
    account: &str,
    uris: &[String],
    edit: MemberEdit,
) {
    let action = match edit {
        MemberEdit::Add => "--add-conversation-member",
        MemberEdit::Remove => "--remove-conversation-member",
    };
    if !require_targets(cli, ctx, action) {
        return;
    }
    for conversation in &cli.conversations {
        for uri in uris {
            let result = match edit {
                MemberEdit::Add => ctx.ctrl.add_conversation_member(account, conversation, uri),
                MemberEdit::Remove => {
                    ctx.ctrl.remove_conversation_member(account, conversation, uri)
                }
            };
            match result {
                Ok(()) => {
                    let verb = match edit {
                        MemberEdit::Add => "added",
                        MemberEdit::Remove => "removed",
                    };
                    print_output(
                        cli.output,
                        &format!("{verb} {uri} in conversation {conversation}"),
                        &serde_json::json!({
                            "conversation": conversation,
                            "uri": uri,
                            "edit": verb,
                        }),
                    );
                }
                Err(e) => {
                    error!(
                        "E215: failed membership change for {uri} in conversation \
                         {conversation}, continuing: {e}"
                    );
                    ctx.tally.error();
                }
            }
        }
    }
}

fn list_conversations(cli: &Cli, ctx: &mut RunContext<'_>, account: &str) -> Result<()> {
    let conversations = ctx.ctrl.conversations(account)?;
    print_output(
        cli.output,
        &conversations.join("\n"),
        &serde_json::json!({ "account": account, "conversations": conversations }),
    );
    Ok(())
}

fn list_members(cli: &Cli, ctx: &mut RunContext<'_>, account: &str) {
    if !require_targets(cli, ctx, "--get-conversation-members") {
        return;
    }
    for conversation in &cli.conversations {
        match ctx.ctrl.conversation_members(account, conversation) {
            Ok(members) => {
                let text = members
                    .iter()
                    .map(|m| format!("{}    {}", m.uri, m.role))
                    .collect::<Vec<_>>()
                    .join("\n");
                print_output(
                    cli.output,
                    &text,
                    &serde_json::json!({ "conversation": conversation, "members": members }),
                );
            }
            Err(e) => {
                error!(
                    "E215: failed to list members of conversation {conversation}, \
                     continuing: {e}"
                );
                ctx.tally.error();
            }
        }
    }
}
