//! Account-management actions: add, remove, list enabled.
//!
//! These run first and do not need a resolved active account; creating the
//! first account must work when none exist yet.

use std::collections::BTreeMap;

use anyhow::Result;
use tracing::error;

use convoctl_core::RunContext;

use crate::commands::Cli;
use crate::util::output::print_output;

/// Execute the account-management action group. Each operation's failure
/// is counted and the remaining operations still run.
pub fn execute(cli: &Cli, ctx: &mut RunContext<'_>) {
    if let Some(values) = &cli.add_account {
        if let Err(e) = add_account(cli, ctx, values) {
            error!("E233: failed to add account, continuing: {e}");
            ctx.tally.error();
        }
    }

    for id in &cli.remove_account {
        match ctx.ctrl.remove_account(id) {
            Ok(()) => print_output(
                cli.output,
                &format!("removed account {id}"),
                &serde_json::json!({ "removed_account": id }),
            ),
            Err(e) => {
                error!("E233: failed to remove account {id}, continuing: {e}");
                ctx.tally.error();
            }
        }
    }

    if cli.get_enabled_accounts {
        if let Err(e) = list_enabled_accounts(cli, ctx) {
            error!("E233: failed to list enabled accounts: {e}");
            ctx.tally.error();
        }
    }
}

fn add_account(cli: &Cli, ctx: &mut RunContext<'_>, values: &[String]) -> Result<()> {
    // clap guarantees exactly four values: ALIAS HOST USER PASS.
    let mut details = BTreeMap::new();
    details.insert("alias".to_string(), values[0].clone());
    details.insert("hostname".to_string(), values[1].clone());
    details.insert("username".to_string(), values[2].clone());
    details.insert("password".to_string(), values[3].clone());

    let id = ctx.ctrl.add_account(&details)?;
    print_output(
        cli.output,
        &id,
        &serde_json::json!({ "account": id, "alias": values[0] }),
    );
    Ok(())
}

fn list_enabled_accounts(cli: &Cli, ctx: &mut RunContext<'_>) -> Result<()> {
    let accounts = ctx.ctrl.enabled_accounts()?;
    print_output(
        cli.output,
        &accounts.join("\n"),
        &serde_json::json!({ "accounts": accounts }),
    );
    Ok(())
}
