//! Listen action. A deliberate stub: it resolves the account like every
//! other account-requiring group, then reports itself unimplemented as a
//! counted error.

use tracing::error;

use convoctl_core::RunContext;

pub fn execute(ctx: &mut RunContext<'_>) {
    match ctx.account() {
        Ok(_) => {
            error!("E249: listening for incoming messages is not implemented yet");
            ctx.tally.error();
        }
        Err(e) => {
            error!("E218: account not set, skipping listen action: {e}");
            ctx.tally.error();
        }
    }
}
