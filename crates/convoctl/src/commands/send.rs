//! Send action: wires the parsed arguments and the real stdin into the
//! dispatch engine.

use tracing::error;

use convoctl_core::RunContext;
use convoctl_core::dispatch::{self, SendError, SendPlan};
use convoctl_core::input::RealStdin;

/// Execute the send action group. Per-item failures were already counted
/// inside the engine; only action-fatal errors are counted here.
pub fn execute(plan: &SendPlan, ctx: &mut RunContext<'_>) {
    let mut stdin = RealStdin;
    match dispatch::run_send(ctx, plan, &mut stdin) {
        Ok(()) => {}
        Err(SendError::Account(e)) => {
            error!("E218: account not set, skipping send action: {e}");
            ctx.tally.error();
        }
        Err(e) => {
            // NoTargets (E255) or an input i/o failure (E219); the code is
            // part of the error message.
            error!("{e}");
            ctx.tally.error();
        }
    }
}
