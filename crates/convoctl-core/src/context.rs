//! Per-run context.
//!
//! Carries the controller handle, the error/warning tally, and the resolved
//! account through every action group. This replaces any notion of global
//! mutable state: components receive the context explicitly.

use tracing::debug;

use crate::account::{AccountError, resolve_account};
use crate::controller::Controller;
use crate::report::Tally;

/// Mutable state for one program run.
pub struct RunContext<'c> {
    pub ctrl: &'c dyn Controller,
    pub tally: Tally,
    explicit_account: Option<String>,
    resolved: Option<String>,
}

impl<'c> RunContext<'c> {
    pub fn new(ctrl: &'c dyn Controller, explicit_account: Option<String>) -> Self {
        Self {
            ctrl,
            tally: Tally::new(),
            explicit_account,
            resolved: None,
        }
    }

    /// The active account for this run.
    ///
    /// Resolved once against the daemon's enabled-account set; later calls
    /// return the cached id without re-querying.
    pub fn account(&mut self) -> Result<String, AccountError> {
        if let Some(id) = &self.resolved {
            return Ok(id.clone());
        }
        let enabled = self.ctrl.enabled_accounts()?;
        for acct in &enabled {
            // Details are fetched for diagnostic logging only; a failure
            // here must not fail resolution.
            match self.ctrl.account_details(acct) {
                Ok(details) => debug!(account = %acct, ?details, "enabled account"),
                Err(e) => debug!(account = %acct, error = %e, "could not fetch account details"),
            }
        }
        let id = resolve_account(self.explicit_account.as_deref(), &enabled)?;
        debug!(account = %id, "account resolved; it will be used for the rest of the run");
        self.resolved = Some(id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::test_support::{Call, MockController};

    #[test]
    fn account_is_resolved_once_and_cached() {
        let ctrl = MockController::with_accounts(&["a1"]);
        let mut ctx = RunContext::new(&ctrl, None);
        assert_eq!(ctx.account().unwrap(), "a1");
        assert_eq!(ctx.account().unwrap(), "a1");
        let queries = ctrl
            .calls
            .borrow()
            .iter()
            .filter(|c| matches!(c, Call::EnabledAccounts))
            .count();
        assert_eq!(queries, 1);
    }

    #[test]
    fn explicit_account_is_validated() {
        let ctrl = MockController::with_accounts(&["a1", "a2"]);
        let mut ctx = RunContext::new(&ctrl, Some("a9".to_string()));
        assert!(matches!(
            ctx.account(),
            Err(AccountError::Invalid { .. })
        ));
    }

    #[test]
    fn ambiguous_without_explicit_selection() {
        let ctrl = MockController::with_accounts(&["a1", "a2"]);
        let mut ctx = RunContext::new(&ctrl, None);
        assert!(matches!(ctx.account(), Err(AccountError::Ambiguous { .. })));
    }
}
