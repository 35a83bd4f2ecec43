//! Account selection.
//!
//! Exactly one account is active per run. It is either named explicitly
//! with `--account` or auto-selected when the daemon reports exactly one
//! enabled account.

use thiserror::Error;

use crate::controller::ControllerError;

/// Why account resolution failed. Fatal for the action group that needed
/// the account; sibling groups already run are unaffected.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("E234: no enabled account found; create an account first")]
    NoAccount,

    #[error(
        "E234: more than one enabled account found; cannot decide which one, \
         pick one with --account; valid account ids are {candidates:?}"
    )]
    Ambiguous { candidates: Vec<String> },

    #[error(
        "E234: '{given}' is not a valid account id; specify a correct id \
         with --account; valid account ids are {candidates:?}"
    )]
    Invalid { given: String, candidates: Vec<String> },

    #[error("E234: could not list enabled accounts: {0}")]
    Controller(#[from] ControllerError),
}

/// Pick exactly one account id from the enabled set.
pub fn resolve_account(
    explicit: Option<&str>,
    enabled: &[String],
) -> Result<String, AccountError> {
    match explicit {
        Some(id) => {
            if enabled.iter().any(|a| a == id) {
                Ok(id.to_string())
            } else {
                Err(AccountError::Invalid {
                    given: id.to_string(),
                    candidates: enabled.to_vec(),
                })
            }
        }
        None => match enabled {
            [] => Err(AccountError::NoAccount),
            [only] => Ok(only.clone()),
            _ => Err(AccountError::Ambiguous {
                candidates: enabled.to_vec(),
            }),
        },
    }
}
