//! Core library for convoctl, a CLI client for a conversation daemon.
//!
//! This crate holds everything below the argument surface: tokenizing and
//! resolving message input from the command line, a pipe, or the keyboard;
//! formatting message bodies; picking the active account; the best-effort
//! send dispatch engine; and the socket client for the daemon itself.
//!
//! Failures during dispatch are isolated per item and accumulated in a
//! [`report::Tally`]; the process exit status is the final error count.

pub mod account;
pub mod context;
pub mod controller;
pub mod dispatch;
pub mod format;
pub mod input;
pub mod logging;
pub mod report;

pub use context::RunContext;
pub use report::Tally;
