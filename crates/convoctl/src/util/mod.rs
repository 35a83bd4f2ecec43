//! Small CLI-side helpers.

pub mod output;
