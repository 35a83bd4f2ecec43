//! Process-wide error and warning tally.
//!
//! Every component reports recoverable failures here instead of aborting.
//! The counters only ever increase; the final exit status of the process is
//! the error count (saturated to fit an exit code).

/// Monotonic error and warning counters for one program run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    errors: u64,
    warnings: u64,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one error.
    pub fn error(&mut self) {
        self.errors += 1;
    }

    /// Record one warning. Warnings do not affect the exit status.
    pub fn warning(&mut self) {
        self.warnings += 1;
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn warnings(&self) -> u64 {
        self.warnings
    }

    /// Exit status for the run: the error count, saturated to `u8::MAX`.
    pub fn exit_code(&self) -> u8 {
        u8::try_from(self.errors).unwrap_or(u8::MAX)
    }

    /// Summary line printed at the end of a run with a nonzero tally.
    pub fn summary(&self) -> String {
        format!(
            "{} error{} and {} warning{} occurred.",
            self.errors,
            if self.errors == 1 { "" } else { "s" },
            self.warnings,
            if self.warnings == 1 { "" } else { "s" },
        )
    }
}
