//! Step functions, one module per workflow stage.
//!
//! Every step follows the same shape: check its structural preconditions,
//! skip itself when the row's progress already covers it, perform exactly
//! one remote side effect, then persist fields + progress + detail in a
//! single ledger update.

mod backend;
mod database;
mod deploy;
mod domains;
mod frontend;
mod project;

pub(crate) use domains::backend_host;

/// Outcome of one step invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// The remote side effect was performed in this invocation.
    Performed,
    /// The step had already completed in an earlier run; no-op.
    AlreadyDone,
    /// The step failed; the ledger row is marked failed.
    Failed,
}

/// Short random suffix for generated resource names.
pub(crate) fn short_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Random secret for generated credentials.
pub(crate) fn generated_secret() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}
