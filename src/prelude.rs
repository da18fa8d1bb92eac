//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use suite_guard::prelude::*;
//! ```

// Core
pub use crate::core::config::{FailurePolicy, HarnessConfig, Modifiers};
pub use crate::core::errors::{GuardError, Result};

// Harness
pub use crate::harness::actions::{
    BailOnFail, DieOnFail, FailureAction, FailureContext, Trigger, from_fn,
};
pub use crate::harness::result_log::{Outcome, ResultLog, TallyReport, TapLog};
pub use crate::harness::suite::Suite;

// Diagnostics
pub use crate::diag::dump::{explain, explain_debug};
pub use crate::logger::jsonl::EventLogHandle;
