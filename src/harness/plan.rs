//! Deferred plan accounting.
//!
//! A suite in deferred mode counts as "planned" from the start, so the
//! harness does not complain early, but the actual number is only fixed by
//! [`DeferredPlanController::finalize`]. If the run ends without that call,
//! [`DeferredPlanController::end_of_run`] forces the plan one past the
//! executed count so a truncated run can never look like a clean pass.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::core::errors::{GuardError, Result};
use crate::harness::result_log::ResultLog;

/// State of a suite that opted into deferred planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeferredPlanState {
    /// Deferred mode was entered.
    pub deferred: bool,
    /// The plan was fixed explicitly via `finalize`.
    pub resolved: bool,
    /// Count written to the log, explicit or forced.
    pub expected: Option<usize>,
}

/// How an end-of-run pass left the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanResolution {
    /// Not in deferred mode; the plan was left alone.
    NotDeferred,
    /// Already resolved explicitly with this count.
    Resolved(usize),
    /// Never resolved; forced to this count (executed + 1).
    Forced(usize),
}

/// Drives deferred-plan mode against a [`ResultLog`].
#[derive(Debug, Default)]
pub struct DeferredPlanController {
    state: DeferredPlanState,
}

impl DeferredPlanController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DeferredPlanState {
        self.state
    }

    pub fn is_deferred(&self) -> bool {
        self.state.deferred
    }

    pub fn is_resolved(&self) -> bool {
        self.state.resolved
    }

    /// Enter deferred mode. Calling it again is a no-op.
    ///
    /// Fails if the log already carries a fixed plan from elsewhere.
    pub fn enter_deferred_mode(&mut self, log: &mut dyn ResultLog) -> Result<()> {
        if self.state.deferred {
            return Ok(());
        }
        if let Some(existing) = log.expected_count() {
            return Err(GuardError::PlanAlreadySet {
                existing: format!("1..{existing}"),
            });
        }
        log.declare_deferred_plan();
        self.state.deferred = true;
        Ok(())
    }

    /// Fix the plan to `explicit`, or to the executed count when `None`.
    ///
    /// Returns the count written, or `None` when not in deferred mode. A
    /// second call re-finalizes with the new count.
    pub fn finalize(&mut self, log: &mut dyn ResultLog, explicit: Option<usize>) -> Option<usize> {
        if !self.state.deferred {
            return None;
        }
        let count = explicit.unwrap_or_else(|| log.current_count());
        log.set_expected_count(count);
        self.state.resolved = true;
        self.state.expected = Some(count);
        Some(count)
    }

    /// Shutdown hook. Must run after the last assertion has been recorded.
    pub fn end_of_run(&mut self, log: &mut dyn ResultLog) -> PlanResolution {
        match (self.state.deferred, self.state.resolved, self.state.expected) {
            (false, _, _) => PlanResolution::NotDeferred,
            (true, true, Some(count)) => PlanResolution::Resolved(count),
            _ => {
                let forced = log.current_count() + 1;
                log.set_expected_count(forced);
                self.state.expected = Some(forced);
                PlanResolution::Forced(forced)
            }
        }
    }
}
