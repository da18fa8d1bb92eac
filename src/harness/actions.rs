//! Failure actions: what happens once a failed assertion is noticed.
//!
//! Actions run *before the next assertion is recorded*, or at end of run when
//! the failing assertion was the last one. Two built-ins are provided:
//! [`DieOnFail`] raises a suite abort and [`BailOnFail`] terminates the
//! process. Any `FnMut(&FailureContext) -> Result<()>` closure is also an
//! action.

use std::fmt;
use std::io::{self, Write};

use crate::core::errors::{GuardError, Result};
use crate::harness::result_log::ResultLog;
use crate::logger::jsonl::{EventLogHandle, EventType, LogEntry, Severity};

/// Exit status used by [`BailOnFail`].
pub const BAIL_EXIT_CODE: i32 = 255;

/// When the pending failure was noticed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Noticed while starting assertion `next_test`.
    NextAssertion { next_test: usize },
    /// Noticed during end-of-run finalization; no assertion follows.
    EndOfRun,
}

impl Trigger {
    /// The assertion that was about to run, if any.
    #[must_use]
    pub fn next_test(self) -> Option<usize> {
        match self {
            Self::NextAssertion { next_test } => Some(next_test),
            Self::EndOfRun => None,
        }
    }
}

/// Everything an action is told about the failure it reacts to.
///
/// `log` is `None` when the action fires at end of run. Actions must
/// tolerate that: the trailing-failure path runs after the suite has sealed
/// its log, so no log reference is handed out there.
pub struct FailureContext<'a> {
    /// 1-based number of the failed assertion.
    pub failed_test: usize,
    /// Description the failed assertion was recorded with.
    pub description: &'a str,
    /// When the failure was noticed.
    pub trigger: Trigger,
    /// The result log, except at end of run.
    pub log: Option<&'a dyn ResultLog>,
}

impl FailureContext<'_> {
    /// Human-readable explanation naming both the failed and the next test.
    #[must_use]
    pub fn explain(&self) -> String {
        let what = if self.description.is_empty() {
            format!("test {}", self.failed_test)
        } else {
            format!("test {} ({})", self.failed_test, self.description)
        };
        match self.trigger {
            Trigger::NextAssertion { next_test } => {
                format!("{what} failed; stopping before test {next_test}")
            }
            Trigger::EndOfRun => format!("{what} failed; stopping at end of run"),
        }
    }
}

impl fmt::Debug for FailureContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailureContext")
            .field("failed_test", &self.failed_test)
            .field("description", &self.description)
            .field("trigger", &self.trigger)
            .field("has_log", &self.log.is_some())
            .finish()
    }
}

/// A reaction to a previously recorded failure.
pub trait FailureAction {
    /// Short label used in event logs.
    fn label(&self) -> &str {
        "custom"
    }

    /// React to the failure. Errors propagate to the caller of the
    /// assertion that noticed the failure.
    fn on_failure(&mut self, ctx: &FailureContext<'_>) -> Result<()>;
}

impl<F> FailureAction for F
where
    F: FnMut(&FailureContext<'_>) -> Result<()>,
{
    fn on_failure(&mut self, ctx: &FailureContext<'_>) -> Result<()> {
        self(ctx)
    }
}

/// Turn a closure into a [`FailureAction`], pinning down its signature.
///
/// ```
/// use suite_guard::harness::actions::{FailureContext, from_fn};
///
/// let action = from_fn(|ctx: &FailureContext<'_>| {
///     eprintln!("noticed: {}", ctx.explain());
///     Ok(())
/// });
/// # let _ = action;
/// ```
pub fn from_fn<F>(f: F) -> F
where
    F: FnMut(&FailureContext<'_>) -> Result<()>,
{
    f
}

/// Raise [`GuardError::SuiteAbort`] on the next assertion after a failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct DieOnFail;

impl FailureAction for DieOnFail {
    fn label(&self) -> &str {
        "die"
    }

    fn on_failure(&mut self, ctx: &FailureContext<'_>) -> Result<()> {
        Err(GuardError::SuiteAbort {
            failed_test: ctx.failed_test,
            description: ctx.description.to_string(),
            next_test: ctx.trigger.next_test(),
        })
    }
}

/// Emit `Bail out!` and terminate the process with status 255.
///
/// Nothing after this action runs: not the next assertion, not the plan
/// hook, not the harness report.
pub struct BailOnFail {
    out: Box<dyn Write>,
    events: Option<EventLogHandle>,
}

impl BailOnFail {
    /// Bail out on standard output, where TAP consumers look for it.
    #[must_use]
    pub fn new() -> Self {
        Self::with_sink(Box::new(io::stdout()))
    }

    /// Bail out on a custom sink.
    #[must_use]
    pub fn with_sink(out: Box<dyn Write>) -> Self {
        Self { out, events: None }
    }

    /// Record a `bail_out` event (flushed) before terminating.
    #[must_use]
    pub fn with_events(mut self, events: Option<EventLogHandle>) -> Self {
        self.events = events;
        self
    }

    /// The TAP line written before terminating.
    #[must_use]
    pub fn bail_line(ctx: &FailureContext<'_>) -> String {
        format!("Bail out!  {}", ctx.explain())
    }
}

impl Default for BailOnFail {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BailOnFail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BailOnFail")
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl FailureAction for BailOnFail {
    fn label(&self) -> &str {
        "bail"
    }

    fn on_failure(&mut self, ctx: &FailureContext<'_>) -> Result<()> {
        if let Some(events) = &self.events {
            let mut entry = LogEntry::new(EventType::BailOut, Severity::Critical);
            entry.test = Some(ctx.failed_test);
            entry.description = Some(ctx.description.to_string());
            entry.exit_code = Some(BAIL_EXIT_CODE);
            entry.details = Some(ctx.explain());
            events.emit(&entry);
            events.flush();
        }
        let _ = writeln!(self.out, "{}", Self::bail_line(ctx));
        let _ = self.out.flush();
        std::process::exit(BAIL_EXIT_CODE);
    }
}
