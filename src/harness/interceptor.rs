//! Assertion interceptor: wraps the result log so a failure's reaction fires
//! exactly once, just before the next outcome is recorded.
//!
//! Ordering for outcome N:
//! 1. N is recorded; if it failed, a pending failure is remembered.
//! 2. When assertion N+1 starts, the pending failure is taken (cleared) and
//!    the registered action, if any, runs. An error from the action is
//!    returned to the caller of N+1 and N+1 is never recorded.
//! 3. Otherwise N+1 is recorded through the wrapped log.
//!
//! A failure on the final assertion has no N+1; [`AssertionInterceptor::fire_pending_at_end`]
//! covers it during the suite's shutdown sequence.

#![allow(missing_docs)]

use crate::core::errors::Result;
use crate::harness::actions::{FailureAction, FailureContext, Trigger};
use crate::harness::registry::FailureActionRegistry;
use crate::harness::result_log::ResultLog;
use crate::logger::jsonl::{EventLogHandle, EventType, LogEntry, Severity};

/// A recorded failure whose action has not fired yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFailure {
    /// 1-based number of the failed assertion.
    pub test: usize,
    /// Its description, as recorded.
    pub description: String,
}

/// Decorator around a [`ResultLog`] that applies the registered failure action.
#[derive(Debug)]
pub struct AssertionInterceptor<L: ResultLog> {
    log: L,
    registry: FailureActionRegistry,
    pending: Option<PendingFailure>,
    events: Option<EventLogHandle>,
}

impl<L: ResultLog> AssertionInterceptor<L> {
    pub fn new(log: L) -> Self {
        Self {
            log,
            registry: FailureActionRegistry::new(),
            pending: None,
            events: None,
        }
    }

    /// Send outcome and action events to `events`.
    pub fn attach_events(&mut self, events: EventLogHandle) {
        self.events = Some(events);
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }

    pub fn registry(&self) -> &FailureActionRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FailureActionRegistry {
        &mut self.registry
    }

    /// The failure still waiting for its action, if any.
    pub fn pending(&self) -> Option<&PendingFailure> {
        self.pending.as_ref()
    }

    /// Run one assertion through the wrapped log.
    ///
    /// Returns the recorded outcome unchanged, or the error raised by the
    /// action reacting to the *previous* assertion's failure.
    pub fn intercept(&mut self, passed: bool, description: &str) -> Result<bool> {
        if let Some(failure) = self.pending.take() {
            let next_test = self.log.current_count() + 1;
            self.fire(&failure, Trigger::NextAssertion { next_test }, true)?;
        }

        let outcome = self.log.record_outcome(passed, description);
        let number = self.log.current_count();
        if !outcome {
            self.pending = Some(PendingFailure {
                test: number,
                description: description.to_string(),
            });
        }

        if let Some(events) = &self.events {
            let mut entry = LogEntry::new(
                EventType::Outcome,
                if outcome {
                    Severity::Info
                } else {
                    Severity::Warning
                },
            );
            entry.test = Some(number);
            entry.passed = Some(outcome);
            if !description.is_empty() {
                entry.description = Some(description.to_string());
            }
            events.emit(&entry);
        }

        Ok(outcome)
    }

    /// End-of-run counterpart of the check at the top of [`Self::intercept`].
    ///
    /// The action receives no log reference on this path.
    pub fn fire_pending_at_end(&mut self) -> Result<()> {
        match self.pending.take() {
            Some(failure) => self.fire(&failure, Trigger::EndOfRun, false),
            None => Ok(()),
        }
    }

    fn fire(&mut self, failure: &PendingFailure, trigger: Trigger, with_log: bool) -> Result<()> {
        let Some(action) = self.registry.current_action() else {
            return Ok(());
        };

        self.log.flush();
        if let Some(events) = &self.events {
            let mut entry = LogEntry::new(EventType::FailureAction, Severity::Warning);
            entry.test = Some(failure.test);
            entry.description = Some(failure.description.clone());
            entry.policy = Some(action.label().to_string());
            entry.details = Some(match trigger {
                Trigger::NextAssertion { next_test } => format!("before test {next_test}"),
                Trigger::EndOfRun => "end of run".to_string(),
            });
            events.emit(&entry);
            events.flush();
        }

        let ctx = FailureContext {
            failed_test: failure.test,
            description: &failure.description,
            trigger,
            log: if with_log {
                Some(&self.log as &dyn ResultLog)
            } else {
                None
            },
        };
        action.on_failure(&ctx)
    }
}
