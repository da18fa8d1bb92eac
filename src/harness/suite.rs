//! Per-suite context: one instance owns the result log, the failure-action
//! registry, the pending-failure state and the deferred plan.
//!
//! Shutdown runs in a fixed order (see [`Suite::finish`]), either explicitly
//! or from `Drop` when the suite goes out of scope, including while a panic
//! unwinds. A process killed with `std::process::exit` elsewhere skips it;
//! use [`Suite::exit`] for an early exit that still reports.

use std::fmt::{self, Debug};

use regex::Regex;
use serde::Serialize;

use crate::core::config::{FailurePolicy, HarnessConfig};
use crate::core::errors::{GuardError, Result};
use crate::diag::dump;
use crate::harness::actions::{BailOnFail, DieOnFail, FailureAction, FailureContext};
use crate::harness::interceptor::AssertionInterceptor;
use crate::harness::plan::{DeferredPlanController, PlanResolution};
use crate::harness::result_log::{ResultLog, TallyReport};
use crate::logger::jsonl::{EventLogHandle, EventType, LogEntry, Severity};

/// A running test suite.
pub struct Suite<L: ResultLog> {
    interceptor: AssertionInterceptor<L>,
    plan: DeferredPlanController,
    events: Option<EventLogHandle>,
    abort: Option<String>,
    report: Option<TallyReport>,
}

impl<L: ResultLog> Suite<L> {
    /// Suite with no failure action and no deferred plan.
    pub fn new(log: L) -> Self {
        Self {
            interceptor: AssertionInterceptor::new(log),
            plan: DeferredPlanController::new(),
            events: None,
            abort: None,
            report: None,
        }
    }

    /// Suite configured from resolved harness settings.
    ///
    /// Attaches the event log, installs die/bail per the failure policy and
    /// enters deferred-plan mode when requested.
    pub fn from_config(log: L, config: &HarnessConfig) -> Result<Self> {
        let mut suite = Self::new(log);
        if let Some(path) = &config.event_log {
            suite = suite.with_event_log(EventLogHandle::open(path));
        }
        let policy = config.failure_policy();
        suite.emit_with(EventType::SuiteStart, Severity::Info, |e| {
            e.policy = Some(policy_label(policy).to_string());
        });
        match policy {
            FailurePolicy::Die => suite.die_on_fail(),
            FailurePolicy::Bail => suite.bail_on_fail(),
            FailurePolicy::None => {}
        }
        if config.defer_plan {
            suite.enter_deferred_plan_mode()?;
        }
        Ok(suite)
    }

    /// Route harness events to `events`.
    #[must_use]
    pub fn with_event_log(mut self, events: EventLogHandle) -> Self {
        self.interceptor.attach_events(events.clone());
        self.events = Some(events);
        self
    }

    /// The wrapped result log.
    pub fn log(&self) -> &L {
        self.interceptor.log()
    }

    // ──────────────────── failure actions ────────────────────

    /// Replace the failure action.
    pub fn set_failure_action(&mut self, action: impl FailureAction + 'static) {
        self.interceptor.registry_mut().set_action(action);
    }

    /// Replace the failure action with a closure.
    pub fn on_fail<F>(&mut self, action: F)
    where
        F: FnMut(&FailureContext<'_>) -> Result<()> + 'static,
    {
        self.set_failure_action(action);
    }

    /// Abort the suite on the assertion following any failure.
    pub fn die_on_fail(&mut self) {
        self.set_failure_action(DieOnFail);
    }

    /// Terminate the process on the assertion following any failure.
    pub fn bail_on_fail(&mut self) {
        self.set_failure_action(BailOnFail::new().with_events(self.events.clone()));
    }

    /// Drop the failure action; later failures are only recorded.
    pub fn restore_fail(&mut self) {
        self.interceptor.registry_mut().restore();
    }

    /// Label of the active failure action.
    pub fn failure_action_label(&self) -> Option<&str> {
        self.interceptor.registry().label()
    }

    /// Whether the latest failure is still waiting for its action.
    pub fn has_pending_failure(&self) -> bool {
        self.interceptor.pending().is_some()
    }

    // ──────────────────── planning ────────────────────

    /// Declare the expected number of assertions up front.
    pub fn plan(&mut self, count: usize) -> Result<()> {
        self.ensure_running()?;
        let log = self.interceptor.log();
        if self.plan.is_deferred() {
            return Err(GuardError::PlanAlreadySet {
                existing: "deferred".to_string(),
            });
        }
        if let Some(existing) = log.expected_count() {
            return Err(GuardError::PlanAlreadySet {
                existing: format!("1..{existing}"),
            });
        }
        self.interceptor.log_mut().set_expected_count(count);
        Ok(())
    }

    /// Postpone the plan until [`Self::all_done`] or end of run.
    pub fn enter_deferred_plan_mode(&mut self) -> Result<()> {
        self.ensure_running()?;
        let was_deferred = self.plan.is_deferred();
        self.plan
            .enter_deferred_mode(self.interceptor.log_mut())?;
        if !was_deferred {
            self.emit_with(EventType::PlanDeferred, Severity::Info, |_| {});
        }
        Ok(())
    }

    /// Fix a deferred plan to `count`, or to the executed count when `None`.
    ///
    /// No-op (returns `None`) outside deferred mode.
    /// Also `None` once the suite has finished.
    pub fn finalize_deferred_plan(&mut self, count: Option<usize>) -> Option<usize> {
        if self.is_finished() {
            return None;
        }
        let resolved = self.plan.finalize(self.interceptor.log_mut(), count)?;
        let executed = self.interceptor.log().current_count();
        self.emit_with(EventType::PlanResolved, Severity::Info, |e| {
            e.expected = Some(resolved);
            e.executed = Some(executed);
        });
        Some(resolved)
    }

    /// Declare the suite complete. Alias for [`Self::finalize_deferred_plan`].
    pub fn all_done(&mut self, count: Option<usize>) -> Option<usize> {
        self.finalize_deferred_plan(count)
    }

    /// Deferred-plan state, for inspection.
    pub fn plan_controller(&self) -> &DeferredPlanController {
        &self.plan
    }

    // ──────────────────── assertions ────────────────────

    /// Record `passed` as the outcome of one assertion.
    ///
    /// A caller that catches a suite abort and keeps asserting resumes the
    /// run; the abort only marks the report if nothing was recorded after it.
    pub fn ok(&mut self, passed: bool, description: &str) -> Result<bool> {
        self.ensure_running()?;
        match self.interceptor.intercept(passed, description) {
            Ok(outcome) => {
                self.abort = None;
                Ok(outcome)
            }
            Err(err) => {
                if err.is_abort() {
                    self.abort = Some(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Record a passing assertion.
    pub fn pass(&mut self, description: &str) -> Result<bool> {
        self.ok(true, description)
    }

    /// Record a failing assertion.
    pub fn fail(&mut self, description: &str) -> Result<bool> {
        self.ok(false, description)
    }

    /// Equality assertion with got/expected diagnostics on failure.
    pub fn is<T>(&mut self, got: &T, expected: &T, description: &str) -> Result<bool>
    where
        T: PartialEq + Debug + ?Sized,
    {
        let passed = self.ok(got == expected, description)?;
        if !passed {
            self.diag(&format!(
                "         got: {got:?}\n    expected: {expected:?}"
            ));
        }
        Ok(passed)
    }

    /// Inequality assertion.
    pub fn isnt<T>(&mut self, got: &T, unexpected: &T, description: &str) -> Result<bool>
    where
        T: PartialEq + Debug + ?Sized,
    {
        let passed = self.ok(got != unexpected, description)?;
        if !passed {
            self.diag(&format!("         got: {got:?}\n    expected: anything else"));
        }
        Ok(passed)
    }

    /// Regex match assertion. An invalid pattern counts as a failure.
    pub fn like(&mut self, got: &str, pattern: &str, description: &str) -> Result<bool> {
        match Regex::new(pattern) {
            Ok(re) => {
                let passed = self.ok(re.is_match(got), description)?;
                if !passed {
                    self.diag(&format!(
                        "                  {got:?}\n    doesn't match '{pattern}'"
                    ));
                }
                Ok(passed)
            }
            Err(err) => {
                self.ok(false, description)?;
                self.diag(&format!("    invalid pattern '{pattern}': {err}"));
                Ok(false)
            }
        }
    }

    // ──────────────────── diagnostics ────────────────────

    /// Diagnostic comment on the result log.
    pub fn diag(&mut self, message: &str) {
        self.interceptor.log_mut().diag(message);
    }

    /// Informational comment on the result log.
    pub fn note(&mut self, message: &str) {
        self.interceptor.log_mut().note(message);
    }

    /// Dump `value` as a note and return the dump.
    pub fn explain<T: Serialize + ?Sized>(&mut self, value: &T) -> String {
        let rendered = dump::explain(value);
        self.note(&rendered);
        rendered
    }

    // ──────────────────── shutdown ────────────────────

    /// Whether [`Self::finish`] has run.
    pub fn is_finished(&self) -> bool {
        self.report.is_some()
    }

    /// Run the shutdown sequence once and return the tally.
    ///
    /// 1. Seal the suite; later assertions fail with `SuiteFinished`.
    /// 2. Fire the action for a trailing failure (no log reference is passed).
    /// 3. Resolve a deferred plan, forcing `executed + 1` if never resolved.
    /// 4. Let the result log report.
    ///
    /// Calling it again returns the stored tally.
    pub fn finish(&mut self) -> TallyReport {
        if let Some(report) = &self.report {
            return report.clone();
        }

        if let Err(err) = self.interceptor.fire_pending_at_end() {
            self.abort = Some(err.to_string());
        }

        let executed = self.interceptor.log().current_count();
        match self.plan.end_of_run(self.interceptor.log_mut()) {
            PlanResolution::Forced(forced) => {
                self.emit_with(EventType::PlanForced, Severity::Warning, |e| {
                    e.expected = Some(forced);
                    e.executed = Some(executed);
                    e.details = Some("deferred plan never resolved".to_string());
                });
            }
            PlanResolution::Resolved(_) | PlanResolution::NotDeferred => {}
        }

        if let Some(reason) = self.abort.clone() {
            self.diag(&format!("Suite stopped: {reason}"));
        }
        let mut report = self.interceptor.log_mut().report();
        report.aborted = self.abort.is_some();

        let code = report.exit_code();
        let (failed, expected) = (report.failed, report.expected);
        self.emit_with(
            EventType::SuiteFinish,
            if report.is_success() {
                Severity::Info
            } else {
                Severity::Warning
            },
            |e| {
                e.executed = Some(executed);
                e.expected = expected;
                e.exit_code = Some(code);
                e.details = Some(format!("failed={failed}"));
            },
        );
        if let Some(events) = &self.events {
            events.flush();
        }

        self.report = Some(report.clone());
        report
    }

    /// Finish, then terminate the process.
    ///
    /// The status is the tally's exit code when the run failed, else `code`.
    pub fn exit(mut self, code: i32) -> ! {
        let report = self.finish();
        let status = if report.is_success() {
            code
        } else {
            report.exit_code()
        };
        std::process::exit(status);
    }

    fn ensure_running(&self) -> Result<()> {
        if self.report.is_some() {
            return Err(GuardError::SuiteFinished);
        }
        Ok(())
    }

    fn emit_with(&self, event: EventType, severity: Severity, fill: impl FnOnce(&mut LogEntry)) {
        if let Some(events) = &self.events {
            let mut entry = LogEntry::new(event, severity);
            fill(&mut entry);
            events.emit(&entry);
        }
    }
}

impl<L: ResultLog> Drop for Suite<L> {
    fn drop(&mut self) {
        if self.report.is_none() {
            self.finish();
        }
    }
}

impl<L: ResultLog> fmt::Debug for Suite<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("executed", &self.interceptor.log().current_count())
            .field("action", &self.failure_action_label())
            .field("pending_failure", &self.has_pending_failure())
            .field("plan", &self.plan.state())
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

fn policy_label(policy: FailurePolicy) -> &'static str {
    match policy {
        FailurePolicy::None => "none",
        FailurePolicy::Die => "die",
        FailurePolicy::Bail => "bail",
    }
}
