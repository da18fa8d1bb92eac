//! Result log: the pass/fail recording primitive and its TAP implementation.
//!
//! The log owns the executed count, the failed count and the plan. It knows
//! nothing about failure reactions; those are layered on by
//! [`AssertionInterceptor`](crate::harness::interceptor::AssertionInterceptor).

use std::fmt::Write as _;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// A single recorded assertion outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// 1-based assertion number.
    pub number: usize,
    /// Recorded result.
    pub passed: bool,
    /// Description as given (unescaped).
    pub description: String,
}

/// Final tally produced once a suite has stopped running assertions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyReport {
    /// Assertions recorded.
    pub executed: usize,
    /// Assertions recorded as failed.
    pub failed: usize,
    /// Plan in effect when the report was produced (`None` = never declared).
    pub expected: Option<usize>,
    /// Executed count disagrees with the plan, or no plan was declared.
    pub plan_mismatch: bool,
    /// A failure action stopped the suite.
    pub aborted: bool,
}

impl TallyReport {
    /// Process exit status following the usual TAP harness convention.
    ///
    /// Failures report their count (capped at 254); an abort or a plan
    /// problem with no failures reports 255.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.aborted {
            return 255;
        }
        if self.failed > 0 {
            return i32::try_from(self.failed.min(254)).unwrap_or(254);
        }
        if self.plan_mismatch {
            return 255;
        }
        0
    }

    /// Whether the run should be considered a pass.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

/// The recording primitive a suite's assertions flow into.
pub trait ResultLog {
    /// Record one outcome and return it unchanged.
    fn record_outcome(&mut self, passed: bool, description: &str) -> bool;

    /// Outcome of the most recent assertion, if any ran.
    fn last_outcome(&self) -> Option<bool>;

    /// Number of assertions executed so far. Only ever increases.
    fn current_count(&self) -> usize;

    /// Number of executed assertions that failed.
    fn failed_count(&self) -> usize;

    /// Every recorded outcome, in execution order.
    fn outcomes(&self) -> &[Outcome];

    /// The fixed expected count, once known.
    fn expected_count(&self) -> Option<usize>;

    /// Fix the expected count. May be called again to replace a deferred value.
    fn set_expected_count(&mut self, count: usize);

    /// Whether a plan counts as declared (fixed, or deferred to the end).
    fn has_expected_count(&self) -> bool;

    /// Mark the plan as declared but not yet known.
    fn declare_deferred_plan(&mut self);

    /// Emit a diagnostic line for humans.
    fn diag(&mut self, message: &str);

    /// Emit an informational line for humans.
    fn note(&mut self, message: &str);

    /// Push buffered output to its destination.
    fn flush(&mut self);

    /// Produce the final tally and emit closing diagnostics.
    fn report(&mut self) -> TallyReport;

    /// Outcome for assertion `number` (1-based).
    fn outcome_at(&self, number: usize) -> Option<&Outcome> {
        number
            .checked_sub(1)
            .and_then(|index| self.outcomes().get(index))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanState {
    Unset,
    Deferred,
    Fixed(usize),
}

/// TAP-producing result log writing to any [`Write`] sink.
///
/// Write errors on the sink are reported once to stderr and otherwise
/// ignored; the in-memory tally stays authoritative.
pub struct TapLog<W: Write = Vec<u8>> {
    out: W,
    outcomes: Vec<Outcome>,
    failed: usize,
    plan: PlanState,
    plan_emitted: bool,
    write_failed: bool,
}

impl TapLog<Vec<u8>> {
    /// In-memory log, handy for tests and for capturing output.
    #[must_use]
    pub fn buffered() -> Self {
        Self::new(Vec::new())
    }

    /// Everything written so far, as text.
    #[must_use]
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.out).into_owned()
    }
}

impl TapLog<io::Stdout> {
    /// Log writing TAP to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TapLog<W> {
    /// Log writing TAP to `out`.
    pub fn new(out: W) -> Self {
        Self {
            out,
            outcomes: Vec::new(),
            failed: 0,
            plan: PlanState::Unset,
            plan_emitted: false,
            write_failed: false,
        }
    }

    /// Borrow the underlying sink.
    pub fn sink(&self) -> &W {
        &self.out
    }

    fn line(&mut self, text: &str) {
        if writeln!(self.out, "{text}").is_err() && !self.write_failed {
            self.write_failed = true;
            eprintln!("[SG-TAP] output sink rejected a write; further TAP output may be lost");
        }
    }

    fn comment(&mut self, message: &str) {
        for text in message.lines() {
            if text.is_empty() {
                self.line("#");
            } else {
                let rendered = format!("# {text}");
                self.line(&rendered);
            }
        }
    }

    fn emit_plan(&mut self, count: usize) {
        let rendered = format!("1..{count}");
        self.line(&rendered);
        self.plan_emitted = true;
    }
}

impl<W: Write> ResultLog for TapLog<W> {
    fn record_outcome(&mut self, passed: bool, description: &str) -> bool {
        let number = self.outcomes.len() + 1;
        let mut rendered = String::new();
        if !passed {
            rendered.push_str("not ");
        }
        let _ = write!(rendered, "ok {number}");
        if !description.is_empty() {
            let escaped = description.replace('#', "\\#").replace('\n', "\n# ");
            let _ = write!(rendered, " - {escaped}");
        }
        self.line(&rendered);

        if !passed {
            self.failed += 1;
            if description.is_empty() {
                self.comment(&format!("  Failed test {number}"));
            } else {
                self.comment(&format!("  Failed test '{description}'"));
            }
        }

        self.outcomes.push(Outcome {
            number,
            passed,
            description: description.to_string(),
        });
        passed
    }

    fn last_outcome(&self) -> Option<bool> {
        self.outcomes.last().map(|o| o.passed)
    }

    fn current_count(&self) -> usize {
        self.outcomes.len()
    }

    fn failed_count(&self) -> usize {
        self.failed
    }

    fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    fn expected_count(&self) -> Option<usize> {
        match self.plan {
            PlanState::Fixed(n) => Some(n),
            PlanState::Unset | PlanState::Deferred => None,
        }
    }

    fn set_expected_count(&mut self, count: usize) {
        let up_front = self.plan == PlanState::Unset && self.outcomes.is_empty();
        self.plan = PlanState::Fixed(count);
        if up_front {
            self.emit_plan(count);
        }
    }

    fn has_expected_count(&self) -> bool {
        self.plan != PlanState::Unset
    }

    fn declare_deferred_plan(&mut self) {
        if self.plan == PlanState::Unset {
            self.plan = PlanState::Deferred;
        }
    }

    fn diag(&mut self, message: &str) {
        self.comment(message);
    }

    fn note(&mut self, message: &str) {
        self.comment(message);
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn report(&mut self) -> TallyReport {
        let executed = self.outcomes.len();
        let expected = self.expected_count();

        if let Some(n) = expected
            && !self.plan_emitted
        {
            self.emit_plan(n);
        }

        let plan_mismatch = match expected {
            Some(n) if n != executed => {
                self.comment(&format!(
                    "Looks like you planned {n} {} but ran {executed}.",
                    tests_word(n)
                ));
                true
            }
            Some(_) => false,
            None if executed == 0 => {
                self.comment("No tests run!");
                true
            }
            None => {
                self.comment("Tests were run but no plan was declared.");
                true
            }
        };

        if self.failed > 0 {
            let failed = self.failed;
            self.comment(&format!(
                "Looks like you failed {failed} {} of {executed} run.",
                tests_word(failed)
            ));
        }
        self.flush();

        TallyReport {
            executed,
            failed: self.failed,
            expected,
            plan_mismatch,
            aborted: false,
        }
    }
}

fn tests_word(n: usize) -> &'static str {
    if n == 1 { "test" } else { "tests" }
}
