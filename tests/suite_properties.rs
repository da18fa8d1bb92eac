//! Property-based tests for failure-action timing and deferred plans.
//!
//! Uses `proptest` to drive a suite with arbitrary pass/fail sequences and
//! checks that actions fire once per failure, always before the following
//! assertion is recorded, and that an unresolved deferred plan is always
//! forced one past the executed count.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use suite_guard::prelude::*;

/// Per-call record: (failed test, next test, outcomes recorded at fire time).
type Calls = Rc<RefCell<Vec<(usize, Option<usize>, Option<usize>)>>>;

fn recording_suite() -> (Suite<TapLog>, Calls) {
    let mut suite = Suite::new(TapLog::buffered());
    let calls: Calls = Rc::default();
    let sink = Rc::clone(&calls);
    suite.on_fail(move |ctx| {
        sink.borrow_mut().push((
            ctx.failed_test,
            ctx.trigger.next_test(),
            ctx.log.map(ResultLog::current_count),
        ));
        Ok(())
    });
    (suite, calls)
}

fn recorded(suite: &Suite<TapLog>) -> Vec<bool> {
    suite.log().outcomes().iter().map(|o| o.passed).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Without an action, outcomes pass through unchanged and in order.
    #[test]
    fn plain_suite_records_inputs_verbatim(
        inputs in prop::collection::vec(any::<bool>(), 0..40)
    ) {
        let mut suite = Suite::new(TapLog::buffered());
        suite.enter_deferred_plan_mode().unwrap();
        for (i, passed) in inputs.iter().enumerate() {
            let got = suite.ok(*passed, &format!("case {i}")).unwrap();
            prop_assert_eq!(got, *passed);
        }
        prop_assert_eq!(recorded(&suite), inputs.clone());
        suite.all_done(None);
        let report = suite.finish();
        prop_assert_eq!(report.failed, inputs.iter().filter(|p| !**p).count());
        prop_assert!(!report.aborted);
    }

    /// Each non-final failure fires exactly once, before the next outcome.
    #[test]
    fn action_fires_once_between_failure_and_next(
        inputs in prop::collection::vec(any::<bool>(), 1..40)
    ) {
        let (mut suite, calls) = recording_suite();
        suite.plan(inputs.len()).unwrap();
        for passed in &inputs {
            suite.ok(*passed, "").unwrap();
        }

        let expected: Vec<_> = inputs[..inputs.len() - 1]
            .iter()
            .enumerate()
            .filter(|(_, passed)| !**passed)
            .map(|(i, _)| (i + 1, Some(i + 2), Some(i + 1)))
            .collect();
        prop_assert_eq!(&*calls.borrow(), &expected);
        prop_assert_eq!(suite.has_pending_failure(), !inputs[inputs.len() - 1]);

        suite.finish();
        let total_failures = inputs.iter().filter(|p| !**p).count();
        prop_assert_eq!(calls.borrow().len(), total_failures);
        if let Some(&(failed, next, log)) = calls.borrow().last()
            && !inputs[inputs.len() - 1]
        {
            prop_assert_eq!(failed, inputs.len());
            prop_assert_eq!(next, None);
            prop_assert_eq!(log, None);
        }
    }

    /// Restoring the default reaction silences every later failure.
    #[test]
    fn restore_silences_later_failures(
        inputs in prop::collection::vec(any::<bool>(), 0..30)
    ) {
        let (mut suite, calls) = recording_suite();
        suite.restore_fail();
        suite.restore_fail();
        suite.enter_deferred_plan_mode().unwrap();
        for passed in &inputs {
            suite.ok(*passed, "").unwrap();
        }
        suite.finish();
        prop_assert!(calls.borrow().is_empty());
    }

    /// An unresolved deferred plan is forced to executed + 1.
    #[test]
    fn unresolved_deferred_plan_is_forced(runs in 0usize..30) {
        let mut suite = Suite::new(TapLog::buffered());
        suite.enter_deferred_plan_mode().unwrap();
        for _ in 0..runs {
            suite.pass("").unwrap();
        }
        let report = suite.finish();
        prop_assert_eq!(report.expected, Some(runs + 1));
        prop_assert!(report.plan_mismatch);
        prop_assert_eq!(report.exit_code(), 255);
    }

    /// An explicit count wins regardless of how many assertions ran.
    #[test]
    fn explicit_finalize_is_exact(runs in 0usize..20, declared in 0usize..20) {
        let mut suite = Suite::new(TapLog::buffered());
        suite.enter_deferred_plan_mode().unwrap();
        for _ in 0..runs {
            suite.pass("").unwrap();
        }
        prop_assert_eq!(suite.all_done(Some(declared)), Some(declared));
        let report = suite.finish();
        prop_assert_eq!(report.expected, Some(declared));
        prop_assert_eq!(report.plan_mismatch, runs != declared);
    }

    /// Die-on-fail stops at the first failure that has a successor.
    #[test]
    fn die_stops_right_after_first_failure(
        inputs in prop::collection::vec(any::<bool>(), 1..30)
    ) {
        let mut suite = Suite::new(TapLog::buffered());
        suite.plan(inputs.len()).unwrap();
        suite.die_on_fail();
        let mut aborted_at = None;
        for (i, passed) in inputs.iter().enumerate() {
            if let Err(err) = suite.ok(*passed, "") {
                prop_assert_eq!(err.code(), "SG-1001");
                aborted_at = Some(i);
                break;
            }
        }

        let first_failure = inputs.iter().position(|p| !*p);
        match first_failure {
            Some(f) if f + 1 < inputs.len() => {
                prop_assert_eq!(aborted_at, Some(f + 1));
                prop_assert_eq!(recorded(&suite), inputs[..=f].to_vec());
            }
            _ => {
                prop_assert_eq!(aborted_at, None);
                prop_assert_eq!(recorded(&suite), inputs.clone());
            }
        }

        let report = suite.finish();
        prop_assert_eq!(report.aborted, first_failure.is_some());
    }
}
