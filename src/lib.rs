#![forbid(unsafe_code)]

//! suite_guard — failure-reaction policy and deferred plan accounting for
//! TAP-style test suites.
//!
//! A [`Suite`](harness::suite::Suite) wraps a result log and adds:
//! 1. **Fail-fast policies**: die-on-fail raises a suite abort, bail-on-fail
//!    terminates the process, custom actions do anything else. The reaction
//!    fires just before the assertion *after* the failure, or at end of run.
//! 2. **Deferred plans**: declare the assertion count when the suite is done;
//!    a suite that never says so is forced into a plan mismatch.
//! 3. **Structured diagnostics**: value dumps and a JSONL event log.
//!
//! # Library usage
//!
//! ```rust
//! use suite_guard::prelude::*;
//!
//! fn run(suite: &mut Suite<TapLog>) -> Result<()> {
//!     suite.enter_deferred_plan_mode()?;
//!     suite.die_on_fail();
//!     suite.is(&(2 + 2), &4, "arithmetic")?;
//!     suite.like("suite_guard", "^suite", "prefix")?;
//!     suite.all_done(None);
//!     Ok(())
//! }
//!
//! let mut suite = Suite::new(TapLog::buffered());
//! run(&mut suite).unwrap();
//! assert!(suite.finish().is_success());
//! ```

pub mod prelude;

pub mod core;
pub mod diag;
pub mod harness;
pub mod logger;
pub mod script;
