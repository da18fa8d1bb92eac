//! Line-oriented suite scripts replayed through a [`Suite`].
//!
//! ```text
//! # comment
//! defer
//! die
//! ok    parses the header
//! not ok rejects the trailer
//! done 2
//! ```
//!
//! Recognised directives: `plan N`, `defer`, `ok [desc]`, `not ok [desc]`,
//! `die`, `bail`, `restore`, `done [N]`, `diag TEXT`, `note TEXT`, `exit N`.

#![allow(missing_docs)]

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::core::errors::{GuardError, Result};
use crate::harness::result_log::{ResultLog, TallyReport};
use crate::harness::suite::Suite;

/// One parsed directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Plan(usize),
    Defer,
    Outcome { passed: bool, description: String },
    Die,
    Bail,
    Restore,
    Done(Option<usize>),
    Diag(String),
    Note(String),
    Exit(i32),
}

/// A directive plus the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub line: usize,
    pub step: Step,
}

/// Result of replaying a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    pub report: TallyReport,
    /// Status requested by an `exit N` directive, if one was reached.
    pub exit_requested: Option<i32>,
    /// Message of the error that stopped the replay, if any.
    pub stopped_by: Option<String>,
}

impl ScriptOutcome {
    /// Process status for this replay: the tally's code when the run failed,
    /// otherwise the requested exit status (default 0).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.report.is_success() {
            self.exit_requested.unwrap_or(0)
        } else {
            self.report.exit_code()
        }
    }
}

/// A parsed script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub lines: Vec<ScriptLine>,
}

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<cmd>not\s+ok|[a-z_]+)(?:\s+(?P<arg>.*?))?\s*$")
            .unwrap_or_else(|e| unreachable!("directive pattern is static: {e}"))
    })
}

impl Script {
    /// Parse script text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let step = parse_line(line, trimmed)?;
            lines.push(ScriptLine { line, step });
        }
        Ok(Self { lines })
    }

    /// Read and parse a script file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| GuardError::io(path, source))?;
        Self::parse(&text)
    }

    /// Replay every directive, then finish the suite.
    ///
    /// A suite abort stops the replay at that directive; the suite is still
    /// finished so the tally reflects the abort. Any other error is returned.
    pub fn run<L: ResultLog>(&self, suite: &mut Suite<L>) -> Result<ScriptOutcome> {
        let mut exit_requested = None;
        let mut stopped_by = None;

        for entry in &self.lines {
            let step_result = match &entry.step {
                Step::Plan(n) => suite.plan(*n),
                Step::Defer => suite.enter_deferred_plan_mode(),
                Step::Outcome {
                    passed,
                    description,
                } => suite.ok(*passed, description).map(|_| ()),
                Step::Die => {
                    suite.die_on_fail();
                    Ok(())
                }
                Step::Bail => {
                    suite.bail_on_fail();
                    Ok(())
                }
                Step::Restore => {
                    suite.restore_fail();
                    Ok(())
                }
                Step::Done(count) => {
                    suite.all_done(*count);
                    Ok(())
                }
                Step::Diag(text) => {
                    suite.diag(text);
                    Ok(())
                }
                Step::Note(text) => {
                    suite.note(text);
                    Ok(())
                }
                Step::Exit(code) => {
                    exit_requested = Some(*code);
                    break;
                }
            };

            match step_result {
                Ok(()) => {}
                Err(err) if err.is_abort() => {
                    stopped_by = Some(err.to_string());
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        let report = suite.finish();
        Ok(ScriptOutcome {
            report,
            exit_requested,
            stopped_by,
        })
    }
}

fn parse_line(line: usize, text: &str) -> Result<Step> {
    let caps = directive_re()
        .captures(text)
        .ok_or_else(|| GuardError::ScriptParse {
            line,
            details: format!("unrecognised line {text:?}"),
        })?;
    let cmd = caps.name("cmd").map_or("", |m| m.as_str());
    let arg = caps.name("arg").map(|m| m.as_str().to_string());

    let step = match cmd {
        "ok" => Step::Outcome {
            passed: true,
            description: strip_dash(arg.as_deref()),
        },
        "plan" => Step::Plan(required_number(line, cmd, arg.as_deref())?),
        "defer" => no_argument(line, cmd, arg.as_deref(), Step::Defer)?,
        "die" => no_argument(line, cmd, arg.as_deref(), Step::Die)?,
        "bail" => no_argument(line, cmd, arg.as_deref(), Step::Bail)?,
        "restore" => no_argument(line, cmd, arg.as_deref(), Step::Restore)?,
        "done" => Step::Done(match arg.as_deref() {
            None => None,
            Some(raw) => Some(parse_number(line, cmd, raw)?),
        }),
        "diag" => Step::Diag(arg.unwrap_or_default()),
        "note" => Step::Note(arg.unwrap_or_default()),
        "exit" => Step::Exit(required_number(line, cmd, arg.as_deref())?),
        other if other.split_whitespace().eq(["not", "ok"]) => Step::Outcome {
            passed: false,
            description: strip_dash(arg.as_deref()),
        },
        other => {
            return Err(GuardError::ScriptParse {
                line,
                details: format!("unknown directive {other:?}"),
            });
        }
    };
    Ok(step)
}

fn strip_dash(arg: Option<&str>) -> String {
    let raw = arg.unwrap_or("");
    raw.strip_prefix("- ")
        .or_else(|| raw.strip_prefix('-'))
        .unwrap_or(raw)
        .trim()
        .to_string()
}

fn no_argument(line: usize, cmd: &str, arg: Option<&str>, step: Step) -> Result<Step> {
    match arg {
        None => Ok(step),
        Some(extra) => Err(GuardError::ScriptParse {
            line,
            details: format!("{cmd} takes no argument, got {extra:?}"),
        }),
    }
}

fn required_number<T: std::str::FromStr>(line: usize, cmd: &str, arg: Option<&str>) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = arg.ok_or_else(|| GuardError::ScriptParse {
        line,
        details: format!("{cmd} needs a number"),
    })?;
    parse_number(line, cmd, raw)
}

fn parse_number<T: std::str::FromStr>(line: usize, cmd: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| GuardError::ScriptParse {
        line,
        details: format!("{cmd} {raw:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::result_log::TapLog;

    fn steps(text: &str) -> Vec<Step> {
        Script::parse(text)
            .unwrap()
            .lines
            .into_iter()
            .map(|l| l.step)
            .collect()
    }

    #[test]
    fn parses_every_directive() {
        let parsed = steps(
            "# header\n\
             plan 3\n\
             defer\n\
             ok - first\n\
             not ok second\n\
             not   ok\n\
             die\nbail\nrestore\n\
             done\ndone 4\n\
             diag look here\nnote fyi\n\
             exit 3\n",
        );
        assert_eq!(
            parsed,
            vec![
                Step::Plan(3),
                Step::Defer,
                Step::Outcome {
                    passed: true,
                    description: "first".to_string()
                },
                Step::Outcome {
                    passed: false,
                    description: "second".to_string()
                },
                Step::Outcome {
                    passed: false,
                    description: String::new()
                },
                Step::Die,
                Step::Bail,
                Step::Restore,
                Step::Done(None),
                Step::Done(Some(4)),
                Step::Diag("look here".to_string()),
                Step::Note("fyi".to_string()),
                Step::Exit(3),
            ]
        );
    }

    #[test]
    fn line_numbers_skip_blanks_and_comments() {
        let script = Script::parse("\n# c\nok a\n\nok b\n").unwrap();
        let numbers: Vec<usize> = script.lines.iter().map(|l| l.line).collect();
        assert_eq!(numbers, vec![3, 5]);
    }

    #[test]
    fn unknown_directive_is_rejected_with_line() {
        let err = Script::parse("ok a\nfrobnicate\n").unwrap_err();
        match err {
            GuardError::ScriptParse { line, details } => {
                assert_eq!(line, 2);
                assert!(details.contains("frobnicate"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_numbers_are_rejected() {
        assert!(Script::parse("plan many").is_err());
        assert!(Script::parse("plan").is_err());
        assert!(Script::parse("die now").is_err());
        assert!(Script::parse("exit -1").is_ok());
        assert!(Script::parse("nothing").is_err());
    }

    #[test]
    fn replay_with_die_stops_at_next_assertion() {
        let script = Script::parse("die\nplan 3\nok\nnot ok\nok\n").unwrap();
        let mut suite = Suite::new(TapLog::buffered());
        let outcome = script.run(&mut suite).unwrap();
        assert!(outcome.stopped_by.is_some());
        assert_eq!(outcome.report.executed, 2);
        assert!(outcome.report.aborted);
        assert_eq!(outcome.exit_code(), 255);
    }

    #[test]
    fn replay_deferred_without_done_is_forced() {
        let script = Script::parse("defer\nok\nok\nexit 0\nok\n").unwrap();
        let mut suite = Suite::new(TapLog::buffered());
        let outcome = script.run(&mut suite).unwrap();
        assert_eq!(outcome.exit_requested, Some(0));
        assert_eq!(outcome.report.executed, 2);
        assert_eq!(outcome.report.expected, Some(3));
        assert_eq!(outcome.exit_code(), 255);
    }

    #[test]
    fn clean_replay_honours_exit_request() {
        let script = Script::parse("defer\nok\ndone\nexit 7\n").unwrap();
        let mut suite = Suite::new(TapLog::buffered());
        let outcome = script.run(&mut suite).unwrap();
        assert!(outcome.report.is_success());
        assert_eq!(outcome.exit_code(), 7);
    }

    #[test]
    fn harness_misuse_is_an_error() {
        let script = Script::parse("plan 1\nplan 2\n").unwrap();
        let mut suite = Suite::new(TapLog::buffered());
        let err = script.run(&mut suite).unwrap_err();
        assert_eq!(err.code(), "SG-2001");
    }
}
