//! Configuration system: TOML file + env var overrides + modifier lists.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{GuardError, Result};

/// Environment switch that installs die-on-fail at suite start.
pub const ENV_DIE_ON_FAIL: &str = "DIE_ON_FAIL";
/// Environment switch that installs bail-on-fail at suite start.
pub const ENV_BAIL_ON_FAIL: &str = "BAIL_ON_FAIL";
/// Environment switch that enters deferred-plan mode at suite start.
pub const ENV_DEFER_PLAN: &str = "SUITE_GUARD_DEFER_PLAN";
/// Environment override for the JSONL event log path.
pub const ENV_EVENT_LOG: &str = "SUITE_GUARD_EVENT_LOG";

/// Harness behaviour resolved before a suite is constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct HarnessConfig {
    /// Raise a suite abort before the assertion following a failure.
    pub die_on_fail: bool,
    /// Terminate the process before the assertion following a failure.
    pub bail_on_fail: bool,
    /// Postpone the plan until `all_done` or end of run.
    pub defer_plan: bool,
    /// Optional JSONL event log.
    pub event_log: Option<PathBuf>,
    /// Colorize the closing summary line (CLI only).
    pub color: ColorChoice,
}

/// Color policy for human-facing output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

/// Failure-reaction policy derived from the die/bail switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record failures and keep going.
    None,
    /// Raise a suite abort on the next assertion.
    Die,
    /// Terminate the process on the next assertion.
    Bail,
}

impl HarnessConfig {
    /// Default configuration path (`suite_guard.toml` in the working directory).
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from("suite_guard.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| GuardError::Io {
                path: path_buf.clone(),
                source,
            })?;
            toml::from_str(&raw)?
        } else if path.is_some() {
            return Err(GuardError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply environment switches through an injectable lookup.
    ///
    /// Switches only ever turn behaviour on; an explicit `false` leaves a
    /// file-configured `true` alone.
    pub fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_DIE_ON_FAIL) {
            self.die_on_fail |= parse_switch(ENV_DIE_ON_FAIL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_BAIL_ON_FAIL) {
            self.bail_on_fail |= parse_switch(ENV_BAIL_ON_FAIL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_DEFER_PLAN) {
            self.defer_plan |= parse_switch(ENV_DEFER_PLAN, &raw)?;
        }
        if let Some(raw) = lookup(ENV_EVENT_LOG) {
            self.event_log = Some(PathBuf::from(raw));
        }
        Ok(())
    }

    /// Fold an already-parsed modifier list into this config.
    #[must_use]
    pub fn with_modifiers(mut self, modifiers: &Modifiers) -> Self {
        self.die_on_fail |= modifiers.die;
        self.bail_on_fail |= modifiers.bail;
        self.defer_plan |= modifiers.defer_plan;
        self
    }

    /// Resolve the failure policy. Bail wins when both switches are set.
    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        if self.bail_on_fail {
            FailurePolicy::Bail
        } else if self.die_on_fail {
            FailurePolicy::Die
        } else {
            FailurePolicy::None
        }
    }

    /// Render the effective config as TOML.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<()> {
        if let Some(path) = &self.event_log
            && path.as_os_str().is_empty()
        {
            return Err(GuardError::InvalidConfig {
                details: "event_log must not be an empty path".to_string(),
            });
        }
        Ok(())
    }
}

/// Behaviour modifiers mixed into a harness argument list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub die: bool,
    pub bail: bool,
    pub defer_plan: bool,
    /// Arguments that were not modifiers, in their original order.
    pub remaining: Vec<String>,
}

impl Modifiers {
    /// Split `die`, `bail` and `defer_plan` out of an argument list.
    ///
    /// Everything else is passed through untouched for the underlying harness.
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = Self::default();
        for arg in args {
            let arg = arg.into();
            match arg.as_str() {
                "die" => out.die = true,
                "bail" => out.bail = true,
                "defer_plan" => out.defer_plan = true,
                _ => out.remaining.push(arg),
            }
        }
        out
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_switch(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(GuardError::ConfigParse {
            context: "env",
            details: format!("{name}={raw:?}: expected a boolean switch"),
        }),
    }
}
