//! Failure-reaction policy and deferred plan accounting over a result log.
//!
//! Leaf to root: [`result_log`] records outcomes, [`registry`] holds the
//! active [`actions`] entry, [`interceptor`] applies it one assertion late,
//! [`plan`] resolves deferred plans, and [`suite`] ties them together with an
//! ordered shutdown.

pub mod actions;
pub mod interceptor;
pub mod plan;
pub mod registry;
pub mod result_log;
pub mod suite;
