//! Human-facing diagnostic helpers.

pub mod dump;
