//! Structured JSONL event logging for harness decisions.

pub mod jsonl;
