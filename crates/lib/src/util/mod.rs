//! Shared utilities.

pub mod cmd;
