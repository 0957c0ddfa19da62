//! Host platform helpers.

pub mod paths;
