//! End-to-end tests of detection, building and publication with in-memory
//! collaborators.

mod common;
mod detect_tests;
mod publish_tests;
