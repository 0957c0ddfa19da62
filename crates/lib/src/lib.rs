//! checkbuild-lib: change detection, versioning, building and publication of checks
//!
//! A check is a directory holding the sources of one independently versioned
//! container image. This crate provides:
//! - [`detect`]: which checks changed since their last published build
//! - [`version`]: the next tag for a check
//! - [`build`]: compiling, packaging and building images
//! - [`publish`]: pushing images and announcing them, tier by tier
//! - [`pipeline`]: batches tying the above together
//! - [`queue`]: an in-memory message queue for test harnesses

pub mod artifact;
pub mod build;
pub mod config;
pub mod consts;
pub mod detect;
pub mod git;
pub mod manifest;
pub mod persistence;
pub mod pipeline;
pub mod platform;
pub mod publish;
pub mod queue;
pub mod registry;
pub mod toolchain;
pub mod util;
pub mod version;
