//! Command-line client for a classical Chinese OCR service and its reading
//! assistant.

pub mod assistant;
pub mod backend;
pub mod commands;
pub mod config;
pub mod logging;
pub mod render;
pub mod session;

/// Version string with the commit and build time recorded by `build.rs`.
pub const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (commit: ",
    env!("GJ_GIT_SHA"),
    ", built: ",
    env!("GJ_BUILD_TS"),
    ")"
);
