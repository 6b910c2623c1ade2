// This module collects the pieces every post-link stage shares: the error taxonomy
// (usage, parse, I/O, table and specialization constant failures) and the immutable
// run configuration built once from the command line. Stages receive the configuration
// by reference and report failures through PostLinkResult, so no stage reads global
// option state and no stage decides on its own how to exit.

//! Shared infrastructure: errors and run configuration.

pub mod config;
pub mod error;

pub use config::{PostLinkConfig, SpecConstMode, SplitMode};
pub use error::{PostLinkError, PostLinkResult};
