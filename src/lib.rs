//! sycl-post-link - device code post-link processing.
//!
//! Takes a single linked device module and prepares it for offloading:
//! kernels are grouped into partitions by source or one per kernel, each
//! partition is cloned into its own module together with everything it
//! transitively calls, specialization constant intrinsics are lowered, and
//! the produced artifacts are listed in a file table.
//!
//! # Primary Usage
//!
//! ```no_run
//! use sycl_post_link::core::{PostLinkConfig, SplitMode};
//! use sycl_post_link::driver;
//!
//! let config = PostLinkConfig {
//!     split: Some(SplitMode::Kernel),
//!     symbols: true,
//!     ..PostLinkConfig::new("device.bc")
//! };
//! let outcome = driver::run(&config)?;
//! # Ok::<(), sycl_post_link::PostLinkError>(())
//! ```
//!
//! # Architecture
//!
//! - [`core`] - Shared infrastructure (errors, run configuration)
//! - [`ir`] - Device IR data structures, text and binary encodings, cleanups
//! - [`split`] - Kernel grouping, dependency closure and module splitting
//! - [`spec_const`] - Specialization constant lowering
//! - [`output`] - File table, property sets and artifact writing
//! - [`driver`] - The end-to-end pipeline

pub mod core;
pub mod driver;
pub mod ir;
pub mod output;
pub mod spec_const;
pub mod split;

pub use crate::core::{PostLinkConfig, PostLinkError, PostLinkResult, SpecConstMode, SplitMode};
pub use crate::driver::{run, Outcome};
pub use crate::ir::{parse_module, read_module_file, Module};
pub use crate::spec_const::{SpecConstantsPass, SpecIdMap};
pub use crate::split::{split_module, KernelModuleMap};
