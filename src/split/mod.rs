// This module implements the device code splitter. Kernels (functions with the
// spir_kernel calling convention) are grouped into partitions either by their
// sycl-module-id attribute, which names the translation unit they came from, or one
// partition per kernel. For each partition a dependency closure over direct calls is
// computed, the input module is cloned with only that closure materialized, and the
// clone is cleaned of everything it no longer references.

//! Module splitting: kernel grouping, dependency closure, partitioning.

pub mod closure;
pub mod kernel_map;
pub mod partition;

pub use closure::{ClosureBuilder, Dependencies};
pub use kernel_map::KernelModuleMap;
pub use partition::split_module;
