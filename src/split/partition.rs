//! Module splitting.

use crate::ir::{cleanup, clone_module, Module};

use super::closure::ClosureBuilder;
use super::kernel_map::KernelModuleMap;

/// Produce one module per group of `kernel_map`, in key order.
///
/// Each result is a clone of `module` in which only the group's kernels,
/// the functions they transitively call and the global variables are
/// defined. Everything else starts as a declaration and is deleted by the
/// cleanup passes if unreferenced. An empty map yields no modules.
pub fn split_module(module: &Module, kernel_map: &KernelModuleMap) -> Vec<Module> {
    let builder = ClosureBuilder::new(module);
    let mut result = Vec::with_capacity(kernel_map.len());

    for (key, kernels) in kernel_map.iter() {
        let deps = builder.collect(kernels);
        let mut part = clone_module(module, |name| deps.contains(name));

        cleanup::global_dce(&mut part);
        cleanup::strip_dead_debug_info(&mut part);
        cleanup::strip_dead_prototypes(&mut part);

        log::info!(
            "partition {} ('{}'): {} kernels, {} functions, {} globals",
            result.len(),
            key,
            kernels.len(),
            part.functions.len(),
            part.globals.len()
        );
        result.push(part);
    }
    result
}
