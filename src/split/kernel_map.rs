//! Grouping of kernels into partitions.

use std::collections::BTreeMap;

use crate::ir::{Module, ATTR_SYCL_MODULE_ID};

/// Kernel names grouped by partition key.
///
/// Keys iterate in ascending order, which fixes the order of partitions and
/// of every per-partition output file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelModuleMap {
    groups: BTreeMap<String, Vec<String>>,
}

impl KernelModuleMap {
    /// Group the module's kernels.
    ///
    /// With `one_kernel_per_module` every kernel is keyed by its own name.
    /// Otherwise kernels are keyed by their `sycl-module-id` attribute and
    /// kernels without it are left out.
    pub fn collect(module: &Module, one_kernel_per_module: bool) -> Self {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for f in module.kernels() {
            let key = if one_kernel_per_module {
                Some(f.name.as_str())
            } else {
                f.attribute(ATTR_SYCL_MODULE_ID)
            };
            match key {
                Some(key) => groups
                    .entry(key.to_string())
                    .or_default()
                    .push(f.name.clone()),
                None => log::debug!(
                    "kernel @{} has no '{}' attribute; not assigned to a partition",
                    f.name,
                    ATTR_SYCL_MODULE_ID
                ),
            }
        }

        for (key, kernels) in &groups {
            log::debug!("partition '{}': {}", key, kernels.join(", "));
        }
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.groups
            .iter()
            .map(|(key, kernels)| (key.as_str(), kernels.as_slice()))
    }

    /// One newline-terminated list of kernel names per group.
    pub fn symbols_lists(&self) -> Vec<String> {
        self.groups
            .values()
            .map(|kernels| symbols_list(kernels.iter()))
            .collect()
    }

    /// All grouped kernel names as a single list, for unsplit output.
    pub fn merged_symbols_list(&self) -> String {
        symbols_list(self.groups.values().flatten())
    }
}

fn symbols_list<'a>(names: impl Iterator<Item = &'a String>) -> String {
    let mut list = String::new();
    for name in names {
        list.push_str(name);
        list.push('\n');
    }
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::parse_module;

    const KERNELS: &str = r#"
define spir_kernel void @k2() #"sycl-module-id"="b.cpp" {
entry:
  ret
}
define spir_kernel void @k1() #"sycl-module-id"="a.cpp" {
entry:
  ret
}
define spir_kernel void @k3() #"sycl-module-id"="a.cpp" {
entry:
  ret
}
define spir_kernel void @loose() {
entry:
  ret
}
define spir_func void @not_a_kernel() #"sycl-module-id"="a.cpp" {
entry:
  ret
}
"#;

    #[test]
    fn test_group_by_module_id() {
        let module = parse_module(KERNELS).unwrap();
        let map = KernelModuleMap::collect(&module, false);
        let groups: Vec<(&str, &[String])> = map.iter().collect();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "a.cpp");
        assert_eq!(groups[0].1, ["k1".to_string(), "k3".to_string()]);
        assert_eq!(groups[1].0, "b.cpp");
        assert_eq!(map.symbols_lists(), vec!["k1\nk3\n", "k2\n"]);
    }

    #[test]
    fn test_one_kernel_per_module() {
        let module = parse_module(KERNELS).unwrap();
        let map = KernelModuleMap::collect(&module, true);
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["k1", "k2", "k3", "loose"]);
        assert_eq!(map.merged_symbols_list(), "k1\nk2\nk3\nloose\n");
    }

    #[test]
    fn test_no_grouped_kernels() {
        let module = parse_module("define spir_kernel void @k() {\nentry:\n  ret\n}\n").unwrap();
        let map = KernelModuleMap::collect(&module, false);
        assert!(map.is_empty());
        assert_eq!(map.merged_symbols_list(), "");
    }
}
