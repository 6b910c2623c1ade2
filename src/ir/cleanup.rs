// This module implements the module cleanup passes run on every partition clone:
// global dead-code elimination, dead debug info stripping, and dead prototype
// stripping. Global DCE starts from every definition that cannot be discarded
// (non-local linkage) and follows references through function bodies and global
// initializers; everything it does not reach is deleted, including unreferenced
// declarations. Dead prototype stripping removes function declarations with no
// remaining uses, and dead debug info stripping drops subprogram records whose
// function is gone together with compile units no live subprogram points to.

//! Cleanup passes for partition clones.

use hashbrown::HashSet;

use super::{DebugKind, Module};

/// Names of global values reachable from the module's non-discardable definitions.
fn live_global_values(module: &Module) -> HashSet<&str> {
    let mut live: HashSet<&str> = HashSet::new();
    let mut worklist: Vec<&str> = Vec::new();

    for f in &module.functions {
        if !f.is_declaration() && !f.linkage.is_discardable_if_unused() && live.insert(&f.name) {
            worklist.push(&f.name);
        }
    }
    for g in &module.globals {
        if !g.is_declaration() && !g.linkage.is_discardable_if_unused() && live.insert(&g.name) {
            worklist.push(&g.name);
        }
    }

    while let Some(name) = worklist.pop() {
        let refs: Vec<&str> = if let Some(f) = module.function(name) {
            f.instructions().flat_map(|inst| inst.global_refs()).collect()
        } else if let Some(g) = module.global(name) {
            g.global_refs()
        } else {
            Vec::new()
        };
        for r in refs {
            if live.insert(r) {
                worklist.push(r);
            }
        }
    }
    live
}

/// Delete every global value not reachable from a non-discardable definition.
pub fn global_dce(module: &mut Module) -> bool {
    let dead: HashSet<String> = {
        let live = live_global_values(module);
        module
            .functions
            .iter()
            .map(|f| &f.name)
            .chain(module.globals.iter().map(|g| &g.name))
            .filter(|name| !live.contains(name.as_str()))
            .cloned()
            .collect()
    };
    if dead.is_empty() {
        return false;
    }

    log::debug!("global DCE: removing {} dead global values", dead.len());
    for name in &dead {
        log::trace!("  removed @{name}");
    }
    module.functions.retain(|f| !dead.contains(&f.name));
    module.globals.retain(|g| !dead.contains(&g.name));
    true
}

/// Remove function declarations nothing refers to.
pub fn strip_dead_prototypes(module: &mut Module) -> bool {
    let dead: HashSet<String> = module
        .functions
        .iter()
        .filter(|f| f.is_declaration() && !module.is_referenced(&f.name))
        .map(|f| f.name.clone())
        .collect();
    if dead.is_empty() {
        return false;
    }

    log::debug!("removing {} dead prototypes", dead.len());
    module.functions.retain(|f| !dead.contains(&f.name));
    true
}

/// Remove subprograms of deleted functions and compile units left without subprograms.
pub fn strip_dead_debug_info(module: &mut Module) -> bool {
    let mut live: HashSet<u32> = module
        .functions
        .iter()
        .filter_map(|f| f.debug)
        .chain(
            module
                .functions
                .iter()
                .flat_map(|f| f.instructions())
                .flat_map(|inst| inst.metadata_refs()),
        )
        .collect();

    let units: Vec<u32> = module
        .debug_records
        .iter()
        .filter(|r| live.contains(&r.id))
        .filter_map(|r| match r.kind {
            DebugKind::Subprogram { unit, .. } => Some(unit),
            DebugKind::CompileUnit { .. } => None,
        })
        .collect();
    live.extend(units);

    let before = module.debug_records.len();
    module.debug_records.retain(|r| live.contains(&r.id));
    let removed = before - module.debug_records.len();
    if removed > 0 {
        log::debug!("stripped {removed} dead debug records");
    }
    removed > 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::parse_module;

    #[test]
    fn test_global_dce_keeps_reachable() {
        let text = r#"
@used = internal global i32 0
@unused = internal global i32 0
@exported = global i32 0
@table = internal constant [@in_table]
declare void @ext_used()
declare void @ext_unused()
declare void @in_table()
define internal void @helper() {
entry:
  call void @ext_used()
  store i32 1, @used
  ret
}
define internal void @dead() {
entry:
  %x = load @table
  ret
}
define spir_kernel void @k() {
entry:
  call void @helper()
  ret
}
"#;
        let mut module = parse_module(text).unwrap();
        assert!(global_dce(&mut module));

        let names: Vec<&str> = module.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["ext_used", "helper", "k"]);
        let globals: Vec<&str> = module.globals.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(globals, vec!["used", "exported"]);

        assert!(!global_dce(&mut module));
    }

    #[test]
    fn test_global_dce_follows_initializers() {
        let text = r#"
@fptrs = global [@target]
define internal void @target() {
entry:
  ret
}
"#;
        let mut module = parse_module(text).unwrap();
        assert!(!global_dce(&mut module));
        assert!(module.function("target").is_some());
    }

    #[test]
    fn test_strip_dead_prototypes() {
        let text = r#"
declare void @a()
declare void @b()
define void @k() {
entry:
  call void @a()
  ret
}
"#;
        let mut module = parse_module(text).unwrap();
        assert!(strip_dead_prototypes(&mut module));
        assert!(module.function("a").is_some());
        assert!(module.function("b").is_none());
        assert!(!strip_dead_prototypes(&mut module));
    }

    #[test]
    fn test_strip_dead_debug_info() {
        let text = r#"
define void @k() !dbg !1 {
entry:
  ret
}
!0 = compile_unit "k.cpp"
!1 = subprogram "k" !0
!2 = compile_unit "gone.cpp"
!3 = subprogram "gone" !2
"#;
        let mut module = parse_module(text).unwrap();
        assert!(strip_dead_debug_info(&mut module));
        let ids: Vec<u32> = module.debug_records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert!(!strip_dead_debug_info(&mut module));
    }
}
