//! Call-graph closure over direct calls.

use hashbrown::{HashMap, HashSet};

use crate::ir::{Function, Module};

/// Global values a partition must carry with full definitions.
#[derive(Debug, Default)]
pub struct Dependencies<'m> {
    pub functions: HashSet<&'m str>,
    pub globals: HashSet<&'m str>,
}

impl<'m> Dependencies<'m> {
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains(name) || self.globals.contains(name)
    }
}

/// Computes dependency closures over one module.
///
/// Only direct calls to functions defined in the module are followed. Calls
/// through function pointers, and functions only mentioned as operands or in
/// global initializers, do not pull their target into the closure. Every
/// global variable is treated as needed; unused ones are removed by the
/// partition cleanup afterwards.
pub struct ClosureBuilder<'m> {
    module: &'m Module,
    functions_by_name: HashMap<&'m str, &'m Function>,
}

impl<'m> ClosureBuilder<'m> {
    pub fn new(module: &'m Module) -> Self {
        let functions_by_name = module
            .functions
            .iter()
            .map(|f| (f.name.as_str(), f))
            .collect();
        Self {
            module,
            functions_by_name,
        }
    }

    /// Collect the roots and every defined function they transitively call.
    ///
    /// Roots not present in the module are ignored.
    pub fn collect<S: AsRef<str>>(&self, roots: &[S]) -> Dependencies<'m> {
        let mut deps = Dependencies::default();
        let mut worklist: Vec<&'m Function> = Vec::new();

        for root in roots {
            if let Some(&f) = self.functions_by_name.get(root.as_ref()) {
                if deps.functions.insert(f.name.as_str()) {
                    worklist.push(f);
                }
            }
        }

        while let Some(f) = worklist.pop() {
            for callee in f.called_functions() {
                let Some(&cf) = self.functions_by_name.get(callee) else {
                    continue;
                };
                if !cf.is_declaration() && deps.functions.insert(cf.name.as_str()) {
                    worklist.push(cf);
                }
            }
        }

        // Tracing a global's uses through nested operands is not attempted; all
        // globals are kept and the dead ones are removed after cloning.
        deps.globals
            .extend(self.module.globals.iter().map(|g| g.name.as_str()));

        log::trace!(
            "closure of {} roots: {} functions, {} globals",
            roots.len(),
            deps.functions.len(),
            deps.globals.len()
        );
        deps
    }
}
