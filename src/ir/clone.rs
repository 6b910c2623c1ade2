//! Module cloning with selective materialization.

use super::Module;

/// Clone `module`, keeping full definitions only for the global values
/// accepted by `keep_definition`.
///
/// Every other definition is cloned as a declaration: functions lose their
/// body and debug attachment, global variables lose their initializer, and
/// both get external linkage. Names, calling conventions, signatures and
/// attributes are kept so that remaining references stay valid. Debug records
/// are copied as-is; [`super::cleanup::strip_dead_debug_info`] trims them.
pub fn clone_module<F>(module: &Module, keep_definition: F) -> Module
where
    F: Fn(&str) -> bool,
{
    let globals = module
        .globals
        .iter()
        .map(|g| {
            let mut g = g.clone();
            if !g.is_declaration() && !keep_definition(&g.name) {
                g.drop_initializer();
            }
            g
        })
        .collect();

    let functions = module
        .functions
        .iter()
        .map(|f| {
            if f.is_declaration() || keep_definition(&f.name) {
                f.clone()
            } else {
                let mut decl = f.clone_header();
                decl.drop_body();
                decl
            }
        })
        .collect();

    Module {
        source_filename: module.source_filename.clone(),
        globals,
        functions,
        debug_records: module.debug_records.clone(),
    }
}

impl super::Function {
    /// Copy of everything but the body.
    fn clone_header(&self) -> Self {
        Self {
            name: self.name.clone(),
            linkage: self.linkage,
            calling_conv: self.calling_conv,
            ret_ty: self.ret_ty,
            params: self.params.clone(),
            attributes: self.attributes.clone(),
            debug: self.debug,
            body: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{parse_module, CallingConv, Linkage};

    #[test]
    fn test_clone_materializes_selected_definitions() {
        let text = r#"
@g = internal global i32 1
@h = global i32 2
define internal spir_func void @a() !dbg !1 {
entry:
  ret
}
define spir_kernel void @k() #"sycl-module-id"="m" {
entry:
  call void @a()
  ret
}
!0 = compile_unit "x.cpp"
!1 = subprogram "a" !0
"#;
        let module = parse_module(text).unwrap();
        let clone = clone_module(&module, |name| name == "k" || name == "g");

        let a = clone.function("a").unwrap();
        assert!(a.is_declaration());
        assert_eq!(a.linkage, Linkage::External);
        assert_eq!(a.debug, None);

        let k = clone.function("k").unwrap();
        assert!(!k.is_declaration());
        assert_eq!(k.calling_conv, CallingConv::SpirKernel);
        assert_eq!(k, module.function("k").unwrap());

        assert!(!clone.global("g").unwrap().is_declaration());
        assert_eq!(clone.global("g").unwrap().linkage, Linkage::Internal);
        assert!(clone.global("h").unwrap().is_declaration());
        assert_eq!(clone.debug_records, module.debug_records);

        // The source is untouched
        assert!(!module.function("a").unwrap().is_declaration());
    }
}
