// This module implements the specialization constant transformation. Device code
// reads a specialization constant through a call to a symbolic intrinsic whose only
// argument is the constant's string ID. When constants are set at runtime, every
// distinct string ID gets a dense integer ID in first-encountered order, and the call
// becomes a call to the integer-ID intrinsic carrying the type's default value, with
// the string ID kept as a `!sycl.spec_const` attachment. When constants use their C++
// defaults, the call is removed and its uses see the zero value of its type. The
// attachments let each partition clone recover its own name-to-ID map after splitting.

//! Specialization constant lowering and ID enumeration.

use std::collections::BTreeMap;

use crate::core::{PostLinkError, PostLinkResult};
use crate::ir::{Attachment, Callee, Function, InstKind, Instruction, Literal, Module, Operand, Type};

/// Prefix of the symbolic (string ID) intrinsic, type-suffixed variants included.
pub const SYMBOLIC_INTRINSIC_PREFIX: &str = "__sycl_getSpecConstantValue";
/// Prefix of the integer ID intrinsic; the full name is suffixed with the value type.
pub const ID_INTRINSIC_PREFIX: &str = "__spirv_SpecConstant";
/// Attachment recording the string ID on a lowered call.
pub const SPEC_CONST_MD: &str = "sycl.spec_const";

/// Specialization constant string ID to integer ID.
pub type SpecIdMap = BTreeMap<String, u32>;

pub fn id_intrinsic_name(ty: Type) -> String {
    format!("{}_{}", ID_INTRINSIC_PREFIX, ty.name())
}

/// Whole-module specialization constant pass.
#[derive(Debug, Clone, Copy)]
pub struct SpecConstantsPass {
    set_value_at_runtime: bool,
}

struct SymbolicUse {
    id: String,
    ty: Type,
    default: Literal,
}

fn symbolic_use(inst: &Instruction, function: &str) -> PostLinkResult<Option<SymbolicUse>> {
    let InstKind::Call {
        ret_ty,
        callee: Callee::Direct(callee),
        args,
    } = &inst.kind
    else {
        return Ok(None);
    };
    if !callee.starts_with(SYMBOLIC_INTRINSIC_PREFIX) {
        return Ok(None);
    }

    let id = match args.as_slice() {
        [Operand::Str(id)] => id.clone(),
        _ => {
            return Err(PostLinkError::SpecConst {
                function: function.to_string(),
                reason: format!("@{callee} expects a single string literal ID argument"),
            })
        }
    };
    let default = match ret_ty {
        Type::Void | Type::Ptr => None,
        ty => ty.zero(),
    }
    .ok_or_else(|| PostLinkError::SpecConst {
        function: function.to_string(),
        reason: format!("unsupported type '{ret_ty}' for specialization constant \"{id}\""),
    })?;

    Ok(Some(SymbolicUse {
        id,
        ty: *ret_ty,
        default,
    }))
}

impl SpecConstantsPass {
    pub fn new(set_value_at_runtime: bool) -> Self {
        Self {
            set_value_at_runtime,
        }
    }

    /// Lower every symbolic specialization constant use in `module`.
    ///
    /// Returns whether the module was changed.
    pub fn run(&self, module: &mut Module) -> PostLinkResult<bool> {
        // Seed with IDs already assigned so a rerun keeps them dense and stable
        let mut ids = SpecIdMap::new();
        Self::collect_spec_constant_metadata(module, &mut ids);
        let mut next_id = ids.values().max().map_or(0, |max| max + 1);

        let mut changed = false;
        let mut id_intrinsic_types: Vec<Type> = Vec::new();

        for f in module.functions.iter_mut() {
            let Some(blocks) = f.body.as_mut() else {
                continue;
            };
            let mut replacements: Vec<(String, Operand)> = Vec::new();

            for block in blocks.iter_mut() {
                let mut kept = Vec::with_capacity(block.instructions.len());
                for mut inst in block.instructions.drain(..) {
                    let Some(sym) = symbolic_use(&inst, &f.name)? else {
                        kept.push(inst);
                        continue;
                    };
                    changed = true;
                    let default = Operand::Const {
                        ty: sym.ty,
                        value: sym.default,
                    };

                    if !self.set_value_at_runtime {
                        log::debug!("@{}: spec constant \"{}\" set to default", f.name, sym.id);
                        if let Some(result) = inst.result.take() {
                            replacements.push((result, default));
                        }
                        continue;
                    }

                    let id = match ids.get(&sym.id) {
                        Some(&id) => id,
                        None => {
                            let id = next_id;
                            next_id += 1;
                            log::debug!("spec constant \"{}\" -> ID {}", sym.id, id);
                            ids.insert(sym.id.clone(), id);
                            id
                        }
                    };
                    if !id_intrinsic_types.contains(&sym.ty) {
                        id_intrinsic_types.push(sym.ty);
                    }
                    inst.kind = InstKind::Call {
                        ret_ty: sym.ty,
                        callee: Callee::Direct(id_intrinsic_name(sym.ty)),
                        args: vec![
                            Operand::Const {
                                ty: Type::I32,
                                value: Literal::Int(i64::from(id)),
                            },
                            default,
                        ],
                    };
                    inst.metadata.push(Attachment {
                        kind: SPEC_CONST_MD.to_string(),
                        value: Operand::Str(sym.id),
                    });
                    kept.push(inst);
                }
                block.instructions = kept;
            }

            for (name, value) in &replacements {
                for inst in f.instructions_mut() {
                    inst.replace_local_uses(name, value);
                }
            }
        }

        if !changed {
            return Ok(false);
        }

        for ty in id_intrinsic_types {
            let name = id_intrinsic_name(ty);
            if module.function(&name).is_none() {
                module.functions.push(Function::declaration(
                    name,
                    ty,
                    vec!["id".to_string(), "default".to_string()],
                ));
            }
        }

        let unused: Vec<String> = module
            .functions
            .iter()
            .filter(|f| {
                f.is_declaration()
                    && f.name.starts_with(SYMBOLIC_INTRINSIC_PREFIX)
                    && !module.is_referenced(&f.name)
            })
            .map(|f| f.name.clone())
            .collect();
        module.functions.retain(|f| !unused.contains(&f.name));

        log::info!(
            "lowered specialization constants ({} IDs assigned)",
            if self.set_value_at_runtime { ids.len() } else { 0 }
        );
        Ok(true)
    }

    /// Recover the string ID to integer ID map from lowered calls in `module`.
    ///
    /// Returns whether any lowered call was found.
    pub fn collect_spec_constant_metadata(module: &Module, id_map: &mut SpecIdMap) -> bool {
        let mut found = false;
        for inst in module.functions.iter().flat_map(|f| f.instructions()) {
            let Some(callee) = inst.direct_callee() else {
                continue;
            };
            if !callee.starts_with(ID_INTRINSIC_PREFIX) {
                continue;
            }
            let (Some(Operand::Str(name)), Some(Operand::Const { value: Literal::Int(id), .. })) =
                (inst.attachment(SPEC_CONST_MD), inst.operands().first())
            else {
                continue;
            };
            let Ok(id) = u32::try_from(*id) else {
                continue;
            };
            id_map.insert(name.clone(), id);
            found = true;
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::parse_module;

    const USES: &str = r#"
declare i32 @__sycl_getSpecConstantValue_i32(%id)
declare f64 @__sycl_getSpecConstantValue_f64(%id)

define spir_kernel void @k1(%p) {
entry:
  %a = call i32 @__sycl_getSpecConstantValue_i32("A")
  %b = call f64 @__sycl_getSpecConstantValue_f64("B")
  %s = add %a, %p
  store %b, %p
  ret
}

define spir_kernel void @k2() {
entry:
  %c = call i32 @__sycl_getSpecConstantValue_i32("C")
  %a2 = call i32 @__sycl_getSpecConstantValue_i32("A")
  ret %c
}
"#;

    #[test]
    fn test_runtime_mode_assigns_dense_ids() {
        let mut module = parse_module(USES).unwrap();
        assert!(SpecConstantsPass::new(true).run(&mut module).unwrap());

        let mut ids = SpecIdMap::new();
        assert!(SpecConstantsPass::collect_spec_constant_metadata(&module, &mut ids));
        let expected: SpecIdMap = [("A", 0), ("B", 1), ("C", 2)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(ids, expected);

        let text = module.to_string();
        assert!(text.contains(
            "%a = call i32 @__spirv_SpecConstant_i32(i32 0, i32 0) !sycl.spec_const \"A\""
        ));
        assert!(text.contains(
            "%b = call f64 @__spirv_SpecConstant_f64(i32 1, f64 0.0) !sycl.spec_const \"B\""
        ));
        assert!(text.contains("%a2 = call i32 @__spirv_SpecConstant_i32(i32 0, i32 0)"));
        assert!(text.contains("declare spir_func i32 @__spirv_SpecConstant_i32(%id, %default)"));
        assert!(!text.contains(SYMBOLIC_INTRINSIC_PREFIX));
    }

    #[test]
    fn test_default_mode_replaces_uses() {
        let mut module = parse_module(USES).unwrap();
        assert!(SpecConstantsPass::new(false).run(&mut module).unwrap());

        let text = module.to_string();
        assert!(text.contains("%s = add i32 0, %p"));
        assert!(text.contains("store f64 0.0, %p"));
        assert!(text.contains("ret i32 0"));
        assert!(!text.contains("SpecConstant"));

        let mut ids = SpecIdMap::new();
        assert!(!SpecConstantsPass::collect_spec_constant_metadata(&module, &mut ids));
        assert!(ids.is_empty());
    }

    #[test]
    fn test_second_run_changes_nothing() {
        for at_runtime in [true, false] {
            let mut module = parse_module(USES).unwrap();
            let pass = SpecConstantsPass::new(at_runtime);
            assert!(pass.run(&mut module).unwrap());
            let first = module.to_string();
            assert!(!pass.run(&mut module).unwrap());
            assert_eq!(first, module.to_string());
        }
    }

    #[test]
    fn test_module_without_spec_constants() {
        let mut module =
            parse_module("define spir_kernel void @k() {\nentry:\n  ret\n}\n").unwrap();
        let before = module.clone();
        assert!(!SpecConstantsPass::new(true).run(&mut module).unwrap());
        assert_eq!(module, before);
    }

    #[test]
    fn test_malformed_uses_are_errors() {
        let text = r#"
declare i32 @__sycl_getSpecConstantValue(%id)
define void @f(%x) {
entry:
  %a = call i32 @__sycl_getSpecConstantValue(%x)
  ret
}
"#;
        let mut module = parse_module(text).unwrap();
        let err = SpecConstantsPass::new(true).run(&mut module).unwrap_err();
        assert!(matches!(err, PostLinkError::SpecConst { ref function, .. } if function == "f"));

        let text = r#"
declare ptr @__sycl_getSpecConstantValue(%id)
define void @f() {
entry:
  %a = call ptr @__sycl_getSpecConstantValue("P")
  ret
}
"#;
        let mut module = parse_module(text).unwrap();
        let err = SpecConstantsPass::new(false).run(&mut module).unwrap_err();
        assert!(err.to_string().contains("unsupported type 'ptr'"));
    }
}
