//! Canonical textual form of a [`Module`].
//!
//! The output always parses back to an equal module, and printing is
//! deterministic, so two equal modules produce byte-identical text.

use std::fmt::{self, Display, Formatter, Write};

use super::*;

fn write_escaped(f: &mut impl Write, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            ch => f.write_char(ch)?,
        }
    }
    f.write_char('"')
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            // Debug keeps the fractional part and round-trips through `str::parse`
            Literal::Float(v) => write!(f, "{v:?}"),
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Local(name) => write!(f, "%{name}"),
            Operand::Global(name) => write!(f, "@{name}"),
            Operand::Const { ty, value } => write!(f, "{ty} {value}"),
            Operand::Str(s) => write_escaped(f, s),
            Operand::Label(name) => write!(f, "^{name}"),
            Operand::Metadata(id) => write!(f, "!{id}"),
        }
    }
}

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Scalar { ty, value } => write!(f, "{ty} {value}"),
            Constant::Ref(name) => write!(f, "@{name}"),
            Constant::Str(s) => write_escaped(f, s),
            Constant::ZeroInit => f.write_str("zeroinitializer"),
            Constant::Array(elems) => {
                f.write_char('[')?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                f.write_char(']')
            }
        }
    }
}

fn write_operand_list(f: &mut Formatter<'_>, ops: &[Operand]) -> fmt::Result {
    for (i, op) in ops.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{op}")?;
    }
    Ok(())
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(result) = &self.result {
            write!(f, "%{result} = ")?;
        }
        match &self.kind {
            InstKind::Call {
                ret_ty,
                callee,
                args,
            } => {
                write!(f, "call {ret_ty} ")?;
                match callee {
                    Callee::Direct(name) => write!(f, "@{name}(")?,
                    Callee::Indirect(name) => write!(f, "%{name}(")?,
                }
                write_operand_list(f, args)?;
                f.write_char(')')?;
            }
            InstKind::Op { opcode, operands } => {
                f.write_str(opcode)?;
                if !operands.is_empty() {
                    f.write_char(' ')?;
                    write_operand_list(f, operands)?;
                }
            }
        }
        for attachment in &self.metadata {
            write!(f, " !{} {}", attachment.kind, attachment.value)?;
        }
        Ok(())
    }
}

impl Display for GlobalVariable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let kind = if self.constant { "constant" } else { "global" };
        match &self.initializer {
            None => write!(f, "@{} = external {kind}", self.name),
            Some(init) => {
                write!(f, "@{} = ", self.name)?;
                if self.linkage != Linkage::External {
                    write!(f, "{} ", self.linkage.keyword())?;
                }
                write!(f, "{kind} {init}")
            }
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.body {
            None => f.write_str("declare ")?,
            Some(_) => {
                f.write_str("define ")?;
                if self.linkage != Linkage::External {
                    write!(f, "{} ", self.linkage.keyword())?;
                }
            }
        }
        write!(
            f,
            "{} {} @{}(",
            self.calling_conv.keyword(),
            self.ret_ty,
            self.name
        )?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "%{param}")?;
        }
        f.write_char(')')?;
        for attr in &self.attributes {
            f.write_str(" #")?;
            write_escaped(f, &attr.key)?;
            f.write_char('=')?;
            write_escaped(f, &attr.value)?;
        }
        if let Some(blocks) = &self.body {
            if let Some(dbg) = self.debug {
                write!(f, " !dbg !{dbg}")?;
            }
            f.write_str(" {\n")?;
            for block in blocks {
                writeln!(f, "{}:", block.label)?;
                for inst in &block.instructions {
                    writeln!(f, "  {inst}")?;
                }
            }
            f.write_char('}')?;
        }
        Ok(())
    }
}

impl Display for DebugRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "!{} = ", self.id)?;
        match &self.kind {
            DebugKind::CompileUnit { file } => {
                f.write_str("compile_unit ")?;
                write_escaped(f, file)
            }
            DebugKind::Subprogram { name, unit } => {
                f.write_str("subprogram ")?;
                write_escaped(f, name)?;
                write!(f, " !{unit}")
            }
        }
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut need_blank = false;
        if let Some(name) = &self.source_filename {
            f.write_str("source_filename = ")?;
            write_escaped(f, name)?;
            f.write_char('\n')?;
            need_blank = true;
        }
        if !self.globals.is_empty() {
            if need_blank {
                f.write_char('\n')?;
            }
            for global in &self.globals {
                writeln!(f, "{global}")?;
            }
            need_blank = true;
        }
        for function in &self.functions {
            if need_blank {
                f.write_char('\n')?;
            }
            writeln!(f, "{function}")?;
            need_blank = true;
        }
        if !self.debug_records.is_empty() {
            if need_blank {
                f.write_char('\n')?;
            }
            for record in &self.debug_records {
                writeln!(f, "{record}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"source_filename = "s\"rc.cpp"

@counter = internal global i32 0
@fptrs = constant [@helper, f64 2.5, zeroinitializer]
@ext = external global

define linkonce_odr spir_func i32 @helper(%x) !dbg !1 {
entry:
  %r = add %x, i32 -1
  condbr %r, ^exit, ^exit
exit:
  ret %r
}

define spir_kernel void @kern(%p, %fp) #"sycl-module-id"="a.cpp" {
entry:
  %v = call i32 @helper(%p)
  call void %fp(f32 1.0e-7)
  store %v, @counter !tag "x"
  ret
}

declare spir_func void @unused()

!0 = compile_unit "a.cpp"
!1 = subprogram "helper" !0
"#;

    #[test]
    fn test_print_is_canonical() {
        let module = parse_module(SAMPLE).unwrap();
        let printed = module.to_string();
        let reparsed = parse_module(&printed).unwrap();
        assert_eq!(module, reparsed);
        assert_eq!(printed, reparsed.to_string());
    }

    #[test]
    fn test_print_shapes() {
        let module = parse_module(SAMPLE).unwrap();
        let printed = module.to_string();
        assert!(printed.contains("@counter = internal global i32 0\n"));
        assert!(printed.contains("@ext = external global\n"));
        assert!(printed.contains(
            "define spir_kernel void @kern(%p, %fp) #\"sycl-module-id\"=\"a.cpp\" {\n"
        ));
        assert!(printed.contains("define linkonce_odr spir_func i32 @helper(%x) !dbg !1 {\n"));
        assert!(printed.contains("  store %v, @counter !tag \"x\"\n"));
        assert!(printed.contains("declare spir_func void @unused()\n"));
        assert!(printed.starts_with("source_filename = \"s\\\"rc.cpp\"\n"));
    }
}
