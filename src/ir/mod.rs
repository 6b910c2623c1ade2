//! Device IR (DIR) data structures.
//!
//! A small module-level IR describing what post-link processing needs to see
//! of device code: functions with calling conventions, attributes and bodies,
//! global variables with initializers, and debug records. The format has a
//! textual form (`.ll`, see [`parser`] and [`printer`]) and a binary form
//! (`.bc`, see [`bitcode`]).
//!
//! # Text Format
//!
//! ```text
//! ; Comments start with semicolon
//! @counter = internal global i32 0
//!
//! define spir_kernel void @kern(%p) #"sycl-module-id"="a.cpp" !dbg !1 {
//! entry:
//!   %v = call i32 @helper(%p)
//!   store %v, @counter
//!   ret
//! }
//!
//! !0 = compile_unit "a.cpp"
//! !1 = subprogram "kern" !0
//! ```

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{PostLinkError, PostLinkResult};

pub mod bitcode;
pub mod cleanup;
pub mod clone;
pub mod parser;
pub mod printer;

pub use clone::clone_module;
pub use parser::{parse_module, ParseError};

/// Function attribute holding the grouping key of a kernel.
pub const ATTR_SYCL_MODULE_ID: &str = "sycl-module-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Void,
    I1,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr,
}

impl Type {
    pub const fn name(self) -> &'static str {
        match self {
            Type::Void => "void",
            Type::I1 => "i1",
            Type::I8 => "i8",
            Type::I16 => "i16",
            Type::I32 => "i32",
            Type::I64 => "i64",
            Type::F32 => "f32",
            Type::F64 => "f64",
            Type::Ptr => "ptr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "void" => Some(Type::Void),
            "i1" => Some(Type::I1),
            "i8" => Some(Type::I8),
            "i16" => Some(Type::I16),
            "i32" => Some(Type::I32),
            "i64" => Some(Type::I64),
            "f32" => Some(Type::F32),
            "f64" => Some(Type::F64),
            "ptr" => Some(Type::Ptr),
            _ => None,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Type::F32 | Type::F64)
    }

    /// Zero value of a first-class scalar type.
    pub fn zero(self) -> Option<Literal> {
        match self {
            Type::Void => None,
            Type::F32 | Type::F64 => Some(Literal::Float(0.0)),
            _ => Some(Literal::Int(0)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Linkage {
    #[default]
    External,
    Internal,
    Private,
    LinkOnceOdr,
    WeakOdr,
}

impl Linkage {
    pub const fn keyword(self) -> &'static str {
        match self {
            Linkage::External => "external",
            Linkage::Internal => "internal",
            Linkage::Private => "private",
            Linkage::LinkOnceOdr => "linkonce_odr",
            Linkage::WeakOdr => "weak_odr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "external" => Some(Linkage::External),
            "internal" => Some(Linkage::Internal),
            "private" => Some(Linkage::Private),
            "linkonce_odr" => Some(Linkage::LinkOnceOdr),
            "weak_odr" => Some(Linkage::WeakOdr),
            _ => None,
        }
    }

    /// Definitions with this linkage may be dropped when nothing references them.
    pub const fn is_discardable_if_unused(self) -> bool {
        matches!(
            self,
            Linkage::Internal | Linkage::Private | Linkage::LinkOnceOdr
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CallingConv {
    #[default]
    SpirFunc,
    SpirKernel,
}

impl CallingConv {
    pub const fn keyword(self) -> &'static str {
        match self {
            CallingConv::SpirFunc => "spir_func",
            CallingConv::SpirKernel => "spir_kernel",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "spir_func" => Some(CallingConv::SpirFunc),
            "spir_kernel" => Some(CallingConv::SpirKernel),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
}

/// Instruction operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// `%name`
    Local(String),
    /// `@name`
    Global(String),
    /// `i32 7`, `f32 1.5`
    Const { ty: Type, value: Literal },
    /// `"text"`
    Str(String),
    /// `^block`
    Label(String),
    /// `!3`
    Metadata(u32),
}

impl Operand {
    pub fn global_ref(&self) -> Option<&str> {
        match self {
            Operand::Global(name) => Some(name),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Callee {
    /// `call i32 @f(...)`
    Direct(String),
    /// `call i32 %fp(...)`, never resolved by the partitioner.
    Indirect(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InstKind {
    Call {
        ret_ty: Type,
        callee: Callee,
        args: Vec<Operand>,
    },
    /// Any other instruction; only its operands matter to post-link.
    Op {
        opcode: String,
        operands: Vec<Operand>,
    },
}

/// `!kind operand` attached to an instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: String,
    pub value: Operand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub result: Option<String>,
    pub kind: InstKind,
    pub metadata: Vec<Attachment>,
}

impl Instruction {
    pub fn operands(&self) -> &[Operand] {
        match &self.kind {
            InstKind::Call { args, .. } => args,
            InstKind::Op { operands, .. } => operands,
        }
    }

    pub fn operands_mut(&mut self) -> &mut Vec<Operand> {
        match &mut self.kind {
            InstKind::Call { args, .. } => args,
            InstKind::Op { operands, .. } => operands,
        }
    }

    /// Name of the directly called function, if this is a direct call.
    pub fn direct_callee(&self) -> Option<&str> {
        match &self.kind {
            InstKind::Call {
                callee: Callee::Direct(name),
                ..
            } => Some(name),
            _ => None,
        }
    }

    pub fn attachment(&self, kind: &str) -> Option<&Operand> {
        self.metadata
            .iter()
            .find(|a| a.kind == kind)
            .map(|a| &a.value)
    }

    /// Every global value this instruction mentions, callee included.
    pub fn global_refs(&self) -> impl Iterator<Item = &str> + '_ {
        self.direct_callee()
            .into_iter()
            .chain(self.operands().iter().filter_map(Operand::global_ref))
            .chain(self.metadata.iter().filter_map(|a| a.value.global_ref()))
    }

    /// Every debug record this instruction mentions.
    pub fn metadata_refs(&self) -> impl Iterator<Item = u32> + '_ {
        self.operands()
            .iter()
            .chain(self.metadata.iter().map(|a| &a.value))
            .filter_map(|op| match op {
                Operand::Metadata(id) => Some(*id),
                _ => None,
            })
    }

    /// Replace every use of local `%name` with `with`, returning the number of uses replaced.
    pub fn replace_local_uses(&mut self, name: &str, with: &Operand) -> usize {
        let mut replaced = 0;
        for op in self.operands_mut().iter_mut() {
            if matches!(op, Operand::Local(n) if n == name) {
                *op = with.clone();
                replaced += 1;
            }
        }
        replaced
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub label: String,
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub linkage: Linkage,
    pub calling_conv: CallingConv,
    pub ret_ty: Type,
    pub params: Vec<String>,
    pub attributes: Vec<Attribute>,
    /// `!dbg` subprogram record of a definition.
    pub debug: Option<u32>,
    /// `None` for a declaration.
    pub body: Option<Vec<Block>>,
}

impl Function {
    /// Create a declaration with the default calling convention.
    pub fn declaration(name: impl Into<String>, ret_ty: Type, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            linkage: Linkage::External,
            calling_conv: CallingConv::SpirFunc,
            ret_ty,
            params,
            attributes: Vec::new(),
            debug: None,
            body: None,
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }

    pub fn is_kernel(&self) -> bool {
        self.calling_conv == CallingConv::SpirKernel
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }

    pub fn blocks(&self) -> &[Block] {
        self.body.as_deref().unwrap_or(&[])
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.blocks().iter().flat_map(|b| b.instructions.iter())
    }

    pub fn instructions_mut(&mut self) -> impl Iterator<Item = &mut Instruction> + '_ {
        self.body
            .iter_mut()
            .flatten()
            .flat_map(|b| b.instructions.iter_mut())
    }

    /// Direct callees, in instruction order, duplicates included.
    pub fn called_functions(&self) -> impl Iterator<Item = &str> + '_ {
        self.instructions().filter_map(Instruction::direct_callee)
    }

    /// Turn a definition into a declaration the way a partition clone does.
    pub fn drop_body(&mut self) {
        self.body = None;
        self.debug = None;
        self.linkage = Linkage::External;
    }
}

/// Global variable initializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Scalar { ty: Type, value: Literal },
    /// Address of another global value.
    Ref(String),
    Array(Vec<Constant>),
    Str(String),
    ZeroInit,
}

impl Constant {
    fn collect_refs<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Constant::Ref(name) => out.push(name),
            Constant::Array(elems) => elems.iter().for_each(|e| e.collect_refs(out)),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,
    pub linkage: Linkage,
    pub constant: bool,
    /// `None` for a declaration.
    pub initializer: Option<Constant>,
}

impl GlobalVariable {
    pub fn is_declaration(&self) -> bool {
        self.initializer.is_none()
    }

    /// Global values referenced from the initializer.
    pub fn global_refs(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        if let Some(init) = &self.initializer {
            init.collect_refs(&mut refs);
        }
        refs
    }

    pub fn drop_initializer(&mut self) {
        self.initializer = None;
        self.linkage = Linkage::External;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebugKind {
    CompileUnit { file: String },
    Subprogram { name: String, unit: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugRecord {
    pub id: u32,
    pub kind: DebugKind,
}

/// A device IR module.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Module {
    pub source_filename: Option<String>,
    pub globals: Vec<GlobalVariable>,
    pub functions: Vec<Function>,
    pub debug_records: Vec<DebugRecord>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    pub fn global(&self, name: &str) -> Option<&GlobalVariable> {
        self.globals.iter().find(|g| g.name == name)
    }

    pub fn kernels(&self) -> impl Iterator<Item = &Function> + '_ {
        self.functions.iter().filter(|f| f.is_kernel())
    }

    /// True if any function body or global initializer mentions `name`.
    pub fn is_referenced(&self, name: &str) -> bool {
        self.functions
            .iter()
            .flat_map(|f| f.instructions())
            .any(|inst| inst.global_refs().any(|r| r == name))
            || self
                .globals
                .iter()
                .any(|g| g.global_refs().contains(&name))
    }

    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(|f| f.instructions().count()).sum()
    }
}

/// Read a module from `path` (`-` is standard input), accepting both encodings.
pub fn read_module_file(path: &Path) -> PostLinkResult<Module> {
    let bytes = if path.as_os_str() == "-" {
        let mut buffer = Vec::new();
        io::stdin()
            .read_to_end(&mut buffer)
            .map_err(|e| PostLinkError::io(path, e))?;
        buffer
    } else {
        fs::read(path).map_err(|e| PostLinkError::io(path, e))?
    };
    let display = path.display().to_string();

    let module = if bitcode::is_bitcode(&bytes) {
        bitcode::read(&bytes).map_err(|source| PostLinkError::Bitcode {
            path: display,
            source,
        })?
    } else {
        let text = String::from_utf8(bytes).map_err(|e| PostLinkError::Parse {
            path: display.clone(),
            source: ParseError::new(1, 1, format!("input is not valid UTF-8: {e}")),
        })?;
        parse_module(&text).map_err(|source| PostLinkError::Parse {
            path: display,
            source,
        })?
    };

    log::info!(
        "read {}: {} functions, {} globals, {} instructions",
        path.display(),
        module.functions.len(),
        module.globals.len(),
        module.instruction_count()
    );
    Ok(module)
}
