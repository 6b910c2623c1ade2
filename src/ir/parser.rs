//! Textual device IR parser implementation.

use hashbrown::HashSet;
use thiserror::Error;

use super::*;

/// Malformed textual IR, positioned at 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

pub fn parse_module(text: &str) -> Result<Module, ParseError> {
    let parser = Parser::new(text);
    parser.parse()
}

type PResult<T> = Result<T, ParseError>;

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    module: Module,

    // Module-wide names
    globals: HashSet<&'a str>,
    global_resolves: Vec<Resolve<'a>>,
    debug_ids: HashSet<u32>,
    metadata_resolves: Vec<(u32, usize)>,

    // Per-function names
    blocks: HashSet<&'a str>,
    values: HashSet<&'a str>,
    block_resolves: Vec<Resolve<'a>>,
    value_resolves: Vec<Resolve<'a>>,
}

#[derive(Debug)]
struct Resolve<'a> {
    name: &'a str,
    pos: usize,
}

fn is_name_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '$')
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            module: Module::new(),
            globals: HashSet::new(),
            global_resolves: Vec::new(),
            debug_ids: HashSet::new(),
            metadata_resolves: Vec::new(),
            blocks: HashSet::new(),
            values: HashSet::new(),
            block_resolves: Vec::new(),
            value_resolves: Vec::new(),
        }
    }

    fn parse(mut self) -> PResult<Module> {
        self.skip_whitespace(true);

        while !self.is_eof() {
            match self.current_char() {
                Some('@') => self.parse_global_variable()?,
                Some('!') => self.parse_debug_record()?,
                _ => {
                    let start = self.pos;
                    match self.read_keyword()? {
                        "define" => self.parse_function(true)?,
                        "declare" => self.parse_function(false)?,
                        "source_filename" => {
                            self.expect('=')?;
                            let name = self.read_string()?;
                            self.module.source_filename = Some(name);
                        }
                        other => {
                            return Err(self.error_at(
                                start,
                                format!("expected top-level entity but found '{other}'"),
                            ))
                        }
                    }
                }
            }
            self.expect_line_end()?;
            self.skip_whitespace(true);
        }

        self.resolve_all_references()?;
        Ok(self.module)
    }

    fn error_at(&self, pos: usize, message: impl Into<String>) -> ParseError {
        let before = &self.text[..pos.min(self.text.len())];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(nl) => before[nl + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        ParseError::new(line, column, message)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        self.error_at(self.pos, message)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn current_char(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.pos += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self, skip_newlines: bool) {
        while let Some(ch) = self.current_char() {
            if ch == ';' {
                // Comment runs to the end of the line; the newline stays
                while let Some(ch) = self.current_char() {
                    if ch == '\n' {
                        break;
                    }
                    self.advance();
                }
            } else if ch.is_whitespace() {
                if ch == '\n' && !skip_newlines {
                    break;
                }
                self.advance();
            } else {
                break;
            }
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace(false);
        self.current_char()
    }

    fn at_line_end(&mut self) -> bool {
        matches!(self.peek(), None | Some('\n'))
    }

    fn expect_line_end(&mut self) -> PResult<()> {
        if !self.at_line_end() {
            return Err(self.error(format!(
                "expected end of line but found {:?}",
                self.current_char()
            )));
        }
        Ok(())
    }

    fn try_read(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, ch: char) -> PResult<()> {
        if !self.try_read(ch) {
            return Err(self.error(format!(
                "expected '{}' but found {:?}",
                ch,
                self.current_char()
            )));
        }
        Ok(())
    }

    /// Name following a sigil (`@`, `%`, `^`) or a block label.
    fn read_name(&mut self) -> PResult<&'a str> {
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if is_name_char(ch) {
                self.advance();
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error(format!("expected name but found {:?}", self.current_char())));
        }
        Ok(&self.text[start..self.pos])
    }

    fn read_keyword(&mut self) -> PResult<&'a str> {
        self.skip_whitespace(false);
        match self.current_char() {
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' => self.read_name(),
            Some(ch) => Err(self.error(format!("expected keyword but found '{ch}'"))),
            None => Err(self.error("expected keyword but found EOF")),
        }
    }

    fn read_string(&mut self) -> PResult<String> {
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.current_char() {
                None | Some('\n') => return Err(self.error("unterminated string literal")),
                Some('"') => {
                    self.advance();
                    return Ok(out);
                }
                Some('\\') => {
                    self.advance();
                    let escaped = match self.current_char() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        other => {
                            return Err(self.error(format!("invalid escape sequence {other:?}")))
                        }
                    };
                    out.push(escaped);
                    self.advance();
                }
                Some(ch) => {
                    out.push(ch);
                    self.advance();
                }
            }
        }
    }

    fn read_number(&mut self) -> PResult<u32> {
        self.skip_whitespace(false);
        let start = self.pos;
        while matches!(self.current_char(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }
        if start == self.pos {
            return Err(self.error("expected number"));
        }
        self.text[start..self.pos]
            .parse()
            .map_err(|e| self.error_at(start, format!("failed to parse number: {e}")))
    }

    fn read_type(&mut self) -> PResult<Type> {
        let start = self.pos;
        let kw = self.read_keyword()?;
        Type::parse(kw).ok_or_else(|| self.error_at(start, format!("unknown type '{kw}'")))
    }

    fn read_literal(&mut self, ty: Type) -> PResult<Literal> {
        self.skip_whitespace(false);
        let start = self.pos;
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '+' | '_') {
                self.advance();
            } else {
                break;
            }
        }
        let token = &self.text[start..self.pos];
        let literal = match (ty, token) {
            (Type::Void, _) => None,
            (Type::I1, "true") => Some(Literal::Int(1)),
            (Type::I1, "false") | (Type::Ptr, "null") => Some(Literal::Int(0)),
            (ty, token) if ty.is_float() => token.parse().ok().map(Literal::Float),
            (_, token) => token.parse().ok().map(Literal::Int),
        };
        literal.ok_or_else(|| {
            self.error_at(start, format!("invalid {} literal '{}'", ty.name(), token))
        })
    }

    fn read_metadata_ref(&mut self) -> PResult<u32> {
        self.expect('!')?;
        let pos = self.pos;
        let id = self.read_number()?;
        self.metadata_resolves.push((id, pos));
        Ok(id)
    }

    fn define_global(&mut self, name: &'a str, pos: usize) -> PResult<()> {
        if !self.globals.insert(name) {
            return Err(self.error_at(pos, format!("redefinition of '@{name}'")));
        }
        Ok(())
    }

    fn parse_global_variable(&mut self) -> PResult<()> {
        self.expect('@')?;
        let name_pos = self.pos;
        let name = self.read_name()?;
        self.define_global(name, name_pos)?;
        self.expect('=')?;

        let mut linkage = None;
        let mut kw = self.read_keyword()?;
        if let Some(l) = Linkage::parse(kw) {
            linkage = Some(l);
            kw = self.read_keyword()?;
        }
        let constant = match kw {
            "global" => false,
            "constant" => true,
            other => {
                return Err(self.error(format!("expected 'global' or 'constant' but found '{other}'")))
            }
        };

        let initializer = if self.at_line_end() {
            if linkage.is_some_and(|l| l != Linkage::External) {
                return Err(self.error_at(
                    name_pos,
                    format!("declaration of '@{name}' must have external linkage"),
                ));
            }
            None
        } else {
            Some(self.parse_constant()?)
        };

        self.module.globals.push(GlobalVariable {
            name: name.to_string(),
            linkage: linkage.unwrap_or_default(),
            constant,
            initializer,
        });
        Ok(())
    }

    fn parse_constant(&mut self) -> PResult<Constant> {
        match self.peek() {
            Some('@') => {
                self.advance();
                let pos = self.pos;
                let name = self.read_name()?;
                self.global_resolves.push(Resolve { name, pos });
                Ok(Constant::Ref(name.to_string()))
            }
            Some('[') => {
                self.advance();
                let mut elems = Vec::new();
                if !self.try_read(']') {
                    loop {
                        elems.push(self.parse_constant()?);
                        if !self.try_read(',') {
                            self.expect(']')?;
                            break;
                        }
                    }
                }
                Ok(Constant::Array(elems))
            }
            Some('"') => Ok(Constant::Str(self.read_string()?)),
            _ => {
                let start = self.pos;
                let kw = self.read_keyword()?;
                if kw == "zeroinitializer" {
                    return Ok(Constant::ZeroInit);
                }
                let ty = Type::parse(kw)
                    .ok_or_else(|| self.error_at(start, format!("expected constant but found '{kw}'")))?;
                let value = self.read_literal(ty)?;
                Ok(Constant::Scalar { ty, value })
            }
        }
    }

    fn parse_debug_record(&mut self) -> PResult<()> {
        self.expect('!')?;
        let id_pos = self.pos;
        let id = self.read_number()?;
        if !self.debug_ids.insert(id) {
            return Err(self.error_at(id_pos, format!("redefinition of metadata !{id}")));
        }
        self.expect('=')?;

        let kw_pos = self.pos;
        let kind = match self.read_keyword()? {
            "compile_unit" => DebugKind::CompileUnit {
                file: self.read_string()?,
            },
            "subprogram" => {
                let name = self.read_string()?;
                let unit = self.read_metadata_ref()?;
                DebugKind::Subprogram { name, unit }
            }
            other => {
                return Err(self.error_at(kw_pos, format!("unknown metadata kind '{other}'")))
            }
        };
        self.module.debug_records.push(DebugRecord { id, kind });
        Ok(())
    }

    fn parse_function(&mut self, is_definition: bool) -> PResult<()> {
        let mut linkage = Linkage::External;
        let mut calling_conv = CallingConv::SpirFunc;

        let mut kw_pos = self.pos;
        let mut kw = self.read_keyword()?;
        if let Some(l) = Linkage::parse(kw) {
            if !is_definition && l != Linkage::External {
                return Err(self.error_at(kw_pos, "declarations must have external linkage"));
            }
            linkage = l;
            kw_pos = self.pos;
            kw = self.read_keyword()?;
        }
        if let Some(cc) = CallingConv::parse(kw) {
            calling_conv = cc;
            kw_pos = self.pos;
            kw = self.read_keyword()?;
        }
        let ret_ty = Type::parse(kw)
            .ok_or_else(|| self.error_at(kw_pos, format!("expected return type but found '{kw}'")))?;

        self.expect('@')?;
        let name_pos = self.pos;
        let name = self.read_name()?;
        self.define_global(name, name_pos)?;

        // Reset per-function state
        self.blocks.clear();
        self.values.clear();
        self.block_resolves.clear();
        self.value_resolves.clear();

        // Parse parameters
        self.expect('(')?;
        let mut params = Vec::new();
        if !self.try_read(')') {
            loop {
                self.expect('%')?;
                let param_pos = self.pos;
                let param = self.read_name()?;
                if !self.values.insert(param) {
                    return Err(self.error_at(param_pos, format!("duplicate parameter '%{param}'")));
                }
                params.push(param.to_string());
                if !self.try_read(',') {
                    self.expect(')')?;
                    break;
                }
            }
        }

        // Parse attributes: #"key"="value"
        let mut attributes = Vec::new();
        while self.try_read('#') {
            let key = self.read_string()?;
            self.expect('=')?;
            let value = self.read_string()?;
            attributes.push(Attribute { key, value });
        }

        let mut debug = None;
        if is_definition && self.peek() == Some('!') {
            self.advance();
            let dbg_pos = self.pos;
            if self.read_keyword()? != "dbg" {
                return Err(self.error_at(dbg_pos, "expected '!dbg' attachment"));
            }
            debug = Some(self.read_metadata_ref()?);
        }

        let body = if is_definition {
            self.expect('{')?;
            self.skip_whitespace(true);
            let mut blocks = Vec::new();
            while !self.try_read('}') {
                if self.is_eof() {
                    return Err(self.error(format!("unexpected EOF in body of '@{name}'")));
                }
                blocks.push(self.parse_block()?);
                self.skip_whitespace(true);
            }
            self.resolve_function_references()?;
            Some(blocks)
        } else {
            None
        };

        self.module.functions.push(Function {
            name: name.to_string(),
            linkage,
            calling_conv,
            ret_ty,
            params,
            attributes,
            debug,
            body,
        });
        Ok(())
    }

    fn is_at_label(&mut self) -> bool {
        let saved_pos = self.pos;
        let is_label = self.read_name().is_ok() && self.current_char() == Some(':');
        self.pos = saved_pos;
        is_label
    }

    fn parse_block(&mut self) -> PResult<Block> {
        let label_pos = self.pos;
        let label = self.read_name()?;
        self.expect(':')?;
        if !self.blocks.insert(label) {
            return Err(self.error_at(label_pos, format!("redefinition of block '{label}'")));
        }
        self.expect_line_end()?;

        let mut instructions = Vec::new();
        loop {
            self.skip_whitespace(true);
            if self.is_eof() || self.current_char() == Some('}') || self.is_at_label() {
                break;
            }
            instructions.push(self.parse_instruction()?);
            self.expect_line_end()?;
        }

        Ok(Block {
            label: label.to_string(),
            instructions,
        })
    }

    fn parse_instruction(&mut self) -> PResult<Instruction> {
        // Check for value definition
        let result = if self.current_char() == Some('%') {
            self.advance();
            let pos = self.pos;
            let name = self.read_name()?;
            if !self.values.insert(name) {
                return Err(self.error_at(pos, format!("redefinition of '%{name}'")));
            }
            self.expect('=')?;
            Some(name.to_string())
        } else {
            None
        };

        let opcode = self.read_keyword()?;
        let kind = if opcode == "call" {
            let ret_ty = self.read_type()?;
            let callee = match self.peek() {
                Some('@') => {
                    self.advance();
                    let pos = self.pos;
                    let name = self.read_name()?;
                    self.global_resolves.push(Resolve { name, pos });
                    Callee::Direct(name.to_string())
                }
                Some('%') => {
                    self.advance();
                    let pos = self.pos;
                    let name = self.read_name()?;
                    self.value_resolves.push(Resolve { name, pos });
                    Callee::Indirect(name.to_string())
                }
                other => {
                    return Err(self.error(format!("expected callee but found {other:?}")))
                }
            };
            self.expect('(')?;
            let mut args = Vec::new();
            if !self.try_read(')') {
                loop {
                    args.push(self.parse_operand()?);
                    if !self.try_read(',') {
                        self.expect(')')?;
                        break;
                    }
                }
            }
            InstKind::Call {
                ret_ty,
                callee,
                args,
            }
        } else {
            let mut operands = Vec::new();
            if !self.at_line_end() && self.current_char() != Some('!') {
                loop {
                    operands.push(self.parse_operand()?);
                    if !self.try_read(',') {
                        break;
                    }
                }
            }
            InstKind::Op {
                opcode: opcode.to_string(),
                operands,
            }
        };

        // Trailing attachments: !kind operand
        let mut metadata = Vec::new();
        while self.try_read('!') {
            let kind = self.read_keyword()?.to_string();
            let value = self.parse_operand()?;
            metadata.push(Attachment { kind, value });
        }

        Ok(Instruction {
            result,
            kind,
            metadata,
        })
    }

    fn parse_operand(&mut self) -> PResult<Operand> {
        match self.peek() {
            Some('%') => {
                self.advance();
                let pos = self.pos;
                let name = self.read_name()?;
                self.value_resolves.push(Resolve { name, pos });
                Ok(Operand::Local(name.to_string()))
            }
            Some('@') => {
                self.advance();
                let pos = self.pos;
                let name = self.read_name()?;
                self.global_resolves.push(Resolve { name, pos });
                Ok(Operand::Global(name.to_string()))
            }
            Some('^') => {
                self.advance();
                let pos = self.pos;
                let name = self.read_name()?;
                self.block_resolves.push(Resolve { name, pos });
                Ok(Operand::Label(name.to_string()))
            }
            Some('"') => Ok(Operand::Str(self.read_string()?)),
            Some('!') => Ok(Operand::Metadata(self.read_metadata_ref()?)),
            Some(_) => {
                let ty = self.read_type()?;
                let value = self.read_literal(ty)?;
                Ok(Operand::Const { ty, value })
            }
            None => Err(self.error("expected operand but found EOF")),
        }
    }

    fn resolve_function_references(&mut self) -> PResult<()> {
        for resolve in &self.value_resolves {
            if !self.values.contains(resolve.name) {
                return Err(self.error_at(
                    resolve.pos,
                    format!("use of undefined value '%{}'", resolve.name),
                ));
            }
        }
        for resolve in &self.block_resolves {
            if !self.blocks.contains(resolve.name) {
                return Err(self.error_at(
                    resolve.pos,
                    format!("use of undefined block '^{}'", resolve.name),
                ));
            }
        }
        Ok(())
    }

    fn resolve_all_references(&mut self) -> PResult<()> {
        for resolve in &self.global_resolves {
            if !self.globals.contains(resolve.name) {
                return Err(self.error_at(
                    resolve.pos,
                    format!("use of undefined global '@{}'", resolve.name),
                ));
            }
        }
        for &(id, pos) in &self.metadata_resolves {
            if !self.debug_ids.contains(&id) {
                return Err(self.error_at(pos, format!("use of undefined metadata '!{id}'")));
            }
        }
        Ok(())
    }
}
