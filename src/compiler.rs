//! Compile Ark code into bytecode for a stack machine.
//!
//! Every function literal gets its own code page, addressed by index, and the
//! program itself lives in page 0. Names and literals are pulled out into
//! two deduplicated tables that instructions refer to by index.
//!
//! For example:
//!
//! (def add (fun (x y) (+ x y)))
//!
//! compiles to
//!
//! == SYMBOLS ==
//! 0: add
//! 1: x
//! 2: y
//! 3: +
//! == CONSTANTS ==
//! 0: page 1
//! == PAGE 0 ==
//! LOAD_CONST 0
//! LET 0
//! == PAGE 1 ==
//! NEW_ENV
//! LET 1
//! LET 2
//! LOAD_SYMBOL 1
//! LOAD_SYMBOL 2
//! LOAD_SYMBOL 3
//! CALL 2
//! RET
//!
//! Calls push their arguments left to right and then the callee, so `CALL`
//! finds the function on top of the stack.
use core::fmt;

use crate::{
    ast::Node,
    general_parser::{general_parse, special_forms::Keyword, ParseError},
};

pub mod ast_compiler;
pub mod bytecode;
pub mod constants;
pub mod page;
pub mod serializer;
pub mod symbols;

use ast_compiler::AstCompiler;
use constants::ConstantPool;
use page::{CodePageSet, PageId};
use symbols::SymbolInterner;

/// Knobs for the code layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompilerOptions {
    /// End every `begin` block with `RET`, not only function pages.
    pub begin_emits_ret: bool,
    /// Make both arms of `if` and the exit of `while` jump where they mean to:
    /// the else arm jumps over the then arm, and the loop exit skips the back jump.
    pub strict_control_flow: bool,
}

/// What a 16-bit field in the output was holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    SymbolIndex,
    ConstantIndex,
    PageIndex,
    JumpOffset,
    ArgumentCount,
    SymbolCount,
    ConstantCount,
    SegmentLength,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operand::SymbolIndex => "symbol index",
            Operand::ConstantIndex => "constant index",
            Operand::PageIndex => "page index",
            Operand::JumpOffset => "jump offset",
            Operand::ArgumentCount => "argument count",
            Operand::SymbolCount => "symbol count",
            Operand::ConstantCount => "constant count",
            Operand::SegmentLength => "segment length",
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// The reader rejected the source. Nothing is compiled.
    #[error("program has errors")]
    Syntax(Vec<ParseError>),
    #[error("malformed `{form}`: {reason}")]
    MalformedForm { form: Keyword, reason: &'static str },
    #[error("`{0}` can only appear at the head of a list")]
    MisplacedKeyword(Keyword),
    #[error("{what} {value} does not fit in 16 bits")]
    Overflow { what: Operand, value: usize },
    #[error("{kind} {text:?} contains a NUL byte")]
    EmbeddedNul { kind: &'static str, text: Box<str> },
    #[error("nothing to compile, feed a program first")]
    NothingFed,
}

/// Owns one program and the tables built while compiling it.
///
/// Feed it source (or a ready-made [`Node`]), then call [`Compiler::compile`].
/// The tables are rebuilt from scratch on every call.
#[derive(Debug, Default)]
pub struct Compiler {
    options: CompilerOptions,
    ast: Option<Node>,
    symbols: SymbolInterner,
    constants: ConstantPool,
    pages: CodePageSet,
    bytecode: Vec<u8>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompilerOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> CompilerOptions {
        self.options
    }

    /// Reads `source` and keeps its tree for the next [`Compiler::compile`].
    ///
    /// Any syntax problem rejects the whole source, and drops whatever was fed
    /// before it.
    pub fn feed(&mut self, source: &str) -> Result<(), CompileError> {
        self.ast = None;
        let parse = general_parse(source);
        if !parse.check() {
            tracing::debug!(errors = parse.errors().len(), "source rejected");
            return Err(CompileError::Syntax(parse.errors().to_vec()));
        }
        let node = Node::from_parse(&parse).ok_or(CompileError::NothingFed)?;
        self.feed_ast(node);
        Ok(())
    }

    pub fn feed_ast(&mut self, node: Node) {
        self.ast = Some(node);
    }

    /// Compiles whatever was fed last, returning the finished image.
    pub fn compile(&mut self) -> Result<&[u8], CompileError> {
        let ast = self.ast.as_ref().ok_or(CompileError::NothingFed)?;

        self.symbols = SymbolInterner::new();
        self.constants = ConstantPool::new();
        self.pages = CodePageSet::new();
        self.bytecode.clear();

        AstCompiler::new(
            self.options,
            &mut self.symbols,
            &mut self.constants,
            &mut self.pages,
        )
        .compile_program(ast)?;

        self.bytecode =
            serializer::serialize(&self.symbols, &self.constants, self.pages.pages())?;

        tracing::debug!(
            symbols = self.symbols.len(),
            constants = self.constants.len(),
            pages = self.pages.len(),
            bytes = self.bytecode.len(),
            "compiled"
        );
        Ok(&self.bytecode)
    }

    /// The image produced by the last successful [`Compiler::compile`].
    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    pub fn symbols(&self) -> &SymbolInterner {
        &self.symbols
    }

    pub fn constants(&self) -> &ConstantPool {
        &self.constants
    }

    pub fn pages(&self) -> &CodePageSet {
        &self.pages
    }

    pub fn page(&self, id: PageId) -> Option<&page::CodePage> {
        self.pages.get(id)
    }
}
