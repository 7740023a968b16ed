//! Turns a [`Node`] tree into code pages.
//!
//! Each construct builds into its own scratch [`CodePage`] where it needs to
//! know a length before emitting, then splices it in. Jump distances are
//! therefore always known when the jump is pushed, and absolute jump targets
//! are rebased by the splice.
use crate::{ast::Node, general_parser::special_forms::Keyword};

use super::{
    bytecode::Instruction,
    constants::{ConstantPool, Value},
    page::{CodePage, CodePageSet, PageId},
    symbols::SymbolInterner,
    CompileError, CompilerOptions, Operand,
};

/// Width of an instruction with its operand.
const JUMP_WIDTH: usize = 3;

pub struct AstCompiler<'c> {
    options: CompilerOptions,
    symbols: &'c mut SymbolInterner,
    constants: &'c mut ConstantPool,
    pages: &'c mut CodePageSet,
}

impl<'c> AstCompiler<'c> {
    pub fn new(
        options: CompilerOptions,
        symbols: &'c mut SymbolInterner,
        constants: &'c mut ConstantPool,
        pages: &'c mut CodePageSet,
    ) -> Self {
        Self {
            options,
            symbols,
            constants,
            pages,
        }
    }

    /// Compiles a whole program into page 0. An empty program emits nothing.
    pub fn compile_program(&mut self, program: &Node) -> Result<(), CompileError> {
        if program.as_list().is_some_and(<[Node]>::is_empty) {
            return Ok(());
        }
        self.compile_into(program, PageId::MAIN)
    }

    /// Compiles `node`, appending its code to `page`.
    pub fn compile_into(&mut self, node: &Node, page: PageId) -> Result<(), CompileError> {
        let mut code = CodePage::new();
        self.compile(node, &mut code)?;
        self.pages.install(page, code)
    }

    fn compile(&mut self, node: &Node, page: &mut CodePage) -> Result<(), CompileError> {
        match node {
            Node::Symbol(name) => {
                let index = self.symbols.intern(name);
                page.push_with_operand(Instruction::LoadSymbol, index, Operand::SymbolIndex)
            }
            Node::String(text) => self.load_const(Value::String(text.clone()), page),
            Node::Number(number) => self.load_const(Value::Number(number.clone()), page),
            Node::Keyword(keyword) => Err(CompileError::MisplacedKeyword(*keyword)),
            Node::List(items) => match items.split_first() {
                None => {
                    page.push_instruction(Instruction::Nop);
                    Ok(())
                }
                Some((Node::Keyword(keyword), operands)) => {
                    self.compile_form(*keyword, operands, page)
                }
                Some((callee, args)) => self.compile_call(callee, args, page),
            },
        }
    }

    fn load_const(&mut self, value: Value, page: &mut CodePage) -> Result<(), CompileError> {
        let index = self.constants.intern(value);
        page.push_with_operand(Instruction::LoadConst, index, Operand::ConstantIndex)
    }

    fn compile_form(
        &mut self,
        keyword: Keyword,
        operands: &[Node],
        page: &mut CodePage,
    ) -> Result<(), CompileError> {
        keyword
            .check(operands)
            .map_err(|reason| CompileError::MalformedForm {
                form: keyword,
                reason,
            })?;
        tracing::trace!(form = keyword.name(), at = page.len(), "special form");

        match (keyword, operands) {
            (Keyword::If, [condition, then, otherwise]) => {
                self.compile_if(condition, then, otherwise, page)
            }
            (Keyword::Set | Keyword::Def, [Node::Symbol(name), value]) => {
                let index = self.symbols.intern(name);
                self.compile(value, page)?;
                let instruction = match keyword {
                    Keyword::Set => Instruction::Store,
                    _ => Instruction::Let,
                };
                page.push_with_operand(instruction, index, Operand::SymbolIndex)
            }
            (Keyword::Fun, [Node::List(params), body]) => self.compile_fun(params, body, page),
            (Keyword::Begin, body) => {
                if body.is_empty() {
                    page.push_instruction(Instruction::Nop);
                }
                for node in body {
                    self.compile(node, page)?;
                }
                if self.options.begin_emits_ret {
                    page.push_instruction(Instruction::Ret);
                }
                Ok(())
            }
            (Keyword::While, [condition, body]) => self.compile_while(condition, body, page),
            _ => unreachable!("shape checked by Keyword::check"),
        }
    }

    /// `cond; POP_JUMP_IF_TRUE len(else); else; then`
    ///
    /// Without strict control flow the else arm runs on into the then arm.
    fn compile_if(
        &mut self,
        condition: &Node,
        then: &Node,
        otherwise: &Node,
        page: &mut CodePage,
    ) -> Result<(), CompileError> {
        self.compile(condition, page)?;

        let mut else_code = CodePage::new();
        self.compile(otherwise, &mut else_code)?;

        if !self.options.strict_control_flow {
            page.push_with_operand(
                Instruction::PopJumpIfTrue,
                else_code.len(),
                Operand::JumpOffset,
            )?;
            page.splice(else_code)?;
            return self.compile(then, page);
        }

        let mut then_code = CodePage::new();
        self.compile(then, &mut then_code)?;

        page.push_with_operand(
            Instruction::PopJumpIfTrue,
            else_code.len() + JUMP_WIDTH,
            Operand::JumpOffset,
        )?;
        let end = page.len() + else_code.len() + JUMP_WIDTH + then_code.len();
        page.splice(else_code)?;
        page.push_jump_target(Instruction::Jump, end)?;
        page.splice(then_code)
    }

    /// `LOAD_CONST <page>` here, `NEW_ENV; LET <param>...; body; RET` in a new page.
    fn compile_fun(
        &mut self,
        params: &[Node],
        body: &Node,
        page: &mut CodePage,
    ) -> Result<(), CompileError> {
        let id = self.pages.allocate_page();
        self.load_const(Value::PageAddress(id), page)?;

        let mut code = CodePage::new();
        code.push_instruction(Instruction::NewEnv);
        for param in params {
            if let Node::Symbol(name) = param {
                let index = self.symbols.intern(name);
                code.push_with_operand(Instruction::Let, index, Operand::SymbolIndex)?;
            }
        }
        self.compile(body, &mut code)?;
        code.push_instruction(Instruction::Ret);

        self.pages.install(id, code)
    }

    /// `start: cond; POP_JUMP_IF_FALSE len(body); body; JUMP start`
    fn compile_while(
        &mut self,
        condition: &Node,
        body: &Node,
        page: &mut CodePage,
    ) -> Result<(), CompileError> {
        let start = page.len();
        self.compile(condition, page)?;

        let mut body_code = CodePage::new();
        self.compile(body, &mut body_code)?;

        let mut exit = body_code.len();
        if self.options.strict_control_flow {
            exit += JUMP_WIDTH;
        }
        page.push_with_operand(Instruction::PopJumpIfFalse, exit, Operand::JumpOffset)?;
        page.splice(body_code)?;
        page.push_jump_target(Instruction::Jump, start)
    }

    /// Arguments left to right, then the callee, then `CALL argc`.
    ///
    /// The callee is compiled first so its names and constants are interned
    /// before the arguments'.
    fn compile_call(
        &mut self,
        callee: &Node,
        args: &[Node],
        page: &mut CodePage,
    ) -> Result<(), CompileError> {
        let mut callee_code = CodePage::new();
        self.compile(callee, &mut callee_code)?;

        for arg in args {
            self.compile(arg, page)?;
        }
        page.splice(callee_code)?;
        page.push_with_operand(Instruction::Call, args.len(), Operand::ArgumentCount)
    }
}
