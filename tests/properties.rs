use std::collections::HashSet;

use arbitrary::{Result, Unstructured};
use arbtest::arbtest;
use ark::{
    compiler::{
        ast_compiler::AstCompiler,
        bytecode::{Bytecode, Constant, Instruction, Op},
        constants::ConstantPool,
        page::{CodePageSet, PageId},
        symbols::SymbolInterner,
    },
    ArkNumber, Compiler, CompilerOptions, Keyword, Node,
};
use assert2::{check, let_assert};

const NAMES: &[&str] = &["a", "b", "x", "print", "+", "<=", "set-car!", "empty?"];
const TEXTS: &[&str] = &["", "hi", "two words", "tab\there", "\"quoted\"", "ünïcode"];

fn name(u: &mut Unstructured<'_>) -> Result<Node> {
    Ok(Node::symbol(u.choose(NAMES)?))
}

fn atom(u: &mut Unstructured<'_>) -> Result<Node> {
    Ok(match u.int_in_range(0..=2)? {
        0 => name(u)?,
        1 => Node::Number(u.arbitrary::<ArkNumber>()?),
        _ => Node::string(u.choose(TEXTS)?),
    })
}

/// Some well formed program, at most `depth` lists deep.
fn expr(u: &mut Unstructured<'_>, depth: u32) -> Result<Node> {
    if depth == 0 {
        return atom(u);
    }
    let depth = depth - 1;
    Ok(match u.int_in_range(0..=8)? {
        0 => atom(u)?,
        1 => Node::form(Keyword::If, [expr(u, depth)?, expr(u, depth)?, expr(u, depth)?]),
        2 => Node::form(Keyword::Set, [name(u)?, expr(u, depth)?]),
        3 => Node::form(Keyword::Def, [name(u)?, expr(u, depth)?]),
        4 => {
            let params = (0..u.int_in_range(0..=3)?)
                .map(|_| name(u))
                .collect::<Result<Vec<_>>>()?;
            Node::form(Keyword::Fun, [Node::List(params), expr(u, depth)?])
        }
        5 => {
            let body = (0..u.int_in_range(0..=3)?)
                .map(|_| expr(u, depth))
                .collect::<Result<Vec<_>>>()?;
            Node::form(Keyword::Begin, body)
        }
        6 => Node::form(Keyword::While, [expr(u, depth)?, expr(u, depth)?]),
        7 => {
            let mut items = vec![expr(u, depth)?];
            for _ in 0..u.int_in_range(0..=3)? {
                items.push(expr(u, depth)?);
            }
            Node::List(items)
        }
        _ => Node::list([]),
    })
}

fn compile_with(node: &Node, options: CompilerOptions) -> Vec<u8> {
    let mut compiler = Compiler::with_options(options);
    compiler.feed_ast(node.clone());
    compiler.compile().unwrap().to_vec()
}

fn compile(node: &Node) -> Bytecode {
    Bytecode::decode(&compile_with(node, CompilerOptions::default())).unwrap()
}

/// Bytes `node` takes when compiled inside some page
fn code_len(node: &Node) -> usize {
    let mut symbols = SymbolInterner::new();
    let mut constants = ConstantPool::new();
    let mut pages = CodePageSet::new();
    AstCompiler::new(
        CompilerOptions::default(),
        &mut symbols,
        &mut constants,
        &mut pages,
    )
    .compile_into(node, PageId::MAIN)
    .unwrap();
    pages.pages()[0].len()
}

fn ops(image: &Bytecode, page: usize) -> Vec<Op> {
    image.segments[page]
        .instructions()
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn compiling_is_deterministic() {
    arbtest(|u| {
        let program = expr(u, 4)?;
        for options in [
            CompilerOptions::default(),
            CompilerOptions {
                begin_emits_ret: true,
                strict_control_flow: true,
            },
        ] {
            let mut compiler = Compiler::with_options(options);
            compiler.feed_ast(program.clone());
            let first = compiler.compile().unwrap().to_vec();
            let second = compiler.compile().unwrap().to_vec();
            check!(first == second, "{program}");
            check!(first == compile_with(&program, options), "{program}");
        }
        Ok(())
    });
}

#[test]
fn images_are_well_formed() {
    arbtest(|u| {
        let program = expr(u, 4)?;
        let options = CompilerOptions {
            begin_emits_ret: u.arbitrary()?,
            strict_control_flow: u.arbitrary()?,
        };
        let bytes = compile_with(&program, options);
        check!(bytes[..4] == *b"ark\0");

        // decoding checks the markers and the HALT after every segment
        let_assert!(Ok(image) = Bytecode::decode(&bytes));

        let unique_symbols = image.symbols.iter().collect::<HashSet<_>>();
        check!(unique_symbols.len() == image.symbols.len());
        for (i, constant) in image.constants.iter().enumerate() {
            check!(!image.constants[..i].contains(constant), "{program}");
            if let Constant::Page(page) = constant {
                check!((*page as usize) < image.segments.len());
                check!(*page != 0);
            }
        }

        for page in 0..image.segments.len() {
            let code = ops(&image, page);
            let boundaries = code.iter().map(|op| op.offset).collect::<HashSet<_>>();
            let end = image.segments[page].code.len();
            for op in &code {
                let operand = op.operand.map(usize::from);
                match (op.instruction, operand) {
                    (Instruction::LoadSymbol | Instruction::Store | Instruction::Let, Some(i)) => {
                        check!(i < image.symbols.len());
                    }
                    (Instruction::LoadConst, Some(i)) => {
                        check!(i < image.constants.len());
                    }
                    (Instruction::Jump, Some(target)) => {
                        check!(boundaries.contains(&target) || target == end, "{program}");
                    }
                    (Instruction::PopJumpIfTrue | Instruction::PopJumpIfFalse, Some(skip)) => {
                        let target = op.offset + 3 + skip;
                        check!(boundaries.contains(&target) || target == end, "{program}");
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    });
}

#[test]
fn repeated_names_and_literals_share_an_index() {
    arbtest(|u| {
        let literal = atom(u)?;
        let count = u.int_in_range(1..=6)?;
        let program = Node::List(
            std::iter::once(Node::symbol("f"))
                .chain(std::iter::repeat(literal.clone()).take(count))
                .collect(),
        );
        let image = compile(&program);
        let code = ops(&image, 0);
        let operands = code[..count]
            .iter()
            .map(|op| (op.instruction, op.operand))
            .collect::<HashSet<_>>();
        check!(operands.len() == 1);
        match literal {
            Node::Symbol(_) => {
                check!(image.symbols.len() <= 2);
            }
            _ => {
                check!(image.constants.len() == 1);
            }
        }
        Ok(())
    });
}

#[test]
fn printed_programs_read_back() {
    arbtest(|u| {
        let program = expr(u, 4)?;
        let source = program.to_string();
        let mut compiler = Compiler::new();
        let_assert!(Ok(()) = compiler.feed(&source));
        let from_source = compiler.compile().unwrap().to_vec();
        check!(from_source == compile_with(&program, CompilerOptions::default()), "{source}");
        Ok(())
    });
}

#[test]
fn if_skips_exactly_the_else_arm() {
    arbtest(|u| {
        let (condition, then, otherwise) = (expr(u, 2)?, expr(u, 2)?, expr(u, 2)?);
        let program = Node::form(
            Keyword::If,
            [condition.clone(), then.clone(), otherwise.clone()],
        );
        let image = compile(&program);
        let code = ops(&image, 0);

        let at = code_len(&condition);
        let_assert!(Some(jump) = code.iter().find(|op| op.offset == at));
        check!(jump.instruction == Instruction::PopJumpIfTrue);
        check!(jump.operand == Some(code_len(&otherwise) as u16));

        let then_start = at + 3 + code_len(&otherwise);
        check!(code.iter().any(|op| op.offset == then_start));
        check!(then_start + code_len(&then) == image.segments[0].code.len());
        Ok(())
    });
}

#[test]
fn while_jumps_back_to_its_start() {
    arbtest(|u| {
        let (condition, body) = (expr(u, 2)?, expr(u, 2)?);
        let program = Node::form(Keyword::While, [condition.clone(), body.clone()]);
        let image = compile(&program);
        let code = ops(&image, 0);

        let at = code_len(&condition);
        let_assert!(Some(exit) = code.iter().find(|op| op.offset == at));
        check!(exit.instruction == Instruction::PopJumpIfFalse);
        check!(exit.operand == Some(code_len(&body) as u16));

        let_assert!(Some(back) = code.last());
        check!(back.instruction == Instruction::Jump);
        check!(back.operand == Some(0));
        check!(back.offset == at + 3 + code_len(&body));
        Ok(())
    });
}

#[test]
fn functions_get_their_own_page() {
    arbtest(|u| {
        let params = (0..u.int_in_range(0..=4)?)
            .map(|_| name(u))
            .collect::<Result<Vec<_>>>()?;
        let body = expr(u, 2)?;
        let program = Node::form(Keyword::Fun, [Node::List(params.clone()), body]);
        let image = compile(&program);

        check!(image.constants[0] == Constant::Page(1));
        let main = ops(&image, 0);
        check!(main.len() == 1);
        check!((main[0].instruction, main[0].operand) == (Instruction::LoadConst, Some(0)));

        let code = ops(&image, 1);
        check!(code[0].instruction == Instruction::NewEnv);
        for (param, op) in params.iter().zip(&code[1..]) {
            check!(op.instruction == Instruction::Let);
            let_assert!(Some(index) = op.operand);
            let_assert!(Node::Symbol(expected) = param);
            check!(image.symbols[index as usize] == *expected);
        }
        let_assert!(Some(last) = code.last());
        check!(last.instruction == Instruction::Ret);
        Ok(())
    });
}

#[test]
fn calls_push_arguments_then_callee() {
    arbtest(|u| {
        let (a, b) = (expr(u, 2)?, expr(u, 2)?);
        let program = Node::list([Node::symbol("f"), a.clone(), b.clone()]);
        let image = compile(&program);
        let code = ops(&image, 0);

        let callee_at = code_len(&a) + code_len(&b);
        let_assert!(Some(callee) = code.iter().find(|op| op.offset == callee_at));
        check!(callee.instruction == Instruction::LoadSymbol);
        let_assert!(Some(index) = callee.operand);
        check!(&*image.symbols[index as usize] == "f");
        // the callee is interned before the arguments
        check!(index == 0);

        let_assert!(Some(call) = code.last());
        check!((call.instruction, call.operand) == (Instruction::Call, Some(2)));
        check!(call.offset == callee_at + 3);
        Ok(())
    });
}

#[test]
fn empty_program_still_has_a_segment() {
    let image = compile(&Node::list([]));
    check!(image.segments.len() == 1);
    check!(image.segments[0].code.is_empty());
    check!(image.symbols.is_empty());
    check!(image.constants.is_empty());
}
