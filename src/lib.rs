pub mod ast;
pub mod compiler;
pub mod general_parser;
pub mod lexer;
mod num;

pub use ast::Node;
pub use compiler::{
    bytecode::{Bytecode, DecodeError},
    CompileError, Compiler, CompilerOptions,
};
pub use general_parser::{gast::*, general_parse, special_forms::Keyword, Parse, ParseError};
pub use num::{ArkNumber, NumberError};
