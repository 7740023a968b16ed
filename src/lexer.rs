pub use logos::Span;
use logos::{Lexer, Logos};

use crate::{num::NumberError, ArkNumber};

fn process_string(lexer: &mut Lexer<Token>) -> Result<Box<str>, LexerError> {
    // Our string syntax is described by /"([^\\"]|\\[ntr"\\])*"/
    // We use a more permissive version of this on the Logos side, so that errors are neater.
    let slice = lexer.slice();
    let mut string = String::new();

    // Skip the quotes on both ends
    let mut chars = slice[1..slice.len() - 1].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => string.push('\n'),
                Some('t') => string.push('\t'),
                Some('r') => string.push('\r'),
                Some('\\') => string.push('\\'),
                Some('"') => string.push('"'),
                Some(_) | None => Err(LexerError::MalformedString)?,
            },
            c => string.push(c),
        }
    }

    Ok(Box::from(string.as_str()))
}

fn read_number(lexer: &mut Lexer<Token>) -> Result<ArkNumber, LexerError> {
    Ok(ArkNumber::parse(lexer.slice())?)
}

#[derive(thiserror::Error, Debug, PartialEq, Clone, Default)]
pub enum LexerError {
    #[default]
    #[error("invalid token encountered")]
    Invalid,
    #[error("malformed string")]
    MalformedString,
    #[error("malformed number")]
    MalformedNumber,
    #[error("number literal too big")]
    NumberTooBig,
}

impl From<NumberError> for LexerError {
    fn from(value: NumberError) -> Self {
        match value {
            NumberError::Malformed => Self::MalformedNumber,
            NumberError::TooBig => Self::NumberTooBig,
        }
    }
}

/// Tokens are lexed from some source, trivia included, so the reader can
/// build a lossless tree out of them.
#[derive(Debug, Clone, PartialEq, Logos)]
#[logos(error = LexerError)]
pub enum Token {
    #[regex("[ \t]+")]
    IntralineWhitespace,
    #[token("\n")]
    #[token("\r\n")]
    #[token("\r")]
    LineEnding,
    #[regex(r"'[^\r\n]*")]
    Comment,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[regex(r#""([^\\"]|\\.)*""#, process_string)]
    String(Box<str>),
    #[regex(r"[+-]?[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", read_number)]
    Number(ArkNumber),
    // A word never starts where a number could, so `3x` is `3` then `x` and
    // `1-2` is `1` then `-2`
    #[regex(r"([_!?]|[^\W\d])[_!?\-\w]*", |l| Box::from(l.slice()))]
    #[regex(r"-(([_!?\-]|[^\W\d])[_!?\-\w]*)?", |l| Box::from(l.slice()))]
    #[token("+", |l| Box::from(l.slice()))]
    #[token("*", |l| Box::from(l.slice()))]
    #[token("/", |l| Box::from(l.slice()))]
    #[token("%", |l| Box::from(l.slice()))]
    #[token("^", |l| Box::from(l.slice()))]
    #[token("=", |l| Box::from(l.slice()))]
    #[token("!=", |l| Box::from(l.slice()))]
    #[token("<", |l| Box::from(l.slice()))]
    #[token("<=", |l| Box::from(l.slice()))]
    #[token(">", |l| Box::from(l.slice()))]
    #[token(">=", |l| Box::from(l.slice()))]
    Identifier(Box<str>),
}

impl Token {
    pub fn lexer(source: &str) -> Lexer<Self> {
        <Self as Logos>::lexer(source)
    }

    /// Whitespace and comments, which carry no meaning for the compiler.
    pub fn is_trivia(&self) -> bool {
        matches!(
            self,
            Self::IntralineWhitespace | Self::LineEnding | Self::Comment
        )
    }
}
