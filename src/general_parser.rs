//! General parsing starts where the lexer dropped of, and handles nested syntax, while
//! also forming a GAST which is a relatively simple layer on top of a [`rowan`] CST.
use rowan::{GreenNode, GreenNodeBuilder};

use crate::lexer::{LexerError, Span, Token};

pub mod gast;
pub mod special_forms;

use gast::{ArkSyntaxNode, GAstNode, Module, SyntaxKind};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    #[error(transparent)]
    Lexer(#[from] LexerError),
    #[error("unclosed list")]
    UnclosedList,
    #[error("unexpected `)`")]
    UnexpectedClose,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{kind} at {}..{}", .span.start, .span.end)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

/// The result of reading some source: a lossless tree, plus whatever went wrong
/// while building it.
#[derive(Debug, Clone)]
pub struct Parse {
    green: GreenNode,
    errors: Vec<ParseError>,
}

impl Parse {
    pub fn syntax(&self) -> ArkSyntaxNode {
        ArkSyntaxNode::new_root(self.green.clone())
    }

    pub fn module(&self) -> Option<Module> {
        Module::cast(self.syntax())
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// True when the source read cleanly.
    pub fn check(&self) -> bool {
        self.errors.is_empty()
    }
}

// Using rowan and CST should (and hopefully does) give us a nice property that
// calculating lines should be possible (as it is a full fidelity structure)

struct Lexeme<'src> {
    kind: SyntaxKind,
    text: &'src str,
    span: Span,
    error: Option<LexerError>,
}

struct Parser<'src> {
    // reversed, so the next lexeme is at the end
    lexemes: Vec<Lexeme<'src>>,
    builder: GreenNodeBuilder<'static>,
    errors: Vec<ParseError>,
    source_len: usize,
}

impl<'src> Parser<'src> {
    fn new(source: &'src str) -> Self {
        let mut lexer = Token::lexer(source);
        let mut lexemes = vec![];
        while let Some(token) = lexer.next() {
            let (kind, error) = match token {
                Ok(token) => (SyntaxKind::from(&token), None),
                Err(err) => (SyntaxKind::ERROR, Some(err)),
            };
            lexemes.push(Lexeme {
                kind,
                text: lexer.slice(),
                span: lexer.span(),
                error,
            });
        }
        lexemes.reverse();

        Self {
            lexemes,
            builder: GreenNodeBuilder::new(),
            errors: vec![],
            source_len: source.len(),
        }
    }

    fn current(&self) -> Option<SyntaxKind> {
        self.lexemes.last().map(|lexeme| lexeme.kind)
    }

    fn current_span(&self) -> Span {
        self.lexemes
            .last()
            .map(|lexeme| lexeme.span.clone())
            .unwrap_or(self.source_len..self.source_len)
    }

    fn bump(&mut self) {
        if let Some(lexeme) = self.lexemes.pop() {
            if let Some(err) = lexeme.error {
                self.errors.push(ParseError {
                    kind: err.into(),
                    span: lexeme.span,
                });
            }
            self.builder.token(lexeme.kind.into(), lexeme.text);
        }
    }

    fn parse(mut self) -> Parse {
        self.builder.start_node(SyntaxKind::ROOT.into());
        while let Some(kind) = self.current() {
            match kind {
                SyntaxKind::RPAREN => {
                    self.errors.push(ParseError {
                        kind: ParseErrorKind::UnexpectedClose,
                        span: self.current_span(),
                    });
                    self.builder.start_node(SyntaxKind::ERROR.into());
                    self.bump();
                    self.builder.finish_node();
                }
                _ => self.element(),
            }
        }
        self.builder.finish_node();

        Parse {
            green: self.builder.finish(),
            errors: self.errors,
        }
    }

    /// Trivia, a bad lexeme or a datum
    fn element(&mut self) {
        match self.current() {
            Some(SyntaxKind::WHITESPACE | SyntaxKind::LINEEND | SyntaxKind::COMMENT)
            | Some(SyntaxKind::ERROR) => self.bump(),
            Some(_) => self.datum(),
            None => {}
        }
    }

    fn datum(&mut self) {
        self.builder.start_node(SyntaxKind::DATUM.into());
        match self.current() {
            Some(SyntaxKind::LPAREN) => self.list(),
            _ => self.bump(),
        }
        self.builder.finish_node();
    }

    fn list(&mut self) {
        let open = self.current_span().start;
        self.builder.start_node(SyntaxKind::LIST.into());
        self.bump();
        loop {
            match self.current() {
                None => {
                    self.errors.push(ParseError {
                        kind: ParseErrorKind::UnclosedList,
                        span: open..self.source_len,
                    });
                    break;
                }
                Some(SyntaxKind::RPAREN) => {
                    self.bump();
                    break;
                }
                Some(_) => self.element(),
            }
        }
        self.builder.finish_node();
    }
}

/// Reads source into a [`Parse`]. Never fails: problems are collected instead.
pub fn general_parse(source: &str) -> Parse {
    let parse = Parser::new(source).parse();
    tracing::trace!(errors = parse.errors.len(), "read {} bytes", source.len());
    parse
}
