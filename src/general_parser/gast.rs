//! The types of this module make the results of the general parser more
//! accessible by providing a strongly-typed layer on top of the CST produced
//! by the parser.
use crate::{lexer::Token, ArkNumber};

/// GAst Syntax Types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(non_camel_case_types, clippy::upper_case_acronyms)]
#[repr(u16)]
pub enum SyntaxKind {
    // Literals
    // (which correspond to lexer tokens)
    /// (
    LPAREN = 0,
    /// )
    RPAREN,
    /// any kind of inline whitespace
    WHITESPACE,
    /// \r | \n | \r\n
    LINEEND,
    /// ' comment
    COMMENT,
    /// a word or an operator
    SYMBOL,
    /// a number literal
    NUMBER,
    /// a string literal
    STRING,
    /// lexer errors and stray `)`
    ERROR,

    // composite nodes
    /// `(+ 2 3)` or `()`
    LIST,
    /// wraps any valid datum
    DATUM,
    /// top-level node: a list of s-expressions
    ROOT,
}
use SyntaxKind::*;

impl From<&Token> for SyntaxKind {
    fn from(token: &Token) -> Self {
        match token {
            Token::IntralineWhitespace => WHITESPACE,
            Token::LineEnding => LINEEND,
            Token::Comment => COMMENT,
            Token::LParen => LPAREN,
            Token::RParen => RPAREN,
            Token::String(_) => STRING,
            Token::Number(_) => NUMBER,
            Token::Identifier(_) => SYMBOL,
        }
    }
}

/// Some boilerplate is needed, as rowan settled on using its own
/// `struct SyntaxKind(u16)` internally, instead of accepting the
/// user's `enum SyntaxKind` as a type parameter.
impl From<SyntaxKind> for rowan::SyntaxKind {
    fn from(kind: SyntaxKind) -> Self {
        Self(kind as u16)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArkLang {}
impl rowan::Language for ArkLang {
    type Kind = SyntaxKind;
    fn kind_from_raw(raw: rowan::SyntaxKind) -> Self::Kind {
        assert!(raw.0 <= ROOT as u16);
        unsafe { std::mem::transmute::<u16, SyntaxKind>(raw.0) }
    }
    fn kind_to_raw(kind: Self::Kind) -> rowan::SyntaxKind {
        kind.into()
    }
}

pub type ArkSyntaxNode = rowan::SyntaxNode<ArkLang>;
pub type ArkSyntaxToken = rowan::SyntaxToken<ArkLang>;
pub type ArkSyntaxElement = rowan::NodeOrToken<ArkSyntaxNode, ArkSyntaxToken>;

/// Anything that is a non-terminal
pub trait GAstNode {
    fn cast(syntax: ArkSyntaxNode) -> Option<Self>
    where
        Self: Sized;

    fn syntax(&self) -> &ArkSyntaxNode;
}

/// Anything that is a terminal
pub trait GAstToken {
    fn cast(syntax: ArkSyntaxToken) -> Option<Self>
    where
        Self: Sized;

    fn syntax(&self) -> &ArkSyntaxToken;
}

macro_rules! simple_gast {
    (node $name:ident from $kind:ident) => {
        impl GAstNode for $name {
            fn cast(syntax: ArkSyntaxNode) -> Option<Self>
            where
                Self: Sized,
            {
                (syntax.kind() == $kind).then_some(Self(syntax))
            }

            fn syntax(&self) -> &ArkSyntaxNode {
                &self.0
            }
        }
    };

    (node $name:ident from $kind:ident $with:expr) => {
        impl GAstNode for $name {
            fn cast(syntax: ArkSyntaxNode) -> Option<Self>
            where
                Self: Sized,
            {
                (syntax.kind() == $kind && $with(&syntax)).then_some(Self(syntax))
            }

            fn syntax(&self) -> &ArkSyntaxNode {
                &self.0
            }
        }
    };
    (token $name:ident from $kind:ident) => {
        impl GAstToken for $name {
            fn cast(syntax: ArkSyntaxToken) -> Option<Self>
            where
                Self: Sized,
            {
                (syntax.kind() == $kind).then_some(Self(syntax))
            }

            fn syntax(&self) -> &ArkSyntaxToken {
                &self.0
            }
        }
    };
}

/// Any node that can contain datum
pub trait ContainsDatum {
    fn datum(&self) -> impl Iterator<Item = Datum>;
}

macro_rules! contains {
    (datum $tyn:ident) => {
        impl ContainsDatum for $tyn {
            fn datum(&self) -> impl Iterator<Item = Datum> {
                self.0.children().filter_map(Datum::cast)
            }
        }
    };
}

/// Root GAst type for a file
#[derive(Debug, Clone)]
pub struct Module(ArkSyntaxNode);
simple_gast!(node Module from ROOT);
contains!(datum Module);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatumKind {
    List,
    Symbol,
    Number,
    StringToken,
}

#[derive(Debug, Clone)]
pub struct Datum(ArkSyntaxNode);
impl Datum {
    // If this says `Some`, calling the correct as_* and unwrapping must never panic
    pub fn kind(&self) -> Option<DatumKind> {
        match self.0.children_with_tokens().next() {
            None => None,
            Some(ArkSyntaxElement::Node(node)) => match node.kind() {
                LIST => Some(DatumKind::List),
                _ => None,
            },
            Some(ArkSyntaxElement::Token(tok)) => match tok.kind() {
                SYMBOL => Some(DatumKind::Symbol),
                NUMBER => Some(DatumKind::Number),
                STRING => Some(DatumKind::StringToken),
                _ => None,
            },
        }
    }
}
// *all* validly parsed datum only contain 1 child
simple_gast!(node Datum from DATUM |syntax: &ArkSyntaxNode| {
    syntax.children_with_tokens().count() == 1
});

macro_rules! datum_as_type {
    (node $name:ident for $type:ident from $stype:ident) => {
        impl Datum {
            pub fn $name(&self) -> Option<$type> {
                match self.0.children().next() {
                    Some(node) if node.kind() == $stype => $type::cast(node),
                    _ => None,
                }
            }
        }
    };

    (token $name:ident for $type:ident from $stype:ident) => {
        impl Datum {
            pub fn $name(&self) -> Option<$type> {
                match self.0.children_with_tokens().next() {
                    Some(ArkSyntaxElement::Token(token)) if token.kind() == $stype => {
                        $type::cast(token)
                    }
                    _ => None,
                }
            }
        }
    };
}
datum_as_type!(node as_list for List from LIST);
datum_as_type!(token as_symbol for Symbol from SYMBOL);
datum_as_type!(token as_number for Number from NUMBER);
datum_as_type!(token as_string for StringToken from STRING);

#[derive(Debug, Clone)]
pub struct List(ArkSyntaxNode);
simple_gast!(node List from LIST);
contains!(datum List);

macro_rules! simple_extract {
    ($ty:ident::$name:ident from $stt:ident as $type:ty ) => {
        impl $ty {
            pub fn $name(&self) -> Option<$type> {
                if let Some(Ok(Token::$stt(val))) = Token::lexer(self.0.text()).next() {
                    Some(val)
                } else {
                    None
                }
            }
        }
    };
}

#[derive(Debug, Clone)]
pub struct Symbol(ArkSyntaxToken);
simple_gast!(token Symbol from SYMBOL);
simple_extract!(Symbol::identifier from Identifier as Box<str>);

#[derive(Debug, Clone)]
pub struct Number(ArkSyntaxToken);
simple_gast!(token Number from NUMBER);
simple_extract!(Number::number from Number as ArkNumber);

#[derive(Debug, Clone)]
pub struct StringToken(ArkSyntaxToken);
simple_gast!(token StringToken from STRING);
simple_extract!(StringToken::string from String as Box<str>);
