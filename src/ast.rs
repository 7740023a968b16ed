//! The tree the compiler consumes. Lowered from a clean [`Parse`], or built by hand.
use core::fmt;

use crate::{
    general_parser::{
        gast::{ContainsDatum, Datum, DatumKind, Module},
        special_forms::Keyword,
        Parse,
    },
    ArkNumber,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    Symbol(Box<str>),
    String(Box<str>),
    Number(ArkNumber),
    Keyword(Keyword),
    List(Vec<Node>),
}

impl Node {
    pub fn symbol(name: &str) -> Self {
        Self::Symbol(Box::from(name))
    }

    pub fn string(text: &str) -> Self {
        Self::String(Box::from(text))
    }

    pub fn number(value: impl Into<ArkNumber>) -> Self {
        Self::Number(value.into())
    }

    pub fn list(items: impl IntoIterator<Item = Node>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// `(keyword operands...)`
    pub fn form(keyword: Keyword, operands: impl IntoIterator<Item = Node>) -> Self {
        Self::List(
            std::iter::once(Self::Keyword(keyword))
                .chain(operands)
                .collect(),
        )
    }

    /// Lowers a whole program. No datum gives an empty list, a single datum is
    /// returned as is, and several are wrapped in an implicit `begin`.
    pub fn from_module(module: &Module) -> Self {
        let mut datum = module.datum().filter_map(|d| lower(&d)).collect::<Vec<_>>();
        match datum.len() {
            0 => Self::List(vec![]),
            1 => datum.remove(0),
            _ => Self::form(Keyword::Begin, datum),
        }
    }

    /// Lowers a parse, or returns `None` when it had errors.
    pub fn from_parse(parse: &Parse) -> Option<Self> {
        if !parse.check() {
            return None;
        }
        parse.module().map(|module| Self::from_module(&module))
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }
}

fn lower(datum: &Datum) -> Option<Node> {
    Some(match datum.kind()? {
        DatumKind::List => Node::List(
            datum
                .as_list()?
                .datum()
                .filter_map(|d| lower(&d))
                .collect(),
        ),
        DatumKind::Symbol => {
            let name = datum.as_symbol()?.identifier()?;
            match Keyword::from_name(&name) {
                Some(keyword) => Node::Keyword(keyword),
                None => Node::Symbol(name),
            }
        }
        DatumKind::Number => Node::Number(datum.as_number()?.number()?),
        DatumKind::StringToken => Node::String(datum.as_string()?.string()?),
    })
}

/// Prints the node back as source that reads to the same node.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Symbol(name) => f.write_str(name),
            Node::Keyword(keyword) => write!(f, "{keyword}"),
            Node::Number(number) => write!(f, "{number}"),
            Node::String(text) => {
                f.write_str("\"")?;
                for c in text.chars() {
                    match c {
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        '\\' => f.write_str("\\\\")?,
                        '"' => f.write_str("\\\"")?,
                        c => write!(f, "{c}")?,
                    }
                }
                f.write_str("\"")
            }
            Node::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Node;
    use crate::{general_parser::general_parse, ArkNumber, Keyword};
    use assert2::{check, let_assert};

    fn read(source: &str) -> Node {
        let_assert!(Some(node) = Node::from_parse(&general_parse(source)));
        node
    }

    #[test]
    fn keywords_and_symbols() {
        check!(
            read("(def x (fun (a) a))")
                == Node::form(
                    Keyword::Def,
                    [
                        Node::symbol("x"),
                        Node::form(
                            Keyword::Fun,
                            [Node::list([Node::symbol("a")]), Node::symbol("a")]
                        ),
                    ]
                )
        );
        // case matters
        check!(read("If") == Node::symbol("If"));
        check!(read("while") == Node::Keyword(Keyword::While));
    }

    #[test]
    fn literals() {
        check!(read("\"a\\\"b\"") == Node::string("a\"b"));
        check!(read("1.50") == Node::Number(ArkNumber::parse("1.5").unwrap()));
        check!(read("<=") == Node::symbol("<="));
    }

    #[test]
    fn root_lowering() {
        check!(read("") == Node::list([]));
        check!(read("  ' nothing here\n") == Node::list([]));
        check!(read("x") == Node::symbol("x"));
        check!(read("x y") == Node::form(Keyword::Begin, [Node::symbol("x"), Node::symbol("y")]));
    }

    #[test]
    fn rejected_parse_does_not_lower() {
        check!(Node::from_parse(&general_parse("(a")).is_none());
    }

    #[test]
    fn display_reads_back() {
        let source = "(begin (def s \"tab\\there\") (while (< i 1.5) (set i (+ i -2))) ())";
        let node = read(source);
        check!(node.to_string() == source);
        check!(read(&node.to_string()) == node);
    }
}
