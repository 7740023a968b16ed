use core::fmt;

use crate::ast::Node;

/// The words the reader turns into keywords instead of symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    // control flow
    If,
    While,
    Begin,

    // bindings
    Set,
    Def,

    // functions
    Fun,
}

impl Keyword {
    pub const ALL: [Keyword; 6] = [
        Keyword::If,
        Keyword::While,
        Keyword::Begin,
        Keyword::Set,
        Keyword::Def,
        Keyword::Fun,
    ];

    /// Keywords are case-sensitive: `If` is an ordinary symbol.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kw| kw.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::While => "while",
            Keyword::Begin => "begin",
            Keyword::Set => "set",
            Keyword::Def => "def",
            Keyword::Fun => "fun",
        }
    }

    /// Checks the operands (everything after the keyword) have the shape the
    /// form needs, returning what is wrong otherwise.
    pub fn check(self, operands: &[Node]) -> Result<(), &'static str> {
        match self {
            Keyword::If => check_if(operands),
            Keyword::Set | Keyword::Def => check_binding(operands),
            Keyword::Fun => check_fun(operands),
            Keyword::Begin => Ok(()),
            Keyword::While => check_while(operands),
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

macro_rules! declare_check {
    ($name:ident => $check:expr) => {
        fn $name(operands: &[Node]) -> Result<(), &'static str> {
            $check(operands)
        }
    };
}

declare_check!(check_if => |operands: &[Node]| {
    if operands.len() != 3 {
        return Err("expected a condition, a then branch and an else branch");
    }
    Ok(())
});

declare_check!(check_binding => |operands: &[Node]| match operands {
    [Node::Symbol(_), _] => Ok(()),
    [_, _] => Err("the bound name must be a symbol"),
    _ => Err("expected a name and a value"),
});

declare_check!(check_fun => |operands: &[Node]| match operands {
    [Node::List(params), _] => {
        if params.iter().all(|p| matches!(p, Node::Symbol(_))) {
            Ok(())
        } else {
            Err("parameters must be symbols")
        }
    }
    [_, _] => Err("expected a parameter list"),
    _ => Err("expected a parameter list and a body"),
});

declare_check!(check_while => |operands: &[Node]| {
    if operands.len() != 2 {
        return Err("expected a condition and a body");
    }
    Ok(())
});
