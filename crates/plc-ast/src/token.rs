//! Token kinds and the classified token stream.

use logos::Logos;

/// The fixed enumeration of token kinds the lexer can produce.
///
/// `Identifier` tokens are retroactively reclassified to `TypeIdentifier`
/// by [`crate::lexer::TokenBuffer::advance`] when the current lexical
/// context resolves them in the type namespace; this is how
/// context-sensitive parsing is implemented without a separate lexer mode.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r\n]+")]
pub enum TokenKind {
    // --- literals & names -------------------------------------------------
    /// An identifier that has not (yet) been classified as a keyword or type.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", priority = 1)]
    Identifier,
    /// An identifier that resolves in the type namespace of the current scope.
    ///
    /// Never produced directly by the logos regex table; assigned only by
    /// [`crate::lexer::TokenBuffer::advance`]'s retroactive rewrite.
    TypeIdentifier,
    /// A decimal, hex (`0x`), or sized (`8w10`, `8s10`) integer literal.
    #[regex(r"[0-9]+w[0-9]+|[0-9]+s[0-9]+|0x[0-9A-Fa-f]+|[0-9]+")]
    IntegerLiteral,
    /// A double-quoted string literal.
    #[regex(r#""([^"\\]|\\.)*""#)]
    StringLiteral,
    /// The `true` literal.
    #[token("true")]
    True,
    /// The `false` literal.
    #[token("false")]
    False,

    // --- keywords -----------------------------------------------------------
    /// `action`
    #[token("action")]
    Action,
    /// `apply`
    #[token("apply")]
    Apply,
    /// `bit`
    #[token("bit")]
    Bit,
    /// `bool`
    #[token("bool")]
    Bool,
    /// `const`
    #[token("const")]
    Const,
    /// `control`
    #[token("control")]
    Control,
    /// `default`
    #[token("default")]
    Default,
    /// `else`
    #[token("else")]
    Else,
    /// `enum`
    #[token("enum")]
    Enum,
    /// `error`
    #[token("error")]
    Error,
    /// `extern`
    #[token("extern")]
    Extern,
    /// `exit`
    #[token("exit")]
    Exit,
    /// `header`
    #[token("header")]
    Header,
    /// `header_union`
    #[token("header_union")]
    HeaderUnion,
    /// `if`
    #[token("if")]
    If,
    /// `in`
    #[token("in")]
    In,
    /// `inout`
    #[token("inout")]
    Inout,
    /// `int`
    #[token("int")]
    Int,
    /// `key`
    #[token("key")]
    Key,
    /// `match_kind`
    #[token("match_kind")]
    MatchKind,
    /// `out`
    #[token("out")]
    Out,
    /// `package`
    #[token("package")]
    Package,
    /// `parser`
    #[token("parser")]
    Parser,
    /// `return`
    #[token("return")]
    Return,
    /// `select`
    #[token("select")]
    Select,
    /// `state`
    #[token("state")]
    State,
    /// `string`
    #[token("string")]
    StringKeyword,
    /// `struct`
    #[token("struct")]
    Struct,
    /// `switch`
    #[token("switch")]
    Switch,
    /// `table`
    #[token("table")]
    Table,
    /// `transition`
    #[token("transition")]
    Transition,
    /// `tuple`
    #[token("tuple")]
    Tuple,
    /// `typedef`
    #[token("typedef")]
    Typedef,
    /// `varbit`
    #[token("varbit")]
    Varbit,
    /// `void`
    #[token("void")]
    Void,
    /// `actions` (table property keyword)
    #[token("actions")]
    Actions,
    /// `entries` (table property keyword)
    #[token("entries")]
    Entries,
    /// `default_action` (table property keyword)
    #[token("default_action")]
    DefaultAction,
    /// `_` (don't-care)
    #[token("_")]
    Underscore,

    // --- punctuation & operators --------------------------------------------
    /// `{`
    #[token("{")]
    LBrace,
    /// `}`
    #[token("}")]
    RBrace,
    /// `(`
    #[token("(")]
    LParen,
    /// `)`
    #[token(")")]
    RParen,
    /// `[`
    #[token("[")]
    LBracket,
    /// `]`
    #[token("]")]
    RBracket,
    /// `<`
    #[token("<")]
    Lt,
    /// `>`
    #[token(">")]
    Gt,
    /// `<=`
    #[token("<=")]
    Le,
    /// `>=`
    #[token(">=")]
    Ge,
    /// `==`
    #[token("==")]
    EqEq,
    /// `!=`
    #[token("!=")]
    NotEq,
    /// `&&`
    #[token("&&")]
    AndAnd,
    /// `||`
    #[token("||")]
    OrOr,
    /// `+`
    #[token("+")]
    Plus,
    /// `-`
    #[token("-")]
    Minus,
    /// `*`
    #[token("*")]
    Star,
    /// `/`
    #[token("/")]
    Slash,
    /// `&`
    #[token("&")]
    Amp,
    /// `|`
    #[token("|")]
    Pipe,
    /// `!`
    #[token("!")]
    Bang,
    /// `~`
    #[token("~")]
    Tilde,
    /// `=`
    #[token("=")]
    Eq,
    /// `.`
    #[token(".")]
    Dot,
    /// `,`
    #[token(",")]
    Comma,
    /// `;`
    #[token(";")]
    Semi,
    /// `:`
    #[token(":")]
    Colon,

    // --- trivia & sentinels --------------------------------------------------
    /// A `//` or `/* */` comment. Skipped transparently by the token buffer.
    #[regex(r"//[^\n]*")]
    #[regex(r"/\*([^*]|\*[^/])*\*/")]
    Comment,
    /// End of input.
    EndOfInput,
}

impl TokenKind {
    /// Returns the keyword kind for `name`, if any.
    ///
    /// Used by the root scope's bootstrapping and by the lexer's retroactive
    /// rewrite when a name resolves in the `KEYWORD` namespace.
    pub fn keyword_for(name: &str) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match name {
            "action" => Action,
            "apply" => Apply,
            "bit" => Bit,
            "bool" => Bool,
            "const" => Const,
            "control" => Control,
            "default" => Default,
            "else" => Else,
            "enum" => Enum,
            "error" => Error,
            "extern" => Extern,
            "exit" => Exit,
            "header" => Header,
            "header_union" => HeaderUnion,
            "if" => If,
            "in" => In,
            "inout" => Inout,
            "int" => Int,
            "key" => Key,
            "match_kind" => MatchKind,
            "out" => Out,
            "package" => Package,
            "parser" => Parser,
            "return" => Return,
            "select" => Select,
            "state" => State,
            "string" => StringKeyword,
            "struct" => Struct,
            "switch" => Switch,
            "table" => Table,
            "transition" => Transition,
            "tuple" => Tuple,
            "typedef" => Typedef,
            "varbit" => Varbit,
            "void" => Void,
            "actions" => Actions,
            "entries" => Entries,
            "default_action" => DefaultAction,
            "true" => True,
            "false" => False,
            "_" => Underscore,
            _ => return None,
        })
    }

    /// Whether this kind is a binary operator, and at which precedence level
    /// (1 = lowest, 3 = highest) it is parsed by the operator-climbing
    /// expression parser.
    pub fn binary_precedence(self) -> Option<u8> {
        use TokenKind::*;
        match self {
            EqEq | NotEq | Lt | Gt | Le | Ge => Some(1),
            AndAnd | OrOr | Plus | Minus | Amp | Pipe => Some(2),
            Star | Slash => Some(3),
            _ => None,
        }
    }
}

/// A single classified token with its source position.
#[derive(Debug, Clone)]
pub struct Token {
    /// The token's kind.
    pub kind: TokenKind,
    /// The exact source text of the token.
    pub text: String,
    /// The 1-based line on which the token begins.
    pub line: u32,
    /// The 1-based column on which the token begins.
    pub column: u32,
}
