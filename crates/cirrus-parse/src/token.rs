use cirrus_ast::span::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    // trivia / eof / error
    Eof,
    /// Unrecognised input (e.g. a stray character or unterminated string)
    Error(String),
    // punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Dot,
    At,
    Pipe,
    // assignment
    Eq,
    // arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    // equality
    EqEq,
    BangEq,
    // relational
    Lt,
    Le,
    Gt,
    Ge,
    // logical
    AndAnd,
    OrOr,
    Bang,
    // idents / keywords
    Ident(String),
    KwSchema,
    KwResource,
    KwComponent,
    KwInput,
    KwOutput,
    KwVar,
    KwFun,
    KwType,
    KwTrue,
    KwFalse,
    KwNull,
    // literals
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone)]
pub struct Tok {
    pub kind: TokKind,
    pub span: Span,
}
