use std::fmt::{self, Display, Formatter};

use crate::symbol::SymbolId;

#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub enum TokenType {
    // reserved words
    Program,
    Begin,
    End,
    Global,
    Procedure,
    Is,
    In,
    Out,
    InOut,
    Not,
    If,
    Then,
    Else,
    For,
    Return,
    True,
    False,
    StringType,
    BoolType,
    CharType,
    FloatType,
    IntegerType,

    // punctuation
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,
    Colon,
    Assign, // :=

    // operators
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equals, // =
    DoubleEqual,
    NotEqual,

    Identifier,
    StringLiteral,
    CharLiteral,
    IntegerLiteral,
    FloatLiteral,

    Invalid,
    Period,
    StreamEnd,
}

impl TokenType {
    pub const RESERVED_WORDS: [(&'static str, TokenType); 22] = [
        ("program", TokenType::Program),
        ("begin", TokenType::Begin),
        ("end", TokenType::End),
        ("global", TokenType::Global),
        ("procedure", TokenType::Procedure),
        ("is", TokenType::Is),
        ("in", TokenType::In),
        ("out", TokenType::Out),
        ("inout", TokenType::InOut),
        ("not", TokenType::Not),
        ("if", TokenType::If),
        ("then", TokenType::Then),
        ("else", TokenType::Else),
        ("for", TokenType::For),
        ("return", TokenType::Return),
        ("true", TokenType::True),
        ("false", TokenType::False),
        ("string", TokenType::StringType),
        ("bool", TokenType::BoolType),
        ("char", TokenType::CharType),
        ("float", TokenType::FloatType),
        ("integer", TokenType::IntegerType),
    ];

    pub fn is_type_mark(self) -> bool {
        matches!(
            self,
            TokenType::IntegerType
                | TokenType::FloatType
                | TokenType::BoolType
                | TokenType::StringType
                | TokenType::CharType
        )
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            TokenType::Less
                | TokenType::LessEq
                | TokenType::Greater
                | TokenType::GreaterEq
                | TokenType::DoubleEqual
                | TokenType::NotEqual
        )
    }

    /// Tokens that may start a declaration.
    pub fn starts_declaration(self) -> bool {
        self == TokenType::Global || self == TokenType::Procedure || self.is_type_mark()
    }

    pub fn starts_statement(self) -> bool {
        matches!(
            self,
            TokenType::Identifier | TokenType::If | TokenType::For | TokenType::Return
        )
    }
}

impl Display for TokenType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        use TokenType::*;

        if let Some((word, _)) = TokenType::RESERVED_WORDS.iter().find(|(_, t)| t == self) {
            return write!(f, "'{}'", word.to_uppercase());
        }
        let s = match self {
            LeftParen => "'('",
            RightParen => "')'",
            LeftBracket => "'['",
            RightBracket => "']'",
            Semicolon => "';'",
            Comma => "','",
            Colon => "':'",
            Assign => "':='",
            And => "'&'",
            Or => "'|'",
            Add => "'+'",
            Sub => "'-'",
            Mul => "'*'",
            Div => "'/'",
            Less => "'<'",
            LessEq => "'<='",
            Greater => "'>'",
            GreaterEq => "'>='",
            Equals => "'='",
            DoubleEqual => "'=='",
            NotEqual => "'!='",
            Identifier => "identifier",
            StringLiteral => "string literal",
            CharLiteral => "character literal",
            IntegerLiteral => "integer literal",
            FloatLiteral => "float literal",
            Invalid => "invalid token",
            Period => "'.'",
            StreamEnd => "end of stream",
            _ => unreachable!(),
        };
        write!(f, "{}", s)
    }
}

#[derive(PartialEq, Clone, Debug)]
pub enum TokenValue {
    Integer(i64),
    Float(f64),
    Char(char),
    Bool(bool),
    String(String),
}

impl Display for TokenValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TokenValue::Integer(v) => write!(f, "{}", v),
            TokenValue::Float(v) => write!(f, "{}", v),
            TokenValue::Char(c) => write!(f, "'{}'", c),
            TokenValue::Bool(b) => write!(f, "{}", b),
            TokenValue::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[derive(PartialEq, Clone, Debug)]
pub struct Token {
    pub token_type: TokenType,
    pub value: Option<TokenValue>,
    pub line: usize,
    /// Source text as written (case-folded for names).
    pub lexeme: String,
    /// Set for identifiers only.
    pub symbol: Option<SymbolId>,
}

impl Token {
    pub(crate) fn new(token_type: TokenType, lexeme: impl Into<String>, line: usize) -> Self {
        Token {
            token_type,
            value: None,
            line,
            lexeme: lexeme.into(),
            symbol: None,
        }
    }

    pub(crate) fn with_value(mut self, value: TokenValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn is(&self, token_type: TokenType) -> bool {
        self.token_type == token_type
    }

    pub fn integer(&self) -> Option<i64> {
        match self.value {
            Some(TokenValue::Integer(v)) => Some(v),
            _ => None,
        }
    }

    pub fn float(&self) -> Option<f64> {
        match self.value {
            Some(TokenValue::Float(v)) => Some(v),
            _ => None,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} `{}` (line {})", self.token_type, self.lexeme, self.line)
    }
}
