use std::{fmt::Display, str::FromStr};

use crate::{
    ast::{fmt_float, Literal},
    span::Span,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Literals
    Number(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Variable(String),

    // Keywords
    Make,
    Print,
    If,
    Elif,
    Else,
    While,
    Break,
    Continue,
    Del,
    Input,
    Int,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqualEqual,
    BangEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
    Not,
    Equal,

    // Punctuation
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftSquare,
    RightSquare,
    Comma,
    Dot,

    // End of file
    Eof,
}

/// The closed set of token kinds, without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Number,
    Float,
    String,
    Bool,
    Variable,
    Make,
    Print,
    If,
    Elif,
    Else,
    While,
    Break,
    Continue,
    Del,
    Input,
    Int,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqualEqual,
    BangEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
    Not,
    Equal,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftSquare,
    RightSquare,
    Comma,
    Dot,
    Eof,
}

impl TokenKind {
    pub const ALL: [TokenKind; 40] = [
        TokenKind::Number,
        TokenKind::Float,
        TokenKind::String,
        TokenKind::Bool,
        TokenKind::Variable,
        TokenKind::Make,
        TokenKind::Print,
        TokenKind::If,
        TokenKind::Elif,
        TokenKind::Else,
        TokenKind::While,
        TokenKind::Break,
        TokenKind::Continue,
        TokenKind::Del,
        TokenKind::Input,
        TokenKind::Int,
        TokenKind::Plus,
        TokenKind::Minus,
        TokenKind::Star,
        TokenKind::Slash,
        TokenKind::Percent,
        TokenKind::EqualEqual,
        TokenKind::BangEqual,
        TokenKind::Less,
        TokenKind::Greater,
        TokenKind::LessEqual,
        TokenKind::GreaterEqual,
        TokenKind::And,
        TokenKind::Or,
        TokenKind::Not,
        TokenKind::Equal,
        TokenKind::LeftParen,
        TokenKind::RightParen,
        TokenKind::LeftBrace,
        TokenKind::RightBrace,
        TokenKind::LeftSquare,
        TokenKind::RightSquare,
        TokenKind::Comma,
        TokenKind::Dot,
        TokenKind::Eof,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Number => "NUMBER",
            TokenKind::Float => "FLOAT",
            TokenKind::String => "STRING",
            TokenKind::Bool => "BOOL",
            TokenKind::Variable => "VARIABLE",
            TokenKind::Make => "MAKE",
            TokenKind::Print => "PRINT",
            TokenKind::If => "IF",
            TokenKind::Elif => "ELIF",
            TokenKind::Else => "ELSE",
            TokenKind::While => "WHILE",
            TokenKind::Break => "BREAK",
            TokenKind::Continue => "CONTINUE",
            TokenKind::Del => "DEL",
            TokenKind::Input => "INPUT",
            TokenKind::Int => "INT",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "MUL",
            TokenKind::Slash => "DIV",
            TokenKind::Percent => "MOD",
            TokenKind::EqualEqual => "EQ",
            TokenKind::BangEqual => "NEQ",
            TokenKind::Less => "LT",
            TokenKind::Greater => "GT",
            TokenKind::LessEqual => "LTE",
            TokenKind::GreaterEqual => "GTE",
            TokenKind::And => "AND",
            TokenKind::Or => "OR",
            TokenKind::Not => "NOT",
            TokenKind::Equal => "ASSIGN",
            TokenKind::LeftParen => "LPAREN",
            TokenKind::RightParen => "RPAREN",
            TokenKind::LeftBrace => "LBRACE",
            TokenKind::RightBrace => "RBRACE",
            TokenKind::LeftSquare => "LSQUARE",
            TokenKind::RightSquare => "RSQUARE",
            TokenKind::Comma => "COMMA",
            TokenKind::Dot => "DOT",
            TokenKind::Eof => "EOF",
        }
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for TokenKind {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenKind::ALL
            .iter()
            .find(|kind| kind.name() == s)
            .copied()
            .ok_or_else(|| TokenError::UnknownTokenKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TokenError {
    #[error("Invalid token kind: {0}")]
    UnknownTokenKind(String),
    #[error("Token kind {0} requires a value")]
    MissingValue(TokenKind),
    #[error("Token kind {0} cannot carry value {1:?}")]
    InvalidValue(TokenKind, Literal),
}

impl TokenType {
    /// Builds a token type from a kind and its literal payload.
    pub fn new(kind: TokenKind, value: Option<Literal>) -> Result<Self, TokenError> {
        let value = match value {
            Some(value) => value,
            None => return Self::without_value(kind),
        };

        match (kind, value) {
            (TokenKind::Number, Literal::Integer(n)) => Ok(TokenType::Number(n)),
            (TokenKind::Float, Literal::Float(n)) => Ok(TokenType::Float(n)),
            (TokenKind::String, Literal::String(s)) => Ok(TokenType::String(s)),
            (TokenKind::Bool, Literal::Boolean(b)) => Ok(TokenType::Bool(b)),
            (TokenKind::Variable, Literal::String(name)) => Ok(TokenType::Variable(name)),
            (kind, value) => Err(TokenError::InvalidValue(kind, value)),
        }
    }

    fn without_value(kind: TokenKind) -> Result<Self, TokenError> {
        let token_type = match kind {
            TokenKind::Number
            | TokenKind::Float
            | TokenKind::String
            | TokenKind::Bool
            | TokenKind::Variable => return Err(TokenError::MissingValue(kind)),
            TokenKind::Make => TokenType::Make,
            TokenKind::Print => TokenType::Print,
            TokenKind::If => TokenType::If,
            TokenKind::Elif => TokenType::Elif,
            TokenKind::Else => TokenType::Else,
            TokenKind::While => TokenType::While,
            TokenKind::Break => TokenType::Break,
            TokenKind::Continue => TokenType::Continue,
            TokenKind::Del => TokenType::Del,
            TokenKind::Input => TokenType::Input,
            TokenKind::Int => TokenType::Int,
            TokenKind::Plus => TokenType::Plus,
            TokenKind::Minus => TokenType::Minus,
            TokenKind::Star => TokenType::Star,
            TokenKind::Slash => TokenType::Slash,
            TokenKind::Percent => TokenType::Percent,
            TokenKind::EqualEqual => TokenType::EqualEqual,
            TokenKind::BangEqual => TokenType::BangEqual,
            TokenKind::Less => TokenType::Less,
            TokenKind::Greater => TokenType::Greater,
            TokenKind::LessEqual => TokenType::LessEqual,
            TokenKind::GreaterEqual => TokenType::GreaterEqual,
            TokenKind::And => TokenType::And,
            TokenKind::Or => TokenType::Or,
            TokenKind::Not => TokenType::Not,
            TokenKind::Equal => TokenType::Equal,
            TokenKind::LeftParen => TokenType::LeftParen,
            TokenKind::RightParen => TokenType::RightParen,
            TokenKind::LeftBrace => TokenType::LeftBrace,
            TokenKind::RightBrace => TokenType::RightBrace,
            TokenKind::LeftSquare => TokenType::LeftSquare,
            TokenKind::RightSquare => TokenType::RightSquare,
            TokenKind::Comma => TokenType::Comma,
            TokenKind::Dot => TokenType::Dot,
            TokenKind::Eof => TokenType::Eof,
        };
        Ok(token_type)
    }

    pub fn kind(&self) -> TokenKind {
        match self {
            TokenType::Number(_) => TokenKind::Number,
            TokenType::Float(_) => TokenKind::Float,
            TokenType::String(_) => TokenKind::String,
            TokenType::Bool(_) => TokenKind::Bool,
            TokenType::Variable(_) => TokenKind::Variable,
            TokenType::Make => TokenKind::Make,
            TokenType::Print => TokenKind::Print,
            TokenType::If => TokenKind::If,
            TokenType::Elif => TokenKind::Elif,
            TokenType::Else => TokenKind::Else,
            TokenType::While => TokenKind::While,
            TokenType::Break => TokenKind::Break,
            TokenType::Continue => TokenKind::Continue,
            TokenType::Del => TokenKind::Del,
            TokenType::Input => TokenKind::Input,
            TokenType::Int => TokenKind::Int,
            TokenType::Plus => TokenKind::Plus,
            TokenType::Minus => TokenKind::Minus,
            TokenType::Star => TokenKind::Star,
            TokenType::Slash => TokenKind::Slash,
            TokenType::Percent => TokenKind::Percent,
            TokenType::EqualEqual => TokenKind::EqualEqual,
            TokenType::BangEqual => TokenKind::BangEqual,
            TokenType::Less => TokenKind::Less,
            TokenType::Greater => TokenKind::Greater,
            TokenType::LessEqual => TokenKind::LessEqual,
            TokenType::GreaterEqual => TokenKind::GreaterEqual,
            TokenType::And => TokenKind::And,
            TokenType::Or => TokenKind::Or,
            TokenType::Not => TokenKind::Not,
            TokenType::Equal => TokenKind::Equal,
            TokenType::LeftParen => TokenKind::LeftParen,
            TokenType::RightParen => TokenKind::RightParen,
            TokenType::LeftBrace => TokenKind::LeftBrace,
            TokenType::RightBrace => TokenKind::RightBrace,
            TokenType::LeftSquare => TokenKind::LeftSquare,
            TokenType::RightSquare => TokenKind::RightSquare,
            TokenType::Comma => TokenKind::Comma,
            TokenType::Dot => TokenKind::Dot,
            TokenType::Eof => TokenKind::Eof,
        }
    }
}

/// Renders the token the way it is spelled in source.
impl Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenType::Number(n) => write!(f, "{}", n),
            TokenType::Float(n) => fmt_float(f, *n),
            TokenType::String(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
            TokenType::Bool(b) => write!(f, "{}", b),
            TokenType::Variable(name) => write!(f, "{}", name),
            TokenType::Make => write!(f, "make"),
            TokenType::Print => write!(f, "print"),
            TokenType::If => write!(f, "if"),
            TokenType::Elif => write!(f, "elif"),
            TokenType::Else => write!(f, "else"),
            TokenType::While => write!(f, "while"),
            TokenType::Break => write!(f, "break"),
            TokenType::Continue => write!(f, "continue"),
            TokenType::Del => write!(f, "del"),
            TokenType::Input => write!(f, "input"),
            TokenType::Int => write!(f, "int"),
            TokenType::Plus => write!(f, "+"),
            TokenType::Minus => write!(f, "-"),
            TokenType::Star => write!(f, "*"),
            TokenType::Slash => write!(f, "/"),
            TokenType::Percent => write!(f, "%"),
            TokenType::EqualEqual => write!(f, "=="),
            TokenType::BangEqual => write!(f, "!="),
            TokenType::Less => write!(f, "<"),
            TokenType::Greater => write!(f, ">"),
            TokenType::LessEqual => write!(f, "<="),
            TokenType::GreaterEqual => write!(f, ">="),
            TokenType::And => write!(f, "and"),
            TokenType::Or => write!(f, "or"),
            TokenType::Not => write!(f, "not"),
            TokenType::Equal => write!(f, "="),
            TokenType::LeftParen => write!(f, "("),
            TokenType::RightParen => write!(f, ")"),
            TokenType::LeftBrace => write!(f, "{{"),
            TokenType::RightBrace => write!(f, "}}"),
            TokenType::LeftSquare => write!(f, "["),
            TokenType::RightSquare => write!(f, "]"),
            TokenType::Comma => write!(f, ","),
            TokenType::Dot => write!(f, "."),
            TokenType::Eof => write!(f, "<eof>"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, value: Option<Literal>, span: Span) -> Result<Self, TokenError> {
        Ok(Self {
            token_type: TokenType::new(kind, value)?,
            span,
        })
    }

    pub fn token_type(&self) -> &TokenType {
        &self.token_type
    }

    pub fn kind(&self) -> TokenKind {
        self.token_type.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenizeErrorKind {
    #[error("Unexpected character '{0}'")]
    UnexpectedCharacter(char),
    #[error("Unterminated string")]
    UnterminatedString,
    #[error("Unterminated escape sequence in string")]
    UnterminatedEscape,
    #[error("Malformed float, expected a digit after '.'")]
    MalformedFloat,
    #[error("Integer literal out of range")]
    IntegerOutOfRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {span}")]
pub struct TokenizeError {
    pub kind: TokenizeErrorKind,
    pub span: Span,
}

/// Streaming tokenizer with one token of lookahead.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    remaining: &'a str,
    span: Span,
    peeked: Option<Token>,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            remaining: source,
            span: Span::start(),
            peeked: None,
        }
    }

    pub fn next_token(&mut self) -> Result<Token, TokenizeError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.scan(),
        }
    }

    pub fn peek_token(&mut self) -> Result<&Token, TokenizeError> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.scan()?,
        };
        Ok(self.peeked.insert(token))
    }

    fn scan(&mut self) -> Result<Token, TokenizeError> {
        let source = skip_trivia(self.remaining);
        self.span
            .advance(&self.remaining[..self.remaining.len() - source.len()]);
        self.remaining = source;

        let span = self.span;
        let (token_type, rest) = token(source).map_err(|kind| TokenizeError { kind, span })?;
        self.span.advance(&source[..source.len() - rest.len()]);
        self.remaining = rest;

        Ok(Token { token_type, span })
    }
}

/// Tokenizes the whole source, ending with a single `Eof` token.
pub fn tokens(source: &str) -> Result<Vec<Token>, TokenizeError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();

    loop {
        let token = tokenizer.next_token()?;
        if matches!(token.token_type, TokenType::Eof) {
            tokens.push(token);
            break;
        }
        tokens.push(token);
    }

    Ok(tokens)
}

fn skip_trivia(mut source: &str) -> &str {
    while let Some((_, rest)) = maximal(&[whitespace, comment], source) {
        source = rest;
    }
    source
}

fn token(source: &str) -> Result<(TokenType, &str), TokenizeErrorKind> {
    let Some(first) = source.chars().next() else {
        return Ok((TokenType::Eof, source));
    };

    if first == '"' {
        return string(source);
    }
    if first.is_ascii_digit() {
        return number(source);
    }

    maximal(
        &[
            // Single-character tokens
            left_paren,
            right_paren,
            left_brace,
            right_brace,
            left_square,
            right_square,
            comma,
            dot,
            plus,
            minus,
            star,
            slash,
            percent,
            // One or two character tokens
            bang,
            bang_equal,
            equal,
            equal_equal,
            less,
            less_equal,
            greater,
            greater_equal,
            // Keywords and identifiers
            word,
        ],
        source,
    )
    .ok_or(TokenizeErrorKind::UnexpectedCharacter(first))
}

fn maximal<'a, T>(
    parsers: &[fn(&str) -> Option<(T, &str)>],
    source: &'a str,
) -> Option<(T, &'a str)> {
    let mut min_left = source.len() + 1;
    let mut max_match = None;

    let matching_parsers = parsers.iter().filter_map(|parser| parser(source));
    for (m, rest) in matching_parsers {
        let left = rest.len();
        if left < min_left {
            min_left = left;
            max_match = Some((m, rest));
        }
    }

    max_match
}

fn whitespace(source: &str) -> Option<((), &str)> {
    let len = source
        .chars()
        .take_while(|c| c.is_whitespace())
        .map(char::len_utf8)
        .sum();
    if len > 0 {
        Some(((), &source[len..]))
    } else {
        None
    }
}

fn comment(source: &str) -> Option<((), &str)> {
    if source.starts_with('#') {
        let len = source
            .chars()
            .take_while(|c| *c != '\n')
            .map(char::len_utf8)
            .sum();
        Some(((), &source[len..]))
    } else {
        None
    }
}

macro_rules! match_literal {
    ($name:ident, $word:literal, $token:expr) => {
        fn $name(source: &str) -> Option<(TokenType, &str)> {
            if source.starts_with($word) {
                Some(($token, &source[$word.len()..]))
            } else {
                None
            }
        }
    };
}

match_literal! { left_paren, "(", TokenType::LeftParen }
match_literal! { right_paren, ")", TokenType::RightParen }
match_literal! { left_brace, "{", TokenType::LeftBrace }
match_literal! { right_brace, "}", TokenType::RightBrace }
match_literal! { left_square, "[", TokenType::LeftSquare }
match_literal! { right_square, "]", TokenType::RightSquare }
match_literal! { comma, ",", TokenType::Comma }
match_literal! { dot, ".", TokenType::Dot }
match_literal! { plus, "+", TokenType::Plus }
match_literal! { minus, "-", TokenType::Minus }
match_literal! { star, "*", TokenType::Star }
match_literal! { slash, "/", TokenType::Slash }
match_literal! { percent, "%", TokenType::Percent }
match_literal! { bang, "!", TokenType::Not }
match_literal! { bang_equal, "!=", TokenType::BangEqual }
match_literal! { equal, "=", TokenType::Equal }
match_literal! { equal_equal, "==", TokenType::EqualEqual }
match_literal! { less, "<", TokenType::Less }
match_literal! { less_equal, "<=", TokenType::LessEqual }
match_literal! { greater, ">", TokenType::Greater }
match_literal! { greater_equal, ">=", TokenType::GreaterEqual }

fn word(source: &str) -> Option<(TokenType, &str)> {
    let mut chars = source.chars();

    let first = chars.next()?;
    if !first.is_alphabetic() && first != '_' {
        return None;
    }

    let len = first.len_utf8()
        + chars
            .take_while(|c| c.is_alphanumeric() || *c == '_')
            .map(char::len_utf8)
            .sum::<usize>();

    let spelling = &source[..len];
    let token = keyword(spelling).unwrap_or_else(|| TokenType::Variable(spelling.to_string()));
    Some((token, &source[len..]))
}

fn keyword(spelling: &str) -> Option<TokenType> {
    let token = match spelling.to_lowercase().as_str() {
        "true" => TokenType::Bool(true),
        "false" => TokenType::Bool(false),
        "and" => TokenType::And,
        "or" => TokenType::Or,
        "not" => TokenType::Not,
        "print" => TokenType::Print,
        "make" => TokenType::Make,
        "if" => TokenType::If,
        "elif" => TokenType::Elif,
        "else" => TokenType::Else,
        "while" => TokenType::While,
        "break" => TokenType::Break,
        "continue" => TokenType::Continue,
        "del" => TokenType::Del,
        "input" => TokenType::Input,
        "int" => TokenType::Int,
        _ => return None,
    };
    Some(token)
}

fn string(source: &str) -> Result<(TokenType, &str), TokenizeErrorKind> {
    let mut value = String::new();
    let mut chars = source.char_indices().skip(1);

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => return Ok((TokenType::String(value), &source[i + 1..])),
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, '"')) => value.push('"'),
                Some((_, '\\')) => value.push('\\'),
                Some((_, other)) => {
                    value.push('\\');
                    value.push(other);
                }
                None => return Err(TokenizeErrorKind::UnterminatedEscape),
            },
            c => value.push(c),
        }
    }

    Err(TokenizeErrorKind::UnterminatedString)
}

fn number(source: &str) -> Result<(TokenType, &str), TokenizeErrorKind> {
    let digits = |s: &str| s.chars().take_while(char::is_ascii_digit).count();

    let whole = digits(source);
    if !source[whole..].starts_with('.') {
        let n = source[..whole]
            .parse()
            .map_err(|_| TokenizeErrorKind::IntegerOutOfRange)?;
        return Ok((TokenType::Number(n), &source[whole..]));
    }

    let fraction = digits(&source[whole + 1..]);
    if fraction == 0 {
        return Err(TokenizeErrorKind::MalformedFloat);
    }

    let len = whole + 1 + fraction;
    let n = source[..len]
        .parse()
        .map_err(|_| TokenizeErrorKind::MalformedFloat)?;
    Ok((TokenType::Float(n), &source[len..]))
}
