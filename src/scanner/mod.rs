use std::fs::File;
use std::io::{BufReader, Bytes, Read};
use std::path::Path;

use tracing::trace;

use crate::diagnostics::{Diagnostics, FatalError, LexicalIssue};
use crate::symbol::Symbol;
use crate::symbol_table::SymTable;
use token::*;

pub mod token;

/// Pulls tokens from one sequential byte stream with a single byte of
/// pushback. Identifiers are interned into the [`SymTable`] as they are met.
pub struct Scanner<R: Read> {
    stream: Bytes<BufReader<R>>,
    pushback: Option<u8>,
    line: usize,
    comment_depth: usize,
    exhausted: bool,
}

fn is_char_payload(c: u8) -> bool {
    c.is_ascii_alphanumeric() || [b'_', b';', b':', b'.', b'"', b' '].contains(&c)
}

fn is_string_payload(c: u8) -> bool {
    c.is_ascii_alphanumeric() || [b'_', b';', b':', b'.', b',', b'\'', b' '].contains(&c)
}

impl Scanner<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, FatalError> {
        Ok(Scanner::new(File::open(path)?))
    }
}

impl<'a> Scanner<&'a [u8]> {
    pub fn from_source(source: &'a str) -> Self {
        Scanner::new(source.as_bytes())
    }
}

impl<R: Read> Scanner<R> {
    pub fn new(reader: R) -> Self {
        Scanner {
            stream: BufReader::new(reader).bytes(),
            pushback: None,
            line: 1,
            comment_depth: 0,
            exhausted: false,
        }
    }

    pub fn line(&self) -> usize {
        self.line
    }

    /// Open block comments at the current position; zero between tokens.
    pub fn comment_depth(&self) -> usize {
        self.comment_depth
    }

    fn getc(&mut self) -> Result<Option<u8>, FatalError> {
        if let Some(c) = self.pushback.take() {
            return Ok(Some(c));
        }
        match self.stream.next() {
            Some(c) => Ok(Some(c?)),
            None => Ok(None),
        }
    }

    fn ungetc(&mut self, c: Option<u8>) {
        debug_assert!(self.pushback.is_none());
        if c.is_some() {
            self.pushback = c;
        }
    }

    fn skip_whitespace(&mut self) -> Result<Option<u8>, FatalError> {
        loop {
            match self.getc()? {
                Some(b'\n') => self.line += 1,
                Some(c) if c.is_ascii_whitespace() => (),
                other => return Ok(other),
            }
        }
    }

    fn skip_line_comment(&mut self) -> Result<(), FatalError> {
        loop {
            match self.getc()? {
                Some(b'\n') => {
                    self.line += 1;
                    return Ok(());
                }
                None => return Ok(()),
                Some(_) => (),
            }
        }
    }

    /// Called after the opening `/*`. Nested openers raise the depth, each
    /// closer lowers it; the comment ends when the depth returns to zero.
    fn skip_block_comment(&mut self, diagnostics: &mut Diagnostics) -> Result<(), FatalError> {
        let opened_at = self.line;
        self.comment_depth = 1;
        while self.comment_depth > 0 {
            match self.getc()? {
                Some(b'\n') => self.line += 1,
                Some(b'/') => match self.getc()? {
                    Some(b'*') => self.comment_depth += 1,
                    other => self.ungetc(other),
                },
                Some(b'*') => match self.getc()? {
                    Some(b'/') => self.comment_depth -= 1,
                    other => self.ungetc(other),
                },
                Some(_) => (),
                None => {
                    diagnostics.lexical(
                        LexicalIssue::MismatchedComment { depth: self.comment_depth },
                        self.line,
                        "/*",
                    );
                    self.exhausted = true;
                    return Err(FatalError::UnterminatedComment { line: opened_at });
                }
            }
        }
        Ok(())
    }

    /// Returns `matched` if the next byte is `second`, else `single`.
    fn pair(
        &mut self,
        second: u8,
        matched: (TokenType, &'static str),
        single: (TokenType, &'static str),
    ) -> Result<Token, FatalError> {
        let next = self.getc()?;
        let (token_type, lexeme) = if next == Some(second) {
            matched
        } else {
            self.ungetc(next);
            single
        };
        Ok(Token::new(token_type, lexeme, self.line))
    }

    fn identifier(
        &mut self,
        first: u8,
        symbols: &mut SymTable,
        diagnostics: &mut Diagnostics,
    ) -> Result<Token, FatalError> {
        let mut name = String::new();
        name.push(first.to_ascii_lowercase() as char);
        loop {
            match self.getc()? {
                Some(c) if c.is_ascii_alphanumeric() || c == b'_' => {
                    name.push(c.to_ascii_lowercase() as char)
                }
                other => {
                    self.ungetc(other);
                    break;
                }
            }
        }

        let id = match symbols.get_symbol(&name, false) {
            Some(id) => Some(id),
            None => {
                let is_global = !symbols.has_open_scope();
                symbols.add_symbol(&name, Symbol::placeholder(name.as_str()), is_global, diagnostics)
            }
        };
        let token_type = id.map_or(TokenType::Identifier, |id| symbols.get(id).token_type);
        let mut token = Token::new(token_type, name, self.line);
        match token_type {
            TokenType::True => token = token.with_value(TokenValue::Bool(true)),
            TokenType::False => token = token.with_value(TokenValue::Bool(false)),
            TokenType::Identifier => token.symbol = id,
            _ => (),
        }
        Ok(token)
    }

    fn number(&mut self, first: u8, diagnostics: &mut Diagnostics) -> Result<Token, FatalError> {
        let mut text = String::new();
        let mut raw = String::new();
        text.push(first as char);
        raw.push(first as char);
        let mut is_float = false;
        loop {
            match self.getc()? {
                Some(c) if c.is_ascii_digit() => {
                    text.push(c as char);
                    raw.push(c as char);
                }
                Some(b'_') => raw.push('_'),
                Some(b'.') if !is_float => {
                    is_float = true;
                    text.push('.');
                    raw.push('.');
                }
                other => {
                    self.ungetc(other);
                    break;
                }
            }
        }

        if is_float {
            // digits with at most one '.' always parse
            let value = text.parse::<f64>().unwrap_or_default();
            return Ok(Token::new(TokenType::FloatLiteral, raw, self.line)
                .with_value(TokenValue::Float(value)));
        }
        match text.parse::<i64>() {
            Ok(value) => Ok(Token::new(TokenType::IntegerLiteral, raw, self.line)
                .with_value(TokenValue::Integer(value))),
            Err(_) => {
                diagnostics.lexical(LexicalIssue::IntegerOverflow, self.line, raw.as_str());
                Ok(Token::new(TokenType::Invalid, raw, self.line))
            }
        }
    }

    fn char_literal(&mut self, diagnostics: &mut Diagnostics) -> Result<Token, FatalError> {
        let payload = self.getc()?;
        if let Some(c) = payload.filter(|c| is_char_payload(*c)) {
            let closing = self.getc()?;
            if closing == Some(b'\'') {
                return Ok(Token::new(TokenType::CharLiteral, format!("'{}'", c as char), self.line)
                    .with_value(TokenValue::Char(c as char)));
            }
            self.ungetc(closing);
            diagnostics.lexical(LexicalIssue::MalformedChar, self.line, format!("'{}", c as char));
            return Ok(Token::new(TokenType::Invalid, format!("'{}", c as char), self.line));
        }

        // `''` consumes both quotes, anything else is left for the next token
        if payload != Some(b'\'') {
            self.ungetc(payload);
        }
        diagnostics.lexical(LexicalIssue::MalformedChar, self.line, "'");
        Ok(Token::new(TokenType::Invalid, "'", self.line))
    }

    fn string_literal(&mut self, diagnostics: &mut Diagnostics) -> Result<Token, FatalError> {
        let mut text = String::new();
        loop {
            match self.getc()? {
                Some(b'"') => {
                    return Ok(Token::new(TokenType::StringLiteral, format!("\"{}\"", text), self.line)
                        .with_value(TokenValue::String(text)));
                }
                Some(c) if is_string_payload(c) => text.push(c as char),
                other => {
                    self.ungetc(other);
                    let lexeme = format!("\"{}", text);
                    diagnostics.lexical(LexicalIssue::MalformedString, self.line, lexeme.as_str());
                    return Ok(Token::new(TokenType::Invalid, lexeme, self.line));
                }
            }
        }
    }

    fn next_token(
        &mut self,
        symbols: &mut SymTable,
        diagnostics: &mut Diagnostics,
    ) -> Result<Token, FatalError> {
        use TokenType::*;

        loop {
            if self.exhausted {
                return Ok(Token::new(StreamEnd, "", self.line));
            }
            let c = match self.skip_whitespace()? {
                Some(c) => c,
                None => {
                    self.exhausted = true;
                    continue;
                }
            };
            let line = self.line;
            let single = |token_type: TokenType| Token::new(token_type, (c as char).to_string(), line);

            let token = match c {
                b'(' => single(LeftParen),
                b')' => single(RightParen),
                b'[' => single(LeftBracket),
                b']' => single(RightBracket),
                b';' => single(Semicolon),
                b',' => single(Comma),
                b'.' => single(Period),
                b'&' => single(And),
                b'|' => single(Or),
                b'+' => single(Add),
                b'-' => single(Sub),
                b'*' => single(Mul),
                b':' => self.pair(b'=', (Assign, ":="), (Colon, ":"))?,
                b'=' => self.pair(b'=', (DoubleEqual, "=="), (Equals, "="))?,
                b'<' => self.pair(b'=', (LessEq, "<="), (Less, "<"))?,
                b'>' => self.pair(b'=', (GreaterEq, ">="), (Greater, ">"))?,
                b'!' => {
                    let token = self.pair(b'=', (NotEqual, "!="), (Invalid, "!"))?;
                    if token.is(Invalid) {
                        diagnostics.lexical(LexicalIssue::LoneExclamation, line, "!");
                    }
                    token
                }
                b'/' => match self.getc()? {
                    Some(b'/') => {
                        self.skip_line_comment()?;
                        continue;
                    }
                    Some(b'*') => {
                        self.skip_block_comment(diagnostics)?;
                        continue;
                    }
                    other => {
                        self.ungetc(other);
                        single(Div)
                    }
                },
                b'\'' => self.char_literal(diagnostics)?,
                b'"' => self.string_literal(diagnostics)?,
                c if c.is_ascii_alphabetic() => self.identifier(c, symbols, diagnostics)?,
                c if c.is_ascii_digit() => self.number(c, diagnostics)?,
                other => {
                    diagnostics.lexical(
                        LexicalIssue::InvalidCharacter,
                        line,
                        (other as char).to_string(),
                    );
                    continue;
                }
            };
            return Ok(token);
        }
    }

    /// Scans the next token. A block comment left open at end of input is
    /// fatal; every later call yields [`TokenType::StreamEnd`].
    pub fn scan(
        &mut self,
        symbols: &mut SymTable,
        diagnostics: &mut Diagnostics,
    ) -> Result<Token, FatalError> {
        let token = self.next_token(symbols, diagnostics)?;
        trace!(token = %token, "scanned");
        Ok(token)
    }

    /// Scans up to and including the first `.` or stream end.
    pub fn scan_all(
        &mut self,
        symbols: &mut SymTable,
        diagnostics: &mut Diagnostics,
    ) -> Result<Vec<Token>, FatalError> {
        let mut res = vec![];
        loop {
            let token = self.scan(symbols, diagnostics)?;
            let done = matches!(token.token_type, TokenType::Period | TokenType::StreamEnd);
            res.push(token);
            if done {
                return Ok(res);
            }
        }
    }
}
