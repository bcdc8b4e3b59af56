//! Diagnostic collections filled while a source file is parsed.
//!
//! Recoverable problems are appended to one of three append-ordered
//! collections owned by the caller. Only [`FatalError`] stops a parse.

use std::fmt::{self, Display, Formatter};
use std::io;

use multimap::MultiMap;
use thiserror::Error;

use crate::scanner::token::TokenType;
use crate::symbol::{SymbolKind, ValueType};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexicalIssue {
    #[error("invalid character")]
    InvalidCharacter,
    #[error("malformed character literal")]
    MalformedChar,
    #[error("unterminated or malformed string literal")]
    MalformedString,
    #[error("'!' must be followed by '='")]
    LoneExclamation,
    #[error("integer literal out of range")]
    IntegerOverflow,
    #[error("end of file reached inside block comment (nesting depth {depth})")]
    MismatchedComment { depth: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyntaxIssue {
    #[error("missing {expected} in {context}")]
    Missing {
        expected: TokenType,
        context: &'static str,
    },
    #[error("expected a statement")]
    MissingStatement,
    #[error("expected a declaration")]
    MissingDeclaration,
    #[error("expected an expression")]
    MissingExpression,
    #[error("expected a type mark")]
    InvalidTypeMark,
    #[error("expected parameter direction IN, OUT or INOUT")]
    InvalidDirection,
    #[error("array bound must be an integer literal")]
    NonIntegerBound,
    #[error("array lower bound {lower} is not below upper bound {upper}")]
    InvertedBounds { lower: i64, upper: i64 },
    #[error("array index must be integer, found {found}")]
    NonIntegerIndex { found: ValueType },
    #[error("'{name}' is not an array")]
    NotAnArray { name: String },
    #[error("'{name}' is not a procedure")]
    NotAProcedure { name: String },
    #[error("procedure '{name}' used as a value")]
    ProcedureAsValue { name: String },
    #[error("cannot assign {value} to {target}")]
    IncompatibleAssignment { target: ValueType, value: ValueType },
    #[error("too few arguments to '{procedure}': expected {expected}, found {found}")]
    TooFewArguments {
        procedure: String,
        expected: usize,
        found: usize,
    },
    #[error("too many arguments to '{procedure}': expected {expected}, found {found}")]
    TooManyArguments {
        procedure: String,
        expected: usize,
        found: usize,
    },
    #[error("argument {position} of '{procedure}' must be {expected}, found {found}")]
    ArgumentTypeMismatch {
        procedure: String,
        position: usize,
        expected: ValueType,
        found: ValueType,
    },
    #[error("condition must be bool or integer, found {found}")]
    NonBooleanCondition { found: ValueType },
    #[error("operator {operator} cannot combine {left} and {right}")]
    IncompatibleOperands {
        operator: TokenType,
        left: ValueType,
        right: ValueType,
    },
    #[error("operator {operator} cannot be applied to {operand}")]
    IncompatibleOperand {
        operator: TokenType,
        operand: ValueType,
    },
    #[error("{found} used in place of ':=', accepted this once")]
    AssignTypoForgiven { found: TokenType },
    #[error("program must start with 'PROGRAM'")]
    MissingProgram,
    #[error("program must end with '.'")]
    MissingPeriod,
}

impl SyntaxIssue {
    pub fn is_warning(&self) -> bool {
        matches!(self, SyntaxIssue::AssignTypoForgiven { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SymbolIssue {
    #[error("redeclared in the same scope (previously {previous:?})")]
    Redeclared { previous: SymbolKind },
    #[error("redeclared in the global scope (previously {previous:?})")]
    GlobalRedeclared { previous: SymbolKind },
    #[error("name already bound in the {table} table, symbol not added")]
    InsertionFailed { table: &'static str },
    #[error("no scope open, symbol added to the global table")]
    ForcedGlobal,
    #[error("undeclared identifier")]
    Undeclared,
}

impl SymbolIssue {
    pub fn is_warning(&self) -> bool {
        matches!(self, SymbolIssue::ForcedGlobal)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexicalError {
    pub issue: LexicalIssue,
    pub line: usize,
    pub lexeme: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub issue: SyntaxIssue,
    pub line: usize,
    pub lexeme: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolError {
    pub issue: SymbolIssue,
    pub identifier: String,
}

impl Display for LexicalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} `{}`", self.line, self.issue, self.lexeme)
    }
}

impl Display for SyntaxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let severity = if self.issue.is_warning() { "warning" } else { "error" };
        write!(f, "line {}: {}: {} near `{}`", self.line, severity, self.issue, self.lexeme)
    }
}

impl Display for SymbolError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let severity = if self.issue.is_warning() { "warning" } else { "error" };
        write!(f, "{}: '{}': {}", severity, self.identifier, self.issue)
    }
}

/// Conditions that abort a parse immediately.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("line {line}: block comment not closed before end of file")]
    UnterminatedComment { line: usize },
    #[error("line {line}: source does not start with a valid token")]
    InvalidStart { line: usize },
    #[error("source is empty")]
    EmptyInput,
    #[error("line {line}: program must start with 'PROGRAM'")]
    MissingProgram { line: usize },
    #[error("line {line}: program must end with '.'")]
    MissingPeriod { line: usize },
    #[error("line {line}: nesting deeper than {limit} levels")]
    NestingTooDeep { line: usize, limit: usize },
    #[error("unable to read source: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    pub lexical: Vec<LexicalError>,
    pub syntax: Vec<SyntaxError>,
    pub symbol: Vec<SymbolError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn lexical(&mut self, issue: LexicalIssue, line: usize, lexeme: impl Into<String>) {
        self.lexical.push(LexicalError { issue, line, lexeme: lexeme.into() });
    }

    pub fn syntax(&mut self, issue: SyntaxIssue, line: usize, lexeme: impl Into<String>) {
        self.syntax.push(SyntaxError { issue, line, lexeme: lexeme.into() });
    }

    pub fn symbol(&mut self, issue: SymbolIssue, identifier: impl Into<String>) {
        self.symbol.push(SymbolError { issue, identifier: identifier.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.lexical.is_empty() && self.syntax.is_empty() && self.symbol.is_empty()
    }

    /// True when anything other than a warning was recorded.
    pub fn has_errors(&self) -> bool {
        !self.lexical.is_empty()
            || self.syntax.iter().any(|e| !e.issue.is_warning())
            || self.symbol.iter().any(|e| !e.issue.is_warning())
    }

    pub fn syntax_warnings(&self) -> impl Iterator<Item = &SyntaxError> {
        self.syntax.iter().filter(|e| e.issue.is_warning())
    }

    pub fn syntax_errors(&self) -> impl Iterator<Item = &SyntaxError> {
        self.syntax.iter().filter(|e| !e.issue.is_warning())
    }

    /// Line-addressed messages (lexical and syntax) keyed by line number.
    pub fn by_line(&self) -> MultiMap<usize, String> {
        let mut res = MultiMap::new();
        for e in &self.lexical {
            res.insert(e.line, e.to_string());
        }
        for e in &self.syntax {
            res.insert(e.line, e.to_string());
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let mut diags = Diagnostics::new();
        diags.syntax(
            SyntaxIssue::AssignTypoForgiven { found: TokenType::Equals },
            3,
            "=",
        );
        diags.symbol(SymbolIssue::ForcedGlobal, "x");
        assert!(!diags.is_empty());
        assert!(!diags.has_errors());
        assert_eq!(diags.syntax_warnings().count(), 1);

        diags.symbol(SymbolIssue::Undeclared, "y");
        assert!(diags.has_errors());
    }

    #[test]
    fn test_by_line_groups_messages() {
        let mut diags = Diagnostics::new();
        diags.lexical(LexicalIssue::InvalidCharacter, 2, "#");
        diags.syntax(SyntaxIssue::MissingStatement, 2, "end");
        diags.syntax(SyntaxIssue::MissingExpression, 5, ";");

        let grouped = diags.by_line();
        assert_eq!(grouped.get_vec(&2).map(Vec::len), Some(2));
        assert_eq!(grouped.get_vec(&5).map(Vec::len), Some(1));
        assert!(grouped.get_vec(&1).is_none());
    }

    #[test]
    fn test_messages_carry_issue_text() {
        let e = SyntaxError {
            issue: SyntaxIssue::Missing { expected: TokenType::Semicolon, context: "declaration" },
            line: 4,
            lexeme: "begin".to_string(),
        };
        assert_eq!(e.to_string(), "line 4: error: missing ';' in declaration near `begin`");
    }
}
