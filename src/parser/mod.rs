//! Single-pass LL(1) recursive-descent parser.
//!
//! Syntax recognition, symbol completion and type checking run together:
//! every grammar rule consumes the lookahead token and hands a
//! [`RuleResult`] back to its caller instead of building a tree.

use std::collections::HashSet;
use std::io::Read;
use std::mem;

use tracing::debug;

use crate::diagnostics::{Diagnostics, FatalError, SymbolIssue, SyntaxIssue};
use crate::scanner::token::{Token, TokenType};
use crate::scanner::Scanner;
use crate::symbol::{Parameter, SymbolId, ValueType};
use crate::symbol_table::SymTable;

mod declarations;
mod expression_parser;
mod statements;
pub(crate) mod types;

pub const DEFAULT_MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Deepest nesting of expressions, statements and procedures accepted
    /// before the parse is abandoned.
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions { max_depth: DEFAULT_MAX_DEPTH }
    }
}

/// What every grammar rule returns.
#[derive(Debug, Clone, Default)]
pub(crate) struct RuleResult {
    pub(crate) ok: bool,
    /// Last token relevant to the rule (the declared name, the operand...).
    pub(crate) token: Option<Token>,
    pub(crate) value_type: Option<ValueType>,
    /// Symbol completed by a declaration rule.
    pub(crate) symbol: Option<SymbolId>,
    pub(crate) params: Vec<Parameter>,
    pub(crate) args: Vec<Option<ValueType>>,
}

impl RuleResult {
    pub(crate) fn ok(token: Option<Token>, value_type: Option<ValueType>) -> Self {
        RuleResult { ok: true, token, value_type, ..Default::default() }
    }

    pub(crate) fn failed(token: Option<Token>) -> Self {
        RuleResult { ok: false, token, ..Default::default() }
    }

    pub(crate) fn with_ok(mut self, ok: bool) -> Self {
        self.ok = ok;
        self
    }
}

/// Which keyword closes a body after `END`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BodyKind {
    Program,
    Procedure,
}

pub struct Parser<'d, R: Read> {
    scanner: Scanner<R>,
    symbols: SymTable,
    diagnostics: &'d mut Diagnostics,
    token: Token,
    options: ParseOptions,
    /// Set once the first '=' or ':' standing in for ':=' has been excused.
    assign_typo_forgiven: bool,
    reported_undeclared: HashSet<SymbolId>,
    depth: usize,
}

impl<'d, R: Read> Parser<'d, R> {
    pub fn new(scanner: Scanner<R>, diagnostics: &'d mut Diagnostics, options: ParseOptions) -> Self {
        Parser {
            scanner,
            symbols: SymTable::new(),
            diagnostics,
            token: Token::new(TokenType::StreamEnd, "", 1),
            options,
            assign_typo_forgiven: false,
            reported_undeclared: HashSet::new(),
            depth: 0,
        }
    }

    /// Parses a whole program and hands back the resolved symbol table.
    pub fn run(mut self) -> Result<SymTable, FatalError> {
        self.advance()?;
        match self.token.token_type {
            TokenType::StreamEnd => return Err(FatalError::EmptyInput),
            TokenType::Invalid => return Err(FatalError::InvalidStart { line: self.token.line }),
            _ => (),
        }
        self.program()?;
        debug!(
            lexical = self.diagnostics.lexical.len(),
            syntax = self.diagnostics.syntax.len(),
            symbol = self.diagnostics.symbol.len(),
            "parse finished"
        );
        Ok(self.symbols)
    }

    /// Consumes the lookahead, returning it, and scans the next token.
    fn advance(&mut self) -> Result<Token, FatalError> {
        let next = self.scanner.scan(&mut self.symbols, self.diagnostics)?;
        Ok(mem::replace(&mut self.token, next))
    }

    fn at(&self, token_type: TokenType) -> bool {
        self.token.is(token_type)
    }

    fn error(&mut self, issue: SyntaxIssue) {
        let (line, lexeme) = (self.token.line, self.token.lexeme.clone());
        self.diagnostics.syntax(issue, line, lexeme);
    }

    fn error_at(&mut self, issue: SyntaxIssue, token: &Token) {
        self.diagnostics.syntax(issue, token.line, token.lexeme.as_str());
    }

    /// Consumes `expected` if present. Otherwise records the omission and
    /// carries on as if it had been there.
    fn expect(&mut self, expected: TokenType, context: &'static str) -> Result<bool, FatalError> {
        if self.at(expected) {
            self.advance()?;
            return Ok(true);
        }
        self.error(SyntaxIssue::Missing { expected, context });
        Ok(false)
    }

    fn identifier(&mut self, context: &'static str) -> Result<Option<Token>, FatalError> {
        if self.at(TokenType::Identifier) {
            return Ok(Some(self.advance()?));
        }
        self.error(SyntaxIssue::Missing { expected: TokenType::Identifier, context });
        Ok(None)
    }

    /// Reports a use of a name no visible declaration completed, once per
    /// symbol. Returns true when the symbol is declared.
    fn check_declared(&mut self, token: &Token) -> bool {
        let id = match token.symbol {
            Some(id) => id,
            None => return false,
        };
        if self.symbols.get(id).is_declared() {
            return true;
        }
        if self.reported_undeclared.insert(id) {
            self.diagnostics.symbol(SymbolIssue::Undeclared, token.lexeme.as_str());
        }
        false
    }

    fn enter(&mut self) -> Result<(), FatalError> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(FatalError::NestingTooDeep {
                line: self.token.line,
                limit: self.options.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// Program := Head Body '.'
    fn program(&mut self) -> Result<RuleResult, FatalError> {
        let head = self.program_head()?;
        self.body(BodyKind::Program)?;
        if !self.at(TokenType::Period) {
            self.error(SyntaxIssue::MissingPeriod);
            return Err(FatalError::MissingPeriod { line: self.token.line });
        }
        // the marker is taken without scanning past it
        let line = self.token.line;
        let period = mem::replace(&mut self.token, Token::new(TokenType::StreamEnd, "", line));
        Ok(RuleResult::ok(Some(period), None).with_ok(head.ok))
    }

    /// Head := PROGRAM Ident IS
    fn program_head(&mut self) -> Result<RuleResult, FatalError> {
        if !self.at(TokenType::Program) {
            self.error(SyntaxIssue::MissingProgram);
            return Err(FatalError::MissingProgram { line: self.token.line });
        }
        self.advance()?;
        let name = self.identifier("program head")?;
        let is = self.expect(TokenType::Is, "program head")?;
        Ok(RuleResult::ok(name.clone(), None).with_ok(name.is_some() && is))
    }

    /// Body := {Declare ';'}* BEGIN {Statement ';'}* END PROGRAM|PROCEDURE
    fn body(&mut self, kind: BodyKind) -> Result<RuleResult, FatalError> {
        loop {
            if self.token.token_type.starts_declaration() {
                self.declare()?;
                self.expect(TokenType::Semicolon, "declaration")?;
            } else if self.at(TokenType::Semicolon) {
                self.error(SyntaxIssue::MissingDeclaration);
                self.advance()?;
            } else {
                break;
            }
        }

        let mut ok = self.expect(TokenType::Begin, "body")?;
        self.statement_list(false)?;
        ok &= self.expect(TokenType::End, "body")?;
        let closing = match kind {
            BodyKind::Program => TokenType::Program,
            BodyKind::Procedure => TokenType::Procedure,
        };
        ok &= self.expect(closing, "end of body")?;
        Ok(RuleResult::ok(None, None).with_ok(ok))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::LexicalIssue;
    use crate::parse_source;
    use crate::symbol::SymbolKind;

    pub(crate) fn parse_test(source: &str) -> (Result<SymTable, FatalError>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let res = parse_source(source, &mut diags, ParseOptions::default());
        (res, diags)
    }

    pub(crate) fn parse_ok(source: &str) -> Result<(SymTable, Diagnostics), String> {
        let (res, diags) = parse_test(source);
        let table = res.map_err(|e| format!("fatal: {} ({:?})", e, diags))?;
        Ok((table, diags))
    }

    #[test]
    fn test_minimal_program_is_clean() -> Result<(), String> {
        let (table, diags) = parse_ok("program p is begin end program.")?;
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(table.scope_depth(), 0);
        Ok(())
    }

    #[test]
    fn test_keywords_are_case_insensitive() -> Result<(), String> {
        let (_, diags) = parse_ok("PROGRAM P IS BEGIN END Program.")?;
        assert!(diags.is_empty(), "{:?}", diags);
        Ok(())
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let (res, _) = parse_test("  // nothing here\n");
        assert!(matches!(res, Err(FatalError::EmptyInput)));
    }

    #[test]
    fn test_invalid_first_token_is_fatal() {
        let (res, diags) = parse_test("'ab' program p is begin end program.");
        assert!(matches!(res, Err(FatalError::InvalidStart { line: 1 })));
        assert_eq!(diags.lexical[0].issue, LexicalIssue::MalformedChar);
    }

    #[test]
    fn test_missing_program_keyword_is_fatal() {
        let (res, diags) = parse_test("p is begin end program.");
        assert!(matches!(res, Err(FatalError::MissingProgram { line: 1 })));
        assert_eq!(diags.syntax.len(), 1);
        assert_eq!(diags.syntax[0].issue, SyntaxIssue::MissingProgram);
    }

    #[test]
    fn test_missing_period_is_fatal() {
        let (res, diags) = parse_test("program p is begin end program");
        assert!(matches!(res, Err(FatalError::MissingPeriod { .. })));
        assert_eq!(diags.syntax.last().map(|e| &e.issue), Some(&SyntaxIssue::MissingPeriod));
    }

    #[test]
    fn test_unterminated_comment_aborts_parse() {
        let (res, diags) = parse_test("program p is /* begin end program.");
        assert!(matches!(res, Err(FatalError::UnterminatedComment { line: 1 })));
        assert_eq!(diags.lexical.len(), 1);
    }

    #[test]
    fn test_text_after_period_is_not_scanned() -> Result<(), String> {
        let (_, diags) = parse_ok("program p is begin end program. # /* garbage")?;
        assert!(diags.is_empty(), "{:?}", diags);
        Ok(())
    }

    #[test]
    fn test_missing_tokens_are_recovered() -> Result<(), String> {
        let source = "program p is\n integer x\nbegin\n x := 1\nend program.";
        let (_, diags) = parse_ok(source)?;
        let missing: Vec<(usize, TokenType)> = diags
            .syntax
            .iter()
            .filter_map(|e| match e.issue {
                SyntaxIssue::Missing { expected, .. } => Some((e.line, expected)),
                _ => None,
            })
            .collect();
        assert_eq!(missing, [(3, TokenType::Semicolon), (5, TokenType::Semicolon)]);
        Ok(())
    }

    #[test]
    fn test_procedure_scope_is_balanced() -> Result<(), String> {
        let source = "program p is procedure f() is integer x; begin x := 1; end procedure; begin end program.";
        let (table, diags) = parse_ok(source)?;
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(table.scopes_opened(), 1);
        assert_eq!(table.scope_depth(), 0);
        assert!(table.get_symbol("x", false).is_none());
        let f = table.get(table.get_symbol("f", false).unwrap());
        assert_eq!(f.kind(), SymbolKind::Procedure);
        assert_eq!(f.params().map(<[_]>::len), Some(0));
        Ok(())
    }

    #[test]
    fn test_scope_closed_after_errors_in_procedure() -> Result<(), String> {
        let source = "program p is
            procedure f(integer a in) is
                integer b[1:1];
            begin
                b[true] := \"s\";
                if (a) then end if;
            end procedure;
        begin
        end program.";
        let (table, diags) = parse_ok(source)?;
        assert!(diags.has_errors());
        assert_eq!(table.scope_depth(), 0);
        assert_eq!(table.scopes_opened(), 1);
        Ok(())
    }

    #[test]
    fn test_nesting_limit_is_fatal() {
        let depth = 100;
        let source = format!(
            "program p is integer x; begin x := {}1{}; end program.",
            "(".repeat(depth),
            ")".repeat(depth)
        );
        let mut diags = Diagnostics::new();
        let res = parse_source(&source, &mut diags, ParseOptions { max_depth: 50 });
        assert!(matches!(res, Err(FatalError::NestingTooDeep { limit: 50, .. })));

        let mut diags = Diagnostics::new();
        let res = parse_source(&source, &mut diags, ParseOptions::default());
        assert!(res.is_ok());
        assert!(diags.is_empty(), "{:?}", diags);
    }

    #[test]
    fn test_fixture_programs_parse_cleanly() -> Result<(), String> {
        for source in [
            include_str!("../../fixtures/correct/arrays.src"),
            include_str!("../../fixtures/correct/procedures.src"),
            include_str!("../../fixtures/correct/control_flow.src"),
        ] {
            let (_, diags) = parse_ok(source)?;
            assert!(diags.is_empty(), "{:?}", diags);
        }
        Ok(())
    }

    #[test]
    fn test_fixture_with_errors_keeps_going() -> Result<(), String> {
        let (_, diags) = parse_ok(include_str!("../../fixtures/incorrect/many_errors.src"))?;

        let lexical: Vec<_> = diags.lexical.iter().map(|e| (e.line, e.issue.clone())).collect();
        assert_eq!(lexical, [(6, LexicalIssue::InvalidCharacter)]);

        let syntax: Vec<_> = diags.syntax.iter().map(|e| (e.line, e.issue.clone())).collect();
        assert_eq!(
            syntax,
            [
                (7, SyntaxIssue::IncompatibleAssignment { target: ValueType::Float, value: ValueType::String }),
                (9, SyntaxIssue::NonBooleanCondition { found: ValueType::Float }),
                (
                    10,
                    SyntaxIssue::TooManyArguments { procedure: "putinteger".to_string(), expected: 1, found: 2 }
                ),
                (
                    11,
                    SyntaxIssue::IncompatibleOperands {
                        operator: TokenType::Add,
                        left: ValueType::Integer,
                        right: ValueType::Bool
                    }
                ),
                (12, SyntaxIssue::AssignTypoForgiven { found: TokenType::Equals }),
            ]
        );
        assert_eq!(diags.syntax_errors().count(), 4);

        let symbol: Vec<_> = diags.symbol.iter().map(|e| (e.identifier.as_str(), e.issue.clone())).collect();
        assert_eq!(
            symbol,
            [
                ("n", SymbolIssue::Redeclared { previous: SymbolKind::Integer }),
                ("undefined", SymbolIssue::Undeclared),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_doubled_separator_in_declarations() -> Result<(), String> {
        let source = "program p is integer x;; integer y; begin y := \"s\"; end program.";
        let (table, diags) = parse_ok(source)?;
        let issues: Vec<_> = diags.syntax.iter().map(|e| e.issue.clone()).collect();
        assert_eq!(
            issues,
            [
                SyntaxIssue::MissingDeclaration,
                SyntaxIssue::IncompatibleAssignment { target: ValueType::Integer, value: ValueType::String },
            ]
        );
        let y = table.get(table.get_symbol("y", true).unwrap());
        assert_eq!(y.value_type(), Some(ValueType::Integer));
        Ok(())
    }

    #[test]
    fn test_stray_tokens_do_not_end_the_body() -> Result<(), String> {
        for stray in [";", ")", "else", "is"] {
            let source = format!("program p is integer x; begin x := 1; {} x := \"s\"; end program.", stray);
            let (_, diags) = parse_ok(&source)?;
            let issues: Vec<_> = diags.syntax.iter().map(|e| e.issue.clone()).collect();
            assert_eq!(
                issues,
                [
                    SyntaxIssue::MissingStatement,
                    SyntaxIssue::IncompatibleAssignment { target: ValueType::Integer, value: ValueType::String },
                ],
                "after {:?}",
                stray
            );
        }
        Ok(())
    }
}
