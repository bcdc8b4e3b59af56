use std::io::Read;

use tracing::warn;

use super::{types, Parser, RuleResult};
use crate::diagnostics::{FatalError, SyntaxIssue};
use crate::scanner::token::{Token, TokenType};
use crate::symbol::{SymbolKind, ValueType};

impl<'d, R: Read> Parser<'d, R> {
    /// {Statement ';'}* up to END, or also up to ELSE when `else_ends`.
    /// A token that cannot start a statement is reported and skipped.
    pub(super) fn statement_list(&mut self, else_ends: bool) -> Result<(), FatalError> {
        while !self.at_list_end(else_ends) {
            let starts = self.token.token_type.starts_statement();
            self.statement()?;
            // a skipped token takes no separator
            if starts {
                self.expect(TokenType::Semicolon, "statement")?;
            }
        }
        Ok(())
    }

    /// {Statement ';'}+
    fn nonempty_statement_list(&mut self, else_ends: bool) -> Result<bool, FatalError> {
        if self.at_list_end(else_ends) {
            self.error(SyntaxIssue::MissingStatement);
            return Ok(false);
        }
        let starts = self.token.token_type.starts_statement();
        self.statement_list(else_ends)?;
        Ok(starts)
    }

    fn at_list_end(&self, else_ends: bool) -> bool {
        match self.token.token_type {
            TokenType::End | TokenType::Period | TokenType::StreamEnd => true,
            TokenType::Else => else_ends,
            _ => false,
        }
    }

    /// Statement := Assign | ProcCall | If | Loop | RETURN
    fn statement(&mut self) -> Result<RuleResult, FatalError> {
        self.enter()?;
        let res = match self.token.token_type {
            TokenType::Identifier => {
                let name = self.advance()?;
                if self.at(TokenType::LeftParen) {
                    self.procedure_call(name)
                } else {
                    self.assignment(name)
                }
            }
            TokenType::If => self.if_statement(),
            TokenType::For => self.loop_statement(),
            TokenType::Return => {
                let token = self.advance()?;
                Ok(RuleResult::ok(Some(token), None))
            }
            // a stray ';' is skipped like any other token
            _ => {
                self.error(SyntaxIssue::MissingStatement);
                let skipped = self.advance()?;
                Ok(RuleResult::failed(Some(skipped)))
            }
        }?;
        self.leave();
        Ok(res)
    }

    /// Assign := Destination ':=' Expr, with the destination's name consumed.
    fn assignment(&mut self, name: Token) -> Result<RuleResult, FatalError> {
        let target = self.destination(&name)?;
        let mut ok = self.assign_operator()?;
        let value = self.expression()?;
        ok &= value.ok;

        if let (Some(target), Some(value_type)) = (target, value.value_type) {
            if !types::assignable(target, value_type) {
                self.error(SyntaxIssue::IncompatibleAssignment { target, value: value_type });
                ok = false;
            }
        }
        Ok(RuleResult::ok(Some(name), target).with_ok(ok))
    }

    /// Destination := Ident ['[' Expr ']']
    fn destination(&mut self, name: &Token) -> Result<Option<ValueType>, FatalError> {
        let declared = self.check_declared(name);
        let symbol = name.symbol.map(|id| self.symbols.get(id).clone());

        if declared {
            if let Some(SymbolKind::Procedure) = symbol.as_ref().map(|s| s.kind()) {
                self.error_at(SyntaxIssue::ProcedureAsValue { name: name.lexeme.clone() }, name);
            }
        }
        let indexed = self.at(TokenType::LeftBracket);
        if indexed {
            self.index()?;
            if declared && !symbol.as_ref().map_or(false, |s| s.is_array()) {
                self.error_at(SyntaxIssue::NotAnArray { name: name.lexeme.clone() }, name);
            }
        }
        Ok(symbol.and_then(|s| s.value_type()))
    }

    /// '[' Expr ']' with the bracket still ahead. The index must be integer.
    pub(super) fn index(&mut self) -> Result<RuleResult, FatalError> {
        self.advance()?;
        let index = self.expression()?;
        if let Some(found) = index.value_type {
            if found != ValueType::Integer {
                self.error(SyntaxIssue::NonIntegerIndex { found });
            }
        }
        let closed = self.expect(TokenType::RightBracket, "array index")?;
        Ok(RuleResult::ok(index.token, index.value_type).with_ok(index.ok && closed))
    }

    /// ':=', forgiving the first '=' or ':' written in its place.
    fn assign_operator(&mut self) -> Result<bool, FatalError> {
        match self.token.token_type {
            TokenType::Assign => {
                self.advance()?;
                Ok(true)
            }
            found @ (TokenType::Equals | TokenType::Colon) => {
                let forgiven = !self.assign_typo_forgiven;
                if forgiven {
                    self.assign_typo_forgiven = true;
                    warn!(line = self.token.line, "{} accepted as ':='", found);
                    self.error(SyntaxIssue::AssignTypoForgiven { found });
                } else {
                    self.error(SyntaxIssue::Missing { expected: TokenType::Assign, context: "assignment" });
                }
                self.advance()?;
                Ok(forgiven)
            }
            _ => {
                self.error(SyntaxIssue::Missing { expected: TokenType::Assign, context: "assignment" });
                Ok(false)
            }
        }
    }

    /// ProcCall := Ident '(' [ArgList] ')', with the name consumed.
    fn procedure_call(&mut self, name: Token) -> Result<RuleResult, FatalError> {
        self.advance()?;
        let args = if self.at(TokenType::RightParen) {
            vec![]
        } else {
            self.argument_list()?.args
        };
        let closed = self.expect(TokenType::RightParen, "procedure call")?;
        let checked = self.check_call(&name, &args);
        let mut res = RuleResult::ok(Some(name), None).with_ok(closed && checked);
        res.args = args;
        Ok(res)
    }

    /// ArgList := Expr {',' Expr}
    fn argument_list(&mut self) -> Result<RuleResult, FatalError> {
        let mut res = RuleResult::ok(None, None);
        loop {
            let arg = self.expression()?;
            res.ok &= arg.ok;
            res.args.push(arg.value_type);
            if !self.at(TokenType::Comma) {
                break;
            }
            self.advance()?;
        }
        Ok(res)
    }

    /// Argument count and positional types against the declared parameters.
    fn check_call(&mut self, name: &Token, args: &[Option<ValueType>]) -> bool {
        if !self.check_declared(name) {
            return false;
        }
        let params = match name.symbol.and_then(|id| self.symbols.get(id).params()) {
            Some(params) => params.to_vec(),
            None => {
                self.error_at(SyntaxIssue::NotAProcedure { name: name.lexeme.clone() }, name);
                return false;
            }
        };

        let (procedure, expected, found) = (name.lexeme.clone(), params.len(), args.len());
        let mut ok = true;
        if found < expected {
            self.error_at(SyntaxIssue::TooFewArguments { procedure, expected, found }, name);
            ok = false;
        } else if found > expected {
            self.error_at(SyntaxIssue::TooManyArguments { procedure, expected, found }, name);
            ok = false;
        }

        for (position, (arg, param)) in args.iter().zip(&params).enumerate() {
            match arg {
                Some(found) if *found != param.value_type => {
                    let issue = SyntaxIssue::ArgumentTypeMismatch {
                        procedure: name.lexeme.clone(),
                        position: position + 1,
                        expected: param.value_type,
                        found: *found,
                    };
                    self.error_at(issue, name);
                    ok = false;
                }
                _ => (),
            }
        }
        ok
    }

    /// Reports a condition that is neither bool nor integer.
    fn check_condition(&mut self, condition: &RuleResult) -> bool {
        match condition.value_type {
            Some(found) if !types::is_condition(found) => {
                self.error(SyntaxIssue::NonBooleanCondition { found });
                false
            }
            _ => condition.ok,
        }
    }

    /// If := IF '(' Expr ')' THEN {Statement ';'}+ [ELSE {Statement ';'}+] END IF
    fn if_statement(&mut self) -> Result<RuleResult, FatalError> {
        let keyword = self.advance()?;
        let mut ok = self.expect(TokenType::LeftParen, "if condition")?;
        let condition = self.expression()?;
        ok &= self.check_condition(&condition);
        ok &= self.expect(TokenType::RightParen, "if condition")?;
        ok &= self.expect(TokenType::Then, "if statement")?;
        ok &= self.nonempty_statement_list(true)?;

        if self.at(TokenType::Else) {
            self.advance()?;
            ok &= self.nonempty_statement_list(false)?;
        }
        ok &= self.expect(TokenType::End, "if statement")?;
        ok &= self.expect(TokenType::If, "end of if statement")?;
        Ok(RuleResult::ok(Some(keyword), None).with_ok(ok))
    }

    /// Loop := FOR '(' Assign ';' Expr ')' {Statement ';'}* END FOR
    fn loop_statement(&mut self) -> Result<RuleResult, FatalError> {
        let keyword = self.advance()?;
        let mut ok = self.expect(TokenType::LeftParen, "loop head")?;
        ok &= match self.identifier("loop assignment")? {
            Some(name) => self.assignment(name)?.ok,
            None => false,
        };
        ok &= self.expect(TokenType::Semicolon, "loop head")?;

        let condition = self.expression()?;
        ok &= self.check_condition(&condition);
        ok &= self.expect(TokenType::RightParen, "loop head")?;
        self.statement_list(false)?;
        ok &= self.expect(TokenType::End, "loop")?;
        ok &= self.expect(TokenType::For, "end of loop")?;
        Ok(RuleResult::ok(Some(keyword), None).with_ok(ok))
    }
}
