use std::io::Read;

use super::{types, Parser, RuleResult};
use crate::diagnostics::{FatalError, SyntaxIssue};
use crate::scanner::token::{Token, TokenType};
use crate::symbol::{SymbolKind, ValueType};

impl<'d, R: Read> Parser<'d, R> {
    /// Expr := [NOT] Arith ExprPrime
    pub(super) fn expression(&mut self) -> Result<RuleResult, FatalError> {
        self.enter()?;
        let not = if self.at(TokenType::Not) { Some(self.advance()?) } else { None };
        let mut res = self.arith()?;
        if let Some(not) = not {
            res.ok &= self.unary(&not, &mut res.value_type, types::is_condition);
        }
        let res = self.expr_prime(res)?;
        self.leave();
        Ok(res)
    }

    /// ExprPrime := {('&' | '|') Arith}
    fn expr_prime(&mut self, mut left: RuleResult) -> Result<RuleResult, FatalError> {
        while matches!(self.token.token_type, TokenType::And | TokenType::Or) {
            let operator = self.advance()?;
            let right = self.arith()?;
            left = self.binary(&operator, left, right, types::logical);
        }
        Ok(left)
    }

    /// Arith := Relat ArithPrime
    fn arith(&mut self) -> Result<RuleResult, FatalError> {
        let left = self.relat()?;
        self.arith_prime(left)
    }

    /// ArithPrime := {('+' | '-') Relat}
    fn arith_prime(&mut self, mut left: RuleResult) -> Result<RuleResult, FatalError> {
        while matches!(self.token.token_type, TokenType::Add | TokenType::Sub) {
            let operator = self.advance()?;
            let right = self.relat()?;
            left = self.binary(&operator, left, right, types::arithmetic);
        }
        Ok(left)
    }

    /// Relat := Term RelatPrime
    fn relat(&mut self) -> Result<RuleResult, FatalError> {
        let left = self.term()?;
        self.relat_prime(left)
    }

    /// RelatPrime := {('<' | '<=' | '>' | '>=' | '==' | '!=') Term}
    fn relat_prime(&mut self, mut left: RuleResult) -> Result<RuleResult, FatalError> {
        while self.token.token_type.is_relational() {
            let operator = self.advance()?;
            let right = self.term()?;
            left = self.binary(&operator, left, right, |l, r| {
                types::relational(l, r).then_some(ValueType::Bool)
            });
            // a comparison is bool even when its operands were rejected
            left.value_type = Some(ValueType::Bool);
        }
        Ok(left)
    }

    /// Term := Factor TermPrime
    fn term(&mut self) -> Result<RuleResult, FatalError> {
        let left = self.factor()?;
        self.term_prime(left)
    }

    /// TermPrime := {('*' | '/') Factor}
    fn term_prime(&mut self, mut left: RuleResult) -> Result<RuleResult, FatalError> {
        while matches!(self.token.token_type, TokenType::Mul | TokenType::Div) {
            let operator = self.advance()?;
            let right = self.factor()?;
            left = self.binary(&operator, left, right, types::arithmetic);
        }
        Ok(left)
    }

    /// Factor := '(' Expr ')' | ['-'] Name | ['-'] Number
    ///         | String | Char | TRUE | FALSE
    fn factor(&mut self) -> Result<RuleResult, FatalError> {
        use TokenType::*;

        match self.token.token_type {
            LeftParen => {
                self.advance()?;
                let inner = self.expression()?;
                let closed = self.expect(RightParen, "parenthesized expression")?;
                Ok(RuleResult::ok(inner.token, inner.value_type).with_ok(inner.ok && closed))
            }
            Sub => {
                let minus = self.advance()?;
                let mut res = match self.token.token_type {
                    Identifier => self.name()?,
                    IntegerLiteral | FloatLiteral => self.number()?,
                    _ => {
                        self.error(SyntaxIssue::MissingExpression);
                        return Ok(RuleResult::failed(Some(minus)));
                    }
                };
                res.ok &= self.unary(&minus, &mut res.value_type, ValueType::is_numeric);
                Ok(res)
            }
            Identifier => self.name(),
            IntegerLiteral | FloatLiteral => self.number(),
            StringLiteral => Ok(RuleResult::ok(Some(self.advance()?), Some(ValueType::String))),
            CharLiteral => Ok(RuleResult::ok(Some(self.advance()?), Some(ValueType::Char))),
            True | False => Ok(RuleResult::ok(Some(self.advance()?), Some(ValueType::Bool))),
            _ => {
                self.error(SyntaxIssue::MissingExpression);
                Ok(RuleResult::failed(None))
            }
        }
    }

    /// Name := Ident ['[' Expr ']']
    fn name(&mut self) -> Result<RuleResult, FatalError> {
        let name = self.advance()?;
        let declared = self.check_declared(&name);
        let symbol = name.symbol.map(|id| self.symbols.get(id).clone());
        let mut ok = declared;

        if declared && symbol.as_ref().map(|s| s.kind()) == Some(SymbolKind::Procedure) {
            self.error_at(SyntaxIssue::ProcedureAsValue { name: name.lexeme.clone() }, &name);
            ok = false;
        }
        if self.at(TokenType::LeftBracket) {
            ok &= self.index()?.ok;
            if declared && !symbol.as_ref().map_or(false, |s| s.is_array()) {
                self.error_at(SyntaxIssue::NotAnArray { name: name.lexeme.clone() }, &name);
                ok = false;
            }
        }

        let value_type = symbol.and_then(|s| s.value_type());
        Ok(RuleResult::ok(Some(name), value_type).with_ok(ok))
    }

    /// Number := IntegerLiteral | FloatLiteral
    fn number(&mut self) -> Result<RuleResult, FatalError> {
        let token = self.advance()?;
        let value_type = match token.token_type {
            TokenType::FloatLiteral => ValueType::Float,
            _ => ValueType::Integer,
        };
        Ok(RuleResult::ok(Some(token), Some(value_type)))
    }

    /// Combines two operands under `rule`, reporting an incompatible pair.
    fn binary(
        &mut self,
        operator: &Token,
        left: RuleResult,
        right: RuleResult,
        rule: impl Fn(ValueType, ValueType) -> Option<ValueType>,
    ) -> RuleResult {
        let ok = left.ok && right.ok;
        let value_type = match (left.value_type, right.value_type) {
            (Some(l), Some(r)) => {
                let combined = rule(l, r);
                if combined.is_none() {
                    self.error_at(
                        SyntaxIssue::IncompatibleOperands {
                            operator: operator.token_type,
                            left: l,
                            right: r,
                        },
                        operator,
                    );
                }
                combined
            }
            // unknown operands were reported where they came from
            _ => None,
        };
        RuleResult::ok(right.token, value_type).with_ok(ok && value_type.is_some())
    }

    /// Checks the operand of a prefix operator, clearing its type on error.
    fn unary(&mut self, operator: &Token, operand: &mut Option<ValueType>, accepts: fn(ValueType) -> bool) -> bool {
        match *operand {
            Some(found) if !accepts(found) => {
                self.error_at(
                    SyntaxIssue::IncompatibleOperand { operator: operator.token_type, operand: found },
                    operator,
                );
                *operand = None;
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}
