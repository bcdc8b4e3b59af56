use std::io::Read;

use tracing::debug;

use super::{BodyKind, Parser, RuleResult};
use crate::diagnostics::{FatalError, SymbolIssue, SyntaxIssue};
use crate::scanner::token::{Token, TokenType};
use crate::symbol::*;

impl<'d, R: Read> Parser<'d, R> {
    /// Declare := [GLOBAL] ProcDeclare | [GLOBAL] VarDeclare
    pub(super) fn declare(&mut self) -> Result<RuleResult, FatalError> {
        let is_global = self.at(TokenType::Global);
        if is_global {
            self.advance()?;
        }

        if self.at(TokenType::Procedure) {
            self.proc_declare(is_global)
        } else if self.token.token_type.is_type_mark() {
            self.var_declare(is_global)
        } else {
            self.error(SyntaxIssue::InvalidTypeMark);
            Ok(RuleResult::failed(None))
        }
    }

    /// ProcDeclare := ProcHead Body
    fn proc_declare(&mut self, is_global: bool) -> Result<RuleResult, FatalError> {
        self.enter()?;
        // the procedure's name belongs to the enclosing scope
        self.advance()?;
        let name = self.identifier("procedure head")?;
        let id = match &name {
            Some(token) => {
                self.complete_declaration(token, Declaration::Procedure { params: vec![] }, is_global)
            }
            None => None,
        };

        self.symbols.open_scope();
        let res = self.proc_scope(name.as_ref(), id);
        self.symbols.close_scope();
        self.leave();
        res
    }

    /// Everything after the procedure's name, parsed inside its own frame.
    fn proc_scope(&mut self, name: Option<&Token>, id: Option<SymbolId>) -> Result<RuleResult, FatalError> {
        if let (Some(token), Some(id)) = (name, id) {
            // visible to its own body for recursive calls
            self.symbols.bind_local(&token.lexeme, id);
        }

        let head = self.proc_head()?;
        if let Some(id) = id {
            if let SymbolState::Declared(Declaration::Procedure { params }) = &mut self.symbols.get_mut(id).state {
                *params = head.params.clone();
            }
            debug!(symbol = %self.symbols.get(id), "procedure declared");
        }

        let body = self.body(BodyKind::Procedure)?;
        let mut res = RuleResult::ok(name.cloned(), None).with_ok(head.ok && body.ok);
        res.symbol = id;
        res.params = head.params;
        Ok(res)
    }

    /// ProcHead := PROCEDURE Ident '(' [ParamList] ')' IS
    /// (the keyword and name are already consumed)
    fn proc_head(&mut self) -> Result<RuleResult, FatalError> {
        let mut ok = self.expect(TokenType::LeftParen, "procedure head")?;
        let params = if self.token.token_type.is_type_mark() {
            self.param_list()?.params
        } else {
            vec![]
        };
        ok &= self.expect(TokenType::RightParen, "procedure head")?;
        ok &= self.expect(TokenType::Is, "procedure head")?;

        let mut res = RuleResult::ok(None, None).with_ok(ok);
        res.params = params;
        Ok(res)
    }

    /// ParamList := Param {',' Param}
    fn param_list(&mut self) -> Result<RuleResult, FatalError> {
        let mut res = RuleResult::ok(None, None);
        loop {
            let param = self.param()?;
            res.ok &= param.ok;
            res.params.extend(param.params);
            if !self.at(TokenType::Comma) {
                break;
            }
            self.advance()?;
        }
        Ok(res)
    }

    /// Param := VarDeclare (IN | OUT | INOUT)
    fn param(&mut self) -> Result<RuleResult, FatalError> {
        let mut res = self.var_declare(false)?;
        let direction = match Direction::from_token_type(self.token.token_type) {
            Some(direction) => {
                self.advance()?;
                direction
            }
            None => {
                self.error(SyntaxIssue::InvalidDirection);
                res.ok = false;
                Direction::In
            }
        };
        if let (Some(symbol), Some(value_type)) = (res.symbol, res.value_type) {
            res.params = vec![Parameter { symbol, value_type, direction }];
        }
        Ok(res)
    }

    /// VarDeclare := TypeMark Ident ['[' Bound ':' Bound ']']
    pub(super) fn var_declare(&mut self, is_global: bool) -> Result<RuleResult, FatalError> {
        let value_type = self.type_mark()?;
        let name = self.identifier("variable declaration")?;
        let bounds = if self.at(TokenType::LeftBracket) {
            self.array_bounds()?
        } else {
            None
        };

        let symbol = match (&name, value_type) {
            (Some(token), Some(value_type)) => {
                let declaration = Declaration::Variable { value_type, bounds };
                self.complete_declaration(token, declaration, is_global)
            }
            _ => None,
        };

        let mut res = RuleResult::ok(name, value_type).with_ok(symbol.is_some());
        res.symbol = symbol;
        Ok(res)
    }

    fn type_mark(&mut self) -> Result<Option<ValueType>, FatalError> {
        match ValueType::from_type_mark(self.token.token_type) {
            Some(value_type) => {
                self.advance()?;
                Ok(Some(value_type))
            }
            None => {
                self.error(SyntaxIssue::InvalidTypeMark);
                Ok(None)
            }
        }
    }

    /// '[' Bound ':' Bound ']' with the bracket still ahead.
    fn array_bounds(&mut self) -> Result<Option<ArrayBounds>, FatalError> {
        self.advance()?;
        let lower = self.bound()?;
        self.expect(TokenType::Colon, "array bounds")?;
        let upper = self.bound()?;
        self.expect(TokenType::RightBracket, "array bounds")?;

        if let (Some(lower), Some(upper)) = (lower, upper) {
            if lower >= upper {
                self.error(SyntaxIssue::InvertedBounds { lower, upper });
            }
        }
        // rejected bounds still leave an array behind
        Ok(Some(ArrayBounds {
            lower: lower.unwrap_or(0),
            upper: upper.unwrap_or(0),
        }))
    }

    /// Bound := ['-'] IntegerLiteral
    fn bound(&mut self) -> Result<Option<i64>, FatalError> {
        let negative = self.at(TokenType::Sub);
        if negative {
            self.advance()?;
        }
        match self.token.token_type {
            TokenType::IntegerLiteral => {
                let value = self.advance()?.integer().unwrap_or_default();
                Ok(Some(if negative { -value } else { value }))
            }
            TokenType::FloatLiteral
            | TokenType::StringLiteral
            | TokenType::CharLiteral
            | TokenType::Identifier
            | TokenType::True
            | TokenType::False => {
                self.error(SyntaxIssue::NonIntegerBound);
                self.advance()?;
                Ok(None)
            }
            _ => {
                self.error(SyntaxIssue::NonIntegerBound);
                Ok(None)
            }
        }
    }

    /// Completes the symbol named by `name` in the table a declaration with
    /// `is_global` lands in, or reports a redeclaration.
    pub(super) fn complete_declaration(
        &mut self,
        name: &Token,
        declaration: Declaration,
        is_global: bool,
    ) -> Option<SymbolId> {
        let lexeme = name.lexeme.as_str();
        let target_global = is_global || !self.symbols.has_open_scope();

        if is_global && self.symbols.has_open_scope() {
            // a placeholder the scanner left in the local frame is superseded
            if let Some(local) = self.symbols.get_in_target(lexeme, false) {
                if !self.symbols.get(local).is_declared() {
                    self.symbols.remove_local(lexeme);
                }
            }
        }

        if let Some(id) = self.symbols.get_in_target(lexeme, is_global) {
            let symbol = self.symbols.get_mut(id);
            if !symbol.is_declared() {
                symbol.state = SymbolState::Declared(declaration);
                symbol.is_global = target_global;
                debug!(symbol = %symbol, "declared");
                return Some(id);
            }
            let previous = symbol.kind();
            let issue = if target_global {
                SymbolIssue::GlobalRedeclared { previous }
            } else {
                SymbolIssue::Redeclared { previous }
            };
            self.diagnostics.symbol(issue, lexeme);
            return None;
        }

        let symbol = Symbol::declared(lexeme, declaration, target_global);
        let id = self.symbols.add_symbol(lexeme, symbol, target_global, self.diagnostics)?;
        debug!(symbol = %self.symbols.get(id), "declared");
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::{SymbolIssue, SyntaxIssue};
    use crate::parser::tests::parse_ok;
    use crate::symbol::*;

    #[test]
    fn test_redeclaration_in_one_scope() -> Result<(), String> {
        let source = "program p is procedure f() is integer a; integer a; begin end procedure; begin end program.";
        let (_, diags) = parse_ok(source)?;
        assert_eq!(diags.symbol.len(), 1, "{:?}", diags.symbol);
        assert_eq!(diags.symbol[0].identifier, "a");
        assert_eq!(
            diags.symbol[0].issue,
            SymbolIssue::Redeclared { previous: SymbolKind::Integer }
        );
        Ok(())
    }

    #[test]
    fn test_global_redeclaration() -> Result<(), String> {
        let source = "program p is global integer g; global float g; begin end program.";
        let (_, diags) = parse_ok(source)?;
        assert_eq!(diags.symbol.len(), 1, "{:?}", diags.symbol);
        assert_eq!(
            diags.symbol[0].issue,
            SymbolIssue::GlobalRedeclared { previous: SymbolKind::Integer }
        );
        Ok(())
    }

    #[test]
    fn test_local_may_shadow_global() -> Result<(), String> {
        let source = "program p is
            global integer a;
            procedure f() is integer a; begin a := 2; end procedure;
        begin
            a := 1;
        end program.";
        let (table, diags) = parse_ok(source)?;
        assert!(diags.is_empty(), "{:?}", diags);
        let a = table.get(table.get_symbol("a", true).unwrap());
        assert!(a.is_global);
        assert_eq!(a.value_type(), Some(ValueType::Integer));
        Ok(())
    }

    #[test]
    fn test_global_declared_inside_procedure() -> Result<(), String> {
        let source = "program p is
            procedure f() is global bool flag; begin flag := true; end procedure;
        begin
            flag := false;
        end program.";
        let (table, diags) = parse_ok(source)?;
        assert!(diags.is_empty(), "{:?}", diags);
        let flag = table.get(table.get_symbol("flag", true).unwrap());
        assert!(flag.is_global);
        assert_eq!(flag.kind(), SymbolKind::Bool);
        Ok(())
    }

    #[test]
    fn test_program_level_variables_are_global() -> Result<(), String> {
        let (table, diags) = parse_ok("program p is float x; begin x := 1.5; end program.")?;
        assert!(diags.is_empty(), "{:?}", diags);
        let x = table.get(table.get_symbol("x", true).unwrap());
        assert!(x.is_global);
        Ok(())
    }

    #[test]
    fn test_parameters_are_recorded_in_order() -> Result<(), String> {
        let source = "program p is
            procedure f(integer a in, float b out, char c[0:3] inout) is begin end procedure;
        begin end program.";
        let (table, diags) = parse_ok(source)?;
        assert!(diags.is_empty(), "{:?}", diags);
        let f = table.get(table.get_symbol("f", false).unwrap());
        let params = f.params().unwrap();
        let shape: Vec<(ValueType, Direction)> = params.iter().map(|p| (p.value_type, p.direction)).collect();
        assert_eq!(
            shape,
            [
                (ValueType::Integer, Direction::In),
                (ValueType::Float, Direction::Out),
                (ValueType::Char, Direction::InOut),
            ]
        );
        let c = table.get(params[2].symbol);
        assert_eq!(c.bounds(), Some(ArrayBounds { lower: 0, upper: 3 }));
        assert!(!c.is_global);
        Ok(())
    }

    #[test]
    fn test_missing_direction_defaults_to_in() -> Result<(), String> {
        let source = "program p is procedure f(integer a) is begin end procedure; begin end program.";
        let (table, diags) = parse_ok(source)?;
        assert_eq!(diags.syntax.len(), 1);
        assert_eq!(diags.syntax[0].issue, SyntaxIssue::InvalidDirection);
        let f = table.get(table.get_symbol("f", false).unwrap());
        assert_eq!(f.params().unwrap()[0].direction, Direction::In);
        Ok(())
    }

    #[test]
    fn test_array_bounds_checks() -> Result<(), String> {
        let source = "program p is integer a[-5:5]; integer b[3:1]; integer c[0:2.5]; begin end program.";
        let (table, diags) = parse_ok(source)?;
        let issues: Vec<&SyntaxIssue> = diags.syntax.iter().map(|e| &e.issue).collect();
        assert_eq!(
            issues,
            [
                &SyntaxIssue::InvertedBounds { lower: 3, upper: 1 },
                &SyntaxIssue::NonIntegerBound,
            ]
        );
        let a = table.get(table.get_symbol("a", true).unwrap());
        assert_eq!(a.bounds(), Some(ArrayBounds { lower: -5, upper: 5 }));
        assert!(table.get(table.get_symbol("b", true).unwrap()).is_array());
        Ok(())
    }

    #[test]
    fn test_bad_type_mark() -> Result<(), String> {
        let source = "program p is global x; begin end program.";
        let (_, diags) = parse_ok(source)?;
        assert_eq!(diags.syntax[0].issue, SyntaxIssue::InvalidTypeMark);
        Ok(())
    }
}
