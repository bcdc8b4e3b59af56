use std::fmt::{self, Display, Formatter};

use itertools::Itertools;

use crate::scanner::token::TokenType;

/// Stable handle into the symbol arena owned by [`crate::symbol_table::SymTable`].
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct SymbolId(pub(crate) usize);

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum ValueType {
    Integer,
    Float,
    Bool,
    String,
    Char,
}

impl ValueType {
    pub fn from_type_mark(token_type: TokenType) -> Option<Self> {
        Some(match token_type {
            TokenType::IntegerType => ValueType::Integer,
            TokenType::FloatType => ValueType::Float,
            TokenType::BoolType => ValueType::Bool,
            TokenType::StringType => ValueType::String,
            TokenType::CharType => ValueType::Char,
            _ => return None,
        })
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ValueType::Integer => "integer",
                ValueType::Float => "float",
                ValueType::Bool => "bool",
                ValueType::String => "string",
                ValueType::Char => "char",
            }
        )
    }
}

/// The flat kind tag of a symbol, derived from its [`SymbolState`].
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum SymbolKind {
    Unassigned,
    Integer,
    Float,
    Bool,
    String,
    Char,
    Procedure,
}

impl From<ValueType> for SymbolKind {
    fn from(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Integer => SymbolKind::Integer,
            ValueType::Float => SymbolKind::Float,
            ValueType::Bool => SymbolKind::Bool,
            ValueType::String => SymbolKind::String,
            ValueType::Char => SymbolKind::Char,
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub enum Direction {
    In,
    Out,
    InOut,
}

impl Direction {
    pub fn from_token_type(token_type: TokenType) -> Option<Self> {
        match token_type {
            TokenType::In => Some(Direction::In),
            TokenType::Out => Some(Direction::Out),
            TokenType::InOut => Some(Direction::InOut),
            _ => None,
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Direction::In => "in",
                Direction::Out => "out",
                Direction::InOut => "inout",
            }
        )
    }
}

/// Inclusive bounds of a one-dimensional array.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct ArrayBounds {
    pub lower: i64,
    pub upper: i64,
}

#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
pub struct Parameter {
    pub symbol: SymbolId,
    pub value_type: ValueType,
    pub direction: Direction,
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Declaration {
    Variable {
        value_type: ValueType,
        bounds: Option<ArrayBounds>,
    },
    Procedure {
        params: Vec<Parameter>,
    },
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub enum SymbolState {
    Unassigned,
    Declared(Declaration),
}

#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Symbol {
    pub name: String,
    /// Token type the scanner reports when it meets this name.
    pub token_type: TokenType,
    pub state: SymbolState,
    pub is_global: bool,
}

impl Symbol {
    pub fn placeholder(name: impl Into<String>) -> Self {
        Symbol {
            name: name.into(),
            token_type: TokenType::Identifier,
            state: SymbolState::Unassigned,
            is_global: false,
        }
    }

    pub fn reserved(name: &str, token_type: TokenType) -> Self {
        Symbol {
            name: name.to_string(),
            token_type,
            state: SymbolState::Unassigned,
            is_global: true,
        }
    }

    pub fn declared(name: impl Into<String>, declaration: Declaration, is_global: bool) -> Self {
        Symbol {
            name: name.into(),
            token_type: TokenType::Identifier,
            state: SymbolState::Declared(declaration),
            is_global,
        }
    }

    pub fn kind(&self) -> SymbolKind {
        match &self.state {
            SymbolState::Unassigned => SymbolKind::Unassigned,
            SymbolState::Declared(Declaration::Procedure { .. }) => SymbolKind::Procedure,
            SymbolState::Declared(Declaration::Variable { value_type, .. }) => {
                SymbolKind::from(*value_type)
            }
        }
    }

    pub fn is_declared(&self) -> bool {
        matches!(self.state, SymbolState::Declared(_))
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match &self.state {
            SymbolState::Declared(Declaration::Variable { value_type, .. }) => Some(*value_type),
            _ => None,
        }
    }

    pub fn bounds(&self) -> Option<ArrayBounds> {
        match &self.state {
            SymbolState::Declared(Declaration::Variable { bounds, .. }) => *bounds,
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.bounds().is_some()
    }

    pub fn params(&self) -> Option<&[Parameter]> {
        match &self.state {
            SymbolState::Declared(Declaration::Procedure { params }) => Some(params),
            _ => None,
        }
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_global {
            write!(f, "global ")?;
        }
        match &self.state {
            SymbolState::Unassigned => write!(f, "{}: unassigned", self.name),
            SymbolState::Declared(Declaration::Variable { value_type, bounds }) => {
                write!(f, "{} {}", value_type, self.name)?;
                if let Some(ArrayBounds { lower, upper }) = bounds {
                    write!(f, "[{}:{}]", lower, upper)?;
                }
                Ok(())
            }
            SymbolState::Declared(Declaration::Procedure { params }) => write!(
                f,
                "procedure {}({})",
                self.name,
                params
                    .iter()
                    .map(|p| format!("{} {}", p.value_type, p.direction))
                    .join(", ")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_state() {
        let mut sym = Symbol::placeholder("x");
        assert_eq!(sym.kind(), SymbolKind::Unassigned);
        assert!(!sym.is_declared());

        sym.state = SymbolState::Declared(Declaration::Variable {
            value_type: ValueType::Float,
            bounds: Some(ArrayBounds { lower: 0, upper: 9 }),
        });
        assert_eq!(sym.kind(), SymbolKind::Float);
        assert!(sym.is_array());
        assert_eq!(sym.to_string(), "float x[0:9]");
    }

    #[test]
    fn test_procedure_display_lists_parameters() {
        let sym = Symbol::declared(
            "putinteger",
            Declaration::Procedure {
                params: vec![Parameter {
                    symbol: SymbolId(0),
                    value_type: ValueType::Integer,
                    direction: Direction::In,
                }],
            },
            true,
        );
        assert_eq!(sym.kind(), SymbolKind::Procedure);
        assert_eq!(sym.to_string(), "global procedure putinteger(integer in)");
    }
}
