//! Operand compatibility rules.

use crate::symbol::ValueType;
use ValueType::*;

/// `&` and `|`: logical on bools, bitwise on integers.
pub(crate) fn logical(left: ValueType, right: ValueType) -> Option<ValueType> {
    match (left, right) {
        (Bool, Bool) => Some(Bool),
        (Integer, Integer) => Some(Integer),
        _ => None,
    }
}

/// `+ - * /`: numeric operands, float when either side is float.
pub(crate) fn arithmetic(left: ValueType, right: ValueType) -> Option<ValueType> {
    match (left, right) {
        (Integer, Integer) => Some(Integer),
        (l, r) if l.is_numeric() && r.is_numeric() => Some(Float),
        _ => None,
    }
}

/// Relational operators always yield bool when the operands compare.
pub(crate) fn relational(left: ValueType, right: ValueType) -> bool {
    match (left, right) {
        (String, _) | (_, String) => false,
        (l, r) if l == r => true,
        (Integer, Bool) | (Bool, Integer) | (Integer, Float) | (Float, Integer) => true,
        _ => false,
    }
}

pub(crate) fn assignable(target: ValueType, value: ValueType) -> bool {
    target == value
        || matches!(
            (target, value),
            (Integer, Float)
                | (Integer, Bool)
                | (Float, Integer)
                | (Bool, Integer)
                | (Integer, Char)
                | (Char, Integer)
        )
}

/// IF and FOR conditions, and the operand of NOT.
pub(crate) fn is_condition(value_type: ValueType) -> bool {
    matches!(value_type, Bool | Integer)
}
