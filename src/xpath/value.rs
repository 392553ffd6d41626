//! Predicate value model
//!
//! The small value universe predicates compute over. A missing attribute is
//! its own variant rather than an error, so comparisons against it are
//! simply false.

use super::parser::CmpOp;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Number(f64),
    Str(String),
    /// Absent value (e.g. a referenced attribute the node does not carry).
    Nothing,
}

impl Value {
    /// Truth value: non-zero finite numbers, non-empty strings, `true`.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Nothing => false,
        }
    }

    /// Numeric coercion; `None` when no number can be produced.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Boolean(true) => Some(1.0),
            Value::Boolean(false) => Some(0.0),
            Value::Nothing => None,
        }
    }
}

/// Compare two values. Ordering operators coerce both sides numerically;
/// equality is numeric when either side is a number, boolean when either
/// side is a boolean, string otherwise. `Nothing` compares false under
/// every operator.
pub fn compare(op: CmpOp, left: &Value, right: &Value) -> bool {
    if matches!(left, Value::Nothing) || matches!(right, Value::Nothing) {
        return false;
    }
    match op {
        CmpOp::Eq => equal(left, right),
        CmpOp::NotEq => !equal(left, right),
        CmpOp::Lt | CmpOp::LtEq | CmpOp::Gt | CmpOp::GtEq => {
            let (a, b) = match (left.as_number(), right.as_number()) {
                (Some(a), Some(b)) => (a, b),
                _ => return false,
            };
            match op {
                CmpOp::Lt => a < b,
                CmpOp::LtEq => a <= b,
                CmpOp::Gt => a > b,
                CmpOp::GtEq => a >= b,
                _ => unreachable!(),
            }
        }
    }
}

fn equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            matches!((left.as_number(), right.as_number()), (Some(a), Some(b)) if a == b)
        }
        (Value::Boolean(_), _) | (_, Value::Boolean(_)) => left.truthy() == right.truthy(),
        (Value::Str(a), Value::Str(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(Value::Number(2.0).truthy());
        assert!(!Value::Number(0.0).truthy());
        assert!(Value::Str("x".into()).truthy());
        assert!(!Value::Str("".into()).truthy());
        assert!(!Value::Nothing.truthy());
    }

    #[test]
    fn test_string_and_numeric_equality() {
        assert!(compare(
            CmpOp::Eq,
            &Value::Str("en".into()),
            &Value::Str("en".into())
        ));
        // A numeric side coerces the other.
        assert!(compare(
            CmpOp::Eq,
            &Value::Str("3".into()),
            &Value::Number(3.0)
        ));
        assert!(!compare(
            CmpOp::Eq,
            &Value::Str("three".into()),
            &Value::Number(3.0)
        ));
    }

    #[test]
    fn test_missing_compares_false() {
        for op in [CmpOp::Eq, CmpOp::NotEq, CmpOp::Lt, CmpOp::GtEq] {
            assert!(!compare(op, &Value::Nothing, &Value::Str("x".into())));
        }
    }

    #[test]
    fn test_ordering_coerces_numerically() {
        assert!(compare(
            CmpOp::Lt,
            &Value::Str("2".into()),
            &Value::Str("10".into())
        ));
        assert!(!compare(
            CmpOp::Lt,
            &Value::Str("abc".into()),
            &Value::Number(1.0)
        ));
    }
}
