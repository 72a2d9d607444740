//! Filter predicates for the query tool's `--include` option.
//!
//! Builds expressions like:
//! - `INFO/DP==30`
//! - `FILTER=="PASS"`
//! - `QUAL>=10 && QUAL<20`

use std::fmt;

use crate::value::Value;

/// Comparison and logical operators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    // Comparison
    Eq,   // ==
    Lt,   // <
    LtEq, // <=
    GtEq, // >=

    // Logical
    And, // &&
}

impl BinaryOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::And => " && ",
        }
    }
}

/// A filter expression AST node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A field reference, already in include syntax (e.g., `INFO/DP`).
    Var(String),
    /// A literal value; strings are quoted when rendered.
    Literal(Value),
    /// A binary operation.
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
}

impl Expr {
    /// Create a variable expression.
    pub fn var(name: &str) -> Self {
        Expr::Var(name.to_string())
    }

    /// `field == value`.
    pub fn eq(field: &str, value: Value) -> Self {
        Expr::compare(field, BinaryOp::Eq, value)
    }

    /// `field <op> value`.
    pub fn compare(field: &str, op: BinaryOp, value: Value) -> Self {
        Expr::Binary(
            Box::new(Expr::var(field)),
            op,
            Box::new(Expr::Literal(value)),
        )
    }

    /// `self && other`.
    pub fn and(self, other: Expr) -> Self {
        Expr::Binary(Box::new(self), BinaryOp::And, Box::new(other))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Var(name) => f.write_str(name),
            Expr::Literal(Value::String(s)) => write!(f, "\"{}\"", s.replace('"', "\\\"")),
            Expr::Literal(v) => write!(f, "{}", v),
            Expr::Binary(left, op, right) => write!(f, "{}{}{}", left, op.symbol(), right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_numeric_equality() {
        let expr = Expr::eq("INFO/DP", Value::Integer(30));
        assert_eq!(expr.to_string(), "INFO/DP==30");
    }

    #[test]
    fn test_render_string_is_quoted() {
        let expr = Expr::eq("FILTER", Value::from("PASS"));
        assert_eq!(expr.to_string(), r#"FILTER=="PASS""#);
    }

    #[test]
    fn test_render_interval() {
        let expr = Expr::compare("QUAL", BinaryOp::GtEq, Value::Float(10.5))
            .and(Expr::compare("QUAL", BinaryOp::Lt, Value::Integer(20)));
        assert_eq!(expr.to_string(), "QUAL>=10.5 && QUAL<20");
        assert!(matches!(expr, Expr::Binary(_, BinaryOp::And, _)));
    }

    #[test]
    fn test_render_closed_upper_bound() {
        let expr = Expr::compare("GQ", BinaryOp::LtEq, Value::Integer(99));
        assert_eq!(expr.to_string(), "GQ<=99");
    }
}
