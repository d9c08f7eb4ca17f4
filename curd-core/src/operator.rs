//! SQL comparison operators used by the fragment assembler

use std::fmt::{self, Display};

/// Type-safe SQL operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator(&'static str);

impl Operator {
    pub const EQ: Self = Operator("=");
    pub const NEQ: Self = Operator("<>");
    pub const GT: Self = Operator(">");
    pub const GTE: Self = Operator(">=");
    pub const LT: Self = Operator("<");
    pub const LTE: Self = Operator("<=");
    pub const IN: Self = Operator("IN");
    pub const NOT_IN: Self = Operator("NOT IN");
    pub const BETWEEN: Self = Operator("BETWEEN");

    /// Get the string representation of the operator
    pub fn as_str(&self) -> &str {
        self.0
    }
}

impl Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_constants() {
        assert_eq!(Operator::EQ.as_str(), "=");
        assert_eq!(Operator::NEQ.as_str(), "<>");
        assert_eq!(Operator::GTE.as_str(), ">=");
        assert_eq!(Operator::NOT_IN.as_str(), "NOT IN");
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Operator::GT), ">");
        assert_eq!(format!("{}", Operator::BETWEEN), "BETWEEN");
    }
}
