//! Arithmetic expressions: a single binary operator between two numbers.
//!
//! This module provides the leaf pieces of the relay:
//! [`Operator`], [`ParsedExpression`], [`parse`], [`evaluate`], and [`format_result`].
//!
//! # Examples
//!
//! ```
//! use calcrelay::expression::{self, Operator};
//!
//! let parsed = expression::parse("3+4").unwrap();
//! assert_eq!(parsed.operator, Operator::Add);
//!
//! let result = expression::evaluate(parsed.operand1, parsed.operator, parsed.operand2).unwrap();
//! let line = expression::format_result("alice", &parsed, result);
//! assert_eq!(line, "alice: 3.00 + 4.00 = 7.00");
//! ```

use std::fmt;

use thiserror::Error;

pub mod evaluator;
pub mod parser;

pub use evaluator::evaluate;
pub use parser::parse;

/// Request-level errors produced while turning an expression string into a result.
///
/// All of these terminate the session that submitted the expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("invalid expression: {reason}")]
    InvalidExpression { reason: &'static str },

    #[error("invalid operand: {token:?}")]
    InvalidOperand { token: String },

    /// Raised only when an operator is named by string (the `FromStr` impl of [`Operator`]).
    /// The tokenizer splits on `+ - * /` alone, so a string it accepts always
    /// carries a supported operator.
    #[error("unsupported operator: {symbol:?}")]
    UnsupportedOperator { symbol: String },

    #[error("division by zero")]
    DivisionByZero,
}

/// One of the four supported arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    /// Returns the operator for a single character, if it is one of `+ - * /`.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Add),
            '-' => Some(Self::Subtract),
            '*' => Some(Self::Multiply),
            '/' => Some(Self::Divide),
            _ => None,
        }
    }

    /// Returns the operator symbol.
    pub fn as_char(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl std::str::FromStr for Operator {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::from_char(c),
            _ => None,
        }
        .ok_or_else(|| ExpressionError::UnsupportedOperator {
            symbol: s.to_owned(),
        })
    }
}

/// An expression split into its two operands and the operator between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParsedExpression {
    pub operand1: f64,
    pub operator: Operator,
    pub operand2: f64,
}

/// Formats the broadcast line for a computed expression.
///
/// Every number is printed with two decimal places:
/// `"<name>: <operand1> <operator> <operand2> = <result>"`.
pub fn format_result(name: &str, expr: &ParsedExpression, result: f64) -> String {
    format!(
        "{name}: {:.2} {} {:.2} = {result:.2}",
        expr.operand1, expr.operator, expr.operand2
    )
}
