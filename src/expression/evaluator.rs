//! Expression evaluation.

use super::{ExpressionError, Operator};

/// Applies `operator` to `a` and `b`.
///
/// Division by zero is reported as [`ExpressionError::DivisionByZero`]
/// rather than producing an infinite or NaN result.
///
/// # Examples
///
/// ```
/// use calcrelay::expression::{evaluate, Operator};
///
/// assert_eq!(evaluate(3.0, Operator::Add, 4.0), Ok(7.0));
/// assert!(evaluate(1.0, Operator::Divide, 0.0).is_err());
/// ```
pub fn evaluate(a: f64, operator: Operator, b: f64) -> Result<f64, ExpressionError> {
    match operator {
        Operator::Add => Ok(a + b),
        Operator::Subtract => Ok(a - b),
        Operator::Multiply => Ok(a * b),
        Operator::Divide if b == 0.0 => Err(ExpressionError::DivisionByZero),
        Operator::Divide => Ok(a / b),
    }
}
