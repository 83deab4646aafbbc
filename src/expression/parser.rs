//! Expression tokenizer.
//!
//! The input is scanned left to right and split at the first `+`, `-`, `*`
//! or `/`. A leading sign on the first operand is therefore read as the
//! operator, so `"-5*3"` leaves an empty left operand and is rejected.

use super::{ExpressionError, Operator, ParsedExpression};

/// Splits `input` into `(left, operator, right)` at the first operator character.
///
/// Returns `None` when the input contains no operator character.
fn split_at_operator(input: &str) -> Option<(&str, Operator, &str)> {
    input.char_indices().find_map(|(idx, c)| {
        let op = Operator::from_char(c)?;
        // Operator characters are ASCII, so `idx + 1` is a char boundary.
        Some((&input[..idx], op, &input[idx + 1..]))
    })
}

/// Parses a single operand token as a finite decimal number.
fn parse_operand(token: &str) -> Result<f64, ExpressionError> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(ExpressionError::InvalidOperand {
            token: token.to_owned(),
        }),
    }
}

/// Parses an expression of the form `<number><op><number>`.
///
/// # Errors
///
/// - [`ExpressionError::InvalidExpression`]: the input is empty or has no operator.
/// - [`ExpressionError::InvalidOperand`]: either side is not a finite number.
///
/// # Examples
///
/// ```
/// use calcrelay::expression::{parse, Operator};
///
/// let expr = parse("10/2").unwrap();
/// assert_eq!(expr.operand1, 10.0);
/// assert_eq!(expr.operator, Operator::Divide);
/// assert_eq!(expr.operand2, 2.0);
/// ```
pub fn parse(input: &str) -> Result<ParsedExpression, ExpressionError> {
    if input.is_empty() {
        return Err(ExpressionError::InvalidExpression {
            reason: "no expression to evaluate",
        });
    }

    let (left, operator, right) =
        split_at_operator(input).ok_or(ExpressionError::InvalidExpression {
            reason: "no operator found",
        })?;

    Ok(ParsedExpression {
        operand1: parse_operand(left)?,
        operator,
        operand2: parse_operand(right)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_operand(token: &str) -> ExpressionError {
        ExpressionError::InvalidOperand {
            token: token.to_owned(),
        }
    }

    #[test]
    fn parse_addition() {
        let expr = parse("3+4").unwrap();
        assert_eq!(expr.operand1, 3.0);
        assert_eq!(expr.operator, Operator::Add);
        assert_eq!(expr.operand2, 4.0);
    }

    #[test]
    fn parse_division() {
        let expr = parse("10/2").unwrap();
        assert_eq!(expr.operand1, 10.0);
        assert_eq!(expr.operator, Operator::Divide);
        assert_eq!(expr.operand2, 2.0);
    }

    #[test]
    fn parse_fractions() {
        let expr = parse("1.5*0.25").unwrap();
        assert_eq!(expr.operand1, 1.5);
        assert_eq!(expr.operator, Operator::Multiply);
        assert_eq!(expr.operand2, 0.25);
    }

    #[test]
    fn signed_right_operand() {
        let expr = parse("3*-4").unwrap();
        assert_eq!(expr.operator, Operator::Multiply);
        assert_eq!(expr.operand2, -4.0);
    }

    #[test]
    fn empty_input() {
        assert!(matches!(
            parse(""),
            Err(ExpressionError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn no_operator() {
        assert!(matches!(
            parse("42"),
            Err(ExpressionError::InvalidExpression { .. })
        ));
    }

    #[test]
    fn non_numeric_left() {
        assert_eq!(parse("abc+2"), Err(invalid_operand("abc")));
    }

    #[test]
    fn missing_right() {
        assert_eq!(parse("3+"), Err(invalid_operand("")));
    }

    #[test]
    fn leading_sign_is_operator() {
        assert_eq!(parse("-5*3"), Err(invalid_operand("")));
    }

    #[test]
    fn only_first_operator_splits() {
        // "2+3" is the right token and is not a number.
        assert_eq!(parse("1+2+3"), Err(invalid_operand("2+3")));
    }

    #[test]
    fn whitespace_is_not_trimmed() {
        assert_eq!(parse("3 + 4"), Err(invalid_operand("3 ")));
    }

    #[test]
    fn non_finite_operands_rejected() {
        assert_eq!(parse("inf+1"), Err(invalid_operand("inf")));
        assert_eq!(parse("1*NaN"), Err(invalid_operand("NaN")));
        assert_eq!(parse("1e400+1"), Err(invalid_operand("1e400")));
    }

    #[test]
    fn multibyte_input_does_not_panic() {
        assert_eq!(parse("é+1"), Err(invalid_operand("é")));
        assert_eq!(parse("1+é"), Err(invalid_operand("é")));
    }
}
