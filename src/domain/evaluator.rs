//! AST evaluation for cell formulas.
//!
//! The evaluator is pure: every cell reference is handed to a
//! [`CellResolver`], which decides what the name means.

use super::errors::{EvalError, EvalResult};
use super::parser::{BinaryOp, Expr, Function, IncDecOp, UnaryOp, parse_expression};

/// Resolves a normalized cell name (e.g. `"B12"`) to a number.
pub trait CellResolver {
    fn resolve(&mut self, name: &str) -> EvalResult<f64>;
}

impl<F> CellResolver for F
where
    F: FnMut(&str) -> EvalResult<f64>,
{
    fn resolve(&mut self, name: &str) -> EvalResult<f64> {
        self(name)
    }
}

/// Expression evaluator that walks the AST and computes results.
pub struct ExpressionEvaluator<'a, R: ?Sized> {
    resolver: &'a mut R,
}

impl<'a, R: CellResolver + ?Sized> ExpressionEvaluator<'a, R> {
    pub fn new(resolver: &'a mut R) -> Self {
        Self { resolver }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> EvalResult<f64> {
        match expr {
            Expr::Number(value) => Ok(*value),

            Expr::CellRef(name) => self.resolver.resolve(name),

            Expr::Unary { operator, operand } => {
                let value = self.evaluate(operand)?;
                match operator {
                    UnaryOp::Plus => Ok(value),
                    UnaryOp::Minus => Ok(-value),
                }
            }

            Expr::IncDec { operator, operand } => {
                let value = self.evaluate(operand)?;
                match operator {
                    IncDecOp::Increment => Ok(value + 1.0),
                    IncDecOp::Decrement => Ok(value - 1.0),
                }
            }

            Expr::Binary { left, operator, right } => {
                let left_val = self.evaluate(left)?;
                let right_val = self.evaluate(right)?;
                apply_binary(*operator, left_val, right_val)
            }

            Expr::Call { function, args } => {
                if args.is_empty() {
                    return Err(EvalError::Argument(format!(
                        "{}() requires at least one argument",
                        function
                    )));
                }

                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg)?);
                }

                let reduce: fn(f64, f64) -> f64 = match function {
                    Function::MMin => f64::min,
                    Function::MMax => f64::max,
                };
                Ok(values[1..].iter().fold(values[0], |acc, &x| reduce(acc, x)))
            }
        }
    }
}

fn apply_binary(operator: BinaryOp, left: f64, right: f64) -> EvalResult<f64> {
    match operator {
        BinaryOp::Add => Ok(left + right),
        BinaryOp::Subtract => Ok(left - right),
        BinaryOp::Multiply => Ok(left * right),
        BinaryOp::Power => Ok(left.powf(right)),
        BinaryOp::Divide => {
            if right == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(left / right)
            }
        }
        BinaryOp::Mod => {
            if right == 0.0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(left % right)
            }
        }
        BinaryOp::Div => {
            // Operands are truncated toward zero and saturate at the i32
            // bounds; i32::MIN div -1 wraps.
            let divisor = right as i32;
            if right == 0.0 || divisor == 0 {
                Err(EvalError::DivisionByZero)
            } else {
                Ok((left as i32).wrapping_div(divisor) as f64)
            }
        }
    }
}

/// Parses and evaluates a formula body (without the leading `=`).
///
/// # Examples
///
/// ```
/// use gridcalc::domain::{evaluate, EvalError, EvalResult};
///
/// let mut cells = |name: &str| -> EvalResult<f64> {
///     match name {
///         "A1" => Ok(4.0),
///         other => Err(EvalError::OutOfRange(other.to_string())),
///     }
/// };
/// assert_eq!(evaluate("a1 ^ 2 + mmax(1, 7)", &mut cells), Ok(23.0));
/// assert_eq!(evaluate("1 / 0", &mut cells), Err(EvalError::DivisionByZero));
/// ```
pub fn evaluate<R: CellResolver + ?Sized>(expression: &str, resolver: &mut R) -> EvalResult<f64> {
    let ast = parse_expression(expression)?;
    ExpressionEvaluator::new(resolver).evaluate(&ast)
}
