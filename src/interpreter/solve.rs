use crate::ast::{CompareOp, Expr};
use crate::error::Error;
use crate::interpreter::value::Value;
use crate::interpreter::{Eval, Interpreter};

use tracing::debug;

const MAX_ITERATIONS: usize = 100;
const TOLERANCE: f64 = 1e-10;

impl Interpreter {
    /// Newton's method on `equation` as a function of `target`.
    ///
    /// `lhs == rhs` is solved as `lhs - rhs = 0`, anything else as `expr = 0`.
    pub(super) fn eval_solve(&mut self, equation: &Expr, target: &str, assign: bool) -> Eval {
        let mut x = match self.scope.get(target) {
            Some(Value::Number(n)) if n.is_finite() => n,
            _ => 1.0,
        };
        let no_solution = || Error::Value(format!("No solution found for {target}"));

        for iteration in 0..MAX_ITERATIONS {
            let fx = self.residual(equation, target, x)?;
            if !fx.is_finite() {
                break;
            }
            if fx.abs() < TOLERANCE {
                debug!(%target, root = x, iteration, "solved");
                if assign {
                    self.scope.set_global(target.to_string(), Value::Number(x));
                }
                return Ok(Value::Number(x));
            }

            let h = 1e-7 * x.abs().max(1.0);
            let slope = (self.residual(equation, target, x + h)?
                - self.residual(equation, target, x - h)?)
                / (2.0 * h);
            if slope == 0.0 || !slope.is_finite() {
                break;
            }
            x -= fx / slope;
        }

        Err(no_solution().into())
    }

    /// Value of the equation with `target` bound to `x` in a temporary frame.
    fn residual(&mut self, equation: &Expr, target: &str, x: f64) -> Eval<f64> {
        self.scope.push_frame(self.scope.locals());
        self.scope.bind_local(target.to_string(), Value::Number(x));

        let result = match equation {
            Expr::Comparison {
                op: CompareOp::Eq,
                left,
                right,
            } => self.eval(left).and_then(|lhs| {
                let rhs = self.eval(right)?;
                Ok((lhs - rhs)?)
            }),
            other => self.eval(other),
        };
        self.scope.pop_frame();

        match result? {
            Value::Number(n) => Ok(n),
            other => Err(Error::Type(format!(
                "Cannot solve an equation of type {}",
                other.type_name()
            ))
            .into()),
        }
    }
}
