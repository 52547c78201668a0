pub mod builtins;
pub mod scope;
mod solve;
#[cfg(test)]
mod tests;
pub mod value;

use crate::ast::*;
use crate::error::{Error, Result};
use crate::interpreter::scope::Scope;
use crate::interpreter::value::{Function, Value};
use crate::plot::{self, PlotRenderer};

use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, warn};

/// Deepest chain of nested function calls before evaluation gives up.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Deepest chain of nested node evaluations within one function body.
pub const MAX_EVAL_DEPTH: usize = 256;

const DEFAULT_PLOT_INCREMENT: f64 = 0.001;

/// Why evaluation of a node stopped early.
///
/// Loop and function boundaries catch the control-flow variants, everything
/// else carries an error to the caller of [`Interpreter::evaluate`].
#[derive(Debug)]
pub(crate) enum Unwind {
    Break,
    Continue,
    Return(Value),
    Fault(Error),
}

impl From<Error> for Unwind {
    fn from(e: Error) -> Self {
        Unwind::Fault(e)
    }
}

pub(crate) type Eval<T = Value> = std::result::Result<T, Unwind>;

enum Callee {
    User(Rc<Function>),
    Builtin(Keyword),
}

pub struct Interpreter {
    scope: Scope,
    saved: Option<Scope>,
    plotter: Rc<RefCell<dyn PlotRenderer>>,
    max_depth: usize,
    eval_depth: usize,
}

impl Interpreter {
    pub fn new(plotter: Rc<RefCell<dyn PlotRenderer>>) -> Self {
        Self {
            scope: Scope::new(),
            saved: None,
            plotter,
            max_depth: DEFAULT_MAX_DEPTH,
            eval_depth: 0,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Evaluate every statement in order and return the last value.
    pub fn run_program(&mut self, program: &Program) -> Result<Value> {
        let mut last = Value::Unit;
        for statement in &program.statements {
            last = self.evaluate(statement)?;
        }
        Ok(last)
    }

    /// Evaluate one top-level statement.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match self.eval(expr) {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Break) => Err(Error::syntax("'break' outside loop", None)),
            Err(Unwind::Continue) => Err(Error::syntax("'continue' outside loop", None)),
            Err(Unwind::Fault(e)) => Err(e),
        }
    }

    /// Remember the current bindings so a later [`rollback`](Self::rollback)
    /// can restore them.
    pub fn checkpoint(&mut self) {
        self.saved = Some(self.scope.clone());
    }

    /// Restore the bindings saved by the last checkpoint. Without a
    /// checkpoint this does nothing.
    pub fn rollback(&mut self) {
        if let Some(saved) = &self.saved {
            debug!("rolling back scope");
            self.scope = saved.clone();
        }
    }

    pub(crate) fn eval(&mut self, expr: &Expr) -> Eval {
        if self.eval_depth >= MAX_EVAL_DEPTH {
            return Err(Error::Recursion(MAX_EVAL_DEPTH).into());
        }
        self.eval_depth += 1;
        let result = self.eval_node(expr);
        self.eval_depth -= 1;
        result
    }

    fn eval_node(&mut self, expr: &Expr) -> Eval {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::String(s) => Ok(Value::String(s.clone())),
            Expr::Boolean(b) => Ok(Value::Boolean((*b).into())),

            Expr::Variable(name) => self.scope.get(name).ok_or_else(|| {
                Unwind::from(Error::Name(format!("Name \"{name}\" is not defined.")))
            }),

            Expr::BinaryOp { op, left, right } => {
                let lval = self.eval(left)?;
                let rval = self.eval(right)?;
                Ok(self.eval_binary_op(*op, lval, rval)?)
            }

            Expr::Comparison { op, left, right } => self.eval_comparison(*op, left, right),

            Expr::Logical { op, left, right } => {
                // both sides always run
                let lval = self.eval(left)?.truthy().get();
                let rval = self.eval(right)?.truthy().get();
                let result = match op {
                    LogicalOp::And => lval && rval,
                    LogicalOp::Or => lval || rval,
                };
                Ok(Value::Boolean(result.into()))
            }

            Expr::Not(operand) => Ok(Value::Boolean(!self.eval(operand)?.truthy())),
            Expr::ToBoolean(operand) => Ok(Value::Boolean(self.eval(operand)?.truthy())),

            Expr::Assign { target, value } => {
                let value = self.eval(value)?;
                self.scope.set_global(target.clone(), value.clone());
                Ok(value)
            }

            Expr::If(branches) => self.eval_if(branches),

            Expr::FunctionDecl { name, params, body } => {
                let function = Function {
                    name: name.clone(),
                    params: params.clone(),
                    body: body.clone(),
                };
                self.scope
                    .set_global(name.clone(), Value::Function(Rc::new(function)));

                if Keyword::lookup(name).is_some() {
                    warn!(%name, "built-in function overridden");
                    return Ok(Value::Warning(format!(
                        "Warning: Built-in function {name} has been overridden."
                    )));
                }
                Ok(Value::Unit)
            }

            Expr::Call { name, args } => self.eval_call(name, args),

            Expr::Repeat {
                count,
                counter,
                body,
            } => self.eval_repeat(count, counter, body),

            Expr::For {
                init,
                condition,
                update,
                body,
            } => {
                self.eval(init)?;
                loop {
                    if !self.eval(condition)?.truthy().get() {
                        break;
                    }
                    match self.eval_block(body) {
                        Ok(_) | Err(Unwind::Continue) => {}
                        Err(Unwind::Break) => break,
                        Err(other) => return Err(other),
                    }
                    self.eval(update)?;
                }
                Ok(Value::Unit)
            }

            Expr::Break => Err(Unwind::Break),
            Expr::Continue => Err(Unwind::Continue),
            Expr::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Unit,
                };
                Err(Unwind::Return(value))
            }

            Expr::Solve {
                equation,
                target,
                assign,
            } => self.eval_solve(equation, target, *assign),
        }
    }

    /// Value of the last statement, `Unit` for an empty block.
    fn eval_block(&mut self, body: &[Expr]) -> Eval {
        let mut last = Value::Unit;
        for stmt in body {
            last = self.eval(stmt)?;
        }
        Ok(last)
    }

    fn eval_binary_op(&self, op: BinOp, left: Value, right: Value) -> Result<Value> {
        match op {
            BinOp::Add => left + right,
            BinOp::Sub => left - right,
            BinOp::Mul => left * right,
            BinOp::Div => left / right,
            BinOp::Mod => left % right,
            BinOp::Pow => left.pow(right),
        }
    }

    fn eval_comparison(&mut self, op: CompareOp, left: &Expr, right: &Expr) -> Eval {
        // (a < b) < c  becomes  (a < b) and (b < c)
        if let Expr::Comparison { right: middle, .. } = left {
            let first = self.eval(left)?.truthy().get();
            let second = self.eval_comparison(op, middle, right)?.truthy().get();
            return Ok(Value::Boolean((first && second).into()));
        }

        let lval = self.eval(left)?;
        let rval = self.eval(right)?;

        use std::cmp::Ordering::*;
        let result = match op {
            CompareOp::Eq => lval == rval,
            CompareOp::Ne => lval != rval,
            CompareOp::Gt => lval.compare(&rval)? == Some(Greater),
            CompareOp::Lt => lval.compare(&rval)? == Some(Less),
            CompareOp::Ge => matches!(lval.compare(&rval)?, Some(Greater | Equal)),
            CompareOp::Le => matches!(lval.compare(&rval)?, Some(Less | Equal)),
        };
        Ok(Value::Boolean(result.into()))
    }

    fn eval_if(&mut self, branches: &[Branch]) -> Eval {
        for branch in branches {
            let taken = match &branch.condition {
                Some(condition) => self.eval(condition)?.truthy().get(),
                None => true,
            };
            if taken {
                return self.eval_block(&branch.body);
            }
        }
        Ok(Value::Unit)
    }

    fn eval_repeat(&mut self, count: &Expr, counter: &str, body: &[Expr]) -> Eval {
        let n = match self.eval(count)? {
            Value::Number(n) => n,
            other => {
                return Err(Error::Type(format!(
                    "rep expects a number of repetitions, got {}",
                    other.type_name()
                ))
                .into());
            }
        };
        if n.fract() != 0.0 || !n.is_finite() {
            return Err(Error::Type(format!(
                "rep expects a whole number of repetitions, got {n}"
            ))
            .into());
        }
        if n < 0.0 {
            return Err(Error::Value(format!("rep count cannot be negative, got {n}")).into());
        }

        for i in 0..n as u64 {
            self.scope
                .set_global(counter.to_string(), Value::Number(i as f64));
            match self.eval_block(body) {
                Ok(_) | Err(Unwind::Continue) => {}
                Err(Unwind::Break) => break,
                Err(other) => return Err(other),
            }
        }
        Ok(Value::Unit)
    }

    fn eval_call(&mut self, name: &str, args: &[Expr]) -> Eval {
        let function = match self.scope.global(name) {
            Some(Value::Function(function)) => function.clone(),
            Some(other) => {
                return Err(
                    Error::Type(format!("{} object is not callable", other.type_name())).into(),
                );
            }
            None => {
                return match Keyword::lookup(name) {
                    Some(keyword) => self.eval_keyword(keyword, args),
                    None => Err(Error::Name(format!("No function found with name {name}")).into()),
                };
            }
        };

        if function.params.len() != args.len() {
            return Err(Error::Type(format!(
                "Expected {} arguments for function {name}, got {}.",
                function.params.len(),
                args.len()
            ))
            .into());
        }

        let values = args
            .iter()
            .map(|arg| self.eval(arg))
            .collect::<Eval<Vec<_>>>()?;

        self.invoke(&function, values)
    }

    /// Run a user function in a fresh local frame.
    fn invoke(&mut self, function: &Function, values: Vec<Value>) -> Eval {
        if self.scope.depth() >= self.max_depth {
            return Err(Error::Recursion(self.max_depth).into());
        }
        debug!(name = %function.name, depth = self.scope.depth() + 1, "call");

        let frame = function.params.iter().cloned().zip(values).collect();
        self.scope.push_frame(frame);
        // A body starts its own node count; call depth bounds the total.
        let caller_depth = std::mem::replace(&mut self.eval_depth, 0);
        let result = self.eval_block(&function.body);
        self.eval_depth = caller_depth;
        self.scope.pop_frame();

        match result {
            Ok(value) | Err(Unwind::Return(value)) => Ok(value),
            Err(Unwind::Break) => Err(Error::syntax("'break' outside loop", None).into()),
            Err(Unwind::Continue) => Err(Error::syntax("'continue' outside loop", None).into()),
            Err(fault) => Err(fault),
        }
    }

    fn eval_keyword(&mut self, keyword: Keyword, args: &[Expr]) -> Eval {
        if keyword == Keyword::Plot {
            return self.eval_plot(args);
        }
        if args.len() != 1 {
            return Err(Error::Type(format!(
                "Expected 1 argument for function {keyword}, got {}.",
                args.len()
            ))
            .into());
        }
        let value = self.eval(&args[0])?;
        Ok(builtins::math::call(keyword, &[value])?)
    }

    /// `plot(f, lower, upper[, increment])`
    fn eval_plot(&mut self, args: &[Expr]) -> Eval {
        if !(3..=4).contains(&args.len()) {
            return Err(Error::Type(format!(
                "Expected 3 to 4 arguments for function plot, got {}.",
                args.len()
            ))
            .into());
        }

        // The function is passed by name, not evaluated.
        let name = match &args[0] {
            Expr::Variable(name) => name.clone(),
            other => {
                return Err(Error::Type(format!(
                    "plot expects a function name as its first argument, got {}",
                    other.kind_name()
                ))
                .into());
            }
        };

        let mut range = Vec::with_capacity(3);
        for arg in &args[1..] {
            match self.eval(arg)? {
                Value::Number(n) => range.push(n),
                other => {
                    return Err(Error::Type(format!(
                        "plot range arguments must be numbers, got {}",
                        other.type_name()
                    ))
                    .into());
                }
            }
        }
        let increment = range.get(2).copied().unwrap_or(DEFAULT_PLOT_INCREMENT);
        let xs = plot::sample_range(range[0], range[1], increment)?;

        let callee = self.plot_target(&name)?;
        let mut ys = Vec::with_capacity(xs.len());
        for &x in &xs {
            let y = match &callee {
                Callee::User(function) => self.invoke(function, vec![Value::Number(x)])?,
                Callee::Builtin(keyword) => builtins::math::call(*keyword, &[Value::Number(x)])?,
            };
            match y {
                Value::Number(y) => ys.push(y),
                other => {
                    return Err(Error::Type(format!(
                        "{name}({x}) returned {}, expected a number",
                        other.type_name()
                    ))
                    .into());
                }
            }
        }

        debug!(%name, samples = xs.len(), "plot");
        self.plotter.borrow_mut().render(&name, &xs, &ys);
        Ok(Value::Unit)
    }

    fn plot_target(&self, name: &str) -> Result<Callee> {
        let unary_only =
            || Error::Type("Only functions with exactly one argument can be plotted.".to_string());

        match self.scope.global(name) {
            Some(Value::Function(function)) if function.params.len() == 1 => {
                Ok(Callee::User(function.clone()))
            }
            Some(Value::Function(_)) => Err(unary_only()),
            Some(other) => Err(Error::Type(format!(
                "{} object is not callable",
                other.type_name()
            ))),
            None => match Keyword::lookup(name) {
                Some(Keyword::Plot) => Err(unary_only()),
                Some(keyword) => Ok(Callee::Builtin(keyword)),
                None => Err(Error::Name(format!("No function found with name {name}"))),
            },
        }
    }
}
