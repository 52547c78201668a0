use crate::ast::parser::parse_program;
use crate::ast::{BinOp, Expr};
use crate::error::Error;
use crate::interpreter::value::Value;
use crate::interpreter::{DEFAULT_MAX_DEPTH, Interpreter, MAX_EVAL_DEPTH};
use crate::plot::PlotRenderer;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Recorder {
    plots: Vec<(String, Vec<f64>, Vec<f64>)>,
}

impl PlotRenderer for Recorder {
    fn render(&mut self, name: &str, xs: &[f64], ys: &[f64]) {
        self.plots.push((name.to_string(), xs.to_vec(), ys.to_vec()));
    }
}

fn interpreter() -> Interpreter {
    Interpreter::new(Rc::new(RefCell::new(Recorder::default())))
}

fn run(source: &str) -> crate::Result<Value> {
    let program = parse_program(source)?;
    interpreter().run_program(&program)
}

/// Runs `f` on a thread with a generous stack, for tests that nest deeply.
fn on_large_stack<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    std::thread::Builder::new()
        .stack_size(64 * 1024 * 1024)
        .spawn(f)?
        .join()
        .map_err(|_| anyhow::anyhow!("evaluation thread panicked"))
}

fn number(value: Value) -> f64 {
    match value {
        Value::Number(n) => n,
        other => panic!("expected a number, got {other:?}"),
    }
}

#[test]
fn test_arithmetic_precedence() -> anyhow::Result<()> {
    assert_eq!(run("2 + 3 * 4 ^ 2")?, Value::Number(50.0));
    assert_eq!(run("(2 + 3) * 4")?, Value::Number(20.0));
    assert_eq!(run("-2^2")?, Value::Number(-4.0));
    assert_eq!(run("10 - 4 - 3")?, Value::Number(3.0));
    assert_eq!(run("-7 % 3")?, Value::Number(2.0));
    assert_eq!(run("1 / 0")?, Value::Number(f64::INFINITY));
    Ok(())
}

#[test]
fn test_juxtaposition() -> anyhow::Result<()> {
    assert_eq!(run("x = 3\n2x")?, Value::Number(6.0));
    assert!((number(run("2pi")?) - 2.0 * std::f64::consts::PI).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_assignment() -> anyhow::Result<()> {
    assert_eq!(run("x = 5")?, Value::Number(5.0));
    assert_eq!(run("x = y = 2\nx + y")?, Value::Number(4.0));
    assert_eq!(run("x = 5\nx += 2\nx *= 3\nx")?, Value::Number(21.0));
    assert_eq!(run("x = 5\nx %= 3\nx")?, Value::Number(2.0));
    assert_eq!(run("n = 1\nn++\nn++\nn--\nn")?, Value::Number(2.0));
    Ok(())
}

#[test]
fn test_comparisons() -> anyhow::Result<()> {
    let t = Value::Boolean(true.into());
    let f = Value::Boolean(false.into());

    assert_eq!(run("1 < 2 < 3")?, t);
    assert_eq!(run("1 < 3 < 2")?, f);
    assert_eq!(run("3 > 2 >= 2")?, t);
    assert_eq!(run("2 == 2")?, t);
    assert_eq!(run("2 != 2")?, f);
    assert_eq!(run("true == 1")?, t);
    assert_eq!(run("\"b\" > \"a\"")?, t);
    assert_eq!(run("\"a\" == 1")?, f);
    assert_eq!(run("(1 < 2) and not (3 < 2)")?, t);
    assert_eq!(run("0 or \"\"")?, f);

    assert!(matches!(run("\"a\" < 1"), Err(Error::Type(_))));
    Ok(())
}

#[test]
fn test_undefined_variable() {
    assert_eq!(
        run("foo + 1"),
        Err(Error::Name("Name \"foo\" is not defined.".into()))
    );
}

#[test]
fn test_string_arithmetic() {
    assert_eq!(
        run("\"a\" + 1"),
        Err(Error::Type(
            "Cannot use mathematical operations on object of type string".into()
        ))
    );
}

#[test]
fn test_keywords() -> anyhow::Result<()> {
    assert_eq!(run("factorial(5)")?, Value::Number(120.0));
    assert_eq!(run("factorial.5")?, Value::Number(120.0));
    assert_eq!(run("sqrt(16)")?, Value::Number(4.0));
    assert_eq!(run("abs(-3)")?, Value::Number(3.0));
    assert_eq!(run("fraction(0.5)")?, Value::String("1/2".into()));
    assert_eq!(run("bool(\"\")")?, Value::Boolean(false.into()));
    assert!(number(run("sin(pi)")?).abs() < 1e-12);

    assert_eq!(
        run("sqrt(-1)"),
        Err(Error::Value("math domain error".into()))
    );
    assert_eq!(
        run("sin(1, 2)"),
        Err(Error::Type("Expected 1 argument for function sin, got 2.".into()))
    );
    assert!(matches!(run("factorial(2.5)"), Err(Error::Type(_))));
    assert!(matches!(run("factorial(-1)"), Err(Error::Value(_))));
    Ok(())
}

#[test]
fn test_function_declaration_and_call() -> anyhow::Result<()> {
    assert_eq!(run("func add a b => a + b\nadd(2, 3)")?, Value::Number(5.0));
    assert_eq!(run("func sq x { x ^ 2 }\nsq.4")?, Value::Number(16.0));
    assert_eq!(
        run("func area w h =>\n    s = w * h\n    s / 2\nend\narea(3, 4)")?,
        Value::Number(6.0)
    );
    Ok(())
}

#[test]
fn test_parameters_do_not_leak() {
    assert_eq!(
        run("func f x => x * 2\nf(5)\nx"),
        Err(Error::Name("Name \"x\" is not defined.".into()))
    );
}

#[test]
fn test_assignment_inside_function_is_global() -> anyhow::Result<()> {
    assert_eq!(run("func g a { y = a }\ng(7)\ny")?, Value::Number(7.0));
    Ok(())
}

#[test]
fn test_call_errors() {
    assert_eq!(
        run("nope(1)"),
        Err(Error::Name("No function found with name nope".into()))
    );
    assert_eq!(
        run("x = 3\nx(2)"),
        Err(Error::Type("number object is not callable".into()))
    );
    assert_eq!(
        run("func f a b => a + b\nf(1)"),
        Err(Error::Type(
            "Expected 2 arguments for function f, got 1.".into()
        ))
    );
}

#[test]
fn test_override_keyword() -> anyhow::Result<()> {
    let program = parse_program("func sin x => x * 2")?;
    let mut interpreter = interpreter();

    assert_eq!(
        interpreter.run_program(&program)?,
        Value::Warning("Warning: Built-in function sin has been overridden.".into())
    );
    assert_eq!(
        interpreter.run_program(&parse_program("sin(3)")?)?,
        Value::Number(6.0)
    );
    Ok(())
}

#[test]
fn test_if() -> anyhow::Result<()> {
    let source = "
        func sign n {
            if n > 0 { 1 }
            or n < 0 { -1 }
            else { 0 }
        }
        sign(-4) * 10 + sign(0) + sign(9)
    ";
    assert_eq!(run(source)?, Value::Number(-9.0));
    assert_eq!(run("if false { 1 }")?, Value::Unit);
    assert_eq!(run("if 0 { 1 } or 0 { 2 }")?, Value::Unit);
    assert_eq!(run("if 1 => 2")?, Value::Number(2.0));
    Ok(())
}

#[test]
fn test_postfix_if() -> anyhow::Result<()> {
    assert_eq!(run("1 if true else 2")?, Value::Number(1.0));
    assert_eq!(run("1 if 0 else 2")?, Value::Number(2.0));
    assert_eq!(run("1 if 0")?, Value::Unit);
    Ok(())
}

#[test]
fn test_recursion() -> anyhow::Result<()> {
    let source = "
        func fact n {
            if n <= 1 { 1 }
            else { n * fact(n - 1) }
        }
        fact(10)
    ";
    assert_eq!(run(source)?, Value::Number(3628800.0));
    Ok(())
}

#[test]
fn test_recursion_limit() -> anyhow::Result<()> {
    let program = parse_program("func f n => f(n + 1)\nf(0)")?;
    let result = interpreter().with_max_depth(10).run_program(&program);
    assert_eq!(result, Err(Error::Recursion(10)));

    let program = parse_program("func down n => 0 if n == 0 else down(n - 1)\ndown(9)")?;
    assert_eq!(
        interpreter().with_max_depth(10).run_program(&program)?,
        Value::Number(0.0)
    );

    Ok(())
}

#[test]
fn test_call_limit_not_shadowed_by_node_limit() -> anyhow::Result<()> {
    // Each call nests several nodes, so this goes deeper than MAX_EVAL_DEPTH
    // in total.
    let results = on_large_stack(|| -> crate::Result<(f64, crate::Result<()>)> {
        let fact = "func fact n {\n if n <= 1 { 1 }\n else { n * fact(n - 1) }\n}\n";
        let within = number(run(&format!("{fact}fact(60)"))?);
        let beyond = run(&format!("{fact}fact(100)")).map(|_| ());
        Ok((within, beyond))
    })?;

    let (within, beyond) = results?;
    assert!(within > 1e80);
    assert_eq!(beyond, Err(Error::Recursion(DEFAULT_MAX_DEPTH)));
    Ok(())
}

#[test]
fn test_return() -> anyhow::Result<()> {
    let source = "
        func first_over limit {
            for i = 0, i < 100, i++ {
                if i * i > limit { return i }
            }
            return
        }
        first_over(50)
    ";
    assert_eq!(run(source)?, Value::Number(8.0));
    assert_eq!(run("return 5")?, Value::Number(5.0));
    Ok(())
}

#[test]
fn test_for_with_break_and_continue() -> anyhow::Result<()> {
    let source = "
        total = 0
        for i = 0, i < 10, i++ {
            if i == 5 { break }
            if i % 2 == 0 { continue }
            total += i
        }
        total
    ";
    assert_eq!(run(source)?, Value::Number(4.0));
    Ok(())
}

#[test]
fn test_rep() -> anyhow::Result<()> {
    assert_eq!(run("total = 0\nrep 4 as k { total += k }\ntotal")?, Value::Number(6.0));
    assert_eq!(run("rep 3 { 1 }\n_c")?, Value::Number(2.0));
    assert_eq!(run("n = 0\nrep 0 { n++ }\nn")?, Value::Number(0.0));
    assert_eq!(run("rep 2 { 1 }")?, Value::Unit);

    assert!(matches!(run("rep 2.5 { 1 }"), Err(Error::Type(_))));
    assert!(matches!(run("rep \"x\" { 1 }"), Err(Error::Type(_))));
    assert!(matches!(run("rep -1 { 1 }"), Err(Error::Value(_))));
    Ok(())
}

#[test]
fn test_loop_control_outside_loop() {
    assert_eq!(
        run("break"),
        Err(Error::syntax("'break' outside loop", None))
    );
    assert_eq!(
        run("func f => continue\nrep 2 { f() }"),
        Err(Error::syntax("'continue' outside loop", None))
    );
}

#[test]
fn test_solve() -> anyhow::Result<()> {
    let root = number(run("x^2 == 2 solve x")?);
    assert!((root - 2f64.sqrt()).abs() < 1e-8);

    // plain solve leaves x alone
    assert!(matches!(run("x^2 == 2 solve x\nx"), Err(Error::Name(_))));

    let assigned = number(run("x^2 - 4 solve! x\nx")?);
    assert!((assigned - 2.0).abs() < 1e-8);

    assert_eq!(
        run("x^2 == -1 solve x"),
        Err(Error::Value("No solution found for x".into()))
    );
    Ok(())
}

#[test]
fn test_solve_starts_from_current_value() -> anyhow::Result<()> {
    let root = number(run("x = -3\nx^2 == 2 solve x")?);
    assert!((root + 2f64.sqrt()).abs() < 1e-8);
    Ok(())
}

#[test]
fn test_plot() -> anyhow::Result<()> {
    let recorder = Rc::new(RefCell::new(Recorder::default()));
    let mut interpreter = Interpreter::new(recorder.clone());

    let program = parse_program("func sq x => x^2\nplot(sq, 0, 1, 0.5)")?;
    assert_eq!(interpreter.run_program(&program)?, Value::Unit);
    interpreter.run_program(&parse_program("plot(sin, 0, 1)")?)?;

    let recorder = recorder.borrow();
    let plots = &recorder.plots;
    assert_eq!(plots.len(), 2);
    assert_eq!(plots[0].0, "sq");
    assert_eq!(plots[0].1, vec![0.0, 0.5, 1.0]);
    assert_eq!(plots[0].2, vec![0.0, 0.25, 1.0]);
    assert_eq!(plots[1].0, "sin");
    assert!(plots[1].1.len() > 990);
    Ok(())
}

#[test]
fn test_plot_errors() {
    assert_eq!(
        run("plot(sin, 0, 1, 0.00001)"),
        Err(Error::Value(
            "Plotting increment can not be less than 0.0001".into()
        ))
    );
    assert_eq!(
        run("func add a b => a + b\nplot(add, 0, 1)"),
        Err(Error::Type(
            "Only functions with exactly one argument can be plotted.".into()
        ))
    );
    assert_eq!(
        run("plot(sin, 0)"),
        Err(Error::Type(
            "Expected 3 to 4 arguments for function plot, got 2.".into()
        ))
    );
    assert!(matches!(run("plot(1, 0, 1)"), Err(Error::Type(_))));
    assert!(matches!(
        run("func s x => \"a\"\nplot(s, 0, 1)"),
        Err(Error::Type(_))
    ));
}

#[test]
fn test_rollback() -> anyhow::Result<()> {
    let mut interpreter = interpreter();
    interpreter.run_program(&parse_program("x = 1")?)?;

    interpreter.checkpoint();
    let failing = parse_program("x = 2\ny = 5\nundefined + 1")?;
    assert!(interpreter.run_program(&failing).is_err());

    // writes made before the failure are still visible until rolled back
    assert_eq!(interpreter.scope().get("y"), Some(Value::Number(5.0)));

    interpreter.rollback();
    assert_eq!(interpreter.scope().get("x"), Some(Value::Number(1.0)));
    assert_eq!(interpreter.scope().get("y"), None);
    Ok(())
}

#[test]
fn test_rollback_without_checkpoint() -> anyhow::Result<()> {
    let mut interpreter = interpreter();
    interpreter.run_program(&parse_program("x = 1")?)?;
    interpreter.rollback();
    assert_eq!(interpreter.scope().get("x"), Some(Value::Number(1.0)));
    Ok(())
}

#[test]
fn test_constants() -> anyhow::Result<()> {
    assert_eq!(run("pi")?, Value::Number(std::f64::consts::PI));
    assert!((number(run("golden ^ 2 - golden")?) - 1.0).abs() < 1e-12);
    Ok(())
}

#[test]
fn test_logical_operators_evaluate_both_sides() -> anyhow::Result<()> {
    assert_eq!(run("x = 0\n(1 < 0) and (x = 1)\nx")?, Value::Number(1.0));
    assert_eq!(run("y = 0\n(1 < 2) or (y = 2)\ny")?, Value::Number(2.0));
    Ok(())
}

#[test]
fn test_long_sum_fails_cleanly() -> anyhow::Result<()> {
    let long_sum = format!("{}1", "1+".repeat(9_999));
    assert!(matches!(run(&long_sum), Err(Error::Syntax { .. })));

    let sum = format!("{}1", "1+".repeat(99));
    assert_eq!(run(&sum)?, Value::Number(100.0));
    Ok(())
}

#[test]
fn test_evaluation_depth_limit() -> anyhow::Result<()> {
    let (too_deep, shallow) = on_large_stack(|| {
        let mut expr = Expr::Number(1.0);
        for _ in 0..MAX_EVAL_DEPTH + 50 {
            expr = Expr::binary(BinOp::Add, expr, Expr::Number(1.0));
        }
        let too_deep = interpreter().evaluate(&expr).map(number);

        let mut expr = Expr::Number(0.0);
        for _ in 0..MAX_EVAL_DEPTH / 2 {
            expr = Expr::binary(BinOp::Add, expr, Expr::Number(1.0));
        }
        let shallow = interpreter().evaluate(&expr).map(number);
        (too_deep, shallow)
    })?;

    assert_eq!(too_deep, Err(Error::Recursion(MAX_EVAL_DEPTH)));
    assert_eq!(shallow, Ok((MAX_EVAL_DEPTH / 2) as f64));
    Ok(())
}
