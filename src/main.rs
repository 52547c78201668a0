use anyhow::{Context, Result};
use calx::ast::parser::parse_program;
use calx::interpreter::value::Value;
use calx::interpreter::{DEFAULT_MAX_DEPTH, Interpreter};
use calx::lexer::{TokenKind, tokenize};
use calx::plot::TextPlot;

use clap::Parser;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use yansi::Paint;

/// Calculator language with functions, loops, plotting and an equation solver.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Script to run. Starts an interactive session when omitted.
    file: Option<PathBuf>,

    /// Print the parsed program as JSON instead of running it
    #[arg(long)]
    ast: bool,

    /// Maximum depth of nested function calls
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    #[arg(long, default_value_t = 72)]
    plot_width: usize,

    #[arg(long, default_value_t = 24)]
    plot_height: usize,

    /// Log parser and evaluator activity to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let plotter = Rc::new(RefCell::new(TextPlot::new(
        io::stdout(),
        args.plot_width,
        args.plot_height,
    )));
    let mut interpreter = Interpreter::new(plotter).with_max_depth(args.max_depth);

    match &args.file {
        Some(path) => run_file(&mut interpreter, path, args.ast),
        None => run_repl(&mut interpreter, args.ast),
    }
}

fn run_file(interpreter: &mut Interpreter, path: &Path, dump_ast: bool) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read program file '{}'", path.display()))?;
    let program = parse_program(&source)?;

    if dump_ast {
        println!("{}", serde_json::to_string_pretty(&program)?);
        return Ok(());
    }

    for statement in &program.statements {
        let value = interpreter.evaluate(statement)?;
        print_value(&value);
    }
    Ok(())
}

fn run_repl(interpreter: &mut Interpreter, dump_ast: bool) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut pending = PendingInput::default();

    loop {
        let prompt = if pending.is_empty() { ">>> " } else { "... " };
        match editor.readline(prompt) {
            Ok(line) => {
                if let Some(input) = pending.push_line(&line) {
                    submit(&mut editor, interpreter, &input, dump_ast);
                }
            }
            // Ctrl-C drops the pending input
            Err(ReadlineError::Interrupted) => pending.discard(),
            Err(ReadlineError::Eof) => {
                if !pending.is_empty() {
                    let input = pending.take();
                    submit(&mut editor, interpreter, &input, dump_ast);
                }
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}

fn submit(editor: &mut DefaultEditor, interpreter: &mut Interpreter, input: &str, dump_ast: bool) {
    if input.trim().is_empty() {
        return;
    }
    if let Err(e) = editor.add_history_entry(input.trim_end()) {
        warn!(error = %e, "failed to record history entry");
    }
    if let Err(e) = execute(interpreter, input, dump_ast) {
        eprintln!("{}", e.red());
    }
}

/// Run one REPL entry. A failing statement rolls the scope back to how it was
/// before that statement started.
fn execute(interpreter: &mut Interpreter, input: &str, dump_ast: bool) -> Result<()> {
    let program = parse_program(input)?;

    if dump_ast {
        println!("{}", serde_json::to_string_pretty(&program)?);
        return Ok(());
    }

    for statement in &program.statements {
        interpreter.checkpoint();
        match interpreter.evaluate(statement) {
            Ok(value) => print_value(&value),
            Err(e) => {
                interpreter.rollback();
                return Err(e.into());
            }
        }
    }
    Ok(())
}

fn print_value(value: &Value) {
    match value {
        Value::Unit => {}
        Value::Warning(message) => println!("{}", message.yellow()),
        other => println!("{other}"),
    }
}

#[derive(Debug, PartialEq)]
enum EntryStatus {
    /// A `{` or multi-line `=>` block is still open.
    Open,
    /// The last statement is an if chain that an `or`/`else` line may extend.
    AwaitingElse,
    Complete,
}

/// Classifies REPL input. Input that doesn't tokenize counts as complete so
/// the parser can report the problem.
fn entry_status(source: &str) -> EntryStatus {
    let Ok(tokens) = tokenize(source) else {
        return EntryStatus::Complete;
    };

    let mut open = 0i64;
    let mut head = None;
    let mut last_head = None;
    let mut kinds = tokens.iter().map(|t| t.kind).peekable();
    while let Some(kind) = kinds.next() {
        if open <= 0 {
            if kind == TokenKind::LineBreak {
                head = None;
                continue;
            }
            if head.is_none() {
                head = Some(kind);
                last_head = head;
            }
        }
        match kind {
            TokenKind::LCurly => open += 1,
            TokenKind::RCurly | TokenKind::BlockEnd => open -= 1,
            TokenKind::Arrow if matches!(kinds.peek(), None | Some(TokenKind::LineBreak)) => {
                open += 1
            }
            _ => {}
        }
    }

    if open > 0 {
        EntryStatus::Open
    } else if matches!(last_head, Some(TokenKind::If | TokenKind::Or)) {
        EntryStatus::AwaitingElse
    } else {
        EntryStatus::Complete
    }
}

/// Lines typed so far for the REPL entry being composed.
#[derive(Default)]
struct PendingInput {
    source: String,
    awaiting_else: bool,
}

impl PendingInput {
    fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Add a typed line and return the finished entry, if any. An if chain is
    /// held until the next line shows whether it continues with `or`/`else`;
    /// an empty line submits it as is.
    fn push_line(&mut self, line: &str) -> Option<String> {
        if self.awaiting_else && line.trim().is_empty() {
            return Some(self.take());
        }

        self.source.push_str(line);
        self.source.push('\n');
        match entry_status(&self.source) {
            EntryStatus::Open => {
                self.awaiting_else = false;
                None
            }
            EntryStatus::AwaitingElse => {
                self.awaiting_else = true;
                None
            }
            EntryStatus::Complete => Some(self.take()),
        }
    }

    fn take(&mut self) -> String {
        self.awaiting_else = false;
        std::mem::take(&mut self.source)
    }

    fn discard(&mut self) {
        self.source = String::new();
        self.awaiting_else = false;
    }
}
