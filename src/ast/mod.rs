pub mod parser;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum Expr {
    // Literal values
    Number(f64),
    String(String),
    Boolean(bool),

    // Variable references, resolved when evaluated
    Variable(String),

    // Arithmetic: both operands must be numbers
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    // a < b < c stays nested here and is unfolded by the evaluator
    Comparison {
        op: CompareOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    Not(Box<Expr>),

    // A parenthesized comparison
    ToBoolean(Box<Expr>),

    // x = 5, x += 2, x++ (always a global write)
    Assign {
        target: String,
        value: Box<Expr>,
    },

    If(Vec<Branch>),

    FunctionDecl {
        name: String,
        params: Vec<String>,
        body: Vec<Expr>,
    },

    // User function or built-in keyword, decided at evaluation time
    Call {
        name: String,
        args: Vec<Expr>,
    },

    Repeat {
        count: Box<Expr>,
        counter: String,
        body: Vec<Expr>,
    },

    For {
        init: Box<Expr>,
        condition: Box<Expr>,
        update: Box<Expr>,
        body: Vec<Expr>,
    },

    Break,
    Continue,
    Return(Option<Box<Expr>>),

    // x^2 == 2 solve x
    Solve {
        equation: Box<Expr>,
        target: String,
        assign: bool,
    },
}

impl Expr {
    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn assign(target: impl Into<String>, value: Expr) -> Self {
        Expr::Assign {
            target: target.into(),
            value: Box::new(value),
        }
    }

    /// Short name of the node kind, used in syntax error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Number(_) => "number",
            Expr::String(_) => "string",
            Expr::Boolean(_) => "boolean",
            Expr::Variable(_) => "variable",
            Expr::BinaryOp { .. } => "operation",
            Expr::Comparison { .. } => "comparison",
            Expr::Logical { .. } => "logical operation",
            Expr::Not(_) | Expr::ToBoolean(_) => "boolean expression",
            Expr::Assign { .. } => "assignment",
            Expr::If(_) => "if expression",
            Expr::FunctionDecl { .. } => "function declaration",
            Expr::Call { .. } => "function call",
            Expr::Repeat { .. } | Expr::For { .. } => "loop",
            Expr::Break | Expr::Continue | Expr::Return(_) => "control statement",
            Expr::Solve { .. } => "solve expression",
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    If,
    ElseIf,
    Else,
}

/// One arm of an if chain. `Else` arms carry no condition.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Branch {
    pub kind: BranchKind,
    pub condition: Option<Expr>,
    pub body: Vec<Expr>,
}

/// Built-in functions. User declarations may shadow them.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Abs,
    Sqrt,
    Factorial,
    Bool,
    Fraction,
    Plot,
}

lazy_static::lazy_static! {
    static ref KEYWORDS: HashMap<&'static str, Keyword> = Keyword::ALL
        .iter()
        .map(|k| (k.name(), *k))
        .collect();
}

impl Keyword {
    pub const ALL: [Keyword; 12] = [
        Keyword::Sin,
        Keyword::Cos,
        Keyword::Tan,
        Keyword::Asin,
        Keyword::Acos,
        Keyword::Atan,
        Keyword::Abs,
        Keyword::Sqrt,
        Keyword::Factorial,
        Keyword::Bool,
        Keyword::Fraction,
        Keyword::Plot,
    ];

    pub fn lookup(name: &str) -> Option<Keyword> {
        KEYWORDS.get(name).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Keyword::Sin => "sin",
            Keyword::Cos => "cos",
            Keyword::Tan => "tan",
            Keyword::Asin => "asin",
            Keyword::Acos => "acos",
            Keyword::Atan => "atan",
            Keyword::Abs => "abs",
            Keyword::Sqrt => "sqrt",
            Keyword::Factorial => "factorial",
            Keyword::Bool => "bool",
            Keyword::Fraction => "fraction",
            Keyword::Plot => "plot",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Program {
    pub statements: Vec<Expr>,
}
