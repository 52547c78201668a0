use crate::error::{Error, Position, Result};

use pest::Parser;
use pest::iterators::Pair;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(pest_derive::Parser)]
#[grammar = "lexer/grammar.pest"]
struct TokenGrammar;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Number,
    String,
    Identifier,
    LineBreak,

    // Arithmetic
    Plus,
    Minus,
    Mult,
    Div,
    Modulus,
    Exp,

    // Assignment
    Equals,
    PlusAssign,
    MinusAssign,
    MultAssign,
    DivAssign,
    ModulusAssign,
    DoublePlus,
    DoubleMinus,

    // Comparison
    CompEquals,
    CompNotEquals,
    Greater,
    Less,
    GreaterOrEquals,
    LessOrEquals,

    // Logic
    And,
    Or,
    Not,
    True,
    False,

    // Keywords
    If,
    Else,
    Function,
    Return,
    Break,
    Continue,
    Rep,
    As,
    For,
    Solve,
    SolveAssign,

    // Punctuation
    Arrow,
    BlockEnd,
    LParen,
    RParen,
    LCurly,
    RCurly,
    Comma,
    Period,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::Number => "NUMBER",
            TokenKind::String => "STRING",
            TokenKind::Identifier => "IDENTIFIER",
            TokenKind::LineBreak => "LINEBREAK",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Mult => "'*'",
            TokenKind::Div => "'/'",
            TokenKind::Modulus => "'%'",
            TokenKind::Exp => "'^'",
            TokenKind::Equals => "'='",
            TokenKind::PlusAssign => "'+='",
            TokenKind::MinusAssign => "'-='",
            TokenKind::MultAssign => "'*='",
            TokenKind::DivAssign => "'/='",
            TokenKind::ModulusAssign => "'%='",
            TokenKind::DoublePlus => "'++'",
            TokenKind::DoubleMinus => "'--'",
            TokenKind::CompEquals => "'=='",
            TokenKind::CompNotEquals => "'!='",
            TokenKind::Greater => "'>'",
            TokenKind::Less => "'<'",
            TokenKind::GreaterOrEquals => "'>='",
            TokenKind::LessOrEquals => "'<='",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Not => "'not'",
            TokenKind::True => "'true'",
            TokenKind::False => "'false'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::Function => "'func'",
            TokenKind::Return => "'return'",
            TokenKind::Break => "'break'",
            TokenKind::Continue => "'continue'",
            TokenKind::Rep => "'rep'",
            TokenKind::As => "'as'",
            TokenKind::For => "'for'",
            TokenKind::Solve => "'solve'",
            TokenKind::SolveAssign => "'solve!'",
            TokenKind::Arrow => "'=>'",
            TokenKind::BlockEnd => "'end'",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::LCurly => "'{'",
            TokenKind::RCurly => "'}'",
            TokenKind::Comma => "','",
            TokenKind::Period => "'.'",
        };
        f.write_str(name)
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum TokenValue {
    Number(f64),
    String(String),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub value: Option<TokenValue>,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self {
            kind,
            value: None,
            position,
        }
    }
}

lazy_static::lazy_static! {
    static ref RESERVED: HashMap<&'static str, TokenKind> = HashMap::from([
        ("and", TokenKind::And),
        ("or", TokenKind::Or),
        ("not", TokenKind::Not),
        ("true", TokenKind::True),
        ("false", TokenKind::False),
        ("if", TokenKind::If),
        ("else", TokenKind::Else),
        ("func", TokenKind::Function),
        ("return", TokenKind::Return),
        ("break", TokenKind::Break),
        ("continue", TokenKind::Continue),
        ("rep", TokenKind::Rep),
        ("as", TokenKind::As),
        ("for", TokenKind::For),
        ("end", TokenKind::BlockEnd),
        ("solve", TokenKind::Solve),
    ]);

    static ref SYMBOLS: HashMap<&'static str, TokenKind> = HashMap::from([
        ("=>", TokenKind::Arrow),
        ("==", TokenKind::CompEquals),
        ("!=", TokenKind::CompNotEquals),
        (">=", TokenKind::GreaterOrEquals),
        ("<=", TokenKind::LessOrEquals),
        ("++", TokenKind::DoublePlus),
        ("--", TokenKind::DoubleMinus),
        ("+=", TokenKind::PlusAssign),
        ("-=", TokenKind::MinusAssign),
        ("*=", TokenKind::MultAssign),
        ("/=", TokenKind::DivAssign),
        ("%=", TokenKind::ModulusAssign),
        ("+", TokenKind::Plus),
        ("-", TokenKind::Minus),
        ("*", TokenKind::Mult),
        ("/", TokenKind::Div),
        ("%", TokenKind::Modulus),
        ("^", TokenKind::Exp),
        ("=", TokenKind::Equals),
        (">", TokenKind::Greater),
        ("<", TokenKind::Less),
        ("(", TokenKind::LParen),
        (")", TokenKind::RParen),
        ("{", TokenKind::LCurly),
        ("}", TokenKind::RCurly),
        (",", TokenKind::Comma),
        (".", TokenKind::Period),
    ]);
}

/// Splits source text into the token stream consumed by the parser.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut pairs = TokenGrammar::parse(Rule::program, input).map_err(|e| {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos(pos) => pos,
            pest::error::LineColLocation::Span(start, _) => start,
        };
        Error::syntax("Unrecognized character", Some(Position { line, column }))
    })?;

    let Some(program) = pairs.next() else {
        return Ok(Vec::new());
    };

    let mut tokens = Vec::new();
    for pair in program.into_inner() {
        if pair.as_rule() == Rule::EOI {
            continue;
        }
        tokens.push(to_token(pair)?);
    }

    Ok(tokens)
}

fn to_token(pair: Pair<Rule>) -> Result<Token> {
    let (line, column) = pair.as_span().start_pos().line_col();
    let position = Position { line, column };
    let text = pair.as_str();

    let token = match pair.as_rule() {
        Rule::linebreak => Token::new(TokenKind::LineBreak, position),
        Rule::number => {
            let n: f64 = text
                .parse()
                .map_err(|_| Error::syntax(format!("Invalid number '{text}'"), Some(position)))?;
            Token {
                kind: TokenKind::Number,
                value: Some(TokenValue::Number(n)),
                position,
            }
        }
        Rule::string => Token {
            kind: TokenKind::String,
            // Remove surrounding quotes
            value: Some(TokenValue::String(text[1..text.len() - 1].to_string())),
            position,
        },
        Rule::solve_assign => Token::new(TokenKind::SolveAssign, position),
        Rule::word => match RESERVED.get(text) {
            Some(kind) => Token::new(*kind, position),
            None => Token {
                kind: TokenKind::Identifier,
                value: Some(TokenValue::String(text.to_string())),
                position,
            },
        },
        Rule::symbol => match SYMBOLS.get(text) {
            Some(kind) => Token::new(*kind, position),
            None => return Err(Error::syntax(format!("Unknown symbol '{text}'"), Some(position))),
        },
        other => {
            return Err(Error::syntax(
                format!("Unexpected lexer rule {other:?}"),
                Some(position),
            ));
        }
    };

    Ok(token)
}
