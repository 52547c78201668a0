use crate::ast::*;
use crate::error::{Error, Result};
use crate::lexer::{Token, TokenKind, TokenValue, tokenize};

use tracing::debug;

/// Deepest expression tree accepted. Parentheses, blocks, unary operators
/// and every link of an operator chain each add a level.
pub const MAX_NESTING: usize = 128;

const DEFAULT_COUNTER: &str = "_c";

pub fn parse_program(input: &str) -> Result<Program> {
    Parser::new(tokenize(input)?).parse()
}

/// Recursive-descent parser over a pull-based token stream.
///
/// Precedence layers from loosest to tightest: statement (postfix `if`,
/// `solve`), expression (`+ - and or`), term (`* / %`, assignments and
/// comparisons), exponential (`^`), factor.
pub struct Parser<I: Iterator<Item = Token>> {
    tokens: I,
    current: Option<Token>,
    // Set when an if chain consumed the line break ending its statement.
    absorbed_linebreak: bool,
    // Levels of the tree currently being built.
    depth: usize,
}

impl<I: Iterator<Item = Token>> Parser<I> {
    pub fn new(tokens: impl IntoIterator<Item = Token, IntoIter = I>) -> Self {
        let mut tokens = tokens.into_iter();
        let current = tokens.next();
        Self {
            tokens,
            current,
            absorbed_linebreak: false,
            depth: 0,
        }
    }

    pub fn parse(mut self) -> Result<Program> {
        let mut statements = Vec::new();

        while self.current.is_some() {
            self.skip_linebreaks();
            if self.current.is_none() {
                break;
            }

            statements.push(self.statement()?);

            // e.g. `x = 2 3`
            if !matches!(self.kind(), None | Some(TokenKind::LineBreak)) && !self.absorbed_linebreak
            {
                return Err(self.unexpected("end of statement"));
            }
            self.absorbed_linebreak = false;
        }

        debug!(statements = statements.len(), "parsed program");
        Ok(Program { statements })
    }

    fn kind(&self) -> Option<TokenKind> {
        self.current.as_ref().map(|t| t.kind)
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == Some(kind)
    }

    fn advance(&mut self) -> Option<Token> {
        std::mem::replace(&mut self.current, self.tokens.next())
    }

    fn skip_linebreaks(&mut self) {
        while self.at(TokenKind::LineBreak) {
            self.advance();
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::syntax(message, self.current.as_ref().map(|t| t.position))
    }

    fn unexpected(&self, expected: &str) -> Error {
        match &self.current {
            Some(token) => Error::syntax(
                format!("Expected {expected}, got {}", token.kind),
                Some(token.position),
            ),
            None => Error::syntax(format!("Expected {expected}, got end of input"), None),
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        match self.advance() {
            Some(token) if token.kind == kind => Ok(token),
            Some(token) => Err(Error::syntax(
                format!("Expected {expected}, got {}", token.kind),
                Some(token.position),
            )),
            None => Err(Error::syntax(
                format!("Expected {expected}, got end of input"),
                None,
            )),
        }
    }

    fn identifier(&mut self, expected: &str) -> Result<String> {
        if !self.at(TokenKind::Identifier) {
            return Err(self.unexpected(expected));
        }
        match self.advance() {
            Some(Token {
                value: Some(TokenValue::String(name)),
                ..
            }) => Ok(name),
            other => Err(Error::syntax(
                "Identifier token carries no name",
                other.map(|t| t.position),
            )),
        }
    }

    fn statement(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut result = self.expression()?;

        while !self.absorbed_linebreak {
            match self.kind() {
                Some(TokenKind::Solve | TokenKind::SolveAssign) => {
                    self.deepen()?;
                    let assign = self.at(TokenKind::SolveAssign);
                    self.advance();
                    let target = match self.expression()? {
                        Expr::Variable(name) => name,
                        other => {
                            return Err(self.error(format!(
                                "Can only solve for a variable, got {}",
                                other.kind_name()
                            )));
                        }
                    };
                    result = Expr::Solve {
                        equation: Box::new(result),
                        target,
                        assign,
                    };
                }
                Some(TokenKind::If) => {
                    // `value if condition else alternative`
                    self.deepen()?;
                    self.advance();
                    let condition = self.statement()?;
                    let mut branches = vec![Branch {
                        kind: BranchKind::If,
                        condition: Some(condition),
                        body: vec![result],
                    }];
                    if self.at(TokenKind::Else) && !self.absorbed_linebreak {
                        self.advance();
                        branches.push(Branch {
                            kind: BranchKind::Else,
                            condition: None,
                            body: vec![self.statement()?],
                        });
                    }
                    result = Expr::If(branches);
                }
                _ => break,
            }
        }

        self.depth = base;
        Ok(result)
    }

    fn expression(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut result = self.term()?;

        while !self.absorbed_linebreak {
            let Some(kind) = self.kind() else {
                break;
            };
            if matches!(
                kind,
                TokenKind::Plus | TokenKind::Minus | TokenKind::And | TokenKind::Or
            ) {
                self.deepen()?;
            }

            result = match kind {
                TokenKind::Plus | TokenKind::Minus => {
                    let op = if kind == TokenKind::Plus {
                        BinOp::Add
                    } else {
                        BinOp::Sub
                    };
                    self.advance();
                    Expr::binary(op, result, self.term()?)
                }
                TokenKind::And | TokenKind::Or => {
                    let op = if kind == TokenKind::And {
                        LogicalOp::And
                    } else {
                        LogicalOp::Or
                    };
                    self.advance();
                    Expr::Logical {
                        op,
                        left: Box::new(result),
                        right: Box::new(self.term()?),
                    }
                }
                _ => break,
            };
        }

        self.depth = base;
        Ok(result)
    }

    fn term(&mut self) -> Result<Expr> {
        let base = self.depth;
        let mut result = self.exponential()?;

        while !self.absorbed_linebreak {
            let Some(kind) = self.kind() else {
                break;
            };

            result = match kind {
                TokenKind::Mult | TokenKind::Div | TokenKind::Modulus => {
                    self.deepen()?;
                    let op = match kind {
                        TokenKind::Mult => BinOp::Mul,
                        TokenKind::Div => BinOp::Div,
                        _ => BinOp::Mod,
                    };
                    self.advance();
                    Expr::binary(op, result, self.exponential()?)
                }
                TokenKind::Equals => {
                    let target = self.assign_target(&result)?;
                    self.advance();
                    Expr::assign(target, self.statement()?)
                }
                TokenKind::PlusAssign
                | TokenKind::MinusAssign
                | TokenKind::MultAssign
                | TokenKind::DivAssign
                | TokenKind::ModulusAssign => {
                    self.deepen()?;
                    let target = self.assign_target(&result)?;
                    let op = match kind {
                        TokenKind::PlusAssign => BinOp::Add,
                        TokenKind::MinusAssign => BinOp::Sub,
                        TokenKind::MultAssign => BinOp::Mul,
                        TokenKind::DivAssign => BinOp::Div,
                        _ => BinOp::Mod,
                    };
                    self.advance();
                    let value = Expr::binary(op, Expr::Variable(target.clone()), self.expression()?);
                    Expr::assign(target, value)
                }
                TokenKind::CompEquals
                | TokenKind::CompNotEquals
                | TokenKind::Greater
                | TokenKind::Less
                | TokenKind::GreaterOrEquals
                | TokenKind::LessOrEquals => {
                    self.deepen()?;
                    let op = match kind {
                        TokenKind::CompEquals => CompareOp::Eq,
                        TokenKind::CompNotEquals => CompareOp::Ne,
                        TokenKind::Greater => CompareOp::Gt,
                        TokenKind::Less => CompareOp::Lt,
                        TokenKind::GreaterOrEquals => CompareOp::Ge,
                        _ => CompareOp::Le,
                    };
                    self.advance();
                    Expr::Comparison {
                        op,
                        left: Box::new(result),
                        right: Box::new(self.exponential()?),
                    }
                }
                _ => break,
            };
        }

        self.depth = base;
        Ok(result)
    }

    fn assign_target(&self, expr: &Expr) -> Result<String> {
        match expr {
            Expr::Variable(name) => Ok(name.clone()),
            other => Err(self.error(format!("Couldn't assign to {}", other.kind_name()))),
        }
    }

    fn deepen(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error("Expression nested too deeply"));
        }
        Ok(())
    }

    fn exponential(&mut self) -> Result<Expr> {
        self.deepen()?;
        let result = self.power();
        self.depth -= 1;
        result
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.factor()?;
        if !self.at(TokenKind::Exp) {
            return Ok(base);
        }
        self.advance();
        // Right side is a single factor, so 2^3^2 is rejected.
        Ok(Expr::binary(BinOp::Pow, base, self.factor()?))
    }

    fn factor(&mut self) -> Result<Expr> {
        let Some(token) = self.advance() else {
            return Err(Error::syntax(
                "Expected number or identifier, got end of input",
                None,
            ));
        };

        match token.kind {
            TokenKind::Number => {
                let Some(TokenValue::Number(n)) = token.value else {
                    return Err(Error::syntax(
                        "Number token carries no value",
                        Some(token.position),
                    ));
                };
                // 2x
                if self.at(TokenKind::Identifier) {
                    Ok(Expr::binary(BinOp::Mul, Expr::Number(n), self.exponential()?))
                } else {
                    Ok(Expr::Number(n))
                }
            }
            TokenKind::String => match token.value {
                Some(TokenValue::String(s)) => Ok(Expr::String(s)),
                _ => Err(Error::syntax(
                    "String token carries no value",
                    Some(token.position),
                )),
            },
            TokenKind::True => Ok(Expr::Boolean(true)),
            TokenKind::False => Ok(Expr::Boolean(false)),
            TokenKind::Not => Ok(Expr::Not(Box::new(self.exponential()?))),
            TokenKind::Plus => self.exponential(),
            TokenKind::Minus => Ok(Expr::binary(
                BinOp::Mul,
                Expr::Number(-1.0),
                self.exponential()?,
            )),
            TokenKind::LParen => {
                if self.at(TokenKind::RParen) {
                    return Err(self.error("Empty parentheses cannot be evaluated."));
                }
                let inner = self.statement()?;
                if !self.at(TokenKind::RParen) {
                    return Err(self.unexpected("a closing parenthesis"));
                }
                self.advance();
                match inner {
                    Expr::Comparison { .. } => Ok(Expr::ToBoolean(Box::new(inner))),
                    other => Ok(other),
                }
            }
            TokenKind::Identifier => {
                let Some(TokenValue::String(name)) = token.value else {
                    return Err(Error::syntax(
                        "Identifier token carries no name",
                        Some(token.position),
                    ));
                };
                match self.kind() {
                    Some(TokenKind::DoublePlus) => {
                        self.advance();
                        let value =
                            Expr::binary(BinOp::Add, Expr::Variable(name.clone()), Expr::Number(1.0));
                        Ok(Expr::assign(name, value))
                    }
                    Some(TokenKind::DoubleMinus) => {
                        self.advance();
                        let value =
                            Expr::binary(BinOp::Sub, Expr::Variable(name.clone()), Expr::Number(1.0));
                        Ok(Expr::assign(name, value))
                    }
                    Some(TokenKind::LParen | TokenKind::Period) => self.call(name),
                    _ => Ok(Expr::Variable(name)),
                }
            }
            TokenKind::Function => self.function_declaration(),
            TokenKind::Return => {
                if matches!(
                    self.kind(),
                    None | Some(TokenKind::LineBreak | TokenKind::RCurly | TokenKind::BlockEnd)
                ) {
                    Ok(Expr::Return(None))
                } else {
                    Ok(Expr::Return(Some(Box::new(self.statement()?))))
                }
            }
            TokenKind::Break => Ok(Expr::Break),
            TokenKind::Continue => Ok(Expr::Continue),
            TokenKind::Rep => self.repeat(),
            TokenKind::For => self.for_loop(),
            TokenKind::If => self.if_chain(),
            other => Err(Error::syntax(
                format!("Expected any factor, got {other}"),
                Some(token.position),
            )),
        }
    }

    /// `func name param* block`
    fn function_declaration(&mut self) -> Result<Expr> {
        let name = self.identifier("an identifier")?;
        let mut params = Vec::new();
        while self.at(TokenKind::Identifier) {
            params.push(self.identifier("a parameter name")?);
        }
        let body = self.block()?;

        Ok(Expr::FunctionDecl { name, params, body })
    }

    /// `name(arg, ...)` or `name.arg`
    fn call(&mut self, name: String) -> Result<Expr> {
        let mut args = Vec::new();

        if self.at(TokenKind::Period) {
            self.advance();
            args.push(self.exponential()?);
            return Ok(Expr::Call { name, args });
        }

        self.expect(TokenKind::LParen, "'('")?;
        while !self.at(TokenKind::RParen) {
            if self.current.is_none() {
                return Err(self.unexpected("closing parenthesis"));
            }
            args.push(self.statement()?);
            match self.kind() {
                Some(TokenKind::Comma) => {
                    self.advance();
                }
                Some(TokenKind::RParen) => {}
                _ => return Err(self.unexpected("comma or closing parenthesis")),
            }
        }
        self.advance();

        Ok(Expr::Call { name, args })
    }

    /// `rep count [as counter] block`
    fn repeat(&mut self) -> Result<Expr> {
        let count = self.statement()?;
        let counter = if self.at(TokenKind::As) {
            self.advance();
            self.identifier("identifier after 'as' keyword")?
        } else {
            DEFAULT_COUNTER.to_string()
        };
        let body = self.block()?;

        Ok(Expr::Repeat {
            count: Box::new(count),
            counter,
            body,
        })
    }

    /// `for init, condition, update block`
    fn for_loop(&mut self) -> Result<Expr> {
        let init = self.statement()?;
        self.expect(TokenKind::Comma, "comma after statement")?;
        let condition = self.statement()?;
        self.expect(TokenKind::Comma, "comma after condition")?;
        let update = self.statement()?;
        let body = self.block()?;

        Ok(Expr::For {
            init: Box::new(init),
            condition: Box::new(condition),
            update: Box::new(update),
            body,
        })
    }

    /// `if cond block (or cond block)* (else block)?`
    ///
    /// A single line break between branches is consumed while looking for a
    /// continuation. If it was consumed and the chain ended, the enclosing
    /// statement is considered terminated.
    fn if_chain(&mut self) -> Result<Expr> {
        let condition = self.statement()?;
        let body = self.block()?;
        let mut branches = vec![Branch {
            kind: BranchKind::If,
            condition: Some(condition),
            body,
        }];

        loop {
            if self.absorbed_linebreak {
                break;
            }
            if self.at(TokenKind::LineBreak) {
                self.advance();
                self.absorbed_linebreak = true;
            }

            let kind = match self.kind() {
                Some(TokenKind::Or) => BranchKind::ElseIf,
                Some(TokenKind::Else) => BranchKind::Else,
                _ => break,
            };
            self.advance();
            self.absorbed_linebreak = false;

            let condition = match kind {
                BranchKind::Else => None,
                _ => Some(self.statement()?),
            };
            let body = self.block()?;
            branches.push(Branch {
                kind,
                condition,
                body,
            });

            if kind == BranchKind::Else {
                break;
            }
        }

        Ok(Expr::If(branches))
    }

    /// `{ statements }`, `=> statement`, or `=>` line break, statements, `end`.
    fn block(&mut self) -> Result<Vec<Expr>> {
        let closer = match self.kind() {
            Some(TokenKind::LCurly) => TokenKind::RCurly,
            Some(TokenKind::Arrow) => TokenKind::BlockEnd,
            _ => return Err(self.unexpected("'{' or '=>'")),
        };
        self.advance();

        if closer == TokenKind::BlockEnd && !self.at(TokenKind::LineBreak) {
            return Ok(vec![self.statement()?]);
        }

        let mut body = Vec::new();
        loop {
            self.skip_linebreaks();
            match self.kind() {
                None => return Err(self.unexpected(&format!("block ending operator {closer}"))),
                Some(kind) if kind == closer => break,
                _ => {}
            }

            self.absorbed_linebreak = false;
            body.push(self.statement()?);

            match self.kind() {
                None => return Err(self.unexpected(&format!("block ending operator {closer}"))),
                Some(TokenKind::LineBreak) => {}
                Some(kind) if kind == closer => {}
                Some(_) if self.absorbed_linebreak => {}
                Some(_) => return Err(self.unexpected("end of statement")),
            }
        }
        self.advance();
        self.absorbed_linebreak = false;

        Ok(body)
    }
}
