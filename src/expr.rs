//! Arithmetic expressions for [`crate::ExecComp`].
//!
//! An assignment `target = expr` is parsed once. Free identifiers become
//! parameter slots in order of first appearance, so evaluation works on a
//! plain value slice without name lookups.

use logos::Logos;
use thiserror::Error;

/// Parse failure with a human readable reason.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Num(f64),
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("**")]
    #[token("^")]
    Pow,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("=")]
    Assign,
}

fn tokenize(src: &str) -> Result<Vec<Token>, ParseError> {
    Token::lexer(src)
        .spanned()
        .map(|(token, span)| {
            token.map_err(|_| ParseError(format!("unexpected input '{}'", &src[span])))
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assoc {
    Left,
    Right,
}

/// Precedence table; higher binds tighter.
fn binary_op_info(token: &Token) -> Option<(u8, Assoc, BinaryOp)> {
    match token {
        Token::Plus => Some((10, Assoc::Left, BinaryOp::Add)),
        Token::Minus => Some((10, Assoc::Left, BinaryOp::Sub)),
        Token::Star => Some((20, Assoc::Left, BinaryOp::Mul)),
        Token::Slash => Some((20, Assoc::Left, BinaryOp::Div)),
        Token::Pow => Some((30, Assoc::Right, BinaryOp::Pow)),
        _ => None,
    }
}

/// Unary minus binds looser than `**`: `-x**2 == -(x**2)`.
const UNARY_PREC: u8 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sqrt,
    Abs,
    Exp,
    Ln,
    Log10,
    Sin,
    Cos,
    Tan,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<Func> {
        Some(match name {
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "exp" => Func::Exp,
            "ln" | "log" => Func::Ln,
            "log10" => Func::Log10,
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "min" => Func::Min,
            "max" => Func::Max,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Func::Min | Func::Max => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Func::Sqrt => args[0].sqrt(),
            Func::Abs => args[0].abs(),
            Func::Exp => args[0].exp(),
            Func::Ln => args[0].ln(),
            Func::Log10 => args[0].log10(),
            Func::Sin => args[0].sin(),
            Func::Cos => args[0].cos(),
            Func::Tan => args[0].tan(),
            Func::Min => args[0].min(args[1]),
            Func::Max => args[0].max(args[1]),
        }
    }
}

/// Expression tree; variables are indices into the input list.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    Var(usize),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call { func: Func, args: Vec<Expr> },
}

impl Expr {
    /// Evaluate with `vars[i]` bound to input `i`.
    ///
    /// Non-finite results (division by zero, `sqrt` of a negative) are
    /// returned as-is; the caller decides how to report them.
    pub fn eval(&self, vars: &[f64]) -> f64 {
        match self {
            Expr::Num(v) => *v,
            Expr::Var(i) => vars[*i],
            Expr::Neg(inner) => -inner.eval(vars),
            Expr::Binary { op, left, right } => {
                let (a, b) = (left.eval(vars), right.eval(vars));
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Sub => a - b,
                    BinaryOp::Mul => a * b,
                    BinaryOp::Div => a / b,
                    BinaryOp::Pow => a.powf(b),
                }
            }
            Expr::Call { func, args } => {
                let values: Vec<f64> = args.iter().map(|a| a.eval(vars)).collect();
                func.apply(&values)
            }
        }
    }
}

/// A parsed `target = expr` statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: String,
    pub inputs: Vec<String>,
    pub expr: Expr,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    inputs: Vec<String>,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParseError> {
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(ParseError(format!("expected {:?}, found {:?}", expected, t))),
            None => Err(ParseError(format!("expected {:?}, found end of input", expected))),
        }
    }

    fn input_index(&mut self, name: String) -> usize {
        match self.inputs.iter().position(|n| *n == name) {
            Some(i) => i,
            None => {
                self.inputs.push(name);
                self.inputs.len() - 1
            }
        }
    }

    fn parse_pratt(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let mut left = self.parse_prefix()?;

        while let Some((prec, assoc, op)) = self.peek().and_then(binary_op_info) {
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            let next_prec = if assoc == Assoc::Left { prec + 1 } else { prec };
            let right = self.parse_pratt(next_prec)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        match self.next() {
            Some(Token::Minus) => Ok(Expr::Neg(Box::new(self.parse_pratt(UNARY_PREC)?))),
            Some(Token::Plus) => self.parse_pratt(UNARY_PREC),
            Some(Token::Num(v)) => Ok(Expr::Num(v)),
            Some(Token::LParen) => {
                let inner = self.parse_pratt(0)?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.parse_call(&name)
                } else if name == "pi" {
                    Ok(Expr::Num(std::f64::consts::PI))
                } else {
                    Ok(Expr::Var(self.input_index(name)))
                }
            }
            Some(t) => Err(ParseError(format!("unexpected token {:?}", t))),
            None => Err(ParseError("unexpected end of input".to_string())),
        }
    }

    fn parse_call(&mut self, name: &str) -> Result<Expr, ParseError> {
        let func = Func::lookup(name)
            .ok_or_else(|| ParseError(format!("unknown function '{}'", name)))?;
        self.expect(Token::LParen)?;
        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.parse_pratt(0)?);
                if self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        if args.len() != func.arity() {
            return Err(ParseError(format!(
                "'{}' takes {} argument(s), got {}",
                name,
                func.arity(),
                args.len()
            )));
        }
        Ok(Expr::Call { func, args })
    }
}

/// Parse `target = expr`.
pub fn parse_assignment(src: &str) -> Result<Assignment, ParseError> {
    let tokens = tokenize(src)?;
    let target = match (tokens.first(), tokens.get(1)) {
        (Some(Token::Ident(name)), Some(Token::Assign)) => name.clone(),
        _ => return Err(ParseError("expected '<name> = <expression>'".to_string())),
    };

    let mut parser = Parser {
        tokens,
        pos: 2,
        inputs: Vec::new(),
    };
    let expr = parser.parse_pratt(0)?;
    if let Some(t) = parser.peek() {
        return Err(ParseError(format!("unexpected trailing {:?}", t)));
    }
    if parser.inputs.contains(&target) {
        return Err(ParseError(format!("'{}' appears on both sides", target)));
    }

    Ok(Assignment {
        target,
        inputs: parser.inputs,
        expr,
    })
}
