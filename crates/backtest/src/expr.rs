//! Boolean expressions over a bar history, used by `CUSTOM` rules.
//!
//! ```text
//! close > sma(20) && rsi(14) < 70
//! (close - prev(close)) / prev(close) > 0.02 || !(volume < 2 * sma(20))
//! ```
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! or      := and ("||" and)*
//! and     := not ("&&" not)*
//! not     := "!" not | compare
//! compare := sum (("<" | "<=" | ">" | ">=" | "==" | "!=") sum)?
//! sum     := product (("+" | "-") product)*
//! product := unary (("*" | "/") unary)*
//! unary   := "-" unary | atom
//! atom    := number | "true" | "false" | field | call | "(" or ")"
//! field   := "open" | "high" | "low" | "close" | "volume"
//! call    := ("sma" | "ema" | "rsi") "(" integer ")" | "prev" "(" field ["," integer] ")"
//! ```
//!
//! Expressions are type-checked when parsed: arithmetic and comparisons take
//! numbers, logical operators take booleans, and the whole expression must
//! be boolean. A numeric term without enough history is undefined, and any
//! comparison involving an undefined term is false.

use common::{Error, IndicatorConfig, Result};
use indicators::{EmaIndicator, RsiIndicator, SmaIndicator};

use crate::rules::BarContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "open" => Field::Open,
            "high" => Field::High,
            "low" => Field::Low,
            "close" => Field::Close,
            "volume" => Field::Volume,
            _ => return None,
        })
    }

    fn read(self, bar: &common::Bar) -> f64 {
        match self {
            Field::Open => bar.open,
            Field::High => bar.high,
            Field::Low => bar.low,
            Field::Close => bar.close,
            Field::Volume => bar.volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Study {
    Sma,
    Ema,
    Rsi,
}

/// Numeric term.
#[derive(Debug, Clone, PartialEq)]
pub enum Num {
    Const(f64),
    Field(Field),
    /// `field` `offset` bars before the current one.
    Prev(Field, usize),
    Study(Study, usize),
    Neg(Box<Num>),
    Arith(ArithOp, Box<Num>, Box<Num>),
}

/// Boolean term. The root of every parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Const(bool),
    Compare(CmpOp, Num, Num),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

impl Num {
    fn eval(&self, ctx: &BarContext<'_>) -> Option<f64> {
        let value = match self {
            Num::Const(v) => *v,
            Num::Field(field) => field.read(ctx.current()?),
            Num::Prev(field, offset) => field.read(ctx.back(*offset)?),
            Num::Study(Study::Sma, period) => SmaIndicator::new(*period).compute(ctx.closes)?,
            Num::Study(Study::Ema, period) => EmaIndicator::new(*period).compute(ctx.closes)?,
            Num::Study(Study::Rsi, period) => RsiIndicator::new(*period).compute(ctx.closes)?,
            Num::Neg(inner) => -inner.eval(ctx)?,
            Num::Arith(op, lhs, rhs) => {
                let (a, b) = (lhs.eval(ctx)?, rhs.eval(ctx)?);
                match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div if b == 0.0 => return None,
                    ArithOp::Div => a / b,
                }
            }
        };
        value.is_finite().then_some(value)
    }
}

impl Expr {
    pub fn parse(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let expr = parser.or()?.into_bool(&parser)?;
        if let Some(tok) = parser.peek() {
            return Err(parser.error(format!("unexpected '{}'", tok.kind)));
        }
        Ok(expr)
    }

    pub fn eval(&self, ctx: &BarContext<'_>) -> bool {
        match self {
            Expr::Const(b) => *b,
            Expr::Compare(op, lhs, rhs) => match (lhs.eval(ctx), rhs.eval(ctx)) {
                (Some(a), Some(b)) => match op {
                    CmpOp::Lt => a < b,
                    CmpOp::Le => a <= b,
                    CmpOp::Gt => a > b,
                    CmpOp::Ge => a >= b,
                    CmpOp::Eq => a == b,
                    CmpOp::Ne => a != b,
                },
                _ => false,
            },
            Expr::Not(inner) => !inner.eval(ctx),
            Expr::And(lhs, rhs) => lhs.eval(ctx) && rhs.eval(ctx),
            Expr::Or(lhs, rhs) => lhs.eval(ctx) || rhs.eval(ctx),
        }
    }
}

// ─── Lexer ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Number(n) => write!(f, "{n}"),
            TokenKind::Ident(name) => write!(f, "{name}"),
            TokenKind::Op(op) => write!(f, "{op}"),
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Comma => write!(f, ","),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

/// Two-character operators first so `<=` is not read as `<`.
const OPERATORS: [&str; 13] = [
    "&&", "||", "<=", ">=", "==", "!=", "<", ">", "!", "+", "-", "*", "/",
];

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let kind = if c.is_ascii_digit() || c == '.' {
            while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            let text = &source[start..i];
            let value = text.parse::<f64>().map_err(|_| {
                Error::Strategy(format!("invalid number '{text}' at position {start} in '{source}'"))
            })?;
            TokenKind::Number(value)
        } else if c.is_ascii_alphabetic() || c == '_' {
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            TokenKind::Ident(source[start..i].to_ascii_lowercase())
        } else if c == '(' {
            i += 1;
            TokenKind::LParen
        } else if c == ')' {
            i += 1;
            TokenKind::RParen
        } else if c == ',' {
            i += 1;
            TokenKind::Comma
        } else if let Some(op) = OPERATORS.iter().find(|op| source[i..].starts_with(**op)) {
            i += op.len();
            TokenKind::Op(*op)
        } else {
            return Err(Error::Strategy(format!(
                "unexpected character '{c}' at position {start} in '{source}'"
            )));
        };
        tokens.push(Token { kind, pos: start });
    }
    Ok(tokens)
}

// ─── Parser ───────────────────────────────────────────────────────────────────

/// Intermediate parse result, before the caller knows which type it needs.
enum Node {
    Num(Num),
    Bool(Expr),
}

impl Node {
    fn into_num(self, p: &Parser<'_>) -> Result<Num> {
        match self {
            Node::Num(n) => Ok(n),
            Node::Bool(_) => Err(p.error("expected a number, found a condition".into())),
        }
    }

    fn into_bool(self, p: &Parser<'_>) -> Result<Expr> {
        match self {
            Node::Bool(e) => Ok(e),
            Node::Num(_) => Err(p.error("expected a condition, found a number".into())),
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn error(&self, msg: String) -> Error {
        let at = self
            .tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map(|t| t.pos)
            .unwrap_or(0);
        Error::Strategy(format!("{msg} at position {at} in '{}'", self.source))
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Token { kind: TokenKind::Op(o), .. }) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<()> {
        match self.next() {
            Some(tok) if tok.kind == kind => Ok(()),
            Some(tok) => {
                self.pos -= 1;
                Err(self.error(format!("expected '{kind}', found '{}'", tok.kind)))
            }
            None => Err(self.error(format!("expected '{kind}', found end of expression"))),
        }
    }

    fn or(&mut self) -> Result<Node> {
        let mut lhs = self.and()?;
        while self.eat_op("||") {
            let rhs = self.and()?.into_bool(self)?;
            lhs = Node::Bool(Expr::Or(Box::new(lhs.into_bool(self)?), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Node> {
        let mut lhs = self.not()?;
        while self.eat_op("&&") {
            let rhs = self.not()?.into_bool(self)?;
            lhs = Node::Bool(Expr::And(Box::new(lhs.into_bool(self)?), Box::new(rhs)));
        }
        Ok(lhs)
    }

    fn not(&mut self) -> Result<Node> {
        if self.eat_op("!") {
            let inner = self.not()?.into_bool(self)?;
            return Ok(Node::Bool(Expr::Not(Box::new(inner))));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Node> {
        let lhs = self.sum()?;
        let op = match self.peek().map(|t| &t.kind) {
            Some(TokenKind::Op("<")) => CmpOp::Lt,
            Some(TokenKind::Op("<=")) => CmpOp::Le,
            Some(TokenKind::Op(">")) => CmpOp::Gt,
            Some(TokenKind::Op(">=")) => CmpOp::Ge,
            Some(TokenKind::Op("==")) => CmpOp::Eq,
            Some(TokenKind::Op("!=")) => CmpOp::Ne,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let lhs = lhs.into_num(self)?;
        let rhs = self.sum()?.into_num(self)?;
        Ok(Node::Bool(Expr::Compare(op, lhs, rhs)))
    }

    fn sum(&mut self) -> Result<Node> {
        let mut lhs = self.product()?;
        loop {
            let op = if self.eat_op("+") {
                ArithOp::Add
            } else if self.eat_op("-") {
                ArithOp::Sub
            } else {
                return Ok(lhs);
            };
            let a = lhs.into_num(self)?;
            let b = self.product()?.into_num(self)?;
            lhs = Node::Num(Num::Arith(op, Box::new(a), Box::new(b)));
        }
    }

    fn product(&mut self) -> Result<Node> {
        let mut lhs = self.unary()?;
        loop {
            let op = if self.eat_op("*") {
                ArithOp::Mul
            } else if self.eat_op("/") {
                ArithOp::Div
            } else {
                return Ok(lhs);
            };
            let a = lhs.into_num(self)?;
            let b = self.unary()?.into_num(self)?;
            lhs = Node::Num(Num::Arith(op, Box::new(a), Box::new(b)));
        }
    }

    fn unary(&mut self) -> Result<Node> {
        if self.eat_op("-") {
            let inner = self.unary()?.into_num(self)?;
            return Ok(Node::Num(Num::Neg(Box::new(inner))));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Node> {
        let Some(tok) = self.next() else {
            return Err(self.error("unexpected end of expression".into()));
        };
        match tok.kind {
            TokenKind::Number(v) => Ok(Node::Num(Num::Const(v))),
            TokenKind::LParen => {
                let inner = self.or()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => self.ident(name),
            other => {
                self.pos -= 1;
                Err(self.error(format!("unexpected '{other}'")))
            }
        }
    }

    fn ident(&mut self, name: String) -> Result<Node> {
        match name.as_str() {
            "true" => return Ok(Node::Bool(Expr::Const(true))),
            "false" => return Ok(Node::Bool(Expr::Const(false))),
            _ => {}
        }
        if let Some(field) = Field::parse(&name) {
            return Ok(Node::Num(Num::Field(field)));
        }

        let study = match name.as_str() {
            "sma" => Some(Study::Sma),
            "ema" => Some(Study::Ema),
            "rsi" => Some(Study::Rsi),
            "prev" => None,
            _ => {
                self.pos -= 1;
                return Err(self.error(format!("unknown identifier '{name}'")));
            }
        };

        self.expect(TokenKind::LParen)?;
        let node = match study {
            Some(study) => {
                let period = self.integer_arg()?;
                if period == 0 {
                    return Err(self.error(format!("{name}() period must be positive")));
                }
                Num::Study(study, period)
            }
            None => {
                let field = match self.next() {
                    Some(Token {
                        kind: TokenKind::Ident(f),
                        ..
                    }) => Field::parse(&f),
                    _ => None,
                }
                .ok_or_else(|| self.error("prev() expects a bar field".into()))?;
                let offset = if matches!(self.peek().map(|t| &t.kind), Some(TokenKind::Comma)) {
                    self.pos += 1;
                    self.integer_arg()?
                } else {
                    1
                };
                Num::Prev(field, offset)
            }
        };
        self.expect(TokenKind::RParen)?;
        Ok(Node::Num(node))
    }

    fn integer_arg(&mut self) -> Result<usize> {
        match self.next() {
            Some(Token {
                kind: TokenKind::Number(v),
                ..
            }) if v.fract() == 0.0 && v >= 0.0 && v <= IndicatorConfig::MAX_PERIOD as f64 => {
                Ok(v as usize)
            }
            _ => {
                self.pos -= 1;
                Err(self.error(format!(
                    "expected a whole number up to {}",
                    IndicatorConfig::MAX_PERIOD
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use common::Bar;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "TEST".into(),
                timestamp: start + Duration::days(i as i64),
                open: close - 0.5,
                high: close + 1.0,
                low: close - 1.0,
                close,
                volume: 1_000.0 + i as f64,
            })
            .collect()
    }

    fn eval(source: &str, closes: &[f64]) -> bool {
        let bars = bars(closes);
        let ctx = BarContext::new(&bars, closes);
        Expr::parse(source).unwrap().eval(&ctx)
    }

    #[test]
    fn fields_and_arithmetic() {
        assert!(eval("close == 10", &[10.0]));
        assert!(eval("high - low == 2", &[10.0]));
        assert!(eval("(open + 0.5) * 2 == close * 2", &[10.0]));
        assert!(eval("-close < 0", &[10.0]));
        assert!(eval("volume / 2 >= 500", &[10.0]));
    }

    #[test]
    fn precedence() {
        // 1 + 2 * 3 = 7, not 9
        assert!(eval("1 + 2 * 3 == 7", &[1.0]));
        // && binds tighter than ||
        assert!(eval("true || false && false", &[1.0]));
        assert!(!eval("(true || false) && false", &[1.0]));
        assert!(eval("!false && !(1 > 2)", &[1.0]));
    }

    #[test]
    fn studies_and_prev() {
        let closes = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(eval("sma(5) == 3", &closes));
        assert!(eval("close > sma(3)", &closes));
        assert!(eval("prev(close) == 4", &closes));
        assert!(eval("prev(close, 4) == 1", &closes));
        assert!(eval("rsi(2) == 100", &closes));
        assert!(eval("ema(2) > sma(5)", &closes));
    }

    #[test]
    fn undefined_terms_make_comparisons_false() {
        // Not enough history for sma(10) or prev(close, 5)
        assert!(!eval("sma(10) > 0", &[1.0, 2.0]));
        assert!(!eval("sma(10) <= 0", &[1.0, 2.0]));
        assert!(!eval("prev(close, 5) != 0", &[1.0, 2.0]));
        // Division by zero is undefined too
        assert!(!eval("close / 0 > 0", &[1.0]));
        // ...but negation of an undefined comparison is true
        assert!(eval("!(sma(10) > 0)", &[1.0]));
    }

    #[test]
    fn case_insensitive_identifiers() {
        assert!(eval("CLOSE > SMA(2) || TRUE", &[1.0, 2.0]));
    }

    #[test]
    fn type_errors_are_rejected() {
        for source in ["close", "close + (1 > 2)", "!close", "true > 1", "1 && 2"] {
            let err = Expr::parse(source).unwrap_err();
            assert!(matches!(err, Error::Strategy(_)), "{source}: {err}");
        }
    }

    #[test]
    fn syntax_errors_are_rejected() {
        for source in [
            "",
            "close >",
            "(close > 1",
            "close > 1)",
            "foo > 1",
            "sma(0) > 1",
            "sma(2.5) > 1",
            "prev(2) > 1",
            "close > 1 $ 2",
            "1..2 > 1",
        ] {
            assert!(
                matches!(Expr::parse(source), Err(Error::Strategy(_))),
                "expected parse error for '{source}'"
            );
        }
    }

    #[test]
    fn oversized_windows_are_rejected_at_parse() {
        for source in [
            "rsi(99999999999999999999) > 50",
            "sma(10001) > 1",
            "prev(close, 99999999999999999999) > 1",
        ] {
            assert!(
                matches!(Expr::parse(source), Err(Error::Strategy(_))),
                "expected parse error for '{source}'"
            );
        }
        assert!(Expr::parse("sma(10000) > 1").is_ok());
    }
}
