//! A small infix expression language backing the `ExprEval` converter
//! family.
//!
//! Expressions operate on pipeline [`Value`]s bound to variables by name,
//! e.g. `IF(a%2==1, a+1, a)` or `acc + v`. Arithmetic goes through
//! `rust_decimal` so that mixed integer/float operations stay exact and
//! whole results come back as integers.

use std::collections::HashMap;
use std::fmt;

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::registry::ConvError;
use crate::value::Value;

/// Errors from parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprError {
    Parse(String),
    Type(String),
    UnknownVariable(String),
    UnknownFunction(String),
    BadArity(String),
    DivisionByZero,
}

impl fmt::Display for ExprError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprError::Parse(msg) => write!(f, "parse error: {}", msg),
            ExprError::Type(msg) => write!(f, "type error: {}", msg),
            ExprError::UnknownVariable(name) => write!(f, "unknown variable \"{}\"", name),
            ExprError::UnknownFunction(name) => write!(f, "unknown function \"{}\"", name),
            ExprError::BadArity(msg) => write!(f, "arity error: {}", msg),
            ExprError::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

impl std::error::Error for ExprError {}

impl From<ExprError> for ConvError {
    fn from(e: ExprError) -> Self {
        ConvError::Provider(e.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Integer(i64),
    Float(f64),
    Str(String),
    Ident(String),
    And,
    Or,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    EqEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    Comma,
    Eof,
}

struct Scanner {
    input: Vec<char>,
    position: usize,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Scanner {
            input: input.chars().collect(),
            position: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                result.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        result
    }

    fn read_number(&mut self) -> Result<Tok, ExprError> {
        let mut number = String::new();
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                number.push(ch);
                self.advance();
            } else if ch == '.' && !is_float && self.peek_char().is_some_and(|c| c.is_ascii_digit())
            {
                is_float = true;
                number.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        if is_float {
            number
                .parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| ExprError::Parse(format!("invalid float \"{}\"", number)))
        } else {
            number
                .parse::<i64>()
                .map(Tok::Integer)
                .map_err(|_| ExprError::Parse(format!("invalid integer \"{}\"", number)))
        }
    }

    fn read_string(&mut self, quote: char) -> Result<Tok, ExprError> {
        self.advance(); // consume opening quote
        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            if ch == quote {
                self.advance();
                return Ok(Tok::Str(result));
            }
            result.push(ch);
            self.advance();
        }
        Err(ExprError::Parse("unterminated string".to_string()))
    }

    fn next_tok(&mut self) -> Result<Tok, ExprError> {
        self.skip_whitespace();

        match self.current_char() {
            None => Ok(Tok::Eof),
            Some('+') => {
                self.advance();
                Ok(Tok::Plus)
            }
            Some('-') => {
                self.advance();
                Ok(Tok::Minus)
            }
            Some('*') => {
                self.advance();
                Ok(Tok::Star)
            }
            Some('/') => {
                self.advance();
                Ok(Tok::Slash)
            }
            Some('%') => {
                self.advance();
                Ok(Tok::Percent)
            }
            Some('(') => {
                self.advance();
                Ok(Tok::LParen)
            }
            Some(')') => {
                self.advance();
                Ok(Tok::RParen)
            }
            Some(',') => {
                self.advance();
                Ok(Tok::Comma)
            }
            Some('=') => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Tok::EqEq)
                } else {
                    Err(ExprError::Parse(
                        "unexpected '=' (did you mean '=='?)".to_string(),
                    ))
                }
            }
            Some('!') => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Tok::NotEq)
                } else {
                    Err(ExprError::Parse("unexpected '!'".to_string()))
                }
            }
            Some('<') => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Tok::LtEq)
                } else {
                    self.advance();
                    Ok(Tok::Lt)
                }
            }
            Some('>') => {
                if self.peek_char() == Some('=') {
                    self.advance();
                    self.advance();
                    Ok(Tok::GtEq)
                } else {
                    self.advance();
                    Ok(Tok::Gt)
                }
            }
            Some('&') => {
                if self.peek_char() == Some('&') {
                    self.advance();
                    self.advance();
                    Ok(Tok::And)
                } else {
                    Err(ExprError::Parse("unexpected '&'".to_string()))
                }
            }
            Some('|') => {
                if self.peek_char() == Some('|') {
                    self.advance();
                    self.advance();
                    Ok(Tok::Or)
                } else {
                    Err(ExprError::Parse("unexpected '|'".to_string()))
                }
            }
            Some('"') => self.read_string('"'),
            Some('\'') => self.read_string('\''),
            Some(ch) if ch.is_alphabetic() || ch == '_' => {
                let ident = self.read_identifier();
                match ident.to_lowercase().as_str() {
                    "and" => Ok(Tok::And),
                    "or" => Ok(Tok::Or),
                    _ => Ok(Tok::Ident(ident)),
                }
            }
            Some(ch) if ch.is_ascii_digit() => self.read_number(),
            Some(ch) => Err(ExprError::Parse(format!(
                "unexpected character '{}' at position {}",
                ch, self.position
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone)]
enum Node {
    Integer(i64),
    Float(f64),
    Str(String),
    Var(String),
    Neg(Box<Node>),
    Binary {
        op: Op,
        left: Box<Node>,
        right: Box<Node>,
    },
    Call {
        name: String,
        args: Vec<Node>,
    },
}

struct Parser {
    scanner: Scanner,
    current: Tok,
}

impl Parser {
    fn new(src: &str) -> Result<Self, ExprError> {
        let mut scanner = Scanner::new(src);
        let current = scanner.next_tok()?;
        Ok(Parser { scanner, current })
    }

    fn advance(&mut self) -> Result<(), ExprError> {
        self.current = self.scanner.next_tok()?;
        Ok(())
    }

    fn expect(&mut self, tok: Tok) -> Result<(), ExprError> {
        if self.current == tok {
            self.advance()
        } else {
            Err(ExprError::Parse(format!(
                "expected {:?}, got {:?}",
                tok, self.current
            )))
        }
    }

    fn parse_expression(&mut self) -> Result<Node, ExprError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_and()?;
        while self.current == Tok::Or {
            self.advance()?;
            let right = self.parse_and()?;
            left = Node::Binary {
                op: Op::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_comparison()?;
        while self.current == Tok::And {
            self.advance()?;
            let right = self.parse_comparison()?;
            left = Node::Binary {
                op: Op::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Node, ExprError> {
        let left = self.parse_additive()?;
        let op = match self.current {
            Tok::EqEq => Op::Eq,
            Tok::NotEq => Op::Ne,
            Tok::Lt => Op::Lt,
            Tok::LtEq => Op::Le,
            Tok::Gt => Op::Gt,
            Tok::GtEq => Op::Ge,
            _ => return Ok(left),
        };
        self.advance()?;
        let right = self.parse_additive()?;
        Ok(Node::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_additive(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.current {
                Tok::Plus => Op::Add,
                Tok::Minus => Op::Sub,
                _ => return Ok(left),
            };
            self.advance()?;
            let right = self.parse_multiplicative()?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Node, ExprError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.current {
                Tok::Star => Op::Mul,
                Tok::Slash => Op::Div,
                Tok::Percent => Op::Mod,
                _ => return Ok(left),
            };
            self.advance()?;
            let right = self.parse_unary()?;
            left = Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Node, ExprError> {
        if self.current == Tok::Minus {
            self.advance()?;
            let operand = self.parse_unary()?;
            return Ok(Node::Neg(Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Node, ExprError> {
        match std::mem::replace(&mut self.current, Tok::Eof) {
            Tok::Integer(n) => {
                self.advance()?;
                Ok(Node::Integer(n))
            }
            Tok::Float(n) => {
                self.advance()?;
                Ok(Node::Float(n))
            }
            Tok::Str(s) => {
                self.advance()?;
                Ok(Node::Str(s))
            }
            Tok::Ident(name) => {
                self.advance()?;
                if self.current == Tok::LParen {
                    self.advance()?;
                    let mut args = Vec::new();
                    if self.current != Tok::RParen {
                        loop {
                            args.push(self.parse_expression()?);
                            if self.current != Tok::Comma {
                                break;
                            }
                            self.advance()?;
                        }
                    }
                    self.expect(Tok::RParen)?;
                    Ok(Node::Call { name, args })
                } else {
                    Ok(Node::Var(name))
                }
            }
            Tok::LParen => {
                self.advance()?;
                let expr = self.parse_expression()?;
                self.expect(Tok::RParen)?;
                Ok(expr)
            }
            tok => Err(ExprError::Parse(format!("unexpected token {:?}", tok))),
        }
    }
}

/// A parsed expression, evaluated against a set of named variables.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use ducto::expr::Expression;
/// use ducto::Value;
///
/// let expr = Expression::parse("a - 1").unwrap();
/// let mut vars = HashMap::new();
/// vars.insert("a".to_string(), Value::Integer(7));
/// assert_eq!(expr.eval(&vars).unwrap(), Value::Integer(6));
/// ```
pub struct Expression {
    root: Node,
}

impl Expression {
    pub fn parse(src: &str) -> Result<Expression, ExprError> {
        let mut parser = Parser::new(src)?;
        let root = parser.parse_expression()?;
        if parser.current != Tok::Eof {
            return Err(ExprError::Parse(format!(
                "trailing input after expression: {:?}",
                parser.current
            )));
        }
        Ok(Expression { root })
    }

    pub fn eval(&self, vars: &HashMap<String, Value>) -> Result<Value, ExprError> {
        eval_node(&self.root, vars)
    }
}

fn eval_node(node: &Node, vars: &HashMap<String, Value>) -> Result<Value, ExprError> {
    match node {
        Node::Integer(n) => Ok(Value::Integer(*n)),
        Node::Float(n) => Ok(Value::Float(*n)),
        Node::Str(s) => Ok(Value::String(s.clone())),
        Node::Var(name) => vars
            .get(name)
            .cloned()
            .ok_or_else(|| ExprError::UnknownVariable(name.clone())),
        Node::Neg(operand) => {
            let v = eval_node(operand, vars)?;
            let d = numeric(&v)?;
            Ok(decimal_value(-d)?)
        }
        Node::Binary { op, left, right } => {
            let lv = eval_node(left, vars)?;
            let rv = eval_node(right, vars)?;
            apply_binop(*op, &lv, &rv)
        }
        Node::Call { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_node(arg, vars)?);
            }
            apply_call(name, &values)
        }
    }
}

fn apply_binop(op: Op, left: &Value, right: &Value) -> Result<Value, ExprError> {
    match op {
        Op::Add => {
            if let (Value::String(a), Value::String(b)) = (left, right) {
                return Ok(Value::String(format!("{}{}", a, b)));
            }
            decimal_value(numeric(left)? + numeric(right)?)
        }
        Op::Sub => decimal_value(numeric(left)? - numeric(right)?),
        Op::Mul => decimal_value(numeric(left)? * numeric(right)?),
        Op::Div => {
            let divisor = numeric(right)?;
            if divisor == Decimal::ZERO {
                return Err(ExprError::DivisionByZero);
            }
            decimal_value(numeric(left)? / divisor)
        }
        Op::Mod => {
            let divisor = numeric(right)?;
            if divisor == Decimal::ZERO {
                return Err(ExprError::DivisionByZero);
            }
            decimal_value(numeric(left)? % divisor)
        }
        Op::Eq => Ok(Value::Boolean(loose_eq(left, right))),
        Op::Ne => Ok(Value::Boolean(!loose_eq(left, right))),
        Op::Lt => Ok(Value::Boolean(numeric(left)? < numeric(right)?)),
        Op::Le => Ok(Value::Boolean(numeric(left)? <= numeric(right)?)),
        Op::Gt => Ok(Value::Boolean(numeric(left)? > numeric(right)?)),
        Op::Ge => Ok(Value::Boolean(numeric(left)? >= numeric(right)?)),
        Op::And => Ok(Value::Boolean(left.as_bool() && right.as_bool())),
        Op::Or => Ok(Value::Boolean(left.as_bool() || right.as_bool())),
    }
}

/// Equality with numeric tolerance: integers and floats representing the
/// same number compare equal; everything else falls back to strict
/// equality.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (numeric(left), numeric(right)) {
        (Ok(a), Ok(b)) => a == b,
        _ => left == right,
    }
}

fn apply_call(name: &str, args: &[Value]) -> Result<Value, ExprError> {
    match name.to_uppercase().as_str() {
        "IF" => {
            if args.len() != 3 {
                return Err(ExprError::BadArity("IF expects 3 arguments".to_string()));
            }
            if args[0].as_bool() {
                Ok(args[1].clone())
            } else {
                Ok(args[2].clone())
            }
        }
        "MIN" | "MAX" => {
            if args.is_empty() {
                return Err(ExprError::BadArity(format!(
                    "{} expects at least 1 argument",
                    name
                )));
            }
            let mut best = numeric(&args[0])?;
            for arg in &args[1..] {
                let d = numeric(arg)?;
                let keep = if name.eq_ignore_ascii_case("MIN") {
                    d < best
                } else {
                    d > best
                };
                if keep {
                    best = d;
                }
            }
            decimal_value(best)
        }
        "ABS" => {
            if args.len() != 1 {
                return Err(ExprError::BadArity("ABS expects 1 argument".to_string()));
            }
            decimal_value(numeric(&args[0])?.abs())
        }
        "ROUND" => {
            if args.len() != 1 {
                return Err(ExprError::BadArity("ROUND expects 1 argument".to_string()));
            }
            decimal_value(numeric(&args[0])?.round())
        }
        _ => Err(ExprError::UnknownFunction(name.to_string())),
    }
}

/// Lift a value into Decimal arithmetic. Null counts as zero so unseeded
/// folds can start from absence.
fn numeric(v: &Value) -> Result<Decimal, ExprError> {
    match v {
        Value::Integer(n) => {
            Decimal::from_i64(*n).ok_or_else(|| ExprError::Type("integer out of range".into()))
        }
        Value::Float(n) => Decimal::from_f64(*n)
            .ok_or_else(|| ExprError::Type("float is not representable".into())),
        Value::Null => Ok(Decimal::ZERO),
        other => Err(ExprError::Type(format!(
            "expected a number, got {}",
            other.type_name()
        ))),
    }
}

fn decimal_value(d: Decimal) -> Result<Value, ExprError> {
    if d.is_integer()
        && let Some(n) = d.to_i64()
    {
        return Ok(Value::Integer(n));
    }
    d.to_f64()
        .map(Value::Float)
        .ok_or_else(|| ExprError::Type("result is not representable".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(src: &str, vars: &[(&str, Value)]) -> Result<Value, ExprError> {
        let mut map = HashMap::new();
        for (k, v) in vars {
            map.insert(k.to_string(), v.clone());
        }
        Expression::parse(src)?.eval(&map)
    }

    #[test]
    fn test_integer_preservation() {
        assert_eq!(eval("4 - 1", &[]), Ok(Value::Integer(3)));
        assert_eq!(eval("7 / 2", &[]), Ok(Value::Float(3.5)));
        assert_eq!(eval("3.5 * 2", &[]), Ok(Value::Integer(7)));
    }

    #[test]
    fn test_variables() {
        assert_eq!(
            eval("a - 1", &[("a", Value::Integer(7))]),
            Ok(Value::Integer(6))
        );
        assert_eq!(
            eval("acc + v", &[("acc", Value::Null), ("v", Value::Integer(5))]),
            Ok(Value::Integer(5))
        );
        assert_eq!(
            eval("b", &[]),
            Err(ExprError::UnknownVariable("b".into()))
        );
    }

    #[test]
    fn test_if_and_modulo() {
        assert_eq!(
            eval("IF(a%2==1, a+1, a)", &[("a", Value::Integer(3))]),
            Ok(Value::Integer(4))
        );
        assert_eq!(
            eval("IF(a%2==1, a+1, a)", &[("a", Value::Integer(4))]),
            Ok(Value::Integer(4))
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("1 + 2 * 3", &[]), Ok(Value::Integer(7)));
        assert_eq!(eval("(1 + 2) * 3", &[]), Ok(Value::Integer(9)));
        assert_eq!(eval("-2 * 3", &[]), Ok(Value::Integer(-6)));
    }

    #[test]
    fn test_comparisons_and_logic() {
        assert_eq!(eval("2 < 3 and 3 < 2", &[]), Ok(Value::Boolean(false)));
        assert_eq!(eval("2 < 3 or 3 < 2", &[]), Ok(Value::Boolean(true)));
        assert_eq!(eval("1 == 1.0", &[]), Ok(Value::Boolean(true)));
        assert_eq!(eval("'a' != 'b'", &[]), Ok(Value::Boolean(true)));
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("MIN(3, 1, 2)", &[]), Ok(Value::Integer(1)));
        assert_eq!(eval("max(3, 1, 2)", &[]), Ok(Value::Integer(3)));
        assert_eq!(eval("ABS(-4)", &[]), Ok(Value::Integer(4)));
        assert_eq!(eval("ROUND(2.4)", &[]), Ok(Value::Integer(2)));
        assert_eq!(
            eval("NOPE(1)", &[]),
            Err(ExprError::UnknownFunction("NOPE".into()))
        );
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(eval("1 / 0", &[]), Err(ExprError::DivisionByZero));
        assert_eq!(eval("1 % 0", &[]), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn test_string_concat() {
        assert_eq!(
            eval("'hello' + ' ' + 'world'", &[]),
            Ok(Value::String("hello world".into()))
        );
    }
}
