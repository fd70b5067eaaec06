//! Arithmetic expression evaluation.
//!
//! Expressions are parsed by a small recursive-descent grammar; nothing
//! outside it (names, attribute access, strings) can be evaluated.
//!
//! ```text
//! expr  := term (('+' | '-') term)*
//! term  := unary (('*' | '/' | '//' | '%') unary)*
//! unary := ('+' | '-') unary | power
//! power := atom (('**' | '^') unary)?
//! atom  := number | name '(' args? ')' | '(' expr ')'
//! args  := arg (',' arg)*
//! arg   := expr | '[' expr (',' expr)* ']'
//! ```

use std::fmt;
use thiserror::Error;

/// Nesting beyond this depth is rejected.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected '{0}'")]
    UnexpectedToken(String),

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("name '{0}' is not defined")]
    UnknownName(String),

    #[error("{0}() {1}")]
    BadArguments(&'static str, &'static str),

    #[error("lists are only allowed as function arguments")]
    StrayList,

    #[error("division by zero")]
    DivisionByZero,

    #[error("math domain error")]
    Domain,

    #[error("result too large")]
    Overflow,

    #[error("expression is nested too deeply")]
    TooDeep,
}

pub type Result<T> = std::result::Result<T, CalcError>;

/// A numeric value. Integer arithmetic stays integral until an operation
/// needs a float.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn as_f64(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(x) => x,
        }
    }

    fn is_zero(self) -> bool {
        self.as_f64() == 0.0
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Number::Int(n) => write!(f, "{n}"),
            Number::Float(x) => f.write_str(&format_float(x)),
        }
    }
}

/// Shortest round-trip form, always with a fractional part or exponent
/// (`210.0`, `0.1`, `1e+16`).
fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".into();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.into();
    }

    let magnitude = x.abs();
    if magnitude != 0.0 && !(1e-4..1e16).contains(&magnitude) {
        let formatted = format!("{x:e}");
        if let Some((mantissa, exponent)) = formatted.split_once('e') {
            if let Ok(exponent) = exponent.parse::<i32>() {
                let sign = if exponent < 0 { '-' } else { '+' };
                return format!("{mantissa}e{sign}{:02}", exponent.abs());
            }
        }
        return formatted;
    }

    let formatted = format!("{x}");
    if formatted.contains('.') {
        formatted
    } else {
        format!("{formatted}.0")
    }
}

/// Evaluate an expression.
pub fn evaluate(expression: &str) -> Result<Number> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    match parser.peek() {
        None => Ok(value),
        Some(token) => Err(CalcError::UnexpectedToken(token.to_string())),
    }
}

/// Evaluate an expression and render the tool's reply.
pub fn calculate(expression: &str) -> std::result::Result<String, String> {
    evaluate(expression)
        .map(|n| n.to_string())
        .map_err(|e| format!("Error calculating '{expression}': {e}"))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Number),
    Name(String),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Power,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{n}"),
            Token::Name(name) => f.write_str(name),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::DoubleSlash => f.write_str("//"),
            Token::Percent => f.write_str("%"),
            Token::Power => f.write_str("**"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::Comma => f.write_str(","),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                if i < chars.len() && matches!(chars[i], 'e' | 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && matches!(chars[j], '+' | '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        i = j;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text: String = chars[start..i].iter().collect();
                tokens.push(Token::Num(parse_number(&text)?));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Name(chars[start..i].iter().collect()));
                continue;
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' if chars.get(i + 1) == Some(&'*') => {
                i += 1;
                Token::Power
            }
            '*' => Token::Star,
            '/' if chars.get(i + 1) == Some(&'/') => {
                i += 1;
                Token::DoubleSlash
            }
            '/' => Token::Slash,
            '%' => Token::Percent,
            '^' => Token::Power,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            ',' => Token::Comma,
            other => return Err(CalcError::UnexpectedChar(other)),
        };
        tokens.push(token);
        i += 1;
    }

    Ok(tokens)
}

fn parse_number(text: &str) -> Result<Number> {
    let integral = text.chars().all(|c| c.is_ascii_digit());
    if integral {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Number::Int(n));
        }
    }
    text.parse::<f64>()
        .map(Number::Float)
        .map_err(|_| CalcError::InvalidNumber(text.to_string()))
}

/// A function argument: a scalar or a bracketed list.
enum Arg {
    Scalar(Number),
    List(Vec<Number>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Result<Token> {
        let token = self.tokens.get(self.pos).cloned().ok_or(CalcError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        match self.next()? {
            t if t == token => Ok(()),
            t => Err(CalcError::UnexpectedToken(t.to_string())),
        }
    }

    fn expr(&mut self) -> Result<Number> {
        let mut value = self.term()?;
        loop {
            if self.eat(&Token::Plus) {
                value = add(value, self.term()?)?;
            } else if self.eat(&Token::Minus) {
                value = sub(value, self.term()?)?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> Result<Number> {
        let mut value = self.unary()?;
        loop {
            if self.eat(&Token::Star) {
                value = mul(value, self.unary()?)?;
            } else if self.eat(&Token::Slash) {
                value = div(value, self.unary()?)?;
            } else if self.eat(&Token::DoubleSlash) {
                value = floor_div(value, self.unary()?)?;
            } else if self.eat(&Token::Percent) {
                value = modulo(value, self.unary()?)?;
            } else {
                return Ok(value);
            }
        }
    }

    /// Every recursive path of the grammar passes through here, so this is
    /// where nesting is bounded.
    fn unary(&mut self) -> Result<Number> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<Number> {
        if self.eat(&Token::Minus) {
            return negate(self.unary()?);
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.power()
    }

    fn power(&mut self) -> Result<Number> {
        let base = self.atom()?;
        if self.eat(&Token::Power) {
            // Right-associative, and binds tighter than a unary sign on its left.
            let exponent = self.unary()?;
            return pow(base, exponent);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Number> {
        match self.next()? {
            Token::Num(n) => Ok(n),
            Token::LParen => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Token::Name(name) => {
                self.expect(Token::LParen)?;
                let args = self.args()?;
                call(&name, args)
            }
            Token::LBracket => Err(CalcError::StrayList),
            other => Err(CalcError::UnexpectedToken(other.to_string())),
        }
    }

    fn args(&mut self) -> Result<Vec<Arg>> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.arg()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn arg(&mut self) -> Result<Arg> {
        if !self.eat(&Token::LBracket) {
            return self.expr().map(Arg::Scalar);
        }
        let mut items = Vec::new();
        if self.eat(&Token::RBracket) {
            return Ok(Arg::List(items));
        }
        loop {
            items.push(self.expr()?);
            if self.eat(&Token::RBracket) {
                return Ok(Arg::List(items));
            }
            self.expect(Token::Comma)?;
        }
    }
}

fn call(name: &str, args: Vec<Arg>) -> Result<Number> {
    match name {
        "abs" => match scalars::<1>("abs", args)? {
            [Number::Int(n)] => n.checked_abs().map(Number::Int).ok_or(CalcError::Overflow),
            [Number::Float(x)] => Ok(Number::Float(x.abs())),
        },
        "round" => round(args),
        "min" => extreme("min", args, |a, b| b < a),
        "max" => extreme("max", args, |a, b| b > a),
        "sum" => {
            let values = flatten(args);
            values.into_iter().try_fold(Number::Int(0), add)
        }
        "pow" => {
            let [base, exponent] = scalars::<2>("pow", args)?;
            pow(base, exponent)
        }
        "sqrt" => {
            let [x] = scalars::<1>("sqrt", args)?;
            let x = x.as_f64();
            if x < 0.0 {
                return Err(CalcError::Domain);
            }
            Ok(Number::Float(x.sqrt()))
        }
        other => Err(CalcError::UnknownName(other.to_string())),
    }
}

fn scalars<const N: usize>(name: &'static str, args: Vec<Arg>) -> Result<[Number; N]> {
    let values: Vec<Number> = args
        .into_iter()
        .map(|arg| match arg {
            Arg::Scalar(n) => Ok(n),
            Arg::List(_) => Err(CalcError::BadArguments(name, "expects numbers, not a list")),
        })
        .collect::<Result<_>>()?;
    values
        .try_into()
        .map_err(|_| CalcError::BadArguments(name, "got the wrong number of arguments"))
}

fn flatten(args: Vec<Arg>) -> Vec<Number> {
    args.into_iter()
        .flat_map(|arg| match arg {
            Arg::Scalar(n) => vec![n],
            Arg::List(items) => items,
        })
        .collect()
}

fn extreme(name: &'static str, args: Vec<Arg>, replaces: fn(f64, f64) -> bool) -> Result<Number> {
    let values = flatten(args);
    let mut iter = values.into_iter();
    let first = iter
        .next()
        .ok_or(CalcError::BadArguments(name, "needs at least one value"))?;
    Ok(iter.fold(first, |best, n| {
        if replaces(best.as_f64(), n.as_f64()) { n } else { best }
    }))
}

fn round(args: Vec<Arg>) -> Result<Number> {
    let values = flatten(args);
    match values.as_slice() {
        [Number::Int(n)] => Ok(Number::Int(*n)),
        [Number::Float(x)] => {
            let rounded = x.round_ties_even();
            if !rounded.is_finite() || rounded.abs() >= i64::MAX as f64 {
                return Err(CalcError::Overflow);
            }
            Ok(Number::Int(rounded as i64))
        }
        [Number::Int(n), Number::Int(digits)] => round_int(*n, *digits),
        [x, Number::Int(digits)] => {
            let digits = i32::try_from(*digits).map_err(|_| CalcError::Overflow)?;
            let scale = 10f64.powi(digits);
            Ok(Number::Float((x.as_f64() * scale).round_ties_even() / scale))
        }
        [_, Number::Float(_)] => {
            Err(CalcError::BadArguments("round", "needs an integer digit count"))
        }
        _ => Err(CalcError::BadArguments("round", "takes one or two arguments")),
    }
}

/// Round an integer to `digits` places; negative counts round to tens,
/// hundreds, and so on, with ties going to the even multiple.
fn round_int(n: i64, digits: i64) -> Result<Number> {
    if digits >= 0 {
        return Ok(Number::Int(n));
    }
    let factor = u32::try_from(-digits)
        .ok()
        .and_then(|exp| 10i64.checked_pow(exp));
    let Some(factor) = factor else {
        return Ok(Number::Int(0));
    };

    let quotient = n.div_euclid(factor);
    let twice_remainder = 2 * i128::from(n.rem_euclid(factor));
    let round_up = twice_remainder > i128::from(factor)
        || (twice_remainder == i128::from(factor) && quotient % 2 != 0);
    let quotient = if round_up { quotient + 1 } else { quotient };
    quotient
        .checked_mul(factor)
        .map(Number::Int)
        .ok_or(CalcError::Overflow)
}

fn negate(n: Number) -> Result<Number> {
    match n {
        Number::Int(n) => n.checked_neg().map(Number::Int).ok_or(CalcError::Overflow),
        Number::Float(x) => Ok(Number::Float(-x)),
    }
}

fn add(a: Number, b: Number) -> Result<Number> {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => {
            a.checked_add(b).map(Number::Int).ok_or(CalcError::Overflow)
        }
        _ => Ok(Number::Float(a.as_f64() + b.as_f64())),
    }
}

fn sub(a: Number, b: Number) -> Result<Number> {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => {
            a.checked_sub(b).map(Number::Int).ok_or(CalcError::Overflow)
        }
        _ => Ok(Number::Float(a.as_f64() - b.as_f64())),
    }
}

fn mul(a: Number, b: Number) -> Result<Number> {
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => {
            a.checked_mul(b).map(Number::Int).ok_or(CalcError::Overflow)
        }
        _ => Ok(Number::Float(a.as_f64() * b.as_f64())),
    }
}

fn div(a: Number, b: Number) -> Result<Number> {
    if b.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    Ok(Number::Float(a.as_f64() / b.as_f64()))
}

/// Division rounded toward negative infinity.
fn floor_div(a: Number, b: Number) -> Result<Number> {
    if b.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => {
            let quotient = a.checked_div(b).ok_or(CalcError::Overflow)?;
            let adjust = a % b != 0 && (a < 0) != (b < 0);
            Ok(Number::Int(if adjust { quotient - 1 } else { quotient }))
        }
        _ => Ok(Number::Float((a.as_f64() / b.as_f64()).floor())),
    }
}

/// Remainder taking the sign of the divisor.
fn modulo(a: Number, b: Number) -> Result<Number> {
    if b.is_zero() {
        return Err(CalcError::DivisionByZero);
    }
    match (a, b) {
        (Number::Int(a), Number::Int(b)) => {
            let r = a.checked_rem(b).ok_or(CalcError::Overflow)?;
            Ok(Number::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r }))
        }
        _ => {
            let (a, b) = (a.as_f64(), b.as_f64());
            Ok(Number::Float(a - b * (a / b).floor()))
        }
    }
}

fn pow(base: Number, exponent: Number) -> Result<Number> {
    match (base, exponent) {
        (Number::Int(b), Number::Int(e)) if e >= 0 => {
            let e = u32::try_from(e).map_err(|_| CalcError::Overflow)?;
            b.checked_pow(e).map(Number::Int).ok_or(CalcError::Overflow)
        }
        _ => {
            let (b, e) = (base.as_f64(), exponent.as_f64());
            if b == 0.0 && e < 0.0 {
                return Err(CalcError::DivisionByZero);
            }
            if b < 0.0 && e.fract() != 0.0 {
                return Err(CalcError::Domain);
            }
            let result = b.powf(e);
            if result.is_infinite() {
                return Err(CalcError::Overflow);
            }
            Ok(Number::Float(result))
        }
    }
}
