//! Calculator tool: evaluates arithmetic expressions.
//!
//! Supports `+`, `-`, `*`, `/`, `%`, `**` / `^` (power), parentheses,
//! unary signs and decimal numbers. Uses a recursive-descent parser; no
//! `eval`, no dependencies beyond std.

use async_trait::async_trait;
use serde_json::{Map, Value};
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{ParamType, Tool, ToolDescriptor, ToolParameter};

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn describe(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "calculator".into(),
            description: "Evaluate a mathematical expression. Supports +, -, *, /, % (modulo), \
                          ** or ^ (power), parentheses, and decimal numbers."
                .into(),
            parameters: vec![ToolParameter::required(
                "expression",
                ParamType::String,
                "The mathematical expression to evaluate, e.g. '(2 + 3) * 4'",
            )],
        }
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let expr = arguments
            .get("expression")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let value = evaluate(expr).map_err(|reason| ToolError::ExecutionFailed {
            tool_name: "calculator".into(),
            reason,
        })?;

        Ok(serde_json::json!({
            "result": number_value(value)?,
            "expression": expr,
        }))
    }
}

/// Whole results become JSON integers (458, not 458.0).
fn number_value(value: f64) -> Result<Value, ToolError> {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return Ok(Value::from(value as i64));
    }
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| ToolError::ExecutionFailed {
            tool_name: "calculator".into(),
            reason: format!("Result is not a finite number: {value}"),
        })
}

// ── Recursive-descent expression evaluator ────────────────────────────────

/// Longest expression accepted, in characters.
pub const MAX_EXPRESSION_LEN: usize = 4096;

/// Deepest nesting of parentheses, signs and exponents accepted.
pub const MAX_DEPTH: usize = 256;

/// Evaluate a mathematical expression string.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    if expr.chars().count() > MAX_EXPRESSION_LEN {
        return Err(format!(
            "Expression too long (limit is {MAX_EXPRESSION_LEN} characters)"
        ));
    }

    let tokens = tokenize(expr)?;
    let mut parser = Parser::new(&tokens);
    let result = parser.parse_expr()?;
    match parser.peek() {
        Some(tok) => Err(format!(
            "Unexpected token at position {}: {tok:?}",
            parser.pos
        )),
        None => Ok(result),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' if chars.next_if(|&(_, next)| next == '*').is_some() => Token::Power,
            '*' => Token::Star,
            '^' => Token::Power,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start + 1;
                while let Some((i, _)) = chars.next_if(|&(_, d)| d.is_ascii_digit() || d == '.') {
                    end = i + 1;
                }
                let literal = &input[start..end];
                let number = literal
                    .parse()
                    .map_err(|_| format!("Invalid number: {literal}"))?;
                Token::Number(number)
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        };
        tokens.push(token);
    }

    if tokens.is_empty() {
        return Err("Empty expression".into());
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    /// Run `f` one nesting level deeper. Every recursive path goes through
    /// here, which bounds stack use.
    fn nested(&mut self, f: impl FnOnce(&mut Self) -> Result<f64, String>) -> Result<f64, String> {
        if self.depth >= MAX_DEPTH {
            return Err(format!(
                "Expression nested too deeply (limit is {MAX_DEPTH} levels)"
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<f64, String> {
        let mut acc = self.parse_term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    acc += self.parse_term()?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    acc -= self.parse_term()?;
                }
                _ => return Ok(acc),
            }
        }
    }

    // term = unary (('*' | '/' | '%') unary)*
    fn parse_term(&mut self) -> Result<f64, String> {
        let mut acc = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(op @ (Token::Star | Token::Slash | Token::Percent)) => op,
                _ => return Ok(acc),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            acc = match op {
                Token::Star => acc * rhs,
                Token::Slash if rhs == 0.0 => return Err("Division by zero".into()),
                Token::Slash => acc / rhs,
                Token::Percent if rhs == 0.0 => return Err("Modulo by zero".into()),
                // Result takes the divisor's sign: -7 % 3 == 2.
                _ => acc - rhs * (acc / rhs).floor(),
            };
        }
    }

    // unary = ('-' | '+')* power
    fn parse_unary(&mut self) -> Result<f64, String> {
        let mut negate = false;
        while let Some(sign @ (Token::Minus | Token::Plus)) = self.peek() {
            self.advance();
            negate ^= sign == Token::Minus;
        }
        let value = self.parse_power()?;
        Ok(if negate { -value } else { value })
    }

    // power = primary (('**' | '^') unary)?   (right-associative)
    fn parse_power(&mut self) -> Result<f64, String> {
        let base = self.parse_primary()?;
        if self.peek() != Some(Token::Power) {
            return Ok(base);
        }
        self.advance();
        let exponent = self.nested(Self::parse_unary)?;
        let value = base.powf(exponent);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(format!("{base} ** {exponent} is not a finite number"))
        }
    }

    // primary = NUMBER | '(' expr ')'
    fn parse_primary(&mut self) -> Result<f64, String> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let inner = self.nested(Self::parse_expr)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected token: {tok:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
