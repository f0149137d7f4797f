//! Minimal expression grammar for `print`
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := '-' factor | '(' expr ')' | literal | name ('.' key)*
//! ```
//!
//! Names resolve against the current variable bindings only. `+` adds
//! numbers or concatenates strings; mixing the two is an error.

use serde_json::{Number, Value};
use thiserror::Error;

use crate::script::Bindings;

#[derive(Error, Debug, PartialEq)]
pub enum ExprError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("cannot apply '{op}' to {left} and {right}")]
    Type {
        op: char,
        left: &'static str,
        right: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
}

type ExprResult<T> = std::result::Result<T, ExprError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64, bool),
    Str(String),
    Ident(String),
    Op(char),
    LParen,
    RParen,
}

fn tokenize(input: &str) -> ExprResult<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let mut s = String::new();
                i += 1;
                loop {
                    match chars.get(i).copied() {
                        None => return Err(ExprError::Syntax("unterminated string".to_string())),
                        Some(ch) if ch == c => break,
                        Some('\\') if i + 1 < chars.len() => {
                            s.push(chars[i + 1]);
                            i += 2;
                            continue;
                        }
                        Some(ch) => s.push(ch),
                    }
                    i += 1;
                }
                tokens.push(Token::Str(s));
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| ExprError::Syntax(format!("bad number '{}'", text)))?;
                tokens.push(Token::Number(value, !text.contains('.')));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(ExprError::Syntax(format!("unexpected '{}'", other))),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    vars: &'a Bindings,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        tok
    }

    fn expr(&mut self) -> ExprResult<Value> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let right = self.term()?;
            left = apply(op, left, right)?;
        }
        Ok(left)
    }

    fn term(&mut self) -> ExprResult<Value> {
        let mut left = self.factor()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek().cloned() {
            self.pos += 1;
            let right = self.factor()?;
            left = apply(op, left, right)?;
        }
        Ok(left)
    }

    fn factor(&mut self) -> ExprResult<Value> {
        match self.next() {
            Some(Token::Op('-')) => {
                let inner = self.factor()?;
                apply('-', Value::from(0), inner)
            }
            Some(Token::LParen) => {
                let inner = self.expr()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ExprError::Syntax("expected ')'".to_string())),
                }
            }
            Some(Token::Number(n, integral)) => Ok(number(n, integral)),
            Some(Token::Str(s)) => Ok(Value::String(s)),
            Some(Token::Ident(name)) => self.resolve(&name),
            Some(tok) => Err(ExprError::Syntax(format!("unexpected {:?}", tok))),
            None => Err(ExprError::Syntax("unexpected end of expression".to_string())),
        }
    }

    fn resolve(&self, name: &str) -> ExprResult<Value> {
        match name {
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            "null" => return Ok(Value::Null),
            _ => {}
        }

        if let Some(value) = self.vars.get(name) {
            return Ok(value.clone());
        }

        // dotted access into a structured variable
        let mut parts = name.split('.');
        let head = parts.next().unwrap_or_default();
        let mut current = self
            .vars
            .get(head)
            .ok_or_else(|| ExprError::UnknownVariable(name.to_string()))?;
        for key in parts {
            current = match current {
                Value::Object(map) => map.get(key),
                Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(|| ExprError::UnknownVariable(name.to_string()))?;
        }
        Ok(current.clone())
    }
}

fn number(n: f64, integral: bool) -> Value {
    if integral && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn kind(v: &Value) -> &'static str {
    crate::matcher::type_name(v)
}

fn apply(op: char, left: Value, right: Value) -> ExprResult<Value> {
    match (&left, &right) {
        (Value::String(a), Value::String(b)) if op == '+' => Ok(Value::String(format!("{a}{b}"))),
        (Value::Number(a), Value::Number(b)) => {
            if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
                let exact = match op {
                    '+' => x.checked_add(y),
                    '-' => x.checked_sub(y),
                    '*' => x.checked_mul(y),
                    _ => None,
                };
                if let Some(v) = exact {
                    return Ok(Value::from(v));
                }
            }
            let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            let v = match op {
                '+' => x + y,
                '-' => x - y,
                '*' => x * y,
                _ => {
                    if y == 0.0 {
                        return Err(ExprError::DivisionByZero);
                    }
                    x / y
                }
            };
            Ok(number(v, false))
        }
        _ => Err(ExprError::Type {
            op,
            left: kind(&left),
            right: kind(&right),
        }),
    }
}

/// Evaluate an expression against the bindings
pub fn evaluate(input: &str, vars: &Bindings) -> ExprResult<Value> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExprError::Syntax("empty expression".to_string()));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        vars,
    };
    let value = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(ExprError::Syntax(format!(
            "unexpected trailing {:?}",
            parser.tokens[parser.pos]
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars() -> Bindings {
        let mut b = Bindings::new();
        b.insert("name".to_string(), json!("Ana"));
        b.insert("count".to_string(), json!(3));
        b.insert("user".to_string(), json!({"id": 9, "roles": ["admin"]}));
        b
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(evaluate("'Hello ' + name", &vars()).unwrap(), json!("Hello Ana"));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(evaluate("count * 2 + 1", &vars()).unwrap(), json!(7));
        assert_eq!(evaluate("(count + 1) / 2", &vars()).unwrap(), json!(2.0));
        assert_eq!(evaluate("-count", &vars()).unwrap(), json!(-3));
    }

    #[test]
    fn test_dotted_lookup() {
        assert_eq!(evaluate("user.id", &vars()).unwrap(), json!(9));
        assert_eq!(evaluate("user.roles.0", &vars()).unwrap(), json!("admin"));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            evaluate("missing", &vars()).unwrap_err(),
            ExprError::UnknownVariable("missing".to_string())
        );
        assert!(matches!(
            evaluate("name + count", &vars()).unwrap_err(),
            ExprError::Type { .. }
        ));
        assert!(matches!(evaluate("1 +", &vars()).unwrap_err(), ExprError::Syntax(_)));
        assert_eq!(evaluate("1 / 0", &vars()).unwrap_err(), ExprError::DivisionByZero);
        assert!(matches!(evaluate("hello world", &vars()).unwrap_err(), ExprError::UnknownVariable(_)));
    }

    #[test]
    fn test_no_host_access() {
        // anything outside the grammar is rejected rather than executed
        assert!(evaluate("__import__('os')", &vars()).is_err());
        assert!(evaluate("a; b", &vars()).is_err());
    }
}
