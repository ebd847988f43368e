//! Function-call argument parsing.
//!
//! Model-produced argument text is JSON in spirit but not always in
//! letter: single-quoted strings, Python-style `True`/`False`/`None`,
//! and trailing commas all show up in practice. Parsing is two-stage:
//! strict JSON first, then a permissive literal parser that accepts
//! those deviations. Anything that fails both stages is malformed.

use maestro_core::error::AgentError;
use maestro_core::message::FunctionCall;
use serde_json::{Map, Value};

/// Parse argument text into an arguments map.
///
/// An empty or whitespace-only payload means a call with no arguments.
pub fn parse_arguments(text: &str) -> Result<Map<String, Value>, AgentError> {
    if text.trim().is_empty() {
        return Ok(Map::new());
    }

    let value = match serde_json::from_str::<Value>(text) {
        Ok(v) => v,
        Err(_) => parse_literal(text)
            .map_err(|e| AgentError::MalformedCall(format!("{e} in arguments: {text}")))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(AgentError::MalformedCall(format!(
            "arguments must be an object, got: {other}"
        ))),
    }
}

/// Parse a reconstructed streaming call payload of the form
/// `{"name": <name>, "arguments": <object or string>}`.
///
/// The arguments may arrive as a nested object or as a string holding
/// more JSON, in which case they go through [`parse_arguments`] again.
pub fn parse_function_payload(payload: &str) -> Result<FunctionCall, AgentError> {
    let value = match serde_json::from_str::<Value>(payload) {
        Ok(v) => v,
        Err(_) => parse_literal(payload)
            .map_err(|e| AgentError::MalformedCall(format!("{e} in payload: {payload}")))?,
    };

    let Value::Object(mut map) = value else {
        return Err(AgentError::MalformedCall(format!(
            "call payload must be an object: {payload}"
        )));
    };

    let name = match map.remove("name") {
        Some(Value::String(name)) => name,
        _ => {
            return Err(AgentError::MalformedCall(format!(
                "call payload has no function name: {payload}"
            )));
        }
    };

    let arguments = match map.remove("arguments") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(args)) => args,
        Some(Value::String(text)) => parse_arguments(&text)?,
        Some(other) => {
            return Err(AgentError::MalformedCall(format!(
                "arguments must be an object, got: {other}"
            )));
        }
    };

    Ok(FunctionCall { name, arguments })
}

// ── Permissive literal parser ─────────────────────────────────────────────

/// Parse a JSON-like literal, accepting single-quoted strings, Python
/// booleans and `None`, and trailing commas.
fn parse_literal(text: &str) -> Result<Value, String> {
    let chars: Vec<char> = text.chars().collect();
    let mut parser = Literal {
        chars: &chars,
        pos: 0,
    };
    let value = parser.value()?;
    parser.skip_whitespace();
    if parser.pos < parser.chars.len() {
        return Err(format!("trailing input at offset {}", parser.pos));
    }
    Ok(value)
}

struct Literal<'a> {
    chars: &'a [char],
    pos: usize,
}

impl Literal<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn eat(&mut self, expected: char) -> Result<(), String> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(format!("expected '{expected}', found '{c}'")),
            None => Err(format!("expected '{expected}', found end of input")),
        }
    }

    fn value(&mut self) -> Result<Value, String> {
        self.skip_whitespace();
        match self.peek() {
            Some('{') => self.object(),
            Some('[') => self.array(),
            Some('"') | Some('\'') => Ok(Value::String(self.string()?)),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_alphabetic() => self.word(),
            Some(c) => Err(format!("unexpected character '{c}'")),
            None => Err("unexpected end of input".into()),
        }
    }

    fn object(&mut self) -> Result<Value, String> {
        self.eat('{')?;
        let mut map = Map::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }
            let key = self.string()?;
            self.skip_whitespace();
            self.eat(':')?;
            let value = self.value()?;
            map.insert(key, value);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some('}') => {}
                _ => return Err("expected ',' or '}' in object".into()),
            }
        }
    }

    fn array(&mut self) -> Result<Value, String> {
        self.eat('[')?;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() == Some(']') {
                self.pos += 1;
                return Ok(Value::Array(items));
            }
            items.push(self.value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                }
                Some(']') => {}
                _ => return Err("expected ',' or ']' in array".into()),
            }
        }
    }

    fn string(&mut self) -> Result<String, String> {
        let quote = match self.bump() {
            Some(q @ ('"' | '\'')) => q,
            Some(c) => return Err(format!("expected string, found '{c}'")),
            None => return Err("expected string, found end of input".into()),
        };

        let mut out = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(c @ ('"' | '\'' | '\\' | '/')) => out.push(c),
                    Some('u') => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let digit = self
                                .bump()
                                .and_then(|c| c.to_digit(16))
                                .ok_or("invalid unicode escape")?;
                            code = code * 16 + digit;
                        }
                        out.push(char::from_u32(code).ok_or("invalid unicode escape")?);
                    }
                    Some(c) => return Err(format!("invalid escape '\\{c}'")),
                    None => return Err("unterminated string".into()),
                },
                Some(c) => out.push(c),
                None => return Err("unterminated string".into()),
            }
        }
    }

    fn number(&mut self) -> Result<Value, String> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
        {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        serde_json::from_str::<Value>(&text).map_err(|_| format!("invalid number '{text}'"))
    }

    fn word(&mut self) -> Result<Value, String> {
        let start = self.pos;
        while self.peek().is_some_and(char::is_alphabetic) {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "true" | "True" => Ok(Value::Bool(true)),
            "false" | "False" => Ok(Value::Bool(false)),
            "null" | "None" => Ok(Value::Null),
            other => Err(format!("unexpected word '{other}'")),
        }
    }
}
