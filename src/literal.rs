//! A parser for the tiny subset of script literals resource lists are written in.
//!
//! Accepts a single string literal or an array of string literals, with
//! comments, whitespace and a trailing comma. Anything else is rejected;
//! nothing is ever evaluated.

use std::fmt;

/// Why a literal could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.message, self.offset)
    }
}

impl std::error::Error for LiteralError {}

/// A parsed literal and the byte range it spans in the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringList {
    pub values: Vec<String>,
    pub start: usize,
    pub end: usize,
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LiteralError> {
        loop {
            let rest = &self.src[self.pos..];
            if let Some(ch) = rest.chars().next().filter(|c| c.is_whitespace()) {
                self.pos += ch.len_utf8();
            } else if rest.starts_with("//") {
                self.pos += rest.find('\n').unwrap_or(rest.len());
            } else if rest.starts_with("/*") {
                let close = rest[2..]
                    .find("*/")
                    .ok_or_else(|| self.error("unterminated comment"))?;
                self.pos += close + 4;
            } else {
                return Ok(());
            }
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"' | '`')) => q,
            _ => return Err(self.error("expected a string literal")),
        };

        let mut value = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string literal")),
                Some(ch) if ch == quote => return Ok(value),
                Some('$') if quote == '`' && self.peek() == Some('{') => {
                    return Err(self.error("template substitutions are not supported"));
                }
                Some('\\') => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some('\n') => {}
                    Some(other) => value.push(other),
                    None => return Err(self.error("unterminated escape")),
                },
                Some('\n') if quote != '`' => return Err(self.error("newline in string literal")),
                Some(ch) => value.push(ch),
            }
        }
    }
}

/// Parse a string literal or an array of string literals starting at `offset`.
pub fn parse_string_list(src: &str, offset: usize) -> Result<StringList, LiteralError> {
    let mut cursor = Cursor { src, pos: offset };
    cursor.skip_trivia()?;
    let start = cursor.pos;

    let values = match cursor.peek() {
        Some('[') => {
            cursor.bump();
            let mut values = Vec::new();
            loop {
                cursor.skip_trivia()?;
                match cursor.peek() {
                    Some(']') => {
                        cursor.bump();
                        break;
                    }
                    Some('\'' | '"' | '`') => values.push(cursor.string()?),
                    Some(_) => return Err(cursor.error("only string literals are allowed")),
                    None => return Err(cursor.error("unterminated array literal")),
                }
                cursor.skip_trivia()?;
                match cursor.bump() {
                    Some(',') => {}
                    Some(']') => break,
                    _ => return Err(cursor.error("expected ',' or ']'")),
                }
            }
            values
        }
        Some('\'' | '"' | '`') => vec![cursor.string()?],
        _ => return Err(cursor.error("expected a string or an array of strings")),
    };

    Ok(StringList {
        values,
        start,
        end: cursor.pos,
    })
}

/// Encode `value` as a double-quoted script string literal.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
