//! Recursive-descent parser over the token stream

use super::error::FormatError;
use super::tokenizer::{Spanned, Token, Tokenizer};
use super::value::{JsonObject, JsonValue};

/// Nesting bound so hostile input cannot exhaust the stack
const MAX_DEPTH: usize = 128;

pub(crate) struct Parser<'a> {
    tokens: Tokenizer<'a>,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            tokens: Tokenizer::new(src),
            depth: 0,
        }
    }

    /// Parse a single value and require the input to end afterwards
    pub(crate) fn parse_document(mut self) -> Result<JsonValue, FormatError> {
        let value = self.parse_value()?;
        let trailing = self.tokens.next_token()?;
        if trailing.token != Token::Eof {
            return Err(unexpected(&trailing, "end of input"));
        }
        Ok(value)
    }

    fn parse_value(&mut self) -> Result<JsonValue, FormatError> {
        let spanned = self.tokens.next_token()?;
        match spanned.token {
            Token::LeftBrace => self.nested(spanned.position, Self::parse_object),
            Token::LeftBracket => self.nested(spanned.position, Self::parse_array),
            Token::String(s) => Ok(JsonValue::String(s)),
            Token::Number(ref raw) => parse_number(raw, spanned.position),
            Token::True => Ok(JsonValue::Bool(true)),
            Token::False => Ok(JsonValue::Bool(false)),
            Token::Null => Ok(JsonValue::Null),
            _ => Err(unexpected(&spanned, "a value")),
        }
    }

    fn nested(
        &mut self,
        position: usize,
        parse: fn(&mut Self) -> Result<JsonValue, FormatError>,
    ) -> Result<JsonValue, FormatError> {
        if self.depth >= MAX_DEPTH {
            return Err(FormatError::new(position, "nesting too deep"));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Called after the opening '{' has been consumed
    fn parse_object(&mut self) -> Result<JsonValue, FormatError> {
        let mut obj = JsonObject::new();

        if self.tokens.peek()?.token == Token::RightBrace {
            self.tokens.next_token()?;
            return Ok(JsonValue::Object(obj));
        }

        loop {
            let key = match self.tokens.next_token()? {
                Spanned {
                    token: Token::String(key),
                    ..
                } => key,
                other => return Err(unexpected(&other, "a string key")),
            };

            let colon = self.tokens.next_token()?;
            if colon.token != Token::Colon {
                return Err(unexpected(&colon, "':' after object key"));
            }

            let value = self.parse_value()?;
            obj.insert(key, value);

            let separator = self.tokens.next_token()?;
            match separator.token {
                Token::Comma => continue,
                Token::RightBrace => return Ok(JsonValue::Object(obj)),
                _ => return Err(unexpected(&separator, "',' or '}' in object")),
            }
        }
    }

    /// Called after the opening '[' has been consumed
    fn parse_array(&mut self) -> Result<JsonValue, FormatError> {
        let mut items = Vec::new();

        if self.tokens.peek()?.token == Token::RightBracket {
            self.tokens.next_token()?;
            return Ok(JsonValue::Array(items));
        }

        loop {
            items.push(self.parse_value()?);

            let separator = self.tokens.next_token()?;
            match separator.token {
                Token::Comma => continue,
                Token::RightBracket => return Ok(JsonValue::Array(items)),
                _ => return Err(unexpected(&separator, "',' or ']' in array")),
            }
        }
    }
}

fn unexpected(found: &Spanned, expected: &str) -> FormatError {
    FormatError::new(
        found.position,
        format!("expected {}, found {}", expected, found.token.describe()),
    )
}

/// Literals with a fraction or exponent become floats; integers that do not
/// fit in i64 fall back to floats as well.
fn parse_number(raw: &str, position: usize) -> Result<JsonValue, FormatError> {
    let is_float = raw.contains(['.', 'e', 'E']);
    if !is_float {
        if let Ok(n) = raw.parse::<i64>() {
            return Ok(JsonValue::Integer(n));
        }
    }
    raw.parse::<f64>()
        .map(JsonValue::Float)
        .map_err(|_| FormatError::new(position, format!("invalid number {}", raw)))
}
