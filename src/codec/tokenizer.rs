//! Tokenizer for the JSON codec

use super::error::FormatError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Colon,
    String(String),
    /// Raw numeric literal, converted by the parser
    Number(String),
    True,
    False,
    Null,
    Eof,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::LeftBrace => "'{'".to_string(),
            Token::RightBrace => "'}'".to_string(),
            Token::LeftBracket => "'['".to_string(),
            Token::RightBracket => "']'".to_string(),
            Token::Comma => "','".to_string(),
            Token::Colon => "':'".to_string(),
            Token::String(s) => format!("string {:?}", s),
            Token::Number(n) => format!("number {}", n),
            Token::True => "'true'".to_string(),
            Token::False => "'false'".to_string(),
            Token::Null => "'null'".to_string(),
            Token::Eof => "end of input".to_string(),
        }
    }
}

/// A token together with the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub(crate) struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    peeked: Option<Spanned>,
}

impl<'a> Tokenizer<'a> {
    pub(crate) fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            peeked: None,
        }
    }

    pub(crate) fn peek(&mut self) -> Result<&Spanned, FormatError> {
        let spanned = match self.peeked.take() {
            Some(spanned) => spanned,
            None => self.scan()?,
        };
        Ok(self.peeked.insert(spanned))
    }

    pub(crate) fn next_token(&mut self) -> Result<Spanned, FormatError> {
        match self.peeked.take() {
            Some(token) => Ok(token),
            None => self.scan(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn current(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self
            .rest()
            .trim_start_matches([' ', '\t', '\n', '\r']);
        self.pos = self.src.len() - trimmed.len();
    }

    fn scan(&mut self) -> Result<Spanned, FormatError> {
        self.skip_whitespace();
        let position = self.pos;

        let Some(ch) = self.current() else {
            return Ok(Spanned {
                token: Token::Eof,
                position,
            });
        };

        let punctuation = match ch {
            '{' => Some(Token::LeftBrace),
            '}' => Some(Token::RightBrace),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            ',' => Some(Token::Comma),
            ':' => Some(Token::Colon),
            _ => None,
        };

        let token = if let Some(token) = punctuation {
            self.pos += 1;
            token
        } else if ch == '"' {
            Token::String(self.read_string()?)
        } else if ch == '-' || ch.is_ascii_digit() {
            Token::Number(self.read_number()?)
        } else if let Some(token) = self.read_literal() {
            token
        } else {
            return Err(FormatError::new(
                position,
                format!("unexpected character {:?}", ch),
            ));
        };

        Ok(Spanned { token, position })
    }

    fn read_literal(&mut self) -> Option<Token> {
        for (word, token) in [("true", Token::True), ("false", Token::False), ("null", Token::Null)] {
            if self.rest().starts_with(word) {
                self.pos += word.len();
                return Some(token);
            }
        }
        None
    }

    fn read_string(&mut self) -> Result<String, FormatError> {
        let start = self.pos;
        // Opening quote
        self.pos += 1;
        let mut out = String::new();

        loop {
            let Some(ch) = self.current() else {
                return Err(FormatError::new(start, "unterminated string"));
            };
            self.pos += ch.len_utf8();

            match ch {
                '"' => return Ok(out),
                '\\' => out.push(self.read_escape()?),
                _ => out.push(ch),
            }
        }
    }

    fn read_escape(&mut self) -> Result<char, FormatError> {
        let escape_pos = self.pos - 1;
        let Some(ch) = self.current() else {
            return Err(FormatError::new(escape_pos, "unexpected end of string escape"));
        };
        self.pos += ch.len_utf8();

        let decoded = match ch {
            '"' => '"',
            '\\' => '\\',
            '/' => '/',
            'b' => '\u{0008}',
            'f' => '\u{000C}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'u' => return self.read_unicode_escape(escape_pos),
            other => {
                return Err(FormatError::new(
                    escape_pos,
                    format!("invalid escape character \\{}", other),
                ))
            }
        };
        Ok(decoded)
    }

    fn read_hex4(&mut self, escape_pos: usize) -> Result<u32, FormatError> {
        let hex = self
            .rest()
            .get(..4)
            .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
            .ok_or_else(|| FormatError::new(escape_pos, "invalid unicode escape sequence"))?;
        let code = u32::from_str_radix(hex, 16)
            .map_err(|_| FormatError::new(escape_pos, "invalid unicode escape sequence"))?;
        self.pos += 4;
        Ok(code)
    }

    fn read_unicode_escape(&mut self, escape_pos: usize) -> Result<char, FormatError> {
        let high = self.read_hex4(escape_pos)?;

        let code = if (0xD800..0xDC00).contains(&high) {
            // High surrogate must be followed by an escaped low surrogate
            if !self.rest().starts_with("\\u") {
                return Err(FormatError::new(escape_pos, "unpaired surrogate in unicode escape"));
            }
            self.pos += 2;
            let low = self.read_hex4(escape_pos)?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(FormatError::new(escape_pos, "invalid low surrogate in unicode escape"));
            }
            0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
        } else {
            high
        };

        char::from_u32(code)
            .ok_or_else(|| FormatError::new(escape_pos, "unpaired surrogate in unicode escape"))
    }

    fn read_number(&mut self) -> Result<String, FormatError> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut end = self.pos;

        let digits_from = |mut i: usize| {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            i
        };

        if bytes.get(end) == Some(&b'-') {
            end += 1;
        }
        let int_end = digits_from(end);
        if int_end == end {
            return Err(FormatError::new(start, "expected digits in number"));
        }
        end = int_end;

        if bytes.get(end) == Some(&b'.') {
            let frac_end = digits_from(end + 1);
            if frac_end == end + 1 {
                return Err(FormatError::new(start, "expected digits after decimal point"));
            }
            end = frac_end;
        }

        if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
            let mut exp = end + 1;
            if matches!(bytes.get(exp), Some(b'+') | Some(b'-')) {
                exp += 1;
            }
            let exp_end = digits_from(exp);
            if exp_end == exp {
                return Err(FormatError::new(start, "expected digits in exponent"));
            }
            end = exp_end;
        }

        self.pos = end;
        Ok(self.src[start..end].to_string())
    }
}
