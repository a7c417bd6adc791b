//! Character cursor shared by the graph and structured IR parsers.
//!
//! Both text formats are line oriented, use `//` comments and are tokenized on
//! the fly: the cursor offers whitespace skipping, single-character reads and
//! identifier/number scanning, and turns byte positions into 1-based
//! line/column pairs for [`Error::Parse`].

use crate::core::Error;

pub(crate) struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn set_pos(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.text.as_bytes().get(self.pos + offset).copied()
    }

    pub fn advance(&mut self) {
        if !self.is_eof() {
            self.pos += 1;
        }
    }

    pub fn rest(&self) -> &'a str {
        &self.text[self.pos.min(self.text.len())..]
    }

    /// Skip spaces, newlines and `//` comments.
    pub fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == b'/' && self.peek_at(1) == Some(b'/') {
                while let Some(ch) = self.peek() {
                    self.advance();
                    if ch == b'\n' {
                        break;
                    }
                }
            } else if ch.is_ascii_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Skip to the start of the next line.
    pub fn skip_line(&mut self) {
        while let Some(ch) = self.peek() {
            self.advance();
            if ch == b'\n' {
                break;
            }
        }
    }

    pub fn try_read(&mut self, ch: u8) -> bool {
        self.skip_whitespace();
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, ch: u8) -> Result<(), Error> {
        if self.try_read(ch) {
            return Ok(());
        }
        let found = match self.peek() {
            Some(c) => format!("'{}'", c as char),
            None => "end of input".to_string(),
        };
        Err(self.error(format!("expected '{}' but found {}", ch as char, found)))
    }

    /// Consume `keyword` if it is next and not followed by an identifier character.
    pub fn try_keyword(&mut self, keyword: &str) -> bool {
        self.skip_whitespace();
        if !self.rest().starts_with(keyword) {
            return false;
        }
        let after = self.text.as_bytes().get(self.pos + keyword.len()).copied();
        if after.is_some_and(is_ident_char) {
            return false;
        }
        self.pos += keyword.len();
        true
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> Result<(), Error> {
        if self.try_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", keyword)))
        }
    }

    /// Read `[A-Za-z_][A-Za-z0-9_.-]*`.
    pub fn read_identifier(&mut self) -> Result<&'a str, Error> {
        self.skip_whitespace();
        let start = self.pos;
        match self.peek() {
            Some(ch) if ch.is_ascii_alphabetic() || ch == b'_' => {}
            Some(ch) => return Err(self.error(format!("expected identifier but found '{}'", ch as char))),
            None => return Err(self.error("expected identifier but found end of input")),
        }
        while self.peek().is_some_and(is_ident_char) {
            self.advance();
        }
        Ok(&self.text[start..self.pos])
    }

    /// Read a run of identifier characters, which may start with a digit.
    pub fn read_word(&mut self) -> Result<&'a str, Error> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.advance();
        }
        if start == self.pos {
            return Err(self.error("expected a name"));
        }
        Ok(&self.text[start..self.pos])
    }

    /// Read a numeric or boolean scalar token (`-12`, `2.5e3`, `true`, `inf`).
    pub fn read_scalar_token(&mut self) -> Result<&'a str, Error> {
        self.skip_whitespace();
        let start = self.pos;
        if matches!(self.peek(), Some(b'-') | Some(b'+')) {
            self.advance();
        }
        while let Some(ch) = self.peek() {
            let exponent_sign = (ch == b'-' || ch == b'+')
                && matches!(self.text.as_bytes().get(self.pos.wrapping_sub(1)), Some(b'e') | Some(b'E'));
            if ch.is_ascii_alphanumeric() || ch == b'.' || exponent_sign {
                self.advance();
            } else {
                break;
            }
        }
        if start == self.pos {
            return Err(self.error("expected a literal value"));
        }
        Ok(&self.text[start..self.pos])
    }

    pub fn read_unsigned(&mut self) -> Result<usize, Error> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if start == self.pos {
            return Err(self.error("expected a number"));
        }
        self.text[start..self.pos]
            .parse()
            .map_err(|e| self.error(format!("invalid number: {}", e)))
    }

    /// Skip a balanced `open ... close` group; the cursor must be on `open`.
    pub fn skip_balanced(&mut self, open: u8, close: u8) -> Result<(), Error> {
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(ch) = self.peek() {
            self.advance();
            if ch == open {
                depth += 1;
            } else if ch == close {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
        }
        self.pos = start;
        Err(self.error(format!("unterminated '{}'", open as char)))
    }

    /// Parse error at the current position.
    pub fn error(&self, message: impl Into<String>) -> Error {
        let pos = self.pos.min(self.text.len());
        let before = &self.text[..pos];
        let line = before.bytes().filter(|&b| b == b'\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(nl) => pos - nl,
            None => pos + 1,
        };
        Error::Parse {
            line,
            column,
            message: message.into(),
        }
    }
}

pub(crate) fn is_ident_char(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_' || ch == b'.' || ch == b'-'
}
