//! DM-script tokenizer.
//!
//! Identifiers are case-insensitive in DM-script and are lowercased here, so
//! later stages compare names directly.

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    // Literals
    Number(f64),
    Str(String),
    Ident(String),

    // Punctuation
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Dot,
    Question,
    Colon,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PlusPlus,
    MinusMinus,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: usize,
}

struct Lexer<'a> {
    src: &'a [char],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.src.get(self.pos).copied();
        if let Some(c) = ch {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
            }
        }
        ch
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Syntax {
            line: self.line,
            message: message.into(),
        }
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match (self.peek(), self.peek2()) {
                (Some(c), _) if c.is_whitespace() => {
                    self.advance();
                }
                (Some('/'), Some('/')) => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                (Some('/'), Some('*')) => {
                    let start = self.line;
                    self.advance();
                    self.advance();
                    loop {
                        match self.advance() {
                            Some('*') if self.peek() == Some('/') => {
                                self.advance();
                                break;
                            }
                            Some(_) => {}
                            None => {
                                return Err(Error::Syntax {
                                    line: start,
                                    message: "unterminated comment".into(),
                                })
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_number(&mut self, first: char) -> Result<Tok> {
        let mut s = String::from(first);
        while matches!(self.peek(), Some('0'..='9')) {
            s.extend(self.advance());
        }
        if self.peek() == Some('.') && matches!(self.peek2(), Some('0'..='9')) {
            s.extend(self.advance());
            while matches!(self.peek(), Some('0'..='9')) {
                s.extend(self.advance());
            }
        }
        if matches!(self.peek(), Some('e' | 'E'))
            && (matches!(self.peek2(), Some('0'..='9'))
                || (matches!(self.peek2(), Some('+' | '-'))
                    && matches!(self.src.get(self.pos + 2), Some('0'..='9'))))
        {
            s.extend(self.advance());
            if matches!(self.peek(), Some('+' | '-')) {
                s.extend(self.advance());
            }
            while matches!(self.peek(), Some('0'..='9')) {
                s.extend(self.advance());
            }
        }
        s.parse()
            .map(Tok::Number)
            .map_err(|_| self.error(format!("invalid number {s}")))
    }

    fn read_string(&mut self) -> Result<Tok> {
        let start = self.line;
        let mut s = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => {
                    return Err(Error::Syntax {
                        line: start,
                        message: "unterminated string".into(),
                    })
                }
                Some('\\') => match self.advance() {
                    Some('n') => s.push('\n'),
                    Some('r') => s.push('\r'),
                    Some('t') => s.push('\t'),
                    Some('0') => s.push('\0'),
                    Some(c) => s.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some('"') => return Ok(Tok::Str(s)),
                Some(c) => s.push(c),
            }
        }
    }

    fn read_ident(&mut self, first: char) -> Tok {
        let mut s = String::from(first);
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            s.extend(self.advance());
        }
        Tok::Ident(s.to_ascii_lowercase())
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia()?;
        let line = self.line;
        let ch = match self.advance() {
            None => return Ok(Token { tok: Tok::Eof, line }),
            Some(c) => c,
        };

        let tok = match ch {
            '0'..='9' => self.read_number(ch)?,
            '.' if matches!(self.peek(), Some('0'..='9')) => self.read_number(ch)?,
            '"' => self.read_string()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.read_ident(c),
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '{' => Tok::LBrace,
            '}' => Tok::RBrace,
            ',' => Tok::Comma,
            ';' => Tok::Semi,
            '.' => Tok::Dot,
            '?' => Tok::Question,
            ':' => Tok::Colon,
            '%' => Tok::Percent,
            '+' if self.eat('+') => Tok::PlusPlus,
            '+' if self.eat('=') => Tok::PlusAssign,
            '+' => Tok::Plus,
            '-' if self.eat('-') => Tok::MinusMinus,
            '-' if self.eat('=') => Tok::MinusAssign,
            '-' => Tok::Minus,
            '*' if self.eat('=') => Tok::StarAssign,
            '*' => Tok::Star,
            '/' if self.eat('=') => Tok::SlashAssign,
            '/' => Tok::Slash,
            '!' if self.eat('=') => Tok::Ne,
            '!' => Tok::Bang,
            '=' if self.eat('=') => Tok::Eq,
            '=' => Tok::Assign,
            '<' if self.eat('=') => Tok::Le,
            '<' => Tok::Lt,
            '>' if self.eat('=') => Tok::Ge,
            '>' => Tok::Gt,
            '&' if self.eat('&') => Tok::AndAnd,
            '|' if self.eat('|') => Tok::OrOr,
            other => return Err(self.error(format!("unexpected character {other:?}"))),
        };
        Ok(Token { tok, line })
    }
}

/// Split `src` into tokens, ending with [`Tok::Eof`].
pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut lexer = Lexer {
        src: &chars,
        pos: 0,
        line: 1,
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.tok == Tok::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}
