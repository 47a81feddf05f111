use text_size::{TextRange, TextSize};

use crate::ParseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    IntLiteral,
    LongLiteral,
    FloatLiteral,
    DoubleLiteral,
    CharLiteral,
    StringLiteral,
    Punct,
    LineComment,
    BlockComment,
    DocComment,
    Eof,
}

impl TokenKind {
    pub fn is_trivia(self) -> bool {
        matches!(
            self,
            TokenKind::LineComment | TokenKind::BlockComment | TokenKind::DocComment
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub range: TextRange,
}

/// `>>` and `>>>` are never produced: the parser reassembles shifts from
/// adjacent `>` tokens so that nested generic arguments close cleanly.
const PUNCTUATION: &[&str] = &[
    "...", "<<=", "->", "::", "++", "--", "&&", "||", "==", "!=", "<=", ">=", "+=", "-=", "*=",
    "/=", "%=", "&=", "|=", "^=", "<<", "(", ")", "{", "}", "[", "]", ";", ",", ".", "@", "=",
    ">", "<", "!", "~", "?", ":", "+", "-", "*", "/", "&", "|", "^", "%",
];

pub fn lex(input: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer {
        input,
        pos: 0,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl Lexer<'_> {
    fn run(&mut self) -> Result<(), ParseError> {
        while let Some(c) = self.peek_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
                continue;
            }
            let start = self.pos;
            let kind = if self.rest().starts_with("//") {
                self.eat_while(|c| c != '\n');
                TokenKind::LineComment
            } else if self.rest().starts_with("/*") {
                self.block_comment(start)?
            } else if c == '_' || c == '$' || unicode_ident::is_xid_start(c) {
                self.eat_while(|c| c == '_' || c == '$' || unicode_ident::is_xid_continue(c));
                TokenKind::Ident
            } else if c.is_ascii_digit()
                || (c == '.' && self.nth_byte(1).is_some_and(|b| b.is_ascii_digit()))
            {
                self.number()
            } else if c == '"' {
                self.quoted(start, '"')?;
                TokenKind::StringLiteral
            } else if c == '\'' {
                self.quoted(start, '\'')?;
                TokenKind::CharLiteral
            } else if let Some(p) = PUNCTUATION.iter().find(|p| self.rest().starts_with(**p)) {
                self.pos += p.len();
                TokenKind::Punct
            } else {
                return Err(self.error(start, format!("unexpected character `{c}`")));
            };
            self.push(kind, start);
        }
        let end = self.pos;
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            text: String::new(),
            range: TextRange::empty(TextSize::from(end as u32)),
        });
        Ok(())
    }

    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn nth_byte(&self, n: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + n).copied()
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while let Some(c) = self.peek_char() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn block_comment(&mut self, start: usize) -> Result<TokenKind, ParseError> {
        let doc = self.rest().starts_with("/**") && !self.rest().starts_with("/**/");
        match self.input[self.pos + 2..].find("*/") {
            Some(end) => {
                self.pos += 2 + end + 2;
                Ok(if doc {
                    TokenKind::DocComment
                } else {
                    TokenKind::BlockComment
                })
            }
            None => Err(self.error(start, "unterminated block comment")),
        }
    }

    fn number(&mut self) -> TokenKind {
        let rest = self.rest();
        if ["0x", "0X", "0b", "0B"].iter().any(|p| rest.starts_with(p)) {
            self.pos += 2;
            self.eat_while(|c| c.is_ascii_hexdigit() || c == '_');
            return self.integer_suffix();
        }
        let mut is_floating = false;
        self.eat_while(|c| c.is_ascii_digit() || c == '_');
        if self.peek_char() == Some('.') && self.nth_byte(1).is_some_and(|b| b.is_ascii_digit()) {
            is_floating = true;
            self.pos += 1;
            self.eat_while(|c| c.is_ascii_digit() || c == '_');
        } else if self.peek_char() == Some('.')
            && !self.nth_byte(1).is_some_and(|b| b.is_ascii_alphabetic() || b == b'.')
        {
            // `1.` is a valid double literal.
            is_floating = true;
            self.pos += 1;
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            let sign = matches!(self.nth_byte(1), Some(b'+' | b'-'));
            let digit_at = if sign { 2 } else { 1 };
            if self.nth_byte(digit_at).is_some_and(|b| b.is_ascii_digit()) {
                is_floating = true;
                self.pos += digit_at;
                self.eat_while(|c| c.is_ascii_digit() || c == '_');
            }
        }
        match self.peek_char() {
            Some('f' | 'F') => {
                self.pos += 1;
                TokenKind::FloatLiteral
            }
            Some('d' | 'D') => {
                self.pos += 1;
                TokenKind::DoubleLiteral
            }
            _ if is_floating => TokenKind::DoubleLiteral,
            _ => self.integer_suffix(),
        }
    }

    fn integer_suffix(&mut self) -> TokenKind {
        if matches!(self.peek_char(), Some('l' | 'L')) {
            self.pos += 1;
            TokenKind::LongLiteral
        } else {
            TokenKind::IntLiteral
        }
    }

    fn quoted(&mut self, start: usize, quote: char) -> Result<(), ParseError> {
        self.pos += 1;
        loop {
            match self.peek_char() {
                None | Some('\n') => {
                    return Err(self.error(start, "unterminated literal"));
                }
                Some('\\') => {
                    self.pos += 1;
                    if let Some(c) = self.peek_char() {
                        self.pos += c.len_utf8();
                    }
                }
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(c) => self.pos += c.len_utf8(),
            }
        }
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token {
            kind,
            text: self.input[start..self.pos].to_string(),
            range: TextRange::new(TextSize::from(start as u32), TextSize::from(self.pos as u32)),
        });
    }

    fn error(&self, start: usize, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            range: TextRange::new(
                TextSize::from(start as u32),
                TextSize::from(self.pos.max(start) as u32),
            ),
        }
    }
}
