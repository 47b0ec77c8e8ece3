//! Reference lexer: turns C source text into a `Vec<Token>`.
//!
//! This is a minimal stand-in for the "preprocessed C tokens" upstream
//! collaborator spec §6 describes — it exists so the crate is runnable
//! end-to-end, not because tokenizing is where this crate's engineering
//! weight lives. It has no macro expansion, no trigraph handling, and no
//! line-splicing; `//` and `/* */` comments are skipped as a convenience.

use crate::location::SourceLocation;
use crate::token::{Token, TokenKind};

const KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "int", "long", "register", "return", "short",
    "signed", "sizeof", "static", "struct", "switch", "typedef", "union", "unsigned", "void",
    "volatile", "while",
];

const C99_KEYWORDS: &[&str] = &["inline", "restrict"];

/// Three-character punctuation, checked before two- and one-character forms.
const PUNCT_3: &[&str] = &["<<=", ">>=", "..."];
const PUNCT_2: &[&str] = &[
    "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=", "&&", "||", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=",
];

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    source: &'a str,
    allow_c99: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, allow_c99: bool) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            source,
            allow_c99,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn loc(&self) -> SourceLocation {
        SourceLocation::new(self.line, self.column)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while self.peek().is_some() && self.peek() != Some('\n') {
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    while self.peek().is_some()
                        && !(self.peek() == Some('*') && self.peek_at(1) == Some('/'))
                    {
                        self.advance();
                    }
                    self.advance();
                    self.advance();
                }
                _ => break,
            }
        }
    }

    fn is_ident_start(c: char) -> bool {
        c.is_ascii_alphabetic() || c == '_'
    }

    fn is_ident_continue(c: char) -> bool {
        c.is_ascii_alphanumeric() || c == '_'
    }

    fn lex_identifier_or_keyword(&mut self) -> Token {
        let loc = self.loc();
        let start = self.pos;
        while self.peek().map(Self::is_ident_continue).unwrap_or(false) {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let is_keyword = KEYWORDS.contains(&text.as_str())
            || (self.allow_c99 && C99_KEYWORDS.contains(&text.as_str()));
        let kind = if is_keyword {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Token::new(kind, text, loc)
    }

    fn lex_number(&mut self) -> Token {
        let loc = self.loc();
        let start = self.pos;
        while self
            .peek()
            .map(|c| c.is_ascii_alphanumeric())
            .unwrap_or(false)
        {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        Token::new(TokenKind::IntegerLiteral, text, loc)
    }

    fn lex_char_literal(&mut self) -> Token {
        let loc = self.loc();
        self.advance(); // opening quote
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '\'' {
                break;
            }
            if c == '\\' {
                text.push(c);
                self.advance();
                if let Some(escaped) = self.peek() {
                    text.push(escaped);
                    self.advance();
                }
                continue;
            }
            text.push(c);
            self.advance();
        }
        self.advance(); // closing quote
        Token::new(TokenKind::CharLiteral, text, loc)
    }

    fn lex_string_literal(&mut self) -> Token {
        let loc = self.loc();
        self.advance(); // opening quote
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c == '"' {
                break;
            }
            if c == '\\' {
                text.push(c);
                self.advance();
                if let Some(escaped) = self.peek() {
                    text.push(escaped);
                    self.advance();
                }
                continue;
            }
            text.push(c);
            self.advance();
        }
        self.advance(); // closing quote
        Token::new(TokenKind::StringLiteral, text, loc)
    }

    fn lex_punctuation(&mut self) -> Token {
        let loc = self.loc();
        let rest: String = self.chars[self.pos..].iter().take(3).collect();
        for p in PUNCT_3 {
            if rest.starts_with(p) {
                for _ in 0..3 {
                    self.advance();
                }
                return Token::new(TokenKind::Punctuation, *p, loc);
            }
        }
        for p in PUNCT_2 {
            if rest.starts_with(p) {
                for _ in 0..2 {
                    self.advance();
                }
                return Token::new(TokenKind::Punctuation, *p, loc);
            }
        }
        let c = self.advance().expect("caller checked peek().is_some()");
        Token::new(TokenKind::Punctuation, c.to_string(), loc)
    }

    pub fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let Some(c) = self.peek() else { break };
            let tok = if Self::is_ident_start(c) {
                self.lex_identifier_or_keyword()
            } else if c.is_ascii_digit() {
                self.lex_number()
            } else if c == '\'' {
                self.lex_char_literal()
            } else if c == '"' {
                self.lex_string_literal()
            } else {
                self.lex_punctuation()
            };
            tokens.push(tok);
        }
        let _ = self.source;
        tokens
    }
}

pub fn tokenize(source: &str, allow_c99: bool) -> Vec<Token> {
    Lexer::new(source, allow_c99).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.value.as_str()).collect()
    }

    #[test]
    fn tokenizes_a_simple_function() {
        let toks = tokenize("int f(int x){ return x + 1; }", false);
        assert_eq!(
            texts(&toks),
            vec![
                "int", "f", "(", "int", "x", ")", "{", "return", "x", "+", "1", ";", "}"
            ]
        );
        assert_eq!(toks[0].kind, TokenKind::Keyword);
        assert_eq!(toks[1].kind, TokenKind::Identifier);
    }

    #[test]
    fn skips_line_and_block_comments() {
        let toks = tokenize("int x; // trailing\n/* block */ int y;", false);
        assert_eq!(texts(&toks), vec!["int", "x", ";", "int", "y", ";"]);
    }

    #[test]
    fn restrict_is_keyword_only_under_c99() {
        let c89 = tokenize("restrict", false);
        assert_eq!(c89[0].kind, TokenKind::Identifier);
        let c99 = tokenize("restrict", true);
        assert_eq!(c99[0].kind, TokenKind::Keyword);
    }

    #[test]
    fn multi_char_operators_lex_as_single_tokens() {
        let toks = tokenize("a <<= b", false);
        assert_eq!(texts(&toks), vec!["a", "<<=", "b"]);
    }

    #[test]
    fn string_and_char_literals() {
        let toks = tokenize(r#" 'a' "hi\n" "#, false);
        assert_eq!(toks[0].kind, TokenKind::CharLiteral);
        assert_eq!(toks[0].value, "a");
        assert_eq!(toks[1].kind, TokenKind::StringLiteral);
        assert_eq!(toks[1].value, "hi\\n");
    }
}
