//! Character stream -> token stream, with line-buffered source for
//! diagnostics.
//!
//! The lexer is pull-based: `next_token` scans exactly one token per call and
//! is driven by the parser's one-token look-ahead (`Parser::cur`/`advance`).

use crate::diagnostics::{Diagnostic, Result};
use crate::pos::{Pos, Span};
use crate::token::{Token, TokenKind};

pub struct Lexer {
    chars: Vec<char>,
    /// Index of the next unread character (the "true" pre-read position).
    idx: usize,
    row: usize,
    col: usize,
    /// Source broken into lines, growing as the lexer advances, for
    /// diagnostic rendering against `pos.row`.
    pub lines: Vec<String>,
    cur_line: String,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            idx: 0,
            row: 0,
            col: 0,
            lines: Vec::new(),
            cur_line: String::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.idx).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.chars.get(self.idx + 1).copied()
    }

    fn pos(&self) -> Pos {
        Pos::new(self.row, self.col)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.idx += 1;
        if c == '\n' {
            self.lines.push(std::mem::take(&mut self.cur_line));
            self.row += 1;
            self.col = 0;
        } else {
            self.cur_line.push(c);
            self.col += 1;
        }
        Some(c)
    }

    /// Flush the in-progress line into `lines` without consuming more input;
    /// used once lexing finishes so the last (possibly unterminated) line is
    /// available for diagnostics.
    fn finish_lines(&mut self) {
        if !self.cur_line.is_empty() || self.lines.len() == self.row {
            self.lines.push(self.cur_line.clone());
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace_and_comments();
        self.finish_lines();
        let start = self.pos();

        let Some(c) = self.peek() else {
            return Ok(Token::new(TokenKind::Eof, start, 0));
        };

        if c.is_ascii_alphabetic() || c == '_' || c == '@' {
            return self.lex_ident(start);
        }
        if c.is_ascii_digit() {
            return self.lex_number(start);
        }
        if c == '\'' {
            return self.lex_char(start);
        }

        match c {
            ';' => self.single(TokenKind::Eol, start),
            ',' => self.single(TokenKind::Comma, start),
            '{' => self.single(TokenKind::LBrace, start),
            '}' => self.single(TokenKind::RBrace, start),
            '(' => self.single(TokenKind::LParen, start),
            ')' => self.single(TokenKind::RParen, start),
            ':' => self.single(TokenKind::Colon, start),
            '*' | '/' | '+' | '%' => {
                self.bump();
                Ok(Token::new(TokenKind::BinOp(c.to_string()), start, 1))
            }
            '-' => {
                self.bump();
                // Binary vs. unary is a parser-level decision (primary
                // position reparses `-` as UnOp); the lexer always emits
                // BinOp and lets the parser choose.
                Ok(Token::new(TokenKind::BinOp("-".to_string()), start, 1))
            }
            '<' | '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::new(
                        TokenKind::BinOp(format!("{c}=")),
                        start,
                        2,
                    ))
                } else {
                    Ok(Token::new(TokenKind::BinOp(c.to_string()), start, 1))
                }
            }
            '=' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::new(TokenKind::BinOp("==".to_string()), start, 2))
                } else {
                    Ok(Token::new(TokenKind::Assign, start, 1))
                }
            }
            '!' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(Token::new(TokenKind::BinOp("!=".to_string()), start, 2))
                } else {
                    Ok(Token::new(TokenKind::UnOp("!".to_string()), start, 1))
                }
            }
            other => Err(Diagnostic::spanning(
                "invalid token found",
                Span::point(start),
            ).also(format!("unexpected character '{other}'"))),
        }
    }

    fn single(&mut self, kind: TokenKind, start: Pos) -> Result<Token> {
        self.bump();
        Ok(Token::new(kind, start, 1))
    }

    fn lex_ident(&mut self, start: Pos) -> Result<Token> {
        let mut s = String::new();
        s.push(self.bump().unwrap());
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                s.push(self.bump().unwrap());
            } else {
                break;
            }
        }
        let len = s.chars().count();
        let kind = match s.as_str() {
            "fn" => TokenKind::Fn,
            "pub" => TokenKind::Pub,
            "ret" => TokenKind::Ret,
            "var" => TokenKind::Var,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            _ => TokenKind::Ident(s),
        };
        Ok(Token::new(kind, start, len))
    }

    fn lex_number(&mut self, start: Pos) -> Result<Token> {
        let mut s = String::new();

        // Radix prefix.
        let radix = if self.peek() == Some('0')
            && matches!(self.peek2(), Some('x') | Some('b') | Some('o'))
        {
            let marker = self.peek2().unwrap();
            s.push(self.bump().unwrap());
            s.push(self.bump().unwrap());
            match marker {
                'x' => 16,
                'b' => 2,
                _ => 8,
            }
        } else {
            10
        };

        // Digits belonging to the mantissa, one past the radix prefix; `.`
        // terminates this loop whether or not it is ultimately legal, so the
        // float-literal check below always sees the full integer part.
        while let Some(c) = self.peek() {
            if c == '_' {
                s.push(self.bump().unwrap());
                continue;
            }
            if c.is_ascii_hexdigit() {
                let in_radix = match radix {
                    16 => true,
                    2 => c == '0' || c == '1',
                    8 => ('0'..='7').contains(&c),
                    _ => c.is_ascii_digit(),
                };
                if !in_radix {
                    // A digit character out of range for the radix (e.g. `2`
                    // in a binary literal) is always a lexical error; a
                    // non-digit letter (the start of a type suffix) is left
                    // for the suffix scan below instead.
                    if c.is_ascii_digit() && radix != 16 {
                        return Err(Diagnostic::spanning(
                            "invalid digit in binary/octal literal",
                            Span::point(self.pos()),
                        ));
                    }
                    break;
                }
                s.push(self.bump().unwrap());
            } else {
                break;
            }
        }

        // A `.` is only legal in a decimal literal.
        if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            if s.starts_with("0x") || s.starts_with("0b") || s.starts_with("0o") {
                return Err(Diagnostic::spanning(
                    "hexadecimal/binary/octal float literal is not supported",
                    Span::new(start, s.len() + 1),
                ));
            }
            s.push(self.bump().unwrap()); // '.'
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == '_' {
                    s.push(self.bump().unwrap());
                } else {
                    break;
                }
            }
        }

        // Optional type suffix: [iuf]digits (f only for decimal).
        if let Some(c) = self.peek() {
            if c == 'i' || c == 'u' || c == 'f' {
                let mut suffix = String::new();
                suffix.push(self.bump().unwrap());
                while let Some(d) = self.peek() {
                    if d.is_ascii_digit() {
                        suffix.push(self.bump().unwrap());
                    } else {
                        break;
                    }
                }
                s += &suffix;
            }
        }

        let len = s.chars().count();
        Ok(Token::new(TokenKind::Number(s), start, len))
    }

    fn lex_char(&mut self, start: Pos) -> Result<Token> {
        self.bump(); // opening apostrophe
        let value: u32 = match self.peek() {
            None => {
                return Err(Diagnostic::spanning(
                    "missing apostrophe or literal too large for a single character",
                    Span::point(start),
                ));
            }
            Some('\'') => {
                return Err(Diagnostic::spanning(
                    "cannot have empty character literal",
                    Span::point(start),
                ));
            }
            Some('\\') => {
                self.bump();
                match self.bump() {
                    Some('0') => 0,
                    Some('n') => b'\n' as u32,
                    Some('\'') => b'\'' as u32,
                    Some(other) => {
                        return Err(Diagnostic::spanning(
                            format!("unrecognized escape character '\\{other}'"),
                            Span::point(start),
                        ));
                    }
                    None => {
                        return Err(Diagnostic::spanning(
                            "missing apostrophe or literal too large for a single character",
                            Span::point(start),
                        ));
                    }
                }
            }
            Some(c) => {
                self.bump();
                c as u32
            }
        };
        if self.peek() != Some('\'') {
            return Err(Diagnostic::spanning(
                "missing apostrophe or literal too large for a single character",
                Span::point(start),
            ));
        }
        self.bump();
        // Widened to the numeric-literal form the analyzer already knows how
        // to parse uniformly.
        Ok(Token::new(
            TokenKind::Character(format!("{value}i8")),
            start,
            3,
        ))
    }
}

// Small ergonomic helper so lexical errors can optionally carry a more
// specific message than the generic "invalid token found" without a second
// Diagnostic variant.
trait AlsoExt {
    fn also(self, msg: String) -> Diagnostic;
}

impl AlsoExt for Diagnostic {
    fn also(self, msg: String) -> Diagnostic {
        Diagnostic { message: msg, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lex = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lex.next_token().unwrap();
            let done = tok.is_eof();
            out.push(tok.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn keywords_and_idents() {
        assert_eq!(
            kinds("fn pub ret var if else while break continue foo"),
            vec![
                TokenKind::Fn,
                TokenKind::Pub,
                TokenKind::Ret,
                TokenKind::Var,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::While,
                TokenKind::Break,
                TokenKind::Continue,
                TokenKind::Ident("foo".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn intrinsic_name_is_an_identifier() {
        assert_eq!(kinds("@out")[0], TokenKind::Ident("@out".into()));
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(kinds("# hello\nfoo"), vec![TokenKind::Ident("foo".into()), TokenKind::Eof]);
    }

    #[test]
    fn number_literals_keep_radix_and_suffix() {
        assert_eq!(
            kinds("42u16 0x1F 0b101 0o17 1.5f64 1_000"),
            vec![
                TokenKind::Number("42u16".into()),
                TokenKind::Number("0x1F".into()),
                TokenKind::Number("0b101".into()),
                TokenKind::Number("0o17".into()),
                TokenKind::Number("1.5f64".into()),
                TokenKind::Number("1_000".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn hex_float_is_rejected() {
        let mut lex = Lexer::new("0x1.5");
        assert!(lex.next_token().is_err());
    }

    #[test]
    fn char_literal_widens_to_numeric_form() {
        assert_eq!(kinds("'H'")[0], TokenKind::Character("72i8".into()));
        assert_eq!(kinds("'\\n'")[0], TokenKind::Character("10i8".into()));
    }

    #[test]
    fn empty_char_literal_errors() {
        let mut lex = Lexer::new("''");
        assert!(lex.next_token().is_err());
    }

    /// The minimal lexeme `next_token` would have consumed to produce `kind`,
    /// used to re-concatenate a token stream and confirm it re-lexes
    /// identically.
    fn lexeme(kind: &TokenKind) -> &str {
        match kind {
            TokenKind::Eof => "",
            TokenKind::Eol => ";",
            TokenKind::Comma => ",",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Colon => ":",
            TokenKind::Fn => "fn",
            TokenKind::Pub => "pub",
            TokenKind::Ret => "ret",
            TokenKind::Var => "var",
            TokenKind::Assign => "=",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::BinOp(s) | TokenKind::UnOp(s) => s,
            TokenKind::Ident(s) => s,
            TokenKind::Number(s) => s,
            TokenKind::Character(_) => unreachable!("no literal re-lexes to the widened form"),
        }
    }

    #[test]
    fn relexing_minimal_whitespace_reconstruction_is_a_fixed_point() {
        let src = "pub fn fact(n: u32): u32 { var r: u32 = 1; while n > 0 : n = n - 1 { r = r * n; } ret r; }";
        let original = kinds(src);
        let rebuilt: String = original
            .iter()
            .filter(|k| !matches!(k, TokenKind::Eof))
            .map(lexeme)
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(kinds(&rebuilt), original);
    }

    #[test]
    fn operators() {
        assert_eq!(
            kinds("<= >= == != < > = !"),
            vec![
                TokenKind::BinOp("<=".into()),
                TokenKind::BinOp(">=".into()),
                TokenKind::BinOp("==".into()),
                TokenKind::BinOp("!=".into()),
                TokenKind::BinOp("<".into()),
                TokenKind::BinOp(">".into()),
                TokenKind::Assign,
                TokenKind::UnOp("!".into()),
                TokenKind::Eof,
            ]
        );
    }
}
