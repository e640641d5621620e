//! Tokenizer for IEC 61131-3 Structured Text
//!
//! Produces a flat token stream with 0-indexed source positions. The
//! tokenizer never fails: malformed input becomes an `Error` token plus
//! a diagnostic, and scanning continues on the next character, so the
//! parser always has something to resynchronize on.
//!
//! Keywords are case-insensitive. Typed literals (`T#`, `D#`, `TOD#`,
//! `DT#`, `16#`, `2#`) are recognized here so the parser only ever sees
//! fully-formed literal tokens with their raw lexemes preserved.

use rung_core::diag::Diagnostic;
use rung_core::{Span, time};

/// Keywords of the subset of ST this toolchain understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kw {
    Program,
    EndProgram,
    Type,
    EndType,
    Struct,
    EndStruct,
    Var,
    VarInput,
    VarOutput,
    VarGlobal,
    VarExternal,
    Constant,
    Retain,
    At,
    EndVar,
    Array,
    Of,
    If,
    Then,
    Elsif,
    Else,
    EndIf,
    Case,
    EndCase,
    For,
    To,
    By,
    Do,
    EndFor,
    While,
    EndWhile,
    Repeat,
    Until,
    EndRepeat,
    Exit,
    Continue,
    And,
    Or,
    Xor,
    Not,
    Mod,
    True,
    False,
}

impl Kw {
    /// Keyword lookup; IEC 61131-3 keywords are case-insensitive
    pub fn from_ident(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PROGRAM" => Some(Kw::Program),
            "END_PROGRAM" => Some(Kw::EndProgram),
            "TYPE" => Some(Kw::Type),
            "END_TYPE" => Some(Kw::EndType),
            "STRUCT" => Some(Kw::Struct),
            "END_STRUCT" => Some(Kw::EndStruct),
            "VAR" => Some(Kw::Var),
            "VAR_INPUT" => Some(Kw::VarInput),
            "VAR_OUTPUT" => Some(Kw::VarOutput),
            "VAR_GLOBAL" => Some(Kw::VarGlobal),
            "VAR_EXTERNAL" => Some(Kw::VarExternal),
            "CONSTANT" => Some(Kw::Constant),
            "RETAIN" => Some(Kw::Retain),
            "AT" => Some(Kw::At),
            "END_VAR" => Some(Kw::EndVar),
            "ARRAY" => Some(Kw::Array),
            "OF" => Some(Kw::Of),
            "IF" => Some(Kw::If),
            "THEN" => Some(Kw::Then),
            "ELSIF" => Some(Kw::Elsif),
            "ELSE" => Some(Kw::Else),
            "END_IF" => Some(Kw::EndIf),
            "CASE" => Some(Kw::Case),
            "END_CASE" => Some(Kw::EndCase),
            "FOR" => Some(Kw::For),
            "TO" => Some(Kw::To),
            "BY" => Some(Kw::By),
            "DO" => Some(Kw::Do),
            "END_FOR" => Some(Kw::EndFor),
            "WHILE" => Some(Kw::While),
            "END_WHILE" => Some(Kw::EndWhile),
            "REPEAT" => Some(Kw::Repeat),
            "UNTIL" => Some(Kw::Until),
            "END_REPEAT" => Some(Kw::EndRepeat),
            "EXIT" => Some(Kw::Exit),
            "CONTINUE" => Some(Kw::Continue),
            "AND" => Some(Kw::And),
            "OR" => Some(Kw::Or),
            "XOR" => Some(Kw::Xor),
            "NOT" => Some(Kw::Not),
            "MOD" => Some(Kw::Mod),
            "TRUE" => Some(Kw::True),
            "FALSE" => Some(Kw::False),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Kw),
    Identifier,
    Integer(i64),
    Real(f64),
    /// Unquoted string contents
    StringLit(String),
    /// Duration in milliseconds; raw lexeme lives on the token text
    TimeLit(f64),
    /// Days since 1970-01-01 UTC
    DateLit(i64),
    /// Milliseconds since midnight
    TodLit(f64),
    /// Milliseconds since 1970-01-01 UTC
    DtLit(f64),
    /// Hardware address after AT, e.g. `%QX0.1` (captured verbatim)
    DirectAddress,
    Assign,       // :=
    Plus,         // +
    Minus,        // -
    Star,         // *
    Power,        // **
    Slash,        // /
    Equal,        // =
    NotEqual,     // <>
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Ampersand,    // &
    LParen,       // (
    RParen,       // )
    LBracket,     // [
    RBracket,     // ]
    Semicolon,    // ;
    Colon,        // :
    Comma,        // ,
    Dot,          // .
    Range,        // ..
    /// Unrecognized input; carries on as a one-character token
    Error,
}

/// A token with source position information
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Raw lexeme as it appeared in source
    pub text: String,
    /// Line number (0-indexed for LSP compatibility)
    pub line: usize,
    /// Column number (0-indexed)
    pub column: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
            column,
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.line, self.column, self.text.chars().count())
    }

    /// True if this token is the given keyword
    pub fn is_kw(&self, kw: Kw) -> bool {
        self.kind == TokenKind::Keyword(kw)
    }
}

/// Tokenize a whole source text.
///
/// Always returns the tokens scanned so far; lexical problems (unclosed
/// strings or comments, malformed literals) surface as diagnostics next
/// to an `Error` token rather than aborting the scan.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(source).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 0,
            col: 0,
            tokens: Vec::new(),
            diagnostics: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if ch == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn run(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.bump();
            } else if ch == '/' && self.peek_at(1) == Some('/') {
                self.skip_line_comment();
            } else if ch == '(' && self.peek_at(1) == Some('*') {
                self.skip_block_comment();
            } else if ch.is_ascii_digit() {
                self.lex_number();
            } else if ch.is_ascii_alphabetic() || ch == '_' {
                self.lex_word();
            } else if ch == '\'' || ch == '"' {
                self.lex_string(ch);
            } else if ch == '%' {
                self.lex_direct_address();
            } else {
                self.lex_operator();
            }
        }
        (self.tokens, self.diagnostics)
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_block_comment(&mut self) {
        let (line, col) = (self.line, self.col);
        self.bump(); // (
        self.bump(); // *
        loop {
            match self.peek() {
                Some('*') if self.peek_at(1) == Some(')') => {
                    self.bump();
                    self.bump();
                    return;
                }
                Some(_) => {
                    self.bump();
                }
                None => {
                    self.diagnostics.push(Diagnostic::error(
                        "unclosed comment, expected '*)'",
                        Some(Span::new(line, col, 2)),
                    ));
                    return;
                }
            }
        }
    }

    /// Numbers: decimal/real, or based literals `16#FF` / `2#1010`
    fn lex_number(&mut self) {
        let (line, col) = (self.line, self.col);
        let mut text = String::new();

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() || ch == '_' {
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }

        // Based literal: digits so far are the radix
        if self.peek() == Some('#') {
            text.push('#');
            self.bump();
            let mut digits = String::new();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_alphanumeric() || ch == '_' {
                    text.push(ch);
                    digits.push(ch);
                    self.bump();
                } else {
                    break;
                }
            }
            self.push_based_literal(text, digits, line, col);
            return;
        }

        // Real: fractional part only when a digit follows the dot,
        // so `1..5` stays Integer Range Integer
        let mut is_real = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_real = true;
            text.push('.');
            self.bump();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() || ch == '_' {
                    text.push(ch);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some('e' | 'E'))
            && (self.peek_at(1).is_some_and(|c| c.is_ascii_digit())
                || (matches!(self.peek_at(1), Some('+' | '-'))
                    && self.peek_at(2).is_some_and(|c| c.is_ascii_digit())))
        {
            is_real = true;
            text.push(self.bump().unwrap());
            if matches!(self.peek(), Some('+' | '-')) {
                text.push(self.bump().unwrap());
            }
            while let Some(ch) = self.peek() {
                if ch.is_ascii_digit() {
                    text.push(ch);
                    self.bump();
                } else {
                    break;
                }
            }
        }

        let digits: String = text.chars().filter(|c| *c != '_').collect();
        if is_real {
            match digits.parse::<f64>() {
                Ok(v) => self.tokens.push(Token::new(TokenKind::Real(v), text, line, col)),
                Err(_) => self.error_token(text, line, col, "malformed real literal"),
            }
        } else {
            match digits.parse::<i64>() {
                Ok(v) => self
                    .tokens
                    .push(Token::new(TokenKind::Integer(v), text, line, col)),
                Err(_) => self.error_token(text, line, col, "integer literal out of range"),
            }
        }
    }

    fn push_based_literal(&mut self, text: String, digits: String, line: usize, col: usize) {
        let radix_str: String = text.chars().take_while(|c| *c != '#').collect();
        let radix: u32 = match radix_str.parse() {
            Ok(r @ (2 | 8 | 16)) => r,
            _ => {
                self.error_token(text, line, col, "unsupported literal base");
                return;
            }
        };
        let clean: String = digits.chars().filter(|c| *c != '_').collect();
        match i64::from_str_radix(&clean, radix) {
            Ok(v) => self
                .tokens
                .push(Token::new(TokenKind::Integer(v), text, line, col)),
            Err(_) => self.error_token(text, line, col, "malformed based literal"),
        }
    }

    /// Identifiers, keywords, and prefixed time-family literals
    fn lex_word(&mut self) {
        let (line, col) = (self.line, self.col);
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }

        // Typed literal prefix: T#, TIME#, D#, DATE#, TOD#, TIME_OF_DAY#,
        // DT#, DATE_AND_TIME#
        if self.peek() == Some('#') {
            let prefix = text.to_ascii_uppercase();
            let body_chars: &[char] = match prefix.as_str() {
                "T" | "TIME" => &['.', '_'],
                "D" | "DATE" => &['-'],
                "TOD" | "TIME_OF_DAY" => &[':', '.'],
                "DT" | "DATE_AND_TIME" => &['-', ':', '.'],
                _ => {
                    self.bump();
                    text.push('#');
                    self.error_token(text, line, col, "unknown literal prefix");
                    return;
                }
            };
            text.push('#');
            self.bump();
            while let Some(ch) = self.peek() {
                if ch.is_ascii_alphanumeric() || body_chars.contains(&ch) {
                    text.push(ch);
                    self.bump();
                } else {
                    break;
                }
            }
            let kind = match prefix.as_str() {
                "T" | "TIME" => time::parse_time(&text).map(TokenKind::TimeLit),
                "D" | "DATE" => time::parse_date(&text).map(TokenKind::DateLit),
                "TOD" | "TIME_OF_DAY" => time::parse_time_of_day(&text).map(TokenKind::TodLit),
                _ => time::parse_date_and_time(&text).map(TokenKind::DtLit),
            };
            match kind {
                Some(kind) => self.tokens.push(Token::new(kind, text, line, col)),
                None => {
                    let message = format!("malformed literal '{}'", text);
                    self.error_token(text, line, col, &message);
                }
            }
            return;
        }

        let kind = match Kw::from_ident(&text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier,
        };
        self.tokens.push(Token::new(kind, text, line, col));
    }

    /// Single- or double-quoted string; no escape processing beyond a
    /// doubled quote meaning one literal quote character
    fn lex_string(&mut self, quote: char) {
        let (line, col) = (self.line, self.col);
        let mut raw = String::new();
        let mut contents = String::new();
        raw.push(quote);
        self.bump();
        loop {
            match self.peek() {
                Some(ch) if ch == quote => {
                    raw.push(ch);
                    self.bump();
                    if self.peek() == Some(quote) {
                        // Doubled quote: literal quote character
                        raw.push(quote);
                        contents.push(quote);
                        self.bump();
                    } else {
                        self.tokens.push(Token::new(
                            TokenKind::StringLit(contents),
                            raw,
                            line,
                            col,
                        ));
                        return;
                    }
                }
                Some('\n') | None => {
                    self.diagnostics.push(Diagnostic::error(
                        "unclosed string literal, missing closing quote",
                        Some(Span::new(line, col, raw.chars().count())),
                    ));
                    self.tokens
                        .push(Token::new(TokenKind::Error, raw, line, col));
                    return;
                }
                Some(ch) => {
                    raw.push(ch);
                    contents.push(ch);
                    self.bump();
                }
            }
        }
    }

    /// `%QX0.1` and friends; validation happens in the parser
    fn lex_direct_address(&mut self) {
        let (line, col) = (self.line, self.col);
        let mut text = String::from('%');
        self.bump();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '.' {
                text.push(ch);
                self.bump();
            } else {
                break;
            }
        }
        self.tokens
            .push(Token::new(TokenKind::DirectAddress, text, line, col));
    }

    fn lex_operator(&mut self) {
        let (line, col) = (self.line, self.col);
        let ch = self.peek().unwrap();
        let two = self.peek_at(1);

        let (kind, text) = match (ch, two) {
            (':', Some('=')) => (TokenKind::Assign, ":="),
            ('*', Some('*')) => (TokenKind::Power, "**"),
            ('<', Some('>')) => (TokenKind::NotEqual, "<>"),
            ('<', Some('=')) => (TokenKind::LessEqual, "<="),
            ('>', Some('=')) => (TokenKind::GreaterEqual, ">="),
            ('.', Some('.')) => (TokenKind::Range, ".."),
            (':', _) => (TokenKind::Colon, ":"),
            ('*', _) => (TokenKind::Star, "*"),
            ('<', _) => (TokenKind::Less, "<"),
            ('>', _) => (TokenKind::Greater, ">"),
            ('.', _) => (TokenKind::Dot, "."),
            ('+', _) => (TokenKind::Plus, "+"),
            ('-', _) => (TokenKind::Minus, "-"),
            ('/', _) => (TokenKind::Slash, "/"),
            ('=', _) => (TokenKind::Equal, "="),
            ('&', _) => (TokenKind::Ampersand, "&"),
            ('(', _) => (TokenKind::LParen, "("),
            (')', _) => (TokenKind::RParen, ")"),
            ('[', _) => (TokenKind::LBracket, "["),
            (']', _) => (TokenKind::RBracket, "]"),
            (';', _) => (TokenKind::Semicolon, ";"),
            (',', _) => (TokenKind::Comma, ","),
            _ => {
                let text = ch.to_string();
                self.bump();
                let message = format!("unexpected character '{}'", ch);
                self.error_token(text, line, col, &message);
                return;
            }
        };
        for _ in 0..text.len() {
            self.bump();
        }
        self.tokens.push(Token::new(kind, text, line, col));
    }

    fn error_token(&mut self, text: String, line: usize, col: usize, message: &str) {
        self.diagnostics.push(Diagnostic::error(
            message,
            Some(Span::new(line, col, text.chars().count())),
        ));
        self.tokens
            .push(Token::new(TokenKind::Error, text, line, col));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let (tokens, diags) = tokenize(source);
        assert!(diags.is_empty(), "unexpected diagnostics: {:?}", diags);
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords_case_insensitive() {
        assert_eq!(kinds("IF"), vec![TokenKind::Keyword(Kw::If)]);
        assert_eq!(kinds("if"), vec![TokenKind::Keyword(Kw::If)]);
        assert_eq!(kinds("End_If"), vec![TokenKind::Keyword(Kw::EndIf)]);
    }

    #[test]
    fn test_integer_literals() {
        assert_eq!(kinds("42"), vec![TokenKind::Integer(42)]);
        assert_eq!(kinds("1_000"), vec![TokenKind::Integer(1000)]);
        assert_eq!(kinds("16#FF"), vec![TokenKind::Integer(255)]);
        assert_eq!(kinds("16#dead_beef"), vec![TokenKind::Integer(0xDEAD_BEEF)]);
        assert_eq!(kinds("2#1010"), vec![TokenKind::Integer(10)]);
    }

    #[test]
    fn test_real_literals() {
        assert_eq!(kinds("3.25"), vec![TokenKind::Real(3.25)]);
        assert_eq!(kinds("1.0e3"), vec![TokenKind::Real(1000.0)]);
        assert_eq!(kinds("2.5E-1"), vec![TokenKind::Real(0.25)]);
    }

    #[test]
    fn test_range_is_not_a_real() {
        assert_eq!(
            kinds("1..5"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Range,
                TokenKind::Integer(5)
            ]
        );
    }

    #[test]
    fn test_time_literal_tokens() {
        assert_eq!(kinds("T#500ms"), vec![TokenKind::TimeLit(500.0)]);
        assert_eq!(kinds("TIME#1h30m"), vec![TokenKind::TimeLit(5_400_000.0)]);
        let (tokens, _) = tokenize("t#2m500ms");
        assert_eq!(tokens[0].kind, TokenKind::TimeLit(120_500.0));
        assert_eq!(tokens[0].text, "t#2m500ms");
    }

    #[test]
    fn test_date_family_tokens() {
        assert_eq!(kinds("D#2024-01-15"), vec![TokenKind::DateLit(19_737)]);
        assert_eq!(
            kinds("TOD#14:30:00.500"),
            vec![TokenKind::TodLit(52_200_500.0)]
        );
        assert_eq!(
            kinds("DT#1970-01-01-00:00:01"),
            vec![TokenKind::DtLit(1_000.0)]
        );
    }

    #[test]
    fn test_strings_both_quotes() {
        assert_eq!(
            kinds("'hello'"),
            vec![TokenKind::StringLit("hello".to_string())]
        );
        assert_eq!(
            kinds("\"world\""),
            vec![TokenKind::StringLit("world".to_string())]
        );
        assert_eq!(
            kinds("'it''s'"),
            vec![TokenKind::StringLit("it's".to_string())]
        );
    }

    #[test]
    fn test_unclosed_string_reports() {
        let (tokens, diags) = tokenize("'oops");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Error);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unclosed string"));
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("a (* block\ncomment *) b // rest\nc"),
            vec![
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::Identifier
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("x := a ** 2 <> b;"),
            vec![
                TokenKind::Identifier,
                TokenKind::Assign,
                TokenKind::Identifier,
                TokenKind::Power,
                TokenKind::Integer(2),
                TokenKind::NotEqual,
                TokenKind::Identifier,
                TokenKind::Semicolon
            ]
        );
    }

    #[test]
    fn test_direct_address() {
        let (tokens, diags) = tokenize("%QX0.1");
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::DirectAddress);
        assert_eq!(tokens[0].text, "%QX0.1");
    }

    #[test]
    fn test_positions_are_zero_indexed() {
        let (tokens, _) = tokenize("a\n  b");
        assert_eq!((tokens[0].line, tokens[0].column), (0, 0));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 2));
    }
}
