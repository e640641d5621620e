//! Recursive-descent parser for Structured Text
//!
//! The parser never fails as a whole. A syntax error is confined to one
//! declaration or one statement: the parser records a diagnostic,
//! resynchronizes at the next `;` or block terminator, and keeps going.
//! The editor depends on this to render live diagrams mid-keystroke.
//!
//! Top-level statements outside a `PROGRAM` block are collected into an
//! implicit unnamed program so snippet-style sources still simulate.

use crate::lexer::{Kw, Token, TokenKind, tokenize};
use regex::Regex;
use rung_core::ast::{
    ArrayRange, BinaryOp, BlockQualifier, CallArg, CaseArm, CaseLabel, DataType, Enumerator,
    Expression, IfBranch, Literal, Program, SourceProgram, Span, Statement, StructField,
    TypeDefinition, TypeKind, UnaryOp, VarRef, VariableBlock, VariableDecl,
};
use rung_core::diag::Diagnostic;
use std::sync::OnceLock;

/// Hardware address shape: `%QX0.1`, `%IW42`, `%MD3.1.4`
fn at_address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^%(I|Q|M)(X|B|W|D|L)[0-9]+(\.[0-9]+)*$").expect("valid address pattern")
    })
}

/// Parse a whole source text into a [`SourceProgram`]
pub fn parse(source: &str) -> SourceProgram {
    Parser::new(source).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

type ParseResult<T> = Result<T, Diagnostic>;

impl Parser {
    pub fn new(source: &str) -> Self {
        let (tokens, diagnostics) = tokenize(source);
        Parser {
            tokens,
            pos: 0,
            diagnostics,
        }
    }

    pub fn parse(mut self) -> SourceProgram {
        let mut programs = Vec::new();
        let mut types = Vec::new();

        // Implicit program for top-level declarations and statements
        let mut loose_blocks: Vec<VariableBlock> = Vec::new();
        let mut loose_body: Vec<Statement> = Vec::new();

        while let Some(kind) = self.current().map(|t| t.kind.clone()) {
            match kind {
                TokenKind::Error => {
                    // Already diagnosed by the lexer
                    self.advance();
                }
                TokenKind::Semicolon => {
                    self.advance();
                }
                TokenKind::Keyword(Kw::Type) => match self.parse_type_block() {
                    Ok(mut defs) => types.append(&mut defs),
                    Err(diag) => {
                        self.diagnostics.push(diag);
                        self.sync_to_kw(Kw::EndType);
                    }
                },
                TokenKind::Keyword(Kw::Program) => match self.parse_program() {
                    Ok(program) => programs.push(program),
                    Err(diag) => {
                        self.diagnostics.push(diag);
                        self.sync_to_kw(Kw::EndProgram);
                    }
                },
                TokenKind::Keyword(
                    Kw::Var | Kw::VarInput | Kw::VarOutput | Kw::VarGlobal | Kw::VarExternal,
                ) => match self.parse_var_block() {
                    Ok(block) => loose_blocks.push(block),
                    Err(diag) => {
                        self.diagnostics.push(diag);
                        self.sync_to_kw(Kw::EndVar);
                    }
                },
                _ => {
                    if let Some(stmt) = self.parse_statement_recovering() {
                        loose_body.push(stmt);
                    }
                }
            }
        }

        if !loose_blocks.is_empty() || !loose_body.is_empty() {
            programs.push(Program {
                name: String::new(),
                blocks: loose_blocks,
                body: loose_body,
                span: Span::default(),
            });
        }

        SourceProgram {
            programs,
            types,
            diagnostics: self.diagnostics,
        }
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn last_span(&self) -> Option<Span> {
        self.tokens.last().map(Token::span)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current().is_some_and(|t| t.kind == *kind)
    }

    fn check_kw(&self, kw: Kw) -> bool {
        self.current().is_some_and(|t| t.is_kw(kw))
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_kw(&mut self, kw: Kw) -> bool {
        if self.check_kw(kw) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> ParseResult<Token> {
        match self.current() {
            Some(t) if t.kind == *kind => Ok(self.advance().unwrap()),
            Some(t) => Err(Diagnostic::error(
                format!("expected {}, found '{}'", what, t.text),
                Some(t.span()),
            )),
            None => Err(Diagnostic::error(
                format!("expected {}, found end of input", what),
                self.last_span(),
            )),
        }
    }

    fn expect_kw(&mut self, kw: Kw, what: &str) -> ParseResult<Token> {
        match self.current() {
            Some(t) if t.is_kw(kw) => Ok(self.advance().unwrap()),
            Some(t) => Err(Diagnostic::error(
                format!("expected {}, found '{}'", what, t.text),
                Some(t.span()),
            )),
            None => Err(Diagnostic::error(
                format!("expected {}, found end of input", what),
                self.last_span(),
            )),
        }
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<Token> {
        match self.current() {
            Some(t) if t.kind == TokenKind::Identifier => Ok(self.advance().unwrap()),
            Some(t) => Err(Diagnostic::error(
                format!("expected {}, found '{}'", what, t.text),
                Some(t.span()),
            )),
            None => Err(Diagnostic::error(
                format!("expected {}, found end of input", what),
                self.last_span(),
            )),
        }
    }

    /// True at a token that terminates an enclosing block; statement
    /// recovery must not eat these
    fn at_block_boundary(&self) -> bool {
        matches!(
            self.current().map(|t| &t.kind),
            Some(TokenKind::Keyword(
                Kw::EndIf
                    | Kw::EndCase
                    | Kw::EndFor
                    | Kw::EndWhile
                    | Kw::EndRepeat
                    | Kw::EndProgram
                    | Kw::EndVar
                    | Kw::EndType
                    | Kw::EndStruct
                    | Kw::Else
                    | Kw::Elsif
                    | Kw::Until
                    | Kw::Program
                    | Kw::Type
            )) | None
        )
    }

    /// Statement-level recovery: skip to just past the next `;`, or stop
    /// at a block boundary keyword without consuming it
    fn sync_statement(&mut self) {
        while self.current().is_some() {
            if self.check(&TokenKind::Semicolon) {
                self.advance();
                return;
            }
            if self.at_block_boundary() {
                return;
            }
            self.advance();
        }
    }

    /// Skip past the closing keyword of a failed block
    fn sync_to_kw(&mut self, kw: Kw) {
        while let Some(token) = self.current() {
            if token.is_kw(kw) {
                self.advance();
                self.eat(&TokenKind::Semicolon);
                return;
            }
            self.advance();
        }
    }

    // ------------------------------------------------------------------
    // Type definitions
    // ------------------------------------------------------------------

    /// `TYPE (name : STRUCT ... END_STRUCT; | name : (A, B := 10); )* END_TYPE`
    fn parse_type_block(&mut self) -> ParseResult<Vec<TypeDefinition>> {
        self.expect_kw(Kw::Type, "'TYPE'")?;
        let mut defs = Vec::new();

        loop {
            if self.eat_kw(Kw::EndType) {
                self.eat(&TokenKind::Semicolon);
                break;
            }
            if self.current().is_none() {
                return Err(Diagnostic::error(
                    "unexpected end of input inside TYPE block, expected 'END_TYPE'",
                    self.last_span(),
                ));
            }
            match self.parse_type_def() {
                Ok(def) => defs.push(def),
                Err(diag) => {
                    self.diagnostics.push(diag);
                    self.sync_statement();
                }
            }
        }
        Ok(defs)
    }

    fn parse_type_def(&mut self) -> ParseResult<TypeDefinition> {
        let name_token = self.expect_identifier("type name")?;
        let span = name_token.span();
        let name = name_token.text.to_ascii_uppercase();
        self.expect(&TokenKind::Colon, "':' after type name")?;

        let kind = if self.check_kw(Kw::Struct) {
            self.parse_struct_kind()?
        } else if self.check(&TokenKind::LParen) {
            self.parse_enum_kind()?
        } else {
            // Alias form: an existing scalar, array, or user type
            TypeKind::Alias(self.parse_data_type()?)
        };

        self.eat(&TokenKind::Semicolon);
        Ok(TypeDefinition { name, kind, span })
    }

    fn parse_struct_kind(&mut self) -> ParseResult<TypeKind> {
        self.expect_kw(Kw::Struct, "'STRUCT'")?;
        let mut fields = Vec::new();
        while !self.check_kw(Kw::EndStruct) {
            if self.current().is_none() {
                return Err(Diagnostic::error(
                    "unexpected end of input inside STRUCT, expected 'END_STRUCT'",
                    self.last_span(),
                ));
            }
            let field_name = self.expect_identifier("field name")?.text;
            self.expect(&TokenKind::Colon, "':' after field name")?;
            let data_type = self.parse_data_type()?;
            let initial = if self.eat(&TokenKind::Assign) {
                Some(self.parse_expression()?)
            } else {
                None
            };
            self.expect(&TokenKind::Semicolon, "';' after struct field")?;
            fields.push(StructField {
                name: field_name,
                data_type,
                initial,
            });
        }
        self.expect_kw(Kw::EndStruct, "'END_STRUCT'")?;
        Ok(TypeKind::Struct(fields))
    }

    /// `(A, B := 10, C)` with implicit values auto-incrementing from the
    /// previous explicit value
    fn parse_enum_kind(&mut self) -> ParseResult<TypeKind> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut enumerators = Vec::new();
        let mut next_value: i64 = 0;
        loop {
            let name = self.expect_identifier("enumerator name")?.text;
            if self.eat(&TokenKind::Assign) {
                next_value = self.parse_signed_integer()?;
            }
            enumerators.push(Enumerator {
                name,
                value: next_value,
            });
            next_value += 1;
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')' after enumerators")?;
        Ok(TypeKind::Enum(enumerators))
    }

    // ------------------------------------------------------------------
    // Programs and variable blocks
    // ------------------------------------------------------------------

    fn parse_program(&mut self) -> ParseResult<Program> {
        let kw = self.expect_kw(Kw::Program, "'PROGRAM'")?;
        let name = self.expect_identifier("program name")?.text;

        let mut blocks = Vec::new();
        while matches!(
            self.current().map(|t| &t.kind),
            Some(TokenKind::Keyword(
                Kw::Var | Kw::VarInput | Kw::VarOutput | Kw::VarGlobal | Kw::VarExternal
            ))
        ) {
            match self.parse_var_block() {
                Ok(block) => blocks.push(block),
                Err(diag) => {
                    self.diagnostics.push(diag);
                    self.sync_to_kw(Kw::EndVar);
                }
            }
        }

        let body = self.parse_statements(&[Kw::EndProgram]);
        self.expect_kw(Kw::EndProgram, "'END_PROGRAM'")?;
        self.eat(&TokenKind::Semicolon);

        Ok(Program {
            name,
            blocks,
            body,
            span: kw.span(),
        })
    }

    fn parse_var_block(&mut self) -> ParseResult<VariableBlock> {
        let qualifier_token = self.advance().expect("caller checked var keyword");
        let base = match qualifier_token.kind {
            TokenKind::Keyword(Kw::Var) => BlockQualifier::Var,
            TokenKind::Keyword(Kw::VarInput) => BlockQualifier::VarInput,
            TokenKind::Keyword(Kw::VarOutput) => BlockQualifier::VarOutput,
            TokenKind::Keyword(Kw::VarGlobal) => BlockQualifier::VarGlobal,
            TokenKind::Keyword(Kw::VarExternal) => BlockQualifier::VarExternal,
            _ => unreachable!("caller checked var keyword"),
        };

        // `VAR CONSTANT` and `VAR_GLOBAL CONSTANT` fold to Constant;
        // RETAIN is accepted and ignored (persistence is out of scope)
        let mut qualifier = base;
        loop {
            if self.eat_kw(Kw::Constant) {
                qualifier = BlockQualifier::Constant;
            } else if self.eat_kw(Kw::Retain) {
                // metadata only
            } else {
                break;
            }
        }

        let mut decls = Vec::new();
        loop {
            if self.eat_kw(Kw::EndVar) {
                self.eat(&TokenKind::Semicolon);
                break;
            }
            if self.current().is_none() {
                return Err(Diagnostic::error(
                    "unexpected end of input inside variable block, expected 'END_VAR'",
                    self.last_span(),
                ));
            }
            match self.parse_var_decl() {
                Ok(decl) => decls.push(decl),
                Err(diag) => {
                    self.diagnostics.push(diag);
                    self.sync_statement();
                }
            }
        }

        Ok(VariableBlock { qualifier, decls })
    }

    /// One declaration line: `a, b : INT := 3;` with optional AT address
    fn parse_var_decl(&mut self) -> ParseResult<VariableDecl> {
        let first = self.expect_identifier("variable name")?;
        let span = first.span();
        let mut names = vec![first.text];
        while self.eat(&TokenKind::Comma) {
            names.push(self.expect_identifier("variable name")?.text);
        }

        let at_address = if self.eat_kw(Kw::At) {
            let addr = self.expect(&TokenKind::DirectAddress, "hardware address after 'AT'")?;
            if !at_address_pattern().is_match(&addr.text) {
                self.diagnostics.push(Diagnostic::warning(
                    format!("hardware address '{}' is not well-formed", addr.text),
                    Some(addr.span()),
                ));
            }
            Some(addr.text)
        } else {
            None
        };

        self.expect(&TokenKind::Colon, "':' after variable name")?;
        let data_type = self.parse_data_type()?;

        let initial = if self.eat(&TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };

        self.expect(&TokenKind::Semicolon, "';' after declaration")?;

        Ok(VariableDecl {
            names,
            data_type,
            at_address,
            initial,
            span,
        })
    }

    fn parse_data_type(&mut self) -> ParseResult<DataType> {
        if self.eat_kw(Kw::Array) {
            self.expect(&TokenKind::LBracket, "'[' after ARRAY")?;
            let mut ranges = Vec::new();
            loop {
                let start = self.parse_signed_integer()?;
                self.expect(&TokenKind::Range, "'..' in array range")?;
                let end = self.parse_signed_integer()?;
                ranges.push(ArrayRange { start, end });
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
            self.expect(&TokenKind::RBracket, "']' after array ranges")?;
            self.expect_kw(Kw::Of, "'OF' after array ranges")?;
            let elem = self.expect_identifier("array element type")?;
            return Ok(DataType {
                name: elem.text.to_ascii_uppercase(),
                ranges,
            });
        }

        let name_token = self.expect_identifier("type name")?;
        let name = name_token.text.to_ascii_uppercase();

        // STRING[80] / STRING(80): declared capacity is metadata only
        if name == "STRING" {
            if self.eat(&TokenKind::LBracket) {
                self.parse_signed_integer()?;
                self.expect(&TokenKind::RBracket, "']' after string length")?;
            } else if self.eat(&TokenKind::LParen) {
                self.parse_signed_integer()?;
                self.expect(&TokenKind::RParen, "')' after string length")?;
            }
        }

        Ok(DataType {
            name,
            ranges: Vec::new(),
        })
    }

    fn parse_signed_integer(&mut self) -> ParseResult<i64> {
        let negative = self.eat(&TokenKind::Minus);
        match self.current().map(|t| t.kind.clone()) {
            Some(TokenKind::Integer(v)) => {
                self.advance();
                Ok(if negative { -v } else { v })
            }
            Some(_) => {
                let token = self.current().unwrap();
                Err(Diagnostic::error(
                    format!("expected integer, found '{}'", token.text),
                    Some(token.span()),
                ))
            }
            None => Err(Diagnostic::error(
                "expected integer, found end of input",
                self.last_span(),
            )),
        }
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    /// Parse statements until one of `terminators` (not consumed) or EOF
    fn parse_statements(&mut self, terminators: &[Kw]) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            while self.eat(&TokenKind::Semicolon) {}
            match self.current() {
                None => break,
                Some(t) => {
                    if let TokenKind::Keyword(kw) = &t.kind
                        && terminators.contains(kw)
                    {
                        break;
                    }
                }
            }
            // Never eat an enclosing block's terminator while recovering
            if self.at_block_boundary() {
                break;
            }
            match self.parse_statement_recovering() {
                Some(stmt) => statements.push(stmt),
                None => {
                    if self.at_block_boundary() {
                        break;
                    }
                }
            }
        }
        statements
    }

    fn parse_statement_recovering(&mut self) -> Option<Statement> {
        let start = self.pos;
        match self.parse_statement() {
            Ok(stmt) => Some(stmt),
            Err(diag) => {
                self.diagnostics.push(diag);
                if self.pos == start {
                    self.advance();
                }
                self.sync_statement();
                None
            }
        }
    }

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let token = match self.current() {
            Some(t) => t.clone(),
            None => {
                return Err(Diagnostic::error(
                    "expected statement, found end of input",
                    self.last_span(),
                ));
            }
        };
        let span = token.span();

        match &token.kind {
            TokenKind::Keyword(Kw::If) => self.parse_if(span),
            TokenKind::Keyword(Kw::Case) => self.parse_case(span),
            TokenKind::Keyword(Kw::For) => self.parse_for(span),
            TokenKind::Keyword(Kw::While) => self.parse_while(span),
            TokenKind::Keyword(Kw::Repeat) => self.parse_repeat(span),
            TokenKind::Keyword(Kw::Exit) => {
                self.advance();
                self.expect(&TokenKind::Semicolon, "';' after EXIT")?;
                Ok(Statement::Exit { span })
            }
            TokenKind::Keyword(Kw::Continue) => {
                self.advance();
                self.expect(&TokenKind::Semicolon, "';' after CONTINUE")?;
                Ok(Statement::Continue { span })
            }
            TokenKind::Identifier => {
                // `Name(...)` at statement level is a function-block call
                if self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(&TokenKind::LParen) {
                    self.parse_fb_call(span)
                } else {
                    self.parse_assignment(span)
                }
            }
            _ => Err(Diagnostic::error(
                format!("expected statement, found '{}'", token.text),
                Some(span),
            )),
        }
    }

    fn parse_assignment(&mut self, span: Span) -> ParseResult<Statement> {
        let target = self.parse_var_ref()?;
        self.expect(&TokenKind::Assign, "':=' in assignment")?;
        let value = self.parse_expression()?;
        self.expect(&TokenKind::Semicolon, "';' after assignment")?;
        Ok(Statement::Assignment {
            target,
            value,
            span,
        })
    }

    fn parse_fb_call(&mut self, span: Span) -> ParseResult<Statement> {
        let instance = self.expect_identifier("function block instance")?.text;
        let args = self.parse_call_args()?;
        self.expect(&TokenKind::Semicolon, "';' after function block call")?;
        Ok(Statement::FbCall {
            instance,
            args,
            span,
        })
    }

    fn parse_if(&mut self, span: Span) -> ParseResult<Statement> {
        self.expect_kw(Kw::If, "'IF'")?;
        let mut branches = Vec::new();

        let cond = self.parse_expression()?;
        self.expect_kw(Kw::Then, "'THEN' after IF condition")?;
        let body = self.parse_statements(&[Kw::Elsif, Kw::Else, Kw::EndIf]);
        branches.push(IfBranch { cond, body });

        while self.eat_kw(Kw::Elsif) {
            let cond = self.parse_expression()?;
            self.expect_kw(Kw::Then, "'THEN' after ELSIF condition")?;
            let body = self.parse_statements(&[Kw::Elsif, Kw::Else, Kw::EndIf]);
            branches.push(IfBranch { cond, body });
        }

        let else_body = if self.eat_kw(Kw::Else) {
            self.parse_statements(&[Kw::EndIf])
        } else {
            Vec::new()
        };

        self.expect_kw(Kw::EndIf, "'END_IF'")?;
        self.eat(&TokenKind::Semicolon);
        Ok(Statement::If {
            branches,
            else_body,
            span,
        })
    }

    fn parse_case(&mut self, span: Span) -> ParseResult<Statement> {
        self.expect_kw(Kw::Case, "'CASE'")?;
        let selector = self.parse_expression()?;
        self.expect_kw(Kw::Of, "'OF' after CASE selector")?;

        let mut arms = Vec::new();
        let mut else_body = Vec::new();
        loop {
            while self.eat(&TokenKind::Semicolon) {}
            if self.eat_kw(Kw::Else) {
                else_body = self.parse_statements(&[Kw::EndCase]);
                break;
            }
            if self.check_kw(Kw::EndCase) || self.current().is_none() {
                break;
            }
            let labels = self.parse_case_labels()?;
            self.expect(&TokenKind::Colon, "':' after CASE labels")?;
            let body = self.parse_case_arm_body();
            arms.push(CaseArm { labels, body });
        }

        self.expect_kw(Kw::EndCase, "'END_CASE'")?;
        self.eat(&TokenKind::Semicolon);
        Ok(Statement::Case {
            selector,
            arms,
            else_body,
            span,
        })
    }

    /// Comma-separated label list: `1, 3, 10..20`
    fn parse_case_labels(&mut self) -> ParseResult<Vec<CaseLabel>> {
        let mut labels = Vec::new();
        loop {
            let low = self.parse_signed_integer()?;
            if self.eat(&TokenKind::Range) {
                let high = self.parse_signed_integer()?;
                labels.push(CaseLabel::Range(low, high));
            } else {
                labels.push(CaseLabel::Value(low));
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Ok(labels)
    }

    /// Statements of one CASE arm: runs until the next label, ELSE, or
    /// END_CASE
    fn parse_case_arm_body(&mut self) -> Vec<Statement> {
        let mut body = Vec::new();
        loop {
            while self.eat(&TokenKind::Semicolon) {}
            if self.check_kw(Kw::Else) || self.check_kw(Kw::EndCase) || self.current().is_none() {
                break;
            }
            if self.at_case_label() {
                break;
            }
            match self.parse_statement_recovering() {
                Some(stmt) => body.push(stmt),
                None => {
                    if self.at_block_boundary() {
                        break;
                    }
                }
            }
        }
        body
    }

    /// Lookahead: does the upcoming token run form `int (, int | .. int)* :`?
    fn at_case_label(&self) -> bool {
        let mut idx = self.pos;
        let mut saw_value = false;
        while let Some(token) = self.tokens.get(idx) {
            match token.kind {
                TokenKind::Integer(_) | TokenKind::Minus | TokenKind::Range | TokenKind::Comma => {
                    if matches!(token.kind, TokenKind::Integer(_)) {
                        saw_value = true;
                    }
                    idx += 1;
                }
                TokenKind::Colon => return saw_value,
                _ => return false,
            }
        }
        false
    }

    fn parse_for(&mut self, span: Span) -> ParseResult<Statement> {
        self.expect_kw(Kw::For, "'FOR'")?;
        let var = self.expect_identifier("loop variable")?.text;
        self.expect(&TokenKind::Assign, "':=' after loop variable")?;
        let start = self.parse_expression()?;
        self.expect_kw(Kw::To, "'TO' in FOR loop")?;
        let end = self.parse_expression()?;
        let step = if self.eat_kw(Kw::By) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.expect_kw(Kw::Do, "'DO' in FOR loop")?;
        let body = self.parse_statements(&[Kw::EndFor]);
        self.expect_kw(Kw::EndFor, "'END_FOR'")?;
        self.eat(&TokenKind::Semicolon);
        Ok(Statement::For {
            var,
            start,
            end,
            step,
            body,
            span,
        })
    }

    fn parse_while(&mut self, span: Span) -> ParseResult<Statement> {
        self.expect_kw(Kw::While, "'WHILE'")?;
        let cond = self.parse_expression()?;
        self.expect_kw(Kw::Do, "'DO' after WHILE condition")?;
        let body = self.parse_statements(&[Kw::EndWhile]);
        self.expect_kw(Kw::EndWhile, "'END_WHILE'")?;
        self.eat(&TokenKind::Semicolon);
        Ok(Statement::While { cond, body, span })
    }

    fn parse_repeat(&mut self, span: Span) -> ParseResult<Statement> {
        self.expect_kw(Kw::Repeat, "'REPEAT'")?;
        let body = self.parse_statements(&[Kw::Until]);
        self.expect_kw(Kw::Until, "'UNTIL'")?;
        let until = self.parse_expression()?;
        self.expect_kw(Kw::EndRepeat, "'END_REPEAT'")?;
        self.eat(&TokenKind::Semicolon);
        Ok(Statement::Repeat { body, until, span })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------
    //
    // Precedence (highest to lowest): ** | unary - / NOT | * / MOD |
    // + - | comparisons | AND | XOR | OR

    pub fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_xor()?;
        while self.eat_kw(Kw::Or) {
            let rhs = self.parse_xor()?;
            lhs = Expression::Binary {
                op: BinaryOp::Or,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_xor(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_and()?;
        while self.eat_kw(Kw::Xor) {
            let rhs = self.parse_and()?;
            lhs = Expression::Binary {
                op: BinaryOp::Xor,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_comparison()?;
        loop {
            // `&` is an alternate spelling of AND
            if self.eat_kw(Kw::And) || self.eat(&TokenKind::Ampersand) {
                let rhs = self.parse_comparison()?;
                lhs = Expression::Binary {
                    op: BinaryOp::And,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.current().map(|t| &t.kind) {
                Some(TokenKind::Less) => BinaryOp::Lt,
                Some(TokenKind::Greater) => BinaryOp::Gt,
                Some(TokenKind::LessEqual) => BinaryOp::Le,
                Some(TokenKind::GreaterEqual) => BinaryOp::Ge,
                Some(TokenKind::Equal) => BinaryOp::Eq,
                Some(TokenKind::NotEqual) => BinaryOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.current().map(|t| &t.kind) {
                Some(TokenKind::Plus) => BinaryOp::Add,
                Some(TokenKind::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.current().map(|t| &t.kind) {
                Some(TokenKind::Star) => BinaryOp::Mul,
                Some(TokenKind::Slash) => BinaryOp::Div,
                Some(TokenKind::Keyword(Kw::Mod)) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> ParseResult<Expression> {
        if self.eat(&TokenKind::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Neg,
                operand: Box::new(operand),
            });
        }
        if self.eat_kw(Kw::Not) {
            let operand = self.parse_unary()?;
            return Ok(Expression::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> ParseResult<Expression> {
        let base = self.parse_primary()?;
        if self.eat(&TokenKind::Power) {
            // Right-associative; exponent may carry its own unary sign
            let exponent = self.parse_unary()?;
            return Ok(Expression::Binary {
                op: BinaryOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
            });
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let token = match self.current() {
            Some(t) => t.clone(),
            None => {
                return Err(Diagnostic::error(
                    "expected expression, found end of input",
                    self.last_span(),
                ));
            }
        };

        match &token.kind {
            TokenKind::Integer(v) => {
                self.advance();
                Ok(Expression::Literal(Literal::Int(*v)))
            }
            TokenKind::Real(v) => {
                self.advance();
                Ok(Expression::Literal(Literal::Real(*v)))
            }
            TokenKind::StringLit(s) => {
                self.advance();
                Ok(Expression::Literal(Literal::Str(s.clone())))
            }
            TokenKind::TimeLit(ms) => {
                self.advance();
                Ok(Expression::Literal(Literal::Time {
                    ms: *ms,
                    raw: token.text,
                }))
            }
            TokenKind::DateLit(days) => {
                self.advance();
                Ok(Expression::Literal(Literal::Date {
                    days: *days,
                    raw: token.text,
                }))
            }
            TokenKind::TodLit(ms) => {
                self.advance();
                Ok(Expression::Literal(Literal::TimeOfDay {
                    ms: *ms,
                    raw: token.text,
                }))
            }
            TokenKind::DtLit(ms) => {
                self.advance();
                Ok(Expression::Literal(Literal::DateTime {
                    ms: *ms,
                    raw: token.text,
                }))
            }
            TokenKind::Keyword(Kw::True) => {
                self.advance();
                Ok(Expression::Literal(Literal::Bool(true)))
            }
            TokenKind::Keyword(Kw::False) => {
                self.advance();
                Ok(Expression::Literal(Literal::Bool(false)))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(Expression::Paren(Box::new(inner)))
            }
            TokenKind::Identifier => {
                if self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(&TokenKind::LParen) {
                    let name = self.advance().unwrap().text;
                    let args = self.parse_call_args()?;
                    Ok(Expression::Call { name, args })
                } else {
                    Ok(Expression::Variable(self.parse_var_ref()?))
                }
            }
            _ => Err(Diagnostic::error(
                format!("expected expression, found '{}'", token.text),
                Some(token.span()),
            )),
        }
    }

    /// `(a, b)` / `(IN := x, PT := T#1s)` / `()`
    fn parse_call_args(&mut self) -> ParseResult<Vec<CallArg>> {
        self.expect(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            // Keyword form: `name := expr`
            let name = if self.current().map(|t| &t.kind) == Some(&TokenKind::Identifier)
                && self.tokens.get(self.pos + 1).map(|t| &t.kind) == Some(&TokenKind::Assign)
            {
                let name = self.advance().unwrap().text;
                self.advance(); // :=
                Some(name)
            } else {
                None
            };
            let value = self.parse_expression()?;
            args.push(CallArg { name, value });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, "')' after arguments")?;
        Ok(args)
    }

    /// Dotted access path with array subscripts; `m[i, j]` and `m[i][j]`
    /// are equivalent
    fn parse_var_ref(&mut self) -> ParseResult<VarRef> {
        let first = self.expect_identifier("variable name")?;
        let mut path = vec![first.text];
        let mut indices = Vec::new();

        loop {
            if self.eat(&TokenKind::Dot) {
                path.push(self.expect_identifier("field name after '.'")?.text);
            } else if self.eat(&TokenKind::LBracket) {
                loop {
                    indices.push(self.parse_expression()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RBracket, "']' after subscript")?;
            } else {
                break;
            }
        }

        Ok(VarRef { path, indices })
    }
}
