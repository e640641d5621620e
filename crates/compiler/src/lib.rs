//! Rung Compiler Library
//!
//! Frontend for IEC 61131-3 Structured Text: tokenizer, recovering
//! recursive-descent parser, and the documentation table that backs
//! editor hover and autocomplete.
//!
//! Parsing never fails: [`parse`] always returns a [`SourceProgram`]
//! whose `diagnostics` list carries whatever went wrong, while every
//! well-formed declaration and statement is present in the tree. The
//! scan engine (`rung-runtime`) and the ladder transformer
//! (`rung-ladder`) both consume this crate's output.
//!
//! ```
//! let source = "VAR Lamp : BOOL; END_VAR Lamp := TRUE;";
//! let parsed = rungc::parse(source);
//! assert!(!parsed.has_errors());
//! assert_eq!(parsed.programs.len(), 1);
//! ```

pub mod docs;
pub mod lexer;
pub mod parser;

pub use docs::{DocEntry, DocKind, completions, lookup};
pub use lexer::{Kw, Token, TokenKind, tokenize};
pub use parser::{Parser, parse};

pub use rung_core::ast::SourceProgram;
