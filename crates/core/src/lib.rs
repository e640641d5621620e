//! Rung Core: shared foundation for the Structured Text toolchain
//!
//! This crate provides the types every other Rung crate agrees on:
//!
//! - `ast`: the Structured Text syntax tree (programs, declarations,
//!   expressions, statements) built by `rung-compiler`
//! - `value`: the runtime `Value` enum and IEC 61131-3 coercion rules
//! - `time`: TIME/DATE/TOD/DT literal parsing and formatting
//!   (milliseconds / days-since-epoch conventions)
//! - `diag`: severity-tagged diagnostics shared by parser, runtime, and
//!   ladder transformer
//!
//! Nothing here owns mutable state or does I/O; the crate is a leaf.

pub mod ast;
pub mod diag;
pub mod time;
pub mod value;

pub use ast::{
    ArrayRange, BinaryOp, BlockQualifier, CallArg, CaseArm, CaseLabel, DataType, Enumerator,
    Expression, IfBranch, Literal, Program, SourceProgram, Span, Statement, StructField,
    TypeDefinition, TypeKind, UnaryOp, VarRef, VariableBlock, VariableDecl,
};
pub use diag::{Diagnostic, Severity};
pub use value::{Value, format_number, to_int};
