//! Abstract Syntax Tree for IEC 61131-3 Structured Text
//!
//! The tree is built once per source text by `rung-compiler` and then held
//! immutably by the scan engine and the ladder transformer. Statements and
//! expressions are tagged enums; every consumer matches exhaustively.

use crate::diag::Diagnostic;
use serde::Serialize;

/// Source span for a single token or expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    /// Line number (0-indexed for LSP compatibility)
    pub line: usize,
    /// Start column (0-indexed)
    pub column: usize,
    /// Length of the span in characters
    pub length: usize,
}

impl Span {
    pub fn new(line: usize, column: usize, length: usize) -> Self {
        Span {
            line,
            column,
            length,
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 1-indexed for user display
        write!(f, "{}:{}", self.line + 1, self.column + 1)
    }
}

/// Result of parsing one source text.
///
/// Parsing never fails outright: syntax errors are confined to a single
/// declaration or statement and accumulate in `diagnostics` while the
/// surrounding program still parses. The editor relies on this to keep
/// showing a live diagram while the user is mid-keystroke.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SourceProgram {
    pub programs: Vec<Program>,
    pub types: Vec<TypeDefinition>,
    pub diagnostics: Vec<Diagnostic>,
}

impl SourceProgram {
    /// True if any diagnostic carries `Severity::Error`
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == crate::diag::Severity::Error)
    }

    /// Every statement of every program, in declaration order
    pub fn all_statements(&self) -> impl Iterator<Item = &Statement> {
        self.programs.iter().flat_map(|p| p.body.iter())
    }
}

/// A `PROGRAM name ... END_PROGRAM` block.
///
/// Top-level statements outside any PROGRAM block are collected into an
/// implicit unnamed program so snippet-style sources still simulate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    pub name: String,
    pub blocks: Vec<VariableBlock>,
    pub body: Vec<Statement>,
    pub span: Span,
}

/// User type definition: `TYPE name : STRUCT ... END_STRUCT; END_TYPE`
/// or `TYPE name : (A, B := 10, C); END_TYPE`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TypeDefinition {
    pub name: String,
    pub kind: TypeKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypeKind {
    Struct(Vec<StructField>),
    /// Enumerator values are resolved at parse time: implicit members
    /// auto-increment from the previous explicit value (A=0, B=10 => C=11)
    Enum(Vec<Enumerator>),
    /// Named alias: `TYPE SensorArray : ARRAY[1..8] OF INT; END_TYPE`
    Alias(DataType),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructField {
    pub name: String,
    pub data_type: DataType,
    pub initial: Option<Expression>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enumerator {
    pub name: String,
    pub value: i64,
}

/// Variable block qualifier.
///
/// `VAR CONSTANT` and `VAR_GLOBAL CONSTANT` both fold to `Constant`; the
/// runtime treats every name in a constant block as write-protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BlockQualifier {
    Var,
    VarInput,
    VarOutput,
    VarGlobal,
    /// Creates no storage: the matching VAR_GLOBAL owns the slot
    VarExternal,
    Constant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableBlock {
    pub qualifier: BlockQualifier,
    pub decls: Vec<VariableDecl>,
}

/// One declaration line: `a, b : INT := 3;`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDecl {
    pub names: Vec<String>,
    pub data_type: DataType,
    /// Hardware address (`AT %QX0.1`), captured as an opaque string
    pub at_address: Option<String>,
    pub initial: Option<Expression>,
    pub span: Span,
}

/// Closed range of one array dimension: `1..10`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArrayRange {
    pub start: i64,
    pub end: i64,
}

impl ArrayRange {
    /// Number of elements in this dimension (0 for an inverted range)
    pub fn len(&self) -> usize {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start + 1) as usize
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Declared type of a variable.
///
/// `name` is the normalized (upper-cased) primitive, FB, or user type
/// name. For `ARRAY[1..2,1..3] OF INT`, `ranges` holds both dimensions
/// and `name` is the element type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataType {
    pub name: String,
    pub ranges: Vec<ArrayRange>,
}

impl DataType {
    pub fn scalar(name: impl Into<String>) -> Self {
        DataType {
            name: name.into(),
            ranges: Vec::new(),
        }
    }

    pub fn is_array(&self) -> bool {
        !self.ranges.is_empty()
    }

    /// Flat element count of an array type (product over dimensions)
    pub fn element_count(&self) -> usize {
        self.ranges.iter().map(ArrayRange::len).product()
    }
}

// ============================================================================
//                               EXPRESSIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Pow,
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Xor,
    Or,
}

impl BinaryOp {
    /// Operator lexeme as it appears in source, for labels and messages
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Pow => "**",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "MOD",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::And => "AND",
            BinaryOp::Xor => "XOR",
            BinaryOp::Or => "OR",
        }
    }

    /// True for operators that always yield BOOL
    pub fn yields_bool(&self) -> bool {
        matches!(
            self,
            BinaryOp::Lt
                | BinaryOp::Gt
                | BinaryOp::Le
                | BinaryOp::Ge
                | BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::And
                | BinaryOp::Xor
                | BinaryOp::Or
        )
    }
}

/// Literal value with enough source fidelity to round-trip.
///
/// TIME-family literals keep the raw lexeme alongside the parsed value:
/// `T#1h30m` re-renders as written, not as `T#5400000ms`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Real(f64),
    /// Duration in milliseconds
    Time { ms: f64, raw: String },
    /// Days since 1970-01-01 UTC
    Date { days: i64, raw: String },
    /// Milliseconds since midnight
    TimeOfDay { ms: f64, raw: String },
    /// Milliseconds since 1970-01-01 UTC
    DateTime { ms: f64, raw: String },
    Str(String),
}

/// Variable access: dotted path plus optional array subscripts.
///
/// `Motor.Status` has path `["Motor", "Status"]`; `m[i, j]` and `m[i][j]`
/// both produce path `["m"]` with two index expressions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarRef {
    pub path: Vec<String>,
    pub indices: Vec<Expression>,
}

impl VarRef {
    pub fn simple(name: impl Into<String>) -> Self {
        VarRef {
            path: vec![name.into()],
            indices: Vec::new(),
        }
    }

    /// Dotted path without subscripts, e.g. `Timer1.Q`
    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

/// Call argument; `name` is set for keyword form (`IN := x`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallArg {
    pub name: Option<String>,
    pub value: Expression,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    Literal(Literal),
    Variable(VarRef),
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expression>,
    },
    Paren(Box<Expression>),
    Call {
        name: String,
        args: Vec<CallArg>,
    },
}

impl Expression {
    /// Strip redundant parentheses
    pub fn unparen(&self) -> &Expression {
        match self {
            Expression::Paren(inner) => inner.unparen(),
            other => other,
        }
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Bool(true) => write!(f, "TRUE"),
            Literal::Bool(false) => write!(f, "FALSE"),
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Real(v) => write!(f, "{}", v),
            // TIME-family literals render as written in source
            Literal::Time { raw, .. }
            | Literal::Date { raw, .. }
            | Literal::TimeOfDay { raw, .. }
            | Literal::DateTime { raw, .. } => write!(f, "{}", raw),
            Literal::Str(s) => write!(f, "'{}'", s),
        }
    }
}

impl std::fmt::Display for VarRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dotted())?;
        if !self.indices.is_empty() {
            write!(f, "[")?;
            for (i, index) in self.indices.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", index)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// Source-like rendering, used for diagram labels and messages
impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::Variable(var) => write!(f, "{}", var),
            Expression::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}", lhs, op.symbol(), rhs)
            }
            Expression::Unary { op, operand } => match op {
                UnaryOp::Neg => write!(f, "-{}", operand),
                UnaryOp::Not => write!(f, "NOT {}", operand),
            },
            Expression::Paren(inner) => write!(f, "({})", inner),
            Expression::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match &arg.name {
                        Some(name) => write!(f, "{} := {}", name, arg.value)?,
                        None => write!(f, "{}", arg.value)?,
                    }
                }
                write!(f, ")")
            }
        }
    }
}

// ============================================================================
//                               STATEMENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfBranch {
    pub cond: Expression,
    pub body: Vec<Statement>,
}

/// One CASE label: a single value or a closed range `low..high`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CaseLabel {
    Value(i64),
    Range(i64, i64),
}

impl CaseLabel {
    pub fn matches(&self, selector: i64) -> bool {
        match self {
            CaseLabel::Value(v) => selector == *v,
            CaseLabel::Range(lo, hi) => selector >= *lo && selector <= *hi,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseArm {
    pub labels: Vec<CaseLabel>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Statement {
    Assignment {
        target: VarRef,
        value: Expression,
        span: Span,
    },
    If {
        /// IF plus any ELSIF branches, in source order
        branches: Vec<IfBranch>,
        else_body: Vec<Statement>,
        span: Span,
    },
    Case {
        selector: Expression,
        arms: Vec<CaseArm>,
        else_body: Vec<Statement>,
        span: Span,
    },
    For {
        var: String,
        start: Expression,
        end: Expression,
        step: Option<Expression>,
        body: Vec<Statement>,
        span: Span,
    },
    While {
        cond: Expression,
        body: Vec<Statement>,
        span: Span,
    },
    Repeat {
        body: Vec<Statement>,
        until: Expression,
        span: Span,
    },
    /// Function-block invocation: `T1(IN := Start, PT := T#500ms);`
    FbCall {
        instance: String,
        args: Vec<CallArg>,
        span: Span,
    },
    /// Leave the innermost enclosing loop
    Exit { span: Span },
    /// Skip to the next iteration of the innermost enclosing loop
    Continue { span: Span },
}

impl Statement {
    pub fn span(&self) -> Span {
        match self {
            Statement::Assignment { span, .. }
            | Statement::If { span, .. }
            | Statement::Case { span, .. }
            | Statement::For { span, .. }
            | Statement::While { span, .. }
            | Statement::Repeat { span, .. }
            | Statement::FbCall { span, .. }
            | Statement::Exit { span }
            | Statement::Continue { span } => *span,
        }
    }
}
