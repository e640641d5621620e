//! Ladder graph data model
//!
//! Nodes and edges with integer rung/column coordinates, serialized to
//! JSON for the diagram renderer. Node identity is a pure function of
//! (rung index, element position), so re-transforming unchanged source
//! yields byte-identical ids and the renderer can diff cheaply.

use rung_core::ast::SourceProgram;
use rung_core::diag::Diagnostic;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Left vertical power rail, shared by every rung
    PowerRailLeft,
    /// Right vertical power rail, shared by every rung
    PowerRailRight,
    /// Normally-open contact `-| |-`
    ContactNo,
    /// Normally-closed contact `-|/|-`
    ContactNc,
    /// Output coil `-( )-`
    Coil,
    /// Function-block box with typed pins
    FunctionBlock { block: String, instance: String },
    /// Start of a parallel (OR) branch
    BranchOpen,
    /// Join at the end of a parallel (OR) branch
    BranchClose,
    /// Placeholder for a statement the diagram cannot express
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LadderNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Display text: variable name, expression text, block type
    pub label: String,
    /// Rung index; one rung per top-level statement
    pub row: usize,
    /// Position within the rung, left to right
    pub col: usize,
    /// Index of the source statement this node renders
    pub stmt_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LadderEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    /// Pin name on the source node (FB outputs: `Q`, `QU`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Pin name on the target node (FB inputs: `IN`, `CU`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

/// Parsed artifacts exposed for tooling when requested
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intermediates {
    pub ast: SourceProgram,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformResult {
    /// False when the source carried parse errors
    pub success: bool,
    pub nodes: Vec<LadderNode>,
    pub edges: Vec<LadderEdge>,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intermediates: Option<Intermediates>,
}

#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Attach the parsed AST to the result
    pub include_intermediates: bool,
}
