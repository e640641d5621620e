//! Rung Ladder: ST -> ladder-diagram transformer
//!
//! Turns Structured Text into a directed acyclic graph of ladder
//! elements (power rails, contacts, coils, function-block boxes, branch
//! joins) with integer rung/column layout coordinates. The graph
//! serializes to JSON for the diagram renderer; node identity is stable
//! across re-runs of unchanged source so the renderer can diff.
//!
//! ```
//! use rung_ladder::{TransformOptions, transform};
//!
//! let result = transform(
//!     "VAR Start : BOOL; Motor : BOOL; END_VAR Motor := Start;",
//!     &TransformOptions::default(),
//! );
//! assert!(result.success);
//! assert!(result.nodes.len() >= 4); // rails, contact, coil
//! ```

pub mod graph;
pub mod transform;

pub use graph::{
    Intermediates, LadderEdge, LadderNode, NodeKind, TransformOptions, TransformResult,
};
pub use transform::{LEFT_RAIL_ID, RIGHT_RAIL_ID, transform};
