//! ST -> ladder transformation
//!
//! Runs the parser, then lays each top-level statement onto one rung
//! between the shared power rails:
//!
//! - boolean-RHS assignment: contacts in series (AND), parallel
//!   branches (OR), one coil on the right
//! - function-block call: a box node; boolean pin expressions form the
//!   upstream sections wired into typed input handles, the primary
//!   output handle drives the right rail
//! - everything else: an `Unsupported` placeholder node plus a warning,
//!   so the rung count always matches the statement count
//!
//! Node ids derive from (rung, element order) only; identical source
//! produces identical graphs.

use crate::graph::{
    Intermediates, LadderEdge, LadderNode, NodeKind, TransformOptions, TransformResult,
};
use rung_core::ast::{BinaryOp, Expression, Statement, UnaryOp, VarRef};
use rung_core::diag::{Diagnostic, Severity};
use rung_runtime::{TypeRegistry, TypeTag};
use tracing::debug;

pub const LEFT_RAIL_ID: &str = "rail-left";
pub const RIGHT_RAIL_ID: &str = "rail-right";

/// Transform source text into a ladder graph
pub fn transform(text: &str, options: &TransformOptions) -> TransformResult {
    let parsed = rungc::parse(text);
    let types = TypeRegistry::build(&parsed);

    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    for diagnostic in &parsed.diagnostics {
        match diagnostic.severity {
            Severity::Error => errors.push(diagnostic.clone()),
            Severity::Warning | Severity::Hint => warnings.push(diagnostic.clone()),
        }
    }

    let mut builder = Builder::new(&types);
    for statement in parsed.all_statements() {
        builder.add_rung(statement);
    }
    builder.finish_rails();

    debug!(
        rungs = builder.rung_count,
        nodes = builder.nodes.len(),
        edges = builder.edges.len(),
        "ladder transform complete"
    );

    warnings.extend(builder.warnings);
    let success = errors.is_empty();
    TransformResult {
        success,
        nodes: builder.nodes,
        edges: builder.edges,
        warnings,
        errors,
        intermediates: options.include_intermediates.then(|| Intermediates {
            ast: parsed.clone(),
        }),
    }
}

/// A contiguous slice of one rung: the node ids current flows into and
/// out of, plus how many columns it spans
struct Section {
    entries: Vec<String>,
    exits: Vec<String>,
    width: usize,
}

struct Builder<'a> {
    types: &'a TypeRegistry,
    nodes: Vec<LadderNode>,
    edges: Vec<LadderEdge>,
    warnings: Vec<Diagnostic>,
    rung_count: usize,
    /// Element counter within the current rung (node id suffix)
    elem: usize,
}

impl<'a> Builder<'a> {
    fn new(types: &'a TypeRegistry) -> Self {
        Builder {
            types,
            nodes: Vec::new(),
            edges: Vec::new(),
            warnings: Vec::new(),
            rung_count: 0,
            elem: 0,
        }
    }

    fn node(&mut self, kind: NodeKind, label: String, row: usize, col: usize) -> String {
        let id = format!("rung{}-n{}", row, self.elem);
        self.elem += 1;
        self.nodes.push(LadderNode {
            id: id.clone(),
            kind,
            label,
            row,
            col,
            stmt_index: row,
        });
        id
    }

    fn edge(&mut self, source: &str, target: &str) {
        self.edge_with_handles(source, target, None, None);
    }

    fn edge_with_handles(
        &mut self,
        source: &str,
        target: &str,
        source_handle: Option<String>,
        target_handle: Option<String>,
    ) {
        let id = match (&source_handle, &target_handle) {
            (None, None) => format!("e-{}-{}", source, target),
            (sh, th) => format!(
                "e-{}{}-{}{}",
                source,
                sh.as_deref().map(|h| format!(".{}", h)).unwrap_or_default(),
                target,
                th.as_deref().map(|h| format!(".{}", h)).unwrap_or_default(),
            ),
        };
        self.edges.push(LadderEdge {
            id,
            source: source.to_string(),
            target: target.to_string(),
            source_handle,
            target_handle,
        });
    }

    fn add_rung(&mut self, statement: &Statement) {
        let row = self.rung_count;
        self.rung_count += 1;
        self.elem = 0;

        match statement {
            Statement::Assignment { target, value, .. } if is_boolean_expr(value, self.types) => {
                self.boolean_rung(target, value, row);
            }
            Statement::FbCall { instance, args, .. }
                if matches!(
                    self.types.get(instance),
                    TypeTag::Timer(_) | TypeTag::Counter(_) | TypeTag::Edge(_)
                        | TypeTag::Bistable(_)
                ) =>
            {
                self.fb_rung(instance, args, row);
            }
            other => {
                let (what, span) = describe_unsupported(other);
                let id = self.node(NodeKind::Unsupported, what.to_string(), row, 1);
                self.edge(LEFT_RAIL_ID, &id);
                self.edge(&id, RIGHT_RAIL_ID);
                self.warnings.push(Diagnostic::warning(
                    format!("{} is not representable as a ladder rung", what),
                    Some(span),
                ));
            }
        }
    }

    /// `Coil := <boolean expression>;`
    fn boolean_rung(&mut self, target: &VarRef, value: &Expression, row: usize) {
        let section = self.build_section(value, row, 1);
        let coil_col = 1 + section.width;
        let coil = self.node(NodeKind::Coil, target.to_string(), row, coil_col);

        for entry in &section.entries {
            self.edge(LEFT_RAIL_ID, entry);
        }
        for exit in &section.exits {
            self.edge(exit, &coil);
        }
        self.edge(&coil, RIGHT_RAIL_ID);
    }

    /// `T1(IN := ..., PT := ...);` and the other standard blocks
    fn fb_rung(&mut self, instance: &str, args: &[rung_core::CallArg], row: usize) {
        let (block, output_pin) = match self.types.get(instance) {
            TypeTag::Timer(kind) => (format!("{:?}", kind).to_ascii_uppercase(), "Q"),
            TypeTag::Counter(kind) => {
                let pin = match kind {
                    rung_runtime::CounterKind::Ctd => "QD",
                    _ => "QU",
                };
                (format!("{:?}", kind).to_ascii_uppercase(), pin)
            }
            TypeTag::Edge(rung_runtime::EdgeKind::Rising) => ("R_TRIG".to_string(), "Q"),
            TypeTag::Edge(rung_runtime::EdgeKind::Falling) => ("F_TRIG".to_string(), "Q"),
            TypeTag::Bistable(rung_runtime::BistableKind::SetDominant) => {
                ("SR".to_string(), "Q1")
            }
            TypeTag::Bistable(rung_runtime::BistableKind::ResetDominant) => {
                ("RS".to_string(), "Q1")
            }
            _ => unreachable!("caller matched FB tags"),
        };

        // Boolean pins get upstream contact sections; value pins (PT,
        // PV) stay inside the box
        const BOOLEAN_PINS: [&str; 9] = ["IN", "CU", "CD", "CLK", "S", "S1", "R", "R1", "LD"];
        let mut sections: Vec<(String, Section)> = Vec::new();
        for arg in args {
            let Some(name) = &arg.name else { continue };
            let pin = name.to_ascii_uppercase();
            if BOOLEAN_PINS.contains(&pin.as_str()) {
                let section = self.build_section(&arg.value, row, 1);
                sections.push((pin, section));
            }
        }

        let box_col = 1 + sections.iter().map(|(_, s)| s.width).max().unwrap_or(0);
        let box_id = self.node(
            NodeKind::FunctionBlock {
                block,
                instance: instance.to_string(),
            },
            instance.to_string(),
            row,
            box_col,
        );

        for (pin, section) in &sections {
            for entry in &section.entries {
                self.edge(LEFT_RAIL_ID, entry);
            }
            for exit in &section.exits {
                self.edge_with_handles(exit, &box_id, None, Some(pin.clone()));
            }
        }
        if sections.is_empty() {
            self.edge(LEFT_RAIL_ID, &box_id);
        }
        self.edge_with_handles(
            &box_id,
            RIGHT_RAIL_ID,
            Some(output_pin.to_string()),
            None,
        );
    }

    /// Recursive series/parallel decomposition of a boolean expression
    fn build_section(&mut self, expr: &Expression, row: usize, col: usize) -> Section {
        match expr {
            Expression::Paren(inner) => self.build_section(inner, row, col),

            Expression::Binary {
                op: BinaryOp::And,
                lhs,
                rhs,
            } => {
                let left = self.build_section(lhs, row, col);
                let right = self.build_section(rhs, row, col + left.width);
                for exit in &left.exits {
                    for entry in &right.entries {
                        self.edge(exit, entry);
                    }
                }
                Section {
                    entries: left.entries,
                    exits: right.exits,
                    width: left.width + right.width,
                }
            }

            Expression::Binary {
                op: BinaryOp::Or,
                lhs,
                rhs,
            } => {
                let open = self.node(NodeKind::BranchOpen, String::new(), row, col);
                let left = self.build_section(lhs, row, col + 1);
                let right = self.build_section(rhs, row, col + 1);
                let close_col = col + 1 + left.width.max(right.width);
                let close = self.node(NodeKind::BranchClose, String::new(), row, close_col);

                for entry in left.entries.iter().chain(&right.entries) {
                    self.edge(&open, entry);
                }
                for exit in left.exits.iter().chain(&right.exits) {
                    self.edge(exit, &close);
                }
                Section {
                    entries: vec![open],
                    exits: vec![close],
                    width: close_col - col + 1,
                }
            }

            Expression::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                let label = match operand.unparen() {
                    Expression::Variable(var) => var.to_string(),
                    other => other.to_string(),
                };
                let id = self.node(NodeKind::ContactNc, label, row, col);
                Section {
                    entries: vec![id.clone()],
                    exits: vec![id],
                    width: 1,
                }
            }

            Expression::Variable(var) => {
                let id = self.node(NodeKind::ContactNo, var.to_string(), row, col);
                Section {
                    entries: vec![id.clone()],
                    exits: vec![id],
                    width: 1,
                }
            }

            // Comparisons, XOR, literals, calls: one conditional contact
            // labeled with the expression text
            other => {
                let id = self.node(NodeKind::ContactNo, other.to_string(), row, col);
                Section {
                    entries: vec![id.clone()],
                    exits: vec![id],
                    width: 1,
                }
            }
        }
    }

    /// Place the shared rails once the rightmost column is known
    fn finish_rails(&mut self) {
        let max_col = self.nodes.iter().map(|n| n.col).max().unwrap_or(0);
        self.nodes.push(LadderNode {
            id: LEFT_RAIL_ID.to_string(),
            kind: NodeKind::PowerRailLeft,
            label: String::new(),
            row: 0,
            col: 0,
            stmt_index: 0,
        });
        self.nodes.push(LadderNode {
            id: RIGHT_RAIL_ID.to_string(),
            kind: NodeKind::PowerRailRight,
            label: String::new(),
            row: 0,
            col: max_col + 1,
            stmt_index: 0,
        });
    }
}

/// Can this expression sit on a rung as contact logic?
fn is_boolean_expr(expr: &Expression, types: &TypeRegistry) -> bool {
    match expr.unparen() {
        Expression::Literal(rung_core::Literal::Bool(_)) => true,
        Expression::Unary {
            op: UnaryOp::Not, ..
        } => true,
        Expression::Binary { op, .. } => op.yields_bool(),
        Expression::Variable(var) => is_boolean_var(var, types),
        _ => false,
    }
}

fn is_boolean_var(var: &VarRef, types: &TypeRegistry) -> bool {
    let key = var.dotted();
    match types.get(&key) {
        TypeTag::Bool => return true,
        TypeTag::Array(rung_runtime::ElemType::Bool) if !var.indices.is_empty() => return true,
        _ => {}
    }
    // FB boolean outputs: Timer1.Q, Counter.QU, Latch.Q1, ...
    if var.path.len() == 2 {
        let instance_tag = types.get(&var.path[0]);
        let field = var.path[1].to_ascii_uppercase();
        let is_fb = matches!(
            instance_tag,
            TypeTag::Timer(_) | TypeTag::Counter(_) | TypeTag::Edge(_) | TypeTag::Bistable(_)
        );
        if is_fb {
            return matches!(
                field.as_str(),
                "Q" | "QU" | "QD" | "Q1" | "IN" | "CLK" | "M" | "CU" | "CD" | "R" | "LD"
            );
        }
    }
    false
}

fn describe_unsupported(statement: &Statement) -> (&'static str, rung_core::Span) {
    let span = statement.span();
    let what = match statement {
        Statement::Assignment { .. } => "non-boolean assignment",
        Statement::If { .. } => "IF statement",
        Statement::Case { .. } => "CASE statement",
        Statement::For { .. } => "FOR loop",
        Statement::While { .. } => "WHILE loop",
        Statement::Repeat { .. } => "REPEAT loop",
        Statement::FbCall { .. } => "call of an undeclared function block",
        Statement::Exit { .. } => "EXIT statement",
        Statement::Continue { .. } => "CONTINUE statement",
    };
    (what, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeKind;

    fn run(text: &str) -> TransformResult {
        transform(text, &TransformOptions::default())
    }

    fn nodes_of<'a>(result: &'a TransformResult, predicate: fn(&NodeKind) -> bool) -> Vec<&'a LadderNode> {
        result.nodes.iter().filter(|n| predicate(&n.kind)).collect()
    }

    #[test]
    fn test_simple_contact_and_coil() {
        let result = run("VAR a : BOOL; y : BOOL; END_VAR y := a;");
        assert!(result.success);
        let contacts = nodes_of(&result, |k| matches!(k, NodeKind::ContactNo));
        let coils = nodes_of(&result, |k| matches!(k, NodeKind::Coil));
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].label, "a");
        assert_eq!(coils.len(), 1);
        assert_eq!(coils[0].label, "y");
        // left rail -> contact -> coil -> right rail
        assert!(result.edges.iter().any(|e| e.source == LEFT_RAIL_ID && e.target == contacts[0].id));
        assert!(result.edges.iter().any(|e| e.source == coils[0].id && e.target == RIGHT_RAIL_ID));
    }

    #[test]
    fn test_not_becomes_normally_closed() {
        let result = run("VAR a : BOOL; y : BOOL; END_VAR y := NOT a;");
        let nc = nodes_of(&result, |k| matches!(k, NodeKind::ContactNc));
        assert_eq!(nc.len(), 1);
        assert_eq!(nc[0].label, "a");
    }

    #[test]
    fn test_and_places_in_series() {
        let result = run("VAR a : BOOL; b : BOOL; y : BOOL; END_VAR y := a AND b;");
        let contacts = nodes_of(&result, |k| matches!(k, NodeKind::ContactNo));
        assert_eq!(contacts.len(), 2);
        let (first, second) = (contacts[0], contacts[1]);
        assert_eq!(first.row, second.row);
        assert!(first.col < second.col, "series contacts advance columns");
        assert!(result.edges.iter().any(|e| e.source == first.id && e.target == second.id));
    }

    #[test]
    fn test_or_creates_branch_nodes() {
        let result = run("VAR a : BOOL; b : BOOL; y : BOOL; END_VAR y := a OR b;");
        let opens = nodes_of(&result, |k| matches!(k, NodeKind::BranchOpen));
        let closes = nodes_of(&result, |k| matches!(k, NodeKind::BranchClose));
        let contacts = nodes_of(&result, |k| matches!(k, NodeKind::ContactNo));
        assert_eq!(opens.len(), 1);
        assert_eq!(closes.len(), 1);
        assert_eq!(contacts.len(), 2);
        // Both branch contacts hang off the open node and feed the close
        for contact in &contacts {
            assert!(result.edges.iter().any(|e| e.source == opens[0].id && e.target == contact.id));
            assert!(result.edges.iter().any(|e| e.source == contact.id && e.target == closes[0].id));
        }
    }

    #[test]
    fn test_mixed_series_parallel() {
        let result =
            run("VAR a : BOOL; b : BOOL; c : BOOL; y : BOOL; END_VAR y := (a OR b) AND c;");
        assert!(result.success);
        assert_eq!(nodes_of(&result, |k| matches!(k, NodeKind::ContactNo)).len(), 3);
        assert_eq!(nodes_of(&result, |k| matches!(k, NodeKind::BranchOpen)).len(), 1);
    }

    #[test]
    fn test_comparison_renders_single_conditional_contact() {
        let result = run("VAR x : INT; y : BOOL; END_VAR y := x > 3;");
        let contacts = nodes_of(&result, |k| matches!(k, NodeKind::ContactNo));
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].label, "x > 3");
    }

    #[test]
    fn test_fb_box_wiring() {
        let result = run(
            "VAR T1 : TON; Start : BOOL; END_VAR T1(IN := Start, PT := T#500ms);",
        );
        let boxes = nodes_of(&result, |k| matches!(k, NodeKind::FunctionBlock { .. }));
        assert_eq!(boxes.len(), 1);
        match &boxes[0].kind {
            NodeKind::FunctionBlock { block, instance } => {
                assert_eq!(block, "TON");
                assert_eq!(instance, "T1");
            }
            other => panic!("unexpected {:?}", other),
        }
        // The Start contact feeds the IN handle; Q drives the right rail
        assert!(result.edges.iter().any(|e| {
            e.target == boxes[0].id && e.target_handle.as_deref() == Some("IN")
        }));
        assert!(result.edges.iter().any(|e| {
            e.source == boxes[0].id
                && e.target == RIGHT_RAIL_ID
                && e.source_handle.as_deref() == Some("Q")
        }));
    }

    #[test]
    fn test_fb_q_read_drives_downstream_rung() {
        let result = run(
            "VAR T1 : TON; Done : BOOL; END_VAR \
             T1(IN := Done, PT := T#1s); Done := T1.Q;",
        );
        assert!(result.success);
        let contacts = nodes_of(&result, |k| matches!(k, NodeKind::ContactNo));
        assert!(contacts.iter().any(|c| c.label == "T1.Q" && c.row == 1));
    }

    #[test]
    fn test_unsupported_statements_warn_but_keep_rung_count() {
        let source = "VAR x : INT; y : BOOL; a : BOOL; END_VAR \
                      x := x + 1; \
                      IF a THEN y := TRUE; END_IF; \
                      y := a;";
        let result = run(source);
        assert!(result.success, "warnings must not fail the transform");
        let unsupported = nodes_of(&result, |k| matches!(k, NodeKind::Unsupported));
        assert_eq!(unsupported.len(), 2);
        assert_eq!(result.warnings.len(), 2);
        // One rung per statement: rows 0..3 all present
        let rows: std::collections::BTreeSet<usize> =
            result.nodes.iter().map(|n| n.row).collect();
        assert!(rows.contains(&0) && rows.contains(&1) && rows.contains(&2));
    }

    #[test]
    fn test_parse_errors_surface_and_fail() {
        let result = run("y := ;");
        assert!(!result.success);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn test_transform_is_deterministic() {
        let source = "VAR a : BOOL; b : BOOL; T1 : TON; y : BOOL; END_VAR \
                      T1(IN := a AND b, PT := T#1s); y := T1.Q OR b;";
        let first = run(source);
        let second = run(source);
        assert_eq!(first.nodes, second.nodes);
        assert_eq!(first.edges, second.edges);
    }

    #[test]
    fn test_intermediates_carry_ast() {
        let result = transform(
            "y := a;",
            &TransformOptions {
                include_intermediates: true,
            },
        );
        let ast = result.intermediates.expect("requested intermediates").ast;
        assert_eq!(ast.programs.len(), 1);
    }

    #[test]
    fn test_rails_are_shared_and_outermost() {
        let result = run("VAR a : BOOL; y : BOOL; z : BOOL; END_VAR y := a; z := NOT a;");
        let left = result.nodes.iter().find(|n| n.id == LEFT_RAIL_ID).unwrap();
        let right = result.nodes.iter().find(|n| n.id == RIGHT_RAIL_ID).unwrap();
        assert_eq!(left.col, 0);
        assert!(result
            .nodes
            .iter()
            .all(|n| n.id == RIGHT_RAIL_ID || n.col < right.col));
    }
}
