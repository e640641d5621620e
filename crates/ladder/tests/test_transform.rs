//! Transform-level integration: JSON shape and graph invariants

use rung_ladder::{NodeKind, TransformOptions, transform};
use std::collections::HashSet;

fn run(text: &str) -> rung_ladder::TransformResult {
    transform(text, &TransformOptions::default())
}

#[test]
fn every_edge_references_a_real_node() {
    let source = r#"
VAR
  Start : BOOL;
  Stop : BOOL;
  Motor : BOOL;
  T1 : TON;
END_VAR
Motor := (Start OR Motor) AND NOT Stop;
T1(IN := Motor, PT := T#2s);
"#;
    let result = run(source);
    assert!(result.success);
    let ids: HashSet<&str> = result.nodes.iter().map(|n| n.id.as_str()).collect();
    for edge in &result.edges {
        assert!(ids.contains(edge.source.as_str()), "dangling source {}", edge.source);
        assert!(ids.contains(edge.target.as_str()), "dangling target {}", edge.target);
    }
}

#[test]
fn node_ids_are_unique() {
    let source = "VAR a : BOOL; b : BOOL; y : BOOL; z : BOOL; END_VAR \
                  y := a AND b OR NOT a; z := b;";
    let result = run(source);
    let mut seen = HashSet::new();
    for node in &result.nodes {
        assert!(seen.insert(&node.id), "duplicate node id {}", node.id);
    }
}

#[test]
fn serializes_to_json_for_the_renderer() {
    let result = run("VAR a : BOOL; y : BOOL; END_VAR y := NOT a;");
    let json = serde_json::to_value(&result).expect("serializable");
    assert_eq!(json["success"], true);
    let nodes = json["nodes"].as_array().unwrap();
    assert!(
        nodes
            .iter()
            .any(|n| n["type"] == "contact_nc" && n["label"] == "a")
    );
    // Span-less handles are omitted entirely, not null
    let edges = json["edges"].as_array().unwrap();
    assert!(!edges.is_empty());
}

#[test]
fn start_stop_seal_in_pattern() {
    // The classic motor seal-in circuit
    let source = r#"
VAR Start : BOOL; Stop : BOOL; Motor : BOOL; END_VAR
Motor := (Start OR Motor) AND NOT Stop;
"#;
    let result = run(source);
    assert!(result.success);
    assert!(result.warnings.is_empty());

    let contact_labels: Vec<&str> = result
        .nodes
        .iter()
        .filter(|n| matches!(n.kind, NodeKind::ContactNo | NodeKind::ContactNc))
        .map(|n| n.label.as_str())
        .collect();
    assert!(contact_labels.contains(&"Start"));
    assert!(contact_labels.contains(&"Motor"));
    assert!(contact_labels.contains(&"Stop"));

    let coil = result
        .nodes
        .iter()
        .find(|n| matches!(n.kind, NodeKind::Coil))
        .unwrap();
    assert_eq!(coil.label, "Motor");
}

#[test]
fn unchanged_source_means_unchanged_identity_and_count() {
    let source = r#"
VAR a : BOOL; b : BOOL; C : CTU; y : BOOL; END_VAR
C(CU := a, R := b, PV := 5);
y := C.QU AND NOT b;
x := 3;
"#;
    let first = run(source);
    let second = run(source);
    assert_eq!(first.nodes.len(), second.nodes.len());
    assert_eq!(first.edges.len(), second.edges.len());
    let first_ids: Vec<&String> = first.nodes.iter().map(|n| &n.id).collect();
    let second_ids: Vec<&String> = second.nodes.iter().map(|n| &n.id).collect();
    assert_eq!(first_ids, second_ids);
}

#[test]
fn counter_box_uses_qu_output_handle() {
    let result = run("VAR C : CTU; p : BOOL; END_VAR C(CU := p, R := FALSE, PV := 3);");
    let edge = result
        .edges
        .iter()
        .find(|e| e.source_handle.is_some())
        .expect("output edge");
    assert_eq!(edge.source_handle.as_deref(), Some("QU"));
}
