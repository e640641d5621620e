//! Variable initializer
//!
//! Walks the declaration blocks and seeds the store with declared
//! initial values or per-type defaults. Enum members are written first
//! (as named INT constants) so later initializers can reference them.
//! VAR_EXTERNAL declarations create no storage: their slot belongs to
//! the matching VAR_GLOBAL. Function-block instances stay lazy; they
//! materialize at their first call in a scan.

use crate::config::EngineConfig;
use crate::eval::{ExecCtx, eval, write_typed};
use crate::registry::{ConstantRegistry, TypeRegistry, TypeTag};
use crate::store::{ArrayMeta, SimStore};
use rung_core::ast::{
    BlockQualifier, DataType, Expression, SourceProgram, TypeDefinition, TypeKind,
};
use rung_core::Value;
use std::collections::HashMap;

/// Populate `store` with every declared variable's initial value
pub fn initialize(
    source: &SourceProgram,
    store: &mut SimStore,
    types: &TypeRegistry,
    config: &EngineConfig,
) {
    let defs: HashMap<&str, &TypeDefinition> = source
        .types
        .iter()
        .map(|def| (def.name.as_str(), def))
        .collect();

    // Enum members first: named INT constants usable in initializers
    for def in &source.types {
        if let TypeKind::Enum(members) = &def.kind {
            for member in members {
                store.set_int(&member.name, member.value);
            }
        }
    }

    // Initializer expressions never gate on constant protection (the
    // constants themselves are being seeded here)
    let unguarded = ConstantRegistry::default();

    for program in &source.programs {
        for block in &program.blocks {
            if block.qualifier == BlockQualifier::VarExternal {
                continue;
            }
            for decl in &block.decls {
                for name in &decl.names {
                    init_name(
                        name,
                        &decl.data_type,
                        decl.initial.as_ref(),
                        store,
                        types,
                        config,
                        &unguarded,
                        &defs,
                        0,
                    );
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn init_name(
    name: &str,
    data_type: &DataType,
    initial: Option<&Expression>,
    store: &mut SimStore,
    types: &TypeRegistry,
    config: &EngineConfig,
    unguarded: &ConstantRegistry,
    defs: &HashMap<&str, &TypeDefinition>,
    depth: usize,
) {
    if depth > 8 {
        return;
    }

    if data_type.is_array() {
        let elem = TypeTag::elem_type(&data_type.name);
        let meta = ArrayMeta::new(data_type.ranges.clone(), elem);
        // A scalar initializer fills every element; otherwise defaults
        let values = match initial {
            Some(expr) => {
                let seed = eval_initial(expr, store, types, config, unguarded);
                vec![elem.coerce(&seed); meta.len()]
            }
            None => Vec::new(),
        };
        store.init_array(name, meta, values);
        return;
    }

    if let Some(tag) = TypeTag::scalar(&data_type.name) {
        let value = match initial {
            Some(expr) => eval_initial(expr, store, types, config, unguarded),
            None => default_for(tag),
        };
        write_typed(name, tag, value, store);
        return;
    }

    if TypeTag::function_block(&data_type.name).is_some() {
        // Lazy: materialized on first call
        return;
    }

    match defs.get(data_type.name.as_str()).map(|d| &d.kind) {
        Some(TypeKind::Struct(fields)) => {
            for field in fields {
                let flattened = format!("{}.{}", name, field.name);
                init_name(
                    &flattened,
                    &field.data_type,
                    field.initial.as_ref(),
                    store,
                    types,
                    config,
                    unguarded,
                    defs,
                    depth + 1,
                );
            }
        }
        Some(TypeKind::Enum(members)) => {
            // Default is the first enumerator
            let value = match initial {
                Some(expr) => eval_initial(expr, store, types, config, unguarded),
                None => Value::Number(members.first().map(|m| m.value).unwrap_or(0) as f64),
            };
            write_typed(name, TypeTag::Enum, value, store);
        }
        Some(TypeKind::Alias(aliased)) => {
            let aliased = aliased.clone();
            init_name(
                name, &aliased, initial, store, types, config, unguarded, defs, depth + 1,
            );
        }
        None => {
            // Unknown type: only an explicit initializer creates storage
            if let Some(expr) = initial {
                let value = eval_initial(expr, store, types, config, unguarded);
                write_typed(name, TypeTag::Unknown, value, store);
            }
        }
    }
}

fn eval_initial(
    expr: &Expression,
    store: &mut SimStore,
    types: &TypeRegistry,
    config: &EngineConfig,
    unguarded: &ConstantRegistry,
) -> Value {
    let mut ctx = ExecCtx::new(store, types, unguarded, config);
    eval(expr, &mut ctx)
}

fn default_for(tag: TypeTag) -> Value {
    match tag {
        TypeTag::Bool => Value::Bool(false),
        TypeTag::Str => Value::Str(String::new()),
        _ => Value::Number(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_source(source: &str) -> SimStore {
        let parsed = rungc::parse(source);
        assert!(!parsed.has_errors(), "{:?}", parsed.diagnostics);
        let types = TypeRegistry::build(&parsed);
        let config = EngineConfig::default();
        let mut store = SimStore::new();
        initialize(&parsed, &mut store, &types, &config);
        store
    }

    #[test]
    fn test_scalar_defaults_and_initials() {
        let store = init_source(
            "VAR a : BOOL; b : INT := 3; c : REAL := 1.5; s : STRING := 'hi'; END_VAR",
        );
        assert!(!store.get_bool("a"));
        assert_eq!(store.get_int("b"), 3);
        assert_eq!(store.get_real("c"), 1.5);
        assert_eq!(store.get_string("s"), "hi");
    }

    #[test]
    fn test_time_family_initials() {
        let store = init_source(
            "VAR t : TIME := T#1h30m; d : DATE := D#2024-01-15; \
             tod : TOD := TOD#14:30:00.500; END_VAR",
        );
        assert_eq!(store.get_time("t"), 5_400_000.0);
        assert_eq!(store.get_date("d"), 19_737);
        assert_eq!(store.get_time_of_day("tod"), 52_200_500.0);
    }

    #[test]
    fn test_var_external_creates_no_storage() {
        let store = init_source("VAR_EXTERNAL g : INT; END_VAR");
        assert!(store.probe("g").is_none());
    }

    #[test]
    fn test_array_allocation() {
        let store = init_source("VAR m : ARRAY[1..2, 1..3] OF INT; END_VAR");
        let array = store.get_array("m").unwrap();
        assert_eq!(array.values.len(), 6);
        assert_eq!(array.values[0], Value::Number(0.0));
    }

    #[test]
    fn test_array_scalar_initializer_fills() {
        let store = init_source("VAR m : ARRAY[1..4] OF INT := 7; END_VAR");
        let array = store.get_array("m").unwrap();
        assert!(array.values.iter().all(|v| *v == Value::Number(7.0)));
    }

    #[test]
    fn test_struct_fields_flattened_with_defaults() {
        let source = r#"
TYPE Point : STRUCT x : REAL := 2.5; y : REAL; tag : STRING; END_STRUCT; END_TYPE
VAR p : Point; END_VAR
"#;
        let store = init_source(source);
        assert_eq!(store.get_real("p.x"), 2.5);
        assert_eq!(store.get_real("p.y"), 0.0);
        assert_eq!(store.get_string("p.tag"), "");
    }

    #[test]
    fn test_enum_variable_defaults_to_first_member() {
        let source = r#"
TYPE Mode : (Idle := 5, Run, Stop); END_TYPE
VAR m : Mode; n : Mode := Stop; END_VAR
"#;
        let store = init_source(source);
        assert_eq!(store.get_int("m"), 5);
        assert_eq!(store.get_int("n"), 7);
    }

    #[test]
    fn test_enum_member_initializer_resolves() {
        // The documented behavior: B := 10 makes a T-typed variable
        // initialized to B store 10, and C store 11
        let source = r#"
TYPE T : (A, B := 10, C); END_TYPE
VAR vb : T := B; vc : T := C; END_VAR
"#;
        let store = init_source(source);
        assert_eq!(store.get_int("vb"), 10);
        assert_eq!(store.get_int("vc"), 11);
    }

    #[test]
    fn test_alias_typed_variable_allocates_like_target() {
        let source = r#"
TYPE SensorArray : ARRAY[1..8] OF INT; END_TYPE
VAR sensors : SensorArray; END_VAR
"#;
        let store = init_source(source);
        assert_eq!(store.get_array("sensors").unwrap().values.len(), 8);
    }

    #[test]
    fn test_fb_declarations_stay_lazy() {
        let store = init_source("VAR T1 : TON; C1 : CTU; END_VAR");
        assert!(store.get_timer("T1").is_none());
        assert!(store.get_counter("C1").is_none());
    }

    #[test]
    fn test_constant_initializes_then_scenarios_read() {
        let store = init_source("VAR CONSTANT Limit : INT := 10; END_VAR");
        assert_eq!(store.get_int("Limit"), 10);
    }

    #[test]
    fn test_initial_expression_arithmetic() {
        let store = init_source("VAR x : INT := 2 * 3 + 1; END_VAR");
        assert_eq!(store.get_int("x"), 7);
    }
}
