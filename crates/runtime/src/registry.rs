//! Type and constant registries
//!
//! Pure functions over the AST. The type registry maps every declared
//! name (struct fields flattened to `inst.field`) to a routing tag the
//! assignment path consults; the constant registry is the set of names
//! that are write-protected after initialization. Enum members count as
//! INT constants.

use crate::blocks::{BistableKind, CounterKind, EdgeKind, TimerKind};
use crate::store::ElemType;
use rung_core::ast::{
    BlockQualifier, DataType, SourceProgram, TypeDefinition, TypeKind, VariableBlock,
};
use std::collections::{HashMap, HashSet};

/// Routing tag for one declared name.
///
/// All integer widths (SINT..LWORD, BYTE..LWORD) collapse to `Int`;
/// REAL and LREAL collapse to `Real`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    Bool,
    Int,
    Real,
    Time,
    Date,
    TimeOfDay,
    DateTime,
    Str,
    Timer(TimerKind),
    Counter(CounterKind),
    Edge(EdgeKind),
    Bistable(BistableKind),
    Array(ElemType),
    /// Variable of a user enumeration type; stored in the INT table
    Enum,
    Unknown,
}

impl TypeTag {
    /// Tag for a primitive scalar type name (already upper-cased)
    pub fn scalar(name: &str) -> Option<TypeTag> {
        match name {
            "BOOL" => Some(TypeTag::Bool),
            "SINT" | "INT" | "DINT" | "LINT" | "USINT" | "UINT" | "UDINT" | "ULINT" | "BYTE"
            | "WORD" | "DWORD" | "LWORD" => Some(TypeTag::Int),
            "REAL" | "LREAL" => Some(TypeTag::Real),
            "TIME" => Some(TypeTag::Time),
            "DATE" => Some(TypeTag::Date),
            "TOD" | "TIME_OF_DAY" => Some(TypeTag::TimeOfDay),
            "DT" | "DATE_AND_TIME" => Some(TypeTag::DateTime),
            "STRING" | "WSTRING" => Some(TypeTag::Str),
            _ => None,
        }
    }

    /// Tag for a standard function-block type name
    pub fn function_block(name: &str) -> Option<TypeTag> {
        match name {
            "TON" => Some(TypeTag::Timer(TimerKind::Ton)),
            "TOF" => Some(TypeTag::Timer(TimerKind::Tof)),
            "TP" => Some(TypeTag::Timer(TimerKind::Tp)),
            "CTU" => Some(TypeTag::Counter(CounterKind::Ctu)),
            "CTD" => Some(TypeTag::Counter(CounterKind::Ctd)),
            "CTUD" => Some(TypeTag::Counter(CounterKind::Ctud)),
            "R_TRIG" => Some(TypeTag::Edge(EdgeKind::Rising)),
            "F_TRIG" => Some(TypeTag::Edge(EdgeKind::Falling)),
            "SR" => Some(TypeTag::Bistable(BistableKind::SetDominant)),
            "RS" => Some(TypeTag::Bistable(BistableKind::ResetDominant)),
            _ => None,
        }
    }

    /// Element type for array storage; non-scalar elements fall back to
    /// the integer table
    pub fn elem_type(name: &str) -> ElemType {
        match TypeTag::scalar(name) {
            Some(TypeTag::Bool) => ElemType::Bool,
            Some(TypeTag::Real) => ElemType::Real,
            Some(TypeTag::Time) => ElemType::Time,
            Some(TypeTag::Date) => ElemType::Date,
            Some(TypeTag::TimeOfDay) => ElemType::TimeOfDay,
            Some(TypeTag::DateTime) => ElemType::DateTime,
            Some(TypeTag::Str) => ElemType::Str,
            _ => ElemType::Int,
        }
    }
}

/// Name -> declared-type tag, struct fields flattened
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    map: HashMap<String, TypeTag>,
}

impl TypeRegistry {
    pub fn build(source: &SourceProgram) -> Self {
        let defs = type_table(source);
        let mut registry = TypeRegistry::default();
        for program in &source.programs {
            for block in &program.blocks {
                registry.add_block(block, &defs);
            }
        }
        registry
    }

    fn add_block(&mut self, block: &VariableBlock, defs: &HashMap<&str, &TypeDefinition>) {
        for decl in &block.decls {
            for name in &decl.names {
                self.add_name(name, &decl.data_type, defs, 0);
            }
        }
    }

    /// Register one name; struct-typed names recurse into their fields
    fn add_name(
        &mut self,
        name: &str,
        data_type: &DataType,
        defs: &HashMap<&str, &TypeDefinition>,
        depth: usize,
    ) {
        // A self-referential struct would recurse forever; eight levels
        // of nesting is beyond anything a PLC program declares
        if depth > 8 {
            return;
        }
        if data_type.is_array() {
            self.map.insert(
                name.to_string(),
                TypeTag::Array(TypeTag::elem_type(&data_type.name)),
            );
            return;
        }
        if let Some(tag) = TypeTag::scalar(&data_type.name) {
            self.map.insert(name.to_string(), tag);
            return;
        }
        if let Some(tag) = TypeTag::function_block(&data_type.name) {
            self.map.insert(name.to_string(), tag);
            return;
        }
        match defs.get(data_type.name.as_str()).map(|d| &d.kind) {
            Some(TypeKind::Struct(fields)) => {
                for field in fields {
                    let flattened = format!("{}.{}", name, field.name);
                    self.add_name(&flattened, &field.data_type, defs, depth + 1);
                }
            }
            Some(TypeKind::Enum(_)) => {
                self.map.insert(name.to_string(), TypeTag::Enum);
            }
            Some(TypeKind::Alias(aliased)) => {
                let aliased = aliased.clone();
                self.add_name(name, &aliased, defs, depth + 1);
            }
            None => {
                self.map.insert(name.to_string(), TypeTag::Unknown);
            }
        }
    }

    /// Tag for a flattened name; undeclared names are `Unknown`
    pub fn get(&self, name: &str) -> TypeTag {
        self.map.get(name).copied().unwrap_or(TypeTag::Unknown)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.map.keys()
    }
}

/// Set of names that never change after initialization
#[derive(Debug, Clone, Default)]
pub struct ConstantRegistry {
    names: HashSet<String>,
}

impl ConstantRegistry {
    pub fn build(source: &SourceProgram) -> Self {
        let defs = type_table(source);
        let mut registry = ConstantRegistry::default();

        // Enum members behave as named INT constants
        for def in &source.types {
            if let TypeKind::Enum(members) = &def.kind {
                for member in members {
                    registry.names.insert(member.name.clone());
                }
            }
        }

        for program in &source.programs {
            for block in &program.blocks {
                if block.qualifier != BlockQualifier::Constant {
                    continue;
                }
                for decl in &block.decls {
                    for name in &decl.names {
                        registry.add_flattened(name, &decl.data_type, &defs, 0);
                    }
                }
            }
        }
        registry
    }

    fn add_flattened(
        &mut self,
        name: &str,
        data_type: &DataType,
        defs: &HashMap<&str, &TypeDefinition>,
        depth: usize,
    ) {
        if depth > 8 {
            return;
        }
        self.names.insert(name.to_string());
        match defs.get(data_type.name.as_str()).map(|d| &d.kind) {
            Some(TypeKind::Struct(fields)) => {
                for field in fields {
                    let flattened = format!("{}.{}", name, field.name);
                    self.add_flattened(&flattened, &field.data_type, defs, depth + 1);
                }
            }
            Some(TypeKind::Alias(aliased)) => {
                let aliased = aliased.clone();
                self.add_flattened(name, &aliased, defs, depth + 1);
            }
            _ => {}
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

fn type_table(source: &SourceProgram) -> HashMap<&str, &TypeDefinition> {
    source
        .types
        .iter()
        .map(|def| (def.name.as_str(), def))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_for(source: &str) -> (TypeRegistry, ConstantRegistry) {
        let parsed = rungc::parse(source);
        assert!(
            !parsed.has_errors(),
            "parse errors: {:?}",
            parsed.diagnostics
        );
        (
            TypeRegistry::build(&parsed),
            ConstantRegistry::build(&parsed),
        )
    }

    #[test]
    fn test_integer_widths_collapse() {
        let (types, _) = registry_for(
            "VAR a : SINT; b : DINT; c : WORD; d : LWORD; END_VAR",
        );
        for name in ["a", "b", "c", "d"] {
            assert_eq!(types.get(name), TypeTag::Int);
        }
    }

    #[test]
    fn test_function_block_tags() {
        let (types, _) =
            registry_for("VAR T1 : TON; C1 : CTUD; E1 : F_TRIG; B1 : RS; END_VAR");
        assert_eq!(types.get("T1"), TypeTag::Timer(TimerKind::Ton));
        assert_eq!(types.get("C1"), TypeTag::Counter(CounterKind::Ctud));
        assert_eq!(types.get("E1"), TypeTag::Edge(EdgeKind::Falling));
        assert_eq!(types.get("B1"), TypeTag::Bistable(BistableKind::ResetDominant));
    }

    #[test]
    fn test_struct_fields_flatten() {
        let source = r#"
TYPE Point : STRUCT x : REAL; y : REAL; END_STRUCT; END_TYPE
VAR p : Point; END_VAR
"#;
        let (types, _) = registry_for(source);
        assert_eq!(types.get("p.x"), TypeTag::Real);
        assert_eq!(types.get("p.y"), TypeTag::Real);
    }

    #[test]
    fn test_nested_struct_fields_flatten() {
        let source = r#"
TYPE Inner : STRUCT v : INT; END_STRUCT; END_TYPE
TYPE Outer : STRUCT a : Inner; flag : BOOL; END_STRUCT; END_TYPE
VAR o : Outer; END_VAR
"#;
        let (types, _) = registry_for(source);
        assert_eq!(types.get("o.a.v"), TypeTag::Int);
        assert_eq!(types.get("o.flag"), TypeTag::Bool);
    }

    #[test]
    fn test_array_tag_carries_element_type() {
        let (types, _) = registry_for("VAR m : ARRAY[1..3] OF BOOL; END_VAR");
        assert_eq!(types.get("m"), TypeTag::Array(ElemType::Bool));
    }

    #[test]
    fn test_alias_resolves_to_target_tag() {
        let source = r#"
TYPE SensorArray : ARRAY[1..8] OF INT; END_TYPE
TYPE Reading : REAL; END_TYPE
VAR sensors : SensorArray; latest : Reading; END_VAR
"#;
        let (types, _) = registry_for(source);
        assert_eq!(types.get("sensors"), TypeTag::Array(ElemType::Int));
        assert_eq!(types.get("latest"), TypeTag::Real);
    }

    #[test]
    fn test_enum_var_and_members() {
        let source = r#"
TYPE Mode : (Idle, Run := 10, Stop); END_TYPE
VAR m : Mode; END_VAR
"#;
        let (types, constants) = registry_for(source);
        assert_eq!(types.get("m"), TypeTag::Enum);
        assert!(constants.contains("Idle"));
        assert!(constants.contains("Stop"));
    }

    #[test]
    fn test_constant_block_names() {
        let (_, constants) = registry_for("VAR CONSTANT Limit : INT := 10; END_VAR");
        assert!(constants.contains("Limit"));
        assert!(!constants.contains("Other"));
    }

    #[test]
    fn test_unknown_name_is_unknown() {
        let (types, _) = registry_for("VAR a : BOOL; END_VAR");
        assert_eq!(types.get("nope"), TypeTag::Unknown);
    }
}
