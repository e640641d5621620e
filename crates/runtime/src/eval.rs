//! Expression evaluator
//!
//! Total over every expression the parser can produce: coercion happens
//! at each operand, unknown names read as the type default, arithmetic
//! follows IEEE 754 (division by zero yields an infinity or NaN and the
//! next statement runs normally). Faults are recorded on the context,
//! never thrown.
//!
//! Access paths of length two resolve against the function-block field
//! namespaces before falling back to flattened `name.field` storage:
//! timer {Q, ET, IN, PT}, counter {CV, QU, QD, CU, CD, PV, R, LD},
//! edge detector {Q, CLK, M}, bistable {Q1}.

use crate::blocks::CounterKind;
use crate::config::EngineConfig;
use crate::error::RuntimeFault;
use crate::registry::{ConstantRegistry, TypeRegistry, TypeTag};
use crate::store::SimStore;
use crate::builtins;
use rung_core::ast::{BinaryOp, Expression, Literal, UnaryOp, VarRef};
use rung_core::{Value, to_int};

/// Mutable evaluation/execution context for one scan
pub struct ExecCtx<'a> {
    pub store: &'a mut SimStore,
    pub types: &'a TypeRegistry,
    pub constants: &'a ConstantRegistry,
    pub config: &'a EngineConfig,
    pub faults: Vec<RuntimeFault>,
}

impl<'a> ExecCtx<'a> {
    pub fn new(
        store: &'a mut SimStore,
        types: &'a TypeRegistry,
        constants: &'a ConstantRegistry,
        config: &'a EngineConfig,
    ) -> Self {
        ExecCtx {
            store,
            types,
            constants,
            config,
            faults: Vec::new(),
        }
    }

    pub fn fault(&mut self, message: impl Into<String>) {
        self.faults.push(RuntimeFault::new(message, None));
    }
}

/// Evaluate an expression to a runtime value; never fails
pub fn eval(expr: &Expression, ctx: &mut ExecCtx) -> Value {
    match expr {
        Expression::Literal(literal) => eval_literal(literal),
        Expression::Paren(inner) => eval(inner, ctx),
        Expression::Variable(var) => read_var(var, ctx),
        Expression::Unary { op, operand } => {
            let value = eval(operand, ctx);
            match op {
                UnaryOp::Neg => Value::Number(-value.as_number()),
                UnaryOp::Not => Value::Bool(!value.as_bool()),
            }
        }
        Expression::Binary { op, lhs, rhs } => {
            // Both sides always evaluate, left to right; no short-circuit
            let left = eval(lhs, ctx);
            let right = eval(rhs, ctx);
            eval_binary(*op, left, right, ctx)
        }
        Expression::Call { name, args } => {
            let values: Vec<Value> = args.iter().map(|arg| eval(&arg.value, ctx)).collect();
            call_function(name, &values, ctx)
        }
    }
}

fn eval_literal(literal: &Literal) -> Value {
    match literal {
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(v) => Value::Number(*v as f64),
        Literal::Real(v) => Value::Number(*v),
        Literal::Time { ms, .. } => Value::Number(*ms),
        Literal::Date { days, .. } => Value::Number(*days as f64),
        Literal::TimeOfDay { ms, .. } => Value::Number(*ms),
        Literal::DateTime { ms, .. } => Value::Number(*ms),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value, ctx: &mut ExecCtx) -> Value {
    match op {
        BinaryOp::And => Value::Bool(left.as_bool() && right.as_bool()),
        BinaryOp::Or => Value::Bool(left.as_bool() || right.as_bool()),
        BinaryOp::Xor => Value::Bool(left.as_bool() != right.as_bool()),
        BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Gt | BinaryOp::Le | BinaryOp::Ge => {
            compare(op, &left, &right)
        }
        BinaryOp::Add => Value::Number(left.as_number() + right.as_number()),
        BinaryOp::Sub => Value::Number(left.as_number() - right.as_number()),
        BinaryOp::Mul => Value::Number(left.as_number() * right.as_number()),
        BinaryOp::Div => {
            let divisor = right.as_number();
            if divisor == 0.0 {
                ctx.fault("division by zero");
            }
            Value::Number(left.as_number() / divisor)
        }
        BinaryOp::Mod => {
            let divisor = right.as_number();
            if divisor == 0.0 {
                ctx.fault("modulo by zero");
            }
            Value::Number(left.as_number() % divisor)
        }
        BinaryOp::Pow => Value::Number(left.as_number().powf(right.as_number())),
    }
}

/// Comparison: lexicographic when both operands are strings, numeric
/// otherwise
fn compare(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        _ => {
            let a = left.as_number();
            let b = right.as_number();
            match a.partial_cmp(&b) {
                Some(ordering) => ordering,
                // NaN compares unequal to everything
                None => {
                    return Value::Bool(matches!(op, BinaryOp::Ne));
                }
            }
        }
    };
    let result = match op {
        BinaryOp::Eq => ordering.is_eq(),
        BinaryOp::Ne => !ordering.is_eq(),
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Gt => ordering.is_gt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Ge => ordering.is_ge(),
        _ => unreachable!("compare called with non-comparison operator"),
    };
    Value::Bool(result)
}

fn call_function(name: &str, args: &[Value], ctx: &mut ExecCtx) -> Value {
    let upper = name.to_ascii_uppercase();

    // Domain faults surface before the (total) computation
    match upper.as_str() {
        "SQRT" if args.first().map(Value::as_number).unwrap_or(0.0) < 0.0 => {
            ctx.fault("SQRT of a negative value");
        }
        "LN" | "LOG" if args.first().map(Value::as_number).unwrap_or(0.0) <= 0.0 => {
            ctx.fault(format!("{} of a non-positive value", upper));
        }
        _ => {}
    }

    if let Some(result) = builtins::call(&upper, args) {
        return result;
    }
    if let Some(function) = ctx.config.user_function(&upper) {
        return function(args);
    }
    ctx.fault(format!("call of unknown function '{}'", name));
    Value::Number(0.0)
}

// ----------------------------------------------------------------------
// Variable access
// ----------------------------------------------------------------------

/// Read a variable reference.
///
/// Resolution order for `a.b`: timer fields, counter fields, edge
/// detector fields, bistable fields, then flattened storage under the
/// compound key. Unknown names yield the type default.
pub fn read_var(var: &VarRef, ctx: &mut ExecCtx) -> Value {
    if var.path.len() == 2
        && let Some(value) = read_fb_field(&var.path[0], &var.path[1], ctx.store)
    {
        return value;
    }

    let key = var.dotted();

    if !var.indices.is_empty() {
        return read_array_element(&key, var, ctx);
    }

    match ctx.types.get(&key) {
        TypeTag::Bool => Value::Bool(ctx.store.get_bool(&key)),
        TypeTag::Int | TypeTag::Enum => Value::Number(ctx.store.get_int(&key) as f64),
        TypeTag::Real => Value::Number(ctx.store.get_real(&key)),
        TypeTag::Time => Value::Number(ctx.store.get_time(&key)),
        TypeTag::Date => Value::Number(ctx.store.get_date(&key) as f64),
        TypeTag::TimeOfDay => Value::Number(ctx.store.get_time_of_day(&key)),
        TypeTag::DateTime => Value::Number(ctx.store.get_date_and_time(&key)),
        TypeTag::Str => Value::Str(ctx.store.get_string(&key)),
        // Reading a bare instance name yields its main output
        TypeTag::Timer(_) => Value::Bool(
            ctx.store
                .get_timer(&key)
                .map(|t| t.output)
                .unwrap_or(false),
        ),
        TypeTag::Counter(_) => Value::Number(
            ctx.store
                .get_counter(&key)
                .map(|c| c.value as f64)
                .unwrap_or(0.0),
        ),
        TypeTag::Edge(_) => Value::Bool(
            ctx.store
                .get_edge_detector(&key)
                .map(|e| e.output)
                .unwrap_or(false),
        ),
        TypeTag::Bistable(_) => Value::Bool(
            ctx.store
                .get_bistable(&key)
                .map(|b| b.output)
                .unwrap_or(false),
        ),
        TypeTag::Array(elem) => {
            // Array read without a subscript: element default
            elem.default_value()
        }
        TypeTag::Unknown => ctx.store.probe(&key).unwrap_or(Value::Number(0.0)),
    }
}

/// Standard function-block field namespaces, checked in priority order
fn read_fb_field(instance: &str, field: &str, store: &SimStore) -> Option<Value> {
    let field = field.to_ascii_uppercase();

    if let Some(timer) = store.get_timer(instance) {
        return Some(match field.as_str() {
            "Q" => Value::Bool(timer.output),
            "ET" => Value::Number(timer.elapsed),
            "IN" => Value::Bool(timer.input),
            "PT" => Value::Number(timer.preset),
            _ => Value::Number(0.0),
        });
    }
    if let Some(counter) = store.get_counter(instance) {
        return Some(match field.as_str() {
            "CV" => Value::Number(counter.value as f64),
            "QU" => Value::Bool(counter.output_up),
            "QD" => Value::Bool(counter.output_down),
            // Q reads as the counter's primary output
            "Q" => match counter.kind {
                CounterKind::Ctd => Value::Bool(counter.output_down),
                _ => Value::Bool(counter.output_up),
            },
            "CU" => Value::Bool(counter.count_up),
            "CD" => Value::Bool(counter.count_down),
            "PV" => Value::Number(counter.preset as f64),
            "R" => Value::Bool(counter.reset),
            "LD" => Value::Bool(counter.load),
            _ => Value::Number(0.0),
        });
    }
    if let Some(edge) = store.get_edge_detector(instance) {
        return Some(match field.as_str() {
            "Q" => Value::Bool(edge.output),
            "CLK" => Value::Bool(edge.clk),
            "M" => Value::Bool(edge.memory),
            _ => Value::Number(0.0),
        });
    }
    if let Some(bistable) = store.get_bistable(instance) {
        return Some(match field.as_str() {
            "Q1" => Value::Bool(bistable.output),
            _ => Value::Number(0.0),
        });
    }
    None
}

fn read_array_element(key: &str, var: &VarRef, ctx: &mut ExecCtx) -> Value {
    let indices: Vec<i64> = var
        .indices
        .iter()
        .map(|index| to_int(eval(index, ctx).as_number()))
        .collect();

    let Some(array) = ctx.store.get_array(key) else {
        return Value::Number(0.0);
    };
    let elem = array.meta.elem;
    match array.meta.flat_index(&indices) {
        Some(flat) => ctx
            .store
            .get_array_element(key, flat)
            .unwrap_or_else(|| elem.default_value()),
        // Out of bounds reads the element default, never a failure
        None => elem.default_value(),
    }
}

/// Route a write through the type registry.
///
/// CONSTANT names and unknown FB fields are silent no-ops; INT-family
/// targets floor-truncate; out-of-bounds array writes do nothing.
pub fn write_var(var: &VarRef, value: Value, ctx: &mut ExecCtx) {
    let key = var.dotted();

    if ctx.constants.contains(&key) {
        return;
    }

    if var.path.len() == 2 && write_fb_field(&var.path[0], &var.path[1], &value, ctx.store) {
        return;
    }

    if !var.indices.is_empty() {
        let indices: Vec<i64> = var
            .indices
            .iter()
            .map(|index| to_int(eval(index, ctx).as_number()))
            .collect();
        let flat = ctx
            .store
            .get_array(&key)
            .and_then(|array| array.meta.flat_index(&indices));
        if let Some(flat) = flat {
            ctx.store.set_array_element(&key, flat, value);
        }
        return;
    }

    write_typed(&key, ctx.types.get(&key), value, ctx.store);
}

/// Typed scalar write, shared with the initializer (which bypasses
/// constant protection)
pub fn write_typed(key: &str, tag: TypeTag, value: Value, store: &mut SimStore) {
    match tag {
        TypeTag::Bool => store.set_bool(key, value.as_bool()),
        TypeTag::Int | TypeTag::Enum => store.set_int(key, to_int(value.as_number())),
        TypeTag::Real => store.set_real(key, value.as_number()),
        TypeTag::Time => store.set_time(key, value.as_number()),
        TypeTag::Date => store.set_date(key, to_int(value.as_number())),
        TypeTag::TimeOfDay => store.set_time_of_day(key, value.as_number()),
        TypeTag::DateTime => store.set_date_and_time(key, value.as_number()),
        TypeTag::Str => store.set_string(key, value.as_string()),
        // Whole-instance and unsubscripted-array writes are no-ops
        TypeTag::Timer(_) | TypeTag::Counter(_) | TypeTag::Edge(_) | TypeTag::Bistable(_)
        | TypeTag::Array(_) => {}
        // Undeclared names route by value shape so snippet-style sources
        // without VAR blocks still simulate
        TypeTag::Unknown => match value {
            Value::Bool(b) => store.set_bool(key, b),
            Value::Number(n) => store.set_real(key, n),
            Value::Str(s) => store.set_string(key, s),
        },
    }
}

/// Writable FB pins; returns true when the write was consumed (including
/// consumed-as-no-op for read-only or unknown fields of a live instance)
fn write_fb_field(instance: &str, field: &str, value: &Value, store: &mut SimStore) -> bool {
    let field = field.to_ascii_uppercase();

    if store.get_timer(instance).is_some() {
        match field.as_str() {
            "PT" => store.set_timer_pt(instance, value.as_number()),
            "IN" => store.set_timer_input(instance, value.as_bool()),
            _ => {} // Q, ET and unknown fields are read-only
        }
        return true;
    }
    if let Some(counter) = store.counter_mut(instance) {
        match field.as_str() {
            "PV" => counter.set_preset(to_int(value.as_number())),
            "CV" => counter.set_value(to_int(value.as_number())),
            _ => {}
        }
        return true;
    }
    if store.get_edge_detector(instance).is_some() {
        if field == "CLK" {
            store.update_r_trig(instance, value.as_bool());
        }
        return true;
    }
    if store.get_bistable(instance).is_some() {
        // Bistable pins only change through block calls
        return true;
    }
    false
}
