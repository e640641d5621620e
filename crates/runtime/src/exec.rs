//! Statement executor
//!
//! Runs statements sequentially; an error inside one statement is
//! confined to that statement. Control flow (EXIT/CONTINUE) propagates
//! through [`Flow`]; only a genuinely inconsistent interpreter state
//! (declared type and live instance disagree) aborts the scan.

use crate::blocks::{BistableKind, EdgeKind};
use crate::error::ScanError;
use crate::eval::{ExecCtx, eval, write_var};
use crate::registry::TypeTag;
use rung_core::ast::{CallArg, Statement};
use rung_core::{Value, to_int};
use tracing::trace;

/// Control-flow outcome of a statement list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    /// EXIT: unwind to the innermost loop and leave it
    Exit,
    /// CONTINUE: unwind to the innermost loop and start the next pass
    Continue,
}

/// Execute a statement list in order
pub fn execute(statements: &[Statement], ctx: &mut ExecCtx) -> Result<Flow, ScanError> {
    for statement in statements {
        match execute_one(statement, ctx)? {
            Flow::Normal => {}
            flow => return Ok(flow),
        }
    }
    Ok(Flow::Normal)
}

fn execute_one(statement: &Statement, ctx: &mut ExecCtx) -> Result<Flow, ScanError> {
    match statement {
        Statement::Assignment { target, value, .. } => {
            let result = eval(value, ctx);
            write_var(target, result, ctx);
            Ok(Flow::Normal)
        }

        Statement::If {
            branches,
            else_body,
            ..
        } => {
            for branch in branches {
                if eval(&branch.cond, ctx).as_bool() {
                    return execute(&branch.body, ctx);
                }
            }
            execute(else_body, ctx)
        }

        Statement::Case {
            selector,
            arms,
            else_body,
            ..
        } => {
            let value = to_int(eval(selector, ctx).as_number());
            for arm in arms {
                if arm.labels.iter().any(|label| label.matches(value)) {
                    return execute(&arm.body, ctx);
                }
            }
            execute(else_body, ctx)
        }

        Statement::For {
            var,
            start,
            end,
            step,
            body,
            ..
        } => run_for(var, start, end, step.as_ref(), body, ctx),

        Statement::While { cond, body, .. } => {
            let mut iterations = 0usize;
            while eval(cond, ctx).as_bool() {
                iterations += 1;
                if iterations > ctx.config.max_loop_iterations {
                    ctx.fault("WHILE loop exceeded the iteration guard");
                    break;
                }
                match execute(body, ctx)? {
                    Flow::Exit => break,
                    Flow::Normal | Flow::Continue => {}
                }
            }
            Ok(Flow::Normal)
        }

        Statement::Repeat { body, until, .. } => {
            let mut iterations = 0usize;
            loop {
                iterations += 1;
                if iterations > ctx.config.max_loop_iterations {
                    ctx.fault("REPEAT loop exceeded the iteration guard");
                    break;
                }
                match execute(body, ctx)? {
                    Flow::Exit => break,
                    Flow::Normal | Flow::Continue => {}
                }
                if eval(until, ctx).as_bool() {
                    break;
                }
            }
            Ok(Flow::Normal)
        }

        Statement::FbCall { instance, args, .. } => {
            call_function_block(instance, args, ctx)?;
            Ok(Flow::Normal)
        }

        Statement::Exit { .. } => Ok(Flow::Exit),
        Statement::Continue { .. } => Ok(Flow::Continue),
    }
}

fn run_for(
    var: &str,
    start: &rung_core::Expression,
    end: &rung_core::Expression,
    step: Option<&rung_core::Expression>,
    body: &[Statement],
    ctx: &mut ExecCtx,
) -> Result<Flow, ScanError> {
    // Bounds and step evaluate exactly once, at entry
    let start = eval(start, ctx).as_number();
    let end = eval(end, ctx).as_number();
    let step = match step {
        Some(expr) => eval(expr, ctx).as_number(),
        None => 1.0,
    };

    // Step 0 would never terminate; treat as zero iterations. A step
    // whose sign contradicts the direction also runs zero times.
    if step == 0.0 || step.is_nan() {
        ctx.fault("FOR loop with zero step runs no iterations");
        return Ok(Flow::Normal);
    }

    let loop_var = rung_core::VarRef::simple(var);
    let mut current = start;
    let mut iterations = 0usize;

    while (step > 0.0 && current <= end) || (step < 0.0 && current >= end) {
        iterations += 1;
        if iterations > ctx.config.max_loop_iterations {
            ctx.fault("FOR loop exceeded the iteration guard");
            break;
        }
        // The loop variable is observable by the body on every pass
        write_var(&loop_var, Value::Number(current), ctx);
        match execute(body, ctx)? {
            Flow::Exit => break,
            Flow::Normal | Flow::Continue => {}
        }
        current += step;
    }
    Ok(Flow::Normal)
}

/// Keyword arguments of one FB call, evaluated left to right
struct FbArgs {
    entries: Vec<(String, Value)>,
}

impl FbArgs {
    fn evaluate(args: &[CallArg], ctx: &mut ExecCtx) -> Self {
        let mut entries = Vec::with_capacity(args.len());
        for arg in args {
            let value = eval(&arg.value, ctx);
            if let Some(name) = &arg.name {
                entries.push((name.to_ascii_uppercase(), value));
            } else {
                ctx.fault("function block arguments must be keyword-form (name := value)");
            }
        }
        FbArgs { entries }
    }

    fn get(&self, pin: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == pin)
            .map(|(_, value)| value)
    }

    fn get_bool(&self, pin: &str) -> Option<bool> {
        self.get(pin).map(Value::as_bool)
    }
}

fn call_function_block(
    instance: &str,
    args: &[CallArg],
    ctx: &mut ExecCtx,
) -> Result<(), ScanError> {
    match ctx.types.get(instance) {
        TypeTag::Timer(kind) => {
            ensure_shape(instance, "timer", ctx)?;
            let args = FbArgs::evaluate(args, ctx);
            let preset = args.get("PT").map(Value::as_number);
            if ctx.store.get_timer(instance).is_none() {
                trace!(instance, ?kind, "materializing timer");
                ctx.store
                    .init_timer(instance, preset.unwrap_or(0.0), kind);
            } else if let Some(preset) = preset {
                ctx.store.set_timer_pt(instance, preset);
            }
            if let Some(input) = args.get_bool("IN") {
                ctx.store.set_timer_input(instance, input);
            }
        }

        TypeTag::Counter(kind) => {
            ensure_shape(instance, "counter", ctx)?;
            let args = FbArgs::evaluate(args, ctx);
            let preset = args.get("PV").map(|v| to_int(v.as_number()));
            if ctx.store.get_counter(instance).is_none() {
                trace!(instance, ?kind, "materializing counter");
                ctx.store
                    .init_counter(instance, preset.unwrap_or(0), kind);
            } else if let Some(preset) = preset {
                if let Some(counter) = ctx.store.counter_mut(instance) {
                    counter.set_preset(preset);
                }
            }
            if let Some(counter) = ctx.store.counter_mut(instance) {
                counter.update(
                    args.get_bool("CU"),
                    args.get_bool("CD"),
                    args.get_bool("R"),
                    args.get_bool("LD"),
                );
            }
        }

        TypeTag::Edge(kind) => {
            ensure_shape(instance, "edge detector", ctx)?;
            let args = FbArgs::evaluate(args, ctx);
            ctx.store.init_edge_detector(instance, kind);
            let clk = args.get_bool("CLK").unwrap_or(false);
            match kind {
                EdgeKind::Rising => ctx.store.update_r_trig(instance, clk),
                EdgeKind::Falling => ctx.store.update_f_trig(instance, clk),
            }
        }

        TypeTag::Bistable(kind) => {
            ensure_shape(instance, "bistable", ctx)?;
            let args = FbArgs::evaluate(args, ctx);
            ctx.store.init_bistable(instance, kind);
            match kind {
                BistableKind::SetDominant => {
                    // SR pins: S1 (alias S) and R
                    let set = args
                        .get_bool("S1")
                        .or_else(|| args.get_bool("S"))
                        .unwrap_or(false);
                    let reset = args.get_bool("R").unwrap_or(false);
                    ctx.store.update_sr(instance, set, reset);
                }
                BistableKind::ResetDominant => {
                    // RS pins: S and R1 (alias R)
                    let set = args.get_bool("S").unwrap_or(false);
                    let reset = args
                        .get_bool("R1")
                        .or_else(|| args.get_bool("R"))
                        .unwrap_or(false);
                    ctx.store.update_rs(instance, set, reset);
                }
            }
        }

        _ => {
            // Evaluate the arguments anyway (side effects are visible),
            // then record the fault and keep scanning
            let _ = FbArgs::evaluate(args, ctx);
            ctx.fault(format!(
                "call of '{}' which is not a declared function block",
                instance
            ));
        }
    }
    Ok(())
}

/// The declared tag and any live instance must agree; a mismatch means
/// the store was corrupted between scans
fn ensure_shape(instance: &str, expected: &str, ctx: &mut ExecCtx) -> Result<(), ScanError> {
    let occupied = [
        ("timer", ctx.store.get_timer(instance).is_some()),
        ("counter", ctx.store.get_counter(instance).is_some()),
        ("edge detector", ctx.store.get_edge_detector(instance).is_some()),
        ("bistable", ctx.store.get_bistable(instance).is_some()),
    ];
    for (shape, present) in occupied {
        if present && shape != expected {
            return Err(ScanError::InconsistentState(format!(
                "instance '{}' is declared as a {} but lives in the {} table",
                instance, expected, shape
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::init::initialize;
    use crate::registry::{ConstantRegistry, TypeRegistry};
    use crate::store::SimStore;

    struct Fixture {
        parsed: rung_core::SourceProgram,
        types: TypeRegistry,
        constants: ConstantRegistry,
        config: EngineConfig,
        store: SimStore,
    }

    impl Fixture {
        fn new(source: &str) -> Self {
            Self::with_config(source, EngineConfig::default())
        }

        fn with_config(source: &str, config: EngineConfig) -> Self {
            let parsed = rungc::parse(source);
            assert!(!parsed.has_errors(), "{:?}", parsed.diagnostics);
            let types = TypeRegistry::build(&parsed);
            let constants = ConstantRegistry::build(&parsed);
            let mut store = SimStore::new();
            initialize(&parsed, &mut store, &types, &config);
            Fixture {
                parsed,
                types,
                constants,
                config,
                store,
            }
        }

        /// Execute every program body once; returns recorded faults
        fn run(&mut self) -> Vec<crate::error::RuntimeFault> {
            let mut ctx = ExecCtx::new(
                &mut self.store,
                &self.types,
                &self.constants,
                &self.config,
            );
            for program in &self.parsed.programs {
                execute(&program.body, &mut ctx).expect("scan must not abort");
            }
            ctx.faults
        }
    }

    #[test]
    fn test_assignment_routes_by_type() {
        let mut f = Fixture::new(
            "VAR b : BOOL; i : INT; r : REAL; END_VAR b := 1; i := 3.9; r := 2.5;",
        );
        f.run();
        assert!(f.store.get_bool("b"));
        assert_eq!(f.store.get_int("i"), 3);
        assert_eq!(f.store.get_real("r"), 2.5);
    }

    #[test]
    fn test_if_elsif_else() {
        let mut f = Fixture::new(
            "VAR x : INT := 5; r : INT; END_VAR \
             IF x > 10 THEN r := 1; ELSIF x > 3 THEN r := 2; ELSE r := 3; END_IF;",
        );
        f.run();
        assert_eq!(f.store.get_int("r"), 2);
    }

    #[test]
    fn test_case_range_and_else() {
        let source = "VAR v : INT := 7; r : INT; END_VAR \
                      CASE v OF 1..10: r := 1; ELSE r := -1; END_CASE;";
        let mut f = Fixture::new(source);
        f.run();
        assert_eq!(f.store.get_int("r"), 1);

        let source = "VAR v : INT := 11; r : INT; END_VAR \
                      CASE v OF 1..10: r := 1; ELSE r := -1; END_CASE;";
        let mut f = Fixture::new(source);
        f.run();
        assert_eq!(f.store.get_int("r"), -1);
    }

    #[test]
    fn test_case_no_match_no_else_is_noop() {
        let mut f = Fixture::new(
            "VAR v : INT := 99; r : INT := 5; END_VAR CASE v OF 1: r := 1; END_CASE;",
        );
        f.run();
        assert_eq!(f.store.get_int("r"), 5);
    }

    #[test]
    fn test_for_sums() {
        let mut f = Fixture::new(
            "VAR s : INT; i : INT; END_VAR FOR i := 1 TO 5 DO s := s + i; END_FOR;",
        );
        f.run();
        assert_eq!(f.store.get_int("s"), 15);
    }

    #[test]
    fn test_for_negative_step() {
        let mut f = Fixture::new(
            "VAR n : INT; i : INT; END_VAR FOR i := 5 TO 1 BY -1 DO n := n + 1; END_FOR;",
        );
        f.run();
        assert_eq!(f.store.get_int("n"), 5);
    }

    #[test]
    fn test_for_contradictory_step_runs_zero_times() {
        let mut f = Fixture::new(
            "VAR n : INT; i : INT; END_VAR FOR i := 1 TO 5 BY -1 DO n := n + 1; END_FOR;",
        );
        f.run();
        assert_eq!(f.store.get_int("n"), 0);
    }

    #[test]
    fn test_for_zero_step_faults_and_skips() {
        let mut f = Fixture::new(
            "VAR n : INT; i : INT; END_VAR FOR i := 1 TO 5 BY 0 DO n := n + 1; END_FOR;",
        );
        let faults = f.run();
        assert_eq!(f.store.get_int("n"), 0);
        assert!(faults.iter().any(|fault| fault.message.contains("zero step")));
    }

    #[test]
    fn test_while_and_repeat() {
        let mut f = Fixture::new(
            "VAR x : INT; y : INT := 3; END_VAR \
             WHILE x < 4 DO x := x + 1; END_WHILE; \
             REPEAT y := y - 1; UNTIL y = 0 END_REPEAT;",
        );
        f.run();
        assert_eq!(f.store.get_int("x"), 4);
        assert_eq!(f.store.get_int("y"), 0);
    }

    #[test]
    fn test_repeat_runs_at_least_once() {
        let mut f = Fixture::new(
            "VAR n : INT; END_VAR REPEAT n := n + 1; UNTIL TRUE END_REPEAT;",
        );
        f.run();
        assert_eq!(f.store.get_int("n"), 1);
    }

    #[test]
    fn test_while_guard_trips() {
        let config = EngineConfig::new().with_max_loop_iterations(10);
        let mut f = Fixture::with_config(
            "VAR n : INT; END_VAR WHILE TRUE DO n := n + 1; END_WHILE; done := 1;",
            config,
        );
        let faults = f.run();
        assert_eq!(f.store.get_int("n"), 10);
        assert!(faults.iter().any(|fault| fault.message.contains("guard")));
        // The scan continued past the stuck loop
        assert_eq!(f.store.get_real("done"), 1.0);
    }

    #[test]
    fn test_exit_leaves_innermost_loop_only() {
        let mut f = Fixture::new(
            "VAR s : INT; i : INT; j : INT; END_VAR \
             FOR i := 1 TO 3 DO \
               FOR j := 1 TO 10 DO \
                 IF j > 2 THEN EXIT; END_IF; \
                 s := s + 1; \
               END_FOR; \
             END_FOR;",
        );
        f.run();
        // Inner loop contributes 2 per outer pass
        assert_eq!(f.store.get_int("s"), 6);
    }

    #[test]
    fn test_continue_skips_rest_of_body() {
        let mut f = Fixture::new(
            "VAR s : INT; i : INT; END_VAR \
             FOR i := 1 TO 5 DO \
               IF i = 3 THEN CONTINUE; END_IF; \
               s := s + i; \
             END_FOR;",
        );
        f.run();
        assert_eq!(f.store.get_int("s"), 12);
    }

    #[test]
    fn test_division_by_zero_continues() {
        let mut f = Fixture::new(
            "VAR result : REAL; next : INT; END_VAR result := 100 / 0; next := 42;",
        );
        let faults = f.run();
        assert_eq!(f.store.get_int("next"), 42, "statement after the fault must run");
        assert!(faults.iter().any(|fault| fault.message.contains("division by zero")));
    }

    #[test]
    fn test_two_dim_array_fill() {
        let mut f = Fixture::new(
            "VAR m : ARRAY[1..2, 1..3] OF INT; i : INT; j : INT; END_VAR \
             FOR i := 1 TO 2 DO \
               FOR j := 1 TO 3 DO \
                 m[i, j] := i * 10 + j; \
               END_FOR; \
             END_FOR;",
        );
        f.run();
        let meta = f.store.get_array("m").unwrap().meta.clone();
        let flat = meta.flat_index(&[2, 3]).unwrap();
        assert_eq!(f.store.get_array_element("m", flat), Some(Value::Number(23.0)));
    }

    #[test]
    fn test_out_of_bounds_write_is_isolated() {
        let mut f = Fixture::new(
            "VAR a : ARRAY[1..3] OF INT; END_VAR a[1] := 10; a[99] := 13;",
        );
        f.run();
        let array = f.store.get_array("a").unwrap();
        assert_eq!(array.values[0], Value::Number(10.0));
        assert_eq!(array.values[1], Value::Number(0.0));
        assert_eq!(array.values[2], Value::Number(0.0));
    }

    #[test]
    fn test_timer_call_materializes_lazily() {
        let mut f = Fixture::new(
            "VAR T1 : TON; Start : BOOL := TRUE; END_VAR T1(IN := Start, PT := T#500ms);",
        );
        assert!(f.store.get_timer("T1").is_none());
        f.run();
        let timer = f.store.get_timer("T1").unwrap();
        assert_eq!(timer.preset, 500.0);
        assert!(timer.input);
    }

    #[test]
    fn test_counter_call_counts_edges() {
        let source = "VAR C : CTU; Pulse : BOOL; END_VAR C(CU := Pulse, R := FALSE, PV := 3);";
        let mut f = Fixture::new(source);
        // Three pulses with gaps
        for _ in 0..3 {
            f.store.set_bool("Pulse", true);
            f.run();
            f.store.set_bool("Pulse", false);
            f.run();
        }
        let counter = f.store.get_counter("C").unwrap();
        assert_eq!(counter.value, 3);
        assert!(counter.output_up);
    }

    #[test]
    fn test_undeclared_fb_call_faults_but_continues() {
        let mut f = Fixture::new("Mystery(IN := TRUE); after := 1;");
        let faults = f.run();
        assert!(faults.iter().any(|fault| fault.message.contains("Mystery")));
        assert_eq!(f.store.get_real("after"), 1.0);
    }

    #[test]
    fn test_sr_rs_via_calls() {
        let source = "VAR L1 : SR; L2 : RS; END_VAR \
                      L1(S1 := TRUE, R := TRUE); L2(S := TRUE, R1 := TRUE);";
        let mut f = Fixture::new(source);
        f.run();
        assert!(f.store.get_bistable("L1").unwrap().output, "SR is set-dominant");
        assert!(!f.store.get_bistable("L2").unwrap().output, "RS is reset-dominant");
    }

    #[test]
    fn test_r_trig_one_shot() {
        let source = "VAR E : R_TRIG; Clk : BOOL; Hits : INT; END_VAR \
                      E(CLK := Clk); IF E.Q THEN Hits := Hits + 1; END_IF;";
        let mut f = Fixture::new(source);
        f.store.set_bool("Clk", true);
        f.run();
        f.run();
        f.run();
        assert_eq!(f.store.get_int("Hits"), 1);
    }
}
