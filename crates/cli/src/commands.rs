//! Subcommand implementations
//!
//! Each returns a process exit code: 0 ok, 1 fatal, 2 diagnostics with
//! errors. All take explicit inputs so they stay testable without a
//! process boundary.

use rung_ladder::{TransformOptions, transform};
use rung_runtime::{ConfigFile, EngineConfig, ScanEngine};
use std::fs;
use std::path::Path;

/// Parse and print diagnostics
pub fn check(input: &Path, json: bool) -> i32 {
    let source = match fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: failed to read '{}': {}", input.display(), e);
            return 1;
        }
    };

    let parsed = rungc::parse(&source);
    if json {
        match serde_json::to_string_pretty(&parsed.diagnostics) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("error: {}", e);
                return 1;
            }
        }
    } else {
        for diagnostic in &parsed.diagnostics {
            println!("{}", diagnostic);
        }
        println!(
            "{} program(s), {} type(s), {} diagnostic(s)",
            parsed.programs.len(),
            parsed.types.len(),
            parsed.diagnostics.len()
        );
    }
    if parsed.has_errors() { 2 } else { 0 }
}

/// Simulate N scans and print the store
pub fn run(
    input: &Path,
    scans: u64,
    scan_time: Option<u64>,
    vars: &[String],
    strict: bool,
    json: bool,
) -> i32 {
    let source = match fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: failed to read '{}': {}", input.display(), e);
            return 1;
        }
    };

    let parsed = rungc::parse(&source);
    if parsed.has_errors() {
        for diagnostic in &parsed.diagnostics {
            eprintln!("{}", diagnostic);
        }
        return 2;
    }

    let mut config = load_project_config(input);
    if let Some(ms) = scan_time {
        config.scan_time_ms = ms;
    }
    if strict {
        config.strict = true;
    }

    let mut engine = ScanEngine::new(parsed, config);
    for var in vars {
        if let Err(message) = apply_override(&mut engine, var) {
            eprintln!("error: {}", message);
            return 1;
        }
    }

    let mut all_faults = Vec::new();
    for _ in 0..scans {
        match engine.run_scan() {
            Ok(report) => all_faults.extend(report.faults),
            Err(e) => {
                eprintln!("error: {}", e);
                return 1;
            }
        }
    }

    if json {
        let snapshot = engine.store().snapshot();
        match serde_json::to_string_pretty(&snapshot) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("error: {}", e);
                return 1;
            }
        }
    } else {
        print_store_text(&engine);
    }
    for fault in &all_faults {
        eprintln!("{}", fault);
    }
    0
}

/// Emit the ladder graph as JSON
pub fn ladder(input: &Path, output: Option<&Path>, intermediates: bool) -> i32 {
    let source = match fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: failed to read '{}': {}", input.display(), e);
            return 1;
        }
    };

    let result = transform(
        &source,
        &TransformOptions {
            include_intermediates: intermediates,
        },
    );
    for warning in &result.warnings {
        eprintln!("{}", warning);
    }
    for error in &result.errors {
        eprintln!("{}", error);
    }

    let json = match serde_json::to_string_pretty(&result) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("error: {}", e);
            return 1;
        }
    };
    match output {
        Some(path) => {
            if let Err(e) = fs::write(path, json) {
                eprintln!("error: failed to write '{}': {}", path.display(), e);
                return 1;
            }
        }
        None => println!("{}", json),
    }
    if result.success { 0 } else { 2 }
}

/// `rung.toml` next to the source file, if present
pub fn load_project_config(input: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    let candidate = input
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("rung.toml");
    if let Ok(text) = fs::read_to_string(&candidate) {
        match ConfigFile::from_toml(&text) {
            Ok(file) => config.apply_file(&file),
            Err(message) => eprintln!("warning: {}: {}", candidate.display(), message),
        }
    }
    config
}

/// `NAME=VALUE` pre-scan override, routed through the declared type
pub fn apply_override(engine: &mut ScanEngine, spec: &str) -> Result<(), String> {
    let (name, raw) = spec
        .split_once('=')
        .ok_or_else(|| format!("override '{}' must be NAME=VALUE", spec))?;
    let name = name.trim();
    let raw = raw.trim();

    let value = if raw.eq_ignore_ascii_case("TRUE") {
        rung_core::Value::Bool(true)
    } else if raw.eq_ignore_ascii_case("FALSE") {
        rung_core::Value::Bool(false)
    } else if let Some(ms) = rung_core::time::parse_time(raw) {
        rung_core::Value::Number(ms)
    } else if let Ok(number) = raw.parse::<f64>() {
        rung_core::Value::Number(number)
    } else {
        rung_core::Value::Str(raw.to_string())
    };

    // Undeclared names route by value shape so snippet-style sources
    // can still be driven from the command line
    let tag = engine.types().get(name);
    rung_runtime::eval::write_typed(name, tag, value, engine.store_mut());
    Ok(())
}

fn print_store_text(engine: &ScanEngine) {
    let snapshot = engine.store().snapshot();
    println!(
        "after {} scan(s), clock {} ms",
        engine.scan_count(),
        snapshot.clock_ms
    );
    for (name, value) in &snapshot.bools {
        println!("  {} : BOOL = {}", name, if *value { "TRUE" } else { "FALSE" });
    }
    for (name, value) in &snapshot.ints {
        println!("  {} : INT = {}", name, value);
    }
    for (name, value) in &snapshot.reals {
        println!("  {} : REAL = {}", name, value);
    }
    for (name, value) in &snapshot.times {
        println!("  {} : TIME = {}", name, value);
    }
    for (name, value) in &snapshot.dates {
        println!("  {} : DATE = {}", name, value);
    }
    for (name, value) in &snapshot.times_of_day {
        println!("  {} : TOD = {}", name, value);
    }
    for (name, value) in &snapshot.dates_and_times {
        println!("  {} : DT = {}", name, value);
    }
    for (name, value) in &snapshot.strings {
        println!("  {} : STRING = '{}'", name, value);
    }
    for (name, timer) in &snapshot.timers {
        println!(
            "  {} : {:?} IN={} PT={} ET={} Q={}",
            name, timer.kind, timer.input, timer.preset, timer.elapsed, timer.output
        );
    }
    for (name, counter) in &snapshot.counters {
        println!(
            "  {} : {:?} CV={} PV={} QU={} QD={}",
            name, counter.kind, counter.value, counter.preset, counter.output_up,
            counter.output_down
        );
    }
    for (name, edge) in &snapshot.edge_detectors {
        println!("  {} : {:?} Q={}", name, edge.kind, edge.output);
    }
    for (name, bistable) in &snapshot.bistables {
        println!("  {} : {:?} Q1={}", name, bistable.kind, bistable.output);
    }
    for (name, array) in &snapshot.arrays {
        println!("  {} : ARRAY[{} elements]", name, array.values.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_check_clean_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "ok.st", "VAR a : BOOL; END_VAR a := TRUE;");
        assert_eq!(check(&path, false), 0);
        assert_eq!(check(&path, true), 0);
    }

    #[test]
    fn test_check_reports_errors_with_exit_2() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "bad.st", "a := ;");
        assert_eq!(check(&path, false), 2);
    }

    #[test]
    fn test_check_missing_file_is_fatal() {
        assert_eq!(check(Path::new("/no/such/file.st"), false), 1);
    }

    #[test]
    fn test_run_scans_and_overrides() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "timer.st",
            "VAR StartInput : BOOL; T1 : TON; Done : BOOL; END_VAR \
             T1(IN := StartInput, PT := T#500ms); Done := T1.Q;",
        );
        let code = run(&path, 6, None, &["StartInput=TRUE".to_string()], false, true);
        assert_eq!(code, 0);
    }

    #[test]
    fn test_run_rejects_malformed_override() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "x.st", "a := 1;");
        assert_eq!(run(&path, 1, None, &["nonsense".to_string()], false, false), 1);
    }

    #[test]
    fn test_apply_override_routes_types() {
        let parsed = rungc::parse("VAR b : BOOL; i : INT; t : TIME; END_VAR");
        let mut engine = ScanEngine::new(parsed, EngineConfig::default());
        apply_override(&mut engine, "b=TRUE").unwrap();
        apply_override(&mut engine, "i=7.9").unwrap();
        apply_override(&mut engine, "t=T#2s").unwrap();
        assert!(engine.store().get_bool("b"));
        assert_eq!(engine.store().get_int("i"), 7);
        assert_eq!(engine.store().get_time("t"), 2_000.0);
    }

    #[test]
    fn test_ladder_writes_output_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "m.st", "VAR a : BOOL; y : BOOL; END_VAR y := a;");
        let out = dir.path().join("graph.json");
        assert_eq!(ladder(&path, Some(&out), false), 0);
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["success"], true);
    }

    #[test]
    fn test_project_config_is_picked_up() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "rung.toml", "scan_time_ms = 25\n");
        let path = write_file(&dir, "p.st", "a := 1;");
        let config = load_project_config(&path);
        assert_eq!(config.scan_time_ms, 25);
    }

    #[test]
    fn test_bad_project_config_warns_but_defaults() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "rung.toml", "scan_speed = 1\n");
        let path = write_file(&dir, "p.st", "a := 1;");
        let config = load_project_config(&path);
        assert_eq!(config.scan_time_ms, 100);
    }
}
