//! Engine configuration
//!
//! Programmatic builder consumed by [`crate::scan::ScanEngine`], plus a
//! TOML project-file layer (`rung.toml`) the CLI merges on top. User
//! functions extend the expression evaluator: an unknown call falls
//! through to the registered hook before degrading to zero.

use rung_core::Value;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::store::DEFAULT_SCAN_TIME_MS;

pub const DEFAULT_MAX_LOOP_ITERATIONS: usize = 100_000;

/// A user-supplied function callable from ST expressions.
///
/// Must be total: whatever the arguments, return a value.
pub type UserFunction = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

#[derive(Clone)]
pub struct EngineConfig {
    /// Scan duration in integer milliseconds
    pub scan_time_ms: u64,
    /// WHILE/REPEAT/FOR guard: iterations beyond this record a fault
    /// and leave the loop, so a stuck loop cannot hang the host
    pub max_loop_iterations: usize,
    /// Promote runtime faults to a scan error
    pub strict: bool,
    /// Extra functions, keyed by upper-cased name
    user_functions: HashMap<String, UserFunction>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            scan_time_ms: DEFAULT_SCAN_TIME_MS,
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            strict: false,
            user_functions: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.user_functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("EngineConfig")
            .field("scan_time_ms", &self.scan_time_ms)
            .field("max_loop_iterations", &self.max_loop_iterations)
            .field("strict", &self.strict)
            .field("user_functions", &names)
            .finish()
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        EngineConfig::default()
    }

    pub fn with_scan_time(mut self, scan_time_ms: u64) -> Self {
        self.scan_time_ms = scan_time_ms;
        self
    }

    pub fn with_max_loop_iterations(mut self, limit: usize) -> Self {
        self.max_loop_iterations = limit;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Register a function callable from expressions (case-insensitive)
    pub fn with_function(
        mut self,
        name: impl Into<String>,
        function: impl Fn(&[Value]) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.user_functions
            .insert(name.into().to_ascii_uppercase(), Arc::new(function));
        self
    }

    pub fn user_function(&self, name_upper: &str) -> Option<&UserFunction> {
        self.user_functions.get(name_upper)
    }

    /// Overlay values from a parsed project file
    pub fn apply_file(&mut self, file: &ConfigFile) {
        if let Some(ms) = file.scan_time_ms {
            self.scan_time_ms = ms;
        }
        if let Some(limit) = file.max_loop_iterations {
            self.max_loop_iterations = limit;
        }
        if let Some(strict) = file.strict {
            self.strict = strict;
        }
    }
}

/// `rung.toml` contents
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub scan_time_ms: Option<u64>,
    pub max_loop_iterations: Option<usize>,
    pub strict: Option<bool>,
}

impl ConfigFile {
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("failed to parse rung.toml: {}", e))
    }
}
