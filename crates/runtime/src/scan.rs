//! Scan-cycle engine
//!
//! One scan = advance the clock by `scan_time`, execute every program's
//! statements in declaration order, then advance every timer by
//! `scan_time`. A scan is atomic from the outside: the engine is driven
//! externally (the UI ties it to its frame loop) and observers read or
//! write the store strictly between scans. Given identical inputs,
//! `run_scan` N times yields identical stores.

use crate::config::EngineConfig;
use crate::error::{RuntimeFault, ScanError};
use crate::eval::ExecCtx;
use crate::exec::execute;
use crate::init::initialize;
use crate::registry::{ConstantRegistry, TypeRegistry};
use crate::store::SimStore;
use rung_core::ast::SourceProgram;
use serde::Serialize;
use tracing::{debug, warn};

/// Outcome of one completed scan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    /// 1-based index of the scan that just completed
    pub scan_index: u64,
    /// Non-fatal faults recorded during the scan
    pub faults: Vec<RuntimeFault>,
}

pub struct ScanEngine {
    source: SourceProgram,
    store: SimStore,
    types: TypeRegistry,
    constants: ConstantRegistry,
    config: EngineConfig,
    scan_count: u64,
}

impl ScanEngine {
    /// Build registries, create a fresh store, and seed initial values
    pub fn new(source: SourceProgram, config: EngineConfig) -> Self {
        let types = TypeRegistry::build(&source);
        let constants = ConstantRegistry::build(&source);
        let mut store = SimStore::new();
        store.scan_time = config.scan_time_ms;
        initialize(&source, &mut store, &types, &config);
        ScanEngine {
            source,
            store,
            types,
            constants,
            config,
            scan_count: 0,
        }
    }

    /// Number of scans completed so far
    pub fn scan_count(&self) -> u64 {
        self.scan_count
    }

    pub fn store(&self) -> &SimStore {
        &self.store
    }

    /// Between-scans access for external observers (UI toggles, presets)
    pub fn store_mut(&mut self) -> &mut SimStore {
        &mut self.store
    }

    pub fn source(&self) -> &SourceProgram {
        &self.source
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Throw away all state and reinitialize from the declarations
    pub fn reset(&mut self) {
        self.store.clear_all();
        self.store.scan_time = self.config.scan_time_ms;
        initialize(&self.source, &mut self.store, &self.types, &self.config);
        self.scan_count = 0;
    }

    /// Run one scan cycle.
    ///
    /// On `Err` the scan counter does not advance. In `strict` mode any
    /// recorded fault is an error; otherwise faults travel on the report.
    pub fn run_scan(&mut self) -> Result<ScanReport, ScanError> {
        let delta = self.config.scan_time_ms as f64;
        self.store.clock_ms += delta;

        let mut ctx = ExecCtx::new(
            &mut self.store,
            &self.types,
            &self.constants,
            &self.config,
        );
        for program in &self.source.programs {
            execute(&program.body, &mut ctx)?;
        }
        let faults = ctx.faults;

        self.store.tick_all_timers(delta);

        if !faults.is_empty() {
            warn!(scan = self.scan_count + 1, count = faults.len(), "scan recorded faults");
            if self.config.strict {
                return Err(ScanError::Faulted(faults));
            }
        }

        self.scan_count += 1;
        debug!(scan = self.scan_count, clock_ms = self.store.clock_ms, "scan complete");
        Ok(ScanReport {
            scan_index: self.scan_count,
            faults,
        })
    }

    /// Convenience: run `count` scans, returning the last report
    pub fn run_scans(&mut self, count: u64) -> Result<ScanReport, ScanError> {
        let mut last = ScanReport {
            scan_index: self.scan_count,
            faults: Vec::new(),
        };
        for _ in 0..count {
            last = self.run_scan()?;
        }
        Ok(last)
    }
}
