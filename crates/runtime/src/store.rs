//! Simulation store: typed symbol tables and function-block instances
//!
//! One table per scalar category, keyed by flattened names (`Motor`,
//! `Line1.Speed`). All stored times are milliseconds; DATE is whole days
//! since 1970-01-01 UTC. The store is an explicit handle owned by the
//! scan engine; nothing here is global. Between scans the UI reads and
//! writes it freely; during a scan only the executor touches it.
//!
//! Reads of unknown names return the type default, never an error.

use crate::blocks::{
    BistableKind, BistableState, CounterKind, CounterState, EdgeKind, EdgeState, TimerKind,
    TimerState,
};
use rung_core::ast::ArrayRange;
use rung_core::{Value, time};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Element type of an array, fixed at declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ElemType {
    Bool,
    Int,
    Real,
    Time,
    Date,
    TimeOfDay,
    DateTime,
    Str,
}

impl ElemType {
    /// Default value stored for uninitialized or out-of-bounds elements
    pub fn default_value(&self) -> Value {
        match self {
            ElemType::Bool => Value::Bool(false),
            ElemType::Str => Value::Str(String::new()),
            _ => Value::Number(0.0),
        }
    }

    /// Coerce a runtime value for storage as this element type
    pub fn coerce(&self, value: &Value) -> Value {
        match self {
            ElemType::Bool => Value::Bool(value.as_bool()),
            ElemType::Int | ElemType::Date => {
                Value::Number(rung_core::to_int(value.as_number()) as f64)
            }
            ElemType::Real | ElemType::Time | ElemType::TimeOfDay | ElemType::DateTime => {
                Value::Number(value.as_number())
            }
            ElemType::Str => Value::Str(value.as_string()),
        }
    }
}

/// Dimension layout of one declared array
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayMeta {
    pub dims: Vec<ArrayRange>,
    pub elem: ElemType,
}

impl ArrayMeta {
    pub fn new(dims: Vec<ArrayRange>, elem: ElemType) -> Self {
        ArrayMeta { dims, elem }
    }

    /// Total element count (product over dimensions)
    pub fn len(&self) -> usize {
        self.dims.iter().map(ArrayRange::len).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major flat index for one subscript per dimension.
    /// `None` when the subscript count mismatches or any index is
    /// outside its declared range.
    pub fn flat_index(&self, indices: &[i64]) -> Option<usize> {
        if indices.len() != self.dims.len() {
            return None;
        }
        let mut flat = 0usize;
        for (range, &index) in self.dims.iter().zip(indices) {
            if index < range.start || index > range.end {
                return None;
            }
            flat = flat * range.len() + (index - range.start) as usize;
        }
        Some(flat)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayState {
    pub meta: ArrayMeta,
    pub values: Vec<Value>,
}

/// Serializable view of every variable for the UI and `--json` output
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct StoreSnapshot {
    pub clock_ms: f64,
    pub bools: BTreeMap<String, bool>,
    pub ints: BTreeMap<String, i64>,
    pub reals: BTreeMap<String, f64>,
    /// TIME values rendered as literals (`T#1h30m`)
    pub times: BTreeMap<String, String>,
    /// DATE values rendered as literals (`D#2024-01-15`)
    pub dates: BTreeMap<String, String>,
    pub times_of_day: BTreeMap<String, String>,
    pub dates_and_times: BTreeMap<String, String>,
    pub strings: BTreeMap<String, String>,
    pub timers: BTreeMap<String, TimerState>,
    pub counters: BTreeMap<String, CounterState>,
    pub edge_detectors: BTreeMap<String, EdgeState>,
    pub bistables: BTreeMap<String, BistableState>,
    pub arrays: BTreeMap<String, ArrayState>,
}

#[derive(Debug, Clone, Default)]
pub struct SimStore {
    /// Scan duration in integer milliseconds
    pub scan_time: u64,
    /// Simulation clock, advanced once per scan
    pub clock_ms: f64,
    bools: HashMap<String, bool>,
    ints: HashMap<String, i64>,
    reals: HashMap<String, f64>,
    times: HashMap<String, f64>,
    dates: HashMap<String, i64>,
    tods: HashMap<String, f64>,
    dts: HashMap<String, f64>,
    strings: HashMap<String, String>,
    timers: HashMap<String, TimerState>,
    counters: HashMap<String, CounterState>,
    edges: HashMap<String, EdgeState>,
    bistables: HashMap<String, BistableState>,
    arrays: HashMap<String, ArrayState>,
}

pub const DEFAULT_SCAN_TIME_MS: u64 = 100;

impl SimStore {
    pub fn new() -> Self {
        SimStore {
            scan_time: DEFAULT_SCAN_TIME_MS,
            ..Default::default()
        }
    }

    /// Reset every table; the next simulation run starts clean
    pub fn clear_all(&mut self) {
        let scan_time = self.scan_time;
        *self = SimStore::new();
        self.scan_time = scan_time;
    }

    // ------------------------------------------------------------------
    // Scalar tables. Getters default on a miss, never fail.
    // ------------------------------------------------------------------

    pub fn get_bool(&self, name: &str) -> bool {
        self.bools.get(name).copied().unwrap_or(false)
    }

    pub fn set_bool(&mut self, name: &str, value: bool) {
        self.bools.insert(name.to_string(), value);
    }

    pub fn get_int(&self, name: &str) -> i64 {
        self.ints.get(name).copied().unwrap_or(0)
    }

    pub fn set_int(&mut self, name: &str, value: i64) {
        self.ints.insert(name.to_string(), value);
    }

    pub fn get_real(&self, name: &str) -> f64 {
        self.reals.get(name).copied().unwrap_or(0.0)
    }

    pub fn set_real(&mut self, name: &str, value: f64) {
        self.reals.insert(name.to_string(), value);
    }

    /// TIME in milliseconds
    pub fn get_time(&self, name: &str) -> f64 {
        self.times.get(name).copied().unwrap_or(0.0)
    }

    pub fn set_time(&mut self, name: &str, ms: f64) {
        self.times.insert(name.to_string(), ms);
    }

    /// DATE in days since 1970-01-01 UTC
    pub fn get_date(&self, name: &str) -> i64 {
        self.dates.get(name).copied().unwrap_or(0)
    }

    pub fn set_date(&mut self, name: &str, days: i64) {
        self.dates.insert(name.to_string(), days);
    }

    /// TIME_OF_DAY in milliseconds since midnight
    pub fn get_time_of_day(&self, name: &str) -> f64 {
        self.tods.get(name).copied().unwrap_or(0.0)
    }

    pub fn set_time_of_day(&mut self, name: &str, ms: f64) {
        self.tods.insert(name.to_string(), ms);
    }

    /// DATE_AND_TIME in milliseconds since 1970-01-01 UTC
    pub fn get_date_and_time(&self, name: &str) -> f64 {
        self.dts.get(name).copied().unwrap_or(0.0)
    }

    pub fn set_date_and_time(&mut self, name: &str, ms: f64) {
        self.dts.insert(name.to_string(), ms);
    }

    pub fn get_string(&self, name: &str) -> String {
        self.strings.get(name).cloned().unwrap_or_default()
    }

    pub fn set_string(&mut self, name: &str, value: String) {
        self.strings.insert(name.to_string(), value);
    }

    /// Which scalar table holds `name`, if any (used for untyped reads)
    pub fn probe(&self, name: &str) -> Option<Value> {
        if let Some(b) = self.bools.get(name) {
            return Some(Value::Bool(*b));
        }
        if let Some(i) = self.ints.get(name) {
            return Some(Value::Number(*i as f64));
        }
        if let Some(r) = self.reals.get(name) {
            return Some(Value::Number(*r));
        }
        if let Some(t) = self.times.get(name) {
            return Some(Value::Number(*t));
        }
        if let Some(d) = self.dates.get(name) {
            return Some(Value::Number(*d as f64));
        }
        if let Some(t) = self.tods.get(name) {
            return Some(Value::Number(*t));
        }
        if let Some(t) = self.dts.get(name) {
            return Some(Value::Number(*t));
        }
        self.strings.get(name).map(|s| Value::Str(s.clone()))
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    /// Materialize a timer if absent; existing instances are kept
    pub fn init_timer(&mut self, name: &str, preset_ms: f64, kind: TimerKind) {
        self.timers
            .entry(name.to_string())
            .or_insert_with(|| TimerState::new(kind, preset_ms));
    }

    pub fn get_timer(&self, name: &str) -> Option<&TimerState> {
        self.timers.get(name)
    }

    pub fn set_timer_pt(&mut self, name: &str, preset_ms: f64) {
        if let Some(timer) = self.timers.get_mut(name) {
            timer.set_preset(preset_ms);
        }
    }

    pub fn set_timer_input(&mut self, name: &str, input: bool) {
        if let Some(timer) = self.timers.get_mut(name) {
            timer.set_input(input);
        }
    }

    /// Advance one timer's elapsed time
    pub fn update_timer(&mut self, name: &str, delta_ms: f64) {
        if let Some(timer) = self.timers.get_mut(name) {
            timer.tick(delta_ms);
        }
    }

    /// Advance every timer by one scan's worth of time
    pub fn tick_all_timers(&mut self, delta_ms: f64) {
        for timer in self.timers.values_mut() {
            timer.tick(delta_ms);
        }
    }

    // ------------------------------------------------------------------
    // Counters
    // ------------------------------------------------------------------

    pub fn init_counter(&mut self, name: &str, preset: i64, kind: CounterKind) {
        self.counters
            .entry(name.to_string())
            .or_insert_with(|| CounterState::new(kind, preset));
    }

    pub fn get_counter(&self, name: &str) -> Option<&CounterState> {
        self.counters.get(name)
    }

    pub fn counter_mut(&mut self, name: &str) -> Option<&mut CounterState> {
        self.counters.get_mut(name)
    }

    pub fn pulse_count_up(&mut self, name: &str) {
        if let Some(counter) = self.counters.get_mut(name) {
            counter.pulse_up();
        }
    }

    pub fn pulse_count_down(&mut self, name: &str) {
        if let Some(counter) = self.counters.get_mut(name) {
            counter.pulse_down();
        }
    }

    pub fn reset_counter(&mut self, name: &str) {
        if let Some(counter) = self.counters.get_mut(name) {
            counter.clear();
        }
    }

    // ------------------------------------------------------------------
    // Edge detectors and bistables
    // ------------------------------------------------------------------

    pub fn init_edge_detector(&mut self, name: &str, kind: EdgeKind) {
        self.edges
            .entry(name.to_string())
            .or_insert_with(|| EdgeState::new(kind));
    }

    pub fn get_edge_detector(&self, name: &str) -> Option<&EdgeState> {
        self.edges.get(name)
    }

    pub fn update_r_trig(&mut self, name: &str, clk: bool) {
        if let Some(edge) = self.edges.get_mut(name) {
            edge.update(clk);
        }
    }

    pub fn update_f_trig(&mut self, name: &str, clk: bool) {
        if let Some(edge) = self.edges.get_mut(name) {
            edge.update(clk);
        }
    }

    pub fn init_bistable(&mut self, name: &str, kind: BistableKind) {
        self.bistables
            .entry(name.to_string())
            .or_insert_with(|| BistableState::new(kind));
    }

    pub fn get_bistable(&self, name: &str) -> Option<&BistableState> {
        self.bistables.get(name)
    }

    pub fn update_sr(&mut self, name: &str, set: bool, reset: bool) {
        if let Some(bistable) = self.bistables.get_mut(name) {
            bistable.update_sr(set, reset);
        }
    }

    pub fn update_rs(&mut self, name: &str, set: bool, reset: bool) {
        if let Some(bistable) = self.bistables.get_mut(name) {
            bistable.update_rs(set, reset);
        }
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Allocate an array; `values` shorter than the layout is padded
    /// with element defaults, longer is truncated
    pub fn init_array(&mut self, name: &str, meta: ArrayMeta, mut values: Vec<Value>) {
        let len = meta.len();
        values.resize(len, meta.elem.default_value());
        self.arrays
            .insert(name.to_string(), ArrayState { meta, values });
    }

    pub fn get_array(&self, name: &str) -> Option<&ArrayState> {
        self.arrays.get(name)
    }

    /// Element read; out of bounds or unknown array yields `None`
    /// (callers substitute the element default)
    pub fn get_array_element(&self, name: &str, flat_index: usize) -> Option<Value> {
        self.arrays
            .get(name)
            .and_then(|array| array.values.get(flat_index).cloned())
    }

    /// Element write; silently ignores out-of-bounds and unknown arrays
    pub fn set_array_element(&mut self, name: &str, flat_index: usize, value: Value) {
        if let Some(array) = self.arrays.get_mut(name) {
            let coerced = array.meta.elem.coerce(&value);
            if let Some(slot) = array.values.get_mut(flat_index) {
                *slot = coerced;
            }
        }
    }

    pub fn timer_names(&self) -> impl Iterator<Item = &String> {
        self.timers.keys()
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Stable, serializable view of the whole store
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            clock_ms: self.clock_ms,
            bools: self.bools.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            ints: self.ints.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            reals: self.reals.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            times: self
                .times
                .iter()
                .map(|(k, v)| (k.clone(), time::format_time(*v)))
                .collect(),
            dates: self
                .dates
                .iter()
                .map(|(k, v)| (k.clone(), time::format_date(*v)))
                .collect(),
            times_of_day: self
                .tods
                .iter()
                .map(|(k, v)| (k.clone(), time::format_time_of_day(*v)))
                .collect(),
            dates_and_times: self
                .dts
                .iter()
                .map(|(k, v)| (k.clone(), time::format_date_and_time(*v)))
                .collect(),
            strings: self
                .strings
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            timers: self
                .timers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            counters: self
                .counters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            edge_detectors: self
                .edges
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            bistables: self
                .bistables
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            arrays: self
                .arrays
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}
