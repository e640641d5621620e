//! Rung Runtime: scan-cycle virtual machine for Structured Text
//!
//! Interprets the AST produced by `rung-compiler` against a typed
//! simulation store, with IEC 61131-3 semantics throughout:
//!
//! - `store`: typed symbol tables, function-block instances, arrays,
//!   snapshots; the one shared resource, owned by the engine
//! - `registry`: name -> declared-type tags and the CONSTANT set
//! - `init`: seeds declared variables with initial values
//! - `eval`: total expression evaluation with IEC coercions and
//!   built-in functions
//! - `exec`: statement execution (assignment, IF/CASE/FOR/WHILE/REPEAT,
//!   EXIT/CONTINUE, FB calls)
//! - `blocks`: TON/TOF/TP, CTU/CTD/CTUD, R_TRIG/F_TRIG, SR/RS state
//!   machines
//! - `scan`: the scan-cycle engine itself
//!
//! Error model is the PLC's: set a flag and keep scanning. Division by
//! zero, unknown names, and out-of-bounds subscripts never abort a scan;
//! only inconsistent interpreter state does.
//!
//! Everything is single-threaded and synchronous. The engine is a plain
//! value: no globals, no locks, no suspension points. Drive it with
//! [`ScanEngine::run_scan`] from whatever loop the host provides.

pub mod blocks;
pub mod builtins;
pub mod config;
pub mod error;
pub mod eval;
pub mod exec;
pub mod init;
pub mod registry;
pub mod scan;
pub mod store;

pub use blocks::{
    BistableKind, BistableState, CounterKind, CounterState, EdgeKind, EdgeState, TimerKind,
    TimerState,
};
pub use config::{ConfigFile, EngineConfig, UserFunction};
pub use error::{RuntimeFault, ScanError};
pub use eval::{ExecCtx, eval, read_var, write_var};
pub use exec::{Flow, execute};
pub use init::initialize;
pub use registry::{ConstantRegistry, TypeRegistry, TypeTag};
pub use scan::{ScanEngine, ScanReport};
pub use store::{ArrayMeta, ArrayState, ElemType, SimStore, StoreSnapshot};
