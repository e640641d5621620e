//! Standard function-block state machines
//!
//! Enum-tagged state records, one module per family. The store owns the
//! instances; the statement executor feeds pins during a scan; the scan
//! engine ticks the timers afterwards.

pub mod bistable;
pub mod counter;
pub mod edge;
pub mod timer;

pub use bistable::{BistableKind, BistableState};
pub use counter::{CounterKind, CounterState};
pub use edge::{EdgeKind, EdgeState};
pub use timer::{TimerKind, TimerState};
