//! Bistable function blocks: SR (set-dominant), RS (reset-dominant)

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BistableKind {
    /// SR: S1 wins over R
    SetDominant,
    /// RS: R1 wins over S
    ResetDominant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BistableState {
    pub kind: BistableKind,
    /// Q1 pin
    pub output: bool,
}

impl BistableState {
    pub fn new(kind: BistableKind) -> Self {
        BistableState {
            kind,
            output: false,
        }
    }

    /// SR semantics: `set` is S1, `reset` is R
    pub fn update_sr(&mut self, set: bool, reset: bool) {
        if set {
            self.output = true;
        } else if reset {
            self.output = false;
        }
    }

    /// RS semantics: `set` is S, `reset` is R1
    pub fn update_rs(&mut self, set: bool, reset: bool) {
        if reset {
            self.output = false;
        } else if set {
            self.output = true;
        }
    }
}
