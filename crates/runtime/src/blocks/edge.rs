//! Edge detector function blocks: R_TRIG, F_TRIG
//!
//! Q is TRUE for exactly one scan after the matching edge; M remembers
//! the previous CLK level across scans.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EdgeKind {
    Rising,
    Falling,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeState {
    pub kind: EdgeKind,
    pub clk: bool,
    pub output: bool,
    /// Previous CLK level
    pub memory: bool,
}

impl EdgeState {
    pub fn new(kind: EdgeKind) -> Self {
        EdgeState {
            kind,
            clk: false,
            output: false,
            memory: false,
        }
    }

    pub fn update(&mut self, clk: bool) {
        self.clk = clk;
        self.output = match self.kind {
            EdgeKind::Rising => clk && !self.memory,
            EdgeKind::Falling => !clk && self.memory,
        };
        self.memory = clk;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r_trig_single_scan_pulse() {
        let mut e = EdgeState::new(EdgeKind::Rising);
        e.update(true);
        assert!(e.output);
        e.update(true);
        assert!(!e.output, "Q must last exactly one scan");
        e.update(false);
        assert!(!e.output);
        e.update(true);
        assert!(e.output);
    }

    #[test]
    fn test_f_trig_fires_on_fall() {
        let mut e = EdgeState::new(EdgeKind::Falling);
        e.update(true);
        assert!(!e.output);
        e.update(false);
        assert!(e.output);
        e.update(false);
        assert!(!e.output);
    }
}
