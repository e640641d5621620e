//! IEC counter function blocks: CTU, CTD, CTUD
//!
//! Counting happens on rising edges of CU/CD as seen across successive
//! calls. Reset dominates load, load dominates counting. CV never goes
//! negative; it may exceed PV.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CounterKind {
    Ctu,
    Ctd,
    Ctud,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CounterState {
    pub kind: CounterKind,
    /// CU pin as of the last call (edge memory)
    pub count_up: bool,
    /// CD pin as of the last call (edge memory)
    pub count_down: bool,
    pub reset: bool,
    pub load: bool,
    /// PV
    pub preset: i64,
    /// CV
    pub value: i64,
    /// QU = CV >= PV
    pub output_up: bool,
    /// QD = CV <= 0
    pub output_down: bool,
}

impl CounterState {
    pub fn new(kind: CounterKind, preset: i64) -> Self {
        let mut counter = CounterState {
            kind,
            count_up: false,
            count_down: false,
            reset: false,
            load: false,
            preset,
            value: 0,
            output_up: false,
            output_down: false,
        };
        counter.refresh_outputs();
        counter
    }

    pub fn set_preset(&mut self, preset: i64) {
        self.preset = preset;
        self.refresh_outputs();
    }

    /// Direct CV write (UI and `C.CV :=` assignments); saturates at zero
    pub fn set_value(&mut self, value: i64) {
        self.value = value.max(0);
        self.refresh_outputs();
    }

    /// One call of the block with the pins present in the source call.
    /// `None` means the pin was not wired and keeps its previous level.
    pub fn update(
        &mut self,
        cu: Option<bool>,
        cd: Option<bool>,
        reset: Option<bool>,
        load: Option<bool>,
    ) {
        let cu = cu.unwrap_or(self.count_up);
        let cd = cd.unwrap_or(self.count_down);
        self.reset = reset.unwrap_or(false);
        self.load = load.unwrap_or(false);

        let rising_up = cu && !self.count_up;
        let rising_down = cd && !self.count_down;
        self.count_up = cu;
        self.count_down = cd;

        // R dominates LD dominates counting
        if self.reset {
            self.value = 0;
        } else if self.load {
            self.value = self.preset;
        } else {
            if matches!(self.kind, CounterKind::Ctu | CounterKind::Ctud) && rising_up {
                self.value += 1;
            }
            if matches!(self.kind, CounterKind::Ctd | CounterKind::Ctud) && rising_down {
                self.value = (self.value - 1).max(0);
            }
        }
        self.refresh_outputs();
    }

    /// UI pulse: one up-count without edge bookkeeping
    pub fn pulse_up(&mut self) {
        self.value += 1;
        self.refresh_outputs();
    }

    /// UI pulse: one down-count, saturating at zero
    pub fn pulse_down(&mut self) {
        self.value = (self.value - 1).max(0);
        self.refresh_outputs();
    }

    pub fn clear(&mut self) {
        self.value = 0;
        self.refresh_outputs();
    }

    fn refresh_outputs(&mut self) {
        self.output_up = self.value >= self.preset;
        self.output_down = self.value <= 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctu_counts_rising_edges_only() {
        let mut c = CounterState::new(CounterKind::Ctu, 3);
        c.update(Some(true), None, Some(false), None);
        c.update(Some(true), None, Some(false), None); // still high: no edge
        assert_eq!(c.value, 1);
        c.update(Some(false), None, Some(false), None);
        c.update(Some(true), None, Some(false), None);
        assert_eq!(c.value, 2);
    }

    #[test]
    fn test_ctu_reaches_preset() {
        let mut c = CounterState::new(CounterKind::Ctu, 3);
        for _ in 0..3 {
            c.update(Some(true), None, Some(false), None);
            c.update(Some(false), None, Some(false), None);
        }
        assert_eq!(c.value, 3);
        assert!(c.output_up);
        // CV may exceed PV
        c.update(Some(true), None, Some(false), None);
        assert_eq!(c.value, 4);
        assert!(c.output_up);
    }

    #[test]
    fn test_ctu_reset_overrides_count() {
        let mut c = CounterState::new(CounterKind::Ctu, 3);
        c.update(Some(true), None, Some(false), None);
        c.update(Some(false), None, Some(false), None);
        // R together with a rising edge: reset wins
        c.update(Some(true), None, Some(true), None);
        assert_eq!(c.value, 0);
        assert!(!c.output_up);
    }

    #[test]
    fn test_ctd_saturates_at_zero() {
        let mut c = CounterState::new(CounterKind::Ctd, 2);
        c.update(None, None, None, Some(true));
        assert_eq!(c.value, 2);
        assert!(!c.output_down);
        for _ in 0..4 {
            c.update(None, Some(true), None, Some(false));
            c.update(None, Some(false), None, Some(false));
        }
        assert_eq!(c.value, 0);
        assert!(c.output_down);
    }

    #[test]
    fn test_ctud_reset_dominates_load() {
        let mut c = CounterState::new(CounterKind::Ctud, 5);
        c.update(None, None, Some(true), Some(true));
        assert_eq!(c.value, 0);
    }

    #[test]
    fn test_ctud_counts_both_directions() {
        let mut c = CounterState::new(CounterKind::Ctud, 5);
        c.update(Some(true), Some(false), Some(false), Some(false));
        c.update(Some(false), Some(false), Some(false), Some(false));
        c.update(Some(true), Some(false), Some(false), Some(false));
        assert_eq!(c.value, 2);
        c.update(Some(false), Some(true), Some(false), Some(false));
        assert_eq!(c.value, 1);
        assert!(!c.output_down);
        c.update(Some(false), Some(false), Some(false), Some(false));
        c.update(Some(false), Some(true), Some(false), Some(false));
        assert_eq!(c.value, 0);
        assert!(c.output_down);
    }

    #[test]
    fn test_pulses_and_clear() {
        let mut c = CounterState::new(CounterKind::Ctu, 2);
        c.pulse_up();
        c.pulse_up();
        assert!(c.output_up);
        c.pulse_down();
        assert_eq!(c.value, 1);
        c.clear();
        assert_eq!(c.value, 0);
        assert!(c.output_down);
    }
}
