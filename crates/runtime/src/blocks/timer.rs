//! IEC timer function blocks: TON, TOF, TP
//!
//! Each timer is a small state machine driven from two sides: the
//! statement executor feeds edges through [`TimerState::set_input`]
//! during a scan, and the scan engine advances elapsed time through
//! [`TimerState::tick`] at the end of the scan. Invariant throughout:
//! 0 <= ET <= PT.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimerKind {
    /// On-delay: Q raises once IN has been TRUE for PT
    Ton,
    /// Off-delay: Q follows IN up, holds for PT after IN falls
    Tof,
    /// Pulse: one non-retriggerable pulse of width PT per rising edge
    Tp,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerState {
    pub kind: TimerKind,
    /// IN pin as of the last call this scan
    pub input: bool,
    /// PT in milliseconds
    pub preset: f64,
    /// ET in milliseconds
    pub elapsed: f64,
    /// Q pin
    pub output: bool,
    pub running: bool,
}

impl TimerState {
    pub fn new(kind: TimerKind, preset_ms: f64) -> Self {
        TimerState {
            kind,
            input: false,
            preset: preset_ms.max(0.0),
            elapsed: 0.0,
            output: false,
            running: false,
        }
    }

    pub fn set_preset(&mut self, preset_ms: f64) {
        self.preset = preset_ms.max(0.0);
        self.elapsed = self.elapsed.min(self.preset);
    }

    /// Apply the IN pin, detecting edges against the previous call
    pub fn set_input(&mut self, input: bool) {
        let rising = input && !self.input;
        let falling = !input && self.input;
        self.input = input;

        match self.kind {
            TimerKind::Ton => {
                if rising {
                    if self.preset <= 0.0 {
                        self.elapsed = 0.0;
                        self.output = true;
                        self.running = false;
                    } else {
                        self.elapsed = 0.0;
                        self.output = false;
                        self.running = true;
                    }
                }
                if falling {
                    // Q clears at the next tick, not mid-scan
                    self.running = false;
                }
            }
            TimerKind::Tof => {
                if rising {
                    self.output = true;
                    self.running = false;
                    self.elapsed = 0.0;
                }
                if falling {
                    self.running = true;
                    self.elapsed = 0.0;
                }
            }
            TimerKind::Tp => {
                // Non-retriggerable: a rising edge during a pulse is
                // ignored; a pulse survives IN falling
                if rising && !self.running && self.preset > 0.0 {
                    self.elapsed = 0.0;
                    self.output = true;
                    self.running = true;
                }
            }
        }
    }

    /// Advance elapsed time by one scan's worth of milliseconds
    pub fn tick(&mut self, delta_ms: f64) {
        match self.kind {
            TimerKind::Ton => {
                if !self.input {
                    self.output = false;
                    self.elapsed = 0.0;
                    self.running = false;
                    return;
                }
                if self.running {
                    self.elapsed = (self.elapsed + delta_ms).min(self.preset);
                    if self.elapsed >= self.preset {
                        self.output = true;
                        self.running = false;
                    }
                }
            }
            TimerKind::Tof => {
                if self.running && !self.input {
                    self.elapsed = (self.elapsed + delta_ms).min(self.preset);
                    if self.elapsed >= self.preset {
                        self.output = false;
                        self.running = false;
                    }
                }
            }
            TimerKind::Tp => {
                if self.running {
                    self.elapsed = (self.elapsed + delta_ms).min(self.preset);
                    if self.elapsed >= self.preset {
                        // ET stays latched at PT until the next pulse
                        self.output = false;
                        self.running = false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(timer: &mut TimerState, input: bool, delta: f64) {
        timer.set_input(input);
        timer.tick(delta);
    }

    #[test]
    fn test_ton_reaches_preset() {
        let mut t = TimerState::new(TimerKind::Ton, 500.0);
        for i in 1..=4 {
            scan(&mut t, true, 100.0);
            assert!(!t.output, "Q must be FALSE after scan {}", i);
            assert_eq!(t.elapsed, i as f64 * 100.0);
        }
        scan(&mut t, true, 100.0);
        assert!(t.output);
        assert_eq!(t.elapsed, 500.0);
        // Holds at PT while IN stays TRUE
        scan(&mut t, true, 100.0);
        assert!(t.output);
        assert_eq!(t.elapsed, 500.0);
    }

    #[test]
    fn test_ton_et_bounded_and_monotonic() {
        let mut t = TimerState::new(TimerKind::Ton, 250.0);
        let mut previous = 0.0;
        for _ in 0..10 {
            scan(&mut t, true, 100.0);
            assert!(t.elapsed >= previous);
            assert!(t.elapsed >= 0.0 && t.elapsed <= t.preset);
            previous = t.elapsed;
        }
    }

    #[test]
    fn test_ton_falling_edge_resets() {
        let mut t = TimerState::new(TimerKind::Ton, 200.0);
        scan(&mut t, true, 100.0);
        scan(&mut t, true, 100.0);
        assert!(t.output);
        scan(&mut t, false, 100.0);
        assert!(!t.output);
        assert_eq!(t.elapsed, 0.0);
    }

    #[test]
    fn test_ton_zero_preset_fires_immediately() {
        let mut t = TimerState::new(TimerKind::Ton, 0.0);
        t.set_input(true);
        assert!(t.output);
        assert_eq!(t.elapsed, 0.0);
    }

    #[test]
    fn test_ton_q_clears_on_tick_not_mid_scan() {
        let mut t = TimerState::new(TimerKind::Ton, 100.0);
        scan(&mut t, true, 100.0);
        assert!(t.output);
        // Falling edge mid-scan: Q still TRUE until the tick
        t.set_input(false);
        assert!(t.output);
        t.tick(100.0);
        assert!(!t.output);
    }

    #[test]
    fn test_tof_holds_q_for_preset_after_fall() {
        let mut t = TimerState::new(TimerKind::Tof, 300.0);
        scan(&mut t, true, 100.0);
        assert!(t.output);
        scan(&mut t, false, 100.0);
        assert!(t.output);
        scan(&mut t, false, 100.0);
        assert!(t.output);
        scan(&mut t, false, 100.0);
        assert!(!t.output);
    }

    #[test]
    fn test_tof_retrigger_during_off_delay() {
        let mut t = TimerState::new(TimerKind::Tof, 300.0);
        scan(&mut t, true, 100.0);
        scan(&mut t, false, 100.0);
        assert!(t.output);
        // Rising edge during off-delay holds Q and resets ET
        scan(&mut t, true, 100.0);
        assert!(t.output);
        assert_eq!(t.elapsed, 0.0);
        scan(&mut t, false, 100.0);
        assert!(t.output);
    }

    #[test]
    fn test_tp_pulse_width() {
        let mut t = TimerState::new(TimerKind::Tp, 300.0);
        scan(&mut t, true, 100.0);
        assert!(t.output);
        scan(&mut t, true, 100.0);
        assert!(t.output);
        scan(&mut t, true, 100.0);
        assert!(!t.output);
        assert_eq!(t.elapsed, 300.0);
    }

    #[test]
    fn test_tp_survives_input_falling() {
        let mut t = TimerState::new(TimerKind::Tp, 300.0);
        scan(&mut t, true, 100.0);
        scan(&mut t, false, 100.0);
        assert!(t.output, "pulse must not cancel when IN falls");
    }

    #[test]
    fn test_tp_not_retriggerable() {
        let mut t = TimerState::new(TimerKind::Tp, 300.0);
        scan(&mut t, true, 100.0);
        scan(&mut t, false, 100.0);
        // Second rising edge during the pulse is ignored
        scan(&mut t, true, 100.0);
        assert_eq!(t.elapsed, 300.0);
        assert!(!t.output);
        // After the pulse ends a fresh edge starts a new one
        scan(&mut t, false, 100.0);
        scan(&mut t, true, 100.0);
        assert!(t.output);
        assert_eq!(t.elapsed, 100.0);
    }

    #[test]
    fn test_tp_zero_preset_never_raises_q() {
        let mut t = TimerState::new(TimerKind::Tp, 0.0);
        scan(&mut t, true, 100.0);
        assert!(!t.output);
        assert_eq!(t.elapsed, 0.0);
    }
}
