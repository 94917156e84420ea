//! Time-varying force functions installed on motors.
//!
//! A physics backend may query a driver many times per control tick (once per
//! internal substep), so every driver is a pure function of elapsed time.

use std::sync::Arc;

/// Snap tolerance for window boundaries. Accumulated float time such as
/// `0.1 + 0.1 + 0.1` lands a hair below the exact boundary.
const WINDOW_EPSILON: f64 = 1e-9;

/// Per-joint force source.
#[derive(Debug, Clone, PartialEq)]
pub enum ActuationDriver {
    /// Cyclic hold-and-advance schedule from a decoded genome row.
    Hold(HoldSchedule),
    /// Constant value set externally for the current tick.
    Direct(f64),
}

impl ActuationDriver {
    /// Force to apply at `t` seconds from episode start.
    #[inline]
    pub fn force_at(&self, t: f64) -> f64 {
        match self {
            ActuationDriver::Hold(schedule) => schedule.force_at(t),
            ActuationDriver::Direct(value) => *value,
        }
    }
}

impl Default for ActuationDriver {
    fn default() -> Self {
        ActuationDriver::Direct(0.0)
    }
}

/// One motor's row of a force matrix, held constant over equal windows.
///
/// Time past the end of the row wraps around, so an episode that overruns its
/// nominal duration keeps replaying the schedule instead of failing.
#[derive(Debug, Clone, PartialEq)]
pub struct HoldSchedule {
    row: Arc<[f64]>,
    window: f64,
}

impl HoldSchedule {
    /// Create a schedule holding each value of `row` for `window` seconds.
    ///
    /// Returns `None` for an empty row or a non-positive window.
    pub fn new(row: impl Into<Arc<[f64]>>, window: f64) -> Option<Self> {
        let row = row.into();
        if row.is_empty() || !(window.is_finite() && window > 0.0) {
            return None;
        }
        Some(Self { row, window })
    }

    /// Schedule whose windows evenly cover `duration`.
    pub fn spanning(row: impl Into<Arc<[f64]>>, duration: f64) -> Option<Self> {
        let row = row.into();
        let len = row.len();
        if len == 0 {
            return None;
        }
        Self::new(row, duration / len as f64)
    }

    #[inline]
    pub fn window(&self) -> f64 {
        self.window
    }

    #[inline]
    pub fn intervals(&self) -> usize {
        self.row.len()
    }

    pub fn row(&self) -> &[f64] {
        &self.row
    }

    /// Window index covering `t`, wrapped into `0..intervals`.
    #[inline]
    pub fn interval_at(&self, t: f64) -> usize {
        let n = self.row.len() as i64;
        let k = (t / self.window + WINDOW_EPSILON).floor();
        if !k.is_finite() {
            return 0;
        }
        (k as i64).rem_euclid(n) as usize
    }

    #[inline]
    pub fn force_at(&self, t: f64) -> f64 {
        self.row[self.interval_at(t)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_direct_is_constant() {
        let driver = ActuationDriver::Direct(3.5);
        assert_eq!(driver.force_at(0.0), 3.5);
        assert_eq!(driver.force_at(123.4), 3.5);
    }

    #[test]
    fn test_hold_selects_window() {
        let schedule = HoldSchedule::new(vec![1.0, 2.0, 3.0], 0.5).unwrap();
        assert_eq!(schedule.force_at(0.0), 1.0);
        assert_eq!(schedule.force_at(0.49), 1.0);
        assert_eq!(schedule.force_at(0.5), 2.0);
        assert_eq!(schedule.force_at(1.2), 3.0);
    }

    #[test]
    fn test_hold_wraps_past_duration() {
        let schedule = HoldSchedule::new(vec![1.0, 2.0, 3.0], 0.5).unwrap();
        assert_eq!(schedule.force_at(1.5), 1.0);
        assert_eq!(schedule.force_at(2.1), 2.0);
        assert_eq!(schedule.force_at(-0.1), 3.0);
    }

    #[test]
    fn test_accumulated_time_hits_boundary() {
        let schedule = HoldSchedule::new(vec![0.0, 1.0, 2.0, 3.0], 0.1).unwrap();
        let mut t = 0.0;
        for expected in [0.0, 1.0, 2.0, 3.0, 0.0] {
            assert_eq!(schedule.force_at(t), expected, "t = {t}");
            t += 0.1;
        }
    }

    #[test]
    fn test_spanning_window() {
        let schedule = HoldSchedule::spanning(vec![0.0; 500], 5.0).unwrap();
        assert!((schedule.window() - 0.01).abs() < 1e-12);
        assert_eq!(schedule.intervals(), 500);
    }

    #[test]
    fn test_invalid_schedules_rejected() {
        assert!(HoldSchedule::new(Vec::<f64>::new(), 0.1).is_none());
        assert!(HoldSchedule::new(vec![1.0], 0.0).is_none());
        assert!(HoldSchedule::new(vec![1.0], f64::NAN).is_none());
    }

    #[test]
    fn test_repeated_queries_do_not_drift() {
        let driver = ActuationDriver::Hold(HoldSchedule::new(vec![4.0, 5.0], 0.01).unwrap());
        let first = driver.force_at(0.015);
        for _ in 0..1000 {
            assert_eq!(driver.force_at(0.015), first);
        }
    }

    proptest! {
        #[test]
        fn prop_schedule_is_periodic(
            row in prop::collection::vec(-1500.0f64..1500.0, 1..32),
            window in 0.005f64..1.0,
            index in 0usize..64,
            frac in 0.1f64..0.9,
            k in -20i64..20,
        ) {
            let schedule = HoldSchedule::new(row, window).unwrap();
            let period = schedule.intervals() as f64 * window;
            let t = (index as f64 + frac) * window;
            let shifted = t + k as f64 * period;
            prop_assert_eq!(schedule.force_at(t), schedule.force_at(shifted));
        }

        #[test]
        fn prop_window_shift_advances_index(
            row in prop::collection::vec(-1500.0f64..1500.0, 1..32),
            window in 0.005f64..1.0,
            index in 0usize..64,
            frac in 0.1f64..0.9,
            k in 0usize..64,
        ) {
            let schedule = HoldSchedule::new(row, window).unwrap();
            let n = schedule.intervals();
            let t = (index as f64 + frac) * window;
            let shifted = t + k as f64 * window;
            prop_assert_eq!(schedule.interval_at(t), index % n);
            prop_assert_eq!(schedule.interval_at(shifted), (index + k) % n);
        }
    }
}
