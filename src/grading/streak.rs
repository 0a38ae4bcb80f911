//! Consecutive pass/fail counters across a shift

use super::WindowGrade;

/// Running counters threaded through one shift's windows
///
/// A pass resets the fail counter and vice versa. Empty windows leave both
/// counters alone.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StreakTracker {
    consecutive_passes: u32,
    consecutive_fails: u32,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a window outcome in; `None` marks an empty window
    pub fn record(&mut self, passed: Option<bool>) {
        match passed {
            Some(true) => {
                self.consecutive_passes += 1;
                self.consecutive_fails = 0;
            }
            Some(false) => {
                self.consecutive_fails += 1;
                self.consecutive_passes = 0;
            }
            None => {}
        }
    }

    /// Record a freshly graded window and stamp it with the counters
    pub fn apply(&mut self, grade: &mut WindowGrade) {
        let outcome = if grade.is_empty() { None } else { Some(grade.passed()) };
        self.record(outcome);
        grade.consecutive_passes = self.consecutive_passes;
        grade.consecutive_fails = self.consecutive_fails;
    }

    pub fn consecutive_passes(&self) -> u32 {
        self.consecutive_passes
    }

    pub fn consecutive_fails(&self) -> u32 {
        self.consecutive_fails
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_reset_on_opposite_outcome() {
        let mut t = StreakTracker::new();
        t.record(Some(true));
        t.record(Some(true));
        assert_eq!((t.consecutive_passes(), t.consecutive_fails()), (2, 0));

        t.record(Some(false));
        assert_eq!((t.consecutive_passes(), t.consecutive_fails()), (0, 1));

        t.record(Some(true));
        assert_eq!((t.consecutive_passes(), t.consecutive_fails()), (1, 0));
    }

    #[test]
    fn test_empty_windows_ignored() {
        let mut t = StreakTracker::new();
        t.record(Some(false));
        t.record(None);
        t.record(None);
        t.record(Some(false));
        assert_eq!((t.consecutive_passes(), t.consecutive_fails()), (0, 2));
    }
}
