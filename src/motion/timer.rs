/// Countdown timer driven by tick deltas.
///
/// A freshly reset tracker counts down from the given duration; once the
/// accumulated deltas reach it, [`TimeTracker::passed`] stays true until the
/// next reset. A zero reset is considered already passed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeTracker {
    expiry: i64,
}

impl TimeTracker {
    pub fn new(duration_ms: u32) -> Self {
        Self {
            expiry: i64::from(duration_ms),
        }
    }

    #[inline]
    pub fn update(&mut self, diff_ms: u32) {
        self.expiry -= i64::from(diff_ms);
    }

    #[inline]
    pub fn passed(&self) -> bool {
        self.expiry <= 0
    }

    #[inline]
    pub fn reset(&mut self, duration_ms: u32) {
        self.expiry = i64::from(duration_ms);
    }

    /// Milliseconds left, zero once passed
    pub fn remaining(&self) -> u32 {
        self.expiry.clamp(0, i64::from(u32::MAX)) as u32
    }
}
