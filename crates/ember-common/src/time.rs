// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Emberline Systems.

//! Time utilities.
//!
//! The bootloader is driven by a single monotonic microsecond counter
//! supplied by the host clock; everything here is derived from it.

use core::ops::{Add, Sub};

/// Monotonic microseconds since bootloader start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Micros(u64);

impl Micros {
    /// Zero timestamp.
    pub const ZERO: Self = Self(0);

    /// Create from raw microseconds.
    #[must_use]
    pub const fn new(us: u64) -> Self {
        Self(us)
    }

    /// Create from milliseconds.
    #[must_use]
    pub const fn from_millis(ms: u32) -> Self {
        Self((ms as u64).saturating_mul(1000))
    }

    /// Create from whole seconds.
    #[must_use]
    pub const fn from_secs(secs: u32) -> Self {
        Self((secs as u64).saturating_mul(1_000_000))
    }

    /// Raw microseconds.
    #[must_use]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Whole seconds, truncated.
    #[must_use]
    pub const fn as_secs(&self) -> u32 {
        (self.0 / 1_000_000) as u32
    }

    /// Microseconds elapsed from `earlier` to `self`, zero if the clock
    /// appears to have gone backwards.
    #[must_use]
    pub const fn since(&self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl From<u64> for Micros {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Micros> for u64 {
    fn from(value: Micros) -> Self {
        value.0
    }
}

impl Add<u64> for Micros {
    type Output = Self;

    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl Sub<Micros> for Micros {
    type Output = u64;

    fn sub(self, rhs: Micros) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

/// Duration in milliseconds, used for configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Millis(u32);

impl Millis {
    /// Zero duration.
    pub const ZERO: Self = Self(0);

    /// Create from milliseconds.
    #[must_use]
    pub const fn new(ms: u32) -> Self {
        Self(ms)
    }

    /// Create from seconds.
    #[must_use]
    pub const fn from_secs(secs: u32) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Raw milliseconds.
    #[must_use]
    pub const fn as_millis(&self) -> u32 {
        self.0
    }

    /// Equivalent duration in microseconds.
    #[must_use]
    pub const fn as_micros(&self) -> u64 {
        (self.0 as u64) * 1000
    }
}

/// Deadline tracker: a start timestamp plus a window.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    armed_at: Micros,
    window_us: u64,
}

impl Deadline {
    /// Arm a deadline `window` after `now`.
    #[must_use]
    pub const fn after(now: Micros, window: Millis) -> Self {
        Self {
            armed_at: now,
            window_us: window.as_micros(),
        }
    }

    /// Check whether the deadline has expired.
    #[must_use]
    pub const fn is_expired(&self, now: Micros) -> bool {
        now.since(self.armed_at) >= self.window_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micros_arithmetic() {
        let t0 = Micros::new(1_000_000);
        let t1 = t0 + 500;
        assert_eq!(t1.as_micros(), 1_000_500);
        assert_eq!(t1.since(t0), 500);
        assert_eq!(t0.since(t1), 0); // never negative
        assert_eq!(t1.as_secs(), 1);
    }

    #[test]
    fn millis_conversion() {
        assert_eq!(Millis::from_secs(2).as_millis(), 2000);
        assert_eq!(Millis::new(1).as_micros(), 1000);
    }

    #[test]
    fn deadline_expiry() {
        let armed = Deadline::after(Micros::new(100), Millis::new(1));
        assert!(!armed.is_expired(Micros::new(100)));
        assert!(!armed.is_expired(Micros::new(1099)));
        assert!(armed.is_expired(Micros::new(1100)));
        assert!(armed.is_expired(Micros::new(5000)));
    }

    #[test]
    fn zero_window_expires_immediately() {
        let armed = Deadline::after(Micros::new(42), Millis::ZERO);
        assert!(armed.is_expired(Micros::new(42)));
    }
}
