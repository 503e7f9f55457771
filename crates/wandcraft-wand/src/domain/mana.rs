//! Mana economy: a clamped, regenerating resource pool.

use serde::{Deserialize, Serialize};

use super::error::WandError;

/// Current and maximum mana plus the per-tick regeneration rate.
///
/// `0 <= current <= maximum` holds after every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManaPool {
    current: f32,
    maximum: u32,
    regeneration: u32,
}

impl ManaPool {
    /// A full pool.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(maximum: u32, regeneration: u32) -> Self {
        Self {
            current: maximum as f32,
            maximum,
            regeneration,
        }
    }

    /// A pool with an explicit balance, clamped into range.
    #[must_use]
    pub fn with_current(current: f32, maximum: u32, regeneration: u32) -> Self {
        let mut pool = Self::new(maximum, regeneration);
        pool.set_current(current);
        pool
    }

    #[must_use]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[must_use]
    pub fn maximum(&self) -> u32 {
        self.maximum
    }

    #[must_use]
    pub fn regeneration(&self) -> u32 {
        self.regeneration
    }

    /// Whether the pool is at capacity.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn is_full(&self) -> bool {
        self.current >= self.maximum as f32
    }

    /// Adds `regeneration × elapsed_ticks`, capped at the maximum. Returns the
    /// amount actually gained.
    #[allow(clippy::cast_precision_loss)]
    pub fn regenerate(&mut self, elapsed_ticks: u32) -> f32 {
        let before = self.current;
        let gain = self.regeneration as f32 * elapsed_ticks as f32;
        self.set_current(before + gain);
        self.current - before
    }

    /// Deducts `amount`. An `exempt` pool (cost- or consume-free) accepts the
    /// charge without deducting. Returns the amount deducted.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InsufficientResource` if the balance is too low;
    /// the pool is untouched in that case.
    pub fn charge(&mut self, amount: f32, exempt: bool) -> Result<f32, WandError> {
        let amount = sanitize(amount);
        if exempt || amount <= 0.0 {
            return Ok(0.0);
        }
        if amount > self.current {
            return Err(WandError::InsufficientResource {
                required: amount,
                available: self.current,
            });
        }
        self.set_current(self.current - amount);
        Ok(amount)
    }

    /// Removes up to `amount`, stopping at zero. Returns the amount removed.
    pub fn drain(&mut self, amount: f32) -> f32 {
        let before = self.current;
        self.set_current(before - sanitize(amount));
        before - self.current
    }

    /// Sets the balance, clamped into `[0, maximum]`.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_current(&mut self, value: f32) {
        let value = if value.is_nan() { 0.0 } else { value };
        self.current = value.clamp(0.0, self.maximum as f32);
    }

    /// Changes the maximum; a balance above it is clamped down immediately.
    pub fn set_maximum(&mut self, maximum: u32) {
        self.maximum = maximum;
        self.set_current(self.current);
    }

    pub fn set_regeneration(&mut self, regeneration: u32) {
        self.regeneration = regeneration;
    }

    /// Tops the pool up to its maximum.
    #[allow(clippy::cast_precision_loss)]
    pub fn fill(&mut self) {
        self.current = self.maximum as f32;
    }
}

fn sanitize(amount: f32) -> f32 {
    if amount.is_finite() { amount.max(0.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_charge_then_regenerate_scenario() {
        let mut pool = ManaPool::new(100, 5);

        pool.charge(30.0, false).unwrap();
        for _ in 0..4 {
            pool.regenerate(1);
        }

        assert!((pool.current() - 90.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_regeneration_never_exceeds_maximum() {
        let mut pool = ManaPool::with_current(95.0, 100, 5);

        let gained = pool.regenerate(10);

        assert!((gained - 5.0).abs() < f32::EPSILON);
        assert!(pool.is_full());
    }

    #[test]
    fn test_zero_elapsed_regeneration_is_idempotent() {
        let mut pool = ManaPool::with_current(40.0, 100, 5);

        for _ in 0..5 {
            assert!(pool.regenerate(0).abs() < f32::EPSILON);
        }

        assert!((pool.current() - 40.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_insufficient_charge_leaves_pool_untouched() {
        let mut pool = ManaPool::with_current(10.0, 100, 5);

        let result = pool.charge(11.0, false);

        match result {
            Err(WandError::InsufficientResource {
                required,
                available,
            }) => {
                assert!((required - 11.0).abs() < f32::EPSILON);
                assert!((available - 10.0).abs() < f32::EPSILON);
            }
            other => panic!("expected InsufficientResource, got {other:?}"),
        }
        assert!((pool.current() - 10.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_exempt_charge_is_a_successful_no_op() {
        let mut pool = ManaPool::with_current(1.0, 100, 5);

        let charged = pool.charge(50.0, true).unwrap();

        assert!(charged.abs() < f32::EPSILON);
        assert!((pool.current() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_lowering_maximum_clamps_balance() {
        let mut pool = ManaPool::new(100, 5);

        pool.set_maximum(40);

        assert_eq!(pool.maximum(), 40);
        assert!((pool.current() - 40.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_drain_stops_at_zero() {
        let mut pool = ManaPool::with_current(5.0, 100, 0);

        let removed = pool.drain(20.0);

        assert!((removed - 5.0).abs() < f32::EPSILON);
        assert!(pool.current().abs() < f32::EPSILON);
    }

    #[test]
    fn test_balance_stays_in_range_over_mixed_operations() {
        let mut pool = ManaPool::new(100, 7);
        let charges = [13.0, 250.0, 0.5, -4.0, 99.0, f32::NAN, 42.0];

        for (i, amount) in charges.iter().enumerate() {
            let _ = pool.charge(*amount, false);
            pool.regenerate(u32::try_from(i).unwrap());
            assert!(pool.current() >= 0.0);
            assert!(pool.current() <= 100.0);
        }
    }
}
