//! Seeded randomness for simulations.
//!
//! [`SimRandom`] remembers the seed it was created with, so a run can be
//! logged and reproduced. Degenerate ranges return their lower bound
//! instead of panicking.

use flatworld_types::Point;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A seeded pseudo-random generator that tracks its seed.
#[derive(Debug, Clone)]
pub struct SimRandom {
    rng: StdRng,
    seed: u64,
}

impl SimRandom {
    /// Create a generator from `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Create a generator with a seed drawn from the operating system.
    pub fn from_entropy() -> Self {
        Self::new(rand::rng().random())
    }

    /// The seed the generator was last (re)seeded with.
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Restart the sequence from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        *self = Self::new(seed);
    }

    /// Integer in `[min, max)`; `min` if the range is empty.
    pub fn integer(&mut self, min: i64, max: i64) -> i64 {
        if min >= max {
            return min;
        }
        self.rng.random_range(min..max)
    }

    /// Float in `[min, max)`; `min` if the range is empty or not finite.
    pub fn double(&mut self, min: f64, max: f64) -> f64 {
        let finite = min.is_finite() && max.is_finite() && (max - min).is_finite();
        if !finite || min >= max {
            return min;
        }
        self.rng.random_range(min..max)
    }

    /// `true` with probability `probability`.
    ///
    /// Values at or below 0 (and NaN) never succeed; values at or above 1
    /// always do.
    pub fn chance(&mut self, probability: f64) -> bool {
        self.rng.random::<f64>() < probability
    }

    /// Point in `[0, max_x) x [0, max_y)`.
    pub fn point(&mut self, max_x: f64, max_y: f64) -> Point {
        self.point_in(0.0, 0.0, max_x, max_y)
    }

    /// Point in `[min_x, max_x) x [min_y, max_y)`.
    pub fn point_in(&mut self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Point {
        let x = self.double(min_x, max_x);
        let y = self.double(min_y, max_y);
        Point::new(x, y)
    }

    /// Borrow the underlying generator.
    pub const fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = SimRandom::new(42);
        let mut b = SimRandom::new(42);
        for _ in 0..20 {
            assert_eq!(a.integer(0, 1000), b.integer(0, 1000));
            assert_eq!(a.double(-1.0, 1.0), b.double(-1.0, 1.0));
        }
    }

    #[test]
    fn reseed_restarts_sequence() {
        let mut rng = SimRandom::new(7);
        let first: Vec<i64> = (0..5).map(|_| rng.integer(0, 100)).collect();
        rng.reseed(7);
        let again: Vec<i64> = (0..5).map(|_| rng.integer(0, 100)).collect();
        assert_eq!(first, again);
        assert_eq!(rng.seed(), 7);
    }

    #[test]
    fn values_stay_in_range() {
        let mut rng = SimRandom::new(1);
        for _ in 0..200 {
            let i = rng.integer(-3, 3);
            assert!((-3..3).contains(&i));
            let p = rng.point_in(10.0, 20.0, 11.0, 21.0);
            assert!(p.x >= 10.0 && p.x < 11.0);
            assert!(p.y >= 20.0 && p.y < 21.0);
        }
    }

    #[test]
    fn degenerate_ranges_return_minimum() {
        let mut rng = SimRandom::new(1);
        assert_eq!(rng.integer(5, 5), 5);
        assert_eq!(rng.integer(9, 2), 9);
        assert_eq!(rng.double(1.5, 1.5), 1.5);
        assert_eq!(rng.double(0.0, f64::INFINITY), 0.0);
        assert_eq!(rng.point(0.0, 0.0), Point::ORIGIN);
    }

    #[test]
    fn chance_extremes() {
        let mut rng = SimRandom::new(3);
        for _ in 0..100 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
            assert!(!rng.chance(f64::NAN));
        }
    }
}
