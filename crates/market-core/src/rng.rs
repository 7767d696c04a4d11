//! Seeded random stream for the simulation
//!
//! One stream is seeded per run and advanced; agents receive forks at spawn so
//! their draws do not depend on the order in which agents are ticked.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct SimRng {
    inner: StdRng,
}

impl SimRng {
    /// Create a stream from a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }

    /// Derive an independent stream, advancing this one by a single draw
    pub fn fork(&mut self) -> Self {
        Self::seeded(self.inner.gen())
    }

    /// Uniform draw in [0, 1)
    pub fn unit(&mut self) -> f64 {
        self.inner.gen::<f64>()
    }

    /// Uniform draw in [min, max]; bounds given in either order
    pub fn uniform(&mut self, min: f32, max: f32) -> f32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        if !(lo < hi) {
            return lo;
        }
        self.inner.gen_range(lo..=hi)
    }

    /// Random index into a collection of `len` items
    pub fn index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            None
        } else {
            Some(self.inner.gen_range(0..len))
        }
    }

    /// Random point inside the axis-aligned box spanned by `min` and `max`
    pub fn point_in(&mut self, min: Vec3, max: Vec3) -> Vec3 {
        Vec3::new(
            self.uniform(min.x, max.x),
            self.uniform(min.y, max.y),
            self.uniform(min.z, max.z),
        )
    }
}
