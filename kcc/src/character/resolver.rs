//! Correction accumulator.
//!
//! Collects the separations reported by every penetrating collider of one sub-step
//! and combines them into a single displacement. Summing the corrections would
//! over-correct wherever they overlap (two floor triangles, a corner), so the
//! combined displacement is searched iteratively instead: each correction is a
//! half-space constraint `dot(x, n_i) >= d_i`, and the search projects onto the
//! violated constraints in turn until none is violated by more than the tolerance.

use crate::{collision::Vec3, utils};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correction {
    pub direction: Vec3,
    pub distance: f32,
}

impl Correction {
    #[inline]
    pub fn amount(&self) -> Vec3 {
        self.direction * self.distance
    }
}

/// Fixed-capacity correction accumulator, owned per actor.
#[derive(Clone, Debug)]
pub struct KccResolver {
    corrections: Vec<Correction>,
    capacity: usize,
}

impl KccResolver {
    pub fn new(capacity: usize) -> Self {
        Self {
            corrections: Vec::with_capacity(capacity),
            capacity,
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.corrections.clear();
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.corrections.len()
    }

    /// Add a correction candidate.
    ///
    /// Non-finite or non-positive corrections are ignored, and so is anything past capacity.
    pub fn add_correction(&mut self, direction: Vec3, distance: f32) {
        if !distance.is_finite() || distance <= 0.0 || !utils::is_finite(&direction) {
            return;
        }
        if self.corrections.len() >= self.capacity {
            log::warn!(
                "correction capacity {} reached, dropping correction",
                self.capacity
            );
            return;
        }
        self.corrections.push(Correction {
            direction,
            distance,
        });
    }

    /// Sum of the squared penetration left after displacing by `x`.
    fn residual(&self, x: Vec3) -> f32 {
        self.corrections
            .iter()
            .map(|c| (c.distance - x.dot(&c.direction)).max(0.0))
            .map(|e| e * e)
            .sum()
    }

    /// Combined displacement resolving the accumulated corrections.
    ///
    /// - No corrections: zero.
    /// - One correction: exactly that correction.
    /// - Parallel corrections: the deepest one, never more.
    ///
    /// Stops after `max_iterations` passes or once no constraint is violated by more
    /// than `tolerance`. For conflicting (opposing) corrections the best iterate found,
    /// or the mean correction when it leaves less penetration, is returned.
    pub fn calculate_best(&self, max_iterations: usize, tolerance: f32) -> Vec3 {
        match self.corrections.as_slice() {
            [] => return Vec3::zeros(),
            [single] => return single.amount(),
            _ => {}
        }

        let mut x = Vec3::zeros();
        let mut best = x;
        let mut best_residual = self.residual(x);
        let mut converged = false;

        for _ in 0..max_iterations.max(1) {
            let mut max_error = 0.0_f32;
            for c in &self.corrections {
                let error = c.distance - x.dot(&c.direction);
                if error > 0.0 {
                    x += c.direction * error;
                    max_error = max_error.max(error);
                }
            }

            let residual = self.residual(x);
            if residual < best_residual {
                best = x;
                best_residual = residual;
            }
            if max_error <= tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            let mean = self
                .corrections
                .iter()
                .fold(Vec3::zeros(), |acc, c| acc + c.amount())
                / self.corrections.len() as f32;
            if self.residual(mean) < best_residual {
                best = mean;
            }
        }

        best
    }
}
