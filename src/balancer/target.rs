//! target.rs
//! Velocity-style joystick: the held reference moves the set-point, it does not set it.

use crate::balancer::state::Vec2;

pub struct TargetAccumulator {
    rate: f64,
}

impl TargetAccumulator {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    /// `target += reference * rate * dt` on both axes.
    #[inline]
    pub fn update(&self, target: &mut Vec2, reference: Vec2, dt: f64) {
        target.x += reference.x * self.rate * dt;
        target.y += reference.y * self.rate * dt;
    }
}
