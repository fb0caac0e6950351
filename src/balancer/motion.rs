//! motion.rs
//! Inclined-plane ball dynamics, semi-implicit Euler.
//!
//! Velocity is updated first and the *updated* velocity advances position; explicit Euler
//! with the old velocity drifts unstable at the 5 ms simulated step.
//! Walls are inelastic: a ball reaching the rim stops on that axis.

use crate::balancer::state::{Ball, Tilt, Vec2};

pub struct MotionIntegrator {
    gravity: f64,
    damping: f64,
    max_pos: f64,
}

impl MotionIntegrator {
    pub fn new(gravity: f64, damping: f64, max_pos: f64) -> Self {
        Self {
            gravity,
            damping,
            max_pos,
        }
    }

    /// Small-angle acceleration: `g·sin(roll)`, `g·sin(pitch)`.
    #[inline]
    pub fn acceleration(&self, tilt: Tilt) -> Vec2 {
        let roll_rad = tilt.roll.to_radians();
        let pitch_rad = tilt.pitch.to_radians();
        Vec2::new(self.gravity * roll_rad.sin(), self.gravity * pitch_rad.sin())
    }

    /// Advances `ball` by `dt` simulated seconds under `tilt`.
    pub fn step(&self, tilt: Tilt, ball: &mut Ball, dt: f64) {
        let accel = self.acceleration(tilt);

        ball.velocity.x += accel.x * dt;
        ball.velocity.y += accel.y * dt;

        // rolling friction
        ball.velocity.x *= self.damping;
        ball.velocity.y *= self.damping;

        ball.position.x += ball.velocity.x * dt;
        ball.position.y += ball.velocity.y * dt;

        clamp_axis(&mut ball.position.x, &mut ball.velocity.x, self.max_pos);
        clamp_axis(&mut ball.position.y, &mut ball.velocity.y, self.max_pos);
    }
}

/// Pins `pos` to the rim and stops the axis once it touches ±`max`.
#[inline]
fn clamp_axis(pos: &mut f64, vel: &mut f64, max: f64) {
    if pos.abs() >= max {
        *pos = if *pos > 0.0 { max } else { -max };
        *vel = 0.0;
    }
}
