//! state.rs
//! Mutable record of the rig: platform pose, reference input, drifting target,
//! ball kinematics and the simulated clock.

use serde::{Deserialize, Serialize};

use crate::balancer::params::{INITIAL_PITCH_DEG, INITIAL_ROLL_DEG};

/// Planar quantity (position, velocity, error, reference) in the plate frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Platform inclination in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Tilt {
    pub roll: f64,
    pub pitch: f64,
}

impl Tilt {
    pub const fn new(roll: f64, pitch: f64) -> Self {
        Self { roll, pitch }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Ball {
    pub position: Vec2, // m
    pub velocity: Vec2, // m/s
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    /// Written only by the tilt controller.
    pub platform_tilt: Tilt,
    /// Held directional intent, each axis in [-1, 1].
    pub reference: Vec2,
    /// Set-point drifting with the held reference.
    pub target: Vec2,
    pub ball: Ball,
    /// Simulated seconds (scaled, not wall-clock).
    pub sim_time: f64,
}

impl SimulationState {
    pub fn new() -> Self {
        Self {
            platform_tilt: Tilt::new(INITIAL_ROLL_DEG, INITIAL_PITCH_DEG),
            reference: Vec2::ZERO,
            target: Vec2::ZERO,
            ball: Ball::default(),
            sim_time: 0.0,
        }
    }

    /// Zeroes reference, target and ball kinematics. Tilt and clock are kept.
    pub fn reset(&mut self) {
        self.reference = Vec2::ZERO;
        self.target = Vec2::ZERO;
        self.ball = Ball::default();
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new()
    }
}
