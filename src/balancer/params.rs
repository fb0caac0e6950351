//! params.rs
//! Physical and control constants for the tilting platform.
//!
//! The values below reproduce the reference rig: 15° platform travel, a 1 m × 1 m
//! plate (±0.5 m), rolling friction of 1 % per tick and a proportional tilt gain of 0.5.

pub const GRAVITY: f64 = 9.81; // m/s^2
pub const MAX_ANGLE_DEG: f64 = 15.0;
pub const MAX_POS_M: f64 = 0.5;
pub const DAMPING: f64 = 0.99;
pub const ACCUM_RATE: f64 = 0.05;
pub const JOYSTICK_STEP: f64 = 0.1;
pub const JOYSTICK_LIMIT: f64 = 1.0;
pub const KP: f64 = 0.5;

/// Initial platform pose at process start (degrees).
pub const INITIAL_ROLL_DEG: f64 = 5.0;
pub const INITIAL_PITCH_DEG: f64 = 3.0;

/// Tunables consumed by the target accumulator, tilt controller and motion integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalancerParams {
    pub gravity: f64,
    pub max_angle_deg: f64,
    pub max_pos: f64,
    pub damping: f64,
    pub accum_rate: f64,
    pub joystick_step: f64,
    pub joystick_limit: f64,
    pub kp_roll: f64,
    pub kp_pitch: f64,
}

impl Default for BalancerParams {
    fn default() -> Self {
        Self {
            gravity: GRAVITY,
            max_angle_deg: MAX_ANGLE_DEG,
            max_pos: MAX_POS_M,
            damping: DAMPING,
            accum_rate: ACCUM_RATE,
            joystick_step: JOYSTICK_STEP,
            joystick_limit: JOYSTICK_LIMIT,
            kp_roll: KP,
            kp_pitch: KP,
        }
    }
}
