//! controller.rs
//! Proportional tilt controller: position error → platform roll/pitch, saturated at the
//! platform's mechanical travel.
//!
//! Roll acts on the x error, pitch on the y error with inverted sign. The integrator accelerates
//! along +y for positive pitch, so on y the loop drives the ball away from the target; the rig
//! behaves this way and the sign is kept.
//!
//! NOTE: the gain path multiplies a metre-valued error by 180/π and then treats the product
//! as degrees. That conflates a unit conversion with the gain. The numbers are kept exactly as
//! the rig produces them; a corrected controller would fold 180/π into `kp` explicitly.

use crate::balancer::state::{SimulationState, Tilt, Vec2};

pub const RAD2DEG: f64 = 180.0 / std::f64::consts::PI;

pub struct TiltController {
    kp_roll: f64,
    kp_pitch: f64,
    max_angle_deg: f64,
}

impl TiltController {
    pub fn new(kp_roll: f64, kp_pitch: f64, max_angle_deg: f64) -> Self {
        Self {
            kp_roll,
            kp_pitch,
            max_angle_deg,
        }
    }

    #[inline]
    pub fn position_error(target: Vec2, position: Vec2) -> Vec2 {
        Vec2::new(target.x - position.x, target.y - position.y)
    }

    /// Saturated tilt for a given error. Pure.
    pub fn tilt_for_error(&self, error: Vec2) -> Tilt {
        let max = self.max_angle_deg;
        let pitch = -error.y * self.kp_pitch * RAD2DEG;
        let roll = error.x * self.kp_roll * RAD2DEG;
        Tilt::new(roll.clamp(-max, max), pitch.clamp(-max, max))
    }

    /// Computes the error against the current ball position, writes the clamped tilt into
    /// the state and returns the error used.
    pub fn update(&self, state: &mut SimulationState) -> Vec2 {
        let error = Self::position_error(state.target, state.ball.position);
        state.platform_tilt = self.tilt_for_error(error);
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balancer::params::{KP, MAX_ANGLE_DEG};

    fn controller() -> TiltController {
        TiltController::new(KP, KP, MAX_ANGLE_DEG)
    }

    #[test]
    fn zero_error_levels_platform() {
        let mut s = SimulationState::new();
        let err = controller().update(&mut s);
        assert_eq!(err, Vec2::ZERO);
        assert_eq!(s.platform_tilt.roll, 0.0);
        // -0.0 compares equal to 0.0
        assert_eq!(s.platform_tilt.pitch, 0.0);
    }

    #[test]
    fn small_error_is_linear_with_pitch_inverted() {
        let tilt = controller().tilt_for_error(Vec2::new(0.1, 0.1));
        let expected = 0.1 * KP * RAD2DEG; // ≈ 2.8648°
        assert!((tilt.roll - expected).abs() < 1e-12);
        assert!((tilt.pitch + expected).abs() < 1e-12);
    }

    #[test]
    fn large_error_saturates() {
        let c = controller();
        let tilt = c.tilt_for_error(Vec2::new(0.9, -0.9));
        assert_eq!(tilt.roll, MAX_ANGLE_DEG);
        assert_eq!(tilt.pitch, MAX_ANGLE_DEG);

        let tilt = c.tilt_for_error(Vec2::new(-3.0, 3.0));
        assert_eq!(tilt.roll, -MAX_ANGLE_DEG);
        assert_eq!(tilt.pitch, -MAX_ANGLE_DEG);
    }

    #[test]
    fn error_is_target_minus_position() {
        let mut s = SimulationState::new();
        s.target = Vec2::new(0.05, 0.0);
        s.ball.position = Vec2::new(0.01, 0.02);
        let err = controller().update(&mut s);
        assert!((err.x - 0.04).abs() < 1e-15);
        assert!((err.y + 0.02).abs() < 1e-15);
        assert!(s.platform_tilt.roll > 0.0);
        assert!(s.platform_tilt.pitch > 0.0);
    }
}
