//! simulation.rs
//! One rig: the state plus the three update stages, run in a fixed order per step.

use crate::balancer::{
    controller::TiltController,
    motion::MotionIntegrator,
    params::BalancerParams,
    reference::{InputEvent, reduce_reference},
    state::{SimulationState, Vec2},
    target::TargetAccumulator,
};

pub struct Simulation {
    state: SimulationState,
    params: BalancerParams,
    accumulator: TargetAccumulator,
    controller: TiltController,
    integrator: MotionIntegrator,
}

impl Simulation {
    pub fn new(params: BalancerParams) -> Self {
        Self::with_state(params, SimulationState::new())
    }

    pub fn with_state(params: BalancerParams, state: SimulationState) -> Self {
        Self {
            state,
            params,
            accumulator: TargetAccumulator::new(params.accum_rate),
            controller: TiltController::new(params.kp_roll, params.kp_pitch, params.max_angle_deg),
            integrator: MotionIntegrator::new(params.gravity, params.damping, params.max_pos),
        }
    }

    #[inline]
    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    /// Direct access for scripted scenarios (placing the ball, forcing a velocity).
    #[inline]
    pub fn state_mut(&mut self) -> &mut SimulationState {
        &mut self.state
    }

    #[inline]
    pub fn params(&self) -> &BalancerParams {
        &self.params
    }

    /// Folds one input event into the state. A reset press clears reference, target and ball
    /// in a single call, so no reader can observe a half-reset rig.
    pub fn apply_input(&mut self, event: InputEvent) {
        if event.is_reset() {
            self.state.reset();
            return;
        }
        self.state.reference = reduce_reference(
            self.state.reference,
            event,
            self.params.joystick_step,
            self.params.joystick_limit,
        );
    }

    /// Advances the clock by `dt`, then target → tilt → ball. Returns the position error the
    /// controller acted on.
    pub fn step(&mut self, dt: f64) -> Vec2 {
        self.state.sim_time += dt;

        self.accumulator
            .update(&mut self.state.target, self.state.reference, dt);

        let error = self.controller.update(&mut self.state);

        self.integrator
            .step(self.state.platform_tilt, &mut self.state.ball, dt);

        error
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(BalancerParams::default())
    }
}
