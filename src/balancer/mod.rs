//Balancer core: rig state and the three per-tick stages
//(target accumulation → proportional tilt → inclined-plane motion).
//Everything here is pure and single-threaded; timing and I/O live in `runtime`.

pub mod params;
pub mod state;
pub mod reference;
pub mod target;
pub mod controller;
pub mod motion;
pub mod simulation;

pub use params::BalancerParams;
pub use reference::{Direction, InputEvent};
pub use simulation::Simulation;
pub use state::{Ball, SimulationState, Tilt, Vec2};
