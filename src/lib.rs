//! # Ball balancer simulator
//!
//! A ball on a two-axis tilting platform, kept centred by a proportional controller and
//! steered with a joystick-style reference input. The loop runs at a fixed wall-clock rate
//! and publishes one telemetry snapshot per tick.
//!
//! - `balancer`: pure rig model (target accumulator, tilt controller, motion integrator)
//! - `runtime`: clock, drift-corrected scheduler, input channel, telemetry sinks
//! - `utils`: configuration, timing metrics, CSV export
//! - `advanced`: HTTP dashboard, real-time hardening, async runner

pub mod balancer;
pub mod runtime;
pub mod utils;
pub mod advanced;
