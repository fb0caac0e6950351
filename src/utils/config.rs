//! Run configuration: rig constants plus runtime wiring.
//!
//! Defaults reproduce the reference rig exactly (20 Hz, ×0.1 time scale, see `balancer::params`).
//! `from_env` layers `BALANCER_*` overrides on top; `validate` rejects values the tick loop
//! cannot run with.

use std::{env, str::FromStr, time::Duration};

use thiserror::Error;

use crate::balancer::params::BalancerParams;

pub const FREQUENCY_HZ: f64 = 20.0;
pub const TIME_SCALE: f64 = 0.1;
pub const DEFAULT_DASHBOARD_PORT: u16 = 8080;
pub const INPUT_QUEUE_CAPACITY: usize = 64;
pub const TELEMETRY_QUEUE_CAPACITY: usize = 256;
/// Slowest tick accepted; keeps `Instant + period` far from overflow.
pub const MAX_PERIOD: Duration = Duration::from_secs(3600);

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name}: cannot parse {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("{name}: {reason}")]
    OutOfRange { name: &'static str, reason: &'static str },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub balancer: BalancerParams,
    pub frequency_hz: f64,
    /// Simulated seconds per wall-clock second.
    pub time_scale: f64,
    pub input_capacity: usize,
    pub telemetry_capacity: usize,
    /// `None` runs the dashboard-less headless mode.
    pub dashboard_port: Option<u16>,
    /// `None` runs until a quit command.
    pub duration: Option<Duration>,
    /// Echo every snapshot as a JSON line on stdout.
    pub echo_json: bool,
    /// Pin the scheduler thread to this core.
    pub scheduler_core: Option<usize>,
    /// Ask the OS for maximum priority on the scheduler thread.
    pub realtime_priority: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            balancer: BalancerParams::default(),
            frequency_hz: FREQUENCY_HZ,
            time_scale: TIME_SCALE,
            input_capacity: INPUT_QUEUE_CAPACITY,
            telemetry_capacity: TELEMETRY_QUEUE_CAPACITY,
            dashboard_port: Some(DEFAULT_DASHBOARD_PORT),
            duration: None,
            echo_json: false,
            scheduler_core: None,
            realtime_priority: false,
        }
    }
}

impl SimConfig {
    /// Wall-clock tick period. Never panics; an unrepresentable period (only possible on an
    /// unvalidated config) falls back to `MAX_PERIOD`.
    pub fn period(&self) -> Duration {
        tick_period(self.frequency_hz).unwrap_or(MAX_PERIOD)
    }

    /// Simulated seconds advanced per tick: `period * time_scale`.
    pub fn sim_dt(&self) -> f64 {
        (1.0 / self.frequency_hz) * self.time_scale
    }

    /// Defaults overridden by `BALANCER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(v) = env_var::<f64>("BALANCER_FREQUENCY")? {
            cfg.frequency_hz = v;
        }
        if let Some(v) = env_var::<f64>("BALANCER_TIME_SCALE")? {
            cfg.time_scale = v;
        }
        if let Some(v) = env_var::<u16>("BALANCER_DASHBOARD_PORT")? {
            // 0 disables the dashboard
            cfg.dashboard_port = (v != 0).then_some(v);
        }
        if let Some(v) = env_var::<u64>("BALANCER_DURATION_SECS")? {
            cfg.duration = (v != 0).then(|| Duration::from_secs(v));
        }
        if let Some(v) = env_var::<bool>("BALANCER_ECHO_JSON")? {
            cfg.echo_json = v;
        }
        if let Some(v) = env_var::<usize>("BALANCER_CORE")? {
            cfg.scheduler_core = Some(v);
        }
        if let Some(v) = env_var::<bool>("BALANCER_RT_PRIORITY")? {
            cfg.realtime_priority = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("frequency_hz", self.frequency_hz)?;
        if tick_period(self.frequency_hz).is_none() {
            return Err(ConfigError::OutOfRange {
                name: "frequency_hz",
                reason: "tick period must lie in (0, 1h]",
            });
        }
        positive("time_scale", self.time_scale)?;
        positive("max_angle_deg", self.balancer.max_angle_deg)?;
        positive("max_pos", self.balancer.max_pos)?;
        positive("joystick_limit", self.balancer.joystick_limit)?;
        if !(0.0..=1.0).contains(&self.balancer.damping) {
            return Err(ConfigError::OutOfRange {
                name: "damping",
                reason: "must lie in [0, 1]",
            });
        }
        if self.input_capacity == 0 || self.telemetry_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                name: "queue capacity",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }
}

fn tick_period(frequency_hz: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(1.0 / frequency_hz)
        .ok()
        .filter(|p| !p.is_zero() && *p <= MAX_PERIOD)
}

fn positive(name: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            reason: "must be a positive finite number",
        })
    }
}

fn env_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_rig() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.period(), Duration::from_millis(50));
        assert!((cfg.sim_dt() - 0.005).abs() < 1e-15);
        assert_eq!(cfg.balancer.max_angle_deg, 15.0);
        assert_eq!(cfg.balancer.max_pos, 0.5);
        assert_eq!(cfg.balancer.kp_roll, 0.5);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_frequency() {
        let cfg = SimConfig {
            frequency_hz: 0.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OutOfRange { name: "frequency_hz", .. })
        ));
    }

    #[test]
    fn rejects_frequency_with_unrepresentable_period() {
        for f in [1e-30, 1e-4, 1e12] {
            let cfg = SimConfig {
                frequency_hz: f,
                ..SimConfig::default()
            };
            assert!(
                matches!(
                    cfg.validate(),
                    Err(ConfigError::OutOfRange { name: "frequency_hz", .. })
                ),
                "frequency {} accepted",
                f
            );
            // still no panic on the unvalidated value
            assert!(cfg.period() <= MAX_PERIOD);
        }

        let slowest = SimConfig {
            frequency_hz: 1.0 / 1800.0,
            ..SimConfig::default()
        };
        assert!(slowest.validate().is_ok());
        assert!(slowest.period() <= MAX_PERIOD);
    }

    #[test]
    fn rejects_damping_above_one() {
        let mut cfg = SimConfig::default();
        cfg.balancer.damping = 1.2;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_errors_name_the_parameter() {
        let err = parse_value::<f64>("BALANCER_FREQUENCY", "fast").unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                name: "BALANCER_FREQUENCY",
                value: "fast".into()
            }
        );
        assert_eq!(parse_value::<bool>("BALANCER_ECHO_JSON", " true ").unwrap(), true);
    }
}
