//! reference.rs
//! Discrete directional events and the pure reducer that folds them into the reference value.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::balancer::state::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    /// Space bar on the rig's keyboard.
    Reset,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Reset => "space",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    Press(Direction),
    Release(Direction),
}

impl InputEvent {
    pub fn is_reset(&self) -> bool {
        matches!(self, InputEvent::Press(Direction::Reset))
    }
}

impl fmt::Display for InputEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputEvent::Press(d) => write!(f, "press:{}", d.name()),
            InputEvent::Release(d) => write!(f, "release:{}", d.name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputParseError {
    #[error("empty input line")]
    Empty,
    #[error("unknown direction {0:?}")]
    UnknownDirection(String),
    #[error("unknown action {0:?}")]
    UnknownAction(String),
}

impl FromStr for Direction {
    type Err = InputParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "w" => Ok(Direction::Up),
            "down" | "s" => Ok(Direction::Down),
            "left" | "a" => Ok(Direction::Left),
            "right" | "d" => Ok(Direction::Right),
            "space" | "reset" => Ok(Direction::Reset),
            other => Err(InputParseError::UnknownDirection(other.to_string())),
        }
    }
}

/// Text form used by the console and the dashboard:
/// `up` / `+up` / `press up` press, `-up` / `release up` release.
impl FromStr for InputEvent {
    type Err = InputParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();
        if line.is_empty() {
            return Err(InputParseError::Empty);
        }

        if let Some(rest) = line.strip_prefix('+') {
            return Ok(InputEvent::Press(rest.parse()?));
        }
        if let Some(rest) = line.strip_prefix('-') {
            return Ok(InputEvent::Release(rest.parse()?));
        }

        match line.split_once(char::is_whitespace) {
            Some((action, dir)) => match action.to_ascii_lowercase().as_str() {
                "press" => Ok(InputEvent::Press(dir.parse()?)),
                "release" => Ok(InputEvent::Release(dir.parse()?)),
                other => Err(InputParseError::UnknownAction(other.to_string())),
            },
            None => Ok(InputEvent::Press(line.parse()?)),
        }
    }
}

/// `(reference, event) → reference`. A reset press zeroes the reference; the other fields a
/// reset clears are handled by the owner of the full state.
pub fn reduce_reference(reference: Vec2, event: InputEvent, step: f64, limit: f64) -> Vec2 {
    let mut r = reference;
    match event {
        InputEvent::Press(Direction::Up) => r.y = (r.y + step).clamp(-limit, limit),
        InputEvent::Press(Direction::Down) => r.y = (r.y - step).clamp(-limit, limit),
        InputEvent::Press(Direction::Left) => r.x = (r.x - step).clamp(-limit, limit),
        InputEvent::Press(Direction::Right) => r.x = (r.x + step).clamp(-limit, limit),
        InputEvent::Press(Direction::Reset) => r = Vec2::ZERO,
        InputEvent::Release(Direction::Up | Direction::Down) => r.y = 0.0,
        InputEvent::Release(Direction::Left | Direction::Right) => r.x = 0.0,
        InputEvent::Release(Direction::Reset) => {}
    }
    r
}
