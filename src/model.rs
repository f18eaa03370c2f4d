use crate::utils::{FINITE, NON_NEGATIVE, check_num};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Mobile agent of the simulation.
///
/// Holds the constant speed and the initial state of the walk.
/// The generator records the subsequent states instead of mutating them here.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Agent {
    speed: f64,
    position: [f64; 2],
    heading: f64,
}

impl Agent {
    /// Create an agent. A zero speed is allowed and yields a stationary agent.
    ///
    /// # Errors
    /// Returns an error if the speed is negative or any value is not finite.
    pub fn new(speed: f64, position: [f64; 2], heading: f64) -> Result<Self> {
        check_num(speed, NON_NEGATIVE).context("invalid speed")?;
        check_num(position[0], FINITE).context("invalid initial x coordinate")?;
        check_num(position[1], FINITE).context("invalid initial y coordinate")?;
        check_num(heading, FINITE).context("invalid initial heading")?;
        Ok(Self {
            speed,
            position,
            heading,
        })
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn position(&self) -> [f64; 2] {
        self.position
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }
}

/// Position and heading at a single step.
#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub y: f64,
    /// Heading in radians, not wrapped.
    pub heading: f64,
}

impl Sample {
    pub fn new(position: [f64; 2], heading: f64) -> Self {
        Self {
            x: position[0],
            y: position[1],
            heading,
        }
    }

    pub fn position(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stationary_agent_is_valid() {
        let agt = Agent::new(0.0, [0.1, -0.2], 1.0).unwrap();
        assert_eq!(agt.speed(), 0.0);
        assert_eq!(agt.position(), [0.1, -0.2]);
        assert_eq!(agt.heading(), 1.0);
    }

    #[test]
    fn invalid_agent() {
        assert!(Agent::new(-0.1, [0.0, 0.0], 0.0).is_err());
        assert!(Agent::new(f64::NAN, [0.0, 0.0], 0.0).is_err());
        assert!(Agent::new(0.4, [f64::INFINITY, 0.0], 0.0).is_err());
        assert!(Agent::new(0.4, [0.0, 0.0], f64::NAN).is_err());
    }
}
