//! Mass-Spring-Damper Model
//!
//! The free response of a mass m on a linear spring k with viscous damping
//! c is governed by
//!
//! ```text
//! m·x'' + c·x' + k·x = 0
//! ```
//!
//! As a first-order system in the state [x, v]:
//!
//! ```text
//! x' = v
//! v' = -(c/m)·v - (k/m)·x
//! ```
//!
//! The damping ratio ζ = c / (2·√(k·m)) determines the character of the
//! response: oscillatory decay for ζ < 1, the fastest non-oscillatory
//! return for ζ = 1, and slow creep for ζ > 1.

use crate::events::EventFunction;
use crate::solver::OdeSystem;

/// Index of the displacement component in the state vector
pub const POSITION: usize = 0;

/// Index of the velocity component in the state vector
pub const VELOCITY: usize = 1;

/// Character of the free response, by damping ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DampingRegime {
    /// ζ < 1: oscillatory decay
    Underdamped,
    /// ζ = 1: fastest return without oscillation
    CriticallyDamped,
    /// ζ > 1: non-oscillatory creep
    Overdamped,
}

impl std::fmt::Display for DampingRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DampingRegime::Underdamped => write!(f, "underdamped"),
            DampingRegime::CriticallyDamped => write!(f, "critically damped"),
            DampingRegime::Overdamped => write!(f, "overdamped"),
        }
    }
}

/// A damped mass-spring oscillator.
///
/// Parameters are validated on construction: mass and stiffness must be
/// positive and finite, damping non-negative and finite.
///
/// # Example
/// ```rust
/// use spring_damper::{DampingRegime, MassSpringDamper};
///
/// let system = MassSpringDamper::new(1.0, 0.2, 1.0).unwrap();
/// assert_eq!(system.regime(), DampingRegime::Underdamped);
/// assert!((system.damping_ratio() - 0.1).abs() < 1e-15);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassSpringDamper {
    mass: f64,
    damping: f64,
    stiffness: f64,
}

impl MassSpringDamper {
    /// Create an oscillator with mass m [kg], damping coefficient c
    /// [N·s/m], and spring constant k [N/m].
    pub fn new(mass: f64, damping: f64, stiffness: f64) -> Result<Self, ModelError> {
        if !mass.is_finite() || mass <= 0.0 {
            return Err(ModelError::InvalidMass { value: mass });
        }
        if !damping.is_finite() || damping < 0.0 {
            return Err(ModelError::InvalidDamping { value: damping });
        }
        if !stiffness.is_finite() || stiffness <= 0.0 {
            return Err(ModelError::InvalidStiffness { value: stiffness });
        }
        Ok(Self {
            mass,
            damping,
            stiffness,
        })
    }

    /// Mass m [kg]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Damping coefficient c [N·s/m]
    pub fn damping(&self) -> f64 {
        self.damping
    }

    /// Spring constant k [N/m]
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    /// Undamped natural frequency ωn = √(k/m) [rad/s]
    pub fn natural_frequency(&self) -> f64 {
        (self.stiffness / self.mass).sqrt()
    }

    /// Damping ratio ζ = c / (2·√(k·m))
    pub fn damping_ratio(&self) -> f64 {
        self.damping / (2.0 * (self.stiffness * self.mass).sqrt())
    }

    /// Damped natural frequency ωd = ωn·√(1 - ζ²) [rad/s].
    ///
    /// Defined only for an underdamped system; `None` otherwise.
    pub fn damped_frequency(&self) -> Option<f64> {
        let zeta = self.damping_ratio();
        if zeta < 1.0 {
            Some(self.natural_frequency() * (1.0 - zeta * zeta).sqrt())
        } else {
            None
        }
    }

    /// Classify the free response by damping ratio
    pub fn regime(&self) -> DampingRegime {
        let zeta = self.damping_ratio();
        if zeta < 1.0 {
            DampingRegime::Underdamped
        } else if zeta > 1.0 {
            DampingRegime::Overdamped
        } else {
            DampingRegime::CriticallyDamped
        }
    }

    /// Total mechanical energy E = ½·m·v² + ½·k·x² [J].
    ///
    /// Strictly decreasing along any trajectory with c > 0 and v ≠ 0;
    /// conserved when c = 0.
    pub fn energy(&self, state: &[f64; 2]) -> f64 {
        let x = state[POSITION];
        let v = state[VELOCITY];
        0.5 * self.mass * v * v + 0.5 * self.stiffness * x * x
    }
}

impl OdeSystem<2> for MassSpringDamper {
    fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
        dydt[POSITION] = y[VELOCITY];
        dydt[VELOCITY] =
            -(self.damping / self.mass) * y[VELOCITY] - (self.stiffness / self.mass) * y[POSITION];
    }
}

/// Event function for equilibrium crossings: g(t, y) = x.
///
/// Zero whenever the mass passes through its rest position.
pub struct DisplacementZero;

impl EventFunction<2> for DisplacementZero {
    fn eval(&self, _t: f64, y: &[f64; 2]) -> f64 {
        y[POSITION]
    }
}

/// Errors from model construction
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Mass must be positive and finite
    InvalidMass {
        /// Offending value
        value: f64,
    },
    /// Damping must be non-negative and finite
    InvalidDamping {
        /// Offending value
        value: f64,
    },
    /// Stiffness must be positive and finite
    InvalidStiffness {
        /// Offending value
        value: f64,
    },
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::InvalidMass { value } => {
                write!(f, "mass must be positive and finite, got {}", value)
            }
            ModelError::InvalidDamping { value } => {
                write!(f, "damping must be non-negative and finite, got {}", value)
            }
            ModelError::InvalidStiffness { value } => {
                write!(f, "stiffness must be positive and finite, got {}", value)
            }
        }
    }
}

impl std::error::Error for ModelError {}
