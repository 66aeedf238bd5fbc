use std::fmt;

use crate::floating_type_mod::FT;

/// Coarse classification of a `SimulationError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The parameters cannot work, independent of the particle data.
    Configuration,
    /// The particle data is inconsistent with the domain.
    Data,
    /// The smoothing length iteration failed for a single particle.
    Convergence,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    Configuration(String),
    GridCollapsed {
        min_neighborhood_count: FT,
        num_particles: usize,
    },
    ParticleOutsideDomain {
        particle_id: usize,
        position: Vec<FT>,
        boxlen: FT,
    },
    SmoothingLengthNotConverged {
        particle_id: usize,
        iterations: usize,
    },
    DegenerateDensity {
        particle_id: usize,
        density: FT,
    },
}

impl SimulationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimulationError::Configuration(_) | SimulationError::GridCollapsed { .. } => ErrorKind::Configuration,
            SimulationError::ParticleOutsideDomain { .. } => ErrorKind::Data,
            SimulationError::SmoothingLengthNotConverged { .. } | SimulationError::DegenerateDensity { .. } => {
                ErrorKind::Convergence
            }
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        SimulationError::Configuration(msg.into())
    }
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::Configuration(msg) => write!(f, "invalid configuration: {}", msg),
            SimulationError::GridCollapsed {
                min_neighborhood_count,
                num_particles,
            } => write!(
                f,
                "grid building reached nx = 0: {} particles cannot provide {:.3} particles per cell neighborhood",
                num_particles, min_neighborhood_count
            ),
            SimulationError::ParticleOutsideDomain {
                particle_id,
                position,
                boxlen,
            } => write!(
                f,
                "particle {} at {:?} lies outside of the domain [0, {})",
                particle_id, position, boxlen
            ),
            SimulationError::SmoothingLengthNotConverged { particle_id, iterations } => write!(
                f,
                "reached max number of iterations ({}) for smoothing length of particle {}",
                iterations, particle_id
            ),
            SimulationError::DegenerateDensity { particle_id, density } => write!(
                f,
                "degenerate density {} for particle {} (insufficient neighbors)",
                density, particle_id
            ),
        }
    }
}

impl std::error::Error for SimulationError {}

pub type SimulationResult<T> = Result<T, SimulationError>;
