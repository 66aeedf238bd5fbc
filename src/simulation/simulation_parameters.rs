use serde::{Deserialize, Serialize};

use crate::{
    boundary::BoundaryType,
    error::{SimulationError, SimulationResult},
    floating_type_mod::FT,
    sph_kernels::{DimensionUtils, KernelType, SphKernel},
};

/// Every cell neighborhood must hold at least this factor times the target neighbor count.
pub const CELL_MIN_PARTS_IN_NEIGHBORHOOD_FACTOR: FT = 2.;

/// Relative tolerance for the smoothing length iteration.
pub const EPSILON_H: FT = 1e-3;

/// Max number of iterations to determine the smoothing length.
pub const ITER_MAX_H: usize = 1000;

fn default_boxlen() -> FT {
    1.
}

fn default_min_neighborhood_factor() -> FT {
    CELL_MIN_PARTS_IN_NEIGHBORHOOD_FACTOR
}

fn default_smoothing_length_tolerance() -> FT {
    EPSILON_H
}

fn default_max_smoothing_length_iterations() -> usize {
    ITER_MAX_H
}

/**
 * Runtime parameters as read from the simulation config file.
 *
 * Exactly one of `nngb` (target neighbor count) and `eta` (resolution
 * parameter) has to be set, the other one is derived in `resolve`.
 */
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationParams {
    #[serde(default = "default_boxlen")]
    pub boxlen: FT,
    #[serde(default)]
    pub boundary: BoundaryType,
    #[serde(default)]
    pub kernel: KernelType,

    #[serde(default)]
    pub nngb: Option<FT>,
    #[serde(default)]
    pub eta: Option<FT>,

    #[serde(default = "default_min_neighborhood_factor")]
    pub min_neighborhood_factor: FT,
    #[serde(default = "default_smoothing_length_tolerance")]
    pub smoothing_length_tolerance: FT,
    #[serde(default = "default_max_smoothing_length_iterations")]
    pub max_smoothing_length_iterations: usize,

    // solve cells on the rayon thread pool
    #[serde(default)]
    pub parallel: bool,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            boxlen: default_boxlen(),
            boundary: BoundaryType::default(),
            kernel: KernelType::default(),
            nngb: None,
            eta: None,
            min_neighborhood_factor: default_min_neighborhood_factor(),
            smoothing_length_tolerance: default_smoothing_length_tolerance(),
            max_smoothing_length_iterations: default_max_smoothing_length_iterations(),
            parallel: false,
        }
    }
}

impl SimulationParams {
    pub fn with_nngb(nngb: FT) -> Self {
        SimulationParams {
            nngb: Some(nngb),
            ..Default::default()
        }
    }

    pub fn with_eta(eta: FT) -> Self {
        SimulationParams {
            eta: Some(eta),
            ..Default::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> SimulationResult<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SimulationError::config(format!("failed parsing simulation config: {}", e)))
    }

    /// Checks whether we can work with these parameters.
    pub fn validate(&self) -> SimulationResult<()> {
        match (self.nngb, self.eta) {
            (None, None) => {
                return Err(SimulationError::config(
                    "neither nngb nor eta was specified, exactly one of these two is needed",
                ))
            }
            (Some(_), Some(_)) => {
                return Err(SimulationError::config(
                    "both nngb and eta were specified, exactly one of these two is needed",
                ))
            }
            (Some(nngb), None) if !(nngb > 0.) => {
                return Err(SimulationError::config(format!("nngb has to be positive, got {}", nngb)))
            }
            (None, Some(eta)) if !(eta > 0.) => {
                return Err(SimulationError::config(format!("eta has to be positive, got {}", eta)))
            }
            _ => {}
        }

        if !(self.boxlen > 0.) || !self.boxlen.is_finite() {
            return Err(SimulationError::config(format!(
                "boxlen has to be positive, got {}",
                self.boxlen
            )));
        }
        if !(self.min_neighborhood_factor > 0.) {
            return Err(SimulationError::config(format!(
                "min_neighborhood_factor has to be positive, got {}",
                self.min_neighborhood_factor
            )));
        }
        if !(self.smoothing_length_tolerance > 0.) {
            return Err(SimulationError::config(format!(
                "smoothing_length_tolerance has to be positive, got {}",
                self.smoothing_length_tolerance
            )));
        }
        if self.max_smoothing_length_iterations == 0 {
            return Err(SimulationError::config("max_smoothing_length_iterations is 0"));
        }

        Ok(())
    }

    /// Validates the parameters and derives everything the core needs for `num_particles` particles.
    pub fn resolve<K: SphKernel<D>, DU: DimensionUtils<D>, const D: usize>(
        &self,
        num_particles: usize,
    ) -> SimulationResult<ResolvedParams> {
        self.validate()?;

        if num_particles == 0 {
            return Err(SimulationError::config("no particles given"));
        }

        let support_by_h = K::support_radius_by_smoothing_length();
        let (nngb, eta) = match (self.nngb, self.eta) {
            (Some(nngb), None) => (nngb, DU::eta_from_neighbor_count(nngb, support_by_h)),
            (None, Some(eta)) => (DU::neighbor_count_from_eta(eta, support_by_h), eta),
            _ => unreachable!("checked in validate()"),
        };

        let dx = DU::initial_cell_size(self.boxlen, num_particles, nngb);
        let guessed_nx = ((self.boxlen / dx) as usize).saturating_add(1);

        // smallest nx with at least as many cells as particles
        let mut max_nx: usize = 1;
        while max_nx.pow(D as u32) < num_particles {
            max_nx += 1;
        }
        let initial_nx = guessed_nx.min(max_nx);
        if initial_nx < guessed_nx {
            log::info!(
                "Initial grid guess nx={} capped at {} for {} particles",
                guessed_nx,
                max_nx,
                num_particles
            );
        }

        log::info!(
            "Initial guess for grid parameters: nx={}, dx={:.3}",
            initial_nx,
            self.boxlen / initial_nx as FT
        );

        Ok(ResolvedParams {
            ndim: D,
            num_particles,
            boxlen: self.boxlen,
            boundary: self.boundary,
            nngb,
            eta,
            min_neighborhood_factor: self.min_neighborhood_factor,
            smoothing_length_tolerance: self.smoothing_length_tolerance,
            max_smoothing_length_iterations: self.max_smoothing_length_iterations,
            initial_nx,
            parallel: self.parallel,
        })
    }
}

/// Parameters after validation and derivation, read-only while the core runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedParams {
    pub ndim: usize,
    pub num_particles: usize,
    pub boxlen: FT,
    pub boundary: BoundaryType,
    pub nngb: FT,
    pub eta: FT,
    pub min_neighborhood_factor: FT,
    pub smoothing_length_tolerance: FT,
    pub max_smoothing_length_iterations: usize,
    pub initial_nx: usize,
    pub parallel: bool,
}

impl ResolvedParams {
    /// Least number of particles every cell neighborhood has to contain.
    pub fn min_neighborhood_count(&self) -> FT {
        self.min_neighborhood_factor * self.nngb
    }
}
