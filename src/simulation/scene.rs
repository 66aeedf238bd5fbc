use nalgebra::zero;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    error::{SimulationError, SimulationResult},
    floating_type_mod::FT,
    particles::{ConservedState, ParticleVec, PrimitiveState},
    VF,
};

/// Largest lattice displacement of a perturbed layout, relative to the lattice spacing.
const MAX_PERTURBATION: FT = 0.25;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SceneLayout {
    /// Particles at the centers of a regular lattice.
    Uniform,
    /// Regular lattice with every particle randomly displaced.
    Perturbed,
}

impl Default for SceneLayout {
    fn default() -> Self {
        SceneLayout::Uniform
    }
}

fn default_density() -> FT {
    1.
}

/**
 * Initial conditions as read from the scene config file: a lattice of
 * `particles_per_dimension^ndim` particles filling the whole domain with a
 * constant primitive state.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneConfig {
    pub ndim: usize,
    #[serde(default)]
    pub layout: SceneLayout,
    pub particles_per_dimension: usize,

    #[serde(default = "default_density")]
    pub density: FT,
    // one entry per dimension, zero if empty
    #[serde(default)]
    pub velocity: Vec<FT>,
    #[serde(default)]
    pub pressure: FT,

    #[serde(default)]
    pub seed: u64,
}

impl SceneConfig {
    pub fn from_yaml_str(yaml: &str) -> SimulationResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| SimulationError::config(format!("failed parsing scene config: {}", e)))
    }

    pub fn num_particles(&self) -> usize {
        self.particles_per_dimension.pow(self.ndim as u32)
    }

    fn velocity<const D: usize>(&self) -> SimulationResult<VF<D>> {
        if self.velocity.is_empty() {
            return Ok(zero());
        }
        if self.velocity.len() != D {
            return Err(SimulationError::config(format!(
                "scene velocity has {} components, expected {}",
                self.velocity.len(),
                D
            )));
        }
        Ok(VF::<D>::from_iterator(self.velocity.iter().copied()))
    }

    /// Creates the particles of this scene in a domain `[0, boxlen)^D`.
    pub fn generate<const D: usize>(&self, boxlen: FT) -> SimulationResult<ParticleVec<D>> {
        if self.ndim != D {
            return Err(SimulationError::config(format!(
                "scene has {} dimensions, but the simulation runs in {}",
                self.ndim, D
            )));
        }
        if self.particles_per_dimension == 0 {
            return Err(SimulationError::config("scene has no particles"));
        }
        if !(self.density > 0.) {
            return Err(SimulationError::config(format!(
                "scene density has to be positive, got {}",
                self.density
            )));
        }
        if self.pressure < 0. {
            return Err(SimulationError::config(format!(
                "scene pressure must not be negative, got {}",
                self.pressure
            )));
        }

        let velocity = self.velocity::<D>()?;
        let n = self.particles_per_dimension;
        let num_particles = self.num_particles();
        let spacing = boxlen / n as FT;
        let mass = self.density * boxlen.powi(D as i32) / num_particles as FT;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut particles = ParticleVec::<D>::new(num_particles);

        for i in 0..num_particles {
            let mut lattice_idx = i;
            let mut position = VF::<D>::zeros();
            for d in 0..D {
                position[d] = ((lattice_idx % n) as FT + 0.5) * spacing;
                lattice_idx /= n;

                if self.layout == SceneLayout::Perturbed {
                    position[d] += rng.gen_range(-MAX_PERTURBATION..MAX_PERTURBATION) * spacing;
                }
            }

            let prim = PrimitiveState {
                density: self.density,
                velocity,
                pressure: self.pressure,
            };

            particles.position[i] = position;
            particles.velocity[i] = velocity;
            particles.mass[i] = mass;
            particles.cons[i] = ConservedState::from_primitive(&prim);
            particles.prim[i] = prim;
        }

        log::info!(
            "Generated {} particles ({:?} lattice, {} per dimension, mass {:.3e})",
            num_particles,
            self.layout,
            n,
            mass
        );

        Ok(particles)
    }
}
