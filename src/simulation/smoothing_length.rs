use std::marker::PhantomData;

use crate::{
    error::{SimulationError, SimulationResult},
    floating_type_mod::FT,
    simulation_parameters::ResolvedParams,
    sort::sort_with_follower,
    sph_kernels::SphKernel,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingLengthSolution {
    pub h: FT,
    pub density: FT,
    /// Sorted by ascending distance, exactly the candidates within `h * H/h`.
    pub neighbors: Vec<usize>,
    pub neighbor_distances: Vec<FT>,
    pub iterations: usize,
}

impl SmoothingLengthSolution {
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }
}

/**
 * Newton iteration for the compact support radius H of a single particle.
 *
 * The residual is `f(h) = h - eta * m_i^(1/D) * rho_i^(-1/D)` with the density
 * `rho_i = sum_j m_j W(r_ij, h)` over all candidates within H. The Newton
 * step computed for h is applied to H, which damps the update by `h/H`.
 */
pub struct SmoothingLengthSolver<'a, K: SphKernel<D>, const D: usize> {
    nngb: FT,
    eta: FT,
    tolerance: FT,
    max_iterations: usize,

    // masses of all particles, indexed like the candidate ids
    masses: &'a [FT],

    kernel: PhantomData<fn() -> K>,
}

impl<'a, K: SphKernel<D>, const D: usize> SmoothingLengthSolver<'a, K, D> {
    pub fn new(params: &ResolvedParams, masses: &'a [FT]) -> Self {
        SmoothingLengthSolver {
            nngb: params.nngb,
            eta: params.eta,
            tolerance: params.smoothing_length_tolerance,
            max_iterations: params.max_smoothing_length_iterations,
            masses,
            kernel: PhantomData,
        }
    }

    /**
     * Density and the sum `sum_j m_j (W + r/D dW/dr)` over the sorted candidates within `support_radius`.
     *
     * The third value counts the candidates at a nonzero distance strictly inside the support.
     */
    fn density_sums(&self, h: FT, support_radius: FT, distances: &[FT], candidates: &[usize]) -> (FT, FT, usize) {
        let ndim = D as FT;
        let mut density = 0.;
        let mut dfdh_sum = 0.;
        let mut contributing = 0;

        for (&r, &j) in distances.iter().zip(candidates) {
            if r > support_radius {
                break;
            }
            let w = K::w(r, h);
            let dwdr = K::dw_dr(r, h);
            density += self.masses[j] * w;
            dfdh_sum += self.masses[j] * (w + r / ndim * dwdr);
            if r > 0. && r < support_radius {
                contributing += 1;
            }
        }

        (density, dfdh_sum, contributing)
    }

    /**
     * Smoothing length, density and neighbor list of the particle with id `particle_id` and mass `mass`.
     *
     * `distances[k]` is the distance to the candidate particle with index `candidates[k]`.
     * Both vectors are sorted and then truncated to the final neighbor list.
     */
    pub fn solve(
        &self,
        particle_id: usize,
        mass: FT,
        mut distances: Vec<FT>,
        mut candidates: Vec<usize>,
    ) -> SimulationResult<SmoothingLengthSolution> {
        assert_eq!(distances.len(), candidates.len());

        if distances.is_empty() {
            return Err(SimulationError::DegenerateDensity {
                particle_id,
                density: 0.,
            });
        }

        sort_with_follower(&mut distances, &mut candidates);

        let num_candidates = distances.len();
        let initial_rank = ((self.nngb + 0.5) as usize).min(num_candidates - 1);
        let mut support_radius = distances[initial_rank];
        if !(support_radius > 0.) {
            // all candidates up to the initial rank sit on top of each other
            support_radius = distances[num_candidates - 1];
        }
        if !(support_radius > 0.) {
            return Err(SimulationError::DegenerateDensity {
                particle_id,
                density: 0.,
            });
        }

        let ndim = D as FT;
        let mass_power = mass.powf(1. / ndim);

        let mut iterations = None;
        for iteration in 1..=self.max_iterations {
            let h = K::smoothing_length(support_radius);
            let (density, dfdh_sum, contributing) = self.density_sums(h, support_radius, &distances, &candidates);

            // only the particle itself inside the support: H would shrink forever
            if contributing == 0 {
                log::warn!(
                    "particle {} has no neighbors inside support radius {:.5}",
                    particle_id,
                    support_radius
                );
                return Err(SimulationError::DegenerateDensity { particle_id, density });
            }

            if !(density > 0.) || !density.is_finite() {
                return Err(SimulationError::DegenerateDensity { particle_id, density });
            }

            let density_power = density.powf(-1. - 1. / ndim);
            let f = h - self.eta * mass_power * density_power * density;
            let dfdh = 1. - self.eta / h * mass_power * density_power * dfdh_sum;

            let support_radius_new = support_radius - f / dfdh;
            if !(support_radius_new > 0.) || !support_radius_new.is_finite() {
                return Err(SimulationError::DegenerateDensity { particle_id, density });
            }

            let converged = (support_radius_new - support_radius).abs() < self.tolerance * support_radius;
            support_radius = support_radius_new;

            if converged {
                iterations = Some(iteration);
                break;
            }
        }

        let iterations = match iterations {
            Some(iterations) => iterations,
            None => {
                log::warn!(
                    "particle {} reached the iteration cap, last support radius {:.5}",
                    particle_id,
                    support_radius
                );
                return Err(SimulationError::SmoothingLengthNotConverged {
                    particle_id,
                    iterations: self.max_iterations,
                });
            }
        };

        let h = K::smoothing_length(support_radius);
        let support_radius = K::support_radius(h);

        let neighbor_count = distances.iter().take_while(|&&r| r <= support_radius).count();
        if neighbor_count == num_candidates {
            log::warn!(
                "particle {}: support radius {:.5} covers all {} neighbor candidates (farthest at {:.5})",
                particle_id,
                support_radius,
                num_candidates,
                distances[num_candidates - 1]
            );
        }

        distances.truncate(neighbor_count);
        distances.shrink_to_fit();
        candidates.truncate(neighbor_count);
        candidates.shrink_to_fit();

        let density: FT = distances
            .iter()
            .zip(&candidates)
            .map(|(&r, &j)| self.masses[j] * K::w(r, h))
            .sum();
        if !(density > 0.) {
            return Err(SimulationError::DegenerateDensity { particle_id, density });
        }

        log::trace!(
            "particle {}: h={:.5} rho={:.5} neighbors={} iterations={}",
            particle_id,
            h,
            density,
            neighbor_count,
            iterations
        );

        Ok(SmoothingLengthSolution {
            h,
            density,
            neighbors: candidates,
            neighbor_distances: distances,
            iterations,
        })
    }
}
