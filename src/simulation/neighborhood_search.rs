use crate::{
    boundary::BoundaryType,
    concurrency::map_indexed,
    error::SimulationResult,
    floating_type_mod::FT,
    grid::CellGrid,
    particles::ParticleVec,
    simulation_parameters::ResolvedParams,
    smoothing_length::{SmoothingLengthSolution, SmoothingLengthSolver},
    sph_kernels::{DimensionUtils, SphKernel},
    VF,
};

/**
 * All particles in the neighborhood of one cell, in cell order (the cell
 * itself first, then its stencil neighbors).
 *
 * The same candidate list is used for every particle of the cell.
 */
pub struct NeighborCandidates<const D: usize> {
    particle_idxs: Vec<usize>,
    positions: Vec<VF<D>>,
}

impl<const D: usize> NeighborCandidates<D> {
    pub fn gather<DU: DimensionUtils<D>>(
        grid: &CellGrid<D>,
        boundary: BoundaryType,
        positions: &[VF<D>],
        cell_idx: usize,
    ) -> Self {
        let neighborhood = grid.neighborhood_cells::<DU>(boundary, cell_idx);
        let count: usize = neighborhood
            .iter()
            .map(|&idx| grid.cells()[idx].particle_ids.len())
            .sum();

        let mut particle_idxs = Vec::with_capacity(count);
        let mut candidate_positions = Vec::with_capacity(count);
        for idx in neighborhood {
            for &p in &grid.cells()[idx].particle_ids {
                particle_idxs.push(p);
                candidate_positions.push(positions[p]);
            }
        }

        NeighborCandidates {
            particle_idxs,
            positions: candidate_positions,
        }
    }

    pub fn len(&self) -> usize {
        self.particle_idxs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particle_idxs.is_empty()
    }

    pub fn particle_idxs(&self) -> &[usize] {
        &self.particle_idxs
    }

    /// Boundary-corrected distance from `x` to every candidate, in candidate order.
    pub fn distances_to(&self, x: VF<D>, boundary: BoundaryType, boxlen: FT) -> Vec<FT> {
        self.positions
            .iter()
            .map(|&y| boundary.distance(x, y, boxlen))
            .collect()
    }
}

/// Solutions for all particles of cell `cell_idx`, paired with their particle index.
pub fn solve_cell<K: SphKernel<D>, DU: DimensionUtils<D>, const D: usize>(
    params: &ResolvedParams,
    grid: &CellGrid<D>,
    particles: &ParticleVec<D>,
    cell_idx: usize,
) -> SimulationResult<Vec<(usize, SmoothingLengthSolution)>> {
    let cell = &grid.cells()[cell_idx];
    if cell.particle_ids.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = NeighborCandidates::gather::<DU>(grid, params.boundary, &particles.position, cell_idx);
    let solver = SmoothingLengthSolver::<K, D>::new(params, &particles.mass);

    cell.particle_ids
        .iter()
        .map(|&i| {
            let distances = candidates.distances_to(particles.position[i], params.boundary, params.boxlen);
            solver
                .solve(
                    particles.id[i],
                    particles.mass[i],
                    distances,
                    candidates.particle_idxs().to_vec(),
                )
                .map(|solution| (i, solution))
        })
        .collect()
}

/**
 * Determines smoothing length, density and neighbor list of every particle.
 *
 * Cells are independent of each other and are solved in parallel if
 * `params.parallel` is set. Results are written back in cell order and the
 * first error in cell order is returned, so both modes behave identically.
 */
pub fn compute_smoothing_lengths<K: SphKernel<D>, DU: DimensionUtils<D>, const D: usize>(
    params: &ResolvedParams,
    grid: &CellGrid<D>,
    particles: &mut ParticleVec<D>,
) -> SimulationResult<()> {
    let results = {
        let particles = &*particles;
        map_indexed(grid.num_cells(), params.parallel, |cell_idx| {
            solve_cell::<K, DU, D>(params, grid, particles, cell_idx)
        })
    };

    let mut total_iterations = 0;
    for cell_results in results {
        for (i, solution) in cell_results? {
            total_iterations += solution.iterations;
            particles.h[i] = solution.h;
            particles.prim[i].density = solution.density;
            particles.neighbors[i] = solution.neighbors;
            particles.neighbor_distances[i] = solution.neighbor_distances;
        }
    }

    log::debug!(
        "Smoothing lengths converged, mean iteration count {:.2}",
        total_iterations as FT / particles.len().max(1) as FT
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{ErrorKind, SimulationError},
        grid::build_grid,
        simulation_parameters::SimulationParams,
        sph_kernels::{CubicSpline, DimensionUtils1d, DimensionUtils2d},
        vec1f, vec2f,
    };

    fn four_particles() -> ParticleVec<1> {
        let mut particles = ParticleVec::<1>::new(4);
        for (i, x) in [0.125, 0.375, 0.625, 0.875].iter().enumerate() {
            particles.position[i] = vec1f(*x);
            particles.mass[i] = 0.25;
        }
        particles
    }

    fn uniform_1d(n: usize) -> ParticleVec<1> {
        let mut particles = ParticleVec::<1>::new(n);
        for i in 0..n {
            particles.position[i] = vec1f((i as FT + 0.5) / n as FT);
            particles.mass[i] = 1. / n as FT;
        }
        particles
    }

    #[test]
    fn periodic_candidates_use_minimum_image() {
        let particles = four_particles();
        let params = SimulationParams::with_nngb(2.)
            .resolve::<CubicSpline, DimensionUtils1d, 1>(4)
            .unwrap();
        let grid = build_grid::<DimensionUtils1d, 1>(&params, &particles.position, &particles.id).unwrap();

        let candidates =
            NeighborCandidates::gather::<DimensionUtils1d>(&grid, BoundaryType::Periodic, &particles.position, 0);
        assert_eq!(candidates.len(), 4);
        // the cell itself comes first
        assert_eq!(candidates.particle_idxs()[0], 0);

        let distances = candidates.distances_to(particles.position[0], BoundaryType::Periodic, 1.);
        let to_last = candidates.particle_idxs().iter().position(|&p| p == 3).unwrap();
        assert!((distances[to_last] - 0.25).abs() < 1e-6);

        let distances = candidates.distances_to(particles.position[0], BoundaryType::Transmissive, 1.);
        assert!((distances[to_last] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn four_periodic_particles_have_no_neighbors_inside_support() {
        let mut particles = four_particles();
        let params = SimulationParams::with_nngb(2.)
            .resolve::<CubicSpline, DimensionUtils1d, 1>(4)
            .unwrap();
        let grid = build_grid::<DimensionUtils1d, 1>(&params, &particles.position, &particles.id).unwrap();
        assert_eq!(grid.nx(), 3);

        // the initial support radius 0.25 reaches the wrapped neighbor at 0.875 exactly on the kernel edge
        let err = compute_smoothing_lengths::<CubicSpline, DimensionUtils1d, 1>(&params, &grid, &mut particles)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Convergence);
        match err {
            SimulationError::DegenerateDensity { particle_id, density } => {
                assert_eq!(particle_id, 1);
                assert!(density.is_finite());
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert!(particles.neighbors.iter().all(|n| n.is_empty()));
    }

    #[test]
    fn transmissive_candidates_stop_at_walls() {
        let particles = four_particles();
        let grid = {
            let mut grid = CellGrid::<1>::new::<DimensionUtils1d>(4, 1.);
            grid.distribute_particles(&particles.position, &particles.id).unwrap();
            grid
        };

        let candidates =
            NeighborCandidates::gather::<DimensionUtils1d>(&grid, BoundaryType::Transmissive, &particles.position, 0);
        assert_eq!(candidates.particle_idxs(), &[0, 1]);

        let candidates =
            NeighborCandidates::gather::<DimensionUtils1d>(&grid, BoundaryType::Reflective, &particles.position, 2);
        assert_eq!(candidates.particle_idxs(), &[2, 1, 3]);
    }

    #[test]
    fn uniform_periodic_particles_get_uniform_density() {
        let mut particles = uniform_1d(50);
        let params = SimulationParams::with_nngb(5.)
            .resolve::<CubicSpline, DimensionUtils1d, 1>(particles.len())
            .unwrap();
        let grid = build_grid::<DimensionUtils1d, 1>(&params, &particles.position, &particles.id).unwrap();

        compute_smoothing_lengths::<CubicSpline, DimensionUtils1d, 1>(&params, &grid, &mut particles).unwrap();

        for i in 0..particles.len() {
            assert!((particles.prim[i].density - 1.).abs() < 0.01);
            assert_eq!(particles.neighbors[i].len(), 5);
            assert_eq!(particles.neighbors[i][0], i);
            assert_eq!(particles.neighbors[i].len(), particles.neighbor_distances[i].len());
        }
        // every particle sees the same surroundings
        let h0 = particles.h[0];
        assert!(particles.h.iter().all(|&h| (h - h0).abs() < 1e-3 * h0));
    }

    #[test]
    fn parallel_and_sequential_results_agree() {
        let n = 16;
        let mut sequential = ParticleVec::<2>::new(n * n);
        for i in 0..n * n {
            let jitter = 0.1 * (((i * 7) % 5) as FT - 2.) / 2.;
            sequential.position[i] =
                vec2f((i % n) as FT + 0.5 + jitter, (i / n) as FT + 0.5 - jitter) / n as FT;
            sequential.mass[i] = 1. / (n * n) as FT;
        }
        let mut parallel = ParticleVec::<2>::new(n * n);
        parallel.position = sequential.position.clone();
        parallel.mass = sequential.mass.clone();

        let mut params = SimulationParams::with_nngb(16.)
            .resolve::<CubicSpline, DimensionUtils2d, 2>(n * n)
            .unwrap();
        let grid = build_grid::<DimensionUtils2d, 2>(&params, &sequential.position, &sequential.id).unwrap();

        compute_smoothing_lengths::<CubicSpline, DimensionUtils2d, 2>(&params, &grid, &mut sequential).unwrap();
        params.parallel = true;
        compute_smoothing_lengths::<CubicSpline, DimensionUtils2d, 2>(&params, &grid, &mut parallel).unwrap();

        assert_eq!(sequential.h, parallel.h);
        assert_eq!(sequential.neighbors, parallel.neighbors);
        assert_eq!(sequential.prim, parallel.prim);
    }

    #[test]
    fn failing_particle_is_identified() {
        let mut particles = uniform_1d(50);
        let mut params = SimulationParams::with_nngb(5.)
            .resolve::<CubicSpline, DimensionUtils1d, 1>(particles.len())
            .unwrap();
        params.max_smoothing_length_iterations = 1;
        let grid = build_grid::<DimensionUtils1d, 1>(&params, &particles.position, &particles.id).unwrap();

        let err = compute_smoothing_lengths::<CubicSpline, DimensionUtils1d, 1>(&params, &grid, &mut particles)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Convergence);
        // first particle of the first cell
        assert!(matches!(
            err,
            SimulationError::SmoothingLengthNotConverged { particle_id: 1, .. }
        ));
    }
}
