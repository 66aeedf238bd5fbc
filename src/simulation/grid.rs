use std::fmt;

use crate::{
    boundary::BoundaryType,
    error::{SimulationError, SimulationResult},
    floating_type_mod::FT,
    simulation_parameters::ResolvedParams,
    sph_kernels::DimensionUtils,
    IT, VF, VI,
};

#[derive(Debug)]
pub struct Cell<const D: usize> {
    pub id: usize,
    pub center: VF<D>,
    pub particle_ids: Vec<usize>,
}

impl<const D: usize> Cell<D> {
    fn new(id: usize, center: VF<D>) -> Cell<D> {
        Cell {
            id,
            center,
            particle_ids: Vec::new(),
        }
    }
}

/**
 * Regular grid of `nx^D` cells covering `[0, boxlen)^D`.
 *
 * Cells only store particle indices into the flat particle array. The grid is
 * never resized: a different resolution means building a new grid.
 */
#[derive(Debug)]
pub struct CellGrid<const D: usize> {
    nx: usize,
    dx: FT,
    boxlen: FT,
    cells: Vec<Cell<D>>,
}

impl<const D: usize> CellGrid<D> {
    pub fn new<DU: DimensionUtils<D>>(nx: usize, boxlen: FT) -> CellGrid<D> {
        assert!(nx > 0);
        let dx = boxlen / nx as FT;

        let mut grid: CellGrid<D> = CellGrid {
            nx,
            dx,
            boxlen,
            cells: Vec::with_capacity(DU::num_cells(nx)),
        };

        for id in 0..DU::num_cells(nx) {
            let center: VF<D> = grid.idx_to_pos(id).map(|i: IT| (i as FT + 0.5) * dx);
            grid.cells.push(Cell::new(id, center));
        }

        log::trace!("  ncells: {:4}, nx: {:4}, dx: {:.3}", grid.cells.len(), nx, dx);

        grid
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn dx(&self) -> FT {
        self.dx
    }

    pub fn boxlen(&self) -> FT {
        self.boxlen
    }

    pub fn cells(&self) -> &[Cell<D>] {
        &self.cells
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn pos_to_idx(&self, cell_pos: VI<D>) -> usize {
        let mut multiplier = 1;
        let mut idx: usize = 0;
        for d in 0..D {
            assert!(0 <= cell_pos[d]);
            assert!((cell_pos[d] as usize) < self.nx);
            idx += multiplier * cell_pos[d] as usize;
            multiplier *= self.nx;
        }
        idx
    }

    pub fn idx_to_pos(&self, mut idx: usize) -> VI<D> {
        let mut cell_pos = VI::<D>::zeros();
        for d in 0..D {
            cell_pos[d] = (idx % self.nx) as IT;
            idx /= self.nx;
        }
        cell_pos
    }

    /// Grid coordinate of the cell containing `position`.
    pub fn particle_to_cell_pos(&self, particle_id: usize, position: VF<D>) -> SimulationResult<VI<D>> {
        let outside_domain = || SimulationError::ParticleOutsideDomain {
            particle_id,
            position: position.iter().copied().collect(),
            boxlen: self.boxlen,
        };

        let mut cell_pos = VI::<D>::zeros();
        for d in 0..D {
            let x = position[d];
            if !x.is_finite() || x < 0. || x >= self.boxlen {
                return Err(outside_domain());
            }

            let i = (x / self.dx).floor() as IT;
            // x < boxlen, so landing on nx is a rounding artifact
            cell_pos[d] = i.min(self.nx as IT - 1);
        }
        Ok(cell_pos)
    }

    /**
     * Puts every particle into the cell containing it.
     *
     * `ids` are only used to identify a particle in the error.
     */
    pub fn distribute_particles(&mut self, positions: &[VF<D>], ids: &[usize]) -> SimulationResult<()> {
        assert_eq!(positions.len(), ids.len());

        log::trace!("Distributing particles into cells");

        for cell in &mut self.cells {
            cell.particle_ids.clear();
        }

        for (particle_idx, &position) in positions.iter().enumerate() {
            let cell_pos = self.particle_to_cell_pos(ids[particle_idx], position)?;
            let cell_idx = self.pos_to_idx(cell_pos);
            self.cells[cell_idx].particle_ids.push(particle_idx);
        }

        if log::log_enabled!(log::Level::Debug) {
            let counts = self.cells.iter().map(|c| c.particle_ids.len());
            let min = counts.clone().min().unwrap_or(0);
            let max = counts.clone().max().unwrap_or(0);
            let total: usize = counts.sum();
            log::debug!("Number of particles in cells:");
            log::debug!(
                "  Min {:4}, Max {:4}, Tot {:4}/{:4}, Mean {:.3}",
                min,
                max,
                total,
                positions.len(),
                total as FT / self.cells.len() as FT
            );
        }

        Ok(())
    }

    /**
     * Indices of the distinct cells in the stencil of `cell_idx`, the cell itself first.
     *
     * Both the density check and the neighbor search go through this function.
     */
    pub fn neighborhood_cells<DU: DimensionUtils<D>>(&self, boundary: BoundaryType, cell_idx: usize) -> Vec<usize> {
        let stencil = boundary.cell_stencil::<DU, D>(self.idx_to_pos(cell_idx), self.nx);

        let mut cells = Vec::with_capacity(stencil.len());
        for cell_pos in stencil.iter() {
            let idx = self.pos_to_idx(cell_pos);
            if !cells.contains(&idx) {
                cells.push(idx);
            }
        }
        cells
    }

    /// Number of particles in the neighborhood of `cell_idx`.
    pub fn neighborhood_particle_count<DU: DimensionUtils<D>>(&self, boundary: BoundaryType, cell_idx: usize) -> usize {
        self.neighborhood_cells::<DU>(boundary, cell_idx)
            .into_iter()
            .map(|idx| self.cells[idx].particle_ids.len())
            .sum()
    }

    /// First cell whose neighborhood holds fewer than `min_count` particles.
    pub fn find_underpopulated_cell<DU: DimensionUtils<D>>(
        &self,
        boundary: BoundaryType,
        min_count: FT,
    ) -> Option<(usize, usize)> {
        (0..self.cells.len())
            .map(|idx| (idx, self.neighborhood_particle_count::<DU>(boundary, idx)))
            .find(|&(_, count)| (count as FT) < min_count)
    }
}

/// Cell ids laid out as in the domain (y pointing upwards).
impl<const D: usize> fmt::Display for CellGrid<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = if D == 1 { 1 } else { self.nx };
        let separator = "-".repeat(self.nx * 5 + 1);

        for j in (0..rows).rev() {
            if D > 1 {
                writeln!(f, "{}", separator)?;
            }
            write!(f, "|")?;
            for i in 0..self.nx {
                write!(f, "{:3} |", self.cells[j * self.nx + i].id)?;
            }
            writeln!(f)?;
        }
        if D > 1 {
            writeln!(f, "{}", separator)?;
        }
        Ok(())
    }
}

/**
 * Builds a grid in which every cell neighborhood holds at least
 * `min_neighborhood_factor * nngb` particles.
 *
 * Starts at `params.initial_nx` and removes one cell per axis until the
 * criterion holds. Fails if the grid would need zero cells.
 */
pub fn build_grid<DU: DimensionUtils<D>, const D: usize>(
    params: &ResolvedParams,
    positions: &[VF<D>],
    ids: &[usize],
) -> SimulationResult<CellGrid<D>> {
    let min_count = params.min_neighborhood_count();
    let mut nx = params.initial_nx;

    loop {
        if nx == 0 {
            return Err(SimulationError::GridCollapsed {
                min_neighborhood_count: min_count,
                num_particles: positions.len(),
            });
        }

        log::trace!("Initializing grid");
        let mut grid = CellGrid::new::<DU>(nx, params.boxlen);
        grid.distribute_particles(positions, ids)?;

        match grid.find_underpopulated_cell::<DU>(params.boundary, min_count) {
            None => {
                log::debug!("Grid built: nx={}, dx={:.4}", grid.nx(), grid.dx());
                log::trace!("Grid layout\n{}", grid);
                return Ok(grid);
            }
            Some((cell_idx, count)) => {
                log::debug!("Cell {} has too few particles around the neighbours.", cell_idx);
                log::debug!("Expected minimum: {:9.3}, I got: {}", min_count, count);
                log::debug!("Triggering grid rebuild.");
                nx -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ErrorKind,
        simulation_parameters::SimulationParams,
        sph_kernels::{CubicSpline, DimensionUtils1d, DimensionUtils2d},
        vec1f, vec2f,
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn resolved<DU: DimensionUtils<D>, const D: usize>(
        nngb: FT,
        boundary: BoundaryType,
        num_particles: usize,
    ) -> ResolvedParams
    where
        CubicSpline: crate::sph_kernels::SphKernel<D>,
    {
        let mut params = SimulationParams::with_nngb(nngb);
        params.boundary = boundary;
        params.resolve::<CubicSpline, DU, D>(num_particles).unwrap()
    }

    fn ids(n: usize) -> Vec<usize> {
        (1..=n).collect()
    }

    fn check_partition<const D: usize>(grid: &CellGrid<D>, num_particles: usize) {
        let mut seen = vec![0; num_particles];
        for cell in grid.cells() {
            for &p in &cell.particle_ids {
                seen[p] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1), "particles not partitioned: {:?}", seen);
    }

    #[test]
    fn index_and_position_roundtrip() {
        let grid = CellGrid::<2>::new::<DimensionUtils2d>(5, 1.);
        for idx in 0..grid.num_cells() {
            assert_eq!(grid.pos_to_idx(grid.idx_to_pos(idx)), idx);
            assert_eq!(grid.cells()[idx].id, idx);
        }
        // j * nx + i
        assert_eq!(grid.pos_to_idx([2, 3].into()), 17);
        assert!((grid.cells()[17].center - vec2f(0.5, 0.7)).norm() < 1e-6);
    }

    #[test]
    fn distribution_partitions_particles() {
        let mut rng = StdRng::seed_from_u64(3);
        let positions: Vec<VF<2>> = (0..500).map(|_| vec2f(rng.gen::<FT>(), rng.gen::<FT>())).collect();

        for nx in [1, 2, 3, 8, 13] {
            let mut grid = CellGrid::<2>::new::<DimensionUtils2d>(nx, 1.);
            grid.distribute_particles(&positions, &ids(positions.len())).unwrap();
            check_partition(&grid, positions.len());
        }
    }

    #[test]
    fn position_outside_domain_is_data_error() {
        let positions = vec![vec1f(0.2), vec1f(1.3), vec1f(0.4)];
        let mut grid = CellGrid::<1>::new::<DimensionUtils1d>(4, 1.);
        let err = grid.distribute_particles(&positions, &ids(3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
        assert!(matches!(err, SimulationError::ParticleOutsideDomain { particle_id: 2, .. }));

        let mut grid = CellGrid::<1>::new::<DimensionUtils1d>(4, 1.);
        let err = grid.distribute_particles(&[vec1f(-0.01)], &[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);

        let mut grid = CellGrid::<1>::new::<DimensionUtils1d>(4, 1.);
        let err = grid.distribute_particles(&[vec1f(FT::NAN)], &[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Data);
    }

    #[test]
    fn build_grid_guarantees_neighborhood_density() {
        let mut rng = StdRng::seed_from_u64(11);
        for boundary in [BoundaryType::Periodic, BoundaryType::Transmissive] {
            let positions: Vec<VF<2>> = (0..300).map(|_| vec2f(rng.gen::<FT>(), rng.gen::<FT>())).collect();
            let params = resolved::<DimensionUtils2d, 2>(12., boundary, positions.len());

            let grid = build_grid::<DimensionUtils2d, 2>(&params, &positions, &ids(positions.len())).unwrap();
            check_partition(&grid, positions.len());
            assert!(grid.nx() <= params.initial_nx);
            for idx in 0..grid.num_cells() {
                let count = grid.neighborhood_particle_count::<DimensionUtils2d>(boundary, idx);
                assert!(count as FT >= params.min_neighborhood_count());
            }
        }
    }

    #[test]
    fn build_grid_four_particles_periodic_1d() {
        let positions = vec![vec1f(0.125), vec1f(0.375), vec1f(0.625), vec1f(0.875)];
        let params = resolved::<DimensionUtils1d, 1>(2., BoundaryType::Periodic, positions.len());

        let grid = build_grid::<DimensionUtils1d, 1>(&params, &positions, &ids(4)).unwrap();
        assert_eq!(grid.nx(), 3);
        for idx in 0..grid.num_cells() {
            assert!(grid.neighborhood_particle_count::<DimensionUtils1d>(BoundaryType::Periodic, idx) >= 4);
        }
    }

    #[test]
    fn small_periodic_grid_does_not_count_cells_twice() {
        let positions = vec![vec1f(0.1), vec1f(0.6)];
        let mut grid = CellGrid::<1>::new::<DimensionUtils1d>(2, 1.);
        grid.distribute_particles(&positions, &ids(2)).unwrap();

        assert_eq!(grid.neighborhood_cells::<DimensionUtils1d>(BoundaryType::Periodic, 0), vec![0, 1]);
        assert_eq!(grid.neighborhood_particle_count::<DimensionUtils1d>(BoundaryType::Periodic, 0), 2);
    }

    #[test]
    fn build_grid_fails_when_resolution_collapses() {
        let positions = vec![vec1f(0.2), vec1f(0.7)];
        let params = resolved::<DimensionUtils1d, 1>(4., BoundaryType::Periodic, positions.len());

        let err = build_grid::<DimensionUtils1d, 1>(&params, &positions, &ids(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(matches!(err, SimulationError::GridCollapsed { .. }));
    }

    #[test]
    fn grid_layout_display() {
        let grid = CellGrid::<2>::new::<DimensionUtils2d>(2, 1.);
        let layout = grid.to_string();
        let lines: Vec<&str> = layout.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[1], "|  2 |  3 |");
        assert_eq!(lines[3], "|  0 |  1 |");
    }
}
