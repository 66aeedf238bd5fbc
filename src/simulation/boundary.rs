use serde::{Deserialize, Serialize};

use crate::{floating_type_mod::FT, sph_kernels::DimensionUtils, IT, VF, VI};

/// Boundary condition applied to every wall of the domain `[0, boxlen)^D`.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum BoundaryType {
    Periodic,
    Reflective,
    Transmissive,
}

impl Default for BoundaryType {
    fn default() -> Self {
        BoundaryType::Periodic
    }
}

const MAX_STENCIL_SIZE: usize = 9;

/**
 * Grid coordinates of a cell and its direct neighbor cells.
 *
 * The first entry is always the cell itself. Periodic stencils always have
 * 3^D entries (which can repeat a cell if the grid has fewer than 3 cells
 * per axis), non-periodic stencils drop the cells outside of the grid.
 */
#[derive(Debug, Clone, Copy)]
pub struct CellStencil<const D: usize> {
    coords: [VI<D>; MAX_STENCIL_SIZE],
    len: usize,
}

impl<const D: usize> CellStencil<D> {
    fn new() -> Self {
        CellStencil {
            coords: [VI::<D>::zeros(); MAX_STENCIL_SIZE],
            len: 0,
        }
    }

    fn push(&mut self, coord: VI<D>) {
        self.coords[self.len] = coord;
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = VI<D>> + 'a {
        self.coords[..self.len].iter().copied()
    }
}

impl BoundaryType {
    pub fn is_periodic(self) -> bool {
        self == BoundaryType::Periodic
    }

    /// Stencil of the cell at grid coordinate `cell` in a grid with `nx` cells per axis.
    pub fn cell_stencil<DU: DimensionUtils<D>, const D: usize>(self, cell: VI<D>, nx: usize) -> CellStencil<D> {
        assert!(D <= 2, "cell stencils are only supported up to two dimensions");

        let nx = nx as IT;
        let mut stencil = CellStencil::new();
        stencil.push(cell);

        DU::iterate_grid_neighbors(1, |offset| {
            if offset == VI::<D>::zeros() {
                return;
            }

            let mut neighbor = cell + offset;
            for d in 0..D {
                if neighbor[d] < 0 || neighbor[d] >= nx {
                    if !self.is_periodic() {
                        return;
                    }
                    neighbor[d] = neighbor[d].rem_euclid(nx);
                }
            }

            stencil.push(neighbor);
        });

        stencil
    }

    /// Minimum-image correction of a raw position delta `x_j - x_i`.
    pub fn correct_displacement<const D: usize>(self, mut delta: VF<D>, boxlen: FT) -> VF<D> {
        if self.is_periodic() {
            let half_boxlen = 0.5 * boxlen;
            for d in 0..D {
                if delta[d] > half_boxlen {
                    delta[d] -= boxlen;
                } else if delta[d] < -half_boxlen {
                    delta[d] += boxlen;
                }
            }
        }
        delta
    }

    /// Boundary-corrected distance between two positions.
    pub fn distance<const D: usize>(self, from: VF<D>, to: VF<D>, boxlen: FT) -> FT {
        self.correct_displacement(to - from, boxlen).norm()
    }
}
