pub mod boundary;
pub mod concurrency;
pub mod error;
pub mod grid;
pub mod neighborhood_search;
pub mod particles;
pub mod scene;
pub mod simulation_parameters;
pub mod smoothing_length;
pub mod sort;
pub mod sph_kernels;
pub mod simulation;

pub type IT = i32;

#[cfg(feature = "double-precision")]
pub mod floating_type_mod {
    pub type FT = f64;
    pub use std::f64::consts::{FRAC_1_PI, PI};
}

#[cfg(not(feature = "double-precision"))]
pub mod floating_type_mod {
    pub type FT = f32;
    pub use std::f32::consts::{FRAC_1_PI, PI};
}

use floating_type_mod::FT;

use nalgebra::SVector;

#[allow(dead_code)]
pub type V<FT, const D: usize> = SVector<FT, D>;

pub type VF<const D: usize> = V<FT, D>;
pub type VI<const D: usize> = V<IT, D>;

pub type V1 = V<FT, 1>;
pub type V2 = V<FT, 2>;

pub fn vec1f(x: FT) -> V<FT, 1> {
    [x].into()
}

pub fn vec2f(x: FT, y: FT) -> V<FT, 2> {
    [x, y].into()
}

pub use simulation::*;
