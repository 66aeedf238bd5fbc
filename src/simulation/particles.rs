use std::fmt::Write;

use nalgebra::zero;

use crate::{floating_type_mod::FT, VF};

/// Adiabatic index of the ideal gas.
pub const GAMMA: FT = 5. / 3.;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrimitiveState<const D: usize> {
    pub density: FT,
    pub velocity: VF<D>,
    pub pressure: FT,
}

impl<const D: usize> Default for PrimitiveState<D> {
    fn default() -> Self {
        PrimitiveState {
            density: 0.,
            velocity: zero(),
            pressure: 0.,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConservedState<const D: usize> {
    pub density: FT,
    pub momentum: VF<D>,
    pub energy: FT,
}

impl<const D: usize> Default for ConservedState<D> {
    fn default() -> Self {
        ConservedState {
            density: 0.,
            momentum: zero(),
            energy: 0.,
        }
    }
}

impl<const D: usize> ConservedState<D> {
    pub fn from_primitive(prim: &PrimitiveState<D>) -> Self {
        ConservedState {
            density: prim.density,
            momentum: prim.velocity * prim.density,
            energy: 0.5 * prim.density * prim.velocity.norm_squared() + prim.pressure / (GAMMA - 1.),
        }
    }
}

macro_rules! decl_particle_vec {
    (pub struct $struct_name:ident<const D: usize> { $(pub $field_name:ident: Vec<$field_type:ty> | $default_value:expr),*$(,)?  }) => {
        #[derive(Debug)]
        pub struct $struct_name<const D: usize> {
            $(
                pub $field_name : Vec<$field_type>,
            )*
        }

        impl<const D: usize> $struct_name<D> {
            pub fn default(len: usize) -> Self {
                Self {
                    $(
                        $field_name: (0..len).map(|_| $default_value).collect::<Vec<$field_type>>(),
                    )*
                }
            }

            fn check_lengths(&self, len: usize) -> bool {
                true $( && self.$field_name.len() == len )*
            }
        }
    }
}

decl_particle_vec! {
    pub struct ParticleVec<const D: usize> {
        // 1-based, never reset after construction
        pub id: Vec<usize> | 0,

        pub position: Vec<VF<D>> | zero(),
        pub velocity: Vec<VF<D>> | zero(),
        pub mass: Vec<FT> | 0.,

        // smoothing length
        pub h: Vec<FT> | 0.,

        pub prim: Vec<PrimitiveState<D>> | PrimitiveState::default(),
        pub cons: Vec<ConservedState<D>> | ConservedState::default(),

        // sorted by ascending distance, `neighbors[i][k]` has distance `neighbor_distances[i][k]`
        pub neighbors: Vec<Vec<usize>> | Vec::new(),
        pub neighbor_distances: Vec<Vec<FT>> | Vec::new(),
    }
}

impl<const D: usize> ParticleVec<D> {
    /// Particle array of `len` particles with ids `1..=len`.
    pub fn new(len: usize) -> Self {
        let mut particles = Self::default(len);
        for (i, id) in particles.id.iter_mut().enumerate() {
            *id = i + 1;
        }
        particles
    }

    pub fn len(&self) -> usize {
        debug_assert!(self.check_lengths(self.id.len()));
        self.id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human readable table of the particle properties.
    pub fn table(&self) -> String {
        let mut s = String::new();

        write!(s, "{:>5}", "ID").unwrap();
        for d in 0..D {
            write!(s, " {:>10}", format!("x{}", d)).unwrap();
        }
        write!(s, " {:>10} {:>10}", "m", "rho").unwrap();
        for d in 0..D {
            write!(s, " {:>10}", format!("u{}", d)).unwrap();
        }
        writeln!(s, " {:>10} {:>10} {:>6}", "p", "h", "nneigh").unwrap();

        for i in 0..self.len() {
            write!(s, "{:>5}", self.id[i]).unwrap();
            for d in 0..D {
                write!(s, " {:>10.5}", self.position[i][d]).unwrap();
            }
            write!(s, " {:>10.5} {:>10.5}", self.mass[i], self.prim[i].density).unwrap();
            for d in 0..D {
                write!(s, " {:>10.5}", self.prim[i].velocity[d]).unwrap();
            }
            writeln!(
                s,
                " {:>10.5} {:>10.5} {:>6}",
                self.prim[i].pressure,
                self.h[i],
                self.neighbors[i].len()
            )
            .unwrap();
        }

        s
    }
}
