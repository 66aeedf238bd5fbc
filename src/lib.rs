/*!
Particle hydrodynamics core.

Particles live in one flat struct-of-arrays (`ParticleVec`) and are
referenced by index everywhere. A regular cell grid is sized adaptively so
that every cell neighborhood holds enough particles, then every particle
gets a smoothing length, density and sorted neighbor list from a damped
Newton iteration.
*/

mod simulation;

pub use simulation::*;
