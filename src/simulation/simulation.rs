use std::{
    collections::HashMap,
    fmt::{self, Display},
    marker::PhantomData,
    time::{Duration, Instant},
};

use num_traits::Float;

use crate::{
    error::{SimulationError, SimulationResult},
    floating_type_mod::FT,
    grid::{self, CellGrid},
    neighborhood_search,
    particles::ParticleVec,
    simulation_parameters::{ResolvedParams, SimulationParams},
    sph_kernels::{DimensionUtils, SphKernel},
};

#[derive(Clone)]
struct Counter {
    values: Vec<Duration>,
    last_start: Instant,
}

impl Counter {
    fn new() -> Self {
        Counter {
            last_start: Instant::now(),
            values: Vec::new(),
        }
    }

    fn begin(&mut self) {
        self.last_start = Instant::now();
    }

    fn end(&mut self) -> Duration {
        let duration = Instant::now() - self.last_start;
        self.values.push(duration);
        duration
    }

    fn sum(&self) -> Duration {
        self.values.iter().cloned().sum::<Duration>()
    }

    fn avg(&self) -> Duration {
        if self.values.is_empty() {
            return Duration::ZERO;
        }
        self.sum() / self.values.len() as u32
    }
}

/// Wall clock time spent in each stage.
pub struct PerformanceCounters {
    counters: HashMap<String, Counter>,
}

impl PerformanceCounters {
    fn new() -> PerformanceCounters {
        PerformanceCounters {
            counters: HashMap::new(),
        }
    }

    fn begin(&mut self, id: &str) {
        self.counters
            .entry(id.to_string())
            .or_insert_with(Counter::new)
            .begin();
    }

    fn end(&mut self, id: &str) {
        if let Some(counter) = self.counters.get_mut(id) {
            let duration = counter.end();
            log::info!("{} took {:.3}ms", id, duration.as_secs_f64() * 1000.);
        }
    }

    /// Total time spent in stage `id`.
    pub fn total(&self, id: &str) -> Option<Duration> {
        self.counters.get(id).map(Counter::sum)
    }
}

impl Display for PerformanceCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut v = self.counters.iter().collect::<Vec<_>>();
        v.sort_by(|x, y| x.0.cmp(y.0));
        for (label, counter) in v {
            writeln!(
                f,
                "{}: runs:{} avg:{:.3}ms total:{:.3}ms",
                label,
                counter.values.len(),
                counter.avg().as_secs_f64() * 1000.,
                counter.sum().as_secs_f64() * 1000.
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxMean {
    pub min: FT,
    pub max: FT,
    pub mean: FT,
}

impl MinMaxMean {
    fn from_values(values: impl Iterator<Item = FT>) -> Option<MinMaxMean> {
        let mut count = 0;
        let mut min = FT::MAX;
        let mut max = FT::MIN;
        let mut sum = 0.;
        for value in values {
            count += 1;
            min = FT::min(min, value);
            max = FT::max(max, value);
            sum += value;
        }
        if count == 0 {
            return None;
        }
        Some(MinMaxMean {
            min,
            max,
            mean: sum / count as FT,
        })
    }
}

impl Display for MinMaxMean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "min:{:.5} max:{:.5} mean:{:.5}", self.min, self.max, self.mean)
    }
}

/// Distribution of the per-particle results after solving the smoothing lengths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryStatistics {
    pub smoothing_length: MinMaxMean,
    pub density: MinMaxMean,
    pub neighbor_count: MinMaxMean,
}

impl Display for SummaryStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "h:         {}", self.smoothing_length)?;
        writeln!(f, "density:   {}", self.density)?;
        write!(f, "neighbors: {}", self.neighbor_count)
    }
}

/**
 * Owns the particles together with the cell grid and runs the core stages on them.
 *
 * `K` is the kernel, `DU` and `D` select the dimension.
 */
pub struct FluidSimulation<K: SphKernel<D>, DU: DimensionUtils<D>, const D: usize> {
    params: ResolvedParams,
    particles: ParticleVec<D>,
    grid: Option<CellGrid<D>>,

    pub pcounters: PerformanceCounters,

    marker: PhantomData<fn() -> (K, DU)>,
}

impl<K: SphKernel<D>, DU: DimensionUtils<D>, const D: usize> FluidSimulation<K, DU, D> {
    pub fn new(params: &SimulationParams, particles: ParticleVec<D>) -> SimulationResult<Self> {
        let params = params.resolve::<K, DU, D>(particles.len())?;

        log::info!(
            "{} particles, {}D, kernel {}, boundary {:?}, nngb {:.3}, eta {:.4}",
            params.num_particles,
            D,
            K::name(),
            params.boundary,
            params.nngb,
            params.eta
        );

        Ok(FluidSimulation {
            params,
            particles,
            grid: None,
            pcounters: PerformanceCounters::new(),
            marker: PhantomData,
        })
    }

    pub fn params(&self) -> &ResolvedParams {
        &self.params
    }

    pub fn particles(&self) -> &ParticleVec<D> {
        &self.particles
    }

    pub fn grid(&self) -> Option<&CellGrid<D>> {
        self.grid.as_ref()
    }

    /// Builds the cell grid for the current particle positions.
    pub fn build_grid(&mut self) -> SimulationResult<&CellGrid<D>> {
        self.pcounters.begin("grid");
        let grid = grid::build_grid::<DU, D>(&self.params, &self.particles.position, &self.particles.id);
        self.pcounters.end("grid");

        Ok(self.grid.insert(grid?))
    }

    /**
     * Solves smoothing length, density and neighbor list of every particle.
     *
     * Builds the grid first if there is none yet.
     */
    pub fn compute_smoothing_lengths(&mut self) -> SimulationResult<()> {
        if self.grid.is_none() {
            self.build_grid()?;
        }
        let grid = match self.grid.as_ref() {
            Some(grid) => grid,
            None => return Err(SimulationError::config("no grid available")),
        };

        self.pcounters.begin("smoothing-length");
        let result =
            neighborhood_search::compute_smoothing_lengths::<K, DU, D>(&self.params, grid, &mut self.particles);
        self.pcounters.end("smoothing-length");

        result
    }

    /// `None` if there are no particles.
    pub fn statistics(&self) -> Option<SummaryStatistics> {
        let particles = &self.particles;
        Some(SummaryStatistics {
            smoothing_length: MinMaxMean::from_values(particles.h.iter().copied())?,
            density: MinMaxMean::from_values(particles.prim.iter().map(|p| p.density))?,
            neighbor_count: MinMaxMean::from_values(particles.neighbors.iter().map(|n| n.len() as FT))?,
        })
    }
}

pub fn is_ft_approx_eq<FT: Float>(a: FT, b: FT, tolerance: FT) -> bool {
    assert!(!a.is_nan());
    assert!(!b.is_nan());
    b <= a + tolerance && b >= a - tolerance
}

pub fn assert_ft_approx_eq<FT: Float + Display>(a: FT, b: FT, tolerance: FT, s: impl FnOnce() -> String) {
    if !is_ft_approx_eq(a, b, tolerance) {
        panic!(
            "{} value not equal with a tolerance of {}:\n\ta={}\n\tb={}\n",
            s(),
            tolerance,
            a,
            b
        );
    }
}
