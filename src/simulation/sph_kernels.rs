use serde::{Deserialize, Serialize};

use crate::{
    floating_type_mod::{FRAC_1_PI, FT, PI},
    VI,
};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum KernelType {
    CubicSpline,
    WendlandC2,
}

impl Default for KernelType {
    fn default() -> Self {
        KernelType::CubicSpline
    }
}

/**
 * Cubic spline shape on q = r/H in [0, 1], scaled by 2 compared to the
 * textbook form (1-q)^3 - 4(0.5-q)^3.
 */
pub fn cubic_kernel_unnormalized(q: FT) -> FT {
    if q < 0.5 {
        return 6. * (q * q * q - q * q) + 1.;
    } else if q < 1. {
        let v = 1. - q;
        return 2. * (v * v * v);
    } else {
        return 0.;
    }
}

pub fn cubic_kernel_unnormalized_deriv(q: FT) -> FT {
    if q < 0.5 {
        return 18. * q * q - 12. * q;
    } else if q < 1. {
        let v = 1. - q;
        return -6. * v * v;
    } else {
        return 0.;
    };
}

fn wendland_c2_1d_unnormalized(q: FT) -> FT {
    if q < 1. {
        let v = 1. - q;
        v * v * v * (1. + 3. * q)
    } else {
        0.
    }
}

fn wendland_c2_1d_unnormalized_deriv(q: FT) -> FT {
    if q < 1. {
        let v = 1. - q;
        -12. * q * v * v
    } else {
        0.
    }
}

fn wendland_c2_2d_unnormalized(q: FT) -> FT {
    if q < 1. {
        let v = 1. - q;
        let v2 = v * v;
        v2 * v2 * (1. + 4. * q)
    } else {
        0.
    }
}

fn wendland_c2_2d_unnormalized_deriv(q: FT) -> FT {
    if q < 1. {
        let v = 1. - q;
        -20. * q * v * v * v
    } else {
        0.
    }
}

/// `H^D` for the compact support radius `H`.
#[inline(always)]
fn support_volume_factor<const D: usize>(support_radius: FT) -> FT {
    support_radius.powi(D as i32)
}

/**
 * A smoothing kernel W(r, h) with compact support H = h * `support_radius_by_smoothing_length()`.
 *
 * The smoothing length solver only relies on W vanishing beyond H and on
 * `dw_dr` being the derivative of `w` with respect to r.
 */
// Sync is needed since we use this trait inside parallel iterators
pub trait SphKernel<const D: usize>: Sync {
    fn name() -> &'static str;

    fn norm() -> FT;

    /// H/h
    fn support_radius_by_smoothing_length() -> FT;

    fn w(r: FT, h: FT) -> FT;

    fn dw_dr(r: FT, h: FT) -> FT;

    fn support_radius(h: FT) -> FT {
        h * Self::support_radius_by_smoothing_length()
    }

    fn smoothing_length(support_radius: FT) -> FT {
        support_radius / Self::support_radius_by_smoothing_length()
    }
}

#[allow(dead_code)]
pub enum CubicSpline {}

impl SphKernel<1> for CubicSpline {
    fn name() -> &'static str {
        "cubic spline"
    }

    fn norm() -> FT {
        8. / 3.
    }

    fn support_radius_by_smoothing_length() -> FT {
        1.732051
    }

    fn w(r: FT, h: FT) -> FT {
        let big_h = <Self as SphKernel<1>>::support_radius(h);
        0.5 * <Self as SphKernel<1>>::norm() * cubic_kernel_unnormalized(r / big_h) / support_volume_factor::<1>(big_h)
    }

    fn dw_dr(r: FT, h: FT) -> FT {
        let big_h = <Self as SphKernel<1>>::support_radius(h);
        0.5 * <Self as SphKernel<1>>::norm() * cubic_kernel_unnormalized_deriv(r / big_h)
            / (big_h * support_volume_factor::<1>(big_h))
    }
}

impl SphKernel<2> for CubicSpline {
    fn name() -> &'static str {
        "cubic spline"
    }

    fn norm() -> FT {
        80. / (7. * PI)
    }

    fn support_radius_by_smoothing_length() -> FT {
        1.778002
    }

    fn w(r: FT, h: FT) -> FT {
        let big_h = <Self as SphKernel<2>>::support_radius(h);
        0.5 * <Self as SphKernel<2>>::norm() * cubic_kernel_unnormalized(r / big_h) / support_volume_factor::<2>(big_h)
    }

    fn dw_dr(r: FT, h: FT) -> FT {
        let big_h = <Self as SphKernel<2>>::support_radius(h);
        0.5 * <Self as SphKernel<2>>::norm() * cubic_kernel_unnormalized_deriv(r / big_h)
            / (big_h * support_volume_factor::<2>(big_h))
    }
}

#[allow(dead_code)]
pub enum WendlandC2 {}

impl SphKernel<1> for WendlandC2 {
    fn name() -> &'static str {
        "wendland C2"
    }

    fn norm() -> FT {
        5. / 4.
    }

    fn support_radius_by_smoothing_length() -> FT {
        1.620185
    }

    fn w(r: FT, h: FT) -> FT {
        let big_h = <Self as SphKernel<1>>::support_radius(h);
        <Self as SphKernel<1>>::norm() * wendland_c2_1d_unnormalized(r / big_h) / support_volume_factor::<1>(big_h)
    }

    fn dw_dr(r: FT, h: FT) -> FT {
        let big_h = <Self as SphKernel<1>>::support_radius(h);
        <Self as SphKernel<1>>::norm() * wendland_c2_1d_unnormalized_deriv(r / big_h)
            / (big_h * support_volume_factor::<1>(big_h))
    }
}

impl SphKernel<2> for WendlandC2 {
    fn name() -> &'static str {
        "wendland C2"
    }

    fn norm() -> FT {
        7. * FRAC_1_PI
    }

    fn support_radius_by_smoothing_length() -> FT {
        1.897367
    }

    fn w(r: FT, h: FT) -> FT {
        let big_h = <Self as SphKernel<2>>::support_radius(h);
        <Self as SphKernel<2>>::norm() * wendland_c2_2d_unnormalized(r / big_h) / support_volume_factor::<2>(big_h)
    }

    fn dw_dr(r: FT, h: FT) -> FT {
        let big_h = <Self as SphKernel<2>>::support_radius(h);
        <Self as SphKernel<2>>::norm() * wendland_c2_2d_unnormalized_deriv(r / big_h)
            / (big_h * support_volume_factor::<2>(big_h))
    }
}

// Sync is needed since we use this trait inside parallel iterators
pub trait DimensionUtils<const D: usize>: Sync {
    /// Calls `f` for every offset in `[-dist, dist]^D`, including the zero offset.
    fn iterate_grid_neighbors(dist: i32, f: impl FnMut(VI<D>));

    /// nx in 1D, nx^2 in 2D.
    fn num_cells(nx: usize) -> usize;

    /// Target neighbor count from the resolution parameter eta.
    fn neighbor_count_from_eta(eta: FT, support_radius_by_smoothing_length: FT) -> FT;

    fn eta_from_neighbor_count(nngb: FT, support_radius_by_smoothing_length: FT) -> FT;

    /// First guess for the cell size before the grid is adaptively coarsened.
    fn initial_cell_size(boxlen: FT, num_particles: usize, nngb: FT) -> FT;
}

#[allow(dead_code)]
pub enum DimensionUtils1d {}
impl DimensionUtils<1> for DimensionUtils1d {
    fn iterate_grid_neighbors(dist: i32, mut f: impl FnMut(VI<1>)) {
        for x in -dist..=dist {
            f([x].into());
        }
    }

    fn num_cells(nx: usize) -> usize {
        nx
    }

    fn neighbor_count_from_eta(eta: FT, support_radius_by_smoothing_length: FT) -> FT {
        2. * support_radius_by_smoothing_length * eta
    }

    fn eta_from_neighbor_count(nngb: FT, support_radius_by_smoothing_length: FT) -> FT {
        nngb * 0.5 / support_radius_by_smoothing_length
    }

    fn initial_cell_size(boxlen: FT, num_particles: usize, nngb: FT) -> FT {
        boxlen / num_particles as FT * nngb
    }
}

#[allow(dead_code)]
pub enum DimensionUtils2d {}
impl DimensionUtils<2> for DimensionUtils2d {
    fn iterate_grid_neighbors(dist: i32, mut f: impl FnMut(VI<2>)) {
        for y in -dist..=dist {
            for x in -dist..=dist {
                f([x, y].into());
            }
        }
    }

    fn num_cells(nx: usize) -> usize {
        nx * nx
    }

    fn neighbor_count_from_eta(eta: FT, support_radius_by_smoothing_length: FT) -> FT {
        let temp = support_radius_by_smoothing_length * eta;
        temp * temp * PI
    }

    fn eta_from_neighbor_count(nngb: FT, support_radius_by_smoothing_length: FT) -> FT {
        (nngb * FRAC_1_PI).sqrt() / support_radius_by_smoothing_length
    }

    fn initial_cell_size(boxlen: FT, num_particles: usize, nngb: FT) -> FT {
        boxlen / (num_particles as FT / nngb).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert_ft_approx_eq;

    fn kernel_1d_integration<K: SphKernel<1>>() {
        let h = 0.3;
        let support_radius = K::support_radius(h);
        let steps = 4000;
        let dr = 2. * support_radius / steps as FT;

        let mut integral: f64 = 0.;
        for i in 0..steps {
            let x = (i as FT + 0.5) * dr - support_radius;
            integral += (K::w(x.abs(), h) * dr) as f64;
        }
        let integral = integral as FT;

        println!("Integration of 1D {} kernel with h={:.2}: {}", K::name(), h, integral);
        assert_ft_approx_eq(integral, 1.0, 0.001, || format!("1D {} integral", K::name()));
    }

    fn kernel_2d_integration<K: SphKernel<2>>() {
        let h = 5.;
        let support_radius = K::support_radius(h);
        let grid_size = 200;
        let square_len = 2. * support_radius / grid_size as FT;
        let square_area = square_len * square_len;

        let mut integral: f64 = 0.;

        for y in 0..grid_size {
            for x in 0..grid_size {
                let px = (x as FT + 0.5) * square_len - support_radius;
                let py = (y as FT + 0.5) * square_len - support_radius;
                integral += (K::w((px * px + py * py).sqrt(), h) * square_area) as f64;
            }
        }
        let integral = integral as FT;

        println!("Integration of 2D {} kernel with h={:.2}: {}", K::name(), h, integral);
        assert_ft_approx_eq(integral, 1.0, 0.001, || format!("2D {} integral", K::name()));
    }

    fn kernel_derivative<K: SphKernel<D>, const D: usize>() {
        let h = 0.7;
        let support_radius = K::support_radius(h);
        let steps = 200;
        let diff = support_radius * 1e-3;

        for i in 1..steps {
            let r = i as FT / steps as FT * support_radius;
            let approx = (K::w(r + 0.5 * diff, h) - K::w(r - 0.5 * diff, h)) / diff;
            let analytical = K::dw_dr(r, h);
            // scale tolerance with the kernel magnitude at r=0
            let tolerance = 0.01 * K::w(0., h) / support_radius;
            assert_ft_approx_eq(analytical, approx, tolerance, || {
                format!("{}D {} derivative at r={}", D, K::name(), r)
            });
        }
    }

    #[test]
    fn cubic_spline_integrates_to_one() {
        kernel_1d_integration::<CubicSpline>();
        kernel_2d_integration::<CubicSpline>();
    }

    #[test]
    fn wendland_c2_integrates_to_one() {
        kernel_1d_integration::<WendlandC2>();
        kernel_2d_integration::<WendlandC2>();
    }

    #[test]
    fn kernel_derivatives_match_finite_differences() {
        kernel_derivative::<CubicSpline, 1>();
        kernel_derivative::<CubicSpline, 2>();
        kernel_derivative::<WendlandC2, 1>();
        kernel_derivative::<WendlandC2, 2>();
    }

    #[test]
    fn kernels_vanish_outside_support() {
        let h = 0.1;
        assert_eq!(<CubicSpline as SphKernel<1>>::w(<CubicSpline as SphKernel<1>>::support_radius(h), h), 0.);
        assert_eq!(<CubicSpline as SphKernel<2>>::w(1., h), 0.);
        assert_eq!(<WendlandC2 as SphKernel<1>>::w(1., h), 0.);
        assert_eq!(<WendlandC2 as SphKernel<2>>::dw_dr(1., h), 0.);
    }

    #[test]
    fn neighbor_count_and_eta_roundtrip() {
        fn inner<DU: DimensionUtils<D>, const D: usize>() {
            for nngb in [2., 4.5, 20., 100.] {
                let eta = DU::eta_from_neighbor_count(nngb, 1.778002);
                let nngb2 = DU::neighbor_count_from_eta(eta, 1.778002);
                assert_ft_approx_eq(nngb, nngb2, 0.0001 * nngb, || format!("nngb->eta->nngb ({}D)", D));
            }
        }

        inner::<DimensionUtils1d, 1>();
        inner::<DimensionUtils2d, 2>();
    }

    #[test]
    fn grid_neighbor_offsets() {
        let mut offsets1 = Vec::new();
        DimensionUtils1d::iterate_grid_neighbors(1, |o| offsets1.push(o[0]));
        assert_eq!(offsets1, vec![-1, 0, 1]);

        let mut count2 = 0;
        DimensionUtils2d::iterate_grid_neighbors(1, |_| count2 += 1);
        assert_eq!(count2, 9);
    }
}
