use crate::boundary::BoundaryMethod;
use crate::geometry::{Axis, Side};
use crate::program::include;
use super::Equation;

static STATE_NAMES: [&str; 9] = [
    "electric x",
    "electric y",
    "electric z",
    "magnetic x",
    "magnetic y",
    "magnetic z",
    "permittivity",
    "permeability",
    "conductivity",
];

const E: usize = 0;
const B: usize = 3;
const EPSILON: usize = 6;
const MU: usize = 7;
const SIGMA: usize = 8;




/**
 * Maxwell's equations in a linear, possibly conducting, medium. The medium
 * is stored per cell in the last three channels and is not evolved.
 *
 * Along an axis n with transverse axes (t1, t2), the fields couple in two
 * pairs, (E_t1, B_t2) and (E_t2, B_t1), each carrying waves at -c and +c,
 * where c^2 = 1 / (permittivity * permeability). The remaining five
 * characteristic fields are stationary.
 */
pub struct Maxwell {
    boundary_methods: [[BoundaryMethod; 2]; 3],
}




// ============================================================================
impl Maxwell {
    pub fn new(boundary_methods: [[BoundaryMethod; 2]; 3]) -> Self {
        Self { boundary_methods }
    }

    fn light_speed(q: &[f64]) -> f64 {
        1.0 / (q[EPSILON] * q[MU]).sqrt()
    }
}




// ============================================================================
impl Equation for Maxwell {

    fn name(&self) -> &'static str {
        "Maxwell"
    }

    fn state_names(&self) -> &[&'static str] {
        &STATE_NAMES
    }

    fn num_primitives(&self) -> usize {
        9
    }

    fn read_state_cell(&self, cons: &mut [f64], prim: &[f64]) {
        cons[..9].copy_from_slice(&prim[..9])
    }

    fn boundary_kernel_for(&self, axis: Axis, channel: usize, side: Side) -> Option<BoundaryMethod> {
        let method = self.boundary_methods[axis.index()][side.index()];
        match channel {
            E..=2 => Some(super::reflect_if(method, channel != E + axis.index())),
            B..=5 => Some(super::reflect_if(method, channel == B + axis.index())),
            _ => None,
        }
    }

    fn device_source_fragments(&self) -> Vec<String> {
        vec![include("Maxwell.cl")]
    }

    fn flux(&self, q: &[f64], axis: Axis, f: &mut [f64]) {
        let (t1, t2) = axis.transverse();
        let (t1, t2) = (t1.index(), t2.index());
        let c2 = 1.0 / (q[EPSILON] * q[MU]);

        f.iter_mut().for_each(|x| *x = 0.0);
        f[E + t1] = c2 * q[B + t2];
        f[E + t2] = -c2 * q[B + t1];
        f[B + t1] = -q[E + t2];
        f[B + t2] = q[E + t1];
    }

    fn max_wave_speed(&self, q: &[f64], _axis: Axis) -> f64 {
        Self::light_speed(q)
    }

    fn calc_eigen_basis(&self, ql: &[f64], qr: &[f64], _axis: Axis, values: &mut [f64], transform: &mut [f64]) -> bool {
        let c = 0.5 * (Self::light_speed(ql) + Self::light_speed(qr));
        values.iter_mut().for_each(|v| *v = 0.0);
        values[0] = -c;
        values[1] = c;
        values[2] = -c;
        values[3] = c;
        transform[0] = c;
        c.is_finite() && c > 0.0
    }

    fn eigen_left(&self, transform: &[f64], axis: Axis, x: &[f64], y: &mut [f64]) {
        let c = transform[0];
        let n = axis.index();
        let (t1, t2) = axis.transverse();
        let (t1, t2) = (t1.index(), t2.index());

        y[0] = -0.5 / c * x[E + t1] + 0.5 * x[B + t2];
        y[1] =  0.5 / c * x[E + t1] + 0.5 * x[B + t2];
        y[2] =  0.5 / c * x[E + t2] + 0.5 * x[B + t1];
        y[3] = -0.5 / c * x[E + t2] + 0.5 * x[B + t1];
        y[4] = x[E + n];
        y[5] = x[B + n];
        y[6..9].copy_from_slice(&x[6..9]);
    }

    fn eigen_right(&self, transform: &[f64], axis: Axis, x: &[f64], y: &mut [f64]) {
        let c = transform[0];
        let n = axis.index();
        let (t1, t2) = axis.transverse();
        let (t1, t2) = (t1.index(), t2.index());

        y[E + t1] = c * (x[1] - x[0]);
        y[B + t2] = x[0] + x[1];
        y[E + t2] = c * (x[2] - x[3]);
        y[B + t1] = x[2] + x[3];
        y[E + n] = x[4];
        y[B + n] = x[5];
        y[6..9].copy_from_slice(&x[6..9]);
    }

    fn has_source(&self) -> bool {
        true
    }

    /**
     * Ohmic decay of the electric field, dE/dt = -sigma / epsilon E.
     */
    fn source(&self, q: &[f64], deriv: &mut [f64]) {
        deriv.iter_mut().for_each(|x| *x = 0.0);
        let rate = q[SIGMA] / q[EPSILON];
        for j in 0..3 {
            deriv[E + j] = -rate * q[E + j];
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::equation::test_support::assert_left_right_inverse;

    fn cell(e: [f64; 3], b: [f64; 3]) -> [f64; 9] {
        [e[0], e[1], e[2], b[0], b[1], b[2], 2.0, 0.5, 0.1]
    }

    #[test]
    fn left_and_right_eigenvectors_are_inverses() {
        let q = cell([0.1, 0.2, 0.3], [0.4, 0.5, 0.6]);
        let m = Maxwell::new([[BoundaryMethod::Periodic; 2]; 3]);
        for axis in Axis::ALL {
            assert_left_right_inverse(&m, &q, &q, axis);
        }
    }

    #[test]
    fn eigen_basis_reproduces_the_flux_jacobian() {
        let m = Maxwell::new([[BoundaryMethod::Periodic; 2]; 3]);
        let q = cell([0.3, -0.7, 0.2], [1.1, 0.4, -0.5]);

        for axis in Axis::ALL {
            let mut values = [0.0; 9];
            let mut transform = [0.0; 1];
            assert!(m.calc_eigen_basis(&q, &q, axis, &mut values, &mut transform));

            // the flux is linear in the fields, so F(q) = A q
            let mut f = [0.0; 9];
            m.flux(&q, axis, &mut f);

            let mut y = [0.0; 9];
            let mut z = [0.0; 9];
            m.eigen_left(&transform, axis, &q, &mut y);
            for k in 0..9 {
                y[k] *= values[k];
            }
            m.eigen_right(&transform, axis, &y, &mut z);

            for k in 0..6 {
                assert!((z[k] - f[k]).abs() < 1e-12, "axis {:?} channel {}", axis, k);
            }
        }
    }

    #[test]
    fn conductivity_damps_the_electric_field() {
        let m = Maxwell::new([[BoundaryMethod::Periodic; 2]; 3]);
        let q = cell([1.0, 0.0, 0.0], [1.0, 0.0, 0.0]);
        let mut d = [1.0; 9];
        m.source(&q, &mut d);
        assert_eq!(d[0], -0.05);
        assert!(d[3..].iter().all(|&x| x == 0.0));
    }

    #[test]
    fn material_channels_have_no_boundary() {
        let m = Maxwell::new([[BoundaryMethod::Mirror; 2]; 3]);
        assert_eq!(m.boundary_kernel_for(Axis::X, 6, Side::Min), None);
        assert_eq!(m.boundary_kernel_for(Axis::X, 0, Side::Min), Some(BoundaryMethod::Mirror));
        assert_eq!(m.boundary_kernel_for(Axis::X, 1, Side::Min), Some(BoundaryMethod::Reflect));
        assert_eq!(m.boundary_kernel_for(Axis::X, 3, Side::Max), Some(BoundaryMethod::Reflect));
        assert_eq!(m.boundary_kernel_for(Axis::X, 4, Side::Max), Some(BoundaryMethod::Mirror));
    }
}
