use crate::boundary::BoundaryMethod;
use crate::geometry::{Axis, Side};
use crate::scheme::MAX_STATES;

pub mod adm3d;
pub mod euler;
pub mod maxwell;
pub mod mhd;
pub mod srhd;




/**
 * Channel indexes of the fluid quantities, for equations which have them.
 * Used by the schemes and auxiliary solvers which act on the fluid
 * directly: Burgers splitting, self-gravity, and divergence cleaning.
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FluidLayout {
    pub density: usize,
    pub momentum: [usize; 3],
    pub energy: usize,
    pub magnetic: Option<[usize; 3]>,
    pub gamma: f64,
}




// ============================================================================
impl FluidLayout {

    pub fn velocity(&self, q: &[f64]) -> [f64; 3] {
        let rho = q[self.density];
        [q[self.momentum[0]] / rho, q[self.momentum[1]] / rho, q[self.momentum[2]] / rho]
    }

    pub fn magnetic_field(&self, q: &[f64]) -> [f64; 3] {
        match self.magnetic {
            Some(b) => [q[b[0]], q[b[1]], q[b[2]]],
            None => [0.0; 3],
        }
    }

    /**
     * Gas pressure and magnetic pressure of a conserved state.
     */
    pub fn pressures(&self, q: &[f64]) -> (f64, f64) {
        let rho = q[self.density];
        let m = self.momentum.map(|i| q[i]);
        let b = self.magnetic_field(q);
        let ek = 0.5 * (m[0] * m[0] + m[1] * m[1] + m[2] * m[2]) / rho;
        let eb = 0.5 * (b[0] * b[0] + b[1] * b[1] + b[2] * b[2]);
        ((self.gamma - 1.0) * (q[self.energy] - ek - eb), eb)
    }
}




/**
 * A system of conservation laws. An equation declares its state channels,
 * converts primitive initial data to conserved state, chooses boundary
 * kernels, names the program fragments it needs, and supplies the per-cell
 * physics evaluated by the scheme kernels.
 *
 * Eigen bases are stored per interface in compact form: `num_states`
 * eigenvalues followed by an equation-specific transform of
 * `eigen_transform_size()` reals, from which `eigen_left` and `eigen_right`
 * apply the left and right eigenvector matrices.
 */
pub trait Equation: Send + Sync {

    fn name(&self) -> &'static str;

    fn state_names(&self) -> &[&'static str];

    fn num_states(&self) -> usize {
        self.state_names().len()
    }

    /// Number of primitive values expected from the initial condition.
    fn num_primitives(&self) -> usize;

    fn read_state_cell(&self, cons: &mut [f64], prim: &[f64]);

    /**
     * The boundary kernel to apply to the given channel on one face, or
     * `None` if the channel has no boundary condition.
     */
    fn boundary_kernel_for(&self, axis: Axis, channel: usize, side: Side) -> Option<BoundaryMethod>;

    fn device_source_fragments(&self) -> Vec<String>;

    fn flux(&self, q: &[f64], axis: Axis, f: &mut [f64]);

    fn max_wave_speed(&self, q: &[f64], axis: Axis) -> f64;

    fn eigen_transform_size(&self) -> usize {
        1
    }

    /**
     * Compute the eigenvalues and eigen transform at the interface between
     * `ql` and `qr`. Returns false if no valid basis exists there.
     */
    fn calc_eigen_basis(&self, ql: &[f64], qr: &[f64], axis: Axis, values: &mut [f64], transform: &mut [f64]) -> bool;

    /// Project a state-space vector onto the characteristic fields.
    fn eigen_left(&self, _transform: &[f64], _axis: Axis, x: &[f64], y: &mut [f64]) {
        y.copy_from_slice(x)
    }

    /// Recompose a state-space vector from characteristic fields.
    fn eigen_right(&self, _transform: &[f64], _axis: Axis, x: &[f64], y: &mut [f64]) {
        y.copy_from_slice(x)
    }

    /**
     * The interface flux used where the eigen basis is degenerate. The
     * default is the local Lax-Friedrichs (Rusanov) flux.
     */
    fn degenerate_flux(&self, ql: &[f64], qr: &[f64], axis: Axis, f: &mut [f64]) {
        rusanov_flux(self, ql, qr, axis, f)
    }

    fn has_source(&self) -> bool {
        false
    }

    /// Write the source term for one cell. Only called if `has_source`.
    fn source(&self, _q: &[f64], _deriv: &mut [f64]) {}

    fn has_constraints(&self) -> bool {
        false
    }

    /// Re-impose algebraic constraints on one cell.
    fn constrain(&self, _q: &mut [f64]) {}

    fn fluid_layout(&self) -> Option<FluidLayout> {
        None
    }
}




// ============================================================================
pub fn rusanov_flux<E: Equation + ?Sized>(equation: &E, ql: &[f64], qr: &[f64], axis: Axis, f: &mut [f64]) {
    let n = ql.len();
    let mut fl = [0.0; MAX_STATES];
    let mut fr = [0.0; MAX_STATES];
    equation.flux(ql, axis, &mut fl[..n]);
    equation.flux(qr, axis, &mut fr[..n]);

    let a = equation.max_wave_speed(ql, axis).max(equation.max_wave_speed(qr, axis));

    for k in 0..n {
        f[k] = 0.5 * (fl[k] + fr[k]) - 0.5 * a * (qr[k] - ql[k]);
    }
}

/**
 * A mirror boundary applied to a vector component normal to the face
 * becomes a reflection.
 */
pub(crate) fn reflect_if(method: BoundaryMethod, condition: bool) -> BoundaryMethod {
    match method {
        BoundaryMethod::Mirror if condition => BoundaryMethod::Reflect,
        other => other,
    }
}

/**
 * Fill an identity-basis record: every eigenvalue is the largest signal
 * speed on either side of the interface.
 */
pub(crate) fn scalar_dissipation_basis(speed: f64, values: &mut [f64], transform: &mut [f64]) -> bool {
    values.iter_mut().for_each(|v| *v = speed);
    transform.iter_mut().for_each(|t| *t = 0.0);
    speed.is_finite()
}








// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::equation::euler::Euler;

    #[test]
    fn rusanov_flux_is_the_physical_flux_plus_wave_speed_dissipation() {
        let euler = Euler::new(1.4, [[BoundaryMethod::FreeFlow; 2]; 3]);
        let ql = [1.0, 0.5, 0.0, 0.0, 2.5];
        let qr = [0.125, 0.0, 0.0, 0.0, 0.25];
        let (mut fl, mut fr, mut f) = ([0.0; 5], [0.0; 5], [0.0; 5]);
        euler.flux(&ql, Axis::X, &mut fl);
        euler.flux(&qr, Axis::X, &mut fr);

        rusanov_flux(&euler, &ql, &ql, Axis::X, &mut f);
        assert_eq!(f, fl);

        rusanov_flux(&euler, &ql, &qr, Axis::X, &mut f);
        let a = euler.max_wave_speed(&ql, Axis::X).max(euler.max_wave_speed(&qr, Axis::X));
        for k in 0..5 {
            assert!((f[k] - (0.5 * (fl[k] + fr[k]) - 0.5 * a * (qr[k] - ql[k]))).abs() < 1e-14);
        }
    }
}
