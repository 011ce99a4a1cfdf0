use crate::boundary::BoundaryMethod;
use crate::error::Error;
use crate::geometry::{Axis, Side, Vector3d};
use crate::program::include;
use super::{Equation, FluidLayout, reflect_if};

static STATE_NAMES: [&str; 5] = ["density", "momentum x", "momentum y", "momentum z", "energy"];
const DENSITY_FLOOR: f64 = 1e-12;




/**
 * Primitive gas state: density, velocity, and gas pressure
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Primitive {
    pub density: f64,
    pub velocity: Vector3d,
    pub pressure: f64,
}

/**
 * The Euler equations for an ideal gas with adiabatic index `gamma`
 */
pub struct Euler {
    gamma_law_index: f64,
    boundary_methods: [[BoundaryMethod; 2]; 3],
}




/// Gas pressure of a conserved Euler state; negative if the kinetic energy
/// exceeds the total.
pub fn gas_pressure(q: &[f64], gamma: f64) -> f64 {
    let momentum = Vector3d::from_slice(&q[1..4]);
    (gamma - 1.0) * (q[4] - 0.5 * momentum.norm_squared() / q[0])
}




// ============================================================================
impl Primitive {

    pub fn from_slice(prim: &[f64]) -> Self {
        Self {
            density: prim[0],
            velocity: Vector3d::from_slice(&prim[1..4]),
            pressure: prim[4],
        }
    }

    pub fn write_to_slice(&self, prim: &mut [f64]) {
        prim[0] = self.density;
        prim[1] = self.velocity.0;
        prim[2] = self.velocity.1;
        prim[3] = self.velocity.2;
        prim[4] = self.pressure;
    }

    pub fn from_conserved(q: &[f64], gamma: f64) -> Result<Self, Error> {
        let density = q[0];
        if !(density > 0.0) {
            return Err(Error::NegativeMassDensity(density));
        }
        let pressure = gas_pressure(q, gamma);
        if !(pressure >= 0.0) {
            return Err(Error::NegativeGasPressure(pressure));
        }
        let velocity = Vector3d::new(q[1] / density, q[2] / density, q[3] / density);
        Ok(Self { density, velocity, pressure })
    }

    pub fn to_conserved(&self, gamma: f64, q: &mut [f64]) {
        let d = self.density;
        let v = self.velocity;
        q[0] = d;
        q[1] = d * v.0;
        q[2] = d * v.1;
        q[3] = d * v.2;
        q[4] = 0.5 * d * v.norm_squared() + self.pressure / (gamma - 1.0);
    }

    pub fn sound_speed(&self, gamma: f64) -> f64 {
        (gamma * self.pressure / self.density).sqrt()
    }

    /// Physical flux of this state through a face normal to `axis`.
    pub fn flux(&self, axis: Axis, gamma: f64, f: &mut [f64]) {
        let vn = self.velocity.component(axis);
        self.to_conserved(gamma, f);

        for k in 0..5 {
            f[k] *= vn;
        }
        f[1 + axis.index()] += self.pressure;
        f[4] += self.pressure * vn;
    }
}




// ============================================================================
impl Euler {

    pub fn new(gamma_law_index: f64, boundary_methods: [[BoundaryMethod; 2]; 3]) -> Self {
        Self { gamma_law_index, boundary_methods }
    }

    pub fn gamma_law_index(&self) -> f64 {
        self.gamma_law_index
    }

    pub fn cons_to_prim(&self, cons: &[f64], prim: &mut [f64]) -> Result<(), Error> {
        Primitive::from_conserved(cons, self.gamma_law_index)?.write_to_slice(prim);
        Ok(())
    }

    pub fn prim_to_cons(&self, prim: &[f64], cons: &mut [f64]) {
        Primitive::from_slice(prim).to_conserved(self.gamma_law_index, cons)
    }

    /**
     * Primitive state for the fallback flux. Vacuum and negative pressure
     * are floored rather than rejected.
     */
    fn floored_primitive(&self, q: &[f64]) -> Primitive {
        Primitive::from_conserved(q, self.gamma_law_index).unwrap_or_else(|_| {
            let density = q[0].max(DENSITY_FLOOR);
            Primitive {
                density,
                velocity: Vector3d::new(q[1] / density, q[2] / density, q[3] / density),
                pressure: gas_pressure(q, self.gamma_law_index).max(0.0),
            }
        })
    }
}




// ============================================================================
impl Equation for Euler {

    fn name(&self) -> &'static str {
        "Euler"
    }

    fn state_names(&self) -> &[&'static str] {
        &STATE_NAMES
    }

    fn num_primitives(&self) -> usize {
        5
    }

    fn read_state_cell(&self, cons: &mut [f64], prim: &[f64]) {
        self.prim_to_cons(prim, cons)
    }

    fn boundary_kernel_for(&self, axis: Axis, channel: usize, side: Side) -> Option<BoundaryMethod> {
        let method = self.boundary_methods[axis.index()][side.index()];
        Some(reflect_if(method, channel == 1 + axis.index()))
    }

    fn device_source_fragments(&self) -> Vec<String> {
        vec![include("Euler.cl")]
    }

    fn flux(&self, q: &[f64], axis: Axis, f: &mut [f64]) {
        let p = gas_pressure(q, self.gamma_law_index);
        let vn = q[1 + axis.index()] / q[0];

        for k in 0..5 {
            f[k] = q[k] * vn;
        }
        f[1 + axis.index()] += p;
        f[4] += p * vn;
    }

    fn max_wave_speed(&self, q: &[f64], axis: Axis) -> f64 {
        let p = gas_pressure(q, self.gamma_law_index).max(0.0);
        let cs = (self.gamma_law_index * p / q[0]).sqrt();
        (q[1 + axis.index()] / q[0]).abs() + cs
    }

    fn eigen_transform_size(&self) -> usize {
        5
    }

    /**
     * Roe-averaged eigen basis. The transform holds the averaged velocity,
     * enthalpy, and sound speed: (vx, vy, vz, H, c).
     */
    fn calc_eigen_basis(&self, ql: &[f64], qr: &[f64], axis: Axis, values: &mut [f64], transform: &mut [f64]) -> bool {
        let gamma = self.gamma_law_index;

        let (pl, pr) = match (Primitive::from_conserved(ql, gamma), Primitive::from_conserved(qr, gamma)) {
            (Ok(pl), Ok(pr)) => (pl, pr),
            _ => return false,
        };
        let roe = RoeAverage::new(ql, &pl, qr, &pr, gamma);

        if !(roe.c > 0.0) || !roe.c.is_finite() {
            return false;
        }
        let u = roe.v.component(axis);

        values[0] = u - roe.c;
        values[1] = u;
        values[2] = u;
        values[3] = u;
        values[4] = u + roe.c;
        transform[..5].copy_from_slice(&[roe.v.0, roe.v.1, roe.v.2, roe.h, roe.c]);
        true
    }

    fn eigen_left(&self, transform: &[f64], axis: Axis, x: &[f64], y: &mut [f64]) {
        let basis = RotatedBasis::new(transform, axis, self.gamma_law_index);
        let (u, v, w, c) = (basis.u, basis.v, basis.w, basis.c);
        let (b1, b2) = (basis.b1, basis.b2);
        let [x0, xn, x1, x2, x4] = basis.rotate(x);

        y[0] = 0.5 * ((b2 + u / c) * x0 - (b1 * u + 1.0 / c) * xn - b1 * v * x1 - b1 * w * x2 + b1 * x4);
        y[1] = (1.0 - b2) * x0 + b1 * u * xn + b1 * v * x1 + b1 * w * x2 - b1 * x4;
        y[2] = -v * x0 + x1;
        y[3] = -w * x0 + x2;
        y[4] = 0.5 * ((b2 - u / c) * x0 - (b1 * u - 1.0 / c) * xn - b1 * v * x1 - b1 * w * x2 + b1 * x4);
    }

    fn eigen_right(&self, transform: &[f64], axis: Axis, x: &[f64], y: &mut [f64]) {
        let basis = RotatedBasis::new(transform, axis, self.gamma_law_index);
        let (u, v, w, c, h) = (basis.u, basis.v, basis.w, basis.c, basis.h);
        let q2 = u * u + v * v + w * w;

        let rho = x[0] + x[1] + x[4];
        let mn = (u - c) * x[0] + u * x[1] + (u + c) * x[4];
        let m1 = v * (x[0] + x[1] + x[4]) + x[2];
        let m2 = w * (x[0] + x[1] + x[4]) + x[3];
        let e = (h - u * c) * x[0] + 0.5 * q2 * x[1] + v * x[2] + w * x[3] + (h + u * c) * x[4];

        basis.unrotate([rho, mn, m1, m2, e], y)
    }

    fn degenerate_flux(&self, ql: &[f64], qr: &[f64], axis: Axis, f: &mut [f64]) {
        let (pl, pr) = (self.floored_primitive(ql), self.floored_primitive(qr));
        hlle_flux(&pl, &pr, axis, self.gamma_law_index, f)
    }

    fn fluid_layout(&self) -> Option<FluidLayout> {
        Some(FluidLayout {
            density: 0,
            momentum: [1, 2, 3],
            energy: 4,
            magnetic: None,
            gamma: self.gamma_law_index,
        })
    }
}




/**
 * Roe averages of the velocity, enthalpy, and sound speed at an interface
 */
struct RoeAverage {
    v: Vector3d,
    h: f64,
    c: f64,
}

impl RoeAverage {
    fn new(ql: &[f64], pl: &Primitive, qr: &[f64], pr: &Primitive, gamma: f64) -> Self {
        let sl = pl.density.sqrt();
        let sr = pr.density.sqrt();
        let avg = |a: f64, b: f64| (sl * a + sr * b) / (sl + sr);

        let (vl, vr) = (pl.velocity, pr.velocity);
        let v = Vector3d::new(avg(vl.0, vr.0), avg(vl.1, vr.1), avg(vl.2, vr.2));
        let hl = (ql[4] + pl.pressure) / pl.density;
        let hr = (qr[4] + pr.pressure) / pr.density;
        let h = avg(hl, hr);
        let c = ((gamma - 1.0) * (h - 0.5 * v.norm_squared())).sqrt();

        Self { v, h, c }
    }
}




/**
 * An eigen transform expressed in the frame of one axis: normal velocity
 * `u` and transverse velocities `v`, `w`.
 */
struct RotatedBasis {
    axis: Axis,
    u: f64,
    v: f64,
    w: f64,
    h: f64,
    c: f64,
    b1: f64,
    b2: f64,
}

impl RotatedBasis {
    fn new(transform: &[f64], axis: Axis, gamma: f64) -> Self {
        let vel = Vector3d::from_slice(&transform[..3]);
        let (t1, t2) = axis.transverse();
        let (u, v, w) = (vel.component(axis), vel.component(t1), vel.component(t2));
        let (h, c) = (transform[3], transform[4]);
        let b1 = (gamma - 1.0) / (c * c);
        let b2 = 0.5 * b1 * (u * u + v * v + w * w);
        Self { axis, u, v, w, h, c, b1, b2 }
    }

    /// Reorder a conserved vector as (density, normal, t1, t2, energy).
    fn rotate(&self, x: &[f64]) -> [f64; 5] {
        let (t1, t2) = self.axis.transverse();
        [x[0], x[1 + self.axis.index()], x[1 + t1.index()], x[1 + t2.index()], x[4]]
    }

    fn unrotate(&self, r: [f64; 5], y: &mut [f64]) {
        let (t1, t2) = self.axis.transverse();
        y[0] = r[0];
        y[1 + self.axis.index()] = r[1];
        y[1 + t1.index()] = r[2];
        y[1 + t2.index()] = r[3];
        y[4] = r[4];
    }
}




/**
 * The HLLE flux between two primitive states, bounded by the fastest
 * acoustic signals on either side.
 */
pub fn hlle_flux(pl: &Primitive, pr: &Primitive, axis: Axis, gamma: f64, f: &mut [f64]) {
    let (mut ul, mut ur) = ([0.0; 5], [0.0; 5]);
    let (mut fl, mut fr) = ([0.0; 5], [0.0; 5]);
    pl.to_conserved(gamma, &mut ul);
    pr.to_conserved(gamma, &mut ur);
    pl.flux(axis, gamma, &mut fl);
    pr.flux(axis, gamma, &mut fr);

    let (vl, vr) = (pl.velocity.component(axis), pr.velocity.component(axis));
    let (cl, cr) = (pl.sound_speed(gamma), pr.sound_speed(gamma));
    let ap = (vl + cl).max(vr + cr).max(0.0);
    let am = (vl - cl).min(vr - cr).min(0.0);

    for k in 0..5 {
        f[k] = if ap > am {
            (ap * fl[k] - am * fr[k] + ap * am * (ur[k] - ul[k])) / (ap - am)
        } else {
            0.5 * (fl[k] + fr[k])
        };
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::equation::test_support::assert_left_right_inverse;

    fn euler() -> Euler {
        Euler::new(1.4, [[BoundaryMethod::FreeFlow; 2]; 3])
    }

    fn cons(prim: [f64; 5]) -> Vec<f64> {
        let mut q = vec![0.0; 5];
        euler().read_state_cell(&mut q, &prim);
        q
    }

    #[test]
    fn left_and_right_eigenvectors_are_inverses() {
        let ql = cons([1.0, 0.3, -0.2, 0.1, 1.0]);
        let qr = cons([0.125, -0.1, 0.4, 0.2, 0.1]);
        for axis in Axis::ALL {
            assert_left_right_inverse(&euler(), &ql, &qr, axis);
        }
    }

    #[test]
    fn eigen_basis_diagonalizes_the_jacobian_of_a_uniform_state() {
        let q = cons([1.2, 0.4, 0.3, -0.5, 0.9]);
        let e = euler();
        let axis = Axis::Y;
        let mut values = [0.0; 5];
        let mut transform = [0.0; 5];
        assert!(e.calc_eigen_basis(&q, &q, axis, &mut values, &mut transform));

        // A dq ~ (F(q + h dq) - F(q)) / h, compared with R diag(lambda) L dq
        let dq = [0.01, -0.02, 0.015, 0.005, 0.03];
        let h = 1e-6;
        let qh: Vec<f64> = q.iter().zip(&dq).map(|(a, b)| a + h * b).collect();
        let (mut f0, mut f1) = ([0.0; 5], [0.0; 5]);
        e.flux(&q, axis, &mut f0);
        e.flux(&qh, axis, &mut f1);

        let mut y = [0.0; 5];
        let mut z = [0.0; 5];
        e.eigen_left(&transform, axis, &dq, &mut y);
        for k in 0..5 {
            y[k] *= values[k];
        }
        e.eigen_right(&transform, axis, &y, &mut z);

        for k in 0..5 {
            assert!(((f1[k] - f0[k]) / h - z[k]).abs() < 1e-5);
        }
    }

    #[test]
    fn negative_pressure_gives_a_degenerate_basis() {
        let ql = cons([1.0, 0.0, 0.0, 0.0, 1.0]);
        let qr = [1.0, 10.0, 0.0, 0.0, 1.0];
        let mut values = [0.0; 5];
        let mut transform = [0.0; 5];
        assert!(!euler().calc_eigen_basis(&ql, &qr, Axis::X, &mut values, &mut transform));
        assert!(matches!(Primitive::from_conserved(&qr, 1.4), Err(Error::NegativeGasPressure(_))));
    }

    #[test]
    fn hlle_flux_of_a_uniform_state_is_the_physical_flux() {
        let q = cons([1.0, 0.5, 0.0, 0.0, 1.0]);
        let mut f = [0.0; 5];
        let mut g = [0.0; 5];
        euler().degenerate_flux(&q, &q, Axis::X, &mut f);
        euler().flux(&q, Axis::X, &mut g);
        for k in 0..5 {
            assert!((f[k] - g[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn hlle_flux_is_upwind_in_supersonic_flow() {
        let pl = Primitive::from_slice(&[1.0, 3.0, 0.0, 0.0, 1.0]);
        let pr = Primitive::from_slice(&[0.5, 3.0, 0.1, 0.0, 0.5]);
        let (mut f, mut fl) = ([0.0; 5], [0.0; 5]);
        hlle_flux(&pl, &pr, Axis::X, 1.4, &mut f);
        pl.flux(Axis::X, 1.4, &mut fl);
        for k in 0..5 {
            assert!((f[k] - fl[k]).abs() < 1e-12);
        }
    }

    #[test]
    fn mirror_boundaries_reflect_the_normal_momentum() {
        let e = Euler::new(1.4, [[BoundaryMethod::Mirror; 2]; 3]);
        assert_eq!(e.boundary_kernel_for(Axis::Y, 2, Side::Max), Some(BoundaryMethod::Reflect));
        assert_eq!(e.boundary_kernel_for(Axis::Y, 1, Side::Max), Some(BoundaryMethod::Mirror));
        assert_eq!(e.boundary_kernel_for(Axis::X, 4, Side::Min), Some(BoundaryMethod::Mirror));
    }
}
