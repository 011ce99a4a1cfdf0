use crate::boundary::BoundaryMethod;
use crate::geometry::{Axis, Side, Vector3d};
use crate::program::include;
use super::{Equation, reflect_if, scalar_dissipation_basis};

static STATE_NAMES: [&str; 5] = ["D", "S x", "S y", "S z", "tau"];

const MAX_ITERATIONS: usize = 100;
const SOLVE_EPSILON: f64 = 1e-10;
const PRESSURE_FLOOR: f64 = 1e-14;




/**
 * Primitive state of a relativistic ideal gas: rest mass density,
 * three-velocity, and pressure
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Primitive {
    pub density: f64,
    pub velocity: Vector3d,
    pub pressure: f64,
}




// ============================================================================
impl Primitive {

    pub fn lorentz_factor(&self) -> f64 {
        1.0 / (1.0 - self.velocity.norm_squared()).sqrt()
    }

    pub fn specific_enthalpy(&self, gamma: f64) -> f64 {
        1.0 + gamma / (gamma - 1.0) * self.pressure / self.density
    }

    pub fn sound_speed_squared(&self, gamma: f64) -> f64 {
        gamma * self.pressure / (self.density * self.specific_enthalpy(gamma))
    }

    pub fn to_conserved(&self, gamma: f64, q: &mut [f64]) {
        let w = self.lorentz_factor();
        let h = self.specific_enthalpy(gamma);
        let d = self.density * w;
        let rhw2 = self.density * h * w * w;
        q[0] = d;
        q[1] = rhw2 * self.velocity.0;
        q[2] = rhw2 * self.velocity.1;
        q[3] = rhw2 * self.velocity.2;
        q[4] = rhw2 - self.pressure - d;
    }

    /**
     * Recover the primitive state by Newton iteration on the pressure.
     * Returns `None` if the iteration fails to converge or produces an
     * unphysical state.
     */
    pub fn from_conserved(q: &[f64], gamma: f64) -> Option<Self> {
        let d = q[0];
        let s = Vector3d::from_slice(&q[1..4]);
        let tau = q[4];
        let s2 = s.norm_squared();

        if !(d > 0.0) || !(tau + d > 0.0) {
            return None;
        }
        let p_min = (s2.sqrt() - tau - d).max(PRESSURE_FLOOR);
        let mut p = ((gamma - 1.0) * tau).max(p_min);

        for _ in 0..MAX_ITERATIONS {
            let denom = tau + d + p;
            let v2 = s2 / (denom * denom);
            if !(v2 < 1.0) {
                return None;
            }
            let w = 1.0 / (1.0 - v2).sqrt();
            let rho = d / w;
            let eps = (tau + d * (1.0 - w) + p * (1.0 - w * w)) / (d * w);
            let f = (gamma - 1.0) * rho * eps - p;
            let cs2 = gamma * (gamma - 1.0) * eps / (1.0 + gamma * eps);
            let df = v2 * cs2 - 1.0;
            let p_new = (p - f / df).max(PRESSURE_FLOOR);

            if !p_new.is_finite() {
                return None;
            }
            if (p_new - p).abs() <= SOLVE_EPSILON * p_new.max(1.0) {
                let denom = tau + d + p_new;
                let velocity = Vector3d::new(s.0 / denom, s.1 / denom, s.2 / denom);
                let w = 1.0 / (1.0 - velocity.norm_squared()).sqrt();
                return Some(Self { density: d / w, velocity, pressure: p_new });
            }
            p = p_new;
        }
        None
    }

    /**
     * The relativistic acoustic wave speeds along an axis, slowest first.
     */
    pub fn wavespeeds(&self, axis: Axis, gamma: f64) -> (f64, f64) {
        let cs2 = self.sound_speed_squared(gamma);
        let cs = cs2.sqrt();
        let v2 = self.velocity.norm_squared();
        let vn = self.velocity.component(axis);
        let root = ((1.0 - v2) * (1.0 - v2 * cs2 - vn * vn * (1.0 - cs2))).max(0.0).sqrt();
        let denom = 1.0 - v2 * cs2;
        let lm = (vn * (1.0 - cs2) - cs * root) / denom;
        let lp = (vn * (1.0 - cs2) + cs * root) / denom;
        (lm.max(-1.0), lp.min(1.0))
    }
}




/**
 * Special relativistic hydrodynamics in units where c = 1
 */
pub struct Srhd {
    gamma_law_index: f64,
    boundary_methods: [[BoundaryMethod; 2]; 3],
}




// ============================================================================
impl Srhd {
    pub fn new(gamma_law_index: f64, boundary_methods: [[BoundaryMethod; 2]; 3]) -> Self {
        Self { gamma_law_index, boundary_methods }
    }

    fn max_speed(&self, p: &Primitive, axis: Axis) -> f64 {
        let (lm, lp) = p.wavespeeds(axis, self.gamma_law_index);
        lm.abs().max(lp.abs())
    }
}




// ============================================================================
impl Equation for Srhd {

    fn name(&self) -> &'static str {
        "SRHD"
    }

    fn state_names(&self) -> &[&'static str] {
        &STATE_NAMES
    }

    fn num_primitives(&self) -> usize {
        5
    }

    /**
     * Primitives are (density, vx, vy, vz, pressure), with |v| < 1.
     */
    fn read_state_cell(&self, cons: &mut [f64], prim: &[f64]) {
        Primitive {
            density: prim[0],
            velocity: Vector3d::from_slice(&prim[1..4]),
            pressure: prim[4],
        }
        .to_conserved(self.gamma_law_index, cons)
    }

    fn boundary_kernel_for(&self, axis: Axis, channel: usize, side: Side) -> Option<BoundaryMethod> {
        let method = self.boundary_methods[axis.index()][side.index()];
        Some(reflect_if(method, channel == 1 + axis.index()))
    }

    fn device_source_fragments(&self) -> Vec<String> {
        vec![include("SRHD.cl")]
    }

    fn flux(&self, q: &[f64], axis: Axis, f: &mut [f64]) {
        let (vn, p) = match Primitive::from_conserved(q, self.gamma_law_index) {
            Some(prim) => (prim.velocity.component(axis), prim.pressure),
            None => (q[1 + axis.index()] / (q[4] + q[0]), 0.0),
        };
        f[0] = q[0] * vn;
        for (j, dir) in Axis::ALL.into_iter().enumerate() {
            f[1 + j] = q[1 + j] * vn + p * axis.along(dir);
        }
        f[4] = q[1 + axis.index()] - q[0] * vn;
    }

    fn max_wave_speed(&self, q: &[f64], axis: Axis) -> f64 {
        Primitive::from_conserved(q, self.gamma_law_index)
            .map_or(1.0, |p| self.max_speed(&p, axis))
    }

    fn calc_eigen_basis(&self, ql: &[f64], qr: &[f64], axis: Axis, values: &mut [f64], transform: &mut [f64]) -> bool {
        let gamma = self.gamma_law_index;

        match (Primitive::from_conserved(ql, gamma), Primitive::from_conserved(qr, gamma)) {
            (Some(pl), Some(pr)) => {
                let speed = self.max_speed(&pl, axis).max(self.max_speed(&pr, axis));
                scalar_dissipation_basis(speed, values, transform)
            }
            _ => false,
        }
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn primitive_recovery_round_trips() {
        let srhd = Srhd::new(5.0 / 3.0, [[BoundaryMethod::FreeFlow; 2]; 3]);
        let cases = [
            [1.0, 0.0, 0.0, 0.0, 1.0],
            [1.0, 0.5, 0.1, 0.0, 1.0],
            [0.125, -0.3, 0.0, 0.4, 0.1],
            [10.0, 0.9, 0.0, 0.0, 13.33],
        ];
        for prim in cases {
            let mut q = [0.0; 5];
            srhd.read_state_cell(&mut q, &prim);
            let p = Primitive::from_conserved(&q, 5.0 / 3.0).unwrap();
            assert!((p.density - prim[0]).abs() < 1e-8 * prim[0]);
            assert!((p.velocity.0 - prim[1]).abs() < 1e-8);
            assert!((p.velocity.2 - prim[3]).abs() < 1e-8);
            assert!((p.pressure - prim[4]).abs() < 1e-8 * prim[4]);
        }
    }

    #[test]
    fn wave_speeds_are_subluminal() {
        let p = Primitive { density: 1.0, velocity: Vector3d::new(0.99, 0.0, 0.0), pressure: 100.0 };
        let (lm, lp) = p.wavespeeds(Axis::X, 4.0 / 3.0);
        assert!(lm > -1.0 && lm < lp && lp < 1.0);
    }

    #[test]
    fn unphysical_state_is_degenerate() {
        let srhd = Srhd::new(5.0 / 3.0, [[BoundaryMethod::FreeFlow; 2]; 3]);
        let q = [1.0, 0.5, 0.0, 0.0, -2.0];
        let mut values = [0.0; 5];
        let mut transform = [0.0; 1];
        assert!(!srhd.calc_eigen_basis(&q, &q, Axis::X, &mut values, &mut transform));
        assert_eq!(srhd.max_wave_speed(&q, Axis::X), 1.0);
    }
}
