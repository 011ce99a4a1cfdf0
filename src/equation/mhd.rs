use crate::boundary::BoundaryMethod;
use crate::error::Error;
use crate::geometry::{Axis, Side, Vector3d};
use crate::program::include;
use super::{Equation, FluidLayout, reflect_if, scalar_dissipation_basis};

static STATE_NAMES: [&str; 8] = [
    "density",
    "momentum x",
    "momentum y",
    "momentum z",
    "energy",
    "magnetic field x",
    "magnetic field y",
    "magnetic field z",
];




/**
 * Primitive MHD state: density, velocity, gas pressure, magnetic field
 */
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Primitive {
    pub density: f64,
    pub velocity: Vector3d,
    pub pressure: f64,
    pub magnetic_field: Vector3d,
}




// ============================================================================
impl Primitive {

    /**
     * Recover the primitive state from a conserved one. The total energy
     * includes the magnetic energy B^2 / 2.
     */
    pub fn from_conserved(q: &[f64], gamma: f64) -> Result<Self, Error> {
        let density = q[0];
        if !(density > 0.0) {
            return Err(Error::NegativeMassDensity(density));
        }
        let momentum = Vector3d::from_slice(&q[1..4]);
        let magnetic_field = Vector3d::from_slice(&q[5..8]);
        let velocity = Vector3d::new(momentum.0 / density, momentum.1 / density, momentum.2 / density);
        let pressure = (gamma - 1.0) * (q[4] - 0.5 * momentum.dot(&velocity) - 0.5 * magnetic_field.norm_squared());

        if !(pressure >= 0.0) {
            return Err(Error::NegativeGasPressure(pressure));
        }
        Ok(Self { density, velocity, pressure, magnetic_field })
    }

    pub fn to_conserved(&self, gamma: f64, q: &mut [f64]) {
        let d = self.density;
        let v = self.velocity;
        let b = self.magnetic_field;
        q[0] = d;
        q[1] = d * v.0;
        q[2] = d * v.1;
        q[3] = d * v.2;
        q[4] = 0.5 * d * v.norm_squared() + self.pressure / (gamma - 1.0) + 0.5 * b.norm_squared();
        q[5] = b.0;
        q[6] = b.1;
        q[7] = b.2;
    }

    pub fn total_pressure(&self) -> f64 {
        self.pressure + 0.5 * self.magnetic_field.norm_squared()
    }

    /**
     * The fast magnetosonic speed along an axis.
     */
    pub fn fast_speed(&self, axis: Axis, gamma: f64) -> f64 {
        let a2 = gamma * self.pressure / self.density;
        let b2 = self.magnetic_field.norm_squared() / self.density;
        let bn = self.magnetic_field.component(axis);
        let bn2 = bn * bn / self.density;
        let s = a2 + b2;
        (0.5 * (s + (s * s - 4.0 * a2 * bn2).max(0.0).sqrt())).sqrt()
    }
}




/**
 * Ideal magnetohydrodynamics in units where the magnetic permeability is 1
 */
pub struct Mhd {
    gamma_law_index: f64,
    boundary_methods: [[BoundaryMethod; 2]; 3],
}




// ============================================================================
impl Mhd {
    pub fn new(gamma_law_index: f64, boundary_methods: [[BoundaryMethod; 2]; 3]) -> Self {
        Self { gamma_law_index, boundary_methods }
    }

    /// Primitive state with the pressure clamped at zero, for wave speeds
    /// of cells which failed to recover.
    fn clamped(&self, q: &[f64]) -> Primitive {
        Primitive::from_conserved(q, self.gamma_law_index).unwrap_or_else(|_| {
            let density = q[0].max(1e-12);
            Primitive {
                density,
                velocity: Vector3d::new(q[1] / density, q[2] / density, q[3] / density),
                pressure: 0.0,
                magnetic_field: Vector3d::from_slice(&q[5..8]),
            }
        })
    }
}




// ============================================================================
impl Equation for Mhd {

    fn name(&self) -> &'static str {
        "MHD"
    }

    fn state_names(&self) -> &[&'static str] {
        &STATE_NAMES
    }

    fn num_primitives(&self) -> usize {
        8
    }

    fn read_state_cell(&self, cons: &mut [f64], prim: &[f64]) {
        Primitive {
            density: prim[0],
            velocity: Vector3d::from_slice(&prim[1..4]),
            pressure: prim[4],
            magnetic_field: Vector3d::from_slice(&prim[5..8]),
        }
        .to_conserved(self.gamma_law_index, cons)
    }

    fn boundary_kernel_for(&self, axis: Axis, channel: usize, side: Side) -> Option<BoundaryMethod> {
        let method = self.boundary_methods[axis.index()][side.index()];
        let normal = channel == 1 + axis.index() || channel == 5 + axis.index();
        Some(reflect_if(method, normal))
    }

    fn device_source_fragments(&self) -> Vec<String> {
        vec![include("MHD.cl")]
    }

    fn flux(&self, q: &[f64], axis: Axis, f: &mut [f64]) {
        let p = self.clamped(q);
        let v = p.velocity;
        let b = p.magnetic_field;
        let vn = v.component(axis);
        let bn = b.component(axis);
        let pt = p.total_pressure();

        f[0] = q[0] * vn;
        for (j, dir) in Axis::ALL.into_iter().enumerate() {
            f[1 + j] = q[1 + j] * vn + pt * axis.along(dir) - bn * b.component(dir);
            f[5 + j] = b.component(dir) * vn - bn * v.component(dir);
        }
        f[4] = (q[4] + pt) * vn - bn * v.dot(&b);
    }

    fn max_wave_speed(&self, q: &[f64], axis: Axis) -> f64 {
        let p = self.clamped(q);
        p.velocity.component(axis).abs() + p.fast_speed(axis, self.gamma_law_index)
    }

    fn calc_eigen_basis(&self, ql: &[f64], qr: &[f64], axis: Axis, values: &mut [f64], transform: &mut [f64]) -> bool {
        let gamma = self.gamma_law_index;

        match (Primitive::from_conserved(ql, gamma), Primitive::from_conserved(qr, gamma)) {
            (Ok(pl), Ok(pr)) => {
                let sl = pl.velocity.component(axis).abs() + pl.fast_speed(axis, gamma);
                let sr = pr.velocity.component(axis).abs() + pr.fast_speed(axis, gamma);
                scalar_dissipation_basis(sl.max(sr), values, transform)
            }
            _ => false,
        }
    }

    fn fluid_layout(&self) -> Option<FluidLayout> {
        Some(FluidLayout {
            density: 0,
            momentum: [1, 2, 3],
            energy: 4,
            magnetic: Some([5, 6, 7]),
            gamma: self.gamma_law_index,
        })
    }
}
