use crate::boundary::BoundaryMethod;
use crate::geometry::{Axis, Side};
use crate::program::include;
use super::{Equation, scalar_dissipation_basis};

static STATE_NAMES: [&str; 37] = [
    "alpha",
    "gamma_xx", "gamma_xy", "gamma_xz", "gamma_yy", "gamma_yz", "gamma_zz",
    "A_x", "A_y", "A_z",
    "D_xxx", "D_xxy", "D_xxz", "D_xyy", "D_xyz", "D_xzz",
    "D_yxx", "D_yxy", "D_yxz", "D_yyy", "D_yyz", "D_yzz",
    "D_zxx", "D_zxy", "D_zxz", "D_zyy", "D_zyz", "D_zzz",
    "K_xx", "K_xy", "K_xz", "K_yy", "K_yz", "K_zz",
    "V_x", "V_y", "V_z",
];

const ALPHA: usize = 0;
const GAMMA: usize = 1;
const A: usize = 7;
const D: usize = 10;
const K: usize = 28;
const V: usize = 34;

/// Number of channels evolved by source terms only: the lapse and metric.
const NUM_SOURCE_ONLY: usize = 7;

/// Bona-Masso slicing function, f = 1 (harmonic slicing).
const SLICING_F: f64 = 1.0;




/**
 * Offset of the symmetric pair (i, j) in a packed xx, xy, xz, yy, yz, zz
 * tensor.
 */
fn sym(i: usize, j: usize) -> usize {
    match (i.min(j), i.max(j)) {
        (0, 0) => 0,
        (0, 1) => 1,
        (0, 2) => 2,
        (1, 1) => 3,
        (1, 2) => 4,
        _ => 5,
    }
}




/**
 * A view of one ADM3D cell, with the inverse metric computed on demand.
 */
struct Cell<'a> {
    q: &'a [f64],
    gamma_uu: [[f64; 3]; 3],
}

impl<'a> Cell<'a> {

    fn new(q: &'a [f64]) -> Self {
        let g = |i, j| q[GAMMA + sym(i, j)];
        let det = g(0, 0) * (g(1, 1) * g(2, 2) - g(1, 2) * g(1, 2))
                - g(0, 1) * (g(0, 1) * g(2, 2) - g(1, 2) * g(0, 2))
                + g(0, 2) * (g(0, 1) * g(1, 2) - g(1, 1) * g(0, 2));
        let mut gamma_uu = [[0.0; 3]; 3];

        for i in 0..3 {
            for j in 0..3 {
                let (i1, i2) = ((i + 1) % 3, (i + 2) % 3);
                let (j1, j2) = ((j + 1) % 3, (j + 2) % 3);
                // cofactor of (j, i), which equals that of (i, j) for a symmetric metric
                gamma_uu[i][j] = (g(j1, i1) * g(j2, i2) - g(j1, i2) * g(j2, i1)) / det;
            }
        }
        Self { q, gamma_uu }
    }

    fn alpha(&self) -> f64 {
        self.q[ALPHA]
    }

    fn a(&self, k: usize) -> f64 {
        self.q[A + k]
    }

    fn d(&self, k: usize, i: usize, j: usize) -> f64 {
        self.q[D + 6 * k + sym(i, j)]
    }

    fn k(&self, i: usize, j: usize) -> f64 {
        self.q[K + sym(i, j)]
    }

    fn v(&self, k: usize) -> f64 {
        self.q[V + k]
    }

    fn tr_k(&self) -> f64 {
        (0..3).flat_map(|i| (0..3).map(move |j| (i, j))).map(|(i, j)| self.gamma_uu[i][j] * self.k(i, j)).sum()
    }

    /// D_km^m, the trace of D_kij over its last two indexes.
    fn d_trace(&self, k: usize) -> f64 {
        (0..3).flat_map(|m| (0..3).map(move |l| (m, l))).map(|(m, l)| self.gamma_uu[m][l] * self.d(k, m, l)).sum()
    }

    /// D^m_mk, the trace of D over its first two indexes.
    fn d_first_trace(&self, k: usize) -> f64 {
        (0..3).flat_map(|m| (0..3).map(move |l| (m, l))).map(|(m, l)| self.gamma_uu[m][l] * self.d(l, m, k)).sum()
    }

    /// D^n_ij, with the first index raised.
    fn d_up(&self, n: usize, i: usize, j: usize) -> f64 {
        (0..3).map(|m| self.gamma_uu[n][m] * self.d(m, i, j)).sum()
    }

    fn constraint_v(&self, k: usize) -> f64 {
        self.d_trace(k) - self.d_first_trace(k)
    }

    /**
     * lambda^n_ij = D^n_ij + 1/2 delta^n_i (A_j + 2 V_j - D_jm^m)
     *                      + 1/2 delta^n_j (A_i + 2 V_i - D_im^m)
     */
    fn lambda(&self, n: usize, i: usize, j: usize) -> f64 {
        let w = |k: usize| self.a(k) + 2.0 * self.v(k) - self.d_trace(k);
        let mut l = self.d_up(n, i, j);
        if n == i {
            l += 0.5 * w(j);
        }
        if n == j {
            l += 0.5 * w(i);
        }
        l
    }
}




/**
 * The ADM equations of numerical relativity in the first order Bona-Masso
 * form, with zero shift. The lapse and metric evolve by source terms only;
 * the A, D, K, and V fields carry the principal part. V is not an
 * independent field: it is initialized and constrained to
 * V_k = D_km^m - D^m_mk.
 */
pub struct Adm3d {
    boundary_methods: [[BoundaryMethod; 2]; 3],
}




// ============================================================================
impl Adm3d {
    pub fn new(boundary_methods: [[BoundaryMethod; 2]; 3]) -> Self {
        Self { boundary_methods }
    }
}




// ============================================================================
impl Equation for Adm3d {

    fn name(&self) -> &'static str {
        "ADM3D"
    }

    fn state_names(&self) -> &[&'static str] {
        &STATE_NAMES
    }

    fn num_primitives(&self) -> usize {
        V
    }

    fn read_state_cell(&self, cons: &mut [f64], prim: &[f64]) {
        cons[..V].copy_from_slice(&prim[..V]);
        self.constrain(cons);
    }

    fn boundary_kernel_for(&self, axis: Axis, channel: usize, side: Side) -> Option<BoundaryMethod> {
        if channel < NUM_SOURCE_ONLY {
            None
        } else {
            Some(self.boundary_methods[axis.index()][side.index()])
        }
    }

    fn device_source_fragments(&self) -> Vec<String> {
        vec![include("ADM3D.cl")]
    }

    fn flux(&self, q: &[f64], axis: Axis, f: &mut [f64]) {
        let cell = Cell::new(q);
        let n = axis.index();
        let alpha = cell.alpha();

        f.iter_mut().for_each(|x| *x = 0.0);
        f[A + n] = alpha * SLICING_F * cell.tr_k();

        for i in 0..3 {
            for j in i..3 {
                f[D + 6 * n + sym(i, j)] = alpha * cell.k(i, j);
                f[K + sym(i, j)] = alpha * cell.lambda(n, i, j);
            }
        }
    }

    fn max_wave_speed(&self, q: &[f64], axis: Axis) -> f64 {
        let cell = Cell::new(q);
        let n = axis.index();
        cell.alpha() * (SLICING_F * cell.gamma_uu[n][n]).sqrt()
    }

    fn calc_eigen_basis(&self, ql: &[f64], qr: &[f64], axis: Axis, values: &mut [f64], transform: &mut [f64]) -> bool {
        let speed = self.max_wave_speed(ql, axis).max(self.max_wave_speed(qr, axis));
        scalar_dissipation_basis(speed, values, transform)
    }

    fn has_source(&self) -> bool {
        true
    }

    fn source(&self, q: &[f64], deriv: &mut [f64]) {
        let cell = Cell::new(q);
        let alpha = cell.alpha();
        let tr_k = cell.tr_k();

        deriv.iter_mut().for_each(|x| *x = 0.0);
        deriv[ALPHA] = -alpha * alpha * SLICING_F * tr_k;

        for i in 0..3 {
            for j in i..3 {
                let kk: f64 = (0..3)
                    .flat_map(|k| (0..3).map(move |l| (k, l)))
                    .map(|(k, l)| cell.k(i, k) * cell.gamma_uu[k][l] * cell.k(l, j))
                    .sum();
                deriv[GAMMA + sym(i, j)] = -2.0 * alpha * cell.k(i, j);
                deriv[K + sym(i, j)] = alpha * (tr_k * cell.k(i, j) - 2.0 * kk);
            }
        }
    }

    fn has_constraints(&self) -> bool {
        true
    }

    fn constrain(&self, q: &mut [f64]) {
        let v: Vec<f64> = {
            let cell = Cell::new(q);
            (0..3).map(|k| cell.constraint_v(k)).collect()
        };
        q[V..V + 3].copy_from_slice(&v);
    }
}
