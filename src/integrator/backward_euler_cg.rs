use rayon::prelude::*;
use crate::device::{Buffer, Device};
use crate::error::{Error, Result};
use super::{DerivativeFn, ImplicitOptions, Integrator};




/**
 * Implicit backward Euler update. Solves (I - dt A) x = q for the new state
 * x by conjugate gradient iteration, where A v is evaluated by the
 * derivative callback. The operator must be symmetric positive definite for
 * the iteration to converge.
 *
 * The state is written only once the iteration has converged; on failure it
 * holds exactly what it held before the call.
 */
pub struct BackwardEulerConjugateGradient {
    x: Buffer,
    r: Buffer,
    p: Buffer,
    ap: Buffer,
    options: ImplicitOptions,
}




// ============================================================================
impl BackwardEulerConjugateGradient {

    pub fn new(device: &Device, len: usize, options: ImplicitOptions) -> Self {
        Self {
            x: device.alloc(len, "BackwardEulerConjugateGradient::x"),
            r: device.alloc(len, "BackwardEulerConjugateGradient::r"),
            p: device.alloc(len, "BackwardEulerConjugateGradient::p"),
            ap: device.alloc(len, "BackwardEulerConjugateGradient::ap"),
            options,
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.par_iter().zip(b.par_iter()).map(|(a, b)| a * b).sum()
}

/// ap = p - dt A p, given A p already in `ap`
fn apply_operator(ap: &mut [f64], p: &[f64], dt: f64) {
    ap.par_iter_mut().zip(p.par_iter()).for_each(|(ap, p)| *ap = p - dt * *ap);
}

impl Integrator for BackwardEulerConjugateGradient {

    fn name(&self) -> &'static str {
        "BackwardEulerConjugateGradient"
    }

    fn is_implicit(&self) -> bool {
        true
    }

    fn integrate(&mut self, dt: f64, state: &mut [f64], derivative: &mut DerivativeFn) -> Result<()> {
        let Self { x, r, p, ap, options } = self;
        let b: &[f64] = state;
        let b_norm = dot(b, b).sqrt();

        if b_norm == 0.0 {
            return Ok(());
        }

        // x0 = b, r0 = b - M b
        x.copy_from_slice(b);
        derivative(x, ap);
        apply_operator(ap, x, dt);
        r.par_iter_mut().zip(b.par_iter().zip(ap.par_iter())).for_each(|(r, (b, m))| *r = b - m);
        p.copy_from_slice(r);

        let mut rr = dot(r, r);
        let mut iterations = 0;

        loop {
            let residual = rr.sqrt() / b_norm;

            if residual <= options.tolerance {
                break;
            }
            if iterations >= options.max_iterations || !residual.is_finite() {
                return Err(Error::Convergence { iterations, residual });
            }

            derivative(p, ap);
            apply_operator(ap, p, dt);
            let pap = dot(p, ap);

            if !(pap > 0.0) || !pap.is_finite() {
                return Err(Error::Convergence { iterations, residual });
            }
            let alpha = rr / pap;

            x.par_iter_mut().zip(p.par_iter()).for_each(|(x, p)| *x += alpha * p);
            r.par_iter_mut().zip(ap.par_iter()).for_each(|(r, ap)| *r -= alpha * ap);

            let rr_next = dot(r, r);
            let beta = rr_next / rr;
            p.par_iter_mut().zip(r.par_iter()).for_each(|(p, r)| *p = r + beta * *p);

            rr = rr_next;
            iterations += 1;
        }

        state.copy_from_slice(x);
        Ok(())
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;

    /// A v = (v[i-1] - 2 v[i] + v[i+1]) / h^2, with zero values outside.
    fn laplacian(h: f64) -> impl FnMut(&[f64], &mut [f64]) {
        move |v: &[f64], out: &mut [f64]| {
            let n = v.len();
            for i in 0..n {
                let l = if i > 0 { v[i - 1] } else { 0.0 };
                let r = if i + 1 < n { v[i + 1] } else { 0.0 };
                out[i] = (l - 2.0 * v[i] + r) / (h * h);
            }
        }
    }

    #[test]
    fn converges_on_an_spd_operator() {
        let device = Device::new();
        let n = 32;
        let dt = 0.01;
        let mut cg = BackwardEulerConjugateGradient::new(&device, n, ImplicitOptions { tolerance: 1e-10, max_iterations: 200 });
        let b: Vec<f64> = (0..n).map(|i| (i as f64 * 0.3).sin() + 1.0).collect();
        let mut state = b.clone();
        let mut op = laplacian(0.1);

        cg.integrate(dt, &mut state, &mut op).unwrap();

        let mut ax = vec![0.0; n];
        op(&state, &mut ax);
        for i in 0..n {
            assert!((state[i] - dt * ax[i] - b[i]).abs() < 1e-8);
        }
    }

    #[test]
    fn breakdown_leaves_the_state_untouched() {
        let device = Device::new();
        let mut cg = BackwardEulerConjugateGradient::new(&device, 4, ImplicitOptions::default());
        let before = vec![1.0, 2.0, 3.0, 4.0];
        let mut state = before.clone();

        // I - dt A = -I is negative definite
        let result = cg.integrate(2.0, &mut state, &mut |q, out| out.copy_from_slice(q));
        assert!(matches!(result, Err(Error::Convergence { .. })));
        assert_eq!(state, before);
    }

    #[test]
    fn iteration_cap_is_a_convergence_error() {
        let device = Device::new();
        let n = 32;
        let mut cg = BackwardEulerConjugateGradient::new(&device, n, ImplicitOptions { tolerance: 1e-12, max_iterations: 2 });
        let before: Vec<f64> = (0..n).map(|i| (i * i % 7) as f64).collect();
        let mut state = before.clone();

        match cg.integrate(0.1, &mut state, &mut laplacian(0.1)) {
            Err(Error::Convergence { iterations, residual }) => {
                assert_eq!(iterations, 2);
                assert!(residual > 1e-12);
            }
            other => panic!("expected a convergence error, got {:?}", other),
        }
        assert_eq!(state, before);
    }

    #[test]
    fn zero_rhs_is_already_solved() {
        let device = Device::new();
        let mut cg = BackwardEulerConjugateGradient::new(&device, 3, ImplicitOptions::default());
        let mut state = vec![0.0; 3];
        cg.integrate(1.0, &mut state, &mut laplacian(1.0)).unwrap();
        assert_eq!(state, vec![0.0; 3]);
    }
}
