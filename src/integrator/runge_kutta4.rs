use rayon::prelude::*;
use crate::device::{Buffer, Device};
use crate::error::Result;
use super::{DerivativeFn, Integrator};




/**
 * The classical fourth order Runge-Kutta method
 */
pub struct RungeKutta4 {
    k1: Buffer,
    k2: Buffer,
    k3: Buffer,
    k4: Buffer,
    stage: Buffer,
}




// ============================================================================
impl RungeKutta4 {
    pub fn new(device: &Device, len: usize) -> Self {
        Self {
            k1: device.alloc(len, "RungeKutta4::k1"),
            k2: device.alloc(len, "RungeKutta4::k2"),
            k3: device.alloc(len, "RungeKutta4::k3"),
            k4: device.alloc(len, "RungeKutta4::k4"),
            stage: device.alloc(len, "RungeKutta4::stage"),
        }
    }
}

/// stage = q + h k
fn advance(stage: &mut [f64], q: &[f64], h: f64, k: &[f64]) {
    stage.par_iter_mut()
        .zip(q.par_iter().zip(k.par_iter()))
        .for_each(|(s, (q, k))| *s = q + h * k);
}

impl Integrator for RungeKutta4 {

    fn name(&self) -> &'static str {
        "RungeKutta4"
    }

    fn integrate(&mut self, dt: f64, state: &mut [f64], derivative: &mut DerivativeFn) -> Result<()> {
        let Self { k1, k2, k3, k4, stage } = self;

        derivative(state, k1);
        advance(stage, state, 0.5 * dt, k1);
        derivative(stage, k2);
        advance(stage, state, 0.5 * dt, k2);
        derivative(stage, k3);
        advance(stage, state, dt, k3);
        derivative(stage, k4);

        state.par_iter_mut()
            .zip(k1.par_iter().zip(k2.par_iter()))
            .zip(k3.par_iter().zip(k4.par_iter()))
            .for_each(|((q, (a, b)), (c, d))| *q += dt / 6.0 * (a + 2.0 * b + 2.0 * c + d));
        Ok(())
    }
}
