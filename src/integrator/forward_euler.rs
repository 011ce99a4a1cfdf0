use rayon::prelude::*;
use crate::device::{Buffer, Device};
use crate::error::Result;
use super::{DerivativeFn, Integrator};




/**
 * First order explicit update: q += dt dq/dt
 */
pub struct ForwardEuler {
    deriv: Buffer,
}




// ============================================================================
impl ForwardEuler {
    pub fn new(device: &Device, len: usize) -> Self {
        Self { deriv: device.alloc(len, "ForwardEuler::deriv") }
    }
}

impl Integrator for ForwardEuler {

    fn name(&self) -> &'static str {
        "ForwardEuler"
    }

    fn integrate(&mut self, dt: f64, state: &mut [f64], derivative: &mut DerivativeFn) -> Result<()> {
        derivative(state, &mut self.deriv);

        state.par_iter_mut()
            .zip(self.deriv.par_iter())
            .for_each(|(q, k)| *q += dt * k);
        Ok(())
    }
}
