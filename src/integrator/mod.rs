use crate::device::Device;
use crate::error::{Error, Result};

pub mod backward_euler_cg;
pub mod forward_euler;
pub mod runge_kutta4;

pub use backward_euler_cg::BackwardEulerConjugateGradient;
pub use forward_euler::ForwardEuler;
pub use runge_kutta4::RungeKutta4;




/**
 * The derivative callback handed to an integrator: given a state `q`, it
 * fills `out` with dq/dt. It must overwrite every element of `out`.
 */
pub type DerivativeFn<'a> = dyn FnMut(&[f64], &mut [f64]) + 'a;




/**
 * Advances a state buffer in place by one time step, given a callback which
 * evaluates the time derivative. Integrators own their scratch buffers,
 * which are sized once, and never reallocate the state.
 */
pub trait Integrator: Send {

    fn name(&self) -> &'static str;

    /// Implicit integrators may fail to converge; the caller should
    /// checkpoint the state before stepping with them.
    fn is_implicit(&self) -> bool {
        false
    }

    fn integrate(&mut self, dt: f64, state: &mut [f64], derivative: &mut DerivativeFn) -> Result<()>;
}




/**
 * Settings for the implicit integrator
 */
#[derive(Clone, Copy, Debug)]
pub struct ImplicitOptions {
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for ImplicitOptions {
    fn default() -> Self {
        Self { tolerance: 1e-7, max_iterations: 100 }
    }
}




/**
 * Create an integrator by name, with scratch buffers of `len` elements.
 */
pub fn from_name(name: &str, device: &Device, len: usize, options: ImplicitOptions) -> Result<Box<dyn Integrator>> {
    match name {
        "ForwardEuler" => Ok(Box::new(ForwardEuler::new(device, len))),
        "RungeKutta4" => Ok(Box::new(RungeKutta4::new(device, len))),
        "BackwardEulerConjugateGradient" => Ok(Box::new(BackwardEulerConjugateGradient::new(device, len, options))),
        _ => Err(Error::config(format!("failed to find integrator named {}", name))),
    }
}
