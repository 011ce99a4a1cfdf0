use std::f64::consts::PI;
use crate::device::{Buffer, Device, Kernel};
use crate::equation::FluidLayout;
use crate::error::Result;
use crate::grid::GridDescriptor;
use crate::integrator::Integrator;
use crate::poisson::PoissonStencil;
use crate::program::Program;
use crate::scheme::LaunchContext;




/**
 * Newtonian self-gravity for fluid equations. The potential solves
 * grad^2 phi = 4 pi G rho by Jacobi relaxation, warm-started from the
 * previous step's potential. On a fully periodic domain the mean density is
 * subtracted from the source. The force enters as
 *
 *     dm/dt = -rho grad phi,    dE/dt = -m . grad phi
 */
pub struct SelfGravity {
    gravitational_constant: f64,
    iterations: usize,
    stencil: PoissonStencil,
    potential: Buffer,
    swap: Buffer,
    source: Buffer,
    poisson_relax: Kernel,
    calc_gravity_deriv: Kernel,
}




// ============================================================================
impl SelfGravity {

    pub fn new(
        device: &Device,
        program: &Program,
        grid: &GridDescriptor,
        gravitational_constant: f64,
        iterations: usize,
        periodic: [bool; 3]) -> Result<Self>
    {
        Ok(Self {
            gravitational_constant,
            iterations,
            stencil: PoissonStencil::new(grid, periodic),
            potential: device.alloc(grid.volume(), "SelfGravity::potential"),
            swap: device.alloc(grid.volume(), "SelfGravity::potential_swap"),
            source: device.alloc(grid.volume(), "SelfGravity::source"),
            poisson_relax: program.kernel("poissonRelax")?,
            calc_gravity_deriv: program.kernel("calcGravityDeriv")?,
        })
    }

    pub fn potential(&self) -> &[f64] {
        &self.potential
    }

    /**
     * Relax the potential toward the solution for the density of `state`.
     */
    pub fn relax(&mut self, launch: &LaunchContext, layout: &FluidLayout, state: &[f64]) {
        let grid = launch.grid;
        let n = launch.equation.num_states();
        let four_pi_g = 4.0 * PI * self.gravitational_constant;

        let mean = if self.stencil.is_periodic() {
            let interior = grid.interior();
            interior.iter().map(|i| state[grid.linear_index(i) * n + layout.density]).sum::<f64>() / interior.len() as f64
        } else {
            0.0
        };
        for (s, q) in self.source.iter_mut().zip(state.chunks(n)) {
            *s = four_pi_g * (q[layout.density] - mean);
        }

        for _ in 0..self.iterations {
            self.swap.copy_from_slice(&self.potential);
            self.stencil.jacobi_sweep(
                launch.device,
                &self.poisson_relax,
                grid,
                &launch.geometry.global_size,
                1,
                &self.source,
                &self.swap,
                &mut self.potential);
        }
    }

    /**
     * Write the gravitational force terms for the state `q` into `deriv`.
     */
    pub fn derivative(&self, launch: &LaunchContext, layout: &FluidLayout, q: &[f64], deriv: &mut [f64]) {
        let grid = launch.grid;
        let n = launch.equation.num_states();
        let phi: &[f64] = &self.potential;

        launch.device.launch(&self.calc_gravity_deriv, &launch.geometry.global_size, deriv, n, |index, out| {
            out.fill(0.0);

            if grid.is_ghost(index) {
                return;
            }
            let cell = launch.cell(q, grid.linear_index(index));
            let mut work = 0.0;

            for axis in self.stencil.axes() {
                let g = self.stencil.gradient(phi, index, axis);
                let m = layout.momentum[axis.index()];
                out[m] = -cell[layout.density] * g;
                work += cell[m] * g;
            }
            out[layout.energy] = -work;
        });
    }

    /**
     * Relax the potential for the current state, then integrate the force
     * over one time step.
     */
    pub fn apply(
        &mut self,
        launch: &LaunchContext,
        integrator: &mut dyn Integrator,
        layout: &FluidLayout,
        state: &mut [f64],
        dt: f64) -> Result<()>
    {
        self.relax(launch, layout, state);
        let this = &*self;
        integrator.integrate(dt, state, &mut |q, deriv| this.derivative(launch, layout, q, deriv))
    }
}
