use crate::boundary::BoundaryDispatcher;
use crate::device::{Device, Kernel};
use crate::divergence::DivergenceCleaning;
use crate::equation::Equation;
use crate::error::{Error, Result};
use crate::grid::{DispatchGeometry, GridDescriptor};
use crate::integrator::Integrator;
use crate::self_gravity::SelfGravity;

pub mod burgers;
pub mod roe;
pub mod slope_limiter;

pub use burgers::Burgers;
pub use roe::Roe;
pub use slope_limiter::SlopeLimiter;

/// Upper bound on the number of states of any equation, for per-work-item
/// scratch arrays.
pub(crate) const MAX_STATES: usize = 64;




/**
 * The read-only resources every kernel launch needs
 */
#[derive(Clone, Copy)]
pub struct LaunchContext<'a> {
    pub device: &'a Device,
    pub grid: &'a GridDescriptor,
    pub geometry: &'a DispatchGeometry,
    pub equation: &'a dyn Equation,
}




// ============================================================================
impl<'a> LaunchContext<'a> {

    /// The conserved state of one cell.
    pub fn cell<'q>(&self, q: &'q [f64], c: usize) -> &'q [f64] {
        let n = self.equation.num_states();
        &q[c * n..(c + 1) * n]
    }

    /**
     * Fill `cfl` with the largest stable step of each interior cell,
     * min over axes of dx / (fastest signal speed). Ghost cells are not
     * written.
     */
    pub fn calc_cfl(&self, kernel: &Kernel, state: &[f64], cfl: &mut [f64]) {
        let grid = self.grid;
        let dx = grid.cell_spacing();

        self.device.launch(kernel, &self.geometry.global_size, cfl, 1, |index, out| {
            if !grid.is_ghost(index) {
                let q = self.cell(state, grid.linear_index(index));
                out[0] = grid
                    .axes()
                    .map(|axis| dx[axis.index()] / self.equation.max_wave_speed(q, axis))
                    .fold(f64::MAX, f64::min);
            }
        });
    }

    /**
     * The conservative update -sum_axes (F[c + s] - F[c]) / dx from a
     * per-interface flux buffer laid out (cell, axis, channel). Ghost cells
     * get a zero derivative.
     */
    pub fn flux_divergence(&self, kernel: &Kernel, flux: &[f64], deriv: &mut [f64]) {
        let grid = self.grid;
        let dim = grid.dim();
        let dx = grid.cell_spacing();
        let n = self.equation.num_states();

        self.device.launch(kernel, &self.geometry.global_size, deriv, n, |index, out| {
            if grid.is_ghost(index) {
                out.fill(0.0);
                return;
            }
            let c = grid.linear_index(index);

            for k in 0..n {
                out[k] = -grid.axes().map(|axis| {
                    let d = axis.index();
                    let next = c + grid.stride(axis);
                    (flux[(next * dim + d) * n + k] - flux[(c * dim + d) * n + k]) / dx[d]
                }).sum::<f64>();
            }
        });
    }

    /**
     * Launch a kernel that writes a per-cell derivative from a per-cell
     * function of the state.
     */
    pub fn cellwise_derivative<F>(&self, kernel: &Kernel, q: &[f64], out: &mut [f64], f: F)
    where
        F: Fn(&[f64], &mut [f64]) + Sync,
    {
        let grid = self.grid;
        let n = self.equation.num_states();

        self.device.launch(kernel, &self.geometry.global_size, out, n, |index, d| {
            f(self.cell(q, grid.linear_index(index)), d)
        });
    }
}




/**
 * Everything a scheme needs to advance the state by one step
 */
pub struct StepContext<'a> {
    pub launch: LaunchContext<'a>,
    pub boundary: &'a BoundaryDispatcher,
    pub integrator: &'a mut dyn Integrator,
    pub self_gravity: Option<&'a mut SelfGravity>,
    pub divergence: Option<&'a mut DivergenceCleaning>,
}




/**
 * A numerical scheme: the sequence of kernel launches and integrator passes
 * making up one time step.
 */
pub trait Scheme: Send {

    fn name(&self) -> &'static str;

    /// Called once per update, before the time step is chosen.
    fn init_step(&mut self, _device: &Device) {}

    fn calc_cfl(&self, launch: &LaunchContext, state: &[f64], cfl: &mut [f64]);

    fn step(&mut self, ctx: StepContext, state: &mut [f64], dt: f64) -> Result<()>;

    /// The matrix of d(state)/dt with respect to the state, for schemes
    /// which can linearize their update.
    fn dstate_dt_matrix(&self) -> Result<Vec<f64>> {
        Err(Error::UnsupportedOperation("dstate_dt_matrix"))
    }

    fn apply_dstate_dt_matrix(&self, _x: &[f64], _result: &mut [f64]) -> Result<()> {
        Err(Error::UnsupportedOperation("apply_dstate_dt_matrix"))
    }
}




/**
 * Self-gravity for fluid equations: relax the potential and apply the force
 * as an integrator pass, then refresh the ghost cells.
 */
pub(crate) fn apply_self_gravity(ctx: &mut StepContext, state: &mut [f64], dt: f64) -> Result<()> {
    let launch = ctx.launch;

    if let (Some(gravity), Some(layout)) = (ctx.self_gravity.as_deref_mut(), launch.equation.fluid_layout()) {
        gravity.apply(&launch, &mut *ctx.integrator, &layout, state, dt)?;
        ctx.boundary.apply(launch.device, launch.grid, launch.equation, state);
    }
    Ok(())
}

/**
 * Integrate the equation's source term, if it has one.
 */
pub(crate) fn apply_source(ctx: &mut StepContext, kernel: Option<&Kernel>, state: &mut [f64], dt: f64) -> Result<()> {
    let launch = ctx.launch;

    if let Some(kernel) = kernel {
        ctx.integrator.integrate(dt, state, &mut |q, out| {
            launch.cellwise_derivative(kernel, q, out, |q, d| launch.equation.source(q, d))
        })?;
        ctx.boundary.apply(launch.device, launch.grid, launch.equation, state);
    }
    Ok(())
}

pub(crate) fn apply_constraints(launch: &LaunchContext, kernel: Option<&Kernel>, state: &mut [f64]) {
    if let Some(kernel) = kernel {
        let n = launch.equation.num_states();
        launch.device.launch(kernel, &launch.geometry.global_size, state, n, |_, q| launch.equation.constrain(q));
    }
}

pub(crate) fn clean_divergence(ctx: &mut StepContext, state: &mut [f64]) -> Result<()> {
    let launch = ctx.launch;

    if let (Some(cleaning), Some(layout)) = (ctx.divergence.as_deref_mut(), launch.equation.fluid_layout()) {
        cleaning.clean(&launch, &layout, state);
        ctx.boundary.apply(launch.device, launch.grid, launch.equation, state);
    }
    Ok(())
}
