use crate::device::{Buffer, Device, Kernel};
use crate::error::Result;
use crate::program::Program;
use super::slope_limiter::{jump_ratio, SlopeLimiter};
use super::{apply_constraints, apply_self_gravity, apply_source, clean_divergence};
use super::{LaunchContext, Scheme, StepContext, MAX_STATES};




/**
 * Kernels of the Roe scheme, bound once at construction
 */
struct RoeKernels {
    calc_cfl: Kernel,
    calc_eigen_basis: Kernel,
    calc_delta_q_tilde: Kernel,
    calc_flux: Kernel,
    calc_flux_deriv: Kernel,
    add_source: Option<Kernel>,
    constrain: Option<Kernel>,
}




/**
 * Per-interface buffers, laid out (cell, axis, ...). The interface stored at
 * (cell, axis) is the face between cell - stride(axis) and cell.
 */
struct InterfaceBuffers {
    eigen: Buffer,
    delta_q_tilde: Buffer,
    flux: Buffer,
    flags: Buffer<u8>,
}




/**
 * Roe-type characteristic scheme with flux limiting. Each interface is
 * decomposed into the eigen basis of its equation; waves are upwinded and
 * limited individually, then recomposed into a flux. Interfaces where the
 * basis is degenerate are flagged and keep the equation's fallback flux.
 */
pub struct Roe {
    limiter: SlopeLimiter,
    kernels: RoeKernels,
    buffers: InterfaceBuffers,
}




// ============================================================================
impl Roe {

    pub fn new(launch: &LaunchContext, program: &Program, limiter: SlopeLimiter) -> Result<Self> {
        let equation = launch.equation;
        let device = launch.device;
        let n = equation.num_states();
        let t = equation.eigen_transform_size();
        let interfaces = launch.grid.volume() * launch.grid.dim();

        let kernels = RoeKernels {
            calc_cfl: program.kernel("calcCFL")?,
            calc_eigen_basis: program.kernel("calcEigenBasis")?,
            calc_delta_q_tilde: program.kernel("calcDeltaQTilde")?,
            calc_flux: program.kernel("calcFlux")?,
            calc_flux_deriv: program.kernel("calcFluxDeriv")?,
            add_source: equation.has_source().then(|| program.kernel("addSource")).transpose()?,
            constrain: equation.has_constraints().then(|| program.kernel("constrain")).transpose()?,
        };
        let buffers = InterfaceBuffers {
            eigen: device.alloc(interfaces * (n + t), "Roe::eigen"),
            delta_q_tilde: device.alloc(interfaces * n, "Roe::delta_q_tilde"),
            flux: device.alloc(interfaces * n, "Roe::flux"),
            flags: device.alloc(interfaces, "Roe::flags"),
        };
        Ok(Self { limiter, kernels, buffers })
    }

    pub fn limiter(&self) -> SlopeLimiter {
        self.limiter
    }

    /// Number of interfaces flagged as degenerate by the most recent flux
    /// evaluation.
    pub fn num_flagged_interfaces(&self) -> usize {
        self.buffers.flags.iter().filter(|&&f| f != 0).count()
    }
}

impl Scheme for Roe {

    fn name(&self) -> &'static str {
        "Roe"
    }

    fn init_step(&mut self, device: &Device) {
        device.fill(&mut self.buffers.flags, 0);
    }

    fn calc_cfl(&self, launch: &LaunchContext, state: &[f64], cfl: &mut [f64]) {
        launch.calc_cfl(&self.kernels.calc_cfl, state, cfl)
    }

    fn step(&mut self, mut ctx: StepContext, state: &mut [f64], dt: f64) -> Result<()> {
        let launch = ctx.launch;
        let Self { limiter, kernels, buffers } = self;
        let limiter = *limiter;

        ctx.integrator.integrate(dt, state, &mut |q, deriv| {
            buffers.flux_derivative(&launch, kernels, limiter, dt, q, deriv)
        })?;
        ctx.boundary.apply(launch.device, launch.grid, launch.equation, state);

        apply_self_gravity(&mut ctx, state, dt)?;
        apply_source(&mut ctx, kernels.add_source.as_ref(), state, dt)?;
        apply_constraints(&launch, kernels.constrain.as_ref(), state);
        clean_divergence(&mut ctx, state)
    }
}




// ============================================================================
impl InterfaceBuffers {

    /**
     * Evaluate dq/dt = -div F for the state `q`: eigen basis, characteristic
     * jumps, limited fluxes, then the flux divergence. Ghost cells get a zero
     * derivative.
     */
    fn flux_derivative(
        &mut self,
        launch: &LaunchContext,
        kernels: &RoeKernels,
        limiter: SlopeLimiter,
        dt: f64,
        q: &[f64],
        deriv: &mut [f64])
    {
        let Self { eigen, delta_q_tilde, flux, flags } = self;
        let device = launch.device;
        let grid = launch.grid;
        let equation = launch.equation;
        let range = &launch.geometry.global_size;
        let dim = grid.dim();
        let dx = grid.cell_spacing();
        let n = equation.num_states();
        let t = equation.eigen_transform_size();
        let record = n + t;

        device.launch3(
            &kernels.calc_eigen_basis,
            range,
            (&mut eigen[..], dim * record),
            (&mut flux[..], dim * n),
            (&mut flags[..], dim),
            |index, eigen, flux, flags| {
                let c = grid.linear_index(index);

                for axis in grid.axes() {
                    let d = axis.index();
                    let (values, transform) = eigen[d * record..(d + 1) * record].split_at_mut(n);
                    let f = &mut flux[d * n..(d + 1) * n];

                    if index[d] == 0 {
                        values.fill(0.0);
                        transform.fill(0.0);
                        f.fill(0.0);
                        flags[d] = 0;
                        continue;
                    }
                    let ql = launch.cell(q, c - grid.stride(axis));
                    let qr = launch.cell(q, c);

                    if equation.calc_eigen_basis(ql, qr, axis, values, transform) {
                        flags[d] = 0;
                    } else {
                        flags[d] = 1;
                        equation.degenerate_flux(ql, qr, axis, f);
                    }
                }
            });

        let eigen: &[f64] = eigen;
        let flags: &[u8] = flags;

        device.launch(&kernels.calc_delta_q_tilde, range, &mut delta_q_tilde[..], dim * n, |index, out| {
            let c = grid.linear_index(index);

            for axis in grid.axes() {
                let d = axis.index();
                let out = &mut out[d * n..(d + 1) * n];

                if index[d] == 0 || flags[c * dim + d] != 0 {
                    out.fill(0.0);
                    continue;
                }
                let ql = launch.cell(q, c - grid.stride(axis));
                let qr = launch.cell(q, c);
                let mut dq = [0.0; MAX_STATES];

                for k in 0..n {
                    dq[k] = qr[k] - ql[k];
                }
                let start = (c * dim + d) * record;
                equation.eigen_left(&eigen[start + n..start + record], axis, &dq[..n], out);
            }
        });

        let delta_q_tilde: &[f64] = delta_q_tilde;

        device.launch(&kernels.calc_flux, range, &mut flux[..], dim * n, |index, out| {
            let c = grid.linear_index(index);

            for axis in grid.axes() {
                let d = axis.index();

                if index[d] == 0 || flags[c * dim + d] != 0 {
                    continue;
                }
                let s = grid.stride(axis);
                let last = grid.size()[d] - 1;
                let ql = launch.cell(q, c - s);
                let qr = launch.cell(q, c);
                let start = (c * dim + d) * record;
                let values = &eigen[start..start + n];
                let transform = &eigen[start + n..start + record];
                let dqt = &delta_q_tilde[(c * dim + d) * n..(c * dim + d + 1) * n];
                let ratio = dt / dx[d];

                let mut fl = [0.0; MAX_STATES];
                let mut fr = [0.0; MAX_STATES];
                let mut flux_tilde = [0.0; MAX_STATES];
                equation.flux(ql, axis, &mut fl[..n]);
                equation.flux(qr, axis, &mut fr[..n]);

                for k in 0..n {
                    let lambda = values[k];
                    let theta = if lambda >= 0.0 { 1.0 } else { -1.0 };
                    let upwind = if lambda >= 0.0 {
                        if index[d] >= 2 { c - s } else { c }
                    } else if index[d] < last {
                        c + s
                    } else {
                        c
                    };
                    let r = jump_ratio(delta_q_tilde[(upwind * dim + d) * n + k], dqt[k]);
                    let phi = limiter.phi(r);
                    flux_tilde[k] = -0.5 * lambda * dqt[k] * (theta + phi * (lambda * ratio - theta));
                }
                let f = &mut out[d * n..(d + 1) * n];
                equation.eigen_right(transform, axis, &flux_tilde[..n], f);

                for k in 0..n {
                    f[k] += 0.5 * (fl[k] + fr[k]);
                }
            }
        });

        launch.flux_divergence(&kernels.calc_flux_deriv, flux, deriv);
    }
}
