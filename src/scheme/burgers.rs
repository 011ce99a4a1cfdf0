use crate::device::{Buffer, Device, Kernel};
use crate::equation::FluidLayout;
use crate::error::{Error, Result};
use crate::program::Program;
use super::slope_limiter::{jump_ratio, SlopeLimiter};
use super::{apply_self_gravity, clean_divergence};
use super::{LaunchContext, Scheme, StepContext};

/// Interface record of the magnetic pass: B (3), v (3), v.B, averaged over
/// the two cells of the interface.
const MAGNETIC_RECORD: usize = 7;




struct BurgersKernels {
    calc_cfl: Kernel,
    calc_interface_velocity: Kernel,
    calc_flux: Kernel,
    calc_flux_deriv: Kernel,
    compute_pressure: Kernel,
    diffuse_momentum: Kernel,
    diffuse_work: Kernel,
    magnetic: Option<MagneticKernels>,
}

struct MagneticKernels {
    calc_interface_magnetic_field: Kernel,
    calc_magnetic_field_flux: Kernel,
}

struct BurgersBuffers {
    interface_velocity: Buffer,
    interface_magnetic_field: Buffer,
    flux: Buffer,
    pressure: Buffer,
}




/**
 * Operator-split donor-cell scheme for fluids. Every channel is advected by
 * the interface velocity with a slope-limited correction; the magnetic
 * stresses (for MHD), the pressure gradient and the pressure work are then
 * applied as separate integrator passes.
 */
pub struct Burgers {
    limiter: SlopeLimiter,
    layout: FluidLayout,
    kernels: BurgersKernels,
    buffers: BurgersBuffers,
}




// ============================================================================
impl Burgers {

    pub fn new(launch: &LaunchContext, program: &Program, limiter: SlopeLimiter) -> Result<Self> {
        let equation = launch.equation;
        let device = launch.device;
        let layout = equation.fluid_layout().ok_or_else(|| {
            Error::config(format!("the Burgers scheme cannot advance {} states", equation.name()))
        })?;
        let n = equation.num_states();
        let volume = launch.grid.volume();
        let interfaces = volume * launch.grid.dim();

        let magnetic = match layout.magnetic {
            Some(_) => Some(MagneticKernels {
                calc_interface_magnetic_field: program.kernel("calcInterfaceMagneticField")?,
                calc_magnetic_field_flux: program.kernel("calcMagneticFieldFlux")?,
            }),
            None => None,
        };
        let kernels = BurgersKernels {
            calc_cfl: program.kernel("calcCFL")?,
            calc_interface_velocity: program.kernel("calcInterfaceVelocity")?,
            calc_flux: program.kernel("calcFlux")?,
            calc_flux_deriv: program.kernel("calcFluxDeriv")?,
            compute_pressure: program.kernel("computePressure")?,
            diffuse_momentum: program.kernel("diffuseMomentum")?,
            diffuse_work: program.kernel("diffuseWork")?,
            magnetic,
        };
        let magnetic_len = if layout.magnetic.is_some() { interfaces * MAGNETIC_RECORD } else { 0 };

        let buffers = BurgersBuffers {
            interface_velocity: device.alloc(interfaces, "Burgers::interface_velocity"),
            interface_magnetic_field: device.alloc(magnetic_len, "Burgers::interface_magnetic_field"),
            flux: device.alloc(interfaces * n, "Burgers::flux"),
            pressure: device.alloc(volume, "Burgers::pressure"),
        };
        Ok(Self { limiter, layout, kernels, buffers })
    }

    /// Total (gas plus magnetic) pressure from the most recent pressure pass.
    pub fn pressure(&self) -> &[f64] {
        &self.buffers.pressure
    }
}

impl Scheme for Burgers {

    fn name(&self) -> &'static str {
        "Burgers"
    }

    fn calc_cfl(&self, launch: &LaunchContext, state: &[f64], cfl: &mut [f64]) {
        launch.calc_cfl(&self.kernels.calc_cfl, state, cfl)
    }

    fn step(&mut self, mut ctx: StepContext, state: &mut [f64], dt: f64) -> Result<()> {
        let launch = ctx.launch;
        let Self { limiter, layout, kernels, buffers } = self;
        let (limiter, layout) = (*limiter, *layout);

        ctx.integrator.integrate(dt, state, &mut |q, deriv| {
            buffers.advect(&launch, kernels, &layout, limiter, dt, q, deriv)
        })?;
        ctx.boundary.apply(launch.device, launch.grid, launch.equation, state);

        if let Some(magnetic) = &kernels.magnetic {
            ctx.integrator.integrate(dt, state, &mut |q, deriv| {
                buffers.magnetic_stress(&launch, magnetic, &kernels.calc_flux_deriv, &layout, q, deriv)
            })?;
            ctx.boundary.apply(launch.device, launch.grid, launch.equation, state);
        }

        apply_self_gravity(&mut ctx, state, dt)?;

        ctx.integrator.integrate(dt, state, &mut |q, deriv| {
            buffers.diffuse_momentum(&launch, kernels, &layout, q, deriv)
        })?;
        ctx.boundary.apply(launch.device, launch.grid, launch.equation, state);

        ctx.integrator.integrate(dt, state, &mut |q, deriv| {
            buffers.diffuse_work(&launch, kernels, &layout, q, deriv)
        })?;
        ctx.boundary.apply(launch.device, launch.grid, launch.equation, state);

        clean_divergence(&mut ctx, state)
    }
}




// ============================================================================
impl BurgersBuffers {

    /**
     * Donor-cell advection of every channel by the interface velocity. Fluxes
     * are computed on interfaces 2 ..= size - 2 of each axis, which are all
     * the interfaces of the interior cells. The field component normal to a
     * face is never carried across it.
     */
    #[allow(clippy::too_many_arguments)]
    fn advect(
        &mut self,
        launch: &LaunchContext,
        kernels: &BurgersKernels,
        layout: &FluidLayout,
        limiter: SlopeLimiter,
        dt: f64,
        q: &[f64],
        deriv: &mut [f64])
    {
        let grid = launch.grid;
        let range = &launch.geometry.global_size;
        let dim = grid.dim();
        let dx = grid.cell_spacing();
        let n = launch.equation.num_states();

        launch.device.launch(&kernels.calc_interface_velocity, range, &mut self.interface_velocity[..], dim, |index, out| {
            let c = grid.linear_index(index);

            for axis in grid.axes() {
                let d = axis.index();
                out[d] = if index[d] == 0 {
                    0.0
                } else {
                    let vl = layout.velocity(launch.cell(q, c - grid.stride(axis)))[d];
                    let vr = layout.velocity(launch.cell(q, c))[d];
                    0.5 * (vl + vr)
                };
            }
        });

        let velocity: &[f64] = &self.interface_velocity;

        launch.device.launch(&kernels.calc_flux, range, &mut self.flux[..], dim * n, |index, out| {
            let c = grid.linear_index(index);

            for axis in grid.axes() {
                let d = axis.index();
                let f = &mut out[d * n..(d + 1) * n];
                let i = index[d];

                if i < 2 || i > grid.size()[d] - 2 {
                    f.fill(0.0);
                    continue;
                }
                let s = grid.stride(axis);
                let u = velocity[c * dim + d];
                let courant = (u * dt / dx[d]).abs();
                let (q0, q1, q2) = (launch.cell(q, c - 2 * s), launch.cell(q, c - s), launch.cell(q, c));
                let q3 = launch.cell(q, c + s);

                for k in 0..n {
                    let delta = q2[k] - q1[k];
                    let (upwind_value, upwind_jump) = if u >= 0.0 {
                        (q1[k], q1[k] - q0[k])
                    } else {
                        (q2[k], q3[k] - q2[k])
                    };
                    let phi = limiter.phi(jump_ratio(upwind_jump, delta));
                    f[k] = u * upwind_value + 0.5 * u.abs() * (1.0 - courant) * phi * delta;
                }
                if let Some(b) = layout.magnetic {
                    f[b[d]] = 0.0;
                }
            }
        });

        launch.flux_divergence(&kernels.calc_flux_deriv, &self.flux, deriv);
    }

    /**
     * Magnetic tension, induction and Poynting terms, -B_n (v_j, B_j, v.B)
     * for the field, momentum, and energy channels respectively. The normal
     * field component gets no induction flux on its own axis.
     */
    fn magnetic_stress(
        &mut self,
        launch: &LaunchContext,
        kernels: &MagneticKernels,
        flux_deriv: &Kernel,
        layout: &FluidLayout,
        q: &[f64],
        deriv: &mut [f64])
    {
        let grid = launch.grid;
        let range = &launch.geometry.global_size;
        let dim = grid.dim();
        let n = launch.equation.num_states();
        let b_index = match layout.magnetic {
            Some(b) => b,
            None => return,
        };

        launch.device.launch(
            &kernels.calc_interface_magnetic_field,
            range,
            &mut self.interface_magnetic_field[..],
            dim * MAGNETIC_RECORD,
            |index, out| {
                let c = grid.linear_index(index);

                for axis in grid.axes() {
                    let d = axis.index();
                    let record = &mut out[d * MAGNETIC_RECORD..(d + 1) * MAGNETIC_RECORD];

                    if index[d] == 0 {
                        record.fill(0.0);
                        continue;
                    }
                    let ql = launch.cell(q, c - grid.stride(axis));
                    let qr = launch.cell(q, c);
                    let (bl, br) = (layout.magnetic_field(ql), layout.magnetic_field(qr));
                    let (vl, vr) = (layout.velocity(ql), layout.velocity(qr));
                    let mut vb = 0.0;

                    for j in 0..3 {
                        record[j] = 0.5 * (bl[j] + br[j]);
                        record[3 + j] = 0.5 * (vl[j] + vr[j]);
                        vb += 0.5 * (vl[j] * bl[j] + vr[j] * br[j]);
                    }
                    record[6] = vb;
                }
            });

        let field: &[f64] = &self.interface_magnetic_field;

        launch.device.launch(&kernels.calc_magnetic_field_flux, range, &mut self.flux[..], dim * n, |index, out| {
            let c = grid.linear_index(index);
            out.fill(0.0);

            for axis in grid.axes() {
                let d = axis.index();

                if index[d] == 0 {
                    continue;
                }
                let record = &field[(c * dim + d) * MAGNETIC_RECORD..(c * dim + d + 1) * MAGNETIC_RECORD];
                let f = &mut out[d * n..(d + 1) * n];
                let bn = record[d];

                for j in 0..3 {
                    f[b_index[j]] = if j == d { 0.0 } else { -bn * record[3 + j] };
                    f[layout.momentum[j]] = -bn * record[j];
                }
                f[layout.energy] = -bn * record[6];
            }
        });

        launch.flux_divergence(flux_deriv, &self.flux, deriv);
    }

    fn compute_pressure(&mut self, launch: &LaunchContext, kernel: &Kernel, layout: &FluidLayout, q: &[f64]) {
        let grid = launch.grid;

        launch.device.launch(kernel, &launch.geometry.global_size, &mut self.pressure[..], 1, |index, out| {
            let (gas, magnetic) = layout.pressures(launch.cell(q, grid.linear_index(index)));
            out[0] = gas + magnetic;
        });
    }

    /// dm_n/dt = -dp/dx_n, by central difference.
    fn diffuse_momentum(&mut self, launch: &LaunchContext, kernels: &BurgersKernels, layout: &FluidLayout, q: &[f64], deriv: &mut [f64]) {
        self.compute_pressure(launch, &kernels.compute_pressure, layout, q);

        let grid = launch.grid;
        let dx = grid.cell_spacing();
        let n = launch.equation.num_states();
        let p: &[f64] = &self.pressure;

        launch.device.launch(&kernels.diffuse_momentum, &launch.geometry.global_size, deriv, n, |index, out| {
            out.fill(0.0);

            if grid.is_ghost(index) {
                return;
            }
            let c = grid.linear_index(index);

            for axis in grid.axes() {
                let d = axis.index();
                let s = grid.stride(axis);
                out[layout.momentum[d]] = -(p[c + s] - p[c - s]) / (2.0 * dx[d]);
            }
        });
    }

    /// dE/dt = -div (p v), by central difference.
    fn diffuse_work(&mut self, launch: &LaunchContext, kernels: &BurgersKernels, layout: &FluidLayout, q: &[f64], deriv: &mut [f64]) {
        self.compute_pressure(launch, &kernels.compute_pressure, layout, q);

        let grid = launch.grid;
        let dx = grid.cell_spacing();
        let n = launch.equation.num_states();
        let p: &[f64] = &self.pressure;

        launch.device.launch(&kernels.diffuse_work, &launch.geometry.global_size, deriv, n, |index, out| {
            out.fill(0.0);

            if grid.is_ghost(index) {
                return;
            }
            let c = grid.linear_index(index);

            out[layout.energy] = -grid.axes().map(|axis| {
                let d = axis.index();
                let s = grid.stride(axis);
                let work_r = p[c + s] * layout.velocity(launch.cell(q, c + s))[d];
                let work_l = p[c - s] * layout.velocity(launch.cell(q, c - s))[d];
                (work_r - work_l) / (2.0 * dx[d])
            }).sum::<f64>();
        });
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::boundary::{BoundaryDispatcher, BoundaryMethod};
    use crate::equation::euler::{Euler, Primitive};
    use crate::equation::maxwell::Maxwell;
    use crate::equation::mhd::{self, Mhd};
    use crate::equation::Equation;
    use crate::geometry::Vector3d;
    use crate::grid::{DispatchGeometry, GridDescriptor, NUM_GHOST};
    use crate::integrator::ForwardEuler;
    use crate::program::{include, ProgramSource};

    struct Setup<E> {
        device: Device,
        grid: GridDescriptor,
        geometry: DispatchGeometry,
        equation: E,
        program: Program,
    }

    fn setup<E: Equation>(dim: usize, equation: E) -> Setup<E> {
        let grid = GridDescriptor::new(dim, [48, 12, 1], [0.0; 3], [1.0; 3]).unwrap();
        let geometry = DispatchGeometry::new(&grid);
        let mut source = ProgramSource::new(&grid, equation.num_states(), "MinMod", 1.0);
        source.push(include("Burgers.cl"));

        for fragment in equation.device_source_fragments() {
            source.push(fragment);
        }
        Setup { device: Device::new(), grid, geometry, equation, program: source.build().unwrap() }
    }

    impl<E: Equation> Setup<E> {
        fn launch(&self) -> LaunchContext {
            LaunchContext { device: &self.device, grid: &self.grid, geometry: &self.geometry, equation: &self.equation }
        }

        fn step(&self, scheme: &mut Burgers, state: &mut [f64], dt: f64) {
            let boundary = BoundaryDispatcher::new(&self.program, &self.grid, &self.geometry).unwrap();
            let mut integrator = ForwardEuler::new(&self.device, state.len());
            boundary.apply(&self.device, &self.grid, &self.equation, state);

            let ctx = StepContext {
                launch: self.launch(),
                boundary: &boundary,
                integrator: &mut integrator,
                self_gravity: None,
                divergence: None,
            };
            scheme.step(ctx, state, dt).unwrap();
        }
    }

    fn euler_state(grid: &GridDescriptor, prim: impl Fn(f64) -> [f64; 5]) -> Vec<f64> {
        let mut state = vec![0.0; grid.volume() * 5];
        for (c, q) in state.chunks_mut(5).enumerate() {
            let x = grid.cell_center(grid.coords(c))[0];
            Primitive::from_slice(&prim(x)).to_conserved(1.4, q);
        }
        state
    }

    fn interior_mass(grid: &GridDescriptor, state: &[f64], n: usize) -> f64 {
        grid.interior().iter().map(|i| state[grid.linear_index(i) * n]).sum()
    }

    #[test]
    fn non_fluid_equations_are_rejected() {
        let s = setup(1, Maxwell::new([[BoundaryMethod::Periodic; 2]; 3]));
        let result = Burgers::new(&s.launch(), &s.program, SlopeLimiter::MinMod);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn uniform_flow_is_stationary() {
        let s = setup(2, Euler::new(1.4, [[BoundaryMethod::Periodic; 2]; 3]));
        let mut burgers = Burgers::new(&s.launch(), &s.program, SlopeLimiter::MinMod).unwrap();
        let before = euler_state(&s.grid, |_| [1.0, 0.4, -0.2, 0.0, 1.0]);
        let mut state = before.clone();
        s.step(&mut burgers, &mut state, 0.002);

        for (a, b) in state.iter().zip(&before) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!(burgers.pressure().iter().all(|p| (p - 1.0).abs() < 1e-12));
    }

    #[test]
    fn periodic_advection_conserves_mass() {
        let s = setup(1, Euler::new(1.4, [[BoundaryMethod::Periodic; 2]; 3]));
        let mut burgers = Burgers::new(&s.launch(), &s.program, SlopeLimiter::MinMod).unwrap();
        let mut state = euler_state(&s.grid, |x| [1.0 + 0.3 * (2.0 * std::f64::consts::PI * x).cos(), 0.5, 0.0, 0.0, 1.0]);
        let mass = interior_mass(&s.grid, &state, 5);

        for _ in 0..10 {
            s.step(&mut burgers, &mut state, 0.002);
        }
        assert!((interior_mass(&s.grid, &state, 5) - mass).abs() < 1e-10 * mass);
    }

    #[test]
    fn pressure_jump_pushes_gas_into_the_low_pressure_side() {
        let s = setup(1, Euler::new(1.4, [[BoundaryMethod::FreeFlow; 2]; 3]));
        let mut burgers = Burgers::new(&s.launch(), &s.program, SlopeLimiter::MinMod).unwrap();
        let mut state = euler_state(&s.grid, |x| if x < 0.5 { [1.0, 0.0, 0.0, 0.0, 1.0] } else { [0.125, 0.0, 0.0, 0.0, 0.1] });

        for _ in 0..10 {
            s.step(&mut burgers, &mut state, 0.002);
        }
        let size = s.grid.size()[0];
        assert!((NUM_GHOST..size - NUM_GHOST).all(|i| state[i * 5] > 0.0));
        assert!((NUM_GHOST..size - NUM_GHOST).any(|i| state[i * 5 + 1] > 1e-3));
    }

    #[test]
    fn uniform_magnetized_flow_is_stationary() {
        let s = setup(2, Mhd::new(5.0 / 3.0, [[BoundaryMethod::Periodic; 2]; 3]));
        let mut burgers = Burgers::new(&s.launch(), &s.program, SlopeLimiter::MinMod).unwrap();
        let prim = mhd::Primitive {
            density: 1.0,
            velocity: Vector3d::new(0.3, 0.1, 0.0),
            pressure: 1.0,
            magnetic_field: Vector3d::new(0.5, -0.25, 0.1),
        };
        let mut before = vec![0.0; s.grid.volume() * 8];
        before.chunks_mut(8).for_each(|q| prim.to_conserved(5.0 / 3.0, q));
        let mut state = before.clone();
        s.step(&mut burgers, &mut state, 0.002);

        for (a, b) in state.iter().zip(&before) {
            assert!((a - b).abs() < 1e-12);
        }
    }
}
