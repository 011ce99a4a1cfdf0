use crate::device::{Buffer, Device, Kernel};
use crate::equation::FluidLayout;
use crate::error::Result;
use crate::grid::GridDescriptor;
use crate::poisson::PoissonStencil;
use crate::program::Program;
use crate::scheme::LaunchContext;




/**
 * Projection of the magnetic field onto its divergence-free part. Solves
 * grad^2 phi = div B with the same central differences used for the
 * divergence (a Laplacian of width 2 dx), then subtracts grad phi from B.
 * The potential starts from zero every step.
 */
pub struct DivergenceCleaning {
    iterations: usize,
    stencil: PoissonStencil,
    divergence: Buffer,
    potential: Buffer,
    swap: Buffer,
    divergence_kernel: Kernel,
    poisson_relax: Kernel,
    remove_divergence: Kernel,
}




// ============================================================================
impl DivergenceCleaning {

    pub fn new(device: &Device, program: &Program, grid: &GridDescriptor, iterations: usize, periodic: [bool; 3]) -> Result<Self> {
        Ok(Self {
            iterations,
            stencil: PoissonStencil::new(grid, periodic),
            divergence: device.alloc(grid.volume(), "DivergenceCleaning::divergence"),
            potential: device.alloc(grid.volume(), "DivergenceCleaning::potential"),
            swap: device.alloc(grid.volume(), "DivergenceCleaning::potential_swap"),
            divergence_kernel: program.kernel("calcMagneticFieldDivergence")?,
            poisson_relax: program.kernel("magneticPotentialPoissonRelax")?,
            remove_divergence: program.kernel("magneticFieldRemoveDivergence")?,
        })
    }

    /// div B of the state passed to the most recent `clean`, before
    /// cleaning.
    pub fn divergence(&self) -> &[f64] {
        &self.divergence
    }

    /**
     * Central-difference div B of each interior cell. Ghost cells get zero.
     */
    pub fn calc_divergence(&mut self, launch: &LaunchContext, layout: &FluidLayout, state: &[f64]) {
        let b = match layout.magnetic {
            Some(b) => b,
            None => return,
        };
        let grid = launch.grid;
        let dx = grid.cell_spacing();
        let n = launch.equation.num_states();
        let stencil = &self.stencil;

        launch.device.launch(&self.divergence_kernel, &launch.geometry.global_size, &mut self.divergence[..], 1, |index, out| {
            out[0] = if grid.is_ghost(index) {
                0.0
            } else {
                stencil.axes().map(|axis| {
                    let hi = state[stencil.neighbor(index, axis, 1) * n + b[axis.index()]];
                    let lo = state[stencil.neighbor(index, axis, -1) * n + b[axis.index()]];
                    (hi - lo) / (2.0 * dx[axis.index()])
                }).sum()
            };
        });
    }

    pub fn clean(&mut self, launch: &LaunchContext, layout: &FluidLayout, state: &mut [f64]) {
        let b = match layout.magnetic {
            Some(b) => b,
            None => return,
        };
        self.calc_divergence(launch, layout, state);

        let grid = launch.grid;
        let range = &launch.geometry.global_size;
        let n = launch.equation.num_states();
        launch.device.fill(&mut self.potential, 0.0);

        for _ in 0..self.iterations {
            self.swap.copy_from_slice(&self.potential);
            self.stencil.jacobi_sweep(
                launch.device,
                &self.poisson_relax,
                grid,
                range,
                2,
                &self.divergence,
                &self.swap,
                &mut self.potential);
        }

        let stencil = &self.stencil;
        let phi: &[f64] = &self.potential;

        launch.device.launch(&self.remove_divergence, range, state, n, |index, q| {
            if !grid.is_ghost(index) {
                for axis in stencil.axes() {
                    q[b[axis.index()]] -= stencil.gradient(phi, index, axis);
                }
            }
        });
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::f64::consts::PI;
    use super::*;
    use crate::boundary::BoundaryMethod;
    use crate::equation::mhd::{Mhd, Primitive};
    use crate::equation::Equation;
    use crate::geometry::Vector3d;
    use crate::grid::{DispatchGeometry, NUM_GHOST};
    use crate::program::{include, ProgramSource};

    /// Largest |div B| over interior cells whose neighbors are all interior.
    fn max_divergence(grid: &GridDescriptor, state: &[f64]) -> f64 {
        let dx = grid.cell_spacing();
        let mut max: f64 = 0.0;

        for i in NUM_GHOST + 1..grid.size()[0] - NUM_GHOST - 1 {
            for j in NUM_GHOST + 1..grid.size()[1] - NUM_GHOST - 1 {
                let b = |i: usize, j: usize, k: usize| state[grid.linear_index([i, j, 0]) * 8 + 5 + k];
                let div = (b(i + 1, j, 0) - b(i - 1, j, 0)) / (2.0 * dx[0]) + (b(i, j + 1, 1) - b(i, j - 1, 1)) / (2.0 * dx[1]);
                max = max.max(div.abs());
            }
        }
        max
    }

    #[test]
    fn cleaning_reduces_the_divergence() {
        let grid = GridDescriptor::new(2, [20, 20, 1], [-0.125; 3], [1.125; 3]).unwrap();
        let geometry = DispatchGeometry::new(&grid);
        let mhd = Mhd::new(5.0 / 3.0, [[BoundaryMethod::Periodic; 2]; 3]);
        let mut source = ProgramSource::new(&grid, 8, "Superbee", 1.0);
        source.push(include("Roe.cl"));
        source.push(include("MHD.cl"));
        source.push(include("DivFree.cl"));
        let program = source.build().unwrap();
        let device = Device::new();
        let launch = LaunchContext { device: &device, grid: &grid, geometry: &geometry, equation: &mhd };
        let layout = mhd.fluid_layout().unwrap();

        let mut state = vec![0.0; grid.volume() * 8];
        for (c, q) in state.chunks_mut(8).enumerate() {
            let [x, y, _] = grid.cell_center(grid.coords(c));
            let prim = Primitive {
                density: 1.0,
                velocity: Vector3d::new(0.0, 0.0, 0.0),
                pressure: 1.0,
                magnetic_field: Vector3d::new((2.0 * PI * x).sin(), 0.5 * (2.0 * PI * y).cos(), 0.0),
            };
            prim.to_conserved(5.0 / 3.0, q);
        }
        let before = max_divergence(&grid, &state);

        let mut cleaning = DivergenceCleaning::new(&device, &program, &grid, 20, [true; 3]).unwrap();
        cleaning.clean(&launch, &layout, &mut state);
        let after = max_divergence(&grid, &state);

        assert!(before > 1.0);
        assert!(after < 0.25 * before, "before {} after {}", before, after);
    }
}
