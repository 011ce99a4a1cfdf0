use crate::device::{Device, Kernel};
use crate::geometry::Axis;
use crate::grid::{GridDescriptor, NdRange, NUM_GHOST};




/**
 * Finite-difference stencils over the interior cells of a grid, shared by
 * the Poisson solvers. Neighbors of an interior cell wrap around the
 * interior on periodic axes and are clamped to the interior edge on the
 * others, so ghost cells are never read.
 */
#[derive(Clone, Debug)]
pub struct PoissonStencil {
    dim: usize,
    size: [usize; 3],
    dx: [f64; 3],
    periodic: [bool; 3],
}




// ============================================================================
impl PoissonStencil {

    pub fn new(grid: &GridDescriptor, periodic: [bool; 3]) -> Self {
        Self {
            dim: grid.dim(),
            size: grid.size(),
            dx: grid.cell_spacing(),
            periodic,
        }
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic[..self.dim].iter().all(|&p| p)
    }

    /**
     * The coordinate `offset` cells away from `i` along an axis, kept within
     * the interior.
     */
    fn shift(&self, axis: Axis, i: usize, offset: isize) -> usize {
        let n = axis.index();
        let lo = NUM_GHOST as isize;
        let hi = (self.size[n] - NUM_GHOST) as isize;
        let j = i as isize + offset;

        if self.periodic[n] {
            (lo + (j - lo).rem_euclid(hi - lo)) as usize
        } else {
            j.clamp(lo, hi - 1) as usize
        }
    }

    /// Linear index of the neighbor `offset` cells away along `axis`.
    pub fn neighbor(&self, index: [usize; 3], axis: Axis, offset: isize) -> usize {
        let mut index = index;
        index[axis.index()] = self.shift(axis, index[axis.index()], offset);
        index[0] + self.size[0] * (index[1] + self.size[1] * index[2])
    }

    /// Central difference of a scalar field along an axis.
    pub fn gradient(&self, field: &[f64], index: [usize; 3], axis: Axis) -> f64 {
        let hi = field[self.neighbor(index, axis, 1)];
        let lo = field[self.neighbor(index, axis, -1)];
        (hi - lo) / (2.0 * self.dx[axis.index()])
    }

    pub fn axes(&self) -> impl Iterator<Item = Axis> {
        Axis::ALL.into_iter().take(self.dim)
    }

    /**
     * One Jacobi sweep of grad^2 phi = rhs, with second differences taken
     * between cells `spacing` apart. Reads `phi`, writes `out`; ghost cells
     * of `out` take the value of `phi`.
     */
    #[allow(clippy::too_many_arguments)]
    pub fn jacobi_sweep(
        &self,
        device: &Device,
        kernel: &Kernel,
        grid: &GridDescriptor,
        range: &NdRange,
        spacing: isize,
        rhs: &[f64],
        phi: &[f64],
        out: &mut [f64])
    {
        device.launch(kernel, range, out, 1, |index, out| {
            let c = grid.linear_index(index);

            if grid.is_ghost(index) {
                out[0] = phi[c];
                return;
            }
            let mut sum = 0.0;
            let mut weight = 0.0;

            for axis in self.axes() {
                let h = spacing as f64 * self.dx[axis.index()];
                let w = 1.0 / (h * h);
                sum += w * (phi[self.neighbor(index, axis, spacing)] + phi[self.neighbor(index, axis, -spacing)]);
                weight += 2.0 * w;
            }
            out[0] = (sum - rhs[c]) / weight;
        });
    }
}
