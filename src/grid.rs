use crate::error::{Error, Result};
use crate::geometry::{Axis, Side};
use crate::index_space::IndexSpace;

/// Number of ghost layers at each end of every active axis. The ghost cells
/// live inside the grid and are written by the boundary kernels.
pub const NUM_GHOST: usize = 2;




/// A simple rectilinear structured mesh in one, two, or three dimensions.
/// Unused axes have a single cell.
///
#[derive(Clone, Debug, PartialEq)]
pub struct GridDescriptor {
    dim: usize,
    size: [usize; 3],
    xmin: [f64; 3],
    xmax: [f64; 3],
    dx: [f64; 3],
}

impl GridDescriptor {
    pub fn new(dim: usize, size: [usize; 3], xmin: [f64; 3], xmax: [f64; 3]) -> Result<Self> {
        if !(1..=3).contains(&dim) {
            return Err(Error::config(format!("can't handle dim {}", dim)));
        }
        let mut size = size;
        let mut dx = [1.0; 3];

        for n in 0..3 {
            if n >= dim {
                size[n] = 1;
            } else if size[n] < 2 * NUM_GHOST + 1 {
                return Err(Error::config(format!(
                    "axis {} has {} cells, need at least {}",
                    n, size[n], 2 * NUM_GHOST + 1)));
            }
            if !(xmax[n] > xmin[n]) {
                return Err(Error::config(format!(
                    "axis {} has empty extent {}..{}", n, xmin[n], xmax[n])));
            }
            dx[n] = (xmax[n] - xmin[n]) / size[n] as f64;
        }
        Ok(Self { dim, size, xmin, xmax, dx })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    pub fn xmin(&self) -> [f64; 3] {
        self.xmin
    }

    pub fn xmax(&self) -> [f64; 3] {
        self.xmax
    }

    pub fn cell_spacing(&self) -> [f64; 3] {
        self.dx
    }

    pub fn volume(&self) -> usize {
        self.size[0] * self.size[1] * self.size[2]
    }

    /// The active axes, in order.
    pub fn axes(&self) -> impl Iterator<Item = Axis> {
        Axis::ALL.into_iter().take(self.dim)
    }

    pub fn cell_center(&self, index: [usize; 3]) -> [f64; 3] {
        let mut x = [0.0; 3];
        for n in 0..3 {
            x[n] = (self.xmax[n] - self.xmin[n]) * (index[n] as f64 + 0.5) / self.size[n] as f64 + self.xmin[n];
        }
        x
    }

    /// Memory step between neighboring cells along the given axis.
    pub fn stride(&self, axis: Axis) -> usize {
        match axis {
            Axis::X => 1,
            Axis::Y => self.size[0],
            Axis::Z => self.size[0] * self.size[1],
        }
    }

    pub fn linear_index(&self, index: [usize; 3]) -> usize {
        index[0] + self.size[0] * (index[1] + self.size[1] * index[2])
    }

    pub fn coords(&self, linear: usize) -> [usize; 3] {
        let i = linear % self.size[0];
        let j = (linear / self.size[0]) % self.size[1];
        let k = linear / (self.size[0] * self.size[1]);
        [i, j, k]
    }

    pub fn index_space(&self) -> IndexSpace {
        IndexSpace::of_shape(self.size)
    }

    /// The cells which are not ghost cells on any active axis.
    pub fn interior(&self) -> IndexSpace {
        self.axes().fold(self.index_space(), |space, axis| space.trim(NUM_GHOST, axis))
    }

    pub fn is_ghost(&self, index: [usize; 3]) -> bool {
        self.axes().any(|axis| {
            let n = axis.index();
            index[n] < NUM_GHOST || index[n] >= self.size[n] - NUM_GHOST
        })
    }

    /// The ghost layers on one face of the domain.
    pub fn face(&self, axis: Axis, side: Side) -> IndexSpace {
        self.index_space().face(axis, side, NUM_GHOST)
    }
}




/**
 * An N-dimensional launch range, in the style of a compute device's NDRange.
 * Work item `n` of a launch has coordinates `offset + unravel(n, global)`
 * with the first coordinate increasing fastest.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NdRange {
    dims: usize,
    offset: [usize; 3],
    global: [usize; 3],
    local: [usize; 3],
}




// ============================================================================
impl NdRange {

    pub fn new(global: &[usize], local: &[usize]) -> Self {
        assert!(!global.is_empty() && global.len() <= 3 && global.len() == local.len());
        let mut g = [1; 3];
        let mut l = [1; 3];
        g[..global.len()].copy_from_slice(global);
        l[..local.len()].copy_from_slice(local);
        Self { dims: global.len(), offset: [0; 3], global: g, local: l }
    }

    pub fn with_offset(mut self, offset: [usize; 3]) -> Self {
        self.offset = offset;
        self
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn global(&self) -> &[usize] {
        &self.global[..self.dims]
    }

    pub fn local(&self) -> &[usize] {
        &self.local[..self.dims]
    }

    pub fn offset(&self) -> [usize; 3] {
        self.offset
    }

    pub fn volume(&self) -> usize {
        self.global.iter().product()
    }

    /// Number of work items per work group.
    pub fn group_volume(&self) -> usize {
        self.local.iter().product()
    }

    pub fn work_item(&self, n: usize) -> [usize; 3] {
        let [g0, g1, _] = self.global;
        [
            self.offset[0] + n % g0,
            self.offset[1] + (n / g0) % g1,
            self.offset[2] + n / (g0 * g1),
        ]
    }
}




/**
 * Work partitioning for kernels launched over the whole grid.
 */
#[derive(Clone, Debug)]
pub struct DispatchGeometry {
    pub global_size: NdRange,
    pub local_size_1d: usize,
}




// ============================================================================
impl DispatchGeometry {

    pub fn new(grid: &GridDescriptor) -> Self {
        let s = grid.size();
        let global_size = match grid.dim() {
            1 => NdRange::new(&[s[0]], &[16]),
            2 => NdRange::new(&[s[0], s[1]], &[16, 16]),
            _ => NdRange::new(&[s[0], s[1], s[2]], &[8, 8, 8]),
        };
        let local_size_1d = global_size.local()[0];
        Self { global_size, local_size_1d }
    }

    /**
     * The launch range for a boundary kernel on the faces normal to `axis`.
     * One work item per transverse cell column; each item writes every ghost
     * layer along `axis`.
     */
    pub fn boundary_range(&self, grid: &GridDescriptor, axis: Axis) -> NdRange {
        let s = grid.size();
        match grid.dim() {
            1 => NdRange::new(&[1], &[1]),
            2 => {
                let other = 1 - axis.index();
                NdRange::new(&[s[other]], &[self.local_size_1d])
            }
            _ => {
                let (t1, t2) = match axis {
                    Axis::X => (1, 2),
                    Axis::Y => (0, 2),
                    Axis::Z => (0, 1),
                };
                let local = self.global_size.local();
                NdRange::new(&[s[t1], s[t2]], &[local[0], local[1]])
            }
        }
    }
}
