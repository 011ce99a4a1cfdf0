use serde::{Deserialize, Serialize};
use crate::device::{Device, Kernel};
use crate::equation::Equation;
use crate::error::Result;
use crate::geometry::{Axis, Side};
use crate::grid::{DispatchGeometry, GridDescriptor, NdRange, NUM_GHOST};
use crate::program::Program;




/**
 * How the ghost layers of one face are filled from the interior
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryMethod {
    /// Copy from the opposite edge of the interior.
    Periodic,
    /// Copy from the interior, mirrored about the face.
    Mirror,
    /// Like mirror, with the sign flipped.
    Reflect,
    /// Copy the outermost interior cell.
    FreeFlow,
}




// ============================================================================
impl BoundaryMethod {
    pub const ALL: [BoundaryMethod; 4] = [
        BoundaryMethod::Periodic,
        BoundaryMethod::Mirror,
        BoundaryMethod::Reflect,
        BoundaryMethod::FreeFlow,
    ];

    pub fn index(self) -> usize {
        match self {
            BoundaryMethod::Periodic => 0,
            BoundaryMethod::Mirror   => 1,
            BoundaryMethod::Reflect  => 2,
            BoundaryMethod::FreeFlow => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BoundaryMethod::Periodic => "Periodic",
            BoundaryMethod::Mirror   => "Mirror",
            BoundaryMethod::Reflect  => "Reflect",
            BoundaryMethod::FreeFlow => "FreeFlow",
        }
    }

    /**
     * The name of the program kernel implementing this method on one face.
     */
    pub fn kernel_name(self, axis: Axis, side: Side) -> String {
        format!("stateBoundary{}{}{}", self.name(), axis.name(), side.name())
    }

    /**
     * For ghost layer `layer` (counted outward from the face on the min
     * side, inward toward the face on the max side) of an axis with `n`
     * cells, return the destination and source coordinates and the sign
     * applied to the copied value.
     */
    pub fn source_of(self, side: Side, layer: usize, n: usize) -> (usize, usize, f64) {
        let g = NUM_GHOST;
        match side {
            Side::Min => {
                let dst = layer;
                match self {
                    BoundaryMethod::Periodic => (dst, n - 2 * g + layer, 1.0),
                    BoundaryMethod::Mirror   => (dst, 2 * g - 1 - layer, 1.0),
                    BoundaryMethod::Reflect  => (dst, 2 * g - 1 - layer, -1.0),
                    BoundaryMethod::FreeFlow => (dst, g, 1.0),
                }
            }
            Side::Max => {
                let dst = n - g + layer;
                match self {
                    BoundaryMethod::Periodic => (dst, g + layer, 1.0),
                    BoundaryMethod::Mirror   => (dst, n - g - 1 - layer, 1.0),
                    BoundaryMethod::Reflect  => (dst, n - g - 1 - layer, -1.0),
                    BoundaryMethod::FreeFlow => (dst, n - g - 1, 1.0),
                }
            }
        }
    }
}




/**
 * Bound boundary kernels, indexed by method, axis, and side.
 */
pub struct BoundaryKernelTable {
    kernels: Vec<Kernel>,
    dim: usize,
}




// ============================================================================
impl BoundaryKernelTable {

    pub fn new(program: &Program, dim: usize) -> Result<Self> {
        let mut kernels = Vec::with_capacity(BoundaryMethod::ALL.len() * dim * 2);

        for method in BoundaryMethod::ALL {
            for axis in Axis::ALL.into_iter().take(dim) {
                for side in Side::BOTH {
                    kernels.push(program.kernel(&method.kernel_name(axis, side))?);
                }
            }
        }
        Ok(Self { kernels, dim })
    }

    pub fn get(&self, method: BoundaryMethod, axis: Axis, side: Side) -> &Kernel {
        &self.kernels[(method.index() * self.dim + axis.index()) * 2 + side.index()]
    }
}




/**
 * Applies the boundary conditions of an equation to the state buffer, by
 * launching one boundary kernel per (axis, channel, side) over the face
 * range of that axis.
 */
pub struct BoundaryDispatcher {
    table: BoundaryKernelTable,
    ranges: Vec<NdRange>,
}




// ============================================================================
impl BoundaryDispatcher {

    pub fn new(program: &Program, grid: &GridDescriptor, geometry: &DispatchGeometry) -> Result<Self> {
        Ok(Self {
            table: BoundaryKernelTable::new(program, grid.dim())?,
            ranges: grid.axes().map(|axis| geometry.boundary_range(grid, axis)).collect(),
        })
    }

    pub fn table(&self) -> &BoundaryKernelTable {
        &self.table
    }

    pub fn apply(&self, device: &Device, grid: &GridDescriptor, equation: &dyn Equation, state: &mut [f64]) {
        let num_states = equation.num_states();

        for axis in grid.axes() {
            let range = &self.ranges[axis.index()];

            for channel in 0..num_states {
                for side in Side::BOTH {
                    if let Some(method) = equation.boundary_kernel_for(axis, channel, side) {
                        let kernel = self.table.get(method, axis, side);

                        device.launch_map(kernel, range, state, |item, src, writes| {
                            let n = grid.size()[axis.index()];

                            for layer in 0..NUM_GHOST {
                                let (dst, from, sign) = method.source_of(side, layer, n);
                                let i = grid.linear_index(face_cell(grid.dim(), axis, item, dst));
                                let j = grid.linear_index(face_cell(grid.dim(), axis, item, from));
                                writes.push((i * num_states + channel, sign * src[j * num_states + channel]));
                            }
                        });
                    }
                }
            }
        }
    }
}




/**
 * Map a work item of a face range to the cell at coordinate `along` on the
 * given axis. The work item coordinates run over the other active axes in
 * increasing order.
 */
fn face_cell(dim: usize, axis: Axis, item: [usize; 3], along: usize) -> [usize; 3] {
    let mut index = [0; 3];
    let mut m = 0;

    for n in 0..dim {
        if n == axis.index() {
            index[n] = along;
        } else {
            index[n] = item[m];
            m += 1;
        }
    }
    index
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::equation::euler::Euler;
    use crate::program::{include, ProgramSource};

    fn setup(dim: usize, method: BoundaryMethod) -> (GridDescriptor, Euler, BoundaryDispatcher) {
        let size = [9, 8, 7];
        let grid = GridDescriptor::new(dim, size, [0.0; 3], [1.0; 3]).unwrap();
        let geometry = DispatchGeometry::new(&grid);
        let mut source = ProgramSource::new(&grid, 5, "Superbee", 1.0);
        source.push(include("Roe.cl"));
        source.push(include("Euler.cl"));
        let program = source.build().unwrap();
        let dispatcher = BoundaryDispatcher::new(&program, &grid, &geometry).unwrap();
        let euler = Euler::new(1.4, [[method; 2]; 3]);
        (grid, euler, dispatcher)
    }

    fn numbered_state(grid: &GridDescriptor) -> Vec<f64> {
        (0..grid.volume() * 5).map(|n| n as f64 + 1.0).collect()
    }

    #[test]
    fn boundary_touches_only_face_cells() {
        for dim in 1..=3 {
            for method in BoundaryMethod::ALL {
                let (grid, euler, dispatcher) = setup(dim, method);
                let before = numbered_state(&grid);
                let mut state = before.clone();
                dispatcher.apply(&Device::new(), &grid, &euler, &mut state);

                for index in grid.index_space().iter() {
                    let c = grid.linear_index(index);
                    if !grid.is_ghost(index) {
                        assert_eq!(&state[c * 5..c * 5 + 5], &before[c * 5..c * 5 + 5]);
                    }
                }
                assert_ne!(state, before);
            }
        }
    }

    #[test]
    fn periodic_ghosts_equal_the_opposite_interior() {
        let (grid, euler, dispatcher) = setup(2, BoundaryMethod::Periodic);
        let mut state = numbered_state(&grid);
        dispatcher.apply(&Device::new(), &grid, &euler, &mut state);

        let [nx, ny, _] = grid.size();
        let g = NUM_GHOST;
        for j in g..ny - g {
            for layer in 0..g {
                let ghost_lo = grid.linear_index([layer, j, 0]);
                let inner_hi = grid.linear_index([nx - 2 * g + layer, j, 0]);
                let ghost_hi = grid.linear_index([nx - g + layer, j, 0]);
                let inner_lo = grid.linear_index([g + layer, j, 0]);
                for q in 0..5 {
                    assert_eq!(state[ghost_lo * 5 + q], state[inner_hi * 5 + q]);
                    assert_eq!(state[ghost_hi * 5 + q], state[inner_lo * 5 + q]);
                }
            }
        }
    }

    #[test]
    fn mirror_reflects_only_the_normal_momentum() {
        let (grid, euler, dispatcher) = setup(1, BoundaryMethod::Mirror);
        let mut state = numbered_state(&grid);
        dispatcher.apply(&Device::new(), &grid, &euler, &mut state);

        let ghost = 1;
        let image = 2;
        assert_eq!(state[ghost * 5], state[image * 5]);
        assert_eq!(state[ghost * 5 + 1], -state[image * 5 + 1]);
        assert_eq!(state[ghost * 5 + 2], state[image * 5 + 2]);
    }

    #[test]
    fn free_flow_copies_the_outermost_interior_cell() {
        for side in Side::BOTH {
            for layer in 0..NUM_GHOST {
                let (dst, src, sign) = BoundaryMethod::FreeFlow.source_of(side, layer, 10);
                assert_eq!(sign, 1.0);
                match side {
                    Side::Min => assert_eq!((dst, src), (layer, 2)),
                    Side::Max => assert_eq!((dst, src), (8 + layer, 7)),
                }
            }
        }
    }
}
