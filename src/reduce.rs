use crate::device::{Buffer, Device, Kernel};
use crate::error::Result;
use crate::grid::NdRange;
use crate::program::Program;

/// Number of elements each work item folds into one, per reduction round.
pub const REDUCE_RADIX: usize = 16;




/**
 * Parallel tree reduction of the per-cell CFL buffer down to its minimum.
 *
 * The CFL buffer is seeded with `f64::MAX` before every CFL pass, and CFL
 * kernels never write ghost cells, so only interior cells can supply the
 * minimum. Reduction rounds alternate between the CFL buffer and the swap
 * buffer; the final round writes the one-element result.
 */
pub struct TimestepReducer {
    cfl: Buffer,
    swap: Buffer,
    result: Buffer,
    kernel: Kernel,
    local_size_1d: usize,
}




// ============================================================================
impl TimestepReducer {

    pub fn new(device: &Device, program: &Program, volume: usize, local_size_1d: usize) -> Result<Self> {
        let mut cfl = device.alloc(volume, "TimestepReducer::cfl");
        device.fill(&mut cfl, f64::MAX);

        Ok(Self {
            cfl,
            swap: device.alloc(next_reduce_size(volume).max(1), "TimestepReducer::swap"),
            result: device.alloc(1, "TimestepReducer::result"),
            kernel: program.kernel("findMinTimestepReduce")?,
            local_size_1d,
        })
    }

    pub fn cfl_buffer(&self) -> &Buffer {
        &self.cfl
    }

    /**
     * Reseed the CFL buffer and return it, for the scheme's CFL kernel to
     * fill in.
     */
    pub fn reset(&mut self, device: &Device) -> &mut Buffer {
        device.fill(&mut self.cfl, f64::MAX);
        &mut self.cfl
    }

    /**
     * Reduce the CFL buffer to its minimum. Overwrites the CFL buffer.
     */
    pub fn find_min(&mut self, device: &Device) -> f64 {
        let mut size = self.cfl.len();
        let mut from_cfl = true;

        if size == 1 {
            self.result[0] = self.cfl[0];
        }

        while size > 1 {
            let next = next_reduce_size(size);
            let range = NdRange::new(&[next], &[self.local_size_1d]);

            let (src, dst): (&[f64], &mut [f64]) = if next == 1 {
                if from_cfl {
                    (&self.cfl[..size], &mut self.result[..])
                } else {
                    (&self.swap[..size], &mut self.result[..])
                }
            } else if from_cfl {
                (&self.cfl[..size], &mut self.swap[..next])
            } else {
                (&self.swap[..size], &mut self.cfl[..next])
            };

            device.launch(&self.kernel, &range, dst, 1, |[n, _, _], out| {
                let lo = n * REDUCE_RADIX;
                let hi = (lo + REDUCE_RADIX).min(size);
                out[0] = src[lo..hi].iter().cloned().fold(f64::MAX, f64::min);
            });

            from_cfl = !from_cfl;
            size = next;
        }

        let mut dt = [0.0];
        device.read_buffer(&self.result, &mut dt);
        dt[0]
    }

    /**
     * The stable time step: the reduced minimum scaled by the CFL safety
     * factor.
     */
    pub fn calc_timestep(&mut self, device: &Device, cfl: f64) -> f64 {
        self.find_min(device) * cfl
    }
}




/**
 * Number of elements left after one reduction round.
 */
pub fn next_reduce_size(size: usize) -> usize {
    (size >> 4) + (size & (REDUCE_RADIX - 1) != 0) as usize
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::*;
    use crate::grid::GridDescriptor;
    use crate::program::{include, ProgramSource};

    fn reducer(device: &Device, volume: usize) -> TimestepReducer {
        let grid = GridDescriptor::new(1, [8, 1, 1], [0.0; 3], [1.0; 3]).unwrap();
        let mut source = ProgramSource::new(&grid, 5, "Superbee", 1.0);
        source.push(include("Roe.cl"));
        let program = source.build().unwrap();
        TimestepReducer::new(device, &program, volume, 16).unwrap()
    }

    #[test]
    fn round_sizes_are_rounded_up() {
        assert_eq!(next_reduce_size(1), 1);
        assert_eq!(next_reduce_size(15), 1);
        assert_eq!(next_reduce_size(16), 1);
        assert_eq!(next_reduce_size(17), 2);
        assert_eq!(next_reduce_size(257), 17);
    }

    #[test]
    fn reduction_finds_the_planted_minimum() {
        let device = Device::new();

        for n in [1, 15, 16, 17, 255, 256, 257] {
            for planted in [0, n / 2, n - 1] {
                let mut r = reducer(&device, n);
                let cfl = r.reset(&device);
                for (i, x) in cfl.iter_mut().enumerate() {
                    *x = 1.0 + (i % 7) as f64;
                }
                cfl[planted] = 0.25;
                assert_eq!(r.calc_timestep(&device, 0.5), 0.125, "n = {}, planted at {}", n, planted);
            }
        }
    }

    #[test]
    fn unwritten_cells_never_win() {
        let device = Device::new();
        let mut r = reducer(&device, 100);
        let cfl = r.reset(&device);
        cfl[40] = 3.0;
        assert_eq!(r.find_min(&device), 3.0);

        // a second pass starts from a freshly seeded buffer
        r.reset(&device)[41] = 5.0;
        assert_eq!(r.find_min(&device), 5.0);
    }
}
