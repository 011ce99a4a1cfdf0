use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use log::debug;
use rayon::prelude::*;
use crate::grid::NdRange;




/**
 * A named, fixed-length block of device memory. The length is set at
 * allocation and never changes, so the memory identity of a buffer is stable
 * for its whole lifetime.
 */
#[derive(Clone, Debug)]
pub struct Buffer<T = f64> {
    name: String,
    data: Vec<T>,
}




// ============================================================================
impl<T> Buffer<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }
}

impl<T> Deref for Buffer<T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for Buffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}




/**
 * A handle to a kernel of a built program.
 */
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Kernel {
    name: String,
}




// ============================================================================
impl Kernel {
    pub(crate) fn new(name: &str) -> Self {
        Self { name: name.to_string() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}




/**
 * A data-parallel compute device backed by the rayon thread pool. Each
 * launch maps a kernel over the work items of an `NdRange` and returns only
 * when every work item has finished, so launches execute in issue order.
 * Work items are scheduled in chunks no smaller than the local work group.
 */
#[derive(Debug, Default)]
pub struct Device {
    allocated: AtomicUsize,
    launches: AtomicU64,
}




// ============================================================================
impl Device {

    pub fn new() -> Self {
        Self::default()
    }

    /**
     * Allocate a zero-initialized buffer of `len` elements.
     */
    pub fn alloc<T: Clone + Default>(&self, len: usize, name: &str) -> Buffer<T> {
        let size = len * std::mem::size_of::<T>();
        let total = self.allocated.fetch_add(size, Ordering::Relaxed) + size;
        debug!("allocating device mem {} size {} running total {}", name, size, total);
        Buffer { name: name.to_string(), data: vec![T::default(); len] }
    }

    /// Total number of bytes allocated on this device so far.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Total number of kernel launches issued so far.
    pub fn launch_count(&self) -> u64 {
        self.launches.load(Ordering::Relaxed)
    }

    fn record(&self, kernel: &Kernel, range: &NdRange) {
        self.launches.fetch_add(1, Ordering::Relaxed);
        log::trace!("launch {} over {:?}", kernel.name(), range.global());
    }

    /**
     * Launch a kernel which writes `stride` contiguous elements of `out` per
     * work item. Work item `n` owns `out[n * stride .. (n + 1) * stride]`.
     */
    pub fn launch<T, F>(&self, kernel: &Kernel, range: &NdRange, out: &mut [T], stride: usize, f: F)
    where
        T: Send,
        F: Fn([usize; 3], &mut [T]) + Sync,
    {
        assert_eq!(out.len(), range.volume() * stride, "kernel {} output has wrong size", kernel.name());
        self.record(kernel, range);

        out.par_chunks_mut(stride)
            .with_min_len(range.group_volume())
            .enumerate()
            .for_each(|(n, item)| f(range.work_item(n), item));
    }

    /**
     * Launch a kernel with two outputs, each partitioned per work item by
     * its own stride.
     */
    pub fn launch2<A, B, F>(&self, kernel: &Kernel, range: &NdRange, a: (&mut [A], usize), b: (&mut [B], usize), f: F)
    where
        A: Send,
        B: Send,
        F: Fn([usize; 3], &mut [A], &mut [B]) + Sync,
    {
        assert_eq!(a.0.len(), range.volume() * a.1);
        assert_eq!(b.0.len(), range.volume() * b.1);
        self.record(kernel, range);

        a.0.par_chunks_mut(a.1)
            .zip(b.0.par_chunks_mut(b.1))
            .with_min_len(range.group_volume())
            .enumerate()
            .for_each(|(n, (a, b))| f(range.work_item(n), a, b));
    }

    pub fn launch3<A, B, C, F>(
        &self,
        kernel: &Kernel,
        range: &NdRange,
        a: (&mut [A], usize),
        b: (&mut [B], usize),
        c: (&mut [C], usize),
        f: F)
    where
        A: Send,
        B: Send,
        C: Send,
        F: Fn([usize; 3], &mut [A], &mut [B], &mut [C]) + Sync,
    {
        assert_eq!(a.0.len(), range.volume() * a.1);
        assert_eq!(b.0.len(), range.volume() * b.1);
        assert_eq!(c.0.len(), range.volume() * c.1);
        self.record(kernel, range);

        a.0.par_chunks_mut(a.1)
            .zip(b.0.par_chunks_mut(b.1))
            .zip(c.0.par_chunks_mut(c.1))
            .with_min_len(range.group_volume())
            .enumerate()
            .for_each(|(n, ((a, b), c))| f(range.work_item(n), a, b, c));
    }

    /**
     * Launch a kernel which reads `data` and writes scattered elements of
     * it. Every work item returns its (index, value) writes; they are
     * applied once all work items have finished. Used by kernels, like the
     * boundary conditions, whose writes do not line up with the range.
     */
    pub fn launch_map<F>(&self, kernel: &Kernel, range: &NdRange, data: &mut [f64], f: F)
    where
        F: Fn([usize; 3], &[f64], &mut Vec<(usize, f64)>) + Sync,
    {
        self.record(kernel, range);

        let writes: Vec<(usize, f64)> = {
            let src: &[f64] = data;
            (0..range.volume())
                .into_par_iter()
                .with_min_len(range.group_volume())
                .flat_map_iter(|n| {
                    let mut w = Vec::new();
                    f(range.work_item(n), src, &mut w);
                    w
                })
                .collect()
        };
        for (i, v) in writes {
            data[i] = v;
        }
    }

    pub fn fill<T: Copy + Send + Sync>(&self, buffer: &mut [T], value: T) {
        buffer.par_iter_mut().for_each(|x| *x = value);
    }

    /**
     * Upload host data into a device buffer, in one transfer.
     */
    pub fn write_buffer<T: Copy>(&self, buffer: &mut Buffer<T>, data: &[T]) {
        assert_eq!(buffer.len(), data.len(), "write to {} has wrong size", buffer.name());
        buffer.data.copy_from_slice(data);
    }

    /**
     * Download a device buffer into host memory. This is a synchronization
     * point.
     */
    pub fn read_buffer<T: Copy>(&self, buffer: &Buffer<T>, data: &mut [T]) {
        self.finish();
        data.copy_from_slice(&buffer.data[..data.len()]);
    }

    /**
     * Block until every issued launch has completed. Launches are
     * synchronous, so there is never outstanding work.
     */
    pub fn finish(&self) {}
}
