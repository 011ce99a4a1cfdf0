use core::ops::Range;
use crate::geometry::{Axis, Side};




#[derive(Clone, Debug, PartialEq, Eq)]


/**
 * Represents a rectangular region in a discrete 3D index space. Unused axes
 * of lower-dimensional grids have the range `0..1`.
 */
pub struct IndexSpace {
    di: Range<usize>,
    dj: Range<usize>,
    dk: Range<usize>,
}




/**
 * Describes a rectangular index space. The index type is an unsigned cell
 * coordinate.
 */
impl IndexSpace {


    pub fn new(di: Range<usize>, dj: Range<usize>, dk: Range<usize>) -> Self {

        assert!(
            di.start <= di.end && dj.start <= dj.end && dk.start <= dk.end,
            "index space has negative volume");

        Self { di, dj, dk }
    }


    /**
     * Return the index space covering a whole grid of the given shape.
     */
    pub fn of_shape(shape: [usize; 3]) -> Self {
        Self::new(0..shape[0], 0..shape[1], 0..shape[2])
    }


    /**
     * Return the number of indexes on each axis.
     */
    pub fn dim(&self) -> [usize; 3] {
        [self.di.end - self.di.start,
         self.dj.end - self.dj.start,
         self.dk.end - self.dk.start]
    }


    /**
     * Return the number of elements in this index space.
     */
    pub fn len(&self) -> usize {
        let [l, m, n] = self.dim();
        l * m * n
    }


    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /**
     * Return the minimum index (inclusive).
     */
    pub fn start(&self) -> [usize; 3] {
        [self.di.start, self.dj.start, self.dk.start]
    }


    /**
     * Return the maximum index (exclusive).
     */
    pub fn end(&self) -> [usize; 3] {
        [self.di.end, self.dj.end, self.dk.end]
    }


    fn range(&self, axis: Axis) -> &Range<usize> {
        match axis {
            Axis::X => &self.di,
            Axis::Y => &self.dj,
            Axis::Z => &self.dk,
        }
    }


    fn with_range(&self, axis: Axis, range: Range<usize>) -> Self {
        match axis {
            Axis::X => Self::new(range, self.dj.clone(), self.dk.clone()),
            Axis::Y => Self::new(self.di.clone(), range, self.dk.clone()),
            Axis::Z => Self::new(self.di.clone(), self.dj.clone(), range),
        }
    }


    /**
     * Determine whether this index space contains the given index.
     */
    pub fn contains(&self, index: [usize; 3]) -> bool {
        self.di.contains(&index[0]) && self.dj.contains(&index[1]) && self.dk.contains(&index[2])
    }


    /**
     * Trim this index space by the given number of elements on both ends of
     * the given axis.
     */
    pub fn trim(&self, delta: usize, axis: Axis) -> Self {
        let r = self.range(axis);
        self.with_range(axis, r.start + delta .. r.end.saturating_sub(delta).max(r.start + delta))
    }


    /**
     * Return the slab of `depth` layers at the low or high end of the given
     * axis.
     */
    pub fn face(&self, axis: Axis, side: Side, depth: usize) -> Self {
        let r = self.range(axis);
        match side {
            Side::Min => self.with_range(axis, r.start .. (r.start + depth).min(r.end)),
            Side::Max => self.with_range(axis, r.end.saturating_sub(depth).max(r.start) .. r.end),
        }
    }


    /**
     * Return the linear offset for the given index, in a memory buffer
     * aligned with the start of this index space, where the first index
     * increases fastest.
     */
    pub fn linear_offset(&self, index: [usize; 3]) -> usize {
        let [l, m, _] = self.dim();
        let i = index[0] - self.di.start;
        let j = index[1] - self.dj.start;
        let k = index[2] - self.dk.start;
        i + l * (j + m * k)
    }


    /**
     * Return an iterator which traverses the index space with the first
     * index increasing fastest (Fortran-like), matching the memory order of
     * the state buffer.
     */
    pub fn iter(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.dk.clone().flat_map(move |k| {
            self.dj.clone().flat_map(move |j| self.di.clone().map(move |i| [i, j, k]))
        })
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::IndexSpace;
    use crate::geometry::{Axis, Side};

    #[test]
    fn iteration_is_x_fastest_and_matches_linear_offset() {
        let space = IndexSpace::new(2..5, 1..3, 0..2);
        for (n, index) in space.iter().enumerate() {
            assert_eq!(space.linear_offset(index), n);
        }
        assert_eq!(space.iter().count(), space.len());
        assert_eq!(space.iter().next(), Some([2, 1, 0]));
        assert_eq!(space.iter().nth(1), Some([3, 1, 0]));
    }

    #[test]
    fn faces_and_trims_have_the_right_extent() {
        let space = IndexSpace::of_shape([10, 6, 1]);
        assert_eq!(space.face(Axis::X, Side::Min, 2).dim(), [2, 6, 1]);
        assert_eq!(space.face(Axis::X, Side::Max, 2).start(), [8, 0, 0]);
        assert_eq!(space.face(Axis::Y, Side::Max, 2).start(), [0, 4, 0]);
        assert_eq!(space.trim(2, Axis::X).trim(2, Axis::Y).dim(), [6, 2, 1]);
    }
}
