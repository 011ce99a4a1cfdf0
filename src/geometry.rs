use serde::{Deserialize, Serialize};




/**
 * Identifier for a Cartesian axis
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}




// ============================================================================
impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 3]
    }

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Return 1.0 if the two axes are the same, and 0.0 otherwise.
    pub fn along(self, other: Axis) -> f64 {
        if self == other {
            1.0
        } else {
            0.0
        }
    }

    /// The two transverse axes, in cyclic order: (y, z) for x, (z, x) for y,
    /// and (x, y) for z. The triple (self, t1, t2) is right-handed.
    pub fn transverse(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::Z, Axis::X),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        }
    }
}




/**
 * The low or high face of the domain along some axis
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Min,
    Max,
}




// ============================================================================
impl Side {
    pub const BOTH: [Side; 2] = [Side::Min, Side::Max];

    pub fn index(self) -> usize {
        match self {
            Side::Min => 0,
            Side::Max => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Side::Min => "Min",
            Side::Max => "Max",
        }
    }
}




/**
 * A 3D vector
 */
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector3d(pub f64, pub f64, pub f64);




// ============================================================================
impl Vector3d {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vector3d(x, y, z)
    }

    pub fn from_slice(v: &[f64]) -> Self {
        Vector3d(v[0], v[1], v[2])
    }

    pub fn component(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.0,
            Axis::Y => self.1,
            Axis::Z => self.2,
        }
    }

    pub fn dot(&self, other: &Vector3d) -> f64 {
        self.0 * other.0 + self.1 * other.1 + self.2 * other.2
    }

    pub fn norm_squared(&self) -> f64 {
        self.dot(self)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::Axis;

    #[test]
    fn transverse_axes_are_cyclic() {
        assert_eq!(Axis::X.transverse(), (Axis::Y, Axis::Z));
        assert_eq!(Axis::Y.transverse(), (Axis::Z, Axis::X));
        assert_eq!(Axis::Z.transverse(), (Axis::X, Axis::Y));
        assert_eq!(Axis::Y.along(Axis::Y), 1.0);
        assert_eq!(Axis::Y.along(Axis::Z), 0.0);
    }
}
