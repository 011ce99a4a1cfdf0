//! Hydrogrid is a finite-volume solver for time-dependent systems of
//! hyperbolic conservation laws on structured 1D, 2D, and 3D grids. It
//! advances Euler gas dynamics, magnetohydrodynamics, electromagnetics,
//! special-relativistic hydrodynamics, and the ADM3D formulation of
//! numerical relativity. Equations, numerical schemes (Roe-type and
//! Burgers-split), and time integrators are pluggable. Kernels are launched
//! over N-dimensional index ranges on a data-parallel device, and the
//! device program is assembled from text and built ahead of any launch.

pub mod boundary;
pub mod config;
pub mod device;
pub mod divergence;
pub mod equation;
pub mod error;
pub mod geometry;
pub mod grid;
pub mod index_space;
pub mod integrator;
pub mod persistence;
pub mod poisson;
pub mod problems;
pub mod program;
pub mod reduce;
pub mod scheme;
pub mod self_gravity;
pub mod solver;

pub use error::{Error, Result};
pub use solver::Solver;
