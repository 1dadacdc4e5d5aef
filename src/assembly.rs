//! Drivers that run a kernel over many integration points.
//!
//! [`ElementAssembler`] evaluates one element at a time: it interpolates nodal values to the
//! quadrature points, evaluates materials and accumulates the weighted point contributions of
//! every (test, trial) node pair into element vectors and matrices.
//! [`evaluate_points_par`] evaluates a batch of pre-interpolated points in parallel, giving each
//! worker exclusive ownership of the per-point outputs.
//!
//! Element and global numbering, quadrature rules, shape function evaluation and solvers remain
//! the caller's responsibility.
mod element;
mod points;

pub use element::*;
pub use points::*;
