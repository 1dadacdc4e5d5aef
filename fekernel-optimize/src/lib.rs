/// Calculus helper traits and numerical differentiation
pub mod calculus;
/// Newton's method for systems of non-linear equations
pub mod newton;
