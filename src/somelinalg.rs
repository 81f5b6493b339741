//! some linear algebra used by the implicit methods
/// sparse matrix assembly in triplet form
pub mod triplet;
/// dense and sparse LU solvers (real and complex) behind one trait
pub mod linear_solvers;
