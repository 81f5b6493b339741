//! examples of usage of RustedODE
/// explicit, Backward-Euler and Radau5 solvers on classic test problems
pub mod ode_examples;
