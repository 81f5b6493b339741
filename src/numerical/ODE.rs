//! Runge-Kutta solvers of initial value problems dy/dx = f(x, y)
//!
//! explicit methods (fixed steps or embedded error control), Backward-Euler (fixed steps)
//! and Radau5 for stiff problems and problems with a mass matrix M dy/dx = f(x, y).
//! Example#1
//! ```rust, ignore
//! use RustedODE::numerical::ODE::ode_api::dopri5_simple;
//! let mut y = DVector::from_vec(vec![2.0, 0.0]);
//! dopri5_simple(Box::new(|f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
//!     f[0] = y[1];
//!     f[1] = (1.0 - y[0] * y[0]) * y[1] - y[0];
//! }), &mut y, 2.0, 1e-6)?;
//! ```
//! Example#2
//! ```rust, ignore
//! // stiff problem with analytic Jacobian, statistics and step history
//! let prob = Problem::robertson();
//! let mut conf = prob.config(OdeMethod::Radau5, false)?;
//! conf.set_step_out(true);
//! let mut solver = Solver::new(conf, prob.system(false))?;
//! let mut y = prob.y0.clone();
//! solver.solve(&mut y, prob.x0, prob.xf)?;
//! solver.stat.print();
//! solver.out.save_csv("robertson.csv")?;
//! ```
/// configuration: method names, tolerances, step-size control, output settings
pub mod ode_config;
pub mod ode_errors;
/// counters and timings
pub mod ode_stat;
/// step history, dense output and callbacks
pub mod ode_output;
/// workspace shared by the driver and the methods
pub mod rk_work;
/// common interface of the step methods
pub mod rk_method;
/// Butcher tableaux of the explicit methods
pub mod ERK_tableaux;
/// explicit Runge-Kutta methods
pub mod ERK;
/// Backward-Euler method (fixed steps)
pub mod BwEuler;
/// Radau IIA of order 5
pub mod Radau5;
/// forward-difference Jacobian
pub mod ode_jacobian;
/// fixed-step and adaptive drivers
pub mod ode_solver;
/// one-call helpers
pub mod ode_api;
/// test problems
pub mod ode_problems;
