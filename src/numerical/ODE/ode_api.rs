//! One-call helpers: configure, solve from x = 0 and collect the results.
use crate::numerical::ODE::ode_config::Config;
use crate::numerical::ODE::ode_errors::OdeError;
use crate::numerical::ODE::ode_output::Output;
use crate::numerical::ODE::ode_solver::Solver;
use crate::numerical::ODE::ode_stat::Stat;
use crate::numerical::ODE::rk_method::{JacFn, OdeFn, OdeSystem};
use nalgebra::DVector;

/// solves dy/dx = f(x, y) from x = 0 to xf; y holds the final state on return.
///
/// * `dx` - step of the fixed-step mode and spacing of the dense output
/// * `num_jac` - ignore `jac` and use the numerical Jacobian
/// * `save_step` - keep the state after every step in `Output`
/// * `save_dense` - keep the dense output at 0, dx, 2dx, ... in `Output`
#[allow(clippy::too_many_arguments)]
pub fn solve(
    method: &str,
    fcn: Box<OdeFn>,
    jac: Option<Box<JacFn>>,
    y: &mut DVector<f64>,
    xf: f64,
    dx: f64,
    atol: f64,
    rtol: f64,
    num_jac: bool,
    fixed_step: bool,
    save_step: bool,
    save_dense: bool,
) -> Result<(Stat, Output), OdeError> {
    let mut conf = Config::from_name(method)?;
    conf.set_tols(atol, rtol)?;
    if fixed_step {
        conf.set_fixed_h(dx)?;
    }
    conf.set_step_out(save_step);
    if save_dense {
        conf.set_dense_out(true, dx)?;
    }
    let mut sys = OdeSystem::new(y.len(), fcn);
    if let (false, Some(jac)) = (num_jac, jac) {
        sys = sys.with_jacobian(jac);
    }
    let mut solver = Solver::new(conf, sys)?;
    solver.solve(y, 0.0, xf)?;
    let stat = std::mem::take(&mut solver.stat);
    let out = std::mem::take(&mut solver.out);
    Ok((stat, out))
}

/// dopri5 with atol = rtol = tol
pub fn dopri5_simple(
    fcn: Box<OdeFn>,
    y: &mut DVector<f64>,
    xf: f64,
    tol: f64,
) -> Result<(), OdeError> {
    solve("dopri5", fcn, None, y, xf, 0.0, tol, tol, false, false, false, false)?;
    Ok(())
}

/// dopri8 with atol = rtol = tol
pub fn dopri8_simple(
    fcn: Box<OdeFn>,
    y: &mut DVector<f64>,
    xf: f64,
    tol: f64,
) -> Result<(), OdeError> {
    solve("dopri8", fcn, None, y, xf, 0.0, tol, tol, false, false, false, false)?;
    Ok(())
}

/// radau5 with atol = rtol = tol; numerical Jacobian if `jac` is None
pub fn radau5_simple(
    fcn: Box<OdeFn>,
    jac: Option<Box<JacFn>>,
    y: &mut DVector<f64>,
    xf: f64,
    tol: f64,
) -> Result<(), OdeError> {
    solve("radau5", fcn, jac, y, xf, 0.0, tol, tol, false, false, false, false)?;
    Ok(())
}
