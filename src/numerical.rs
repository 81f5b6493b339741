//! numerical methods for initial value problems
/// Runge-Kutta family: explicit methods with error control, Backward-Euler and Radau5.
/// Example
///    ```rust, ignore
///    let prob = Problem::van_der_pol(1e-6);
///    let mut conf = prob.config(OdeMethod::Radau5, false)?;
///    conf.set_tols(1e-4, 1e-4)?;
///    let mut solver = Solver::new(conf, prob.system(false))?;
///    let mut y = prob.y0.clone();
///    solver.solve(&mut y, prob.x0, prob.xf)?;
///    solver.stat.print();
///    ```
pub mod ODE;
