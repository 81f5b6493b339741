//! Solver driver: fixed-step and adaptive loops around a step method.
//!
//! # Example
//! ```rust, ignore
//! let sys = OdeSystem::new(2, Box::new(|f, _h, _x, y| {
//!     f[0] = y[1];
//!     f[1] = (1.0 - y[0] * y[0]) * y[1] - y[0];
//! }));
//! let mut conf = Config::new(OdeMethod::Dopri5);
//! conf.set_tols(1e-6, 1e-6)?;
//! let mut solver = Solver::new(conf, sys)?;
//! let mut y = DVector::from_vec(vec![2.0, 0.0]);
//! solver.solve(&mut y, 0.0, 2.0)?;
//! solver.stat.print();
//! ```
use crate::numerical::ODE::ode_config::Config;
use crate::numerical::ODE::ode_errors::{OdeError, OdeWarning};
use crate::numerical::ODE::ode_output::{DenseOutFn, Output, StepOutFn};
use crate::numerical::ODE::ode_stat::Stat;
use crate::numerical::ODE::rk_method::{MethodInfo, OdeSystem, RKMethod, RKMethods, new_rk_method};
use crate::numerical::ODE::rk_work::RKWork;
use log::info;
use nalgebra::DVector;
use std::time::Instant;

/// initial value of the previous relative error
const RERR_PREV_INI: f64 = 1e-4;
/// tolerance of the final x
const LANDING_TOL: f64 = 1e-10;

pub struct Solver {
    conf: Config,
    pub out: Output,
    pub stat: Stat,
    sys: OdeSystem,
    rkm: RKMethods,
    info: MethodInfo,
    work: RKWork,
}

impl Solver {
    pub fn new(conf: Config, sys: OdeSystem) -> Result<Self, OdeError> {
        conf.validate(sys.ndim)?;
        let rkm = new_rk_method(&conf, &sys)?;
        let info = rkm.info();
        if info.fixed_only && !conf.fixed {
            return Err(OdeError::Config(format!(
                "method {} can only be used with fixed steps (call set_fixed_h)",
                conf.method
            )));
        }
        if conf.save_dense && !info.has_dense {
            return Err(OdeError::DenseOutputUnavailable(conf.method.to_string()));
        }
        let out = Output::new(&conf, sys.ndim);
        let stat = Stat::new(conf.lin_sol, info.implicit);
        let work = RKWork::new(sys.ndim);
        Ok(Solver {
            conf,
            out,
            stat,
            sys,
            rkm,
            info,
            work,
        })
    }

    pub fn config(&self) -> &Config {
        &self.conf
    }

    pub fn info(&self) -> MethodInfo {
        self.info
    }

    /// callback after every accepted step
    pub fn set_step_out(&mut self, f: StepOutFn) {
        self.out.set_step_fn(f);
    }

    /// callback at every dense output point (needs `Config::set_dense_out`)
    pub fn set_dense_out(&mut self, f: DenseOutFn) -> Result<(), OdeError> {
        if !self.info.has_dense {
            return Err(OdeError::DenseOutputUnavailable(self.conf.method.to_string()));
        }
        if self.conf.dense_dx.is_none() {
            return Err(OdeError::Config(
                "dense output callback needs a spacing: call set_dense_out on the configuration"
                    .to_string(),
            ));
        }
        self.out.set_dense_fn(f);
        Ok(())
    }

    /// integrates y from x to xf; y holds the final state on return
    pub fn solve(&mut self, y: &mut DVector<f64>, x: f64, xf: f64) -> Result<(), OdeError> {
        let start = Instant::now();
        let res = self.run(y, x, xf);
        self.stat.update_elapsed_total(start);
        if self.conf.verbose {
            self.stat.print();
        }
        res
    }

    fn run(&mut self, y: &mut DVector<f64>, x0: f64, xf: f64) -> Result<(), OdeError> {
        if xf < x0 {
            return Err(OdeError::Config(format!(
                "xf = {} must not be smaller than x = {}",
                xf, x0
            )));
        }
        if y.len() != self.sys.ndim {
            return Err(OdeError::Config(format!(
                "y has {} components but the system has {}",
                y.len(),
                self.sys.ndim
            )));
        }
        self.stat.reset();
        self.out.reset(x0);

        let h = if self.conf.fixed {
            self.conf.fixed_steps(x0, xf).1
        } else {
            f64::min(self.conf.ini_h, xf - x0)
        };
        self.work.reset(h, self.conf.theta_max, RERR_PREV_INI);
        if self.info.implicit {
            self.conf.scale(&mut self.work.scal, y);
        }

        let stop = self.out.execute(&self.rkm, 0, false, 0.0, h, x0, y)?;
        if stop || xf == x0 {
            return Ok(());
        }
        if self.conf.fixed {
            self.run_fixed(y, x0, xf)
        } else {
            self.run_adaptive(y, x0, xf)
        }
    }

    fn eval_f0(&mut self, x: f64, y: &DVector<f64>) {
        self.stat.nfeval += 1;
        (self.sys.fcn)(&mut self.work.f0, self.work.h, x, y);
    }

    fn log_state(&self, x: f64, y: &DVector<f64>) {
        if self.conf.verbose {
            info!("x = {:.6e}, h = {:.6e}, y = {:?}", x, self.work.h, y.as_slice());
        }
    }

    fn check_landing(&mut self, x: f64, xf: f64) {
        if (x - xf).abs() > LANDING_TOL {
            self.stat.warn(OdeWarning::LandingMismatch { x, xf });
        }
    }

    fn run_fixed(&mut self, y: &mut DVector<f64>, x0: f64, xf: f64) -> Result<(), OdeError> {
        let (nsteps, h) = self.conf.fixed_steps(x0, xf);
        self.work.h = h;
        let mut x = x0;
        for n in 0..nsteps {
            if self.info.implicit {
                self.conf.scale(&mut self.work.scal, y);
            }
            if self.info.uses_f0 {
                self.work.jac_is_ok = false;
                self.eval_f0(x, y);
            }
            let t = Instant::now();
            self.stat.nsteps += 1;
            self.rkm
                .step(&self.sys, &self.conf, &mut self.work, &mut self.stat, x, y)?;
            self.stat.update_elapsed_step(t);
            if self.work.diverg {
                return Err(OdeError::NewtonFailure {
                    x,
                    nit: self.work.nit,
                });
            }
            self.rkm
                .accept(&self.conf, &mut self.work, &self.stat, y, x);
            self.work.first = false;
            self.work.h_prev = h;
            x = x0 + (n + 1) as f64 * h;
            self.log_state(x, y);
            let last = n + 1 == nsteps;
            // a stop requested by a callback ends the run before xf: no landing check
            if self
                .out
                .execute(&self.rkm, n + 1, last, self.work.rs, h, x, y)?
            {
                return Ok(());
            }
        }
        self.check_landing(x, xf);
        Ok(())
    }

    fn run_adaptive(&mut self, y: &mut DVector<f64>, x0: f64, xf: f64) -> Result<(), OdeError> {
        let conf = &self.conf;
        let mut x = x0;
        let mut last = false;
        if self.info.uses_f0 {
            self.stat.nfeval += 1;
            (self.sys.fcn)(&mut self.work.f0, self.work.h, x, y);
        }

        for iss in 0..=conf.nmax_ss {
            if x - xf >= 0.0 {
                break;
            }
            if iss == conf.nmax_ss {
                return Err(OdeError::ConvergenceFailure {
                    nmax_ss: conf.nmax_ss,
                    x,
                });
            }
            self.stat.nsteps += 1;

            let t = Instant::now();
            self.rkm
                .step(&self.sys, conf, &mut self.work, &mut self.stat, x, y)?;
            self.stat.update_elapsed_step(t);
            let work = &mut self.work;

            // Newton iterations diverged: shrink and retry
            if work.diverg {
                self.stat.ndiverg += 1;
                work.reject = true;
                last = false;
                work.h *= work.dvfac;
                continue;
            }

            if work.rerr < 1.0 {
                self.stat.naccepted += 1;
                work.first = false;
                work.jac_is_ok = false;

                // stiffness detection
                if conf.stiff_nstp > 0
                    && (self.stat.naccepted % conf.stiff_nstp == 0 || work.stiff_yes > 0)
                {
                    if work.rs > conf.stiff_rs_max {
                        work.stiff_not = 0;
                        work.stiff_yes += 1;
                        if work.stiff_yes == conf.stiff_nyes {
                            self.stat.warn(OdeWarning::StiffnessDetected { x });
                        }
                    } else {
                        work.stiff_not += 1;
                        if work.stiff_not == conf.stiff_nnot {
                            work.stiff_yes = 0;
                        }
                    }
                }

                let mut dxnew = self.rkm.accept(conf, work, &self.stat, y, x);
                x += work.h;
                if conf.verbose {
                    info!("x = {:.6e}, h = {:.6e}, y = {:?}", x, work.h, y.as_slice());
                }
                let stop = self.out.execute(
                    &self.rkm,
                    self.stat.naccepted,
                    last,
                    work.rs,
                    work.h,
                    x,
                    y,
                )?;
                // stopped by a callback before xf: no landing check
                if stop {
                    self.stat.hopt = work.h;
                    return Ok(());
                }
                if last {
                    self.stat.hopt = work.h;
                    break;
                }

                work.h_prev = work.h;
                work.rerr_prev = f64::max(conf.rerr_prev_min, work.rerr);
                if self.info.implicit {
                    conf.scale(&mut work.scal, y);
                }
                if self.info.uses_f0 {
                    self.stat.nfeval += 1;
                    (self.sys.fcn)(&mut work.f0, work.h, x, y);
                }

                // next step size
                if work.reject {
                    dxnew = f64::min(work.h, dxnew);
                }
                work.reject = false;
                work.reuse_jac_and_dec_once = false;
                if x + dxnew - xf >= 0.0 {
                    last = true;
                    work.h = xf - x;
                } else if self.info.implicit {
                    let ratio = dxnew / work.h;
                    work.reuse_jac_and_dec_once = work.theta <= conf.theta_max
                        && ratio >= conf.c1h
                        && ratio <= conf.c2h;
                    if !work.reuse_jac_and_dec_once {
                        work.h = dxnew;
                    }
                } else {
                    work.h = dxnew;
                }
                if self.info.implicit && !work.reuse_jac_and_dec_once {
                    work.reuse_jac_once = work.theta <= conf.theta_max;
                }
            } else {
                if self.stat.naccepted > 0 {
                    self.stat.nrejected += 1;
                }
                work.reject = true;
                last = false;
                let dxnew = self.rkm.reject(conf, work);
                work.h = if work.first && conf.mfirst_rej > 0.0 {
                    work.h * conf.mfirst_rej
                } else {
                    dxnew
                };
                if x + work.h > xf {
                    work.h = xf - x;
                }
            }
        }
        self.check_landing(x, xf);
        Ok(())
    }

    /// releases the linear solvers; safe to call more than once
    pub fn free(&mut self) {
        self.rkm.free();
    }
}

impl Drop for Solver {
    fn drop(&mut self) {
        self.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::ODE::ode_config::OdeMethod;

    fn decay() -> OdeSystem {
        OdeSystem::new(
            1,
            Box::new(|f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                f[0] = -y[0];
            }),
        )
    }

    #[test]
    fn test_landing_check() {
        let mut solver = Solver::new(Config::new(OdeMethod::Dopri5), decay()).unwrap();
        assert_eq!(solver.config().method, OdeMethod::Dopri5);
        solver.check_landing(1.0, 1.0 + 1e-12);
        assert!(solver.stat.warnings.is_empty());
        solver.check_landing(1.0, 1.0 + 1e-9);
        assert_eq!(
            solver.stat.warnings,
            vec![OdeWarning::LandingMismatch {
                x: 1.0,
                xf: 1.0 + 1e-9
            }]
        );
    }

    #[test]
    fn test_substep_limit_is_fatal() {
        let mut conf = Config::new(OdeMethod::Dopri5);
        conf.nmax_ss = 5;
        let mut solver = Solver::new(conf, decay()).unwrap();
        let mut y = DVector::from_element(1, 1.0);
        let res = solver.solve(&mut y, 0.0, 10.0);
        match res {
            Err(OdeError::ConvergenceFailure { nmax_ss, x }) => {
                assert_eq!(nmax_ss, 5);
                assert!(x > 0.0 && x < 10.0);
            }
            other => panic!("expected ConvergenceFailure, got {:?}", other),
        }
        assert_eq!(solver.stat.nsteps, 5);
    }
}
