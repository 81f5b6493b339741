//! Backward-Euler method: y_new = y + h f(x + h, y_new), solved with Newton iterations.
//! Fixed steps only.
use crate::numerical::ODE::ode_config::Config;
use crate::numerical::ODE::ode_errors::OdeError;
use crate::numerical::ODE::ode_jacobian::numerical_jacobian;
use crate::numerical::ODE::ode_stat::Stat;
use crate::numerical::ODE::rk_method::{MethodInfo, OdeSystem, RKMethod, rms_scaled};
use crate::numerical::ODE::rk_work::RKWork;
use crate::somelinalg::linear_solvers::{LinSol, LinSolKind, new_lin_sol};
use crate::somelinalg::triplet::Triplet;
use nalgebra::DVector;

pub struct BwEuler {
    ndim: usize,
    lin_sol: Box<dyn LinSol<f64>>,
    /// df/dy
    dfdy: Triplet<f64>,
    /// I - h df/dy
    kmat: Triplet<f64>,
    /// new state
    w: DVector<f64>,
    f: DVector<f64>,
    /// residual
    r: DVector<f64>,
    dw: DVector<f64>,
    tmp: DVector<f64>,
}

impl BwEuler {
    pub fn new(ndim: usize, kind: LinSolKind) -> Self {
        BwEuler {
            ndim,
            lin_sol: new_lin_sol(kind),
            dfdy: Triplet::new(ndim, ndim, ndim * ndim),
            kmat: Triplet::new(ndim, ndim, ndim * ndim + ndim),
            w: DVector::zeros(ndim),
            f: DVector::zeros(ndim),
            r: DVector::zeros(ndim),
            dw: DVector::zeros(ndim),
            tmp: DVector::zeros(ndim),
        }
    }
}

impl RKMethod for BwEuler {
    fn info(&self) -> MethodInfo {
        MethodInfo {
            fixed_only: true,
            implicit: true,
            nstages: 1,
            has_dense: false,
            uses_f0: false,
        }
    }

    fn step(
        &mut self,
        sys: &OdeSystem,
        conf: &Config,
        work: &mut RKWork,
        stat: &mut Stat,
        x: f64,
        y: &DVector<f64>,
    ) -> Result<(), OdeError> {
        let h = work.h;
        let xnew = x + h;
        self.w.copy_from(y);
        work.diverg = false;
        work.rerr = 0.0;
        work.rs = 0.0;

        let mut converged = false;
        for it in 0..conf.nmax_it {
            work.nit = it + 1;
            stat.nitmax = stat.nitmax.max(work.nit);

            // r = w - y - h f(x + h, w)
            stat.nfeval += 1;
            (sys.fcn)(&mut self.f, h, xnew, &self.w);
            for m in 0..self.ndim {
                self.r[m] = self.w[m] - y[m] - h * self.f[m];
            }
            if rms_scaled(&self.r, &work.scal) <= conf.fnewt() {
                converged = true;
                break;
            }

            // K = I - h dfdy
            if it == 0 || !conf.cte_tg {
                stat.njeval += 1;
                self.dfdy.start();
                match &sys.jac {
                    Some(jac) => jac(&mut self.dfdy, h, xnew, &self.w),
                    None => {
                        stat.nfeval += self.ndim;
                        let fcn = &sys.fcn;
                        numerical_jacobian(
                            &mut self.dfdy,
                            |fy, ya| fcn(fy, h, xnew, ya),
                            &self.w,
                            &self.f,
                            &mut self.tmp,
                        );
                    }
                }
                self.kmat.start();
                self.kmat.put_diagonal(1.0);
                self.kmat.put_scaled(&self.dfdy, -h);
                self.lin_sol.init(&self.kmat)?;
                stat.ndecomp += 1;
                self.lin_sol.fact()?;
            }

            // K dw = r
            stat.nlinsol += 1;
            self.lin_sol.solve(&mut self.dw, &self.r)?;
            self.w -= &self.dw;
        }
        if !converged {
            work.diverg = true;
            work.dvfac = 0.5;
        }
        Ok(())
    }

    fn accept(
        &mut self,
        _conf: &Config,
        work: &mut RKWork,
        _stat: &Stat,
        y: &mut DVector<f64>,
        _x: f64,
    ) -> f64 {
        y.copy_from(&self.w);
        work.h
    }

    fn reject(&mut self, _conf: &Config, work: &RKWork) -> f64 {
        work.h
    }

    fn dense_out(
        &self,
        _yout: &mut DVector<f64>,
        _h: f64,
        _x: f64,
        _y: &DVector<f64>,
        _xout: f64,
    ) -> Result<(), OdeError> {
        Err(OdeError::DenseOutputUnavailable("bweuler".to_string()))
    }

    fn free(&mut self) {
        self.lin_sol.free();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::ODE::ode_config::OdeMethod;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_step_converges_in_two_iterations() {
        // y' = -2 y
        let sys = OdeSystem::new(
            1,
            Box::new(|f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                f[0] = -2.0 * y[0];
            }),
        );
        let conf = Config::new(OdeMethod::BwEuler);
        let mut be = BwEuler::new(1, LinSolKind::Dense);
        let mut work = RKWork::new(1);
        let mut stat = Stat::default();
        work.h = 0.1;
        let mut y = DVector::from_element(1, 1.0);
        conf.scale(&mut work.scal, &y);
        be.step(&sys, &conf, &mut work, &mut stat, 0.0, &y).unwrap();
        assert!(!work.diverg);
        assert_eq!(work.nit, 2);
        be.accept(&conf, &mut work, &stat, &mut y, 0.0);
        assert_relative_eq!(y[0], 1.0 / 1.2, epsilon = 1e-8);
        // numerical Jacobian: one extra evaluation per Jacobian
        assert_eq!((stat.nfeval, stat.njeval, stat.ndecomp, stat.nlinsol), (3, 1, 1, 1));
        be.free();
        be.free();
    }

    #[test]
    fn test_divergence_is_flagged() {
        // y' = y^2 from y = 1 with a step beyond the blow-up time
        let sys = OdeSystem::new(
            1,
            Box::new(|f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                f[0] = y[0] * y[0];
            }),
        );
        let mut conf = Config::new(OdeMethod::BwEuler);
        conf.nmax_it = 3;
        let mut be = BwEuler::new(1, LinSolKind::Sparse);
        let mut work = RKWork::new(1);
        let mut stat = Stat::default();
        work.h = 2.0;
        let y = DVector::from_element(1, 1.0);
        conf.scale(&mut work.scal, &y);
        be.step(&sys, &conf, &mut work, &mut stat, 0.0, &y).unwrap();
        assert!(work.diverg);
        assert_eq!(work.dvfac, 0.5);
        assert_eq!(stat.nitmax, 3);
    }
}
