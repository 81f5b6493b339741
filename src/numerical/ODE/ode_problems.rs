//! Test problems with known (analytic or reference) solutions.
//!
//! References:
//!  [1] Hairer E, Nørsett SP, Wanner G (1993). Solving Ordinary Differential Equations I:
//!      Nonstiff Problems. Springer Series in Computational Mathematics, Vol. 8
//!  [2] Hairer E, Wanner G (1996). Solving Ordinary Differential Equations II: Stiff and
//!      Differential-Algebraic Problems. Springer Series in Computational Mathematics, Vol. 14
use crate::numerical::ODE::ode_config::{Config, OdeMethod};
use crate::numerical::ODE::ode_errors::OdeError;
use crate::numerical::ODE::ode_solver::Solver;
use crate::numerical::ODE::ode_stat::Stat;
use crate::numerical::ODE::rk_method::OdeSystem;
use crate::somelinalg::triplet::Triplet;
use nalgebra::DVector;
use rayon::prelude::*;
use std::sync::Arc;

type SharedFn = Arc<dyn Fn(&mut DVector<f64>, f64, f64, &DVector<f64>) + Send + Sync>;
type SharedJac = Arc<dyn Fn(&mut Triplet<f64>, f64, f64, &DVector<f64>) + Send + Sync>;
type SharedSol = Arc<dyn Fn(&mut DVector<f64>, f64) + Send + Sync>;

#[derive(Clone)]
pub struct Problem {
    pub name: String,
    pub ndim: usize,
    pub x0: f64,
    pub xf: f64,
    pub y0: DVector<f64>,
    /// step of the fixed-step runs
    pub dx: f64,
    pub atol: f64,
    pub rtol: f64,
    /// initial step of the adaptive runs
    pub ini_h: f64,
    pub fcn: SharedFn,
    pub jac: Option<SharedJac>,
    /// analytic solution y(x)
    pub y_ana: Option<SharedSol>,
    /// reference solution at xf
    pub y_ref: Option<DVector<f64>>,
}

impl Problem {
    /// Hairer-Wanner VII eq (1.1): y' = -50 (y - cos x)
    pub fn hw_eq11() -> Self {
        let lam = -50.0;
        Problem {
            name: "hw_eq11".to_string(),
            ndim: 1,
            x0: 0.0,
            xf: 1.5,
            y0: DVector::from_element(1, 0.0),
            dx: 1.875 / 50.0,
            atol: 1e-4,
            rtol: 1e-4,
            ini_h: 1e-4,
            fcn: Arc::new(move |f: &mut DVector<f64>, _h: f64, x: f64, y: &DVector<f64>| {
                f[0] = lam * (y[0] - x.cos());
            }),
            jac: Some(Arc::new(move |jac: &mut Triplet<f64>, _h: f64, _x: f64, _y: &DVector<f64>| {
                jac.put(0, 0, lam);
            })),
            y_ana: Some(Arc::new(|y: &mut DVector<f64>, x: f64| {
                y[0] = (2500.0 * x.cos() + 50.0 * x.sin() - 2500.0 * (-50.0 * x).exp()) / 2501.0;
            })),
            y_ref: None,
        }
    }

    /// stiff Van der Pol oscillator in Hairer's scaling:
    /// y0' = y1, y1' = ((1 - y0^2) y1 - y0)/eps
    pub fn van_der_pol(eps: f64) -> Self {
        let y_ref = if eps == 1e-6 {
            Some(DVector::from_vec(vec![
                1.7061677321704830,
                -0.89280970102479749,
            ]))
        } else {
            None
        };
        Problem {
            name: "van_der_pol".to_string(),
            ndim: 2,
            x0: 0.0,
            xf: 2.0,
            y0: DVector::from_vec(vec![2.0, -0.66]),
            dx: 0.1,
            atol: 1e-4,
            rtol: 1e-4,
            ini_h: 1e-6,
            fcn: Arc::new(move |f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                f[0] = y[1];
                f[1] = ((1.0 - y[0] * y[0]) * y[1] - y[0]) / eps;
            }),
            jac: Some(Arc::new(move |jac: &mut Triplet<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                jac.put(0, 1, 1.0);
                jac.put(1, 0, (-2.0 * y[0] * y[1] - 1.0) / eps);
                jac.put(1, 1, (1.0 - y[0] * y[0]) / eps);
            })),
            y_ana: None,
            y_ref,
        }
    }

    /// Van der Pol with mu = 1 started on the limit cycle; after one period the
    /// state returns to the initial one
    pub fn van_der_pol_cycle() -> Self {
        let period = 6.6632868593231301896996820305;
        let amplitude = 2.00861986087484313650940188;
        Problem {
            name: "van_der_pol_cycle".to_string(),
            ndim: 2,
            x0: 0.0,
            xf: period,
            y0: DVector::from_vec(vec![amplitude, 0.0]),
            dx: 0.1,
            atol: 1e-5,
            rtol: 1e-5,
            ini_h: 1e-4,
            fcn: Arc::new(|f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                f[0] = y[1];
                f[1] = (1.0 - y[0] * y[0]) * y[1] - y[0];
            }),
            jac: Some(Arc::new(|jac: &mut Triplet<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                jac.put(0, 1, 1.0);
                jac.put(1, 0, -2.0 * y[0] * y[1] - 1.0);
                jac.put(1, 1, 1.0 - y[0] * y[0]);
            })),
            y_ana: None,
            y_ref: Some(DVector::from_vec(vec![amplitude, 0.0])),
        }
    }

    /// harmonic oscillator: y = (cos x, -sin x)
    pub fn simple_ndim2() -> Self {
        Problem {
            name: "simple_ndim2".to_string(),
            ndim: 2,
            x0: 0.0,
            xf: 1.0,
            y0: DVector::from_vec(vec![1.0, 0.0]),
            dx: 0.1,
            atol: 1e-6,
            rtol: 1e-6,
            ini_h: 1e-4,
            fcn: Arc::new(|f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                f[0] = y[1];
                f[1] = -y[0];
            }),
            jac: Some(Arc::new(|jac: &mut Triplet<f64>, _h: f64, _x: f64, _y: &DVector<f64>| {
                jac.put(0, 1, 1.0);
                jac.put(1, 0, -1.0);
            })),
            y_ana: Some(Arc::new(|y: &mut DVector<f64>, x: f64| {
                y[0] = x.cos();
                y[1] = -x.sin();
            })),
            y_ref: None,
        }
    }

    /// oscillator coupled to a decay chain: y = (cos x, -sin x, e^-x, x e^-x)
    pub fn simple_ndim4() -> Self {
        Problem {
            name: "simple_ndim4".to_string(),
            ndim: 4,
            x0: 0.0,
            xf: 1.0,
            y0: DVector::from_vec(vec![1.0, 0.0, 1.0, 0.0]),
            dx: 0.1,
            atol: 1e-6,
            rtol: 1e-6,
            ini_h: 1e-4,
            fcn: Arc::new(|f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                f[0] = y[1];
                f[1] = -y[0];
                f[2] = -y[2];
                f[3] = y[2] - y[3];
            }),
            jac: Some(Arc::new(|jac: &mut Triplet<f64>, _h: f64, _x: f64, _y: &DVector<f64>| {
                jac.put(0, 1, 1.0);
                jac.put(1, 0, -1.0);
                jac.put(2, 2, -1.0);
                jac.put(3, 2, 1.0);
                jac.put(3, 3, -1.0);
            })),
            y_ana: Some(Arc::new(|y: &mut DVector<f64>, x: f64| {
                y[0] = x.cos();
                y[1] = -x.sin();
                y[2] = (-x).exp();
                y[3] = x * (-x).exp();
            })),
            y_ref: None,
        }
    }

    /// Robertson's chemical kinetics; y0 + y1 + y2 = 1 is conserved
    pub fn robertson() -> Self {
        Problem {
            name: "robertson".to_string(),
            ndim: 3,
            x0: 0.0,
            xf: 0.3,
            y0: DVector::from_vec(vec![1.0, 0.0, 0.0]),
            dx: 0.01,
            atol: 1e-8,
            rtol: 1e-4,
            ini_h: 1e-6,
            fcn: Arc::new(|f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                f[0] = -0.04 * y[0] + 1.0e4 * y[1] * y[2];
                f[1] = 0.04 * y[0] - 1.0e4 * y[1] * y[2] - 3.0e7 * y[1] * y[1];
                f[2] = 3.0e7 * y[1] * y[1];
            }),
            jac: Some(Arc::new(|jac: &mut Triplet<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                jac.put(0, 0, -0.04);
                jac.put(0, 1, 1.0e4 * y[2]);
                jac.put(0, 2, 1.0e4 * y[1]);
                jac.put(1, 0, 0.04);
                jac.put(1, 1, -1.0e4 * y[2] - 6.0e7 * y[1]);
                jac.put(1, 2, -1.0e4 * y[1]);
                jac.put(2, 1, 6.0e7 * y[1]);
            })),
            y_ana: None,
            y_ref: None,
        }
    }

    /// the problem as a system; num_jac drops the analytic Jacobian
    pub fn system(&self, num_jac: bool) -> OdeSystem {
        let fcn = self.fcn.clone();
        let mut sys = OdeSystem::new(
            self.ndim,
            Box::new(move |f: &mut DVector<f64>, h: f64, x: f64, y: &DVector<f64>| fcn(f, h, x, y)),
        );
        if let (false, Some(jac)) = (num_jac, self.jac.clone()) {
            sys = sys.with_jacobian(Box::new(
                move |j: &mut Triplet<f64>, h: f64, x: f64, y: &DVector<f64>| jac(j, h, x, y),
            ));
        }
        sys
    }

    /// configuration with the problem's tolerances
    pub fn config(&self, method: OdeMethod, fixed: bool) -> Result<Config, OdeError> {
        let mut conf = Config::new(method);
        conf.set_tols(self.atol, self.rtol)?;
        conf.set_ini_h(self.ini_h)?;
        if fixed {
            conf.set_fixed_h(self.dx)?;
        }
        Ok(conf)
    }

    /// y(x) from the analytic solution
    pub fn analytic(&self, x: f64) -> Option<DVector<f64>> {
        self.y_ana.as_ref().map(|sol| {
            let mut y = DVector::zeros(self.ndim);
            sol(&mut y, x);
            y
        })
    }

    /// integrates from x0 to xf; returns the final state and the statistics
    pub fn solve(
        &self,
        method: OdeMethod,
        fixed: bool,
        num_jac: bool,
    ) -> Result<(DVector<f64>, Stat), OdeError> {
        let conf = self.config(method, fixed)?;
        self.solve_with(conf, num_jac)
    }

    pub fn solve_with(&self, conf: Config, num_jac: bool) -> Result<(DVector<f64>, Stat), OdeError> {
        let mut solver = Solver::new(conf, self.system(num_jac))?;
        let mut y = self.y0.clone();
        solver.solve(&mut y, self.x0, self.xf)?;
        Ok((y, solver.stat.clone()))
    }

    /// max-norm error at xf of fixed-step runs with steps `hs` (run in parallel)
    pub fn convergence_errors(&self, method: OdeMethod, hs: &[f64]) -> Result<Vec<f64>, OdeError> {
        let y_ana = self.analytic(self.xf).ok_or_else(|| {
            OdeError::Config(format!("problem {} has no analytic solution", self.name))
        })?;
        hs.par_iter()
            .map(|&h| -> Result<f64, OdeError> {
                let mut conf = Config::new(method);
                conf.set_fixed_h(h)?;
                let (y, _) = self.solve_with(conf, false)?;
                Ok((y - &y_ana).amax())
            })
            .collect()
    }
}

/// least-squares slope of log(err) against log(h)
pub fn convergence_rate(hs: &[f64], errs: &[f64]) -> f64 {
    let n = hs.len().min(errs.len()) as f64;
    let lx: Vec<f64> = hs.iter().map(|h| h.ln()).collect();
    let ly: Vec<f64> = errs.iter().map(|e| e.ln()).collect();
    let mx = lx.iter().sum::<f64>() / n;
    let my = ly.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (x, y) in lx.iter().zip(ly.iter()) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
    }
    sxy / sxx
}
