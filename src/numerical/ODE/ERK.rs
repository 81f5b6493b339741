//! Explicit Runge-Kutta methods driven by a Butcher tableau, with embedded error
//! estimates, Lund-stabilised step-size control and Hairer's continuous extension of DOPRI5.
use crate::numerical::ODE::ERK_tableaux::{Tableau, tableau};
use crate::numerical::ODE::ode_config::{Config, OdeMethod};
use crate::numerical::ODE::ode_errors::OdeError;
use crate::numerical::ODE::ode_stat::Stat;
use crate::numerical::ODE::rk_method::{MethodInfo, OdeSystem, RKMethod};
use crate::numerical::ODE::rk_work::RKWork;
use nalgebra::DVector;

// dense output of DOPRI5
const D1: f64 = -12715105075.0 / 11282082432.0;
const D3: f64 = 87487479700.0 / 32700410799.0;
const D4: f64 = -10690763975.0 / 1880347072.0;
const D5: f64 = 701980252875.0 / 199316789632.0;
const D6: f64 = -1453857185.0 / 822651844.0;
const D7: f64 = 69997945.0 / 29380423.0;

pub struct ExplicitRK {
    tab: Tableau,
    ndim: usize,
    /// stage slopes
    k: Vec<DVector<f64>>,
    /// stage arguments
    v: Vec<DVector<f64>>,
    /// tentative new state
    w: DVector<f64>,
    /// coefficients of the continuous extension
    d: Vec<DVector<f64>>,
    /// exponent of the step-size formula
    expo: f64,
}

impl ExplicitRK {
    pub fn new(method: OdeMethod, ndim: usize) -> Result<Self, OdeError> {
        let tab = tableau(method)
            .ok_or_else(|| OdeError::Config(format!("{} is not an explicit method", method)))?;
        let nstg = tab.nstages();
        let nd = if tab.dense { 5 } else { 0 };
        let expo = 1.0 / (tab.error_order() as f64 + 1.0);
        Ok(ExplicitRK {
            ndim,
            k: vec![DVector::zeros(ndim); nstg],
            v: vec![DVector::zeros(ndim); nstg],
            w: DVector::zeros(ndim),
            d: vec![DVector::zeros(ndim); nd],
            expo,
            tab,
        })
    }

    pub fn tableau(&self) -> &Tableau {
        &self.tab
    }

    /// rerr from the embedded pair: rms of h sum(E k)/sk
    fn embedded_error(&self, conf: &Config, h: f64, y: &DVector<f64>, e: &[f64]) -> f64 {
        let mut sum = 0.0;
        for m in 0..self.ndim {
            let lerr: f64 = e
                .iter()
                .zip(self.k.iter())
                .map(|(ei, ki)| ei * ki[m])
                .sum::<f64>()
                * h;
            sum += (lerr / conf.sk(m, y[m], self.w[m])).powi(2);
        }
        f64::max((sum / self.ndim as f64).sqrt(), 1e-10)
    }

    /// DOP853: 5th order estimate corrected by the 3rd order one
    fn dop853_error(
        &self,
        conf: &Config,
        h: f64,
        y: &DVector<f64>,
        e: &[f64],
        bhh: &[(usize, f64); 3],
    ) -> f64 {
        let (mut err, mut err2) = (0.0, 0.0);
        for m in 0..self.ndim {
            let sk = conf.sk(m, y[m], self.w[m]);
            let mut erri = 0.0;
            let mut erri2 = 0.0;
            for (i, ki) in self.k.iter().enumerate() {
                erri += e[i] * ki[m];
                erri2 += self.tab.b[i] * ki[m];
            }
            for (i, bh) in bhh {
                erri2 -= bh * self.k[*i][m];
            }
            err += (erri / sk).powi(2);
            err2 += (erri2 / sk).powi(2);
        }
        let mut deno = err + 0.01 * err2;
        if deno <= 0.0 {
            deno = 1.0;
        }
        let err = h.abs() * err * (1.0 / (self.ndim as f64 * deno)).sqrt();
        f64::max(err, 1e-10)
    }

    /// rs = h |k_last - k_prev| / |v_last - v_prev|
    fn stiffness_ratio(&self, h: f64) -> f64 {
        let nstg = self.tab.nstages();
        if nstg < 2 {
            return 0.0;
        }
        let dnum = (&self.k[nstg - 1] - &self.k[nstg - 2]).norm_squared();
        let dden = (&self.v[nstg - 1] - &self.v[nstg - 2]).norm_squared();
        if dden > 0.0 { h * (dnum / dden).sqrt() } else { 0.0 }
    }
}

impl RKMethod for ExplicitRK {
    fn info(&self) -> MethodInfo {
        MethodInfo {
            fixed_only: !self.tab.embedded(),
            implicit: false,
            nstages: self.tab.nstages(),
            has_dense: self.tab.dense,
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
        let nstg = self.tab.nstages();

        // k0 is kept from the last accepted step if first same as last
        if work.first || !self.tab.fsal {
            self.v[0].copy_from(y);
            stat.nfeval += 1;
            (sys.fcn)(&mut self.k[0], h, x, y);
        }
        for i in 1..nstg {
            let vi = &mut self.v[i];
            vi.copy_from(y);
            for j in 0..i {
                let aij = self.tab.a[i][j];
                if aij != 0.0 {
                    vi.axpy(h * aij, &self.k[j], 1.0);
                }
            }
            stat.nfeval += 1;
            (sys.fcn)(&mut self.k[i], h, x + self.tab.c[i] * h, &self.v[i]);
        }

        // new state
        self.w.copy_from(y);
        for (bi, ki) in self.tab.b.iter().zip(self.k.iter()) {
            if *bi != 0.0 {
                self.w.axpy(h * bi, ki, 1.0);
            }
        }

        work.rerr = match (&self.tab.e, &self.tab.bhh) {
            (Some(e), Some(bhh)) => self.dop853_error(conf, h, y, e, bhh),
            (Some(e), None) => self.embedded_error(conf, h, y, e),
            (None, _) => 0.0,
        };
        work.rs = self.stiffness_ratio(h);
        work.diverg = false;
        Ok(())
    }

    fn accept(
        &mut self,
        conf: &Config,
        work: &mut RKWork,
        _stat: &Stat,
        y: &mut DVector<f64>,
        _x: f64,
    ) -> f64 {
        let h = work.h;
        let nstg = self.tab.nstages();
        if self.tab.dense {
            for m in 0..self.ndim {
                let ydiff = self.w[m] - y[m];
                let bspl = h * self.k[0][m] - ydiff;
                self.d[0][m] = y[m];
                self.d[1][m] = ydiff;
                self.d[2][m] = bspl;
                self.d[3][m] = ydiff - h * self.k[6][m] - bspl;
                self.d[4][m] = h
                    * (D1 * self.k[0][m]
                        + D3 * self.k[2][m]
                        + D4 * self.k[3][m]
                        + D5 * self.k[4][m]
                        + D6 * self.k[5][m]
                        + D7 * self.k[6][m]);
            }
        }
        if self.tab.fsal {
            self.k.swap(0, nstg - 1);
        }
        y.copy_from(&self.w);
        if !self.tab.embedded() {
            return h;
        }

        // Lund stabilisation
        let beta = conf.stab_beta;
        let fac11 = work.rerr.powf(self.expo - 0.75 * beta);
        let fac = fac11 / work.rerr_prev.powf(beta);
        let fac = (fac / conf.safety).clamp(1.0 / conf.fac_max, 1.0 / conf.fac_min);
        h / fac
    }

    fn reject(&mut self, conf: &Config, work: &RKWork) -> f64 {
        let beta = conf.stab_beta;
        let fac11 = work.rerr.powf(self.expo - 0.75 * beta);
        work.h / f64::min(1.0 / conf.fac_min, fac11 / conf.safety)
    }

    fn dense_out(
        &self,
        yout: &mut DVector<f64>,
        h: f64,
        x: f64,
        _y: &DVector<f64>,
        xout: f64,
    ) -> Result<(), OdeError> {
        if !self.tab.dense {
            return Err(OdeError::DenseOutputUnavailable(self.tab.method.to_string()));
        }
        let xold = x - h;
        let theta = (xout - xold) / h;
        let theta1 = 1.0 - theta;
        for m in 0..self.ndim {
            yout[m] = self.d[0][m]
                + theta
                    * (self.d[1][m]
                        + theta1
                            * (self.d[2][m] + theta * (self.d[3][m] + theta1 * self.d[4][m])));
        }
        Ok(())
    }

    fn free(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::ODE::rk_method::OdeSystem;
    use approx::assert_relative_eq;

    fn decay() -> OdeSystem {
        OdeSystem::new(
            1,
            Box::new(|f: &mut DVector<f64>, _h: f64, _x: f64, y: &DVector<f64>| {
                f[0] = -y[0];
            }),
        )
    }

    #[test]
    fn test_rk4_single_step() {
        let sys = decay();
        let conf = Config::new(OdeMethod::Rk4);
        let mut rk = ExplicitRK::new(OdeMethod::Rk4, 1).unwrap();
        assert!(rk.info().fixed_only);
        let mut work = RKWork::new(1);
        let mut stat = Stat::default();
        work.h = 0.1;
        let mut y = DVector::from_element(1, 1.0);
        rk.step(&sys, &conf, &mut work, &mut stat, 0.0, &y).unwrap();
        assert_eq!(y[0], 1.0);
        rk.accept(&conf, &mut work, &stat, &mut y, 0.0);
        // 1 - h + h^2/2 - h^3/6 + h^4/24
        let h: f64 = 0.1;
        let exact = 1.0 - h + h * h / 2.0 - h.powi(3) / 6.0 + h.powi(4) / 24.0;
        assert_relative_eq!(y[0], exact, epsilon = 1e-15);
        assert_eq!(stat.nfeval, 4);
        assert!(rk.dense_out(&mut y.clone(), h, h, &y, 0.05).is_err());
    }

    #[test]
    fn test_dopri5_fsal_and_dense() {
        let sys = decay();
        let mut conf = Config::new(OdeMethod::Dopri5);
        conf.set_tols(1e-6, 1e-6).unwrap();
        let mut rk = ExplicitRK::new(OdeMethod::Dopri5, 1).unwrap();
        let info = rk.info();
        assert!(!info.fixed_only && info.has_dense && info.nstages == 7);
        assert_eq!(rk.tableau().method, OdeMethod::Dopri5);
        assert_eq!((rk.tableau().p, rk.tableau().q), (5, 4));
        let mut work = RKWork::new(1);
        let mut stat = Stat::default();
        work.h = 0.1;
        let mut y = DVector::from_element(1, 1.0);
        rk.step(&sys, &conf, &mut work, &mut stat, 0.0, &y).unwrap();
        assert!(work.rerr < 1.0);
        let h_new = rk.accept(&conf, &mut work, &stat, &mut y, 0.0);
        assert!(h_new > 0.0 && h_new <= 0.1 * conf.fac_max);
        assert_relative_eq!(y[0], (-0.1_f64).exp(), epsilon = 1e-8);
        let mut yout = DVector::zeros(1);
        rk.dense_out(&mut yout, 0.1, 0.1, &y, 0.05).unwrap();
        assert_relative_eq!(yout[0], (-0.05_f64).exp(), epsilon = 1e-6);
        rk.dense_out(&mut yout, 0.1, 0.1, &y, 0.1).unwrap();
        assert_relative_eq!(yout[0], y[0], epsilon = 1e-14);

        // second step reuses the last stage of the first one
        work.first = false;
        let nfeval = stat.nfeval;
        rk.step(&sys, &conf, &mut work, &mut stat, 0.1, &y).unwrap();
        assert_eq!(stat.nfeval - nfeval, 6);
    }

    #[test]
    fn test_reject_shrinks_step() {
        let conf = Config::new(OdeMethod::Fehlberg4);
        let mut rk = ExplicitRK::new(OdeMethod::Fehlberg4, 1).unwrap();
        let mut work = RKWork::new(1);
        work.h = 0.5;
        work.rerr = 30.0;
        let h_new = rk.reject(&conf, &work);
        assert!(h_new < 0.5 && h_new >= 0.5 * conf.fac_min);
        assert!(ExplicitRK::new(OdeMethod::Radau5, 1).is_err());
    }
}
