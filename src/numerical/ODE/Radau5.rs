//! Radau IIA method of order 5 (3 stages) for stiff problems and problems with a
//! mass matrix M dy/dx = f(x, y).
//!
//! Simplified Newton iterations on the transformed stage system: one real factorisation of
//! (gamma/h) M - J and one complex factorisation of ((alpha + i beta)/h) M - J per Jacobian update.
//!
//! References:
//!  [1] Hairer E, Wanner G (1996). Solving Ordinary Differential Equations II: Stiff and
//!      Differential-Algebraic Problems. Springer Series in Computational Mathematics, Vol. 14
use crate::numerical::ODE::ode_config::Config;
use crate::numerical::ODE::ode_errors::OdeError;
use crate::numerical::ODE::ode_jacobian::numerical_jacobian;
use crate::numerical::ODE::ode_stat::Stat;
use crate::numerical::ODE::rk_method::{MethodInfo, OdeSystem, RKMethod, rms_scaled};
use crate::numerical::ODE::rk_work::RKWork;
use crate::somelinalg::linear_solvers::{
    LinSol, LinSolError, LinSolKind, new_lin_sol, new_lin_sol_cmplx,
};
use crate::somelinalg::triplet::Triplet;
use nalgebra::DVector;
use num_complex::Complex;

// nodes: (4 -+ sqrt(6))/10 and 1
const C1: f64 = 0.15505102572168219018;
const C2: f64 = 0.64494897427831780982;
const C: [f64; 3] = [C1, C2, 1.0];
const C1M1: f64 = C1 - 1.0;
const C2M1: f64 = C2 - 1.0;
const C1MC2: f64 = C1 - C2;
// error estimate: -(13 + 7 sqrt(6))/3, (-13 + 7 sqrt(6))/3, -1/3
const DD1: f64 = -10.048809399827416;
const DD2: f64 = 1.382142733160749;
const DD3: f64 = -1.0 / 3.0;
// eigenvalues of the inverse of the coefficient matrix: gamma, alpha +- i beta
const U1: f64 = 3.637834252744496;
const ALPH: f64 = 2.681082873627752;
const BETA: f64 = 3.050430199247410;
// eigenvector transformation and its inverse
const T: [[f64; 3]; 3] = [
    [
        9.1232394870892942792e-02,
        -0.14125529502095420843,
        -3.0029194105147424492e-02,
    ],
    [
        0.24171793270710701896,
        0.20412935229379993199,
        0.38294211275726193779,
    ],
    [0.96604818261509293619, 1.0, 0.0],
];
const TI: [[f64; 3]; 3] = [
    [
        4.3255798900631553510,
        0.33919925181580986954,
        0.54177053993587487119,
    ],
    [
        -4.1787185915519047273,
        -0.32768282076106238708,
        0.47662355450055045196,
    ],
    [
        -0.50287263494578687595,
        2.5719269498556054292,
        -0.59603920482822492497,
    ],
];

fn zeros3(ndim: usize) -> [DVector<f64>; 3] {
    std::array::from_fn(|_| DVector::zeros(ndim))
}

pub struct Radau5 {
    ndim: usize,
    mass: Option<Triplet<f64>>,
    lin_sol: Box<dyn LinSol<f64>>,
    lin_sol_c: Box<dyn LinSol<Complex<f64>>>,
    dfdy: Triplet<f64>,
    /// (gamma/h) M - J
    kmat: Triplet<f64>,
    /// ((alpha + i beta)/h) M - J
    cmat: Triplet<Complex<f64>>,
    /// stage increments Y_i - y
    z: [DVector<f64>; 3],
    /// transformed increments w = TI z
    w: [DVector<f64>; 3],
    dw: [DVector<f64>; 3],
    f: [DVector<f64>; 3],
    /// stage states, then right-hand sides
    v: [DVector<f64>; 3],
    /// M w
    mw: [DVector<f64>; 3],
    /// continuous extension of the last accepted step
    ycol: [DVector<f64>; 3],
    rhs_c: DVector<Complex<f64>>,
    dw_c: DVector<Complex<f64>>,
    lerr: DVector<f64>,
    rhs: DVector<f64>,
    tmp: DVector<f64>,
    mtmp: DVector<f64>,
}

impl Radau5 {
    pub fn new(ndim: usize, kind: LinSolKind, mass: Option<Triplet<f64>>) -> Self {
        let nnz = ndim * ndim + ndim;
        Radau5 {
            ndim,
            mass,
            lin_sol: new_lin_sol(kind),
            lin_sol_c: new_lin_sol_cmplx(kind),
            dfdy: Triplet::new(ndim, ndim, ndim * ndim),
            kmat: Triplet::new(ndim, ndim, nnz),
            cmat: Triplet::new(ndim, ndim, nnz),
            z: zeros3(ndim),
            w: zeros3(ndim),
            dw: zeros3(ndim),
            f: zeros3(ndim),
            v: zeros3(ndim),
            mw: zeros3(ndim),
            ycol: zeros3(ndim),
            rhs_c: DVector::from_element(ndim, Complex::new(0.0, 0.0)),
            dw_c: DVector::from_element(ndim, Complex::new(0.0, 0.0)),
            lerr: DVector::zeros(ndim),
            rhs: DVector::zeros(ndim),
            tmp: DVector::zeros(ndim),
            mtmp: DVector::zeros(ndim),
        }
    }

    /// Jacobian (unless it may be reused) and factorisations of both iteration matrices
    fn factorize(
        &mut self,
        sys: &OdeSystem,
        work: &mut RKWork,
        stat: &mut Stat,
        x: f64,
        y: &DVector<f64>,
    ) -> Result<(), LinSolError> {
        let h = work.h;
        if work.reuse_jac_once {
            work.reuse_jac_once = false;
        } else if !work.jac_is_ok {
            self.dfdy.start();
            match &sys.jac {
                Some(jac) => jac(&mut self.dfdy, h, x, y),
                None => {
                    stat.nfeval += self.ndim;
                    let fcn = &sys.fcn;
                    numerical_jacobian(
                        &mut self.dfdy,
                        |fy, ya| fcn(fy, h, x, ya),
                        y,
                        &work.f0,
                        &mut self.tmp,
                    );
                }
            }
            work.jac_is_ok = true;
            stat.njeval += 1;
        }

        let gam = U1 / h;
        let alp_bet = Complex::new(ALPH / h, BETA / h);
        self.kmat.start();
        self.cmat.start();
        match &self.mass {
            None => {
                self.kmat.put_diagonal(gam);
                self.cmat.put_diagonal(alp_bet);
            }
            Some(mass) => {
                self.kmat.put_scaled(mass, gam);
                self.cmat.put_scaled(mass, alp_bet);
            }
        }
        self.kmat.put_scaled(&self.dfdy, -1.0);
        self.cmat.put_scaled(&self.dfdy, Complex::new(-1.0, 0.0));
        self.lin_sol.init(&self.kmat)?;
        self.lin_sol_c.init(&self.cmat)?;
        stat.ndecomp += 1;
        self.lin_sol.fact()?;
        self.lin_sol_c.fact()?;
        Ok(())
    }

    /// out = M v (or v without mass matrix)
    fn mul_mass(mass: &Option<Triplet<f64>>, out: &mut DVector<f64>, v: &DVector<f64>) {
        match mass {
            Some(mass) => mass.mul_vec(out, v),
            None => out.copy_from(v),
        }
    }

    /// starting values of the Newton iterations from the continuous extension
    fn starting_values(&mut self, conf: &Config, work: &RKWork) {
        if work.first || conf.zero_trial {
            for i in 0..3 {
                self.z[i].fill(0.0);
                self.w[i].fill(0.0);
            }
            return;
        }
        let c3q = work.h / work.h_prev;
        let cq = [C1 * c3q, C2 * c3q, c3q];
        for m in 0..self.ndim {
            let (a1, a2, a3) = (self.ycol[0][m], self.ycol[1][m], self.ycol[2][m]);
            for i in 0..3 {
                self.z[i][m] = cq[i] * (a1 + (cq[i] - C2M1) * (a2 + (cq[i] - C1M1) * a3));
            }
            for i in 0..3 {
                self.w[i][m] =
                    TI[i][0] * self.z[0][m] + TI[i][1] * self.z[1][m] + TI[i][2] * self.z[2][m];
            }
        }
    }

    /// simplified Newton iterations; sets work.diverg/dvfac on failure
    fn newton(
        &mut self,
        sys: &OdeSystem,
        conf: &Config,
        work: &mut RKWork,
        stat: &mut Stat,
        x: f64,
        y: &DVector<f64>,
    ) -> Result<(), OdeError> {
        let h = work.h;
        let (gam, alp, bet) = (U1 / h, ALPH / h, BETA / h);
        let nmax_it = conf.nmax_it;
        let fnewt = conf.fnewt();

        work.nit = 0;
        work.eta = f64::max(work.eta, f64::EPSILON).powf(0.8);
        work.theta = conf.theta_max;
        let (mut ldw_old, mut thq_old) = (0.0, 0.0);
        for it in 0..nmax_it {
            work.nit = it + 1;
            stat.nitmax = stat.nitmax.max(work.nit);

            // f at the stages
            for i in 0..3 {
                self.v[i].copy_from(y);
                self.v[i] += &self.z[i];
                stat.nfeval += 1;
                (sys.fcn)(&mut self.f[i], h, x + C[i] * h, &self.v[i]);
            }

            // right-hand sides of the transformed system
            for i in 0..3 {
                Self::mul_mass(&self.mass, &mut self.mw[i], &self.w[i]);
            }
            for m in 0..self.ndim {
                let tf: [f64; 3] = std::array::from_fn(|i| {
                    TI[i][0] * self.f[0][m] + TI[i][1] * self.f[1][m] + TI[i][2] * self.f[2][m]
                });
                self.v[0][m] = tf[0] - gam * self.mw[0][m];
                self.v[1][m] = tf[1] - alp * self.mw[1][m] + bet * self.mw[2][m];
                self.v[2][m] = tf[2] - bet * self.mw[1][m] - alp * self.mw[2][m];
                self.rhs_c[m] = Complex::new(self.v[1][m], self.v[2][m]);
            }

            // solve linear systems
            stat.nlinsol += 1;
            self.lin_sol.solve(&mut self.dw[0], &self.v[0])?;
            self.lin_sol_c.solve(&mut self.dw_c, &self.rhs_c)?;
            for m in 0..self.ndim {
                self.dw[1][m] = self.dw_c[m].re;
                self.dw[2][m] = self.dw_c[m].im;
            }

            // rms norm of the increments
            let ldw = {
                let sum: f64 = (0..3)
                    .map(|i| rms_scaled(&self.dw[i], &work.scal).powi(2))
                    .sum();
                (sum / 3.0).sqrt()
            };

            // rate of convergence
            if it >= 1 && it + 1 < nmax_it {
                let thq = ldw / ldw_old;
                work.theta = if it == 1 { thq } else { (thq * thq_old).sqrt() };
                thq_old = thq;
                if work.theta < 0.99 {
                    work.eta = work.theta / (1.0 - work.theta);
                    let left = (nmax_it - 2 - it) as i32;
                    let dyth = work.eta * ldw * work.theta.powi(left) / fnewt;
                    if dyth >= 1.0 {
                        let qnewt = dyth.clamp(1e-4, 20.0);
                        work.dvfac = 0.8 * qnewt.powf(-1.0 / (4.0 + left as f64));
                        work.diverg = true;
                        return Ok(());
                    }
                } else {
                    // also catches NaN
                    work.dvfac = 0.5;
                    work.diverg = true;
                    return Ok(());
                }
            }
            ldw_old = f64::max(ldw, f64::EPSILON);

            // update w and z
            for m in 0..self.ndim {
                for i in 0..3 {
                    self.w[i][m] += self.dw[i][m];
                }
                for i in 0..3 {
                    self.z[i][m] =
                        T[i][0] * self.w[0][m] + T[i][1] * self.w[1][m] + T[i][2] * self.w[2][m];
                }
            }

            if work.eta * ldw <= fnewt {
                return Ok(());
            }
        }
        // no convergence within nmax_it iterations
        work.dvfac = 0.5;
        work.diverg = true;
        Ok(())
    }

    /// local error estimate with the extra filter on first and rejected steps
    fn error_estimate(
        &mut self,
        sys: &OdeSystem,
        work: &RKWork,
        stat: &mut Stat,
        x: f64,
        y: &DVector<f64>,
    ) -> Result<f64, OdeError> {
        let h = work.h;
        let (hee1, hee2, hee3) = (DD1 / h, DD2 / h, DD3 / h);
        for m in 0..self.ndim {
            self.tmp[m] = hee1 * self.z[0][m] + hee2 * self.z[1][m] + hee3 * self.z[2][m];
        }
        Self::mul_mass(&self.mass, &mut self.mtmp, &self.tmp);
        self.rhs.copy_from(&self.mtmp);
        self.rhs += &work.f0;
        self.lin_sol.solve(&mut self.lerr, &self.rhs)?;
        let mut err = f64::max(rms_scaled(&self.lerr, &work.scal), 1e-10);
        if err >= 1.0 && (work.first || work.reject) {
            self.v[0].copy_from(y);
            self.v[0] += &self.lerr;
            stat.nfeval += 1;
            (sys.fcn)(&mut self.f[0], h, x, &self.v[0]);
            self.rhs.copy_from(&self.f[0]);
            self.rhs += &self.mtmp;
            self.lin_sol.solve(&mut self.lerr, &self.rhs)?;
            err = f64::max(rms_scaled(&self.lerr, &work.scal), 1e-10);
        }
        Ok(err)
    }

    /// h / quot with quot = clamp(err^(1/4)/fac, 1/fac_max, 1/fac_min)
    fn step_quot(conf: &Config, work: &RKWork) -> f64 {
        let nit = work.nit as f64;
        let nmax = conf.nmax_it as f64;
        let fac = f64::min(
            conf.safety,
            conf.safety * (1.0 + 2.0 * nmax) / (nit + 2.0 * nmax),
        );
        (work.rerr.powf(0.25) / fac).clamp(1.0 / conf.fac_max, 1.0 / conf.fac_min)
    }
}

impl RKMethod for Radau5 {
    fn info(&self) -> MethodInfo {
        MethodInfo {
            fixed_only: false,
            implicit: true,
            nstages: 3,
            has_dense: true,
            uses_f0: true,
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
        work.diverg = false;
        work.rs = 0.0;

        if work.reuse_jac_and_dec_once {
            work.reuse_jac_and_dec_once = false;
        } else {
            match self.factorize(sys, work, stat, x, y) {
                Ok(()) => {}
                // singular iteration matrix: retry with a smaller step
                Err(LinSolError::Singular(_)) => {
                    work.dvfac = 0.5;
                    work.diverg = true;
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.starting_values(conf, work);
        self.newton(sys, conf, work, stat, x, y)?;
        if work.diverg {
            return Ok(());
        }

        let err = self.error_estimate(sys, work, stat, x, y)?;
        if !err.is_finite() {
            work.dvfac = 0.5;
            work.diverg = true;
            return Ok(());
        }
        work.rerr = err;
        Ok(())
    }

    fn accept(
        &mut self,
        conf: &Config,
        work: &mut RKWork,
        stat: &Stat,
        y: &mut DVector<f64>,
        _x: f64,
    ) -> f64 {
        // new state and collocation polynomial
        for m in 0..self.ndim {
            let (z1, z2, z3) = (self.z[0][m], self.z[1][m], self.z[2][m]);
            y[m] += z3;
            self.ycol[0][m] = (z2 - z3) / C2M1;
            let ak = (z1 - z2) / C1MC2;
            let acont3 = (ak - z1 / C1) / C2;
            self.ycol[1][m] = (ak - self.ycol[0][m]) / C1M1;
            self.ycol[2][m] = self.ycol[1][m] - acont3;
        }

        let mut quot = Self::step_quot(conf, work);
        // predictive controller of Gustafsson
        if conf.pred_ctrl && stat.naccepted > 1 {
            let facgus = (work.h_prev / work.h)
                * (work.rerr * work.rerr / work.rerr_prev).powf(0.25)
                / conf.safety;
            let facgus = facgus.clamp(1.0 / conf.fac_max, 1.0 / conf.fac_min);
            quot = f64::max(quot, facgus);
        }
        work.h / quot
    }

    fn reject(&mut self, conf: &Config, work: &RKWork) -> f64 {
        work.h / Self::step_quot(conf, work)
    }

    fn dense_out(
        &self,
        yout: &mut DVector<f64>,
        h: f64,
        x: f64,
        y: &DVector<f64>,
        xout: f64,
    ) -> Result<(), OdeError> {
        let s = (xout - x) / h;
        for m in 0..self.ndim {
            yout[m] = y[m]
                + s * (self.ycol[0][m]
                    + (s - C2M1) * (self.ycol[1][m] + (s - C1M1) * self.ycol[2][m]));
        }
        Ok(())
    }

    fn free(&mut self) {
        self.lin_sol.free();
        self.lin_sol_c.free();
    }
}
