//! Common interface of the step methods and the problem definition they operate on.
use crate::numerical::ODE::BwEuler::BwEuler;
use crate::numerical::ODE::ERK::ExplicitRK;
use crate::numerical::ODE::Radau5::Radau5;
use crate::numerical::ODE::ode_config::{Config, OdeMethod};
use crate::numerical::ODE::ode_errors::OdeError;
use crate::numerical::ODE::ode_stat::Stat;
use crate::numerical::ODE::rk_work::RKWork;
use crate::somelinalg::triplet::Triplet;
use enum_dispatch::enum_dispatch;
use nalgebra::DVector;

/// right-hand side: f(x, y) = dy/dx, written into the first argument; h is the current step size
pub type OdeFn = dyn Fn(&mut DVector<f64>, f64, f64, &DVector<f64>);
/// Jacobian df/dy written into the (already started) triplet
pub type JacFn = dyn Fn(&mut Triplet<f64>, f64, f64, &DVector<f64>);

/// M dy/dx = f(x, y)
pub struct OdeSystem {
    pub ndim: usize,
    pub fcn: Box<OdeFn>,
    /// None = numerical Jacobian
    pub jac: Option<Box<JacFn>>,
    /// mass matrix (radau5 only)
    pub mass: Option<Triplet<f64>>,
}

impl OdeSystem {
    pub fn new(ndim: usize, fcn: Box<OdeFn>) -> Self {
        OdeSystem {
            ndim,
            fcn,
            jac: None,
            mass: None,
        }
    }

    pub fn with_jacobian(mut self, jac: Box<JacFn>) -> Self {
        self.jac = Some(jac);
        self
    }

    pub fn with_mass(mut self, mass: Triplet<f64>) -> Self {
        self.mass = Some(mass);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodInfo {
    /// only fixed steps are possible (no error estimate)
    pub fixed_only: bool,
    pub implicit: bool,
    pub nstages: usize,
    /// dense output available
    pub has_dense: bool,
    /// the method needs work.f0 = f(x, y) before each step
    pub uses_f0: bool,
}

#[enum_dispatch]
pub trait RKMethod {
    fn info(&self) -> MethodInfo;

    /// computes the tentative state from (x, y) with step work.h; y is not modified.
    /// Sets work.rerr, work.rs, work.diverg and work.dvfac
    fn step(
        &mut self,
        sys: &OdeSystem,
        conf: &Config,
        work: &mut RKWork,
        stat: &mut Stat,
        x: f64,
        y: &DVector<f64>,
    ) -> Result<(), OdeError>;

    /// commits the tentative state into y and returns the suggested next step size
    fn accept(
        &mut self,
        conf: &Config,
        work: &mut RKWork,
        stat: &Stat,
        y: &mut DVector<f64>,
        x: f64,
    ) -> f64;

    /// step size for the next attempt after a rejection
    fn reject(&mut self, conf: &Config, work: &RKWork) -> f64;

    /// yout = y(xout) inside the last accepted step [x - h, x]
    fn dense_out(
        &self,
        yout: &mut DVector<f64>,
        h: f64,
        x: f64,
        y: &DVector<f64>,
        xout: f64,
    ) -> Result<(), OdeError>;

    /// releases linear solver resources
    fn free(&mut self);
}

#[enum_dispatch(RKMethod)]
pub enum RKMethods {
    ExplicitRK(ExplicitRK),
    BwEuler(BwEuler),
    Radau5(Radau5),
}

/// allocates the step method selected in the configuration
pub fn new_rk_method(conf: &Config, sys: &OdeSystem) -> Result<RKMethods, OdeError> {
    if sys.mass.is_some() && conf.method != OdeMethod::Radau5 {
        return Err(OdeError::Config(format!(
            "mass matrix is only supported by radau5, not by {}",
            conf.method
        )));
    }
    if let Some(mass) = &sys.mass {
        if mass.nrows() != sys.ndim || mass.ncols() != sys.ndim {
            return Err(OdeError::Config(format!(
                "mass matrix must be {}x{}, got {}x{}",
                sys.ndim,
                sys.ndim,
                mass.nrows(),
                mass.ncols()
            )));
        }
    }
    let method = match conf.method {
        OdeMethod::BwEuler => RKMethods::BwEuler(BwEuler::new(sys.ndim, conf.lin_sol)),
        OdeMethod::Radau5 => {
            RKMethods::Radau5(Radau5::new(sys.ndim, conf.lin_sol, sys.mass.clone()))
        }
        method => RKMethods::ExplicitRK(ExplicitRK::new(method, sys.ndim)?),
    };
    Ok(method)
}

/// root-mean-square norm of v/scal
pub fn rms_scaled(v: &DVector<f64>, scal: &DVector<f64>) -> f64 {
    let n = v.len().max(1);
    let sum: f64 = v
        .iter()
        .zip(scal.iter())
        .map(|(vi, si)| (vi / si).powi(2))
        .sum();
    (sum / n as f64).sqrt()
}
