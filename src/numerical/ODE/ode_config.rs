//! Configuration of the ODE solvers: method, tolerances, step-size control,
//! Newton iterations, stiffness detection and output settings.
//!
//! ```text
//! solver    method: radau5 lin_sol: dense verbose: false
//! tolerance atol: 1e-6 rtol: 1e-6
//! step      ini_h: 1e-4 nmax_ss: 2000
//! ```
use crate::Utils::task_parser::{
    DocumentMap, check_document, get_bool, get_f64, get_f64_list, get_string, get_usize,
    parse_document,
};
use crate::numerical::ODE::ode_errors::OdeError;
use crate::somelinalg::linear_solvers::LinSolKind;
use nalgebra::DVector;
use std::fmt::Debug;
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

/// names of the available methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, EnumIter)]
pub enum OdeMethod {
    #[strum(serialize = "fweuler")]
    FwEuler,
    #[strum(serialize = "bweuler")]
    BwEuler,
    #[strum(serialize = "moeuler")]
    MoEuler,
    #[strum(serialize = "rk2")]
    Rk2,
    #[strum(serialize = "rk3")]
    Rk3,
    #[strum(serialize = "heun3")]
    Heun3,
    #[strum(serialize = "rk4")]
    Rk4,
    #[strum(serialize = "rk4-3/8")]
    Rk4_38,
    #[strum(serialize = "merson4")]
    Merson4,
    #[strum(serialize = "zonneveld4")]
    Zonneveld4,
    #[strum(serialize = "fehlberg4")]
    Fehlberg4,
    #[strum(serialize = "dopri5")]
    Dopri5,
    #[strum(serialize = "verner6")]
    Verner6,
    #[strum(serialize = "fehlberg7")]
    Fehlberg7,
    #[strum(serialize = "dopri8")]
    Dopri8,
    #[strum(serialize = "radau5")]
    Radau5,
}

impl OdeMethod {
    pub fn is_explicit(&self) -> bool {
        !matches!(self, OdeMethod::BwEuler | OdeMethod::Radau5)
    }
}

/// tolerance given either for all components or per component
#[derive(Clone, PartialEq)]
pub enum NumberOrVec {
    Number(f64),
    Vec(Vec<f64>),
}

impl Debug for NumberOrVec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NumberOrVec::Number(n) => write!(f, "{}", n),
            NumberOrVec::Vec(v) => write!(f, "{:?}", v),
        }
    }
}

impl NumberOrVec {
    pub fn at(&self, i: usize) -> f64 {
        match self {
            NumberOrVec::Number(n) => *n,
            NumberOrVec::Vec(v) => v[i],
        }
    }

    /// smallest value
    pub fn min(&self) -> f64 {
        match self {
            NumberOrVec::Number(n) => *n,
            NumberOrVec::Vec(v) => v.iter().cloned().fold(f64::INFINITY, f64::min),
        }
    }

    fn len(&self) -> Option<usize> {
        match self {
            NumberOrVec::Number(_) => None,
            NumberOrVec::Vec(v) => Some(v.len()),
        }
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> NumberOrVec {
        match self {
            NumberOrVec::Number(n) => NumberOrVec::Number(f(*n)),
            NumberOrVec::Vec(v) => NumberOrVec::Vec(v.iter().map(|x| f(*x)).collect()),
        }
    }
}

/// tolerance of the Newton iterations from the (smallest) relative tolerance
pub fn newton_tol(rtol: &NumberOrVec) -> f64 {
    let rtol_i = rtol.min();
    f64::max(
        10.0 * f64::EPSILON / rtol_i,
        f64::min(0.03, rtol_i.powf(0.5)),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub method: OdeMethod,
    /// linear solver used by implicit methods
    pub lin_sol: LinSolKind,

    // tolerances
    atol: NumberOrVec,
    rtol: NumberOrVec,
    fnewt: f64,

    // fixed steps
    pub fixed: bool,
    fixed_h: f64,

    // step-size control
    pub ini_h: f64,
    /// max number of substeps
    pub nmax_ss: usize,
    /// max number of Newton iterations
    pub nmax_it: usize,
    pub safety: f64,
    /// lower bound of h_new/h
    pub fac_min: f64,
    /// upper bound of h_new/h
    pub fac_max: f64,
    /// Lund stabilisation coefficient
    pub stab_beta: f64,
    /// predictive controller of Gustafsson (radau5)
    pub pred_ctrl: bool,
    pub rerr_prev_min: f64,
    /// multiplier of h when the very first step is rejected (0 = use the method's formula)
    pub mfirst_rej: f64,

    // Jacobian and decomposition reuse
    pub theta_max: f64,
    pub c1h: f64,
    pub c2h: f64,
    /// radau5: start Newton iterations from zero instead of the continuous extension
    pub zero_trial: bool,
    /// bweuler: constant tangent (Jacobian computed on the first iteration only)
    pub cte_tg: bool,

    // stiffness detection
    pub stiff_nstp: usize,
    pub stiff_rs_max: f64,
    pub stiff_nyes: usize,
    pub stiff_nnot: usize,

    // output
    pub verbose: bool,
    pub save_step: bool,
    pub save_dense: bool,
    /// spacing of dense output points; None = no dense output
    pub dense_dx: Option<f64>,
}

impl Config {
    /// default parameters for the given method
    pub fn new(method: OdeMethod) -> Self {
        let (fac_min, fac_max) = match method {
            OdeMethod::Dopri8 => (0.333, 6.0),
            OdeMethod::Radau5 => (0.2, 8.0),
            _ => (0.2, 10.0),
        };
        let mut conf = Config {
            method,
            lin_sol: LinSolKind::default(),
            atol: NumberOrVec::Number(1e-4),
            rtol: NumberOrVec::Number(1e-4),
            fnewt: 0.0,
            fixed: false,
            fixed_h: 0.0,
            ini_h: 1e-4,
            nmax_ss: 1000,
            nmax_it: 7,
            safety: 0.9,
            fac_min,
            fac_max,
            stab_beta: if method == OdeMethod::Dopri5 { 0.04 } else { 0.0 },
            pred_ctrl: true,
            rerr_prev_min: if method == OdeMethod::Radau5 { 1e-2 } else { 1e-4 },
            mfirst_rej: if method == OdeMethod::Radau5 { 0.1 } else { 0.0 },
            theta_max: 1e-3,
            c1h: 1.0,
            c2h: 1.2,
            zero_trial: false,
            cte_tg: true,
            stiff_nstp: 1000,
            stiff_rs_max: if method == OdeMethod::Dopri8 { 6.1 } else { 3.25 },
            stiff_nyes: 15,
            stiff_nnot: 6,
            verbose: false,
            save_step: false,
            save_dense: false,
            dense_dx: None,
        };
        conf.apply_tols(NumberOrVec::Number(1e-4), NumberOrVec::Number(1e-4));
        conf
    }

    /// parses the method name, e.g. "dopri5" or "rk4-3/8"
    pub fn from_name(method: &str) -> Result<Self, OdeError> {
        let method = OdeMethod::from_str(method)
            .map_err(|_| OdeError::Config(format!("unknown method '{}'", method)))?;
        Ok(Config::new(method))
    }

    /// sets absolute and relative tolerances (same for all components)
    pub fn set_tols(&mut self, atol: f64, rtol: f64) -> Result<(), OdeError> {
        if !(atol > 0.0 && rtol > 0.0) {
            return Err(OdeError::Config(format!(
                "tolerances must be positive: atol = {}, rtol = {}",
                atol, rtol
            )));
        }
        self.apply_tols(NumberOrVec::Number(atol), NumberOrVec::Number(rtol));
        Ok(())
    }

    /// sets per-component tolerances
    pub fn set_tols_vec(&mut self, atol: Vec<f64>, rtol: Vec<f64>) -> Result<(), OdeError> {
        if atol.len() != rtol.len() || atol.is_empty() {
            return Err(OdeError::Config(format!(
                "atol and rtol must have the same non-zero length: {} != {}",
                atol.len(),
                rtol.len()
            )));
        }
        if atol.iter().chain(rtol.iter()).any(|t| !(*t > 0.0)) {
            return Err(OdeError::Config("tolerances must be positive".to_string()));
        }
        self.apply_tols(NumberOrVec::Vec(atol), NumberOrVec::Vec(rtol));
        Ok(())
    }

    fn apply_tols(&mut self, atol: NumberOrVec, rtol: NumberOrVec) {
        if self.method == OdeMethod::Radau5 {
            // rtol' = 0.1 rtol^(2/3), atol' = rtol' atol/rtol
            let beta = 2.0 / 3.0;
            let rtol_new = rtol.map(|r| 0.1 * r.powf(beta));
            let atol_new = match (&atol, &rtol) {
                (NumberOrVec::Number(a), NumberOrVec::Number(r)) => {
                    NumberOrVec::Number(0.1 * r.powf(beta) * a / r)
                }
                _ => NumberOrVec::Vec(
                    (0..atol.len().or(rtol.len()).unwrap_or(1))
                        .map(|i| {
                            let (a, r) = (atol.at(i), rtol.at(i));
                            0.1 * r.powf(beta) * a / r
                        })
                        .collect(),
                ),
            };
            self.atol = atol_new;
            self.rtol = rtol_new;
        } else {
            self.atol = atol;
            self.rtol = rtol;
        }
        self.fnewt = newton_tol(&self.rtol);
    }

    pub fn atol(&self) -> &NumberOrVec {
        &self.atol
    }

    pub fn rtol(&self) -> &NumberOrVec {
        &self.rtol
    }

    /// tolerance of the Newton iterations
    pub fn fnewt(&self) -> f64 {
        self.fnewt
    }

    /// overrides the Newton tolerance derived from rtol
    pub fn set_fnewt(&mut self, fnewt: f64) -> Result<(), OdeError> {
        if !(fnewt > 0.0) {
            return Err(OdeError::Config(format!("fnewt must be positive: {}", fnewt)));
        }
        self.fnewt = fnewt;
        Ok(())
    }

    /// scal = atol + rtol * |y|
    pub fn scale(&self, scal: &mut DVector<f64>, y: &DVector<f64>) {
        for i in 0..y.len() {
            scal[i] = self.atol.at(i) + self.rtol.at(i) * y[i].abs();
        }
    }

    /// error scale of component i between the old and the new state
    pub fn sk(&self, i: usize, y_old: f64, y_new: f64) -> f64 {
        self.atol.at(i) + self.rtol.at(i) * f64::max(y_old.abs(), y_new.abs())
    }

    /// switches to fixed steps of (approximately) dx
    pub fn set_fixed_h(&mut self, dx: f64) -> Result<(), OdeError> {
        if !(dx > 0.0) {
            return Err(OdeError::Config(format!("fixed step must be positive: {}", dx)));
        }
        self.fixed = true;
        self.fixed_h = dx;
        Ok(())
    }

    pub fn fixed_h(&self) -> f64 {
        self.fixed_h
    }

    /// number of fixed steps covering [x0, xf] and the actual step size
    pub fn fixed_steps(&self, x0: f64, xf: f64) -> (usize, f64) {
        let span = xf - x0;
        if span <= 0.0 {
            return (0, self.fixed_h);
        }
        let n = ((span / self.fixed_h - 1e-10).ceil() as usize).max(1);
        (n, span / n as f64)
    }

    pub fn set_ini_h(&mut self, ini_h: f64) -> Result<(), OdeError> {
        if !(ini_h > 0.0) {
            return Err(OdeError::Config(format!("initial step must be positive: {}", ini_h)));
        }
        self.ini_h = ini_h;
        Ok(())
    }

    /// save the state after every accepted step
    pub fn set_step_out(&mut self, save: bool) {
        self.save_step = save;
    }

    /// dense output at x0, x0 + dx, x0 + 2dx, ...
    pub fn set_dense_out(&mut self, save: bool, dx: f64) -> Result<(), OdeError> {
        if !(dx > 0.0) {
            return Err(OdeError::Config(format!("dense output spacing must be positive: {}", dx)));
        }
        self.save_dense = save;
        self.dense_dx = Some(dx);
        Ok(())
    }

    /// consistency checks against the problem size
    pub fn validate(&self, ndim: usize) -> Result<(), OdeError> {
        for (name, tol) in [("atol", &self.atol), ("rtol", &self.rtol)] {
            if let Some(len) = tol.len() {
                if len != ndim {
                    return Err(OdeError::Config(format!(
                        "{} has {} components but the system has {}",
                        name, len, ndim
                    )));
                }
            }
        }
        if self.nmax_ss == 0 || self.nmax_it == 0 {
            return Err(OdeError::Config(
                "nmax_ss and nmax_it must be at least 1".to_string(),
            ));
        }
        if !(self.fac_min > 0.0 && self.fac_min < 1.0 && self.fac_max > 1.0) {
            return Err(OdeError::Config(format!(
                "step-size bounds must satisfy 0 < fac_min < 1 < fac_max: {} {}",
                self.fac_min, self.fac_max
            )));
        }
        if !(self.safety > 0.0 && self.safety <= 1.0) {
            return Err(OdeError::Config(format!("safety must be in (0, 1]: {}", self.safety)));
        }
        Ok(())
    }

    /// configuration from a task document
    pub fn from_task_str(doc: &str) -> Result<Self, OdeError> {
        let map = parse_document(doc)?;
        check_document(&map, TASK_TEMPLATE)?;
        let name = get_string(&map, "solver", "method")
            .ok_or_else(|| OdeError::Config("solver.method is required".to_string()))?;
        let mut conf = Config::from_name(&name)?;
        conf.apply_document(&map)?;
        Ok(conf)
    }

    fn apply_document(&mut self, map: &DocumentMap) -> Result<(), OdeError> {
        if let Some(lin_sol) = get_string(map, "solver", "lin_sol") {
            self.lin_sol = LinSolKind::from_str(&lin_sol)
                .map_err(|_| OdeError::Config(format!("unknown linear solver '{}'", lin_sol)))?;
        }
        if let Some(v) = get_bool(map, "solver", "verbose")? {
            self.verbose = v;
        }
        // tolerances
        let atol = get_f64_list(map, "tolerance", "atol")?;
        let rtol = get_f64_list(map, "tolerance", "rtol")?;
        match (atol, rtol) {
            (None, None) => {}
            (Some(a), Some(r)) if a.len() == 1 && r.len() == 1 => self.set_tols(a[0], r[0])?,
            (Some(a), Some(r)) => {
                let n = a.len().max(r.len());
                let widen = |v: Vec<f64>| if v.len() == 1 { vec![v[0]; n] } else { v };
                self.set_tols_vec(widen(a), widen(r))?
            }
            (Some(a), None) if a.len() == 1 => self.set_tols(a[0], a[0])?,
            (None, Some(r)) if r.len() == 1 => self.set_tols(r[0], r[0])?,
            _ => {
                return Err(OdeError::Config(
                    "per-component tolerances need both atol and rtol".to_string(),
                ));
            }
        }
        // step
        if let Some(v) = get_f64(map, "step", "ini_h")? {
            self.set_ini_h(v)?;
        }
        if let Some(v) = get_usize(map, "step", "nmax_ss")? {
            self.nmax_ss = v;
        }
        if let Some(v) = get_f64(map, "step", "fixed_h")? {
            self.set_fixed_h(v)?;
        }
        if let Some(v) = get_f64(map, "step", "mfirst_rej")? {
            self.mfirst_rej = v;
        }
        // control
        if let Some(v) = get_f64(map, "control", "safety")? {
            self.safety = v;
        }
        if let Some(v) = get_f64(map, "control", "fac_min")? {
            self.fac_min = v;
        }
        if let Some(v) = get_f64(map, "control", "fac_max")? {
            self.fac_max = v;
        }
        if let Some(v) = get_f64(map, "control", "beta")? {
            self.stab_beta = v;
        }
        if let Some(v) = get_bool(map, "control", "pred_ctrl")? {
            self.pred_ctrl = v;
        }
        if let Some(v) = get_f64(map, "control", "rerr_prev_min")? {
            self.rerr_prev_min = v;
        }
        // newton
        if let Some(v) = get_usize(map, "newton", "nmax_it")? {
            self.nmax_it = v;
        }
        if let Some(v) = get_f64(map, "newton", "theta_max")? {
            self.theta_max = v;
        }
        if let Some(v) = get_f64(map, "newton", "c1h")? {
            self.c1h = v;
        }
        if let Some(v) = get_f64(map, "newton", "c2h")? {
            self.c2h = v;
        }
        if let Some(v) = get_bool(map, "newton", "zero_trial")? {
            self.zero_trial = v;
        }
        if let Some(v) = get_bool(map, "newton", "cte_tg")? {
            self.cte_tg = v;
        }
        // stiffness
        if let Some(v) = get_usize(map, "stiffness", "nstp")? {
            self.stiff_nstp = v;
        }
        if let Some(v) = get_f64(map, "stiffness", "rs_max")? {
            self.stiff_rs_max = v;
        }
        if let Some(v) = get_usize(map, "stiffness", "nyes")? {
            self.stiff_nyes = v;
        }
        if let Some(v) = get_usize(map, "stiffness", "nnot")? {
            self.stiff_nnot = v;
        }
        // output
        if let Some(v) = get_bool(map, "output", "save_step")? {
            self.save_step = v;
        }
        if let Some(v) = get_f64(map, "output", "dense_dx")? {
            self.set_dense_out(true, v)?;
        }
        Ok(())
    }
}

const TASK_TEMPLATE: &[(&str, &[&str])] = &[
    ("solver", &["method", "lin_sol", "verbose"]),
    ("tolerance", &["atol", "rtol"]),
    ("step", &["ini_h", "nmax_ss", "fixed_h", "mfirst_rej"]),
    (
        "control",
        &["safety", "fac_min", "fac_max", "beta", "pred_ctrl", "rerr_prev_min"],
    ),
    (
        "newton",
        &["nmax_it", "theta_max", "c1h", "c2h", "zero_trial", "cte_tg"],
    ),
    ("stiffness", &["nstp", "rs_max", "nyes", "nnot"]),
    ("output", &["save_step", "dense_dx"]),
];

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn test_method_names() {
        for method in OdeMethod::iter() {
            let name = method.to_string();
            assert_eq!(OdeMethod::from_str(&name).unwrap(), method);
        }
        assert_eq!(OdeMethod::from_str("rk4-3/8").unwrap(), OdeMethod::Rk4_38);
        assert!(Config::from_name("euler").is_err());
        assert!(!OdeMethod::Radau5.is_explicit());
        assert!(OdeMethod::Dopri8.is_explicit());
    }

    #[test]
    fn test_defaults() {
        let conf = Config::new(OdeMethod::Dopri5);
        assert_eq!(conf.stab_beta, 0.04);
        assert_eq!(conf.fac_max, 10.0);
        assert_eq!(conf.mfirst_rej, 0.0);
        let conf = Config::new(OdeMethod::Dopri8);
        assert_eq!(conf.stiff_rs_max, 6.1);
        assert_eq!(conf.fac_min, 0.333);
        let conf = Config::new(OdeMethod::Radau5);
        assert_eq!(conf.mfirst_rej, 0.1);
        assert_eq!(conf.rerr_prev_min, 1e-2);
        assert!(conf.validate(3).is_ok());
    }

    #[test]
    fn test_radau5_tolerances_are_transformed() {
        let mut conf = Config::new(OdeMethod::Radau5);
        conf.set_tols(1e-6, 1e-3).unwrap();
        let rtol = 0.1 * 1e-3_f64.powf(2.0 / 3.0);
        assert_relative_eq!(conf.rtol().at(0), rtol, epsilon = 1e-15);
        assert_relative_eq!(conf.atol().at(0), rtol * 1e-3, epsilon = 1e-15);
        assert_relative_eq!(conf.fnewt(), f64::min(0.03, rtol.sqrt()), epsilon = 1e-15);

        let mut conf = Config::new(OdeMethod::Dopri5);
        conf.set_tols(1e-6, 1e-3).unwrap();
        assert_eq!(conf.rtol(), &NumberOrVec::Number(1e-3));
        assert!(conf.set_tols(0.0, 1e-3).is_err());
    }

    #[test]
    fn test_vector_tolerances() {
        let mut conf = Config::new(OdeMethod::Dopri5);
        conf.set_tols_vec(vec![1e-6, 1e-8], vec![1e-4, 1e-5]).unwrap();
        let mut scal = DVector::zeros(2);
        conf.scale(&mut scal, &DVector::from_vec(vec![-2.0, 10.0]));
        assert_relative_eq!(scal[0], 1e-6 + 2e-4, epsilon = 1e-18);
        assert_relative_eq!(scal[1], 1e-8 + 1e-4, epsilon = 1e-18);
        assert_relative_eq!(conf.sk(1, 1.0, -3.0), 1e-8 + 3e-5, epsilon = 1e-18);
        assert!(conf.validate(3).is_err());
        assert!(conf.set_tols_vec(vec![1e-6], vec![1e-4, 1e-5]).is_err());
    }

    #[test]
    fn test_fixed_steps() {
        let mut conf = Config::new(OdeMethod::BwEuler);
        assert!(conf.set_fixed_h(-0.1).is_err());
        conf.set_fixed_h(1.875 / 50.0).unwrap();
        assert!(conf.fixed);
        let (n, h) = conf.fixed_steps(0.0, 1.5);
        assert_eq!(n, 40);
        assert_relative_eq!(h, 0.0375, epsilon = 1e-15);
        conf.set_fixed_h(0.3).unwrap();
        let (n, h) = conf.fixed_steps(1.0, 2.0);
        assert_eq!(n, 4);
        assert_relative_eq!(h, 0.25, epsilon = 1e-15);
        // the requested step is kept, the actual one is computed per interval
        assert_eq!(conf.fixed_h(), 0.3);
    }

    #[test]
    fn test_newton_tolerance_override() {
        let mut conf = Config::new(OdeMethod::BwEuler);
        conf.set_tols(1e-4, 1e-4).unwrap();
        assert_relative_eq!(conf.fnewt(), 0.01, epsilon = 1e-15);
        conf.set_fnewt(1e-3).unwrap();
        assert_eq!(conf.fnewt(), 1e-3);
        assert!(conf.set_fnewt(0.0).is_err());
        assert!(conf.set_fnewt(f64::NAN).is_err());
        assert_eq!(conf.fnewt(), 1e-3);
    }

    #[test]
    fn test_from_task_str() {
        let doc = "
        solver    method: radau5 lin_sol: dense
        tolerance atol: 1e-6 rtol: 1e-6
        step      ini_h: 1e-3 nmax_ss: 5000
        newton    nmax_it: 10 zero_trial: true
        stiffness nstp: 1
        output    save_step: true dense_dx: 0.1
        ";
        let conf = Config::from_task_str(doc).unwrap();
        assert_eq!(conf.method, OdeMethod::Radau5);
        assert_eq!(conf.lin_sol, LinSolKind::Dense);
        assert_eq!(conf.ini_h, 1e-3);
        assert_eq!(conf.nmax_ss, 5000);
        assert_eq!(conf.nmax_it, 10);
        assert!(conf.zero_trial);
        assert_eq!(conf.stiff_nstp, 1);
        assert!(conf.save_step && conf.save_dense);
        assert_eq!(conf.dense_dx, Some(0.1));
        // radau5 transformation applied to the document tolerances
        assert_relative_eq!(conf.rtol().at(0), 0.1 * 1e-6_f64.powf(2.0 / 3.0), epsilon = 1e-15);

        let conf = Config::from_task_str("solver method: dopri5\ntolerance atol: 1e-6, 1e-7 rtol: 1e-4")
            .unwrap();
        assert_eq!(conf.atol(), &NumberOrVec::Vec(vec![1e-6, 1e-7]));
        assert_eq!(conf.rtol(), &NumberOrVec::Vec(vec![1e-4, 1e-4]));

        assert!(Config::from_task_str("tolerance atol: 1e-6").is_err());
        assert!(Config::from_task_str("solver method: rk4 colour: red").is_err());
        assert!(Config::from_task_str("solver method: rk4 lin_sol: magic").is_err());
        assert!(Config::from_task_str("solver method: rk4\nstep nmax_ss: -3").is_err());
    }
}
