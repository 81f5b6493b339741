use nalgebra::DVector;

/// workspace shared by the driver and the step methods
#[derive(Debug, Clone)]
pub struct RKWork {
    /// first step of the integration
    pub first: bool,
    /// f(x, y) at the beginning of the step (implicit methods)
    pub f0: DVector<f64>,
    /// atol + rtol * |y|
    pub scal: DVector<f64>,

    pub h: f64,
    pub h_prev: f64,
    /// stiffness ratio of the last step
    pub rs: f64,
    /// relative error of the last step
    pub rerr: f64,
    pub rerr_prev: f64,

    pub reject: bool,
    /// Newton iterations diverged
    pub diverg: bool,
    /// step-size multiplier after divergence
    pub dvfac: f64,
    /// Newton convergence indicators
    pub eta: f64,
    pub theta: f64,
    pub nit: usize,

    pub jac_is_ok: bool,
    pub reuse_jac_once: bool,
    pub reuse_jac_and_dec_once: bool,

    pub stiff_yes: usize,
    pub stiff_not: usize,
}

impl RKWork {
    pub fn new(ndim: usize) -> Self {
        RKWork {
            first: true,
            f0: DVector::zeros(ndim),
            scal: DVector::zeros(ndim),
            h: 0.0,
            h_prev: 0.0,
            rs: 0.0,
            rerr: 0.0,
            rerr_prev: 1e-4,
            reject: false,
            diverg: false,
            dvfac: 0.0,
            eta: 1.0,
            theta: 0.0,
            nit: 0,
            jac_is_ok: false,
            reuse_jac_once: false,
            reuse_jac_and_dec_once: false,
            stiff_yes: 0,
            stiff_not: 0,
        }
    }

    /// control flags at the start of a solve
    pub fn reset(&mut self, h: f64, theta_max: f64, rerr_prev: f64) {
        self.first = true;
        self.h = h;
        self.h_prev = h;
        self.rs = 0.0;
        self.rerr = 0.0;
        self.rerr_prev = rerr_prev;
        self.reject = false;
        self.diverg = false;
        self.dvfac = 0.0;
        self.eta = 1.0;
        self.theta = theta_max;
        self.nit = 0;
        self.jac_is_ok = false;
        self.reuse_jac_once = false;
        self.reuse_jac_and_dec_once = false;
        self.stiff_yes = 0;
        self.stiff_not = 0;
    }
}
