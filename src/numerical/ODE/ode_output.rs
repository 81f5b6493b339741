//! Collector of the solution: user callbacks, step history and dense output on a regular grid.
use crate::Utils::logger::save_history_to_csv;
use crate::numerical::ODE::ode_config::Config;
use crate::numerical::ODE::ode_errors::OdeError;
use crate::numerical::ODE::rk_method::{RKMethod, RKMethods};
use log::info;
use nalgebra::{DMatrix, DVector};
use std::io;

/// called after every accepted step with (istep, h, x, y); returning true stops the integration
pub type StepOutFn = Box<dyn FnMut(usize, f64, f64, &DVector<f64>) -> bool>;
/// called at every dense output point with (idx, h, x, y, xout, yout); returning true stops
pub type DenseOutFn = Box<dyn FnMut(usize, f64, f64, &DVector<f64>, f64, &DVector<f64>) -> bool>;

pub struct Output {
    save_step: bool,
    save_dense: bool,
    dense_dx: Option<f64>,
    step_fn: Option<StepOutFn>,
    dense_fn: Option<DenseOutFn>,

    /// step history
    pub step_idx: Vec<usize>,
    pub step_rs: Vec<f64>,
    pub step_h: Vec<f64>,
    pub step_x: Vec<f64>,
    pub step_y: Vec<DVector<f64>>,

    /// dense output history
    pub dense_idx: Vec<usize>,
    pub dense_x: Vec<f64>,
    pub dense_y: Vec<DVector<f64>>,

    // next dense point: x0 + kdense * dx
    x0: f64,
    kdense: usize,
    /// x of the last dense point produced
    xlast: Option<f64>,
    yout: DVector<f64>,
}

impl Output {
    pub fn new(conf: &Config, ndim: usize) -> Self {
        Output {
            save_step: conf.save_step,
            save_dense: conf.save_dense,
            dense_dx: conf.dense_dx,
            step_fn: None,
            dense_fn: None,
            step_idx: Vec::new(),
            step_rs: Vec::new(),
            step_h: Vec::new(),
            step_x: Vec::new(),
            step_y: Vec::new(),
            dense_idx: Vec::new(),
            dense_x: Vec::new(),
            dense_y: Vec::new(),
            x0: 0.0,
            kdense: 0,
            xlast: None,
            yout: DVector::zeros(ndim),
        }
    }

    pub fn set_step_fn(&mut self, f: StepOutFn) {
        self.step_fn = Some(f);
    }

    /// the callback is only invoked when a dense spacing is configured
    pub fn set_dense_fn(&mut self, f: DenseOutFn) {
        self.dense_fn = Some(f);
    }

    /// dense output points are produced (saved or passed to a callback)
    pub fn dense_active(&self) -> bool {
        self.dense_dx.is_some() && (self.save_dense || self.dense_fn.is_some())
    }

    /// clears the histories before a new solve starting at x0
    pub fn reset(&mut self, x0: f64) {
        self.step_idx.clear();
        self.step_rs.clear();
        self.step_h.clear();
        self.step_x.clear();
        self.step_y.clear();
        self.dense_idx.clear();
        self.dense_x.clear();
        self.dense_y.clear();
        self.x0 = x0;
        self.kdense = 0;
        self.xlast = None;
    }

    /// records the state after step `istep` (0 = initial state) and runs the callbacks.
    /// Returns true if a callback asked to stop
    #[allow(clippy::too_many_arguments)]
    pub fn execute(
        &mut self,
        method: &RKMethods,
        istep: usize,
        last: bool,
        rs: f64,
        h: f64,
        x: f64,
        y: &DVector<f64>,
    ) -> Result<bool, OdeError> {
        let mut stop = false;
        if self.save_step {
            self.step_idx.push(istep);
            self.step_rs.push(rs);
            self.step_h.push(h);
            self.step_x.push(x);
            self.step_y.push(y.clone());
        }
        if let Some(f) = self.step_fn.as_mut() {
            stop |= f(istep, h, x, y);
        }

        if let (true, Some(dx)) = (self.dense_active(), self.dense_dx) {
            if istep == 0 {
                self.yout.copy_from(y);
                stop |= self.record_dense(h, x, y, x);
                self.kdense = 1;
            } else {
                let tol = 1e-10 * f64::max(1.0, x.abs());
                loop {
                    let xout = self.x0 + self.kdense as f64 * dx;
                    if xout > x + tol {
                        break;
                    }
                    method.dense_out(&mut self.yout, h, x, y, xout)?;
                    stop |= self.record_dense(h, x, y, xout);
                    self.kdense += 1;
                }
                // end of the interval off the grid
                if last && self.xlast.is_none_or(|xl| (xl - x).abs() > tol) {
                    self.yout.copy_from(y);
                    stop |= self.record_dense(h, x, y, x);
                }
            }
        }
        Ok(stop)
    }

    fn record_dense(&mut self, h: f64, x: f64, y: &DVector<f64>, xout: f64) -> bool {
        let idx = self.kdense;
        self.xlast = Some(xout);
        if self.save_dense {
            self.dense_idx.push(idx);
            self.dense_x.push(xout);
            self.dense_y.push(self.yout.clone());
        }
        match self.dense_fn.as_mut() {
            Some(f) => f(idx, h, x, y, xout, &self.yout),
            None => false,
        }
    }

    /// x values and states (one row per saved step)
    pub fn get_result(&self) -> (DVector<f64>, DMatrix<f64>) {
        let x = DVector::from_vec(self.step_x.clone());
        let ndim = self.step_y.first().map_or(0, |y| y.len());
        let y = DMatrix::from_fn(self.step_y.len(), ndim, |i, j| self.step_y[i][j]);
        (x, y)
    }

    /// component i of the saved steps
    pub fn get_step_ycomp(&self, i: usize) -> Vec<f64> {
        self.step_y.iter().map(|y| y[i]).collect()
    }

    /// component i of the dense output
    pub fn get_dense_ycomp(&self, i: usize) -> Vec<f64> {
        self.dense_y.iter().map(|y| y[i]).collect()
    }

    pub fn save_csv(&self, filename: &str) -> io::Result<()> {
        save_history_to_csv(&self.step_x, &self.step_y, "x", filename)?;
        info!("step history saved to {}", filename);
        Ok(())
    }

    pub fn save_dense_csv(&self, filename: &str) -> io::Result<()> {
        save_history_to_csv(&self.dense_x, &self.dense_y, "x", filename)?;
        info!("dense output saved to {}", filename);
        Ok(())
    }
}

impl Default for Output {
    /// nothing saved, no callbacks
    fn default() -> Self {
        Output {
            save_step: false,
            save_dense: false,
            dense_dx: None,
            step_fn: None,
            dense_fn: None,
            step_idx: Vec::new(),
            step_rs: Vec::new(),
            step_h: Vec::new(),
            step_x: Vec::new(),
            step_y: Vec::new(),
            dense_idx: Vec::new(),
            dense_x: Vec::new(),
            dense_y: Vec::new(),
            x0: 0.0,
            kdense: 0,
            xlast: None,
            yout: DVector::zeros(0),
        }
    }
}
