use crate::somelinalg::linear_solvers::LinSolError;
use crate::Utils::task_parser::TaskError;
use std::fmt;

/// fatal errors of the ODE solvers
#[derive(Debug, Clone, PartialEq)]
pub enum OdeError {
    /// bad configuration or inconsistent call arguments
    Config(String),
    /// the adaptive loop did not reach xf within nmax_ss substeps
    ConvergenceFailure { nmax_ss: usize, x: f64 },
    /// Newton iterations of an implicit method diverged in fixed-step mode
    NewtonFailure { x: f64, nit: usize },
    LinearSolver(LinSolError),
    DenseOutputUnavailable(String),
}

impl fmt::Display for OdeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OdeError::Config(msg) => write!(f, "configuration error: {}", msg),
            OdeError::ConvergenceFailure { nmax_ss, x } => write!(
                f,
                "substepping did not converge after {} steps (x = {})",
                nmax_ss, x
            ),
            OdeError::NewtonFailure { x, nit } => write!(
                f,
                "Newton iterations did not converge after {} iterations at x = {} (fixed step)",
                nit, x
            ),
            OdeError::LinearSolver(e) => write!(f, "{}", e),
            OdeError::DenseOutputUnavailable(method) => {
                write!(f, "dense output is not available for method {}", method)
            }
        }
    }
}

impl std::error::Error for OdeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            OdeError::LinearSolver(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LinSolError> for OdeError {
    fn from(e: LinSolError) -> Self {
        OdeError::LinearSolver(e)
    }
}

impl From<TaskError> for OdeError {
    fn from(e: TaskError) -> Self {
        OdeError::Config(e.to_string())
    }
}

/// non-fatal notices collected during a solve
#[derive(Debug, Clone, PartialEq)]
pub enum OdeWarning {
    /// the final x differs from xf by more than 1e-10
    LandingMismatch { x: f64, xf: f64 },
    StiffnessDetected { x: f64 },
}

impl fmt::Display for OdeWarning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OdeWarning::LandingMismatch { x, xf } => {
                write!(f, "|x - xf| = {:e} > 1e-10 (x = {}, xf = {})", (x - xf).abs(), x, xf)
            }
            OdeWarning::StiffnessDetected { x } => write!(f, "stiff step detected @ x = {}", x),
        }
    }
}
