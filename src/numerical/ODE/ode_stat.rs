use crate::numerical::ODE::ode_errors::OdeWarning;
use crate::somelinalg::linear_solvers::LinSolKind;
use log::info;
use std::time::{Duration, Instant};
use tabled::{builder::Builder, settings::Style};

/// counters and timings of the last solve
#[derive(Debug, Clone, Default)]
pub struct Stat {
    pub nfeval: usize,
    pub njeval: usize,
    /// total number of substeps (attempts included)
    pub nsteps: usize,
    pub naccepted: usize,
    pub nrejected: usize,
    pub ndecomp: usize,
    pub nlinsol: usize,
    /// max number of Newton iterations in a step
    pub nitmax: usize,
    /// step attempts repeated after Newton divergence
    pub ndiverg: usize,
    /// last accepted step size of the adaptive loop
    pub hopt: f64,
    pub elapsed_total: Duration,
    /// time spent inside the step method
    pub elapsed_steps: Duration,
    pub lin_sol: LinSolKind,
    pub implicit: bool,
    pub warnings: Vec<OdeWarning>,
}

impl Stat {
    pub fn new(lin_sol: LinSolKind, implicit: bool) -> Self {
        Stat {
            lin_sol,
            implicit,
            ..Default::default()
        }
    }

    pub fn reset(&mut self) {
        *self = Stat::new(self.lin_sol, self.implicit);
    }

    pub(crate) fn update_elapsed_total(&mut self, start: Instant) {
        self.elapsed_total = start.elapsed();
    }

    pub(crate) fn update_elapsed_step(&mut self, start: Instant) {
        self.elapsed_steps += start.elapsed();
    }

    pub(crate) fn warn(&mut self, warning: OdeWarning) {
        log::warn!("{}", warning);
        self.warnings.push(warning);
    }

    /// counters as (name, value) rows
    pub fn rows(&self) -> Vec<(String, String)> {
        let mut rows = vec![
            ("number of F evaluations".to_string(), self.nfeval.to_string()),
        ];
        if self.implicit {
            rows.push(("number of J evaluations".to_string(), self.njeval.to_string()));
        }
        rows.extend([
            ("total number of steps".to_string(), self.nsteps.to_string()),
            ("number of accepted steps".to_string(), self.naccepted.to_string()),
            ("number of rejected steps".to_string(), self.nrejected.to_string()),
        ]);
        if self.implicit {
            rows.extend([
                ("number of decompositions".to_string(), self.ndecomp.to_string()),
                ("number of lin solutions".to_string(), self.nlinsol.to_string()),
                ("max number of iterations".to_string(), self.nitmax.to_string()),
                ("number of divergences".to_string(), self.ndiverg.to_string()),
                ("linear solver".to_string(), self.lin_sol.to_string()),
            ]);
        }
        rows.extend([
            ("optimal step size Hopt".to_string(), format!("{:e}", self.hopt)),
            ("elapsed time: steps".to_string(), format!("{:?}", self.elapsed_steps)),
            ("elapsed time: total".to_string(), format!("{:?}", self.elapsed_total)),
        ]);
        rows
    }

    pub fn print(&self) {
        let mut builder = Builder::default();
        for (name, value) in self.rows() {
            builder.push_record([name, value]);
        }
        let mut table = builder.build();
        table.with(Style::modern_rounded());
        info!("\n \n CALC STATISTICS \n \n {}", table.to_string());
        for warning in &self.warnings {
            info!("warning: {}", warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_keeps_solver_info() {
        let mut stat = Stat::new(LinSolKind::Dense, true);
        stat.nfeval = 10;
        stat.warn(OdeWarning::StiffnessDetected { x: 1.0 });
        stat.reset();
        assert_eq!(stat.nfeval, 0);
        assert!(stat.warnings.is_empty());
        assert_eq!(stat.lin_sol, LinSolKind::Dense);
        assert!(stat.implicit);
    }

    #[test]
    fn test_rows() {
        let explicit = Stat::new(LinSolKind::Sparse, false);
        assert!(explicit.rows().iter().all(|(name, _)| name != "number of decompositions"));
        let implicit = Stat::new(LinSolKind::Sparse, true);
        assert!(implicit.rows().iter().any(|(name, v)| name == "linear solver" && v == "sparse"));
        implicit.print();
    }
}
