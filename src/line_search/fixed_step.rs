use crate::line_search::LineSearch;
use crate::objective::Objective;
use crate::stats::{LineSearchStats, Stopwatch};

/// No search: always take the configured starting step.
///
/// Useful when the descent strategy already produces well-scaled updates
/// (e.g. Newton on a locally quadratic objective).
pub struct FixedStep {
    step_size: f64,
    stats: LineSearchStats,
}

impl FixedStep {
    pub fn new(step_size: f64) -> Self {
        FixedStep {
            step_size,
            stats: LineSearchStats::default(),
        }
    }
}

impl LineSearch for FixedStep {
    fn name(&self) -> &'static str {
        "None"
    }

    fn line_search(&mut self, x: &[f64], delta_x: &[f64], obj: &mut dyn Objective) -> f64 {
        let total = Stopwatch::start();

        let x_new: Vec<f64> = x
            .iter()
            .zip(delta_x)
            .map(|(&xi, &di)| xi + self.step_size * di)
            .collect();

        let sw = Stopwatch::start();
        obj.solution_changed(&x_new);
        self.stats.constraint_set_update_time += sw.elapsed();

        self.stats.classical_line_search_time += total.elapsed();
        self.step_size
    }

    fn stats(&self) -> &LineSearchStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut LineSearchStats {
        &mut self.stats
    }
}
