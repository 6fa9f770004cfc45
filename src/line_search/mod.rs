//! Step-length strategies.
//!
//! A line search receives the current iterate and a proposed update
//! direction and returns a positive step scale `α` such that `x + αΔx` has a
//! finite, acceptably decreased objective value, or NaN when no such step
//! was found within its budget.

mod backtracking;
mod fixed_step;

pub use backtracking::{Backtracking, DecreaseCondition};
pub use fixed_step::FixedStep;

use crate::config::LineSearchKind;
use crate::objective::Objective;
use crate::stats::LineSearchStats;

/// Contract shared by all line searches.
///
/// `line_search` owns the trial-point bookkeeping: it refreshes
/// `Objective::solution_changed` before every trial evaluation and leaves
/// the objective's dependent state consistent with either the accepted
/// trial point (success) or the unchanged iterate `x` (failure).
pub trait LineSearch {
    fn name(&self) -> &'static str;

    /// Compute the step scale for `x + αΔx`. Returns NaN on failure.
    fn line_search(&mut self, x: &[f64], delta_x: &[f64], obj: &mut dyn Objective) -> f64;

    fn stats(&self) -> &LineSearchStats;

    fn stats_mut(&mut self) -> &mut LineSearchStats;
}

/// Build the line search selected by the configuration document.
pub fn create(kind: LineSearchKind) -> Box<dyn LineSearch> {
    match kind {
        LineSearchKind::None => Box::new(FixedStep::new(1.0)),
        LineSearchKind::Backtracking => Box::new(Backtracking::new(DecreaseCondition::Simple)),
        LineSearchKind::Armijo => Box::new(Backtracking::new(DecreaseCondition::Armijo)),
    }
}
