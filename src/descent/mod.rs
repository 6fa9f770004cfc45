//! Per-iteration update-direction strategies.
//!
//! Each strategy produces a proposed `Δx` from the current iterate and
//! gradient, owns whatever curvature state that requires, and exposes a
//! fallback ladder through an integer level: 0 is the strategy's native
//! behavior, 2 is plain gradient descent (the terminal fallback), and
//! intermediate levels are strategy-specific (e.g. regularized Newton).

mod bfgs;
mod gradient;
mod lbfgs;
mod newton;

pub use bfgs::Bfgs;
pub use gradient::GradientDescent;
pub use lbfgs::Lbfgs;
pub use newton::{HessianForm, Newton};

use crate::config::{LinearSolverParams, SolverKind, SolverParams};
use crate::objective::Objective;
use crate::stats::StrategyTimes;

/// Terminal fallback level: plain gradient descent.
pub const LEVEL_GRADIENT_DESCENT: u32 = 2;

/// Contract shared by all descent strategies.
pub trait DescentStrategy {
    /// Strategy name for diagnostics (e.g. `"DenseNewton"`).
    fn name(&self) -> &'static str;

    /// Name of the behavior at the current fallback level
    /// (e.g. `"regularized Newton"`).
    fn descent_strategy_name(&self) -> &'static str;

    /// Current fallback level; monotonically non-decreasing within a single
    /// iteration attempt.
    fn strategy_level(&self) -> u32;

    /// Clear curvature state and size workspaces for `ndof` variables.
    fn reset(&mut self, ndof: usize);

    /// Produce the proposed update direction for the current iterate.
    fn compute_update_direction(
        &mut self,
        obj: &mut dyn Objective,
        x: &[f64],
        grad: &[f64],
        direction: &mut Vec<f64>,
    );

    /// Whether the produced direction is nominally a descent direction and
    /// must be validated against `Δx·∇f < 0` by the driver.
    fn is_direction_descent(&self) -> bool;

    /// Advance the fallback ladder one step toward gradient descent.
    /// No-op once the terminal level is reached.
    fn increase_descent_strategy(&mut self);

    /// Return to the strategy's native level; called after every committed
    /// step.
    fn set_default_descent_strategy(&mut self);

    /// Assembly/solve time spent so far; zero for strategies that do
    /// neither.
    fn times(&self) -> StrategyTimes {
        StrategyTimes::default()
    }
}

/// Build the descent strategy selected by the configuration document.
pub fn create(
    kind: SolverKind,
    params: &SolverParams,
    linear_solver_params: &LinearSolverParams,
) -> Box<dyn DescentStrategy> {
    match kind {
        SolverKind::Bfgs => Box::new(Bfgs::new()),
        SolverKind::Lbfgs => Box::new(Lbfgs::new(params.lbfgs.history_size)),
        SolverKind::DenseNewton => Box::new(Newton::new(
            HessianForm::Dense,
            params.newton.max_regularization_iters,
            linear_solver_params.residual_tolerance,
        )),
        SolverKind::SparseNewton => Box::new(Newton::new(
            HessianForm::Sparse,
            params.newton.max_regularization_iters,
            linear_solver_params.residual_tolerance,
        )),
        SolverKind::GradientDescent => Box::new(GradientDescent::new()),
    }
}
