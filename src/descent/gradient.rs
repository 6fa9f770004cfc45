use crate::descent::{DescentStrategy, LEVEL_GRADIENT_DESCENT};
use crate::objective::Objective;

/// Steepest descent: `Δx = −∇f(x)`.
///
/// Lives permanently at the terminal fallback level; the ladder transitions
/// are no-ops.
pub struct GradientDescent;

impl GradientDescent {
    pub fn new() -> Self {
        GradientDescent
    }
}

impl Default for GradientDescent {
    fn default() -> Self {
        Self::new()
    }
}

impl DescentStrategy for GradientDescent {
    fn name(&self) -> &'static str {
        "GradientDescent"
    }

    fn descent_strategy_name(&self) -> &'static str {
        "gradient descent"
    }

    fn strategy_level(&self) -> u32 {
        LEVEL_GRADIENT_DESCENT
    }

    fn reset(&mut self, _ndof: usize) {}

    fn compute_update_direction(
        &mut self,
        _obj: &mut dyn Objective,
        _x: &[f64],
        grad: &[f64],
        direction: &mut Vec<f64>,
    ) {
        direction.clear();
        direction.extend(grad.iter().map(|&g| -g));
    }

    fn is_direction_descent(&self) -> bool {
        true
    }

    fn increase_descent_strategy(&mut self) {}

    fn set_default_descent_strategy(&mut self) {}
}
