use faer::Mat;

use crate::criteria::Criteria;

/// Trait for minimization objectives.
///
/// Implementors provide function evaluation and gradient computation; the
/// Hessian methods are only required by the Newton strategies. Methods take
/// `&mut self` to allow caching, eval counting, and internal buffers.
pub trait Objective {
    /// Evaluate the objective at `x`. May return a non-finite value; the
    /// solver treats NaN/∞ as fatal.
    fn value(&mut self, x: &[f64]) -> f64;

    /// Write `∇f(x)` into `grad`, resizing it as needed.
    fn gradient(&mut self, x: &[f64], grad: &mut Vec<f64>);

    /// Write the dense Hessian `∇²f(x)` into `hess`.
    ///
    /// Default implementation panics. Only the dense Newton strategy calls
    /// this; an objective that cannot provide a Hessian is not eligible for
    /// that strategy.
    fn hessian(&mut self, x: &[f64], hess: &mut Mat<f64>) {
        let _ = (x, hess);
        unimplemented!("hessian not implemented for this objective")
    }

    /// Return the Hessian `∇²f(x)` as COO triplets `(row, col, value)`.
    ///
    /// Default implementation panics. Only the sparse Newton strategy calls
    /// this.
    fn hessian_triplets(&mut self, x: &[f64]) -> Vec<(usize, usize, f64)> {
        let _ = x;
        unimplemented!("hessian_triplets not implemented for this objective")
    }

    /// Notification that the solver is about to evaluate at a new point.
    ///
    /// Called once before the solve loop and before every trial-point
    /// evaluation during line search, so the objective can refresh any
    /// state that depends on `x`.
    fn solution_changed(&mut self, x: &[f64]) {
        let _ = x;
    }

    /// Objective-driven early termination; returning `true` requests a
    /// successful stop after the current step commits.
    fn stop(&mut self, x: &[f64]) -> bool {
        let _ = x;
        false
    }

    /// Notification after a committed step.
    fn post_step(&mut self, iteration: usize, x: &[f64]) {
        let _ = (iteration, x);
    }

    /// Checkpoint hook; invoked before the loop and after every committed
    /// iteration. No-op by default.
    fn save_to_file(&mut self, x: &[f64]) {
        let _ = x;
    }

    /// Advisory continuation hook, consulted after every committed
    /// iteration with the current measurements. Returning `false` ends the
    /// solve without an error.
    fn callback(&mut self, criteria: &Criteria, x: &[f64]) -> bool {
        let _ = (criteria, x);
        true
    }
}
