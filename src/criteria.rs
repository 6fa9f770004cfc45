use std::fmt;

use serde::Serialize;

/// Stopping-criterion record.
///
/// The same shape is used for the configured stop thresholds and for the
/// per-iteration measurements. Measurement fields that have not been computed
/// in the current iteration are NaN and never satisfy a threshold.
#[derive(Debug, Clone, Serialize)]
pub struct Criteria {
    /// Iteration counter (current) or iteration cap (stop).
    pub iterations: usize,
    /// `‖Δx‖` measurement / threshold.
    #[serde(rename = "xDelta")]
    pub x_delta: f64,
    /// `|f_k − f_{k−1}|` measurement / threshold.
    #[serde(rename = "fDelta")]
    pub f_delta: f64,
    /// `‖∇f‖` measurement / threshold.
    #[serde(rename = "gradNorm")]
    pub grad_norm: f64,
    /// Conditioning threshold. Reported in diagnostics but not enforced.
    pub condition: f64,
}

impl Criteria {
    /// Fresh measurement record: zero iterations, nothing computed yet.
    pub fn unset() -> Self {
        Criteria {
            iterations: 0,
            x_delta: f64::NAN,
            f_delta: f64::NAN,
            grad_norm: f64::NAN,
            condition: f64::NAN,
        }
    }
}

/// Why the solve loop stopped, or `Continue` while it has not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    /// No stopping criterion met yet.
    Continue,
    /// Reached the configured iteration cap.
    IterationLimit,
    /// `‖Δx‖` fell below its threshold.
    XDeltaTolerance,
    /// `|f_k − f_{k−1}|` fell below its threshold.
    FDeltaTolerance,
    /// `‖∇f‖` fell below its threshold.
    GradNormTolerance,
    /// Terminated outside the tolerance checks (objective stop, fatal error).
    UserDefined,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Continue => write!(f, "continuing"),
            Status::IterationLimit => write!(f, "iteration limit reached"),
            Status::XDeltaTolerance => write!(f, "step size below tolerance"),
            Status::FDeltaTolerance => write!(f, "energy change below tolerance"),
            Status::GradNormTolerance => write!(f, "gradient norm below tolerance"),
            Status::UserDefined => write!(f, "user-defined stop"),
        }
    }
}

/// Compare the current measurements against the stop thresholds.
///
/// Checks in order: iteration cap, energy change, step size, gradient norm.
/// A tolerance check is active only when its threshold is positive; NaN
/// measurements (not computed this iteration) never trigger a stop.
pub fn check(stop: &Criteria, current: &Criteria) -> Status {
    if current.iterations >= stop.iterations {
        return Status::IterationLimit;
    }
    if stop.f_delta > 0.0 && current.f_delta <= stop.f_delta {
        return Status::FDeltaTolerance;
    }
    if stop.x_delta > 0.0 && current.x_delta <= stop.x_delta {
        return Status::XDeltaTolerance;
    }
    if stop.grad_norm > 0.0 && current.grad_norm <= stop.grad_norm {
        return Status::GradNormTolerance;
    }
    Status::Continue
}

/// Compute the L2 norm of a vector.
pub fn norm(v: &[f64]) -> f64 {
    let mut s = 0.0;
    for &x in v {
        s += x * x;
    }
    s.sqrt()
}

/// Compute the dot product of two vectors.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut s = 0.0;
    for i in 0..a.len() {
        s += a[i] * b[i];
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop() -> Criteria {
        Criteria {
            iterations: 100,
            x_delta: 1e-10,
            f_delta: 1e-9,
            grad_norm: 1e-8,
            condition: f64::NAN,
        }
    }

    #[test]
    fn unset_measurements_never_stop() {
        let current = Criteria::unset();
        assert_eq!(check(&stop(), &current), Status::Continue);
    }

    #[test]
    fn iteration_cap_wins_over_tolerances() {
        let mut current = Criteria::unset();
        current.iterations = 100;
        current.grad_norm = 0.0;
        assert_eq!(check(&stop(), &current), Status::IterationLimit);
    }

    #[test]
    fn f_delta_checked_before_x_delta_and_grad_norm() {
        let mut current = Criteria::unset();
        current.f_delta = 0.0;
        current.x_delta = 0.0;
        current.grad_norm = 0.0;
        assert_eq!(check(&stop(), &current), Status::FDeltaTolerance);
    }

    #[test]
    fn x_delta_checked_before_grad_norm() {
        let mut current = Criteria::unset();
        current.x_delta = 0.0;
        current.grad_norm = 0.0;
        assert_eq!(check(&stop(), &current), Status::XDeltaTolerance);
    }

    #[test]
    fn grad_norm_tolerance() {
        let mut current = Criteria::unset();
        current.grad_norm = 1e-9;
        assert_eq!(check(&stop(), &current), Status::GradNormTolerance);
    }

    #[test]
    fn zero_thresholds_disable_tolerance_checks() {
        let disabled = Criteria {
            iterations: 100,
            x_delta: 0.0,
            f_delta: 0.0,
            grad_norm: 0.0,
            condition: f64::NAN,
        };
        let mut current = Criteria::unset();
        current.x_delta = 0.0;
        current.f_delta = 0.0;
        current.grad_norm = 0.0;
        assert_eq!(check(&disabled, &current), Status::Continue);
    }

    #[test]
    fn above_all_thresholds_continues() {
        let mut current = Criteria::unset();
        current.x_delta = 1.0;
        current.f_delta = 1.0;
        current.grad_norm = 1.0;
        assert_eq!(check(&stop(), &current), Status::Continue);
    }

    #[test]
    fn norm_and_dot() {
        assert!((norm(&[3.0, 4.0]) - 5.0).abs() < 1e-15);
        assert!((dot(&[1.0, 2.0], &[3.0, 4.0]) - 11.0).abs() < 1e-15);
    }
}
