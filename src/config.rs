use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::error::SolverError;

/// Which descent strategy drives the solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    Bfgs,
    Lbfgs,
    DenseNewton,
    SparseNewton,
    GradientDescent,
}

impl FromStr for SolverKind {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BFGS" => Ok(SolverKind::Bfgs),
            "LBFGS" | "L-BFGS" => Ok(SolverKind::Lbfgs),
            "DenseNewton" | "dense_newton" => Ok(SolverKind::DenseNewton),
            "Newton" | "SparseNewton" | "sparse_newton" => Ok(SolverKind::SparseNewton),
            "GradientDescent" | "gradient_descent" => Ok(SolverKind::GradientDescent),
            _ => Err(SolverError::UnknownSolver(s.to_string())),
        }
    }
}

/// Which line search scales the update direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearchKind {
    None,
    Backtracking,
    Armijo,
}

impl FromStr for LineSearchKind {
    type Err = SolverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" | "none" => Ok(LineSearchKind::None),
            "Backtracking" | "backtracking" => Ok(LineSearchKind::Backtracking),
            "Armijo" | "armijo" => Ok(LineSearchKind::Armijo),
            _ => Err(SolverError::UnknownLineSearch(s.to_string())),
        }
    }
}

/// Validated solver configuration document.
///
/// Tolerances are dimensionless as configured; the driver multiplies them by
/// the characteristic length exactly once at construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverParams {
    #[serde(default = "default_solver")]
    pub solver: String,
    #[serde(default)]
    pub x_delta: f64,
    #[serde(default)]
    pub f_delta: f64,
    #[serde(default = "default_grad_norm")]
    pub grad_norm: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_first_grad_norm_tol")]
    pub first_grad_norm_tol: f64,
    #[serde(default)]
    pub allow_out_of_iterations: bool,
    #[serde(default)]
    pub line_search: LineSearchParams,
    #[serde(default)]
    pub lbfgs: LbfgsParams,
    #[serde(default)]
    pub newton: NewtonParams,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineSearchParams {
    #[serde(default = "default_line_search_method")]
    pub method: String,
    #[serde(default)]
    pub use_grad_norm_tol: f64,
}

impl Default for LineSearchParams {
    fn default() -> Self {
        LineSearchParams {
            method: default_line_search_method(),
            use_grad_norm_tol: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LbfgsParams {
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

impl Default for LbfgsParams {
    fn default() -> Self {
        LbfgsParams {
            history_size: default_history_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewtonParams {
    #[serde(default = "default_max_regularization_iters")]
    pub max_regularization_iters: usize,
}

impl Default for NewtonParams {
    fn default() -> Self {
        NewtonParams {
            max_regularization_iters: default_max_regularization_iters(),
        }
    }
}

/// Linear-solver configuration consumed by the Newton strategies.
///
/// This is a foreign document (backend selection fields and the like are
/// legal), so unknown fields are tolerated; only `residual_tolerance` is
/// read.
#[derive(Debug, Clone, Deserialize)]
pub struct LinearSolverParams {
    #[serde(default = "default_residual_tolerance")]
    pub residual_tolerance: f64,
}

impl Default for LinearSolverParams {
    fn default() -> Self {
        LinearSolverParams {
            residual_tolerance: default_residual_tolerance(),
        }
    }
}

fn default_solver() -> String {
    "GradientDescent".to_string()
}

fn default_grad_norm() -> f64 {
    1e-8
}

fn default_max_iterations() -> usize {
    500
}

fn default_first_grad_norm_tol() -> f64 {
    1e-10
}

fn default_line_search_method() -> String {
    "Armijo".to_string()
}

fn default_history_size() -> usize {
    10
}

// Doubling from ε·‖H‖∞ needs ~52 steps to reach order-one curvature
fn default_max_regularization_iters() -> usize {
    52
}

fn default_residual_tolerance() -> f64 {
    1e-10
}

impl SolverParams {
    /// Deserialize and validate a configuration document.
    pub fn from_value(doc: &Value) -> Result<Self, SolverError> {
        let params: SolverParams = serde_json::from_value(doc.clone())
            .map_err(|e| SolverError::InvalidConfig(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), SolverError> {
        for (name, value) in [
            ("x_delta", self.x_delta),
            ("f_delta", self.f_delta),
            ("grad_norm", self.grad_norm),
            ("first_grad_norm_tol", self.first_grad_norm_tol),
            ("line_search.use_grad_norm_tol", self.line_search.use_grad_norm_tol),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SolverError::InvalidConfig(format!(
                    "`{name}` must be a nonnegative real, got {value}"
                )));
            }
        }
        if self.max_iterations == 0 {
            return Err(SolverError::InvalidConfig(
                "`max_iterations` must be positive".to_string(),
            ));
        }
        if self.lbfgs.history_size == 0 {
            return Err(SolverError::InvalidConfig(
                "`lbfgs.history_size` must be positive".to_string(),
            ));
        }
        // Fail on unknown names at construction, not at dispatch
        self.solver.parse::<SolverKind>()?;
        self.line_search.method.parse::<LineSearchKind>()?;
        Ok(())
    }
}

impl LinearSolverParams {
    pub fn from_value(doc: &Value) -> Result<Self, SolverError> {
        let params: LinearSolverParams = serde_json::from_value(doc.clone())
            .map_err(|e| SolverError::InvalidConfig(e.to_string()))?;
        if !params.residual_tolerance.is_finite() || params.residual_tolerance < 0.0 {
            return Err(SolverError::InvalidConfig(format!(
                "`residual_tolerance` must be a nonnegative real, got {}",
                params.residual_tolerance
            )));
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_from_empty_document() {
        let params = SolverParams::from_value(&json!({})).unwrap();
        assert_eq!(params.solver, "GradientDescent");
        assert_eq!(params.grad_norm, 1e-8);
        assert_eq!(params.max_iterations, 500);
        assert_eq!(params.line_search.method, "Armijo");
        assert_eq!(params.lbfgs.history_size, 10);
        assert!(!params.allow_out_of_iterations);
    }

    #[test]
    fn solver_aliases() {
        assert_eq!("L-BFGS".parse::<SolverKind>().unwrap(), SolverKind::Lbfgs);
        assert_eq!(
            "dense_newton".parse::<SolverKind>().unwrap(),
            SolverKind::DenseNewton
        );
        assert_eq!(
            "Newton".parse::<SolverKind>().unwrap(),
            SolverKind::SparseNewton
        );
        assert_eq!(
            "gradient_descent".parse::<SolverKind>().unwrap(),
            SolverKind::GradientDescent
        );
        assert!("Nelder-Mead".parse::<SolverKind>().is_err());
    }

    #[test]
    fn unknown_field_rejected() {
        let doc = json!({ "solvr": "BFGS" });
        assert!(matches!(
            SolverParams::from_value(&doc),
            Err(SolverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn negative_tolerance_rejected() {
        let doc = json!({ "grad_norm": -1.0 });
        assert!(matches!(
            SolverParams::from_value(&doc),
            Err(SolverError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_max_iterations_rejected() {
        let doc = json!({ "max_iterations": 0 });
        assert!(SolverParams::from_value(&doc).is_err());
    }

    #[test]
    fn unknown_solver_name_rejected_at_construction() {
        let doc = json!({ "solver": "SimulatedAnnealing" });
        assert!(matches!(
            SolverParams::from_value(&doc),
            Err(SolverError::UnknownSolver(_))
        ));
    }

    #[test]
    fn linear_solver_params_tolerate_backend_fields() {
        let doc = json!({ "solver": "Eigen::SimplicialLDLT", "residual_tolerance": 1e-8 });
        let params = LinearSolverParams::from_value(&doc).unwrap();
        assert_eq!(params.residual_tolerance, 1e-8);
    }
}
