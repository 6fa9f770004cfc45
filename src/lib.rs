//! Nonlinear unconstrained minimization.
//!
//! The [`Solver`] drives a user-supplied twice-differentiable
//! [`Objective`] toward a local minimum by repeatedly asking a descent
//! strategy (BFGS, L-BFGS, dense/sparse Newton, gradient descent) for an
//! update direction, scaling it with a line search, and checking a set of
//! stopping criteria. When a strategy fails (e.g. a non-descent proposal or
//! an exhausted line search) the solver falls back along a ladder that
//! terminates at gradient descent.
//!
//! Solvers are configured from JSON documents and report per-solve
//! statistics (status, energy, criteria, timing breakdowns) through
//! [`Solver::solver_info`].

pub mod config;
pub mod criteria;
pub mod descent;
pub mod error;
pub mod line_search;
pub mod objective;
pub mod solver;
pub mod stats;

pub use config::{LineSearchKind, SolverKind};
pub use criteria::{Criteria, Status};
pub use error::{ErrorCode, SolverError};
pub use objective::Objective;
pub use solver::Solver;
