use serde::Serialize;

/// Outcome code recorded alongside [`Status`](crate::criteria::Status).
///
/// `Success` covers both tolerance exits and objective-requested stops; the
/// other codes identify which fatal condition ended the solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    Success,
    NanEncountered,
    LineSearchFailed,
    NotDescentDirection,
}

/// Fatal errors surfaced by the solver.
///
/// Construction errors come from document validation; runtime errors are
/// raised once, after being logged at error level. Recoverable conditions
/// (non-descent directions, line-search failures above gradient descent)
/// are handled by the fallback ladder and never reach this type.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("invalid solver configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown solver `{0}`")]
    UnknownSolver(String),

    #[error("unknown line search method `{0}`")]
    UnknownLineSearch(String),

    #[error("[{solver}] f(x) is nan or inf; stopping")]
    NonFiniteEnergy { solver: &'static str },

    #[error("[{solver}] gradient is nan; stopping")]
    NonFiniteGradient { solver: &'static str },

    #[error("[{solver}] line search failed on gradient descent; stopping")]
    LineSearchFailed { solver: &'static str },

    #[error("[{solver}] reached iteration limit (limit={limit})")]
    IterationLimit { solver: &'static str, limit: usize },

    #[error("[{solver}] failed to find a minimizer")]
    FailedToMinimize { solver: &'static str },
}
