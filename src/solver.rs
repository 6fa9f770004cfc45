use serde_json::{json, Value};

use crate::config::{LinearSolverParams, LineSearchKind, SolverKind, SolverParams};
use crate::criteria::{self, dot, norm, Criteria, Status};
use crate::descent::{self, DescentStrategy, LEVEL_GRADIENT_DESCENT};
use crate::error::{ErrorCode, SolverError};
use crate::line_search::{self, LineSearch};
use crate::objective::Objective;
use crate::stats::{Stopwatch, Timings};

/// Iterative minimizer for twice-differentiable objectives.
///
/// Built from a configuration document, it drives a descent strategy and a
/// line search through the solve loop: propose `Δx`, validate it is a
/// descent direction, scale it, commit, and consult the stopping criteria.
/// On failure of any stage the strategy's fallback ladder is advanced and
/// the same iteration retried; exhausting the ladder is fatal.
///
/// An instance is not reentrant; `minimize` resets all per-solve state on
/// entry.
pub struct Solver {
    strategy: Box<dyn DescentStrategy>,
    line_search: Box<dyn LineSearch>,
    stop: Criteria,
    current: Criteria,
    status: Status,
    error_code: ErrorCode,
    use_grad_norm_tol: f64,
    first_grad_norm_tol: f64,
    allow_out_of_iterations: bool,
    timings: Timings,
    total_time: f64,
    solver_info: Value,
}

impl Solver {
    /// Build a solver from a configuration document.
    ///
    /// `linear_solver_params` is consumed only by the Newton strategies.
    /// All stopping tolerances in `solver_params` (and the line search's
    /// `use_grad_norm_tol`) are multiplied by `characteristic_length` here,
    /// exactly once.
    pub fn new(
        solver_params: &Value,
        linear_solver_params: &Value,
        characteristic_length: f64,
    ) -> Result<Self, SolverError> {
        if !characteristic_length.is_finite() || characteristic_length <= 0.0 {
            return Err(SolverError::InvalidConfig(format!(
                "`characteristic_length` must be a positive real, got {characteristic_length}"
            )));
        }

        let params = SolverParams::from_value(solver_params)?;
        let linear = LinearSolverParams::from_value(linear_solver_params)?;

        let kind: SolverKind = params.solver.parse()?;
        let ls_kind: LineSearchKind = params.line_search.method.parse()?;

        let strategy = descent::create(kind, &params, &linear);
        let line_search = line_search::create(ls_kind);

        let stop = Criteria {
            iterations: params.max_iterations,
            x_delta: params.x_delta * characteristic_length,
            f_delta: params.f_delta * characteristic_length,
            grad_norm: params.grad_norm * characteristic_length,
            condition: f64::NAN,
        };

        let solver_info = json!({ "line_search": line_search.name() });

        Ok(Solver {
            strategy,
            line_search,
            stop,
            current: Criteria::unset(),
            status: Status::Continue,
            error_code: ErrorCode::Success,
            use_grad_norm_tol: params.line_search.use_grad_norm_tol * characteristic_length,
            first_grad_norm_tol: params.first_grad_norm_tol * characteristic_length,
            allow_out_of_iterations: params.allow_out_of_iterations,
            timings: Timings::default(),
            total_time: 0.0,
            solver_info,
        })
    }

    /// Names accepted by the `solver` configuration field.
    pub fn available_solvers() -> Vec<&'static str> {
        vec!["BFGS", "DenseNewton", "Newton", "GradientDescent", "L-BFGS"]
    }

    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Measurements from the last (or in-progress) solve.
    pub fn criteria(&self) -> &Criteria {
        &self.current
    }

    /// Effective stop thresholds (already characteristic-length scaled).
    pub fn stop_criteria(&self) -> &Criteria {
        &self.stop
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    /// Structured statistics record, refreshed at start, after every
    /// committed iteration, and at a successful termination.
    pub fn solver_info(&self) -> &Value {
        &self.solver_info
    }

    /// Minimize `obj`, mutating `x` in place.
    ///
    /// On success `x` holds the terminal iterate and [`Solver::status`]
    /// tells which criterion fired. Fatal conditions are logged once at
    /// error level and returned.
    pub fn minimize(&mut self, obj: &mut dyn Objective, x: &mut Vec<f64>) -> Result<(), SolverError> {
        self.reset(x.len());
        self.line_search.stats_mut().use_grad_norm_tol = self.use_grad_norm_tol;

        let mut grad = vec![0.0; x.len()];
        let mut delta_x: Vec<f64> = vec![0.0; x.len()];

        // NaN marks "no previous energy yet"
        let mut old_energy = f64::NAN;
        {
            let sw = Stopwatch::start();
            obj.solution_changed(x);
            self.timings.constraint_set_update += sw.elapsed();
        }

        // In the very first iteration a separate (typically looser) gradient
        // tolerance applies
        let g_norm_tol = self.stop.grad_norm;
        self.stop.grad_norm = self.first_grad_norm_tol;

        let total = Stopwatch::start();

        obj.save_to_file(x);

        log::debug!(
            "Starting {} solve f₀={:e} (stopping criteria: max_iters={} Δf={:e} ‖∇f‖={:e} ‖Δx‖={:e})",
            self.strategy.name(),
            obj.value(x),
            self.stop.iterations,
            self.stop.f_delta,
            self.stop.grad_norm,
            self.stop.x_delta
        );

        self.update_solver_info(obj.value(x), total.elapsed());

        let mut result: Result<(), SolverError> = Ok(());

        loop {
            self.current.x_delta = f64::NAN;
            self.current.f_delta = f64::NAN;
            self.current.grad_norm = f64::NAN;

            let energy = {
                let sw = Stopwatch::start();
                let e = obj.value(x);
                self.timings.obj_fun += sw.elapsed();
                e
            };
            if !energy.is_finite() {
                self.status = Status::UserDefined;
                self.error_code = ErrorCode::NanEncountered;
                result = Err(SolverError::NonFiniteEnergy {
                    solver: self.strategy.name(),
                });
                break;
            }

            self.current.f_delta = (old_energy - energy).abs();
            old_energy = energy;
            self.status = criteria::check(&self.stop, &self.current);
            if self.status != Status::Continue {
                break;
            }

            {
                let sw = Stopwatch::start();
                obj.gradient(x, &mut grad);
                self.timings.grad += sw.elapsed();
            }

            let grad_norm = norm(&grad);
            if grad_norm.is_nan() {
                self.status = Status::UserDefined;
                self.error_code = ErrorCode::NanEncountered;
                result = Err(SolverError::NonFiniteGradient {
                    solver: self.strategy.name(),
                });
                break;
            }
            self.current.grad_norm = grad_norm;
            self.status = criteria::check(&self.stop, &self.current);
            if self.status != Status::Continue {
                break;
            }

            self.strategy
                .compute_update_direction(obj, x, &grad, &mut delta_x);

            if self.strategy.is_direction_descent()
                && grad_norm != 0.0
                && dot(&delta_x, &grad) >= 0.0
            {
                self.strategy.increase_descent_strategy();
                log::debug!(
                    "[{}] direction is not a descent direction (‖Δx‖={:e}; ‖g‖={:e}; Δx⋅g={:e}≥0); reverting to {}",
                    self.strategy.name(),
                    norm(&delta_x),
                    grad_norm,
                    dot(&delta_x, &grad),
                    self.strategy.descent_strategy_name()
                );
                continue;
            }

            let delta_x_norm = norm(&delta_x);
            if delta_x_norm.is_nan() {
                self.strategy.increase_descent_strategy();
                log::debug!(
                    "[{}] Δx is nan; reverting to {}",
                    self.strategy.name(),
                    self.strategy.descent_strategy_name()
                );
                continue;
            }

            self.current.x_delta = if self.strategy.strategy_level() == LEVEL_GRADIENT_DESCENT {
                f64::NAN
            } else {
                delta_x_norm
            };
            self.status = criteria::check(&self.stop, &self.current);
            if self.status != Status::Continue {
                break;
            }

            let rate = {
                let sw = Stopwatch::start();
                let rate = self.line_search.line_search(x, &delta_x, obj);
                self.timings.line_search += sw.elapsed();
                rate
            };
            if rate.is_nan() {
                if self.strategy.strategy_level() < LEVEL_GRADIENT_DESCENT {
                    self.strategy.increase_descent_strategy();
                    log::warn!(
                        "[{}] Line search failed; reverting to {}",
                        self.strategy.name(),
                        self.strategy.descent_strategy_name()
                    );
                    continue;
                }
                self.status = Status::UserDefined;
                self.error_code = ErrorCode::LineSearchFailed;
                result = Err(SolverError::LineSearchFailed {
                    solver: self.strategy.name(),
                });
                break;
            }

            for i in 0..x.len() {
                x[i] += rate * delta_x[i];
            }

            // The ladder resets on every committed step
            self.strategy.set_default_descent_strategy();

            if obj.stop(x) {
                self.status = Status::UserDefined;
                self.error_code = ErrorCode::Success;
                log::debug!("[{}] Objective decided to stop", self.strategy.name());
            }

            obj.post_step(self.current.iterations, x);

            log::debug!(
                "[{}] iter={} f={:e} Δf={:e} ‖∇f‖={:e} ‖Δx‖={:e} Δx⋅∇f(x)={:e} rate={:e} ‖step‖={:e}",
                self.strategy.name(),
                self.current.iterations,
                energy,
                self.current.f_delta,
                self.current.grad_norm,
                self.current.x_delta,
                dot(&delta_x, &grad),
                rate,
                rate * delta_x_norm
            );

            self.current.iterations += 1;
            if self.current.iterations >= self.stop.iterations {
                self.status = Status::IterationLimit;
            }

            self.update_solver_info(energy, total.elapsed());

            obj.save_to_file(x);

            // The first-iteration tolerance applies to iteration 0 only
            self.stop.grad_norm = g_norm_tol;

            if !obj.callback(&self.current, x) || self.status != Status::Continue {
                break;
            }
        }

        self.total_time = total.elapsed();
        self.stop.grad_norm = g_norm_tol;

        if let Err(err) = result {
            log::error!("{err}");
            return Err(err);
        }
        if self.status == Status::IterationLimit && !self.allow_out_of_iterations {
            let err = SolverError::IterationLimit {
                solver: self.strategy.name(),
                limit: self.stop.iterations,
            };
            log::error!("{err}");
            return Err(err);
        }
        if self.status == Status::UserDefined && self.error_code != ErrorCode::Success {
            let err = SolverError::FailedToMinimize {
                solver: self.strategy.name(),
            };
            log::error!("{err}");
            return Err(err);
        }

        log::info!(
            "[{}] Finished: {} Took {:e}s (niters={} f={:e} Δf={:e} ‖∇f‖={:e} ‖Δx‖={:e} ftol={:e})",
            self.strategy.name(),
            self.status,
            self.total_time,
            self.current.iterations,
            old_energy,
            self.current.f_delta,
            self.current.grad_norm,
            self.current.x_delta,
            self.stop.f_delta
        );
        self.log_times();
        self.update_solver_info(obj.value(x), self.total_time);

        Ok(())
    }

    fn reset(&mut self, ndof: usize) {
        self.current = Criteria::unset();
        self.status = Status::Continue;
        self.error_code = ErrorCode::Success;
        self.strategy.reset(ndof);
        self.strategy.set_default_descent_strategy();
        self.timings.reset();
        self.total_time = 0.0;
        self.line_search.stats_mut().reset_times();
        self.solver_info = json!({
            "line_search": self.line_search.name(),
            "iterations": 0,
        });
    }

    fn update_solver_info(&mut self, energy: f64, total_time: f64) {
        let per_iteration = if self.current.iterations > 0 {
            self.current.iterations as f64
        } else {
            1.0
        };
        let ls = self.line_search.stats();
        let st = self.strategy.times();

        self.solver_info = json!({
            "status": self.status,
            "error_code": self.error_code,
            "energy": energy,
            "iterations": self.current.iterations,
            "xDelta": self.current.x_delta,
            "fDelta": self.current.f_delta,
            "gradNorm": self.current.grad_norm,
            "condition": self.current.condition,
            "line_search": self.line_search.name(),
            "total_time": total_time,
            "time_grad": self.timings.grad / per_iteration,
            "time_assembly": st.assembly / per_iteration,
            "time_inverting": st.inverting / per_iteration,
            "time_line_search": self.timings.line_search / per_iteration,
            "time_constraint_set_update": self.timings.constraint_set_update / per_iteration,
            "time_obj_fun": self.timings.obj_fun / per_iteration,
            "line_search_iterations": ls.iterations,
            "time_checking_for_nan_inf": ls.checking_for_nan_inf_time / per_iteration,
            "time_broad_phase_ccd": ls.broad_phase_ccd_time / per_iteration,
            "time_ccd": ls.ccd_time / per_iteration,
            // Remove double counting against the constraint-set bucket
            "time_classical_line_search":
                (ls.classical_line_search_time - ls.constraint_set_update_time) / per_iteration,
            "time_line_search_constraint_set_update":
                ls.constraint_set_update_time / per_iteration,
        });
    }

    fn log_times(&self) {
        let ls = self.line_search.stats();
        let st = self.strategy.times();
        log::debug!(
            "[timing] grad {:.3e}s, assembly {:.3e}s, inverting {:.3e}s, \
             line_search {:.3e}s, constraint_set_update {:.3e}s, \
             obj_fun {:.3e}s, checking_for_nan_inf {:.3e}s, \
             classical_line_search {:.3e}s",
            self.timings.grad,
            st.assembly,
            st.inverting,
            self.timings.line_search,
            self.timings.constraint_set_update + ls.constraint_set_update_time,
            self.timings.obj_fun,
            ls.checking_for_nan_inf_time,
            ls.classical_line_search_time
        );
    }
}
