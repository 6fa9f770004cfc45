use faer::linalg::solvers::SpSolver;
use faer::sparse::SparseColMat;
use faer::{Col, Mat, Side};

use crate::criteria::norm;
use crate::descent::{DescentStrategy, LEVEL_GRADIENT_DESCENT};
use crate::objective::Objective;
use crate::stats::{StrategyTimes, Stopwatch};

/// How the objective's Hessian is assembled and factorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HessianForm {
    /// Dense assembly, Cholesky factorization.
    Dense,
    /// COO-triplet assembly, sparse LU factorization.
    Sparse,
}

/// Newton's method: solve `(∇²f + λI)·Δx = −∇f`.
///
/// Fallback ladder: level 0 solves with `λ = 0`; level 1 regularizes with
/// `λ` starting at a small multiple of `ε·‖∇²f‖∞` and doubling on every
/// failed factorization, up to a bounded number of attempts; level 2 gives
/// up on curvature and proposes `−∇f`.
pub struct Newton {
    form: HessianForm,
    level: u32,
    max_regularization_iters: usize,
    residual_tolerance: f64,
    reg_weight: f64,
    reg_iters: usize,
    /// `‖∇²f‖∞` from the most recent assembly; seeds the λ schedule.
    h_inf_norm: f64,
    hess: Mat<f64>,
    times: StrategyTimes,
}

impl Newton {
    pub fn new(form: HessianForm, max_regularization_iters: usize, residual_tolerance: f64) -> Self {
        Newton {
            form,
            level: 0,
            max_regularization_iters,
            residual_tolerance,
            reg_weight: 0.0,
            reg_iters: 0,
            h_inf_norm: 1.0,
            hess: Mat::new(),
            times: StrategyTimes::default(),
        }
    }

    fn initial_reg_weight(&self) -> f64 {
        (self.h_inf_norm * f64::EPSILON).max(f64::EPSILON)
    }

    fn enter_regularized(&mut self) {
        self.level = 1;
        self.reg_iters = 0;
        self.reg_weight = self.initial_reg_weight();
    }

    /// One failed solve at the current level: tighten the schedule or drop
    /// to the next level.
    fn advance_regularization(&mut self) {
        if self.level == 0 {
            log::debug!(
                "[{}] Hessian solve failed; regularizing with λ={:e}",
                self.name(),
                self.initial_reg_weight()
            );
            self.enter_regularized();
        } else if self.level == 1 {
            self.reg_iters += 1;
            self.reg_weight *= 2.0;
            if self.reg_iters >= self.max_regularization_iters {
                log::debug!(
                    "[{}] regularization exhausted after {} attempts; using gradient descent",
                    self.name(),
                    self.reg_iters
                );
                self.level = LEVEL_GRADIENT_DESCENT;
            }
        }
    }

    fn try_newton_step(
        &mut self,
        obj: &mut dyn Objective,
        x: &[f64],
        grad: &[f64],
        direction: &mut Vec<f64>,
    ) -> bool {
        let lambda = if self.level == 1 { self.reg_weight } else { 0.0 };
        let sol = match self.form {
            HessianForm::Dense => self.solve_dense(obj, x, grad, lambda),
            HessianForm::Sparse => self.solve_sparse(obj, x, grad, lambda),
        };
        match sol {
            Some(d) => {
                *direction = d;
                true
            }
            None => false,
        }
    }

    fn solve_dense(
        &mut self,
        obj: &mut dyn Objective,
        x: &[f64],
        grad: &[f64],
        lambda: f64,
    ) -> Option<Vec<f64>> {
        let n = x.len();

        let sw = Stopwatch::start();
        obj.hessian(x, &mut self.hess);
        self.times.assembly += sw.elapsed();
        debug_assert_eq!(self.hess.nrows(), n);
        debug_assert_eq!(self.hess.ncols(), n);
        self.h_inf_norm = dense_inf_norm(&self.hess);

        let sw = Stopwatch::start();
        let hess = &self.hess;
        let h_reg = Mat::from_fn(n, n, |i, j| {
            hess[(i, j)] + if i == j { lambda } else { 0.0 }
        });
        let rhs = Col::from_fn(n, |i| -grad[i]);
        let sol = h_reg.cholesky(Side::Lower).ok().map(|chol| chol.solve(&rhs));
        self.times.inverting += sw.elapsed();

        let sol = sol?;
        let d: Vec<f64> = (0..n).map(|i| sol[i]).collect();
        self.accept_solution(d, grad, |i, j| h_reg[(i, j)])
    }

    fn solve_sparse(
        &mut self,
        obj: &mut dyn Objective,
        x: &[f64],
        grad: &[f64],
        lambda: f64,
    ) -> Option<Vec<f64>> {
        let n = x.len();

        let sw = Stopwatch::start();
        let mut triplets = obj.hessian_triplets(x);
        self.times.assembly += sw.elapsed();
        self.h_inf_norm = triplet_inf_norm(&triplets, n);
        if lambda > 0.0 {
            // try_new_from_triplets sums duplicates, so the shift can just
            // be appended
            for i in 0..n {
                triplets.push((i, i, lambda));
            }
        }

        let sw = Stopwatch::start();
        let mat = SparseColMat::<usize, f64>::try_new_from_triplets(n, n, &triplets).ok();
        // faer's sparse LU panics on singular matrices rather than
        // returning an error
        let lu = mat.and_then(|m| {
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| m.sp_lu().ok()))
                .ok()
                .flatten()
        });
        let sol = lu.map(|lu| lu.solve(&Col::<f64>::from_fn(n, |i| -grad[i])));
        self.times.inverting += sw.elapsed();

        let sol = sol?;
        let d: Vec<f64> = (0..n).map(|i| sol[i]).collect();

        // Residual through the triplets, without densifying
        let mut r: Vec<f64> = grad.to_vec();
        for &(i, j, v) in &triplets {
            r[i] += v * d[j];
        }
        self.accept_if_small_residual(d, grad, r)
    }

    fn accept_solution(
        &self,
        d: Vec<f64>,
        grad: &[f64],
        h_entry: impl Fn(usize, usize) -> f64,
    ) -> Option<Vec<f64>> {
        let n = d.len();
        let mut r: Vec<f64> = grad.to_vec();
        for i in 0..n {
            for j in 0..n {
                r[i] += h_entry(i, j) * d[j];
            }
        }
        self.accept_if_small_residual(d, grad, r)
    }

    fn accept_if_small_residual(
        &self,
        d: Vec<f64>,
        grad: &[f64],
        residual: Vec<f64>,
    ) -> Option<Vec<f64>> {
        if !d.iter().all(|v| v.is_finite()) {
            return None;
        }
        let tol = self.residual_tolerance * (1.0 + norm(grad));
        if norm(&residual) > tol {
            return None;
        }
        Some(d)
    }
}

impl DescentStrategy for Newton {
    fn name(&self) -> &'static str {
        match self.form {
            HessianForm::Dense => "DenseNewton",
            HessianForm::Sparse => "SparseNewton",
        }
    }

    fn descent_strategy_name(&self) -> &'static str {
        match self.level {
            0 => "Newton",
            1 => "regularized Newton",
            _ => "gradient descent",
        }
    }

    fn strategy_level(&self) -> u32 {
        self.level
    }

    fn reset(&mut self, _ndof: usize) {
        self.reg_weight = 0.0;
        self.reg_iters = 0;
        self.h_inf_norm = 1.0;
        self.times = StrategyTimes::default();
    }

    fn compute_update_direction(
        &mut self,
        obj: &mut dyn Objective,
        x: &[f64],
        grad: &[f64],
        direction: &mut Vec<f64>,
    ) {
        loop {
            if self.level >= LEVEL_GRADIENT_DESCENT {
                direction.clear();
                direction.extend(grad.iter().map(|&g| -g));
                return;
            }
            if self.try_newton_step(obj, x, grad, direction) {
                return;
            }
            self.advance_regularization();
        }
    }

    fn is_direction_descent(&self) -> bool {
        true
    }

    fn increase_descent_strategy(&mut self) {
        match self.level {
            0 => self.enter_regularized(),
            1 => self.level = LEVEL_GRADIENT_DESCENT,
            _ => {}
        }
    }

    fn set_default_descent_strategy(&mut self) {
        self.level = 0;
    }

    fn times(&self) -> StrategyTimes {
        self.times
    }
}

fn dense_inf_norm(h: &Mat<f64>) -> f64 {
    let mut best = 0.0f64;
    for i in 0..h.nrows() {
        let mut row = 0.0;
        for j in 0..h.ncols() {
            row += h[(i, j)].abs();
        }
        best = best.max(row);
    }
    best
}

fn triplet_inf_norm(triplets: &[(usize, usize, f64)], n: usize) -> f64 {
    let mut rows = vec![0.0f64; n];
    for &(i, _, v) in triplets {
        rows[i] += v.abs();
    }
    rows.iter().fold(0.0f64, |acc, &r| acc.max(r))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// f(x) = 0.5·(a·x0² + b·x1²), SPD Hessian diag(a, b).
    struct DiagQuadratic {
        a: f64,
        b: f64,
    }

    impl Objective for DiagQuadratic {
        fn value(&mut self, x: &[f64]) -> f64 {
            0.5 * (self.a * x[0] * x[0] + self.b * x[1] * x[1])
        }

        fn gradient(&mut self, x: &[f64], grad: &mut Vec<f64>) {
            grad.clear();
            grad.push(self.a * x[0]);
            grad.push(self.b * x[1]);
        }

        fn hessian(&mut self, _x: &[f64], hess: &mut Mat<f64>) {
            let (a, b) = (self.a, self.b);
            *hess = Mat::from_fn(2, 2, move |i, j| match (i, j) {
                (0, 0) => a,
                (1, 1) => b,
                _ => 0.0,
            });
        }

        fn hessian_triplets(&mut self, _x: &[f64]) -> Vec<(usize, usize, f64)> {
            vec![(0, 0, self.a), (1, 1, self.b)]
        }
    }

    /// Rank-deficient Hessian everywhere.
    struct SingularCurvature;

    impl Objective for SingularCurvature {
        fn value(&mut self, x: &[f64]) -> f64 {
            let t = x[0] + x[1];
            0.5 * t * t
        }

        fn gradient(&mut self, x: &[f64], grad: &mut Vec<f64>) {
            let t = x[0] + x[1];
            grad.clear();
            grad.push(t);
            grad.push(t);
        }

        fn hessian(&mut self, _x: &[f64], hess: &mut Mat<f64>) {
            *hess = Mat::from_fn(2, 2, |_, _| 1.0);
        }

        fn hessian_triplets(&mut self, _x: &[f64]) -> Vec<(usize, usize, f64)> {
            vec![(0, 0, 1.0), (0, 1, 1.0), (1, 0, 1.0), (1, 1, 1.0)]
        }
    }

    #[test]
    fn dense_newton_exact_on_quadratic() {
        let mut obj = DiagQuadratic { a: 2.0, b: 8.0 };
        let mut newton = Newton::new(HessianForm::Dense, 8, 1e-10);
        newton.reset(2);

        let x = [3.0, -1.0];
        let mut grad = Vec::new();
        obj.gradient(&x, &mut grad);
        let mut dir = Vec::new();
        newton.compute_update_direction(&mut obj, &x, &grad, &mut dir);

        // Newton step lands exactly at the minimum: Δx = −x
        assert!((dir[0] + 3.0).abs() < 1e-10, "dir[0]={}", dir[0]);
        assert!((dir[1] - 1.0).abs() < 1e-10, "dir[1]={}", dir[1]);
        assert_eq!(newton.strategy_level(), 0);
        assert!(newton.times().assembly >= 0.0);
    }

    #[test]
    fn sparse_newton_exact_on_quadratic() {
        let mut obj = DiagQuadratic { a: 2.0, b: 8.0 };
        let mut newton = Newton::new(HessianForm::Sparse, 8, 1e-10);
        newton.reset(2);

        let x = [3.0, -1.0];
        let mut grad = Vec::new();
        obj.gradient(&x, &mut grad);
        let mut dir = Vec::new();
        newton.compute_update_direction(&mut obj, &x, &grad, &mut dir);

        assert!((dir[0] + 3.0).abs() < 1e-10, "dir[0]={}", dir[0]);
        assert!((dir[1] - 1.0).abs() < 1e-10, "dir[1]={}", dir[1]);
    }

    #[test]
    fn singular_hessian_falls_back_without_nan() {
        let mut obj = SingularCurvature;
        let mut newton = Newton::new(HessianForm::Dense, 4, 1e-10);
        newton.reset(2);

        let x = [1.0, 2.0];
        let mut grad = Vec::new();
        obj.gradient(&x, &mut grad);
        let mut dir = Vec::new();
        newton.compute_update_direction(&mut obj, &x, &grad, &mut dir);

        // Either a regularized solve or the gradient fallback; never NaN
        assert!(dir.iter().all(|v| v.is_finite()));
        assert!(newton.strategy_level() >= 1);
        // A finite direction from (H + λI) must still be descent
        let dg: f64 = dir.iter().zip(&grad).map(|(d, g)| d * g).sum();
        assert!(dg < 0.0);
    }

    #[test]
    fn ladder_advances_through_regularized_to_gradient() {
        let mut newton = Newton::new(HessianForm::Dense, 8, 1e-10);
        newton.reset(2);
        assert_eq!(newton.strategy_level(), 0);
        assert_eq!(newton.descent_strategy_name(), "Newton");

        newton.increase_descent_strategy();
        assert_eq!(newton.strategy_level(), 1);
        assert_eq!(newton.descent_strategy_name(), "regularized Newton");

        newton.increase_descent_strategy();
        assert_eq!(newton.strategy_level(), 2);
        assert_eq!(newton.descent_strategy_name(), "gradient descent");

        // Terminal level: a further increase is a no-op
        newton.increase_descent_strategy();
        assert_eq!(newton.strategy_level(), 2);

        newton.set_default_descent_strategy();
        assert_eq!(newton.strategy_level(), 0);
    }
}
