use std::collections::VecDeque;

use crate::criteria::dot;
use crate::descent::{DescentStrategy, LEVEL_GRADIENT_DESCENT};
use crate::objective::Objective;

/// Limited-memory BFGS: keeps the most recent `m` curvature pairs
/// `(s, y, ρ)` in a ring buffer and computes `Δx = −H·∇f(x)` with the
/// two-loop recursion, seeding `H₀ = γI` with `γ = sᵀy / yᵀy` from the
/// newest pair.
pub struct Lbfgs {
    level: u32,
    history_size: usize,
    /// Newest pair at the back.
    history: VecDeque<(Vec<f64>, Vec<f64>, f64)>,
    prev_x: Vec<f64>,
    prev_grad: Vec<f64>,
    alpha_buf: Vec<f64>,
}

impl Lbfgs {
    pub fn new(history_size: usize) -> Self {
        Lbfgs {
            level: 0,
            history_size,
            history: VecDeque::with_capacity(history_size),
            prev_x: Vec::new(),
            prev_grad: Vec::new(),
            alpha_buf: Vec::with_capacity(history_size),
        }
    }

    fn clear_history(&mut self) {
        self.history.clear();
        self.prev_x.clear();
        self.prev_grad.clear();
    }

    /// Push the committed step's curvature pair, dropping the oldest when
    /// the buffer is full. Pairs with non-positive curvature are skipped.
    fn update_history(&mut self, x: &[f64], grad: &[f64]) {
        let n = x.len();
        let s: Vec<f64> = (0..n).map(|i| x[i] - self.prev_x[i]).collect();
        let y: Vec<f64> = (0..n).map(|i| grad[i] - self.prev_grad[i]).collect();

        let sy = dot(&s, &y);
        if !sy.is_finite() || sy <= 0.0 {
            return;
        }
        if self.history.len() == self.history_size {
            self.history.pop_front();
        }
        self.history.push_back((s, y, 1.0 / sy));
    }

    /// Two-loop recursion: `d = −H_k·g`.
    fn two_loop_recursion(&mut self, grad: &[f64], direction: &mut Vec<f64>) {
        let n = grad.len();
        direction.clear();
        direction.extend_from_slice(grad);

        self.alpha_buf.clear();
        for (s, y, rho) in self.history.iter().rev() {
            let alpha = rho * dot(s, direction);
            for j in 0..n {
                direction[j] -= alpha * y[j];
            }
            self.alpha_buf.push(alpha);
        }

        if let Some((s, y, _)) = self.history.back() {
            let yy = dot(y, y);
            if yy > 0.0 {
                let gamma = dot(s, y) / yy;
                for v in direction.iter_mut() {
                    *v *= gamma;
                }
            }
        }

        for (alpha, (s, y, rho)) in self.alpha_buf.iter().rev().zip(self.history.iter()) {
            let beta = rho * dot(y, direction);
            for j in 0..n {
                direction[j] += (alpha - beta) * s[j];
            }
        }

        for v in direction.iter_mut() {
            *v = -*v;
        }
    }
}

impl DescentStrategy for Lbfgs {
    fn name(&self) -> &'static str {
        "LBFGS"
    }

    fn descent_strategy_name(&self) -> &'static str {
        match self.level {
            0 => "L-BFGS",
            _ => "gradient descent",
        }
    }

    fn strategy_level(&self) -> u32 {
        self.level
    }

    fn reset(&mut self, _ndof: usize) {
        self.clear_history();
    }

    fn compute_update_direction(
        &mut self,
        _obj: &mut dyn Objective,
        x: &[f64],
        grad: &[f64],
        direction: &mut Vec<f64>,
    ) {
        if self.level >= LEVEL_GRADIENT_DESCENT {
            direction.clear();
            direction.extend(grad.iter().map(|&g| -g));
            return;
        }

        if !self.prev_x.is_empty() {
            self.update_history(x, grad);
        }

        self.two_loop_recursion(grad, direction);

        self.prev_x = x.to_vec();
        self.prev_grad = grad.to_vec();
    }

    fn is_direction_descent(&self) -> bool {
        true
    }

    fn increase_descent_strategy(&mut self) {
        if self.level < LEVEL_GRADIENT_DESCENT {
            self.level = LEVEL_GRADIENT_DESCENT;
            self.clear_history();
        }
    }

    fn set_default_descent_strategy(&mut self) {
        self.level = 0;
    }
}
