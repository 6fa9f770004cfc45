use faer::Mat;

use crate::criteria::dot;
use crate::descent::{DescentStrategy, LEVEL_GRADIENT_DESCENT};
use crate::objective::Objective;

/// Dense BFGS: maintains an n×n inverse-Hessian approximation `H` and
/// proposes `Δx = −H·∇f(x)`.
///
/// The approximation is folded forward with the classic rank-two update
/// `H ← (I − ρsyᵀ)H(I − ρysᵀ) + ρssᵀ` with `ρ = 1/yᵀs`, computed from the
/// committed step `s = x_k − x_{k−1}` and gradient change
/// `y = g_k − g_{k−1}`. Updates with non-positive curvature `yᵀs` are
/// skipped. On fallback the approximation is discarded and the strategy
/// behaves as gradient descent until the next committed step.
pub struct Bfgs {
    level: u32,
    h: Mat<f64>,
    prev_x: Vec<f64>,
    prev_grad: Vec<f64>,
}

impl Bfgs {
    pub fn new() -> Self {
        Bfgs {
            level: 0,
            h: Mat::new(),
            prev_x: Vec::new(),
            prev_grad: Vec::new(),
        }
    }

    fn clear_history(&mut self, n: usize) {
        self.h = Mat::identity(n, n);
        self.prev_x.clear();
        self.prev_grad.clear();
    }

    /// Fold the most recent committed step into `H`.
    fn update_approximation(&mut self, x: &[f64], grad: &[f64]) {
        let n = x.len();
        let s: Vec<f64> = (0..n).map(|i| x[i] - self.prev_x[i]).collect();
        let y: Vec<f64> = (0..n).map(|i| grad[i] - self.prev_grad[i]).collect();

        let sy = dot(&s, &y);
        if !sy.is_finite() || sy <= 0.0 {
            // Curvature condition violated; keep the previous approximation
            return;
        }
        let rho = 1.0 / sy;

        // hy = H·y and yᵀHy, exploiting symmetry of H
        let mut hy = vec![0.0; n];
        for i in 0..n {
            let mut acc = 0.0;
            for j in 0..n {
                acc += self.h[(i, j)] * y[j];
            }
            hy[i] = acc;
        }
        let yhy = dot(&y, &hy);

        // (I − ρsyᵀ)H(I − ρysᵀ) + ρssᵀ
        //   = H − ρ(s·hyᵀ + hy·sᵀ) + (ρ²·yᵀHy + ρ)·ssᵀ
        let ss_coeff = rho * rho * yhy + rho;
        for i in 0..n {
            for j in 0..n {
                self.h[(i, j)] += ss_coeff * s[i] * s[j] - rho * (s[i] * hy[j] + hy[i] * s[j]);
            }
        }
    }
}

impl Default for Bfgs {
    fn default() -> Self {
        Self::new()
    }
}

impl DescentStrategy for Bfgs {
    fn name(&self) -> &'static str {
        "BFGS"
    }

    fn descent_strategy_name(&self) -> &'static str {
        match self.level {
            0 => "BFGS",
            _ => "gradient descent",
        }
    }

    fn strategy_level(&self) -> u32 {
        self.level
    }

    fn reset(&mut self, ndof: usize) {
        self.clear_history(ndof);
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
            self.update_approximation(x, grad);
        }

        let n = x.len();
        direction.clear();
        direction.resize(n, 0.0);
        for i in 0..n {
            let mut acc = 0.0;
            for j in 0..n {
                acc += self.h[(i, j)] * grad[j];
            }
            direction[i] = -acc;
        }

        self.prev_x = x.to_vec();
        self.prev_grad = grad.to_vec();
    }

    fn is_direction_descent(&self) -> bool {
        true
    }

    fn increase_descent_strategy(&mut self) {
        if self.level < LEVEL_GRADIENT_DESCENT {
            self.level = LEVEL_GRADIENT_DESCENT;
            let n = self.h.nrows();
            self.clear_history(n);
        }
    }

    fn set_default_descent_strategy(&mut self) {
        self.level = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::norm;

    struct Quadratic {
        a: Vec<f64>,
    }

    impl Objective for Quadratic {
        fn value(&mut self, x: &[f64]) -> f64 {
            0.5 * x
                .iter()
                .zip(&self.a)
                .map(|(&xi, &ai)| ai * xi * xi)
                .sum::<f64>()
        }

        fn gradient(&mut self, x: &[f64], grad: &mut Vec<f64>) {
            grad.clear();
            grad.extend(x.iter().zip(&self.a).map(|(&xi, &ai)| ai * xi));
        }
    }

    #[test]
    fn first_direction_is_steepest_descent() {
        let mut obj = Quadratic { a: vec![1.0, 4.0] };
        let mut bfgs = Bfgs::new();
        bfgs.reset(2);

        let x = [1.0, 1.0];
        let mut grad = Vec::new();
        obj.gradient(&x, &mut grad);

        let mut dir = Vec::new();
        bfgs.compute_update_direction(&mut obj, &x, &grad, &mut dir);
        // H = I, so the first proposal is -g
        assert!((dir[0] + grad[0]).abs() < 1e-15);
        assert!((dir[1] + grad[1]).abs() < 1e-15);
    }

    #[test]
    fn curvature_update_improves_direction_on_quadratic() {
        // For f = 0.5 xᵀAx the exact inverse Hessian maps g to x, so after
        // one update the proposal should point closer to -x than -g does.
        let mut obj = Quadratic {
            a: vec![1.0, 100.0],
        };
        let mut bfgs = Bfgs::new();
        bfgs.reset(2);

        let x0 = [1.0, 1.0];
        let mut g0 = Vec::new();
        obj.gradient(&x0, &mut g0);
        let mut d0 = Vec::new();
        bfgs.compute_update_direction(&mut obj, &x0, &g0, &mut d0);

        // Take a damped step and fold in the curvature pair
        let alpha = 1e-2;
        let x1: Vec<f64> = x0.iter().zip(&d0).map(|(&x, &d)| x + alpha * d).collect();
        let mut g1 = Vec::new();
        obj.gradient(&x1, &mut g1);
        let mut d1 = Vec::new();
        bfgs.compute_update_direction(&mut obj, &x1, &g1, &mut d1);

        // d1 must still be a descent direction
        assert!(dot(&d1, &g1) < 0.0);
        // and the approximation must have moved off the identity
        let ratio0 = (d1[0] / g1[0]).abs();
        let ratio1 = (d1[1] / g1[1]).abs();
        assert!(
            (ratio0 - ratio1).abs() > 1e-12,
            "update should break the isotropic scaling of -g"
        );
        assert!(norm(&d1) > 0.0);
    }

    #[test]
    fn fallback_discards_approximation() {
        let mut obj = Quadratic { a: vec![1.0, 4.0] };
        let mut bfgs = Bfgs::new();
        bfgs.reset(2);

        let x = [1.0, 1.0];
        let mut grad = Vec::new();
        obj.gradient(&x, &mut grad);
        let mut dir = Vec::new();
        bfgs.compute_update_direction(&mut obj, &x, &grad, &mut dir);

        bfgs.increase_descent_strategy();
        assert_eq!(bfgs.strategy_level(), LEVEL_GRADIENT_DESCENT);
        bfgs.compute_update_direction(&mut obj, &x, &grad, &mut dir);
        assert!((dir[0] + grad[0]).abs() < 1e-15);
        assert!((dir[1] + grad[1]).abs() < 1e-15);

        bfgs.set_default_descent_strategy();
        assert_eq!(bfgs.strategy_level(), 0);
    }
}
