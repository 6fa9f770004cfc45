use std::time::Instant;

/// Wall-clock stopwatch accumulating into `f64` second buckets.
pub struct Stopwatch(Instant);

impl Stopwatch {
    pub fn start() -> Self {
        Stopwatch(Instant::now())
    }

    /// Seconds elapsed since `start`.
    pub fn elapsed(&self) -> f64 {
        self.0.elapsed().as_secs_f64()
    }
}

/// Per-solve timing buckets owned by the driver, in seconds.
#[derive(Debug, Default, Clone)]
pub struct Timings {
    pub obj_fun: f64,
    pub grad: f64,
    pub constraint_set_update: f64,
    pub line_search: f64,
}

impl Timings {
    pub fn reset(&mut self) {
        *self = Timings::default();
    }
}

/// Assembly/solve timing buckets owned by a descent strategy.
///
/// Zero for strategies that assemble and invert nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrategyTimes {
    pub assembly: f64,
    pub inverting: f64,
}

/// Bookkeeping shared by all line searches.
///
/// `iterations` counts trial steps across the whole solve. The collision
/// buckets (`broad_phase_ccd`, `ccd`) exist for line searches with a
/// continuous-collision phase and stay zero for the bundled methods.
#[derive(Debug, Default, Clone)]
pub struct LineSearchStats {
    /// Gradient-norm acceptance tolerance propagated from the driver
    /// (already characteristic-length scaled); 0 disables the check.
    pub use_grad_norm_tol: f64,
    pub iterations: usize,
    pub checking_for_nan_inf_time: f64,
    pub broad_phase_ccd_time: f64,
    pub ccd_time: f64,
    pub classical_line_search_time: f64,
    pub constraint_set_update_time: f64,
}

impl LineSearchStats {
    pub fn reset_times(&mut self) {
        self.iterations = 0;
        self.checking_for_nan_inf_time = 0.0;
        self.broad_phase_ccd_time = 0.0;
        self.ccd_time = 0.0;
        self.classical_line_search_time = 0.0;
        self.constraint_set_update_time = 0.0;
    }
}
