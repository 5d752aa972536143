//! Adaptive Dormand-Prince 5(4) Integrator
//!
//! A 7-stage embedded RK5(4) pair with adaptive step-size control, dense
//! output on a fixed time grid, and zero-crossing detection.
//!
//! Reference: Dormand & Prince (1980), Journal of Computational and
//! Applied Mathematics 6(1); Hairer, Nørsett & Wanner (1993), ch. II.

use crate::events::{
    crossing_detected, BrentError, BrentSolver, EventAction, EventConfig, EventFunction,
    EventResult,
};
use crate::grid::TimeGrid;
use crate::tableau::{A, B, B_ERR, C, STAGES};
use crate::trajectory::Trajectory;

/// System of ordinary differential equations: dy/dt = f(t, y)
pub trait OdeSystem<const N: usize> {
    /// Evaluate the right-hand side of the ODE system
    ///
    /// # Arguments
    /// * `t` - Current time
    /// * `y` - Current state vector
    /// * `dydt` - Output: derivative dy/dt
    fn rhs(&self, t: f64, y: &[f64; N], dydt: &mut [f64; N]);
}

/// Integration result from a single trial step
#[derive(Debug, Clone)]
pub struct StepResult<const N: usize> {
    /// New state after the step (5th order solution)
    pub y: [f64; N],
    /// New time value
    pub t: f64,
    /// Normalized error estimate (should be ≤ 1.0 for acceptance)
    pub error: f64,
    /// Suggested step size for next step
    pub h_next: f64,
    /// Whether the step was accepted
    pub accepted: bool,
}

/// Integration statistics for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    /// Total number of function evaluations
    pub fn_evals: u64,
    /// Number of accepted steps
    pub accepted_steps: u64,
    /// Number of rejected steps
    pub rejected_steps: u64,
}

/// Step-size controller using an I-controller
///
/// h_new = safety * h * error^(-1/5)
#[derive(Clone)]
pub struct StepController {
    /// Safety factor (0.8-0.9 typical)
    pub safety: f64,
    /// Maximum growth factor per step
    pub max_factor: f64,
    /// Minimum reduction factor per step
    pub min_factor: f64,
    /// Exponent = 1/(p + 1) where p = 4 is the order of the error estimate
    exponent: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            max_factor: 10.0,
            min_factor: 0.2,
            exponent: 1.0 / 5.0,
        }
    }
}

impl StepController {
    /// Compute the step size adjustment factor
    pub fn compute_factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }

        let factor = self.safety * error.powf(-self.exponent);
        factor.clamp(self.min_factor, self.max_factor)
    }
}

/// Tolerance specification for error control
///
/// Error is computed as: |y5 - y4| / (atol + rtol * |y5|)
#[derive(Debug, Clone)]
pub struct Tolerances<const N: usize> {
    /// Absolute tolerance per component
    pub atol: [f64; N],
    /// Relative tolerance per component
    pub rtol: [f64; N],
}

impl<const N: usize> Tolerances<N> {
    /// Create tolerances with uniform values
    pub fn new(atol: f64, rtol: f64) -> Self {
        Self {
            atol: [atol; N],
            rtol: [rtol; N],
        }
    }

    /// Create tolerances with per-component values
    pub fn with_components(atol: [f64; N], rtol: [f64; N]) -> Self {
        Self { atol, rtol }
    }
}

/// Dormand-Prince 5(4) integrator
///
/// # Type Parameters
/// * `N` - Dimension of the state vector
///
/// # Example
/// ```ignore
/// use spring_damper::{Dopri5, OdeSystem, Tolerances};
///
/// struct DampedOscillator { omega: f64, zeta: f64 }
///
/// impl OdeSystem<2> for DampedOscillator {
///     fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
///         dydt[0] = y[1];
///         dydt[1] = -2.0 * self.zeta * self.omega * y[1]
///             - self.omega * self.omega * y[0];
///     }
/// }
///
/// let sys = DampedOscillator { omega: 1.0, zeta: 0.1 };
/// let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
///
/// let (tf, yf) = solver.integrate(&sys, 0.0, &[1.0, 0.0], 10.0, 0.1).unwrap();
/// ```
#[derive(Clone)]
pub struct Dopri5<const N: usize> {
    /// Tolerance specification
    tol: Tolerances<N>,
    /// Step-size controller
    controller: StepController,
    /// Minimum step size
    pub h_min: f64,
    /// Maximum step size
    pub h_max: f64,
    /// Maximum number of integration steps before error
    pub max_steps: u64,
    /// Stage evaluations (pre-allocated workspace)
    k: [[f64; N]; STAGES],
    /// Integration statistics
    pub stats: Stats,
    /// Crossings collected during `integrate_to_event` with
    /// `EventAction::Continue`. Cleared at the start of each call.
    pub collected_events: Vec<EventResult<N>>,
}

impl<const N: usize> Dopri5<N> {
    /// Create a new DOPRI5 solver with specified tolerances
    pub fn new(tol: Tolerances<N>) -> Self {
        Self {
            tol,
            controller: StepController::default(),
            h_min: 1e-14,
            h_max: f64::INFINITY,
            max_steps: 1_000_000,
            k: [[0.0; N]; STAGES],
            stats: Stats::default(),
            collected_events: Vec::new(),
        }
    }

    /// Set minimum and maximum step sizes
    pub fn set_step_limits(&mut self, h_min: f64, h_max: f64) {
        self.h_min = h_min;
        self.h_max = h_max;
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = Stats::default();
    }

    /// Perform a single integration step
    ///
    /// Computes the 7 stages, forms the 5th order solution, estimates the
    /// error from the embedded 4th order weights, and determines whether
    /// the step should be accepted.
    pub fn step<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t: f64,
        y: &[f64; N],
        h: f64,
    ) -> StepResult<N> {
        let h = h.signum() * h.abs().clamp(self.h_min, self.h_max);

        self.compute_stages(sys, t, y, h);

        let y5 = self.compute_solution(y, h);

        let error = self.compute_error(&y5, h);

        let accepted = error <= 1.0;

        let factor = self.controller.compute_factor(error);
        let h_next = (h.abs() * factor).clamp(self.h_min, self.h_max);

        self.stats.fn_evals += STAGES as u64;
        if accepted {
            self.stats.accepted_steps += 1;
        } else {
            self.stats.rejected_steps += 1;
        }

        StepResult {
            y: y5,
            t: t + h,
            error,
            h_next,
            accepted,
        }
    }

    /// Integrate from t0 to tf, returning only the final state
    ///
    /// # Arguments
    /// * `sys` - The ODE system to integrate
    /// * `t0` - Initial time
    /// * `y0` - Initial state
    /// * `tf` - Final time
    /// * `h0` - Initial step size guess
    ///
    /// # Returns
    /// * `Ok((t_final, y_final))` on success
    /// * `Err(IntegrationError)` on failure
    pub fn integrate<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<(f64, [f64; N]), IntegrationError> {
        if t0 == tf {
            return Ok((t0, *y0));
        }
        self.validate_inputs(t0, y0, tf, h0)?;

        let mut t = t0;
        let mut y = *y0;
        let mut h = h0;

        let direction = (tf - t0).signum();
        let mut step_count = 0u64;

        while (tf - t) * direction > self.h_min {
            // Don't overshoot the endpoint
            if (t + h - tf) * direction > 0.0 {
                h = tf - t;
            }

            let result = self.step(sys, t, &y, h);

            if result.accepted {
                t = result.t;
                y = result.y;
                if !y.iter().all(|v| v.is_finite()) {
                    return Err(IntegrationError::NonFiniteState { t });
                }
            }

            h = result.h_next * direction;

            step_count += 1;
            if step_count > self.max_steps {
                return Err(IntegrationError::MaxStepsExceeded);
            }

            // A rejected step that is already at h_min cannot make progress
            if !result.accepted && result.h_next <= self.h_min && (tf - t) * direction > self.h_min
            {
                return Err(IntegrationError::StepSizeTooSmall {
                    t,
                    h: result.h_next,
                });
            }
        }

        Ok((t, y))
    }

    /// Integrate over a time grid, sampling the solution at every grid point.
    ///
    /// The integrator marches with its own adaptive steps; grid points that
    /// fall inside an accepted step are filled by Hermite cubic
    /// interpolation between the step endpoints, using stage 0 and the FSAL
    /// stage as the endpoint derivatives (no extra RHS evaluations). The
    /// first sample is the initial condition itself, bit-for-bit.
    ///
    /// Statistics are reset at the start of the call and a copy is stored
    /// on the returned trajectory.
    ///
    /// # Arguments
    /// * `sys` - The ODE system to integrate
    /// * `y0` - Initial state at the first grid point
    /// * `grid` - Strictly increasing evaluation times
    pub fn solve<S: OdeSystem<N>>(
        &mut self,
        sys: &S,
        y0: &[f64; N],
        grid: &TimeGrid,
    ) -> Result<Trajectory<N>, IntegrationError> {
        let t0 = grid.start();
        let tf = grid.end();
        let h0 = (grid.span() / 100.0).clamp(self.h_min, self.h_max);
        self.validate_inputs(t0, y0, tf, h0)?;
        self.reset_stats();

        let mut trajectory = Trajectory::with_capacity(grid.len());
        trajectory.push(t0, *y0);

        let mut t = t0;
        let mut y = *y0;
        let mut h = h0;
        let mut next = 1;
        let mut step_count = 0u64;

        while next < grid.len() {
            if t + h > tf {
                h = tf - t;
            }

            let result = self.step(sys, t, &y, h);

            if result.accepted {
                if !result.y.iter().all(|v| v.is_finite()) {
                    return Err(IntegrationError::NonFiniteState { t: result.t });
                }

                // Endpoint derivatives: stage 0 is f(t, y), the FSAL stage
                // is f evaluated at the accepted solution
                let f_left = self.k[0];
                let f_right = self.k[STAGES - 1];

                while next < grid.len() && grid[next] <= result.t + self.h_min {
                    let ts = grid[next];
                    let ys = if ts == result.t {
                        result.y
                    } else {
                        hermite_cubic(t, &y, &f_left, result.t, &result.y, &f_right, ts)
                    };
                    trajectory.push(ts, ys);
                    next += 1;
                }

                t = result.t;
                y = result.y;
            }

            h = result.h_next;

            step_count += 1;
            if step_count > self.max_steps {
                return Err(IntegrationError::MaxStepsExceeded);
            }

            if !result.accepted && result.h_next <= self.h_min && (tf - t) > self.h_min {
                return Err(IntegrationError::StepSizeTooSmall {
                    t,
                    h: result.h_next,
                });
            }
        }

        trajectory.stats = self.stats.clone();
        Ok(trajectory)
    }

    /// Integrate until an event function crosses zero, or the final time is
    /// reached.
    ///
    /// The event function `g(t, y)` is evaluated after every accepted step.
    /// When `g` changes sign in the requested direction, Brent's method
    /// locates the crossing time to `root_tol` precision; the state at the
    /// crossing comes from Hermite cubic interpolation between the step
    /// endpoints (O(h⁴) accuracy).
    ///
    /// With [`EventAction::Continue`] every crossing is recorded in
    /// [`collected_events`](Self::collected_events) and integration runs to
    /// `tf`. For a damped oscillator, monitoring the displacement component
    /// yields the times at which the mass passes through equilibrium.
    ///
    /// # Returns
    /// * `Ok(IntegrationResult::Event(..))` - Stopped at a crossing
    /// * `Ok(IntegrationResult::Completed { .. })` - Reached tf
    /// * `Err(IntegrationError)` - Integration failed
    #[allow(clippy::too_many_arguments)]
    pub fn integrate_to_event<S, E>(
        &mut self,
        sys: &S,
        event: &E,
        config: &EventConfig,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<IntegrationResult<N>, IntegrationError>
    where
        S: OdeSystem<N>,
        E: EventFunction<N>,
    {
        if t0 == tf {
            return Ok(IntegrationResult::Completed { t: t0, y: *y0 });
        }
        self.validate_inputs(t0, y0, tf, h0)?;
        self.collected_events.clear();

        let mut t = t0;
        let mut y = *y0;
        let mut h = h0;

        let direction = (tf - t0).signum();
        let mut g_prev = event.eval(t, &y);
        let mut step_count = 0u64;

        while (tf - t) * direction > self.h_min {
            if (t + h - tf) * direction > 0.0 {
                h = tf - t;
            }

            let result = self.step(sys, t, &y, h);

            if result.accepted {
                if !result.y.iter().all(|v| v.is_finite()) {
                    return Err(IntegrationError::NonFiniteState { t: result.t });
                }

                let g_new = event.eval(result.t, &result.y);

                if crossing_detected(g_prev, g_new, config.direction) {
                    let f_left = self.k[0];
                    let f_right = self.k[STAGES - 1];
                    let crossing = self.find_crossing(
                        event, t, &y, &f_left, result.t, &result.y, &f_right, config,
                    )?;

                    match config.action {
                        EventAction::Stop => {
                            return Ok(IntegrationResult::Event(crossing));
                        }
                        EventAction::Continue => {
                            // Record the crossing and accept the full step so
                            // the same zero is not detected twice
                            self.collected_events.push(crossing);
                        }
                    }
                }

                t = result.t;
                y = result.y;
                g_prev = g_new;
            }

            h = result.h_next * direction;

            step_count += 1;
            if step_count > self.max_steps {
                return Err(IntegrationError::MaxStepsExceeded);
            }

            if !result.accepted && result.h_next <= self.h_min && (tf - t) * direction > self.h_min
            {
                return Err(IntegrationError::StepSizeTooSmall {
                    t,
                    h: result.h_next,
                });
            }
        }

        Ok(IntegrationResult::Completed { t, y })
    }

    /// Compute all 7 stages
    #[allow(clippy::needless_range_loop)]
    fn compute_stages<S: OdeSystem<N>>(&mut self, sys: &S, t: f64, y: &[f64; N], h: f64) {
        let mut y_temp = [0.0; N];

        // Stage 0: k[0] = f(t, y)
        sys.rhs(t, y, &mut self.k[0]);

        // Stages 1-6
        for i in 1..STAGES {
            // y_temp = y + h * sum_{j=0}^{i-1} a[i][j] * k[j]
            for n in 0..N {
                let mut sum = 0.0;
                for j in 0..i {
                    sum += A[i][j] * self.k[j][n];
                }
                y_temp[n] = y[n] + h * sum;
            }

            // k[i] = f(t + c[i]*h, y_temp)
            sys.rhs(t + C[i] * h, &y_temp, &mut self.k[i]);
        }
    }

    /// Compute the 5th order solution from the stages
    #[allow(clippy::needless_range_loop)]
    fn compute_solution(&self, y: &[f64; N], h: f64) -> [f64; N] {
        let mut y_new = [0.0; N];

        for n in 0..N {
            let mut sum = 0.0;
            for i in 0..STAGES {
                sum += B[i] * self.k[i][n];
            }
            y_new[n] = y[n] + h * sum;
        }

        y_new
    }

    /// Compute the normalized error estimate
    ///
    /// Uses the infinity norm of the scaled error:
    /// error = max_i( |h * sum_j (b[j] - b_hat[j]) * k[j][i]| / scale[i] )
    /// where scale[i] = atol[i] + rtol[i] * |y5[i]|
    #[allow(clippy::needless_range_loop)]
    fn compute_error(&self, y5: &[f64; N], h: f64) -> f64 {
        let mut max_err: f64 = 0.0;

        for n in 0..N {
            let mut err_n = 0.0;
            for i in 0..STAGES {
                err_n += B_ERR[i] * self.k[i][n];
            }
            err_n *= h;

            let scale = self.tol.atol[n] + self.tol.rtol[n] * y5[n].abs();
            let scaled_err = err_n.abs() / scale;

            max_err = max_err.max(scaled_err);
        }

        max_err
    }

    /// Validate integration inputs
    fn validate_inputs(
        &self,
        t0: f64,
        y0: &[f64; N],
        tf: f64,
        h0: f64,
    ) -> Result<(), IntegrationError> {
        if !t0.is_finite() || !tf.is_finite() || !h0.is_finite() {
            return Err(IntegrationError::InvalidInput {
                message: "t0, tf, and h0 must be finite".to_string(),
            });
        }
        if h0 == 0.0 {
            return Err(IntegrationError::InvalidInput {
                message: "h0 must be non-zero".to_string(),
            });
        }
        let direction = tf - t0;
        if direction != 0.0 && h0.signum() != direction.signum() {
            return Err(IntegrationError::InvalidInput {
                message: "h0 sign must match integration direction (tf - t0)".to_string(),
            });
        }
        for (i, &val) in y0.iter().enumerate() {
            if !val.is_finite() {
                return Err(IntegrationError::InvalidInput {
                    message: format!("y0[{}] is not finite", i),
                });
            }
        }
        for (i, (&a, &r)) in self.tol.atol.iter().zip(self.tol.rtol.iter()).enumerate() {
            if !a.is_finite() || a <= 0.0 {
                return Err(IntegrationError::InvalidInput {
                    message: format!("atol[{}] must be positive and finite", i),
                });
            }
            if !r.is_finite() || r < 0.0 {
                return Err(IntegrationError::InvalidInput {
                    message: format!("rtol[{}] must be non-negative and finite", i),
                });
            }
        }
        Ok(())
    }

    /// Refine a bracketed crossing with Brent's method.
    ///
    /// The event function is evaluated on the Hermite cubic interpolant of
    /// the accepted step, so refinement costs no RHS evaluations.
    #[allow(clippy::too_many_arguments)]
    fn find_crossing<E: EventFunction<N>>(
        &self,
        event: &E,
        t_a: f64,
        y_a: &[f64; N],
        f_a: &[f64; N],
        t_b: f64,
        y_b: &[f64; N],
        f_b: &[f64; N],
        config: &EventConfig,
    ) -> Result<EventResult<N>, IntegrationError> {
        let brent = BrentSolver::new(config.root_tol, config.max_iter);

        let eval_g = |t: f64| {
            let y = hermite_cubic(t_a, y_a, f_a, t_b, y_b, f_b, t);
            event.eval(t, &y)
        };

        match brent.find_root(eval_g, t_a, t_b) {
            Ok(root) => Ok(EventResult {
                t: root.t,
                y: hermite_cubic(t_a, y_a, f_a, t_b, y_b, f_b, root.t),
                g_value: root.residual,
                iterations: root.iterations,
            }),
            Err(BrentError::NotBracketed { .. }) => {
                // Should not happen: a sign change was already detected
                Err(IntegrationError::EventFindingFailed {
                    message: "root not bracketed despite sign change detection".to_string(),
                })
            }
            Err(BrentError::MaxIterations {
                best,
                residual,
                iterations,
            }) => {
                // Return the best estimate even if not fully converged
                Ok(EventResult {
                    t: best,
                    y: hermite_cubic(t_a, y_a, f_a, t_b, y_b, f_b, best),
                    g_value: residual,
                    iterations,
                })
            }
        }
    }
}

/// Hermite cubic interpolation over one step.
///
/// Given the states and derivatives at both step endpoints, evaluates the
/// interpolating cubic at `t` ∈ [t_a, t_b] with O(h⁴) accuracy.
fn hermite_cubic<const N: usize>(
    t_a: f64,
    y_a: &[f64; N],
    f_a: &[f64; N],
    t_b: f64,
    y_b: &[f64; N],
    f_b: &[f64; N],
    t: f64,
) -> [f64; N] {
    let dt = t_b - t_a;
    let alpha = (t - t_a) / dt;
    let a2 = alpha * alpha;
    let a3 = a2 * alpha;

    // Hermite basis functions
    let h00 = 1.0 - 3.0 * a2 + 2.0 * a3; // y_a weight
    let h10 = alpha - 2.0 * a2 + a3; // f_a weight (scaled by dt)
    let h01 = 3.0 * a2 - 2.0 * a3; // y_b weight
    let h11 = -a2 + a3; // f_b weight (scaled by dt)

    let mut y = [0.0; N];
    for i in 0..N {
        y[i] = h00 * y_a[i] + h10 * dt * f_a[i] + h01 * y_b[i] + h11 * dt * f_b[i];
    }
    y
}

/// Result of integration with event detection
#[derive(Debug, Clone)]
pub enum IntegrationResult<const N: usize> {
    /// Integration completed normally (reached final time)
    Completed {
        /// Final time
        t: f64,
        /// Final state vector
        y: [f64; N],
    },
    /// Integration stopped at a zero crossing
    Event(EventResult<N>),
}

/// Errors that can occur during integration
#[derive(Debug, Clone)]
pub enum IntegrationError {
    /// Step size became too small
    StepSizeTooSmall {
        /// Time at which step size became too small
        t: f64,
        /// Step size that was too small
        h: f64,
    },
    /// Maximum number of steps exceeded
    MaxStepsExceeded,
    /// Crossing refinement failed
    EventFindingFailed {
        /// Description of the failure
        message: String,
    },
    /// Invalid input parameters
    InvalidInput {
        /// Description of the invalid input
        message: String,
    },
    /// Non-finite state detected during integration
    NonFiniteState {
        /// Time at which non-finite state was detected
        t: f64,
    },
}

impl std::fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrationError::StepSizeTooSmall { t, h } => {
                write!(f, "step size {} too small at t = {}", h, t)
            }
            IntegrationError::MaxStepsExceeded => {
                write!(f, "maximum number of integration steps exceeded")
            }
            IntegrationError::EventFindingFailed { message } => {
                write!(f, "event finding failed: {}", message)
            }
            IntegrationError::InvalidInput { message } => {
                write!(f, "invalid input: {}", message)
            }
            IntegrationError::NonFiniteState { t } => {
                write!(f, "non-finite state detected at t = {}", t)
            }
        }
    }
}

impl std::error::Error for IntegrationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventDirection;
    use std::f64::consts::PI;

    /// Damped oscillator in damping-ratio form: x'' + 2ζωx' + ω²x = 0
    /// State: [x, v]
    struct DampedOscillator {
        omega: f64,
        zeta: f64,
    }

    impl OdeSystem<2> for DampedOscillator {
        fn rhs(&self, _t: f64, y: &[f64; 2], dydt: &mut [f64; 2]) {
            dydt[0] = y[1];
            dydt[1] = -2.0 * self.zeta * self.omega * y[1] - self.omega * self.omega * y[0];
        }
    }

    /// Closed-form underdamped response for x(0) = x0, v(0) = v0
    fn underdamped_exact(omega: f64, zeta: f64, x0: f64, v0: f64, t: f64) -> (f64, f64) {
        let sigma = zeta * omega;
        let omega_d = omega * (1.0 - zeta * zeta).sqrt();
        let a = x0;
        let b = (v0 + sigma * x0) / omega_d;

        let decay = (-sigma * t).exp();
        let (sin, cos) = (omega_d * t).sin_cos();

        let x = decay * (a * cos + b * sin);
        let v = decay * ((-sigma * a + omega_d * b) * cos + (-sigma * b - omega_d * a) * sin);
        (x, v)
    }

    #[test]
    fn test_damped_oscillator_matches_closed_form() {
        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 0.1,
        };
        let y0 = [1.0, 0.0];
        let tf = 10.0;

        let tol = Tolerances::new(1e-12, 1e-12);
        let mut solver = Dopri5::new(tol);

        let (t_final, y_final) = solver.integrate(&sys, 0.0, &y0, tf, 0.1).unwrap();
        let (x_exact, v_exact) = underdamped_exact(1.0, 0.1, 1.0, 0.0, t_final);

        assert!((t_final - tf).abs() < 1e-10);
        assert!(
            (y_final[0] - x_exact).abs() < 1e-8,
            "x(10) = {}, exact = {}",
            y_final[0],
            x_exact
        );
        assert!(
            (y_final[1] - v_exact).abs() < 1e-8,
            "v(10) = {}, exact = {}",
            y_final[1],
            v_exact
        );

        println!("Damped oscillator test passed:");
        println!("  Final state: [{:.12}, {:.12}]", y_final[0], y_final[1]);
        println!("  Stats: {:?}", solver.stats);
    }

    #[test]
    fn test_undamped_energy_conservation() {
        // ζ = 0: pure harmonic motion, E = ½v² + ½ω²x² is conserved
        let omega = 1.0;
        let sys = DampedOscillator { omega, zeta: 0.0 };
        let y0 = [1.0, 0.0];
        let period = 2.0 * PI;

        let energy = |y: &[f64; 2]| 0.5 * y[1] * y[1] + 0.5 * omega * omega * y[0] * y[0];
        let e0 = energy(&y0);

        let tol = Tolerances::new(1e-12, 1e-12);
        let mut solver = Dopri5::new(tol);

        let (_, y_final) = solver.integrate(&sys, 0.0, &y0, period, 0.1).unwrap();

        let drift = (energy(&y_final) - e0).abs() / e0;
        assert!(drift < 1e-9, "Energy drift {} exceeds threshold", drift);
    }

    #[test]
    fn test_exponential_decay() {
        // y' = -y, y(0) = 1, exact: y = exp(-t)
        struct ExpDecay;

        impl OdeSystem<1> for ExpDecay {
            fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) {
                dydt[0] = -y[0];
            }
        }

        let sys = ExpDecay;
        let y0 = [1.0];
        let tf = 5.0;

        let tol = Tolerances::new(1e-12, 1e-12);
        let mut solver = Dopri5::new(tol);

        let (_, y_final) = solver.integrate(&sys, 0.0, &y0, tf, 0.1).unwrap();
        let exact = (-tf).exp();

        let rel_error = (y_final[0] - exact).abs() / exact;
        assert!(rel_error < 1e-9, "Relative error {} too large", rel_error);
    }

    #[test]
    fn test_order_of_convergence() {
        // Single-step h-refinement on y' = e^t, y(0) = 0, exact y = e^h - 1.
        // (e^t keeps every derivative away from zero at the expansion
        // point, so the leading error term does not degenerate.)
        // For a 5th-order method the local truncation error is O(h^6), so
        // err(h) / err(h/2) should approach 2^6 = 64. A broad acceptance
        // range accounts for higher-order error terms at larger step sizes.

        struct ExpOde;
        impl OdeSystem<1> for ExpOde {
            fn rhs(&self, t: f64, _y: &[f64; 1], dydt: &mut [f64; 1]) {
                dydt[0] = t.exp();
            }
        }

        let sys = ExpOde;
        let y0 = [0.0];

        // Very loose tolerances so every step is accepted
        let tol = Tolerances::new(1.0, 1.0);

        let step_sizes = [0.8, 0.4, 0.2, 0.1];
        let mut errors = Vec::new();

        for &h in &step_sizes {
            let mut solver = Dopri5::new(tol.clone());
            let result = solver.step(&sys, 0.0, &y0, h);
            assert!(result.accepted, "Step with h={} should be accepted", h);
            let err = (result.y[0] - (h.exp() - 1.0)).abs();
            errors.push(err);
            println!("h = {:.4}, err = {:.3e}", h, err);
        }

        let mut checked = 0;
        for i in 0..errors.len() - 1 {
            if errors[i + 1] < 1e-15 {
                // Denominator at machine epsilon, ratio meaningless
                continue;
            }
            let ratio = errors[i] / errors[i + 1];
            println!(
                "err({:.2}) / err({:.2}) = {:.1}",
                step_sizes[i],
                step_sizes[i + 1],
                ratio
            );
            assert!(
                ratio > 40.0 && ratio < 100.0,
                "Error ratio {:.1} outside [40, 100] for h={}/{}",
                ratio,
                step_sizes[i],
                step_sizes[i + 1]
            );
            checked += 1;
        }
        assert!(checked >= 2, "Need at least 2 valid error ratios");
    }

    #[test]
    fn test_backward_integration() {
        // Harmonic motion integrated backward from 2π to 0
        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 0.0,
        };
        let tf = 2.0 * PI;
        let y0 = [1.0, 0.0];

        let tol = Tolerances::new(1e-12, 1e-12);
        let mut solver = Dopri5::new(tol);

        let (t_final, y_final) = solver.integrate(&sys, tf, &y0, 0.0, -0.1).unwrap();

        assert!(t_final.abs() < 1e-10, "t_final = {}", t_final);
        assert!(
            (y_final[0] - 1.0).abs() < 1e-8,
            "x(0) = {}, expected 1.0",
            y_final[0]
        );
        assert!(y_final[1].abs() < 1e-8, "v(0) = {}, expected 0.0", y_final[1]);
    }

    #[test]
    fn test_step_rejection_with_large_h0() {
        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 0.1,
        };
        let y0 = [1.0, 0.0];

        let tol = Tolerances::new(1e-12, 1e-12);
        let mut solver = Dopri5::new(tol);

        // h0 = 100 is absurdly large for this problem
        let (t_final, y_final) = solver.integrate(&sys, 0.0, &y0, 10.0, 100.0).unwrap();
        let (x_exact, _) = underdamped_exact(1.0, 0.1, 1.0, 0.0, t_final);

        assert!((t_final - 10.0).abs() < 1e-10);
        assert!(
            (y_final[0] - x_exact).abs() < 1e-8,
            "x(10) = {}, exact = {}",
            y_final[0],
            x_exact
        );
        assert!(
            solver.stats.rejected_steps > 0,
            "Expected step rejections with h0=100"
        );
    }

    #[test]
    fn test_max_steps_exceeded() {
        let tol = Tolerances::new(1e-12, 1e-12);
        let mut solver = Dopri5::new(tol);
        solver.max_steps = 5;

        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 0.1,
        };
        let result = solver.integrate(&sys, 0.0, &[1.0, 0.0], 100.0, 0.01);
        assert!(
            matches!(result, Err(IntegrationError::MaxStepsExceeded)),
            "Expected MaxStepsExceeded, got {:?}",
            result
        );
    }

    #[test]
    fn test_step_size_too_small_error() {
        // y' = -1/y², blows up as y -> 0
        struct SingularOde;
        impl OdeSystem<1> for SingularOde {
            fn rhs(&self, _t: f64, y: &[f64; 1], dydt: &mut [f64; 1]) {
                dydt[0] = -1.0 / (y[0] * y[0] + 1e-30);
            }
        }

        let tol = Tolerances::new(1e-12, 1e-12);
        let mut solver = Dopri5::new(tol);
        // Raise h_min so the controller hits the floor before max_steps
        solver.h_min = 1e-4;

        let result = solver.integrate(&SingularOde, 0.0, &[0.001], 1.0, 0.0001);
        assert!(
            matches!(result, Err(IntegrationError::StepSizeTooSmall { .. })),
            "Expected StepSizeTooSmall, got {:?}",
            result
        );
    }

    // ==================== Input Validation ====================

    struct Still;
    impl OdeSystem<1> for Still {
        fn rhs(&self, _t: f64, _y: &[f64; 1], dydt: &mut [f64; 1]) {
            dydt[0] = 0.0;
        }
    }

    #[test]
    fn test_nan_tolerance_rejected() {
        let mut solver = Dopri5::new(Tolerances::new(f64::NAN, 1e-12));
        let result = solver.integrate(&Still, 0.0, &[1.0], 1.0, 0.1);
        assert!(matches!(result, Err(IntegrationError::InvalidInput { .. })));
    }

    #[test]
    fn test_inf_tolerance_rejected() {
        let mut solver = Dopri5::new(Tolerances::new(f64::INFINITY, 1e-12));
        let result = solver.integrate(&Still, 0.0, &[1.0], 1.0, 0.1);
        assert!(matches!(result, Err(IntegrationError::InvalidInput { .. })));
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let mut solver = Dopri5::new(Tolerances::new(-1e-12, 1e-12));
        let result = solver.integrate(&Still, 0.0, &[1.0], 1.0, 0.1);
        assert!(matches!(result, Err(IntegrationError::InvalidInput { .. })));
    }

    #[test]
    fn test_h0_wrong_sign_rejected() {
        let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));
        let result = solver.integrate(&Still, 0.0, &[1.0], 1.0, -0.1);
        assert!(matches!(result, Err(IntegrationError::InvalidInput { .. })));
    }

    #[test]
    fn test_nan_initial_state_rejected() {
        let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));
        let result = solver.integrate(&Still, 0.0, &[f64::NAN], 1.0, 0.1);
        assert!(matches!(result, Err(IntegrationError::InvalidInput { .. })));
    }

    #[test]
    fn test_zero_length_integration() {
        let mut solver = Dopri5::new(Tolerances::new(1e-12, 1e-12));
        let (t, y) = solver.integrate(&Still, 5.0, &[42.0], 5.0, 0.1).unwrap();
        assert_eq!(t, 5.0);
        assert_eq!(y[0], 42.0);
    }

    // ==================== Dense Output ====================

    #[test]
    fn test_solve_samples_exact_grid() {
        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 0.1,
        };
        let grid = TimeGrid::linspace(0.0, 10.0, 1000).unwrap();
        let y0 = [1.0, 0.0];

        let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        let trajectory = solver.solve(&sys, &y0, &grid).unwrap();

        assert_eq!(trajectory.len(), 1000);
        // Sample times are the grid times, bit-for-bit
        for (i, &t) in trajectory.times().iter().enumerate() {
            assert_eq!(t, grid[i], "sample {} time mismatch", i);
        }
        // First sample is the initial condition, untouched
        assert_eq!(trajectory.states()[0], y0);
    }

    #[test]
    fn test_solve_dense_accuracy() {
        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 0.1,
        };
        let grid = TimeGrid::linspace(0.0, 10.0, 1000).unwrap();
        let y0 = [1.0, 0.0];

        let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        let trajectory = solver.solve(&sys, &y0, &grid).unwrap();

        let mut max_err: f64 = 0.0;
        for (t, y) in trajectory.iter() {
            let (x_exact, v_exact) = underdamped_exact(1.0, 0.1, 1.0, 0.0, t);
            max_err = max_err.max((y[0] - x_exact).abs()).max((y[1] - v_exact).abs());
        }
        assert!(
            max_err < 1e-6,
            "Max interpolated error {} exceeds threshold",
            max_err
        );
    }

    #[test]
    fn test_solve_deterministic() {
        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 0.1,
        };
        let grid = TimeGrid::linspace(0.0, 10.0, 1000).unwrap();
        let y0 = [1.0, 0.0];

        let mut a = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        let mut b = Dopri5::new(Tolerances::new(1e-10, 1e-10));

        let first = a.solve(&sys, &y0, &grid).unwrap();
        let second = b.solve(&sys, &y0, &grid).unwrap();

        assert_eq!(first.times(), second.times());
        assert_eq!(first.states(), second.states());
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn test_solve_monotone_time() {
        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 0.1,
        };
        let grid = TimeGrid::linspace(0.0, 10.0, 250).unwrap();

        let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        let trajectory = solver.solve(&sys, &[1.0, 0.0], &grid).unwrap();

        for pair in trajectory.times().windows(2) {
            assert!(pair[0] < pair[1], "times not strictly increasing");
        }
        assert_eq!(trajectory.times()[0], 0.0);
        assert_eq!(*trajectory.times().last().unwrap(), 10.0);
    }

    // ==================== Zero Crossings ====================

    /// Displacement component of the state
    struct Displacement;
    impl EventFunction<2> for Displacement {
        fn eval(&self, _t: f64, y: &[f64; 2]) -> f64 {
            y[0]
        }
    }

    /// First zero of e^(-σt)(cos ωd·t + (σ/ωd) sin ωd·t)
    fn first_crossing_time(omega: f64, zeta: f64) -> f64 {
        let sigma = zeta * omega;
        let omega_d = omega * (1.0 - zeta * zeta).sqrt();
        let b = sigma / omega_d;
        (PI - (1.0 / b).atan()) / omega_d
    }

    #[test]
    fn test_first_displacement_crossing() {
        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 0.1,
        };
        let expected = first_crossing_time(1.0, 0.1);

        let config = EventConfig {
            direction: EventDirection::Falling,
            ..Default::default()
        };

        let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        let result = solver
            .integrate_to_event(&sys, &Displacement, &config, 0.0, &[1.0, 0.0], 10.0, 0.1)
            .unwrap();

        match result {
            IntegrationResult::Event(ev) => {
                assert!(
                    (ev.t - expected).abs() < 1e-5,
                    "Crossing at {} expected near {}",
                    ev.t,
                    expected
                );
                assert!(ev.y[0].abs() < 1e-6, "x at crossing should be ~0");
                assert!(ev.y[1] < 0.0, "mass should be moving downward");
            }
            IntegrationResult::Completed { t, .. } => {
                panic!("Expected a crossing, completed at t = {}", t);
            }
        }
    }

    #[test]
    fn test_collect_all_crossings() {
        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 0.1,
        };

        let config = EventConfig {
            direction: EventDirection::Any,
            action: EventAction::Continue,
            ..Default::default()
        };

        let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        let result = solver
            .integrate_to_event(&sys, &Displacement, &config, 0.0, &[1.0, 0.0], 10.0, 0.1)
            .unwrap();

        assert!(matches!(result, IntegrationResult::Completed { .. }));

        // Zeros are spaced π/ωd apart starting from the first crossing:
        // three of them fall inside [0, 10] for ζ = 0.1
        assert_eq!(solver.collected_events.len(), 3);

        let omega_d = (1.0_f64 - 0.01).sqrt();
        let first = first_crossing_time(1.0, 0.1);
        for (n, ev) in solver.collected_events.iter().enumerate() {
            let expected = first + n as f64 * PI / omega_d;
            assert!(
                (ev.t - expected).abs() < 1e-5,
                "Crossing {} at {} expected near {}",
                n,
                ev.t,
                expected
            );
        }
    }

    #[test]
    fn test_rising_crossing_skips_first_zero() {
        // Starting at x = 1 the displacement first crosses zero falling;
        // a Rising filter must skip it and stop at the second zero
        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 0.1,
        };
        let omega_d = (1.0_f64 - 0.01).sqrt();
        let expected = first_crossing_time(1.0, 0.1) + PI / omega_d;

        let config = EventConfig {
            direction: EventDirection::Rising,
            ..Default::default()
        };

        let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        let result = solver
            .integrate_to_event(&sys, &Displacement, &config, 0.0, &[1.0, 0.0], 10.0, 0.1)
            .unwrap();

        match result {
            IntegrationResult::Event(ev) => {
                assert!(
                    (ev.t - expected).abs() < 1e-5,
                    "Rising crossing at {} expected near {}",
                    ev.t,
                    expected
                );
            }
            IntegrationResult::Completed { t, .. } => {
                panic!("Expected a rising crossing, completed at t = {}", t);
            }
        }
    }

    #[test]
    fn test_no_event_reaches_tf() {
        // Overdamped response from x = 1 creeps to equilibrium without
        // ever crossing zero
        let sys = DampedOscillator {
            omega: 1.0,
            zeta: 2.0,
        };

        let config = EventConfig::default();
        let mut solver = Dopri5::new(Tolerances::new(1e-10, 1e-10));
        let result = solver
            .integrate_to_event(&sys, &Displacement, &config, 0.0, &[1.0, 0.0], 10.0, 0.1)
            .unwrap();

        match result {
            IntegrationResult::Completed { t, y } => {
                assert!((t - 10.0).abs() < 1e-10);
                assert!(y[0] > 0.0, "overdamped response stays positive");
            }
            IntegrationResult::Event(ev) => {
                panic!("Unexpected crossing at t = {}", ev.t);
            }
        }
    }
}
