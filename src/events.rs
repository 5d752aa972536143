//! Zero-Crossing Detection
//!
//! Monitors a scalar function g(t, y) during integration and locates the
//! times at which it crosses zero. The integrator brackets a crossing when
//! g changes sign over an accepted step; Brent's method then refines the
//! crossing time on the step's interpolant.
//!
//! For a damped oscillator the natural choices of g are:
//!
//! - displacement x (equilibrium crossings of the decaying response)
//! - velocity v (turning points, i.e. the local extrema of x whose
//!   magnitudes trace the decay envelope)
//! - x - threshold (settling-band entry)

/// Scalar event function g(t, y) monitored during integration.
///
/// A crossing occurs where g passes through zero. The crossing direction
/// can be restricted via [`EventDirection`].
///
/// # Example
///
/// ```ignore
/// // Turning points of a damped oscillator: v = 0
/// struct TurningPoint;
///
/// impl EventFunction<2> for TurningPoint {
///     fn eval(&self, _t: f64, y: &[f64; 2]) -> f64 {
///         y[1]
///     }
/// }
/// ```
pub trait EventFunction<const N: usize> {
    /// Evaluate the event function at (t, y).
    ///
    /// Zero indicates the event has occurred.
    fn eval(&self, t: f64, y: &[f64; N]) -> f64;
}

/// Direction of zero-crossing to detect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventDirection {
    /// Detect when g goes from negative to positive
    Rising,
    /// Detect when g goes from positive to negative
    Falling,
    /// Detect any zero crossing
    #[default]
    Any,
}

/// Action to take when a crossing is detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventAction {
    /// Stop integration at this crossing
    #[default]
    Stop,
    /// Record the crossing and continue to the final time
    Continue,
}

/// Configuration for crossing detection
#[derive(Debug, Clone)]
pub struct EventConfig {
    /// Which direction of zero-crossing to detect
    pub direction: EventDirection,
    /// What to do when a crossing is detected
    pub action: EventAction,
    /// Tolerance for root refinement (default: 1e-12)
    pub root_tol: f64,
    /// Maximum iterations for root refinement (default: 50)
    pub max_iter: usize,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            direction: EventDirection::Any,
            action: EventAction::Stop,
            root_tol: 1e-12,
            max_iter: 50,
        }
    }
}

/// A located zero crossing
#[derive(Debug, Clone)]
pub struct EventResult<const N: usize> {
    /// Time at which the crossing occurred
    pub t: f64,
    /// Interpolated state at the crossing
    pub y: [f64; N],
    /// Value of the event function at the crossing (should be ~0)
    pub g_value: f64,
    /// Number of root-refinement iterations used
    pub iterations: usize,
}

/// A root located by [`BrentSolver::find_root`]
#[derive(Debug, Clone, Copy)]
pub struct Root {
    /// Abscissa of the root
    pub t: f64,
    /// Function value at the root (should be ~0)
    pub residual: f64,
    /// Iterations used
    pub iterations: usize,
}

/// Brent's method for root finding
///
/// Combines bisection, the secant method, and inverse quadratic
/// interpolation; converges superlinearly on well-behaved functions while
/// never doing worse than bisection.
///
/// Reference: Brent, R.P. (1973). "Algorithms for Minimization without
/// Derivatives". Prentice-Hall.
pub struct BrentSolver {
    /// Tolerance for convergence
    pub tol: f64,
    /// Maximum iterations
    pub max_iter: usize,
}

impl Default for BrentSolver {
    fn default() -> Self {
        Self {
            tol: 1e-12,
            max_iter: 50,
        }
    }
}

impl BrentSolver {
    /// Create a new Brent solver with specified tolerance
    pub fn new(tol: f64, max_iter: usize) -> Self {
        Self { tol, max_iter }
    }

    /// Find the root of f in the bracket [a, b].
    ///
    /// f(a) and f(b) must have opposite signs; otherwise
    /// [`BrentError::NotBracketed`] is returned.
    pub fn find_root<F>(&self, mut f: F, mut a: f64, mut b: f64) -> Result<Root, BrentError>
    where
        F: FnMut(f64) -> f64,
    {
        let mut fa = f(a);
        let mut fb = f(b);

        if fa * fb > 0.0 {
            return Err(BrentError::NotBracketed { a, b, fa, fb });
        }

        // Keep b as the best guess: |f(b)| <= |f(a)|
        if fa.abs() < fb.abs() {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut fa, &mut fb);
        }

        let mut c = a;
        let mut fc = fa;
        let mut mflag = true;
        let mut d = b - a; // step size two iterations back

        for iter in 0..self.max_iter {
            if fa.abs() < fb.abs() {
                std::mem::swap(&mut a, &mut b);
                std::mem::swap(&mut fa, &mut fb);
            }

            if fb == 0.0 || (b - a).abs() <= self.tol {
                return Ok(Root {
                    t: b,
                    residual: fb,
                    iterations: iter + 1,
                });
            }

            // Candidate from inverse quadratic interpolation or secant
            let s = if fa != fc && fb != fc && fa != fb {
                a * fb * fc / ((fa - fb) * (fa - fc))
                    + b * fa * fc / ((fb - fa) * (fb - fc))
                    + c * fa * fb / ((fc - fa) * (fc - fb))
            } else if fb != fa {
                b - fb * (b - a) / (fb - fa)
            } else {
                // fa == fb: degenerate, bisect
                (a + b) / 2.0
            };

            // Reject the candidate and bisect when it falls outside the
            // useful region or fails to shrink the bracket fast enough
            let mid = (a + b) / 2.0;
            let use_bisection = (s - (3.0 * a + b) / 4.0) * (s - b) > 0.0
                || (mflag && (s - b).abs() >= (b - c).abs() / 2.0)
                || (!mflag && (s - b).abs() >= (c - d).abs() / 2.0)
                || (mflag && (b - c).abs() < self.tol)
                || (!mflag && (c - d).abs() < self.tol);

            let s = if use_bisection {
                mflag = true;
                mid
            } else {
                mflag = false;
                s
            };

            let fs = f(s);
            d = c;
            c = b;
            fc = fb;

            if fa * fs < 0.0 {
                b = s;
                fb = fs;
            } else {
                a = s;
                fa = fs;
            }
        }

        Err(BrentError::MaxIterations {
            best: b,
            residual: fb,
            iterations: self.max_iter,
        })
    }
}

/// Errors from Brent's method
#[derive(Debug, Clone)]
pub enum BrentError {
    /// The root is not bracketed by the given interval
    NotBracketed {
        /// Left endpoint
        a: f64,
        /// Right endpoint
        b: f64,
        /// Function value at left endpoint
        fa: f64,
        /// Function value at right endpoint
        fb: f64,
    },
    /// Maximum iterations reached without convergence
    MaxIterations {
        /// Best root estimate so far
        best: f64,
        /// Function value at best estimate
        residual: f64,
        /// Number of iterations performed
        iterations: usize,
    },
}

impl std::fmt::Display for BrentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrentError::NotBracketed { a, b, fa, fb } => {
                write!(
                    f,
                    "root not bracketed: f({}) = {}, f({}) = {} (same sign)",
                    a, fa, b, fb
                )
            }
            BrentError::MaxIterations {
                best,
                residual,
                iterations,
            } => {
                write!(
                    f,
                    "max iterations ({}) reached, best estimate: {}, f = {}",
                    iterations, best, residual
                )
            }
        }
    }
}

impl std::error::Error for BrentError {}

/// Check if a sign change occurred in the specified direction.
///
/// A value that is exactly zero on the new side counts as a crossing; one
/// that is exactly zero on the old side does not (that crossing was already
/// reported on the previous step).
pub fn crossing_detected(g_old: f64, g_new: f64, direction: EventDirection) -> bool {
    if g_old * g_new > 0.0 {
        return false;
    }

    if g_new == 0.0 {
        return true;
    }

    if g_old == 0.0 {
        return false;
    }

    match direction {
        EventDirection::Rising => g_old < 0.0 && g_new > 0.0,
        EventDirection::Falling => g_old > 0.0 && g_new < 0.0,
        EventDirection::Any => true,
    }
}
