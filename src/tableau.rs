//! Dormand-Prince 5(4) Coefficients
//!
//! Butcher tableau for the 7-stage embedded RK5(4) pair from:
//! Dormand, J.R. & Prince, P.J. (1980). "A family of embedded Runge-Kutta
//! formulae". Journal of Computational and Applied Mathematics 6(1),
//! Table 2 (RK5(4)7M).
//!
//! The 5th-order solution advances the state; the embedded 4th-order
//! solution provides the error estimate for adaptive step control. The
//! last stage is evaluated at the advanced solution itself (FSAL), so its
//! derivative can be reused as the right-endpoint slope when interpolating
//! inside an accepted step.

/// Number of stages in the DOPRI5 method
pub const STAGES: usize = 7;

/// Order of the higher-order method (used for advancing the solution)
pub const ORDER: u8 = 5;

/// Order of the embedded method (used for error estimation)
pub const EMBEDDED_ORDER: u8 = 4;

/// Node coefficients (c_i) - the points at which f(t,y) is evaluated
/// c[i] represents t_n + c[i]*h
pub const C: [f64; STAGES] = [
    0.0,       // c[0]
    1.0 / 5.0, // c[1] = 1/5
    3.0 / 10.0, // c[2] = 3/10
    4.0 / 5.0, // c[3] = 4/5
    8.0 / 9.0, // c[4] = 8/9
    1.0,       // c[5] = 1
    1.0,       // c[6] = 1  (FSAL stage)
];

/// Runge-Kutta matrix (a_ij) coefficients
///
/// Lower-triangular matrix where:
/// k_i = f(t_n + c_i*h, y_n + h * sum_{j=0}^{i-1} a_{i,j} * k_j)
///
/// Stored as A[i][j] for row i, column j (j < i).
/// Row 6 equals the 5th-order weights B, which is what makes the last
/// stage FSAL: k_6 is f evaluated at the accepted solution.
pub const A: [[f64; 6]; 7] = [
    // Row 0: k_0 = f(t_n, y_n)
    [0.0; 6],
    // Row 1
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    // Row 2
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    // Row 3
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    // Row 4
    [
        19372.0 / 6561.0,
        -25360.0 / 2187.0,
        64448.0 / 6561.0,
        -212.0 / 729.0,
        0.0,
        0.0,
    ],
    // Row 5
    [
        9017.0 / 3168.0,
        -355.0 / 33.0,
        46732.0 / 5247.0,
        49.0 / 176.0,
        -5103.0 / 18656.0,
        0.0,
    ],
    // Row 6 (FSAL): identical to the 5th-order weights
    [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
];

/// Weights for the 5th-order solution (b_i)
///
/// y_{n+1} = y_n + h * sum_{i=0}^{6} b[i] * k_i
pub const B: [f64; STAGES] = [
    35.0 / 384.0,     // b[0]
    0.0,              // b[1]
    500.0 / 1113.0,   // b[2]
    125.0 / 192.0,    // b[3]
    -2187.0 / 6784.0, // b[4]
    11.0 / 84.0,      // b[5]
    0.0,              // b[6]
];

/// Weights for the embedded 4th-order solution (b_hat_i)
///
/// y*_{n+1} = y_n + h * sum_{i=0}^{6} b_hat[i] * k_i
pub const B_HAT: [f64; STAGES] = [
    5179.0 / 57600.0,    // b_hat[0]
    0.0,                 // b_hat[1]
    7571.0 / 16695.0,    // b_hat[2]
    393.0 / 640.0,       // b_hat[3]
    -92097.0 / 339200.0, // b_hat[4]
    187.0 / 2100.0,      // b_hat[5]
    1.0 / 40.0,          // b_hat[6]
];

/// Error weights: B[i] - B_HAT[i]
///
/// The local truncation error estimate is:
/// err ≈ h * sum_{i=0}^{6} (b[i] - b_hat[i]) * k_i
pub const B_ERR: [f64; STAGES] = [
    71.0 / 57600.0,      // b[0] - b_hat[0]
    0.0,                 // b[1] - b_hat[1]
    -71.0 / 16695.0,     // b[2] - b_hat[2]
    71.0 / 1920.0,       // b[3] - b_hat[3]
    -17253.0 / 339200.0, // b[4] - b_hat[4]
    22.0 / 525.0,        // b[5] - b_hat[5]
    -1.0 / 40.0,         // b[6] - b_hat[6]
];

#[cfg(test)]
mod tests {
    use super::*;

    // Summation of ~7 f64 terms with some cancellation accumulates
    // a few ulps of roundoff
    const TOL: f64 = 1e-14;

    #[test]
    fn test_row_sum_condition() {
        // sum_j(a_{i,j}) = c_i for every stage
        for i in 0..STAGES {
            let row_sum: f64 = A[i].iter().sum();
            let expected = C[i];
            assert!(
                (row_sum - expected).abs() < TOL,
                "Row {} sum = {}, expected c[{}] = {}",
                i,
                row_sum,
                i,
                expected
            );
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        let b_sum: f64 = B.iter().sum();
        assert!(
            (b_sum - 1.0).abs() < TOL,
            "5th order weights sum to {}, expected 1.0",
            b_sum
        );

        let b_hat_sum: f64 = B_HAT.iter().sum();
        assert!(
            (b_hat_sum - 1.0).abs() < TOL,
            "4th order weights sum to {}, expected 1.0",
            b_hat_sum
        );
    }

    #[test]
    fn test_error_weights_sum_to_zero() {
        let err_sum: f64 = B_ERR.iter().sum();
        assert!(
            err_sum.abs() < TOL,
            "Error weights sum to {}, expected 0.0",
            err_sum
        );
    }

    #[test]
    fn test_error_weights_match_pair_difference() {
        for i in 0..STAGES {
            assert!(
                (B_ERR[i] - (B[i] - B_HAT[i])).abs() < TOL,
                "B_ERR[{}] = {} does not equal B[{}] - B_HAT[{}] = {}",
                i,
                B_ERR[i],
                i,
                i,
                B[i] - B_HAT[i]
            );
        }
    }

    #[test]
    fn test_fsal_row_equals_weights() {
        // The last stage must be evaluated at the 5th-order solution
        for j in 0..6 {
            assert!(
                (A[6][j] - B[j]).abs() < TOL,
                "A[6][{}] = {} should equal B[{}] = {}",
                j,
                A[6][j],
                j,
                B[j]
            );
        }
        assert_eq!(C[6], 1.0);
    }

    #[test]
    fn test_specific_coefficients() {
        // Spot-check values against Dormand & Prince Table 2
        assert!((C[1] - 0.2).abs() < TOL);
        assert!((C[4] - 8.0 / 9.0).abs() < TOL);

        assert!((A[3][0] - 44.0 / 45.0).abs() < TOL);
        assert!((A[4][1] + 25360.0 / 2187.0).abs() < TOL);

        assert!((B[0] - 35.0 / 384.0).abs() < TOL);
        assert!((B[2] - 500.0 / 1113.0).abs() < TOL);
        assert!((B_HAT[6] - 0.025).abs() < TOL);
    }
}
