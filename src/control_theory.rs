//! This module contains common control-theoretic functions or computations.

use ndarray::{s, Array1, Array2, ArrayView1};
use ndarray_linalg::Inverse;

use crate::error::{check_dim, PlanResult};

/// Create a block diagonal matrix.
///
/// # Examples
/// ```
/// use ndarray::array;
/// use multi_ilqr::control_theory::block_diag;
///
/// let out = block_diag(&[array![[1., 2.]], array![[3.], [4.]]]);
/// assert_eq!(out, array![[1., 2., 0.], [0., 0., 3.], [0., 0., 4.]]);
/// ```
pub fn block_diag(blocks: &[Array2<f64>]) -> Array2<f64> {
    let total_rows = blocks.iter().map(|v| v.nrows()).sum();
    let total_cols = blocks.iter().map(|v| v.ncols()).sum();

    let mut out_arr = Array2::zeros((total_rows, total_cols));

    let mut row_start = 0;
    let mut col_start = 0;
    for block in blocks {
        let row_end = row_start + block.nrows();
        let col_end = col_start + block.ncols();
        out_arr
            .slice_mut(s![row_start..row_end, col_start..col_end])
            .assign(block);
        row_start = row_end;
        col_start = col_end;
    }
    out_arr
}

/// Solve the finite-horizon, discrete-time LQR problem by backward Riccati
/// recursion.
///
/// For $x_{k+1} = A x_k + B u_k$ and cost
/// $\sum_{k=0}^{N-1} (x_k^\text{T} Q x_k + u_k^\text{T} R u_k) + x_N^\text{T} Q_f x_N$,
/// the optimal policy is $u_k = -K_k x_k$ with
/// $$
///     K_k = (R + B^\text{T} P_{k+1} B)^{-1} B^\text{T} P_{k+1} A
/// $$
/// $$
///     P_k = Q + A^\text{T} P_{k+1} (A - B K_k), \quad P_N = Q_f.
/// $$
/// Returns the gains $K_0, \dots, K_{N-1}$ in time order.
///
/// # Examples
/// ```
/// use ndarray::array;
/// use multi_ilqr::control_theory::lqr_finite_horizon;
///
/// // Scalar integrator with no state cost along the way.
/// let gains = lqr_finite_horizon(
///     &array![[1.]], &array![[1.]], &array![[0.]], &array![[1.]], &array![[1.]], 1,
/// )
/// .unwrap();
/// assert!((gains[0][(0, 0)] - 0.5).abs() < 1e-12);
/// ```
pub fn lqr_finite_horizon(
    a_mat: &Array2<f64>,
    b_mat: &Array2<f64>,
    q_mat: &Array2<f64>,
    r_mat: &Array2<f64>,
    qf_mat: &Array2<f64>,
    horizon: usize,
) -> PlanResult<Vec<Array2<f64>>> {
    check_dim("B rows", a_mat.nrows(), b_mat.nrows())?;
    check_dim("Q size", a_mat.nrows(), q_mat.nrows())?;
    check_dim("Qf size", a_mat.nrows(), qf_mat.nrows())?;
    check_dim("R size", b_mat.ncols(), r_mat.nrows())?;

    let mut p_mat = qf_mat.clone();
    let mut gains = Vec::with_capacity(horizon);
    for _k in 0..horizon {
        let b_t_p = b_mat.t().dot(&p_mat);
        let k_mat = (r_mat + &b_t_p.dot(b_mat)).inv()?.dot(&b_t_p).dot(a_mat);
        p_mat = q_mat + &a_mat.t().dot(&p_mat).dot(&(a_mat - &b_mat.dot(&k_mat)));
        gains.push(k_mat);
    }
    gains.reverse();
    Ok(gains)
}

/// Simulate $x_{k+1} = A x_k + B u_k$ under the time-varying policy
/// $u_k = -K_k (x_k - x_{ref})$, returning states and inputs one per row.
pub fn lqr_rollout(
    a_mat: &Array2<f64>,
    b_mat: &Array2<f64>,
    gains: &[Array2<f64>],
    x0: ArrayView1<f64>,
    x_ref: ArrayView1<f64>,
) -> (Array2<f64>, Array2<f64>) {
    let mut states = Array2::zeros((gains.len() + 1, x0.len()));
    let mut inputs = Array2::zeros((gains.len(), b_mat.ncols()));
    states.row_mut(0).assign(&x0);
    for (k, k_mat) in gains.iter().enumerate() {
        let error: Array1<f64> = &states.row(k) - &x_ref;
        let u = -k_mat.dot(&error);
        let x_next = a_mat.dot(&states.row(k)) + b_mat.dot(&u);
        inputs.row_mut(k).assign(&u);
        states.row_mut(k + 1).assign(&x_next);
    }
    (states, inputs)
}
