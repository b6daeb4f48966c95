//! Define integrators for dynamic systems. E.g., Euler, RK4.
//!
//! Besides advancing the state, every integrator returns the exact Jacobian
//! of its own discrete step, which is what the trajectory optimizer needs in
//! its backward pass.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::dynamics::Dynamics;

/// Define the interface for integrating dynamics.
pub trait Integrator {
    /// Integrate the dynamics for one step of length `dt` from `x0`, holding
    /// the input `u` constant over the step.
    fn step<D: Dynamics + ?Sized>(dt: f64, x0: ArrayView1<f64>, u: ArrayView1<f64>, dynamics: &D) -> Array1<f64>;

    /// The Jacobians $(A, B)$ of [`Integrator::step`] with respect to `x0`
    /// and `u`.
    fn linearize<D: Dynamics + ?Sized>(
        dt: f64,
        x0: ArrayView1<f64>,
        u: ArrayView1<f64>,
        dynamics: &D,
    ) -> (Array2<f64>, Array2<f64>);

    /// Simulate the dynamics over a sequence of inputs, one per row of
    /// `inputs`, starting at initial state `x0`.
    ///
    /// The default implementation iteratively applies the `step` method and
    /// collects the results one state per row, so the output has one more
    /// row than `inputs`.
    fn simulate<D: Dynamics + ?Sized>(dt: f64, x0: ArrayView1<f64>, inputs: ArrayView2<f64>, dynamics: &D) -> Array2<f64> {
        let mut history = Array2::zeros((inputs.nrows() + 1, x0.len()));
        history.row_mut(0).assign(&x0);
        for (i, u) in inputs.rows().into_iter().enumerate() {
            let x_next = Self::step(dt, history.row(i), u, dynamics);
            history.row_mut(i + 1).assign(&x_next);
        }
        history
    }
}

/// Implement Euler integration
///
/// I.e.,
/// $x_1 = x_0 + h f(x_0, u)$, where $h$ is the time step.
pub struct EulerIntegration;

impl Integrator for EulerIntegration {
    fn step<D: Dynamics + ?Sized>(dt: f64, x0: ArrayView1<f64>, u: ArrayView1<f64>, dynamics: &D) -> Array1<f64> {
        &x0 + &(dynamics.dynamics(x0, u) * dt)
    }

    fn linearize<D: Dynamics + ?Sized>(
        dt: f64,
        x0: ArrayView1<f64>,
        u: ArrayView1<f64>,
        dynamics: &D,
    ) -> (Array2<f64>, Array2<f64>) {
        let (f_x, f_u) = dynamics.jacobians(x0, u);
        (Array2::eye(x0.len()) + f_x * dt, f_u * dt)
    }
}

/// Implement the classic Runge-Kutta Order 4 integrator
///
/// I.e.,
/// $$
///     x_1 = x_0 + h / 6 (k_1 + 2k_2 + 2k_3 + k_4)
/// $$
/// $$
///     k_1 = f(x_0, u), \quad k_2 = f(x_0 + k_1 h / 2, u)
/// $$
/// $$
///     k_3 = f(x_0 + k_2 h / 2, u), \quad k_4 = f(x_0 + k_3 h, u)
/// $$
/// where $h$ is the time step and $u$ is held over the step.
pub struct RK4;

impl Integrator for RK4 {
    fn step<D: Dynamics + ?Sized>(dt: f64, x0: ArrayView1<f64>, u: ArrayView1<f64>, dynamics: &D) -> Array1<f64> {
        let t_half = dt * 0.5;
        let k1 = dynamics.dynamics(x0, u);
        let x_mid_1 = &x0 + &(&k1 * t_half);
        let k2 = dynamics.dynamics(x_mid_1.view(), u);
        let x_mid_2 = &x0 + &(&k2 * t_half);
        let k3 = dynamics.dynamics(x_mid_2.view(), u);
        let x_end_pre = &x0 + &(&k3 * dt);
        let k4 = dynamics.dynamics(x_end_pre.view(), u);
        &x0 + &((k1 + k2 * 2.0 + k3 * 2.0 + k4) * (dt / 6.0))
    }

    /// Differentiates each stage by the chain rule, e.g.
    /// $\partial k_2 / \partial x_0 = F(x_{mid,1}) (I + \tfrac{h}{2} \partial k_1 / \partial x_0)$.
    fn linearize<D: Dynamics + ?Sized>(
        dt: f64,
        x0: ArrayView1<f64>,
        u: ArrayView1<f64>,
        dynamics: &D,
    ) -> (Array2<f64>, Array2<f64>) {
        let n = x0.len();
        let t_half = dt * 0.5;
        let eye: Array2<f64> = Array2::eye(n);

        let k1 = dynamics.dynamics(x0, u);
        let (f1, g1) = dynamics.jacobians(x0, u);
        let (k1_x, k1_u) = (f1, g1);

        let x_mid_1 = &x0 + &(&k1 * t_half);
        let k2 = dynamics.dynamics(x_mid_1.view(), u);
        let (f2, g2) = dynamics.jacobians(x_mid_1.view(), u);
        let k2_x = f2.dot(&(&eye + &(&k1_x * t_half)));
        let k2_u = f2.dot(&(&k1_u * t_half)) + g2;

        let x_mid_2 = &x0 + &(&k2 * t_half);
        let (f3, g3) = dynamics.jacobians(x_mid_2.view(), u);
        let k3 = dynamics.dynamics(x_mid_2.view(), u);
        let k3_x = f3.dot(&(&eye + &(&k2_x * t_half)));
        let k3_u = f3.dot(&(&k2_u * t_half)) + g3;

        let x_end_pre = &x0 + &(&k3 * dt);
        let (f4, g4) = dynamics.jacobians(x_end_pre.view(), u);
        let k4_x = f4.dot(&(&eye + &(&k3_x * dt)));
        let k4_u = f4.dot(&(&k3_u * dt)) + g4;

        let a_mat = &eye + &((k1_x + k2_x * 2.0 + k3_x * 2.0 + k4_x) * (dt / 6.0));
        let b_mat = (k1_u + k2_u * 2.0 + k3_u * 2.0 + k4_u) * (dt / 6.0);
        (a_mat, b_mat)
    }
}

/// Runtime choice of discretization for an agent model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integration {
    #[default]
    Euler,
    Rk4,
}

impl Integration {
    pub fn step<D: Dynamics + ?Sized>(self, dt: f64, x0: ArrayView1<f64>, u: ArrayView1<f64>, dynamics: &D) -> Array1<f64> {
        match self {
            Integration::Euler => EulerIntegration::step(dt, x0, u, dynamics),
            Integration::Rk4 => RK4::step(dt, x0, u, dynamics),
        }
    }

    pub fn linearize<D: Dynamics + ?Sized>(
        self,
        dt: f64,
        x0: ArrayView1<f64>,
        u: ArrayView1<f64>,
        dynamics: &D,
    ) -> (Array2<f64>, Array2<f64>) {
        match self {
            Integration::Euler => EulerIntegration::linearize(dt, x0, u, dynamics),
            Integration::Rk4 => RK4::linearize(dt, x0, u, dynamics),
        }
    }
}
