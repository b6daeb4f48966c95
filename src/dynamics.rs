//! Define the per-agent dynamics.
//!
//! Agents are described in continuous time through [`Dynamics`] and
//! discretized with an [`Integration`] scheme into an [`AgentModel`], which
//! implements the discrete-time [`DynamicalModel`] contract used by the
//! solver.

use std::{fmt, sync::Arc};

use ndarray::{s, Array1, Array2, ArrayView1};

use crate::{
    error::{check_dim, PlanResult},
    integrator::Integration,
    mas::AgentId,
};

/// Continuous-time dynamics of the form $\dot{x} = f(x, u)$.
///
/// Implementors also provide the Jacobians $F = \partial f / \partial x$ and
/// $G = \partial f / \partial u$, which the integrators chain together into
/// the exact Jacobian of the discrete step.
pub trait Dynamics: Send + Sync {
    /// Calculate the dynamics, i.e., $\dot{x} = f(x, u)$
    fn dynamics(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> Array1<f64>;
    /// The pair $(\partial f / \partial x, \partial f / \partial u)$ at $(x, u)$.
    fn jacobians(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> (Array2<f64>, Array2<f64>);
    /// Get the dimension of the state $x$.
    fn n_state(&self) -> usize;
    /// Get the dimension of the input $u$.
    fn n_input(&self) -> usize;
    /// Number of leading state entries that hold the agent's position.
    fn n_position(&self) -> usize;

    /// Input used to seed a solve when no guess is available.
    fn nominal_input(&self) -> Array1<f64> {
        Array1::zeros(self.n_input())
    }

    /// Rate of change of the position under zero input.
    fn velocity(&self, x: ArrayView1<f64>) -> Array1<f64> {
        let u = Array1::zeros(self.n_input());
        self.dynamics(x, u.view())
            .slice(s![..self.n_position()])
            .to_owned()
    }
}

/// Discrete-time model $x_{k+1} = f_d(x_k, u_k)$ with its local
/// linearization.
pub trait DynamicalModel {
    fn n_state(&self) -> usize;
    fn n_control(&self) -> usize;
    /// Time step between consecutive states.
    fn dt(&self) -> f64;
    /// Advance one time step. Deterministic in its inputs.
    fn step(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> PlanResult<Array1<f64>>;
    /// Jacobians $(A, B)$ of [`DynamicalModel::step`] with respect to state
    /// and control.
    fn linearize(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> PlanResult<(Array2<f64>, Array2<f64>)>;
}

/// One agent's continuous dynamics discretized with a fixed time step.
#[derive(Clone)]
pub struct AgentModel {
    id: AgentId,
    dynamics: Arc<dyn Dynamics>,
    dt: f64,
    integration: Integration,
}

impl AgentModel {
    pub fn new<D: Dynamics + 'static>(id: AgentId, dynamics: D, dt: f64, integration: Integration) -> Self {
        AgentModel::from_shared(id, Arc::new(dynamics), dt, integration)
    }

    /// Share one dynamics description between several agents.
    pub fn from_shared(id: AgentId, dynamics: Arc<dyn Dynamics>, dt: f64, integration: Integration) -> Self {
        AgentModel {
            id,
            dynamics,
            dt,
            integration,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn dynamics(&self) -> &dyn Dynamics {
        self.dynamics.as_ref()
    }

    pub fn integration(&self) -> Integration {
        self.integration
    }

    pub fn n_position(&self) -> usize {
        self.dynamics.n_position()
    }

    fn check(&self, x: &ArrayView1<f64>, u: &ArrayView1<f64>) -> PlanResult<()> {
        check_dim("agent state", self.dynamics.n_state(), x.len())?;
        check_dim("agent control", self.dynamics.n_input(), u.len())
    }
}

impl fmt::Debug for AgentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentModel")
            .field("id", &self.id)
            .field("n_state", &self.dynamics.n_state())
            .field("n_input", &self.dynamics.n_input())
            .field("dt", &self.dt)
            .field("integration", &self.integration)
            .finish()
    }
}

impl DynamicalModel for AgentModel {
    fn n_state(&self) -> usize {
        self.dynamics.n_state()
    }

    fn n_control(&self) -> usize {
        self.dynamics.n_input()
    }

    fn dt(&self) -> f64 {
        self.dt
    }

    fn step(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> PlanResult<Array1<f64>> {
        self.check(&x, &u)?;
        Ok(self.integration.step(self.dt, x, u, self.dynamics.as_ref()))
    }

    fn linearize(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> PlanResult<(Array2<f64>, Array2<f64>)> {
        self.check(&x, &u)?;
        Ok(self.integration.linearize(self.dt, x, u, self.dynamics.as_ref()))
    }
}

/// Implement linear, time-invariant (LTI) dynamics. I.e.,
/// $\dot{x} = A x + B u$.
///
/// Example
/// ```
/// use ndarray::array;
/// use multi_ilqr::dynamics::{Dynamics, LtiDynamics};
///
/// let dynamics = LtiDynamics::new(array![[0., 1.], [0., 0.]], array![[0.], [1.]]);
/// assert_eq!(dynamics.dynamics(array![1., 2.].view(), array![3.].view()), array![2., 3.]);
/// assert_eq!(dynamics.n_input(), 1);
/// assert_eq!(dynamics.n_state(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct LtiDynamics {
    a_mat: Array2<f64>,
    b_mat: Array2<f64>,
    n_position: usize,
}

impl LtiDynamics {
    /// Create an LTI system from an $A$ matrix (`a_mat`) and a $B$ matrix (`b_mat`)
    ///
    /// The first state is taken to be the (one dimensional) position.
    pub fn new(a_mat: Array2<f64>, b_mat: Array2<f64>) -> LtiDynamics {
        LtiDynamics {
            a_mat,
            b_mat,
            n_position: 1,
        }
    }

    /// A point mass in `dims` dimensions, with state $[p; v]$ and
    /// acceleration input.
    ///
    /// `double_integrator(3)` is the 6 state, 3 input point mass and
    /// `double_integrator(2)` the planar 4 state variant.
    pub fn double_integrator(dims: usize) -> LtiDynamics {
        let mut a_mat = Array2::zeros((2 * dims, 2 * dims));
        a_mat.slice_mut(s![..dims, dims..]).assign(&Array2::eye(dims));
        let mut b_mat = Array2::zeros((2 * dims, dims));
        b_mat.slice_mut(s![dims.., ..]).assign(&Array2::eye(dims));
        LtiDynamics {
            a_mat,
            b_mat,
            n_position: dims,
        }
    }

    pub fn a_mat(&self) -> &Array2<f64> {
        &self.a_mat
    }

    pub fn b_mat(&self) -> &Array2<f64> {
        &self.b_mat
    }
}

impl Dynamics for LtiDynamics {
    fn n_input(&self) -> usize {
        self.b_mat.ncols()
    }

    fn n_state(&self) -> usize {
        self.a_mat.ncols()
    }

    fn n_position(&self) -> usize {
        self.n_position
    }

    fn dynamics(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> Array1<f64> {
        self.a_mat.dot(&x) + self.b_mat.dot(&u)
    }

    fn jacobians(&self, _x: ArrayView1<f64>, _u: ArrayView1<f64>) -> (Array2<f64>, Array2<f64>) {
        (self.a_mat.clone(), self.b_mat.clone())
    }
}

/// Six-state quadcopter model under small-angle attitude control.
///
/// State $[p_x, p_y, p_z, v_x, v_y, v_z]$, input $[\theta, \phi, \tau]$
/// (pitch, roll, mass-normalized thrust):
/// $$ \dot{v} = [g \tan\theta, -g \tan\phi, \tau - g] $$
#[derive(Debug, Clone, Copy)]
pub struct Quadcopter6D {
    pub gravity: f64,
}

impl Default for Quadcopter6D {
    fn default() -> Self {
        Quadcopter6D { gravity: 9.81 }
    }
}

impl Dynamics for Quadcopter6D {
    fn n_state(&self) -> usize {
        6
    }

    fn n_input(&self) -> usize {
        3
    }

    fn n_position(&self) -> usize {
        3
    }

    fn nominal_input(&self) -> Array1<f64> {
        Array1::from(vec![0., 0., self.gravity])
    }

    fn dynamics(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> Array1<f64> {
        let g = self.gravity;
        Array1::from(vec![
            x[3],
            x[4],
            x[5],
            g * u[0].tan(),
            -g * u[1].tan(),
            u[2] - g,
        ])
    }

    fn jacobians(&self, _x: ArrayView1<f64>, u: ArrayView1<f64>) -> (Array2<f64>, Array2<f64>) {
        let g = self.gravity;
        let mut f_x = Array2::zeros((6, 6));
        f_x.slice_mut(s![..3, 3..]).assign(&Array2::eye(3));
        let mut f_u = Array2::zeros((6, 3));
        f_u[(3, 0)] = g / u[0].cos().powi(2);
        f_u[(4, 1)] = -g / u[1].cos().powi(2);
        f_u[(5, 2)] = 1.0;
        (f_x, f_u)
    }
}

/// Planar unicycle with state $[x, y, v, \psi]$ and input $[a, \omega]$.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unicycle4D;

impl Dynamics for Unicycle4D {
    fn n_state(&self) -> usize {
        4
    }

    fn n_input(&self) -> usize {
        2
    }

    fn n_position(&self) -> usize {
        2
    }

    fn dynamics(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> Array1<f64> {
        let (v, psi) = (x[2], x[3]);
        Array1::from(vec![v * psi.cos(), v * psi.sin(), u[0], u[1]])
    }

    fn jacobians(&self, x: ArrayView1<f64>, _u: ArrayView1<f64>) -> (Array2<f64>, Array2<f64>) {
        let (v, psi) = (x[2], x[3]);
        let mut f_x = Array2::zeros((4, 4));
        f_x[(0, 2)] = psi.cos();
        f_x[(0, 3)] = -v * psi.sin();
        f_x[(1, 2)] = psi.sin();
        f_x[(1, 3)] = v * psi.cos();
        let mut f_u = Array2::zeros((4, 2));
        f_u[(2, 0)] = 1.0;
        f_u[(3, 1)] = 1.0;
        (f_x, f_u)
    }
}
