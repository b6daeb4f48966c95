//! Iterative linear-quadratic regulator (iLQR) over a joint multi-agent
//! problem.
//!
//! Each iteration linearizes the dynamics and expands the cost about the
//! nominal trajectory, runs a Riccati-like backward recursion for feedback
//! and feedforward gains, then rolls the gains forward with a halving line
//! search. Only strictly improving rollouts are accepted, so the nominal
//! cost never increases and every nominal trajectory is an exact forward
//! simulation of the dynamics.
//!
//! Agents on an exactly head-on course get no sideways gradient from the
//! proximity penalty and would converge to passing through each other.
//! When a solve is about to converge with a pair still inside the avoidance
//! radius, it therefore tries one step from
//! [`GameCost::expand_sidestep`](crate::cost::GameCost::expand_sidestep)
//! and keeps it only if the true cost drops.

use std::time::{Duration, Instant};

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use ndarray_linalg::InverseC;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    dynamics::DynamicalModel,
    error::{check_dim, PlanError, PlanResult},
    problem::Problem,
    trajectory::Trajectory,
};

/// Tuning of a single solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Iteration cap; reaching it ends the solve without failure.
    pub max_iters: usize,
    /// Relative cost improvement below which the solve has converged.
    pub tol: f64,
    /// Initial control-Hessian regularization.
    pub mu_init: f64,
    pub mu_min: f64,
    /// Regularization beyond which the solve is declared divergent.
    pub mu_max: f64,
    /// Growth factor of the regularization schedule.
    pub delta_0: f64,
    /// Step-size halvings tried per line search.
    pub max_halvings: usize,
    /// Wall-clock budget for one solve, in seconds.
    pub time_limit_secs: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            max_iters: 100,
            tol: 1e-4,
            mu_init: 0.0,
            mu_min: 1e-6,
            mu_max: 1e10,
            delta_0: 2.0,
            max_halvings: 10,
            time_limit_secs: None,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> PlanResult<()> {
        if !(self.tol > 0.0) {
            return Err(PlanError::Config(format!("tol must be positive, got {}", self.tol)));
        }
        if self.delta_0 <= 1.0 {
            return Err(PlanError::Config(format!("delta_0 must exceed 1, got {}", self.delta_0)));
        }
        if !(self.mu_min > 0.0 && self.mu_min < self.mu_max) || self.mu_init < 0.0 {
            return Err(PlanError::Config(format!(
                "need 0 <= mu_init and 0 < mu_min < mu_max, got {} / {} / {}",
                self.mu_init, self.mu_min, self.mu_max
            )));
        }
        if let Some(limit) = self.time_limit_secs {
            if !(limit > 0.0) {
                return Err(PlanError::Config(format!("time limit must be positive, got {limit}")));
            }
        }
        Ok(())
    }
}

/// Why a solve stopped without a usable improvement path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DivergenceCause {
    /// The control Hessian stayed indefinite at maximum regularization.
    NonPositiveDefiniteHessian,
    /// No step size improved the cost at maximum regularization.
    LineSearchExhausted,
    /// Gains, states or costs became NaN or infinite.
    NonFinite,
}

impl DivergenceCause {
    /// The error describing this cause, for callers that escalate.
    pub fn to_error(self, mu: f64, halvings: usize) -> PlanError {
        match self {
            DivergenceCause::NonPositiveDefiniteHessian => PlanError::NonPositiveDefiniteHessian { mu },
            DivergenceCause::LineSearchExhausted => PlanError::LineSearchExhausted { halvings },
            DivergenceCause::NonFinite => PlanError::NonFiniteValue("solver iterate"),
        }
    }
}

/// How a solve ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Converged,
    /// Iteration cap reached; the result is usable.
    IterationLimit,
    /// Wall-clock budget exhausted; the result is usable.
    TimedOut,
    Diverged(DivergenceCause),
}

impl SolveStatus {
    pub fn is_diverged(&self) -> bool {
        matches!(self, SolveStatus::Diverged(_))
    }
}

/// Outcome of one solve.
///
/// The trajectory is the last accepted nominal one, which is always finite
/// and always consistent with the dynamics, also when the solve diverged.
#[derive(Clone, Debug)]
pub struct SolveResult {
    pub trajectory: Trajectory,
    pub cost: f64,
    pub status: SolveStatus,
    pub iterations: usize,
    /// Nominal cost before the first iteration and after every accepted one.
    pub cost_history: Vec<f64>,
    /// Regularization in effect when the solve stopped.
    pub mu: f64,
}

/// Time-varying affine policy $u_k = \bar{u}_k + \alpha\, d_k + K_k (x_k - \bar{x}_k)$.
struct Gains {
    feedforward: Array2<f64>,
    feedback: Vec<Array2<f64>>,
    /// First and second order terms of the predicted cost change for a
    /// full step.
    expected: (f64, f64),
}

impl Gains {
    fn is_finite(&self) -> bool {
        self.feedforward.iter().all(|v| v.is_finite())
            && self.feedback.iter().all(|k| k.iter().all(|v| v.is_finite()))
    }
}

/// Solver for one [`Problem`].
///
/// All iteration state lives inside [`IlqrSolver::solve`], so a solver can
/// be shared and reused freely.
#[derive(Clone, Debug)]
pub struct IlqrSolver<'a> {
    problem: &'a Problem,
    config: SolverConfig,
}

impl<'a> IlqrSolver<'a> {
    pub fn new(problem: &'a Problem, config: SolverConfig) -> Self {
        IlqrSolver { problem, config }
    }

    pub fn problem(&self) -> &Problem {
        self.problem
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Optimize a `horizon` step trajectory from `x0`.
    ///
    /// `initial_controls` (one joint control per row) seeds the solve; by
    /// default every agent holds its nominal input.
    pub fn solve(
        &self,
        x0: ArrayView1<f64>,
        horizon: usize,
        initial_controls: Option<ArrayView2<f64>>,
    ) -> PlanResult<SolveResult> {
        let problem = self.problem;
        let layout = problem.layout();
        let config = &self.config;
        config.validate()?;
        check_dim("initial joint state", layout.n_state(), x0.len())?;
        if horizon == 0 {
            return Err(PlanError::Config("horizon must be at least one step".into()));
        }

        let mut controls = match initial_controls {
            Some(guess) => {
                check_dim("initial control steps", horizon, guess.nrows())?;
                check_dim("joint control", layout.n_control(), guess.ncols())?;
                guess.to_owned()
            }
            None => {
                let nominal = problem.dynamics().nominal_control();
                Array2::from_shape_fn((horizon, layout.n_control()), |(_, j)| nominal[j])
            }
        };
        let mut states = problem.dynamics().rollout(x0, controls.view())?;
        let mut cost = problem.trajectory_cost(states.view(), controls.view())?;
        if !cost.is_finite() || states.iter().any(|v| !v.is_finite()) {
            return Err(PlanError::NonFiniteValue("initial rollout"));
        }

        let start = Instant::now();
        let time_limit = config.time_limit_secs.map(Duration::from_secs_f64);
        let mut mu = config.mu_init;
        let mut delta = 1.0;
        let mut cost_history = vec![cost];
        let mut status = SolveStatus::IterationLimit;
        let mut iterations = 0;
        let mut sidestep = false;
        let mut sidestepped = false;

        'iterations: while iterations < config.max_iters {
            if time_limit.map_or(false, |limit| start.elapsed() > limit) {
                status = SolveStatus::TimedOut;
                break;
            }
            iterations += 1;

            let gains = loop {
                match self.backward_pass(states.view(), controls.view(), mu, sidestep) {
                    Ok(gains) => break gains,
                    Err(PlanError::NonPositiveDefiniteHessian { .. }) => {
                        increase_mu(&mut mu, &mut delta, config);
                        if mu > config.mu_max {
                            warn!(mu, "control Hessian not positive definite at maximum regularization");
                            status = SolveStatus::Diverged(DivergenceCause::NonPositiveDefiniteHessian);
                            break 'iterations;
                        }
                        debug!(mu, "regularizing backward pass");
                    }
                    Err(err) => return Err(err),
                }
            };
            if !gains.is_finite() {
                warn!(iterations, "non-finite gains");
                status = SolveStatus::Diverged(DivergenceCause::NonFinite);
                break;
            }
            let (dv1, dv2) = gains.expected;
            if !sidestep && -dv1 <= f64::EPSILON.sqrt() * (1.0 + cost.abs()) {
                if self.wants_sidestep(&mut sidestepped, states.view()) {
                    sidestep = true;
                    continue;
                }
                debug!(iterations, cost, "predicted improvement negligible");
                status = SolveStatus::Converged;
                break;
            }

            let mut alpha = 1.0;
            let mut accepted = None;
            let mut any_finite = false;
            for _ in 0..=config.max_halvings {
                let (new_states, new_controls) = self.forward_pass(x0, states.view(), controls.view(), &gains, alpha)?;
                let new_cost = problem.trajectory_cost(new_states.view(), new_controls.view())?;
                if new_cost.is_finite() {
                    any_finite = true;
                    if new_cost < cost {
                        accepted = Some((new_states, new_controls, new_cost));
                        break;
                    }
                }
                alpha *= 0.5;
            }

            let was_sidestep = std::mem::replace(&mut sidestep, false);
            match accepted {
                Some((new_states, new_controls, new_cost)) => {
                    let improvement = (cost - new_cost) / cost.abs().max(f64::MIN_POSITIVE);
                    debug!(
                        iterations,
                        cost = new_cost,
                        alpha,
                        mu,
                        predicted = -(alpha * dv1 + alpha * alpha * dv2),
                        "accepted step"
                    );
                    states = new_states;
                    controls = new_controls;
                    cost = new_cost;
                    cost_history.push(cost);
                    decrease_mu(&mut mu, &mut delta, config);
                    if was_sidestep {
                        debug!(iterations, cost, "sidestep accepted");
                    } else if improvement < config.tol {
                        if self.wants_sidestep(&mut sidestepped, states.view()) {
                            sidestep = true;
                            continue;
                        }
                        status = SolveStatus::Converged;
                        break;
                    }
                }
                None if was_sidestep => debug!(iterations, "sidestep rejected"),
                None if !any_finite => {
                    warn!(iterations, "every line-search rollout was non-finite");
                    status = SolveStatus::Diverged(DivergenceCause::NonFinite);
                    break;
                }
                None => {
                    increase_mu(&mut mu, &mut delta, config);
                    if mu > config.mu_max {
                        warn!(iterations, mu, "line search exhausted at maximum regularization");
                        status = SolveStatus::Diverged(DivergenceCause::LineSearchExhausted);
                        break;
                    }
                    debug!(iterations, mu, "line search failed, regularizing");
                }
            }
        }

        debug!(?status, iterations, cost, "solve finished");
        Ok(SolveResult {
            trajectory: Trajectory::new(states, controls, layout.clone())?,
            cost,
            status,
            iterations,
            cost_history,
            mu,
        })
    }

    /// Try one sidestep before converging: once per solve, and only while
    /// some pair is inside the avoidance radius.
    fn wants_sidestep(&self, sidestepped: &mut bool, states: ArrayView2<f64>) -> bool {
        let problem = self.problem;
        if *sidestepped || !problem.cost().proximity().has_conflict(problem.layout(), states) {
            return false;
        }
        *sidestepped = true;
        true
    }

    /// Backward Riccati recursion about the nominal trajectory.
    fn backward_pass(
        &self,
        states: ArrayView2<f64>,
        controls: ArrayView2<f64>,
        mu: f64,
        sidestep: bool,
    ) -> PlanResult<Gains> {
        let problem = self.problem;
        let layout = problem.layout();
        let cost = problem.cost();
        let dynamics = problem.dynamics();
        let horizon = controls.nrows();
        let n_u = layout.n_control();
        let expand = |x: ArrayView1<f64>, u: ArrayView1<f64>, terminal: bool| {
            if sidestep {
                cost.expand_sidestep(layout, x, u, terminal)
            } else {
                cost.expand(layout, x, u, terminal)
            }
        };

        let u_none = Array1::zeros(n_u);
        let terminal = expand(states.row(horizon), u_none.view(), true)?;
        let mut v_x = terminal.l_x;
        let mut v_xx = terminal.l_xx;

        let mut feedforward = Array2::zeros((horizon, n_u));
        let mut feedback = vec![Array2::zeros((n_u, layout.n_state())); horizon];
        let mut expected = (0.0, 0.0);
        let regularizer = Array2::<f64>::eye(n_u) * mu;

        for k in (0..horizon).rev() {
            let (x, u) = (states.row(k), controls.row(k));
            let (a_mat, b_mat) = dynamics.linearize(x, u)?;
            let exp = expand(x, u, false)?;

            let q_x = exp.l_x + a_mat.t().dot(&v_x);
            let q_u = exp.l_u + b_mat.t().dot(&v_x);
            let v_xx_a = v_xx.dot(&a_mat);
            let q_xx = exp.l_xx + a_mat.t().dot(&v_xx_a);
            let q_ux = exp.l_ux + b_mat.t().dot(&v_xx_a);
            let q_uu = exp.l_uu + b_mat.t().dot(&v_xx.dot(&b_mat));

            let q_uu_inv = (&q_uu + &regularizer)
                .invc()
                .map_err(|_| PlanError::NonPositiveDefiniteHessian { mu })?;
            let d = -q_uu_inv.dot(&q_u);
            let big_k = -q_uu_inv.dot(&q_ux);

            expected.0 += d.dot(&q_u);
            expected.1 += 0.5 * d.dot(&q_uu.dot(&d));

            let k_t_q_uu = big_k.t().dot(&q_uu);
            v_x = q_x + k_t_q_uu.dot(&d) + big_k.t().dot(&q_u) + q_ux.t().dot(&d);
            let v_xx_raw = q_xx + k_t_q_uu.dot(&big_k) + big_k.t().dot(&q_ux) + q_ux.t().dot(&big_k);
            v_xx = (&v_xx_raw + &v_xx_raw.t()) * 0.5;

            feedforward.row_mut(k).assign(&d);
            feedback[k] = big_k;
        }

        Ok(Gains {
            feedforward,
            feedback,
            expected,
        })
    }

    /// Roll the policy forward from `x0` with step size `alpha`.
    fn forward_pass(
        &self,
        x0: ArrayView1<f64>,
        states: ArrayView2<f64>,
        controls: ArrayView2<f64>,
        gains: &Gains,
        alpha: f64,
    ) -> PlanResult<(Array2<f64>, Array2<f64>)> {
        let dynamics = self.problem.dynamics();
        let mut new_states = Array2::zeros(states.raw_dim());
        let mut new_controls = Array2::zeros(controls.raw_dim());
        new_states.row_mut(0).assign(&x0);
        for k in 0..controls.nrows() {
            let dx = &new_states.row(k) - &states.row(k);
            let u = &controls.row(k) + &(&gains.feedforward.row(k) * alpha) + gains.feedback[k].dot(&dx);
            let x_next = dynamics.step(new_states.row(k), u.view())?;
            new_controls.row_mut(k).assign(&u);
            new_states.row_mut(k + 1).assign(&x_next);
        }
        Ok((new_states, new_controls))
    }
}

fn increase_mu(mu: &mut f64, delta: &mut f64, config: &SolverConfig) {
    *delta = (*delta * config.delta_0).max(config.delta_0);
    *mu = (*mu * *delta).max(config.mu_min);
}

fn decrease_mu(mu: &mut f64, delta: &mut f64, config: &SolverConfig) {
    *delta = (*delta / config.delta_0).min(1.0 / config.delta_0);
    *mu *= *delta;
    if *mu < config.mu_min {
        *mu = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{array, s};

    use super::*;
    use crate::{
        composite::CompositeModel,
        config::{ModelKind, PlannerConfig},
        control_theory::{lqr_finite_horizon, lqr_rollout},
        cost::{GameCost, ProximityCost, ReferenceCost},
        dynamics::{AgentModel, Dynamics},
        integrator::Integration,
        mas::AgentId,
        problem::tests::point_mass_problem,
    };

    #[test]
    fn test_single_agent_matches_lqr() {
        let goal = array![1., -2., 0.5, 0., 0., 0.];
        let problem = point_mass_problem(&[(AgentId(100), goal.clone())], 0.5, 0.1);
        let x0 = array![0., 0., 0., 0.3, 0., -0.2];
        let result = IlqrSolver::new(&problem, SolverConfig::default())
            .solve(x0.view(), 50, None)
            .unwrap();
        assert_eq!(result.status, SolveStatus::Converged);

        let agent = problem.dynamics().agent(AgentId(100)).unwrap();
        let (a_mat, b_mat) = agent.linearize(x0.view(), array![0., 0., 0.].view()).unwrap();
        let gains = lqr_finite_horizon(
            &a_mat,
            &b_mat,
            &Array2::from_diag(&array![10., 10., 10., 1., 1., 1.]),
            &Array2::eye(3),
            &(Array2::eye(6) * 1000.),
            50,
        )
        .unwrap();
        let (lqr_states, lqr_controls) = lqr_rollout(&a_mat, &b_mat, &gains, x0.view(), goal.view());

        assert!(result.trajectory.states().abs_diff_eq(&lqr_states, 1e-6));
        assert!(result.trajectory.controls().abs_diff_eq(&lqr_controls, 1e-6));
    }

    #[test]
    fn test_head_on_swap_keeps_separation() {
        let config = PlannerConfig {
            model: ModelKind::PointMass,
            ..PlannerConfig::default()
        };
        let problem = config
            .build_problem(&[
                (AgentId(0), array![1.5, 0., 1., 0., 0., 0.]),
                (AgentId(1), array![-1.5, 0., 1., 0., 0., 0.]),
            ])
            .unwrap();
        let x0 = array![-1.5, 0., 1., 0., 0., 0., 1.5, 0., 1., 0., 0., 0.];
        let result = IlqrSolver::new(&problem, config.rhc.solver.clone())
            .solve(x0.view(), config.rhc.horizon, None)
            .unwrap();
        assert_eq!(result.status, SolveStatus::Converged);

        let traj = &result.trajectory;
        let min_distance = traj.min_pairwise_distance(3).unwrap();
        assert!(min_distance >= config.radius, "min distance {min_distance}");
        // The detour leaves the line between the starts.
        assert!(traj.states().column(1).iter().any(|y| y.abs() > 0.1));

        for (id, d) in problem.distances_to_goal(traj.final_state()).unwrap() {
            assert!(d < 0.1, "{id} ended {d} from its goal");
        }
        for pair in result.cost_history.windows(2) {
            assert!(pair[1] < pair[0]);
        }
    }

    #[test]
    fn test_offset_swap_keeps_separation() {
        let config = PlannerConfig {
            model: ModelKind::PointMass,
            ..PlannerConfig::default()
        };
        let problem = config
            .build_problem(&[
                (AgentId(0), array![1., 1., 1., 0., 0., 0.]),
                (AgentId(1), array![-1., -1., 1., 0., 0., 0.]),
            ])
            .unwrap();
        let x0 = array![-1., -1., 1., 0., 0., 0., 1., 1., 1., 0., 0., 0.];
        let result = IlqrSolver::new(&problem, config.rhc.solver.clone())
            .solve(x0.view(), 60, None)
            .unwrap();
        assert!(!result.status.is_diverged(), "{:?}", result.status);
        let min_distance = result.trajectory.min_pairwise_distance(3).unwrap();
        assert!(min_distance >= config.radius, "min distance {min_distance}");
    }

    #[test]
    fn test_cost_never_increases() {
        let problem = point_mass_problem(
            &[
                (AgentId(0), array![2., 0., 0., 0., 0., 0.]),
                (AgentId(1), array![0., 2., 0., 0., 0., 0.]),
                (AgentId(2), array![1., 1., 0.3, 0., 0., 0.]),
            ],
            0.8,
            0.1,
        );
        let x0 = array![0., 0., 0., 0., 0., 0., 2., 2., 0., 0., 0., 0., 1., 0.9, 0., 0., 0., 0.];
        let result = IlqrSolver::new(&problem, SolverConfig::default())
            .solve(x0.view(), 40, None)
            .unwrap();
        assert!(result.cost_history.len() >= 2);
        for pair in result.cost_history.windows(2) {
            assert!(pair[1] <= pair[0], "{} then {}", pair[0], pair[1]);
        }
        assert_eq!(result.cost, *result.cost_history.last().unwrap());
    }

    #[test]
    fn test_result_satisfies_dynamics() {
        let problem = point_mass_problem(
            &[
                (AgentId(0), array![1., 0., 0., 0., 0., 0.]),
                (AgentId(1), array![-1., 0., 0., 0., 0., 0.]),
            ],
            0.5,
            0.1,
        );
        let x0 = array![-1., 0.1, 0., 0., 0., 0., 1., -0.1, 0., 0., 0., 0.];
        let result = IlqrSolver::new(&problem, SolverConfig::default())
            .solve(x0.view(), 30, None)
            .unwrap();
        let traj = &result.trajectory;
        let replay = problem.dynamics().rollout(x0.view(), traj.controls()).unwrap();
        assert_eq!(replay, traj.states());
        let cost = problem.trajectory_cost(traj.states(), traj.controls()).unwrap();
        assert!((cost - result.cost).abs() <= 1e-9 * cost.abs());
    }

    /// Rate that blows up as soon as it is linearized; the step itself is a
    /// harmless single integrator.
    struct UnstableLinearization;

    impl Dynamics for UnstableLinearization {
        fn dynamics(&self, _x: ArrayView1<f64>, u: ArrayView1<f64>) -> Array1<f64> {
            u.to_owned()
        }

        fn jacobians(&self, _x: ArrayView1<f64>, _u: ArrayView1<f64>) -> (Array2<f64>, Array2<f64>) {
            (Array2::eye(2) * 1e200, Array2::eye(2))
        }

        fn n_state(&self) -> usize {
            2
        }

        fn n_input(&self) -> usize {
            2
        }

        fn n_position(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_unstable_linearization_reports_divergence() {
        let dynamics = CompositeModel::new(vec![AgentModel::new(
            AgentId(9),
            UnstableLinearization,
            0.1,
            Integration::Euler,
        )])
        .unwrap();
        let cost = GameCost::new(
            vec![ReferenceCost::new(AgentId(9), array![1., 1.], Array2::eye(2), Array2::eye(2), Array2::eye(2)).unwrap()],
            ProximityCost::new(0.5, 2),
        )
        .unwrap();
        let problem = Problem::new(dynamics, cost).unwrap();
        let result = IlqrSolver::new(&problem, SolverConfig::default())
            .solve(array![0., 0.].view(), 20, None)
            .unwrap();
        assert!(result.status.is_diverged(), "{:?}", result.status);
        assert!(result.trajectory.is_finite());
        assert!(result.cost.is_finite());
    }

    /// Single integrator driven through a cube, so the input has no
    /// first-order effect near zero.
    struct CubicInput;

    impl Dynamics for CubicInput {
        fn dynamics(&self, _x: ArrayView1<f64>, u: ArrayView1<f64>) -> Array1<f64> {
            u.mapv(|v| v.powi(3))
        }

        fn jacobians(&self, _x: ArrayView1<f64>, u: ArrayView1<f64>) -> (Array2<f64>, Array2<f64>) {
            (Array2::zeros((1, 1)), Array2::from_diag(&u.mapv(|v| 3.0 * v * v)))
        }

        fn n_state(&self) -> usize {
            1
        }

        fn n_input(&self) -> usize {
            1
        }

        fn n_position(&self) -> usize {
            1
        }
    }

    #[test]
    fn test_indefinite_control_hessian_is_regularized() {
        let dynamics = CompositeModel::new(vec![AgentModel::new(AgentId(0), CubicInput, 0.1, Integration::Euler)]).unwrap();
        // A negative input weight; bounded because the state cost grows with
        // the sixth power of the input.
        let reference = ReferenceCost::new_unchecked(AgentId(0), array![1.], array![[1.]], array![[-0.02]], array![[10.]]);
        let cost = GameCost::new(vec![reference], ProximityCost::new(0.5, 1)).unwrap();
        let problem = Problem::new(dynamics, cost).unwrap();
        let guess = Array2::from_elem((20, 1), 0.5);

        // The first backward pass needs regularization to go through.
        let config = SolverConfig {
            max_iters: 1,
            ..SolverConfig::default()
        };
        let first = IlqrSolver::new(&problem, config)
            .solve(Array1::zeros(1).view(), 20, Some(guess.view()))
            .unwrap();
        assert_eq!(first.status, SolveStatus::IterationLimit);
        assert_eq!(first.cost_history.len(), 2);
        assert!(first.mu > 0.0);

        let result = IlqrSolver::new(&problem, SolverConfig::default())
            .solve(Array1::zeros(1).view(), 20, Some(guess.view()))
            .unwrap();
        assert_eq!(result.status, SolveStatus::Converged);
        assert!(result.mu > 0.0);
        assert!(result.cost < 0.1 * result.cost_history[0]);
        assert!((result.trajectory.final_state()[0] - 1.).abs() < 0.05);
    }

    #[test]
    fn test_time_budget_is_soft() {
        let problem = point_mass_problem(
            &[
                (AgentId(0), array![1.5, 0., 1., 0., 0., 0.]),
                (AgentId(1), array![-1.5, 0., 1., 0., 0., 0.]),
                (AgentId(2), array![0., 1.5, 1., 0., 0., 0.]),
                (AgentId(3), array![0., -1.5, 1., 0., 0., 0.]),
            ],
            0.5,
            0.1,
        );
        let x0 = array![
            -1.5, 0., 1., 0., 0., 0., 1.5, 0., 1., 0., 0., 0., 0., -1.5, 1., 0., 0., 0., 0., 1.5, 1., 0., 0., 0.
        ];
        let config = SolverConfig {
            time_limit_secs: Some(1e-9),
            ..SolverConfig::default()
        };
        let result = IlqrSolver::new(&problem, config).solve(x0.view(), 80, None).unwrap();
        assert_eq!(result.status, SolveStatus::TimedOut);
        assert!(result.iterations <= 1);
        assert!(result.trajectory.is_finite());
        assert_eq!(result.trajectory.horizon(), 80);
        let replay = problem.dynamics().rollout(x0.view(), result.trajectory.controls()).unwrap();
        assert_eq!(replay, result.trajectory.states());
        assert!(result.cost <= result.cost_history[0]);
    }

    #[test]
    fn test_iteration_cap_is_soft() {
        let problem = point_mass_problem(&[(AgentId(0), array![1., 1., 1., 0., 0., 0.])], 0.5, 0.1);
        let config = SolverConfig {
            max_iters: 0,
            ..SolverConfig::default()
        };
        let result = IlqrSolver::new(&problem, config).solve(Array1::zeros(6).view(), 10, None).unwrap();
        assert_eq!(result.status, SolveStatus::IterationLimit);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.cost_history.len(), 1);
    }

    #[test]
    fn test_warm_start_and_bad_inputs() {
        let problem = point_mass_problem(&[(AgentId(0), array![1., 0., 0., 0., 0., 0.])], 0.5, 0.1);
        let solver = IlqrSolver::new(&problem, SolverConfig::default());
        let x0 = Array1::zeros(6);
        let first = solver.solve(x0.view(), 20, None).unwrap();
        let warm = solver.solve(x0.view(), 20, Some(first.trajectory.controls())).unwrap();
        assert!(warm.cost <= first.cost + 1e-9);
        assert!(warm.iterations <= 1);

        assert!(matches!(
            solver.solve(Array1::zeros(5).view(), 20, None),
            Err(PlanError::InvalidDimension { .. })
        ));
        assert!(solver.solve(x0.view(), 20, Some(Array2::zeros((19, 3)).view())).is_err());
        assert!(solver.solve(x0.view(), 0, None).is_err());
        let nan_guess = Array2::from_elem((20, 3), f64::NAN);
        assert!(matches!(
            solver.solve(x0.view(), 20, Some(nan_guess.view())),
            Err(PlanError::NonFiniteValue(_))
        ));
    }

    #[test]
    fn test_config_validation() {
        assert!(SolverConfig::default().validate().is_ok());
        let bad = SolverConfig {
            delta_0: 1.0,
            ..SolverConfig::default()
        };
        assert!(bad.validate().is_err());
        let bad = SolverConfig {
            time_limit_secs: Some(0.0),
            ..SolverConfig::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_agent_trajectory_extraction() {
        let problem = point_mass_problem(
            &[
                (AgentId(3), array![0., 5., 0., 0., 0., 0.]),
                (AgentId(4), array![5., 0., 0., 0., 0., 0.]),
            ],
            0.5,
            0.1,
        );
        let x0 = Array1::zeros(12);
        let result = IlqrSolver::new(&problem, SolverConfig::default())
            .solve(x0.view(), 10, None)
            .unwrap();
        let states = result.trajectory.agent_states(AgentId(4)).unwrap();
        assert_eq!(states, result.trajectory.states().slice(s![.., 6..12]));
    }
}
