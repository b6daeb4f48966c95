//! Receding-horizon control of a team on top of [`IlqrSolver`].
//!
//! Every cycle re-solves the horizon from the current joint state, commits
//! the leading `step_size` steps and warm-starts the next cycle from the
//! remaining controls. Large teams are split into overlapping groups (see
//! [`crate::graphs`]) that are solved independently and merged back by
//! agent id.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::{check_dim, PlanError, PlanResult},
    graphs::{interaction_graph, Group, Partition},
    mas::AgentId,
    problem::Problem,
    solver::{IlqrSolver, SolveStatus, SolverConfig},
    trajectory::{AgentCommand, Trajectory},
};

/// How the team is split for solving.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decomposition {
    /// Always one joint solve over every agent.
    Centralized,
    /// Overlapping groups of at most `n_d` agents once the team is larger
    /// than `n_d`.
    #[default]
    Decentralized,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RhcConfig {
    /// Steps planned per solve.
    pub horizon: usize,
    /// Leading steps committed per cycle.
    pub step_size: usize,
    /// Largest group solved jointly.
    pub n_d: usize,
    pub decomposition: Decomposition,
    /// Distance at which two agents are coupled into one group. Defaults to
    /// twice the radius of the proximity penalty.
    pub coupling_radius: Option<f64>,
    /// Every agent within this distance of its goal ends the run.
    pub dist_converge: f64,
    /// Simulated seconds without progress toward the goals before giving up.
    pub t_diverge: f64,
    /// Consecutive cycles with a diverged group tolerated before the run is
    /// declared fatal.
    pub max_divergences: usize,
    pub max_cycles: usize,
    pub solver: SolverConfig,
}

impl Default for RhcConfig {
    fn default() -> Self {
        RhcConfig {
            horizon: 50,
            step_size: 2,
            n_d: 3,
            decomposition: Decomposition::default(),
            coupling_radius: None,
            dist_converge: 0.1,
            t_diverge: 5.0,
            max_divergences: 3,
            max_cycles: 500,
            solver: SolverConfig::default(),
        }
    }
}

impl RhcConfig {
    pub fn validate(&self) -> PlanResult<()> {
        if self.horizon == 0 || self.step_size == 0 || self.step_size > self.horizon {
            return Err(PlanError::Config(format!(
                "need 0 < step_size <= horizon, got {} and {}",
                self.step_size, self.horizon
            )));
        }
        if self.n_d == 0 {
            return Err(PlanError::Config("n_d must be at least one".into()));
        }
        if self.max_cycles == 0 {
            return Err(PlanError::Config("max_cycles must be at least one".into()));
        }
        if !(self.dist_converge > 0.0) || !(self.t_diverge > 0.0) {
            return Err(PlanError::Config(format!(
                "dist_converge and t_diverge must be positive, got {} and {}",
                self.dist_converge, self.t_diverge
            )));
        }
        if let Some(radius) = self.coupling_radius {
            if !(radius > 0.0) {
                return Err(PlanError::Config(format!("coupling radius must be positive, got {radius}")));
            }
        }
        self.solver.validate()
    }
}

/// State of a receding-horizon run after a cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RhcStatus {
    InProgress,
    /// Every agent is within `dist_converge` of its goal.
    Converged,
    /// No progress toward the goals for `t_diverge` simulated seconds.
    Diverged,
    /// Solves kept diverging for more than `max_divergences` cycles.
    Fatal,
    /// Stopped through a [`StopHandle`].
    Stopped,
}

impl RhcStatus {
    pub fn is_terminal(&self) -> bool {
        *self != RhcStatus::InProgress
    }
}

/// Cooperative stop signal, checked between cycles.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Result of one control cycle.
#[derive(Clone, Debug)]
pub struct CycleOutput {
    /// The leading `step_size` steps of the plan.
    pub committed: Trajectory,
    /// The full merged plan of this cycle.
    pub plan: Trajectory,
    pub commands: Vec<AgentCommand>,
    pub status: RhcStatus,
    /// Cost of the full merged plan under the whole team's cost.
    pub cost: f64,
    pub groups: usize,
    /// Groups whose solve diverged and that fell back to their warm start.
    pub diverged_groups: Vec<Vec<AgentId>>,
}

/// Result of a closed-loop [`RecedingHorizonController::run`].
#[derive(Clone, Debug)]
pub struct RhcOutcome {
    pub status: RhcStatus,
    /// Executed joint states, one per row, starting with the initial state.
    pub states: Array2<f64>,
    pub controls: Array2<f64>,
    /// Cost of the executed history.
    pub cost: f64,
    pub cycles: usize,
}

struct GroupPlan {
    trajectory: Trajectory,
    status: SolveStatus,
}

/// Receding-horizon controller for one team.
pub struct RecedingHorizonController {
    problem: Problem,
    config: RhcConfig,
    previous: Option<Trajectory>,
    consecutive_divergences: usize,
    elapsed: f64,
    best_distance: f64,
    last_improvement: f64,
    stop: StopHandle,
}

impl RecedingHorizonController {
    pub fn new(problem: Problem, config: RhcConfig) -> PlanResult<Self> {
        config.validate()?;
        Ok(RecedingHorizonController {
            problem,
            config,
            previous: None,
            consecutive_divergences: 0,
            elapsed: 0.0,
            best_distance: f64::INFINITY,
            last_improvement: 0.0,
            stop: StopHandle::default(),
        })
    }

    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    pub fn config(&self) -> &RhcConfig {
        &self.config
    }

    /// Simulated time committed so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// A handle that stops [`RecedingHorizonController::run`] before its
    /// next cycle.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn coupling_radius(&self) -> f64 {
        self.config
            .coupling_radius
            .unwrap_or(2.0 * self.problem.cost().proximity().radius())
    }

    /// Move one agent's goal. Progress tracking restarts.
    pub fn set_goal(&mut self, id: AgentId, goal: Array1<f64>) -> PlanResult<()> {
        self.problem
            .cost_mut()
            .reference_mut(id)
            .ok_or(PlanError::UnknownAgent(id))?
            .set_goal(goal)?;
        self.best_distance = f64::INFINITY;
        self.last_improvement = self.elapsed;
        Ok(())
    }

    /// Forget the previous plan and all progress tracking.
    pub fn reset(&mut self) {
        self.previous = None;
        self.consecutive_divergences = 0;
        self.elapsed = 0.0;
        self.best_distance = f64::INFINITY;
        self.last_improvement = 0.0;
    }

    /// Groups to solve from joint state `x`, using the previous plan's
    /// prediction when there is one.
    pub fn partition(&self, x: ArrayView1<f64>) -> PlanResult<Partition> {
        let layout = self.problem.layout();
        check_dim("joint state", layout.n_state(), x.len())?;
        let ids = layout.ids();
        if self.config.decomposition == Decomposition::Centralized || ids.len() <= self.config.n_d {
            return Ok(Partition::centralized(&ids));
        }

        let step_size = self.config.step_size;
        let predicted = self
            .previous
            .as_ref()
            .map_or(0, |prev| prev.states().nrows().saturating_sub(step_size));
        let mut states = Array2::zeros((1 + predicted, layout.n_state()));
        states.row_mut(0).assign(&x);
        if let Some(prev) = &self.previous {
            states
                .slice_mut(s![1.., ..])
                .assign(&prev.states().slice(s![step_size.., ..]));
        }

        let graph = interaction_graph(
            layout,
            states.view(),
            self.problem.cost().proximity().n_position(),
            self.coupling_radius(),
        );
        Ok(Partition::decentralized(&graph, self.config.n_d))
    }

    /// Plan from joint state `x` and commit the leading steps.
    pub fn plan_cycle(&mut self, x: ArrayView1<f64>) -> PlanResult<CycleOutput> {
        let layout = self.problem.layout().clone();
        check_dim("joint state", layout.n_state(), x.len())?;
        let horizon = self.config.horizon;
        let step_size = self.config.step_size;

        let nominal = self.problem.dynamics().nominal_control();
        let warm = match &self.previous {
            Some(prev) => prev.shifted_controls(step_size, nominal.view())?,
            None => Array2::from_shape_fn((horizon, layout.n_control()), |(_, j)| nominal[j]),
        };

        let partition = self.partition(x)?;
        let plans = self.solve_groups(&partition, x, warm.view())?;

        let mut states = Array2::zeros((horizon + 1, layout.n_state()));
        let mut controls = Array2::zeros((horizon, layout.n_control()));
        let mut diverged_groups = Vec::new();
        for (group, plan) in partition.groups().iter().zip(&plans) {
            if plan.status.is_diverged() {
                diverged_groups.push(group.members.clone());
            }
            for &ego in &group.egos {
                let target = layout.require(ego)?;
                states
                    .slice_mut(s![.., target.state.clone()])
                    .assign(&plan.trajectory.agent_states(ego)?);
                controls
                    .slice_mut(s![.., target.control.clone()])
                    .assign(&plan.trajectory.agent_controls(ego)?);
            }
        }
        let cost = self.problem.trajectory_cost(states.view(), controls.view())?;
        let plan = Trajectory::new(states, controls, layout)?;
        let committed = plan.head(step_size)?;
        let commands = committed.commands(self.problem.dynamics())?;

        if diverged_groups.is_empty() {
            self.consecutive_divergences = 0;
        } else {
            self.consecutive_divergences += 1;
            warn!(
                groups = ?diverged_groups,
                consecutive = self.consecutive_divergences,
                "solve diverged, keeping warm start"
            );
        }
        self.elapsed += step_size as f64 * self.problem.dt();

        let max_distance = self
            .problem
            .distances_to_goal(committed.final_state())?
            .into_iter()
            .map(|(_, d)| d)
            .fold(0.0, f64::max);
        if max_distance < self.best_distance {
            self.best_distance = max_distance;
            self.last_improvement = self.elapsed;
        }

        let status = if self.consecutive_divergences > self.config.max_divergences {
            RhcStatus::Fatal
        } else if max_distance <= self.config.dist_converge {
            RhcStatus::Converged
        } else if self.elapsed - self.last_improvement > self.config.t_diverge {
            RhcStatus::Diverged
        } else {
            RhcStatus::InProgress
        };
        debug!(
            elapsed = self.elapsed,
            cost,
            max_distance,
            groups = partition.len(),
            ?status,
            "cycle planned"
        );

        self.previous = Some(plan.clone());
        Ok(CycleOutput {
            committed,
            plan,
            commands,
            status,
            cost,
            groups: partition.len(),
            diverged_groups,
        })
    }

    /// Closed-loop simulation from `x0`, applying each committed segment as
    /// predicted by the model.
    pub fn run(&mut self, x0: ArrayView1<f64>) -> PlanResult<RhcOutcome> {
        let layout = self.problem.layout().clone();
        check_dim("initial joint state", layout.n_state(), x0.len())?;
        let mut state_rows = vec![x0.to_owned()];
        let mut control_rows: Vec<Array1<f64>> = Vec::new();
        let mut status = RhcStatus::InProgress;
        let mut cycles = 0;

        while cycles < self.config.max_cycles {
            if self.stop.is_stopped() {
                status = RhcStatus::Stopped;
                break;
            }
            let x = state_rows[state_rows.len() - 1].clone();
            let out = self.plan_cycle(x.view())?;
            cycles += 1;
            state_rows.extend(out.committed.states().rows().into_iter().skip(1).map(|r| r.to_owned()));
            control_rows.extend(out.committed.controls().rows().into_iter().map(|r| r.to_owned()));
            info!(cycle = cycles, elapsed = self.elapsed, cost = out.cost, status = ?out.status, "cycle committed");
            if out.status.is_terminal() {
                status = out.status;
                break;
            }
        }

        let states = Array2::from_shape_fn((state_rows.len(), layout.n_state()), |(k, j)| state_rows[k][j]);
        let controls = Array2::from_shape_fn((control_rows.len(), layout.n_control()), |(k, j)| control_rows[k][j]);
        let cost = self.problem.trajectory_cost(states.view(), controls.view())?;
        info!(?status, cycles, cost, "receding-horizon run finished");
        Ok(RhcOutcome {
            status,
            states,
            controls,
            cost,
            cycles,
        })
    }

    fn solve_groups(&self, partition: &Partition, x: ArrayView1<f64>, warm: ArrayView2<f64>) -> PlanResult<Vec<GroupPlan>> {
        #[cfg(not(feature = "parallel"))]
        {
            partition
                .groups()
                .iter()
                .map(|group| self.solve_group(group, x, warm))
                .collect()
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            partition
                .groups()
                .par_iter()
                .map(|group| self.solve_group(group, x, warm))
                .collect()
        }
    }

    fn solve_group(&self, group: &Group, x: ArrayView1<f64>, warm: ArrayView2<f64>) -> PlanResult<GroupPlan> {
        let layout = self.problem.layout();
        let sub = self.problem.subproblem(&group.members)?;
        let x_sub = layout.select_state(x, sub.layout())?;
        let u_sub = layout.select_control_columns(warm, sub.layout())?;

        let result = IlqrSolver::new(&sub, self.config.solver.clone()).solve(
            x_sub.view(),
            self.config.horizon,
            Some(u_sub.view()),
        )?;
        if !result.status.is_diverged() {
            return Ok(GroupPlan {
                trajectory: result.trajectory,
                status: result.status,
            });
        }

        if let SolveStatus::Diverged(cause) = result.status {
            debug!(
                members = ?group.members,
                error = %cause.to_error(result.mu, self.config.solver.max_halvings),
                "group diverged, rolling out its warm start"
            );
        }
        let states = sub.dynamics().rollout(x_sub.view(), u_sub.view())?;
        Ok(GroupPlan {
            trajectory: Trajectory::new(states, u_sub, sub.layout().clone())?,
            status: result.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{
        composite::CompositeModel,
        cost::{GameCost, ProximityCost, ReferenceCost},
        dynamics::{AgentModel, Dynamics, LtiDynamics},
        integrator::Integration,
        problem::tests::point_mass_problem,
    };

    fn config(horizon: usize, decomposition: Decomposition) -> RhcConfig {
        RhcConfig {
            horizon,
            step_size: 2,
            n_d: 2,
            decomposition,
            max_cycles: 100,
            ..RhcConfig::default()
        }
    }

    fn spread_team() -> (Problem, Array1<f64>) {
        let goals: Vec<_> = (0..4)
            .map(|i| (AgentId(i), array![10. * i as f64 + 1., 0., 1., 0., 0., 0.]))
            .collect();
        let problem = point_mass_problem(&goals, 0.5, 0.1);
        let mut x0 = Array1::zeros(24);
        for i in 0..4 {
            x0[6 * i] = 10. * i as f64;
            x0[6 * i + 2] = 1.;
        }
        (problem, x0)
    }

    #[test]
    fn test_centralized_run_converges() {
        let problem = point_mass_problem(
            &[
                (AgentId(0), array![1., 0., 1., 0., 0., 0.]),
                (AgentId(1), array![5., 6., 1., 0., 0., 0.]),
            ],
            0.5,
            0.1,
        );
        let x0 = array![0., 0., 1., 0., 0., 0., 5., 5., 1., 0., 0., 0.];
        let mut rhc = RecedingHorizonController::new(problem, config(20, Decomposition::Centralized)).unwrap();
        let outcome = rhc.run(x0.view()).unwrap();

        assert_eq!(outcome.status, RhcStatus::Converged);
        assert_eq!(outcome.states.nrows(), 2 * outcome.cycles + 1);
        assert_eq!(outcome.controls.nrows(), 2 * outcome.cycles);
        assert_eq!(outcome.states.row(0), x0);
        let last = outcome.states.row(outcome.states.nrows() - 1);
        for (_, d) in rhc.problem().distances_to_goal(last).unwrap() {
            assert!(d <= 0.1);
        }
    }

    #[test]
    fn test_decentralized_matches_centralized_when_apart() {
        let (problem, x0) = spread_team();
        let mut central = RecedingHorizonController::new(problem.clone(), config(20, Decomposition::Centralized)).unwrap();
        let mut split = RecedingHorizonController::new(problem, config(20, Decomposition::Decentralized)).unwrap();

        let a = central.plan_cycle(x0.view()).unwrap();
        let b = split.plan_cycle(x0.view()).unwrap();
        assert_eq!(a.groups, 1);
        assert_eq!(b.groups, 4);
        assert!(a.plan.states().abs_diff_eq(&b.plan.states(), 1e-6));
        assert!(a.plan.controls().abs_diff_eq(&b.plan.controls(), 1e-6));
        assert!((a.cost - b.cost).abs() <= 1e-6 * a.cost);
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_parallel_groups_match_centralized() {
        let goals: Vec<_> = (0..8)
            .map(|i| (AgentId(i), array![10. * i as f64 + 1., 1., 1., 0., 0., 0.]))
            .collect();
        let problem = point_mass_problem(&goals, 0.5, 0.1);
        let mut x0 = Array1::zeros(48);
        for i in 0..8 {
            x0[6 * i] = 10. * i as f64;
            x0[6 * i + 2] = 1.;
        }
        let mut central = RecedingHorizonController::new(problem.clone(), config(20, Decomposition::Centralized)).unwrap();
        let mut split = RecedingHorizonController::new(problem, config(20, Decomposition::Decentralized)).unwrap();

        for _ in 0..3 {
            let a = central.plan_cycle(x0.view()).unwrap();
            let b = split.plan_cycle(x0.view()).unwrap();
            assert_eq!(b.groups, 8);
            assert!(b.diverged_groups.is_empty());
            for id in (0..8).map(AgentId) {
                let (sa, sb) = (a.plan.agent_states(id).unwrap(), b.plan.agent_states(id).unwrap());
                assert!(sa.abs_diff_eq(&sb, 1e-6), "{id} differs");
            }
            x0 = b.committed.final_state().to_owned();
        }
    }

    #[test]
    fn test_partition_follows_proximity() {
        let (problem, mut x0) = spread_team();
        // Bring agent 3 next to agent 2.
        x0[18] = 20.6;
        let rhc = RecedingHorizonController::new(problem, config(20, Decomposition::Decentralized)).unwrap();
        assert_eq!(rhc.coupling_radius(), 1.0);
        let partition = rhc.partition(x0.view()).unwrap();
        assert_eq!(partition.len(), 3);
        assert_eq!(
            partition.ego_group(AgentId(3)).unwrap().members,
            vec![AgentId(2), AgentId(3)]
        );
        assert_eq!(partition.ego_group(AgentId(0)).unwrap().members, vec![AgentId(0)]);
    }

    #[test]
    fn test_cycle_commits_leading_steps() {
        let (problem, x0) = spread_team();
        let mut rhc = RecedingHorizonController::new(problem, config(20, Decomposition::Decentralized)).unwrap();
        let out = rhc.plan_cycle(x0.view()).unwrap();
        assert_eq!(out.plan.horizon(), 20);
        assert_eq!(out.committed.horizon(), 2);
        assert_eq!(out.commands.len(), 2 * 4);
        assert_eq!(out.committed.state(2), out.plan.state(2));
        assert_eq!(out.status, RhcStatus::InProgress);
        assert!(out.diverged_groups.is_empty());
        assert!((rhc.elapsed() - 0.2).abs() < 1e-12);

        // The next cycle warm-starts from the shifted plan.
        let next = rhc.plan_cycle(out.committed.final_state()).unwrap();
        assert!(next.cost < out.cost);
        assert!(rhc.plan_cycle(Array1::zeros(5).view()).is_err());

        rhc.reset();
        assert_eq!(rhc.elapsed(), 0.0);
    }

    #[test]
    fn test_stop_before_first_cycle() {
        let (problem, x0) = spread_team();
        let mut rhc = RecedingHorizonController::new(problem, config(20, Decomposition::Decentralized)).unwrap();
        rhc.stop_handle().stop();
        let outcome = rhc.run(x0.view()).unwrap();
        assert_eq!(outcome.status, RhcStatus::Stopped);
        assert_eq!(outcome.cycles, 0);
        assert_eq!(outcome.states.nrows(), 1);
    }

    /// Single integrator whose reported linearization is wildly unstable.
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

    fn single_agent_problem<D: Dynamics + 'static>(dynamics: D, n_x: usize, n_u: usize, n_position: usize) -> Problem {
        let model = CompositeModel::new(vec![AgentModel::new(AgentId(0), dynamics, 0.1, Integration::Euler)]).unwrap();
        let cost = GameCost::new(
            vec![ReferenceCost::new(
                AgentId(0),
                Array1::from_elem(n_x, 5.),
                Array2::eye(n_x),
                Array2::eye(n_u),
                Array2::eye(n_x),
            )
            .unwrap()],
            ProximityCost::new(0.5, n_position),
        )
        .unwrap();
        Problem::new(model, cost).unwrap()
    }

    #[test]
    fn test_repeated_divergence_is_fatal() {
        let problem = single_agent_problem(UnstableLinearization, 2, 2, 2);
        let config = RhcConfig {
            horizon: 10,
            max_divergences: 1,
            ..RhcConfig::default()
        };
        let mut rhc = RecedingHorizonController::new(problem, config).unwrap();
        let first = rhc.plan_cycle(array![0., 0.].view()).unwrap();
        assert_eq!(first.status, RhcStatus::InProgress);
        assert_eq!(first.diverged_groups, vec![vec![AgentId(0)]]);
        assert!(first.plan.is_finite());

        let outcome = rhc.run(first.committed.final_state()).unwrap();
        assert_eq!(outcome.status, RhcStatus::Fatal);
        assert_eq!(outcome.cycles, 1);
    }

    #[test]
    fn test_no_progress_times_out() {
        // Nothing the controller does moves the agent.
        let stuck = LtiDynamics::new(Array2::zeros((2, 2)), Array2::zeros((2, 1)));
        let problem = single_agent_problem(stuck, 2, 1, 1);
        let config = RhcConfig {
            horizon: 10,
            t_diverge: 0.9,
            ..RhcConfig::default()
        };
        let mut rhc = RecedingHorizonController::new(problem, config).unwrap();
        let outcome = rhc.run(array![0., 0.].view()).unwrap();
        assert_eq!(outcome.status, RhcStatus::Diverged);
        // Progress is recorded on the first cycle, then 0.2 s per cycle.
        assert_eq!(outcome.cycles, 6);
    }

    #[test]
    fn test_set_goal_and_validation() {
        let (problem, _) = spread_team();
        let mut rhc = RecedingHorizonController::new(problem.clone(), RhcConfig::default()).unwrap();
        assert!(rhc.set_goal(AgentId(2), Array1::zeros(6)).is_ok());
        assert!(matches!(
            rhc.set_goal(AgentId(9), Array1::zeros(6)),
            Err(PlanError::UnknownAgent(AgentId(9)))
        ));

        let bad = RhcConfig {
            step_size: 60,
            ..RhcConfig::default()
        };
        assert!(RecedingHorizonController::new(problem.clone(), bad).is_err());
        let bad = RhcConfig {
            coupling_radius: Some(-1.),
            ..RhcConfig::default()
        };
        assert!(RecedingHorizonController::new(problem, bad).is_err());
    }
}
