//! Binding of a team's dynamics and cost into one optimization instance.

use std::{collections::BTreeSet, sync::Arc};

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::{
    composite::CompositeModel,
    cost::GameCost,
    dynamics::DynamicalModel,
    error::{check_dim, PlanError, PlanResult},
    mas::{position_distance, AgentId, AgentLayout},
};

/// A multi-agent trajectory optimization problem.
///
/// The dynamics and the cost must cover exactly the same agents; the agent
/// order, and therefore every joint-vector offset, is the dynamics' order.
#[derive(Clone, Debug)]
pub struct Problem {
    dynamics: CompositeModel,
    cost: GameCost,
}

impl Problem {
    pub fn new(dynamics: CompositeModel, cost: GameCost) -> PlanResult<Self> {
        let layout = dynamics.layout().clone();
        let dyn_ids: BTreeSet<_> = layout.ids().into_iter().collect();
        let cost_ids: BTreeSet<_> = cost.ids().into_iter().collect();
        if dyn_ids != cost_ids || cost.ids().len() != layout.n_agents() {
            return Err(PlanError::AgentSetMismatch {
                dynamics: layout.ids(),
                cost: cost.ids(),
            });
        }

        let n_position = cost.proximity().n_position();
        for (agent, slice) in dynamics.agents().iter().zip(layout.slices()) {
            let reference = cost.reference(slice.id).ok_or(PlanError::UnknownAgent(slice.id))?;
            check_dim("goal state", slice.n_state(), reference.n_state())?;
            check_dim("R size", slice.n_control(), reference.n_control())?;
            if n_position > agent.n_position() {
                return Err(PlanError::InvalidDimension {
                    what: "proximity position subspace",
                    expected: agent.n_position(),
                    got: n_position,
                });
            }
        }

        // Keep the reference costs in dynamics order.
        let cost = cost.subset(&layout.ids())?;
        Ok(Problem { dynamics, cost })
    }

    pub fn dynamics(&self) -> &CompositeModel {
        &self.dynamics
    }

    pub fn cost(&self) -> &GameCost {
        &self.cost
    }

    /// Mutable access for retargeting goals between solves.
    pub fn cost_mut(&mut self) -> &mut GameCost {
        &mut self.cost
    }

    pub fn layout(&self) -> &Arc<AgentLayout> {
        self.dynamics.layout()
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.layout().ids()
    }

    pub fn n_agents(&self) -> usize {
        self.layout().n_agents()
    }

    pub fn dt(&self) -> f64 {
        self.dynamics.dt()
    }

    /// The problem restricted to `ids`, in the order given.
    pub fn subproblem(&self, ids: &[AgentId]) -> PlanResult<Problem> {
        Problem::new(self.dynamics.subset(ids)?, self.cost.subset(ids)?)
    }

    /// Total cost of a state/control history: the running cost of every
    /// step plus the terminal cost of the last state.
    pub fn trajectory_cost(&self, states: ArrayView2<f64>, controls: ArrayView2<f64>) -> PlanResult<f64> {
        check_dim("state history length", controls.nrows() + 1, states.nrows())?;
        let layout = self.layout();
        let mut total = 0.0;
        for (x, u) in states.rows().into_iter().zip(controls.rows()) {
            total += self.cost.evaluate(layout, x, u, false)?;
        }
        let u_none = Array1::zeros(layout.n_control());
        total += self
            .cost
            .evaluate(layout, states.row(controls.nrows()), u_none.view(), true)?;
        Ok(total)
    }

    /// Joint goal state in layout order.
    pub fn goal_state(&self) -> PlanResult<Array1<f64>> {
        self.cost.goal_state(self.layout())
    }

    /// Each agent's position distance to its goal.
    pub fn distances_to_goal(&self, x: ArrayView1<f64>) -> PlanResult<Vec<(AgentId, f64)>> {
        let layout = self.layout();
        check_dim("joint state", layout.n_state(), x.len())?;
        self.dynamics
            .agents()
            .iter()
            .map(|agent| -> PlanResult<(AgentId, f64)> {
                let x_i = layout.agent_state(x, agent.id())?;
                let reference = self.cost.reference(agent.id()).ok_or(PlanError::UnknownAgent(agent.id()))?;
                Ok((agent.id(), position_distance(x_i, reference.goal().view(), agent.n_position())))
            })
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use ndarray::{array, Array2};

    use super::*;
    use crate::{
        cost::{ProximityCost, ReferenceCost},
        dynamics::{AgentModel, LtiDynamics, Unicycle4D},
        integrator::Integration,
    };

    /// Point-mass team with the weights used throughout the tests.
    pub(crate) fn point_mass_problem(goals: &[(AgentId, Array1<f64>)], radius: f64, dt: f64) -> Problem {
        let models = goals
            .iter()
            .map(|(id, _)| AgentModel::new(*id, LtiDynamics::double_integrator(3), dt, Integration::Euler))
            .collect();
        let refs = goals
            .iter()
            .map(|(id, goal)| {
                ReferenceCost::new(
                    *id,
                    goal.clone(),
                    Array2::from_diag(&array![10., 10., 10., 1., 1., 1.]),
                    Array2::eye(3),
                    Array2::eye(6) * 1000.,
                )
                .unwrap()
            })
            .collect();
        Problem::new(
            CompositeModel::new(models).unwrap(),
            GameCost::new(refs, ProximityCost::new(radius, 3)).unwrap(),
        )
        .unwrap()
    }

    fn reference(id: u32, n: usize, m: usize) -> ReferenceCost {
        ReferenceCost::new(AgentId(id), Array1::zeros(n), Array2::eye(n), Array2::eye(m), Array2::eye(n)).unwrap()
    }

    #[test]
    fn test_agent_set_mismatch() {
        let dynamics = CompositeModel::new(vec![
            AgentModel::new(AgentId(1), Unicycle4D, 0.1, Integration::Euler),
            AgentModel::new(AgentId(2), Unicycle4D, 0.1, Integration::Euler),
        ])
        .unwrap();
        let cost = GameCost::new(vec![reference(1, 4, 2), reference(3, 4, 2)], ProximityCost::new(0.5, 2)).unwrap();
        assert!(matches!(
            Problem::new(dynamics, cost),
            Err(PlanError::AgentSetMismatch { .. })
        ));
    }

    #[test]
    fn test_cost_dimension_mismatch() {
        let dynamics =
            CompositeModel::new(vec![AgentModel::new(AgentId(1), Unicycle4D, 0.1, Integration::Euler)]).unwrap();
        let cost = GameCost::new(vec![reference(1, 6, 2)], ProximityCost::new(0.5, 2)).unwrap();
        assert!(matches!(
            Problem::new(dynamics.clone(), cost),
            Err(PlanError::InvalidDimension { .. })
        ));
        let cost = GameCost::new(vec![reference(1, 4, 2)], ProximityCost::new(0.5, 3)).unwrap();
        assert!(matches!(
            Problem::new(dynamics, cost),
            Err(PlanError::InvalidDimension { .. })
        ));
    }

    #[test]
    fn test_cost_reordered_to_dynamics_order() {
        let dynamics = CompositeModel::new(vec![
            AgentModel::new(AgentId(2), Unicycle4D, 0.1, Integration::Euler),
            AgentModel::new(AgentId(1), Unicycle4D, 0.1, Integration::Euler),
        ])
        .unwrap();
        let cost = GameCost::new(vec![reference(1, 4, 2), reference(2, 4, 2)], ProximityCost::new(0.5, 2)).unwrap();
        let problem = Problem::new(dynamics, cost).unwrap();
        assert_eq!(problem.cost().ids(), vec![AgentId(2), AgentId(1)]);
    }

    #[test]
    fn test_trajectory_cost_and_goal_distance() {
        let problem = point_mass_problem(&[(AgentId(7), array![1., 0., 0., 0., 0., 0.])], 0.5, 0.1);
        let states = Array2::zeros((3, 6));
        let controls = Array2::ones((2, 3));
        // Two running steps of 10 (position) + 3 (effort), terminal 1000.
        assert_eq!(problem.trajectory_cost(states.view(), controls.view()).unwrap(), 1026.);
        assert!(problem.trajectory_cost(states.view(), Array2::ones((3, 3)).view()).is_err());

        let distances = problem.distances_to_goal(array![0., 0., 0., 5., 5., 5.].view()).unwrap();
        assert_eq!(distances, vec![(AgentId(7), 1.0)]);
    }

    #[test]
    fn test_subproblem() {
        let problem = point_mass_problem(
            &[
                (AgentId(1), Array1::zeros(6)),
                (AgentId(2), Array1::ones(6)),
                (AgentId(3), Array1::zeros(6)),
            ],
            0.5,
            0.1,
        );
        let sub = problem.subproblem(&[AgentId(3), AgentId(2)]).unwrap();
        assert_eq!(sub.ids(), vec![AgentId(3), AgentId(2)]);
        assert_eq!(sub.goal_state().unwrap().sum(), 6.);
        assert_eq!(sub.layout().n_state(), 12);
    }
}
