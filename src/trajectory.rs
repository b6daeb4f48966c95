//! Immutable state and control histories produced by a solve.

use std::sync::Arc;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

use crate::{
    composite::CompositeModel,
    error::{check_dim, PlanError, PlanResult},
    mas::{pairwise_distances, AgentId, AgentLayout},
};

/// A joint trajectory over a horizon of $N$ steps: $N + 1$ states and $N$
/// controls, one per row, laid out by an [`AgentLayout`].
#[derive(Clone, Debug, PartialEq)]
pub struct Trajectory {
    states: Array2<f64>,
    controls: Array2<f64>,
    layout: Arc<AgentLayout>,
}

/// Position and velocity set-point for one agent at one step.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentCommand {
    pub agent: AgentId,
    /// Steps after the start of the committed segment.
    pub step: usize,
    pub position: Array1<f64>,
    pub velocity: Array1<f64>,
}

impl Trajectory {
    pub fn new(states: Array2<f64>, controls: Array2<f64>, layout: Arc<AgentLayout>) -> PlanResult<Self> {
        check_dim("state history length", controls.nrows() + 1, states.nrows())?;
        check_dim("joint state", layout.n_state(), states.ncols())?;
        check_dim("joint control", layout.n_control(), controls.ncols())?;
        Ok(Trajectory {
            states,
            controls,
            layout,
        })
    }

    /// Number of control steps.
    pub fn horizon(&self) -> usize {
        self.controls.nrows()
    }

    pub fn states(&self) -> ArrayView2<f64> {
        self.states.view()
    }

    pub fn controls(&self) -> ArrayView2<f64> {
        self.controls.view()
    }

    pub fn layout(&self) -> &Arc<AgentLayout> {
        &self.layout
    }

    pub fn state(&self, k: usize) -> ArrayView1<f64> {
        self.states.row(k)
    }

    pub fn control(&self, k: usize) -> ArrayView1<f64> {
        self.controls.row(k)
    }

    pub fn final_state(&self) -> ArrayView1<f64> {
        self.states.row(self.horizon())
    }

    pub fn is_finite(&self) -> bool {
        self.states.iter().chain(self.controls.iter()).all(|v| v.is_finite())
    }

    /// One agent's state history, one state per row.
    pub fn agent_states(&self, id: AgentId) -> PlanResult<ArrayView2<f64>> {
        let slice = self.layout.require(id)?;
        Ok(self.states.slice(s![.., slice.state.clone()]))
    }

    /// One agent's control history, one control per row.
    pub fn agent_controls(&self, id: AgentId) -> PlanResult<ArrayView2<f64>> {
        let slice = self.layout.require(id)?;
        Ok(self.controls.slice(s![.., slice.control.clone()]))
    }

    /// Smallest position distance between any two agents at any step.
    pub fn min_pairwise_distance(&self, n_position: usize) -> Option<f64> {
        self.states
            .rows()
            .into_iter()
            .flat_map(|x| pairwise_distances(&self.layout, x, n_position))
            .map(|(_, _, d)| d)
            .min_by(f64::total_cmp)
    }

    /// The leading `steps` steps: states `0..=steps`, controls `0..steps`.
    pub fn head(&self, steps: usize) -> PlanResult<Trajectory> {
        if steps > self.horizon() {
            return Err(PlanError::Config(format!(
                "cannot take {steps} steps of a {} step trajectory",
                self.horizon()
            )));
        }
        Trajectory::new(
            self.states.slice(s![..=steps, ..]).to_owned(),
            self.controls.slice(s![..steps, ..]).to_owned(),
            self.layout.clone(),
        )
    }

    /// Controls for warm-starting the next solve after committing `steps`
    /// steps: the remaining controls followed by `fill` repeated.
    pub fn shifted_controls(&self, steps: usize, fill: ArrayView1<f64>) -> PlanResult<Array2<f64>> {
        check_dim("joint control", self.layout.n_control(), fill.len())?;
        let n = self.horizon();
        let keep = n.saturating_sub(steps);
        let mut out = Array2::zeros((n, self.layout.n_control()));
        out.slice_mut(s![..keep, ..])
            .assign(&self.controls.slice(s![n - keep.., ..]));
        for mut row in out.rows_mut().into_iter().skip(keep) {
            row.assign(&fill);
        }
        Ok(out)
    }

    /// Per-agent position/velocity set-points for steps `1..=horizon`.
    pub fn commands(&self, dynamics: &CompositeModel) -> PlanResult<Vec<AgentCommand>> {
        let mut out = Vec::with_capacity(self.horizon() * self.layout.n_agents());
        for step in 1..=self.horizon() {
            for slice in self.layout.slices() {
                let agent = dynamics.agent(slice.id).ok_or(PlanError::UnknownAgent(slice.id))?;
                let x_i = self.states.slice(s![step, slice.state.clone()]);
                out.push(AgentCommand {
                    agent: slice.id,
                    step,
                    position: x_i.slice(s![..agent.n_position()]).to_owned(),
                    velocity: agent.dynamics().velocity(x_i),
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::{
        dynamics::{AgentModel, LtiDynamics},
        integrator::Integration,
    };

    fn pair() -> (CompositeModel, Trajectory) {
        let model = CompositeModel::new(vec![
            AgentModel::new(AgentId(1), LtiDynamics::double_integrator(2), 0.5, Integration::Euler),
            AgentModel::new(AgentId(2), LtiDynamics::double_integrator(2), 0.5, Integration::Euler),
        ])
        .unwrap();
        let x0 = array![0., 0., 0.5, 0., 3., 0., -0.5, 0.];
        let controls = Array2::zeros((4, 4));
        let states = model.rollout(x0.view(), controls.view()).unwrap();
        let traj = Trajectory::new(states, controls, model.layout().clone()).unwrap();
        (model, traj)
    }

    #[test]
    fn test_min_pairwise_distance() {
        let (_, traj) = pair();
        // Closing at 1 m/s from 3 m apart for 2 s.
        let d = traj.min_pairwise_distance(2).unwrap();
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_head_and_shift() {
        let (_, traj) = pair();
        let head = traj.head(2).unwrap();
        assert_eq!(head.horizon(), 2);
        assert_eq!(head.final_state(), traj.state(2));
        assert!(traj.head(5).is_err());

        let shifted = traj.shifted_controls(3, array![9., 9., 9., 9.].view()).unwrap();
        assert_eq!(shifted.nrows(), 4);
        assert_eq!(shifted.row(0), array![0., 0., 0., 0.]);
        assert_eq!(shifted.row(1), array![9., 9., 9., 9.]);
    }

    #[test]
    fn test_commands() {
        let (model, traj) = pair();
        let commands = traj.head(1).unwrap().commands(&model).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].agent, AgentId(1));
        assert_eq!(commands[0].position, array![0.25, 0.]);
        assert_eq!(commands[0].velocity, array![0.5, 0.]);
        assert_eq!(commands[1].position, array![2.75, 0.]);
    }

    #[test]
    fn test_agent_views() {
        let (_, traj) = pair();
        assert_eq!(traj.agent_states(AgentId(2)).unwrap().dim(), (5, 4));
        assert_eq!(traj.agent_controls(AgentId(1)).unwrap().dim(), (4, 2));
        assert!(traj.agent_states(AgentId(3)).is_err());
        assert!(traj.is_finite());
    }
}
