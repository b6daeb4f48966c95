//! Joint dynamics of a team of dynamically decoupled agents.

use std::sync::Arc;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

use crate::{
    control_theory::block_diag,
    dynamics::{AgentModel, DynamicalModel},
    error::{check_dim, PlanError, PlanResult},
    mas::{AgentId, AgentLayout},
};

/// Concatenation of per-agent models into one joint state and control
/// space.
///
/// Each agent's model only ever sees its own slice, so the joint
/// linearization is block diagonal with blocks in layout order.
#[derive(Clone, Debug)]
pub struct CompositeModel {
    agents: Vec<AgentModel>,
    layout: Arc<AgentLayout>,
    dt: f64,
}

impl CompositeModel {
    /// Combine `agents`, in order. All models must share one time step.
    pub fn new(agents: Vec<AgentModel>) -> PlanResult<Self> {
        let dt = match agents.first() {
            Some(first) => first.dt(),
            None => return Err(PlanError::Config("a composite model needs at least one agent".into())),
        };
        if let Some(other) = agents.iter().find(|a| (a.dt() - dt).abs() > f64::EPSILON * dt.abs().max(1.0)) {
            return Err(PlanError::Config(format!(
                "{} uses dt = {} but the team uses dt = {dt}",
                other.id(),
                other.dt()
            )));
        }
        let layout = AgentLayout::new(agents.iter().map(|a| (a.id(), a.n_state(), a.n_control())))?;
        Ok(CompositeModel {
            agents,
            layout: Arc::new(layout),
            dt,
        })
    }

    pub fn layout(&self) -> &Arc<AgentLayout> {
        &self.layout
    }

    pub fn agents(&self) -> &[AgentModel] {
        &self.agents
    }

    pub fn agent(&self, id: AgentId) -> Option<&AgentModel> {
        self.agents.iter().find(|a| a.id() == id)
    }

    /// The model restricted to `ids`, in the order given.
    pub fn subset(&self, ids: &[AgentId]) -> PlanResult<CompositeModel> {
        let agents = ids
            .iter()
            .map(|&id| self.agent(id).cloned().ok_or(PlanError::UnknownAgent(id)))
            .collect::<PlanResult<Vec<_>>>()?;
        CompositeModel::new(agents)
    }

    /// Each agent's nominal input, stacked into a joint control.
    pub fn nominal_control(&self) -> Array1<f64> {
        let mut u = Array1::zeros(self.layout.n_control());
        for (agent, slice) in self.agents.iter().zip(self.layout.slices()) {
            u.slice_mut(s![slice.control.clone()])
                .assign(&agent.dynamics().nominal_input());
        }
        u
    }

    /// Forward-simulate `controls` (one joint control per row) from `x0`.
    ///
    /// Returns one joint state per row, starting with `x0`.
    pub fn rollout(&self, x0: ArrayView1<f64>, controls: ArrayView2<f64>) -> PlanResult<Array2<f64>> {
        check_dim("initial joint state", self.layout.n_state(), x0.len())?;
        check_dim("joint control", self.layout.n_control(), controls.ncols())?;
        let mut states = Array2::zeros((controls.nrows() + 1, x0.len()));
        states.row_mut(0).assign(&x0);
        for (k, u) in controls.rows().into_iter().enumerate() {
            let x_next = self.step(states.row(k), u)?;
            states.row_mut(k + 1).assign(&x_next);
        }
        Ok(states)
    }
}

impl DynamicalModel for CompositeModel {
    fn n_state(&self) -> usize {
        self.layout.n_state()
    }

    fn n_control(&self) -> usize {
        self.layout.n_control()
    }

    fn dt(&self) -> f64 {
        self.dt
    }

    fn step(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> PlanResult<Array1<f64>> {
        check_dim("joint state", self.layout.n_state(), x.len())?;
        check_dim("joint control", self.layout.n_control(), u.len())?;
        let mut x_next = Array1::zeros(x.len());
        for (agent, slice) in self.agents.iter().zip(self.layout.slices()) {
            let x_i = x.slice(s![slice.state.clone()]);
            let u_i = u.slice(s![slice.control.clone()]);
            x_next
                .slice_mut(s![slice.state.clone()])
                .assign(&agent.step(x_i, u_i)?);
        }
        Ok(x_next)
    }

    fn linearize(&self, x: ArrayView1<f64>, u: ArrayView1<f64>) -> PlanResult<(Array2<f64>, Array2<f64>)> {
        check_dim("joint state", self.layout.n_state(), x.len())?;
        check_dim("joint control", self.layout.n_control(), u.len())?;
        let mut a_blocks = Vec::with_capacity(self.agents.len());
        let mut b_blocks = Vec::with_capacity(self.agents.len());
        for (agent, slice) in self.agents.iter().zip(self.layout.slices()) {
            let (a_i, b_i) = agent.linearize(
                x.slice(s![slice.state.clone()]),
                u.slice(s![slice.control.clone()]),
            )?;
            a_blocks.push(a_i);
            b_blocks.push(b_i);
        }
        Ok((block_diag(&a_blocks), block_diag(&b_blocks)))
    }
}
