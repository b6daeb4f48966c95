//! This module contains the primary structs and types for describing
//! the agents of a multi-agent system (MAS) and how their individual
//! states and controls are laid out inside the joint vectors.

use std::{fmt, ops::Range};

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{check_dim, PlanError, PlanResult};

/// Opaque identifier of an agent, stable across re-planning cycles.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub u32);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent {}", self.0)
    }
}

/// Where one agent lives inside the joint state and control vectors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentSlice {
    pub id: AgentId,
    pub state: Range<usize>,
    pub control: Range<usize>,
}

impl AgentSlice {
    pub fn n_state(&self) -> usize {
        self.state.len()
    }

    pub fn n_control(&self) -> usize {
        self.control.len()
    }
}

/// Offset table mapping each agent to its slice of the joint vectors.
///
/// The slices are laid out back to back in the order given at
/// construction, so they partition the joint vectors with no gaps or
/// overlaps. The order never changes for the lifetime of a layout.
///
/// # Examples
/// ```
/// use multi_ilqr::mas::{AgentId, AgentLayout};
///
/// let layout = AgentLayout::new([(AgentId(7), 4, 2), (AgentId(3), 6, 3)]).unwrap();
/// assert_eq!(layout.n_state(), 10);
/// assert_eq!(layout.n_control(), 5);
/// assert_eq!(layout.slice(AgentId(3)).unwrap().state, 4..10);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentLayout {
    slices: Vec<AgentSlice>,
    n_state: usize,
    n_control: usize,
}

impl AgentLayout {
    /// Build a layout from `(id, n_state, n_control)` triples.
    pub fn new<I>(dims: I) -> PlanResult<Self>
    where
        I: IntoIterator<Item = (AgentId, usize, usize)>,
    {
        let mut slices: Vec<AgentSlice> = Vec::new();
        let mut x_start = 0;
        let mut u_start = 0;
        for (id, n_x, n_u) in dims {
            if slices.iter().any(|s| s.id == id) {
                return Err(PlanError::DuplicateAgent(id));
            }
            slices.push(AgentSlice {
                id,
                state: x_start..x_start + n_x,
                control: u_start..u_start + n_u,
            });
            x_start += n_x;
            u_start += n_u;
        }
        Ok(AgentLayout {
            slices,
            n_state: x_start,
            n_control: u_start,
        })
    }

    pub fn n_agents(&self) -> usize {
        self.slices.len()
    }

    pub fn n_state(&self) -> usize {
        self.n_state
    }

    pub fn n_control(&self) -> usize {
        self.n_control
    }

    pub fn slices(&self) -> &[AgentSlice] {
        &self.slices
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.slices.iter().map(|s| s.id).collect()
    }

    pub fn slice(&self, id: AgentId) -> Option<&AgentSlice> {
        self.slices.iter().find(|s| s.id == id)
    }

    pub(crate) fn require(&self, id: AgentId) -> PlanResult<&AgentSlice> {
        self.slice(id).ok_or(PlanError::UnknownAgent(id))
    }

    /// View of one agent's state inside a joint state.
    pub fn agent_state<'a>(&self, x: ArrayView1<'a, f64>, id: AgentId) -> PlanResult<ArrayView1<'a, f64>> {
        check_dim("joint state", self.n_state, x.len())?;
        let range = self.require(id)?.state.clone();
        Ok(x.slice_move(s![range]))
    }

    /// Layout restricted to `ids`, in the order given.
    pub fn subset(&self, ids: &[AgentId]) -> PlanResult<AgentLayout> {
        let mut dims = Vec::with_capacity(ids.len());
        for &id in ids {
            let slice = self.require(id)?;
            dims.push((id, slice.n_state(), slice.n_control()));
        }
        AgentLayout::new(dims)
    }

    /// Gather the states of the agents in `sub` out of a joint state laid
    /// out by `self`.
    pub fn select_state(&self, x: ArrayView1<f64>, sub: &AgentLayout) -> PlanResult<Array1<f64>> {
        check_dim("joint state", self.n_state, x.len())?;
        let mut out = Array1::zeros(sub.n_state());
        for target in sub.slices() {
            let source = self.require(target.id)?;
            check_dim("agent state", source.n_state(), target.n_state())?;
            out.slice_mut(s![target.state.clone()])
                .assign(&x.slice(s![source.state.clone()]));
        }
        Ok(out)
    }

    /// Row-wise selection of the controls of the agents in `sub`.
    pub fn select_control_columns(&self, us: ArrayView2<f64>, sub: &AgentLayout) -> PlanResult<Array2<f64>> {
        check_dim("joint control", self.n_control, us.ncols())?;
        let mut out = Array2::zeros((us.nrows(), sub.n_control()));
        for target in sub.slices() {
            let source = self.require(target.id)?;
            out.slice_mut(s![.., target.control.clone()])
                .assign(&us.slice(s![.., source.control.clone()]));
        }
        Ok(out)
    }
}

/// Split a joint vector into per-agent views following `layout`.
pub fn split_agents<'a>(x: ArrayView1<'a, f64>, layout: &AgentLayout) -> PlanResult<Vec<ArrayView1<'a, f64>>> {
    check_dim("joint state", layout.n_state(), x.len())?;
    Ok(layout
        .slices()
        .iter()
        .map(|slice| x.slice_move(s![slice.state.clone()]))
        .collect())
}

/// Euclidean distance between the leading `n_position` entries of two states.
pub fn position_distance(a: ArrayView1<f64>, b: ArrayView1<f64>, n_position: usize) -> f64 {
    a.iter()
        .zip(b.iter())
        .take(n_position)
        .map(|(p, q)| (p - q) * (p - q))
        .sum::<f64>()
        .sqrt()
}

/// Distances between every unordered pair of agents, as `(i, j, d_ij)` with
/// `i < j` indexing the layout order.
pub fn pairwise_distances(layout: &AgentLayout, x: ArrayView1<f64>, n_position: usize) -> Vec<(usize, usize, f64)> {
    let slices = layout.slices();
    let mut out = Vec::with_capacity(slices.len() * slices.len().saturating_sub(1) / 2);
    for i in 0..slices.len() {
        for j in (i + 1)..slices.len() {
            let x_i = x.slice(s![slices[i].state.clone()]);
            let x_j = x.slice(s![slices[j].state.clone()]);
            out.push((i, j, position_distance(x_i, x_j, n_position)));
        }
    }
    out
}
