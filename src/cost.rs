//! Goal-tracking and collision-avoidance costs, and their sum over a team.
//!
//! Every term can be evaluated and expanded to second order about a joint
//! state and control. Expansions are accumulated into a single
//! [`CostExpansion`] sized for the whole team, each agent's contribution
//! landing on its own slice of the joint vectors.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use ndarray_linalg::{Cholesky, EigValsh, UPLO};
use serde::{Deserialize, Serialize};

use crate::{
    error::{check_dim, PlanError, PlanResult},
    mas::{pairwise_distances, AgentId, AgentLayout},
};

/// Penalty weight used by [`ProximityCost::new`].
pub const DEFAULT_PROXIMITY_WEIGHT: f64 = 1000.0;

/// Below this separation the direction between two agents is undefined and
/// the pair contributes no gradient or curvature.
const COINCIDENT_DISTANCE: f64 = 1e-9;

/// Second-order expansion of a cost about $(x, u)$:
/// $l + l_x^\text{T} \delta x + l_u^\text{T} \delta u
///   + \tfrac{1}{2}\delta x^\text{T} l_{xx} \delta x
///   + \tfrac{1}{2}\delta u^\text{T} l_{uu} \delta u
///   + \delta u^\text{T} l_{ux} \delta x$.
#[derive(Clone, Debug, PartialEq)]
pub struct CostExpansion {
    pub l: f64,
    pub l_x: Array1<f64>,
    pub l_u: Array1<f64>,
    pub l_xx: Array2<f64>,
    pub l_uu: Array2<f64>,
    pub l_ux: Array2<f64>,
}

impl CostExpansion {
    pub fn zeros(n_state: usize, n_control: usize) -> Self {
        CostExpansion {
            l: 0.0,
            l_x: Array1::zeros(n_state),
            l_u: Array1::zeros(n_control),
            l_xx: Array2::zeros((n_state, n_state)),
            l_uu: Array2::zeros((n_control, n_control)),
            l_ux: Array2::zeros((n_control, n_state)),
        }
    }
}

/// Quadratic goal tracking for one agent.
///
/// Running cost $(x - x_g)^\text{T} Q (x - x_g) + u^\text{T} R u$; at the
/// final horizon index the cost is $(x - x_g)^\text{T} Q_f (x - x_g)$.
/// $Q$ and $Q_f$ must be positive semidefinite and $R$ positive definite,
/// which keeps every control Hessian of a solve positive definite.
#[derive(Clone, Debug)]
pub struct ReferenceCost {
    id: AgentId,
    x_goal: Array1<f64>,
    q_mat: Array2<f64>,
    r_mat: Array2<f64>,
    qf_mat: Array2<f64>,
}

impl ReferenceCost {
    pub fn new(
        id: AgentId,
        x_goal: Array1<f64>,
        q_mat: Array2<f64>,
        r_mat: Array2<f64>,
        qf_mat: Array2<f64>,
    ) -> PlanResult<Self> {
        let n = x_goal.len();
        check_dim("Q rows", n, q_mat.nrows())?;
        check_dim("Q cols", n, q_mat.ncols())?;
        check_dim("Qf rows", n, qf_mat.nrows())?;
        check_dim("Qf cols", n, qf_mat.ncols())?;
        check_dim("R cols", r_mat.nrows(), r_mat.ncols())?;
        check_positive_semidefinite("Q", &q_mat)?;
        check_positive_semidefinite("Qf", &qf_mat)?;
        check_positive_definite("R", &r_mat)?;
        Ok(ReferenceCost {
            id,
            x_goal,
            q_mat,
            r_mat,
            qf_mat,
        })
    }

    /// Skip the weight checks, so that tests can hand the solver an
    /// indefinite control Hessian.
    #[cfg(test)]
    pub(crate) fn new_unchecked(
        id: AgentId,
        x_goal: Array1<f64>,
        q_mat: Array2<f64>,
        r_mat: Array2<f64>,
        qf_mat: Array2<f64>,
    ) -> Self {
        ReferenceCost {
            id,
            x_goal,
            q_mat,
            r_mat,
            qf_mat,
        }
    }

    pub fn id(&self) -> AgentId {
        self.id
    }

    pub fn goal(&self) -> &Array1<f64> {
        &self.x_goal
    }

    /// Retarget the agent. The new goal must keep the state dimension.
    pub fn set_goal(&mut self, x_goal: Array1<f64>) -> PlanResult<()> {
        check_dim("goal state", self.x_goal.len(), x_goal.len())?;
        self.x_goal = x_goal;
        Ok(())
    }

    pub fn n_state(&self) -> usize {
        self.x_goal.len()
    }

    pub fn n_control(&self) -> usize {
        self.r_mat.nrows()
    }

    /// Cost of one agent's own state and control.
    pub fn evaluate_agent(&self, x: ArrayView1<f64>, u: ArrayView1<f64>, terminal: bool) -> f64 {
        let dx = &x - &self.x_goal;
        if terminal {
            dx.dot(&self.qf_mat.dot(&dx))
        } else {
            dx.dot(&self.q_mat.dot(&dx)) + u.dot(&self.r_mat.dot(&u))
        }
    }

    fn evaluate(&self, layout: &AgentLayout, x: ArrayView1<f64>, u: ArrayView1<f64>, terminal: bool) -> PlanResult<f64> {
        let slice = layout.require(self.id)?;
        Ok(self.evaluate_agent(
            x.slice(s![slice.state.clone()]),
            u.slice(s![slice.control.clone()]),
            terminal,
        ))
    }

    fn expand_into(
        &self,
        layout: &AgentLayout,
        x: ArrayView1<f64>,
        u: ArrayView1<f64>,
        terminal: bool,
        exp: &mut CostExpansion,
    ) -> PlanResult<()> {
        let slice = layout.require(self.id)?;
        let x_i = x.slice(s![slice.state.clone()]);
        let u_i = u.slice(s![slice.control.clone()]);
        exp.l += self.evaluate_agent(x_i, u_i, terminal);

        let dx = &x_i - &self.x_goal;
        let w_mat = if terminal { &self.qf_mat } else { &self.q_mat };
        let w_sym = w_mat + &w_mat.t();
        exp.l_x
            .slice_mut(s![slice.state.clone()])
            .scaled_add(1.0, &w_sym.dot(&dx));
        exp.l_xx
            .slice_mut(s![slice.state.clone(), slice.state.clone()])
            .scaled_add(1.0, &w_sym);

        if !terminal {
            let r_sym = &self.r_mat + &self.r_mat.t();
            exp.l_u
                .slice_mut(s![slice.control.clone()])
                .scaled_add(1.0, &r_sym.dot(&u_i));
            exp.l_uu
                .slice_mut(s![slice.control.clone(), slice.control.clone()])
                .scaled_add(1.0, &r_sym);
        }
        Ok(())
    }
}

/// Only the symmetric part of a weight enters its quadratic form.
fn symmetric_part(w_mat: &Array2<f64>) -> Array2<f64> {
    (w_mat + &w_mat.t()) * 0.5
}

fn check_finite(what: &'static str, w_mat: &Array2<f64>) -> PlanResult<()> {
    if w_mat.iter().all(|w| w.is_finite()) {
        Ok(())
    } else {
        Err(PlanError::InvalidWeight {
            what,
            requirement: "finite",
        })
    }
}

fn check_positive_semidefinite(what: &'static str, w_mat: &Array2<f64>) -> PlanResult<()> {
    check_finite(what, w_mat)?;
    let sym = symmetric_part(w_mat);
    let scale = sym.iter().fold(1.0_f64, |m, w| m.max(w.abs()));
    let eigenvalues = sym.eigvalsh(UPLO::Lower)?;
    if eigenvalues.iter().all(|&e| e >= -1e-12 * scale) {
        Ok(())
    } else {
        Err(PlanError::InvalidWeight {
            what,
            requirement: "positive semidefinite",
        })
    }
}

fn check_positive_definite(what: &'static str, w_mat: &Array2<f64>) -> PlanResult<()> {
    check_finite(what, w_mat)?;
    match symmetric_part(w_mat).cholesky(UPLO::Lower) {
        Ok(_) => Ok(()),
        Err(_) => Err(PlanError::InvalidWeight {
            what,
            requirement: "positive definite",
        }),
    }
}

/// Unit vector orthogonal to `unit`, taken from the coordinate axis `unit`
/// is least aligned with. `None` in one dimension.
fn lateral(unit: &Array1<f64>) -> Option<Array1<f64>> {
    let axis = (0..unit.len()).fold(0, |best, k| if unit[k].abs() < unit[best].abs() { k } else { best });
    let mut side = unit * -unit[axis];
    side[axis] += 1.0;
    let norm = side.dot(&side).sqrt();
    (norm > COINCIDENT_DISTANCE).then(|| side / norm)
}

/// Pairwise collision-avoidance penalty.
///
/// For every unordered pair of agents at position distance $d$,
/// $w \min(0, d - r)^2$ with avoidance radius $r$ and weight $w$. The
/// penalty and its gradient vanish for $d \ge r$, so the cost is
/// continuously differentiable. The curvature is the Gauss-Newton term
/// $2w\, e e^\text{T}$ along the unit separation $e$, which keeps the
/// Hessian positive semidefinite.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProximityCost {
    radius: f64,
    n_position: usize,
    #[serde(default = "default_weight")]
    weight: f64,
}

fn default_weight() -> f64 {
    DEFAULT_PROXIMITY_WEIGHT
}

impl ProximityCost {
    /// Penalize pairs closer than `radius` in the leading `n_position`
    /// state entries.
    pub fn new(radius: f64, n_position: usize) -> Self {
        ProximityCost {
            radius,
            n_position,
            weight: DEFAULT_PROXIMITY_WEIGHT,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    pub fn n_position(&self) -> usize {
        self.n_position
    }

    /// Reject a radius that is not positive or a negative weight.
    pub fn validate(&self) -> PlanResult<()> {
        if !(self.radius > 0.0 && self.radius.is_finite()) {
            return Err(PlanError::InvalidWeight {
                what: "proximity radius",
                requirement: "positive and finite",
            });
        }
        if !(self.weight >= 0.0 && self.weight.is_finite()) {
            return Err(PlanError::InvalidWeight {
                what: "proximity weight",
                requirement: "non-negative and finite",
            });
        }
        Ok(())
    }

    /// Whether any pair is closer than the radius at any row of `states`.
    pub fn has_conflict(&self, layout: &AgentLayout, states: ArrayView2<f64>) -> bool {
        states.rows().into_iter().any(|x| {
            pairwise_distances(layout, x, self.n_position)
                .into_iter()
                .any(|(_, _, d)| d < self.radius)
        })
    }

    pub fn evaluate(&self, layout: &AgentLayout, x: ArrayView1<f64>) -> f64 {
        pairwise_distances(layout, x, self.n_position)
            .into_iter()
            .filter(|&(_, _, d)| d < self.radius)
            .map(|(_, _, d)| self.weight * (d - self.radius).powi(2))
            .sum()
    }

    fn expand_into(&self, layout: &AgentLayout, x: ArrayView1<f64>, exp: &mut CostExpansion) {
        let slices = layout.slices();
        let n_p = self.n_position;
        for (i, j, d) in pairwise_distances(layout, x, n_p) {
            if d >= self.radius {
                continue;
            }
            exp.l += self.weight * (d - self.radius).powi(2);
            if d < COINCIDENT_DISTANCE {
                continue;
            }
            let p_i = slices[i].state.start..slices[i].state.start + n_p;
            let p_j = slices[j].state.start..slices[j].state.start + n_p;

            let unit: Array1<f64> = (&x.slice(s![p_i.clone()]) - &x.slice(s![p_j.clone()])) / d;
            let grad = &unit * (2.0 * self.weight * (d - self.radius));
            exp.l_x.slice_mut(s![p_i.clone()]).scaled_add(1.0, &grad);
            exp.l_x.slice_mut(s![p_j.clone()]).scaled_add(-1.0, &grad);

            let column = unit.view().insert_axis(ndarray::Axis(1));
            let hess = column.dot(&column.t()) * (2.0 * self.weight);
            exp.l_xx.slice_mut(s![p_i.clone(), p_i.clone()]).scaled_add(1.0, &hess);
            exp.l_xx.slice_mut(s![p_j.clone(), p_j.clone()]).scaled_add(1.0, &hess);
            exp.l_xx.slice_mut(s![p_i.clone(), p_j.clone()]).scaled_add(-1.0, &hess);
            exp.l_xx.slice_mut(s![p_j, p_i]).scaled_add(-1.0, &hess);
        }
    }

    /// Add a sideways push, as strong as the penalty gradient, to every pair
    /// closer than the radius.
    ///
    /// The penalty gradient always points along the line between the two
    /// agents, so a pair on a head-on course never learns to pass on either
    /// side. The side is fixed by the coordinate axis least aligned with
    /// that line, and both agents turn the same way relative to each other.
    fn add_sidestep(&self, layout: &AgentLayout, x: ArrayView1<f64>, exp: &mut CostExpansion) {
        let slices = layout.slices();
        let n_p = self.n_position;
        for (i, j, d) in pairwise_distances(layout, x, n_p) {
            if d >= self.radius || d < COINCIDENT_DISTANCE {
                continue;
            }
            let p_i = slices[i].state.start..slices[i].state.start + n_p;
            let p_j = slices[j].state.start..slices[j].state.start + n_p;
            let unit: Array1<f64> = (&x.slice(s![p_i.clone()]) - &x.slice(s![p_j.clone()])) / d;
            if let Some(side) = lateral(&unit) {
                let push = side * (2.0 * self.weight * (d - self.radius));
                exp.l_x.slice_mut(s![p_i]).scaled_add(1.0, &push);
                exp.l_x.slice_mut(s![p_j]).scaled_add(-1.0, &push);
            }
        }
    }
}

/// Closed set of cost terms that make up a [`GameCost`].
#[derive(Clone, Copy, Debug)]
pub enum CostTerm<'a> {
    Reference(&'a ReferenceCost),
    Proximity(&'a ProximityCost),
}

impl<'a> CostTerm<'a> {
    pub fn evaluate(&self, layout: &AgentLayout, x: ArrayView1<f64>, u: ArrayView1<f64>, terminal: bool) -> PlanResult<f64> {
        match self {
            CostTerm::Reference(cost) => cost.evaluate(layout, x, u, terminal),
            CostTerm::Proximity(cost) => Ok(cost.evaluate(layout, x)),
        }
    }

    /// Add this term's expansion to `exp`.
    pub fn expand_into(
        &self,
        layout: &AgentLayout,
        x: ArrayView1<f64>,
        u: ArrayView1<f64>,
        terminal: bool,
        exp: &mut CostExpansion,
    ) -> PlanResult<()> {
        match self {
            CostTerm::Reference(cost) => cost.expand_into(layout, x, u, terminal, exp),
            CostTerm::Proximity(cost) => {
                cost.expand_into(layout, x, exp);
                Ok(())
            }
        }
    }
}

/// Joint cost of a team: one [`ReferenceCost`] per agent plus a shared
/// [`ProximityCost`].
#[derive(Clone, Debug)]
pub struct GameCost {
    references: Vec<ReferenceCost>,
    proximity: ProximityCost,
}

impl GameCost {
    pub fn new(references: Vec<ReferenceCost>, proximity: ProximityCost) -> PlanResult<Self> {
        proximity.validate()?;
        for (i, cost) in references.iter().enumerate() {
            if references[..i].iter().any(|c| c.id == cost.id) {
                return Err(PlanError::DuplicateAgent(cost.id));
            }
        }
        Ok(GameCost {
            references,
            proximity,
        })
    }

    pub fn ids(&self) -> Vec<AgentId> {
        self.references.iter().map(|c| c.id).collect()
    }

    pub fn references(&self) -> &[ReferenceCost] {
        &self.references
    }

    pub fn reference(&self, id: AgentId) -> Option<&ReferenceCost> {
        self.references.iter().find(|c| c.id == id)
    }

    pub fn reference_mut(&mut self, id: AgentId) -> Option<&mut ReferenceCost> {
        self.references.iter_mut().find(|c| c.id == id)
    }

    pub fn proximity(&self) -> &ProximityCost {
        &self.proximity
    }

    pub fn terms(&self) -> impl Iterator<Item = CostTerm<'_>> {
        self.references
            .iter()
            .map(CostTerm::Reference)
            .chain(std::iter::once(CostTerm::Proximity(&self.proximity)))
    }

    /// The cost restricted to `ids`: their reference costs, in the order
    /// given, and the shared proximity penalty.
    pub fn subset(&self, ids: &[AgentId]) -> PlanResult<GameCost> {
        let references = ids
            .iter()
            .map(|&id| self.reference(id).cloned().ok_or(PlanError::UnknownAgent(id)))
            .collect::<PlanResult<Vec<_>>>()?;
        GameCost::new(references, self.proximity.clone())
    }

    /// Goal states of all agents stacked in layout order.
    pub fn goal_state(&self, layout: &AgentLayout) -> PlanResult<Array1<f64>> {
        let mut x_goal = Array1::zeros(layout.n_state());
        for slice in layout.slices() {
            let cost = self.reference(slice.id).ok_or(PlanError::UnknownAgent(slice.id))?;
            x_goal.slice_mut(s![slice.state.clone()]).assign(&cost.x_goal);
        }
        Ok(x_goal)
    }

    pub fn evaluate(&self, layout: &AgentLayout, x: ArrayView1<f64>, u: ArrayView1<f64>, terminal: bool) -> PlanResult<f64> {
        check_dim("joint state", layout.n_state(), x.len())?;
        check_dim("joint control", layout.n_control(), u.len())?;
        self.terms()
            .map(|term| term.evaluate(layout, x, u, terminal))
            .sum()
    }

    /// Sum of the expansions of every term at $(x, u)$.
    pub fn expand(&self, layout: &AgentLayout, x: ArrayView1<f64>, u: ArrayView1<f64>, terminal: bool) -> PlanResult<CostExpansion> {
        check_dim("joint state", layout.n_state(), x.len())?;
        check_dim("joint control", layout.n_control(), u.len())?;
        let mut exp = CostExpansion::zeros(layout.n_state(), layout.n_control());
        for term in self.terms() {
            term.expand_into(layout, x, u, terminal, &mut exp)?;
        }
        Ok(exp)
    }

    /// [`GameCost::expand`] with every close pair also pushed sideways.
    ///
    /// The result is not the derivative of the cost. The solver uses it for
    /// a single trial step that breaks the symmetry of head-on encounters.
    pub fn expand_sidestep(
        &self,
        layout: &AgentLayout,
        x: ArrayView1<f64>,
        u: ArrayView1<f64>,
        terminal: bool,
    ) -> PlanResult<CostExpansion> {
        let mut exp = self.expand(layout, x, u, terminal)?;
        self.proximity.add_sidestep(layout, x, &mut exp);
        Ok(exp)
    }
}
