//! TOML planner configuration.
//!
//! ```toml
//! dt = 0.1
//! radius = 0.5
//! safety_margin = 0.1
//! model = "quadcopter"
//! integration = "rk4"
//! q = [10.0, 10.0, 10.0, 10.0, 10.0, 10.0]
//!
//! [rhc]
//! horizon = 50
//! step_size = 2
//! decomposition = "centralized"
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use std::{fs, path::Path, sync::Arc};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::{
    composite::CompositeModel,
    cost::{GameCost, ProximityCost, ReferenceCost, DEFAULT_PROXIMITY_WEIGHT},
    dynamics::{AgentModel, Dynamics, LtiDynamics, Quadcopter6D, Unicycle4D},
    error::{PlanError, PlanResult},
    integrator::Integration,
    mas::AgentId,
    problem::Problem,
    rhc::{RecedingHorizonController, RhcConfig},
    setup::SetupOptions,
};

/// Agent model shared by the whole team.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    Quadcopter,
    /// 6 state, 3 input point mass.
    PointMass,
    /// 4 state planar double integrator.
    PlanarPointMass,
    Unicycle,
}

impl ModelKind {
    pub fn dynamics(self) -> Arc<dyn Dynamics> {
        match self {
            ModelKind::Quadcopter => Arc::new(Quadcopter6D::default()),
            ModelKind::PointMass => Arc::new(LtiDynamics::double_integrator(3)),
            ModelKind::PlanarPointMass => Arc::new(LtiDynamics::double_integrator(2)),
            ModelKind::Unicycle => Arc::new(Unicycle4D),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub dt: f64,
    /// Avoidance radius.
    pub radius: f64,
    /// Added to `radius` where the proximity penalty starts. The penalty is
    /// soft, so planned pairs settle slightly inside the distance at which it
    /// starts; the margin keeps them outside `radius` itself.
    pub safety_margin: f64,
    pub model: ModelKind,
    pub integration: Integration,
    /// Diagonal of the running state weight; 10 per state when omitted.
    pub q: Option<Vec<f64>>,
    /// Diagonal of the terminal state weight; 1000 per state when omitted.
    pub qf: Option<Vec<f64>>,
    /// Diagonal of the input weight; 1 per input when omitted.
    pub r: Option<Vec<f64>>,
    pub proximity_weight: f64,
    pub rhc: RhcConfig,
    pub setup: SetupOptions,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            dt: 0.1,
            radius: 0.5,
            safety_margin: 0.1,
            model: ModelKind::default(),
            integration: Integration::Rk4,
            q: None,
            qf: None,
            r: None,
            proximity_weight: DEFAULT_PROXIMITY_WEIGHT,
            rhc: RhcConfig::default(),
            setup: SetupOptions::default(),
        }
    }
}

impl PlannerConfig {
    pub fn from_toml_str(text: &str) -> PlanResult<Self> {
        let config: PlannerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> PlanResult<Self> {
        let text = fs::read_to_string(path)?;
        PlannerConfig::from_toml_str(&text)
    }

    pub fn validate(&self) -> PlanResult<()> {
        if !(self.dt > 0.0) || !(self.radius > 0.0) {
            return Err(PlanError::Config(format!(
                "dt and radius must be positive, got {} and {}",
                self.dt, self.radius
            )));
        }
        if !(self.safety_margin >= 0.0 && self.safety_margin.is_finite()) {
            return Err(PlanError::Config(format!(
                "safety margin must be non-negative, got {}",
                self.safety_margin
            )));
        }
        if !(self.proximity_weight >= 0.0) {
            return Err(PlanError::Config(format!(
                "proximity weight must be non-negative, got {}",
                self.proximity_weight
            )));
        }
        let dynamics = self.model.dynamics();
        let (n_x, n_u) = (dynamics.n_state(), dynamics.n_input());
        check_diagonal("q", self.q.as_deref(), n_x, false)?;
        check_diagonal("qf", self.qf.as_deref(), n_x, false)?;
        check_diagonal("r", self.r.as_deref(), n_u, true)?;
        self.rhc.validate()
    }

    /// Team problem with one agent per `(id, goal)` entry.
    pub fn build_problem(&self, goals: &[(AgentId, Array1<f64>)]) -> PlanResult<Problem> {
        let dynamics = self.model.dynamics();
        let (n_x, n_u) = (dynamics.n_state(), dynamics.n_input());
        let q = diagonal(self.q.as_deref(), n_x, 10.0);
        let qf = diagonal(self.qf.as_deref(), n_x, 1000.0);
        let r = diagonal(self.r.as_deref(), n_u, 1.0);

        let models = goals
            .iter()
            .map(|(id, _)| AgentModel::from_shared(*id, dynamics.clone(), self.dt, self.integration))
            .collect();
        let references = goals
            .iter()
            .map(|(id, goal)| ReferenceCost::new(*id, goal.clone(), q.clone(), r.clone(), qf.clone()))
            .collect::<PlanResult<Vec<_>>>()?;
        let proximity = ProximityCost::new(self.radius + self.safety_margin, dynamics.n_position())
            .with_weight(self.proximity_weight);
        Problem::new(CompositeModel::new(models)?, GameCost::new(references, proximity)?)
    }

    pub fn build_controller(&self, goals: &[(AgentId, Array1<f64>)]) -> PlanResult<RecedingHorizonController> {
        RecedingHorizonController::new(self.build_problem(goals)?, self.rhc.clone())
    }

    /// Setup options for `n_agents` agents of the configured model.
    pub fn setup_options(&self, n_agents: usize) -> SetupOptions {
        let dynamics = self.model.dynamics();
        SetupOptions {
            n_agents,
            n_states: dynamics.n_state(),
            n_d: self.setup.n_d.min(dynamics.n_position()),
            ..self.setup.clone()
        }
    }
}

fn check_diagonal(name: &str, diag: Option<&[f64]>, n: usize, positive: bool) -> PlanResult<()> {
    let Some(diag) = diag else {
        return Ok(());
    };
    if diag.len() != n {
        return Err(PlanError::Config(format!("{name} needs {n} entries, got {}", diag.len())));
    }
    let ok = diag.iter().all(|&w| if positive { w > 0.0 } else { w >= 0.0 });
    if !ok {
        return Err(PlanError::Config(format!("{name} has an invalid weight: {diag:?}")));
    }
    Ok(())
}

fn diagonal(diag: Option<&[f64]>, n: usize, default: f64) -> Array2<f64> {
    match diag {
        Some(diag) => Array2::from_diag(&Array1::from(diag.to_vec())),
        None => Array2::eye(n) * default,
    }
}
