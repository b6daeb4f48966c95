//! A library for planning collision-free trajectories for teams of agents
//!
//! The primary uses involve describing each agent's dynamics and goal,
//! binding the team into a [`Problem`], and then either solving it once
//! with the game-theoretic [`IlqrSolver`] or re-planning it every control
//! cycle with the [`RecedingHorizonController`].
//!
//! The mas module defines the agent identifiers and the layout of the
//! joint state and control vectors, with the other modules building on
//! it. The most commonly used functionality is re-exported to the top
//! level for ease-of-use.

pub mod composite;
pub mod config;
pub mod control_theory;
pub mod cost;
pub mod dynamics;
pub mod error;
pub mod graphs;
pub mod integrator;
pub mod mas;
pub mod problem;
pub mod rhc;
pub mod setup;
pub mod solver;
pub mod trajectory;

pub use composite::CompositeModel;
pub use config::PlannerConfig;
pub use cost::{GameCost, ProximityCost, ReferenceCost};
pub use dynamics::{AgentModel, DynamicalModel, Dynamics, LtiDynamics, Quadcopter6D, Unicycle4D};
pub use error::{PlanError, PlanResult};
pub use integrator::Integration;
pub use mas::*;
pub use problem::Problem;
pub use rhc::{RecedingHorizonController, RhcConfig, RhcStatus};
pub use solver::{IlqrSolver, SolveResult, SolveStatus, SolverConfig};
pub use trajectory::Trajectory;
