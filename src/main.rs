use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use multi_ilqr::{
    config::PlannerConfig,
    mas::split_agents,
    rhc::Decomposition,
    setup::seeded_setup,
    AgentId, AgentLayout, PlanResult, RhcStatus, Trajectory,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Simulate a team of agents flying to random goals under receding-horizon
/// iLQR.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// TOML planner configuration; built-in defaults when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of agents.
    #[arg(short = 'n', long, default_value_t = 3)]
    agents: usize,

    /// Seed for the start and goal configuration.
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Solve the whole team jointly every cycle.
    #[arg(long)]
    centralized: bool,
}

fn run(cli: &Cli) -> PlanResult<RhcStatus> {
    let mut config = match &cli.config {
        Some(path) => PlannerConfig::load(path)?,
        None => PlannerConfig::default(),
    };
    if cli.centralized {
        config.rhc.decomposition = Decomposition::Centralized;
    }

    let options = config.setup_options(cli.agents);
    let (x0, x_goal) = seeded_setup(&options, cli.seed)?;
    let ids: Vec<AgentId> = (0..cli.agents as u32).map(|i| AgentId(100 + i)).collect();
    let dynamics = config.model.dynamics();
    let layout = AgentLayout::new(ids.iter().map(|&id| (id, dynamics.n_state(), dynamics.n_input())))?;
    let goals: Vec<_> = ids
        .iter()
        .copied()
        .zip(split_agents(x_goal.view(), &layout)?.into_iter().map(|g| g.to_owned()))
        .collect();

    info!(agents = cli.agents, seed = cli.seed, model = ?config.model, decomposition = ?config.rhc.decomposition, "starting");
    let mut controller = config.build_controller(&goals)?;
    let outcome = controller.run(x0.view())?;

    let final_state = outcome.states.row(outcome.states.nrows() - 1);
    for (id, distance) in controller.problem().distances_to_goal(final_state)? {
        info!(%id, distance, "final distance to goal");
    }
    let executed = Trajectory::new(outcome.states, outcome.controls, controller.problem().layout().clone())?;
    if let Some(d) = executed.min_pairwise_distance(dynamics.n_position()) {
        info!(min_distance = d, radius = config.radius, "closest approach");
    }
    info!(status = ?outcome.status, cycles = outcome.cycles, cost = outcome.cost, "done");
    Ok(outcome.status)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(RhcStatus::Converged) => ExitCode::SUCCESS,
        Ok(status) => {
            error!(?status, "agents did not reach their goals");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(%err, "planning failed");
            ExitCode::FAILURE
        }
    }
}
