//! Random start and goal configurations for experiments and tests.

use std::f64::consts::PI;

use ndarray::{s, Array1, Array2};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

/// Shape of a random team configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupOptions {
    pub n_agents: usize,
    /// State dimension of every agent; positions lead the state.
    pub n_states: usize,
    /// Number of position coordinates drawn at random. The rest of each
    /// state is zero.
    pub n_d: usize,
    /// Minimum distance between any two starts and any two goals.
    pub rel_dist: f64,
    /// Half-width of the sampling box around the origin.
    pub var: f64,
    /// Draw goals by rotating the starts about their centroid instead of
    /// sampling them independently.
    pub rotation: bool,
    /// Rejection-sampling attempts per agent.
    pub max_attempts: usize,
}

impl Default for SetupOptions {
    fn default() -> Self {
        SetupOptions {
            n_agents: 3,
            n_states: 6,
            n_d: 3,
            rel_dist: 2.0,
            var: 3.0,
            rotation: false,
            max_attempts: 1000,
        }
    }
}

/// Draw joint start and goal states.
///
/// Example
/// ```
/// use rand::{rngs::SmallRng, SeedableRng};
/// use multi_ilqr::setup::{random_setup, SetupOptions};
///
/// let mut rng = SmallRng::seed_from_u64(7);
/// let (x0, x_goal) = random_setup(&SetupOptions::default(), &mut rng).unwrap();
/// assert_eq!(x0.len(), 18);
/// assert_eq!(x_goal.len(), 18);
/// ```
pub fn random_setup<R: Rng + ?Sized>(options: &SetupOptions, rng: &mut R) -> PlanResult<(Array1<f64>, Array1<f64>)> {
    if options.n_d == 0 || options.n_d > options.n_states {
        return Err(PlanError::Config(format!(
            "cannot randomize {} position coordinates of a {} dimensional state",
            options.n_d, options.n_states
        )));
    }
    if !(options.var > 0.0) || options.rel_dist < 0.0 {
        return Err(PlanError::Config(format!(
            "need var > 0 and rel_dist >= 0, got {} and {}",
            options.var, options.rel_dist
        )));
    }
    if options.rotation && options.n_d < 2 {
        return Err(PlanError::Config("rotated goals need at least two position coordinates".into()));
    }

    let starts = separated_positions(options, rng)?;
    let goals = if options.rotation {
        let theta = rng.gen_range(PI / 2.0..3.0 * PI / 2.0);
        rotate_about_centroid(&starts, theta)
    } else {
        separated_positions(options, rng)?
    };
    Ok((stack_states(&starts, options.n_states), stack_states(&goals, options.n_states)))
}

/// [`random_setup`] from a fixed seed.
pub fn seeded_setup(options: &SetupOptions, seed: u64) -> PlanResult<(Array1<f64>, Array1<f64>)> {
    random_setup(options, &mut SmallRng::seed_from_u64(seed))
}

/// Positions one per row, pairwise at least `rel_dist` apart.
fn separated_positions<R: Rng + ?Sized>(options: &SetupOptions, rng: &mut R) -> PlanResult<Array2<f64>> {
    let mut positions: Array2<f64> = Array2::zeros((options.n_agents, options.n_d));
    for i in 0..options.n_agents {
        let mut placed = false;
        for _ in 0..options.max_attempts {
            let candidate = Array1::from_shape_fn(options.n_d, |_| rng.gen_range(-options.var..=options.var));
            let clear = (0..i).all(|j| {
                let diff = &positions.row(j) - &candidate;
                diff.dot(&diff).sqrt() >= options.rel_dist
            });
            if clear {
                positions.row_mut(i).assign(&candidate);
                placed = true;
                break;
            }
        }
        if !placed {
            return Err(PlanError::Config(format!(
                "could not place {} agents {} apart within +/-{} after {} attempts",
                options.n_agents, options.rel_dist, options.var, options.max_attempts
            )));
        }
    }
    Ok(positions)
}

/// Rotate the first two coordinates of every row by `theta` about their
/// mean.
fn rotate_about_centroid(positions: &Array2<f64>, theta: f64) -> Array2<f64> {
    let mut out = positions.clone();
    if positions.nrows() == 0 {
        return out;
    }
    let cx = positions.column(0).mean().unwrap_or(0.0);
    let cy = positions.column(1).mean().unwrap_or(0.0);
    let (sin, cos) = theta.sin_cos();
    for mut row in out.rows_mut() {
        let (dx, dy) = (row[0] - cx, row[1] - cy);
        row[0] = cx + cos * dx - sin * dy;
        row[1] = cy + sin * dx + cos * dy;
    }
    out
}

fn stack_states(positions: &Array2<f64>, n_states: usize) -> Array1<f64> {
    let mut x = Array1::zeros(positions.nrows() * n_states);
    for (i, row) in positions.rows().into_iter().enumerate() {
        x.slice_mut(s![i * n_states..i * n_states + row.len()]).assign(&row);
    }
    x
}
