mod engine;
mod solver;
mod types;

pub use engine::{Step, opening_state, simulate};
pub use solver::{SolveConfig, SolveIteration, SolveResult, solve_max_withdrawal};
pub use types::{ConfigError, PortfolioState, SimulationConfig, YearRecord};
