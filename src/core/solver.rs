use serde::Serialize;

use super::{SimulationConfig, simulate};

#[derive(Debug, Clone, Copy)]
pub struct SolveConfig {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            search_min: 0.0,
            search_max: 1_000_000.0,
            tolerance: 1.0,
            max_iterations: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub sustained: bool,
    pub final_end_value: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResult {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_value: Option<f64>,
    pub iterations: Vec<SolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    sustained: bool,
    final_end_value: i64,
}

/// Largest starting net withdrawal that still leaves money in the final year.
///
/// The projection must cover every configured year and finish with a
/// positive end value. Bisection assumes larger withdrawals never last longer.
pub fn solve_max_withdrawal(
    base: &SimulationConfig,
    config: SolveConfig,
) -> Result<SolveResult, String> {
    validate_config(config)?;
    base.validate().map_err(|e| e.to_string())?;

    let low_eval = evaluate_candidate(base, config.search_min)?;
    let high_eval = evaluate_candidate(base, config.search_max)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    if !low_eval.sustained {
        feasible = false;
        message = "No sustainable withdrawal found within the search bounds.".to_string();
    } else if high_eval.sustained {
        solved_value = Some(config.search_max);
        converged = true;
        feasible = true;
        message = "Upper withdrawal bound is still sustainable; increase search max for a higher target."
            .to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let eval = evaluate_candidate(base, mid)?;
            iterations.push(SolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_value: mid,
                sustained: eval.sustained,
                final_end_value: eval.final_end_value,
            });

            if eval.sustained {
                lo = mid;
            } else {
                hi = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                break;
            }
        }
        solved_value = Some(lo);
        feasible = true;
        message = if converged {
            "Solved maximum sustainable net withdrawal.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate.".to_string()
        };
    }

    Ok(SolveResult {
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_value,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn evaluate_candidate(base: &SimulationConfig, candidate: f64) -> Result<CandidateEval, String> {
    let config = SimulationConfig {
        net_withdrawal_start: candidate.max(0.0),
        ..*base
    };
    let records = simulate(&config).map_err(|e| e.to_string())?;
    let final_end_value = records.last().map_or(0, |r| r.end_value);
    Ok(CandidateEval {
        sustained: records.len() as u32 == config.years && final_end_value > 0,
        final_end_value,
    })
}

fn validate_config(config: SolveConfig) -> Result<(), String> {
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err("search bounds must be finite".to_string());
    }
    if config.search_min < 0.0 {
        return Err("search_min must be >= 0".to_string());
    }
    if config.search_max <= config.search_min {
        return Err("search_max must be greater than search_min".to_string());
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err("tolerance must be > 0".to_string());
    }
    if config.max_iterations == 0 {
        return Err("max_iterations must be > 0".to_string());
    }
    Ok(())
}
