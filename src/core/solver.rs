use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::fire::calc_fire_plan;
use super::types::{FireInput, MAX_PROJECTION_MONTHS};
use crate::error::{PlanError, PlanResult};

/// Bisection on f64 bounds exhausts precision well before this.
pub const MAX_SOLVER_ITERATIONS: u32 = 1_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FireGoalType {
    /// Smallest monthly contribution that reaches the target in time.
    RequiredContribution,
    /// Largest monthly expense level still reachable in time.
    MaxExpenses,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FireGoalConfig {
    pub goal_type: FireGoalType,
    pub target_months: u32,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FireGoalIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub horizon_months: u32,
    pub reached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FireGoalResult {
    #[serde(flatten)]
    pub config: FireGoalConfig,
    pub solved_value: Option<f64>,
    pub achieved_horizon_months: Option<u32>,
    pub iterations: Vec<FireGoalIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

pub fn validate_solve_config(config: &FireGoalConfig) -> Vec<String> {
    let mut errors = Vec::new();
    if config.target_months == 0 {
        errors.push("Target horizon must be at least one month".to_string());
    }
    if config.target_months > MAX_PROJECTION_MONTHS {
        errors.push(format!(
            "Target horizon cannot exceed {MAX_PROJECTION_MONTHS} months"
        ));
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        errors.push("Search bounds must be finite".to_string());
    } else {
        if config.search_min < 0.0 {
            errors.push("Search minimum cannot be negative".to_string());
        }
        if config.search_max <= config.search_min {
            errors.push("Search maximum must be greater than search minimum".to_string());
        }
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        errors.push("Tolerance must be greater than zero".to_string());
    }
    if config.max_iterations == 0 {
        errors.push("Maximum iterations must be at least one".to_string());
    }
    if config.max_iterations > MAX_SOLVER_ITERATIONS {
        errors.push(format!(
            "Maximum iterations cannot exceed {MAX_SOLVER_ITERATIONS}"
        ));
    }
    errors
}

/// Bisects one FIRE input until the target is reached within `target_months`.
///
/// The bracket keeps a reaching candidate on one side and a failing one on the
/// other, so the returned value always reaches the target.
pub fn solve_fire_goal(input: &FireInput, config: FireGoalConfig) -> PlanResult<FireGoalResult> {
    PlanError::from_validation(validate_solve_config(&config))?;

    let low_eval = evaluate_candidate(input, config, config.search_min)?;
    let high_eval = evaluate_candidate(input, config, config.search_max)?;

    let mut iterations = Vec::new();
    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    match config.goal_type {
        FireGoalType::RequiredContribution => {
            if low_eval.reached {
                solved_value = Some(config.search_min);
                converged = true;
                feasible = true;
                message = "Already reaches the target at the lower contribution bound.".to_string();
            } else if !high_eval.reached {
                feasible = false;
                message = "No contribution within the search bounds reaches the target.".to_string();
            } else {
                let (_lo, hi, done) = bisect(input, config, &mut iterations, |reached| !reached)?;
                converged = done;
                solved_value = Some(hi);
                feasible = true;
                message = if converged {
                    "Solved required monthly contribution.".to_string()
                } else {
                    "Reached max iterations before tolerance was met; returning best estimate."
                        .to_string()
                };
            }
        }
        FireGoalType::MaxExpenses => {
            if !low_eval.reached {
                feasible = false;
                message = "No expense level within the search bounds is reachable.".to_string();
            } else if high_eval.reached {
                solved_value = Some(config.search_max);
                converged = true;
                feasible = true;
                message = "Upper expense bound is still reachable; increase search max for a higher target."
                    .to_string();
            } else {
                let (lo, _hi, done) = bisect(input, config, &mut iterations, |reached| reached)?;
                converged = done;
                solved_value = Some(lo);
                feasible = true;
                message = if converged {
                    "Solved maximum sustainable monthly expenses.".to_string()
                } else {
                    "Reached max iterations before tolerance was met; returning best estimate."
                        .to_string()
                };
            }
        }
    }

    let achieved_horizon_months = match solved_value {
        Some(value) => Some(evaluate_candidate(input, config, value)?.horizon_months),
        None => None,
    };

    info!(
        goal = ?config.goal_type,
        solved_value = ?solved_value,
        feasible,
        converged,
        iterations = iterations.len(),
        "fire goal solved"
    );

    Ok(FireGoalResult {
        config,
        solved_value,
        achieved_horizon_months,
        iterations,
        converged,
        feasible,
        message,
    })
}

/// Halves `[search_min, search_max]`; `move_lower(reached)` decides which side the midpoint replaces.
fn bisect(
    input: &FireInput,
    config: FireGoalConfig,
    iterations: &mut Vec<FireGoalIteration>,
    move_lower: impl Fn(bool) -> bool,
) -> PlanResult<(f64, f64, bool)> {
    let mut lo = config.search_min;
    let mut hi = config.search_max;
    let mut it = 0;
    while it < config.max_iterations {
        it += 1;
        let mid = (lo + hi) * 0.5;
        let eval = evaluate_candidate(input, config, mid)?;
        iterations.push(FireGoalIteration {
            iteration: it,
            lower_bound: lo,
            upper_bound: hi,
            candidate_value: mid,
            horizon_months: eval.horizon_months,
            reached: eval.reached,
        });
        debug!(iteration = it, mid, reached = eval.reached, "bisection step");

        if move_lower(eval.reached) {
            lo = mid;
        } else {
            hi = mid;
        }

        if (hi - lo).abs() <= config.tolerance {
            return Ok((lo, hi, true));
        }
    }
    Ok((lo, hi, false))
}

#[derive(Debug, Clone, Copy)]
struct CandidateEval {
    horizon_months: u32,
    reached: bool,
}

fn evaluate_candidate(
    base_input: &FireInput,
    config: FireGoalConfig,
    candidate_value: f64,
) -> PlanResult<CandidateEval> {
    let mut input = base_input.clone();
    input.max_months = Some(config.target_months);
    match config.goal_type {
        FireGoalType::RequiredContribution => input.monthly_contribution = candidate_value.max(0.0),
        FireGoalType::MaxExpenses => input.monthly_expenses = candidate_value.max(0.0),
    }

    let result = calc_fire_plan(&input)?;
    Ok(CandidateEval {
        horizon_months: result.horizon_months,
        reached: result.is_achievable,
    })
}
