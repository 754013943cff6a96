use tracing::{debug, info, warn};

use super::types::{FireInput, FirePoint, FireResult, MAX_PROJECTION_MONTHS};
use crate::error::{PlanError, PlanResult};

const MAX_INFLATION: f64 = 0.5;
const MAX_REAL_RETURN: f64 = 0.5;
const MAX_SWR: f64 = 0.2;
const MAX_TAX_RATE: f64 = 0.5;

/// Human-readable validation errors; an empty list means the input is usable.
pub fn validate_fire_input(input: &FireInput) -> Vec<String> {
    let mut errors = Vec::new();

    if input.monthly_expenses.is_nan() || input.monthly_expenses <= 0.0 {
        errors.push("Monthly expenses must be greater than zero".to_string());
    }

    if input.monthly_contribution.is_nan() || input.monthly_contribution <= 0.0 {
        errors.push("Monthly contribution must be greater than zero".to_string());
    }

    if input.current_wealth.is_nan() || input.current_wealth < 0.0 {
        errors.push("Current wealth cannot be negative".to_string());
    }

    if !(0.0..=MAX_INFLATION).contains(&input.annual_inflation) {
        errors.push("Expected inflation must be between 0% and 50% per year".to_string());
    }

    if !(0.0..=MAX_REAL_RETURN).contains(&input.annual_real_return) {
        errors.push("Expected real return must be between 0% and 50% per year".to_string());
    }

    if !(input.safe_withdrawal_rate > 0.0 && input.safe_withdrawal_rate <= MAX_SWR) {
        errors.push("Safe withdrawal rate must be between 0% and 20% per year".to_string());
    }

    if input.safe_withdrawal_rate >= input.annual_real_return {
        errors.push("Safe withdrawal rate must be lower than the expected real return".to_string());
    }

    if let Some(tax_rate) = input.tax_rate {
        if !(0.0..=MAX_TAX_RATE).contains(&tax_rate) {
            errors.push("Tax rate must be between 0% and 50%".to_string());
        }
    }

    if input.max_months == Some(0) {
        errors.push("Maximum projection length must be at least one month".to_string());
    }

    if input.max_months.is_some_and(|months| months > MAX_PROJECTION_MONTHS) {
        errors.push(format!(
            "Maximum projection length cannot exceed {MAX_PROJECTION_MONTHS} months"
        ));
    }

    errors
}

/// `(1 + annual)^(1/12) - 1`.
pub fn monthly_rate(annual: f64) -> f64 {
    (1.0 + annual).powf(1.0 / 12.0) - 1.0
}

/// Fisher relation: `(1 + nominal) = (1 + real) * (1 + inflation)`.
pub fn fisher_nominal(real: f64, inflation: f64) -> f64 {
    (1.0 + real) * (1.0 + inflation) - 1.0
}

/// Wealth needed to fund `monthly_expenses` forever at the given withdrawal rate, in today's money.
pub fn target_wealth_real(monthly_expenses: f64, safe_withdrawal_rate: f64) -> PlanResult<f64> {
    if safe_withdrawal_rate <= 0.0 {
        return Err(PlanError::division_by_zero("target wealth (safe withdrawal rate)"));
    }
    Ok(monthly_expenses * 12.0 / safe_withdrawal_rate)
}

fn check_finite(input: &FireInput) -> PlanResult<()> {
    for (field, value) in [
        ("monthlyExpenses", input.monthly_expenses),
        ("monthlyContribution", input.monthly_contribution),
        ("currentWealth", input.current_wealth),
        ("annualInflation", input.annual_inflation),
        ("annualRealReturn", input.annual_real_return),
        ("safeWithdrawalRate", input.safe_withdrawal_rate),
        ("taxRate", input.tax_rate.unwrap_or(0.0)),
    ] {
        if !value.is_finite() {
            return Err(PlanError::invalid(field, "must be a finite number"));
        }
    }
    if input.max_months_or_default() > MAX_PROJECTION_MONTHS {
        return Err(PlanError::invalid(
            "maxMonths",
            format!("must not exceed {MAX_PROJECTION_MONTHS} months"),
        ));
    }
    if input.annual_inflation <= -1.0 {
        return Err(PlanError::invalid(
            "annualInflation",
            "must be above -100% to keep a positive price level",
        ));
    }
    Ok(())
}

/// Month-by-month accumulation until real wealth covers the target or `max_months` elapses.
pub fn calc_fire_plan(input: &FireInput) -> PlanResult<FireResult> {
    check_finite(input)?;

    let max_months = input.max_months_or_default();
    let tax_rate = input.tax_rate.unwrap_or(0.0);

    let monthly_inflation = monthly_rate(input.annual_inflation);
    let monthly_real_return = monthly_rate(input.annual_real_return);
    let monthly_nominal_return = fisher_nominal(monthly_real_return, monthly_inflation);
    let target_real = target_wealth_real(input.monthly_expenses, input.safe_withdrawal_rate)?;

    debug!(
        monthly_inflation,
        monthly_real_return, monthly_nominal_return, target_real, max_months, "fire plan parameters"
    );

    let mut wealth_nominal = input.current_wealth;
    let mut price_level = 1.0;
    let mut series = Vec::new();
    let mut reached_at = None;

    for month in 0..=max_months {
        let wealth_real = wealth_nominal / price_level;
        series.push(FirePoint {
            month,
            wealth_nominal,
            wealth_real,
            price_level,
        });

        if wealth_real >= target_real {
            reached_at = Some(month);
            break;
        }

        price_level *= 1.0 + monthly_inflation;
        let net_return = wealth_nominal * monthly_nominal_return * (1.0 - tax_rate);
        wealth_nominal += net_return + input.monthly_contribution;
    }

    // One past the bound marks "not reached".
    let horizon_months = reached_at.unwrap_or(max_months.saturating_add(1));
    let is_achievable = horizon_months <= max_months;
    if !is_achievable {
        warn!(max_months, "fire target not reached within the projection bound");
    }

    let final_price_level = (1.0 + input.annual_inflation).powf(horizon_months as f64 / 12.0);
    let result = FireResult {
        horizon_months,
        horizon_years: (horizon_months as f64 / 12.0 * 10.0).round() / 10.0,
        target_wealth_real: target_real,
        target_wealth_nominal: target_real * final_price_level,
        series,
        is_achievable,
        monthly_real_return,
        monthly_nominal_return,
    };

    info!(
        horizon_months = result.horizon_months,
        is_achievable = result.is_achievable,
        "fire plan calculated"
    );
    Ok(result)
}
