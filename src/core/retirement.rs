use std::collections::BTreeMap;

use tracing::{debug, info};

use super::fx::FxResolver;
use super::types::{
    CriticalAges, Currency, CurrencyPair, RetirementInput, RetirementProjection,
    RetirementResult, RetirementSummary,
};
use crate::error::{PlanError, PlanResult};

/// Fraction of required wealth below which a year is flagged as high risk.
pub const HIGH_RISK_FRACTION: f64 = 0.25;

/// Human-readable validation errors; an empty list means the input is usable.
pub fn validate_retirement_input(input: &RetirementInput) -> Vec<String> {
    let mut errors = Vec::new();

    if !(18..=100).contains(&input.current_age) {
        errors.push("Current age must be between 18 and 100".to_string());
    }

    if !(50..=100).contains(&input.retirement_age) {
        errors.push("Retirement age must be between 50 and 100".to_string());
    }

    if input.retirement_age <= input.current_age {
        errors.push("Retirement age must be greater than current age".to_string());
    }

    if !(60..=120).contains(&input.life_expectancy) {
        errors.push("Life expectancy must be between 60 and 120".to_string());
    }

    if input.life_expectancy <= input.retirement_age {
        errors.push("Life expectancy must be greater than retirement age".to_string());
    }

    if input.monthly_expenses.is_nan() || input.monthly_expenses <= 0.0 {
        errors.push("Monthly expenses must be greater than zero".to_string());
    }

    if !(0.0..=0.5).contains(&input.expense_inflation_rate) {
        errors.push("Inflation rate must be between 0% and 50%".to_string());
    }

    if !(input.safe_withdrawal_rate > 0.0 && input.safe_withdrawal_rate <= 0.2) {
        errors.push("Safe withdrawal rate must be between 0% and 20%".to_string());
    }

    if input.portfolio.is_empty() {
        errors.push("At least one holding must be included in the portfolio".to_string());
    }

    for income in &input.incomes {
        if income.monthly_amount.is_nan() || income.monthly_amount < 0.0 {
            errors.push(format!("Income '{}' cannot be negative", income.name));
        }
        if let Some(end_age) = income.end_age {
            if end_age < income.start_age {
                errors.push(format!(
                    "Income '{}' must end at or after its start age",
                    income.name
                ));
            }
        }
    }

    for holding in &input.portfolio {
        if holding.amount.is_nan() || holding.amount < 0.0 {
            errors.push(format!(
                "Holding amount in {} cannot be negative",
                holding.currency
            ));
        }
    }

    errors
}

/// Year-by-year lifetime projection in the base currency.
///
/// Wealth grows at the value-weighted average real return; once retired, the gap between
/// expenses and active incomes is withdrawn at the end of each year. The run stops at the
/// first year that leaves the portfolio empty.
pub fn calculate_retirement_plan(
    input: &RetirementInput,
    fx: &FxResolver,
) -> PlanResult<RetirementResult> {
    if input.retirement_age < input.current_age {
        return Err(PlanError::invalid(
            "retirementAge",
            "must not be lower than current age",
        ));
    }
    if input.life_expectancy < input.current_age {
        return Err(PlanError::invalid(
            "lifeExpectancy",
            "must not be lower than current age",
        ));
    }
    if input.safe_withdrawal_rate <= 0.0 {
        return Err(PlanError::division_by_zero("required wealth (safe withdrawal rate)"));
    }

    let base = &input.base_currency;
    let spend = &input.spend_currency;
    let years_to_retirement = input.retirement_age - input.current_age;
    let total_years = input.life_expectancy - input.current_age;

    let holding_values: Vec<f64> = input
        .portfolio
        .iter()
        .map(|h| h.amount * fx.spot(&h.currency, base))
        .collect();
    let initial_wealth_base: f64 = holding_values.iter().sum();
    let average_real_return = weighted_real_return(input, &holding_values, initial_wealth_base)?;

    debug!(
        initial_wealth_base,
        average_real_return, total_years, "retirement plan parameters"
    );

    let tracked = tracked_currencies(input);
    let mut series = Vec::with_capacity(total_years as usize + 1);
    let mut wealth_base = initial_wealth_base;

    for year in 0..=total_years {
        let age = input.current_age + year;
        let is_retired = age >= input.retirement_age;

        let expenses_spend =
            input.monthly_expenses * 12.0 * (1.0 + input.expense_inflation_rate).powi(year as i32);
        let expenses_base = expenses_spend * fx.path(spend, base, year);

        let incomes_base: f64 = input
            .incomes
            .iter()
            .filter(|income| income.is_active_at(age))
            .map(|income| {
                let nominal =
                    income.monthly_amount * 12.0 * (1.0 + income.inflation_rate).powi(year as i32);
                nominal * fx.path(&income.currency, base, year)
            })
            .sum();

        let withdrawal_base = (expenses_base - incomes_base).max(0.0);

        wealth_base *= 1.0 + average_real_return;
        if is_retired {
            wealth_base -= withdrawal_base;
        }

        let fx_rates: BTreeMap<CurrencyPair, f64> = tracked
            .iter()
            .map(|currency| {
                (
                    CurrencyPair::new(currency.clone(), base.clone()),
                    fx.path(currency, base, year),
                )
            })
            .collect();

        series.push(RetirementProjection {
            year,
            age,
            wealth_base: wealth_base.max(0.0),
            wealth_spend: wealth_base * fx.path(base, spend, year),
            expenses_base,
            incomes_base,
            withdrawal_base,
            fx_rates,
        });

        if wealth_base <= 0.0 {
            debug!(age, "portfolio depleted");
            break;
        }
    }

    let retirement_expenses_spend = input.monthly_expenses
        * 12.0
        * (1.0 + input.expense_inflation_rate).powi(years_to_retirement as i32);
    let fx_at_retirement = fx.path(spend, base, years_to_retirement);
    let required_wealth_base =
        retirement_expenses_spend * fx_at_retirement / input.safe_withdrawal_rate;
    let required_wealth_spend = retirement_expenses_spend / input.safe_withdrawal_rate;

    let final_wealth = series.last().map(|p| p.wealth_base).unwrap_or(0.0);
    let success_probability = if final_wealth > 0.0 { 1.0 } else { 0.0 };

    let summary = RetirementSummary {
        total_required_wealth: required_wealth_base,
        monthly_withdrawal_needed: required_wealth_base * input.safe_withdrawal_rate / 12.0,
        portfolio_gap_base: (required_wealth_base - initial_wealth_base).max(0.0),
        years_of_safety: series.iter().filter(|p| p.wealth_base > 0.0).count() as u32,
        critical_ages: CriticalAges {
            portfolio_depletion: series.iter().find(|p| p.wealth_base <= 0.0).map(|p| p.age),
            high_risk: series
                .iter()
                .find(|p| p.wealth_base < required_wealth_base * HIGH_RISK_FRACTION)
                .map(|p| p.age),
        },
    };

    info!(
        years = series.len(),
        success = success_probability > 0.0,
        required_wealth_base,
        "retirement plan calculated"
    );

    Ok(RetirementResult {
        years_to_retirement,
        initial_wealth_base,
        average_real_return,
        required_wealth_base,
        required_wealth_spend,
        success_probability,
        ruin_risk: 1.0 - success_probability,
        series,
        summary,
    })
}

fn weighted_real_return(
    input: &RetirementInput,
    holding_values: &[f64],
    total: f64,
) -> PlanResult<f64> {
    if total <= 0.0 {
        return Err(PlanError::division_by_zero(
            "portfolio return weighting (total portfolio value)",
        ));
    }
    Ok(input
        .portfolio
        .iter()
        .zip(holding_values)
        .map(|(holding, value)| holding.expected_real_return * value / total)
        .sum())
}

/// Non-base currencies reported in each year's FX map, in first-seen order.
fn tracked_currencies(input: &RetirementInput) -> Vec<Currency> {
    let mut currencies: Vec<Currency> = Vec::new();
    let candidates = std::iter::once(&input.spend_currency)
        .chain(input.incomes.iter().map(|income| &income.currency));
    for currency in candidates {
        if currency != &input.base_currency && !currencies.contains(currency) {
            currencies.push(currency.clone());
        }
    }
    currencies
}
