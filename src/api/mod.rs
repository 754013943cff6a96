use std::collections::BTreeMap;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::{Json, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    CrisisPreset, Currency, DEFAULT_MAX_MONTHS, FireGoalConfig, FireGoalResult, FireGoalType,
    FireInput, FireResult, FxProjection, FxResolver, HoldingClass, Income, IncomeType,
    MarketContext, PortfolioHolding, Position, RetirementInput, RetirementResult, Shock,
    SimulationResult, calc_fire_plan, calculate_retirement_plan, format_currency,
    format_percentage, format_time_horizon, simulate_crisis, solve_fire_goal,
    validate_fire_input, validate_positions, validate_retirement_input, validate_shocks,
    validate_solve_config,
};
use crate::error::{PlanError, PlanResult};

const DEFAULT_GOAL_TARGET_MONTHS: u32 = 240;
const DEFAULT_GOAL_SEARCH_MAX: f64 = 100_000.0;
const DEFAULT_GOAL_TOLERANCE: f64 = 1.0;
const DEFAULT_GOAL_MAX_ITERATIONS: u32 = 64;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirePayload {
    #[serde(alias = "baseCurrency")]
    currency: Option<Currency>,
    monthly_expenses: Option<f64>,
    monthly_contribution: Option<f64>,
    current_wealth: Option<f64>,
    #[serde(alias = "expInflationAA")]
    annual_inflation: Option<f64>,
    #[serde(alias = "expReturnRealAA")]
    annual_real_return: Option<f64>,
    #[serde(alias = "swrAA", alias = "swr")]
    safe_withdrawal_rate: Option<f64>,
    tax_rate: Option<f64>,
    max_months: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GoalPayload {
    goal_type: Option<FireGoalType>,
    target_months: Option<u32>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FireSolvePayload {
    #[serde(flatten)]
    fire: FirePayload,
    goal: GoalPayload,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetirementPayload {
    base_currency: Option<Currency>,
    spend_currency: Option<Currency>,
    target_country: Option<String>,
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    life_expectancy: Option<u32>,
    monthly_expenses: Option<f64>,
    expense_inflation_rate: Option<f64>,
    safe_withdrawal_rate: Option<f64>,
    incomes: Option<Vec<Income>>,
    portfolio: Option<Vec<PortfolioHolding>>,
    fx_assumptions: Option<Vec<FxProjection>>,
    /// `base -> quote -> rate`.
    fx_rates: Option<BTreeMap<Currency, BTreeMap<Currency, f64>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrisisPayload {
    positions: Option<Vec<Position>>,
    shocks: Option<Shock>,
    preset: Option<CrisisPreset>,
    context: Option<MarketContext>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FireDisplay {
    target_wealth: String,
    target_wealth_nominal: String,
    horizon: String,
    safe_withdrawal_rate: String,
    annual_real_return: String,
}

#[derive(Debug, Serialize)]
pub struct FireResponse {
    input: FireInput,
    result: FireResult,
    display: FireDisplay,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FireSolveDisplay {
    solved_value: Option<String>,
    achieved_horizon: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FireSolveResponse {
    input: FireInput,
    result: FireGoalResult,
    display: FireSolveDisplay,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementDisplay {
    required_wealth: String,
    required_wealth_spend: String,
    initial_wealth: String,
    monthly_withdrawal: String,
    portfolio_gap: String,
    success_probability: String,
    time_to_retirement: String,
}

#[derive(Debug, Serialize)]
pub struct RetirementResponse {
    input: RetirementInput,
    result: RetirementResult,
    display: RetirementDisplay,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrisisDisplay {
    value_before: String,
    value_after: String,
    total_loss: String,
    drop: String,
}

#[derive(Debug, Serialize)]
pub struct CrisisResponse {
    shock: Shock,
    context: MarketContext,
    result: SimulationResult,
    display: CrisisDisplay,
}

#[derive(Debug, Serialize)]
pub struct PresetView {
    id: CrisisPreset,
    label: &'static str,
    shock: Shock,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    details: Vec<String>,
}

pub fn router() -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/fire", post(fire_handler))
        .route("/api/fire/solve", post(fire_solve_handler))
        .route("/api/retirement", post(retirement_handler))
        .route("/api/crisis", post(crisis_handler))
        .route("/api/crisis/presets", get(presets_handler))
        .fallback(not_found_handler)
}

pub async fn run_http_server(addr: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "wealth planning API listening");
    axum::serve(listener, router()).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found", Vec::new())
}

async fn fire_handler(payload: Result<Json<FirePayload>, JsonRejection>) -> Response {
    respond(payload, fire_response)
}

async fn fire_solve_handler(payload: Result<Json<FireSolvePayload>, JsonRejection>) -> Response {
    respond(payload, fire_solve_response)
}

async fn retirement_handler(payload: Result<Json<RetirementPayload>, JsonRejection>) -> Response {
    respond(payload, retirement_response)
}

async fn crisis_handler(payload: Result<Json<CrisisPayload>, JsonRejection>) -> Response {
    respond(payload, crisis_response)
}

async fn presets_handler() -> Response {
    json_response(StatusCode::OK, preset_catalogue())
}

fn respond<P, T: Serialize>(
    payload: Result<Json<P>, JsonRejection>,
    build: impl FnOnce(P) -> PlanResult<T>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid JSON payload: {}", rejection.body_text()),
                Vec::new(),
            );
        }
    };
    match build(payload) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(err) => plan_error_response(err),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str, details: Vec<String>) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            details,
        },
    )
}

fn plan_error_response(err: PlanError) -> Response {
    let status = match err {
        PlanError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    };
    warn!(%err, "request rejected");
    let details = match &err {
        PlanError::Validation(errors) => errors.clone(),
        _ => Vec::new(),
    };
    error_response(status, &err.to_string(), details)
}

fn default_fire_input() -> FireInput {
    FireInput {
        currency: Currency::new("BRL"),
        monthly_expenses: 5_000.0,
        monthly_contribution: 2_000.0,
        current_wealth: 50_000.0,
        annual_inflation: 0.04,
        annual_real_return: 0.06,
        safe_withdrawal_rate: 0.04,
        tax_rate: Some(0.15),
        max_months: Some(DEFAULT_MAX_MONTHS),
    }
}

pub fn fire_input_from_payload(payload: FirePayload) -> FireInput {
    let mut input = default_fire_input();

    if let Some(v) = payload.currency {
        input.currency = v;
    }
    if let Some(v) = payload.monthly_expenses {
        input.monthly_expenses = v;
    }
    if let Some(v) = payload.monthly_contribution {
        input.monthly_contribution = v;
    }
    if let Some(v) = payload.current_wealth {
        input.current_wealth = v;
    }
    if let Some(v) = payload.annual_inflation {
        input.annual_inflation = v;
    }
    if let Some(v) = payload.annual_real_return {
        input.annual_real_return = v;
    }
    if let Some(v) = payload.safe_withdrawal_rate {
        input.safe_withdrawal_rate = v;
    }
    if payload.tax_rate.is_some() {
        input.tax_rate = payload.tax_rate;
    }
    if payload.max_months.is_some() {
        input.max_months = payload.max_months;
    }

    input
}

pub fn fire_response(payload: FirePayload) -> PlanResult<FireResponse> {
    let input = fire_input_from_payload(payload);
    PlanError::from_validation(validate_fire_input(&input))?;
    let result = calc_fire_plan(&input)?;

    let code = Some(input.currency.as_str());
    let horizon = if result.is_achievable {
        format_time_horizon(result.horizon_months)
    } else {
        format!(
            "Not reached within {}",
            format_time_horizon(input.max_months_or_default())
        )
    };
    let display = FireDisplay {
        target_wealth: format_currency(result.target_wealth_real, code),
        target_wealth_nominal: format_currency(result.target_wealth_nominal, code),
        horizon,
        safe_withdrawal_rate: format_percentage(input.safe_withdrawal_rate),
        annual_real_return: format_percentage(input.annual_real_return),
    };

    Ok(FireResponse {
        input,
        result,
        display,
    })
}

pub fn goal_config_from_payload(payload: GoalPayload) -> FireGoalConfig {
    FireGoalConfig {
        goal_type: payload
            .goal_type
            .unwrap_or(FireGoalType::RequiredContribution),
        target_months: payload.target_months.unwrap_or(DEFAULT_GOAL_TARGET_MONTHS),
        search_min: payload.search_min.unwrap_or(0.0),
        search_max: payload.search_max.unwrap_or(DEFAULT_GOAL_SEARCH_MAX),
        tolerance: payload.tolerance.unwrap_or(DEFAULT_GOAL_TOLERANCE),
        max_iterations: payload
            .max_iterations
            .unwrap_or(DEFAULT_GOAL_MAX_ITERATIONS),
    }
}

pub fn fire_solve_response(payload: FireSolvePayload) -> PlanResult<FireSolveResponse> {
    let input = fire_input_from_payload(payload.fire);
    let config = goal_config_from_payload(payload.goal);

    // The solved field is validated at the top of its search range.
    let mut probe = input.clone();
    match config.goal_type {
        FireGoalType::RequiredContribution => probe.monthly_contribution = config.search_max,
        FireGoalType::MaxExpenses => probe.monthly_expenses = config.search_max,
    }
    let mut errors = validate_solve_config(&config);
    errors.extend(validate_fire_input(&probe));
    PlanError::from_validation(errors)?;

    let result = solve_fire_goal(&input, config)?;
    let code = Some(input.currency.as_str());
    let display = FireSolveDisplay {
        solved_value: result.solved_value.map(|v| format_currency(v, code)),
        achieved_horizon: result.achieved_horizon_months.map(format_time_horizon),
    };

    Ok(FireSolveResponse {
        input,
        result,
        display,
    })
}

fn default_retirement_input() -> RetirementInput {
    RetirementInput {
        base_currency: Currency::new("BRL"),
        spend_currency: Currency::new("EUR"),
        target_country: None,
        current_age: 35,
        retirement_age: 60,
        life_expectancy: 85,
        monthly_expenses: 3_000.0,
        expense_inflation_rate: 0.03,
        safe_withdrawal_rate: 0.04,
        incomes: vec![Income {
            name: "INSS".to_string(),
            currency: Currency::new("BRL"),
            monthly_amount: 2_500.0,
            start_age: 65,
            end_age: None,
            inflation_rate: 0.04,
            kind: IncomeType::SocialSecurity,
        }],
        portfolio: vec![
            PortfolioHolding {
                currency: Currency::new("BRL"),
                amount: 200_000.0,
                expected_real_return: 0.06,
                volatility: None,
                asset_class: HoldingClass::Equity,
            },
            PortfolioHolding {
                currency: Currency::new("USD"),
                amount: 50_000.0,
                expected_real_return: 0.07,
                volatility: None,
                asset_class: HoldingClass::Equity,
            },
        ],
        fx_assumptions: Vec::new(),
    }
}

pub fn retirement_input_from_payload(
    payload: RetirementPayload,
) -> (RetirementInput, BTreeMap<Currency, BTreeMap<Currency, f64>>) {
    let mut input = default_retirement_input();

    if let Some(v) = payload.base_currency {
        input.base_currency = v;
    }
    if let Some(v) = payload.spend_currency {
        input.spend_currency = v;
    }
    if payload.target_country.is_some() {
        input.target_country = payload.target_country;
    }
    if let Some(v) = payload.current_age {
        input.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        input.retirement_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        input.life_expectancy = v;
    }
    if let Some(v) = payload.monthly_expenses {
        input.monthly_expenses = v;
    }
    if let Some(v) = payload.expense_inflation_rate {
        input.expense_inflation_rate = v;
    }
    if let Some(v) = payload.safe_withdrawal_rate {
        input.safe_withdrawal_rate = v;
    }
    if let Some(v) = payload.incomes {
        input.incomes = v;
    }
    if let Some(v) = payload.portfolio {
        input.portfolio = v;
    }
    if let Some(v) = payload.fx_assumptions {
        input.fx_assumptions = v;
    }

    (input, payload.fx_rates.unwrap_or_default())
}

pub fn retirement_response(payload: RetirementPayload) -> PlanResult<RetirementResponse> {
    let (input, fx_rates) = retirement_input_from_payload(payload);
    PlanError::from_validation(validate_retirement_input(&input))?;

    let fx = FxResolver::from_nested(&fx_rates)?.with_projections(&input.fx_assumptions)?;
    let result = calculate_retirement_plan(&input, &fx)?;

    let base = Some(input.base_currency.as_str());
    let spend = Some(input.spend_currency.as_str());
    let display = RetirementDisplay {
        required_wealth: format_currency(result.required_wealth_base, base),
        required_wealth_spend: format_currency(result.required_wealth_spend, spend),
        initial_wealth: format_currency(result.initial_wealth_base, base),
        monthly_withdrawal: format_currency(result.summary.monthly_withdrawal_needed, base),
        portfolio_gap: format_currency(result.summary.portfolio_gap_base, base),
        success_probability: format_percentage(result.success_probability),
        time_to_retirement: format_time_horizon(result.years_to_retirement * 12),
    };

    Ok(RetirementResponse {
        input,
        result,
        display,
    })
}

pub fn crisis_response(payload: CrisisPayload) -> PlanResult<CrisisResponse> {
    let positions = payload
        .positions
        .ok_or_else(|| PlanError::invalid("positions", "is required"))?;
    let shock = match (payload.shocks, payload.preset) {
        (Some(shock), _) => shock,
        (None, Some(preset)) => preset.shock(),
        (None, None) => CrisisPreset::Baseline.shock(),
    };
    let context = payload.context.unwrap_or_default();

    let mut errors = validate_shocks(&shock);
    errors.extend(validate_positions(&positions));
    PlanError::from_validation(errors)?;

    let result = simulate_crisis(&positions, &shock, &context);
    let display = CrisisDisplay {
        value_before: format_currency(result.value_before, None),
        value_after: format_currency(result.value_after, None),
        total_loss: format_currency(result.total_loss, None),
        drop: format_percentage(result.drop),
    };

    Ok(CrisisResponse {
        shock,
        context,
        result,
        display,
    })
}

pub fn preset_catalogue() -> Vec<PresetView> {
    CrisisPreset::ALL
        .iter()
        .map(|preset| PresetView {
            id: *preset,
            label: preset.label(),
            shock: preset.shock(),
        })
        .collect()
}
