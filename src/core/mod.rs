mod crisis;
mod fire;
mod format;
mod fx;
mod retirement;
mod solver;
mod types;

pub use crisis::{
    AggregateSensitivity, BondSensitivity, CashSensitivity, CrisisPreset, CryptoSensitivity,
    EquitySensitivity, FiiSensitivity, PRICE_FLOOR, SensitivityModel, TOP_LOSERS, simulate_crisis,
    simulate_crisis_with_model, validate_positions, validate_shocks,
};
pub use fire::{calc_fire_plan, fisher_nominal, monthly_rate, target_wealth_real, validate_fire_input};
pub use format::{
    DEFAULT_DISPLAY_CURRENCY, currency_symbol, format_currency, format_percentage,
    format_time_horizon,
};
pub use fx::FxResolver;
pub use retirement::{HIGH_RISK_FRACTION, calculate_retirement_plan, validate_retirement_input};
pub use solver::{
    FireGoalConfig, FireGoalIteration, FireGoalResult, FireGoalType, MAX_SOLVER_ITERATIONS,
    solve_fire_goal, validate_solve_config,
};
pub use types::{
    Asset, AssetClass, AssetMetadata, ClassResult, CriticalAges, Currency, CurrencyPair,
    DEFAULT_MAX_MONTHS, FireInput, MAX_PROJECTION_MONTHS, FirePoint, FireResult, FxProjection, HoldingClass, Income,
    IncomeType, MarketContext, PortfolioHolding, Position, PositionResult, RetirementInput,
    RetirementProjection, RetirementResult, RetirementSummary, SensitivityResult, Shock,
    ShockFactor, SimulationResult,
};
