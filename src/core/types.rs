use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PlanError;

pub const DEFAULT_MAX_MONTHS: u32 = 1200;
/// Upper bound on any caller-chosen projection length (200 years).
pub const MAX_PROJECTION_MONTHS: u32 = 2 * DEFAULT_MAX_MONTHS;

/// ISO-style currency code, normalised to upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> Self {
        Currency(code.trim().to_ascii_uppercase())
    }

    /// Pivot currency for cross rates.
    pub fn usd() -> Self {
        Currency("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_usd(&self) -> bool {
        self.0 == "USD"
    }
}

impl From<String> for Currency {
    fn from(value: String) -> Self {
        Currency::new(&value)
    }
}

impl From<&str> for Currency {
    fn from(value: &str) -> Self {
        Currency::new(value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ordered (base, quote) pair. A rate for `BRL/USD` is the number of USD per one BRL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CurrencyPair {
    pub base: Currency,
    pub quote: Currency,
}

impl CurrencyPair {
    pub fn new(base: impl Into<Currency>, quote: impl Into<Currency>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    pub fn inverse(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for CurrencyPair {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, quote) = s
            .split_once('/')
            .ok_or_else(|| PlanError::invalid("currencyPair", format!("expected BASE/QUOTE, got {s:?}")))?;
        if base.trim().is_empty() || quote.trim().is_empty() {
            return Err(PlanError::invalid(
                "currencyPair",
                format!("empty currency code in {s:?}"),
            ));
        }
        Ok(CurrencyPair::new(base, quote))
    }
}

impl Serialize for CurrencyPair {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CurrencyPair {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FireInput {
    #[serde(alias = "baseCurrency")]
    pub currency: Currency,
    pub monthly_expenses: f64,
    pub monthly_contribution: f64,
    pub current_wealth: f64,
    /// Annual inflation as a decimal fraction.
    #[serde(alias = "expInflationAA")]
    pub annual_inflation: f64,
    /// Annual real (inflation-adjusted) return as a decimal fraction.
    #[serde(alias = "expReturnRealAA")]
    pub annual_real_return: f64,
    #[serde(alias = "swrAA", alias = "swr")]
    pub safe_withdrawal_rate: f64,
    /// Tax applied to investment growth only.
    #[serde(default)]
    pub tax_rate: Option<f64>,
    #[serde(default)]
    pub max_months: Option<u32>,
}

impl FireInput {
    pub fn max_months_or_default(&self) -> u32 {
        self.max_months.unwrap_or(DEFAULT_MAX_MONTHS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirePoint {
    pub month: u32,
    pub wealth_nominal: f64,
    pub wealth_real: f64,
    pub price_level: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FireResult {
    pub horizon_months: u32,
    pub horizon_years: f64,
    pub target_wealth_real: f64,
    pub target_wealth_nominal: f64,
    pub series: Vec<FirePoint>,
    pub is_achievable: bool,
    pub monthly_real_return: f64,
    pub monthly_nominal_return: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncomeType {
    Pension,
    SocialSecurity,
    Rental,
    Business,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Income {
    pub name: String,
    pub currency: Currency,
    pub monthly_amount: f64,
    pub start_age: u32,
    #[serde(default)]
    pub end_age: Option<u32>,
    pub inflation_rate: f64,
    #[serde(rename = "type")]
    pub kind: IncomeType,
}

impl Income {
    pub fn is_active_at(&self, age: u32) -> bool {
        age >= self.start_age && self.end_age.is_none_or(|end| age <= end)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldingClass {
    Equity,
    Bonds,
    RealEstate,
    Cash,
    Alternatives,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioHolding {
    pub currency: Currency,
    pub amount: f64,
    pub expected_real_return: f64,
    #[serde(default)]
    pub volatility: Option<f64>,
    pub asset_class: HoldingClass,
}

/// Caller-supplied override of the `base/quote` rate for one projection year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FxProjection {
    pub year: u32,
    pub base_currency: Currency,
    pub quote_currency: Currency,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementInput {
    pub base_currency: Currency,
    pub spend_currency: Currency,
    #[serde(default)]
    pub target_country: Option<String>,
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    /// In spend currency.
    pub monthly_expenses: f64,
    pub expense_inflation_rate: f64,
    pub safe_withdrawal_rate: f64,
    #[serde(default)]
    pub incomes: Vec<Income>,
    #[serde(default)]
    pub portfolio: Vec<PortfolioHolding>,
    #[serde(default)]
    pub fx_assumptions: Vec<FxProjection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementProjection {
    pub year: u32,
    pub age: u32,
    pub wealth_base: f64,
    pub wealth_spend: f64,
    pub expenses_base: f64,
    pub incomes_base: f64,
    pub withdrawal_base: f64,
    pub fx_rates: BTreeMap<CurrencyPair, f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalAges {
    pub portfolio_depletion: Option<u32>,
    pub high_risk: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementSummary {
    pub total_required_wealth: f64,
    pub monthly_withdrawal_needed: f64,
    pub portfolio_gap_base: f64,
    pub years_of_safety: u32,
    pub critical_ages: CriticalAges,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementResult {
    pub years_to_retirement: u32,
    pub initial_wealth_base: f64,
    pub average_real_return: f64,
    pub required_wealth_base: f64,
    pub required_wealth_spend: f64,
    /// 1.0 when the single deterministic path ends with wealth left, else 0.0.
    pub success_probability: f64,
    pub ruin_risk: f64,
    pub series: Vec<RetirementProjection>,
    pub summary: RetirementSummary,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shock {
    /// Relative index move, e.g. `-0.4` for a 40% drop.
    #[serde(default, alias = "equityIdx")]
    pub equity_index_change: Option<f64>,
    /// Target policy rate in absolute terms, e.g. `0.15`.
    #[serde(default, alias = "rateAbs")]
    pub rate_absolute_target: Option<f64>,
    /// Relative USD move against the home currency.
    #[serde(default, alias = "fxUSD", alias = "fxUsd")]
    pub fx_usd_change: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketContext {
    pub current_rate: f64,
    pub current_fx_rate: f64,
    pub current_index: f64,
}

impl Default for MarketContext {
    fn default() -> Self {
        Self {
            current_rate: 0.1375,
            current_fx_rate: 5.2,
            current_index: 100_000.0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Equity,
    Bond,
    #[serde(rename = "FII", alias = "Fii")]
    Fii,
    Cash,
    #[serde(rename = "FX", alias = "Fx")]
    Fx,
    Crypto,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta_ifix: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_years: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_mod: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_like: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub id: String,
    pub ticker: String,
    pub name: String,
    #[serde(alias = "assetClass")]
    pub asset_class: AssetClass,
    pub currency: Currency,
    #[serde(default)]
    pub metadata: AssetMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub id: String,
    pub asset: Asset,
    pub quantity: f64,
    pub price: f64,
    /// Expected to equal `quantity * price`.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResult {
    #[serde(flatten)]
    pub position: Position,
    pub rel_change: f64,
    pub new_price: f64,
    pub new_value: f64,
    pub absolute_loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassResult {
    #[serde(rename = "class")]
    pub asset_class: AssetClass,
    pub value_before: f64,
    pub value_after: f64,
    pub change: f64,
    pub rel_change: f64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ShockFactor {
    #[serde(rename = "Equity Market")]
    Equity,
    #[serde(rename = "Interest Rates")]
    Rate,
    #[serde(rename = "USD Exchange Rate")]
    Fx,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SensitivityResult {
    pub factor: ShockFactor,
    pub impact: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub value_before: f64,
    pub value_after: f64,
    pub drop: f64,
    pub total_loss: f64,
    pub items: Vec<PositionResult>,
    pub by_class: Vec<ClassResult>,
    pub top_losers: Vec<PositionResult>,
    pub sensitivities: Vec<SensitivityResult>,
}
