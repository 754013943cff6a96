use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::types::{
    Asset, AssetClass, ClassResult, MarketContext, Position, PositionResult, SensitivityResult,
    Shock, ShockFactor, SimulationResult,
};

pub const DEFAULT_EQUITY_BETA: f64 = 1.0;
pub const DEFAULT_BOND_DURATION: f64 = 5.0;
pub const DEFAULT_FII_BETA: f64 = 0.8;
pub const DEFAULT_FII_DURATION: f64 = 2.0;
pub const FII_RATE_WEIGHT: f64 = 0.5;
pub const DEFAULT_CRYPTO_BETA: f64 = 2.0;
pub const CRYPTO_DOWNSIDE_MULTIPLIER: f64 = 1.2;
pub const DEFAULT_CASH_DURATION: f64 = 0.1;
pub const AGGREGATE_EQUITY_BETA: f64 = 0.8;
pub const AGGREGATE_DURATION: f64 = 4.0;
pub const PRICE_FLOOR: f64 = 0.01;
pub const TOP_LOSERS: usize = 5;

const POSITION_VALUE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EquitySensitivity {
    pub default_beta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BondSensitivity {
    pub default_duration: f64,
}

/// Real-estate funds: an equity leg plus a damped duration leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiiSensitivity {
    pub default_beta: f64,
    pub default_duration: f64,
    pub rate_weight: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CryptoSensitivity {
    pub default_beta: f64,
    /// Applied to the whole relative change when the equity shock is negative.
    pub downside_multiplier: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CashSensitivity {
    pub default_duration: f64,
}

/// Portfolio-level constants for the factor breakdown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateSensitivity {
    pub equity_beta: f64,
    pub duration: f64,
}

/// Per-asset-class shock model with every default spelled out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensitivityModel {
    pub equity: EquitySensitivity,
    pub bond: BondSensitivity,
    pub fii: FiiSensitivity,
    pub crypto: CryptoSensitivity,
    pub cash: CashSensitivity,
    pub aggregate: AggregateSensitivity,
    pub price_floor: f64,
}

impl Default for SensitivityModel {
    fn default() -> Self {
        Self {
            equity: EquitySensitivity {
                default_beta: DEFAULT_EQUITY_BETA,
            },
            bond: BondSensitivity {
                default_duration: DEFAULT_BOND_DURATION,
            },
            fii: FiiSensitivity {
                default_beta: DEFAULT_FII_BETA,
                default_duration: DEFAULT_FII_DURATION,
                rate_weight: FII_RATE_WEIGHT,
            },
            crypto: CryptoSensitivity {
                default_beta: DEFAULT_CRYPTO_BETA,
                downside_multiplier: CRYPTO_DOWNSIDE_MULTIPLIER,
            },
            cash: CashSensitivity {
                default_duration: DEFAULT_CASH_DURATION,
            },
            aggregate: AggregateSensitivity {
                equity_beta: AGGREGATE_EQUITY_BETA,
                duration: AGGREGATE_DURATION,
            },
            price_floor: PRICE_FLOOR,
        }
    }
}

impl SensitivityModel {
    /// Relative price change of one asset under `shock`.
    pub fn relative_change(&self, asset: &Asset, shock: &Shock, context: &MarketContext) -> f64 {
        let meta = &asset.metadata;
        let equity_shock = shock.equity_index_change.unwrap_or(0.0);
        let yield_change = shock
            .rate_absolute_target
            .map(|target| target - context.current_rate);

        let mut change = match asset.asset_class {
            AssetClass::Equity => equity_shock * meta.beta.unwrap_or(self.equity.default_beta),
            AssetClass::Bond => yield_change.map_or(0.0, |dy| {
                let duration = meta
                    .duration_mod
                    .or(meta.duration_years)
                    .unwrap_or(self.bond.default_duration);
                -duration * dy
            }),
            AssetClass::Fii => {
                let equity_leg = equity_shock * meta.beta_ifix.unwrap_or(self.fii.default_beta);
                let rate_leg = yield_change.map_or(0.0, |dy| {
                    let duration = meta.duration_like.unwrap_or(self.fii.default_duration);
                    -duration * dy * self.fii.rate_weight
                });
                equity_leg + rate_leg
            }
            AssetClass::Crypto => equity_shock * meta.beta.unwrap_or(self.crypto.default_beta),
            AssetClass::Cash => yield_change.map_or(0.0, |dy| {
                -meta.duration_mod.unwrap_or(self.cash.default_duration) * dy
            }),
            AssetClass::Fx => 0.0,
        };

        if asset.currency.is_usd() {
            change += shock.fx_usd_change.unwrap_or(0.0);
        }

        if asset.asset_class == AssetClass::Crypto && is_down_market(shock) {
            change *= self.crypto.downside_multiplier;
        }

        change
    }

    pub fn shock_position(
        &self,
        position: &Position,
        shock: &Shock,
        context: &MarketContext,
    ) -> PositionResult {
        let rel_change = self.relative_change(&position.asset, shock, context);
        let new_price = (position.price * (1.0 + rel_change)).max(self.price_floor);
        let new_value = new_price * position.quantity;
        PositionResult {
            position: position.clone(),
            rel_change,
            new_price,
            new_value,
            absolute_loss: position.value - new_value,
        }
    }

    /// Approximate aggregate impact per active shock factor, largest magnitude first.
    pub fn sensitivities(
        &self,
        positions: &[Position],
        shock: &Shock,
        context: &MarketContext,
    ) -> Vec<SensitivityResult> {
        let mut out = Vec::new();

        if let Some(equity) = shock.equity_index_change.filter(|v| *v != 0.0) {
            let exposed = value_where(positions, |p| {
                matches!(
                    p.asset.asset_class,
                    AssetClass::Equity | AssetClass::Fii | AssetClass::Crypto
                )
            });
            let impact = exposed * equity.abs() * self.aggregate.equity_beta;
            out.push(SensitivityResult {
                factor: ShockFactor::Equity,
                impact: -impact,
                description: format!("{:.1}% equity market shock", equity * 100.0),
            });
        }

        if let Some(target) = shock.rate_absolute_target {
            let dy = target - context.current_rate;
            let exposed = value_where(positions, |p| {
                matches!(p.asset.asset_class, AssetClass::Bond | AssetClass::Fii)
            });
            let impact = exposed * dy.abs() * self.aggregate.duration;
            out.push(SensitivityResult {
                factor: ShockFactor::Rate,
                impact: if dy > 0.0 { -impact } else { impact },
                description: format!("Interest rates to {:.2}%", target * 100.0),
            });
        }

        if let Some(fx) = shock.fx_usd_change.filter(|v| *v != 0.0) {
            let exposed = value_where(positions, |p| p.asset.currency.is_usd());
            let impact = exposed * fx.abs();
            out.push(SensitivityResult {
                factor: ShockFactor::Fx,
                impact: if fx > 0.0 { impact } else { -impact },
                description: format!("{:.1}% USD exchange rate change", fx * 100.0),
            });
        }

        out.sort_by(|a, b| b.impact.abs().total_cmp(&a.impact.abs()));
        out
    }
}

fn is_down_market(shock: &Shock) -> bool {
    shock.equity_index_change.is_some_and(|v| v < 0.0)
}

fn value_where(positions: &[Position], pred: impl Fn(&Position) -> bool) -> f64 {
    positions.iter().filter(|p| pred(p)).map(|p| p.value).sum()
}

pub fn validate_shocks(shock: &Shock) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(equity) = shock.equity_index_change {
        if !(-0.8..=1.0).contains(&equity) {
            errors.push("Equity shock must be between -80% and +100%".to_string());
        }
    }

    if let Some(rate) = shock.rate_absolute_target {
        if !(0.0..=0.5).contains(&rate) {
            errors.push("Interest rate must be between 0% and 50%".to_string());
        }
    }

    if let Some(fx) = shock.fx_usd_change {
        if !(-0.5..=1.0).contains(&fx) {
            errors.push("FX shock must be between -50% and +100%".to_string());
        }
    }

    errors
}

/// Checks the `value == quantity * price` contract and sign constraints of each position.
pub fn validate_positions(positions: &[Position]) -> Vec<String> {
    let mut errors = Vec::new();
    for position in positions {
        let ticker = &position.asset.ticker;
        if position.quantity.is_nan() || position.quantity < 0.0 {
            errors.push(format!("{ticker}: quantity cannot be negative"));
        }
        if position.price.is_nan() || position.price < 0.0 {
            errors.push(format!("{ticker}: price cannot be negative"));
        }
        let implied = position.quantity * position.price;
        let tolerance = POSITION_VALUE_TOLERANCE * position.value.abs().max(1.0);
        if (implied - position.value).abs() > tolerance || implied.is_nan() {
            errors.push(format!(
                "{ticker}: value {} does not match quantity x price {}",
                position.value, implied
            ));
        }
    }
    errors
}

pub fn simulate_crisis(
    positions: &[Position],
    shock: &Shock,
    context: &MarketContext,
) -> SimulationResult {
    simulate_crisis_with_model(&SensitivityModel::default(), positions, shock, context)
}

pub fn simulate_crisis_with_model(
    model: &SensitivityModel,
    positions: &[Position],
    shock: &Shock,
    context: &MarketContext,
) -> SimulationResult {
    debug!(positions = positions.len(), ?shock, "simulating crisis");

    let items: Vec<PositionResult> = positions
        .iter()
        .map(|position| model.shock_position(position, shock, context))
        .collect();

    let value_before: f64 = positions.iter().map(|p| p.value).sum();
    let value_after: f64 = items.iter().map(|item| item.new_value).sum();
    let drop = if value_before > 0.0 {
        value_after / value_before - 1.0
    } else {
        0.0
    };

    let by_class = aggregate_by_class(&items);

    let mut top_losers: Vec<PositionResult> = items
        .iter()
        .filter(|item| item.absolute_loss > 0.0)
        .cloned()
        .collect();
    top_losers.sort_by(|a, b| b.absolute_loss.total_cmp(&a.absolute_loss));
    top_losers.truncate(TOP_LOSERS);

    let sensitivities = model.sensitivities(positions, shock, context);

    info!(value_before, value_after, drop, "crisis simulated");

    SimulationResult {
        value_before,
        value_after,
        drop,
        total_loss: value_before - value_after,
        items,
        by_class,
        top_losers,
        sensitivities,
    }
}

fn aggregate_by_class(items: &[PositionResult]) -> Vec<ClassResult> {
    let mut totals: BTreeMap<AssetClass, (f64, f64)> = BTreeMap::new();
    for item in items {
        let entry = totals
            .entry(item.position.asset.asset_class)
            .or_insert((0.0, 0.0));
        entry.0 += item.position.value;
        entry.1 += item.new_value;
    }

    totals
        .into_iter()
        .map(|(asset_class, (before, after))| ClassResult {
            asset_class,
            value_before: before,
            value_after: after,
            change: after - before,
            rel_change: if before > 0.0 { after / before - 1.0 } else { 0.0 },
        })
        .collect()
}

/// Canned stress scenarios.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrisisPreset {
    Moderate,
    Severe,
    Extreme,
    #[serde(alias = "default")]
    Baseline,
}

impl CrisisPreset {
    pub const ALL: [CrisisPreset; 4] = [
        CrisisPreset::Moderate,
        CrisisPreset::Severe,
        CrisisPreset::Extreme,
        CrisisPreset::Baseline,
    ];

    pub fn shock(self) -> Shock {
        let (equity, rate, fx) = match self {
            CrisisPreset::Moderate => (-0.2, 0.16, 0.15),
            CrisisPreset::Severe => (-0.4, 0.18, 0.3),
            CrisisPreset::Extreme => (-0.6, 0.2, 0.5),
            CrisisPreset::Baseline => (-0.4, 0.15, 0.25),
        };
        Shock {
            equity_index_change: Some(equity),
            rate_absolute_target: Some(rate),
            fx_usd_change: Some(fx),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CrisisPreset::Moderate => "Moderate crisis",
            CrisisPreset::Severe => "Severe crisis",
            CrisisPreset::Extreme => "Extreme crisis",
            CrisisPreset::Baseline => "Baseline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AssetMetadata, Currency};
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS * expected.abs().max(1.0),
            "expected {expected}, got {actual}"
        );
    }

    fn position(
        ticker: &str,
        asset_class: AssetClass,
        currency: &str,
        metadata: AssetMetadata,
        quantity: f64,
        price: f64,
    ) -> Position {
        Position {
            id: ticker.to_string(),
            asset: Asset {
                id: ticker.to_string(),
                ticker: ticker.to_string(),
                name: ticker.to_string(),
                asset_class,
                currency: Currency::new(currency),
                metadata,
            },
            quantity,
            price,
            value: quantity * price,
        }
    }

    fn equity_only(change: f64) -> Shock {
        Shock {
            equity_index_change: Some(change),
            ..Shock::default()
        }
    }

    fn context() -> MarketContext {
        MarketContext {
            current_rate: 0.10,
            ..MarketContext::default()
        }
    }

    fn sample_positions() -> Vec<Position> {
        vec![
            position(
                "PETR4",
                AssetClass::Equity,
                "BRL",
                AssetMetadata {
                    beta: Some(1.2),
                    sector: Some("Energy".to_string()),
                    ..AssetMetadata::default()
                },
                100.0,
                35.5,
            ),
            position(
                "XPML11",
                AssetClass::Fii,
                "BRL",
                AssetMetadata {
                    beta_ifix: Some(0.8),
                    duration_like: Some(2.5),
                    ..AssetMetadata::default()
                },
                50.0,
                98.2,
            ),
            position(
                "NTNB-2035",
                AssetClass::Bond,
                "BRL",
                AssetMetadata {
                    duration_years: Some(8.5),
                    duration_mod: Some(8.2),
                    ..AssetMetadata::default()
                },
                10.0,
                2_850.0,
            ),
            position(
                "IVVB11",
                AssetClass::Equity,
                "USD",
                AssetMetadata {
                    beta: Some(1.0),
                    ..AssetMetadata::default()
                },
                20.0,
                280.0,
            ),
        ]
    }

    #[test]
    fn cash_ignores_equity_shock() {
        let cash = position("CASH", AssetClass::Cash, "BRL", AssetMetadata::default(), 1_000.0, 1.0);
        let result = simulate_crisis(&[cash], &equity_only(-0.3), &context());
        assert_approx(result.items[0].new_value, 1_000.0);
        assert_approx(result.value_after, 1_000.0);
        assert!(result.top_losers.is_empty());
    }

    #[test]
    fn unit_beta_equity_tracks_the_index() {
        let stock = position(
            "STK",
            AssetClass::Equity,
            "BRL",
            AssetMetadata {
                beta: Some(1.0),
                ..AssetMetadata::default()
            },
            10.0,
            100.0,
        );
        let result = simulate_crisis(&[stock], &equity_only(-0.3), &context());
        assert_approx(result.items[0].new_value, 700.0);
        assert_approx(result.items[0].absolute_loss, 300.0);
        assert_approx(result.drop, -0.3);
        assert_approx(result.total_loss, 300.0);
    }

    #[test]
    fn equity_beta_defaults_to_one() {
        let stock = position("STK", AssetClass::Equity, "BRL", AssetMetadata::default(), 1.0, 100.0);
        let model = SensitivityModel::default();
        assert_approx(
            model.relative_change(&stock.asset, &equity_only(-0.1), &context()),
            -0.1,
        );
    }

    #[test]
    fn bond_uses_modified_duration_then_years_then_default() {
        let model = SensitivityModel::default();
        let shock = Shock {
            rate_absolute_target: Some(0.12),
            ..Shock::default()
        };
        let with_mod = position(
            "B1",
            AssetClass::Bond,
            "BRL",
            AssetMetadata {
                duration_mod: Some(8.2),
                duration_years: Some(8.5),
                ..AssetMetadata::default()
            },
            1.0,
            100.0,
        );
        let with_years = position(
            "B2",
            AssetClass::Bond,
            "BRL",
            AssetMetadata {
                duration_years: Some(8.5),
                ..AssetMetadata::default()
            },
            1.0,
            100.0,
        );
        let bare = position("B3", AssetClass::Bond, "BRL", AssetMetadata::default(), 1.0, 100.0);

        assert_approx(model.relative_change(&with_mod.asset, &shock, &context()), -8.2 * 0.02);
        assert_approx(model.relative_change(&with_years.asset, &shock, &context()), -8.5 * 0.02);
        assert_approx(model.relative_change(&bare.asset, &shock, &context()), -5.0 * 0.02);
        // No rate target, no bond move.
        assert_approx(model.relative_change(&bare.asset, &equity_only(-0.5), &context()), 0.0);
    }

    #[test]
    fn fii_combines_equity_and_half_duration() {
        let model = SensitivityModel::default();
        let fii = position("FII", AssetClass::Fii, "BRL", AssetMetadata::default(), 1.0, 100.0);
        let shock = Shock {
            equity_index_change: Some(-0.2),
            rate_absolute_target: Some(0.14),
            fx_usd_change: None,
        };
        let expected = -0.2 * 0.8 + (-2.0 * 0.04 * 0.5);
        assert_approx(model.relative_change(&fii.asset, &shock, &context()), expected);
    }

    #[test]
    fn usd_assets_add_the_fx_term() {
        let model = SensitivityModel::default();
        let shock = Shock {
            equity_index_change: Some(-0.1),
            rate_absolute_target: None,
            fx_usd_change: Some(0.25),
        };
        let usd_equity = position("SPY", AssetClass::Equity, "USD", AssetMetadata::default(), 1.0, 100.0);
        let usd_fx = position("USD", AssetClass::Fx, "USD", AssetMetadata::default(), 1.0, 100.0);
        let brl_fx = position("BRL", AssetClass::Fx, "BRL", AssetMetadata::default(), 1.0, 100.0);
        assert_approx(model.relative_change(&usd_equity.asset, &shock, &context()), 0.15);
        assert_approx(model.relative_change(&usd_fx.asset, &shock, &context()), 0.25);
        assert_approx(model.relative_change(&brl_fx.asset, &shock, &context()), 0.0);
    }

    #[test]
    fn crypto_is_amplified_only_in_down_markets() {
        let model = SensitivityModel::default();
        let btc = position("BTC", AssetClass::Crypto, "BRL", AssetMetadata::default(), 1.0, 100.0);
        assert_approx(
            model.relative_change(&btc.asset, &equity_only(-0.1), &context()),
            -0.1 * 2.0 * 1.2,
        );
        assert_approx(
            model.relative_change(&btc.asset, &equity_only(0.1), &context()),
            0.1 * 2.0,
        );
    }

    #[test]
    fn usd_crypto_amplifies_fx_term_too() {
        let model = SensitivityModel::default();
        let btc = position("BTC", AssetClass::Crypto, "USD", AssetMetadata::default(), 1.0, 100.0);
        let shock = Shock {
            equity_index_change: Some(-0.1),
            rate_absolute_target: None,
            fx_usd_change: Some(0.1),
        };
        assert_approx(
            model.relative_change(&btc.asset, &shock, &context()),
            (-0.2 + 0.1) * 1.2,
        );
    }

    #[test]
    fn cash_has_short_duration_rate_exposure() {
        let model = SensitivityModel::default();
        let cash = position("CASH", AssetClass::Cash, "BRL", AssetMetadata::default(), 1.0, 1.0);
        let shock = Shock {
            rate_absolute_target: Some(0.15),
            ..Shock::default()
        };
        assert_approx(model.relative_change(&cash.asset, &shock, &context()), -0.1 * 0.05);
    }

    #[test]
    fn price_is_floored() {
        let btc = position(
            "BTC",
            AssetClass::Crypto,
            "BRL",
            AssetMetadata {
                beta: Some(3.0),
                ..AssetMetadata::default()
            },
            10.0,
            50.0,
        );
        let result = simulate_crisis(&[btc], &equity_only(-0.8), &context());
        assert_approx(result.items[0].new_price, PRICE_FLOOR);
        assert_approx(result.items[0].new_value, 0.1);
        assert_approx(result.items[0].absolute_loss, 500.0 - 0.1);
    }

    #[test]
    fn custom_model_changes_defaults() {
        let model = SensitivityModel {
            equity: EquitySensitivity { default_beta: 0.5 },
            ..SensitivityModel::default()
        };
        let stock = position("STK", AssetClass::Equity, "BRL", AssetMetadata::default(), 10.0, 100.0);
        let result = simulate_crisis_with_model(&model, &[stock], &equity_only(-0.2), &context());
        assert_approx(result.value_after, 900.0);
    }

    #[test]
    fn by_class_groups_and_sums() {
        let positions = sample_positions();
        let result = simulate_crisis(&positions, &CrisisPreset::Baseline.shock(), &context());
        let equity = result
            .by_class
            .iter()
            .find(|row| row.asset_class == AssetClass::Equity)
            .expect("equity row");
        assert_approx(equity.value_before, 3_550.0 + 5_600.0);
        assert_approx(equity.value_after, result.items[0].new_value + result.items[3].new_value);
        assert_approx(equity.change, equity.value_after - equity.value_before);
        assert_eq!(result.by_class.len(), 3);
    }

    #[test]
    fn top_losers_are_ranked_and_capped() {
        let positions: Vec<Position> = (1..=7)
            .map(|i| {
                position(
                    &format!("S{i}"),
                    AssetClass::Equity,
                    "BRL",
                    AssetMetadata::default(),
                    i as f64,
                    100.0,
                )
            })
            .collect();
        let result = simulate_crisis(&positions, &equity_only(-0.1), &context());
        let tickers: Vec<&str> = result
            .top_losers
            .iter()
            .map(|item| item.position.asset.ticker.as_str())
            .collect();
        assert_eq!(tickers, vec!["S7", "S6", "S5", "S4", "S3"]);
    }

    #[test]
    fn sensitivities_are_sorted_by_magnitude() {
        let positions = sample_positions();
        let shock = CrisisPreset::Baseline.shock();
        let result = simulate_crisis(&positions, &shock, &context());
        assert_eq!(result.sensitivities.len(), 3);
        for pair in result.sensitivities.windows(2) {
            assert!(pair[0].impact.abs() >= pair[1].impact.abs());
        }

        let rate = result
            .sensitivities
            .iter()
            .find(|s| s.factor == ShockFactor::Rate)
            .expect("rate factor");
        assert_approx(rate.impact, -(28_500.0 + 4_910.0) * 0.05 * 4.0);
        assert_eq!(rate.description, "Interest rates to 15.00%");

        let fx = result
            .sensitivities
            .iter()
            .find(|s| s.factor == ShockFactor::Fx)
            .expect("fx factor");
        assert_approx(fx.impact, 5_600.0 * 0.25);

        let equity = result
            .sensitivities
            .iter()
            .find(|s| s.factor == ShockFactor::Equity)
            .expect("equity factor");
        assert_approx(equity.impact, -(3_550.0 + 4_910.0 + 5_600.0) * 0.4 * 0.8);
        assert_eq!(equity.description, "-40.0% equity market shock");
    }

    #[test]
    fn falling_rates_have_positive_rate_impact() {
        let positions = sample_positions();
        let shock = Shock {
            rate_absolute_target: Some(0.05),
            ..Shock::default()
        };
        let result = simulate_crisis(&positions, &shock, &context());
        assert_eq!(result.sensitivities.len(), 1);
        assert!(result.sensitivities[0].impact > 0.0);
    }

    #[test]
    fn empty_portfolio_yields_zeros() {
        let result = simulate_crisis(&[], &CrisisPreset::Extreme.shock(), &context());
        assert_eq!(result.value_before, 0.0);
        assert_eq!(result.value_after, 0.0);
        assert_eq!(result.drop, 0.0);
        assert!(result.by_class.is_empty());
    }

    #[test]
    fn shock_validation_bounds() {
        assert!(validate_shocks(&CrisisPreset::Extreme.shock()).is_empty());
        assert!(validate_shocks(&Shock::default()).is_empty());
        let bad = Shock {
            equity_index_change: Some(-0.9),
            rate_absolute_target: Some(0.6),
            fx_usd_change: Some(-0.6),
        };
        assert_eq!(validate_shocks(&bad).len(), 3);
    }

    #[test]
    fn position_validation_checks_value_contract() {
        let mut positions = sample_positions();
        assert!(validate_positions(&positions).is_empty());
        positions[0].value = 1.0;
        positions[1].quantity = -1.0;
        positions[1].value = -98.2;
        let errors = validate_positions(&positions);
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert!(errors[0].starts_with("PETR4"));
        assert!(errors[1].starts_with("XPML11"));
    }

    #[test]
    fn presets_parse_from_kebab_case() {
        let preset: CrisisPreset = serde_json::from_str(r#""extreme""#).expect("parsable");
        assert_eq!(preset, CrisisPreset::Extreme);
        let preset: CrisisPreset = serde_json::from_str(r#""default""#).expect("parsable");
        assert_eq!(preset, CrisisPreset::Baseline);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_class_totals_match_portfolio_total(
            specs in proptest::collection::vec((0usize..6, 0u32..2, 1u32..500, 1u32..10_000), 0..12),
            equity_bp in -8_000i32..10_000,
            rate_bp in 0u32..5_000,
            fx_bp in -5_000i32..10_000,
        ) {
            let classes = [
                AssetClass::Equity,
                AssetClass::Bond,
                AssetClass::Fii,
                AssetClass::Cash,
                AssetClass::Fx,
                AssetClass::Crypto,
            ];
            let positions: Vec<Position> = specs
                .iter()
                .enumerate()
                .map(|(i, (class_idx, usd, qty, price_cents))| {
                    position(
                        &format!("P{i}"),
                        classes[*class_idx],
                        if *usd == 1 { "USD" } else { "BRL" },
                        AssetMetadata::default(),
                        *qty as f64,
                        *price_cents as f64 / 100.0,
                    )
                })
                .collect();
            let shock = Shock {
                equity_index_change: Some(equity_bp as f64 / 10_000.0),
                rate_absolute_target: Some(rate_bp as f64 / 10_000.0),
                fx_usd_change: Some(fx_bp as f64 / 10_000.0),
            };
            let result = simulate_crisis(&positions, &shock, &context());

            let class_after: f64 = result.by_class.iter().map(|row| row.value_after).sum();
            let class_before: f64 = result.by_class.iter().map(|row| row.value_before).sum();
            prop_assert!((class_after - result.value_after).abs() <= 1e-6 * result.value_after.max(1.0));
            prop_assert!((class_before - result.value_before).abs() <= 1e-6 * result.value_before.max(1.0));
            prop_assert!(result.top_losers.len() <= TOP_LOSERS);
            for item in &result.items {
                prop_assert!(item.new_price >= PRICE_FLOOR);
            }
        }

        #[test]
        fn prop_crypto_loses_more_than_equity_with_same_beta(
            beta_pct in 10u32..300,
            drop_bp in 1u32..3_000,
            quantity in 1u32..100,
        ) {
            let beta = beta_pct as f64 / 100.0;
            let meta = AssetMetadata { beta: Some(beta), ..AssetMetadata::default() };
            let stock = position("STK", AssetClass::Equity, "BRL", meta.clone(), quantity as f64, 100.0);
            let coin = position("BTC", AssetClass::Crypto, "BRL", meta, quantity as f64, 100.0);
            let shock = equity_only(-(drop_bp as f64) / 10_000.0);
            let result = simulate_crisis(&[stock, coin], &shock, &context());
            prop_assert!(result.items[1].absolute_loss > result.items[0].absolute_loss);
        }
    }
}
