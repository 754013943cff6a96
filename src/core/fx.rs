use std::collections::BTreeMap;

use tracing::warn;

use super::types::{Currency, CurrencyPair, FxProjection};
use crate::error::{PlanError, PlanResult};

/// Exchange-rate lookup over a fixed spot table plus optional per-year overrides.
///
/// Resolution order for `spot`: identity, direct, inverse, cross via USD, then 1.0.
/// `path` consults the per-year overrides before falling back to `spot`.
#[derive(Debug, Clone, Default)]
pub struct FxResolver {
    spot_rates: BTreeMap<CurrencyPair, f64>,
    projections: BTreeMap<(u32, CurrencyPair), f64>,
}

impl FxResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a resolver from a `base -> quote -> rate` table.
    pub fn from_nested(table: &BTreeMap<Currency, BTreeMap<Currency, f64>>) -> PlanResult<Self> {
        let mut resolver = Self::new();
        for (base, quotes) in table {
            for (quote, rate) in quotes {
                resolver.insert_rate(base.clone(), quote.clone(), *rate)?;
            }
        }
        Ok(resolver)
    }

    pub fn with_rate(
        mut self,
        base: impl Into<Currency>,
        quote: impl Into<Currency>,
        rate: f64,
    ) -> PlanResult<Self> {
        self.insert_rate(base, quote, rate)?;
        Ok(self)
    }

    pub fn insert_rate(
        &mut self,
        base: impl Into<Currency>,
        quote: impl Into<Currency>,
        rate: f64,
    ) -> PlanResult<()> {
        let pair = CurrencyPair::new(base, quote);
        check_rate(&pair, rate)?;
        self.spot_rates.insert(pair, rate);
        Ok(())
    }

    pub fn with_projections<'a>(
        mut self,
        projections: impl IntoIterator<Item = &'a FxProjection>,
    ) -> PlanResult<Self> {
        for projection in projections {
            let pair = CurrencyPair::new(
                projection.base_currency.clone(),
                projection.quote_currency.clone(),
            );
            check_rate(&pair, projection.rate)?;
            self.projections
                .insert((projection.year, pair), projection.rate);
        }
        Ok(self)
    }

    pub fn spot(&self, from: &Currency, to: &Currency) -> f64 {
        if from == to {
            return 1.0;
        }

        let pair = CurrencyPair::new(from.clone(), to.clone());
        if let Some(rate) = self.spot_rates.get(&pair) {
            return *rate;
        }
        if let Some(rate) = self.spot_rates.get(&pair.inverse()) {
            return 1.0 / rate;
        }

        if !from.is_usd() && !to.is_usd() {
            let usd = Currency::usd();
            return self.spot(from, &usd) * self.spot(&usd, to);
        }

        warn!(pair = %pair, "no spot rate available, falling back to 1.0");
        1.0
    }

    pub fn path(&self, from: &Currency, to: &Currency, year: u32) -> f64 {
        if from == to {
            return 1.0;
        }
        let key = (year, CurrencyPair::new(from.clone(), to.clone()));
        match self.projections.get(&key) {
            Some(rate) => *rate,
            None => self.spot(from, to),
        }
    }
}

fn check_rate(pair: &CurrencyPair, rate: f64) -> PlanResult<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(PlanError::invalid(
            "fxRate",
            format!("{pair} rate must be a positive finite number, got {rate}"),
        ));
    }
    Ok(())
}
