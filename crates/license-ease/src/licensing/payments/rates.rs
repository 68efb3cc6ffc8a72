use std::collections::HashMap;

pub const DEFAULT_SETTLEMENT_CURRENCY: &str = "RWF";
pub const FIXED_TABLE_SOURCE: &str = "fixed_table";

/// Amount converted into the settlement currency.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedAmount {
    pub amount: u64,
    pub currency: String,
    pub rate: f64,
    pub source: &'static str,
}

/// Source of conversion rates into the processor's settlement currency.
pub trait ExchangeRateProvider: Send + Sync {
    fn settlement_currency(&self) -> &str;
    fn convert(&self, amount: f64, from: &str) -> Result<ConvertedAmount, RateError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateError {
    #[error("no exchange rate from {from} to {to}")]
    UnsupportedCurrency { from: String, to: String },
    #[error("amount {0} cannot be converted")]
    InvalidAmount(f64),
}

/// Static table of settlement units per unit of a foreign currency.
///
/// The rates never refresh; every conversion is logged as a stale-rate risk.
#[derive(Debug, Clone)]
pub struct FixedRateTable {
    settlement: String,
    rates: HashMap<String, f64>,
}

impl Default for FixedRateTable {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLEMENT_CURRENCY)
            .with_rate("USD", 1315.79)
            .with_rate("EUR", 1428.57)
    }
}

impl FixedRateTable {
    pub fn new(settlement: impl Into<String>) -> Self {
        Self {
            settlement: settlement.into().to_ascii_uppercase(),
            rates: HashMap::new(),
        }
    }

    pub fn with_rate(mut self, currency: &str, settlement_units: f64) -> Self {
        self.rates
            .insert(currency.to_ascii_uppercase(), settlement_units);
        self
    }

    pub fn rate(&self, currency: &str) -> Option<f64> {
        self.rates.get(&currency.to_ascii_uppercase()).copied()
    }
}

impl ExchangeRateProvider for FixedRateTable {
    fn settlement_currency(&self) -> &str {
        &self.settlement
    }

    fn convert(&self, amount: f64, from: &str) -> Result<ConvertedAmount, RateError> {
        let from = from.to_ascii_uppercase();
        let rate = if from == self.settlement {
            1.0
        } else {
            self.rate(&from).ok_or_else(|| RateError::UnsupportedCurrency {
                from: from.clone(),
                to: self.settlement.clone(),
            })?
        };

        let converted = (amount * rate).round();
        if !converted.is_finite() || converted < 0.0 || converted > u64::MAX as f64 {
            return Err(RateError::InvalidAmount(amount));
        }

        if from != self.settlement {
            tracing::warn!(
                from = %from,
                to = %self.settlement,
                rate,
                "converting with a fixed exchange rate that may be stale"
            );
        }

        Ok(ConvertedAmount {
            amount: converted as u64,
            currency: self.settlement.clone(),
            rate,
            source: FIXED_TABLE_SOURCE,
        })
    }
}
