use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub principal_start: f64,
    pub market_value_start: f64,
    pub annual_return: f64,
    pub inflation: f64,
    pub net_withdrawal_start: f64,
    pub tax_rate: f64,
    pub years: u32,
    pub start_year: i32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("years must be > 0")]
    NoYears,
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },
    #[error("{field} must be >= 0, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("tax_rate must be in [0, 1), got {0}")]
    TaxRateOutOfRange(f64),
    #[error("{field} must be > -100%, got {value}")]
    RateTooLow { field: &'static str, value: f64 },
    #[error("{years} years from {start_year} runs past the last representable year")]
    YearOverflow { start_year: i32, years: u32 },
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("principal_start", self.principal_start),
            ("market_value_start", self.market_value_start),
            ("annual_return", self.annual_return),
            ("inflation", self.inflation),
            ("net_withdrawal_start", self.net_withdrawal_start),
            ("tax_rate", self.tax_rate),
        ];
        if let Some(&(field, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ConfigError::NotFinite { field });
        }
        if self.years == 0 {
            return Err(ConfigError::NoYears);
        }
        if self.last_year().is_none() {
            return Err(ConfigError::YearOverflow {
                start_year: self.start_year,
                years: self.years,
            });
        }
        for (field, value) in [
            ("principal_start", self.principal_start),
            ("market_value_start", self.market_value_start),
            ("net_withdrawal_start", self.net_withdrawal_start),
        ] {
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        if !(0.0..1.0).contains(&self.tax_rate) {
            return Err(ConfigError::TaxRateOutOfRange(self.tax_rate));
        }
        // The start-value back-computation divides by (1 + annual_return).
        for (field, value) in [
            ("annual_return", self.annual_return),
            ("inflation", self.inflation),
        ] {
            if value <= -1.0 {
                return Err(ConfigError::RateTooLow { field, value });
            }
        }
        Ok(())
    }

    /// Calendar year of the final record, if it fits in an `i32`.
    pub fn last_year(&self) -> Option<i32> {
        let offset = i32::try_from(self.years.checked_sub(1)?).ok()?;
        self.start_year.checked_add(offset)
    }

    /// Multiplies every money amount by `rate`; rates and horizon are unchanged.
    pub fn scaled(self, rate: f64) -> Self {
        Self {
            principal_start: self.principal_start * rate,
            market_value_start: self.market_value_start * rate,
            net_withdrawal_start: self.net_withdrawal_start * rate,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioState {
    pub principal: f64,
    pub profit: f64,
    pub net_withdrawal: f64,
}

impl PortfolioState {
    pub fn value(&self) -> f64 {
        self.principal + self.profit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub year: i32,
    pub start_value: Option<i64>,
    pub gross_withdrawal: Option<i64>,
    pub tax_paid: Option<i64>,
    pub net_withdrawal: Option<i64>,
    pub end_value: i64,
    pub remaining_capital: i64,
    pub remaining_profit: i64,
}
