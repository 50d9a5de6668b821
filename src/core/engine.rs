use super::types::{ConfigError, PortfolioState, SimulationConfig, YearRecord};

/// Unrounded outcome of one withdrawal year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub profit_fraction: f64,
    pub gross_withdrawal: f64,
    pub tax_paid: f64,
    pub net_withdrawal: f64,
    pub start_value: f64,
    pub end_value: f64,
    pub principal: f64,
    pub profit: f64,
}

impl Step {
    fn record(&self, year: i32) -> YearRecord {
        YearRecord {
            year,
            start_value: Some(to_units(self.start_value)),
            gross_withdrawal: Some(to_units(self.gross_withdrawal)),
            tax_paid: Some(to_units(self.tax_paid)),
            net_withdrawal: Some(to_units(self.net_withdrawal)),
            end_value: to_units(self.end_value),
            remaining_capital: to_units(self.principal),
            remaining_profit: to_units(self.profit),
        }
    }
}

pub fn opening_state(config: &SimulationConfig) -> PortfolioState {
    PortfolioState {
        principal: config.principal_start,
        profit: (config.market_value_start - config.principal_start).max(0.0),
        net_withdrawal: config.net_withdrawal_start,
    }
}

impl PortfolioState {
    /// Grows the portfolio for one period and takes that year's withdrawal.
    ///
    /// Returns `None` once the grown portfolio is worth nothing; the projection
    /// ends there without a record for that year.
    pub fn advance(&self, config: &SimulationConfig) -> Option<(PortfolioState, Step)> {
        let r = config.annual_return;
        let principal = self.principal;
        let profit = self.profit * (1.0 + r) + principal * r;
        let value = principal + profit;
        if value <= 0.0 {
            return None;
        }

        let profit_fraction = if value > 0.0 { profit / value } else { 0.0 };
        let net = self.net_withdrawal;
        let gross = net / (1.0 - config.tax_rate * profit_fraction);
        let tax = gross * profit_fraction * config.tax_rate;

        let profit = profit - gross * profit_fraction;
        let principal = (principal - gross * (1.0 - profit_fraction)).max(0.0);
        let value = principal + profit;

        let step = Step {
            profit_fraction,
            gross_withdrawal: gross,
            tax_paid: tax,
            net_withdrawal: net,
            // Display approximation: post-withdrawal value backed out by one period of growth.
            start_value: value / (1.0 + r),
            end_value: value,
            principal,
            profit,
        };
        let next = PortfolioState {
            principal,
            profit,
            net_withdrawal: net * (1.0 + config.inflation),
        };
        Some((next, step))
    }
}

pub fn simulate(config: &SimulationConfig) -> Result<Vec<YearRecord>, ConfigError> {
    config.validate()?;

    let mut state = opening_state(config);
    let mut records = Vec::with_capacity(config.years.min(1_000) as usize);
    records.push(YearRecord {
        year: config.start_year,
        start_value: None,
        gross_withdrawal: None,
        tax_paid: None,
        net_withdrawal: None,
        end_value: to_units(config.market_value_start),
        remaining_capital: to_units(state.principal),
        remaining_profit: to_units(state.profit),
    });

    let mut year = config.start_year;
    for _ in 1..config.years {
        let Some((next, step)) = state.advance(config) else {
            break;
        };
        // In range: validate checked the last year.
        year += 1;
        records.push(step.record(year));
        state = next;
    }

    Ok(records)
}

/// Nearest whole currency unit, ties to even.
fn to_units(amount: f64) -> i64 {
    amount.round_ties_even() as i64
}
