use std::fmt::Write as _;

use serde::Serialize;

use crate::core::YearRecord;
use crate::fx::{ExchangeRate, RateSource};

pub const CSV_FILE_NAME: &str = "withdrawal_projection.csv";

const COLUMNS: [&str; 8] = [
    "Year",
    "Start Value",
    "Gross Withdrawal",
    "Tax Paid",
    "Net Withdrawal",
    "End Value",
    "Remaining Capital",
    "Remaining Profit",
];

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Sek,
}

impl Currency {
    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Eur => "€",
            Currency::Sek => "SEK",
        }
    }
}

/// Whole units with thousands separators, e.g. `1,200,000 €`.
pub fn format_amount(value: i64, currency: Currency) -> String {
    format!("{} {}", group_thousands(value), currency.symbol())
}

fn group_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Inputs as the user entered them (EUR, percentages), for display.
#[derive(Debug, Clone, Copy)]
pub struct SettingsInputs {
    pub net_invested_capital: f64,
    pub current_market_value: f64,
    pub annual_return_pct: f64,
    pub inflation_pct: f64,
    pub tax_rate_pct: f64,
    pub net_withdrawal: f64,
    pub years: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSummary {
    pub currency: Currency,
    pub exchange_rate: String,
    pub net_invested_capital: String,
    pub current_market_value: String,
    pub annual_return: String,
    pub inflation: String,
    pub capital_gains_tax: String,
    pub net_withdrawal: String,
    pub simulation_period: String,
}

impl SettingsSummary {
    pub fn new(inputs: &SettingsInputs, rate: &ExchangeRate, currency: Currency) -> Self {
        let money = |eur: f64| {
            let amount = match currency {
                Currency::Eur => eur,
                Currency::Sek => eur * rate.sek_per_eur,
            };
            format_amount(amount.trunc() as i64, currency)
        };
        let note = match rate.source {
            RateSource::Live => "API rate",
            RateSource::Fallback => "fallback",
            RateSource::Manual => "manual",
        };
        Self {
            currency,
            exchange_rate: format!("{:.4} SEK/EUR ({note})", rate.sek_per_eur),
            net_invested_capital: money(inputs.net_invested_capital),
            current_market_value: money(inputs.current_market_value),
            annual_return: format!("{:.1}%", inputs.annual_return_pct),
            inflation: format!("{:.1}%", inputs.inflation_pct),
            capital_gains_tax: format!("{:.1}%", inputs.tax_rate_pct),
            net_withdrawal: money(inputs.net_withdrawal),
            simulation_period: format!("{} years", inputs.years),
        }
    }

    pub fn lines(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("Exchange rate", self.exchange_rate.as_str()),
            ("Net invested capital", self.net_invested_capital.as_str()),
            ("Current market value", self.current_market_value.as_str()),
            ("Average annual return", self.annual_return.as_str()),
            ("Inflation", self.inflation.as_str()),
            ("Capital gains tax", self.capital_gains_tax.as_str()),
            ("Net withdrawal (year 1)", self.net_withdrawal.as_str()),
            ("Simulation period", self.simulation_period.as_str()),
        ]
    }
}

fn cells(record: &YearRecord) -> [String; 8] {
    let opt = |v: Option<i64>| v.map(|v| v.to_string()).unwrap_or_default();
    [
        record.year.to_string(),
        opt(record.start_value),
        opt(record.gross_withdrawal),
        opt(record.tax_paid),
        opt(record.net_withdrawal),
        record.end_value.to_string(),
        record.remaining_capital.to_string(),
        record.remaining_profit.to_string(),
    ]
}

/// Right-aligned text table; empty cells print as `-`.
pub fn render_table(records: &[YearRecord]) -> String {
    let rows: Vec<[String; 8]> = records
        .iter()
        .map(|r| {
            let mut row = cells(r);
            // Column 0 is the year label and stays ungrouped.
            for cell in row.iter_mut().skip(1) {
                *cell = match cell.parse::<i64>() {
                    Ok(v) => group_thousands(v),
                    Err(_) => "-".to_string(),
                };
            }
            row
        })
        .collect();

    let mut widths = COLUMNS.map(str::len);
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let header: Vec<String> = COLUMNS
        .iter()
        .zip(widths)
        .map(|(c, w)| format!("{c:>w$}"))
        .collect();
    let _ = writeln!(out, "{}", header.join("  "));
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("  "));
    for row in &rows {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(c, w)| {
                let pad = w.saturating_sub(c.chars().count());
                format!("{}{c}", " ".repeat(pad))
            })
            .collect();
        let _ = writeln!(out, "{}", line.join("  "));
    }
    out
}

pub fn to_csv(records: &[YearRecord]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for record in records {
        writer.write_record(cells(record))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Portfolio value and inflation-adjusted net withdrawal over time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub years: Vec<i32>,
    pub end_values: Vec<i64>,
    pub net_withdrawals: Vec<Option<i64>>,
}

pub fn chart_series(records: &[YearRecord]) -> ChartSeries {
    ChartSeries {
        years: records.iter().map(|r| r.year).collect(),
        end_values: records.iter().map(|r| r.end_value).collect(),
        net_withdrawals: records.iter().map(|r| r.net_withdrawal).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SimulationConfig, simulate};

    fn sample_records() -> Vec<YearRecord> {
        simulate(&SimulationConfig {
            principal_start: 1_000_000.0,
            market_value_start: 1_200_000.0,
            annual_return: 0.05,
            inflation: 0.02,
            net_withdrawal_start: 40_000.0,
            tax_rate: 0.30,
            years: 3,
            start_year: 2025,
        })
        .expect("valid config")
    }

    #[test]
    fn formats_amounts_with_separators() {
        assert_eq!(format_amount(1_200_000, Currency::Eur), "1,200,000 €");
        assert_eq!(format_amount(999, Currency::Sek), "999 SEK");
        assert_eq!(format_amount(-15_000, Currency::Eur), "-15,000 €");
        assert_eq!(format_amount(0, Currency::Eur), "0 €");
    }

    #[test]
    fn csv_has_header_and_blank_opening_withdrawal_cells() {
        let csv = to_csv(&sample_records()).expect("csv writes");
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "Year,Start Value,Gross Withdrawal,Tax Paid,Net Withdrawal,End Value,Remaining Capital,Remaining Profit"
        );
        assert_eq!(lines[1], "2025,,,,,1200000,1000000,200000");
        assert_eq!(lines[2], "2026,1159391,42640,2640,40000,1217360,966159,251201");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn table_marks_empty_cells_and_groups_digits() {
        let table = render_table(&sample_records());
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].contains("Gross Withdrawal"));
        assert!(lines[2].contains("1,200,000"));
        assert!(lines[2].contains('-'));
        assert!(lines[3].contains("42,640"));
        assert!(lines[3].starts_with("2026"));
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn table_groups_four_digit_amounts_but_not_years() {
        let table = render_table(&sample_records());
        let row: Vec<&str> = table
            .lines()
            .nth(3)
            .expect("first withdrawal row")
            .split_whitespace()
            .collect();
        assert_eq!(
            row,
            vec!["2026", "1,159,391", "42,640", "2,640", "40,000", "1,217,360", "966,159", "251,201"]
        );

        let opening: Vec<&str> = table
            .lines()
            .nth(2)
            .expect("opening row")
            .split_whitespace()
            .collect();
        assert_eq!(
            opening,
            vec!["2025", "-", "-", "-", "-", "1,200,000", "1,000,000", "200,000"]
        );
    }

    #[test]
    fn chart_series_follows_records() {
        let series = chart_series(&sample_records());
        assert_eq!(series.years, vec![2025, 2026, 2027]);
        assert_eq!(series.end_values[0], 1_200_000);
        assert_eq!(series.net_withdrawals, vec![None, Some(40_000), Some(40_800)]);
    }

    #[test]
    fn summary_converts_money_in_sek_mode() {
        let inputs = SettingsInputs {
            net_invested_capital: 1_000_000.0,
            current_market_value: 1_200_000.0,
            annual_return_pct: 5.0,
            inflation_pct: 2.0,
            tax_rate_pct: 30.0,
            net_withdrawal: 40_000.0,
            years: 35,
        };
        let summary = SettingsSummary::new(&inputs, &ExchangeRate::fallback(), Currency::Sek);
        assert_eq!(summary.net_invested_capital, "10,900,000 SEK");
        assert_eq!(summary.net_withdrawal, "436,000 SEK");
        assert_eq!(summary.exchange_rate, "10.9000 SEK/EUR (fallback)");
        assert_eq!(summary.annual_return, "5.0%");
        assert_eq!(summary.simulation_period, "35 years");

        let eur = SettingsSummary::new(&inputs, &ExchangeRate::fallback(), Currency::Eur);
        assert_eq!(eur.current_market_value, "1,200,000 €");
        assert_eq!(eur.lines().len(), 8);
    }
}
