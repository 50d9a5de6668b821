use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use chrono::Datelike;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::core::{SimulationConfig, SolveConfig, SolveResult, YearRecord, simulate, solve_max_withdrawal};
use crate::fx::{self, ExchangeRate, RateCache};
use crate::report::{
    CSV_FILE_NAME, ChartSeries, Currency, SettingsInputs, SettingsSummary, chart_series,
    format_amount, render_table, to_csv,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

const DEFAULT_NET_INVESTED_CAPITAL: f64 = 1_000_000.0;
const DEFAULT_CURRENT_MARKET_VALUE: f64 = 1_200_000.0;
const DEFAULT_ANNUAL_RETURN: f64 = 5.0;
const DEFAULT_INFLATION: f64 = 2.0;
const DEFAULT_NET_WITHDRAWAL: f64 = 40_000.0;
const DEFAULT_TAX_RATE: f64 = 30.0;
const DEFAULT_YEARS: u32 = 35;
const MAX_YEARS: u32 = 200;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "drawdown",
    about = "Yearly portfolio projection under inflation-adjusted net withdrawals with capital gains tax on the profit share"
)]
pub struct Cli {
    #[arg(long, default_value_t = DEFAULT_NET_INVESTED_CAPITAL, help = "Net invested capital in EUR")]
    net_invested_capital: f64,
    #[arg(long, default_value_t = DEFAULT_CURRENT_MARKET_VALUE, help = "Current market value in EUR")]
    current_market_value: f64,
    #[arg(
        long,
        allow_negative_numbers = true,
        default_value_t = DEFAULT_ANNUAL_RETURN,
        help = "Average annual return in percent, e.g. 5"
    )]
    annual_return: f64,
    #[arg(
        long,
        allow_negative_numbers = true,
        default_value_t = DEFAULT_INFLATION,
        help = "Annual inflation in percent, e.g. 2"
    )]
    inflation: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_NET_WITHDRAWAL,
        help = "Net annual withdrawal in the first withdrawal year, in EUR"
    )]
    net_withdrawal: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_TAX_RATE,
        help = "Capital gains tax on the profit share of each withdrawal, in percent"
    )]
    tax_rate: f64,
    #[arg(long, default_value_t = DEFAULT_YEARS, help = "Simulation period in years")]
    years: u32,
    #[arg(long, help = "Calendar year of the first row, defaults to the current year")]
    start_year: Option<i32>,
    #[arg(long, help = "Show all amounts in SEK, converted with the ECB rate")]
    sek: bool,
    #[arg(long, help = "SEK per EUR to use instead of looking up the ECB rate")]
    sek_per_eur: Option<f64>,
    #[arg(long, help = "Print the projection as CSV instead of a table")]
    csv: bool,
    #[arg(long, help = "Also solve for the largest sustainable starting net withdrawal")]
    solve_max_withdrawal: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    net_invested_capital: Option<f64>,
    current_market_value: Option<f64>,
    annual_return: Option<f64>,
    inflation: Option<f64>,
    net_withdrawal: Option<f64>,
    tax_rate: Option<f64>,
    years: Option<u32>,
    start_year: Option<i32>,
    #[serde(alias = "sek")]
    show_sek: Option<bool>,
    search_max: Option<f64>,
}

/// A validated projection request, still carrying the user-facing inputs.
#[derive(Debug, Clone, Copy)]
struct Projection {
    config: SimulationConfig,
    settings: SettingsInputs,
    currency: Currency,
    rate: ExchangeRate,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    currency: Currency,
    exchange_rate: ExchangeRate,
    settings: SettingsSummary,
    years_requested: u32,
    years_simulated: usize,
    depleted: bool,
    records: Vec<YearRecord>,
    chart: ChartSeries,
    csv_file_name: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveResponse {
    currency: Currency,
    exchange_rate: ExchangeRate,
    years: u32,
    result: SolveResult,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn current_year() -> i32 {
    chrono::Local::now().year()
}

fn build_projection(cli: &Cli, rate: ExchangeRate) -> Result<Projection, String> {
    let money = [
        ("--net-invested-capital", cli.net_invested_capital),
        ("--current-market-value", cli.current_market_value),
        ("--net-withdrawal", cli.net_withdrawal),
    ];
    for (flag, value) in money {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{flag} must be >= 0"));
        }
    }

    if !cli.annual_return.is_finite() || cli.annual_return <= -100.0 {
        return Err("--annual-return must be > -100".to_string());
    }

    if !cli.inflation.is_finite() || cli.inflation <= -100.0 {
        return Err("--inflation must be > -100".to_string());
    }

    if !cli.tax_rate.is_finite() || !(0.0..100.0).contains(&cli.tax_rate) {
        return Err("--tax-rate must be >= 0 and < 100".to_string());
    }

    if cli.years == 0 || cli.years > MAX_YEARS {
        return Err(format!("--years must be between 1 and {MAX_YEARS}"));
    }

    if !rate.sek_per_eur.is_finite() || rate.sek_per_eur <= 0.0 {
        return Err("--sek-per-eur must be > 0".to_string());
    }

    let currency = if cli.sek { Currency::Sek } else { Currency::Eur };
    let config = SimulationConfig {
        principal_start: cli.net_invested_capital,
        market_value_start: cli.current_market_value,
        annual_return: cli.annual_return / 100.0,
        inflation: cli.inflation / 100.0,
        net_withdrawal_start: cli.net_withdrawal,
        tax_rate: cli.tax_rate / 100.0,
        years: cli.years,
        start_year: cli.start_year.unwrap_or_else(current_year),
    };
    let config = match currency {
        Currency::Eur => config,
        Currency::Sek => config.scaled(rate.sek_per_eur),
    };
    config.validate().map_err(|e| e.to_string())?;

    Ok(Projection {
        config,
        settings: SettingsInputs {
            net_invested_capital: cli.net_invested_capital,
            current_market_value: cli.current_market_value,
            annual_return_pct: cli.annual_return,
            inflation_pct: cli.inflation,
            tax_rate_pct: cli.tax_rate,
            net_withdrawal: cli.net_withdrawal,
            years: cli.years,
        },
        currency,
        rate,
    })
}

fn solve_config_for(projection: &Projection, search_max: Option<f64>) -> SolveConfig {
    let config = &projection.config;
    let default_max = config.market_value_start.max(config.principal_start).max(1.0);
    SolveConfig {
        search_max: search_max.unwrap_or(default_max),
        ..SolveConfig::default()
    }
}

/// Runs one projection from command-line flags and prints it to stdout.
pub async fn run_cli(cli: Cli) -> Result<(), String> {
    let rate = match cli.sek_per_eur {
        Some(manual) => ExchangeRate::manual(manual),
        None => {
            let client = fx::http_client().map_err(|e| e.to_string())?;
            fx::rate_or_fallback(&client).await
        }
    };
    let projection = build_projection(&cli, rate)?;
    let records = simulate(&projection.config).map_err(|e| e.to_string())?;
    info!(
        years_requested = projection.config.years,
        years_simulated = records.len(),
        "projection complete"
    );

    if cli.csv {
        print!("{}", to_csv(&records).map_err(|e| e.to_string())?);
        return Ok(());
    }

    let summary = SettingsSummary::new(&projection.settings, &projection.rate, projection.currency);
    println!("Settings Summary");
    for (label, value) in summary.lines() {
        println!("  {label}: {value}");
    }
    println!();
    print!("{}", render_table(&records));

    if (records.len() as u32) < projection.config.years {
        println!();
        println!(
            "Portfolio exhausted after {} of {} years.",
            records.len(),
            projection.config.years
        );
    }

    if cli.solve_max_withdrawal {
        let result = solve_max_withdrawal(&projection.config, solve_config_for(&projection, None))?;
        println!();
        match result.solved_value {
            Some(value) => println!(
                "Maximum sustainable starting net withdrawal: {} ({})",
                format_amount(value.floor() as i64, projection.currency),
                result.message
            ),
            None => println!("{}", result.message),
        }
    }

    Ok(())
}

#[derive(Clone)]
struct AppState {
    rates: RateCache,
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let client = fx::http_client().map_err(std::io::Error::other)?;
    let state = AppState {
        rates: RateCache::new(client),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("withdrawal projection API listening on http://{addr}");
    info!("local access: http://127.0.0.1:{port}/");

    axum::serve(listener, router(state)).await
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/solve", get(solve_get_handler).post(solve_post_handler))
        .route("/api/export.csv", get(export_csv_handler))
        .route("/api/rate", get(rate_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn rate_handler(State(state): State<AppState>) -> Response {
    json_response(StatusCode::OK, state.rates.get().await)
}

async fn simulate_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    simulate_handler_impl(&state, payload).await
}

async fn simulate_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    simulate_handler_impl(&state, payload).await
}

async fn solve_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    solve_handler_impl(&state, payload).await
}

async fn solve_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    solve_handler_impl(&state, payload).await
}

async fn export_csv_handler(
    State(state): State<AppState>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    let (projection, records) = match project(&state, &payload).await {
        Ok(result) => result,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    debug!(years = projection.config.years, "exporting projection as CSV");
    match to_csv(&records) {
        Ok(body) => with_cache_control((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{CSV_FILE_NAME}\""),
                ),
            ],
            body,
        )),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

async fn project(
    state: &AppState,
    payload: &SimulatePayload,
) -> Result<(Projection, Vec<YearRecord>), String> {
    let cli = cli_from_payload(payload);
    let rate = state.rates.get().await;
    let projection = build_projection(&cli, rate).inspect_err(|msg| warn!(%msg, "rejected request"))?;
    let records = simulate(&projection.config).map_err(|e| e.to_string())?;
    Ok((projection, records))
}

async fn simulate_handler_impl(state: &AppState, payload: SimulatePayload) -> Response {
    let (projection, records) = match project(state, &payload).await {
        Ok(result) => result,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    debug!(
        years_requested = projection.config.years,
        years_simulated = records.len(),
        "simulated projection"
    );
    json_response(StatusCode::OK, build_simulate_response(&projection, records))
}

async fn solve_handler_impl(state: &AppState, payload: SimulatePayload) -> Response {
    let cli = cli_from_payload(&payload);
    let rate = state.rates.get().await;
    let projection = match build_projection(&cli, rate) {
        Ok(projection) => projection,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let solve_config = solve_config_for(&projection, payload.search_max);
    match solve_max_withdrawal(&projection.config, solve_config) {
        Ok(result) => json_response(
            StatusCode::OK,
            SolveResponse {
                currency: projection.currency,
                exchange_rate: projection.rate,
                years: projection.config.years,
                result,
            },
        ),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

fn build_simulate_response(projection: &Projection, records: Vec<YearRecord>) -> SimulateResponse {
    let years_simulated = records.len();
    SimulateResponse {
        currency: projection.currency,
        exchange_rate: projection.rate,
        settings: SettingsSummary::new(&projection.settings, &projection.rate, projection.currency),
        years_requested: projection.config.years,
        years_simulated,
        depleted: (years_simulated as u32) < projection.config.years,
        chart: chart_series(&records),
        records,
        csv_file_name: CSV_FILE_NAME,
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn cli_from_json(json: &str) -> Result<Cli, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    Ok(cli_from_payload(&payload))
}

fn cli_from_payload(payload: &SimulatePayload) -> Cli {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.net_invested_capital {
        cli.net_invested_capital = v;
    }
    if let Some(v) = payload.current_market_value {
        cli.current_market_value = v;
    }
    if let Some(v) = payload.annual_return {
        cli.annual_return = v;
    }
    if let Some(v) = payload.inflation {
        cli.inflation = v;
    }
    if let Some(v) = payload.net_withdrawal {
        cli.net_withdrawal = v;
    }
    if let Some(v) = payload.tax_rate {
        cli.tax_rate = v;
    }
    if let Some(v) = payload.years {
        cli.years = v;
    }
    if let Some(v) = payload.start_year {
        cli.start_year = Some(v);
    }
    if let Some(v) = payload.show_sek {
        cli.sek = v;
    }

    cli
}

fn default_cli_for_api() -> Cli {
    Cli {
        net_invested_capital: DEFAULT_NET_INVESTED_CAPITAL,
        current_market_value: DEFAULT_CURRENT_MARKET_VALUE,
        annual_return: DEFAULT_ANNUAL_RETURN,
        inflation: DEFAULT_INFLATION,
        net_withdrawal: DEFAULT_NET_WITHDRAWAL,
        tax_rate: DEFAULT_TAX_RATE,
        years: DEFAULT_YEARS,
        start_year: None,
        sek: false,
        sek_per_eur: None,
        csv: false,
        solve_max_withdrawal: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fx::RateSource;
    use std::time::Duration;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        let mut cli = default_cli_for_api();
        cli.start_year = Some(2025);
        cli
    }

    fn live_rate() -> ExchangeRate {
        ExchangeRate {
            sek_per_eur: 11.0,
            source: RateSource::Live,
            date: None,
        }
    }

    async fn primed_state() -> AppState {
        let client = fx::http_client().expect("client builds");
        let state = AppState {
            rates: RateCache::with_ttl(client, Duration::from_secs(3600)),
        };
        state.rates.prime(live_rate()).await;
        state
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        serde_json::from_slice(&bytes).expect("body is JSON")
    }

    #[test]
    fn cli_defaults_parse_without_arguments() {
        let cli = Cli::parse_from(["drawdown"]);
        assert_approx(cli.net_invested_capital, DEFAULT_NET_INVESTED_CAPITAL);
        assert_approx(cli.tax_rate, DEFAULT_TAX_RATE);
        assert_eq!(cli.years, DEFAULT_YEARS);
        assert!(!cli.sek);
    }

    #[test]
    fn cli_accepts_negative_return_and_inflation() {
        let cli = Cli::parse_from(["drawdown", "--annual-return", "-3", "--inflation", "-0.5"]);
        assert_approx(cli.annual_return, -3.0);
        assert_approx(cli.inflation, -0.5);
    }

    #[test]
    fn build_projection_converts_percentages_to_fractions() {
        let projection = build_projection(&sample_cli(), live_rate()).expect("valid inputs");
        let config = projection.config;
        assert_approx(config.annual_return, 0.05);
        assert_approx(config.inflation, 0.02);
        assert_approx(config.tax_rate, 0.30);
        assert_approx(config.principal_start, 1_000_000.0);
        assert_eq!(config.start_year, 2025);
        assert_eq!(projection.currency, Currency::Eur);
    }

    #[test]
    fn build_projection_scales_money_in_sek_mode() {
        let mut cli = sample_cli();
        cli.sek = true;
        let projection = build_projection(&cli, live_rate()).expect("valid inputs");
        assert_eq!(projection.currency, Currency::Sek);
        assert_approx(projection.config.principal_start, 11_000_000.0);
        assert_approx(projection.config.market_value_start, 13_200_000.0);
        assert_approx(projection.config.net_withdrawal_start, 440_000.0);
        assert_approx(projection.settings.net_withdrawal, 40_000.0);
    }

    #[test]
    fn build_projection_rejects_full_tax_rate() {
        let mut cli = sample_cli();
        cli.tax_rate = 100.0;
        let err = build_projection(&cli, live_rate()).expect_err("must reject 100% tax");
        assert!(err.contains("--tax-rate"));
    }

    #[test]
    fn build_projection_rejects_zero_years() {
        let mut cli = sample_cli();
        cli.years = 0;
        let err = build_projection(&cli, live_rate()).expect_err("must reject zero years");
        assert!(err.contains("--years"));
    }

    #[test]
    fn build_projection_rejects_negative_market_value() {
        let mut cli = sample_cli();
        cli.current_market_value = -1.0;
        let err = build_projection(&cli, live_rate()).expect_err("must reject negative value");
        assert!(err.contains("--current-market-value"));
    }

    #[test]
    fn build_projection_rejects_total_loss_return() {
        let mut cli = sample_cli();
        cli.annual_return = -100.0;
        let err = build_projection(&cli, live_rate()).expect_err("must reject -100% return");
        assert!(err.contains("--annual-return"));
    }

    #[test]
    fn build_projection_rejects_non_positive_manual_rate() {
        let err = build_projection(&sample_cli(), ExchangeRate::manual(0.0))
            .expect_err("must reject zero rate");
        assert!(err.contains("--sek-per-eur"));
    }

    #[test]
    fn payload_overlays_web_keys_onto_defaults() {
        let json = r#"{
          "netInvestedCapital": 500000,
          "currentMarketValue": 650000,
          "annualReturn": 4.5,
          "taxRate": 30,
          "years": 25,
          "startYear": 2030,
          "showSek": true
        }"#;
        let cli = cli_from_json(json).expect("json should parse");
        assert_approx(cli.net_invested_capital, 500_000.0);
        assert_approx(cli.current_market_value, 650_000.0);
        assert_approx(cli.annual_return, 4.5);
        assert_approx(cli.inflation, DEFAULT_INFLATION);
        assert_approx(cli.net_withdrawal, DEFAULT_NET_WITHDRAWAL);
        assert_eq!(cli.years, 25);
        assert_eq!(cli.start_year, Some(2030));
        assert!(cli.sek);
    }

    #[test]
    fn payload_rejects_unparseable_json() {
        let err = cli_from_json("{\"years\": \"many\"}").expect_err("must reject");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn simulate_response_serialization_contains_expected_fields() {
        let projection = build_projection(&sample_cli(), live_rate()).expect("valid inputs");
        let records = simulate(&projection.config).expect("valid config");
        let response = build_simulate_response(&projection, records);
        let json = serde_json::to_string(&response).expect("response should serialize");
        assert!(json.contains("\"records\""));
        assert!(json.contains("\"grossWithdrawal\""));
        assert!(json.contains("\"remainingProfit\""));
        assert!(json.contains("\"exchangeRate\""));
        assert!(json.contains("\"sekPerEur\""));
        assert!(json.contains("\"chart\""));
        assert!(json.contains("\"yearsSimulated\":35"));
        assert!(json.contains("\"depleted\":false"));
        assert!(json.contains("\"currency\":\"EUR\""));
    }

    #[tokio::test]
    async fn simulate_handler_returns_projection_for_valid_payload() {
        let state = primed_state().await;
        let payload = SimulatePayload {
            years: Some(3),
            start_year: Some(2025),
            ..SimulatePayload::default()
        };
        let response = simulate_handler_impl(&state, payload).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CACHE_CONTROL).map(|v| v.as_bytes()),
            Some(&b"no-store"[..])
        );

        let body = body_json(response).await;
        let records = body["records"].as_array().expect("records array");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0]["endValue"], 1_200_000);
        assert!(records[0]["grossWithdrawal"].is_null());
        assert_eq!(records[1]["grossWithdrawal"], 42_640);
        assert_eq!(body["exchangeRate"]["source"], "live");
    }

    #[tokio::test]
    async fn simulate_handler_reports_bad_request_for_invalid_tax() {
        let state = primed_state().await;
        let payload = SimulatePayload {
            tax_rate: Some(120.0),
            ..SimulatePayload::default()
        };
        let response = simulate_handler_impl(&state, payload).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(
            body["error"]
                .as_str()
                .expect("error message")
                .contains("--tax-rate")
        );
    }

    #[tokio::test]
    async fn solve_handler_returns_sustainable_withdrawal() {
        let state = primed_state().await;
        let payload = SimulatePayload {
            annual_return: Some(0.0),
            inflation: Some(0.0),
            tax_rate: Some(0.0),
            net_invested_capital: Some(100_000.0),
            current_market_value: Some(100_000.0),
            years: Some(11),
            ..SimulatePayload::default()
        };
        let response = solve_handler_impl(&state, payload).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let solved = body["result"]["solvedValue"].as_f64().expect("solved value");
        assert!((solved - 10_000.0).abs() <= 2.0, "solved {solved}");
        assert_eq!(body["result"]["feasible"], true);
    }

    #[tokio::test]
    async fn export_csv_handler_sets_attachment_headers() {
        let state = primed_state().await;
        let payload = SimulatePayload {
            years: Some(2),
            start_year: Some(2025),
            ..SimulatePayload::default()
        };
        let response = export_csv_handler(State(state), Query(payload)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_DISPOSITION).map(|v| v.as_bytes()),
            Some(&b"attachment; filename=\"withdrawal_projection.csv\""[..])
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let text = String::from_utf8(bytes.to_vec()).expect("utf-8 csv");
        assert!(text.starts_with("Year,Start Value,"));
        assert_eq!(text.lines().count(), 3);
    }
}
