//! EUR exchange rates from the European Central Bank daily reference feed.
//!
//! The projection only ever needs one multiplicative rate (SEK per EUR). When
//! the feed cannot be reached or parsed, a fixed fallback is used instead and
//! marked as such so the caller can show it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const ECB_DAILY_URL: &str = "https://www.ecb.europa.eu/stats/eurofxref/eurofxref-daily.xml";

/// SEK per EUR used whenever the ECB lookup fails.
pub const FALLBACK_SEK_PER_EUR: f64 = 10.90;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
const FALLBACK_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum FxError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),
    #[error("rate not found for EUR/{0}")]
    MissingCurrency(String),
    #[error("invalid rate '{value}' for EUR/{currency}")]
    InvalidRate { currency: String, value: String },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RateSource {
    Live,
    Fallback,
    Manual,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRate {
    pub sek_per_eur: f64,
    pub source: RateSource,
    pub date: Option<NaiveDate>,
}

impl ExchangeRate {
    pub fn fallback() -> Self {
        Self {
            sek_per_eur: FALLBACK_SEK_PER_EUR,
            source: RateSource::Fallback,
            date: None,
        }
    }

    pub fn manual(sek_per_eur: f64) -> Self {
        Self {
            sek_per_eur,
            source: RateSource::Manual,
            date: None,
        }
    }
}

pub fn http_client() -> Result<reqwest::Client, FxError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

/// Fetch today's EUR/`currency` reference rate.
pub async fn fetch_daily_rate(
    client: &reqwest::Client,
    currency: &str,
) -> Result<(f64, Option<NaiveDate>), FxError> {
    let response = client.get(ECB_DAILY_URL).send().await?;
    if !response.status().is_success() {
        return Err(FxError::Status(response.status()));
    }
    let xml = response.text().await?;
    parse_daily_rate(&xml, currency)
}

/// SEK per EUR from the ECB, or the fallback constant if that fails.
pub async fn rate_or_fallback(client: &reqwest::Client) -> ExchangeRate {
    match fetch_daily_rate(client, "SEK").await {
        Ok((sek_per_eur, date)) => {
            info!(sek_per_eur, ?date, "fetched ECB exchange rate");
            ExchangeRate {
                sek_per_eur,
                source: RateSource::Live,
                date,
            }
        }
        Err(e) => {
            warn!(error = %e, fallback = FALLBACK_SEK_PER_EUR, "ECB lookup failed, using fallback rate");
            ExchangeRate::fallback()
        }
    }
}

/// Reads `<Cube currency='SEK' rate='11.1234'/>` out of the daily feed.
///
/// The feed is a tiny, flat XML document; scanning the `Cube` tags is enough.
pub fn parse_daily_rate(xml: &str, currency: &str) -> Result<(f64, Option<NaiveDate>), FxError> {
    let mut date = None;
    for tag in xml.split('<').filter(|t| t.starts_with("Cube")) {
        if let Some(time) = extract_attribute(tag, "time") {
            date = NaiveDate::parse_from_str(time, "%Y-%m-%d").ok();
        }
        if extract_attribute(tag, "currency") != Some(currency) {
            continue;
        }
        let Some(raw) = extract_attribute(tag, "rate") else {
            return Err(FxError::MissingCurrency(currency.to_string()));
        };
        return match raw.parse::<f64>() {
            Ok(rate) if rate.is_finite() && rate > 0.0 => Ok((rate, date)),
            _ => Err(FxError::InvalidRate {
                currency: currency.to_string(),
                value: raw.to_string(),
            }),
        };
    }
    Err(FxError::MissingCurrency(currency.to_string()))
}

fn extract_attribute<'a>(tag: &'a str, attr: &str) -> Option<&'a str> {
    let pattern = format!("{attr}=");
    let mut rest = tag;
    loop {
        let start = rest.find(&pattern)?;
        // Skip matches that are the tail of a longer attribute name.
        let preceded_by_space = rest[..start].ends_with(char::is_whitespace);
        rest = &rest[start + pattern.len()..];
        if !preceded_by_space {
            continue;
        }
        let quote = rest.chars().next()?;
        if quote != '\'' && quote != '"' {
            return None;
        }
        let end = rest[1..].find(quote)? + 1;
        return Some(&rest[1..end]);
    }
}

/// Remembers the last looked-up rate for a fixed time. A fallback rate is
/// kept for at most a minute so the feed is retried soon after an outage.
#[derive(Clone)]
pub struct RateCache {
    client: reqwest::Client,
    ttl: Duration,
    entry: Arc<RwLock<Option<(Instant, ExchangeRate)>>>,
}

impl RateCache {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_ttl(client, DEFAULT_TTL)
    }

    pub fn with_ttl(client: reqwest::Client, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            entry: Arc::new(RwLock::new(None)),
        }
    }

    /// Seeds the cache with a known rate.
    pub async fn prime(&self, rate: ExchangeRate) {
        *self.entry.write().await = Some((Instant::now(), rate));
    }

    pub async fn get(&self) -> ExchangeRate {
        let entry = *self.entry.read().await;
        if let Some(rate) = self.fresh(entry, Instant::now()) {
            debug!(sek_per_eur = rate.sek_per_eur, "exchange rate cache hit");
            return rate;
        }

        let rate = rate_or_fallback(&self.client).await;
        *self.entry.write().await = Some((Instant::now(), rate));
        rate
    }

    fn lifetime(&self, rate: &ExchangeRate) -> Duration {
        match rate.source {
            RateSource::Fallback => self.ttl.min(FALLBACK_TTL),
            RateSource::Live | RateSource::Manual => self.ttl,
        }
    }

    fn fresh(&self, entry: Option<(Instant, ExchangeRate)>, now: Instant) -> Option<ExchangeRate> {
        let (fetched_at, rate) = entry?;
        (now.saturating_duration_since(fetched_at) < self.lifetime(&rate)).then_some(rate)
    }
}
