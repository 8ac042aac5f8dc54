//! External data providers consumed by the quote simulation.
//!
//! Both providers are capability traits so the simulation can run against the real
//! HTTP APIs, the fixed stubs, or a test double without changing.

use crate::config::Config;
use crate::errors::AppError;
use crate::models::AccidentRecord;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Market value of a vehicle (FIPE table).
#[async_trait]
pub trait VehicleValuationProvider: Send + Sync {
    async fn market_value(
        &self,
        make: &str,
        model: &str,
        year: &str,
    ) -> Result<BigDecimal, AppError>;
}

/// Accidents involving a driver since the start of `since_year`.
#[async_trait]
pub trait AccidentHistoryProvider: Send + Sync {
    async fn accidents_since(
        &self,
        driver_cpf: &str,
        since_year: i32,
    ) -> Result<Vec<AccidentRecord>, AppError>;
}

/// Picks the HTTP provider when its URL is configured, otherwise the fixed stub.
pub fn build_providers(
    config: &Config,
) -> Result<
    (
        Arc<dyn VehicleValuationProvider>,
        Arc<dyn AccidentHistoryProvider>,
    ),
    AppError,
> {
    let timeout = Duration::from_secs(config.upstream_timeout_secs);

    let valuation: Arc<dyn VehicleValuationProvider> = match config.fipe_api_url {
        Some(ref url) => Arc::new(FipeApiService::new(url.clone(), timeout)?),
        None => Arc::new(FixedValuation::default()),
    };

    let history: Arc<dyn AccidentHistoryProvider> = match config.accident_history_api_url {
        Some(ref url) => Arc::new(AccidentHistoryApiService::new(
            url.clone(),
            config.accident_history_token.clone(),
            timeout,
        )?),
        None => Arc::new(FixedAccidentHistory::default()),
    };

    Ok((valuation, history))
}

fn build_client(timeout: Duration, name: &str) -> Result<Client, AppError> {
    Client::builder().timeout(timeout).build().map_err(|e| {
        AppError::InternalError(format!("Failed to create {} client: {}", name, e))
    })
}

// ============ FIPE ============

#[derive(Debug, Deserialize)]
struct FipeValueResponse {
    #[serde(alias = "Valor")]
    valor: Value,
}

/// Client for the FIPE vehicle pricing table.
pub struct FipeApiService {
    client: Client,
    base_url: String,
}

impl FipeApiService {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout, "FIPE")?,
            base_url,
        })
    }
}

#[async_trait]
impl VehicleValuationProvider for FipeApiService {
    async fn market_value(
        &self,
        make: &str,
        model: &str,
        year: &str,
    ) -> Result<BigDecimal, AppError> {
        // Build URL with proper parameter encoding
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/Fipe", self.base_url),
            &[("marca", make), ("modelo", model), ("ano", year)],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build FIPE URL: {}", e)))?;

        tracing::info!("FIPE: Fetching market value for {} {} {}", make, model, year);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::UpstreamUnavailable(format!(
                "FIPE returned status {}: {}",
                status, error_text
            )));
        }

        let body: FipeValueResponse = response.json().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to parse FIPE response: {}", e))
        })?;

        let value = parse_market_value(&body.valor)?;
        tracing::info!("FIPE: Market value {} for {} {} {}", value, make, model, year);
        Ok(value)
    }
}

/// Reads the FIPE `valor` field, given either as a JSON number or as a Brazilian
/// currency string such as `"R$ 25.410,00"`.
pub fn parse_market_value(raw: &Value) -> Result<BigDecimal, AppError> {
    let value = match raw {
        // Go through the textual form so the decimal is exact
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => parse_brl_amount(s),
        _ => None,
    }
    .ok_or_else(|| AppError::UpstreamUnavailable(format!("Invalid FIPE value: {}", raw)))?;

    if value < BigDecimal::from(0) {
        return Err(AppError::UpstreamUnavailable(format!(
            "Negative FIPE value: {}",
            value
        )));
    }

    Ok(value)
}

/// `"R$ 25.410,00"` -> `25410.00`.
///
/// A comma is always the decimal separator. Without one, dots are thousands separators
/// when they group digits by three (`"R$ 25.410"`, `"25.410"`); a plain `"1000.50"` is
/// read as a decimal. A currency-prefixed amount with any other dot layout is ambiguous
/// and rejected.
pub fn parse_brl_amount(raw: &str) -> Option<BigDecimal> {
    static THOUSANDS_RE: OnceLock<Regex> = OnceLock::new();
    let thousands = THOUSANDS_RE
        .get_or_init(|| Regex::new(r"^\d{1,3}(\.\d{3})+$").expect("valid thousands regex"));

    let trimmed = raw.trim();
    let has_currency = trimmed.starts_with("R$");
    let cleaned = trimmed.trim_start_matches("R$").trim().replace(' ', "");
    if cleaned.is_empty() {
        return None;
    }

    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replace(',', ".")
    } else if thousands.is_match(&cleaned) {
        cleaned.replace('.', "")
    } else if has_currency && cleaned.contains('.') {
        return None;
    } else {
        cleaned
    };

    BigDecimal::from_str(&normalized).ok()
}

// ============ Accident history ============

/// Client for the accident history registry, queried by driver CPF.
pub struct AccidentHistoryApiService {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl AccidentHistoryApiService {
    pub fn new(
        base_url: String,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        Ok(Self {
            client: build_client(timeout, "accident history")?,
            base_url,
            token,
        })
    }
}

#[async_trait]
impl AccidentHistoryProvider for AccidentHistoryApiService {
    async fn accidents_since(
        &self,
        driver_cpf: &str,
        since_year: i32,
    ) -> Result<Vec<AccidentRecord>, AppError> {
        let since = since_year.to_string();
        let url = reqwest::Url::parse_with_params(
            &format!("{}/api/acidentes/{}", self.base_url, driver_cpf),
            &[("anoInicial", since.as_str())],
        )
        .map_err(|e| {
            AppError::InternalError(format!("Failed to build accident history URL: {}", e))
        })?;

        tracing::info!(
            "Accident history: Fetching accidents for CPF {} since {}",
            driver_cpf,
            since_year
        );

        let mut request = self.client.get(url);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::UpstreamUnavailable(format!(
                "Accident history returned status {}: {}",
                status, error_text
            )));
        }

        let records: Vec<AccidentRecord> = response.json().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!(
                "Failed to parse accident history response: {}",
                e
            ))
        })?;

        tracing::info!(
            "Accident history: Found {} accidents for CPF {}",
            records.len(),
            driver_cpf
        );
        Ok(records)
    }
}

// ============ Fixed stubs ============

/// Valuation stub returning the same market value for every vehicle.
#[derive(Debug, Clone)]
pub struct FixedValuation {
    pub value: BigDecimal,
}

impl Default for FixedValuation {
    fn default() -> Self {
        Self {
            value: BigDecimal::from(1000),
        }
    }
}

#[async_trait]
impl VehicleValuationProvider for FixedValuation {
    async fn market_value(
        &self,
        make: &str,
        model: &str,
        year: &str,
    ) -> Result<BigDecimal, AppError> {
        tracing::debug!("Fixed valuation for {} {} {}: {}", make, model, year, self.value);
        Ok(self.value.clone())
    }
}

/// History stub returning the same records for every driver.
#[derive(Debug, Clone)]
pub struct FixedAccidentHistory {
    pub records: Vec<AccidentRecord>,
}

impl Default for FixedAccidentHistory {
    fn default() -> Self {
        Self {
            records: vec![
                AccidentRecord::new("2021", "G"),
                AccidentRecord::new("2022", "L"),
            ],
        }
    }
}

#[async_trait]
impl AccidentHistoryProvider for FixedAccidentHistory {
    async fn accidents_since(
        &self,
        driver_cpf: &str,
        since_year: i32,
    ) -> Result<Vec<AccidentRecord>, AppError> {
        tracing::debug!(
            "Fixed accident history for CPF {} since {}: {} records",
            driver_cpf,
            since_year,
            self.records.len()
        );
        Ok(self.records.clone())
    }
}
