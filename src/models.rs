use crate::errors::AppError;
use crate::pricing::{CoverageCode, ResidenceTier};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::OnceLock;
use uuid::Uuid;

// ============ Quote Request ============

/// Body of `POST /api/v1/simulacao-seguro`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuoteRequest {
    #[serde(rename = "veiculo")]
    pub vehicle: Vehicle,
    #[serde(rename = "proprietario")]
    pub owner: Owner,
    #[serde(rename = "condutor")]
    pub driver: Driver,
    #[serde(rename = "coberturas")]
    pub coverages: Coverages,
}

/// Vehicle identity, as listed in the FIPE table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Vehicle {
    #[serde(rename = "marca")]
    pub make: String,
    #[serde(rename = "modelo")]
    pub model: String,
    /// Model year, e.g. "2020".
    #[serde(rename = "ano")]
    pub year: String,
}

/// Registered owner of the vehicle.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Owner {
    pub cpf: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(rename = "dataNascimento", deserialize_with = "deserialize_date")]
    pub birth_date: NaiveDate,
    /// Residence risk code (`B`, `M` or `A`).
    #[serde(rename = "residencia")]
    pub residence: String,
}

/// Main driver. Scoring is based on this person.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Driver {
    pub cpf: String,
    #[serde(rename = "dataNascimento", deserialize_with = "deserialize_date")]
    pub birth_date: NaiveDate,
    /// Residence risk code (`B`, `M` or `A`).
    #[serde(rename = "residencia")]
    pub residence: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Coverages {
    /// Requested coverage codes. Unknown codes are kept as strings so they can be
    /// rejected with a proper message instead of a deserialization failure.
    #[serde(rename = "cobertura", default)]
    pub codes: Vec<String>,
}

impl QuoteRequest {
    /// Checks the request data before any external lookup is made.
    ///
    /// Coverage codes and the driver's residence are validated by the pricing module when
    /// parsed. The owner is not scored, so the owner's residence is checked here.
    pub fn validate(&self) -> Result<(), AppError> {
        let vehicle = &self.vehicle;
        if vehicle.make.trim().is_empty() || vehicle.model.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Marca e modelo do veículo são obrigatórios".to_string(),
            ));
        }
        if !is_valid_model_year(&vehicle.year) {
            return Err(AppError::InvalidInput(format!(
                "Ano do veículo inválido: '{}'",
                vehicle.year
            )));
        }

        if self.owner.name.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Nome do proprietário é obrigatório".to_string(),
            ));
        }
        self.owner.residence.parse::<ResidenceTier>()?;
        normalize_cpf(&self.owner.cpf)?;
        normalize_cpf(&self.driver.cpf)?;

        if self.coverages.codes.is_empty() {
            return Err(AppError::InvalidInput(
                "Informe ao menos uma cobertura".to_string(),
            ));
        }

        Ok(())
    }
}

fn is_valid_model_year(year: &str) -> bool {
    static YEAR_RE: OnceLock<Regex> = OnceLock::new();
    YEAR_RE
        .get_or_init(|| Regex::new(r"^(19|20)\d{2}$").expect("valid year regex"))
        .is_match(year.trim())
}

/// Strips CPF formatting: `123.456.789-01` -> `12345678901`.
///
/// Only the digit count is checked; check digits are left to the upstream registries.
pub fn normalize_cpf(raw: &str) -> Result<String, AppError> {
    static CPF_RE: OnceLock<Regex> = OnceLock::new();
    let re = CPF_RE
        .get_or_init(|| Regex::new(r"^\d{3}\.?\d{3}\.?\d{3}-?\d{2}$").expect("valid CPF regex"));

    let trimmed = raw.trim();
    if !re.is_match(trimmed) {
        return Err(AppError::InvalidInput(format!("CPF inválido: '{}'", raw)));
    }

    Ok(trimmed.chars().filter(|c| c.is_ascii_digit()).collect())
}

/// Accepts `YYYY-MM-DD` or an ISO datetime; only the date part is kept.
fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_date(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    let trimmed = raw.trim();
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| format!("invalid date '{}': {}", raw, e))
}

// ============ External API Models ============

/// One accident reported by the accident history provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccidentRecord {
    /// Year of the accident, e.g. "2021".
    #[serde(rename = "ano")]
    pub year: String,
    /// Severity code (`G` grave, `L` leve).
    #[serde(rename = "gravidade")]
    pub severity: String,
}

impl AccidentRecord {
    pub fn new(year: impl Into<String>, severity: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            severity: severity.into(),
        }
    }
}

// ============ Quote Response ============

/// Successful simulation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub simulacao_id: Uuid,
    /// Premium, rounded up to the cent.
    pub valor_seguro: String,
    /// FIPE market value used for pricing.
    pub valor_veiculo: String,
    pub quantidade_acidentes: usize,
    pub pontuacao_risco: u32,
    pub nivel_risco: u8,
    pub coberturas: Vec<CoverageCode>,
}
