/// Quote simulation workflow shared by the HTTP handler and tests
///
/// 1. Validate the request
/// 2. Fetch the FIPE market value and the driver's accident history (concurrently)
/// 3. Score the driver and classify the risk tier
/// 4. Price the requested coverages
use crate::errors::{AppError, ResultExt};
use crate::models::{QuoteRequest, QuoteResponse};
use crate::pricing::{self, CoverageCode, RiskTier, ACCIDENT_LOOKBACK_YEARS};
use crate::services::{AccidentHistoryProvider, VehicleValuationProvider};
use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{Datelike, NaiveDate};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Everything computed for one simulation.
#[derive(Debug, Clone)]
pub struct QuoteOutcome {
    pub id: Uuid,
    pub market_value: BigDecimal,
    pub accident_count: usize,
    pub risk_score: u32,
    pub risk_tier: RiskTier,
    pub premium: BigDecimal,
    pub coverages: BTreeSet<CoverageCode>,
}

impl From<QuoteOutcome> for QuoteResponse {
    fn from(outcome: QuoteOutcome) -> Self {
        QuoteResponse {
            simulacao_id: outcome.id,
            valor_seguro: outcome.premium.to_string(),
            valor_veiculo: outcome
                .market_value
                .with_scale_round(2, RoundingMode::HalfUp)
                .to_string(),
            quantidade_acidentes: outcome.accident_count,
            pontuacao_risco: outcome.risk_score,
            nivel_risco: outcome.risk_tier.level(),
            coberturas: outcome.coverages.into_iter().collect(),
        }
    }
}

/// Runs quote simulations against a pair of data providers.
#[derive(Clone)]
pub struct QuoteSimulator {
    valuation: Arc<dyn VehicleValuationProvider>,
    history: Arc<dyn AccidentHistoryProvider>,
}

impl QuoteSimulator {
    pub fn new(
        valuation: Arc<dyn VehicleValuationProvider>,
        history: Arc<dyn AccidentHistoryProvider>,
    ) -> Self {
        Self { valuation, history }
    }

    /// Simulates a quote as of `today`.
    ///
    /// The two lookups run concurrently and race against `cancel`: if it resolves first
    /// both are dropped and the simulation ends with [`AppError::Cancelled`]. Input errors
    /// are reported before any lookup is issued.
    pub async fn simulate<C>(
        &self,
        request: &QuoteRequest,
        today: NaiveDate,
        cancel: C,
    ) -> Result<QuoteOutcome, AppError>
    where
        C: Future<Output = ()>,
    {
        let id = Uuid::new_v4();
        let span = tracing::info_span!("simulation", %id);

        self.run(id, request, today, cancel).instrument(span).await
    }

    async fn run<C>(
        &self,
        id: Uuid,
        request: &QuoteRequest,
        today: NaiveDate,
        cancel: C,
    ) -> Result<QuoteOutcome, AppError>
    where
        C: Future<Output = ()>,
    {
        request.validate()?;
        let driver_cpf = crate::models::normalize_cpf(&request.driver.cpf)?;
        let coverages = pricing::parse_coverages(&request.coverages.codes)?;
        // Residence and owner birth date are checked up front so bad input never costs an
        // upstream call
        request
            .driver
            .residence
            .parse::<pricing::ResidenceTier>()?;
        pricing::driver_age(request.owner.birth_date, today)?;

        let since_year = today.year() - ACCIDENT_LOOKBACK_YEARS;
        let vehicle = &request.vehicle;

        let lookups = async {
            tokio::try_join!(
                async {
                    self.valuation
                        .market_value(&vehicle.make, &vehicle.model, &vehicle.year)
                        .await
                        .context("FIPE lookup")
                },
                async {
                    self.history
                        .accidents_since(&driver_cpf, since_year)
                        .await
                        .with_context(|| format!("Accident history lookup since {}", since_year))
                },
            )
        };

        let (market_value, accidents) = tokio::select! {
            // Prefer cancellation when both are ready
            biased;
            _ = cancel => {
                tracing::warn!("Simulation cancelled during external lookups");
                return Err(AppError::Cancelled);
            }
            result = lookups => result?,
        };

        let risk_score = pricing::compute_risk_score(
            request.driver.birth_date,
            accidents.len(),
            &request.driver.residence,
            today,
        )?;
        let risk_tier = pricing::classify_tier(i64::from(risk_score))?;
        let premium = pricing::price(&market_value, risk_tier, &coverages)?;

        tracing::info!(
            market_value = %market_value,
            accidents = accidents.len(),
            risk_score,
            risk_tier = risk_tier.level(),
            premium = %premium,
            "Quote simulated"
        );

        Ok(QuoteOutcome {
            id,
            market_value,
            accident_count: accidents.len(),
            risk_score,
            risk_tier,
            premium,
            coverages,
        })
    }
}
