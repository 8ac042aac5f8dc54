//! Risk scoring and premium calculation.
//!
//! Everything here is a pure function over plain values: no I/O and no clock access
//! (the reference date is always passed in). The scoring tables are:
//!
//! | Driver age | Points |   | Accidents (3y) | Points |   | Residence | Points |
//! |------------|--------|---|----------------|--------|---|-----------|--------|
//! | 18-25      | 15     |   | 0              | 0      |   | B (low)   | 5      |
//! | 26-40      | 5      |   | 1              | 10     |   | M (mid)   | 10     |
//! | 41-60      | 3      |   | 2              | 20     |   | A (high)  | 20     |
//! | other      | 10     |   | 3+             | 30     |   |           |        |
//!
//! The total score maps to a tier (0-10 → 1, 11-25 → 2, 26-40 → 3, 41-55 → 4, 56+ → 5)
//! and the tier to a surcharge applied on top of each coverage's base cost.

use crate::errors::AppError;
use bigdecimal::{BigDecimal, RoundingMode};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Number of past calendar years searched for accidents.
pub const ACCIDENT_LOOKBACK_YEARS: i32 = 3;

/// Fixed fee for home protection, in currency units.
const HOME_PROTECTION_FEE: i64 = 100;

const BASIS_POINTS: i64 = 10_000;

/// Completed years between `birth_date` and `today`.
///
/// The age only increments once the birthday anniversary has been reached in the
/// current year. A birth date in the future is rejected.
pub fn driver_age(birth_date: NaiveDate, today: NaiveDate) -> Result<u32, AppError> {
    if birth_date > today {
        return Err(AppError::InvalidInput(format!(
            "Data de nascimento no futuro: {}",
            birth_date
        )));
    }

    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }

    // birth_date <= today, so the age can't go negative
    Ok(age.max(0) as u32)
}

/// Points contributed by the driver's age.
pub fn age_points(age: u32) -> u32 {
    match age {
        18..=25 => 15,
        26..=40 => 5,
        41..=60 => 3,
        _ => 10,
    }
}

/// Points contributed by the accident count over the lookback window.
pub fn accident_points(accidents: usize) -> u32 {
    match accidents {
        0 => 0,
        1 => 10,
        2 => 20,
        _ => 30,
    }
}

/// Risk associated with the region the driver lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidenceTier {
    /// `B` - baixo risco.
    Low,
    /// `M` - médio risco.
    Medium,
    /// `A` - alto risco.
    High,
}

impl ResidenceTier {
    pub fn code(self) -> &'static str {
        match self {
            ResidenceTier::Low => "B",
            ResidenceTier::Medium => "M",
            ResidenceTier::High => "A",
        }
    }

    pub fn points(self) -> u32 {
        match self {
            ResidenceTier::Low => 5,
            ResidenceTier::Medium => 10,
            ResidenceTier::High => 20,
        }
    }
}

impl FromStr for ResidenceTier {
    type Err = AppError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        match code {
            "B" => Ok(ResidenceTier::Low),
            "M" => Ok(ResidenceTier::Medium),
            "A" => Ok(ResidenceTier::High),
            other => Err(AppError::InvalidInput(format!(
                "Residência inválida: '{}' (esperado B, M ou A)",
                other
            ))),
        }
    }
}

/// Sums the age, accident and residence contributions. No clamping is applied.
pub fn compute_risk_score(
    birth_date: NaiveDate,
    accidents_last_3_years: usize,
    residence_code: &str,
    today: NaiveDate,
) -> Result<u32, AppError> {
    let residence: ResidenceTier = residence_code.parse()?;
    let age = driver_age(birth_date, today)?;

    let score = age_points(age) + accident_points(accidents_last_3_years) + residence.points();

    tracing::debug!(
        age,
        accidents = accidents_last_3_years,
        residence = residence.code(),
        score,
        "Risk score computed"
    );

    Ok(score)
}

/// Risk tier, 1 (lowest) to 5 (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RiskTier(u8);

impl RiskTier {
    pub const MIN: RiskTier = RiskTier(1);
    pub const MAX: RiskTier = RiskTier(5);

    pub fn new(level: i64) -> Result<Self, AppError> {
        match level {
            1..=5 => Ok(RiskTier(level as u8)),
            _ => Err(AppError::InvalidInput(format!(
                "Nível de risco inválido: {}",
                level
            ))),
        }
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// Surcharge over the base cost, in basis points.
    pub fn surcharge_bps(self) -> i64 {
        match self.0 {
            1 => 0,
            2 => 500,
            3 => 1_000,
            4 => 2_000,
            _ => 3_000,
        }
    }

    /// Multiplier applied to surcharged coverages (`1 + surcharge`).
    pub fn multiplier(self) -> BigDecimal {
        BigDecimal::from(BASIS_POINTS + self.surcharge_bps()) / BigDecimal::from(BASIS_POINTS)
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maps a risk score onto its tier.
pub fn classify_tier(score: i64) -> Result<RiskTier, AppError> {
    let level = match score {
        s if s < 0 => {
            return Err(AppError::InvalidInput(format!(
                "Pontuação de risco negativa: {}",
                score
            )))
        }
        0..=10 => 1,
        11..=25 => 2,
        26..=40 => 3,
        41..=55 => 4,
        _ => 5,
    };

    RiskTier::new(level)
}

/// Coverages that can be quoted. Wire names are the codes used by the quote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CoverageCode {
    /// Theft.
    RouboFurto,
    /// Collision.
    Colisao,
    /// Third-party liability.
    Terceiros,
    /// Home protection, flat fee.
    ProtecaoResidencial,
}

impl CoverageCode {
    pub const ALL: [CoverageCode; 4] = [
        CoverageCode::RouboFurto,
        CoverageCode::Colisao,
        CoverageCode::Terceiros,
        CoverageCode::ProtecaoResidencial,
    ];

    pub fn code(self) -> &'static str {
        match self {
            CoverageCode::RouboFurto => "RouboFurto",
            CoverageCode::Colisao => "Colisao",
            CoverageCode::Terceiros => "Terceiros",
            CoverageCode::ProtecaoResidencial => "ProtecaoResidencial",
        }
    }

    /// Share of the market value charged as base cost, in basis points.
    /// `None` for flat-fee coverages.
    fn market_rate_bps(self) -> Option<i64> {
        match self {
            CoverageCode::RouboFurto => Some(300),
            CoverageCode::Colisao => Some(400),
            CoverageCode::Terceiros => Some(150),
            CoverageCode::ProtecaoResidencial => None,
        }
    }

    /// Whether the tier surcharge applies to this coverage.
    pub fn is_surcharged(self) -> bool {
        self.market_rate_bps().is_some()
    }

    /// Base cost before any tier adjustment.
    pub fn base_cost(self, market_value: &BigDecimal) -> BigDecimal {
        match self.market_rate_bps() {
            Some(bps) => {
                market_value * &(BigDecimal::from(bps) / BigDecimal::from(BASIS_POINTS))
            }
            None => BigDecimal::from(HOME_PROTECTION_FEE),
        }
    }

    /// Base cost adjusted by the tier surcharge, unrounded.
    pub fn adjusted_cost(self, market_value: &BigDecimal, tier: RiskTier) -> BigDecimal {
        let base = self.base_cost(market_value);
        if self.is_surcharged() {
            base * tier.multiplier()
        } else {
            base
        }
    }
}

impl FromStr for CoverageCode {
    type Err = AppError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        CoverageCode::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or_else(|| AppError::InvalidInput(format!("Cobertura inválida: '{}'", code)))
    }
}

impl fmt::Display for CoverageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Parses every requested code up front, so one unknown code rejects the whole list.
/// Repeated codes collapse into one coverage.
pub fn parse_coverages<S: AsRef<str>>(codes: &[S]) -> Result<BTreeSet<CoverageCode>, AppError> {
    codes.iter().map(|c| c.as_ref().parse()).collect()
}

/// Rounds up to the next cent. Amounts already exact to the cent are unchanged.
pub fn round_up_to_cent(amount: &BigDecimal) -> BigDecimal {
    amount.with_scale_round(2, RoundingMode::Ceiling)
}

/// Sum of the adjusted cost of each coverage, rounded up to the cent.
pub fn price(
    market_value: &BigDecimal,
    tier: RiskTier,
    coverages: &BTreeSet<CoverageCode>,
) -> Result<BigDecimal, AppError> {
    if *market_value < BigDecimal::from(0) {
        return Err(AppError::InvalidInput(format!(
            "Valor de mercado negativo: {}",
            market_value
        )));
    }

    let total = coverages
        .iter()
        .fold(BigDecimal::from(0), |acc, coverage| {
            acc + coverage.adjusted_cost(market_value, tier)
        });

    Ok(round_up_to_cent(&total))
}

/// Prices raw coverage codes at a raw tier level.
///
/// Validates the tier and every code before any amount is computed.
pub fn calculate_premium<S: AsRef<str>>(
    market_value: &BigDecimal,
    tier_level: i64,
    codes: &[S],
) -> Result<BigDecimal, AppError> {
    let tier = RiskTier::new(tier_level)?;
    let coverages = parse_coverages(codes)?;
    price(market_value, tier, &coverages)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_age_before_and_after_birthday() {
        let today = date(2026, 10, 16);
        assert_eq!(driver_age(date(1996, 10, 16), today).unwrap(), 30);
        assert_eq!(driver_age(date(1996, 10, 17), today).unwrap(), 29);
        assert_eq!(driver_age(date(1996, 1, 1), today).unwrap(), 30);
        assert_eq!(driver_age(today, today).unwrap(), 0);
    }

    #[test]
    fn test_age_leap_day_birthday() {
        // Not yet 26 on Feb 28 of a common year
        assert_eq!(driver_age(date(2000, 2, 29), date(2026, 2, 28)).unwrap(), 25);
        assert_eq!(driver_age(date(2000, 2, 29), date(2026, 3, 1)).unwrap(), 26);
    }

    #[test]
    fn test_future_birth_date_rejected() {
        let err = driver_age(date(2030, 1, 1), date(2026, 10, 16)).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_age_point_boundaries() {
        let cases = [
            (17, 10),
            (18, 15),
            (25, 15),
            (26, 5),
            (40, 5),
            (41, 3),
            (60, 3),
            (61, 10),
            (0, 10),
            (95, 10),
        ];
        for (age, points) in cases {
            assert_eq!(age_points(age), points, "age {}", age);
        }
    }

    #[test]
    fn test_accident_points() {
        assert_eq!(accident_points(0), 0);
        assert_eq!(accident_points(1), 10);
        assert_eq!(accident_points(2), 20);
        assert_eq!(accident_points(3), 30);
        assert_eq!(accident_points(10), 30);
    }

    #[test]
    fn test_residence_codes() {
        assert_eq!("B".parse::<ResidenceTier>().unwrap().points(), 5);
        assert_eq!("M".parse::<ResidenceTier>().unwrap().points(), 10);
        assert_eq!("A".parse::<ResidenceTier>().unwrap().points(), 20);

        for bad in ["", "X", "b", "AA"] {
            assert!(bad.parse::<ResidenceTier>().is_err(), "code {:?}", bad);
        }
    }

    #[test]
    fn test_tier_breakpoints() {
        let cases = [
            (0, 1),
            (10, 1),
            (11, 2),
            (25, 2),
            (26, 3),
            (40, 3),
            (41, 4),
            (55, 4),
            (56, 5),
            (1_000, 5),
        ];
        for (score, level) in cases {
            assert_eq!(classify_tier(score).unwrap().level(), level, "score {}", score);
        }
        assert!(classify_tier(-1).is_err());
    }

    #[test]
    fn test_tier_range() {
        assert!(RiskTier::new(0).is_err());
        assert!(RiskTier::new(6).is_err());
        assert_eq!(RiskTier::new(3).unwrap().level(), 3);
    }

    #[test]
    fn test_surcharge_multipliers() {
        let expected = ["1", "1.05", "1.10", "1.20", "1.30"];
        for (level, mult) in (1..=5).zip(expected) {
            assert_eq!(RiskTier::new(level).unwrap().multiplier(), dec(mult));
        }
    }

    #[test]
    fn test_unknown_coverage_rejects_whole_list() {
        let err = parse_coverages(&["RouboFurto", "Vidros", "Colisao"]).unwrap_err();
        assert!(err.to_string().contains("Vidros"));
    }

    #[test]
    fn test_codes_match_exactly() {
        assert!(parse_coverages(&["Colisao "]).is_err());
        assert!(parse_coverages(&["colisao"]).is_err());
        assert!(" A".parse::<ResidenceTier>().is_err());
        assert!("a".parse::<ResidenceTier>().is_err());
        assert_eq!("A".parse::<ResidenceTier>().unwrap(), ResidenceTier::High);
    }

    #[test]
    fn test_duplicate_coverages_collapse() {
        let parsed = parse_coverages(&["Colisao", "Colisao"]).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_rounding_goes_up() {
        assert_eq!(round_up_to_cent(&dec("100.001")), dec("100.01"));
        assert_eq!(round_up_to_cent(&dec("100.00")), dec("100.00"));
        assert_eq!(round_up_to_cent(&dec("44.0000")), dec("44.00"));
        assert_eq!(round_up_to_cent(&dec("0.0001")), dec("0.01"));
    }

    #[test]
    fn test_price_all_coverages() {
        // 300 + 400 + 150 at +20%, plus 100 flat
        let premium = calculate_premium(
            &dec("10000"),
            4,
            &["RouboFurto", "Colisao", "Terceiros", "ProtecaoResidencial"],
        )
        .unwrap();
        assert_eq!(premium, dec("1120.00"));
    }

    #[test]
    fn test_negative_market_value_rejected() {
        assert!(calculate_premium(&dec("-1"), 1, &["Colisao"]).is_err());
    }

    #[test]
    fn test_price_empty_coverages_is_zero() {
        let premium = price(&dec("1000"), RiskTier::MIN, &BTreeSet::new()).unwrap();
        assert_eq!(premium, dec("0.00"));
    }
}
