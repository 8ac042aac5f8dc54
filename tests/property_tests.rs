/// Property-based tests using proptest
/// Tests invariants of the scoring and pricing rules that should hold for all inputs
use bigdecimal::BigDecimal;
use proptest::prelude::*;
use seguro_veiculo_api::pricing::{
    accident_points, age_points, calculate_premium, classify_tier, parse_coverages,
    round_up_to_cent, CoverageCode,
};

fn coverage_codes() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(
        CoverageCode::ALL.iter().map(|c| c.code()).collect::<Vec<_>>(),
        1..=4,
    )
}

/// Cents as an exact decimal: 123456 -> 1234.56
fn cents(value: u64) -> BigDecimal {
    BigDecimal::from(value) / BigDecimal::from(100)
}

// Property: age and accident tables are total and bounded
proptest! {
    #[test]
    fn age_points_always_documented_value(age in 0u32..200) {
        prop_assert!([15, 5, 3, 10].contains(&age_points(age)));
    }

    #[test]
    fn accident_points_monotone(count in 0usize..1_000) {
        prop_assert!(accident_points(count) <= accident_points(count + 1));
        prop_assert!(accident_points(count) <= 30);
    }
}

// Property: tier classifier covers [0, inf) and never decreases
proptest! {
    #[test]
    fn tier_is_total_and_monotone(score in 0i64..10_000) {
        let tier = classify_tier(score).unwrap();
        let next = classify_tier(score + 1).unwrap();
        prop_assert!((1..=5).contains(&tier.level()));
        prop_assert!(tier <= next);
    }

    #[test]
    fn negative_scores_rejected(score in i64::MIN..0) {
        prop_assert!(classify_tier(score).is_err());
    }
}

// Property: pricing is monotone in market value and tier
proptest! {
    #[test]
    fn premium_monotone_in_market_value(
        value in 0u64..100_000_000,
        delta in 0u64..1_000_000,
        level in 1i64..=5,
        codes in coverage_codes()
    ) {
        let low = calculate_premium(&cents(value), level, &codes).unwrap();
        let high = calculate_premium(&cents(value + delta), level, &codes).unwrap();
        prop_assert!(low <= high);
    }

    #[test]
    fn premium_monotone_in_tier(
        value in 0u64..100_000_000,
        level in 1i64..5,
        codes in coverage_codes()
    ) {
        let low = calculate_premium(&cents(value), level, &codes).unwrap();
        let high = calculate_premium(&cents(value), level + 1, &codes).unwrap();
        prop_assert!(low <= high);
    }

    #[test]
    fn premium_never_below_unrounded_total(
        value in 0u64..100_000_000,
        level in 1i64..=5
    ) {
        let market = cents(value);
        let premium = calculate_premium(&market, level, &["Terceiros"]).unwrap();
        let tier = seguro_veiculo_api::pricing::RiskTier::new(level).unwrap();
        let exact = CoverageCode::Terceiros.adjusted_cost(&market, tier);
        prop_assert!(premium >= exact);
        prop_assert!(&premium - &exact < cents(1));
    }
}

// Property: rounding goes up to the cent and keeps exact cents unchanged
proptest! {
    #[test]
    fn exact_cents_unchanged(value in 0u64..1_000_000_000) {
        let amount = cents(value);
        prop_assert_eq!(round_up_to_cent(&amount), amount);
    }

    #[test]
    fn sub_cent_fraction_rounds_up(value in 0u64..1_000_000_000, fraction in 1u64..10) {
        // value cents plus fraction/10 of a cent
        let amount = cents(value) + BigDecimal::from(fraction) / BigDecimal::from(1_000);
        prop_assert_eq!(round_up_to_cent(&amount), cents(value + 1));
    }
}

// Property: any unknown code poisons the whole list
proptest! {
    #[test]
    fn unknown_code_rejects_list(unknown in "[A-Za-z]{1,12}", codes in coverage_codes()) {
        prop_assume!(CoverageCode::ALL.iter().all(|c| c.code() != unknown.as_str()));
        let mut all: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        all.push(unknown);
        prop_assert!(parse_coverages(&all).is_err());
    }
}
