//! Parametrized checks for the quantified invariants of spec §8, run
//! directly against the lower-level `keeper`/`recalc` pieces rather than
//! magic per-scenario numbers.

use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use kigali_sim::ast::TradeStream;
use kigali_sim::config::EngineConfig;
use kigali_sim::keeper::{clamp_non_negative, LastSpecifiedValues, Scope, Stream, StreamKeeper};
use kigali_sim::quantity::{Converter, Quantity, Unit};
use kigali_sim::recalc::{retire, sales, Kit};
use rstest::rstest;

/// Invariant: a clamped quantity is never negative (spec §4.6 "failure
/// semantics").
#[rstest]
#[case(-50)]
#[case(-1)]
#[case(0)]
#[case(1)]
#[case(1000)]
fn clamp_non_negative_never_returns_negative(#[case] raw: i64) {
    let clamped = clamp_non_negative(BigDecimal::from(raw));
    assert!(clamped >= BigDecimal::zero());
}

/// Invariant: a percentage-family quantity is never retained as a
/// `LastSpecifiedValue` (spec §3 invariant 4).
#[rstest]
#[case(Unit::Percent)]
#[case(Unit::PercentPerYear)]
fn percent_quantities_are_never_remembered(#[case] unit: Unit) {
    let mut values = LastSpecifiedValues::default();
    values.set(Stream::Domestic, &Quantity::new(BigDecimal::from(50i64), unit));
    assert!(!values.has(Stream::Domestic));
    assert!(values.get(Stream::Domestic).is_none());
}

/// Non-percentage quantities are remembered as given, with their
/// original unit intact.
#[test]
fn non_percent_quantities_are_remembered_with_their_unit() {
    let mut values = LastSpecifiedValues::default();
    values.set(Stream::Domestic, &Quantity::new(BigDecimal::from(1000i64), Unit::Units));
    assert!(values.has(Stream::Domestic));
    assert_eq!(values.get(Stream::Domestic).unwrap().unit, Unit::Units);
}

fn kit_apply_sales(
    domestic_kg: i64,
    domestic_charge: i64,
    import_kg: i64,
    import_charge: i64,
) -> (BigDecimal, BigDecimal) {
    let scope = Scope::new("Refrigeration", "HFC-134a");
    let mut keeper = StreamKeeper::new();
    keeper.mark_stream_as_enabled(&scope, TradeStream::Domestic);
    keeper.mark_stream_as_enabled(&scope, TradeStream::Import);
    {
        let record = keeper.ensure_substance(&scope);
        record
            .parameterization
            .initial_charge
            .insert(TradeStream::Domestic, BigDecimal::from(domestic_charge));
        record
            .parameterization
            .initial_charge
            .insert(TradeStream::Import, BigDecimal::from(import_charge));
    }
    keeper.set_stream(&scope, Stream::Domestic, BigDecimal::from(domestic_kg)).unwrap();
    keeper.set_stream(&scope, Stream::Import, BigDecimal::from(import_kg)).unwrap();

    let converter = Converter::new(&EngineConfig::default());
    let mut kit = Kit {
        keeper: &mut keeper,
        converter: &converter,
    };
    sales::apply(&scope, &mut kit).unwrap();

    (keeper.get_stream(&scope, Stream::Domestic), keeper.get_stream(&scope, Stream::Import))
}

/// Invariant: the Sales strategy never changes the domestic/import
/// split it was handed — `requiredVirgin` is distributed in the exact
/// proportion `distribution()` reports (spec §4.6 step 5, §8 "material
/// balance" / distribution-preservation invariant).
#[rstest]
#[case(60, 1, 40, 1)]
#[case(75, 1, 25, 1)]
#[case(100, 1, 0, 1)]
#[case(0, 1, 100, 1)]
#[case(60, 10, 40, 20)]
fn sales_preserves_the_domestic_import_distribution(
    #[case] domestic_kg: i64,
    #[case] domestic_charge: i64,
    #[case] import_kg: i64,
    #[case] import_charge: i64,
) {
    let expected_pct_domestic = domestic_kg as f64 / (domestic_kg + import_kg).max(1) as f64;
    let (new_domestic, new_import) = kit_apply_sales(domestic_kg, domestic_charge, import_kg, import_charge);

    let total = (&new_domestic + &new_import).to_f64().unwrap();
    if total > 1e-9 {
        let actual_pct_domestic = new_domestic.to_f64().unwrap() / total;
        assert!(
            (actual_pct_domestic - expected_pct_domestic).abs() < 1e-6,
            "expected pctDomestic {expected_pct_domestic}, got {actual_pct_domestic}"
        );
    }
}

/// Invariant: with no recharge, no recycling, and a fresh sales write,
/// the Sales strategy reproduces exactly the kg total it was handed
/// (spec §4.6's "no-op when nothing else is in play" baseline).
#[rstest]
#[case(100, 0)]
#[case(0, 50)]
#[case(30, 70)]
fn sales_is_idempotent_absent_recharge_or_recycling(#[case] domestic_kg: i64, #[case] import_kg: i64) {
    let (new_domestic, new_import) = kit_apply_sales(domestic_kg, 1, import_kg, 1);
    assert_eq!(new_domestic, BigDecimal::from(domestic_kg));
    assert_eq!(new_import, BigDecimal::from(import_kg));
}

/// Invariant: Retire does not compound within a year. It sits in both
/// the parameter-change chain and the year-increment chain, and the
/// parameter-change chain can run more than once a year (once per
/// `retire`/`recharge`/`initialCharge` command); a second run must
/// reproduce the same `priorEquipment`, not retire it again (spec §4.6
/// equipment state machine, invariant #3/#6).
#[test]
fn retire_does_not_compound_within_a_year() {
    let scope = Scope::new("Refrigeration", "HFC-134a");
    let mut keeper = StreamKeeper::new();
    keeper
        .set_stream(&scope, Stream::PriorEquipment, BigDecimal::from(1000i64))
        .unwrap();
    {
        let record = keeper.ensure_substance(&scope);
        record.parameterization.retirement_rate = BigDecimal::from(1i64) / BigDecimal::from(10i64);
    }

    let converter = Converter::new(&EngineConfig::default());
    {
        let mut kit = Kit {
            keeper: &mut keeper,
            converter: &converter,
        };
        retire::apply(&scope, &mut kit).unwrap();
    }
    let after_first = keeper.get_stream(&scope, Stream::PriorEquipment);
    assert_eq!(after_first, BigDecimal::from(900i64));

    {
        let mut kit = Kit {
            keeper: &mut keeper,
            converter: &converter,
        };
        retire::apply(&scope, &mut kit).unwrap();
    }
    let after_second = keeper.get_stream(&scope, Stream::PriorEquipment);
    assert_eq!(
        after_second, after_first,
        "a second chain run within the same year must not retire again"
    );
}
