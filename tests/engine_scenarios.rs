//! End-to-end scenarios against the `Engine`'s public operation surface,
//! independent of the QubecTalk parser (spec §8's S5/S6 scenarios and a
//! few of the named invariants).

use bigdecimal::BigDecimal;
use kigali_sim::prelude::*;

fn engine() -> Engine {
    Engine::new(&EngineConfig::default(), 2025, 2035)
}

fn kg(v: i64) -> Quantity {
    Quantity::new(BigDecimal::from(v), Unit::Kg)
}

fn kg_per_unit(v: i64) -> Quantity {
    Quantity::new(BigDecimal::from(v), Unit::KgPerUnit)
}

fn units(v: i64) -> Quantity {
    Quantity::new(BigDecimal::from(v), Unit::Units)
}

/// A substance with a single enabled domestic stream and a fixed initial
/// charge, seeded to `domestic_kg` kg of domestic sales.
fn seed_domestic(engine: &mut Engine, application: &str, substance: &str, charge_kg_per_unit: i64, domestic_kg: i64) {
    engine.set_application(application);
    engine.set_substance(substance, true).unwrap();
    engine.enable(TradeStream::Domestic).unwrap();
    engine.set_initial_charge(TradeStream::Domestic, kg_per_unit(charge_kg_per_unit)).unwrap();
    if domestic_kg != 0 {
        engine.set_stream("domestic", kg(domestic_kg)).unwrap();
    }
}

/// `replace N units of domestic with "Dest"` (spec §8 S6): the source
/// substance's domestic sales drop by `N * sourceCharge` kg and the
/// destination substance's domestic sales rise by `N * destCharge` kg,
/// preserving the units count moved.
#[test]
fn replace_moves_equipment_between_substances() {
    let mut engine = engine();
    seed_domestic(&mut engine, "Refrigeration", "HFC-134a", 10, 50);
    seed_domestic(&mut engine, "Refrigeration", "R-404A", 20, 0);

    engine.set_application("Refrigeration");
    engine.set_substance("HFC-134a", true).unwrap();
    engine.replace(units(2), "domestic", "R-404A").unwrap();

    let source = engine.read_stream(Some("HFC-134a"), "domestic", None).unwrap();
    assert_eq!(source.value, BigDecimal::from(30i64));

    let dest = engine.read_stream(Some("R-404A"), "domestic", None).unwrap();
    assert_eq!(dest.value, BigDecimal::from(40i64));
}

/// Replacing a substance with itself is rejected outright (spec §4.6).
#[test]
fn replace_with_self_is_rejected() {
    let mut engine = engine();
    seed_domestic(&mut engine, "Refrigeration", "HFC-134a", 10, 50);
    engine.set_application("Refrigeration");
    engine.set_substance("HFC-134a", true).unwrap();
    assert!(engine.replace(units(1), "domestic", "HFC-134a").is_err());
}

/// `cap domestic to X displacing "Dest"` (spec §8 S5): the capped
/// substance's domestic sales are clamped, and the clamped-off delta
/// (converted through each substance's own initial charge) lands on the
/// destination substance's domestic stream.
#[test]
fn cap_with_substance_displacement() {
    let mut engine = engine();
    seed_domestic(&mut engine, "Refrigeration", "HFC-134a", 10, 100);
    seed_domestic(&mut engine, "Refrigeration", "R-404A", 20, 0);

    engine.set_application("Refrigeration");
    engine.set_substance("HFC-134a", true).unwrap();
    engine.cap("domestic", kg(60), Some(DisplaceTarget::Substance("R-404A".to_string()))).unwrap();

    let source = engine.read_stream(Some("HFC-134a"), "domestic", None).unwrap();
    assert_eq!(source.value, BigDecimal::from(60i64));

    let dest = engine.read_stream(Some("R-404A"), "domestic", None).unwrap();
    assert_eq!(dest.value, BigDecimal::from(80i64));
}

/// A cap above the current value is a no-op (spec §4.6 "cap only ever
/// lowers").
#[test]
fn cap_above_current_value_is_a_no_op() {
    let mut engine = engine();
    seed_domestic(&mut engine, "Refrigeration", "HFC-134a", 10, 60);
    engine.set_application("Refrigeration");
    engine.set_substance("HFC-134a", true).unwrap();
    engine.cap("domestic", kg(100), None).unwrap();

    let value = engine.read_stream(Some("HFC-134a"), "domestic", None).unwrap();
    assert_eq!(value.value, BigDecimal::from(60i64));
}

/// A unit-valued cap on a mass-family stream permits that many *new*
/// units on top of whatever recharge the existing population already
/// requires, rather than capping new-equipment-plus-recharge at the
/// units-equivalent (spec §4.6).
#[test]
fn unit_valued_cap_allocates_recharge_separately() {
    let mut engine = engine();
    seed_domestic(&mut engine, "Refrigeration", "HFC-134a", 10, 5000);
    engine.set_application("Refrigeration");
    engine.set_substance("HFC-134a", true).unwrap();
    engine.set_stream("priorEquipment", units(500)).unwrap();
    engine
        .recharge(Quantity::new(BigDecimal::from(20i64), Unit::Percent), kg_per_unit(5))
        .unwrap();

    // 100 new units at 10 kg/unit = 1000 kg, plus 500 units * 20% * 5
    // kg/unit = 500 kg of recharge, for a 1500 kg effective cap.
    engine.cap("sales", units(100), None).unwrap();

    let domestic = engine.read_stream(Some("HFC-134a"), "domestic", None).unwrap();
    assert_eq!(domestic.value, BigDecimal::from(1500i64));
}

/// Displacing a stream onto itself is rejected (spec §4.6).
#[test]
fn cap_displacing_same_stream_is_rejected() {
    let mut engine = engine();
    seed_domestic(&mut engine, "Refrigeration", "HFC-134a", 10, 60);
    engine.set_application("Refrigeration");
    engine.set_substance("HFC-134a", true).unwrap();
    let result = engine.cap("domestic", kg(40), Some(DisplaceTarget::Stream("domestic".to_string())));
    assert!(result.is_err());
}

/// A non-zero write to a trade stream that was never `enable`d is
/// rejected (spec §3 invariant 2).
#[test]
fn nonzero_write_to_disabled_stream_is_rejected() {
    let mut engine = engine();
    engine.set_application("Refrigeration");
    engine.set_substance("HFC-134a", true).unwrap();
    let result = engine.set_stream("import", kg(10));
    assert!(result.is_err());
}

/// A zero write to a disabled stream is allowed (spec §3 invariant 2
/// only guards non-zero writes).
#[test]
fn zero_write_to_disabled_stream_is_allowed() {
    let mut engine = engine();
    engine.set_application("Refrigeration");
    engine.set_substance("HFC-134a", true).unwrap();
    assert!(engine.set_stream("import", kg(0)).is_ok());
}

/// `recover ... displacing ...` is rejected outright in this release
/// (see DESIGN.md's Open Question decision).
#[test]
fn recover_displacing_is_unsupported() {
    let mut engine = engine();
    seed_domestic(&mut engine, "Refrigeration", "HFC-134a", 10, 60);
    engine.set_application("Refrigeration");
    engine.set_substance("HFC-134a", true).unwrap();
    let result = engine.recover(
        Quantity::new(BigDecimal::from(50i64), Unit::Percent),
        Quantity::new(BigDecimal::from(100i64), Unit::Percent),
        RecyclingStage::Recharge,
        Some(DisplaceTarget::Stream("import".to_string())),
    );
    assert!(result.is_err());
}

/// A write attempted before `setApplication`/`setSubstance` raises a
/// scope error (spec §4.7).
#[test]
fn write_before_scope_selected_is_rejected() {
    let mut engine = engine();
    let result = engine.set_stream("domestic", kg(10));
    assert!(result.is_err());
}

/// `export` is never touched by the Sales/Recycle/Consumption/Energy
/// strategies, so a direct write to it survives the write chain
/// untouched (spec §4.6's strategy table names what each step reads and
/// writes).
#[test]
fn export_write_is_stable_across_the_write_chain() {
    let mut engine = engine();
    engine.set_application("Refrigeration");
    engine.set_substance("HFC-134a", true).unwrap();
    engine.enable(TradeStream::Export).unwrap();
    engine.set_stream("export", kg(75)).unwrap();
    engine.set_stream("export", kg(75)).unwrap();

    let value = engine.read_stream(None, "export", None).unwrap();
    assert_eq!(value.value, BigDecimal::from(75i64));
}
