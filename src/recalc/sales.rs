//! Sales strategy (spec §4.6) — the hot path of the recalc pipeline.
//!
//! Implements the nine-step algorithm of spec §4.6 verbatim. Two
//! interpretive choices, not fully pinned down by the grammar skeleton,
//! are recorded here and in DESIGN.md:
//!
//! - "Outstanding kg of sales" (step 5's basis) is the substance's
//!   current `domestic + import` total when the triggering write was a
//!   fresh sales write (`SalesIntentFreshFlag`); otherwise it is
//!   re-derived from `LastSpecifiedValue` so a parameter-only change
//!   (e.g. a new `recharge` rate) recomputes against the user's last
//!   stated intent rather than a previous year's post-recycling net.
//! - EOL-stage recycled virgin uses the substance's own blended initial
//!   charge for the units retired this chain run (`last_retired`),
//!   per §4.6's "EOL recycling draws from the current year's retired
//!   equipment × initialCharge × recoveryRate × yieldRate".

use bigdecimal::{BigDecimal, Zero};

use crate::error::KigaliResult;
use crate::keeper::{clamp_non_negative, RecyclingStage, Scope, Stream};
use crate::quantity::UnitFamily;
use crate::recalc::Kit;

pub fn apply(scope: &Scope, kit: &mut Kit) -> KigaliResult<()> {
    let record = match kit.keeper.record(scope) {
        Some(r) => r.clone(),
        None => return Ok(()),
    };

    let params = &record.parameterization;
    let recharge_population = &record.prior_equipment * &params.recharge_population_rate;
    let recharge_volume = &recharge_population * &params.recharge_intensity;

    let (pct_domestic, pct_import) = record.distribution();
    let initial_charge_for_sales = params.initial_charge_for_sales(&pct_domestic, &pct_import);

    let recycled_kg = match params.recycling_stage {
        RecyclingStage::Recharge => &recharge_volume * &params.recovery_rate * &params.yield_rate,
        RecyclingStage::Eol => {
            &record.last_retired * &initial_charge_for_sales * &params.recovery_rate * &params.yield_rate
        }
    };
    let recycled_displaced_kg = &recycled_kg * &params.displacement_rate;

    let unit_based = matches!(
        kit.keeper.get_last_specified_value(scope, Stream::Domestic).map(|q| q.unit.family()),
        Some(UnitFamily::Units)
    ) || matches!(
        kit.keeper.get_last_specified_value(scope, Stream::Import).map(|q| q.unit.family()),
        Some(UnitFamily::Units)
    );

    let outstanding_kg = if kit.keeper.is_sales_intent_freshly_set(scope) {
        &record.domestic + &record.import
    } else {
        conserved_outstanding(scope, kit, &record)
    };

    let population_change = if initial_charge_for_sales.is_zero() {
        BigDecimal::from(0i64)
    } else {
        (&outstanding_kg - &recharge_volume) / &initial_charge_for_sales
    };

    let new_equipment_volume = &population_change * &initial_charge_for_sales;
    let total_demand = &recharge_volume + &new_equipment_volume;

    let implicit_recharge = if unit_based {
        record.implicit_recharge.clone()
    } else {
        BigDecimal::from(0i64)
    };

    let required_virgin = clamp_non_negative(&total_demand - &implicit_recharge - &recycled_displaced_kg);

    let domestic_value = &required_virgin * &pct_domestic;
    let import_value = &required_virgin * &pct_import;

    kit.keeper
        .set_both_sales_streams(scope, domestic_value, import_value, &pct_domestic, &pct_import, false)?;

    let record_mut = kit.keeper.ensure_substance(scope);
    if population_change < BigDecimal::from(0i64) {
        let shortfall = -population_change;
        record_mut.prior_equipment = clamp_non_negative(&record_mut.prior_equipment - &shortfall);
        record_mut.equipment = BigDecimal::from(0i64);
    } else {
        record_mut.equipment = population_change;
    }

    kit.keeper.reset_sales_intent_flag(scope);
    Ok(())
}

/// Re-derives "outstanding sales" from `LastSpecifiedValue` when the
/// triggering write was not itself a fresh sales write (see module
/// docs). Falls back to the current raw total when neither stream has
/// ever been user-specified.
fn conserved_outstanding(
    scope: &Scope,
    kit: &Kit,
    record: &crate::keeper::SubstanceRecord,
) -> BigDecimal {
    let domestic = kit
        .keeper
        .get_last_specified_value(scope, Stream::Domestic)
        .map(|q| q.value.clone());
    let import = kit
        .keeper
        .get_last_specified_value(scope, Stream::Import)
        .map(|q| q.value.clone());

    match (domestic, import) {
        (None, None) => &record.domestic + &record.import,
        (d, i) => d.unwrap_or_else(|| BigDecimal::from(0i64)) + i.unwrap_or_else(|| BigDecimal::from(0i64)),
    }
}
