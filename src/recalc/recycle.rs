//! Recycle strategy (spec §4.6): fills the `recycleRecharge`/`recycleEol`
//! bins for reporting. The virgin-displacement accounting those bins
//! imply is already folded into the Sales strategy's `requiredVirgin`
//! (it runs first in every canonical chain, spec §4.6's table) — this
//! strategy only needs to restate the same recovered-material math as a
//! reported stream, not apply it again.

use crate::error::KigaliResult;
use crate::keeper::{RecyclingStage, Scope};
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

    let (recycle_recharge, recycle_eol) = match params.recycling_stage {
        RecyclingStage::Recharge => (
            &recharge_volume * &params.recovery_rate * &params.yield_rate,
            bigdecimal::BigDecimal::from(0i64),
        ),
        RecyclingStage::Eol => (
            bigdecimal::BigDecimal::from(0i64),
            &record.last_retired * &initial_charge_for_sales * &params.recovery_rate * &params.yield_rate,
        ),
    };

    let record_mut = kit.keeper.ensure_substance(scope);
    record_mut.recycle_recharge = recycle_recharge;
    record_mut.recycle_eol = recycle_eol;
    Ok(())
}
