//! Consumption and Energy strategies (spec §4.6): derived streams with
//! no feedback into any other stream, always run last in a chain.

use bigdecimal::BigDecimal;

use crate::error::KigaliResult;
use crate::keeper::Scope;
use crate::recalc::Kit;

/// `consumption = (domestic + import + recycle) × ghgIntensity`;
/// `consumptionNoRecycle = (domestic + import) × ghgIntensity`.
pub fn apply_consumption(scope: &Scope, kit: &mut Kit) -> KigaliResult<()> {
    let record = match kit.keeper.record(scope) {
        Some(r) => r.clone(),
        None => return Ok(()),
    };
    let ghg_intensity = &record.parameterization.ghg_intensity;
    let virgin = &record.domestic + &record.import;
    let total = &virgin + record.recycle();

    let record_mut = kit.keeper.ensure_substance(scope);
    record_mut.consumption = &total * ghg_intensity;
    record_mut.consumption_no_recycle = &virgin * ghg_intensity;
    Ok(())
}

/// `energy = (equipment + priorEquipment) × energyIntensity`.
pub fn apply_energy(scope: &Scope, kit: &mut Kit) -> KigaliResult<()> {
    let record = match kit.keeper.record(scope) {
        Some(r) => r.clone(),
        None => return Ok(()),
    };
    let population: BigDecimal = &record.equipment + &record.prior_equipment;
    let energy = &population * &record.parameterization.energy_intensity;

    kit.keeper.ensure_substance(scope).energy = energy;
    Ok(())
}
