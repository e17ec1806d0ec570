//! Retire strategy (spec §4.6): `retired = priorEquipment × retirementRate`.
//!
//! Retire runs in both the parameter-change chain and the year-increment
//! chain, so it can execute more than once within a single year. It
//! recomputes from `prior_equipment_year_start`, a baseline frozen at
//! PRE-YEAR, rather than subtracting from the live `prior_equipment` in
//! place, so repeated runs converge on one retirement instead of
//! compounding it.

use crate::error::KigaliResult;
use crate::keeper::Scope;
use crate::recalc::Kit;

pub fn apply(scope: &Scope, kit: &mut Kit) -> KigaliResult<()> {
    let record = kit.keeper.ensure_substance(scope);
    let retired = &record.prior_equipment_year_start * &record.parameterization.retirement_rate;
    record.prior_equipment = &record.prior_equipment_year_start - &retired;
    record.last_retired = retired;
    Ok(())
}
