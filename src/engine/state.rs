//! A [`StateGetter`] backed by a scope's current keeper record (spec
//! §4.1, §4.5).

use bigdecimal::BigDecimal;

use crate::keeper::{Scope, StreamKeeper};
use crate::quantity::StateGetter;

pub struct KeeperStateGetter<'a> {
    keeper: &'a StreamKeeper,
    scope: Scope,
    years_elapsed: BigDecimal,
}

impl<'a> KeeperStateGetter<'a> {
    pub fn new(keeper: &'a StreamKeeper, scope: Scope, years_elapsed: BigDecimal) -> Self {
        Self {
            keeper,
            scope,
            years_elapsed,
        }
    }
}

impl<'a> StateGetter for KeeperStateGetter<'a> {
    fn population(&self) -> BigDecimal {
        self.keeper
            .record(&self.scope)
            .map(|r| &r.equipment + &r.prior_equipment)
            .unwrap_or_else(|| BigDecimal::from(0i64))
    }

    fn amortized_unit_volume(&self) -> BigDecimal {
        self.keeper
            .record(&self.scope)
            .map(|r| {
                let (pct_domestic, pct_import) = r.distribution();
                r.parameterization.initial_charge_for_sales(&pct_domestic, &pct_import)
            })
            .unwrap_or_else(|| BigDecimal::from(0i64))
    }

    fn volume(&self) -> BigDecimal {
        self.keeper
            .record(&self.scope)
            .map(|r| r.sales())
            .unwrap_or_else(|| BigDecimal::from(0i64))
    }

    fn ghg_intensity(&self) -> BigDecimal {
        self.keeper
            .record(&self.scope)
            .map(|r| r.parameterization.ghg_intensity.clone())
            .unwrap_or_else(|| BigDecimal::from(0i64))
    }

    fn energy_intensity(&self) -> BigDecimal {
        self.keeper
            .record(&self.scope)
            .map(|r| r.parameterization.energy_intensity.clone())
            .unwrap_or_else(|| BigDecimal::from(0i64))
    }

    fn years_elapsed(&self) -> BigDecimal {
        self.years_elapsed.clone()
    }
}
