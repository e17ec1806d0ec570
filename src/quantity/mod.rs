//! Quantity & Unit Converter (spec §4.1).
//!
//! A quantity is `(decimal value, unit tag, optional original literal)`.
//! Arithmetic runs in a fixed high-precision decimal context (at least
//! 34 significant digits, plain half-up rounding — never banker's
//! rounding). The original literal text is retained only so a consumer
//! that echoes generated code (the UI round-trip, out of scope here) has
//! something to print; the engine itself never reads it back.

pub mod state_getter;
pub mod unit;

use std::str::FromStr;

use bigdecimal::{BigDecimal, FromPrimitive, RoundingMode};

use crate::config::EngineConfig;
use crate::error::{KigaliResult, UnitError};
pub use state_getter::{OverridingStateGetter, StateGetter};
pub use unit::{Unit, UnitFamily};

/// A decimal value tagged with its unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value: BigDecimal,
    pub unit: Unit,
    pub original_literal: Option<String>,
}

impl Quantity {
    pub fn new(value: BigDecimal, unit: Unit) -> Self {
        Self {
            value,
            unit,
            original_literal: None,
        }
    }

    pub fn with_literal(value: BigDecimal, unit: Unit, literal: impl Into<String>) -> Self {
        Self {
            value,
            unit,
            original_literal: Some(literal.into()),
        }
    }

    pub fn zero(unit: Unit) -> Self {
        Self::new(BigDecimal::from_i32(0).unwrap(), unit)
    }

    pub fn is_zero(&self) -> bool {
        use bigdecimal::Zero;
        self.value.is_zero()
    }
}

/// Rounds `value` to `precision` significant digits using plain
/// half-up rounding (spec §4.1: "banker's-rounding disallowed").
pub fn round_to_precision(value: &BigDecimal, precision: u64) -> BigDecimal {
    let digits = value.digits();
    if digits <= precision {
        return value.clone();
    }
    let drop = digits - precision;
    let new_scale = value.fractional_digit_count() - drop as i64;
    value.with_scale_round(new_scale, RoundingMode::HalfUp)
}

fn kg_stem_factor(unit: Unit) -> Option<BigDecimal> {
    match unit.stem() {
        Unit::Kg => Some(BigDecimal::from_i32(1).unwrap()),
        Unit::Mt => Some(BigDecimal::from_i32(1000).unwrap()),
        Unit::G => Some(BigDecimal::from_str("0.001").unwrap()),
        _ => None,
    }
}

/// Converts quantities using a state-dependent getter for the
/// population/volume/intensity context a conversion may need.
pub struct Converter {
    precision: u64,
}

impl Converter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            precision: config.decimal_precision,
        }
    }

    fn round(&self, value: BigDecimal) -> BigDecimal {
        round_to_precision(&value, self.precision)
    }

    /// Converts `qty` into `target`, consulting `state` for any
    /// state-dependent rate (spec §4.1's non-exhaustive conversion
    /// rules). `scope` is carried only for error messages.
    pub fn convert(
        &self,
        qty: &Quantity,
        target: Unit,
        state: &dyn StateGetter,
        scope: &str,
    ) -> KigaliResult<Quantity> {
        if qty.unit == target || qty.unit.stem() == target.stem() {
            return Ok(Quantity::new(qty.value.clone(), target));
        }

        // mass family <-> mass family (kg / mt / g), regardless of /year suffix
        if let (Some(from_factor), Some(to_factor)) =
            (kg_stem_factor(qty.unit), kg_stem_factor(target))
        {
            let kg = &qty.value * &from_factor;
            let converted = self.round(kg / to_factor);
            return Ok(Quantity::new(converted, target));
        }

        // units -> mass family, via the amortized unit volume (kg/unit)
        if qty.unit.stem() == Unit::Units && kg_stem_factor(target).is_some() {
            let per_kg = state.amortized_unit_volume();
            let kg = self.round(&qty.value * &per_kg);
            let factor = kg_stem_factor(target).unwrap();
            return Ok(Quantity::new(self.round(kg / factor), target));
        }

        // mass family -> units, via the amortized unit volume (kg/unit)
        if kg_stem_factor(qty.unit).is_some() && target.stem() == Unit::Units {
            let factor = kg_stem_factor(qty.unit).unwrap();
            let kg = self.round(&qty.value * &factor);
            let per_kg = state.amortized_unit_volume();
            use bigdecimal::Zero;
            if per_kg.is_zero() {
                return Err(UnitError::Conversion {
                    from: qty.unit.to_string(),
                    to: target.to_string(),
                    scope: scope.to_string(),
                    reason: "initial charge is zero; cannot convert kg to units".to_string(),
                }
                .into());
            }
            return Ok(Quantity::new(self.round(kg / per_kg), target));
        }

        // percentage -> mass family, as a share of the current volume base
        if qty.unit.stem() == Unit::Percent && kg_stem_factor(target).is_some() {
            let hundred = BigDecimal::from_i32(100).unwrap();
            let fraction = &qty.value / hundred;
            let base = state.volume();
            return Ok(Quantity::new(self.round(fraction * base), target));
        }

        // mass family -> emissions (GHG intensity is kept normalised to tCO2e/kg)
        if kg_stem_factor(qty.unit).is_some() && matches!(target.stem(), Unit::TCo2e | Unit::KgCo2e) {
            let factor = kg_stem_factor(qty.unit).unwrap();
            let kg = self.round(&qty.value * &factor);
            let t_co2e = self.round(kg * state.ghg_intensity());
            return Ok(match target.stem() {
                Unit::TCo2e => Quantity::new(t_co2e, target),
                Unit::KgCo2e => Quantity::new(self.round(t_co2e * BigDecimal::from_i32(1000).unwrap()), target),
                _ => unreachable!(),
            });
        }

        // tCO2e <-> kgCO2e
        if matches!(qty.unit.stem(), Unit::TCo2e | Unit::KgCo2e)
            && matches!(target.stem(), Unit::TCo2e | Unit::KgCo2e)
        {
            let thousand = BigDecimal::from_i32(1000).unwrap();
            let value = match (qty.unit.stem(), target.stem()) {
                (Unit::TCo2e, Unit::KgCo2e) => self.round(&qty.value * &thousand),
                (Unit::KgCo2e, Unit::TCo2e) => self.round(&qty.value / &thousand),
                _ => qty.value.clone(),
            };
            return Ok(Quantity::new(value, target));
        }

        // units -> energy (energy intensity is kept normalised to kwh/unit)
        if qty.unit.stem() == Unit::Units && target.stem() == Unit::Kwh {
            let kwh = self.round(&qty.value * state.energy_intensity());
            return Ok(Quantity::new(kwh, target));
        }

        // mass family -> energy: bridge through units via amortized unit volume
        if kg_stem_factor(qty.unit).is_some() && target.stem() == Unit::Kwh {
            let as_units = self.convert(
                qty,
                Unit::Units,
                state,
                scope,
            )?;
            return self.convert(&as_units, target, state, scope);
        }

        Err(UnitError::Conversion {
            from: qty.unit.to_string(),
            to: target.to_string(),
            scope: scope.to_string(),
            reason: "no conversion rule between these units".to_string(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::FromPrimitive;

    struct Fixed {
        population: BigDecimal,
        amortized_unit_volume: BigDecimal,
        volume: BigDecimal,
        ghg_intensity: BigDecimal,
        energy_intensity: BigDecimal,
    }

    impl StateGetter for Fixed {
        fn population(&self) -> BigDecimal {
            self.population.clone()
        }
        fn amortized_unit_volume(&self) -> BigDecimal {
            self.amortized_unit_volume.clone()
        }
        fn volume(&self) -> BigDecimal {
            self.volume.clone()
        }
        fn ghg_intensity(&self) -> BigDecimal {
            self.ghg_intensity.clone()
        }
        fn energy_intensity(&self) -> BigDecimal {
            self.energy_intensity.clone()
        }
        fn years_elapsed(&self) -> BigDecimal {
            BigDecimal::from_i32(0).unwrap()
        }
    }

    fn state() -> Fixed {
        Fixed {
            population: BigDecimal::from_i32(100).unwrap(),
            amortized_unit_volume: BigDecimal::from_i32(2).unwrap(),
            volume: BigDecimal::from_i32(1000).unwrap(),
            ghg_intensity: BigDecimal::from_f64(1.5).unwrap(),
            energy_intensity: BigDecimal::from_i32(10).unwrap(),
        }
    }

    #[test]
    fn mt_to_kg() {
        let conv = Converter::new(&EngineConfig::default());
        let q = Quantity::new(BigDecimal::from_i32(2).unwrap(), Unit::Mt);
        let out = conv.convert(&q, Unit::Kg, &state(), "test").unwrap();
        assert_eq!(out.value, BigDecimal::from_i32(2000).unwrap());
    }

    #[test]
    fn units_to_kg_uses_amortized_unit_volume() {
        let conv = Converter::new(&EngineConfig::default());
        let q = Quantity::new(BigDecimal::from_i32(10).unwrap(), Unit::Units);
        let out = conv.convert(&q, Unit::Kg, &state(), "test").unwrap();
        assert_eq!(out.value, BigDecimal::from_i32(20).unwrap());
    }

    #[test]
    fn kg_to_units_zero_charge_fails() {
        let conv = Converter::new(&EngineConfig::default());
        let mut s = state();
        s.amortized_unit_volume = BigDecimal::from_i32(0).unwrap();
        let q = Quantity::new(BigDecimal::from_i32(10).unwrap(), Unit::Kg);
        let err = conv.convert(&q, Unit::Units, &s, "test");
        assert!(err.is_err());
    }

    #[test]
    fn kg_to_tco2e() {
        let conv = Converter::new(&EngineConfig::default());
        let q = Quantity::new(BigDecimal::from_i32(100).unwrap(), Unit::Kg);
        let out = conv.convert(&q, Unit::TCo2e, &state(), "test").unwrap();
        assert_eq!(out.value, BigDecimal::from_f64(150.0).unwrap());
    }
}
