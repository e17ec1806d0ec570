//! Recognised units (spec §4.1) and the families `LastSpecifiedValue`
//! cares about (spec §3 invariant 4: percentages are never remembered).

use std::fmt;
use std::str::FromStr;

use crate::error::UnitError;

/// A recognised QubecTalk unit, including the `/year` rate forms (spec
/// §4.1: "A `/year` suffix is a rate; in an annual-step world it is
/// numerically identical to its stem").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Kg,
    Mt,
    G,
    TCo2e,
    KgCo2e,
    Kwh,
    Units,
    Percent,
    Year,
    KgPerUnit,
    TCo2ePerKg,
    TCo2ePerMt,
    KgCo2ePerKg,
    KgCo2ePerMt,
    KwhPerKg,
    KwhPerMt,
    KwhPerUnit,
    PercentPerYear,
    UnitsPerYear,
    KgPerYear,
    MtPerYear,
}

/// The broad family a unit belongs to, used to decide how
/// `LastSpecifiedValue` interprets a write (spec §3, §4.6 step 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitFamily {
    Kg,
    Units,
    Percent,
    Other,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::Mt => "mt",
            Unit::G => "g",
            Unit::TCo2e => "tCO2e",
            Unit::KgCo2e => "kgCO2e",
            Unit::Kwh => "kwh",
            Unit::Units => "units",
            Unit::Percent => "%",
            Unit::Year => "years",
            Unit::KgPerUnit => "kg/unit",
            Unit::TCo2ePerKg => "tCO2e/kg",
            Unit::TCo2ePerMt => "tCO2e/mt",
            Unit::KgCo2ePerKg => "kgCO2e/kg",
            Unit::KgCo2ePerMt => "kgCO2e/mt",
            Unit::KwhPerKg => "kwh/kg",
            Unit::KwhPerMt => "kwh/mt",
            Unit::KwhPerUnit => "kwh/unit",
            Unit::PercentPerYear => "%/year",
            Unit::UnitsPerYear => "units/year",
            Unit::KgPerYear => "kg/year",
            Unit::MtPerYear => "mt/year",
        }
    }

    /// Whether this is a `/year` rate form (spec §4.1).
    pub fn is_rate(self) -> bool {
        matches!(
            self,
            Unit::PercentPerYear | Unit::UnitsPerYear | Unit::KgPerYear | Unit::MtPerYear
        )
    }

    /// The non-rate stem of a `/year` unit; identity for non-rate units.
    /// A `/year` suffix is numerically identical to its stem in an
    /// annual-step world (spec §4.1).
    pub fn stem(self) -> Unit {
        match self {
            Unit::PercentPerYear => Unit::Percent,
            Unit::UnitsPerYear => Unit::Units,
            Unit::KgPerYear => Unit::Kg,
            Unit::MtPerYear => Unit::Mt,
            other => other,
        }
    }

    pub fn family(self) -> UnitFamily {
        match self.stem() {
            Unit::Kg | Unit::Mt | Unit::G => UnitFamily::Kg,
            Unit::Units => UnitFamily::Units,
            Unit::Percent => UnitFamily::Percent,
            _ => UnitFamily::Other,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "kg" => Unit::Kg,
            "mt" => Unit::Mt,
            "g" => Unit::G,
            "tCO2e" => Unit::TCo2e,
            "kgCO2e" => Unit::KgCo2e,
            "kwh" => Unit::Kwh,
            "unit" | "units" => Unit::Units,
            "%" | "percent" => Unit::Percent,
            "year" | "years" => Unit::Year,
            "kg/unit" => Unit::KgPerUnit,
            "tCO2e/kg" => Unit::TCo2ePerKg,
            "tCO2e/mt" => Unit::TCo2ePerMt,
            "kgCO2e/kg" => Unit::KgCo2ePerKg,
            "kgCO2e/mt" => Unit::KgCo2ePerMt,
            "kwh/kg" => Unit::KwhPerKg,
            "kwh/mt" => Unit::KwhPerMt,
            "kwh/unit" => Unit::KwhPerUnit,
            "%/year" => Unit::PercentPerYear,
            "units/year" => Unit::UnitsPerYear,
            "kg/year" => Unit::KgPerYear,
            "mt/year" => Unit::MtPerYear,
            other => return Err(UnitError::UnknownUnit(other.to_string())),
        })
    }
}
