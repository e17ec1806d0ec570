//! The per-scope substance record (spec §3).

use std::collections::{HashMap, HashSet};

use bigdecimal::{BigDecimal, FromPrimitive};

use crate::ast::TradeStream;
use crate::quantity::{Quantity, Unit};

/// The stage at which recycled material is recovered (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecyclingStage {
    Recharge,
    Eol,
}

/// Every addressable quantity of a substance (spec §3 "Streams").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Domestic,
    Import,
    Export,
    RecycleRecharge,
    RecycleEol,
    Equipment,
    PriorEquipment,
    Consumption,
    ConsumptionNoRecycle,
    Energy,
    /// Bookkeeping slot only; never user-readable as a named stream.
    ImplicitRecharge,
}

impl Stream {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "domestic" => Some(Stream::Domestic),
            "import" => Some(Stream::Import),
            "export" => Some(Stream::Export),
            "recycleRecharge" => Some(Stream::RecycleRecharge),
            "recycleEol" => Some(Stream::RecycleEol),
            "equipment" => Some(Stream::Equipment),
            "priorEquipment" => Some(Stream::PriorEquipment),
            "consumption" => Some(Stream::Consumption),
            "consumptionNoRecycle" => Some(Stream::ConsumptionNoRecycle),
            "energy" => Some(Stream::Energy),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Stream::Domestic => "domestic",
            Stream::Import => "import",
            Stream::Export => "export",
            Stream::RecycleRecharge => "recycleRecharge",
            Stream::RecycleEol => "recycleEol",
            Stream::Equipment => "equipment",
            Stream::PriorEquipment => "priorEquipment",
            Stream::Consumption => "consumption",
            Stream::ConsumptionNoRecycle => "consumptionNoRecycle",
            Stream::Energy => "energy",
            Stream::ImplicitRecharge => "implicitRecharge",
        }
    }

    pub fn canonical_unit(self) -> Unit {
        match self {
            Stream::Domestic
            | Stream::Import
            | Stream::Export
            | Stream::RecycleRecharge
            | Stream::RecycleEol
            | Stream::ImplicitRecharge => Unit::Kg,
            Stream::Equipment | Stream::PriorEquipment => Unit::Units,
            Stream::Consumption | Stream::ConsumptionNoRecycle => Unit::TCo2e,
            Stream::Energy => Unit::Kwh,
        }
    }
}

fn zero() -> BigDecimal {
    BigDecimal::from_i32(0).unwrap()
}

fn one() -> BigDecimal {
    BigDecimal::from_i32(1).unwrap()
}

/// Per-substance parameterization (spec §3).
#[derive(Debug, Clone)]
pub struct Parameterization {
    /// Normalised to tCO2e/kg.
    pub ghg_intensity: BigDecimal,
    /// Normalised to kwh/unit.
    pub energy_intensity: BigDecimal,
    pub initial_charge: HashMap<TradeStream, BigDecimal>,
    /// Fraction per year (e.g. 0.10 for 10%/year).
    pub retirement_rate: BigDecimal,
    pub recharge_population_rate: BigDecimal,
    pub recharge_intensity: BigDecimal,
    pub recovery_rate: BigDecimal,
    pub yield_rate: BigDecimal,
    pub displacement_rate: BigDecimal,
    pub recycling_stage: RecyclingStage,
    /// Attribute initial charge to the importer instead of the exporter
    /// (spec §3 invariant 5); reporting-only, never affects state.
    pub attribute_charge_to_importer: bool,
}

impl Default for Parameterization {
    fn default() -> Self {
        Self {
            ghg_intensity: zero(),
            energy_intensity: zero(),
            initial_charge: HashMap::new(),
            retirement_rate: zero(),
            recharge_population_rate: zero(),
            recharge_intensity: zero(),
            recovery_rate: zero(),
            yield_rate: zero(),
            displacement_rate: one(),
            recycling_stage: RecyclingStage::Recharge,
            attribute_charge_to_importer: false,
        }
    }
}

impl Parameterization {
    pub fn initial_charge_for(&self, stream: TradeStream) -> BigDecimal {
        self.initial_charge.get(&stream).cloned().unwrap_or_else(zero)
    }

    /// A blended initial charge for new-equipment sales volume, weighted
    /// by the current domestic/import distribution (used by the Sales
    /// strategy, spec §4.6 step 5).
    pub fn initial_charge_for_sales(&self, pct_domestic: &BigDecimal, pct_import: &BigDecimal) -> BigDecimal {
        let domestic_charge = self.initial_charge_for(TradeStream::Domestic);
        let import_charge = self.initial_charge_for(TradeStream::Import);
        pct_domestic * domestic_charge + pct_import * import_charge
    }
}

/// The most recent user-written quantity for a writable stream, with its
/// original unit family retained — percentages are never recorded here
/// (spec §3 invariant 4).
#[derive(Debug, Clone, Default)]
pub struct LastSpecifiedValues {
    values: HashMap<Stream, Quantity>,
}

impl LastSpecifiedValues {
    pub fn set(&mut self, stream: Stream, quantity: &Quantity) {
        if quantity.unit.family() == crate::quantity::UnitFamily::Percent {
            return;
        }
        self.values.insert(stream, quantity.clone());
    }

    pub fn get(&self, stream: Stream) -> Option<&Quantity> {
        self.values.get(&stream)
    }

    pub fn has(&self, stream: Stream) -> bool {
        self.values.contains_key(&stream)
    }
}

/// Owned by the keeper, keyed by [`crate::keeper::Scope`] (spec §3).
#[derive(Debug, Clone)]
pub struct SubstanceRecord {
    pub domestic: BigDecimal,
    pub import: BigDecimal,
    pub export: BigDecimal,
    pub recycle_recharge: BigDecimal,
    pub recycle_eol: BigDecimal,
    pub equipment: BigDecimal,
    pub prior_equipment: BigDecimal,
    /// `priorEquipment` as of the most recent PRE-YEAR (or direct seed),
    /// frozen until the next rollover. Retire computes against this
    /// baseline rather than the live `prior_equipment` so that running
    /// the parameter-change chain more than once in a year (one run per
    /// `retire`/`recharge`/`initialCharge` command) still retires the
    /// population exactly once (spec §4.6 equipment state machine).
    pub prior_equipment_year_start: BigDecimal,
    pub consumption: BigDecimal,
    pub consumption_no_recycle: BigDecimal,
    pub energy: BigDecimal,
    pub implicit_recharge: BigDecimal,
    /// Units retired by the most recent Retire strategy run; transient
    /// hand-off to the Recycle strategy within the same chain (spec
    /// §4.6 "retired units feed EOL recycling"), not a reported stream.
    pub last_retired: BigDecimal,

    pub parameterization: Parameterization,
    pub enabled: HashSet<TradeStream>,
    pub last_specified: LastSpecifiedValues,
    /// Set whenever any sales-family stream is user-written; cleared
    /// once a dependent recalculation consumes it (spec §3).
    pub sales_intent_fresh: bool,
}

impl Default for SubstanceRecord {
    fn default() -> Self {
        Self {
            domestic: zero(),
            import: zero(),
            export: zero(),
            recycle_recharge: zero(),
            recycle_eol: zero(),
            equipment: zero(),
            prior_equipment: zero(),
            prior_equipment_year_start: zero(),
            consumption: zero(),
            consumption_no_recycle: zero(),
            energy: zero(),
            implicit_recharge: zero(),
            last_retired: zero(),
            parameterization: Parameterization::default(),
            enabled: HashSet::new(),
            last_specified: LastSpecifiedValues::default(),
            sales_intent_fresh: false,
        }
    }
}

impl SubstanceRecord {
    /// `sales` is a derived view: `domestic + import + recycle` (spec §3).
    pub fn sales(&self) -> BigDecimal {
        &self.domestic + &self.import + self.recycle()
    }

    pub fn recycle(&self) -> BigDecimal {
        &self.recycle_recharge + &self.recycle_eol
    }

    pub fn get(&self, stream: Stream) -> BigDecimal {
        match stream {
            Stream::Domestic => self.domestic.clone(),
            Stream::Import => self.import.clone(),
            Stream::Export => self.export.clone(),
            Stream::RecycleRecharge => self.recycle_recharge.clone(),
            Stream::RecycleEol => self.recycle_eol.clone(),
            Stream::Equipment => self.equipment.clone(),
            Stream::PriorEquipment => self.prior_equipment.clone(),
            Stream::Consumption => self.consumption.clone(),
            Stream::ConsumptionNoRecycle => self.consumption_no_recycle.clone(),
            Stream::Energy => self.energy.clone(),
            Stream::ImplicitRecharge => self.implicit_recharge.clone(),
        }
    }

    /// Current distribution `(pctDomestic, pctImport)` of non-recycled
    /// sales, falling back to the enablement set when both are zero
    /// (spec §4.5 `getDistribution`).
    pub fn distribution(&self) -> (BigDecimal, BigDecimal) {
        use bigdecimal::Zero;
        let virgin_total = &self.domestic + &self.import;
        if !virgin_total.is_zero() {
            return (&self.domestic / &virgin_total, &self.import / &virgin_total);
        }
        let domestic_on = self.enabled.contains(&TradeStream::Domestic);
        let import_on = self.enabled.contains(&TradeStream::Import);
        match (domestic_on, import_on) {
            (true, false) => (one(), zero()),
            (false, true) => (zero(), one()),
            _ => (
                BigDecimal::from_f64(0.5).unwrap(),
                BigDecimal::from_f64(0.5).unwrap(),
            ),
        }
    }
}
