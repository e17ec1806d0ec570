//! Engine (spec §4.7): orchestrates scopes and enablement, converts
//! incoming quantities, and dispatches recalc chains. The public
//! operation surface the machine drives commands through.

pub mod state;
pub mod stream_update;

use bigdecimal::BigDecimal;
use tracing::instrument;

use crate::ast::{DisplaceTarget, TradeStream};
use crate::config::EngineConfig;
use crate::error::{EngineError, KigaliResult};
use crate::keeper::{clamp_non_negative, RecyclingStage, Scope, Stream, StreamKeeper};
use crate::quantity::{Converter, OverridingStateGetter, Quantity, StateGetter, Unit};
use crate::recalc::{self, Kit};
pub use state::KeeperStateGetter;
pub use stream_update::{StreamUpdate, StreamUpdateBuilder};

/// Position in the per-year equipment state machine (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearPhase {
    PreYear,
    InYear,
    PostYear,
}

pub struct Engine {
    keeper: StreamKeeper,
    converter: Converter,
    current_application: Option<String>,
    current_substance: Option<String>,
    start_year: i32,
    end_year: i32,
    current_year: i32,
    phase: YearPhase,
}

impl Engine {
    pub fn new(config: &EngineConfig, start_year: i32, end_year: i32) -> Self {
        Self {
            keeper: StreamKeeper::new(),
            converter: Converter::new(config),
            current_application: None,
            current_substance: None,
            start_year,
            end_year,
            current_year: start_year,
            phase: YearPhase::PreYear,
        }
    }

    pub fn keeper(&self) -> &StreamKeeper {
        &self.keeper
    }

    pub fn start_year(&self) -> i32 {
        self.start_year
    }

    pub fn end_year(&self) -> i32 {
        self.end_year
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    pub fn phase(&self) -> YearPhase {
        self.phase
    }

    pub fn set_application(&mut self, name: impl Into<String>) {
        self.current_application = Some(name.into());
    }

    pub fn set_substance(&mut self, name: impl Into<String>, strict: bool) -> KigaliResult<()> {
        let name = name.into();
        let scope = self.scope_for(&name)?;
        if strict {
            self.keeper.ensure_substance(&scope);
        }
        self.current_substance = Some(name);
        Ok(())
    }

    /// The scope named by the current application + substance cursor
    /// (spec §4.7: "write attempted before setApplication + setSubstance"
    /// raises `ScopeError`).
    pub fn scope(&self) -> KigaliResult<Scope> {
        match (&self.current_application, &self.current_substance) {
            (Some(app), Some(sub)) => Ok(Scope::new(app.clone(), sub.clone())),
            _ => Err(EngineError::Scope.into()),
        }
    }

    fn scope_for(&self, substance: &str) -> KigaliResult<Scope> {
        match &self.current_application {
            Some(app) => Ok(Scope::new(app.clone(), substance.to_string())),
            None => Err(EngineError::Scope.into()),
        }
    }

    fn state_getter(&self, scope: &Scope) -> KeeperStateGetter<'_> {
        let elapsed = BigDecimal::from((self.current_year - self.start_year) as i64);
        KeeperStateGetter::new(&self.keeper, scope.clone(), elapsed)
    }

    fn run_chain(&mut self, scope: &Scope, chain: recalc::RecalcChain) -> KigaliResult<()> {
        let mut kit = Kit {
            keeper: &mut self.keeper,
            converter: &self.converter,
        };
        chain.run(scope, &mut kit)
    }

    // ---- commands -----------------------------------------------------

    #[instrument(skip(self))]
    pub fn enable(&mut self, stream: TradeStream) -> KigaliResult<()> {
        let scope = self.scope()?;
        self.keeper.mark_stream_as_enabled(&scope, stream);
        Ok(())
    }

    pub fn set_initial_charge(&mut self, stream: TradeStream, value: Quantity) -> KigaliResult<()> {
        let scope = self.scope()?;
        if value.unit != Unit::KgPerUnit {
            return Err(EngineError::Domain(format!(
                "initial charge must be given in kg/unit, found {}",
                value.unit
            ))
            .into());
        }
        let record = self.keeper.ensure_substance(&scope);
        record.parameterization.initial_charge.insert(stream, value.value);
        self.run_chain(&scope, recalc::parameter_change_chain())?;
        Ok(())
    }

    /// Sets `ghgIntensity` or `energyIntensity` depending on the unit
    /// family of `value` (spec §4.3's single `equals` command serves
    /// both; see DESIGN.md for why the unit disambiguates the target).
    pub fn equals(&mut self, value: Quantity) -> KigaliResult<()> {
        let scope = self.scope()?;
        let thousand = BigDecimal::from(1000i64);
        match value.unit {
            Unit::TCo2e | Unit::TCo2ePerKg => {
                self.keeper.ensure_substance(&scope).parameterization.ghg_intensity = value.value;
            }
            Unit::TCo2ePerMt => {
                self.keeper.ensure_substance(&scope).parameterization.ghg_intensity = value.value / &thousand;
            }
            Unit::KgCo2e | Unit::KgCo2ePerKg => {
                self.keeper.ensure_substance(&scope).parameterization.ghg_intensity = value.value / &thousand;
            }
            Unit::KgCo2ePerMt => {
                self.keeper.ensure_substance(&scope).parameterization.ghg_intensity =
                    value.value / &thousand / &thousand;
            }
            Unit::Kwh | Unit::KwhPerUnit => {
                self.keeper.ensure_substance(&scope).parameterization.energy_intensity = value.value;
            }
            Unit::KwhPerKg => {
                let charge = self.state_getter(&scope).amortized_unit_volume();
                self.keeper.ensure_substance(&scope).parameterization.energy_intensity = value.value * charge;
            }
            Unit::KwhPerMt => {
                let charge = self.state_getter(&scope).amortized_unit_volume();
                self.keeper.ensure_substance(&scope).parameterization.energy_intensity =
                    value.value / &thousand * charge;
            }
            other => {
                return Err(EngineError::Domain(format!("'{other}' is not a recognised intensity unit")).into())
            }
        }
        self.run_chain(&scope, recalc::write_chain())?;
        Ok(())
    }

    /// `set STREAM to expr` (spec §4.6 table; `sales` is forbidden,
    /// `equipment` gets the delta-to-sales/retirement translation, every
    /// other named stream is a direct write through the write chain).
    pub fn set_stream(&mut self, name: &str, value: Quantity) -> KigaliResult<()> {
        if name == "sales" {
            return Err(EngineError::Domain("writes to the derived 'sales' stream are forbidden".to_string()).into());
        }
        if name == "equipment" {
            return self.set_equipment(value);
        }
        let stream = Stream::from_name(name).ok_or_else(|| EngineError::UnknownStream(name.to_string()))?;
        let update = StreamUpdateBuilder::new().stream(stream).value(value).build()?;
        self.apply_stream_update(update)
    }

    /// Applies a validated [`StreamUpdate`]: converts into the stream's
    /// canonical unit, records it as the last-specified value, marks
    /// sales intent fresh for trade streams, and runs the write chain
    /// (spec §4.6 table row 2; §9 "Builder patterns for write updates").
    fn apply_stream_update(&mut self, update: StreamUpdate) -> KigaliResult<()> {
        let scope = self.scope()?;
        let stream = update.stream;
        let kg_or_units = self.convert_for_stream(&scope, stream, &update.value)?;
        self.keeper.set_last_specified_value(&scope, stream, &update.value);
        if let Stream::Domestic | Stream::Import | Stream::Export = stream {
            self.keeper.mark_sales_intent_fresh(&scope);
            if update.value.unit.family() == crate::quantity::UnitFamily::Units {
                let record = self.keeper.ensure_substance(&scope);
                let recharge = &record.prior_equipment * &record.parameterization.recharge_population_rate
                    * &record.parameterization.recharge_intensity;
                record.implicit_recharge = recharge;
            }
        }
        self.keeper.set_stream(&scope, stream, kg_or_units)?;
        if matches!(stream, Stream::PriorEquipment) {
            return Ok(());
        }
        self.run_chain(&scope, recalc::write_chain())?;
        Ok(())
    }

    /// Converts `value` into `target_unit` using the current scope's
    /// state (spec §4.1). Exposed for the machine's cross-unit binary
    /// arithmetic (spec §4.3).
    pub fn convert(&self, value: &Quantity, target_unit: Unit) -> KigaliResult<Quantity> {
        let scope = self.scope()?;
        let state = self.state_getter(&scope);
        self.converter.convert(value, target_unit, &state, &scope.to_string())
    }

    /// `get STREAM [of "SUB"] [as UNITS]` (spec §4.3 stream-read value).
    pub fn read_stream(&self, substance: Option<&str>, name: &str, as_unit: Option<Unit>) -> KigaliResult<Quantity> {
        let scope = match substance {
            Some(sub) => self.scope_for(sub)?,
            None => self.scope()?,
        };
        let raw = if name == "sales" {
            self.keeper.record(&scope).map(|r| r.sales()).unwrap_or_else(|| BigDecimal::from(0i64))
        } else {
            let stream = Stream::from_name(name).ok_or_else(|| EngineError::UnknownStream(name.to_string()))?;
            self.keeper.get_stream(&scope, stream)
        };
        let canonical = if name == "sales" {
            Unit::Kg
        } else {
            Stream::from_name(name).map(Stream::canonical_unit).unwrap_or(Unit::Kg)
        };
        let quantity = Quantity::new(raw, canonical);
        match as_unit {
            Some(target) if target != canonical => {
                let state = self.state_getter(&scope);
                self.converter.convert(&quantity, target, &state, &scope.to_string())
            }
            _ => Ok(quantity),
        }
    }

    fn convert_for_stream(&self, scope: &Scope, stream: Stream, value: &Quantity) -> KigaliResult<BigDecimal> {
        let state = self.state_getter(scope);
        Ok(self
            .converter
            .convert(value, stream.canonical_unit(), &state, &scope.to_string())?
            .value)
    }

    /// `set equipment to expr`: a positive delta against the currently
    /// deployed `equipment` is folded into this year's sales demand; a
    /// negative delta forces additional retirement from `priorEquipment`
    /// (spec §4.6 table row 3).
    fn set_equipment(&mut self, value: Quantity) -> KigaliResult<()> {
        let scope = self.scope()?;
        let state = self.state_getter(&scope);
        let target_units = self.converter.convert(&value, Unit::Units, &state, &scope.to_string())?.value;
        let current = self.keeper.get_stream(&scope, Stream::Equipment);
        let delta = &target_units - &current;
        if delta >= BigDecimal::from(0i64) {
            let charge = state.amortized_unit_volume();
            let added_kg = &delta * &charge;
            let (pct_domestic, pct_import) = self.keeper.get_distribution(&scope);
            let add_domestic = &added_kg * &pct_domestic;
            let add_import = &added_kg * &pct_import;
            let cur_domestic = self.keeper.get_stream(&scope, Stream::Domestic);
            let cur_import = self.keeper.get_stream(&scope, Stream::Import);
            self.keeper.set_stream(&scope, Stream::Domestic, cur_domestic + add_domestic)?;
            self.keeper.set_stream(&scope, Stream::Import, cur_import + add_import)?;
            self.keeper.mark_sales_intent_fresh(&scope);
            self.run_chain(&scope, recalc::write_chain())?;
        } else {
            let shortfall = -delta;
            let record = self.keeper.ensure_substance(&scope);
            record.prior_equipment = clamp_non_negative(&record.prior_equipment - &shortfall);
            record.prior_equipment_year_start = record.prior_equipment.clone();
        }
        Ok(())
    }

    pub fn change_stream(&mut self, name: &str, delta: Quantity) -> KigaliResult<()> {
        let scope = self.scope()?;
        let stream = Stream::from_name(name).ok_or_else(|| EngineError::UnknownStream(name.to_string()))?;
        let delta_value = self.convert_for_stream(&scope, stream, &delta)?;
        let current = self.keeper.get_stream(&scope, stream);
        let combined = Quantity::new(current + delta_value, stream.canonical_unit());
        self.set_stream(name, combined)
    }

    pub fn retire(&mut self, rate: Quantity) -> KigaliResult<()> {
        let scope = self.scope()?;
        let fraction = to_fraction(&rate)?;
        self.keeper.ensure_substance(&scope).parameterization.retirement_rate = fraction;
        self.run_chain(&scope, recalc::parameter_change_chain())?;
        Ok(())
    }

    pub fn recharge(&mut self, population_rate: Quantity, intensity: Quantity) -> KigaliResult<()> {
        let scope = self.scope()?;
        let rate = to_fraction(&population_rate)?;
        if intensity.unit != Unit::KgPerUnit {
            return Err(EngineError::Domain(format!(
                "recharge intensity must be given in kg/unit, found {}",
                intensity.unit
            ))
            .into());
        }
        {
            let record = self.keeper.ensure_substance(&scope);
            record.parameterization.recharge_population_rate = rate;
            record.parameterization.recharge_intensity = intensity.value;
        }
        self.run_chain(&scope, recalc::parameter_change_chain())?;
        Ok(())
    }

    pub fn recover(
        &mut self,
        recovery_rate: Quantity,
        yield_rate: Quantity,
        stage: RecyclingStage,
        displacing: Option<DisplaceTarget>,
    ) -> KigaliResult<()> {
        if displacing.is_some() {
            return Err(EngineError::Unsupported(
                "'recover ... displacing ...' is not supported in this release".to_string(),
            )
            .into());
        }
        let scope = self.scope()?;
        let recovery = to_fraction(&recovery_rate)?;
        let yield_fraction = to_fraction(&yield_rate)?;
        {
            let record = self.keeper.ensure_substance(&scope);
            record.parameterization.recovery_rate = recovery;
            record.parameterization.yield_rate = yield_fraction;
            record.parameterization.recycling_stage = stage;
        }
        self.run_chain(&scope, recalc::write_chain())?;
        Ok(())
    }

    /// `cap`/`floor` (spec §4.6): clamps the target stream's currently
    /// computed value and optionally displaces the clamped delta onto a
    /// partner stream or substance.
    pub fn cap(&mut self, stream: &str, value: Quantity, displacing: Option<DisplaceTarget>) -> KigaliResult<()> {
        self.limit(stream, value, displacing, true)
    }

    pub fn floor(&mut self, stream: &str, value: Quantity, displacing: Option<DisplaceTarget>) -> KigaliResult<()> {
        self.limit(stream, value, displacing, false)
    }

    fn limit(
        &mut self,
        stream_name: &str,
        value: Quantity,
        displacing: Option<DisplaceTarget>,
        is_cap: bool,
    ) -> KigaliResult<()> {
        let scope = self.scope()?;
        let current = self.read_named_stream(&scope, stream_name)?;
        let canonical = stream_canonical_unit(stream_name);
        let limit_value = if value.unit.family() == crate::quantity::UnitFamily::Percent {
            &current * (&value.value / BigDecimal::from(100i64))
        } else if value.unit.family() == crate::quantity::UnitFamily::Units
            && canonical.family() == crate::quantity::UnitFamily::Kg
        {
            // A unit-valued limit on a mass-family stream permits that
            // many *new* units, plus whatever recharge the existing
            // population already requires (spec §4.6).
            let new_equipment_kg = self.convert_to_stream_unit(&scope, stream_name, &value)?;
            let recharge_kg = self.recharge_volume_kg(&scope)?;
            new_equipment_kg + recharge_kg
        } else {
            self.convert_to_stream_unit(&scope, stream_name, &value)?
        };
        let clamped = if is_cap {
            if current > limit_value {
                limit_value.clone()
            } else {
                current.clone()
            }
        } else if current < limit_value {
            limit_value.clone()
        } else {
            current.clone()
        };
        let delta = &current - &clamped;
        self.write_named_stream(&scope, stream_name, clamped)?;
        self.run_chain(&scope, recalc::write_chain())?;

        if let Some(target) = displacing {
            self.apply_displacement(&scope, stream_name, target, delta)?;
        }
        Ok(())
    }

    fn read_named_stream(&self, scope: &Scope, name: &str) -> KigaliResult<BigDecimal> {
        if name == "sales" {
            return Ok(self.keeper.record(scope).map(|r| r.sales()).unwrap_or_else(|| BigDecimal::from(0i64)));
        }
        let stream = Stream::from_name(name).ok_or_else(|| EngineError::UnknownStream(name.to_string()))?;
        Ok(self.keeper.get_stream(scope, stream))
    }

    fn convert_to_stream_unit(&self, scope: &Scope, name: &str, value: &Quantity) -> KigaliResult<BigDecimal> {
        let canonical = stream_canonical_unit(name);
        let state = self.state_getter(scope);
        Ok(self.converter.convert(value, canonical, &state, &scope.to_string())?.value)
    }

    /// The current recharge demand in kg: `priorEquipment × rechargePopulationRate`
    /// converted to kg through the overriding state getter, with
    /// `amortized_unit_volume` pinned to `rechargeIntensity` rather than
    /// the stream's blended initial charge.
    fn recharge_volume_kg(&self, scope: &Scope) -> KigaliResult<BigDecimal> {
        let record = self.keeper.record(scope).cloned().unwrap_or_default();
        let recharge_population = &record.prior_equipment * &record.parameterization.recharge_population_rate;
        let base = self.state_getter(scope);
        let overriding = OverridingStateGetter::new(&base);
        let _guard = overriding.push(None, None, Some(record.parameterization.recharge_intensity.clone()));
        let recharge_units = Quantity::new(recharge_population, Unit::Units);
        Ok(self
            .converter
            .convert(&recharge_units, Unit::Kg, &overriding, &scope.to_string())?
            .value)
    }

    fn write_named_stream(&mut self, scope: &Scope, name: &str, new_value: BigDecimal) -> KigaliResult<()> {
        if name == "sales" {
            let record = self.keeper.record(scope).cloned().unwrap_or_default();
            let (pct_domestic, pct_import) = record.distribution();
            self.keeper.set_both_sales_streams(
                scope,
                &new_value * &pct_domestic,
                &new_value * &pct_import,
                &pct_domestic,
                &pct_import,
                false,
            )?;
            self.keeper.mark_sales_intent_fresh(scope);
            return Ok(());
        }
        let stream = Stream::from_name(name).ok_or_else(|| EngineError::UnknownStream(name.to_string()))?;
        self.keeper.set_stream(scope, stream, new_value)?;
        self.keeper.mark_sales_intent_fresh(scope);
        Ok(())
    }

    fn apply_displacement(
        &mut self,
        source_scope: &Scope,
        source_stream: &str,
        target: DisplaceTarget,
        delta: BigDecimal,
    ) -> KigaliResult<()> {
        match target {
            DisplaceTarget::Stream(partner) => {
                if partner == source_stream {
                    return Err(EngineError::SelfDisplacement(partner, source_scope.to_string()).into());
                }
                let partner_stream =
                    Stream::from_name(&partner).ok_or_else(|| EngineError::UnknownStream(partner.clone()))?;
                let current = self.keeper.get_stream(source_scope, partner_stream);
                self.keeper.set_stream(source_scope, partner_stream, clamp_non_negative(current + delta))?;
                self.keeper.mark_sales_intent_fresh(source_scope);
                self.run_chain(source_scope, recalc::write_chain())?;
            }
            DisplaceTarget::Substance(name) => {
                if name == source_scope.substance {
                    return Err(EngineError::SelfDisplacement(name, source_scope.to_string()).into());
                }
                let partner_scope = Scope::new(source_scope.application.clone(), name);
                self.keeper.ensure_substance(&partner_scope);
                let source_charge = self.state_getter(source_scope).amortized_unit_volume();
                let partner_charge = self.state_getter(&partner_scope).amortized_unit_volume();
                let delta_kg = if bigdecimal::Zero::is_zero(&source_charge) {
                    BigDecimal::from(0i64)
                } else {
                    &delta / &source_charge * &partner_charge
                };
                let (pct_domestic, pct_import) = self.keeper.get_distribution(&partner_scope);
                let cur_domestic = self.keeper.get_stream(&partner_scope, Stream::Domestic);
                let cur_import = self.keeper.get_stream(&partner_scope, Stream::Import);
                let new_domestic = clamp_non_negative(cur_domestic + &delta_kg * &pct_domestic);
                let new_import = clamp_non_negative(cur_import + &delta_kg * &pct_import);
                self.keeper.set_stream(&partner_scope, Stream::Domestic, new_domestic)?;
                self.keeper.set_stream(&partner_scope, Stream::Import, new_import)?;
                self.keeper.mark_sales_intent_fresh(&partner_scope);
                self.run_chain(&partner_scope, recalc::write_chain())?;
            }
        }
        Ok(())
    }

    /// `replace X of STREAM with "DEST"` (spec §4.6).
    pub fn replace(&mut self, value: Quantity, stream_name: &str, dest_substance: &str) -> KigaliResult<()> {
        let scope = self.scope()?;
        if dest_substance == scope.substance {
            return Err(EngineError::SelfReplacement(dest_substance.to_string()).into());
        }
        let state = self.state_getter(&scope);
        let value_units = self.converter.convert(&value, Unit::Units, &state, &scope.to_string())?.value;
        let stream =
            Stream::from_name(stream_name).ok_or_else(|| EngineError::UnknownStream(stream_name.to_string()))?;
        let source_charge = state.amortized_unit_volume();
        let reduce_kg = &value_units * &source_charge;
        let current = self.keeper.get_stream(&scope, stream);
        self.keeper.set_stream(&scope, stream, clamp_non_negative(current - &reduce_kg))?;
        self.keeper.mark_sales_intent_fresh(&scope);
        self.run_chain(&scope, recalc::write_chain())?;

        let dest_scope = Scope::new(scope.application.clone(), dest_substance.to_string());
        self.keeper.ensure_substance(&dest_scope);
        let dest_charge = self.state_getter(&dest_scope).amortized_unit_volume();
        let add_kg = &value_units * &dest_charge;
        let (pct_domestic, pct_import) = self.keeper.get_distribution(&dest_scope);
        let cur_domestic = self.keeper.get_stream(&dest_scope, Stream::Domestic);
        let cur_import = self.keeper.get_stream(&dest_scope, Stream::Import);
        self.keeper.set_stream(&dest_scope, Stream::Domestic, cur_domestic + &add_kg * &pct_domestic)?;
        self.keeper.set_stream(&dest_scope, Stream::Import, cur_import + &add_kg * &pct_import)?;
        self.keeper.mark_sales_intent_fresh(&dest_scope);
        self.run_chain(&dest_scope, recalc::write_chain())?;
        Ok(())
    }

    /// Executes the post-year rollover: retire, fold `equipment` into
    /// `priorEquipment`, advance `currentYear` (spec §4.5 `incrementYear`,
    /// §4.6 equipment state machine).
    pub fn increment_year(&mut self) -> KigaliResult<()> {
        self.phase = YearPhase::PostYear;
        let scopes: Vec<Scope> = self.keeper.registered_substances().cloned().collect();
        for scope in &scopes {
            self.run_chain(scope, recalc::year_increment_chain())?;
            self.keeper.increment_year(scope);
        }
        self.current_year += 1;
        self.phase = YearPhase::PreYear;
        Ok(())
    }
}

/// Interprets a rate quantity (`%`, `%/year`, or a bare fraction) as a
/// `[0, 1]` fraction.
fn to_fraction(value: &Quantity) -> KigaliResult<BigDecimal> {
    match value.unit {
        Unit::Percent | Unit::PercentPerYear => Ok(&value.value / BigDecimal::from(100i64)),
        _ => Ok(value.value.clone()),
    }
}

/// The canonical unit a named stream (or the derived `sales` view)
/// converts against.
fn stream_canonical_unit(name: &str) -> Unit {
    if name == "sales" {
        Unit::Kg
    } else {
        Stream::from_name(name).map(Stream::canonical_unit).unwrap_or(Unit::Kg)
    }
}
