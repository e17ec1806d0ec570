//! Stream Keeper: stateful per-scope record of streams, parameterization,
//! recycling policies, last-specified value, and enablement (spec §4.5).

pub mod substance_record;

use std::collections::HashMap;

use bigdecimal::BigDecimal;

use crate::ast::TradeStream;
use crate::error::{EngineError, KigaliResult};
use crate::quantity::Quantity;
pub use substance_record::{LastSpecifiedValues, Parameterization, RecyclingStage, Stream, SubstanceRecord};

/// Identifies the addressable namespace for all per-substance state
/// (spec §3 "Scope (UseKey)"). Within one running scenario, `default`
/// and `policy` blocks address the *same* application/substance record —
/// the stanza a command originated from never partitions state — so the
/// key collapses to `(application, substance)`; see DESIGN.md.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    pub application: String,
    pub substance: String,
}

impl Scope {
    pub fn new(application: impl Into<String>, substance: impl Into<String>) -> Self {
        Self {
            application: application.into(),
            substance: substance.into(),
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.application, self.substance)
    }
}

#[derive(Debug, Default)]
pub struct StreamKeeper {
    records: HashMap<Scope, SubstanceRecord>,
}

impl StreamKeeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a defaulted record if absent (spec §4.5 `ensureSubstance`).
    pub fn ensure_substance(&mut self, scope: &Scope) -> &mut SubstanceRecord {
        self.records.entry(scope.clone()).or_default()
    }

    pub fn has_substance(&self, scope: &Scope) -> bool {
        self.records.contains_key(scope)
    }

    pub fn registered_substances(&self) -> impl Iterator<Item = &Scope> {
        self.records.keys()
    }

    pub fn record(&self, scope: &Scope) -> Option<&SubstanceRecord> {
        self.records.get(scope)
    }

    pub fn record_mut(&mut self, scope: &Scope) -> Option<&mut SubstanceRecord> {
        self.records.get_mut(scope)
    }

    pub fn mark_stream_as_enabled(&mut self, scope: &Scope, stream: TradeStream) {
        self.ensure_substance(scope).enabled.insert(stream);
    }

    pub fn is_enabled(&self, scope: &Scope, stream: TradeStream) -> bool {
        self.records
            .get(scope)
            .map(|r| r.enabled.contains(&stream))
            .unwrap_or(false)
    }

    /// Asserts enablement before a non-zero write to a trade stream
    /// (spec §3 invariant 2, §4.5 `assertStreamEnabled`).
    fn assert_stream_enabled(&self, scope: &Scope, stream: TradeStream, value: &BigDecimal) -> KigaliResult<()> {
        use bigdecimal::Zero;
        if value.is_zero() {
            return Ok(());
        }
        if self.is_enabled(scope, stream) {
            Ok(())
        } else {
            Err(EngineError::Enablement {
                stream: stream.name().to_string(),
                scope: scope.to_string(),
            }
            .into())
        }
    }

    /// Raw write after enablement assertion and unit check; writes to
    /// the derived `sales` view are forbidden (spec §4.5 `setStream`).
    pub fn set_stream(&mut self, scope: &Scope, stream: Stream, value: BigDecimal) -> KigaliResult<()> {
        if let Stream::Domestic | Stream::Import | Stream::Export = stream {
            let trade = TradeStream::from_name(stream.name()).unwrap();
            self.assert_stream_enabled(scope, trade, &value)?;
        }
        let record = self.ensure_substance(scope);
        match stream {
            Stream::Domestic => record.domestic = value,
            Stream::Import => record.import = value,
            Stream::Export => record.export = value,
            Stream::RecycleRecharge => record.recycle_recharge = value,
            Stream::RecycleEol => record.recycle_eol = value,
            Stream::Equipment => record.equipment = value,
            Stream::PriorEquipment => {
                record.prior_equipment = value.clone();
                record.prior_equipment_year_start = value;
            }
            Stream::Consumption => record.consumption = value,
            Stream::ConsumptionNoRecycle => record.consumption_no_recycle = value,
            Stream::Energy => record.energy = value,
            Stream::ImplicitRecharge => record.implicit_recharge = value,
        }
        Ok(())
    }

    pub fn get_stream(&self, scope: &Scope, stream: Stream) -> BigDecimal {
        self.records
            .get(scope)
            .map(|r| r.get(stream))
            .unwrap_or_else(|| bigdecimal::BigDecimal::from(0i64))
    }

    /// Applies recycling displacement using the passed distribution
    /// split and the current `recycle` total, clamping the net
    /// assignment at zero (spec §4.5 `setSalesStream`).
    pub fn set_sales_stream(
        &mut self,
        scope: &Scope,
        trade: TradeStream,
        value: BigDecimal,
        distribution_share: &BigDecimal,
        subtract_recycling: bool,
    ) -> KigaliResult<()> {
        let record = self.records.get(scope).cloned().unwrap_or_default();
        let recycle = record.recycle();
        let net = if subtract_recycling {
            let share_of_recycle = &recycle * distribution_share;
            let net = &value - share_of_recycle;
            clamp_non_negative(net)
        } else {
            clamp_non_negative(value)
        };
        let stream = match trade {
            TradeStream::Domestic => Stream::Domestic,
            TradeStream::Import => Stream::Import,
            TradeStream::Export => Stream::Export,
        };
        self.set_stream(scope, stream, net)
    }

    /// Atomic two-stream write maintaining distribution and recycling
    /// displacement (spec §4.5 `setBothSalesStreams`).
    pub fn set_both_sales_streams(
        &mut self,
        scope: &Scope,
        domestic_value: BigDecimal,
        import_value: BigDecimal,
        pct_domestic: &BigDecimal,
        pct_import: &BigDecimal,
        subtract_recycling: bool,
    ) -> KigaliResult<()> {
        self.set_sales_stream(scope, TradeStream::Domestic, domestic_value, pct_domestic, subtract_recycling)?;
        self.set_sales_stream(scope, TradeStream::Import, import_value, pct_import, subtract_recycling)?;
        Ok(())
    }

    pub fn get_distribution(&self, scope: &Scope) -> (BigDecimal, BigDecimal) {
        self.records
            .get(scope)
            .map(|r| r.distribution())
            .unwrap_or_else(|| (BigDecimal::from(0i64), BigDecimal::from(0i64)))
    }

    pub fn set_last_specified_value(&mut self, scope: &Scope, stream: Stream, quantity: &Quantity) {
        self.ensure_substance(scope).last_specified.set(stream, quantity);
    }

    pub fn get_last_specified_value(&self, scope: &Scope, stream: Stream) -> Option<&Quantity> {
        self.records.get(scope).and_then(|r| r.last_specified.get(stream))
    }

    pub fn has_last_specified_value(&self, scope: &Scope, stream: Stream) -> bool {
        self.records
            .get(scope)
            .map(|r| r.last_specified.has(stream))
            .unwrap_or(false)
    }

    pub fn is_sales_intent_freshly_set(&self, scope: &Scope) -> bool {
        self.records.get(scope).map(|r| r.sales_intent_fresh).unwrap_or(false)
    }

    pub fn mark_sales_intent_fresh(&mut self, scope: &Scope) {
        self.ensure_substance(scope).sales_intent_fresh = true;
    }

    pub fn reset_sales_intent_flag(&mut self, scope: &Scope) {
        if let Some(record) = self.records.get_mut(scope) {
            record.sales_intent_fresh = false;
        }
    }

    /// Rolls `equipment` into `priorEquipment` (after retirement is
    /// applied by the Retire strategy), zeroes current-year `equipment`,
    /// zeroes `implicitRecharge`, clears the recycling bins, and
    /// preserves parameterization (spec §4.5 `incrementYear`).
    pub fn increment_year(&mut self, scope: &Scope) {
        if let Some(record) = self.records.get_mut(scope) {
            record.prior_equipment = &record.prior_equipment + &record.equipment;
            record.prior_equipment_year_start = record.prior_equipment.clone();
            record.equipment = BigDecimal::from(0i64);
            record.implicit_recharge = BigDecimal::from(0i64);
            record.recycle_recharge = BigDecimal::from(0i64);
            record.recycle_eol = BigDecimal::from(0i64);
        }
    }
}

/// Clamps a computed value to zero when negative (spec §4.6 "Failure
/// semantics": "Arithmetic that produces negative stream values is
/// clamped to zero where the material-balance equation allows").
pub fn clamp_non_negative(value: BigDecimal) -> BigDecimal {
    use bigdecimal::Zero;
    if value < BigDecimal::zero() {
        tracing::warn!(%value, "clamped negative quantity to zero");
        BigDecimal::zero()
    } else {
        value
    }
}
