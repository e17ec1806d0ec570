//! Recalc Strategies (spec §4.6): named routines that propagate a
//! single write to dependent streams in a fixed order.
//!
//! Grounded in the teacher's `decision_policy` trait-over-small-routines
//! shape, generalized into a composable chain (spec §9: "model as a
//! small interpreter over a list of strategy tags; this makes the chain
//! easily trace-dumpable in tests").

pub mod consumption_energy;
pub mod recycle;
pub mod retire;
pub mod sales;

use tracing::debug;

use crate::error::KigaliResult;
use crate::keeper::{Scope, StreamKeeper};
use crate::quantity::Converter;

/// One named step of a recalc chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyTag {
    Retire,
    Sales,
    Recycle,
    Consumption,
    Energy,
}

impl StrategyTag {
    pub fn name(self) -> &'static str {
        match self {
            StrategyTag::Retire => "retire",
            StrategyTag::Sales => "sales",
            StrategyTag::Recycle => "recycle",
            StrategyTag::Consumption => "consumption",
            StrategyTag::Energy => "energy",
        }
    }
}

/// Bundles the keeper and unit converter a strategy needs, per spec
/// §4.6 ("Each strategy is a pure function over `(engine, kit)` where
/// `kit` bundles keeper, unit converter, and state getter").
pub struct Kit<'a> {
    pub keeper: &'a mut StreamKeeper,
    pub converter: &'a Converter,
}

/// An ordered, named chain of strategies (spec §4.6's canonical chains
/// table). Built with [`ChainBuilder`] and executed in declaration
/// order on every qualifying user write (spec §5(e)).
#[derive(Debug, Clone)]
pub struct RecalcChain {
    steps: Vec<StrategyTag>,
}

impl RecalcChain {
    pub fn run(&self, scope: &Scope, kit: &mut Kit) -> KigaliResult<()> {
        for step in &self.steps {
            debug!(scope = %scope, strategy = step.name(), "running recalc strategy");
            match step {
                StrategyTag::Retire => retire::apply(scope, kit)?,
                StrategyTag::Sales => sales::apply(scope, kit)?,
                StrategyTag::Recycle => recycle::apply(scope, kit)?,
                StrategyTag::Consumption => consumption_energy::apply_consumption(scope, kit)?,
                StrategyTag::Energy => consumption_energy::apply_energy(scope, kit)?,
            }
        }
        Ok(())
    }

    pub fn steps(&self) -> &[StrategyTag] {
        &self.steps
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChainBuilder {
    steps: Vec<StrategyTag>,
}

impl ChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, tag: StrategyTag) -> Self {
        self.steps.push(tag);
        self
    }

    pub fn build(self) -> RecalcChain {
        RecalcChain { steps: self.steps }
    }
}

/// The canonical chain for a parameter change that reshapes recharge
/// demand (spec §4.6 table row 1).
pub fn parameter_change_chain() -> RecalcChain {
    ChainBuilder::new()
        .then(StrategyTag::Retire)
        .then(StrategyTag::Sales)
        .then(StrategyTag::Recycle)
        .then(StrategyTag::Consumption)
        .then(StrategyTag::Energy)
        .build()
}

/// The canonical chain for a direct `set domestic|import|export` write,
/// a `recover` write, and the year-increment rollover (spec §4.6 table
/// rows 2-5); identical in shape to [`parameter_change_chain`] minus the
/// leading retirement step.
pub fn write_chain() -> RecalcChain {
    ChainBuilder::new()
        .then(StrategyTag::Sales)
        .then(StrategyTag::Recycle)
        .then(StrategyTag::Consumption)
        .then(StrategyTag::Energy)
        .build()
}

/// The year-increment chain: retirement runs first against the rolled
/// population, then the same downstream steps (spec §4.6 table row 5).
pub fn year_increment_chain() -> RecalcChain {
    parameter_change_chain()
}
