//! Side-effecting commands (spec §4.3, §6 grammar).

use crate::ast::operation::Expr;
use crate::keeper::RecyclingStage;

/// Either endpoint of a `during` window may be a literal year or the
/// keywords `beginning`/`onwards` (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearRef {
    Year(i32),
    Beginning,
    Onwards,
}

/// A `during` window; a missing window means every year (spec §4.3).
#[derive(Debug, Clone, Copy, Default)]
pub struct During {
    pub start: Option<YearRef>,
    pub end: Option<YearRef>,
}

impl During {
    pub fn always() -> Self {
        Self::default()
    }

    /// Whether `year` falls inside this window given the scenario's
    /// overall `[scenario_start, scenario_end]` bounds (`beginning` and
    /// `onwards` resolve against those bounds, per spec §4.3).
    pub fn covers(&self, year: i32, scenario_start: i32, scenario_end: i32) -> bool {
        let resolve_start = |r: YearRef| match r {
            YearRef::Year(y) => y,
            YearRef::Beginning => scenario_start,
            YearRef::Onwards => scenario_start,
        };
        let resolve_end = |r: YearRef| match r {
            YearRef::Year(y) => y,
            YearRef::Beginning => scenario_end,
            YearRef::Onwards => scenario_end,
        };
        let lo = self.start.map(resolve_start).unwrap_or(scenario_start);
        let hi = self.end.map(resolve_end).unwrap_or(scenario_end);
        year >= lo && year <= hi
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaceTarget {
    /// Another stream of the same substance.
    Stream(String),
    /// Another substance entirely (cross-substance displacement).
    Substance(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TradeStream {
    Domestic,
    Import,
    Export,
}

impl TradeStream {
    pub fn name(&self) -> &'static str {
        match self {
            TradeStream::Domestic => "domestic",
            TradeStream::Import => "import",
            TradeStream::Export => "export",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "domestic" => Some(TradeStream::Domestic),
            "import" => Some(TradeStream::Import),
            "export" => Some(TradeStream::Export),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    Enable {
        stream: TradeStream,
        during: During,
    },
    InitialCharge {
        stream: TradeStream,
        value: Expr,
        during: During,
    },
    Equals {
        value: Expr,
        during: During,
    },
    Set {
        stream: String,
        value: Expr,
        during: During,
    },
    Change {
        stream: String,
        delta: Expr,
        during: During,
    },
    Retire {
        rate: Expr,
        during: During,
    },
    Recharge {
        population_rate: Expr,
        intensity: Expr,
        during: During,
    },
    Cap {
        stream: String,
        value: Expr,
        displacing: Option<DisplaceTarget>,
        during: During,
    },
    Floor {
        stream: String,
        value: Expr,
        displacing: Option<DisplaceTarget>,
        during: During,
    },
    Replace {
        value: Expr,
        stream: String,
        dest_substance: String,
        during: During,
    },
    Recover {
        recovery_rate: Expr,
        yield_rate: Expr,
        stage: RecyclingStage,
        displacing: Option<DisplaceTarget>,
        during: During,
    },
    DefineVariable {
        name: String,
        value: Expr,
    },
}

impl Command {
    pub fn during(&self) -> During {
        match self {
            Command::Enable { during, .. }
            | Command::InitialCharge { during, .. }
            | Command::Equals { during, .. }
            | Command::Set { during, .. }
            | Command::Change { during, .. }
            | Command::Retire { during, .. }
            | Command::Recharge { during, .. }
            | Command::Cap { during, .. }
            | Command::Floor { during, .. }
            | Command::Replace { during, .. }
            | Command::Recover { during, .. } => *during,
            Command::DefineVariable { .. } => During::always(),
        }
    }
}
