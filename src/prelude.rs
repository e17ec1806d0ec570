// 1. Entry points
pub use crate::parser::parse;
pub use crate::runner::run_all;

// 2. The Core Loop Types
pub use crate::engine::Engine;
pub use crate::machine::Machine;

// 3. Domain Types
pub use crate::ast::{
    Command, DisplaceTarget, During, Expr, Program, ScenarioDef, SubstanceDef, TradeStream, YearRef,
};
pub use crate::keeper::{RecyclingStage, Scope, Stream, StreamKeeper};
pub use crate::quantity::{Quantity, Unit};

// 4. Results
pub use crate::result::{TradeSupplement, YearRecord};
pub use crate::runner::TrialResult;

// 5. Configuration
pub use crate::config::EngineConfig;

// 6. Errors
pub use crate::error::{EngineError, EvalError, KigaliError, KigaliResult, ParseError, UnitError};
