pub mod command;
pub mod operation;
pub mod stanza;

pub use command::{Command, DisplaceTarget, During, TradeStream, YearRef};
pub use operation::{BinOp, CompareOp, Expr, LogicalOp, ProtectedVar};
pub use stanza::{ApplicationDef, PolicyDef, Program, ScenarioDef, SubstanceDef};
