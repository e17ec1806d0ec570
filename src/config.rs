//! Engine-wide tunables.
//!
//! The teacher's own `config.rs` is a single-purpose module holding a
//! cloud bucket constant and a client factory; here the equivalent slot
//! holds the handful of engine-level knobs that are not part of any one
//! scenario's script.

/// Significant digits carried by the decimal context used throughout
/// the quantity converter (spec §4.1: "at least 34 significant digits").
pub const DEFAULT_DECIMAL_PRECISION: u64 = 34;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Significant digits for decimal arithmetic.
    pub decimal_precision: u64,
    /// Trial count used when a `simulate` statement omits `across N trials`.
    pub monte_carlo_default_trials: u32,
    /// Tolerance below which a computed negative quantity is treated as
    /// zero rather than a genuine deficit (spec §4.6 "Failure semantics").
    pub clamp_epsilon: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decimal_precision: DEFAULT_DECIMAL_PRECISION,
            monte_carlo_default_trials: 1,
            clamp_epsilon: 1e-9,
        }
    }
}
