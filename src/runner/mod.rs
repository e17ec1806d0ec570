//! Scenario Runner (spec §4.8): composes the default stanza with each
//! scenario's named policies, steps years, and snapshots results.
//! Single-threaded within one scenario-trial; trials run in parallel
//! across independent `Engine` instances with no shared mutable state
//! (spec §5).

use rayon::prelude::*;
use tracing::instrument;

use crate::ast::{Program, ScenarioDef, YearRef};
use crate::config::EngineConfig;
use crate::engine::Engine;
use crate::error::KigaliResult;
use crate::machine::Machine;
use crate::result::{self, YearRecord};

/// How far past `start_year` a scenario's `to onwards` end resolves,
/// absent any other bound (spec §6 grammar permits `onwards` at the
/// scenario level, not only inside a `during` window; see DESIGN.md).
pub const DEFAULT_ONWARDS_HORIZON_YEARS: i32 = 50;

fn resolve_end_year(start_year: i32, end_year: YearRef) -> i32 {
    match end_year {
        YearRef::Year(y) => y,
        YearRef::Beginning => start_year,
        YearRef::Onwards => start_year + DEFAULT_ONWARDS_HORIZON_YEARS,
    }
}

/// One scenario-trial's full year-by-year result set.
#[derive(Debug, Clone)]
pub struct TrialResult {
    pub scenario_name: String,
    pub trial_index: u32,
    pub records: Vec<YearRecord>,
}

/// Runs every `simulate` scenario in `program`. Each `(scenario, trial)`
/// pair is an independent unit of work dispatched to `rayon`'s thread
/// pool (spec §4.13, §5 "each scenario-trial runs on its own worker on
/// its own engine instance with no shared mutable state").
pub fn run_all(program: &Program, config: &EngineConfig) -> KigaliResult<Vec<TrialResult>> {
    let jobs: Vec<(&ScenarioDef, u32)> = program
        .simulations
        .iter()
        .flat_map(|scenario| {
            let trial_count = scenario.trials.unwrap_or(config.monte_carlo_default_trials).max(1);
            (0..trial_count).map(move |trial_index| (scenario, trial_index))
        })
        .collect();

    jobs.into_par_iter()
        .map(|(scenario, trial_index)| run_trial(program, scenario, trial_index, config))
        .collect()
}

/// Executes one scenario-trial to completion (spec §4.8's five-step
/// algorithm).
#[instrument(name = "scenario", skip(program, config), fields(scenario = %scenario.name, trial = trial_index))]
fn run_trial(program: &Program, scenario: &ScenarioDef, trial_index: u32, config: &EngineConfig) -> KigaliResult<TrialResult> {
    let start_year = scenario.start_year;
    let end_year = resolve_end_year(start_year, scenario.end_year);
    // Present only when the source carried an explicit `across N trials`
    // clause; its absence means every sampler collapses to its
    // mean/midpoint rather than drawing from the RNG (spec §4.3, §4.4).
    let deterministic = scenario.trials.is_none();

    let mut engine = Engine::new(config, start_year, end_year);
    let mut machine = Machine::new(&mut engine, &scenario.name, trial_index, deterministic);
    machine.run_global_variables(&program.variables)?;

    let mut records = Vec::new();
    for year in start_year..=end_year {
        run_year(program, scenario, &mut machine, year, start_year, end_year)?;
        records.extend(result::snapshot_all(machine.engine().keeper(), year));
        if year < end_year {
            machine.increment_year()?;
        }
    }

    Ok(TrialResult {
        scenario_name: scenario.name.clone(),
        trial_index,
        records,
    })
}

/// Runs every year-applicable command from the default stanza, then
/// from each named policy in declared order (spec §4.8 steps 2-4; §5
/// ordering guarantees (b)-(d)).
#[instrument(name = "sim_year", skip(program, scenario, machine))]
fn run_year(
    program: &Program,
    scenario: &ScenarioDef,
    machine: &mut Machine<'_>,
    year: i32,
    scenario_start: i32,
    scenario_end: i32,
) -> KigaliResult<()> {
    for application in &program.default_stanza {
        for substance in &application.substances {
            machine.execute_substance(&application.name, substance, year, scenario_start, scenario_end)?;
        }
    }
    for policy_name in &scenario.policies {
        if let Some(policy) = program.policy(policy_name) {
            for application in &policy.applications {
                for substance in &application.substances {
                    machine.execute_substance(&application.name, substance, year, scenario_start, scenario_end)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::YearRef;

    #[test]
    fn resolve_end_year_onwards_uses_default_horizon() {
        assert_eq!(resolve_end_year(2025, YearRef::Onwards), 2025 + DEFAULT_ONWARDS_HORIZON_YEARS);
    }

    #[test]
    fn resolve_end_year_literal_is_passed_through() {
        assert_eq!(resolve_end_year(2025, YearRef::Year(2035)), 2035);
    }
}
