//! Pushdown Machine (spec §4.4): a tree-walking evaluator over [`Expr`]
//! that resolves variable scopes and drives [`Command`]s against the
//! engine. The machine never writes directly to the keeper (spec §9
//! "Shared-by-many containers"; all mutation routes through `Engine`).

use std::collections::HashMap;

use bigdecimal::{BigDecimal, FromPrimitive, ToPrimitive};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::Distribution;

use crate::ast::{BinOp, Command, CompareOp, Expr, LogicalOp, ProtectedVar, SubstanceDef};
use crate::engine::Engine;
use crate::error::{EvalError, KigaliResult};
use crate::quantity::Quantity;
use crate::rng::rng_for_trial;

/// The evaluator's runtime value: a quantity, or a boolean produced by a
/// comparison/logical operation. Kept distinct from `Quantity` so
/// `if COND` can reject a non-boolean condition with `TypeMismatch`
/// (spec §4.4 "type mismatch in a conditional").
#[derive(Debug, Clone)]
enum EvalValue {
    Quantity(Quantity),
    Bool(bool),
}

impl EvalValue {
    fn into_quantity(self) -> KigaliResult<Quantity> {
        match self {
            EvalValue::Quantity(q) => Ok(q),
            EvalValue::Bool(b) => Err(EvalError::TypeMismatch(format!("boolean {b}")).into()),
        }
    }

    fn into_bool(self) -> KigaliResult<bool> {
        match self {
            EvalValue::Bool(b) => Ok(b),
            EvalValue::Quantity(q) => Err(EvalError::TypeMismatch(format!("quantity {} {}", q.value, q.unit)).into()),
        }
    }
}

pub struct Machine<'a> {
    engine: &'a mut Engine,
    rng: ChaCha8Rng,
    /// `false` when the enclosing scenario omitted `across N trials`;
    /// samplers then collapse to their mean/midpoint (spec §4.3).
    deterministic: bool,
    /// Innermost last. Index 0 is the scenario-lifetime global scope
    /// seeded from the `variables` stanza; each substance body pushes
    /// one more scope for the duration of its command list (spec §4.4).
    scopes: Vec<HashMap<String, Quantity>>,
}

impl<'a> Machine<'a> {
    pub fn new(engine: &'a mut Engine, scenario_name: &str, trial_index: u32, deterministic: bool) -> Self {
        Self {
            engine,
            rng: rng_for_trial(scenario_name, trial_index),
            deterministic,
            scopes: vec![HashMap::new()],
        }
    }

    /// Evaluates the top-level `variables` stanza into the global scope.
    pub fn run_global_variables(&mut self, commands: &[Command]) -> KigaliResult<()> {
        for command in commands {
            self.run_command(command)?;
        }
        Ok(())
    }

    pub fn engine(&self) -> &Engine {
        self.engine
    }

    /// Delegates the post-year rollover to the engine (spec §4.8 step 4:
    /// "invoke incrementYear except after the last year").
    pub fn increment_year(&mut self) -> KigaliResult<()> {
        self.engine.increment_year()
    }

    /// Executes one substance body for the current year: pushes a fresh
    /// scope, runs every command whose `during` window covers `year`,
    /// then pops the scope (spec §4.4's substance-body variable
    /// lifetime).
    pub fn execute_substance(
        &mut self,
        application: &str,
        substance: &SubstanceDef,
        year: i32,
        scenario_start: i32,
        scenario_end: i32,
    ) -> KigaliResult<()> {
        self.engine.set_application(application);
        self.engine.set_substance(&substance.name, true)?;
        self.scopes.push(HashMap::new());
        for command in &substance.commands {
            if command.during().covers(year, scenario_start, scenario_end) {
                self.run_command(command)?;
            }
        }
        self.scopes.pop();
        Ok(())
    }

    fn current_scope_mut(&mut self) -> &mut HashMap<String, Quantity> {
        self.scopes.last_mut().expect("global scope always present")
    }

    fn lookup_variable(&self, name: &str) -> Option<&Quantity> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    fn define_variable(&mut self, name: &str, value: Quantity) -> KigaliResult<()> {
        if ProtectedVar::from_name(name).is_some() {
            return Err(EvalError::ProtectedVariable(name.to_string()).into());
        }
        self.current_scope_mut().insert(name.to_string(), value);
        Ok(())
    }

    fn run_command(&mut self, command: &Command) -> KigaliResult<()> {
        match command {
            Command::Enable { stream, .. } => self.engine.enable(stream.clone()),
            Command::InitialCharge { stream, value, .. } => {
                let q = self.eval(value)?.into_quantity()?;
                self.engine.set_initial_charge(stream.clone(), q)
            }
            Command::Equals { value, .. } => {
                let q = self.eval(value)?.into_quantity()?;
                self.engine.equals(q)
            }
            Command::Set { stream, value, .. } => {
                let q = self.eval(value)?.into_quantity()?;
                self.engine.set_stream(stream, q)
            }
            Command::Change { stream, delta, .. } => {
                let q = self.eval(delta)?.into_quantity()?;
                self.engine.change_stream(stream, q)
            }
            Command::Retire { rate, .. } => {
                let q = self.eval(rate)?.into_quantity()?;
                self.engine.retire(q)
            }
            Command::Recharge {
                population_rate,
                intensity,
                ..
            } => {
                let pr = self.eval(population_rate)?.into_quantity()?;
                let intensity = self.eval(intensity)?.into_quantity()?;
                self.engine.recharge(pr, intensity)
            }
            Command::Cap {
                stream,
                value,
                displacing,
                ..
            } => {
                let q = self.eval(value)?.into_quantity()?;
                self.engine.cap(stream, q, displacing.clone())
            }
            Command::Floor {
                stream,
                value,
                displacing,
                ..
            } => {
                let q = self.eval(value)?.into_quantity()?;
                self.engine.floor(stream, q, displacing.clone())
            }
            Command::Replace {
                value,
                stream,
                dest_substance,
                ..
            } => {
                let q = self.eval(value)?.into_quantity()?;
                self.engine.replace(q, stream, dest_substance)
            }
            Command::Recover {
                recovery_rate,
                yield_rate,
                stage,
                displacing,
                ..
            } => {
                let rr = self.eval(recovery_rate)?.into_quantity()?;
                let yr = self.eval(yield_rate)?.into_quantity()?;
                self.engine.recover(rr, yr, *stage, displacing.clone())
            }
            Command::DefineVariable { name, value } => {
                let q = self.eval(value)?.into_quantity()?;
                self.define_variable(name, q)
            }
        }
    }

    fn eval(&mut self, expr: &Expr) -> KigaliResult<EvalValue> {
        match expr {
            Expr::Literal(q) => Ok(EvalValue::Quantity(q.clone())),
            Expr::Var(name) => match self.lookup_variable(name) {
                Some(q) => Ok(EvalValue::Quantity(q.clone())),
                None => Err(EvalError::UndefinedVariable(name.clone()).into()),
            },
            Expr::Protected(var) => Ok(EvalValue::Quantity(self.protected_value(*var))),
            Expr::StreamRead {
                stream,
                of_substance,
                as_unit,
            } => {
                let q = self.engine.read_stream(of_substance.as_deref(), stream, *as_unit)?;
                Ok(EvalValue::Quantity(q))
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?.into_quantity()?;
                let rhs = self.eval(rhs)?.into_quantity()?;
                Ok(EvalValue::Quantity(self.eval_binary(*op, lhs, rhs)?))
            }
            Expr::Compare { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?.into_quantity()?;
                let rhs = self.eval(rhs)?.into_quantity()?;
                Ok(EvalValue::Bool(eval_compare(*op, &lhs, &rhs)))
            }
            Expr::Logical { op, lhs, rhs } => {
                let lhs = self.eval(lhs)?.into_bool()?;
                let rhs = self.eval(rhs)?.into_bool()?;
                Ok(EvalValue::Bool(match op {
                    LogicalOp::And => lhs && rhs,
                    LogicalOp::Or => lhs || rhs,
                    LogicalOp::Xor => lhs ^ rhs,
                }))
            }
            Expr::Limit { value, min, max } => {
                let mut v = self.eval(value)?.into_quantity()?;
                if let Some(min) = min {
                    let min_q = self.eval(min)?.into_quantity()?;
                    if v.value < min_q.value {
                        v.value = min_q.value;
                    }
                }
                if let Some(max) = max {
                    let max_q = self.eval(max)?.into_quantity()?;
                    if v.value > max_q.value {
                        v.value = max_q.value;
                    }
                }
                Ok(EvalValue::Quantity(v))
            }
            Expr::Conditional {
                condition,
                if_true,
                if_false,
            } => {
                let cond = self.eval(condition)?.into_bool()?;
                if cond {
                    self.eval(if_true)
                } else {
                    self.eval(if_false)
                }
            }
            Expr::SampleNormal { mean, std } => {
                let mean = self.eval(mean)?.into_quantity()?;
                let std = self.eval(std)?.into_quantity()?;
                let sampled = self.sample_normal(&mean.value, &std.value);
                Ok(EvalValue::Quantity(Quantity::new(sampled, mean.unit)))
            }
            Expr::SampleUniform { low, high } => {
                let low = self.eval(low)?.into_quantity()?;
                let high = self.eval(high)?.into_quantity()?;
                let sampled = self.sample_uniform(&low.value, &high.value);
                Ok(EvalValue::Quantity(Quantity::new(sampled, low.unit)))
            }
        }
    }

    fn protected_value(&self, var: ProtectedVar) -> Quantity {
        use crate::quantity::Unit;
        match var {
            ProtectedVar::YearAbsolute => {
                Quantity::new(BigDecimal::from(self.engine.current_year() as i64), Unit::Year)
            }
            ProtectedVar::YearsElapsed => Quantity::new(
                BigDecimal::from((self.engine.current_year() - self.engine.start_year()) as i64),
                Unit::Year,
            ),
        }
    }

    /// Binary arithmetic between two quantities. `rhs` is converted into
    /// `lhs`'s unit when both carry a dimensioned unit; a `%`-typed
    /// operand on either side is treated as a dimensionless scale factor
    /// (spec §4.3 doesn't mandate full dimensional analysis for
    /// arithmetic — see DESIGN.md).
    fn eval_binary(&self, op: BinOp, lhs: Quantity, rhs: Quantity) -> KigaliResult<Quantity> {
        use crate::quantity::UnitFamily;
        let rhs_value = if rhs.unit.family() == UnitFamily::Percent && lhs.unit.family() != UnitFamily::Percent {
            &rhs.value / BigDecimal::from(100i64)
        } else if lhs.unit != rhs.unit && matches!(op, BinOp::Add | BinOp::Sub) {
            self.engine.convert(&rhs, lhs.unit)?.value
        } else {
            rhs.value.clone()
        };
        let result_unit = if lhs.unit.family() == UnitFamily::Percent && rhs.unit.family() != UnitFamily::Percent {
            rhs.unit
        } else {
            lhs.unit
        };
        let value = match op {
            BinOp::Add => &lhs.value + &rhs_value,
            BinOp::Sub => &lhs.value - &rhs_value,
            BinOp::Mul => &lhs.value * &rhs_value,
            BinOp::Div => {
                use bigdecimal::Zero;
                if rhs_value.is_zero() {
                    return Err(EvalError::DivisionByZero {
                        context: "binary division".to_string(),
                    }
                    .into());
                }
                &lhs.value / &rhs_value
            }
            BinOp::Pow => pow_decimal(&lhs.value, &rhs_value),
        };
        Ok(Quantity::new(value, result_unit))
    }

    fn sample_normal(&mut self, mean: &BigDecimal, std: &BigDecimal) -> BigDecimal {
        if self.deterministic {
            return mean.clone();
        }
        let mean_f = mean.to_f64().unwrap_or(0.0);
        let std_f = std.to_f64().unwrap_or(0.0);
        let dist = rand_distr::Normal::new(mean_f, std_f).unwrap_or_else(|_| rand_distr::Normal::new(mean_f, 0.0).unwrap());
        BigDecimal::from_f64(dist.sample(&mut self.rng)).unwrap_or_else(|| mean.clone())
    }

    fn sample_uniform(&mut self, low: &BigDecimal, high: &BigDecimal) -> BigDecimal {
        if self.deterministic {
            return (low + high) / BigDecimal::from(2i64);
        }
        let low_f = low.to_f64().unwrap_or(0.0);
        let high_f = high.to_f64().unwrap_or(low_f);
        if high_f <= low_f {
            return low.clone();
        }
        let sampled = self.rng.random_range(low_f..high_f);
        BigDecimal::from_f64(sampled).unwrap_or_else(|| low.clone())
    }
}

fn eval_compare(op: CompareOp, lhs: &Quantity, rhs: &Quantity) -> bool {
    match op {
        CompareOp::Lt => lhs.value < rhs.value,
        CompareOp::Lte => lhs.value <= rhs.value,
        CompareOp::Gt => lhs.value > rhs.value,
        CompareOp::Gte => lhs.value >= rhs.value,
        CompareOp::Eq => lhs.value == rhs.value,
        CompareOp::Neq => lhs.value != rhs.value,
    }
}

/// `^` only ever appears with a small integer exponent in QubecTalk
/// scripts; repeated multiplication avoids pulling in a decimal-power
/// crate for a rarely used operator.
fn pow_decimal(base: &BigDecimal, exponent: &BigDecimal) -> BigDecimal {
    use bigdecimal::Zero;
    let exp = exponent.to_i64().unwrap_or(0);
    if exp == 0 {
        return BigDecimal::from(1i64);
    }
    let mut result = BigDecimal::from(1i64);
    for _ in 0..exp.unsigned_abs() {
        result *= base;
    }
    if exp < 0 {
        if result.is_zero() {
            return BigDecimal::from(0i64);
        }
        return BigDecimal::from(1i64) / result;
    }
    result
}
