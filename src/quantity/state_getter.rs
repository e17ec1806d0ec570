//! The state getter and its nest-safe override stack (spec §4.1, §9).
//!
//! Conversion is state-dependent: the converter consults a state getter
//! for the current population, amortized unit volume, volume, GHG
//! intensity, energy intensity, and years elapsed. An overriding state
//! getter lets a caller temporarily pin one or more of those values for
//! the duration of a single conversion ("set → convert → clear"); the
//! override must be nest-safe. We enforce that with a scoped-acquisition
//! guard (`OverrideGuard`) rather than a bare push/pop pair, so a panic
//! or early return during the wrapped conversion still releases the
//! override — the same "guarantee release on all exit paths" discipline
//! the teacher applies to its builder `build()` calls.

use std::cell::RefCell;

use bigdecimal::BigDecimal;

/// Read-only view of the quantities a conversion may need.
pub trait StateGetter {
    fn population(&self) -> BigDecimal;
    fn amortized_unit_volume(&self) -> BigDecimal;
    fn volume(&self) -> BigDecimal;
    fn ghg_intensity(&self) -> BigDecimal;
    fn energy_intensity(&self) -> BigDecimal;
    fn years_elapsed(&self) -> BigDecimal;
}

#[derive(Default, Clone)]
struct OverrideFrame {
    population: Option<BigDecimal>,
    volume: Option<BigDecimal>,
    amortized_unit_volume: Option<BigDecimal>,
}

/// Wraps a base [`StateGetter`] with a stack of temporarily pinned
/// slots. Only `population`, `volume`, and `amortized_unit_volume` are
/// overridable, per spec §4.1.
pub struct OverridingStateGetter<'a> {
    base: &'a dyn StateGetter,
    stack: RefCell<Vec<OverrideFrame>>,
}

/// RAII guard returned by [`OverridingStateGetter::push`]. Popping the
/// frame happens in `Drop`, so the override is released on every exit
/// path (normal return, `?`, or panic unwind) without relying on the
/// caller to remember to clear it.
pub struct OverrideGuard<'a, 'b> {
    getter: &'b OverridingStateGetter<'a>,
}

impl<'a> OverridingStateGetter<'a> {
    pub fn new(base: &'a dyn StateGetter) -> Self {
        Self {
            base,
            stack: RefCell::new(Vec::new()),
        }
    }

    /// Pushes a new override frame. Any field left `None` falls through
    /// to the next frame down (or the base getter).
    pub fn push<'b>(
        &'b self,
        population: Option<BigDecimal>,
        volume: Option<BigDecimal>,
        amortized_unit_volume: Option<BigDecimal>,
    ) -> OverrideGuard<'a, 'b> {
        self.stack.borrow_mut().push(OverrideFrame {
            population,
            volume,
            amortized_unit_volume,
        });
        OverrideGuard { getter: self }
    }

    fn resolve<F>(&self, project: F) -> Option<BigDecimal>
    where
        F: Fn(&OverrideFrame) -> Option<BigDecimal>,
    {
        self.stack.borrow().iter().rev().find_map(project)
    }
}

impl<'a, 'b> Drop for OverrideGuard<'a, 'b> {
    fn drop(&mut self) {
        self.getter.stack.borrow_mut().pop();
    }
}

impl<'a> StateGetter for OverridingStateGetter<'a> {
    fn population(&self) -> BigDecimal {
        self.resolve(|f| f.population.clone())
            .unwrap_or_else(|| self.base.population())
    }

    fn amortized_unit_volume(&self) -> BigDecimal {
        self.resolve(|f| f.amortized_unit_volume.clone())
            .unwrap_or_else(|| self.base.amortized_unit_volume())
    }

    fn volume(&self) -> BigDecimal {
        self.resolve(|f| f.volume.clone())
            .unwrap_or_else(|| self.base.volume())
    }

    fn ghg_intensity(&self) -> BigDecimal {
        self.base.ghg_intensity()
    }

    fn energy_intensity(&self) -> BigDecimal {
        self.base.energy_intensity()
    }

    fn years_elapsed(&self) -> BigDecimal {
        self.base.years_elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::FromPrimitive;

    struct Fixed;
    impl StateGetter for Fixed {
        fn population(&self) -> BigDecimal {
            BigDecimal::from_i32(100).unwrap()
        }
        fn amortized_unit_volume(&self) -> BigDecimal {
            BigDecimal::from_i32(1).unwrap()
        }
        fn volume(&self) -> BigDecimal {
            BigDecimal::from_i32(0).unwrap()
        }
        fn ghg_intensity(&self) -> BigDecimal {
            BigDecimal::from_i32(0).unwrap()
        }
        fn energy_intensity(&self) -> BigDecimal {
            BigDecimal::from_i32(0).unwrap()
        }
        fn years_elapsed(&self) -> BigDecimal {
            BigDecimal::from_i32(0).unwrap()
        }
    }

    #[test]
    fn override_is_nest_safe() {
        let base = Fixed;
        let getter = OverridingStateGetter::new(&base);
        assert_eq!(getter.population(), BigDecimal::from_i32(100).unwrap());
        {
            let _g1 = getter.push(Some(BigDecimal::from_i32(5).unwrap()), None, None);
            assert_eq!(getter.population(), BigDecimal::from_i32(5).unwrap());
            {
                let _g2 = getter.push(Some(BigDecimal::from_i32(9).unwrap()), None, None);
                assert_eq!(getter.population(), BigDecimal::from_i32(9).unwrap());
            }
            assert_eq!(getter.population(), BigDecimal::from_i32(5).unwrap());
        }
        assert_eq!(getter.population(), BigDecimal::from_i32(100).unwrap());
    }
}
