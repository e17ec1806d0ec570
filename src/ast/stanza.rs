//! Stanza containers (spec §4.2, §4.3, §6 grammar).

use crate::ast::command::{Command, YearRef};

#[derive(Debug, Clone, Default)]
pub struct SubstanceDef {
    pub name: String,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationDef {
    pub name: String,
    pub substances: Vec<SubstanceDef>,
}

#[derive(Debug, Clone)]
pub struct ScenarioDef {
    pub name: String,
    /// Policies applied in declared order, after `using` / `then`.
    pub policies: Vec<String>,
    pub start_year: i32,
    pub end_year: YearRef,
    pub trials: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct PolicyDef {
    pub name: String,
    pub applications: Vec<ApplicationDef>,
}

/// The full parsed program: a sequence of stanzas (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// Raw `about` text; opaque free-form documentation with no
    /// semantic effect on the engine.
    pub about: Option<String>,
    /// Top-level `define "X" as expr` bindings from the `variables`
    /// stanza.
    pub variables: Vec<Command>,
    pub default_stanza: Vec<ApplicationDef>,
    pub policies: Vec<PolicyDef>,
    pub simulations: Vec<ScenarioDef>,
}

impl Program {
    pub fn policy(&self, name: &str) -> Option<&PolicyDef> {
        self.policies.iter().find(|p| p.name == name)
    }
}
