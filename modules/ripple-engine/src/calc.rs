//! Calculation graph: computations re-run when their state keys change.

use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use crate::actions::{Action, Actions, Computation};
use crate::store::Ripple;

/// What re-triggers a computation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Trigger {
    Key(String),
    /// Declared without a reaction key: runs on every change.
    Any,
}

impl Trigger {
    fn fires_for(&self, key: &str) -> bool {
        match self {
            Trigger::Key(k) => k == key,
            Trigger::Any => true,
        }
    }
}

/// One `data-calculate` declaration: a comma-separated list of computation
/// names and the reaction key of the declaring element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcDeclaration {
    pub names: String,
    pub reaction: Option<String>,
}

struct Calculation {
    name: String,
    func: Computation,
    triggers: BTreeSet<Trigger>,
    running: Cell<bool>,
}

/// Computations grouped by function identity.
#[derive(Default)]
pub struct CalcGraph {
    entries: Vec<Calculation>,
}

fn same_function(a: &Computation, b: &Computation) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

impl CalcGraph {
    /// Build the graph from declarations. Names that do not resolve to an
    /// [`Action::Compute`] are skipped.
    pub fn build(declarations: impl IntoIterator<Item = CalcDeclaration>, actions: &Actions) -> Self {
        let mut graph = Self::default();
        for declaration in declarations {
            let trigger = match declaration.reaction.filter(|k| !k.is_empty()) {
                Some(key) => Trigger::Key(key),
                None => Trigger::Any,
            };
            for name in declaration.names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                let Some(Action::Compute(func)) = actions.get(name) else {
                    tracing::debug!(computation = name, "Unknown computation skipped");
                    continue;
                };
                match graph.entries.iter_mut().find(|c| same_function(&c.func, func)) {
                    Some(existing) => {
                        existing.triggers.insert(trigger.clone());
                    }
                    None => graph.entries.push(Calculation {
                        name: name.to_string(),
                        func: func.clone(),
                        triggers: BTreeSet::from([trigger.clone()]),
                        running: Cell::new(false),
                    }),
                }
            }
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Triggers of the entry first registered under `name`.
    pub fn triggers(&self, name: &str) -> Option<Vec<Trigger>> {
        self.entries
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.triggers.iter().cloned().collect())
    }

    /// Names of the computations that a change to `key` re-runs.
    pub fn dependents(&self, key: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|c| c.triggers.iter().any(|t| t.fires_for(key)))
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Run every computation depending on `key` once. A computation whose
    /// own writes lead back to it is not re-entered.
    pub(crate) fn trigger(&self, key: &str, ripple: &Ripple) {
        for calc in &self.entries {
            if !calc.triggers.iter().any(|t| t.fires_for(key)) {
                continue;
            }
            if calc.running.replace(true) {
                tracing::debug!(computation = %calc.name, key, "Skipping re-entrant computation");
                continue;
            }
            (calc.func)(ripple);
            calc.running.set(false);
        }
    }
}

impl std::fmt::Debug for CalcGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|c| (&c.name, &c.triggers)))
            .finish()
    }
}
