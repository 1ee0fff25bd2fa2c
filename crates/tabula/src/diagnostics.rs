//! Human-readable report of the intermediate results of the generator.

use crate::{
    grammar::{Grammar, NonterminalID},
    lr0::LR0Automaton,
    sets::SymbolSets,
    table::Conflict,
    types::{Map, TerminalSet},
    util::write_joined,
};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
pub struct Diagnostics {
    /// Names of the nullable nonterminals, in declaration order.
    pub nullables: Vec<String>,
    pub first_sets: Map<String, Vec<String>>,
    pub follow_sets: Map<String, Vec<String>>,
    /// The rendered items of every LR(0) state, by state index.
    pub states: Vec<Vec<String>>,
    pub conflicts: Vec<ConflictReport>,
    /// Nonterminals that are declared but have no productions.
    pub empty_nonterminals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    pub state: u32,
    pub symbol: String,
    pub current: String,
    pub other: String,
}

impl Diagnostics {
    pub fn new(
        g: &Grammar,
        sets: &SymbolSets,
        lr0: &LR0Automaton,
        conflicts: &[Conflict],
    ) -> Self {
        let names = |set: &TerminalSet| {
            let mut names: Vec<_> = set.iter().map(|t| g.terminals[&t].name.clone()).collect();
            names.sort();
            names
        };
        let per_nonterminal = |sets: &Map<NonterminalID, TerminalSet>| -> Map<_, _> {
            g.nonterminals
                .values()
                .map(|n| (n.name.clone(), names(&sets[&n.id])))
                .collect()
        };

        Self {
            nullables: g
                .nonterminals
                .values()
                .filter(|n| sets.is_nullable(n.id))
                .map(|n| n.name.clone())
                .collect(),
            first_sets: per_nonterminal(&sets.firsts),
            follow_sets: per_nonterminal(&sets.follows),
            states: lr0
                .states
                .values()
                .map(|state| {
                    state
                        .items
                        .iter()
                        .map(|item| item.display(g).to_string())
                        .collect()
                })
                .collect(),
            conflicts: conflicts
                .iter()
                .map(|c| ConflictReport {
                    state: c.state.into_raw(),
                    symbol: g.symbol_name(c.symbol).to_owned(),
                    current: g.production(c.current).display(g).to_string(),
                    other: g.production(c.other).display(g).to_string(),
                })
                .collect(),
            empty_nonterminals: g
                .nonterminals
                .values()
                .filter(|n| n.productions.is_empty())
                .map(|n| n.name.clone())
                .collect(),
        }
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Reduce/reduce conflict in state {} on {}",
            self.state, self.symbol
        )?;
        writeln!(f, "Current reduce action: {}", self.current)?;
        write!(f, "Other reduce action:   {}", self.other)
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nullables:")?;
        for name in &self.nullables {
            write!(f, " {}", name)?;
        }
        writeln!(f)?;

        for (label, sets) in [("FIRST", &self.first_sets), ("FOLLOW", &self.follow_sets)] {
            for (name, set) in sets {
                write!(f, "{}({}) = {{ ", label, name)?;
                write_joined(f, " ", set)?;
                writeln!(f, " }}")?;
            }
        }

        for (i, items) in self.states.iter().enumerate() {
            writeln!(f, "\nState ({})", i)?;
            for item in items {
                writeln!(f, "  {}", item)?;
            }
        }

        for conflict in &self.conflicts {
            writeln!(f, "\n{}", conflict)?;
        }
        Ok(())
    }
}
