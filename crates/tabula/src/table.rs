//! Calculation of the SLR parse table with conflict resolution.

use crate::{
    grammar::{Grammar, ProductionID, SymbolID},
    lr0::{LR0Automaton, LR0State, StateID},
    sets::SymbolSets,
    types::Map,
    util::display_fn,
};
use std::fmt;

#[derive(Debug)]
pub struct ParseTable {
    pub states: Map<StateID, ParseTableRow>,
}

impl ParseTable {
    pub fn row(&self, id: StateID) -> &ParseTableRow {
        &self.states[&id]
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            for (i, (id, row)) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {:?}", id)?;
                for (symbol, action) in &row.actions {
                    let symbol = g.symbol_name(*symbol);
                    match action {
                        Action::Shift(n) => writeln!(f, "- {} => shift({:?})", symbol, n)?,
                        Action::Reduce(p) => {
                            writeln!(f, "- {} => reduce({})", symbol, g.production(*p).display(g))?
                        }
                        Action::Accept => writeln!(f, "- {} => accept", symbol)?,
                    }
                }
            }
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
#[non_exhaustive]
pub struct ParseTableRow {
    /// Actions keyed by the lookahead symbol. Shifts over nonterminals are
    /// the goto entries of the table.
    pub actions: Map<SymbolID, Action>,
}

/// The action that the LR automaton in a state performs on a particular
/// lookahead symbol. A missing action means a syntax error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    /// Read a lookahead symbol and transition to the specified state.
    Shift(StateID),

    /// Reduce to the specified production rule.
    Reduce(ProductionID),

    Accept,
}

/// Two completed items competing for the same lookahead symbol.
///
/// The action installed first is kept in the table. Shift/reduce situations
/// are settled by priority and never reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub state: StateID,
    pub symbol: SymbolID,
    pub current: ProductionID,
    pub other: ProductionID,
}

/// Build the action table of every state in `lr0`.
///
/// Completed items reduce on the FOLLOW set of their nonterminal, and the
/// completed start item accepts. A second reduction on an occupied slot is
/// reported as a [`Conflict`] and ignored. Shifts are installed last and
/// override any action whose production has an equal or worse priority rank.
pub fn generate(g: &Grammar, lr0: &LR0Automaton, sets: &SymbolSets) -> (ParseTable, Vec<Conflict>) {
    let span = tracing::trace_span!("parse_table");
    let _entered = span.enter();

    let mut states = Map::default();
    let mut conflicts = vec![];
    for (&id, state) in &lr0.states {
        let row = RowBuilder::new(g, id, &mut conflicts).build(state, sets);
        states.insert(id, row);
    }
    tracing::debug!("{} reduce/reduce conflict(s)", conflicts.len());

    (ParseTable { states }, conflicts)
}

struct RowBuilder<'a> {
    g: &'a Grammar,
    state: StateID,
    actions: Map<SymbolID, Action>,
    // The production that installed each action.
    owners: Map<SymbolID, ProductionID>,
    conflicts: &'a mut Vec<Conflict>,
}

impl<'a> RowBuilder<'a> {
    fn new(g: &'a Grammar, state: StateID, conflicts: &'a mut Vec<Conflict>) -> Self {
        Self {
            g,
            state,
            actions: Map::default(),
            owners: Map::default(),
            conflicts,
        }
    }

    fn build(mut self, state: &LR0State, sets: &SymbolSets) -> ParseTableRow {
        let g = self.g;
        let completed = move || state.items.iter().filter(move |item| item.is_complete(g));

        for item in completed().filter(|item| item.production != ProductionID::ACCEPT) {
            self.install_reduce(item.production, Action::Reduce(item.production), sets);
        }
        for item in completed().filter(|item| item.production == ProductionID::ACCEPT) {
            self.install_reduce(item.production, Action::Accept, sets);
        }

        for item in &state.items {
            let symbol = match item.next_symbol(g) {
                Some(symbol) => symbol,
                None => continue,
            };
            let shift = Action::Shift(state.transitions[&symbol]);
            let take = match self.actions.get(&symbol) {
                None => true,
                Some(action) if *action == shift => true,
                Some(_) => {
                    let owner = self.owners[&symbol];
                    g.priority_rank(owner) >= g.priority_rank(item.production)
                }
            };
            if take {
                self.actions.insert(symbol, shift);
                self.owners.insert(symbol, item.production);
            }
        }

        ParseTableRow {
            actions: self.actions,
        }
    }

    fn install_reduce(&mut self, production: ProductionID, action: Action, sets: &SymbolSets) {
        let left = self.g.production(production).left;
        for t in sets.follow(left).iter() {
            let symbol = SymbolID::T(t);
            match self.owners.get(&symbol) {
                None => {
                    self.actions.insert(symbol, action);
                    self.owners.insert(symbol, production);
                }
                Some(&current) => self.conflicts.push(Conflict {
                    state: self.state,
                    symbol,
                    current,
                    other: production,
                }),
            }
        }
    }
}
