//! The emission-ready result consumed by the parser renderer.

use crate::{
    grammar::{Grammar, NonterminalID, SymbolID},
    reduce::{Handler, ReductionPlans, Thunk},
    table::{Action, ParseTable},
    types::Map,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Artifact {
    pub parser_name: String,
    pub verbose: bool,
    pub header_extras: Vec<String>,
    /// The overall type returned by the parser.
    pub return_type: String,
    /// The field of the stack cell that stores the overall result.
    pub return_field: String,
    /// Nonterminal names in id order, the synthetic start first.
    pub nonterminals: Vec<String>,
    /// Map from result types to field names.
    pub fields: Map<String, String>,
    /// One row per state, ordered by state index.
    pub action_table: Vec<Vec<TableEntry>>,
    pub handlers: Vec<Handler>,
    pub thunks: Vec<Thunk>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableEntry {
    pub symbol: String,
    pub terminal: bool,
    #[serde(flatten)]
    pub action: ActionEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionEntry {
    Shift {
        target: u32,
    },
    Reduce {
        nonterminal: String,
        /// Number of stack cells popped by the reduction.
        arity: usize,
        thunk: String,
    },
    Accept,
}

impl Artifact {
    pub fn new(g: &Grammar, table: &ParseTable, plans: ReductionPlans) -> Self {
        let action_table = table
            .states
            .values()
            .map(|row| {
                let mut entries: Vec<_> = row
                    .actions
                    .iter()
                    .map(|(symbol, action)| TableEntry {
                        symbol: g.symbol_name(*symbol).to_owned(),
                        terminal: matches!(symbol, SymbolID::T(_)),
                        action: match action {
                            Action::Shift(target) => ActionEntry::Shift {
                                target: target.into_raw(),
                            },
                            Action::Reduce(p) => {
                                let production = g.production(*p);
                                ActionEntry::Reduce {
                                    nonterminal: g.nonterminal(production.left).name.clone(),
                                    arity: production.right.len(),
                                    thunk: plans.thunk_name(*p),
                                }
                            }
                            Action::Accept => ActionEntry::Accept,
                        },
                    })
                    .collect();
                entries.sort_by(|e1, e2| e1.symbol.cmp(&e2.symbol));
                entries
            })
            .collect();

        Self {
            parser_name: g.settings.parser_name.clone(),
            verbose: g.settings.verbose,
            header_extras: g.settings.header_extras.clone(),
            return_type: g.return_type().to_owned(),
            return_field: g
                .field_for(NonterminalID::START)
                .unwrap_or_default()
                .to_owned(),
            nonterminals: g.nonterminals.values().map(|n| n.name.clone()).collect(),
            fields: g.fields.clone(),
            action_table,
            handlers: plans.handlers,
            thunks: plans.thunks,
        }
    }

    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}
