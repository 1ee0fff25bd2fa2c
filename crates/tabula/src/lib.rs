//! SLR(1) parse table generation with priority-based conflict resolution.

pub mod artifact;
pub mod diagnostics;
pub mod grammar;
pub mod input;
pub mod lr0;
pub mod reduce;
pub mod sets;
pub mod table;
pub mod types;
pub mod util;

use crate::{
    artifact::Artifact, diagnostics::Diagnostics, grammar::Grammar, lr0::LR0Automaton,
    reduce::ReductionPlans, sets::SymbolSets, table::ParseTable,
};

/// Everything computed from a grammar.
#[derive(Debug)]
pub struct Generated {
    pub automaton: LR0Automaton,
    pub table: ParseTable,
    pub artifact: Artifact,
    pub diagnostics: Diagnostics,
}

/// Run the whole pipeline on a validated grammar.
pub fn generate(g: &Grammar) -> Generated {
    let span = tracing::debug_span!("generate");
    let _entered = span.enter();

    let sets = SymbolSets::new(g);
    let automaton = lr0::lr0(g);
    let (table, conflicts) = table::generate(g, &automaton, &sets);
    let plans = ReductionPlans::new(g, &automaton);

    let diagnostics = Diagnostics::new(g, &sets, &automaton, &conflicts);
    let artifact = Artifact::new(g, &table, plans);

    Generated {
        automaton,
        table,
        artifact,
        diagnostics,
    }
}
