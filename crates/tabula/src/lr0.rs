//! Construction of the canonical collection of LR(0) item sets.

use crate::{
    grammar::{Grammar, ProductionID, SymbolID},
    types::{Map, Set},
    util::display_fn,
};
use std::{cmp::Ordering, fmt};

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateID(u32);
impl fmt::Debug for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S#{:03}", self.0)
    }
}
impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
impl StateID {
    pub const START: Self = Self(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn into_raw(self) -> u32 {
        self.0
    }
}

/// The LR(0) item, a production with a marker.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct LR0Item {
    pub production: ProductionID,
    pub index: u16,
}

impl LR0Item {
    pub const fn new(production: ProductionID) -> Self {
        Self {
            production,
            index: 0,
        }
    }

    /// The symbol right after the marker, if any.
    pub fn next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.production(self.production)
            .right
            .get(usize::from(self.index))
            .copied()
    }

    pub fn is_complete(&self, g: &Grammar) -> bool {
        usize::from(self.index) >= g.production(self.production).right.len()
    }

    pub fn advance(self) -> Self {
        Self {
            index: self.index + 1,
            ..self
        }
    }

    /// Compare items by nonterminal name, right-hand side names and marker.
    pub fn canonical_cmp(&self, other: &Self, g: &Grammar) -> Ordering {
        let p1 = g.production(self.production);
        let p2 = g.production(other.production);
        g.nonterminal(p1.left)
            .name
            .cmp(&g.nonterminal(p2.left).name)
            .then_with(|| {
                let r1 = p1.right.iter().map(|s| g.symbol_name(*s));
                let r2 = p2.right.iter().map(|s| g.symbol_name(*s));
                r1.cmp(r2)
            })
            .then_with(|| self.index.cmp(&other.index))
    }

    // `"E -> E . + T"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            let production = g.production(self.production);
            write!(f, "{} ->", g.nonterminals[&production.left])?;
            for (i, symbol) in production.right.iter().enumerate() {
                if i == usize::from(self.index) {
                    f.write_str(" .")?;
                }
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            if production.right.len() == usize::from(self.index) {
                f.write_str(" .")?;
            }
            Ok(())
        })
    }
}

/// A closed LR(0) item set, sorted in canonical order.
///
/// The sorted item list doubles as the interning key of the state.
pub type ItemSet = Vec<LR0Item>;

#[derive(Debug, Clone)]
pub struct LR0State {
    pub items: ItemSet,
    pub transitions: Map<SymbolID, StateID>,
}

impl LR0State {
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            writeln!(f, "## items:")?;
            for item in &self.items {
                writeln!(f, "- {}", item.display(g))?;
            }
            if !self.transitions.is_empty() {
                writeln!(f, "## transitions:")?;
                for (symbol, to) in &self.transitions {
                    writeln!(f, "- {} => {:?}", g.symbol_name(*symbol), to)?;
                }
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
pub struct LR0Automaton {
    pub states: Map<StateID, LR0State>,
}

impl LR0Automaton {
    pub fn state(&self, id: StateID) -> &LR0State {
        &self.states[&id]
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            for (i, (id, state)) in self.states.iter().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {:?}", id)?;
                write!(f, "{}", state.display(g))?;
            }
            Ok(())
        })
    }
}

/// Calculate the closure of the specified kernel items.
///
/// Every item whose marker stands before a nonterminal `N` pulls in all
/// productions of `N` with the marker at the beginning. Items already in the
/// set are not expanded again.
pub fn closure<I>(g: &Grammar, kernels: I) -> ItemSet
where
    I: IntoIterator<Item = LR0Item>,
{
    let mut items = Set::default();
    let mut pending: Vec<LR0Item> = kernels.into_iter().collect();
    while let Some(item) = pending.pop() {
        if !items.insert(item) {
            continue;
        }
        if let Some(SymbolID::N(n)) = item.next_symbol(g) {
            for &production in &g.nonterminal(n).productions {
                let new_item = LR0Item::new(production);
                if !items.contains(&new_item) {
                    pending.push(new_item);
                }
            }
        }
    }

    let mut items: ItemSet = items.into_iter().collect();
    items.sort_by(|a, b| a.canonical_cmp(b, g));
    items
}

/// Calculate the item set reached from `items` by moving over `symbol`.
///
/// The result is empty if no item in `items` expects `symbol`.
pub fn goto(g: &Grammar, items: &[LR0Item], symbol: SymbolID) -> ItemSet {
    closure(
        g,
        items
            .iter()
            .filter(|item| item.next_symbol(g) == Some(symbol))
            .map(|item| item.advance()),
    )
}

/// All non-empty successors of `items`, ordered by the name of the symbol.
fn successors(g: &Grammar, items: &[LR0Item]) -> Vec<(SymbolID, ItemSet)> {
    let mut kernels = Map::<SymbolID, Vec<LR0Item>>::default();
    for item in items {
        if let Some(symbol) = item.next_symbol(g) {
            kernels.entry(symbol).or_default().push(item.advance());
        }
    }
    kernels.sort_by(|s1, _, s2, _| g.symbol_name(*s1).cmp(g.symbol_name(*s2)));
    kernels
        .into_iter()
        .map(|(symbol, kernels)| (symbol, closure(g, kernels)))
        .collect()
}

/// Calculate the LR(0) automaton based on the specified grammar.
///
/// States are discovered depth-first, starting from the closure of the
/// synthetic start item. A state receives its index the first time its item
/// set is taken from the stack, so the numbering only depends on the grammar.
pub fn lr0(g: &Grammar) -> LR0Automaton {
    let span = tracing::trace_span!("lr0");
    let _entered = span.enter();

    let mut ids = Map::<ItemSet, StateID>::default();
    let mut discovered = Vec::<(ItemSet, Vec<(SymbolID, ItemSet)>)>::new();

    let mut pending = vec![closure(g, Some(LR0Item::new(ProductionID::ACCEPT)))];
    while let Some(items) = pending.pop() {
        if ids.contains_key(&items) {
            continue;
        }
        ids.insert(items.clone(), StateID(ids.len() as u32));

        let next = successors(g, &items);
        pending.extend(next.iter().map(|(_, items)| items.clone()));
        discovered.push((items, next));
    }

    let mut states = Map::default();
    for (i, (items, next)) in discovered.into_iter().enumerate() {
        let transitions = next
            .into_iter()
            .map(|(symbol, target)| (symbol, ids[&target]))
            .collect();
        states.insert(StateID(i as u32), LR0State { items, transitions });
    }
    tracing::debug!("LR(0) automaton has {} states", states.len());

    LR0Automaton { states }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::NonterminalID;

    fn expr_grammar() -> Grammar {
        Grammar::define(|g| {
            g.rule("S", ["E"], "$$ = $1;")?;
            g.rule("E", ["E", "+", "T"], "$$ = $1 + $3;")?;
            g.rule("E", ["T"], "$$ = $1;")?;
            g.rule("T", ["id"], "$$ = 0;")?;
            g.result_type("S", "int");
            g.priority("+");
            g.start_symbol("S")
        })
        .unwrap()
    }

    fn rendered(g: &Grammar, items: &[LR0Item]) -> Vec<String> {
        items.iter().map(|item| item.display(g).to_string()).collect()
    }

    fn sym(g: &Grammar, name: &str) -> SymbolID {
        g.symbol(name).unwrap()
    }

    #[test]
    fn closure_of_start_item() {
        let g = expr_grammar();
        let items = closure(&g, Some(LR0Item::new(ProductionID::ACCEPT)));
        assert_eq!(
            rendered(&g, &items),
            [
                "E -> . E + T",
                "E -> . T",
                "S -> . E",
                "T -> . id",
                "_parserInternalStart -> . S",
            ]
        );
    }

    #[test]
    fn state_zero_is_start_closure() {
        let g = expr_grammar();
        let lr0 = lr0(&g);
        let start = closure(&g, Some(LR0Item::new(ProductionID::ACCEPT)));
        assert_eq!(lr0.state(StateID::START).items, start);
    }

    #[test]
    fn goto_over_terminal_completes_production() {
        let g = expr_grammar();
        let lr0 = lr0(&g);
        let start = lr0.state(StateID::START);

        let target = start.transitions[&sym(&g, "id")];
        assert_eq!(rendered(&g, &lr0.state(target).items), ["T -> id ."]);
        assert!(lr0.state(target).items[0].is_complete(&g));
    }

    #[test]
    fn goto_is_deterministic() {
        let g = expr_grammar();
        let start = closure(&g, Some(LR0Item::new(ProductionID::ACCEPT)));
        let e = sym(&g, "E");
        let first = goto(&g, &start, e);
        let second = goto(&g, &start, e);
        assert_eq!(first, second);
        assert_eq!(rendered(&g, &first), ["E -> E . + T", "S -> E ."]);
        assert!(goto(&g, &start, sym(&g, "+")).is_empty());
    }

    #[test]
    fn identical_item_sets_share_a_state() {
        let g = expr_grammar();
        let lr0 = lr0(&g);

        let mut seen = Set::default();
        for state in lr0.states.values() {
            assert!(seen.insert(state.items.clone()), "duplicate state");
        }

        // `T -> id .` is reached both from the start state and after `E +`.
        let id = sym(&g, "id");
        let from_start = lr0.state(StateID::START).transitions[&id];
        let after_e = lr0.state(StateID::START).transitions[&sym(&g, "E")];
        let after_plus = lr0.state(after_e).transitions[&sym(&g, "+")];
        assert_eq!(lr0.state(after_plus).transitions[&id], from_start);
    }

    #[test]
    fn numbering_is_reproducible() {
        let g = expr_grammar();
        let a = lr0(&g);
        let b = lr0(&g);
        assert_eq!(a.states.len(), b.states.len());
        for (id, state) in &a.states {
            assert_eq!(state.items, b.state(*id).items);
            assert_eq!(state.transitions, b.state(*id).transitions);
        }
        // 0: start, 1..: depth first in reverse name order of the symbols.
        assert_eq!(a.states.len(), 7);
        let last_pushed = a.state(StateID::START).transitions[&sym(&g, "id")];
        assert_eq!(last_pushed, StateID::from_raw(1));
    }

    #[test]
    fn longest_production_builds() {
        let len = usize::from(u16::MAX);
        let g = Grammar::define(|g| {
            g.rule("S", vec!["x"; len], "")?;
            g.result_type("S", "int");
            g.start_symbol("S")
        })
        .unwrap();
        let lr0 = lr0(&g);
        // start, accept and one state per shifted `x`.
        assert_eq!(lr0.states.len(), len + 2);
        assert!(lr0
            .states
            .values()
            .any(|state| state.items.iter().any(|item| item.index == u16::MAX)));
    }

    #[test]
    fn start_item_is_only_in_state_zero() {
        let g = expr_grammar();
        let lr0 = lr0(&g);
        for (id, state) in &lr0.states {
            let has_start = state
                .items
                .iter()
                .any(|item| g.production(item.production).left == NonterminalID::START);
            let expected = *id == StateID::START
                || state.items.iter().any(|item| {
                    item.production == ProductionID::ACCEPT && item.is_complete(&g)
                });
            assert_eq!(has_start, expected);
        }
    }
}
