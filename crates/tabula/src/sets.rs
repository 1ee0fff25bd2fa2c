//! Calculation of nullable, FIRST and FOLLOW sets.

use crate::{
    grammar::{Grammar, NonterminalID, SymbolID, TerminalID},
    types::{Map, Set, TerminalSet},
};

#[derive(Debug)]
pub struct SymbolSets {
    pub nullables: Set<NonterminalID>,
    pub firsts: Map<NonterminalID, TerminalSet>,
    pub follows: Map<NonterminalID, TerminalSet>,
}

impl SymbolSets {
    pub fn new(g: &Grammar) -> Self {
        let span = tracing::trace_span!("symbol_sets");
        let _entered = span.enter();

        let nullables = nullables(g);
        let firsts = first_sets(g, &nullables);
        let follows = follow_sets(g, &nullables, &firsts);
        Self {
            nullables,
            firsts,
            follows,
        }
    }

    pub fn is_nullable(&self, n: NonterminalID) -> bool {
        self.nullables.contains(&n)
    }

    pub fn first(&self, n: NonterminalID) -> &TerminalSet {
        &self.firsts[&n]
    }

    pub fn follow(&self, n: NonterminalID) -> &TerminalSet {
        &self.follows[&n]
    }
}

/// Calculate the set of nullable nonterminals in this grammar.
pub fn nullables(g: &Grammar) -> Set<NonterminalID> {
    let mut nulls = Set::default();
    saturate_nullables(g, &mut nulls);
    nulls
}

/// Grow `nulls` until no production adds a new nullable nonterminal,
/// returning whether anything was added.
///
/// A production whose right-hand side consists of nullable symbols only
/// makes its nonterminal nullable. Empty productions satisfy this vacuously.
pub fn saturate_nullables(g: &Grammar, nulls: &mut Set<NonterminalID>) -> bool {
    let mut grown = false;
    // 値が更新されなくなるまで繰り返す
    loop {
        let mut changed = false;
        for p in g.productions.values() {
            if nulls.contains(&p.left) {
                continue;
            }
            let is_rhs_nullable = p
                .right
                .iter()
                .all(|s| matches!(s, SymbolID::N(n) if nulls.contains(n)));
            if is_rhs_nullable {
                changed |= nulls.insert(p.left);
            }
        }
        if !changed {
            break;
        }
        grown = true;
    }
    grown
}

/// Calculate FIRST(X) for every nonterminal X.
///
/// For each production `X -> Y1 Y2 ... Yn`, the symbols are scanned from the
/// left. A terminal is added to FIRST(X) and stops the scan, a nonterminal
/// contributes its own FIRST set and lets the scan continue only when it is
/// nullable.
pub fn first_sets(g: &Grammar, nulls: &Set<NonterminalID>) -> Map<NonterminalID, TerminalSet> {
    let mut firsts: Map<NonterminalID, TerminalSet> = g
        .nonterminals
        .keys()
        .map(|n| (*n, TerminalSet::default()))
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for p in g.productions.values() {
            for symbol in &p.right {
                match symbol {
                    SymbolID::T(t) => {
                        changed |= firsts[&p.left].insert(*t);
                        break;
                    }
                    SymbolID::N(n) => {
                        if *n != p.left {
                            let sub = firsts[n].clone();
                            changed |= firsts[&p.left].union_with(&sub);
                        }
                        if !nulls.contains(n) {
                            break;
                        }
                    }
                }
            }
        }
    }

    firsts
}

/// Calculate FOLLOW(X) for every nonterminal X.
///
/// 1. `SCAN_EOF` is in FOLLOW(start).
/// 2. If `S -> a A t w` where `a` is anything and `t` is a terminal reached
///    through nullable symbols only, then `t` is in FOLLOW(A).
/// 3. If `S -> a A x B w` where `x` is nullable, FIRST(B) is in FOLLOW(A).
/// 4. If `S -> a A w` where `w` is nullable, FOLLOW(S) is in FOLLOW(A).
pub fn follow_sets(
    g: &Grammar,
    nulls: &Set<NonterminalID>,
    firsts: &Map<NonterminalID, TerminalSet>,
) -> Map<NonterminalID, TerminalSet> {
    let mut follows: Map<NonterminalID, TerminalSet> = g
        .nonterminals
        .keys()
        .map(|n| (*n, TerminalSet::default()))
        .collect();
    follows[&NonterminalID::START].insert(TerminalID::EOI);

    let mut changed = true;
    while changed {
        changed = false;
        for p in g.productions.values() {
            for (i, symbol) in p.right.iter().enumerate() {
                let a = match symbol {
                    SymbolID::N(a) => *a,
                    SymbolID::T(_) => continue,
                };

                let mut nullable_to_end = true;
                for next in &p.right[i + 1..] {
                    match next {
                        SymbolID::T(t) => {
                            changed |= follows[&a].insert(*t);
                            nullable_to_end = false;
                            break;
                        }
                        SymbolID::N(b) => {
                            changed |= follows[&a].union_with(&firsts[b]);
                            if !nulls.contains(b) {
                                nullable_to_end = false;
                                break;
                            }
                        }
                    }
                }

                if nullable_to_end && a != p.left {
                    let sup = follows[&p.left].clone();
                    changed |= follows[&a].union_with(&sup);
                }
            }
        }
    }

    follows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::EOI_NAME;

    fn names(g: &Grammar, set: &TerminalSet) -> Vec<String> {
        let mut names: Vec<_> = set
            .iter()
            .map(|t| g.terminals[&t].name.clone())
            .collect();
        names.sort();
        names
    }

    fn nonterminal(g: &Grammar, name: &str) -> NonterminalID {
        match g.symbol(name) {
            Some(SymbolID::N(n)) => n,
            _ => panic!("not a nonterminal: {}", name),
        }
    }

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

    #[test]
    fn expression_sets() {
        let g = expr_grammar();
        let sets = SymbolSets::new(&g);

        assert!(sets.nullables.is_empty());
        for name in ["S", "E", "T"] {
            assert_eq!(names(&g, sets.first(nonterminal(&g, name))), ["id"]);
        }
        assert_eq!(names(&g, sets.follow(nonterminal(&g, "S"))), [EOI_NAME]);
        assert_eq!(
            names(&g, sets.follow(nonterminal(&g, "E"))),
            ["+", EOI_NAME]
        );
        assert_eq!(
            names(&g, sets.follow(nonterminal(&g, "T"))),
            ["+", EOI_NAME]
        );
        assert_eq!(names(&g, sets.follow(NonterminalID::START)), [EOI_NAME]);
    }

    fn nullable_grammar() -> Grammar {
        // A -> B C 'x' | 'y'
        // B -> 'b' | <empty>
        // C -> D D
        // D -> 'd' | <empty>
        Grammar::define(|g| {
            g.rule("A", ["B", "C", "x"], "")?;
            g.rule("A", ["y"], "")?;
            g.rule("B", ["b"], "")?;
            g.rule("B", Vec::<String>::new(), "")?;
            g.rule("C", ["D", "D"], "")?;
            g.rule("D", ["d"], "")?;
            g.rule("D", Vec::<String>::new(), "")?;
            g.result_type("A", "int");
            g.start_symbol("A")
        })
        .unwrap()
    }

    #[test]
    fn nullable_chains() {
        let g = nullable_grammar();
        let sets = SymbolSets::new(&g);

        let mut nullable: Vec<_> = sets
            .nullables
            .iter()
            .map(|n| g.nonterminal(*n).name.as_str())
            .collect();
        nullable.sort();
        assert_eq!(nullable, ["B", "C", "D"]);

        assert_eq!(names(&g, sets.first(nonterminal(&g, "A"))), ["b", "d", "x", "y"]);
        assert_eq!(names(&g, sets.first(nonterminal(&g, "C"))), ["d"]);
        assert_eq!(names(&g, sets.follow(nonterminal(&g, "B"))), ["d", "x"]);
        assert_eq!(names(&g, sets.follow(nonterminal(&g, "C"))), ["x"]);
        assert_eq!(names(&g, sets.follow(nonterminal(&g, "D"))), ["d", "x"]);
    }

    #[test]
    fn nullables_are_idempotent() {
        let g = nullable_grammar();
        let mut nulls = nullables(&g);
        let before = nulls.clone();
        assert!(!saturate_nullables(&g, &mut nulls));
        assert_eq!(nulls, before);
    }

    #[test]
    fn first_sets_only_contain_terminals() {
        let g = nullable_grammar();
        let sets = SymbolSets::new(&g);
        for first in sets.firsts.values() {
            for t in first.iter() {
                assert!(matches!(
                    g.symbol(&g.terminals[&t].name),
                    Some(SymbolID::T(_))
                ));
            }
        }
    }

    #[test]
    fn follow_propagates_through_nullable_suffix() {
        // S -> A B ; A -> 'a' ; B -> <empty> | 'b'
        let g = Grammar::define(|g| {
            g.rule("S", ["A", "B"], "")?;
            g.rule("A", ["a"], "")?;
            g.rule("B", Vec::<String>::new(), "")?;
            g.rule("B", ["b"], "")?;
            g.result_type("S", "int");
            g.start_symbol("S")
        })
        .unwrap();
        let sets = SymbolSets::new(&g);
        assert_eq!(
            names(&g, sets.follow(nonterminal(&g, "A"))),
            [EOI_NAME, "b"]
        );
        assert_eq!(names(&g, sets.follow(nonterminal(&g, "B"))), [EOI_NAME]);
    }
}
