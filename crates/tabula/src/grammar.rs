//! Grammar types.

use crate::{
    input::GrammarInput,
    types::Map,
    util::display_fn,
};
use std::{collections::BTreeSet, fmt, fs, io, path::Path};

/// Name of the synthetic nonterminal that wraps the declared start symbol.
pub const START_SYMBOL_NAME: &str = "_parserInternalStart";

/// Name of the terminal that marks the end of input.
pub const EOI_NAME: &str = "SCAN_EOF";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}

impl TerminalID {
    /// Reserved symbol used as a terminal symbol that means the end of input.
    pub const EOI: Self = Self::from_raw(0);

    const OFFSET: u16 = 1;

    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn into_raw(self) -> u16 {
        self.raw
    }
}

#[derive(Debug)]
pub struct Terminal {
    pub id: TerminalID,
    pub name: String,
    /// Position of this terminal in the priority list, if listed.
    pub priority: Option<usize>,
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}

impl NonterminalID {
    pub const START: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    pub id: NonterminalID,
    pub name: String,
    /// The type of the semantic value carried by this nonterminal.
    pub result_type: Option<String>,
    /// Productions owned by this nonterminal, in declaration order.
    pub productions: Vec<ProductionID>,
}

impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ProductionID {
    raw: u16,
}

impl ProductionID {
    /// The synthetic production `_parserInternalStart -> start`.
    pub const ACCEPT: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

/// The type that represents a production rule in grammar.
#[derive(Debug)]
pub struct Production {
    pub id: ProductionID,
    pub left: NonterminalID,
    pub right: Vec<SymbolID>,
    /// The semantic action, written with `$$`/`$1`..`$n` placeholders.
    pub action: String,
}

impl Production {
    // `"LHS -> R1 R2 R3"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(|f| {
            write!(f, "{} ->", g.nonterminals[&self.left])?;
            for symbol in &self.right {
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            Ok(())
        })
    }
}

/// Values echoed verbatim to the renderer.
#[derive(Debug, Default, Clone)]
pub struct Settings {
    pub header_extras: Vec<String>,
    pub verbose: bool,
    pub parser_name: String,
}

/// The grammar definition used to derive the parser tables.
#[derive(Debug)]
#[non_exhaustive]
pub struct Grammar {
    pub terminals: Map<TerminalID, Terminal>,
    pub nonterminals: Map<NonterminalID, Nonterminal>,
    pub productions: Map<ProductionID, Production>,
    pub start_symbol: NonterminalID,
    /// Terminal names, highest precedence first.
    pub priorities: Vec<String>,
    /// Map from result types to the name of the field that stores them.
    pub fields: Map<String, String>,
    pub settings: Settings,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in self.terminals.values() {
            write!(f, "{}", terminal)?;
            if let Some(priority) = terminal.priority {
                write!(f, " (priority={})", priority)?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.nonterminals.values() {
            write!(f, "{}", nonterminal)?;
            if let Some(ty) = &nonterminal.result_type {
                write!(f, ": {}", ty)?;
            }
            if nonterminal.id == self.start_symbol {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## productions:")?;
        for production in self.productions.values() {
            writeln!(f, "{}", production.display(self))?;
        }

        if !self.fields.is_empty() {
            writeln!(f, "\n## fields:")?;
            for (ty, field) in &self.fields {
                writeln!(f, "{} {}", ty, field)?;
            }
        }

        Ok(())
    }
}

impl Grammar {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Grammar, ConfigError> {
        let source = fs::read_to_string(path).map_err(ConfigError::IO)?;
        Self::from_str(&source)
    }

    pub fn from_str(source: &str) -> Result<Grammar, ConfigError> {
        let input: GrammarInput = serde_json::from_str(source).map_err(ConfigError::Syntax)?;
        Self::from_input(input)
    }

    /// Build a grammar from an already decoded grammar record.
    pub fn from_input(input: GrammarInput) -> Result<Grammar, ConfigError> {
        Grammar::define(|g| input.define(g))
    }

    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), ConfigError>,
    {
        let mut def = GrammarDef::default();
        f(&mut def)?;
        def.end()
    }

    pub fn production(&self, id: ProductionID) -> &Production {
        &self.productions[&id]
    }

    pub fn nonterminal(&self, id: NonterminalID) -> &Nonterminal {
        &self.nonterminals[&id]
    }

    pub fn symbol_name(&self, symbol: SymbolID) -> &str {
        match symbol {
            SymbolID::T(t) => &self.terminals[&t].name,
            SymbolID::N(n) => &self.nonterminals[&n].name,
        }
    }

    /// Look up a symbol by name. Names found in the nonterminal key set are
    /// nonterminals, anything else is a terminal.
    pub fn symbol(&self, name: &str) -> Option<SymbolID> {
        if let Some(n) = self.nonterminals.values().find(|n| n.name == name) {
            return Some(SymbolID::N(n.id));
        }
        self.terminals
            .values()
            .find(|t| t.name == name)
            .map(|t| SymbolID::T(t.id))
    }

    /// The overall type returned by the generated parser.
    pub fn return_type(&self) -> &str {
        self.nonterminal(NonterminalID::START)
            .result_type
            .as_deref()
            .unwrap_or_default()
    }

    /// The name of the field storing the semantic value of `n`.
    pub fn field_for(&self, n: NonterminalID) -> Option<&str> {
        let ty = self.nonterminal(n).result_type.as_ref()?;
        self.fields.get(ty).map(String::as_str)
    }

    /// The priority rank of a production: the position in the priority list
    /// of the leftmost right-hand side terminal that has one. Productions
    /// without a ranked terminal get the worst rank, the length of the list.
    pub fn priority_rank(&self, id: ProductionID) -> usize {
        self.production(id)
            .right
            .iter()
            .find_map(|symbol| match symbol {
                SymbolID::T(t) => self.terminals[t].priority,
                SymbolID::N(_) => None,
            })
            .unwrap_or(self.priorities.len())
    }
}

/// The contextural values for building a `Grammar`.
#[derive(Debug, Default)]
pub struct GrammarDef {
    rules: Map<String, Vec<RuleDef>>,
    result_types: Map<String, String>,
    priorities: Vec<String>,
    start: Option<String>,
    settings: Settings,
}

#[derive(Debug)]
struct RuleDef {
    right: Vec<String>,
    action: String,
}

impl GrammarDef {
    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, name: &str) -> Result<(), ConfigError> {
        if name == START_SYMBOL_NAME {
            return Err(ConfigError::ReservedName {
                name: name.to_owned(),
            });
        }
        self.rules.entry(name.to_owned()).or_default();
        Ok(())
    }

    /// Specify a production rule into this grammar.
    pub fn rule<I>(&mut self, left: &str, right: I, action: &str) -> Result<(), ConfigError>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.nonterminal(left)?;
        let rule = RuleDef {
            right: right.into_iter().map(Into::into).collect(),
            action: action.to_owned(),
        };
        if let Some(rules) = self.rules.get_mut(left) {
            rules.push(rule);
        }
        Ok(())
    }

    /// Associate a result type with a nonterminal.
    pub fn result_type(&mut self, nonterminal: &str, ty: &str) {
        self.result_types.insert(nonterminal.to_owned(), ty.to_owned());
    }

    /// Append a terminal to the priority list. Earlier calls take precedence.
    pub fn priority(&mut self, terminal: &str) {
        self.priorities.push(terminal.to_owned());
    }

    /// Specify the start symbol for this grammar.
    pub fn start_symbol(&mut self, name: &str) -> Result<(), ConfigError> {
        if name == START_SYMBOL_NAME {
            return Err(ConfigError::ReservedName {
                name: name.to_owned(),
            });
        }
        self.start.replace(name.to_owned());
        Ok(())
    }

    pub fn header_extra(&mut self, line: &str) {
        self.settings.header_extras.push(line.to_owned());
    }

    pub fn verbose(&mut self, verbose: bool) {
        self.settings.verbose = verbose;
    }

    pub fn parser_name(&mut self, name: &str) {
        self.settings.parser_name = name.to_owned();
    }

    fn end(mut self) -> Result<Grammar, ConfigError> {
        // 指定されていない場合は最初に登録されたnonterminal symbolを用いる
        let start_name = match self.start.take() {
            Some(start) => start,
            None => self
                .rules
                .keys()
                .next()
                .cloned()
                .ok_or_else(|| ConfigError::from("empty nonterminal symbols"))?,
        };
        if self.rules.get(&start_name).map_or(true, Vec::is_empty) {
            return Err(ConfigError::MissingStartRules { name: start_name });
        }
        let start_type = match self.result_types.get(&start_name) {
            Some(ty) => ty.clone(),
            None => return Err(ConfigError::MissingStartType { name: start_name }),
        };

        let mut nonterminals = Map::default();
        let mut nonterminal_ids = Map::<&str, NonterminalID>::default();
        nonterminals.insert(
            NonterminalID::START,
            Nonterminal {
                id: NonterminalID::START,
                name: START_SYMBOL_NAME.to_owned(),
                result_type: Some(start_type),
                productions: vec![ProductionID::ACCEPT],
            },
        );
        nonterminal_ids.insert(START_SYMBOL_NAME, NonterminalID::START);
        for (i, name) in self.rules.keys().enumerate() {
            let id = NonterminalID::new(to_raw(i, NonterminalID::OFFSET, "nonterminals")?);
            nonterminals.insert(
                id,
                Nonterminal {
                    id,
                    name: name.clone(),
                    result_type: self.result_types.get(name).cloned(),
                    productions: vec![],
                },
            );
            nonterminal_ids.insert(name.as_str(), id);
        }

        // Every name that is not a nonterminal is a terminal.
        let terminal_names: BTreeSet<&str> = self
            .rules
            .values()
            .flatten()
            .flat_map(|rule| rule.right.iter().map(String::as_str))
            .filter(|name| !nonterminal_ids.contains_key(name) && *name != EOI_NAME)
            .collect();
        let mut terminals = Map::default();
        let mut terminal_ids = Map::<&str, TerminalID>::default();
        terminals.insert(
            TerminalID::EOI,
            Terminal {
                id: TerminalID::EOI,
                name: EOI_NAME.to_owned(),
                priority: self.priorities.iter().position(|p| p == EOI_NAME),
            },
        );
        terminal_ids.insert(EOI_NAME, TerminalID::EOI);
        for (i, name) in terminal_names.into_iter().enumerate() {
            let id = TerminalID::from_raw(to_raw(i, TerminalID::OFFSET, "terminals")?);
            terminals.insert(
                id,
                Terminal {
                    id,
                    name: name.to_owned(),
                    priority: self.priorities.iter().position(|p| p == name),
                },
            );
            terminal_ids.insert(name, id);
        }

        let resolve = |name: &str| match nonterminal_ids.get(name) {
            Some(n) => SymbolID::N(*n),
            None => SymbolID::T(terminal_ids[name]),
        };

        let start_symbol = nonterminal_ids[start_name.as_str()];
        let mut productions = Map::default();
        productions.insert(
            ProductionID::ACCEPT,
            Production {
                id: ProductionID::ACCEPT,
                left: NonterminalID::START,
                right: vec![SymbolID::N(start_symbol)],
                action: String::new(),
            },
        );
        for (name, rules) in &self.rules {
            let left = nonterminal_ids[name.as_str()];
            for rule in rules {
                // the marker position of an item is a u16.
                if rule.right.len() > usize::from(u16::MAX) {
                    return Err(format!(
                        "a production of `{}' has too many symbols ({})",
                        name,
                        rule.right.len()
                    )
                    .into());
                }
                let right: Vec<_> = rule.right.iter().map(|s| resolve(s)).collect();
                let owned = &nonterminals[&left].productions;
                if owned
                    .iter()
                    .any(|id: &ProductionID| productions[id].right == right)
                {
                    tracing::warn!(
                        "duplicate production `{} -> {}' collapses into its first occurrence",
                        name,
                        rule.right.join(" ")
                    );
                    continue;
                }
                let raw = to_raw(productions.len() - 1, ProductionID::OFFSET, "productions")?;
                let id = ProductionID::new(raw);
                productions.insert(
                    id,
                    Production {
                        id,
                        left,
                        right,
                        action: rule.action.clone(),
                    },
                );
                nonterminals[&left].productions.push(id);
            }
        }

        let mut fields = Map::default();
        for ty in self.result_types.values() {
            if !fields.contains_key(ty) {
                let field = format!("field{}", fields.len());
                fields.insert(ty.clone(), field);
            }
        }

        Ok(Grammar {
            terminals,
            nonterminals,
            productions,
            start_symbol,
            priorities: self.priorities,
            fields,
            settings: self.settings,
        })
    }
}

fn to_raw(index: usize, offset: u16, what: &str) -> Result<u16, ConfigError> {
    u16::try_from(index)
        .ok()
        .and_then(|raw| raw.checked_add(offset))
        .ok_or_else(|| format!("too many {} in the grammar", what).into())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {}", _0)]
    IO(io::Error),

    #[error("Syntax error: {}", _0)]
    Syntax(serde_json::Error),

    #[error("the nonterminal name `{}' is reserved", name)]
    ReservedName { name: String },

    #[error("the start symbol `{}' has no productions", name)]
    MissingStartRules { name: String },

    #[error("no type associated with the start symbol `{}'", name)]
    MissingStartType { name: String },

    #[error("Other error: {}", msg)]
    Other { msg: String },
}
impl From<&str> for ConfigError {
    fn from(msg: &str) -> Self {
        Self::Other { msg: msg.into() }
    }
}
impl From<String> for ConfigError {
    fn from(msg: String) -> Self {
        Self::Other { msg }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr_grammar() -> Grammar {
        Grammar::define(|g| {
            g.rule("S", ["E"], "$$ = $1;")?;
            g.rule("E", ["E", "+", "T"], "$$ = $1 + $3;")?;
            g.rule("E", ["T"], "$$ = $1;")?;
            g.rule("T", ["id"], "$$ = std::stoi($1);")?;
            g.result_type("S", "int");
            g.result_type("E", "int");
            g.result_type("T", "int");
            g.priority("+");
            g.start_symbol("S")?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn classifies_symbols_by_nonterminal_membership() {
        let g = expr_grammar();
        assert!(matches!(g.symbol("E"), Some(SymbolID::N(_))));
        assert!(matches!(g.symbol("T"), Some(SymbolID::N(_))));
        assert!(matches!(g.symbol("+"), Some(SymbolID::T(_))));
        assert!(matches!(g.symbol("id"), Some(SymbolID::T(_))));
        assert_eq!(g.symbol(EOI_NAME), Some(SymbolID::T(TerminalID::EOI)));
        assert_eq!(g.symbol("nothing"), None);
    }

    #[test]
    fn synthesizes_start_production() {
        let g = expr_grammar();
        let accept = g.production(ProductionID::ACCEPT);
        assert_eq!(accept.left, NonterminalID::START);
        assert_eq!(accept.right, vec![SymbolID::N(g.start_symbol)]);
        assert_eq!(g.nonterminal(g.start_symbol).name, "S");
        assert_eq!(g.return_type(), "int");
        assert_eq!(g.field_for(NonterminalID::START), Some("field0"));
    }

    #[test]
    fn assigns_fields_in_first_seen_order() {
        let g = Grammar::define(|g| {
            g.rule("A", ["B", "x"], "$$ = $1;")?;
            g.rule("B", ["y"], "")?;
            g.rule("C", ["z"], "")?;
            g.result_type("A", "Expr*");
            g.result_type("B", "std::string");
            g.result_type("C", "Expr*");
            g.start_symbol("A")
        })
        .unwrap();
        let fields: Vec<_> = g
            .fields
            .iter()
            .map(|(ty, field)| (ty.as_str(), field.as_str()))
            .collect();
        assert_eq!(fields, [("Expr*", "field0"), ("std::string", "field1")]);
    }

    #[test]
    fn rejects_reserved_name() {
        let err = Grammar::define(|g| {
            g.rule(START_SYMBOL_NAME, ["x"], "")?;
            g.result_type(START_SYMBOL_NAME, "int");
            g.start_symbol(START_SYMBOL_NAME)
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ReservedName { .. }));
    }

    #[test]
    fn rejects_reserved_start_symbol() {
        let err = Grammar::define(|g| {
            g.rule("A", ["x"], "")?;
            g.result_type("A", "int");
            g.start_symbol(START_SYMBOL_NAME)
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::ReservedName { ref name } if name == START_SYMBOL_NAME));
    }

    #[test]
    fn rejects_overlong_production() {
        let err = Grammar::define(|g| {
            g.rule("S", vec!["x"; usize::from(u16::MAX) + 1], "")?;
            g.result_type("S", "int");
            g.start_symbol("S")
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Other { .. }));

        // the longest accepted right-hand side still builds.
        let g = Grammar::define(|g| {
            g.rule("S", vec!["x"; usize::from(u16::MAX)], "")?;
            g.result_type("S", "int");
            g.start_symbol("S")
        })
        .unwrap();
        let s = g.nonterminal(g.start_symbol);
        assert_eq!(g.production(s.productions[0]).right.len(), 65535);
    }

    #[test]
    fn missing_input_file_is_an_io_error() {
        let err = Grammar::from_file("tests/no-such-grammar.json").unwrap_err();
        assert!(matches!(err, ConfigError::IO(..)));
    }

    #[test]
    fn rejects_start_without_productions() {
        let err = Grammar::define(|g| {
            g.rule("A", ["x"], "")?;
            g.result_type("B", "int");
            g.start_symbol("B")
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingStartRules { ref name } if name == "B"));

        let err = Grammar::define(|g| {
            g.nonterminal("A")?;
            g.result_type("A", "int");
            g.start_symbol("A")
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingStartRules { .. }));
    }

    #[test]
    fn rejects_start_without_type() {
        let err = Grammar::define(|g| {
            g.rule("A", ["x"], "")?;
            g.start_symbol("A")
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingStartType { ref name } if name == "A"));
    }

    #[test]
    fn collapses_duplicate_productions() {
        let g = Grammar::define(|g| {
            g.rule("A", ["x"], "first")?;
            g.rule("A", ["x"], "second")?;
            g.result_type("A", "int");
            g.start_symbol("A")
        })
        .unwrap();
        let a = g.nonterminal(g.start_symbol);
        assert_eq!(a.productions.len(), 1);
        assert_eq!(g.production(a.productions[0]).action, "first");
    }

    #[test]
    fn priority_rank_uses_leftmost_ranked_terminal() {
        let g = Grammar::define(|g| {
            g.rule("E", ["E", "+", "E"], "")?;
            g.rule("E", ["E", "*", "E"], "")?;
            g.rule("E", ["(", "E", "-", "E", ")"], "")?;
            g.rule("E", ["num"], "")?;
            g.result_type("E", "int");
            g.priority("*");
            g.priority("+");
            g.priority("-");
            g.start_symbol("E")
        })
        .unwrap();
        let ranks: Vec<_> = g
            .nonterminal(g.start_symbol)
            .productions
            .iter()
            .map(|p| g.priority_rank(*p))
            .collect();
        assert_eq!(ranks, [1, 0, 2, 3]);
        assert_eq!(g.priority_rank(ProductionID::ACCEPT), 3);
    }
}
