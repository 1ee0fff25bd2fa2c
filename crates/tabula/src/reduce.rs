//! Reduction handlers and the thunks that bridge parse-stack cells to them.
//!
//! Every distinct reduction gets a thunk. Reductions whose nonterminal has a
//! result type additionally get a handler, a function taking one parameter
//! per right-hand side symbol whose body is the semantic action.

use crate::{
    grammar::{Grammar, ProductionID, SymbolID},
    lr0::LR0Automaton,
    types::{Map, Set},
};
use serde::Serialize;

/// Name given to the result in rewritten actions.
const RESULT_ARG: &str = "_parserArg0";

/// Prefix of the positional arguments in rewritten actions.
const ARG_PREFIX: &str = "_parserArg";

#[derive(Debug, Clone, Serialize)]
pub struct Handler {
    #[serde(skip)]
    pub production: ProductionID,
    pub name: String,
    pub return_type: String,
    pub params: Vec<Param>,
    /// The semantic action with placeholders rewritten to argument names.
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// `None` when the body never mentions the argument.
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "type", rename_all = "snake_case")]
pub enum ParamType {
    /// The declared result type of a nonterminal.
    Value(String),
    /// A nonterminal without result type.
    Untyped,
    /// The text matched by a terminal.
    Token,
}

#[derive(Debug, Clone, Serialize)]
pub struct Thunk {
    #[serde(skip)]
    pub production: ProductionID,
    pub name: String,
    pub nonterminal: String,
    /// Names of the stack cell parameters, `None` for unused cells.
    pub params: Vec<Option<String>>,
    /// The handler invocation, absent when the reduction carries no value.
    pub call: Option<HandlerCall>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandlerCall {
    /// The field of the result cell receiving the handler's return value.
    pub field: String,
    pub handler: String,
    pub args: Vec<ThunkArg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThunkArg {
    /// The typed value stored in a nonterminal cell.
    Field { cell: usize, field: String },
    /// A default-constructed value for an untyped nonterminal.
    Default,
    /// The token text stored in a terminal cell.
    Token { cell: usize },
}

#[derive(Debug, Default)]
pub struct ReductionPlans {
    /// Handler name of every production but the accepting one.
    pub names: Map<ProductionID, String>,
    pub handlers: Vec<Handler>,
    pub thunks: Vec<Thunk>,
}

impl ReductionPlans {
    /// Collect the plans of every production completed in some state.
    pub fn new(g: &Grammar, lr0: &LR0Automaton) -> Self {
        let span = tracing::trace_span!("reduction_plans");
        let _entered = span.enter();

        let reductions: Set<ProductionID> = lr0
            .states
            .values()
            .flat_map(|state| &state.items)
            .filter(|item| item.production != ProductionID::ACCEPT && item.is_complete(g))
            .map(|item| item.production)
            .collect();

        let names = handler_names(g);

        let mut handlers: Vec<_> = reductions
            .iter()
            .filter_map(|p| handler(g, *p, &names[p]))
            .collect();
        handlers.sort_by(|h1, h2| h1.name.cmp(&h2.name));

        let mut thunks: Vec<_> = reductions.iter().map(|p| thunk(g, *p, &names[p])).collect();
        thunks.sort_by(|t1, t2| t1.name.cmp(&t2.name));

        tracing::debug!(
            "{} reductions, {} handlers",
            reductions.len(),
            handlers.len()
        );
        Self {
            names,
            handlers,
            thunks,
        }
    }

    /// The name of the thunk performing the reduction of `id`.
    pub fn thunk_name(&self, id: ProductionID) -> String {
        thunk_name(&self.names[&id])
    }
}

/// `reduce_<lhs>_from_<sym1>_<sym2>...`
pub fn handler_name(g: &Grammar, id: ProductionID) -> String {
    let production = g.production(id);
    let mut name = format!("reduce_{}_from", g.nonterminal(production.left).name);
    for symbol in &production.right {
        name.push('_');
        name.push_str(g.symbol_name(*symbol));
    }
    name
}

/// Handler names of all productions but the accepting one.
///
/// Joining symbol names with `_` is ambiguous (`a_b` vs `a b`), so every
/// production sharing its plain name with another one is suffixed with its
/// declaration index.
pub fn handler_names(g: &Grammar) -> Map<ProductionID, String> {
    let mut names: Map<ProductionID, String> = g
        .productions
        .keys()
        .filter(|id| **id != ProductionID::ACCEPT)
        .map(|id| (*id, handler_name(g, *id)))
        .collect();

    let mut counts = Map::<String, usize>::default();
    for name in names.values() {
        *counts.entry(name.clone()).or_default() += 1;
    }
    for (i, name) in names.values_mut().enumerate() {
        if counts[name.as_str()] > 1 {
            name.push_str(&format!("_{}", i));
        }
    }
    names
}

pub fn thunk_name(handler: &str) -> String {
    format!("{}__thunk", handler)
}

/// Rewrite `$$` into the result argument and `$n` into positional arguments.
pub fn rewrite_action(action: &str) -> String {
    action.replace("$$", RESULT_ARG).replace('$', ARG_PREFIX)
}

/// Whether the rewritten `body` mentions the argument at `index` (1-based).
///
/// This is a plain substring search: a placeholder inside a string literal
/// or a comment counts as a use, and so does `_parserArg1` within
/// `_parserArg12`.
pub fn uses_argument(body: &str, index: usize) -> bool {
    body.contains(&format!("{}{}", ARG_PREFIX, index))
}

/// Derive the handler of a reduction, if its nonterminal has a result type.
pub fn handler(g: &Grammar, id: ProductionID, name: &str) -> Option<Handler> {
    let production = g.production(id);
    let return_type = g.nonterminal(production.left).result_type.clone()?;
    let body = rewrite_action(&production.action);

    let params = production
        .right
        .iter()
        .enumerate()
        .map(|(i, symbol)| {
            let ty = match symbol {
                SymbolID::N(n) => match &g.nonterminal(*n).result_type {
                    Some(ty) => ParamType::Value(ty.clone()),
                    None => ParamType::Untyped,
                },
                SymbolID::T(_) => ParamType::Token,
            };
            let arg = uses_argument(&body, i + 1).then(|| format!("{}{}", ARG_PREFIX, i + 1));
            Param { ty, name: arg }
        })
        .collect();

    Some(Handler {
        production: id,
        name: name.to_owned(),
        return_type,
        params,
        body,
    })
}

/// Derive the thunk of a reduction whose handler is called `handler`.
pub fn thunk(g: &Grammar, id: ProductionID, handler: &str) -> Thunk {
    let production = g.production(id);
    let left = g.nonterminal(production.left);
    let typed = left.result_type.is_some();

    let params = production
        .right
        .iter()
        .enumerate()
        .map(|(i, symbol)| {
            let used = typed
                && match symbol {
                    SymbolID::N(n) => g.nonterminal(*n).result_type.is_some(),
                    SymbolID::T(_) => true,
                };
            used.then(|| format!("a{}", i))
        })
        .collect();

    let call = g.field_for(production.left).map(|field| HandlerCall {
        field: field.to_owned(),
        handler: handler.to_owned(),
        args: production
            .right
            .iter()
            .enumerate()
            .map(|(cell, symbol)| match symbol {
                SymbolID::N(n) => match g.field_for(*n) {
                    Some(field) => ThunkArg::Field {
                        cell,
                        field: field.to_owned(),
                    },
                    None => ThunkArg::Default,
                },
                SymbolID::T(_) => ThunkArg::Token { cell },
            })
            .collect(),
    });

    Thunk {
        production: id,
        name: thunk_name(handler),
        nonterminal: left.name.clone(),
        params,
        call,
    }
}
