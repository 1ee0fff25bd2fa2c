//! The decoded grammar record.
//!
//! A grammar description is a JSON object of the following shape:
//!
//! ```json
//! {
//!   "grammar": {
//!     "E": [
//!       { "production": ["E", "+", "T"], "code": "$$ = $1 + $3;" },
//!       { "production": ["T"], "code": "$$ = $1;" }
//!     ],
//!     "T": [{ "production": ["id"], "code": "$$ = std::stoi($1);" }]
//!   },
//!   "start-symbol": "E",
//!   "priorities": ["+"],
//!   "nonterminal-types": { "E": "int", "T": "int" },
//!   "header-extras": ["#include <string>"],
//!   "verbose": false,
//!   "parser-name": "Calc"
//! }
//! ```
//!
//! Every key of `grammar` is a nonterminal; any other symbol that appears in
//! a production is a terminal.

use crate::grammar::{ConfigError, GrammarDef};
use indexmap::IndexMap;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GrammarInput {
    pub grammar: IndexMap<String, Vec<ProductionInput>>,
    pub start_symbol: String,
    #[serde(default)]
    pub priorities: Vec<String>,
    #[serde(default)]
    pub nonterminal_types: IndexMap<String, String>,
    #[serde(default)]
    pub header_extras: Vec<String>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub parser_name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProductionInput {
    pub production: Vec<String>,
    #[serde(default)]
    pub code: String,
}

impl GrammarInput {
    pub(crate) fn define(self, g: &mut GrammarDef) -> Result<(), ConfigError> {
        for (nonterminal, productions) in &self.grammar {
            g.nonterminal(nonterminal)?;
            for production in productions {
                g.rule(nonterminal, &production.production, &production.code)?;
            }
        }
        g.start_symbol(&self.start_symbol)?;
        for terminal in &self.priorities {
            g.priority(terminal);
        }
        for (nonterminal, ty) in &self.nonterminal_types {
            g.result_type(nonterminal, ty);
        }
        for line in &self.header_extras {
            g.header_extra(line);
        }
        g.verbose(self.verbose);
        g.parser_name(&self.parser_name);
        Ok(())
    }
}
