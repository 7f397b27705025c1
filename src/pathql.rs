//! A small textual form of path expressions.
//!
//! ```text
//! # who may do what with the document
//! define owner = -> ex:creator;
//! ex:Bijie.pdf @owner -> ex:hasRole -> ex:hasAction limit 10;
//! ```
//!
//! A script is any number of `define name = steps;` followed by one query: a
//! start (`*`, a term, or `[term, ...]`), steps and an optional limit. Steps are
//! `-> p`, `<- p`, `<-> p`, `@name`, `is term` (or `is [term, ...]`) and
//! `has p o`. A name that is already defined is captured as it is at that
//! point; one that is not is looked up when the query is compiled.

use pest::Parser;
use pest::iterators::Pair;
use serde::Serialize;
use tracing::debug;

use crate::construct::Node;
use crate::error::Result;
use crate::nquads::{QuadParser, Rule, from_pest, node, parse_error};
use crate::path::{Morphism, Morphisms, Path};
use crate::prefix::PrefixTable;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct Script {
    pub morphisms: Morphisms,
    pub path: Path,
    pub limit: Option<usize>,
}

pub fn parse_script(text: &str, prefixes: &PrefixTable) -> Result<Script> {
    let script = QuadParser::parse(Rule::script, text)
        .map_err(|e| from_pest(e, 1))?
        .next()
        .ok_or_else(|| parse_error("empty script", None, None))?;
    let mut morphisms = Morphisms::new();
    let mut query = None;
    for pair in script.into_inner() {
        match pair.as_rule() {
            Rule::definition => {
                let (line, col) = pair.line_col();
                let mut name = None;
                let mut morphism = Morphism::new();
                for part in pair.into_inner() {
                    match part.as_rule() {
                        Rule::kw_define => {}
                        Rule::name => name = Some(part.as_str().to_owned()),
                        _ => morphism = step(part, &morphism, &morphisms, prefixes)?,
                    }
                }
                let name = name.ok_or_else(|| parse_error("definition without a name", Some(line), Some(col)))?;
                if morphisms.define(&name, morphism).is_some() {
                    return Err(parse_error(
                        format!("'{}' is defined twice", name),
                        Some(line),
                        Some(col),
                    ));
                }
            }
            Rule::query => query = Some(pair),
            _ => {}
        }
    }
    let query = query.ok_or_else(|| parse_error("no query", None, None))?;
    let mut start = None;
    let mut morphism = Morphism::new();
    let mut limit = None;
    for part in query.into_inner() {
        match part.as_rule() {
            Rule::start => start = Some(start_nodes(part, prefixes)?),
            Rule::limit => {
                let (line, col) = part.line_col();
                let count = part
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::count)
                    .ok_or_else(|| parse_error("limit without a count", Some(line), Some(col)))?;
                let count = count
                    .as_str()
                    .parse::<usize>()
                    .map_err(|e| parse_error(e.to_string(), Some(line), Some(col)))?;
                limit = Some(count);
            }
            _ => morphism = step(part, &morphism, &morphisms, prefixes)?,
        }
    }
    let path = match start.flatten() {
        Some(nodes) => Path::start_at(nodes),
        None => Path::all(),
    }
    .follow(&morphism);
    Ok(Script {
        morphisms,
        path,
        limit,
    })
}

// None is the whole store
fn start_nodes(pair: Pair<'_, Rule>, prefixes: &PrefixTable) -> Result<Option<Vec<Node>>> {
    let (line, col) = pair.line_col();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| parse_error("empty start", Some(line), Some(col)))?;
    match inner.as_rule() {
        Rule::all => Ok(None),
        Rule::node_set => nodes(inner, prefixes).map(Some),
        _ => Ok(Some(vec![node(inner, prefixes)?])),
    }
}

fn nodes(node_set: Pair<'_, Rule>, prefixes: &PrefixTable) -> Result<Vec<Node>> {
    node_set.into_inner().map(|term| node(term, prefixes)).collect()
}

fn step(
    pair: Pair<'_, Rule>,
    morphism: &Morphism,
    defined: &Morphisms,
    prefixes: &PrefixTable,
) -> Result<Morphism> {
    let (line, col) = pair.line_col();
    let rule = pair.as_rule();
    let mut inner = pair
        .into_inner()
        .filter(|p| !matches!(p.as_rule(), Rule::kw_is | Rule::kw_has));
    let mut next = || {
        inner
            .next()
            .ok_or_else(|| parse_error(format!("incomplete {:?}", rule), Some(line), Some(col)))
    };
    Ok(match rule {
        Rule::out_step => morphism.out(node(next()?, prefixes)?),
        Rule::in_step => morphism.in_(node(next()?, prefixes)?),
        Rule::both_step => morphism.both(node(next()?, prefixes)?),
        Rule::follow_step => {
            let name = next()?.as_str().to_owned();
            match defined.get(&name) {
                Some(captured) => morphism.follow(captured),
                None => morphism.follow_named(&name),
            }
        }
        Rule::is_step => {
            let target = next()?;
            match target.as_rule() {
                Rule::node_set => morphism.is(nodes(target, prefixes)?),
                _ => morphism.is([node(target, prefixes)?]),
            }
        }
        Rule::has_step => {
            let predicate = node(next()?, prefixes)?;
            let object = node(next()?, prefixes)?;
            morphism.has(predicate, object)
        }
        other => {
            return Err(parse_error(
                format!("unexpected {:?}", other),
                Some(line),
                Some(col),
            ));
        }
    })
}

// ------------- Engine -------------
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub values: Vec<String>,
    pub row_count: usize,
    pub limited: bool,
}

/// How a streamed execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub row_count: usize,
    /// The limit was reached.
    pub limited: bool,
    /// The sink asked to stop.
    pub stopped: bool,
}

pub struct Engine<'s> {
    store: &'s Store,
}

impl<'s> Engine<'s> {
    pub fn new(store: &'s Store) -> Self {
        Self { store }
    }
    /// Runs a script, handing each result rendered with the store's prefixes
    /// to `sink` until it returns `false`.
    pub fn execute(&self, script: &str, mut sink: impl FnMut(String) -> bool) -> Result<Outcome> {
        let prefixes = self.store.prefixes();
        let parsed = parse_script(script, prefixes)?;
        let results = parsed.path.iterate_with(self.store, &parsed.morphisms)?;
        let mut outcome = Outcome {
            row_count: 0,
            limited: false,
            stopped: false,
        };
        let limit = parsed.limit.unwrap_or(usize::MAX);
        if limit == 0 {
            outcome.limited = true;
        } else {
            for node in results {
                let node = node?;
                if !sink(prefixes.display(&node)) {
                    outcome.stopped = true;
                    break;
                }
                outcome.row_count += 1;
                if outcome.row_count == limit {
                    outcome.limited = true;
                    break;
                }
            }
        }
        debug!(rows = outcome.row_count, limited = outcome.limited, "executed script");
        Ok(outcome)
    }
    pub fn execute_collect(&self, script: &str) -> Result<QueryResult> {
        let mut values = Vec::new();
        let outcome = self.execute(script, |value| {
            values.push(value);
            true
        })?;
        Ok(QueryResult {
            values,
            row_count: outcome.row_count,
            limited: outcome.limited,
        })
    }
}
