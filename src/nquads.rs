//! The line oriented fact format, `<s> <p> <o> [<g>] .` per line.
//!
//! Writing is done by the `Display` impls of [`Quad`] and friends; this module
//! holds the reading side and the term conversions shared with path scripts.

use std::io::BufRead;

use pest::Parser;
use pest::error::{Error as PestError, LineColLocation};
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::construct::{Literal, Node, Quad};
use crate::error::{QuadcladError, Result};
use crate::prefix::PrefixTable;

#[derive(Parser)]
#[grammar = "quads.pest"]
pub(crate) struct QuadParser;

pub(crate) fn parse_error(message: impl Into<String>, line: Option<usize>, col: Option<usize>) -> QuadcladError {
    QuadcladError::Parse {
        message: message.into(),
        line,
        col,
    }
}

/// Converts a pest error, `line` being the line the parsed text started on.
pub(crate) fn from_pest(e: PestError<Rule>, line: usize) -> QuadcladError {
    let (l, c) = match e.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    parse_error(e.variant.message().to_string(), Some(line + l - 1), Some(c))
}

/// Parses one line; blank and comment-only lines give `None`.
pub fn parse_nquad(line: &str, prefixes: &PrefixTable) -> Result<Option<Quad>> {
    parse_line(line, 1, prefixes)
}

fn parse_line(line: &str, number: usize, prefixes: &PrefixTable) -> Result<Option<Quad>> {
    let parsed = QuadParser::parse(Rule::nquad_line, line)
        .map_err(|e| from_pest(e, number))?
        .next()
        .ok_or_else(|| parse_error("empty parse", Some(number), None))?;
    let Some(nquad) = parsed.into_inner().find(|p| p.as_rule() == Rule::nquad) else {
        return Ok(None);
    };
    let mut parts = nquad.into_inner();
    let mut next = |what: &str| {
        parts
            .next()
            .ok_or_else(|| parse_error(format!("missing {}", what), Some(number), None))
    };
    let subject = node(next("subject")?, prefixes)?;
    let predicate = node(next("predicate")?, prefixes)?;
    let object = node(next("object")?, prefixes)?;
    let label = match parts.next() {
        Some(pair) => Some(node(pair, prefixes)?),
        None => None,
    };
    Quad::new(subject, predicate, object, label)
        .map(Some)
        .map_err(|e| parse_error(e.to_string(), Some(number), None))
}

pub fn parse_nquads(document: &str, prefixes: &PrefixTable) -> Result<Vec<Quad>> {
    let mut quads = Vec::new();
    for (i, line) in document.lines().enumerate() {
        if let Some(quad) = parse_line(line, i + 1, prefixes)? {
            quads.push(quad);
        }
    }
    Ok(quads)
}

pub fn read_nquads(input: impl BufRead, prefixes: &PrefixTable) -> Result<Vec<Quad>> {
    let mut quads = Vec::new();
    for (i, line) in input.lines().enumerate() {
        if let Some(quad) = parse_line(&line?, i + 1, prefixes)? {
            quads.push(quad);
        }
    }
    Ok(quads)
}

// ------------- Terms -------------
pub(crate) fn node(pair: Pair<'_, Rule>, prefixes: &PrefixTable) -> Result<Node> {
    match pair.as_rule() {
        Rule::term | Rule::subject | Rule::predicate | Rule::object | Rule::graph_label => {
            let (line, col) = pair.line_col();
            let inner = pair
                .into_inner()
                .next()
                .ok_or_else(|| parse_error("empty term", Some(line), Some(col)))?;
            node(inner, prefixes)
        }
        Rule::iriref => {
            let raw = pair.as_str();
            Ok(Node::iri(&raw[1..raw.len() - 1]))
        }
        Rule::blank_node => Ok(Node::blank(&pair.as_str()[2..])),
        Rule::prefixed_name => Ok(prefixes.iri(pair.as_str())),
        Rule::literal => literal(pair, prefixes),
        rule => {
            let (line, col) = pair.line_col();
            Err(parse_error(
                format!("expected a term, found {:?}", rule),
                Some(line),
                Some(col),
            ))
        }
    }
}

fn literal(pair: Pair<'_, Rule>, prefixes: &PrefixTable) -> Result<Node> {
    let (line, col) = pair.line_col();
    let mut inner = pair.into_inner();
    let raw = inner
        .next()
        .ok_or_else(|| parse_error("empty literal", Some(line), Some(col)))?
        .as_str();
    let lexical = unescape(&raw[1..raw.len() - 1])
        .map_err(|message| parse_error(message, Some(line), Some(col)))?;
    let literal = match inner.next() {
        None => Literal::string(lexical),
        Some(tag) if tag.as_rule() == Rule::lang_tag => {
            Literal::lang_string(lexical, &tag.as_str()[1..])
        }
        Some(datatype) => {
            let iri = datatype
                .into_inner()
                .next()
                .ok_or_else(|| parse_error("empty datatype", Some(line), Some(col)))?;
            match node(iri, prefixes)? {
                Node::Iri(iri) => Literal::new(lexical, iri.as_str()),
                other => {
                    return Err(parse_error(
                        format!("datatype {} is not an IRI", other),
                        Some(line),
                        Some(col),
                    ));
                }
            }
        }
    };
    Ok(Node::Literal(literal))
}

fn unescape(escaped: &str) -> std::result::Result<String, String> {
    let mut unescaped = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            unescaped.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => unescaped.push('\t'),
            Some('b') => unescaped.push('\u{8}'),
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('f') => unescaped.push('\u{c}'),
            Some('"') => unescaped.push('"'),
            Some('\'') => unescaped.push('\''),
            Some('\\') => unescaped.push('\\'),
            Some(u @ ('u' | 'U')) => {
                let width = if u == 'u' { 4 } else { 8 };
                let hex: String = chars.by_ref().take(width).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == width)
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("invalid escape \\{}{}", u, hex))?;
                unescaped.push(code);
            }
            Some(other) => return Err(format!("invalid escape \\{}", other)),
            None => return Err("dangling escape".to_owned()),
        }
    }
    Ok(unescaped)
}
