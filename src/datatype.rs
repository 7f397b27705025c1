// used for date and date-time literals
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
// used for decimal numbers
use bigdecimal::BigDecimal;

// used when parsing lexical forms
use std::str::FromStr;
// used to print out readable forms of a native value
use std::fmt;
use std::ops;

use crate::construct::Literal;
use crate::error::{QuadcladError, Result};

// ------------- Vocabulary -------------
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
pub const SCHEMA: &str = "http://schema.org/";

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
pub const XSD_INT: &str = "http://www.w3.org/2001/XMLSchema#int";
pub const XSD_SHORT: &str = "http://www.w3.org/2001/XMLSchema#short";
pub const XSD_BYTE: &str = "http://www.w3.org/2001/XMLSchema#byte";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

/// A Rust type that can be written as a typed literal.
///
/// `DATATYPE` is the full IRI of the XSD type the lexical form belongs to.
pub trait LiteralType: Sized {
    const DATATYPE: &'static str;
    fn lexical(&self) -> String;
    fn parse(lexical: &str) -> Option<Self>;
    fn datatype(&self) -> &'static str {
        Self::DATATYPE
    }
}

// ------------- Literal Types --------------
impl LiteralType for String {
    const DATATYPE: &'static str = XSD_STRING;
    fn lexical(&self) -> String {
        self.clone()
    }
    fn parse(lexical: &str) -> Option<String> {
        Some(lexical.to_owned())
    }
}
impl LiteralType for i64 {
    const DATATYPE: &'static str = XSD_INTEGER;
    fn lexical(&self) -> String {
        self.to_string()
    }
    fn parse(lexical: &str) -> Option<i64> {
        lexical.trim().trim_start_matches('+').parse().ok()
    }
}
impl LiteralType for f64 {
    const DATATYPE: &'static str = XSD_DOUBLE;
    fn lexical(&self) -> String {
        if self.is_nan() {
            "NaN".to_owned()
        } else if self.is_infinite() {
            if *self > 0. { "INF".to_owned() } else { "-INF".to_owned() }
        } else {
            format!("{:?}", self)
        }
    }
    fn parse(lexical: &str) -> Option<f64> {
        match lexical.trim() {
            "INF" | "+INF" => Some(f64::INFINITY),
            "-INF" => Some(f64::NEG_INFINITY),
            "NaN" => Some(f64::NAN),
            other => other.parse().ok().filter(|v: &f64| v.is_finite()),
        }
    }
}
impl LiteralType for bool {
    const DATATYPE: &'static str = XSD_BOOLEAN;
    fn lexical(&self) -> String {
        self.to_string()
    }
    fn parse(lexical: &str) -> Option<bool> {
        match lexical.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }
}
impl LiteralType for Decimal {
    const DATATYPE: &'static str = XSD_DECIMAL;
    fn lexical(&self) -> String {
        self.0.to_string()
    }
    fn parse(lexical: &str) -> Option<Decimal> {
        Decimal::from_str(lexical.trim())
    }
}
impl LiteralType for NaiveDate {
    const DATATYPE: &'static str = XSD_DATE;
    fn lexical(&self) -> String {
        self.format("%Y-%m-%d").to_string()
    }
    fn parse(lexical: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(lexical.trim(), "%Y-%m-%d").ok()
    }
}
impl LiteralType for DateTime<Utc> {
    const DATATYPE: &'static str = XSD_DATE_TIME;
    fn lexical(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
    fn parse(lexical: &str) -> Option<DateTime<Utc>> {
        let lexical = lexical.trim();
        // a date-time without an offset is read as UTC
        DateTime::parse_from_rfc3339(lexical)
            .map(|d| d.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::from_str(lexical)
                    .map(|d| d.and_utc())
                    .ok()
            })
    }
}

// Special types below
#[derive(Eq, PartialEq, Hash, PartialOrd, Ord, Clone, Debug)]
pub struct Decimal(BigDecimal);

impl Decimal {
    pub fn from_str(s: &str) -> Option<Decimal> {
        match BigDecimal::from_str(s) {
            Ok(decimal) => Some(Decimal(decimal)),
            _ => None,
        }
    }
}
impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl ops::Deref for Decimal {
    type Target = BigDecimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ------------- Native Values --------------
/// A node converted to a plain Rust value.
///
/// Literals become their typed scalar, while IRIs and blank nodes keep their
/// string form.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Iri(String),
    Blank(String),
    String(String),
    LangString { value: String, language: String },
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Decimal(Decimal),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
}

impl NativeValue {
    /// Converts a literal, failing rather than truncating when the datatype is
    /// unknown or the lexical form does not belong to it.
    pub fn from_literal(literal: &Literal) -> Result<NativeValue> {
        let lexical = literal.lexical();
        let datatype = literal.datatype();
        let unsupported = || QuadcladError::UnsupportedLiteral {
            lexical: lexical.to_owned(),
            datatype: datatype.to_owned(),
        };
        let value = match datatype {
            XSD_STRING => NativeValue::String(lexical.to_owned()),
            RDF_LANG_STRING => NativeValue::LangString {
                value: lexical.to_owned(),
                language: literal.language().unwrap_or_default().to_owned(),
            },
            XSD_INTEGER | XSD_LONG | XSD_INT | XSD_SHORT | XSD_BYTE => {
                NativeValue::Integer(i64::parse(lexical).ok_or_else(unsupported)?)
            }
            XSD_DOUBLE | XSD_FLOAT => {
                NativeValue::Double(f64::parse(lexical).ok_or_else(unsupported)?)
            }
            XSD_BOOLEAN => NativeValue::Boolean(bool::parse(lexical).ok_or_else(unsupported)?),
            XSD_DECIMAL => NativeValue::Decimal(Decimal::parse(lexical).ok_or_else(unsupported)?),
            XSD_DATE => NativeValue::Date(NaiveDate::parse(lexical).ok_or_else(unsupported)?),
            XSD_DATE_TIME => {
                NativeValue::DateTime(DateTime::<Utc>::parse(lexical).ok_or_else(unsupported)?)
            }
            _ => return Err(unsupported()),
        };
        Ok(value)
    }
}

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NativeValue::Iri(s) | NativeValue::Blank(s) | NativeValue::String(s) => {
                write!(f, "{}", s)
            }
            NativeValue::LangString { value, .. } => write!(f, "{}", value),
            NativeValue::Integer(i) => write!(f, "{}", i),
            NativeValue::Double(d) => write!(f, "{}", d.lexical()),
            NativeValue::Boolean(b) => write!(f, "{}", b),
            NativeValue::Decimal(d) => write!(f, "{}", d),
            NativeValue::Date(d) => write!(f, "{}", d.lexical()),
            NativeValue::DateTime(d) => write!(f, "{}", d.lexical()),
        }
    }
}
