use quadclad::construct::{Literal, Node};
use quadclad::datatype::{Decimal, NativeValue, XSD_DECIMAL, XSD_INTEGER};
use quadclad::error::QuadcladError;
use quadclad::prefix::PrefixTable;

#[test]
fn rebinding_a_prefix_is_a_conflict() {
    let mut table = PrefixTable::new();
    table.register_prefix("ex:", "http://a/").unwrap();
    let err = table.register_prefix("ex:", "http://b/").unwrap_err();
    match err {
        QuadcladError::Conflict {
            short,
            existing,
            requested,
        } => {
            assert_eq!(short, "ex:");
            assert_eq!(existing, "http://a/");
            assert_eq!(requested, "http://b/");
        }
        other => panic!("expected a conflict, got {}", other),
    }
    assert_eq!(table.expansion("ex:"), Some("http://a/"));
    assert_eq!(table.expand("ex:x"), "http://a/x");
    assert_eq!(table.len(), 1);
}

#[test]
fn registering_the_same_pair_again_is_fine() {
    let mut table = PrefixTable::new();
    table.register_prefix("ex", "http://a/").unwrap();
    table.register_prefix("ex:", "http://a/").unwrap();
    assert_eq!(table.len(), 1);
}

#[test]
fn an_expansion_belongs_to_one_prefix() {
    let mut table = PrefixTable::new();
    table.register_prefix("ex:", "http://a/").unwrap();
    let err = table.register_prefix("other:", "http://a/").unwrap_err();
    assert!(matches!(err, QuadcladError::Conflict { .. }));
    assert_eq!(table.expansion("other:"), None);
}

#[test]
fn malformed_prefixes_are_refused() {
    let mut table = PrefixTable::new();
    assert!(table.register_prefix("1ex:", "http://a/").is_err());
    assert!(table.register_prefix("e x:", "http://a/").is_err());
    assert!(table.register_prefix("ex:", "").is_err());
    assert!(table.is_empty());
}

#[test]
fn expand_is_pure() {
    let table = PrefixTable::with_core();
    let once = table.expand("rdf:type");
    assert_eq!(once, "http://www.w3.org/1999/02/22-rdf-syntax-ns#type");
    assert_eq!(table.expand("rdf:type"), once);
    // unknown prefixes and plain names pass through
    assert_eq!(table.expand("nope:thing"), "nope:thing");
    assert_eq!(table.expand("http://x/y"), "http://x/y");
}

#[test]
fn shorten_prefers_the_longest_expansion() {
    let mut table = PrefixTable::new();
    table.register_prefix("ex:", "http://coordy.org/").unwrap();
    table.register_prefix("doc:", "http://coordy.org/docs/").unwrap();
    assert_eq!(table.shorten("http://coordy.org/docs/Bijie.pdf"), "doc:Bijie.pdf");
    assert_eq!(table.shorten("http://coordy.org/Bijie"), "ex:Bijie");
    assert_eq!(table.shorten("http://elsewhere/x"), "http://elsewhere/x");
    assert_eq!(table.display(&Node::iri("http://elsewhere/x")), "<http://elsewhere/x>");
}

#[test]
fn prefixed_and_full_names_are_the_same_node() {
    let mut table = PrefixTable::new();
    table.register_prefix("ex:", "http://coordy.org/").unwrap();
    assert_eq!(table.iri("ex:Bijie"), Node::iri("http://coordy.org/Bijie"));
}

#[test]
fn native_values_keep_their_type() {
    let table = PrefixTable::with_core();
    assert_eq!(
        table.native_value(&Node::iri("http://x/y")).unwrap(),
        NativeValue::Iri("http://x/y".into())
    );
    assert_eq!(
        table.native_value(&Node::blank("b1")).unwrap(),
        NativeValue::Blank("b1".into())
    );
    assert_eq!(
        table.native_value(&Node::typed(&true)).unwrap(),
        NativeValue::Boolean(true)
    );
    assert_eq!(
        table
            .native_value(&Node::from(Literal::new("12.50", XSD_DECIMAL)))
            .unwrap(),
        NativeValue::Decimal(Decimal::from_str("12.50").unwrap())
    );
    assert_eq!(
        table.native_value(&Node::from(Literal::lang_string("hej", "SV"))).unwrap(),
        NativeValue::LangString {
            value: "hej".into(),
            language: "sv".into()
        }
    );
}

#[test]
fn unsupported_literals_are_errors_not_truncations() {
    let table = PrefixTable::with_core();
    let bad_integer: Node = Literal::new("twelve", XSD_INTEGER).into();
    assert!(matches!(
        table.native_value(&bad_integer),
        Err(QuadcladError::UnsupportedLiteral { .. })
    ));
    let unknown: Node = Literal::new("x", "http://example.org/custom").into();
    assert!(matches!(
        table.native_value(&unknown),
        Err(QuadcladError::UnsupportedLiteral { .. })
    ));
}
