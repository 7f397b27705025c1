use std::collections::BTreeSet;

use quadclad::construct::{Node, Quad};
use quadclad::error::QuadcladError;
use quadclad::path::{Morphism, Morphisms, Path};
use quadclad::pathql::{Engine, parse_script};
use quadclad::persist::PersistenceMode;
use quadclad::prefix::PrefixTable;
use quadclad::store::Store;

fn ex(name: &str) -> Node {
    Node::iri(format!("http://coordy.org/{}", name))
}

fn store() -> Store {
    let mut prefixes = PrefixTable::with_core();
    prefixes.register_prefix("ex:", "http://coordy.org/").unwrap();
    let store = Store::with_prefixes(PersistenceMode::InMemory, prefixes).unwrap();
    let triple = |s: &str, p: &str, o: &str| Quad::triple(ex(s), ex(p), ex(o)).unwrap();
    store
        .insert([
            triple("Bijie.pdf", "creator", "Bijie"),
            triple("Privatebook.pdf", "creator", "Bijie"),
            triple("Bijie", "hasRole", "Admin"),
            triple("Admin", "hasAction", "Read"),
            triple("Admin", "hasAction", "Write"),
            triple("User", "hasAction", "Read"),
            Quad::triple(ex("Bijie"), ex("name"), Node::string("Bijie Z")).unwrap(),
        ])
        .unwrap();
    store
}

fn values(store: &Store, script: &str) -> BTreeSet<String> {
    Engine::new(store)
        .execute_collect(script)
        .unwrap()
        .values
        .into_iter()
        .collect()
}

fn set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn out_chain_returns_shortened_names() {
    let store = store();
    assert_eq!(
        values(&store, "ex:Bijie.pdf -> ex:creator -> ex:hasRole -> ex:hasAction;"),
        set(&["ex:Read", "ex:Write"])
    );
    // full IRIs and a missing trailing semicolon are fine too
    assert_eq!(
        values(&store, "<http://coordy.org/Admin> -> <http://coordy.org/hasAction>"),
        set(&["ex:Read", "ex:Write"])
    );
}

#[test]
fn in_both_is_and_has_steps() {
    let store = store();
    assert_eq!(
        values(&store, "ex:Read <- ex:hasAction;"),
        set(&["ex:Admin", "ex:User"])
    );
    assert_eq!(
        values(&store, "ex:Bijie <-> ex:creator;"),
        set(&["ex:Bijie.pdf", "ex:Privatebook.pdf"])
    );
    assert_eq!(
        values(&store, "[ex:Admin, ex:User] has ex:hasAction ex:Write;"),
        set(&["ex:Admin"])
    );
    assert_eq!(
        values(&store, "ex:Read <- ex:hasAction is [ex:User];"),
        set(&["ex:User"])
    );
    assert_eq!(
        values(&store, "* has ex:name \"Bijie Z\";"),
        set(&["ex:Bijie"])
    );
    assert_eq!(
        values(&store, "ex:Bijie -> ex:name;"),
        set(&["\"Bijie Z\""])
    );
}

#[test]
fn definitions_are_reusable() {
    let store = store();
    let script = "
        # who may do what with a document
        define owner = -> ex:creator;
        define permissions = @owner -> ex:hasRole -> ex:hasAction;
        ex:Bijie.pdf @permissions;
    ";
    assert_eq!(values(&store, script), set(&["ex:Read", "ex:Write"]));
    // following a morphism from a start that has no creator gives nothing
    let script = "define owner = -> ex:creator; ex:Admin @owner -> ex:hasRole;";
    assert!(values(&store, script).is_empty());
}

#[test]
fn limit_caps_the_rows() {
    let store = store();
    let engine = Engine::new(&store);
    let result = engine
        .execute_collect("ex:Admin -> ex:hasAction limit 1;")
        .unwrap();
    assert_eq!(result.row_count, 1);
    assert_eq!(result.values.len(), 1);
    assert!(result.limited);
    let result = engine
        .execute_collect("ex:Admin -> ex:hasAction limit 5;")
        .unwrap();
    assert_eq!(result.row_count, 2);
    assert!(!result.limited);
    let result = engine
        .execute_collect("ex:Admin -> ex:hasAction limit 0;")
        .unwrap();
    assert_eq!(result.row_count, 0);
    assert!(result.limited);
}

#[test]
fn keywords_do_not_swallow_names() {
    let store = store();
    // "is:" and "has:" are prefixes here, not steps
    let script = "ex:User -> ex:hasAction is ex:Read;";
    assert_eq!(values(&store, script), set(&["ex:Read"]));
    let parsed = parse_script("is:thing -> has:part;", store.prefixes()).unwrap();
    assert_eq!(parsed.path.start(), Some(&[Node::iri("is:thing")][..]));
}

#[test]
fn syntax_errors_carry_a_position() {
    let store = store();
    let engine = Engine::new(&store);
    match engine.execute_collect("ex:Bijie.pdf\n  -> -> ex:creator;") {
        Err(QuadcladError::Parse { line, col, .. }) => {
            assert_eq!(line, Some(2));
            assert!(col.is_some());
        }
        other => panic!("expected a parse error, got {:?}", other.map(|r| r.values)),
    }
    assert!(matches!(
        engine.execute_collect("define = -> ex:creator; ex:a;"),
        Err(QuadcladError::Parse { .. })
    ));
    assert!(matches!(
        engine.execute_collect("define a = -> ex:p; define a = -> ex:q; ex:a @a;"),
        Err(QuadcladError::Parse { .. })
    ));
}

#[test]
fn unresolved_and_recursive_names_fail_to_compile() {
    let store = store();
    let engine = Engine::new(&store);
    assert!(matches!(
        engine.execute_collect("ex:Bijie @nowhere;"),
        Err(QuadcladError::PathCompilation(_))
    ));
    assert!(matches!(
        engine.execute_collect("define loop = -> ex:creator @loop; ex:Bijie.pdf @loop;"),
        Err(QuadcladError::PathCompilation(_))
    ));
}

#[test]
fn named_morphisms_resolve_when_compiled() {
    let store = store();
    let path = Path::start_at([ex("Bijie.pdf")])
        .follow_named("owner")
        .out(ex("hasRole"));
    assert!(matches!(
        path.iterate(&store),
        Err(QuadcladError::PathCompilation(_))
    ));
    let mut morphisms = Morphisms::new();
    morphisms.define("owner", Morphism::new().out(ex("creator")));
    let roles: Vec<Node> = path
        .iterate_with(&store, &morphisms)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(roles, vec![ex("Admin")]);

    let mut cyclic = Morphisms::new();
    cyclic.define("a", Morphism::new().follow_named("b"));
    cyclic.define("b", Morphism::new().out(ex("creator")).follow_named("a"));
    assert!(matches!(
        Path::all().follow_named("a").iterate_with(&store, &cyclic),
        Err(QuadcladError::PathCompilation(_))
    ));
    // the same morphism twice in a row is not a cycle
    assert!(
        Path::all()
            .follow_named("owner")
            .follow_named("owner")
            .iterate_with(&store, &morphisms)
            .is_ok()
    );
}
