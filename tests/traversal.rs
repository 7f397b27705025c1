use std::collections::BTreeSet;

use quadclad::construct::{Node, Quad};
use quadclad::datatype::NativeValue;
use quadclad::path::{Morphism, Path};
use quadclad::persist::PersistenceMode;
use quadclad::prefix::PrefixTable;
use quadclad::store::Store;

fn store() -> Store {
    let mut prefixes = PrefixTable::with_core();
    prefixes.register_prefix("ex:", "http://coordy.org/").unwrap();
    Store::with_prefixes(PersistenceMode::InMemory, prefixes).unwrap()
}

fn ex(name: &str) -> Node {
    Node::iri(format!("http://coordy.org/{}", name))
}

fn triple(s: &str, p: &str, o: &str) -> Quad {
    Quad::triple(ex(s), ex(p), ex(o)).unwrap()
}

fn results(path: &Path, store: &Store) -> BTreeSet<Node> {
    path.iterate(store)
        .unwrap()
        .collect::<Result<BTreeSet<_>, _>>()
        .unwrap()
}

fn scenario() -> Vec<Quad> {
    vec![
        triple("doc1", "creator", "agentA"),
        triple("agentA", "hasRole", "roleAdmin"),
        triple("roleAdmin", "hasAction", "actionRead"),
        triple("roleAdmin", "hasAction", "actionWrite"),
    ]
}

fn actions_of_creator() -> Path {
    Path::start_at([ex("doc1")])
        .out(ex("creator"))
        .out(ex("hasRole"))
        .out(ex("hasAction"))
}

#[test]
fn chained_out_steps_reach_all_actions() {
    let store = store();
    store.insert(scenario()).unwrap();
    let expected: BTreeSet<Node> = [ex("actionRead"), ex("actionWrite")].into();
    assert_eq!(results(&actions_of_creator(), &store), expected);
}

#[test]
fn insertion_order_does_not_matter() {
    let expected: BTreeSet<Node> = [ex("actionRead"), ex("actionWrite")].into();
    let quads = scenario();
    // every rotation, and every rotation reversed, inserted one quad at a time
    for shift in 0..quads.len() {
        for reversed in [false, true] {
            let mut order = quads.clone();
            order.rotate_left(shift);
            if reversed {
                order.reverse();
            }
            let store = store();
            for quad in order {
                store.insert([quad]).unwrap();
            }
            assert_eq!(results(&actions_of_creator(), &store), expected);
        }
    }
}

#[test]
fn unknown_predicate_gives_empty_result_for_all_later_steps() {
    let store = store();
    store.insert(scenario()).unwrap();
    let path = Path::start_at([ex("doc1")])
        .out(ex("nobodyUsesThis"))
        .out(ex("hasRole"))
        .out(ex("hasAction"));
    assert!(results(&path, &store).is_empty());
    let path = Path::start_at([ex("doc1")]).out(ex("hasAction"));
    assert!(results(&path, &store).is_empty());
}

#[test]
fn in_steps_walk_backwards() {
    let store = store();
    store.insert(scenario()).unwrap();
    let path = Path::start_at([ex("actionWrite")])
        .in_(ex("hasAction"))
        .in_(ex("hasRole"))
        .in_(ex("creator"));
    assert_eq!(results(&path, &store), [ex("doc1")].into());
}

#[test]
fn frontier_is_distinct() {
    let store = store();
    store
        .insert([
            triple("a", "knows", "c"),
            triple("b", "knows", "c"),
            triple("c", "likes", "d"),
        ])
        .unwrap();
    let nodes: Vec<Node> = Path::start_at([ex("a"), ex("b")])
        .out(ex("knows"))
        .out(ex("likes"))
        .iterate(&store)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(nodes, vec![ex("d")]);
}

#[test]
fn both_is_and_has_steps() {
    let store = store();
    store
        .insert([
            triple("a", "knows", "b"),
            triple("c", "knows", "a"),
            triple("b", "role", "admin"),
            triple("c", "role", "user"),
        ])
        .unwrap();
    let neighbours = Path::start_at([ex("a")]).both(ex("knows"));
    assert_eq!(results(&neighbours, &store), [ex("b"), ex("c")].into());
    let admins = neighbours.has(ex("role"), ex("admin"));
    assert_eq!(results(&admins, &store), [ex("b")].into());
    let only_c = neighbours.is([ex("c"), ex("nowhere")]);
    assert_eq!(results(&only_c, &store), [ex("c")].into());
}

#[test]
fn path_without_start_begins_at_every_subject_and_object() {
    let store = store();
    store.insert(scenario()).unwrap();
    let holders = Path::all().out(ex("hasRole"));
    assert_eq!(results(&holders, &store), [ex("roleAdmin")].into());
    let everything = results(&Path::all(), &store);
    assert_eq!(everything.len(), 5);
    assert!(!everything.contains(&ex("creator")));
}

#[test]
fn building_a_path_reads_nothing_until_iterated() {
    let store = store();
    let path = actions_of_creator();
    let early = path.iterate(&store).unwrap();
    // data inserted after compiling is still seen by the first next()
    store.insert(scenario()).unwrap();
    let nodes: BTreeSet<Node> = early.collect::<Result<_, _>>().unwrap();
    assert_eq!(nodes.len(), 2);
}

#[test]
fn iteration_is_restartable_and_can_stop_early() {
    let store = store();
    store.insert(scenario()).unwrap();
    let path = actions_of_creator();
    let first = path.iterate(&store).unwrap().next().unwrap().unwrap();
    assert!(first == ex("actionRead") || first == ex("actionWrite"));
    assert_eq!(path.iterate(&store).unwrap().count(), 2);
    assert_eq!(path.iterate(&store).unwrap().count(), 2);
}

#[test]
fn morphisms_are_spliced_by_value() {
    let store = store();
    store.insert(scenario()).unwrap();
    let owner = Morphism::new().out(ex("creator"));
    let path = Path::start_at([ex("doc1")])
        .follow(&owner)
        .out(ex("hasRole"));
    // extending the morphism afterwards leaves the path alone
    let _longer = owner.out(ex("hasRole"));
    assert_eq!(owner.len(), 1);
    assert_eq!(results(&path, &store), [ex("roleAdmin")].into());
}

#[test]
fn values_are_native() {
    let store = store();
    store
        .insert([
            Quad::triple(ex("a"), ex("age"), Node::typed(&42i64)).unwrap(),
            Quad::triple(ex("a"), ex("name"), Node::string("Ann")).unwrap(),
            triple("a", "friend", "b"),
        ])
        .unwrap();
    let age = Path::start_at([ex("a")]).out(ex("age")).values(&store).unwrap();
    assert_eq!(age, vec![NativeValue::Integer(42)]);
    let name = Path::start_at([ex("a")]).out(ex("name")).values(&store).unwrap();
    assert_eq!(name, vec![NativeValue::String("Ann".into())]);
    let mut seen = Vec::new();
    let count = Path::start_at([ex("a")])
        .out(ex("friend"))
        .for_each_value(&store, |value| seen.push(value))
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(seen, vec![NativeValue::Iri("http://coordy.org/b".into())]);
}

#[test]
fn closed_store_fails_on_first_next() {
    let store = store();
    store.insert(scenario()).unwrap();
    let mut iter = actions_of_creator().iterate(&store).unwrap();
    store.close().unwrap();
    assert!(iter.next().unwrap().is_err());
    assert!(iter.next().is_none());
}
