use std::sync::Arc;
use std::time::Duration;

use quadclad::construct::{Node, Quad};
use quadclad::error::QuadcladError;
use quadclad::interface::{QueryInterface, QueryOptions};
use quadclad::persist::PersistenceMode;
use quadclad::prefix::PrefixTable;
use quadclad::store::Store;

fn ex(name: &str) -> Node {
    Node::iri(format!("http://coordy.org/{}", name))
}

fn interface(members: usize) -> QueryInterface {
    let mut prefixes = PrefixTable::with_core();
    prefixes.register_prefix("ex:", "http://coordy.org/").unwrap();
    let store = Store::with_prefixes(PersistenceMode::InMemory, prefixes).unwrap();
    store
        .insert((0..members).map(|i| {
            Quad::triple(ex("group"), ex("member"), ex(&format!("m{}", i))).unwrap()
        }))
        .unwrap();
    QueryInterface::new(Arc::new(store))
}

#[test]
fn streamed_results_arrive_through_the_handle() {
    let interface = interface(25);
    let handle = interface
        .start_query("ex:group -> ex:member;".to_owned(), QueryOptions::default())
        .unwrap();
    let result = handle.collect().unwrap();
    assert_eq!(result.row_count, 25);
    assert_eq!(result.values.len(), 25);
    assert!(result.values.iter().all(|v| v.starts_with("ex:m")));
    assert_eq!(interface.active_count().unwrap(), 0);
}

#[test]
fn sync_runs_match_threaded_ones() {
    let interface = interface(10);
    let script = "ex:group -> ex:member limit 4;";
    let sync = interface.run_sync(script).unwrap();
    let threaded = interface
        .start_query(script.to_owned(), QueryOptions::default())
        .unwrap()
        .collect()
        .unwrap();
    assert_eq!(sync.row_count, 4);
    assert!(sync.limited);
    assert_eq!(threaded.row_count, sync.row_count);
    assert_eq!(threaded.limited, sync.limited);
    let mut a = sync.values;
    let mut b = threaded.values;
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

#[test]
fn unstreamed_queries_only_count() {
    let interface = interface(7);
    let options = QueryOptions {
        stream_results: false,
        timeout: None,
    };
    let handle = interface
        .start_query("ex:group -> ex:member;".to_owned(), options)
        .unwrap();
    assert!(handle.results.is_none());
    let outcome = handle.join().unwrap();
    assert_eq!(outcome.row_count, 7);
    assert!(!outcome.stopped);
}

#[test]
fn an_expired_deadline_stops_before_the_first_row() {
    let interface = interface(100);
    let options = QueryOptions {
        stream_results: true,
        timeout: Some(Duration::ZERO),
    };
    let handle = interface
        .start_query("ex:group -> ex:member;".to_owned(), options)
        .unwrap();
    let result = handle.collect().unwrap();
    assert_eq!(result.row_count, 0);
    assert!(result.values.is_empty());
}

#[test]
fn cancelling_stops_a_query_early_or_not_at_all() {
    let interface = interface(5000);
    let handle = interface
        .start_query("* -> ex:member;".to_owned(), QueryOptions::default())
        .unwrap();
    let id = handle.id;
    handle.cancel();
    let outcome = handle.join().unwrap();
    // the worker may have finished before the token was seen
    if outcome.stopped {
        assert!(outcome.row_count < 5000);
    } else {
        assert_eq!(outcome.row_count, 5000);
    }
    // finished queries are no longer registered
    assert!(!interface.cancel(id).unwrap());
    assert_eq!(interface.active_count().unwrap(), 0);
}

#[test]
fn errors_come_back_from_the_worker() {
    let interface = interface(1);
    let handle = interface
        .start_query("ex:group -> ;".to_owned(), QueryOptions::default())
        .unwrap();
    assert!(matches!(handle.collect(), Err(QuadcladError::Parse { .. })));
    assert!(matches!(
        interface.run_sync("ex:group @missing;"),
        Err(QuadcladError::PathCompilation(_))
    ));
    assert_eq!(interface.active_count().unwrap(), 0);
}
