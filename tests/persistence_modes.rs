use quadclad::construct::{Literal, Node, Quad, QuadPattern};
use quadclad::datatype::XSD_DATE;
use quadclad::identity::IdGenerator;
use quadclad::persist::PersistenceMode;
use quadclad::store::Store;

fn ex(name: &str) -> Node {
    Node::iri(format!("http://coordy.org/{}", name))
}

fn file_mode(dir: &tempfile::TempDir) -> PersistenceMode {
    PersistenceMode::File(dir.path().join("quads.db").to_string_lossy().into_owned())
}

#[test]
fn in_memory_mode_starts_empty_every_time() {
    let store = Store::new(PersistenceMode::InMemory).unwrap();
    store
        .insert([Quad::triple(ex("a"), ex("b"), ex("c")).unwrap()])
        .unwrap();
    assert_eq!(store.len().unwrap(), 1);
    store.close().unwrap();
    let again = Store::new(PersistenceMode::InMemory).unwrap();
    assert!(again.is_empty().unwrap());
}

#[test]
fn file_mode_restores_nodes_and_quads() {
    let dir = tempfile::tempdir().unwrap();
    let quads = vec![
        Quad::triple(ex("doc1"), ex("creator"), ex("agentA")).unwrap(),
        Quad::triple(ex("doc1"), ex("title"), Node::string("Quarterly \"report\"\n")).unwrap(),
        Quad::triple(ex("doc1"), ex("issued"), Literal::new("2024-02-29", XSD_DATE)).unwrap(),
        Quad::triple(ex("doc1"), ex("summary"), Literal::lang_string("kort", "sv")).unwrap(),
        Quad::new(Node::blank("b3"), ex("seenIn"), ex("doc1"), Some(ex("archive"))).unwrap(),
    ];
    let digest = {
        let store = Store::new(file_mode(&dir)).unwrap();
        assert_eq!(store.insert(quads.clone()).unwrap(), 5);
        let digest = store.digest().unwrap();
        store.close().unwrap();
        digest
    };
    let store = Store::new(file_mode(&dir)).unwrap();
    assert_eq!(store.len().unwrap(), 5);
    for quad in &quads {
        assert!(store.contains(quad).unwrap(), "missing {}", quad);
    }
    assert_eq!(store.digest().unwrap(), digest);
    // the counter picks up after the restored blank node
    assert_eq!(store.id_generator().unwrap().generate().unwrap().id(), "b4");
}

#[test]
fn deletions_and_new_nodes_survive_reopening() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = Store::new(file_mode(&dir)).unwrap();
        store
            .insert([
                Quad::triple(ex("a"), ex("p"), ex("b")).unwrap(),
                Quad::triple(ex("a"), ex("p"), ex("c")).unwrap(),
            ])
            .unwrap();
        store
            .delete_matching(&QuadPattern::any().object(ex("b")))
            .unwrap();
        // dropping closes the store
    }
    {
        let store = Store::new(file_mode(&dir)).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        // identities handed out after a restore must not clash with restored ones
        store
            .insert([Quad::triple(ex("d"), ex("q"), ex("a")).unwrap()])
            .unwrap();
        store.close().unwrap();
    }
    let store = Store::new(file_mode(&dir)).unwrap();
    assert_eq!(store.len().unwrap(), 2);
    assert!(store
        .contains(&Quad::triple(ex("d"), ex("q"), ex("a")).unwrap())
        .unwrap());
    assert!(store
        .contains(&Quad::triple(ex("a"), ex("p"), ex("c")).unwrap())
        .unwrap());
}

#[test]
fn unopenable_file_is_an_io_failure() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("quads.db");
    let result = Store::new(PersistenceMode::File(path.to_string_lossy().into_owned()));
    assert!(matches!(
        result,
        Err(quadclad::error::QuadcladError::Store(
            quadclad::error::StoreError::IoFailure(_)
        ))
    ));
}
