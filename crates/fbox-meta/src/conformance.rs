//! Behavior shared by every [`MetadataStore`] backend, run against each one
//! from its own test module.

use std::sync::{Arc, Barrier};
use std::thread;

use fbox_types::{BlobHash, BoxId, CommitId, Entry, NewBox, NewCommit, TypeError, Visibility};
use proptest::prelude::*;

use crate::error::MetaError;
use crate::memory::InMemoryMetaStore;
use crate::sqlite::SqliteMetaStore;
use crate::traits::MetadataStore;

pub(crate) fn run_all<S: MetadataStore, F: Fn() -> S>(make: F) {
    create_and_get_box(&make());
    duplicate_box_rejected(&make());
    box_defaults_and_validation(&make());
    public_listing(&make());
    commit_round_trip(&make());
    commit_validation(&make());
    ref_lifecycle(&make());
    ref_errors(&make());
    history_walk(&make());
}

fn entry(path: &str, hash: &str, size: u64) -> Entry {
    Entry::new(path, BlobHash::parse(hash).unwrap(), size)
}

fn demo_box(store: &dyn MetadataStore) -> BoxId {
    store.create_box(NewBox::named("demo")).unwrap().id
}

fn commit(store: &dyn MetadataStore, box_id: &BoxId, parent: Option<&CommitId>) -> CommitId {
    store
        .save_commit(
            NewCommit::new(box_id.clone(), "main", vec![entry("a.txt", "aa", 1)])
                .with_parent(parent.cloned()),
        )
        .unwrap()
        .id
}

fn create_and_get_box(store: &dyn MetadataStore) {
    let created = store
        .create_box(NewBox::named("demo").with_visibility(Visibility::Unlisted))
        .unwrap();
    let fetched = store.get_box("global", "demo").unwrap().expect("box exists");
    assert_eq!(fetched, created);
    assert_eq!(fetched.visibility, Visibility::Unlisted);

    assert!(store.get_box("global", "other").unwrap().is_none());
    assert!(store.get_box("elsewhere", "demo").unwrap().is_none());
}

fn duplicate_box_rejected(store: &dyn MetadataStore) {
    store.create_box(NewBox::named("demo")).unwrap();
    let err = store.create_box(NewBox::named("demo")).unwrap_err();
    assert!(matches!(err, MetaError::BoxExists { ref name, .. } if name == "demo"));

    // Same name in another namespace is a different box.
    let mut other = NewBox::named("demo");
    other.namespace_id = "team".into();
    store.create_box(other).unwrap();
}

fn box_defaults_and_validation(store: &dyn MetadataStore) {
    let b = store.create_box(NewBox::named("plain")).unwrap();
    assert_eq!(b.default_branch, "main");
    assert_eq!(b.visibility, Visibility::Public);
    assert_eq!(b.namespace_id, "global");
    assert!(!b.id.as_str().is_empty());

    let dev = store
        .create_box(NewBox::named("dev-box").with_default_branch("develop"))
        .unwrap();
    assert_eq!(dev.default_branch, "develop");

    assert!(matches!(
        store.create_box(NewBox::named("a/b")),
        Err(MetaError::InvalidRecord(TypeError::InvalidBoxName { .. }))
    ));
    assert!(matches!(
        store.create_box(NewBox::named("x").with_default_branch("bad..branch")),
        Err(MetaError::InvalidBranchName { .. })
    ));
    assert!(store.get_box("global", "x").unwrap().is_none());
}

fn public_listing(store: &dyn MetadataStore) {
    let first = store.create_box(NewBox::named("first")).unwrap();
    store
        .create_box(NewBox::named("hidden").with_visibility(Visibility::Private))
        .unwrap();
    store
        .create_box(NewBox::named("quiet").with_visibility(Visibility::Unlisted))
        .unwrap();
    let second = store.create_box(NewBox::named("second")).unwrap();

    let names: Vec<_> = store
        .list_public_boxes()
        .unwrap()
        .into_iter()
        .map(|b| b.id)
        .collect();
    assert_eq!(names, vec![first.id, second.id]);
}

fn commit_round_trip(store: &dyn MetadataStore) {
    let box_id = demo_box(store);
    let entries = vec![
        entry("z.txt", "ff", 10),
        entry("a.txt", "aa", 1).with_mode(0o755),
        entry("m/readme.md", "aa", 1),
    ];
    let saved = store
        .save_commit(
            NewCommit::new(box_id.clone(), "main", entries.clone())
                .with_message("first")
                .with_author("ada"),
        )
        .unwrap();
    assert!(saved.is_root());

    let loaded = store.get_commit(&saved.id).unwrap().expect("commit exists");
    assert_eq!(loaded, saved);
    assert_eq!(loaded.entries, entries, "entries keep insertion order");
    assert_eq!(loaded.entry("a.txt").map(|e| e.mode), Some(0o755));

    // Saving a commit never moves a ref.
    assert!(store.read_ref(&box_id, "main").unwrap().is_none());
    assert!(store.get_commit(&CommitId::from("nope")).unwrap().is_none());
}

fn commit_validation(store: &dyn MetadataStore) {
    let box_id = demo_box(store);

    let err = store
        .save_commit(NewCommit::new(BoxId::from("missing"), "main", vec![]))
        .unwrap_err();
    assert!(matches!(err, MetaError::BoxNotFound(_)));

    let err = store
        .save_commit(NewCommit::new(
            box_id.clone(),
            "main",
            vec![entry("a", "aa", 1), entry("a", "bb", 2)],
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        MetaError::InvalidRecord(TypeError::DuplicatePath(_))
    ));

    let err = store
        .save_commit(NewCommit::new(box_id.clone(), "has space", vec![]))
        .unwrap_err();
    assert!(matches!(err, MetaError::InvalidBranchName { .. }));

    let first = commit(store, &box_id, None);
    let mut again = NewCommit::new(box_id, "main", vec![]);
    again.id = Some(first.clone());
    assert!(matches!(
        store.save_commit(again),
        Err(MetaError::CommitExists(id)) if id == first
    ));
}

fn ref_lifecycle(store: &dyn MetadataStore) {
    let box_id = demo_box(store);
    let c1 = commit(store, &box_id, None);
    let c2 = commit(store, &box_id, Some(&c1));
    let c3 = commit(store, &box_id, Some(&c2));

    assert!(store.read_ref(&box_id, "main").unwrap().is_none());
    assert!(store.latest_commit(&box_id, "main").unwrap().is_none());

    // Expecting a parent on an empty branch conflicts.
    let err = store.move_ref(&box_id, "main", Some(&c1), &c2).unwrap_err();
    assert!(err.is_conflict());
    assert!(store.read_ref(&box_id, "main").unwrap().is_none());

    store.move_ref(&box_id, "main", None, &c1).unwrap();
    assert_eq!(store.read_ref(&box_id, "main").unwrap(), Some(c1.clone()));

    // Expecting an empty branch once it has a head conflicts.
    let err = store.move_ref(&box_id, "main", None, &c2).unwrap_err();
    match err {
        MetaError::Conflict {
            expected, current, ..
        } => {
            assert_eq!(expected, None);
            assert_eq!(current, Some(c1.clone()));
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    store.move_ref(&box_id, "main", Some(&c1), &c2).unwrap();

    // A stale expectation conflicts and leaves the ref alone.
    let err = store.move_ref(&box_id, "main", Some(&c1), &c3).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(store.read_ref(&box_id, "main").unwrap(), Some(c2.clone()));

    let latest = store.latest_commit(&box_id, "main").unwrap().unwrap();
    assert_eq!(latest.id, c2);

    // Branches are independent.
    store.move_ref(&box_id, "feature/x", None, &c3).unwrap();
    assert_eq!(store.read_ref(&box_id, "main").unwrap(), Some(c2));
    assert_eq!(store.read_ref(&box_id, "feature/x").unwrap(), Some(c3));
}

fn ref_errors(store: &dyn MetadataStore) {
    let box_id = demo_box(store);
    let c1 = commit(store, &box_id, None);

    assert!(matches!(
        store.move_ref(&box_id, "main", None, &CommitId::from("ghost")),
        Err(MetaError::CommitNotFound(_))
    ));
    assert!(matches!(
        store.move_ref(&BoxId::from("ghost"), "main", None, &c1),
        Err(MetaError::BoxNotFound(_))
    ));
    let other_box = store.create_box(NewBox::named("other")).unwrap().id;
    let foreign = commit(store, &other_box, None);
    assert!(matches!(
        store.move_ref(&box_id, "main", None, &foreign),
        Err(MetaError::CommitNotFound(_))
    ));
    assert!(store.read_ref(&other_box, "main").unwrap().is_none());
    assert!(matches!(
        store.move_ref(&box_id, "bad..name", None, &c1),
        Err(MetaError::InvalidBranchName { .. })
    ));
    assert!(store.read_ref(&box_id, "main").unwrap().is_none());
}

fn history_walk(store: &dyn MetadataStore) {
    let box_id = demo_box(store);
    assert!(store.list_commits(&box_id, "main", 10).unwrap().is_empty());

    let c1 = commit(store, &box_id, None);
    store.move_ref(&box_id, "main", None, &c1).unwrap();
    let c2 = commit(store, &box_id, Some(&c1));
    store.move_ref(&box_id, "main", Some(&c1), &c2).unwrap();

    // Rejected by the ref, so never part of history.
    let orphan = commit(store, &box_id, Some(&c1));
    assert!(store.move_ref(&box_id, "main", Some(&c1), &orphan).is_err());

    let c3 = commit(store, &box_id, Some(&c2));
    store.move_ref(&box_id, "main", Some(&c2), &c3).unwrap();

    let ids: Vec<_> = store
        .list_commits(&box_id, "main", 10)
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![c3.clone(), c2.clone(), c1]);

    let ids: Vec<_> = store
        .list_commits(&box_id, "main", 2)
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![c3, c2]);
    assert!(store.list_commits(&box_id, "main", 0).unwrap().is_empty());
}

/// Many threads race to advance the same branch from the same parent; exactly
/// one may win and the rest must see a conflict.
pub(crate) fn racing_move_ref<S: MetadataStore + 'static>(store: Arc<S>) {
    const RACERS: usize = 8;

    let box_id = store.create_box(NewBox::named("race")).unwrap().id;
    let base = commit(store.as_ref(), &box_id, None);
    store.move_ref(&box_id, "main", None, &base).unwrap();

    for (branch, expected) in [("main", Some(base.clone())), ("fresh", None)] {
        let candidates: Vec<CommitId> = (0..RACERS)
            .map(|_| commit(store.as_ref(), &box_id, expected.as_ref()))
            .collect();
        let barrier = Arc::new(Barrier::new(RACERS));

        let handles: Vec<_> = candidates
            .iter()
            .cloned()
            .map(|candidate| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let box_id = box_id.clone();
                let expected = expected.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store
                        .move_ref(&box_id, branch, expected.as_ref(), &candidate)
                        .map(|()| candidate)
                })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            match handle.join().expect("racer should not panic") {
                Ok(id) => winners.push(id),
                Err(e) => assert!(e.is_conflict(), "unexpected error: {e:?}"),
            }
        }
        assert_eq!(winners.len(), 1, "exactly one racer wins on {branch}");
        assert_eq!(store.read_ref(&box_id, branch).unwrap().as_ref(), winners.first());
    }
}

/// Apply `ops` as `(new commit index, expected commit index)` pairs and check
/// every outcome against a single-variable model of the ref.
fn check_against_model(store: &dyn MetadataStore, ops: &[(usize, Option<usize>)]) {
    let box_id = demo_box(store);
    let commits: Vec<CommitId> = (0..4).map(|_| commit(store, &box_id, None)).collect();
    let mut model: Option<usize> = None;

    for &(target, expected) in ops {
        let result = store.move_ref(
            &box_id,
            "main",
            expected.map(|i| &commits[i]),
            &commits[target],
        );
        if model == expected {
            assert!(result.is_ok(), "move should succeed: {result:?}");
            model = Some(target);
        } else {
            assert!(result.is_err_and(|e| e.is_conflict()));
        }
        assert_eq!(
            store.read_ref(&box_id, "main").unwrap(),
            model.map(|i| commits[i].clone())
        );
    }
}

proptest! {
    #[test]
    fn move_ref_matches_model(
        ops in prop::collection::vec((0..4usize, prop::option::of(0..4usize)), 1..40)
    ) {
        check_against_model(&InMemoryMetaStore::new(), &ops);
        check_against_model(&SqliteMetaStore::open_in_memory().unwrap(), &ops);
    }
}
