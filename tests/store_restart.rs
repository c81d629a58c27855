// tests/store_restart.rs
use std::sync::Arc;

use scrapestream::dedup::DedupEngine;
use scrapestream::store::StateStore;

#[test]
fn flushed_cursors_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let store = StateStore::open(&path).unwrap();
        store.set("src::last_updated", "1736242200");
        store.flush().unwrap();
    }

    let reopened = StateStore::open(&path).unwrap();
    assert_eq!(
        reopened.get("src::last_updated").unwrap().as_deref(),
        Some("1736242200")
    );
}

#[test]
fn unflushed_writes_are_lost_on_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let store = StateStore::open(&path).unwrap();
        store.set("src::last_updated", "999");
        // Crash before flush: the batch was never durably committed.
    }

    let reopened = StateStore::open(&path).unwrap();
    assert_eq!(reopened.get("src::last_updated").unwrap(), None);
}

#[test]
fn a_restart_after_flush_never_re_accepts_the_batch() {
    use scrapestream::extract::{FeedEntry, FeedSnapshot, Item};

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    let snapshot = FeedSnapshot {
        updated_unix: 2_000,
        entries: vec![FeedEntry {
            published_unix: 1_500,
            item: Item {
                site: "S".into(),
                title: "once only".into(),
                link: "https://example.com/1".into(),
                date: String::new(),
                summary: String::new(),
            },
        }],
    };

    {
        let engine = DedupEngine::new(Arc::new(StateStore::open(&path).unwrap()));
        let screened = engine.screen_feed("src", snapshot.clone()).unwrap();
        assert_eq!(screened.accepted.len(), 1);
        engine.commit("src", &screened.update.unwrap()).unwrap();
    }

    // New process, same disk state.
    let engine = DedupEngine::new(Arc::new(StateStore::open(&path).unwrap()));
    let screened = engine.screen_feed("src", snapshot).unwrap();
    assert!(screened.accepted.is_empty());
}

#[test]
fn ring_state_survives_a_restart() {
    use scrapestream::extract::Item;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    let page = vec![Item {
        site: "Board".into(),
        title: "hello".into(),
        link: "https://example.com/hello".into(),
        date: String::new(),
        summary: String::new(),
    }];

    {
        let engine = DedupEngine::new(Arc::new(StateStore::open(&path).unwrap()));
        let screened = engine.screen_markup("src", page.clone()).unwrap();
        engine.commit("src", &screened.update.unwrap()).unwrap();
    }

    let engine = DedupEngine::new(Arc::new(StateStore::open(&path).unwrap()));
    let screened = engine.screen_markup("src", page).unwrap();
    assert!(screened.accepted.is_empty());
}
