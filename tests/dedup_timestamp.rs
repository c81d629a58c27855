// tests/dedup_timestamp.rs
use std::sync::Arc;

use scrapestream::dedup::{CursorUpdate, DedupEngine};
use scrapestream::extract::{FeedEntry, FeedSnapshot, Item};
use scrapestream::store::StateStore;

fn item(title: &str) -> Item {
    Item {
        site: "Example News".into(),
        title: title.into(),
        link: format!("https://news.example.com/{title}"),
        date: String::new(),
        summary: String::new(),
    }
}

fn snapshot(updated: i64, entries: &[(i64, &str)]) -> FeedSnapshot {
    FeedSnapshot {
        updated_unix: updated,
        entries: entries
            .iter()
            .map(|(ts, title)| FeedEntry {
                published_unix: *ts,
                item: item(title),
            })
            .collect(),
    }
}

fn engine() -> DedupEngine {
    DedupEngine::new(Arc::new(StateStore::in_memory().unwrap()))
}

#[test]
fn item_at_or_below_cursor_is_never_accepted() {
    let engine = engine();
    engine
        .commit("src", &CursorUpdate::LastUpdated(1_000))
        .unwrap();

    let screened = engine
        .screen_feed(
            "src",
            snapshot(2_000, &[(999, "older"), (1_000, "boundary"), (1_001, "newer")]),
        )
        .unwrap();

    let titles: Vec<&str> = screened.accepted.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["newer"]);
}

#[test]
fn cursor_lands_on_the_feed_level_updated_time() {
    let engine = engine();
    // Entries newer than the feed's own updated time: cursor still follows
    // the feed clock, not the max entry.
    let screened = engine
        .screen_feed("src", snapshot(1_500, &[(1_600, "early-bird")]))
        .unwrap();
    assert_eq!(screened.accepted.len(), 1);
    assert_eq!(screened.update, Some(CursorUpdate::LastUpdated(1_500)));
}

#[test]
fn zero_entry_cycle_still_advances_the_cursor() {
    let engine = engine();
    engine
        .commit("src", &CursorUpdate::LastUpdated(100))
        .unwrap();

    let screened = engine.screen_feed("src", snapshot(900, &[])).unwrap();
    assert!(screened.accepted.is_empty());
    assert_eq!(screened.update, Some(CursorUpdate::LastUpdated(900)));

    engine.commit("src", &screened.update.unwrap()).unwrap();
    let screened = engine
        .screen_feed("src", snapshot(900, &[(800, "covered")]))
        .unwrap();
    assert!(screened.accepted.is_empty());
}

#[test]
fn replaying_an_unchanged_feed_accepts_nothing() {
    let engine = engine();
    let snap = snapshot(2_000, &[(1_500, "a"), (1_800, "b")]);

    let first = engine.screen_feed("src", snap.clone()).unwrap();
    assert_eq!(first.accepted.len(), 2);
    engine.commit("src", &first.update.unwrap()).unwrap();

    let second = engine.screen_feed("src", snap).unwrap();
    assert!(second.accepted.is_empty());
}

#[test]
fn first_activation_baseline_accepts_everything_current() {
    let store = Arc::new(StateStore::in_memory().unwrap());
    let engine = DedupEngine::new(store.clone());
    engine.ensure_timestamp_cursor("src").unwrap();
    assert_eq!(
        store.get("src::last_updated").unwrap().as_deref(),
        Some("0")
    );

    let screened = engine
        .screen_feed("src", snapshot(2_000, &[(1, "everything"), (2, "is-new")]))
        .unwrap();
    assert_eq!(screened.accepted.len(), 2);
}
