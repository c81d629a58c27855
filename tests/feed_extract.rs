// tests/feed_extract.rs
use scrapestream::extract::feed::parse_snapshot;

const FEED_XML: &str = include_str!("fixtures/news_feed.xml");

#[test]
fn fixture_feed_parses_into_a_snapshot() {
    let snap = parse_snapshot(FEED_XML, "fallback").unwrap();

    // Tue, 07 Jan 2025 09:30:00 +0000
    assert_eq!(snap.updated_unix, 1_736_242_200);
    assert_eq!(snap.entries.len(), 3);

    let first = &snap.entries[0];
    assert_eq!(first.item.site, "Example News");
    assert_eq!(first.item.title, "Markets open higher");
    assert_eq!(
        first.item.link,
        "https://news.example.com/markets-open-higher"
    );
    assert_eq!(first.item.date, "Tue, 07 Jan 2025 09:00:00 +0000");
    assert_eq!(first.item.summary, "Stocks rose at the open & held gains.");
    assert_eq!(first.published_unix, 1_736_240_400);
}

#[test]
fn html_in_descriptions_is_stripped() {
    let snap = parse_snapshot(FEED_XML, "fallback").unwrap();
    assert_eq!(snap.entries[1].item.summary, "Commuters faced delays again.");
}

#[test]
fn undated_entry_is_kept_with_zero_timestamp() {
    let snap = parse_snapshot(FEED_XML, "fallback").unwrap();
    assert_eq!(snap.entries[2].published_unix, 0);
    assert_eq!(snap.entries[2].item.date, "");
}

#[test]
fn feed_without_updated_time_is_a_cycle_error() {
    let xml = r#"<rss><channel>
        <title>No clock here</title>
        <item><title>entry</title></item>
    </channel></rss>"#;
    assert!(parse_snapshot(xml, "fallback").is_err());
}
