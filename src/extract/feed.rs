// src/extract/feed.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime, UtcOffset};

use crate::extract::{clean_text, Candidates, Extract, FeedEntry, FeedSnapshot, Item};
use crate::sources::SourceDescriptor;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    title: Option<String>,
    #[serde(rename = "lastBuildDate")]
    last_build_date: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "item", default)]
    item: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rfc2822_to_unix(ts: &str) -> Option<i64> {
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC).unix_timestamp())
}

/// Parse a fetched feed document into a snapshot. The feed-level updated
/// time (lastBuildDate, falling back to channel pubDate) is authoritative
/// for the timestamp cursor; a feed without one is treated like a fetch
/// failure and retried on the next tick.
pub fn parse_snapshot(xml: &str, fallback_site: &str) -> Result<FeedSnapshot> {
    let t0 = std::time::Instant::now();
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).context("parsing feed xml")?;

    let updated_unix = rss
        .channel
        .last_build_date
        .as_deref()
        .or(rss.channel.pub_date.as_deref())
        .and_then(parse_rfc2822_to_unix)
        .ok_or_else(|| anyhow!("feed has no parseable updated time"))?;

    let site = rss
        .channel
        .title
        .as_deref()
        .map(clean_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| fallback_site.to_string());

    let mut entries = Vec::with_capacity(rss.channel.item.len());
    for it in rss.channel.item {
        let date_raw = it.pub_date.clone().unwrap_or_default();
        entries.push(FeedEntry {
            published_unix: it
                .pub_date
                .as_deref()
                .and_then(parse_rfc2822_to_unix)
                .unwrap_or(0),
            item: Item {
                site: site.clone(),
                title: clean_text(it.title.as_deref().unwrap_or_default()),
                link: it.link.unwrap_or_default(),
                date: date_raw,
                summary: clean_text(it.description.as_deref().unwrap_or_default()),
            },
        });
    }

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("extract_parse_ms").record(ms);
    counter!("extract_items_total").increment(entries.len() as u64);

    Ok(FeedSnapshot {
        updated_unix,
        entries,
    })
}

pub struct FeedExtractor;

#[async_trait]
impl Extract for FeedExtractor {
    async fn extract(
        &self,
        client: &reqwest::Client,
        src: &SourceDescriptor,
    ) -> Result<Candidates> {
        let body = client
            .get(&src.url)
            .send()
            .await
            .with_context(|| format!("fetching feed {}", src.url))?
            .text()
            .await
            .context("reading feed body")?;
        Ok(Candidates::Feed(parse_snapshot(&body, &src.name)?))
    }
}

// quick-xml rejects named HTML entities that real-world feeds embed anyway.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
