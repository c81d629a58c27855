// src/extract/mod.rs
pub mod feed;
pub mod markup;

use anyhow::Result;
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;

use crate::sources::{SourceDescriptor, StrategyKind};

/// One normalized unit of content. Immutable once produced; it carries no
/// identity of its own, the dedup engine derives one from the content.
/// Serialized as-is for transport to subscribers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Item {
    pub site: String,
    pub title: String,
    pub link: String,
    pub date: String,
    pub summary: String,
}

/// A feed document as seen during one poll: the feed's own updated time plus
/// its entries in document order.
#[derive(Debug, Clone)]
pub struct FeedSnapshot {
    pub updated_unix: i64,
    pub entries: Vec<FeedEntry>,
}

#[derive(Debug, Clone)]
pub struct FeedEntry {
    pub published_unix: i64,
    pub item: Item,
}

/// What a strategy hands back to the poller. The dedup step differs by
/// shape: feed candidates carry timestamps, markup candidates are screened
/// by content hash.
#[derive(Debug)]
pub enum Candidates {
    Feed(FeedSnapshot),
    Markup(Vec<Item>),
}

#[async_trait::async_trait]
pub trait Extract: Send + Sync {
    async fn extract(
        &self,
        client: &reqwest::Client,
        src: &SourceDescriptor,
    ) -> Result<Candidates>;
}

pub fn extractor_for(kind: StrategyKind) -> Box<dyn Extract> {
    match kind {
        StrategyKind::Feed => Box::new(feed::FeedExtractor),
        StrategyKind::Markup => Box::new(markup::MarkupExtractor),
    }
}

/// Normalize extracted text: decode HTML entities, strip tags, collapse
/// whitespace, trim.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}
