// src/extract/markup.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::extract::{clean_text, Candidates, Extract, Item};
use crate::sources::{Selectors, SourceDescriptor};

pub struct MarkupExtractor;

/// Extract items from a fetched HTML document according to the source's
/// selector map.
///
/// - Missing `container`/`item` selector config, or a container selector
///   that matches nothing, skips the whole cycle (error).
/// - Per-field extraction inside an item never fails: a missing sub-selector,
///   an invalid sub-selector, or no matching element yields `""` for that
///   field and the item is kept.
/// - Root-relative links are resolved against the configured base address.
pub fn extract_items(html: &str, site: &str, selectors: &Selectors) -> Result<Vec<Item>> {
    let container = selectors
        .container
        .as_deref()
        .ok_or_else(|| anyhow!("source has no container selector"))?;
    let item = selectors
        .item
        .as_deref()
        .ok_or_else(|| anyhow!("source has no item selector"))?;

    let container_sel =
        Selector::parse(container).map_err(|_| anyhow!("invalid container selector"))?;
    let item_sel = Selector::parse(item).map_err(|_| anyhow!("invalid item selector"))?;

    let document = Html::parse_document(html);
    let container = document
        .select(&container_sel)
        .next()
        .ok_or_else(|| anyhow!("container selector matched nothing"))?;

    let mut out = Vec::new();
    for element in container.select(&item_sel) {
        let link = resolve_link(
            select_attr(&element, selectors.link.as_deref(), "href"),
            selectors.base_url.as_deref(),
        );
        out.push(Item {
            site: site.to_string(),
            title: select_text(&element, selectors.title.as_deref()),
            link,
            date: select_text(&element, selectors.date.as_deref()),
            summary: select_text(&element, selectors.summary.as_deref()),
        });
    }

    counter!("extract_items_total").increment(out.len() as u64);
    Ok(out)
}

/// Text of the first element matching `selector` under `element`, cleaned.
/// Any failure along the way is an empty string, never an error.
fn select_text(element: &ElementRef, selector: Option<&str>) -> String {
    let Some(raw) = selector else {
        return String::new();
    };
    let Ok(sel) = Selector::parse(raw) else {
        return String::new();
    };
    element
        .select(&sel)
        .next()
        .map(|el| clean_text(&el.text().collect::<Vec<_>>().join(" ")))
        .unwrap_or_default()
}

/// An attribute of the first element matching `selector`, or "".
fn select_attr(element: &ElementRef, selector: Option<&str>, attr: &str) -> String {
    let Some(raw) = selector else {
        return String::new();
    };
    let Ok(sel) = Selector::parse(raw) else {
        return String::new();
    };
    element
        .select(&sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Resolve a root-relative link against the source's configured base
/// address. Anything else passes through untouched.
fn resolve_link(link: String, base_url: Option<&str>) -> String {
    if !link.starts_with('/') {
        return link;
    }
    let Some(base) = base_url else {
        return link;
    };
    match Url::parse(base).and_then(|b| b.join(&link)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => link,
    }
}

#[async_trait]
impl Extract for MarkupExtractor {
    async fn extract(
        &self,
        client: &reqwest::Client,
        src: &SourceDescriptor,
    ) -> Result<Candidates> {
        let body = client
            .get(&src.url)
            .send()
            .await
            .with_context(|| format!("fetching page {}", src.url))?
            .text()
            .await
            .context("reading page body")?;
        Ok(Candidates::Markup(extract_items(
            &body,
            &src.name,
            &src.selectors,
        )?))
    }
}
