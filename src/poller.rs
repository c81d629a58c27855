// src/poller.rs
//! One scheduled task per source: extract, screen, enqueue, commit, sleep.
//! A poller never terminates on failure; transient source outages heal on
//! the next tick.

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use tokio::task::JoinHandle;

use crate::dedup::DedupEngine;
use crate::extract::{self, Candidates, Extract};
use crate::queue::QueueWriter;
use crate::sources::{SourceDescriptor, StrategyKind};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_cycles_total", "Poll cycles started, across sources.");
        describe_counter!(
            "poll_errors_total",
            "Poll cycles aborted by a fetch/parse error."
        );
        describe_counter!(
            "storage_errors_total",
            "Cursor commits that failed to reach disk."
        );
        describe_counter!("extract_items_total", "Candidate items extracted.");
        describe_counter!("items_accepted_total", "Items accepted as new and enqueued.");
        describe_counter!("items_deduped_total", "Candidates screened out as seen.");
        describe_histogram!("extract_parse_ms", "Document parse time in milliseconds.");
        describe_counter!("broadcast_messages_total", "Items fanned out to subscribers.");
        describe_counter!(
            "broadcast_send_failures_total",
            "Sends dropped because the subscriber went away."
        );
        describe_gauge!("subscribers_connected", "Currently connected subscribers.");
        describe_gauge!("poll_last_run_ts", "Unix ts of the most recent poll cycle.");
    });
}

/// Spawn one polling task per configured source. Shared resources (http
/// client, dedup engine over the state store, queue writer) are injected;
/// nothing here is ambient.
pub fn spawn_pollers(
    sources: Vec<SourceDescriptor>,
    client: reqwest::Client,
    dedup: Arc<DedupEngine>,
    queue: QueueWriter,
) -> Vec<JoinHandle<()>> {
    ensure_metrics_described();
    sources
        .into_iter()
        .map(|src| {
            let client = client.clone();
            let dedup = dedup.clone();
            let queue = queue.clone();
            tokio::spawn(async move { run_source(src, client, dedup, queue).await })
        })
        .collect()
}

async fn run_source(
    src: SourceDescriptor,
    client: reqwest::Client,
    dedup: Arc<DedupEngine>,
    queue: QueueWriter,
) {
    if src.strategy == StrategyKind::Feed {
        // Baseline so the first poll treats everything current as new.
        if let Err(e) = dedup.ensure_timestamp_cursor(&src.id) {
            tracing::error!(error = ?e, source = %src.name, "cursor init failed");
            counter!("storage_errors_total").increment(1);
        }
    }

    let extractor = extract::extractor_for(src.strategy);
    let mut ticker = tokio::time::interval(src.interval);
    loop {
        // First tick fires immediately; later ticks pace the loop.
        ticker.tick().await;
        if let Err(e) = run_cycle(&src, &client, &dedup, &queue, extractor.as_ref()).await {
            tracing::warn!(error = ?e, source = %src.name, "poll cycle failed");
            counter!("poll_errors_total").increment(1);
        }
    }
}

/// One poll cycle. Accepted items go onto the queue (paced) before the
/// cursor is committed, so a crash in between re-delivers rather than
/// drops. A commit failure is logged and absorbed: the cycle's decisions
/// simply are not durable yet.
async fn run_cycle(
    src: &SourceDescriptor,
    client: &reqwest::Client,
    dedup: &DedupEngine,
    queue: &QueueWriter,
    extractor: &dyn Extract,
) -> Result<()> {
    tracing::info!(source = %src.name, url = %src.url, "checking source");
    counter!("poll_cycles_total").increment(1);

    let candidates = extractor.extract(client, src).await?;
    let screened = match candidates {
        Candidates::Feed(snapshot) => dedup.screen_feed(&src.id, snapshot)?,
        Candidates::Markup(items) => dedup.screen_markup(&src.id, items)?,
    };

    for item in &screened.accepted {
        tracing::debug!(source = %src.name, title = %item.title, "new item");
        queue
            .send(item)
            .await
            .context("enqueueing accepted item")?;
    }
    counter!("items_accepted_total").increment(screened.accepted.len() as u64);

    if let Some(update) = screened.update {
        if let Err(e) = dedup.commit(&src.id, &update) {
            tracing::error!(error = ?e, source = %src.name, "cursor commit failed");
            counter!("storage_errors_total").increment(1);
        }
    }

    let now = chrono::Utc::now().timestamp().max(0);
    gauge!("poll_last_run_ts").set(now as f64);
    Ok(())
}
