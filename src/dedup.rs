// src/dedup.rs
//! Decides which extracted candidates are new, per source, against a
//! persisted cursor. Screening is read-only; the poller enqueues the
//! accepted items first and then commits the proposed cursor update, so a
//! crash between the two re-delivers instead of dropping (at-least-once).

use std::sync::Arc;

use anyhow::{Context, Result};
use metrics::counter;
use sha2::{Digest, Sha256};

use crate::extract::{FeedSnapshot, Item};
use crate::store::StateStore;

/// The ring must hold at least as many hashes as a source typically shows at
/// once, or old items get re-announced as new.
pub const RING_CAPACITY: usize = 100;

fn last_updated_key(source_id: &str) -> String {
    format!("{source_id}::last_updated")
}

fn hashes_key(source_id: &str) -> String {
    format!("{source_id}::hashes")
}

/// Proposed cursor movement. Applied via `commit` only after the accepted
/// items are on the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum CursorUpdate {
    LastUpdated(i64),
    Hashes(Vec<String>),
}

#[derive(Debug)]
pub struct Screened {
    pub accepted: Vec<Item>,
    pub update: Option<CursorUpdate>,
}

/// Content hash over every normalized item field, separator-delimited.
pub fn content_hash(item: &Item) -> String {
    let mut hasher = Sha256::new();
    for field in [
        &item.site,
        &item.title,
        &item.link,
        &item.date,
        &item.summary,
    ] {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
}

pub struct DedupEngine {
    store: Arc<StateStore>,
}

impl DedupEngine {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    /// First-activation baseline: an absent timestamp cursor is initialized
    /// to the epoch, so the very first poll treats everything current as new.
    /// Hash rings need no initialization; an absent ring reads as empty.
    pub fn ensure_timestamp_cursor(&self, source_id: &str) -> Result<()> {
        let key = last_updated_key(source_id);
        if self.store.get(&key)?.is_none() {
            self.store.set(&key, "0");
            self.store.flush()?;
        }
        Ok(())
    }

    fn read_timestamp(&self, source_id: &str) -> Result<i64> {
        // Stored stringified; older deployments wrote float strings.
        Ok(self
            .store
            .get(&last_updated_key(source_id))?
            .and_then(|v| v.parse::<f64>().ok())
            .map(|v| v as i64)
            .unwrap_or(0))
    }

    fn read_ring(&self, source_id: &str) -> Result<Vec<String>> {
        match self.store.get(&hashes_key(source_id))? {
            Some(s) => serde_json::from_str(&s).context("decoding hash ring"),
            None => Ok(Vec::new()),
        }
    }

    /// Timestamp strategy. Entries are only examined when the feed-level
    /// updated time moved past the cursor; an entry is new iff its own
    /// timestamp exceeds the cursor. The proposed cursor is the feed-level
    /// updated time (not the max entry time), clamped so it never moves
    /// backwards, and it advances even when zero entries were new.
    pub fn screen_feed(&self, source_id: &str, snapshot: FeedSnapshot) -> Result<Screened> {
        let cursor = self.read_timestamp(source_id)?;
        let mut accepted = Vec::new();
        let mut deduped = 0u64;

        if snapshot.updated_unix > cursor {
            for entry in snapshot.entries {
                if entry.published_unix > cursor {
                    accepted.push(entry.item);
                } else {
                    deduped += 1;
                }
            }
        } else {
            deduped = snapshot.entries.len() as u64;
        }

        counter!("items_deduped_total").increment(deduped);
        Ok(Screened {
            accepted,
            update: Some(CursorUpdate::LastUpdated(snapshot.updated_unix.max(cursor))),
        })
    }

    /// Hash-ring strategy. An item is new iff its content hash is absent
    /// from the ring; acceptance appends to the tail and evicts the head
    /// past capacity. A cycle with no items (or no changes) proposes no
    /// update: absence of items is not the same as "all seen".
    pub fn screen_markup(&self, source_id: &str, items: Vec<Item>) -> Result<Screened> {
        if items.is_empty() {
            return Ok(Screened {
                accepted: Vec::new(),
                update: None,
            });
        }

        let mut ring = self.read_ring(source_id)?;
        let mut accepted = Vec::new();
        let mut deduped = 0u64;
        let mut changed = false;

        for item in items {
            let hash = content_hash(&item);
            if ring.contains(&hash) {
                deduped += 1;
                continue;
            }
            ring.push(hash);
            if ring.len() > RING_CAPACITY {
                ring.remove(0);
            }
            changed = true;
            accepted.push(item);
        }

        counter!("items_deduped_total").increment(deduped);
        Ok(Screened {
            accepted,
            update: changed.then_some(CursorUpdate::Hashes(ring)),
        })
    }

    /// Persist a proposed cursor update and flush it to disk. Once this
    /// returns Ok, the batch it covers will not be re-delivered after a
    /// restart.
    pub fn commit(&self, source_id: &str, update: &CursorUpdate) -> Result<()> {
        match update {
            CursorUpdate::LastUpdated(ts) => {
                self.store.set(&last_updated_key(source_id), &ts.to_string());
            }
            CursorUpdate::Hashes(ring) => {
                let encoded = serde_json::to_string(ring).context("encoding hash ring")?;
                self.store.set(&hashes_key(source_id), &encoded);
            }
        }
        self.store.flush()
    }
}
