// src/queue.rs
//! The inter-stage event queue: many pollers in, one broadcaster out, FIFO.
//! Pacing is a property of the producer handle, configured per deployment.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use tokio::sync::mpsc;

use crate::extract::Item;
use crate::sources::QueueCfg;

/// Wire encoding of one queued item, shared across subscribers without
/// re-serializing.
pub fn encode(item: &Item) -> Result<Arc<str>> {
    let json = serde_json::to_string(item).context("serializing item")?;
    Ok(Arc::from(json))
}

/// Producer handle cloned into every poller. `send` paces itself so one poll
/// cycle's batch does not hit subscribers as a single burst.
#[derive(Clone)]
pub struct QueueWriter {
    tx: mpsc::Sender<Arc<str>>,
    pace: Duration,
}

impl QueueWriter {
    pub async fn send(&self, item: &Item) -> Result<()> {
        let msg = encode(item)?;
        self.tx
            .send(msg)
            .await
            .map_err(|_| anyhow!("event queue closed"))?;
        if !self.pace.is_zero() {
            tokio::time::sleep(self.pace).await;
        }
        Ok(())
    }
}

pub fn event_queue(cfg: &QueueCfg) -> (QueueWriter, mpsc::Receiver<Arc<str>>) {
    let (tx, rx) = mpsc::channel(cfg.capacity.max(1));
    (
        QueueWriter {
            tx,
            pace: Duration::from_millis(cfg.pace_ms),
        },
        rx,
    )
}
