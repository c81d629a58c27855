// src/broadcast.rs
//! Fan-out of queued items to every live subscriber connection. Each client
//! gets its own unbounded channel; the websocket task drains it. A failed
//! send means the client went away, so it is dropped from the set without
//! touching the others.

use std::sync::{Arc, Mutex};

use metrics::{counter, gauge};
use tokio::sync::mpsc;

struct ClientHandle {
    id: String,
    sender: mpsc::UnboundedSender<Arc<str>>,
}

#[derive(Default)]
pub struct SubscriberSet {
    clients: Mutex<Vec<ClientHandle>>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. The returned receiver yields every item
    /// broadcast from this moment on; there is no backlog replay.
    pub fn add(&self, id: &str) -> mpsc::UnboundedReceiver<Arc<str>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut clients = self.clients.lock().expect("subscriber set lock poisoned");
        clients.push(ClientHandle {
            id: id.to_string(),
            sender: tx,
        });
        gauge!("subscribers_connected").set(clients.len() as f64);
        tracing::info!(client = id, "subscriber connected");
        rx
    }

    pub fn remove(&self, id: &str) {
        let mut clients = self.clients.lock().expect("subscriber set lock poisoned");
        clients.retain(|c| c.id != id);
        gauge!("subscribers_connected").set(clients.len() as f64);
        tracing::info!(client = id, "subscriber disconnected");
    }

    pub fn len(&self) -> usize {
        self.clients
            .lock()
            .expect("subscriber set lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send one message to every current subscriber. Clients whose channel
    /// is gone are evicted; delivery to the rest is unaffected.
    pub fn broadcast(&self, msg: Arc<str>) {
        let mut clients = self.clients.lock().expect("subscriber set lock poisoned");
        clients.retain(|client| match client.sender.send(Arc::clone(&msg)) {
            Ok(()) => true,
            Err(_) => {
                counter!("broadcast_send_failures_total").increment(1);
                tracing::debug!(client = client.id, "dropping unreachable subscriber");
                false
            }
        });
        gauge!("subscribers_connected").set(clients.len() as f64);
    }
}

/// The broadcaster loop: drain the event queue strictly FIFO, fanning each
/// item out to whoever is connected at that moment. Runs until the queue's
/// last producer is dropped.
pub async fn run(mut rx: mpsc::Receiver<Arc<str>>, subscribers: Arc<SubscriberSet>) {
    while let Some(msg) = rx.recv().await {
        subscribers.broadcast(msg);
        counter!("broadcast_messages_total").increment(1);
    }
    tracing::info!("event queue closed, broadcaster stopping");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_gets_exactly_one_copy() {
        let set = SubscriberSet::new();
        let mut rx1 = set.add("c1");
        let mut rx2 = set.add("c2");
        let mut rx3 = set.add("c3");

        set.broadcast(Arc::from("{\"title\":\"x\"}"));

        for rx in [&mut rx1, &mut rx2, &mut rx3] {
            let msg = rx.recv().await.unwrap();
            assert_eq!(&*msg, "{\"title\":\"x\"}");
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn one_dead_subscriber_does_not_block_the_rest() {
        let set = SubscriberSet::new();
        let mut rx1 = set.add("alive-1");
        let rx2 = set.add("dead");
        let mut rx3 = set.add("alive-2");
        drop(rx2);

        set.broadcast(Arc::from("payload"));

        assert_eq!(&*rx1.recv().await.unwrap(), "payload");
        assert_eq!(&*rx3.recv().await.unwrap(), "payload");
        assert_eq!(set.len(), 2);
    }

    #[tokio::test]
    async fn unregistered_subscriber_receives_nothing_new() {
        let set = SubscriberSet::new();
        let mut rx = set.add("c1");
        set.broadcast(Arc::from("first"));
        set.remove("c1");
        set.broadcast(Arc::from("second"));

        assert_eq!(&*rx.recv().await.unwrap(), "first");
        assert!(rx.recv().await.is_none());
    }
}
