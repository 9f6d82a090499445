use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// State refresh requested by a completed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRequest {
    /// Re-read balances, token metadata, allowances and the event feed.
    ReloadState,
    /// Re-poll the event feed only.
    RefetchFeed,
}

/// Sending half handed to transaction completion effects.
#[derive(Debug, Clone)]
pub struct Refresher {
    tx: mpsc::UnboundedSender<RefreshRequest>,
}

impl Refresher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RefreshRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn request_reload(&self) {
        debug!("full state reload requested");
        // receiver gone means the session is shutting down
        let _ = self.tx.send(RefreshRequest::ReloadState);
    }

    /// Ask for a feed re-poll once `delay` has passed, giving the indexer time
    /// to pick up the new events. Must be called inside a tokio runtime.
    pub fn schedule_refetch(&self, delay: Duration) {
        debug!("feed refetch scheduled in {:?}", delay);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(RefreshRequest::RefetchFeed);
        });
    }
}
