/// Live report feed
///
/// Every committed report mutation is published on a broadcast channel.
/// Subscribers re-query the store on each notification, so a snapshot always
/// reflects committed state regardless of how many changes were coalesced.
use crate::{
    error::AppResult,
    metrics,
    reports::{ContentRef, Report, ReportStatus, StatusFilter},
    store::ReportStore,
};
use futures::stream::{self, Stream};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

/// A committed change to the report table
#[derive(Debug, Clone, PartialEq)]
pub enum ReportChange {
    Created { report_id: String },
    Transitioned { report_id: String, status: ReportStatus },
    Purged { item: ContentRef, count: u64 },
}

/// Broadcast hub for report changes
#[derive(Clone)]
pub struct ReportFeed {
    sender: broadcast::Sender<ReportChange>,
}

impl ReportFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a change. Having no subscribers is not an error.
    pub fn publish(&self, change: ReportChange) {
        tracing::trace!("Report change: {:?}", change);
        let _ = self.sender.send(change);
    }

    /// Subscribe to snapshots of `filter`, newest first, at most `limit` reports
    pub fn subscribe(
        &self,
        store: Arc<dyn ReportStore>,
        filter: StatusFilter,
        limit: i64,
    ) -> ReportSubscription {
        metrics::REPORT_SUBSCRIBERS_ACTIVE.inc();

        ReportSubscription {
            store,
            filter,
            limit,
            receiver: Some(self.sender.subscribe()),
            delivered_initial: false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Handle on a live report listing. Dropping it unsubscribes.
pub struct ReportSubscription {
    store: Arc<dyn ReportStore>,
    filter: StatusFilter,
    limit: i64,
    receiver: Option<broadcast::Receiver<ReportChange>>,
    delivered_initial: bool,
}

impl ReportSubscription {
    pub fn filter(&self) -> StatusFilter {
        self.filter
    }

    /// Wait for the next snapshot.
    ///
    /// The first call returns immediately with the current listing. Later calls
    /// wait for a change. Returns `Ok(None)` once unsubscribed or when the feed
    /// has shut down.
    pub async fn next_snapshot(&mut self) -> AppResult<Option<Vec<Report>>> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Ok(None);
        };

        if !self.delivered_initial {
            let snapshot = self.snapshot().await?;
            self.delivered_initial = true;
            return Ok(Some(snapshot));
        }

        match receiver.recv().await {
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                // The snapshot re-reads everything, so missed changes are covered
                tracing::debug!("Report subscriber lagged by {} changes", skipped);
            }
            Err(RecvError::Closed) => {
                self.unsubscribe();
                return Ok(None);
            }
        }

        // Coalesce anything else already queued into this snapshot
        if let Some(receiver) = self.receiver.as_mut() {
            while let Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) = receiver.try_recv() {}
        }

        self.snapshot().await.map(Some)
    }

    /// Stop listening. Later calls to [`next_snapshot`](Self::next_snapshot) return `Ok(None)`.
    pub fn unsubscribe(&mut self) {
        if self.receiver.take().is_some() {
            metrics::REPORT_SUBSCRIBERS_ACTIVE.dec();
        }
    }

    pub fn is_active(&self) -> bool {
        self.receiver.is_some()
    }

    /// Convert into a stream of snapshots that ends on unsubscribe
    pub fn into_stream(self) -> impl Stream<Item = AppResult<Vec<Report>>> {
        stream::unfold(self, |mut subscription| async move {
            match subscription.next_snapshot().await {
                Ok(Some(snapshot)) => Some((Ok(snapshot), subscription)),
                Ok(None) => None,
                Err(e) => {
                    subscription.unsubscribe();
                    Some((Err(e), subscription))
                }
            }
        })
    }

    async fn snapshot(&self) -> AppResult<Vec<Report>> {
        self.store.list(self.filter, self.limit).await
    }
}

impl Drop for ReportSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
