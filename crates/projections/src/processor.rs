//! Feeds lifecycle events to projections.

use futures_util::StreamExt;
use lifecycle_log::{LifecycleEvent, LifecycleStore};
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Delivers the lifecycle log to registered projections.
///
/// - Catch-up: replays the global log, handing each projection only the
///   events past its position
/// - Rebuild: resets every projection and replays from the start
///
/// Catch-up runs one at a time so two readers refreshing together never
/// hand the same event to a projection twice.
pub struct ProjectionProcessor<S: LifecycleStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    catch_up_lock: Mutex<()>,
}

impl<S: LifecycleStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up_lock: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Brings every projection up to the end of the log.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<()> {
        let _guard = self.catch_up_lock.lock().await;

        let mut stream = self.store.stream_all_events().await?;
        let mut index: u64 = 0;
        let mut delivered: u64 = 0;

        while let Some(result) = stream.next().await {
            let event = result?;
            index += 1;

            for projection in &self.projections {
                if projection.position().await.events_processed < index {
                    self.deliver(projection.as_ref(), &event).await?;
                    delivered += 1;
                }
            }
        }

        if delivered > 0 {
            tracing::debug!(log_length = index, delivered, "catch-up complete");
        }
        Ok(())
    }

    async fn deliver(&self, projection: &dyn Projection, event: &LifecycleEvent) -> Result<()> {
        projection.handle(event).await.inspect_err(|e| {
            tracing::error!(
                projection = projection.name(),
                event_id = %event.event_id,
                error = %e,
                "projection failed"
            );
        })?;
        metrics::counter!("projections_events_processed", "projection" => projection.name())
            .increment(1);
        Ok(())
    }

    /// Resets all projections and replays the whole log.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
        }
        self.run_catch_up().await
    }
}
