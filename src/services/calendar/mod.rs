pub mod google;

use async_trait::async_trait;

use crate::models::{BusyPeriod, EventRecord, TimeWindow};

/// Calendar transport. Each call may fail on its own; callers decide how to degrade.
#[async_trait]
pub trait CalendarBackend: Send + Sync {
    /// Aggregate free/busy feed.
    async fn query_busy(&self, window: &TimeWindow) -> anyhow::Result<Vec<BusyPeriod>>;

    /// Explicit event listing for the same window.
    async fn list_events(&self, window: &TimeWindow) -> anyhow::Result<Vec<EventRecord>>;

    /// Books `window`, which carries the owner's UTC offset. Returns a link to
    /// the created event when the backend provides one.
    async fn create_event(
        &self,
        window: &TimeWindow,
        label: &str,
        notes: &str,
    ) -> anyhow::Result<Option<String>>;
}
