use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;

/// Last time each group chat produced a message.
///
/// Groups that stay silent for longer than the retention window are forgotten.
#[derive(Clone)]
pub struct ActivityTracker {
    last_activity: Cache<i64, DateTime<Utc>>,
}

impl ActivityTracker {
    pub fn new(retention: Duration, max_capacity: u64) -> Self {
        let last_activity = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(retention)
            .build();

        Self { last_activity }
    }

    pub async fn record(&self, group_id: i64, now: DateTime<Utc>) {
        self.last_activity.insert(group_id, now).await;
    }

    pub async fn last_seen(&self, group_id: i64) -> Option<DateTime<Utc>> {
        self.last_activity.get(&group_id).await
    }

    /// Number of distinct groups seen within the retention window.
    pub async fn active_groups(&self) -> u64 {
        self.last_activity.run_pending_tasks().await;
        self.last_activity.entry_count()
    }
}
