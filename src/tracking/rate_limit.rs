use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use moka::ops::compute::{CompResult, Op};

/// Per-user cooldown between processed messages.
///
/// Entries only matter while they are younger than the cooldown, so the cache
/// TTL equals the cooldown and the map never outgrows its capacity.
#[derive(Clone)]
pub struct RateLimiter {
    last_message: Cache<i64, DateTime<Utc>>,
    cooldown: Duration,
}

impl RateLimiter {
    pub fn new(cooldown: Duration, max_capacity: u64) -> Self {
        let last_message = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(cooldown.max(Duration::from_secs(1)))
            .build();

        Self {
            last_message,
            cooldown,
        }
    }

    /// Returns `true` and records `now` if the user may be served, `false` if
    /// the previous processed message is still within the cooldown.
    ///
    /// A throttled call leaves the stored timestamp unchanged.
    pub async fn check(&self, user_id: i64, now: DateTime<Utc>) -> bool {
        let cooldown = self.cooldown;
        let result = self
            .last_message
            .entry(user_id)
            .and_compute_with(|entry| {
                let op = match entry {
                    Some(last) if within(*last.value(), now, cooldown) => Op::Nop,
                    _ => Op::Put(now),
                };
                std::future::ready(op)
            })
            .await;

        let allowed = matches!(
            result,
            CompResult::Inserted(_) | CompResult::ReplacedWith(_)
        );
        if !allowed {
            tracing::debug!("Throttled message from user {}", user_id);
        }
        allowed
    }
}

/// A clock that went backwards counts as "within" the cooldown.
fn within(last: DateTime<Utc>, now: DateTime<Utc>, cooldown: Duration) -> bool {
    now.signed_duration_since(last)
        .to_std()
        .map_or(true, |elapsed| elapsed < cooldown)
}
