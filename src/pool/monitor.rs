//! The background task keeping a [`ChannelPool`] healthy.
use super::{ChannelPool, Inner};
use crate::broker::Broker;
use std::sync::Weak;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Run [`ChannelPool::health_check`] every `period`, starting one `period` from now.
///
/// The task only holds a weak reference to the pool and exits once the pool is dropped.
/// Ticks never overlap: a slow pass delays the next one.
pub(super) fn spawn<B: Broker>(pool: Weak<Inner<B>>, period: Duration) {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(inner) = pool.upgrade() else {
                break;
            };
            ChannelPool { inner }.health_check().await;
        }
        debug!("Channel pool dropped, health monitor stopped");
    });
}
