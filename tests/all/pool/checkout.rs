use crate::helpers::{assert_idle_busy_partition, get_pool, settings, MockBroker, MockChannel};
use carrot_pool::pool::{ChannelPool, Error, PoolSettings, PooledChannel};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::level_filters::LevelFilter;

#[tokio::test]
async fn bootstrap_opens_every_connection_and_channel() {
    // Arrange
    let broker = MockBroker::new();

    // Act
    let pool = get_pool(&broker, settings(2, 3)).await;

    // Assert
    let stats = pool.stats().await;
    assert_eq!(stats.connections, 2);
    assert_eq!(stats.channels, 6);
    assert!(stats.busy.is_empty());
    assert!(stats.closed.is_empty());
    let idle: Vec<u64> = stats.idle.iter().map(|id| id.as_u64()).collect();
    assert_eq!(idle, vec![100_001, 100_002, 100_003, 200_001, 200_002, 200_003]);
    assert_eq!(stats.active.get(&1), Some(&3));
    assert_eq!(stats.active.get(&2), Some(&3));
    assert_eq!(broker.connections().len(), 2);
}

#[tokio::test]
async fn connections_are_negotiated_with_the_configured_limits() {
    let broker = MockBroker::new();

    let pool = get_pool(
        &broker,
        settings(1, 1)
            .channel_max(64)
            .heartbeat(Duration::from_secs(5)),
    )
    .await;

    let options = broker.last_options().expect("No connection was opened");
    assert_eq!(options.channel_max, 64);
    assert_eq!(options.heartbeat, Duration::from_secs(5));
    assert_eq!(pool.settings().channel_max, 64);
}

#[tokio::test]
async fn unset_settings_fall_back_to_defaults() {
    let broker = MockBroker::new();

    let pool = get_pool(&broker, PoolSettings::default().connection_max(0).channel_active(0)).await;

    let stats = pool.stats().await;
    assert_eq!(stats.connections, 5);
    assert_eq!(stats.channels, 50);
}

#[tokio::test]
async fn bootstrap_fails_if_a_connection_cannot_be_opened() {
    // Arrange
    let broker = MockBroker::new();
    broker.refuse_connections(true);

    // Act
    let outcome = ChannelPool::new(broker.clone(), settings(2, 2)).await;

    // Assert
    assert!(matches!(
        outcome,
        Err(Error::Connect {
            connection_id: 1,
            ..
        })
    ));
}

#[tokio::test]
async fn connections_opened_before_a_bootstrap_failure_are_closed() {
    // Arrange
    let broker = MockBroker::new();
    broker.refuse_connection_attempt(2);

    // Act
    let outcome = ChannelPool::new(broker.clone(), settings(3, 2)).await;

    // Assert
    assert!(matches!(
        outcome,
        Err(Error::Connect {
            connection_id: 2,
            ..
        })
    ));
    let connections = broker.connections();
    assert_eq!(connections.len(), 1);
    assert!(!connections[0].is_alive());
}

#[tokio::test]
async fn oversized_layouts_are_rejected() {
    let broker = MockBroker::new();

    let outcome = ChannelPool::new(broker.clone(), settings(100, 1)).await;

    assert!(matches!(outcome, Err(Error::InvalidConfiguration(_))));
    assert!(broker.connections().is_empty());
}

#[tokio::test]
async fn channels_failing_at_bootstrap_are_skipped() {
    // Arrange
    let broker = MockBroker::new();
    broker.refuse_channels(true);

    // Act
    let pool = get_pool(&broker, settings(2, 3)).await;

    // Assert
    let stats = pool.stats().await;
    assert_eq!(stats.connections, 2);
    assert_eq!(stats.channels, 0);
    assert!(matches!(
        pool.get().await,
        Err(Error::OpenChannel { .. })
    ));
}

#[tokio::test]
async fn an_exhausted_pool_hands_out_temporary_channels() {
    // Arrange
    let broker = MockBroker::new();
    let pool = get_pool(&broker, settings(1, 2)).await;

    // Act
    let first = pool.get().await.unwrap();
    let second = pool.get().await.unwrap();
    let third = pool.get().await.unwrap();

    // Assert
    assert!(!first.is_temporary());
    assert!(!second.is_temporary());
    assert_ne!(first.id(), second.id());
    assert!(third.is_temporary());
    assert_eq!(third.id().as_u64(), 10_000_001);
    assert_eq!(third.id().connection_id(), 1);

    let stats = pool.stats().await;
    assert!(stats.idle.is_empty());
    assert_eq!(stats.busy, vec![first.id().min(second.id()), first.id().max(second.id())]);
    assert_eq!(stats.channels, 2);
}

#[tokio::test]
async fn temporary_channels_are_closed_when_pushed_back() {
    // Arrange
    let broker = MockBroker::new();
    let pool = get_pool(&broker, settings(1, 1)).await;
    let pooled = pool.get().await.unwrap();
    let temporary = pool.get().await.unwrap();
    let raw: MockChannel = (*temporary).clone();

    // Act
    pool.push(temporary).await;

    // Assert
    assert!(raw.is_closed());
    let stats = pool.stats().await;
    assert!(stats.idle.is_empty());
    assert_eq!(stats.busy, vec![pooled.id()]);
}

#[tokio::test]
async fn temporary_ids_keep_increasing() {
    let broker = MockBroker::new();
    let pool = get_pool(&broker, settings(1, 1)).await;
    let _pooled = pool.get().await.unwrap();

    let first = pool.get().await.unwrap();
    let first_id = first.id();
    pool.push(first).await;
    let second = pool.get().await.unwrap();

    assert_eq!(second.id().as_u64(), first_id.as_u64() + 1);
}

#[tokio::test]
async fn pushing_a_channel_makes_it_available_again() {
    // Arrange
    let broker = MockBroker::new();
    let pool = get_pool(&broker, settings(1, 1)).await;
    let channel = pool.get().await.unwrap();
    let id = channel.id();
    let serial = channel.serial();

    // Act
    pool.push(channel).await;
    let channel = pool.get().await.unwrap();

    // Assert
    assert_eq!(channel.id(), id);
    assert_eq!(channel.serial(), serial);
    assert!(!channel.is_temporary());
}

#[tokio::test]
async fn pushing_none_does_nothing() {
    let broker = MockBroker::new();
    let pool = get_pool(&broker, settings(1, 2)).await;
    let before = pool.stats().await;

    pool.push(None::<PooledChannel<MockChannel>>).await;

    assert_eq!(pool.stats().await, before);
}

#[tokio::test]
async fn every_channel_is_either_idle_or_busy() {
    // Arrange
    let broker = MockBroker::new();
    let pool = get_pool(&broker, settings(2, 3)).await;
    let mut held = Vec::new();

    // Act & Assert
    for round in 0..60 {
        if round % 3 == 2 && !held.is_empty() {
            let channel: PooledChannel<MockChannel> = held.remove(round % held.len());
            pool.push(channel).await;
        } else {
            let channel = pool.get().await.unwrap();
            if channel.is_temporary() {
                pool.push(channel).await;
            } else {
                held.push(channel);
            }
        }
        assert_idle_busy_partition(&pool.stats().await);
    }
    for channel in held {
        pool.push(channel).await;
    }
    let stats = pool.stats().await;
    assert_idle_busy_partition(&stats);
    assert_eq!(stats.idle.len(), 6);
}

#[tokio::test]
async fn checkouts_are_spread_across_connections() {
    let broker = MockBroker::new();
    let pool = get_pool(&broker, settings(2, 1)).await;
    let mut seen = HashSet::new();

    for _ in 0..64 {
        let channel = pool.get().await.unwrap();
        seen.insert(channel.id().connection_id());
        pool.push(channel).await;
    }

    assert_eq!(seen.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_never_share_a_channel() {
    // Arrange
    let broker = MockBroker::new();
    let pool = get_pool(&broker, settings(2, 4)).await;
    let holders: Arc<Mutex<HashSet<u64>>> = Arc::default();

    // Act
    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let pool = pool.clone();
            let holders = Arc::clone(&holders);
            tokio::spawn(async move {
                for _ in 0..10 {
                    let channel = pool.get().await.unwrap();
                    let id = channel.id().as_u64();
                    if !channel.is_temporary() {
                        assert!(
                            holders.lock().unwrap().insert(id),
                            "Channel {id} handed out twice"
                        );
                    }
                    tokio::task::yield_now().await;
                    if !channel.is_temporary() {
                        holders.lock().unwrap().remove(&id);
                    }
                    pool.push(channel).await;
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    // Assert
    let stats = pool.stats().await;
    assert_idle_busy_partition(&stats);
    assert_eq!(stats.idle.len(), 8);
}

#[tokio::test]
async fn log_level_can_be_changed_at_runtime() {
    let broker = MockBroker::new();
    let pool = get_pool(&broker, settings(1, 1)).await;
    assert_eq!(pool.log_level(), LevelFilter::TRACE);

    pool.set_log_level(LevelFilter::WARN);

    assert_eq!(pool.log_level(), LevelFilter::WARN);
    let clone = pool.clone();
    assert_eq!(clone.log_level(), LevelFilter::WARN);
}
