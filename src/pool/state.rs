use super::channel::ChannelRecord;
use super::connection::ConnectionRecord;
use super::ids::ChannelId;
use crate::broker::{Broker, BrokerConnection};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Everything the pool knows, guarded as a whole by the pool's lock.
///
/// A resident pool-slot id is either in `idle` or in `busy`, never in both.
/// Temporary ids never enter this structure.
pub(crate) struct PoolState<B: Broker> {
    pub(crate) connections: HashMap<usize, ConnectionRecord<B::Connection>>,
    pub(crate) channels: HashMap<ChannelId, ChannelRecord<B::Channel>>,
    pub(crate) idle: Vec<ChannelId>,
    pub(crate) busy: HashSet<ChannelId>,
    rng: StdRng,
}

impl<B: Broker> PoolState<B> {
    pub(crate) fn new(connections: HashMap<usize, ConnectionRecord<B::Connection>>) -> Self {
        Self {
            connections,
            channels: HashMap::new(),
            idle: Vec::new(),
            busy: HashSet::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Register a freshly opened pool-slot channel as idle.
    pub(crate) fn admit(&mut self, id: ChannelId, record: ChannelRecord<B::Channel>) {
        self.channels.insert(id, record);
        if !self.idle.contains(&id) {
            self.idle.push(id);
        }
        self.busy.remove(&id);
        if let Some(connection) = self.connections.get_mut(&id.connection_id()) {
            connection.active.insert(id);
        }
    }

    /// Remove a uniformly random id from the idle list.
    pub(crate) fn take_random_idle(&mut self) -> Option<ChannelId> {
        if self.idle.is_empty() {
            return None;
        }
        let index = self.rng.gen_range(0..self.idle.len());
        Some(self.idle.swap_remove(index))
    }

    pub(crate) fn random_connection_id(&mut self, connection_max: usize) -> usize {
        self.rng.gen_range(1..=connection_max)
    }

    pub(crate) fn remove_idle(&mut self, id: ChannelId) {
        self.idle.retain(|candidate| *candidate != id);
    }

    pub(crate) fn is_connection_closed(&self, connection_id: usize) -> bool {
        self.connections
            .get(&connection_id)
            .map_or(true, |record| record.connection.is_closed())
    }

    pub(crate) fn connection(&self, connection_id: usize) -> Option<Arc<B::Connection>> {
        self.connections
            .get(&connection_id)
            .map(|record| Arc::clone(&record.connection))
    }

    pub(crate) fn active_channels(&self, connection_id: usize) -> usize {
        self.connections
            .get(&connection_id)
            .map_or(0, |record| record.active.len())
    }

    /// Resident ids that are neither idle nor busy are put back in the idle list.
    pub(crate) fn readmit_orphans(&mut self) -> Vec<ChannelId> {
        let mut orphans: Vec<ChannelId> = self
            .channels
            .keys()
            .filter(|id| !self.busy.contains(id) && !self.idle.contains(id))
            .copied()
            .collect();
        orphans.sort();
        self.idle.extend(orphans.iter().copied());
        orphans
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let mut idle = self.idle.clone();
        idle.sort();
        let mut busy: Vec<ChannelId> = self.busy.iter().copied().collect();
        busy.sort();
        let mut closed: Vec<ChannelId> = self
            .channels
            .iter()
            .filter(|(_, record)| record.closed)
            .map(|(id, _)| *id)
            .collect();
        closed.sort();
        PoolStats {
            connections: self.connections.len(),
            channels: self.channels.len(),
            idle,
            busy,
            closed,
            active: self
                .connections
                .iter()
                .map(|(id, record)| (*id, record.active.len()))
                .collect(),
        }
    }
}

/// A point-in-time view of a [`ChannelPool`](super::ChannelPool).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub connections: usize,
    /// Resident pool-slot channels, open or closed.
    pub channels: usize,
    pub idle: Vec<ChannelId>,
    pub busy: Vec<ChannelId>,
    /// Resident ids whose broker channel has been reclaimed.
    pub closed: Vec<ChannelId>,
    /// Open pool-slot channels per connection id.
    pub active: BTreeMap<usize, usize>,
}
