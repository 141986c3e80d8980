use super::ids::{next_temporary_counter, temporary_counter_seed, ChannelId};
use std::collections::HashSet;
use std::sync::Arc;

/// One broker connection and the bookkeeping the pool keeps for it.
pub(crate) struct ConnectionRecord<C> {
    id: usize,
    pub(crate) connection: Arc<C>,
    /// Last temporary id minted on this connection.
    temporary_counter: u64,
    /// Pool-slot ids currently backed by an open channel on this connection.
    pub(crate) active: HashSet<ChannelId>,
}

impl<C> ConnectionRecord<C> {
    pub(crate) fn new(id: usize, connection: C) -> Self {
        Self {
            id,
            connection: Arc::new(connection),
            temporary_counter: temporary_counter_seed(id),
            active: HashSet::new(),
        }
    }

    /// A record for a fresh connection occupying the same slot.
    ///
    /// The temporary-id counter carries over so that overflow ids are never reused while
    /// an old holder may still have them.
    pub(crate) fn replaced_by(&self, connection: C) -> Self {
        Self {
            id: self.id,
            connection: Arc::new(connection),
            temporary_counter: self.temporary_counter,
            active: HashSet::new(),
        }
    }

    pub(crate) fn mint_temporary_id(&mut self) -> ChannelId {
        self.temporary_counter = next_temporary_counter(self.id, self.temporary_counter);
        ChannelId::temporary(self.temporary_counter)
    }
}
