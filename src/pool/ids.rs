use std::fmt;

/// Pool-slot ids are `connection_id * SLOT_ID_BASE + slot`.
pub(crate) const SLOT_ID_BASE: u64 = 100_000;
/// Temporary ids are `connection_id * TEMPORARY_ID_BASE + counter`.
///
/// Anything at or above this threshold is a temporary id.
pub(crate) const TEMPORARY_ID_BASE: u64 = 10_000_000;

/// Identity of a channel handed out by the pool.
///
/// Pool-slot ids are stable for the life of the pool. Temporary ids are minted when the pool
/// is exhausted and never come back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// The id of the `slot`-th pooled channel of connection `connection_id`, both 1-based.
    pub fn slot(connection_id: usize, slot: usize) -> Self {
        Self(connection_id as u64 * SLOT_ID_BASE + slot as u64)
    }

    pub(crate) fn temporary(counter: u64) -> Self {
        Self(counter)
    }

    /// `true` for overflow channels.
    pub fn is_temporary(self) -> bool {
        self.0 >= TEMPORARY_ID_BASE
    }

    /// The connection the channel was opened on.
    pub fn connection_id(self) -> usize {
        let base = if self.is_temporary() {
            TEMPORARY_ID_BASE
        } else {
            SLOT_ID_BASE
        };
        (self.0 / base) as usize
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// First value of the temporary-id counter of a connection.
pub(crate) fn temporary_counter_seed(connection_id: usize) -> u64 {
    connection_id as u64 * TEMPORARY_ID_BASE
}

/// Next value of a temporary-id counter, wrapping inside the connection's own range.
pub(crate) fn next_temporary_counter(connection_id: usize, counter: u64) -> u64 {
    let seed = temporary_counter_seed(connection_id);
    let next = counter + 1;
    if next >= seed + TEMPORARY_ID_BASE {
        seed + 1
    } else {
        next
    }
}
