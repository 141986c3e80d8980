use super::ids::ChannelId;
use super::Error;
use crate::broker::{BrokerChannel, Confirmation};
use std::fmt;
use std::ops::Deref;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Capacity of the confirmation queue created by [`PooledChannel::enable_confirm`].
const CONFIRMATION_QUEUE_CAPACITY: usize = 1;

/// What the pool knows about one of its pool-slot channels.
///
/// While the channel is checked out the broker channel (and its confirmation subscription)
/// lives in the caller's [`PooledChannel`]; it comes back on [`ChannelPool::push`].
///
/// [`ChannelPool::push`]: super::ChannelPool::push
pub(crate) struct ChannelRecord<C> {
    channel: Option<C>,
    confirmations: Option<mpsc::Receiver<Confirmation>>,
    pub(crate) last_used: Instant,
    /// Set when the broker channel was reclaimed while the id stays in the pool.
    pub(crate) closed: bool,
    /// Bumped every time a reconnect rebuilds the slot.
    epoch: u64,
}

impl<C> ChannelRecord<C> {
    pub(crate) fn open(channel: C) -> Self {
        Self {
            channel: Some(channel),
            confirmations: None,
            last_used: Instant::now(),
            closed: false,
            epoch: 0,
        }
    }

    /// A slot with no broker channel behind it, opened on its next checkout.
    pub(crate) fn closed() -> Self {
        Self {
            channel: None,
            confirmations: None,
            last_used: Instant::now(),
            closed: true,
            epoch: 0,
        }
    }

    pub(crate) fn channel(&self) -> Option<&C> {
        self.channel.as_ref()
    }

    pub(crate) fn needs_reopening(&self) -> bool {
        self.closed || self.channel.is_none()
    }

    pub(crate) fn reopen(&mut self, channel: C) {
        self.channel = Some(channel);
        self.confirmations = None;
        self.closed = false;
        self.last_used = Instant::now();
    }

    /// Forget the broker channel after it has been closed.
    pub(crate) fn mark_closed(&mut self) {
        self.channel = None;
        self.confirmations = None;
        self.closed = true;
    }

    /// Forget the broker channel and invalidate any handle currently holding it.
    pub(crate) fn invalidate(&mut self) {
        self.mark_closed();
        self.epoch += 1;
    }

    pub(crate) fn check_out(&mut self, id: ChannelId) -> Option<PooledChannel<C>> {
        let channel = self.channel.take()?;
        self.last_used = Instant::now();
        Some(PooledChannel {
            id,
            epoch: self.epoch,
            channel,
            confirmations: self.confirmations.take(),
            last_used: self.last_used,
        })
    }

    /// Take a handle back. Handles from an older epoch are given back to the caller.
    pub(crate) fn check_in(&mut self, handle: PooledChannel<C>) -> Result<(), PooledChannel<C>> {
        if handle.epoch != self.epoch || self.channel.is_some() {
            return Err(handle);
        }
        self.channel = Some(handle.channel);
        self.confirmations = handle.confirmations;
        self.last_used = Instant::now();
        Ok(())
    }
}

/// A channel checked out of a [`ChannelPool`](super::ChannelPool).
///
/// It is yours until you give it back with [`ChannelPool::push`](super::ChannelPool::push).
/// It derefs to the underlying broker channel.
pub struct PooledChannel<C> {
    id: ChannelId,
    epoch: u64,
    channel: C,
    confirmations: Option<mpsc::Receiver<Confirmation>>,
    last_used: Instant,
}

impl<C> PooledChannel<C> {
    /// An overflow channel, not tracked by the pool.
    pub(crate) fn temporary(id: ChannelId, channel: C) -> Self {
        Self {
            id,
            epoch: 0,
            channel,
            confirmations: None,
            last_used: Instant::now(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// `true` if the pool was exhausted when this channel was requested.
    /// Temporary channels are closed when pushed back.
    pub fn is_temporary(&self) -> bool {
        self.id.is_temporary()
    }

    /// When the channel was checked out.
    pub fn last_used(&self) -> Instant {
        self.last_used
    }

    /// Publisher confirmations, available after [`PooledChannel::enable_confirm`] with
    /// `no_wait = false`.
    pub fn confirmations(&mut self) -> Option<&mut mpsc::Receiver<Confirmation>> {
        self.confirmations.as_mut()
    }

    pub(crate) fn into_raw(self) -> C {
        self.channel
    }
}

impl<C: BrokerChannel> PooledChannel<C> {
    /// Put the channel in confirm mode.
    ///
    /// Unless `no_wait` is set, confirmations are delivered on a queue of size one (see
    /// [`PooledChannel::confirmations`]); the subscription survives the channel going back
    /// to the pool. Enabling with `no_wait` drops any existing subscription first.
    pub async fn enable_confirm(&mut self, no_wait: bool) -> Result<(), Error> {
        if no_wait {
            self.confirmations = None;
        }
        self.channel
            .enable_confirm(no_wait)
            .await
            .map_err(|source| Error::Confirm {
                channel_id: self.id,
                source,
            })?;
        if !no_wait && self.confirmations.is_none() {
            self.confirmations = Some(
                self.channel
                    .subscribe_publish_confirmations(CONFIRMATION_QUEUE_CAPACITY),
            );
        }
        Ok(())
    }
}

impl<C> Deref for PooledChannel<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.channel
    }
}

impl<C> fmt::Debug for PooledChannel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledChannel")
            .field("id", &self.id)
            .field("epoch", &self.epoch)
            .field("confirm_subscription", &self.confirmations.is_some())
            .finish()
    }
}
