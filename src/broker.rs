//! The seam between the pool and the AMQP client library.
//!
//! The pool never talks to [`lapin`] directly: it only needs to open connections, check
//! whether they are still alive, and open/close channels on top of them.
//! [`ConnectionFactory`](crate::amqp::ConnectionFactory) implements these traits for a real
//! RabbitMq broker.
use std::time::Duration;
use tokio::sync::mpsc;

/// Parameters negotiated with the broker every time a connection is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// The maximum number of channels the broker should allow on the connection.
    pub channel_max: u16,
    /// The heartbeat interval requested from the broker.
    pub heartbeat: Duration,
}

/// Outcome of a message published on a channel in confirm mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    /// Sequence number of the publishing on its channel, starting at 1.
    pub delivery_tag: u64,
    /// `true` if the broker acked the message, `false` if it nacked it.
    pub ack: bool,
}

/// Something that can open connections to a broker.
#[async_trait::async_trait]
pub trait Broker: Send + Sync + 'static {
    type Connection: BrokerConnection<Channel = Self::Channel>;
    type Channel: BrokerChannel;

    /// Open a new connection.
    async fn connect(&self, options: &ConnectOptions) -> Result<Self::Connection, anyhow::Error>;
}

/// A live (or dead) transport-level session with the broker.
#[async_trait::async_trait]
pub trait BrokerConnection: Send + Sync + 'static {
    type Channel: BrokerChannel;

    /// `true` once the underlying connection is no longer usable.
    fn is_closed(&self) -> bool;

    /// Close the connection. Closing an already broken connection may fail.
    async fn close(&self) -> Result<(), anyhow::Error>;

    /// Open a new channel multiplexed over this connection.
    async fn open_channel(&self) -> Result<Self::Channel, anyhow::Error>;
}

/// A channel multiplexed over a [`BrokerConnection`].
#[async_trait::async_trait]
pub trait BrokerChannel: Send + Sync + 'static {
    async fn close(&self) -> Result<(), anyhow::Error>;

    /// Put the channel in confirm mode.
    ///
    /// See <https://www.rabbitmq.com/amqp-0-9-1-reference.html#confirm.select>.
    async fn enable_confirm(&self, no_wait: bool) -> Result<(), anyhow::Error>;

    /// Start receiving publisher confirmations for this channel on a bounded queue.
    ///
    /// A new subscription replaces the previous one.
    fn subscribe_publish_confirmations(&self, capacity: usize) -> mpsc::Receiver<Confirmation>;
}
