//! [`lapin`]-backed implementations of [`BrokerConnection`] and [`BrokerChannel`].
use crate::broker::{BrokerChannel, BrokerConnection, Confirmation};
use lapin::{
    message::BasicReturnMessage,
    options::{BasicPublishOptions, ConfirmSelectOptions},
    publisher_confirm, BasicProperties,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Reply code used when the pool closes a connection or a channel.
const REPLY_SUCCESS: u16 = 200;

/// A connection to a RabbitMq broker.
pub struct AmqpConnection(lapin::Connection);

impl AmqpConnection {
    pub fn new(connection: lapin::Connection) -> Self {
        Self(connection)
    }

    /// Get access to the underlying raw connection.
    pub fn raw(&self) -> &lapin::Connection {
        &self.0
    }
}

#[async_trait::async_trait]
impl BrokerConnection for AmqpConnection {
    type Channel = AmqpChannel;

    fn is_closed(&self) -> bool {
        !self.0.status().connected()
    }

    async fn close(&self) -> Result<(), anyhow::Error> {
        Ok(self.0.close(REPLY_SUCCESS, "closed by channel pool").await?)
    }

    #[tracing::instrument(name = "rabbitmq_create_channel", skip(self))]
    async fn open_channel(&self) -> Result<AmqpChannel, anyhow::Error> {
        Ok(AmqpChannel::new(self.0.create_channel().await?))
    }
}

/// A RabbitMq channel.
///
/// Once confirm mode is enabled, the outcome of every [`AmqpChannel::publish`] is forwarded
/// to the confirmation subscription, if there is one.
pub struct AmqpChannel {
    inner: lapin::Channel,
    confirm_mode: AtomicBool,
    /// Delivery tag of the last publishing made in confirm mode.
    delivery_tag: AtomicU64,
    forwarder: ConfirmationForwarder,
}

/// Error returned when trying to publish a message via RabbitMq.
#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("Generic error encountered when interacting with the RabbitMq broker")]
    GenericError(#[source] lapin::Error),
    #[error("The message could not be routed: {0:?}")]
    UnroutableMessage(Box<BasicReturnMessage>),
    #[error("The RabbitMq broker nacked the publishing of the message: {0:?}")]
    NegativeAck(Option<Box<BasicReturnMessage>>),
}

impl AmqpChannel {
    pub fn new(channel: lapin::Channel) -> Self {
        Self {
            inner: channel,
            confirm_mode: AtomicBool::new(false),
            delivery_tag: AtomicU64::new(0),
            forwarder: ConfirmationForwarder::default(),
        }
    }

    /// Get access to the underlying raw channel
    pub fn raw(&self) -> &lapin::Channel {
        &self.inner
    }

    /// Publish a persistent message on an exchange.
    ///
    /// In confirm mode the broker's answer is awaited. If somebody subscribed to confirmations
    /// the answer is handed to them and this returns `Ok`; otherwise a nack or an unroutable
    /// message is turned into an error.
    #[tracing::instrument(level = "debug", skip(self, payload))]
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
        properties: BasicProperties,
    ) -> Result<(), PublishError> {
        let confirm_mode = self.confirm_mode.load(Ordering::Acquire);
        let options = BasicPublishOptions {
            // Unroutable messages are returned rather than silently dropped.
            mandatory: confirm_mode,
            // The immediate flag was dropped in RabbitMQ 3.0 - see https://www.rabbitmq.com/blog/2012/11/19/breaking-things-with-rabbitmq-3-0/
            immediate: false,
        };
        // Delivery mode: Non-persistent (1) or persistent (2).
        let properties = properties.with_delivery_mode(2);
        let confirm = self
            .inner
            .basic_publish(exchange, routing_key, options, payload, properties)
            .await
            .map_err(PublishError::GenericError)?
            .await
            .map_err(PublishError::GenericError)?;

        let (ack, reply_code) = match &confirm {
            publisher_confirm::Confirmation::Ack(returned) => {
                (true, returned.as_ref().map(|message| message.reply_code))
            }
            publisher_confirm::Confirmation::Nack(returned) => {
                (false, returned.as_ref().map(|message| message.reply_code))
            }
            publisher_confirm::Confirmation::NotRequested => return Ok(()),
        };
        let delivery_tag = self.delivery_tag.fetch_add(1, Ordering::AcqRel) + 1;
        let forwarded = self
            .forwarder
            .forward(Confirmation { delivery_tag, ack })
            .await;

        match (settle(ack, reply_code, forwarded), confirm) {
            (
                Settlement::Unroutable,
                publisher_confirm::Confirmation::Ack(Some(return_message)),
            ) => Err(PublishError::UnroutableMessage(return_message)),
            (Settlement::Nacked, publisher_confirm::Confirmation::Nack(nack)) => {
                Err(PublishError::NegativeAck(nack))
            }
            _ => Ok(()),
        }
    }
}

/// How a confirmed publishing is reported to the caller of [`AmqpChannel::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Settlement {
    /// The outcome went to the confirmation subscription.
    Forwarded,
    Delivered,
    Unroutable,
    Nacked,
}

/// Reply Code 312 - NO_ROUTE
/// See https://www.rabbitmq.com/amqp-0-9-1-reference.html
const NO_ROUTE: u16 = 312;

fn settle(ack: bool, reply_code: Option<u16>, forwarded: bool) -> Settlement {
    if forwarded {
        Settlement::Forwarded
    } else if !ack {
        Settlement::Nacked
    } else if reply_code == Some(NO_ROUTE) {
        Settlement::Unroutable
    } else {
        Settlement::Delivered
    }
}

/// Hands publisher confirmations over to the current subscriber, if any.
#[derive(Default)]
struct ConfirmationForwarder {
    subscriber: Mutex<Option<mpsc::Sender<Confirmation>>>,
}

impl ConfirmationForwarder {
    fn subscribe(&self, capacity: usize) -> mpsc::Receiver<Confirmation> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        if let Ok(mut guard) = self.subscriber.lock() {
            *guard = Some(sender);
        }
        receiver
    }

    fn unsubscribe(&self) {
        if let Ok(mut guard) = self.subscriber.lock() {
            *guard = None;
        }
    }

    /// `false` if nobody received the confirmation.
    async fn forward(&self, confirmation: Confirmation) -> bool {
        let subscriber = self
            .subscriber
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default();
        let Some(subscriber) = subscriber else {
            return false;
        };
        if subscriber.send(confirmation).await.is_ok() {
            return true;
        }
        // The receiver is gone: forget it, the caller gets the outcome from now on.
        self.unsubscribe();
        false
    }
}

#[async_trait::async_trait]
impl BrokerChannel for AmqpChannel {
    async fn close(&self) -> Result<(), anyhow::Error> {
        Ok(self.inner.close(REPLY_SUCCESS, "closed by channel pool").await?)
    }

    async fn enable_confirm(&self, no_wait: bool) -> Result<(), anyhow::Error> {
        if no_wait {
            self.forwarder.unsubscribe();
        }
        self.inner
            .confirm_select(ConfirmSelectOptions { nowait: no_wait })
            .await?;
        self.confirm_mode.store(true, Ordering::Release);
        Ok(())
    }

    fn subscribe_publish_confirmations(&self, capacity: usize) -> mpsc::Receiver<Confirmation> {
        self.forwarder.subscribe(capacity)
    }
}
