//! `carrot-pool` keeps a fixed set of RabbitMq connections open, each multiplexed into a
//! fixed number of channels, and hands those channels out one holder at a time.
//!
//! [`ChannelPool`](crate::pool::ChannelPool) is the best starting point: it explains how
//! channels are checked out, given back, and how broken connections and idle channels are
//! dealt with in the background.
//!
//! The pool only relies on the small set of operations described in the [`broker`] module;
//! the [`amqp`] module implements them on top of [`lapin`].
//!
//! ## Examples
//!
//! Check the `demos` directory to see the pool in action against a local RabbitMq.

pub mod amqp;
pub mod broker;
pub mod pool;
