use carrot_pool::amqp::{configuration::RabbitMqSettings, options::QueueDeclareOptions};
use carrot_pool::amqp::{types::FieldTable, BasicProperties, ConnectionFactory};
use carrot_pool::pool::{ChannelPool, PoolSettings};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // We are using the out-of-the-box parameters for the default RabbitMq Docker image.
    let connection_factory = ConnectionFactory::new_from_config(&RabbitMqSettings::default())?;

    // Two TCP connections, each multiplexed into four channels.
    // Channels are cheaper than connections: keep a handful of connections and more channels
    // on top of them.
    // Channels left unused for `timeout` are closed by the health monitor, down to
    // `channel_idle` per connection, and transparently reopened when needed again.
    let settings = PoolSettings::default()
        .connection_max(2)
        .channel_active(4)
        .channel_idle(1)
        .timeout(Duration::from_secs(60));
    let pool = ChannelPool::new(connection_factory, settings).await?;

    let mut channel = pool.get().await?;
    channel
        .raw()
        .queue_declare("hello", QueueDeclareOptions::default(), FieldTable::default())
        .await?;

    // With a subscription in place, every broker answer is handed over to us
    // instead of being turned into a publishing error.
    channel.enable_confirm(false).await?;
    for greeting in ["Hello", "Hallo", "Ciao"] {
        channel
            .publish("", "hello", greeting.as_bytes(), BasicProperties::default())
            .await?;
        if let Some(confirmation) = channel
            .confirmations()
            .and_then(|confirmations| confirmations.try_recv().ok())
        {
            println!(
                "Message {} {}",
                confirmation.delivery_tag,
                if confirmation.ack { "acked" } else { "nacked" }
            );
        }
    }
    pool.push(channel).await;

    // The pool is exhausted: this one is a temporary channel, closed when pushed back.
    let held: Vec<_> = futures_util::future::try_join_all((0..8).map(|_| pool.get())).await?;
    let overflow = pool.get().await?;
    println!("Temporary channel {}", overflow.id());
    pool.push(overflow).await;
    for channel in held {
        pool.push(channel).await;
    }

    println!("{:#?}", pool.stats().await);
    Ok(())
}
