use super::ChannelId;

/// Pool error.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to open connection {connection_id} to the RabbitMq broker")]
    Connect {
        connection_id: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to open a channel on connection {connection_id}")]
    OpenChannel {
        connection_id: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error("Failed to enable publisher confirms on channel {channel_id}")]
    Confirm {
        channel_id: ChannelId,
        #[source]
        source: anyhow::Error,
    },
    #[error("Invalid channel pool configuration: {0}")]
    InvalidConfiguration(String),
}
