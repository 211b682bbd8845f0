use anyhow::{Context, Result};
use async_nats::Client;
use tracing::info;

use super::messages::{CallCommandMessage, CommandKind, COMMAND_SUBJECT, EVENT_SUBJECT_PREFIX};

pub struct NatsClient {
    client: Client,
    client_id: String,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, client_id: String) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client, client_id })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Publish a call command to the voice gateway
    pub async fn publish_command(
        &self,
        command: CommandKind,
        assistant_id: Option<String>,
        public_key: Option<String>,
        muted: Option<bool>,
    ) -> Result<()> {
        let message = CallCommandMessage {
            client_id: self.client_id.clone(),
            command,
            assistant_id,
            public_key,
            muted,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(COMMAND_SUBJECT.to_string(), payload.into())
            .await
            .context("Failed to publish call command")?;

        info!("Published {:?} command to {}", command, COMMAND_SUBJECT);

        Ok(())
    }

    /// Subscribe to provider notifications
    pub async fn subscribe_events(&self) -> Result<async_nats::Subscriber> {
        // One subject per notification name: voice.event.call-start, ...
        let subject = format!("{}>", EVENT_SUBJECT_PREFIX);

        info!("Subscribing to provider events on {}", subject);

        let subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .context("Failed to subscribe to provider events")?;

        info!("Subscribed to {}", subject);

        Ok(subscriber)
    }
}
