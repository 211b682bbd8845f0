use anyhow::{Context, Result};
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{EventEmitter, EventHandler, VoiceProvider};
use super::listeners::ListenerMap;
use crate::nats::messages::{decode_event_payload, event_name_from_subject};
use crate::nats::{CommandKind, NatsClient};

/// Voice provider reached through a NATS voice gateway
///
/// The gateway relays provider notifications on `voice.event.<name>` and
/// accepts call commands on `voice.command`. Handlers register through `on`.
pub struct NatsProvider {
    client: Arc<NatsClient>,
    public_key: Option<String>,
    listeners: Arc<ListenerMap>,
    muted: AtomicBool,

    /// Forwards gateway notifications to the registered handlers
    dispatch_task: JoinHandle<()>,
}

impl NatsProvider {
    /// Connect to NATS and start relaying gateway notifications
    pub async fn connect(url: &str, client_id: String, public_key: Option<String>) -> Result<Self> {
        let client = Arc::new(
            NatsClient::connect(url, client_id)
                .await
                .context("Failed to connect voice provider to NATS")?,
        );

        let mut subscriber = client
            .subscribe_events()
            .await
            .context("Failed to subscribe to provider events")?;

        info!("Relaying provider events for client {}", client.client_id());

        let listeners = Arc::new(ListenerMap::new());
        let dispatch_listeners = Arc::clone(&listeners);

        let dispatch_task = tokio::spawn(async move {
            info!("Provider event relay started");

            while let Some(msg) = subscriber.next().await {
                let subject = msg.subject.to_string();

                match event_name_from_subject(&subject) {
                    Some(event) => {
                        let payload = decode_event_payload(&msg.payload);
                        let delivered = dispatch_listeners.dispatch(event, &payload);
                        debug!("Relayed {} to {} handlers", event, delivered);
                    }
                    None => warn!("Ignoring message on unexpected subject {}", subject),
                }
            }

            info!("Provider event relay stopped");
        });

        Ok(Self {
            client,
            public_key,
            listeners,
            muted: AtomicBool::new(false),
            dispatch_task,
        })
    }
}

impl Drop for NatsProvider {
    fn drop(&mut self) {
        self.dispatch_task.abort();
    }
}

impl EventEmitter for NatsProvider {
    fn on(&self, event: &str, handler: EventHandler) -> Result<()> {
        self.listeners.add(event, handler)
    }

    fn remove_all_listeners(&self) {
        self.listeners.clear();
    }
}

#[async_trait::async_trait]
impl VoiceProvider for NatsProvider {
    fn name(&self) -> &str {
        "nats"
    }

    fn as_emitter(&self) -> Option<&dyn EventEmitter> {
        Some(self)
    }

    async fn start(&self, assistant_id: &str) -> Result<()> {
        self.client
            .publish_command(
                CommandKind::Start,
                Some(assistant_id.to_string()),
                self.public_key.clone(),
                None,
            )
            .await?;
        self.muted.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.client
            .publish_command(CommandKind::Stop, None, None, None)
            .await
    }

    async fn is_muted(&self) -> Result<bool> {
        Ok(self.muted.load(Ordering::SeqCst))
    }

    async fn set_muted(&self, muted: bool) -> Result<()> {
        self.client
            .publish_command(CommandKind::Mute, None, None, Some(muted))
            .await?;
        self.muted.store(muted, Ordering::SeqCst);
        Ok(())
    }
}
