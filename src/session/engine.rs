// Call engine
//
// Owns one call state machine on a single task. Provider notifications,
// the debounce deadline, the duration ticker and application commands are
// all handled in that task, one at a time, so the session never needs a
// lock. Provider handlers only forward into the task's queue.

use std::future;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{self, Instant, Interval};
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::machine::{CallMachine, EngineEvent};
use super::state::{CallSnapshot, CallStatus};
use super::stats::SessionStats;
use super::transcript::TranscriptMessage;
use crate::error::{CallError, CallResult};
use crate::events::{normalize, CanonicalEvent, ProviderEvent, ProviderNotification};
use crate::provider::{probe, EventHandler, EventRegistration, VoiceProvider};

type Reply<T> = oneshot::Sender<T>;

enum Command {
    StartCall {
        assistant_id: Option<String>,
        reply: Reply<CallResult<String>>,
    },
    EndCall {
        reply: Reply<CallResult<()>>,
    },
    ToggleMute {
        reply: Reply<CallResult<bool>>,
    },
    Reset {
        reply: Reply<()>,
    },
    Snapshot {
        reply: Reply<CallSnapshot>,
    },
    Transcript {
        reply: Reply<Vec<TranscriptMessage>>,
    },
    Stats {
        reply: Reply<SessionStats>,
    },
}

/// Notification tagged with the registration that delivered it
struct Tagged {
    generation: u64,
    received_at: Instant,
    notification: ProviderNotification,
}

/// Handle to a running call engine
///
/// Cloning the handle is cheap; the engine stops once every handle is dropped.
#[derive(Clone)]
pub struct CallEngine {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<EngineEvent>,
    status: watch::Receiver<CallSnapshot>,
}

impl CallEngine {
    /// Spawn the engine task for `provider`
    pub fn spawn(provider: Arc<dyn VoiceProvider>, config: SessionConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (events_tx, _) = broadcast::channel(config.event_buffer.max(1));
        let (status_tx, status_rx) = watch::channel(CallSnapshot::default());
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let task = EngineTask {
            provider,
            machine: CallMachine::new(&config),
            config,
            registration: None,
            generation: 0,
            notify_tx,
            status_tx,
            events_tx: events_tx.clone(),
        };
        tokio::spawn(task.run(command_rx, notify_rx));

        Self {
            commands: command_tx,
            events: events_tx,
            status: status_rx,
        }
    }

    /// Request a new call; returns the new session id
    ///
    /// Falls back to the configured assistant when none is given.
    pub async fn start_call(&self, assistant_id: Option<String>) -> CallResult<String> {
        self.request(|reply| Command::StartCall {
            assistant_id,
            reply,
        })
        .await?
    }

    /// End the call in progress; a no-op when there is none
    pub async fn end_call(&self) -> CallResult<()> {
        self.request(|reply| Command::EndCall { reply }).await?
    }

    /// Flip the provider's mute state; returns the new state
    pub async fn toggle_mute(&self) -> CallResult<bool> {
        self.request(|reply| Command::ToggleMute { reply }).await?
    }

    /// Drop the session and return to idle
    pub async fn reset(&self) -> CallResult<()> {
        self.request(|reply| Command::Reset { reply }).await
    }

    pub async fn snapshot(&self) -> CallResult<CallSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Finalized transcript, oldest first
    pub async fn transcript(&self) -> CallResult<Vec<TranscriptMessage>> {
        self.request(|reply| Command::Transcript { reply }).await
    }

    pub async fn stats(&self) -> CallResult<SessionStats> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Status changes and transcript appends, as they happen
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Latest published call status
    pub fn watch_status(&self) -> watch::Receiver<CallSnapshot> {
        self.status.clone()
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> CallResult<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| CallError::EngineClosed)?;
        reply_rx.await.map_err(|_| CallError::EngineClosed)
    }
}

struct EngineTask {
    provider: Arc<dyn VoiceProvider>,
    machine: CallMachine,
    config: SessionConfig,

    /// Present while handlers are attached to the provider
    registration: Option<Box<dyn EventRegistration>>,

    /// Bumped on every attach/detach so queued stale notifications are dropped
    generation: u64,

    notify_tx: mpsc::UnboundedSender<Tagged>,
    status_tx: watch::Sender<CallSnapshot>,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl EngineTask {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut notifications: mpsc::UnboundedReceiver<Tagged>,
    ) {
        info!("Call engine started with provider {}", self.provider.name());

        let mut ticker: Option<Interval> = None;

        loop {
            let deadline = self.machine.debounce_deadline();

            // Provider notifications first, so a newer partial always
            // replaces the deadline before that deadline can fire.
            tokio::select! {
                biased;

                Some(tagged) = notifications.recv() => self.handle_notification(tagged).await,
                _ = sleep_until(deadline) => self.machine.expire_pending(Instant::now()),
                _ = next_tick(&mut ticker) => self.machine.tick(),
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
            }

            self.sync_ticker(&mut ticker);
            self.publish();
        }

        self.detach();
        info!("Call engine stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartCall {
                assistant_id,
                reply,
            } => {
                let result = self.start_call(assistant_id).await;
                let _ = reply.send(result);
            }
            Command::EndCall { reply } => {
                let in_call = self.machine.status().in_call();
                let result = self.end_session(None, true).await;
                if in_call && result.is_ok() {
                    self.machine.clear_error();
                }
                let _ = reply.send(result);
            }
            Command::ToggleMute { reply } => {
                let result = self.toggle_mute().await;
                let _ = reply.send(result);
            }
            Command::Reset { reply } => {
                self.reset().await;
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.machine.snapshot());
            }
            Command::Transcript { reply } => {
                let _ = reply.send(self.machine.transcript().messages().to_vec());
            }
            Command::Stats { reply } => {
                let _ = reply.send(self.machine.stats());
            }
        }
    }

    async fn handle_notification(&mut self, tagged: Tagged) {
        if tagged.generation != self.generation || self.registration.is_none() {
            debug!(
                "Dropping {} from a detached registration",
                tagged.notification.event
            );
            return;
        }

        let Some(event) = normalize(&tagged.notification) else {
            return;
        };

        match event {
            CanonicalEvent::CallEnded { reason } => {
                // Provider side already hung up; nothing to stop
                let _ = self.end_session(reason, false).await;
            }
            event => self.machine.apply(event, tagged.received_at),
        }
    }

    async fn start_call(&mut self, assistant_id: Option<String>) -> CallResult<String> {
        if !self.machine.status().can_start() {
            return Err(CallError::CallInProgress);
        }

        let assistant_id = assistant_id
            .or_else(|| self.config.assistant_id.clone())
            .filter(|id| !id.trim().is_empty())
            .ok_or(CallError::MissingAssistant)?;

        let registration = match probe(Arc::clone(&self.provider)) {
            Ok(registration) => registration,
            Err(e) => {
                error!("Cannot start call: {}", e);
                self.machine.record_error(e.to_string());
                return Err(e);
            }
        };

        let session_id = self.machine.begin(&assistant_id)?;

        self.generation += 1;
        for event in ProviderEvent::ALL {
            if let Err(e) = registration.register(event, self.forwarder(event)) {
                registration.detach();
                self.generation += 1;
                let err = CallError::provider("register provider events", e);
                error!("{}", err);
                self.machine.abort_start(err.to_string());
                return Err(err);
            }
        }
        info!(
            "Registered {} provider handlers via {}",
            ProviderEvent::ALL.len(),
            registration.kind()
        );
        self.registration = Some(registration);

        if let Err(e) = self.provider.start(&assistant_id).await {
            let err = CallError::provider("start voice call", e);
            error!("{:#}", err);
            self.detach();
            self.machine.abort_start(err.to_string());
            return Err(err);
        }

        Ok(session_id)
    }

    /// End sequence: settle the pending partial, detach handlers, release
    /// the provider call, then transition to ended.
    async fn end_session(&mut self, reason: Option<String>, stop_provider: bool) -> CallResult<()> {
        if !self.machine.status().in_call() {
            debug!("End requested while {}; nothing to do", self.machine.status());
            return Ok(());
        }

        self.machine.settle_pending();
        self.detach();

        let result = if stop_provider {
            self.provider
                .stop()
                .await
                .map_err(|e| CallError::provider("end voice call", e))
        } else {
            Ok(())
        };

        if let Err(e) = &result {
            error!("{:#}", e);
            self.machine.record_error(e.to_string());
        }

        self.machine.mark_ended(reason);
        result
    }

    async fn toggle_mute(&mut self) -> CallResult<bool> {
        if !self.machine.status().in_call() {
            return Err(CallError::NoActiveCall);
        }

        let provider = Arc::clone(&self.provider);
        let toggled = async move {
            let muted = provider.is_muted().await?;
            provider.set_muted(!muted).await?;
            Ok::<bool, anyhow::Error>(!muted)
        }
        .await;

        match toggled {
            Ok(muted) => {
                info!("Microphone {}", if muted { "muted" } else { "unmuted" });
                self.machine.set_muted(muted);
                self.machine.clear_error();
                Ok(muted)
            }
            Err(e) => {
                let err = CallError::provider("toggle mute", e);
                error!("{:#}", err);
                self.machine.record_error(err.to_string());
                Err(err)
            }
        }
    }

    async fn reset(&mut self) {
        if self.machine.status().in_call() {
            self.detach();
            if let Err(e) = self.provider.stop().await {
                warn!("Failed to stop provider during reset: {:#}", e);
            }
        }
        self.detach();
        self.machine.reset();
        info!("Call session reset");
    }

    /// Handler that queues `event` notifications for this task
    fn forwarder(&self, event: ProviderEvent) -> EventHandler {
        let notify_tx = self.notify_tx.clone();
        let generation = self.generation;

        Arc::new(move |payload| {
            let _ = notify_tx.send(Tagged {
                generation,
                received_at: Instant::now(),
                notification: ProviderNotification::new(event, payload),
            });
        })
    }

    fn detach(&mut self) {
        if let Some(registration) = self.registration.take() {
            registration.detach();
            self.generation += 1;
            debug!("Detached provider handlers ({})", registration.kind());
        }
    }

    /// Run the duration ticker only while active
    fn sync_ticker(&self, ticker: &mut Option<Interval>) {
        let active = self.machine.status() == CallStatus::Active;

        if active && ticker.is_none() {
            let period = self.config.duration_tick;
            *ticker = Some(time::interval_at(Instant::now() + period, period));
        } else if !active && ticker.is_some() {
            *ticker = None;
        }
    }

    fn publish(&mut self) {
        for event in self.machine.drain_events() {
            if let EngineEvent::StatusChanged(snapshot) = &event {
                self.status_tx.send_replace(snapshot.clone());
            }
            // No subscribers is fine
            let _ = self.events_tx.send(event);
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => future::pending().await,
    }
}
