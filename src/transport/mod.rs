//! Push channel to the game server
//!
//! `SessionChannel` keeps one STOMP session open over a websocket `Link`,
//! subscribes to the round, chat and wager-outcome topics, and forwards
//! every parsed message to the client loop in arrival order. Lost
//! connections are retried after a fixed delay until `disconnect` is called.

pub mod websocket;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::protocol::stomp::{
    outgoing_heartbeat, DEST_CHAT, DEST_ROUNDS, DEST_WAGER_OUTCOMES,
};
use crate::protocol::{ChatMessage, Frame, FrameCommand, GameRound, WagerOutcomeNotice};

pub use websocket::{WsConnector, WsLink};

/// Opens links to the push server
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Link>>;
}

/// A bidirectional text-message connection
///
/// `recv` must be cancel safe: the session polls it inside `select!`.
#[async_trait]
pub trait Link: Send {
    async fn send(&mut self, text: String) -> Result<()>;
    /// Next message, `None` once the peer has closed
    async fn recv(&mut self) -> Result<Option<String>>;
    async fn close(&mut self) -> Result<()>;
}

/// Topics the channel subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Rounds,
    Chat,
    WagerOutcomes,
}

impl Topic {
    pub fn destination(&self) -> &'static str {
        match self {
            Self::Rounds => DEST_ROUNDS,
            Self::Chat => DEST_CHAT,
            Self::WagerOutcomes => DEST_WAGER_OUTCOMES,
        }
    }

    pub fn subscription_id(&self) -> &'static str {
        match self {
            Self::Rounds => "sub-0",
            Self::Chat => "sub-1",
            Self::WagerOutcomes => "sub-2",
        }
    }

    /// Topics to subscribe to; wager outcomes need an authenticated session
    pub fn for_session(authenticated: bool) -> Vec<Topic> {
        let mut topics = vec![Self::Rounds, Self::Chat];
        if authenticated {
            topics.push(Self::WagerOutcomes);
        }
        topics
    }

    fn resolve(frame: &Frame) -> Option<Self> {
        let all = [Self::Rounds, Self::Chat, Self::WagerOutcomes];
        frame
            .get("subscription")
            .and_then(|id| all.into_iter().find(|s| s.subscription_id() == id))
            .or_else(|| {
                frame
                    .get("destination")
                    .and_then(|dest| all.into_iter().find(|s| s.destination() == dest))
            })
    }
}

/// Connection state as shown to the player
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStatus {
    pub connected: bool,
    /// Last connection failure, cleared on a successful connect
    pub last_error: Option<String>,
}

/// Inbound events, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected { error: Option<String> },
    Round(GameRound),
    Chat(ChatMessage),
    WagerOutcome(WagerOutcomeNotice),
}

/// Parse a MESSAGE frame into an event; `Ok(None)` for topics we do not know
pub fn parse_message(frame: &Frame) -> Result<Option<ChannelEvent>> {
    let destination = frame.get("destination").unwrap_or_default();
    let Some(topic) = Topic::resolve(frame) else {
        debug!(destination, "message for unknown topic");
        return Ok(None);
    };
    let malformed = |e: serde_json::Error| Error::malformed(topic.destination(), e.to_string());
    let event = match topic {
        Topic::Rounds => ChannelEvent::Round(serde_json::from_str(&frame.body).map_err(malformed)?),
        Topic::Chat => ChannelEvent::Chat(serde_json::from_str(&frame.body).map_err(malformed)?),
        Topic::WagerOutcomes => {
            ChannelEvent::WagerOutcome(serde_json::from_str(&frame.body).map_err(malformed)?)
        }
    };
    Ok(Some(event))
}

/// Connection parameters
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub url: Url,
    pub token: Option<String>,
    pub heartbeat: Duration,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl ChannelSettings {
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        Ok(Self {
            url: Url::parse(&config.ws_url)?,
            token: config.auth_token.clone(),
            heartbeat: config.heartbeat,
            reconnect_delay: config.reconnect_delay,
            connect_timeout: config.request_timeout,
        })
    }

    fn host(&self) -> &str {
        self.url.host_str().unwrap_or("localhost")
    }
}

struct Shared {
    settings: ChannelSettings,
    connector: Arc<dyn Connector>,
    status: watch::Sender<ChannelStatus>,
    events: mpsc::Sender<ChannelEvent>,
    retry_now: Notify,
}

impl Shared {
    fn set_status(&self, connected: bool, last_error: Option<String>) {
        self.status.send_replace(ChannelStatus {
            connected,
            last_error,
        });
    }
}

struct Supervisor {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

/// How a session ended
enum SessionEnd {
    Stopped,
    Failed(Error),
}

/// Persistent push channel with automatic and manual reconnection
pub struct SessionChannel {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<Supervisor>>,
}

impl SessionChannel {
    /// Create a channel and the receiver its events arrive on
    pub fn new(
        settings: ChannelSettings,
        connector: Arc<dyn Connector>,
        buffer: usize,
    ) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (events, receiver) = mpsc::channel(buffer.max(1));
        let (status, _) = watch::channel(ChannelStatus::default());
        let channel = Self {
            shared: Arc::new(Shared {
                settings,
                connector,
                status,
                events,
                retry_now: Notify::new(),
            }),
            supervisor: Mutex::new(None),
        };
        (channel, receiver)
    }

    pub fn status(&self) -> watch::Receiver<ChannelStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.status.borrow().connected
    }

    /// Whether a supervisor is running, connected or waiting to retry
    pub fn is_active(&self) -> bool {
        self.supervisor
            .lock()
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Start the session; a no-op while one is already running
    pub fn connect(&self) {
        let mut supervisor = self.supervisor.lock();
        if supervisor.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            debug!("connect ignored, channel already active");
            return;
        }
        let (stop, stop_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(supervise(shared, stop_rx));
        *supervisor = Some(Supervisor { handle, stop });
    }

    /// Connect now, skipping any pending retry delay
    pub fn reconnect(&self) {
        if self.is_active() {
            self.shared.retry_now.notify_one();
        } else {
            self.connect();
        }
    }

    /// Unsubscribe, close the link and stop retrying
    pub async fn disconnect(&self) {
        let Some(supervisor) = self.supervisor.lock().take() else {
            return;
        };
        let _ = supervisor.stop.send(true);
        let mut handle = supervisor.handle;
        if timeout(self.shared.settings.connect_timeout, &mut handle)
            .await
            .is_err()
        {
            warn!("channel did not stop in time, aborting");
            handle.abort();
        }

        let was_connected = self.is_connected();
        self.shared.set_status(false, None);
        // The caller may be the only consumer of `events`, so never wait here
        if was_connected {
            if let Err(error) = self
                .shared
                .events
                .try_send(ChannelEvent::Disconnected { error: None })
            {
                debug!(error = %error, "disconnect event not queued");
            }
        }
        info!("channel disconnected");
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.get_mut().take() {
            supervisor.handle.abort();
        }
    }
}

async fn supervise(shared: Arc<Shared>, mut stop: watch::Receiver<bool>) {
    loop {
        match run_session(&shared, &mut stop).await {
            SessionEnd::Stopped => break,
            SessionEnd::Failed(error) => {
                let message = error.user_message();
                warn!(error = %error, code = error.code(), "channel connection lost");
                shared.set_status(false, Some(message.clone()));
                let event = ChannelEvent::Disconnected {
                    error: Some(message),
                };
                if !forward(&shared, &mut stop, event).await {
                    break;
                }
            }
        }

        debug!(delay = ?shared.settings.reconnect_delay, "reconnecting after delay");
        tokio::select! {
            _ = stop.changed() => break,
            _ = sleep(shared.settings.reconnect_delay) => {}
            _ = shared.retry_now.notified() => debug!("manual reconnect"),
        }
    }
}

async fn run_session(shared: &Shared, stop: &mut watch::Receiver<bool>) -> SessionEnd {
    if *stop.borrow() {
        return SessionEnd::Stopped;
    }
    let settings = &shared.settings;

    let opened = tokio::select! {
        _ = stop.changed() => return SessionEnd::Stopped,
        opened = timeout(settings.connect_timeout, open_session(shared)) => opened,
    };
    let (mut link, topics, heartbeat) = match opened {
        Ok(Ok(session)) => session,
        Ok(Err(error)) => return SessionEnd::Failed(error),
        Err(_) => return SessionEnd::Failed(Error::Connection("Connection timed out".into())),
    };

    shared.set_status(true, None);
    info!(url = %settings.url, topics = topics.len(), "channel connected");
    if !forward(shared, stop, ChannelEvent::Connected).await {
        close_session(link.as_mut(), &topics).await;
        return SessionEnd::Stopped;
    }

    let mut heartbeat = heartbeat.map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    loop {
        tokio::select! {
            _ = stop.changed() => {
                close_session(link.as_mut(), &topics).await;
                return SessionEnd::Stopped;
            }
            _ = next_tick(&mut heartbeat) => {
                if let Err(error) = link.send("\n".to_string()).await {
                    return SessionEnd::Failed(error);
                }
            }
            received = link.recv() => match received {
                Ok(Some(text)) => match handle_text(&text) {
                    Ok(Some(event)) => {
                        if !forward(shared, stop, event).await {
                            close_session(link.as_mut(), &topics).await;
                            return SessionEnd::Stopped;
                        }
                    }
                    Ok(None) => {}
                    Err(error) => return SessionEnd::Failed(error),
                },
                Ok(None) => return SessionEnd::Failed(Error::Connection("Connection closed".into())),
                Err(error) => return SessionEnd::Failed(error),
            },
        }
    }
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Open a link, complete the STOMP handshake and subscribe
async fn open_session(shared: &Shared) -> Result<(Box<dyn Link>, Vec<Topic>, Option<Duration>)> {
    let settings = &shared.settings;
    let mut link = shared.connector.connect(&settings.url).await?;

    let connect = Frame::connect(settings.host(), settings.heartbeat, settings.token.as_deref());
    link.send(connect.encode()).await?;

    let connected = loop {
        let text = link
            .recv()
            .await?
            .ok_or_else(|| Error::Connection("Connection closed during handshake".into()))?;
        match Frame::decode(&text)? {
            None => continue,
            Some(frame) if frame.command == FrameCommand::Connected => break frame,
            Some(frame) if frame.command == FrameCommand::Error => {
                return Err(Error::Connection(frame.error_message()))
            }
            Some(frame) => debug!(command = %frame.command, "ignoring frame before CONNECTED"),
        }
    };

    let heartbeat = outgoing_heartbeat(settings.heartbeat, connected.get("heart-beat"));
    let topics = Topic::for_session(settings.token.is_some());
    for topic in &topics {
        let frame = Frame::subscribe(topic.subscription_id(), topic.destination());
        link.send(frame.encode()).await?;
    }
    Ok((link, topics, heartbeat))
}

async fn close_session(link: &mut dyn Link, topics: &[Topic]) {
    for topic in topics {
        let _ = link
            .send(Frame::unsubscribe(topic.subscription_id()).encode())
            .await;
    }
    let _ = link.send(Frame::disconnect().encode()).await;
    if let Err(error) = link.close().await {
        debug!(error = %error, "link close failed");
    }
}

/// Forward an event to the client loop
///
/// Returns `false` once the channel is stopping or the receiver is gone, so a
/// full buffer never holds up `disconnect`.
async fn forward(shared: &Shared, stop: &mut watch::Receiver<bool>, event: ChannelEvent) -> bool {
    tokio::select! {
        sent = shared.events.send(event) => sent.is_ok(),
        _ = async { stop.wait_for(|stopped| *stopped).await.is_ok() } => false,
    }
}

/// Turn one inbound text message into an event
///
/// Malformed frames and payloads are dropped; only ERROR frames end the
/// session.
fn handle_text(text: &str) -> Result<Option<ChannelEvent>> {
    let frame = match Frame::decode(text) {
        Ok(Some(frame)) => frame,
        Ok(None) => return Ok(None),
        Err(error) => {
            warn!(error = %error, "dropping undecodable frame");
            return Ok(None);
        }
    };

    match frame.command {
        FrameCommand::Message => match parse_message(&frame) {
            Ok(event) => Ok(event),
            Err(error) => {
                warn!(error = %error, code = error.code(), "dropping malformed event");
                Ok(None)
            }
        },
        FrameCommand::Error => Err(Error::Connection(frame.error_message())),
        other => {
            debug!(command = %other, "ignoring frame");
            Ok(None)
        }
    }
}
