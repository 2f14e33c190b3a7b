//! Client composition root
//!
//! `Client::start` wires the push channel, the round state machine, the
//! ledger, the animation engine and the estimator into one cooperative loop
//! and returns a `ClientHandle`. All state is owned by that loop; the handle
//! talks to it with commands and observes it through watch and broadcast
//! channels.

mod runtime;
pub mod tasks;

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::animation::WheelFrame;
use crate::api::GameApi;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::feedback::FeedbackService;
use crate::ledger::LedgerSummary;
use crate::protocol::{
    ChatMessage, GameRound, PlaceWagerRequest, PocketColor, RoundId, Wager, WagerId,
    WagerOutcomeNotice,
};
use crate::transport::Connector;

pub use tasks::{TaskSet, Timer, TimerSet};

const COMMAND_BUFFER: usize = 64;

/// Requests accepted by the client loop
#[derive(Debug)]
pub enum ClientCommand {
    PlaceWager {
        request: PlaceWagerRequest,
        reply: Option<oneshot::Sender<Result<Wager>>>,
    },
    CancelWager {
        wager_id: WagerId,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
    RefreshBalance,
    Reconnect,
    Disconnect,
    SetVolume(f64),
    SetFeedbackEnabled(bool),
    Shutdown,
}

/// Outcome shown once the wheel has come to rest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RevealedResult {
    pub round_id: Option<RoundId>,
    pub winning_number: u8,
    pub color: Option<PocketColor>,
}

/// Discrete notifications for the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    ConnectionChanged {
        connected: bool,
        error: Option<String>,
    },
    RoundChanged(GameRound),
    ResultRevealed(RevealedResult),
    Celebrate {
        round_id: RoundId,
        amount: Decimal,
    },
    Commiserate {
        round_id: RoundId,
        amount: Decimal,
    },
    WagerOutcome(WagerOutcomeNotice),
    BalanceUpdated(Decimal),
    Chat(ChatMessage),
    Notice {
        message: String,
    },
    NoticeCleared,
}

/// Everything a status bar or betting table needs
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClientStatus {
    pub connected: bool,
    /// Persistent connection banner
    pub connection_error: Option<String>,
    /// Transient, self-dismissing request notice
    pub notice: Option<String>,
    pub balance: Option<Decimal>,
    #[serde(skip)]
    pub round: Option<GameRound>,
    pub ledger: LedgerSummary,
    #[serde(skip)]
    pub wagers: Vec<Wager>,
    pub revealed: Option<RevealedResult>,
    /// Most recent chat lines, oldest first
    #[serde(skip)]
    pub chat: Vec<ChatMessage>,
}

/// Handle to a running client
pub struct ClientHandle {
    commands: mpsc::Sender<ClientCommand>,
    frames: watch::Receiver<WheelFrame>,
    status: watch::Receiver<ClientStatus>,
    events: broadcast::Sender<ClientEvent>,
    task: JoinHandle<()>,
}

impl ClientHandle {
    /// Latest wheel frame, updated at the animation rate
    pub fn frames(&self) -> watch::Receiver<WheelFrame> {
        self.frames.clone()
    }

    pub fn status(&self) -> watch::Receiver<ClientStatus> {
        self.status.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    async fn send(&self, command: ClientCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::ChannelClosed("client stopped".to_string()))
    }

    pub async fn place_wager(&self, request: PlaceWagerRequest) -> Result<Wager> {
        let (reply, response) = oneshot::channel();
        self.send(ClientCommand::PlaceWager {
            request,
            reply: Some(reply),
        })
        .await?;
        response
            .await
            .map_err(|_| Error::ChannelClosed("client stopped".to_string()))?
    }

    pub async fn cancel_wager(&self, wager_id: WagerId) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(ClientCommand::CancelWager {
            wager_id,
            reply: Some(reply),
        })
        .await?;
        response
            .await
            .map_err(|_| Error::ChannelClosed("client stopped".to_string()))?
    }

    pub async fn refresh_balance(&self) -> Result<()> {
        self.send(ClientCommand::RefreshBalance).await
    }

    /// Manual retry after a lost connection
    pub async fn reconnect(&self) -> Result<()> {
        self.send(ClientCommand::Reconnect).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.send(ClientCommand::Disconnect).await
    }

    pub async fn set_volume(&self, volume: f64) -> Result<()> {
        self.send(ClientCommand::SetVolume(volume)).await
    }

    pub async fn set_feedback_enabled(&self, enabled: bool) -> Result<()> {
        self.send(ClientCommand::SetFeedbackEnabled(enabled)).await
    }

    /// Stop the loop and wait for teardown to finish
    pub async fn shutdown(self) -> Result<()> {
        // A loop that already exited is fine
        let _ = self.commands.send(ClientCommand::Shutdown).await;
        self.task
            .await
            .map_err(|e| Error::Internal(format!("client task failed: {}", e)))
    }
}

/// Entry point for building a client
pub struct Client;

impl Client {
    /// Connect and start the client loop
    pub fn start(
        config: Config,
        api: Arc<dyn GameApi>,
        connector: Arc<dyn Connector>,
        feedback: Arc<dyn FeedbackService>,
    ) -> Result<ClientHandle> {
        config.validate()?;
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (events, _) = broadcast::channel(config.app.event_buffer.max(1));

        let (runtime, frames, status) =
            runtime::ClientLoop::new(config, api, connector, feedback, command_rx, events.clone())?;
        let task = tokio::spawn(runtime.run());

        Ok(ClientHandle {
            commands,
            frames,
            status,
            events,
            task,
        })
    }
}
