//! livewheel - client engine for a live multiplayer roulette wheel
//!
//! Keeps a player's view in step with the authoritative game server:
//! - transport: persistent STOMP push channel with reconnection
//! - round: edge-triggered round phase machine
//! - ledger: the player's wagers, frozen when betting closes
//! - animation: wheel and ball motion converging on the winning pocket
//! - settlement: provisional win/lose estimate for instant feedback
//! - client: the cooperative loop tying them together
//!
//! The server's ledger is the only source of truth for money; nothing here
//! writes back into it.

pub mod animation;
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod feedback;
pub mod ledger;
pub mod logging;
pub mod protocol;
pub mod round;
pub mod settlement;
pub mod transport;

pub use animation::{AnimationPhase, AnimationState, WheelAnimationEngine, WheelFrame};
pub use api::{GameApi, RestGameApi};
pub use client::{Client, ClientCommand, ClientEvent, ClientHandle, ClientStatus};
pub use config::Config;
pub use error::{Error, Result};
pub use feedback::{FeedbackService, LogFeedback, NullFeedback, VolumeControl};
pub use ledger::{BetLedgerCache, LedgerSummary};
pub use protocol::{BetType, GameRound, GameStatus, PlaceWagerRequest, Wager};
pub use round::{GamePhaseStateMachine, PhaseEffect};
pub use settlement::{estimate, SettlementEstimate, SettlementEstimator, Verdict};
pub use transport::{ChannelEvent, ChannelStatus, SessionChannel, WsConnector};
