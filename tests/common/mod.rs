//! Shared test harness: an in-memory push server, a fake game API and
//! fixture builders.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use url::Url;

use livewheel::config::{Config, Environment};
use livewheel::error::{Error, Result};
use livewheel::protocol::stomp::{DEST_ROUNDS, DEST_WAGER_OUTCOMES};
use livewheel::protocol::{
    BetType, Frame, FrameCommand, GameRound, GameStatus, PlaceWagerRequest, RoundId, RoundRecord,
    WalletBalance, Wager, WagerId, WagerOutcomeNotice,
};
use livewheel::transport::{Connector, Link};
use livewheel::GameApi;

pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Testing configuration with a session token
pub fn test_config() -> Config {
    let mut config = Config::default_for_environment(Environment::Testing);
    config.server.auth_token = Some("test-token".to_string());
    config
}

pub fn round(round_id: RoundId, status: GameStatus) -> GameRound {
    GameRound {
        round_id,
        status,
        remaining_seconds: 0,
        result_hash: format!("hash-{}", round_id),
        winning_number: None,
        winning_color: None,
        result_key: None,
    }
}

pub fn finished(round_id: RoundId, status: GameStatus, winning_number: u8) -> GameRound {
    GameRound {
        winning_number: Some(winning_number),
        winning_color: livewheel::protocol::pocket_color(winning_number),
        ..round(round_id, status)
    }
}

pub fn wager(id: WagerId, round_id: RoundId, bet_type: BetType, value: &str, amount: Decimal) -> Wager {
    let multiplier = Decimal::from(bet_type.multiplier());
    Wager {
        id,
        round_id,
        bet_type,
        bet_value: value.to_string(),
        amount,
        potential_payout: amount * multiplier,
        multiplier,
        settled: false,
        win_amount: None,
        created_at: "2026-01-01T00:00:00".to_string(),
    }
}

/// Server half of an in-memory connection
pub struct ServerEnd {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: Option<mpsc::UnboundedSender<String>>,
}

impl ServerEnd {
    /// Next non-heartbeat frame sent by the client
    pub async fn next_frame(&mut self) -> Frame {
        loop {
            let text = tokio::time::timeout(STEP_TIMEOUT, self.from_client.recv())
                .await
                .expect("timed out waiting for client frame")
                .expect("client link closed");
            if let Some(frame) = Frame::decode(&text).expect("client sent a bad frame") {
                return frame;
            }
        }
    }

    /// Complete the handshake and collect `subscriptions` SUBSCRIBE frames
    pub async fn accept(&mut self, subscriptions: usize) -> Vec<Frame> {
        let connect = self.next_frame().await;
        assert_eq!(connect.command, FrameCommand::Connect);
        self.send_raw(
            Frame::new(FrameCommand::Connected)
                .header("version", "1.2")
                .header("heart-beat", "0,0")
                .encode(),
        );
        let mut frames = Vec::new();
        for _ in 0..subscriptions {
            let frame = self.next_frame().await;
            assert_eq!(frame.command, FrameCommand::Subscribe);
            frames.push(frame);
        }
        frames
    }

    pub fn send_raw(&self, text: String) {
        if let Some(sender) = &self.to_client {
            let _ = sender.send(text);
        }
    }

    pub fn push(&self, destination: &str, subscription: &str, body: String) {
        self.send_raw(
            Frame::new(FrameCommand::Message)
                .header("destination", destination)
                .header("subscription", subscription)
                .header("message-id", "1")
                .with_body(body)
                .encode(),
        );
    }

    pub fn push_round(&self, round: &GameRound) {
        let body = serde_json::to_string(round).expect("round serializes");
        self.push(DEST_ROUNDS, "sub-0", body);
    }

    pub fn push_outcome(&self, notice: &WagerOutcomeNotice) {
        let body = serde_json::to_string(notice).expect("notice serializes");
        self.push(DEST_WAGER_OUTCOMES, "sub-2", body);
    }

    /// Drop the connection from the server side
    pub fn close(&mut self) {
        self.to_client = None;
    }
}

struct MemoryLink {
    to_server: mpsc::UnboundedSender<String>,
    from_server: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Link for MemoryLink {
    async fn send(&mut self, text: String) -> Result<()> {
        self.to_server
            .send(text)
            .map_err(|_| Error::Connection("server gone".to_string()))
    }

    async fn recv(&mut self) -> Result<Option<String>> {
        Ok(self.from_server.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        self.from_server.close();
        Ok(())
    }
}

/// Connector handing every new connection's server half to the test
pub struct MemoryConnector {
    accepted: mpsc::UnboundedSender<ServerEnd>,
    connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (accepted, receiver) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                accepted,
                connects: AtomicUsize::new(0),
            }),
            receiver,
        )
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _url: &Url) -> Result<Box<dyn Link>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (to_server, from_client) = mpsc::unbounded_channel();
        let (to_client, from_server) = mpsc::unbounded_channel();
        self.accepted
            .send(ServerEnd {
                from_client,
                to_client: Some(to_client),
            })
            .map_err(|_| Error::Connection("connection refused".to_string()))?;
        Ok(Box::new(MemoryLink {
            to_server,
            from_server,
        }))
    }
}

/// Wait for the next accepted connection
pub async fn next_connection(accepted: &mut mpsc::UnboundedReceiver<ServerEnd>) -> ServerEnd {
    tokio::time::timeout(STEP_TIMEOUT, accepted.recv())
        .await
        .expect("timed out waiting for a connection")
        .expect("connector dropped")
}

#[derive(Default)]
struct FakeState {
    round: Option<GameRound>,
    balance: Decimal,
    wagers: Vec<Wager>,
    next_id: WagerId,
    place_calls: usize,
    balance_calls: usize,
    fail_place: Option<String>,
}

/// In-memory `GameApi` with a wallet and a wager list
#[derive(Default)]
pub struct FakeGameApi {
    state: Mutex<FakeState>,
}

impl FakeGameApi {
    pub fn new(balance: Decimal) -> Arc<Self> {
        let api = Self::default();
        api.state.lock().balance = balance;
        api.state.lock().next_id = 100;
        Arc::new(api)
    }

    pub fn set_round(&self, round: Option<GameRound>) {
        self.state.lock().round = round;
    }

    pub fn set_wagers(&self, wagers: Vec<Wager>) {
        self.state.lock().wagers = wagers;
    }

    pub fn fail_next_place(&self, message: &str) {
        self.state.lock().fail_place = Some(message.to_string());
    }

    pub fn place_calls(&self) -> usize {
        self.state.lock().place_calls
    }

    pub fn balance_calls(&self) -> usize {
        self.state.lock().balance_calls
    }

    pub fn balance_value(&self) -> Decimal {
        self.state.lock().balance
    }
}

#[async_trait]
impl GameApi for FakeGameApi {
    async fn current_round(&self) -> Result<Option<GameRound>> {
        Ok(self.state.lock().round.clone())
    }

    async fn current_wagers(&self) -> Result<Vec<Wager>> {
        Ok(self.state.lock().wagers.clone())
    }

    async fn balance(&self) -> Result<WalletBalance> {
        let mut state = self.state.lock();
        state.balance_calls += 1;
        Ok(WalletBalance {
            balance: state.balance,
        })
    }

    async fn place_wager(&self, request: PlaceWagerRequest) -> Result<Wager> {
        let mut state = self.state.lock();
        state.place_calls += 1;
        if let Some(message) = state.fail_place.take() {
            return Err(Error::Api {
                status: 400,
                message,
            });
        }
        let round_id = state.round.as_ref().map(|r| r.round_id).unwrap_or_default();
        state.next_id += 1;
        let placed = wager(
            state.next_id,
            round_id,
            request.bet_type,
            &request.bet_value,
            request.amount,
        );
        state.balance -= request.amount;
        state.wagers.push(placed.clone());
        Ok(placed)
    }

    async fn cancel_wager(&self, wager_id: WagerId) -> Result<()> {
        let mut state = self.state.lock();
        let position = state
            .wagers
            .iter()
            .position(|w| w.id == wager_id)
            .ok_or_else(|| Error::Api {
                status: 404,
                message: "Bet not found".to_string(),
            })?;
        let removed = state.wagers.remove(position);
        state.balance += removed.amount;
        Ok(())
    }

    async fn round_history(&self, _limit: usize) -> Result<Vec<RoundRecord>> {
        Ok(Vec::new())
    }
}
