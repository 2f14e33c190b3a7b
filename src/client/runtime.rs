//! The single cooperative client loop
//!
//! Every handler below runs to completion inside one `select!` turn, so
//! the round machine, ledger, animation state and estimator need no locks.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::tasks::{TaskSet, Timer, TimerSet};
use super::{ClientCommand, ClientEvent, ClientStatus, RevealedResult};
use crate::animation::{AnimationParams, WheelAnimationEngine, WheelFrame};
use crate::api::GameApi;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::feedback::{FeedbackService, VolumeControl};
use crate::ledger::BetLedgerCache;
use crate::protocol::{
    pocket_color, ChatMessage, GameRound, PlaceWagerRequest, RoundId, WalletBalance, Wager,
    WagerId, WagerOutcomeNotice,
};
use crate::round::{GamePhaseStateMachine, PhaseEffect};
use crate::settlement::{Coverage, SettlementEstimator, Verdict};
use crate::transport::{ChannelEvent, ChannelSettings, Connector, SessionChannel};

/// Results of outbound requests, applied back inside the loop
enum Completion {
    Round(Result<Option<GameRound>>),
    Balance(Result<WalletBalance>),
    Wagers(Result<Vec<Wager>>),
    Placed {
        result: Result<Wager>,
        reply: Option<oneshot::Sender<Result<Wager>>>,
    },
    Cancelled {
        result: Result<()>,
        reply: Option<oneshot::Sender<Result<()>>>,
    },
}

pub(super) struct ClientLoop {
    config: Config,
    authenticated: bool,
    api: Arc<dyn GameApi>,
    channel: SessionChannel,
    channel_events: mpsc::Receiver<ChannelEvent>,
    commands: mpsc::Receiver<ClientCommand>,

    machine: GamePhaseStateMachine,
    ledger: BetLedgerCache,
    engine: WheelAnimationEngine,
    estimator: SettlementEstimator,
    volume: Arc<VolumeControl>,

    timers: TimerSet,
    requests: TaskSet<Completion>,
    notice_timer: Option<AbortHandle>,

    frames: watch::Sender<WheelFrame>,
    status: watch::Sender<ClientStatus>,
    events: broadcast::Sender<ClientEvent>,
}

impl ClientLoop {
    pub(super) fn new(
        config: Config,
        api: Arc<dyn GameApi>,
        connector: Arc<dyn Connector>,
        feedback: Arc<dyn FeedbackService>,
        commands: mpsc::Receiver<ClientCommand>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Result<(Self, watch::Receiver<WheelFrame>, watch::Receiver<ClientStatus>)> {
        let settings = ChannelSettings::from_config(&config.server)?;
        let (channel, channel_events) =
            SessionChannel::new(settings, connector, config.app.event_buffer);

        let volume = Arc::new(VolumeControl::new(
            feedback,
            config.feedback.enabled,
            config.feedback.effects_volume,
        ));
        let sink: Arc<dyn FeedbackService> = volume.clone();
        let engine = WheelAnimationEngine::new(AnimationParams::from(&config.animation), sink.clone());
        let estimator = SettlementEstimator::new(sink);

        let (frames, frame_rx) = watch::channel(engine.frame());
        let (status, status_rx) = watch::channel(ClientStatus::default());

        let client = Self {
            authenticated: config.server.auth_token.is_some(),
            config,
            api,
            channel,
            channel_events,
            commands,
            machine: GamePhaseStateMachine::new(),
            ledger: BetLedgerCache::new(),
            engine,
            estimator,
            volume,
            timers: TimerSet::new("timers"),
            requests: TaskSet::new("requests"),
            notice_timer: None,
            frames,
            status,
            events,
        };
        Ok((client, frame_rx, status_rx))
    }

    pub(super) async fn run(mut self) {
        info!(
            environment = ?self.config.app.environment,
            authenticated = self.authenticated,
            "client starting"
        );
        self.channel.connect();
        self.fetch_round();
        if self.authenticated {
            self.fetch_balance();
            self.fetch_wagers();
        }

        let mut ticker = interval(self.config.animation.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_frame = Instant::now();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(ClientCommand::Shutdown) | None => break,
                    Some(command) => self.handle_command(command).await,
                },
                Some(event) = self.channel_events.recv() => self.handle_channel_event(event),
                now = ticker.tick() => {
                    let elapsed = now.saturating_duration_since(last_frame);
                    last_frame = now;
                    self.animate(elapsed);
                }
                timer = self.timers.next() => self.handle_timer(timer),
                completion = self.requests.next() => self.handle_completion(completion),
            }
        }

        self.teardown().await;
    }

    async fn teardown(&mut self) {
        self.timers.abort_all();
        self.requests.abort_all();
        if let Some(handle) = self.notice_timer.take() {
            handle.abort();
        }
        self.channel.disconnect().await;
        self.status.send_modify(|status| status.connected = false);
        info!("client stopped");
    }

    fn emit(&self, event: ClientEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    fn animate(&mut self, elapsed: std::time::Duration) {
        let completed = self.engine.advance(elapsed);
        let frame = self.engine.frame();
        self.frames.send_if_modified(|current| {
            if *current == frame {
                false
            } else {
                *current = frame;
                true
            }
        });

        if let Some(winning_number) = completed {
            self.timers.schedule(
                Timer::RevealResult {
                    round_id: self.machine.round_id(),
                    winning_number,
                },
                self.config.animation.reveal_delay,
            );
        }
    }

    // Push channel

    fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => self.set_connection(true, None),
            ChannelEvent::Disconnected { error } => self.set_connection(false, error),
            ChannelEvent::Round(round) => self.handle_round(round),
            ChannelEvent::Chat(message) => {
                self.push_chat(message.clone());
                self.emit(ClientEvent::Chat(message));
            }
            ChannelEvent::WagerOutcome(notice) => self.handle_outcome(notice),
        }
    }

    fn push_chat(&mut self, message: ChatMessage) {
        let limit = self.config.app.chat_history;
        self.status.send_modify(|status| {
            status.chat.push(message);
            if status.chat.len() > limit {
                let excess = status.chat.len() - limit;
                status.chat.drain(..excess);
            }
        });
    }

    fn set_connection(&mut self, connected: bool, error: Option<String>) {
        {
            let status = self.status.borrow();
            if status.connected == connected && status.connection_error == error {
                return;
            }
        }
        self.status.send_modify(|status| {
            status.connected = connected;
            status.connection_error = error.clone();
        });
        self.emit(ClientEvent::ConnectionChanged { connected, error });
    }

    fn handle_round(&mut self, round: GameRound) {
        let effects = self.machine.apply(round.clone());
        self.status
            .send_modify(|status| status.round = Some(round.clone()));
        self.emit(ClientEvent::RoundChanged(round));
        for effect in effects {
            self.run_effect(effect);
        }
    }

    fn run_effect(&mut self, effect: PhaseEffect) {
        debug!(?effect, "phase effect");
        match effect {
            PhaseEffect::NewRound { round_id } => {
                self.ledger.clear();
                self.publish_ledger();
                self.status.send_modify(|status| status.revealed = None);
                if self.authenticated {
                    self.fetch_balance();
                    self.fetch_wagers();
                }
                debug!(round_id, "new round");
            }
            PhaseEffect::HaltSpin => {
                self.engine.halt_spin();
            }
            PhaseEffect::FreezeLedger { round_id } => {
                self.ledger.freeze(round_id);
            }
            PhaseEffect::BettingClosedTick | PhaseEffect::CountdownTick { .. } => {
                self.volume.play_tick();
            }
            PhaseEffect::StartSpin => {
                self.engine.start_spin();
                self.status.send_modify(|status| status.revealed = None);
            }
            PhaseEffect::StartSettle { winning_number } => {
                if let Err(error) = self.engine.start_settle(Some(winning_number)) {
                    debug!(error = %error, "settle rejected");
                }
            }
            PhaseEffect::Estimate {
                round_id,
                winning_number,
            } => self.estimate(round_id, winning_number),
        }
    }

    fn estimate(&mut self, round_id: RoundId, winning_number: u8) {
        let frozen = self.ledger.frozen_for(round_id);
        let Some(outcome) = self
            .estimator
            .estimate_once(round_id, frozen, winning_number)
        else {
            return;
        };
        if let Some(verdict) = outcome.verdict {
            self.timers.schedule(
                Timer::DeliverVerdict { round_id, verdict },
                self.config.settlement.verdict_delay,
            );
        }
    }

    fn handle_outcome(&mut self, notice: WagerOutcomeNotice) {
        if notice.bets.is_empty() {
            debug!(round_id = notice.round_id, "outcome notice without wagers");
            return;
        }
        info!(
            round_id = notice.round_id,
            total_won = %notice.total_won,
            balance = %notice.new_balance,
            "wager outcome"
        );
        self.set_balance(notice.new_balance);
        self.emit(ClientEvent::WagerOutcome(notice));
    }

    // Timers

    fn handle_timer(&mut self, timer: Timer) {
        match timer {
            Timer::RevealResult {
                round_id,
                winning_number,
            } => {
                let revealed = RevealedResult {
                    round_id,
                    winning_number,
                    color: pocket_color(winning_number),
                };
                info!(?round_id, winning_number, "result revealed");
                self.status
                    .send_modify(|status| status.revealed = Some(revealed));
                self.emit(ClientEvent::ResultRevealed(revealed));
            }
            Timer::DeliverVerdict { round_id, verdict } => {
                self.estimator.deliver(verdict);
                self.emit(match verdict {
                    Verdict::Celebrate { amount } => ClientEvent::Celebrate { round_id, amount },
                    Verdict::Commiserate { amount } => {
                        ClientEvent::Commiserate { round_id, amount }
                    }
                });
                self.timers.schedule(
                    Timer::RefreshBalance,
                    self.config.settlement.balance_refresh_delay,
                );
            }
            Timer::RefreshBalance => self.fetch_balance(),
            Timer::ClearNotice => {
                self.notice_timer = None;
                self.status.send_modify(|status| status.notice = None);
                self.emit(ClientEvent::NoticeCleared);
            }
        }
    }

    fn show_notice(&mut self, message: String) {
        if let Some(handle) = self.notice_timer.take() {
            handle.abort();
        }
        self.status
            .send_modify(|status| status.notice = Some(message.clone()));
        self.emit(ClientEvent::Notice { message });
        self.notice_timer = Some(
            self.timers
                .schedule(Timer::ClearNotice, self.config.app.notice_ttl),
        );
    }

    // Commands

    async fn handle_command(&mut self, command: ClientCommand) {
        match command {
            ClientCommand::PlaceWager { request, reply } => self.place_wager(request, reply),
            ClientCommand::CancelWager { wager_id, reply } => self.cancel_wager(wager_id, reply),
            ClientCommand::RefreshBalance => self.fetch_balance(),
            ClientCommand::Reconnect => {
                info!("manual reconnect");
                self.channel.reconnect();
            }
            ClientCommand::Disconnect => {
                self.channel.disconnect().await;
                self.set_connection(false, None);
            }
            ClientCommand::SetVolume(volume) => self.volume.set_volume(volume),
            ClientCommand::SetFeedbackEnabled(enabled) => self.volume.set_enabled(enabled),
            ClientCommand::Shutdown => {}
        }
    }

    /// Local checks run before any wager request is sent
    fn check_wager(&self, request: &PlaceWagerRequest) -> Result<()> {
        if !self.authenticated {
            return Err(Error::NotAuthenticated);
        }
        if !self.machine.accepts_wagers() {
            return Err(Error::InvalidWager("Betting is closed".to_string()));
        }
        if request.amount <= Decimal::ZERO {
            return Err(Error::InvalidWager("Amount must be positive".to_string()));
        }
        if Coverage::parse(request.bet_type, &request.bet_value).is_none() {
            return Err(Error::InvalidWager(format!(
                "'{}' is not a valid {} value",
                request.bet_value, request.bet_type
            )));
        }
        let balance = self.status.borrow().balance;
        if balance.is_some_and(|balance| request.amount > balance) {
            return Err(Error::InsufficientBalance);
        }
        Ok(())
    }

    fn place_wager(
        &mut self,
        request: PlaceWagerRequest,
        reply: Option<oneshot::Sender<Result<Wager>>>,
    ) {
        if let Err(error) = self.check_wager(&request) {
            self.reject(error, reply);
            return;
        }
        let api = Arc::clone(&self.api);
        self.requests.spawn(async move {
            Completion::Placed {
                result: api.place_wager(request).await,
                reply,
            }
        });
    }

    fn cancel_wager(&mut self, wager_id: WagerId, reply: Option<oneshot::Sender<Result<()>>>) {
        let checked = if !self.authenticated {
            Err(Error::NotAuthenticated)
        } else if !self.machine.accepts_wagers() {
            Err(Error::InvalidWager("Betting is closed".to_string()))
        } else {
            Ok(())
        };
        if let Err(error) = checked {
            self.reject(error, reply);
            return;
        }
        let api = Arc::clone(&self.api);
        self.requests.spawn(async move {
            Completion::Cancelled {
                result: api.cancel_wager(wager_id).await,
                reply,
            }
        });
    }

    fn reject<T>(&mut self, error: Error, reply: Option<oneshot::Sender<Result<T>>>) {
        warn!(error = %error, code = error.code(), "request rejected");
        self.show_notice(error.user_message());
        if let Some(reply) = reply {
            let _ = reply.send(Err(error));
        }
    }

    // Requests

    fn fetch_round(&mut self) {
        let api = Arc::clone(&self.api);
        self.requests
            .spawn(async move { Completion::Round(api.current_round().await) });
    }

    fn fetch_balance(&mut self) {
        if !self.authenticated {
            return;
        }
        let api = Arc::clone(&self.api);
        self.requests
            .spawn(async move { Completion::Balance(api.balance().await) });
    }

    fn fetch_wagers(&mut self) {
        if !self.authenticated {
            return;
        }
        let api = Arc::clone(&self.api);
        self.requests
            .spawn(async move { Completion::Wagers(api.current_wagers().await) });
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Round(Ok(Some(round))) => {
                // A pushed snapshot is always newer than the initial fetch
                if self.machine.current().is_none() {
                    self.handle_round(round);
                }
            }
            Completion::Round(Ok(None)) => debug!("no round running"),
            Completion::Balance(Ok(wallet)) => self.set_balance(wallet.balance),
            Completion::Wagers(Ok(wagers)) => {
                self.ledger.replace(wagers);
                self.publish_ledger();
            }
            Completion::Placed { result, reply } => {
                match &result {
                    Ok(wager) => {
                        info!(wager_id = wager.id, bet_type = %wager.bet_type, amount = %wager.amount, "wager placed");
                        self.fetch_balance();
                        self.fetch_wagers();
                    }
                    Err(error) => self.request_failed(error),
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Completion::Cancelled { result, reply } => {
                match &result {
                    Ok(()) => {
                        info!("wager cancelled");
                        self.fetch_balance();
                        self.fetch_wagers();
                    }
                    Err(error) => self.request_failed(error),
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Completion::Round(Err(error))
            | Completion::Balance(Err(error))
            | Completion::Wagers(Err(error)) => self.request_failed(&error),
        }
    }

    fn request_failed(&mut self, error: &Error) {
        warn!(error = %error, code = error.code(), "request failed");
        self.show_notice(error.user_message());
    }

    fn set_balance(&mut self, balance: Decimal) {
        self.status
            .send_modify(|status| status.balance = Some(balance));
        self.emit(ClientEvent::BalanceUpdated(balance));
    }

    fn publish_ledger(&mut self) {
        let summary = self.ledger.summary();
        let wagers = self.ledger.wagers().to_vec();
        self.status.send_modify(|status| {
            status.ledger = summary;
            status.wagers = wagers;
        });
    }
}
