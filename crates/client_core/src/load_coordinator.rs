//! Aggregates concurrently issued view loads into a single outcome per round.
//!
//! A screen configures how many loads it is about to start, each load reports
//! once when it finishes, and the coordinator emits:
//! * `on_load_state_changed(false)` for every load that starts
//! * `on_load_state_changed(true)` once, when a round closes without failures
//! * `on_login_required()` at most once, when a round closes and any of its
//!   failures needed a new login
//!
//! Closing a round resets it with the same expected count, so the instance can
//! be reused for every navigation and reload.

use std::{
    collections::VecDeque,
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const OUTCOME_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoundId(pub u64);

impl fmt::Display for RoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callbacks the owning screen receives.
pub trait LoadObserver: Send + Sync {
    fn on_load_state_changed(&self, loaded: bool);
    fn on_login_required(&self);
}

/// Adapts a pair of closures into a [`LoadObserver`].
pub struct LoadCallbacks<L, R> {
    on_load_state_changed: L,
    on_login_required: R,
}

impl<L, R> LoadCallbacks<L, R>
where
    L: Fn(bool) + Send + Sync,
    R: Fn() + Send + Sync,
{
    pub fn new(on_load_state_changed: L, on_login_required: R) -> Self {
        Self {
            on_load_state_changed,
            on_login_required,
        }
    }
}

impl<L, R> LoadObserver for LoadCallbacks<L, R>
where
    L: Fn(bool) + Send + Sync,
    R: Fn() + Send + Sync,
{
    fn on_load_state_changed(&self, loaded: bool) {
        (self.on_load_state_changed)(loaded)
    }

    fn on_login_required(&self) {
        (self.on_login_required)()
    }
}

/// Where observer callbacks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// On whichever thread made the report.
    #[default]
    Inline,
    /// Queued for the owner's thread, which drains the event receiver.
    Marshaled,
}

#[derive(Debug, Error)]
#[error("unknown delivery mode '{0}', expected 'inline' or 'marshaled'")]
pub struct UnknownDeliveryMode(String);

impl FromStr for DeliveryMode {
    type Err = UnknownDeliveryMode;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "marshaled" | "marshalled" => Ok(Self::Marshaled),
            other => Err(UnknownDeliveryMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorEvent {
    LoadStateChanged { round: RoundId, loaded: bool },
    LoginRequired { round: RoundId },
}

impl CoordinatorEvent {
    pub fn round(&self) -> RoundId {
        match self {
            Self::LoadStateChanged { round, .. } | Self::LoginRequired { round } => *round,
        }
    }

    pub fn dispatch(self, observer: &dyn LoadObserver) {
        match self {
            Self::LoadStateChanged { loaded, .. } => observer.on_load_state_changed(loaded),
            Self::LoginRequired { .. } => observer.on_login_required(),
        }
    }
}

/// Summary of a closed round, published on [`LoadCoordinator::subscribe_outcomes`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round: RoundId,
    pub expected: usize,
    pub failures: usize,
    pub login_required: bool,
    pub closed_at: DateTime<Utc>,
}

impl RoundOutcome {
    pub fn loaded(&self) -> bool {
        self.failures == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Pending {
        round: RoundId,
        completed: usize,
        expected: usize,
    },
    Closed(RoundOutcome),
    /// The report carried a ticket for a round that is no longer current.
    Stale {
        ticket_round: RoundId,
        current_round: RoundId,
    },
}

/// Identifies the round a load was started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    round: RoundId,
}

impl LoadTicket {
    pub fn round(&self) -> RoundId {
        self.round
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSnapshot {
    pub round: RoundId,
    pub expected: usize,
    pub completed: usize,
    pub failed: bool,
    pub login_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("a load round must expect at least one load")]
    ZeroExpected,
}

enum Delivery {
    Inline(Arc<dyn LoadObserver>),
    Marshaled(Sender<CoordinatorEvent>),
}

struct Round {
    id: RoundId,
    expected: usize,
    completed: usize,
    failures: usize,
    login_required: bool,
}

impl Round {
    fn restart(&mut self, expected: usize) {
        self.id = RoundId(self.id.0 + 1);
        self.expected = expected;
        self.completed = 0;
        self.failures = 0;
        self.login_required = false;
    }
}

struct State {
    round: Round,
    pending: VecDeque<CoordinatorEvent>,
    draining: bool,
}

pub struct LoadCoordinator {
    state: Mutex<State>,
    delivery: Delivery,
    outcomes: broadcast::Sender<RoundOutcome>,
}

impl LoadCoordinator {
    /// Callbacks run on the reporting thread. Observers may call back into
    /// the coordinator; such events are delivered after the current one.
    pub fn inline(observer: Arc<dyn LoadObserver>) -> Self {
        Self::with_delivery(Delivery::Inline(observer))
    }

    /// Events are queued in order for the owner to drain on its own thread.
    pub fn marshaled() -> (Self, Receiver<CoordinatorEvent>) {
        let (tx, rx) = unbounded();
        (Self::with_delivery(Delivery::Marshaled(tx)), rx)
    }

    fn with_delivery(delivery: Delivery) -> Self {
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(State {
                round: Round {
                    id: RoundId(0),
                    expected: 1,
                    completed: 0,
                    failures: 0,
                    login_required: false,
                },
                pending: VecDeque::new(),
                draining: false,
            }),
            delivery,
            outcomes,
        }
    }

    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<RoundOutcome> {
        self.outcomes.subscribe()
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        let state = self.lock();
        RoundSnapshot {
            round: state.round.id,
            expected: state.round.expected,
            completed: state.round.completed,
            failed: state.round.failures > 0,
            login_required: state.round.login_required,
        }
    }

    /// Starts a new round, abandoning any round still in flight.
    pub fn configure(&self, expected: usize) -> Result<RoundId, CoordinatorError> {
        if expected == 0 {
            return Err(CoordinatorError::ZeroExpected);
        }

        let mut state = self.lock();
        let abandoned = state.round.completed;
        state.round.restart(expected);
        let round = state.round.id;
        if abandoned > 0 {
            debug!(%round, abandoned, "configured load round over an unfinished one");
        } else {
            debug!(%round, expected, "configured load round");
        }
        Ok(round)
    }

    pub fn report_loading(&self) {
        self.begin_load();
    }

    /// Same as [`report_loading`](Self::report_loading), returning a ticket
    /// that ties the eventual report to the current round.
    pub fn begin_load(&self) -> LoadTicket {
        let state = self.lock();
        let round = state.round.id;
        self.start_load(state, round)
    }

    /// Starts a load in `round`, the id returned by [`configure`](Self::configure).
    ///
    /// If `round` has already closed or been replaced, no event is emitted and
    /// the returned ticket is stale: reporting it changes nothing.
    pub fn begin_load_in(&self, round: RoundId) -> LoadTicket {
        let state = self.lock();
        if state.round.id != round {
            debug!(
                ticket_round = %round,
                current_round = %state.round.id,
                "load started for a round that is no longer current"
            );
            return LoadTicket { round };
        }
        self.start_load(state, round)
    }

    fn start_load<'a>(&'a self, mut state: MutexGuard<'a, State>, round: RoundId) -> LoadTicket {
        state
            .pending
            .push_back(CoordinatorEvent::LoadStateChanged {
                round,
                loaded: false,
            });
        self.drain(state);
        LoadTicket { round }
    }

    /// Counts toward whatever round is current when the report arrives.
    ///
    /// With inline delivery, callbacks this report causes may run on another
    /// reporter's thread after this call returns.
    pub fn report_success(&self) -> ReportOutcome {
        self.record(None, None)
    }

    /// Counts toward whatever round is current when the report arrives.
    ///
    /// With inline delivery, callbacks this report causes may run on another
    /// reporter's thread after this call returns.
    pub fn report_failure(&self, login_required: bool) -> ReportOutcome {
        self.record(None, Some(login_required))
    }

    /// Discarded if the ticket's round has already closed or been replaced.
    /// Callbacks may be delivered by a concurrent reporter after this returns.
    pub fn report_success_for(&self, ticket: LoadTicket) -> ReportOutcome {
        self.record(Some(ticket), None)
    }

    /// Discarded if the ticket's round has already closed or been replaced.
    /// Callbacks may be delivered by a concurrent reporter after this returns.
    pub fn report_failure_for(&self, ticket: LoadTicket, login_required: bool) -> ReportOutcome {
        self.record(Some(ticket), Some(login_required))
    }

    fn record(&self, ticket: Option<LoadTicket>, failure: Option<bool>) -> ReportOutcome {
        let mut state = self.lock();

        if let Some(ticket) = ticket {
            if ticket.round != state.round.id {
                warn!(
                    ticket_round = %ticket.round,
                    current_round = %state.round.id,
                    "discarding load report from a previous round"
                );
                return ReportOutcome::Stale {
                    ticket_round: ticket.round,
                    current_round: state.round.id,
                };
            }
        }

        let round = &mut state.round;
        round.completed += 1;
        if let Some(login_required) = failure {
            round.failures += 1;
            round.login_required |= login_required;
        }

        if round.completed < round.expected {
            debug!(
                round = %round.id,
                completed = round.completed,
                expected = round.expected,
                failed = failure.is_some(),
                "load reported"
            );
            return ReportOutcome::Pending {
                round: round.id,
                completed: round.completed,
                expected: round.expected,
            };
        }

        let outcome = RoundOutcome {
            round: round.id,
            expected: round.expected,
            failures: round.failures,
            login_required: round.login_required,
            closed_at: Utc::now(),
        };
        let expected = round.expected;
        round.restart(expected);

        if outcome.loaded() {
            state.pending.push_back(CoordinatorEvent::LoadStateChanged {
                round: outcome.round,
                loaded: true,
            });
        }
        if outcome.login_required {
            state.pending.push_back(CoordinatorEvent::LoginRequired {
                round: outcome.round,
            });
        }
        info!(
            round = %outcome.round,
            expected = outcome.expected,
            failures = outcome.failures,
            login_required = outcome.login_required,
            "load round closed"
        );
        // No subscribers is fine.
        let _ = self.outcomes.send(outcome.clone());

        self.drain(state);
        ReportOutcome::Closed(outcome)
    }

    /// Delivers queued events in order. Only one thread drains at a time; a
    /// thread that finds another one draining leaves its events to it.
    fn drain<'a>(&'a self, mut state: MutexGuard<'a, State>) {
        if state.draining {
            return;
        }
        state.draining = true;
        let _reset = DrainReset(self);
        while let Some(event) = state.pending.pop_front() {
            drop(state);
            self.deliver(event);
            state = self.lock();
        }
        state.draining = false;
    }

    fn deliver(&self, event: CoordinatorEvent) {
        match &self.delivery {
            Delivery::Inline(observer) => event.dispatch(observer.as_ref()),
            Delivery::Marshaled(tx) => {
                if tx.send(event).is_err() {
                    warn!(?event, "coordinator event receiver dropped; event discarded");
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Clears the draining flag if an observer panics mid-delivery.
struct DrainReset<'a>(&'a LoadCoordinator);

impl Drop for DrainReset<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().draining = false;
        }
    }
}

#[cfg(test)]
#[path = "tests/load_coordinator_tests.rs"]
mod tests;
