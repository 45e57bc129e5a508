use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::clock::Clock;
use crate::session::{SessionEvent, SessionOrchestrator, SessionResult};

/// Unified event type consumed by the runner
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// Full current value of the input field
    Input(String),
    Tick,
    /// The input source is gone
    Closed,
}

/// Source of input events
pub trait EventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    fn recv_timeout(&self, timeout: Duration) -> Result<EngineEvent, RecvTimeoutError>;
}

/// Input values pushed through a channel by the host application
pub struct ChannelEventSource {
    rx: Receiver<String>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<String>) -> Self {
        Self { rx }
    }
}

impl EventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<EngineEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout).map(EngineEvent::Input)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedTicker {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::TICK_RATE_MS))
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Serializes input events and ticks into a session one at a time
pub struct Runner<E: EventSource, T: Ticker> {
    event_source: E,
    ticker: T,
}

impl<E: EventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        Self {
            event_source,
            ticker,
        }
    }

    /// Blocks up to one tick interval and returns the next event, or Tick on timeout
    pub fn step(&self) -> EngineEvent {
        self.next_event(self.ticker.interval())
    }

    fn next_event(&self, timeout: Duration) -> EngineEvent {
        match self.event_source.recv_timeout(timeout) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => EngineEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => EngineEvent::Closed,
        }
    }

    /// Drives `session` until it finishes.
    ///
    /// Ticks keep their cadence under a steady stream of input and are only
    /// delivered while the current item is active. Once the source closes a
    /// running timed item is ticked to its end; otherwise `None` is returned.
    pub fn run_session<C: Clock>(
        &self,
        session: &mut SessionOrchestrator<C>,
    ) -> Option<SessionResult> {
        let interval = self.ticker.interval();
        let mut next_tick = Instant::now() + interval;
        let mut closed = false;

        while !session.is_finished() {
            let now = Instant::now();
            let event = if now >= next_tick {
                EngineEvent::Tick
            } else if closed {
                std::thread::sleep(next_tick - now);
                EngineEvent::Tick
            } else {
                self.next_event(next_tick - now)
            };

            let outcome = match event {
                EngineEvent::Input(value) => session.handle_input(&value),
                EngineEvent::Tick => {
                    next_tick = Instant::now() + interval;
                    // only a running clock can still end the item without input
                    if closed && !(session.is_ticking() && session.remaining_time().is_some()) {
                        debug!("input closed with no running timer");
                        return None;
                    }
                    if session.is_ticking() {
                        session.on_tick()
                    } else {
                        SessionEvent::Continue
                    }
                }
                EngineEvent::Closed => {
                    closed = true;
                    SessionEvent::Continue
                }
            };

            if let SessionEvent::Finished(result) = outcome {
                return Some(*result);
            }
        }
        None
    }
}
