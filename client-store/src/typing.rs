//! Keystroke-driven typing indicator with a trailing idle timeout.
//!
//! The state machine is synchronous and takes the clock as an argument;
//! `typing_monitor` wraps it for use against the runtime clock and a socket
//! sender. `tokio::time::Instant` is used throughout so the monitor follows
//! the test clock when it is paused.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Idle gap after the last keystroke before typing is considered stopped.
pub const TYPING_IDLE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    /// Emit `typing` to the chat.
    Started,
    /// Emit `stopTyping` to the chat.
    Stopped,
}

/// Debounce core: one `Started` per burst of keystrokes, one `Stopped` once
/// the burst goes idle (or is cut short by a send).
#[derive(Debug, Default)]
pub struct TypingState {
    deadline: Option<Instant>,
}

impl TypingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a keystroke. Returns `Started` on the first keystroke of a
    /// burst; later keystrokes only push the idle deadline out.
    pub fn keystroke(&mut self, now: Instant) -> Option<TypingSignal> {
        let started = self.deadline.is_none();
        self.deadline = Some(now + TYPING_IDLE);
        started.then_some(TypingSignal::Started)
    }

    /// When the current burst times out, if ever.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check the idle deadline. Returns `Stopped` exactly once per burst.
    pub fn expire(&mut self, now: Instant) -> Option<TypingSignal> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                Some(TypingSignal::Stopped)
            }
            _ => None,
        }
    }

    /// End the burst immediately (message sent, composer closed).
    pub fn stop(&mut self) -> Option<TypingSignal> {
        self.deadline.take().map(|_| TypingSignal::Stopped)
    }
}

/// Drive a `TypingState` from a keystroke channel, emitting signals for the
/// socket layer. Ends when the keystroke side is dropped, flushing a final
/// `Stopped` if a burst was open.
pub async fn typing_monitor(
    mut keystrokes: mpsc::Receiver<()>,
    signals: mpsc::Sender<TypingSignal>,
) {
    let mut state = TypingState::new();
    loop {
        let deadline = state.deadline();
        tokio::select! {
            key = keystrokes.recv() => match key {
                Some(()) => {
                    if let Some(signal) = state.keystroke(Instant::now()) {
                        if signals.send(signal).await.is_err() {
                            return;
                        }
                    }
                }
                None => {
                    if let Some(signal) = state.stop() {
                        let _ = signals.send(signal).await;
                    }
                    debug!("Typing monitor closed");
                    return;
                }
            },
            _ = async {
                match deadline {
                    Some(d) => sleep_until(d).await,
                    None => std::future::pending::<()>().await,
                }
            } => {
                if let Some(signal) = state.expire(Instant::now()) {
                    if signals.send(signal).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_started_per_burst_and_deadline_slides() {
        let mut state = TypingState::new();
        let t0 = Instant::now();

        assert_eq!(state.keystroke(t0), Some(TypingSignal::Started));
        assert_eq!(state.keystroke(t0 + Duration::from_millis(300)), None);
        assert_eq!(state.keystroke(t0 + Duration::from_millis(600)), None);

        // The idle window counts from the last keystroke.
        assert_eq!(state.expire(t0 + Duration::from_millis(1100)), None);
        assert_eq!(
            state.expire(t0 + Duration::from_millis(1600)),
            Some(TypingSignal::Stopped)
        );
        // Expiry is one-shot.
        assert_eq!(state.expire(t0 + Duration::from_millis(9999)), None);
    }

    #[test]
    fn new_burst_after_stop_starts_again() {
        let mut state = TypingState::new();
        let t0 = Instant::now();

        assert_eq!(state.keystroke(t0), Some(TypingSignal::Started));
        assert_eq!(state.stop(), Some(TypingSignal::Stopped));
        assert_eq!(state.stop(), None);

        assert_eq!(
            state.keystroke(t0 + Duration::from_secs(5)),
            Some(TypingSignal::Started)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn monitor_emits_stop_after_idle_window() {
        let (key_tx, key_rx) = mpsc::channel(8);
        let (sig_tx, mut sig_rx) = mpsc::channel(8);
        tokio::spawn(typing_monitor(key_rx, sig_tx));

        key_tx.send(()).await.unwrap();
        assert_eq!(sig_rx.recv().await, Some(TypingSignal::Started));

        // No further keystrokes: the paused clock advances straight to the
        // idle deadline.
        assert_eq!(sig_rx.recv().await, Some(TypingSignal::Stopped));

        // A fresh burst starts over.
        key_tx.send(()).await.unwrap();
        assert_eq!(sig_rx.recv().await, Some(TypingSignal::Started));

        drop(key_tx);
        assert_eq!(sig_rx.recv().await, Some(TypingSignal::Stopped));
        assert_eq!(sig_rx.recv().await, None);
    }
}
