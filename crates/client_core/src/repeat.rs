use std::time::Duration;

use shared::{
    domain::{ActionToken, DriveButton},
    protocol::Command,
};
use tokio::{sync::oneshot, task::JoinHandle};
use tracing::{debug, warn};

pub const DEFAULT_REPEAT_INTERVAL: Duration = Duration::from_millis(100);

/// Anything that accepts commands without blocking.
pub trait CommandSink: Clone + Send + Sync + 'static {
    fn submit(&self, command: Command);
}

/// Re-issues one action at a fixed cadence while its button is held, then
/// issues the stop action once on release. Each button gets its own
/// dispatcher; dispatchers share nothing.
#[derive(Debug, Clone)]
pub struct RepeatDispatcher<S: CommandSink> {
    sink: S,
    action: ActionToken,
    stop: ActionToken,
    interval: Duration,
}

impl<S: CommandSink> RepeatDispatcher<S> {
    /// A zero interval falls back to [`DEFAULT_REPEAT_INTERVAL`].
    pub fn new(sink: S, action: ActionToken, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            warn!(%action, "repeat: zero interval, using default cadence");
            DEFAULT_REPEAT_INTERVAL
        } else {
            interval
        };
        Self {
            sink,
            action,
            stop: ActionToken::stop(),
            interval,
        }
    }

    pub fn for_button(sink: S, button: DriveButton, interval: Duration) -> Self {
        Self::new(sink, button.token(), interval)
    }

    pub fn with_stop(mut self, stop: ActionToken) -> Self {
        self.stop = stop;
        self
    }

    pub fn action(&self) -> &ActionToken {
        &self.action
    }

    /// Starts a held-input session. Must be called inside a tokio runtime.
    pub fn press(&self) -> HeldInputSession {
        let (release_tx, release_rx) = oneshot::channel();
        debug!(action = %self.action, "repeat: pressed");
        let task = tokio::spawn(repeat_until_released(
            self.sink.clone(),
            self.action.clone(),
            self.stop.clone(),
            self.interval,
            release_rx,
        ));
        HeldInputSession {
            release: release_tx,
            task,
        }
    }
}

/// One continuous press. Releasing, or simply dropping the session, ends the
/// repeat loop and triggers the single stop action.
#[derive(Debug)]
pub struct HeldInputSession {
    release: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl HeldInputSession {
    /// Releases the button and waits until the stop action was submitted.
    pub async fn release(self) {
        let Self { release, task } = self;
        let _ = release.send(());
        if let Err(err) = task.await {
            warn!(%err, "repeat: dispatcher task ended abnormally");
        }
    }
}

async fn repeat_until_released<S: CommandSink>(
    sink: S,
    action: ActionToken,
    stop: ActionToken,
    interval: Duration,
    mut released: oneshot::Receiver<()>,
) {
    loop {
        sink.submit(Command::Action(action.clone()));
        tokio::select! {
            biased;
            // A dropped sender counts as a release too.
            _ = &mut released => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    debug!(%action, %stop, "repeat: released");
    sink.submit(Command::Action(stop));
}

#[cfg(test)]
#[path = "tests/repeat_tests.rs"]
mod tests;
