use std::time::Duration;

use rodbus::client::*;
use rodbus::*;
use tokio::sync::mpsc;

use crate::error::ConnectionError;

/// Where a link is in its lifecycle, as far as connecting is concerned
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum LinkProgress {
    /// not up yet, keep waiting
    Pending,
    /// connected (TCP) or open (serial)
    Up,
    /// the attempt failed
    Down(String),
}

/// Classifies the states reported by a rodbus channel
pub(crate) trait LinkState {
    fn progress(&self) -> LinkProgress;
}

impl LinkState for ClientState {
    fn progress(&self) -> LinkProgress {
        match self {
            ClientState::Disabled | ClientState::Connecting => LinkProgress::Pending,
            ClientState::Connected => LinkProgress::Up,
            ClientState::WaitAfterFailedConnect(delay) => LinkProgress::Down(format!(
                "unable to connect, next attempt in {} ms",
                delay.as_millis()
            )),
            _ => LinkProgress::Down(format!("{self:?}")),
        }
    }
}

impl LinkState for PortState {
    fn progress(&self) -> LinkProgress {
        match self {
            PortState::Disabled => LinkProgress::Pending,
            PortState::Open => LinkProgress::Up,
            PortState::Wait(delay) => LinkProgress::Down(format!(
                "unable to open port, next attempt in {} ms",
                delay.as_millis()
            )),
            _ => LinkProgress::Down(format!("{self:?}")),
        }
    }
}

/// Forwards channel state changes to the task waiting for the link
pub(crate) struct StateListener<T> {
    tx: mpsc::Sender<T>,
}

impl<T> StateListener<T> {
    pub(crate) fn create() -> (Self, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(32);
        (Self { tx }, rx)
    }
}

impl<T> Listener<T> for StateListener<T>
where
    T: std::fmt::Debug + Send,
{
    fn update(&mut self, state: T) -> MaybeAsync<()> {
        tracing::debug!("link state: {state:?}");
        let _ = self.tx.try_send(state);
        MaybeAsync::ready(())
    }
}

/// Wait until the link reports it is up, fails, or `timeout` elapses
pub(crate) async fn wait_for_link<S>(
    rx: &mut mpsc::Receiver<S>,
    timeout: Duration,
) -> Result<(), ConnectionError>
where
    S: LinkState,
{
    let wait = async {
        loop {
            let state = match rx.recv().await {
                Some(state) => state,
                None => return Err(ConnectionError::Shutdown),
            };
            match state.progress() {
                LinkProgress::Pending => {}
                LinkProgress::Up => return Ok(()),
                LinkProgress::Down(reason) => return Err(ConnectionError::Failed(reason)),
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(result) => result,
        Err(_) => Err(ConnectionError::Timeout(timeout.as_millis())),
    }
}
