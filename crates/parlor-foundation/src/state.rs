use crate::error::AppError;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;

/// Connectivity of the conversation session with the media relay.
///
/// `Ready` is reached only a fixed warm-up delay after `Connected`; no
/// capture may start before `Ready`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    Connected,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    NotReady,
    Muted,
}

/// Who holds the conversational floor right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Blocked(BlockReason),
    Listening,
    AwaitingResponse,
    Speaking,
}

pub struct TurnStateMachine {
    state: Arc<RwLock<TurnState>>,
    state_tx: Sender<TurnState>,
    state_rx: Receiver<TurnState>,
}

impl Default for TurnStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnStateMachine {
    pub fn new() -> Self {
        let (state_tx, state_rx) = crossbeam_channel::unbounded();
        Self {
            state: Arc::new(RwLock::new(TurnState::Blocked(BlockReason::NotReady))),
            state_tx,
            state_rx,
        }
    }

    pub fn transition(&self, new_state: TurnState) -> Result<(), AppError> {
        let mut current = self.state.write();

        if *current == new_state {
            return Ok(());
        }

        // Validate state transitions. Mute while Speaking does NOT appear
        // here: the flag flips silently and the gate re-check at synthesis
        // completion lands in Blocked(Muted).
        let valid = matches!(
            (&*current, &new_state),
            (TurnState::Blocked(_), TurnState::Blocked(_))
                | (TurnState::Blocked(_), TurnState::Listening)
                | (TurnState::Blocked(_), TurnState::Speaking)
                | (TurnState::Listening, TurnState::AwaitingResponse)
                | (TurnState::Listening, TurnState::Speaking)
                | (TurnState::Listening, TurnState::Blocked(_))
                | (TurnState::AwaitingResponse, TurnState::Speaking)
                | (TurnState::AwaitingResponse, TurnState::Listening)
                | (TurnState::AwaitingResponse, TurnState::Blocked(_))
                | (TurnState::Speaking, TurnState::Listening)
                | (TurnState::Speaking, TurnState::Blocked(_))
        );

        if !valid {
            return Err(AppError::InvalidTransition(format!(
                "{:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!(target: "turn", "State transition: {:?} -> {:?}", *current, new_state);
        *current = new_state;
        let _ = self.state_tx.send(new_state);
        Ok(())
    }

    pub fn current(&self) -> TurnState {
        *self.state.read()
    }

    pub fn subscribe(&self) -> Receiver<TurnState> {
        self.state_rx.clone()
    }
}
